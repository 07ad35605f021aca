//! Plain-text rendering of scores, history and the session user

use std::fmt::Write as _;

use skc_common::api::{AnalysisResult, Rating, Severity};
use skc_common::time::format_upload_date;
use skc_common::{Session, UploadTask};

fn rating_label(rating: Rating) -> &'static str {
    match rating {
        Rating::Good => "Good",
        Rating::Medium => "Medium",
        Rating::Poor => "Poor",
    }
}

fn severity_label(severity: Severity) -> &'static str {
    match severity {
        Severity::High => "HIGH",
        Severity::Medium => "MED",
        Severity::Low => "LOW",
    }
}

/// Whole scores print without decimals, others with one
pub fn format_score(score: f64) -> String {
    if score.fract() == 0.0 {
        format!("{:.0}", score)
    } else {
        format!("{:.1}", score)
    }
}

/// Score report for one analysed upload
pub fn render_report(task: &UploadTask, result: &AnalysisResult) -> String {
    format!(
        "{} (task {})\n{}",
        task.file_name,
        task.task_id,
        render_result(result)
    )
}

/// Score, rating, summary and issues (most severe first)
pub fn render_result(result: &AnalysisResult) -> String {
    let mut out = String::new();
    let _ = write!(out, "  Score: {}", format_score(result.score));
    if let Some(rating) = result.rating {
        let _ = write!(out, " ({})", rating_label(rating));
    }
    out.push('\n');

    if let Some(summary) = result.summary.as_deref().filter(|s| !s.is_empty()) {
        let _ = writeln!(out, "  Summary: {}", summary);
    }

    let issues = result.issues_by_severity();
    if issues.is_empty() {
        out.push_str("  No issues found\n");
    } else {
        let _ = writeln!(out, "  Issues ({}):", issues.len());
        for issue in issues {
            let _ = write!(out, "    [{}] {}", severity_label(issue.severity), issue.title);
            if let Some(category) = &issue.category {
                let _ = write!(out, " ({})", category);
            }
            out.push('\n');
            if !issue.description.is_empty() {
                let _ = writeln!(out, "        {}", issue.description);
            }
        }
    }
    out
}

/// Upload history, most recent first
pub fn render_history(history: &[UploadTask]) -> String {
    if history.is_empty() {
        return "No uploads yet\n".to_string();
    }

    let mut out = format!("Recent uploads ({}):\n", history.len());
    for task in history {
        let _ = writeln!(
            out,
            "  {}  {:<24} {:>5}  {}",
            format_upload_date(&task.upload_date),
            task.file_name,
            format_score(task.score),
            task.task_id
        );
    }
    out
}

/// Who is logged in
pub fn render_user(session: &Session) -> String {
    match (&session.user, session.is_authenticated) {
        (Some(user), true) => {
            let mut out = format!("[{}] {}", session.initial(), user.name);
            if !user.email.is_empty() {
                let _ = write!(out, " <{}>", user.email);
            }
            let _ = write!(out, "\n  id: {}", user.id);
            if let Some(picture) = &user.picture {
                let _ = write!(out, "\n  picture: {}", picture);
            }
            out.push('\n');
            out
        }
        _ => match &session.error {
            Some(error) => format!("Not logged in ({})\n", error),
            None => "Not logged in\n".to_string(),
        },
    }
}
