//! Scoring service request/response types
//!
//! Mirrors the JSON bodies returned by the SketchCheck backend. All optional
//! fields default so that partially populated responses still deserialize.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ========================================
// Envelope
// ========================================

/// Common response envelope used by some backend endpoints
///
/// A 2xx response whose body is `{"success": false, "error": "..."}` is a
/// failure, not a result.
///
/// # Examples
///
/// ```
/// use skc_common::api::types::ApiEnvelope;
///
/// let body = r#"{"success": false, "error": "quota exceeded"}"#;
/// let envelope: ApiEnvelope<serde_json::Value> = serde_json::from_str(body).unwrap();
/// assert!(!envelope.success);
/// assert_eq!(envelope.error.as_deref(), Some("quota exceeded"));
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiEnvelope<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ApiEnvelope<Value> {
    /// Detect an envelope in an arbitrary JSON body
    ///
    /// Returns `None` for bodies without a boolean `success` field.
    pub fn detect(body: &Value) -> Option<Self> {
        body.get("success")?.as_bool()?;
        serde_json::from_value(body.clone()).ok()
    }
}

// ========================================
// Health
// ========================================

/// `GET /health` response
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HealthResponse {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

// ========================================
// Upload / analysis
// ========================================

/// Server-side analysis task status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl TaskStatus {
    /// Analysis still running on the server
    pub fn is_in_progress(self) -> bool {
        matches!(self, TaskStatus::Pending | TaskStatus::Processing)
    }
}

/// `POST /upload` response
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AnalyzeResponse {
    /// Absent on some error bodies; callers must check
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Overall quality band of a sketch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum Rating {
    Good,
    Medium,
    Poor,
}

/// Issue severity, ordered most severe first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize, Serialize)]
pub enum Severity {
    High,
    Medium,
    Low,
}

/// A single finding in the analysis report
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Issue {
    #[serde(default)]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

/// Completed analysis (`GET /returnScore` body once the task is done)
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AnalysisResult {
    /// Task the score belongs to, when the backend echoes it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    /// Missing scores count as zero
    #[serde(default)]
    pub score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<Rating>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default)]
    pub issues: Vec<Issue>,
}

impl AnalysisResult {
    /// Issues ordered High → Medium → Low, stable within a severity
    pub fn issues_by_severity(&self) -> Vec<&Issue> {
        let mut issues: Vec<&Issue> = self.issues.iter().collect();
        issues.sort_by_key(|issue| issue.severity);
        issues
    }
}

/// Status body returned while a task is still being analysed
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AnalysisStatusResponse {
    #[serde(default)]
    pub task_id: Option<String>,
    pub status: TaskStatus,
    /// Fraction complete (0.0 - 1.0), when reported
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<AnalysisResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ========================================
// Tests
// ========================================
