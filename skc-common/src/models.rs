//! Session and workflow data model
//!
//! Plain records shared by the session store, the workflow controller and the
//! event bus. None of these are persisted except the bearer token held by
//! [`Session::token`], which lives in [`crate::storage`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Authenticated user, derived from decoded token claims
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
}

impl User {
    /// Upper-cased first character of the display name
    pub fn initial(&self) -> char {
        display_initial(&self.name)
    }
}

/// Profile badge initial for a display name, `A` when the name is empty
pub fn display_initial(name: &str) -> char {
    name.chars()
        .next()
        .and_then(|c| c.to_uppercase().next())
        .unwrap_or('A')
}

/// Current authentication state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub user: Option<User>,
    pub is_authenticated: bool,
    pub token: Option<String>,
    /// Last authentication error, shown on the login screen
    pub error: Option<String>,
}

impl Session {
    /// Session for a freshly logged-in user
    pub fn authenticated(user: User, token: Option<String>) -> Self {
        Self {
            user: Some(user),
            is_authenticated: true,
            token,
            error: None,
        }
    }

    /// Profile badge initial for the session user
    pub fn initial(&self) -> char {
        self.user.as_ref().map(User::initial).unwrap_or('A')
    }
}

/// One analysed upload in the in-memory history (most recent first)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadTask {
    pub task_id: String,
    pub file_name: String,
    pub upload_date: DateTime<Utc>,
    pub score: f64,
}

/// Workflow controller state
///
/// `Analyzing` and `Results` are only reachable with an authenticated session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowState {
    /// Waiting for the user to authenticate
    Login,
    /// Ready to accept a file
    Upload,
    /// Upload accepted, waiting for the analysis result
    Analyzing,
    /// Score report available
    Results,
}

impl WorkflowState {
    /// Whether this state may only be shown to an authenticated user
    pub fn requires_auth(self) -> bool {
        matches!(self, WorkflowState::Analyzing | WorkflowState::Results)
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkflowState::Login => "login",
            WorkflowState::Upload => "upload",
            WorkflowState::Analyzing => "analyzing",
            WorkflowState::Results => "results",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(name: &str) -> User {
        User {
            id: "u1".to_string(),
            email: "alex@example.com".to_string(),
            name: name.to_string(),
            picture: None,
        }
    }

    #[test]
    fn test_display_initial() {
        assert_eq!(user("alex Johnson").initial(), 'A');
        assert_eq!(user("zoe").initial(), 'Z');
        assert_eq!(display_initial(""), 'A');
    }

    #[test]
    fn test_default_session_is_anonymous() {
        let session = Session::default();
        assert!(!session.is_authenticated);
        assert!(session.user.is_none());
        assert!(session.token.is_none());
        assert_eq!(session.initial(), 'A');
    }

    #[test]
    fn test_authenticated_session() {
        let session = Session::authenticated(user("Mina"), Some("tok".to_string()));
        assert!(session.is_authenticated);
        assert_eq!(session.initial(), 'M');
        assert_eq!(session.token.as_deref(), Some("tok"));
    }

    #[test]
    fn test_workflow_state_serialization() {
        let json = serde_json::to_string(&WorkflowState::Analyzing).unwrap();
        assert_eq!(json, "\"analyzing\"");
        assert_eq!(WorkflowState::Results.to_string(), "results");
        assert!(!WorkflowState::Login.requires_auth());
        assert!(!WorkflowState::Upload.requires_auth());
        assert!(WorkflowState::Results.requires_auth());
    }

    #[test]
    fn test_user_picture_omitted_when_absent() {
        let json = serde_json::to_string(&user("Mina")).unwrap();
        assert!(!json.contains("picture"));
    }
}
