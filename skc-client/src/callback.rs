//! OAuth redirect processing
//!
//! The backend finishes the Google OAuth exchange and redirects the browser
//! to a callback URL carrying either `?token=<jwt>` or `?error=<reason>`.
//! [`AuthCallback`] turns that URL into a logged-in session.
//!
//! Status moves `Loading → Success` or `Loading → Error(message)`; both end
//! states are terminal. The outcome is returned after a short pause (1 s on
//! success, 3 s on failure) so a front end can show the status first.

use std::time::Duration;

use reqwest::Url;
use skc_common::api::decode_user;
use skc_common::User;
use tokio::sync::watch;
use tracing::{error, info};

use crate::error::{ApiError, ApiResult};
use crate::session::SessionStore;

/// Pauses before the outcome is handed back
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallbackTimings {
    pub success_delay: Duration,
    pub error_delay: Duration,
}

impl Default for CallbackTimings {
    fn default() -> Self {
        Self {
            success_delay: Duration::from_millis(1000),
            error_delay: Duration::from_millis(3000),
        }
    }
}

/// Observable callback status
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackStatus {
    Loading,
    Success,
    Error(String),
}

/// Where the front end goes next
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
    /// Logged in; continue to the upload screen
    Success(User),
    /// Back to the login screen with this message
    Failed(String),
}

/// Query parameters the backend may put on the redirect
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallbackParams {
    pub token: Option<String>,
    pub error: Option<String>,
}

/// Extract `token` and `error` from a full redirect URL or a bare query string
///
/// # Examples
///
/// ```
/// use skc_client::callback::parse_callback_params;
///
/// let params = parse_callback_params("https://app.example/auth/callback?token=a.b.c").unwrap();
/// assert_eq!(params.token.as_deref(), Some("a.b.c"));
///
/// let params = parse_callback_params("?error=access_denied").unwrap();
/// assert_eq!(params.error.as_deref(), Some("access_denied"));
/// ```
pub fn parse_callback_params(input: &str) -> ApiResult<CallbackParams> {
    let input = input.trim();
    let url = if input.contains("://") {
        Url::parse(input)
    } else {
        Url::parse(&format!(
            "http://callback.invalid/?{}",
            input.trim_start_matches('?')
        ))
    }
    .map_err(|e| ApiError::Validation(format!("Unreadable callback URL: {}", e)))?;

    let mut params = CallbackParams::default();
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "token" if params.token.is_none() => params.token = Some(value.into_owned()),
            "error" if params.error.is_none() => params.error = Some(value.into_owned()),
            _ => {}
        }
    }
    Ok(params)
}

/// One-shot auth callback handler
pub struct AuthCallback {
    session: SessionStore,
    timings: CallbackTimings,
    status: watch::Sender<CallbackStatus>,
}

impl AuthCallback {
    pub fn new(session: SessionStore) -> Self {
        let (status, _) = watch::channel(CallbackStatus::Loading);
        Self {
            session,
            timings: CallbackTimings::default(),
            status,
        }
    }

    pub fn with_timings(mut self, timings: CallbackTimings) -> Self {
        self.timings = timings;
        self
    }

    pub fn subscribe(&self) -> watch::Receiver<CallbackStatus> {
        self.status.subscribe()
    }

    pub fn status(&self) -> CallbackStatus {
        self.status.borrow().clone()
    }

    /// Process a redirect URL (or its query string)
    pub async fn handle(&self, input: &str) -> CallbackOutcome {
        match self.authenticate(input).await {
            Ok(user) => {
                info!(user_id = %user.id, "OAuth callback accepted");
                self.status.send_replace(CallbackStatus::Success);
                tokio::time::sleep(self.timings.success_delay).await;
                CallbackOutcome::Success(user)
            }
            Err(message) => {
                error!("OAuth callback failed: {}", message);
                self.status
                    .send_replace(CallbackStatus::Error(message.clone()));
                self.session.set_error(message.clone()).await;
                tokio::time::sleep(self.timings.error_delay).await;
                CallbackOutcome::Failed(message)
            }
        }
    }

    async fn authenticate(&self, input: &str) -> Result<User, String> {
        let params = parse_callback_params(input).map_err(|e| e.to_string())?;

        if let Some(reason) = params.error.filter(|e| !e.is_empty()) {
            return Err(format!("OAuth Error: {}", reason));
        }

        let token = params
            .token
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| "token missing".to_string())?;

        // Decode before persisting so a bad token never reaches storage
        let user = decode_user(&token).ok_or_else(|| "invalid token".to_string())?;

        self.session
            .login(user.clone(), Some(token))
            .await
            .map_err(|e| format!("Failed to store token: {}", e))?;
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_url() {
        let params =
            parse_callback_params("http://localhost:5173/auth/callback?token=x.y.z&state=1")
                .unwrap();
        assert_eq!(params.token.as_deref(), Some("x.y.z"));
        assert_eq!(params.error, None);
    }

    #[test]
    fn test_parse_bare_query_decodes_percent_escapes() {
        let params = parse_callback_params("error=access%20denied").unwrap();
        assert_eq!(params.error.as_deref(), Some("access denied"));
        assert_eq!(params.token, None);
    }

    #[test]
    fn test_parse_rejects_garbage_url() {
        assert!(matches!(
            parse_callback_params("http://[::1"),
            Err(ApiError::Validation(_))
        ));
    }

    #[test]
    fn test_default_timings() {
        let timings = CallbackTimings::default();
        assert_eq!(timings.success_delay, Duration::from_secs(1));
        assert_eq!(timings.error_delay, Duration::from_secs(3));
    }
}
