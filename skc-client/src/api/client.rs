//! HTTP client for the SketchCheck backend
//!
//! One `reqwest::Client` with a fixed base URL, request timeout and JSON
//! default headers. The stored bearer token is attached to every request.
//!
//! Response normalisation:
//! - non-2xx → [`ApiError::Server`]
//! - 2xx `{"success": false, "error": ...}` → [`ApiError::Server`]
//! - 2xx `{"success": true, "data": ...}` → `data` is unwrapped
//! - transport failure → [`ApiError::Network`]

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use skc_common::api::{
    AnalysisResult, AnalysisStatusResponse, AnalyzeResponse, ApiEnvelope, HealthResponse,
    TaskStatus,
};
use skc_common::config::ClientConfig;
use skc_common::storage::TokenStore;
use tracing::{debug, info, warn};

use super::{ScoreStatus, SketchApi, UploadFile, UploadReceipt};
use crate::error::{ApiError, ApiResult};

const USER_AGENT: &str = concat!("skc/", env!("CARGO_PKG_VERSION"));

/// SketchCheck REST client
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    tokens: TokenStore,
}

impl ApiClient {
    /// Client for a resolved configuration
    pub fn new(config: &ClientConfig, tokens: TokenStore) -> ApiResult<Self> {
        Self::with_base_url(config.api_base_url.clone(), config.timeout, tokens)
    }

    /// Client for an explicit base URL (no trailing slash)
    pub fn with_base_url(
        base_url: impl Into<String>,
        timeout: Duration,
        tokens: TokenStore,
    ) -> ApiResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Network(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            tokens,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Backend-hosted OAuth entry point; the user opens it in a browser
    pub fn start_google_login(&self) -> String {
        self.url("/api/auth/google")
    }

    /// `GET /health`
    pub async fn health(&self) -> ApiResult<HealthResponse> {
        let response = self.authorized(self.http.get(self.url("/health"))).send().await?;
        let (_, body) = read_body(response).await?;
        let health: HealthResponse = decode(body)?;
        debug!(status = %health.status, "Health check answered");
        Ok(health)
    }

    /// Attach `Authorization: Bearer <token>` when a token is stored
    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match self.tokens.get_token() {
            Ok(Some(token)) => request.bearer_auth(token),
            Ok(None) => request,
            Err(e) => {
                warn!("Token store unreadable, sending request without credentials: {}", e);
                request
            }
        }
    }
}

#[async_trait]
impl SketchApi for ApiClient {
    async fn upload_file(&self, file: &UploadFile) -> ApiResult<UploadReceipt> {
        let part = reqwest::multipart::Part::bytes(file.bytes.clone())
            .file_name(file.file_name.clone())
            .mime_str(&file.mime)
            .map_err(|e| ApiError::Validation(format!("Invalid MIME type {}: {}", file.mime, e)))?;
        let form = reqwest::multipart::Form::new().part("file", part);

        debug!(
            file_name = %file.file_name,
            mime = %file.mime,
            bytes = file.bytes.len(),
            "Uploading sketch"
        );

        let response = self
            .authorized(self.http.post(self.url("/upload")))
            .multipart(form)
            .send()
            .await?;
        let (_, body) = read_body(response).await?;
        let accepted: AnalyzeResponse = decode(body)?;

        if accepted.status == Some(TaskStatus::Failed) {
            return Err(ApiError::Server {
                status: StatusCode::OK.as_u16(),
                message: accepted
                    .message
                    .unwrap_or_else(|| "upload rejected".to_string()),
                body: None,
            });
        }

        let task_id = accepted
            .task_id
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| ApiError::Logic("upload response carried no task_id".to_string()))?;

        info!(task_id = %task_id, file_name = %file.file_name, "Upload accepted");
        Ok(UploadReceipt {
            task_id,
            status: accepted.status,
            message: accepted.message,
        })
    }

    async fn get_score(&self, task_id: &str) -> ApiResult<ScoreStatus> {
        let response = self
            .authorized(self.http.get(self.url("/returnScore")))
            .query(&[("task_id", task_id)])
            .send()
            .await?;
        let (status, body) = read_body(response).await?;

        if status == StatusCode::ACCEPTED {
            let progress = body.get("progress").and_then(Value::as_f64);
            debug!(task_id = %task_id, ?progress, "Score not ready (202)");
            return Ok(ScoreStatus::Pending { progress });
        }

        let result = match serde_json::from_value::<AnalysisStatusResponse>(body.clone()) {
            Ok(report) => {
                ensure_task(task_id, report.task_id.as_deref())?;
                match report.status {
                    s if s.is_in_progress() => {
                        debug!(task_id = %task_id, progress = ?report.progress, "Score not ready");
                        return Ok(ScoreStatus::Pending {
                            progress: report.progress,
                        });
                    }
                    TaskStatus::Failed => {
                        return Err(ApiError::Server {
                            status: status.as_u16(),
                            message: report
                                .error
                                .unwrap_or_else(|| "analysis failed".to_string()),
                            body: Some(body.to_string()),
                        });
                    }
                    _ => match report.result {
                        Some(result) => result,
                        None => decode::<AnalysisResult>(body)?,
                    },
                }
            }
            Err(_) => decode::<AnalysisResult>(body)?,
        };

        ensure_task(task_id, result.task_id.as_deref())?;
        info!(task_id = %task_id, score = result.score, "Score received");
        Ok(ScoreStatus::Ready(result))
    }

    async fn notify_logout(&self, token: Option<String>) -> ApiResult<()> {
        let mut request = self.http.post(self.url("/api/auth/logout"));
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        read_body(request.send().await?).await?;
        Ok(())
    }

    async fn logout(&self) -> ApiResult<()> {
        let token = match self.tokens.get_token() {
            Ok(token) => token,
            Err(e) => {
                warn!("Token store unreadable during logout: {}", e);
                None
            }
        };
        let removed = self.tokens.remove_token();

        if let Err(e) = self.notify_logout(token).await {
            warn!("Logout notification failed (local session already cleared): {}", e);
        }

        removed?;
        info!("Logged out");
        Ok(())
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

fn ensure_task(requested: &str, echoed: Option<&str>) -> ApiResult<()> {
    match echoed {
        Some(echoed) if echoed != requested => Err(ApiError::Logic(format!(
            "score response belongs to task {} (requested {})",
            echoed, requested
        ))),
        _ => Ok(()),
    }
}

/// Normalise a response into its JSON payload
async fn read_body(response: Response) -> ApiResult<(StatusCode, Value)> {
    let status = response.status();
    let text = response.text().await?;
    let parsed = if text.trim().is_empty() {
        Ok(Value::Null)
    } else {
        serde_json::from_str::<Value>(&text)
    };

    if !status.is_success() {
        let message = parsed
            .as_ref()
            .ok()
            .and_then(error_message)
            .unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string()
            });
        return Err(ApiError::Server {
            status: status.as_u16(),
            message,
            body: Some(text),
        });
    }

    let body = parsed?;
    match ApiEnvelope::detect(&body) {
        Some(envelope) if !envelope.success => Err(ApiError::Server {
            status: status.as_u16(),
            message: envelope
                .error
                .unwrap_or_else(|| "request failed".to_string()),
            body: Some(text),
        }),
        Some(ApiEnvelope {
            data: Some(data), ..
        }) => Ok((status, data)),
        // Flat success bodies carry their fields beside `success`
        _ => Ok((status, body)),
    }
}

/// Best error text from an error body (`error`, `message` or `detail`)
fn error_message(body: &Value) -> Option<String> {
    ["error", "message", "detail"]
        .iter()
        .filter_map(|key| body.get(*key))
        .find_map(|value| match value {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Object(obj) => obj
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string),
            _ => None,
        })
}

fn decode<T: DeserializeOwned>(body: Value) -> ApiResult<T> {
    Ok(serde_json::from_value(body)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_google_login_url() {
        let client = ApiClient::with_base_url(
            "https://sketchcheck.shop/",
            Duration::from_secs(10),
            TokenStore::in_memory(),
        )
        .unwrap();
        assert_eq!(
            client.start_google_login(),
            "https://sketchcheck.shop/api/auth/google"
        );
    }

    #[test]
    fn test_error_message_extraction() {
        assert_eq!(
            error_message(&json!({"error": "bad file"})).as_deref(),
            Some("bad file")
        );
        assert_eq!(
            error_message(&json!({"error": {"code": "X", "message": "nested"}})).as_deref(),
            Some("nested")
        );
        assert_eq!(
            error_message(&json!({"detail": "Not authenticated"})).as_deref(),
            Some("Not authenticated")
        );
        assert_eq!(error_message(&json!({"score": 1})), None);
    }

    #[test]
    fn test_task_mismatch_rejected() {
        assert!(ensure_task("t1", None).is_ok());
        assert!(ensure_task("t1", Some("t1")).is_ok());
        assert!(matches!(
            ensure_task("t1", Some("t2")),
            Err(ApiError::Logic(_))
        ));
    }
}
