//! SketchCheck backend API
//!
//! [`SketchApi`] is the seam between the workflow controller and the network:
//! [`ApiClient`] implements it over HTTP, tests substitute in-process fakes.

mod client;

pub use client::ApiClient;

use std::path::Path;

use async_trait::async_trait;
use skc_common::api::{AnalysisResult, TaskStatus};

use crate::error::{ApiError, ApiResult};

/// Operations the workflow controller needs from the backend
#[async_trait]
pub trait SketchApi: Send + Sync {
    /// `POST /upload`
    async fn upload_file(&self, file: &UploadFile) -> ApiResult<UploadReceipt>;

    /// `GET /returnScore?task_id=<id>`
    async fn get_score(&self, task_id: &str) -> ApiResult<ScoreStatus>;

    /// `POST /api/auth/logout` with `token` as bearer, if any
    async fn notify_logout(&self, token: Option<String>) -> ApiResult<()>;

    /// Drop the local token, then notify the backend (best effort)
    async fn logout(&self) -> ApiResult<()>;
}

/// Accepted upload
#[derive(Debug, Clone, PartialEq)]
pub struct UploadReceipt {
    pub task_id: String,
    pub status: Option<TaskStatus>,
    pub message: Option<String>,
}

/// Outcome of a single score fetch
#[derive(Debug, Clone, PartialEq)]
pub enum ScoreStatus {
    Ready(AnalysisResult),
    /// Still being analysed; `progress` is a 0.0 - 1.0 fraction when reported
    Pending { progress: Option<f64> },
}

/// Image file prepared for upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub file_name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    /// Read an image from disk
    pub async fn from_path(path: impl AsRef<Path>) -> ApiResult<Self> {
        let path = path.as_ref();
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| {
                ApiError::Validation(format!("{} has no usable file name", path.display()))
            })?
            .to_string();

        let bytes = tokio::fs::read(path).await.map_err(|e| {
            ApiError::Validation(format!("Cannot read {}: {}", path.display(), e))
        })?;

        Self::from_bytes(file_name, bytes)
    }

    /// Wrap in-memory image bytes, sniffing the MIME type
    ///
    /// Content sniffing wins; the file extension is only consulted when the
    /// content is not recognised.
    pub fn from_bytes(file_name: impl Into<String>, bytes: Vec<u8>) -> ApiResult<Self> {
        let file_name = file_name.into();
        if bytes.is_empty() {
            return Err(ApiError::Validation(format!("{} is empty", file_name)));
        }

        let mime = match infer::get(&bytes) {
            Some(kind) if matches!(kind.matcher_type(), infer::MatcherType::Image) => {
                kind.mime_type().to_string()
            }
            Some(kind) => {
                return Err(ApiError::Validation(format!(
                    "{} is not an image ({})",
                    file_name,
                    kind.mime_type()
                )))
            }
            None => mime_from_extension(&file_name)
                .ok_or_else(|| {
                    ApiError::Validation(format!("{} is not a recognised image", file_name))
                })?
                .to_string(),
        };

        Ok(Self {
            file_name,
            mime,
            bytes,
        })
    }
}

fn mime_from_extension(file_name: &str) -> Option<&'static str> {
    let extension = Path::new(file_name)
        .extension()?
        .to_str()?
        .to_ascii_lowercase();
    match extension.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        "bmp" => Some("image/bmp"),
        "svg" => Some("image/svg+xml"),
        _ => None,
    }
}
