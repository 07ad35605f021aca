//! Scripted `SketchApi` for workflow tests

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use skc_client::api::{ScoreStatus, SketchApi, UploadFile, UploadReceipt};
use skc_client::{ApiError, ApiResult};
use skc_common::api::AnalysisResult;

/// Answers come from per-operation queues; an empty queue means success
/// with task `t1` for uploads and a pending answer for scores.
#[derive(Default)]
pub struct FakeApi {
    uploads: Mutex<VecDeque<ApiResult<UploadReceipt>>>,
    scores: Mutex<VecDeque<ApiResult<ScoreStatus>>>,
    fail_logout: bool,
    logout_delay: Option<Duration>,
    notified_tokens: Mutex<Vec<Option<String>>>,
    uploaded_files: Mutex<Vec<String>>,
    score_requests: Mutex<Vec<String>>,
    logout_calls: AtomicU32,
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_upload(self, answer: ApiResult<UploadReceipt>) -> Self {
        self.uploads.lock().unwrap().push_back(answer);
        self
    }

    pub fn with_score(self, answer: ApiResult<ScoreStatus>) -> Self {
        self.scores.lock().unwrap().push_back(answer);
        self
    }

    pub fn with_failing_logout(mut self) -> Self {
        self.fail_logout = true;
        self
    }

    /// Backend logout takes `delay` before answering
    pub fn with_slow_logout(mut self, delay: Duration) -> Self {
        self.logout_delay = Some(delay);
        self
    }

    /// Bearer tokens sent with each logout notification
    pub fn notified_tokens(&self) -> Vec<Option<String>> {
        self.notified_tokens.lock().unwrap().clone()
    }

    pub fn uploaded_files(&self) -> Vec<String> {
        self.uploaded_files.lock().unwrap().clone()
    }

    pub fn score_requests(&self) -> Vec<String> {
        self.score_requests.lock().unwrap().clone()
    }

    pub fn logout_calls(&self) -> u32 {
        self.logout_calls.load(Ordering::SeqCst)
    }
}

pub fn receipt(task_id: &str) -> UploadReceipt {
    UploadReceipt {
        task_id: task_id.to_string(),
        status: None,
        message: None,
    }
}

pub fn ready(score: f64) -> ScoreStatus {
    ScoreStatus::Ready(AnalysisResult {
        task_id: None,
        score,
        rating: None,
        summary: None,
        issues: Vec::new(),
    })
}

#[async_trait]
impl SketchApi for FakeApi {
    async fn upload_file(&self, file: &UploadFile) -> ApiResult<UploadReceipt> {
        self.uploaded_files
            .lock()
            .unwrap()
            .push(file.file_name.clone());
        let answer = self.uploads.lock().unwrap().pop_front();
        answer.unwrap_or_else(|| Ok(receipt("t1")))
    }

    async fn get_score(&self, task_id: &str) -> ApiResult<ScoreStatus> {
        self.score_requests
            .lock()
            .unwrap()
            .push(task_id.to_string());
        let answer = self.scores.lock().unwrap().pop_front();
        answer.unwrap_or(Ok(ScoreStatus::Pending { progress: None }))
    }

    async fn notify_logout(&self, token: Option<String>) -> ApiResult<()> {
        self.logout_calls.fetch_add(1, Ordering::SeqCst);
        self.notified_tokens.lock().unwrap().push(token);
        if let Some(delay) = self.logout_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_logout {
            Err(ApiError::Network("connection refused".to_string()))
        } else {
            Ok(())
        }
    }

    async fn logout(&self) -> ApiResult<()> {
        self.logout_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_logout {
            Err(ApiError::Network("connection refused".to_string()))
        } else {
            Ok(())
        }
    }
}
