//! Workflow controller
//!
//! Four-state flow driving one sketch at a time:
//!
//! ```text
//! Login --login--> Upload --submit--> Analyzing --score--> Results
//!                    ^                    |                   |
//!                    +------ failure -----+                   |
//!                    +------------------ reset ---------------+
//! any --logout--> Login
//! ```
//!
//! Only one run may be in flight. `reset` and `logout` cancel the pending
//! wait and bump a generation counter; a run whose generation is no longer
//! current never writes state, history or errors.

use std::sync::Arc;

use chrono::Utc;
use skc_common::api::AnalysisResult;
use skc_common::time::now;
use skc_common::{ClientEvent, EventBus, UploadTask, WorkflowState};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::api::{SketchApi, UploadFile};
use crate::completion::{wait_for_result, CompletionPolicy};
use crate::error::{ApiError, ApiResult};
use crate::session::SessionStore;

/// User-facing message for a failed upload
pub const UPLOAD_FAILED: &str = "Upload failed";
/// User-facing message for a failed score fetch
pub const SCORE_FAILED: &str = "Failed to get score";

struct ActiveRun {
    run_id: Uuid,
    cancel: CancellationToken,
}

struct Inner {
    state: WorkflowState,
    run: Option<ActiveRun>,
    task_id: Option<String>,
    error: Option<String>,
    history: Vec<UploadTask>,
    last_result: Option<AnalysisResult>,
    generation: u64,
}

impl Inner {
    fn cancel_run(&mut self) {
        if let Some(run) = self.run.take() {
            run.cancel.cancel();
            info!(run_id = %run.run_id, "Pending analysis cancelled");
        }
        self.generation += 1;
    }
}

/// Point-in-time view of the controller
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowSnapshot {
    pub state: WorkflowState,
    pub task_id: Option<String>,
    pub error: Option<String>,
    /// Most recent first
    pub history: Vec<UploadTask>,
    pub last_result: Option<AnalysisResult>,
}

/// Upload → wait → score orchestrator
#[derive(Clone)]
pub struct WorkflowController {
    api: Arc<dyn SketchApi>,
    session: SessionStore,
    events: EventBus,
    policy: CompletionPolicy,
    inner: Arc<Mutex<Inner>>,
}

impl WorkflowController {
    pub fn new(
        api: Arc<dyn SketchApi>,
        session: SessionStore,
        events: EventBus,
        policy: CompletionPolicy,
    ) -> Self {
        Self {
            api,
            session,
            events,
            policy,
            inner: Arc::new(Mutex::new(Inner {
                state: WorkflowState::Login,
                run: None,
                task_id: None,
                error: None,
                history: Vec::new(),
                last_result: None,
                generation: 0,
            })),
        }
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    pub fn policy(&self) -> &CompletionPolicy {
        &self.policy
    }

    pub async fn snapshot(&self) -> WorkflowSnapshot {
        let inner = self.inner.lock().await;
        WorkflowSnapshot {
            state: inner.state,
            task_id: inner.task_id.clone(),
            error: inner.error.clone(),
            history: inner.history.clone(),
            last_result: inner.last_result.clone(),
        }
    }

    pub async fn state(&self) -> WorkflowState {
        self.inner.lock().await.state
    }

    pub async fn history(&self) -> Vec<UploadTask> {
        self.inner.lock().await.history.clone()
    }

    /// `Login → Upload` once the session is authenticated
    pub async fn login_succeeded(&self) -> ApiResult<()> {
        if !self.session.is_authenticated().await {
            return Err(ApiError::Logic("session is not authenticated".to_string()));
        }

        let mut inner = self.inner.lock().await;
        if inner.state == WorkflowState::Login {
            inner.error = None;
            self.transition(&mut inner, None, WorkflowState::Upload);
        }
        Ok(())
    }

    /// Upload `file`, wait for its analysis and record the score
    ///
    /// Allowed only from `Upload` with an authenticated session. On failure
    /// the controller returns to `Upload` with its error set and the history
    /// untouched. A run overtaken by `reset` or `logout` returns
    /// [`ApiError::Cancelled`].
    pub async fn submit(&self, file: UploadFile) -> ApiResult<UploadTask> {
        if !self.session.is_authenticated().await {
            return Err(ApiError::Logic("log in before uploading".to_string()));
        }

        let (run_id, generation, cancel) = {
            let mut inner = self.inner.lock().await;
            match inner.state {
                WorkflowState::Upload => {}
                WorkflowState::Analyzing => {
                    return Err(ApiError::Logic(
                        "an analysis is already in progress".to_string(),
                    ))
                }
                other => {
                    return Err(ApiError::Logic(format!(
                        "cannot upload from the {} state",
                        other
                    )))
                }
            }

            inner.generation += 1;
            let run_id = Uuid::new_v4();
            let cancel = CancellationToken::new();
            inner.run = Some(ActiveRun {
                run_id,
                cancel: cancel.clone(),
            });
            inner.task_id = None;
            inner.error = None;
            self.transition(&mut inner, Some(run_id), WorkflowState::Analyzing);
            (run_id, inner.generation, cancel)
        };

        info!(run_id = %run_id, file_name = %file.file_name, "Submitting sketch");

        let uploaded = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ApiError::Cancelled),
            receipt = self.api.upload_file(&file) => receipt,
        };
        let receipt = match uploaded {
            Ok(receipt) => receipt,
            Err(e) => return Err(self.fail(generation, run_id, UPLOAD_FAILED, e).await),
        };
        let task_id = receipt.task_id;

        {
            let mut inner = self.inner.lock().await;
            if inner.generation != generation {
                return Err(ApiError::Cancelled);
            }
            inner.task_id = Some(task_id.clone());
        }
        self.events.emit_lossy(ClientEvent::UploadAccepted {
            run_id,
            task_id: task_id.clone(),
            file_name: file.file_name.clone(),
            timestamp: Utc::now(),
        });

        let events = self.events.clone();
        let pending_task = task_id.clone();
        let waited = wait_for_result(
            &self.policy,
            self.api.as_ref(),
            &task_id,
            &cancel,
            move |attempt, progress| {
                events.emit_lossy(ClientEvent::AnalysisPending {
                    run_id,
                    task_id: pending_task.clone(),
                    attempt,
                    progress,
                    timestamp: Utc::now(),
                })
            },
        )
        .await;
        let result = match waited {
            Ok(result) => result,
            Err(e) => return Err(self.fail(generation, run_id, SCORE_FAILED, e).await),
        };

        let mut inner = self.inner.lock().await;
        if inner.generation != generation {
            return Err(ApiError::Cancelled);
        }

        let task = UploadTask {
            task_id: task_id.clone(),
            file_name: file.file_name,
            upload_date: now(),
            score: result.score,
        };
        inner.history.insert(0, task.clone());
        inner.last_result = Some(result);
        inner.run = None;
        self.transition(&mut inner, Some(run_id), WorkflowState::Results);

        info!(run_id = %run_id, task_id = %task_id, score = task.score, "Analysis complete");
        self.events.emit_lossy(ClientEvent::ScoreReceived {
            run_id,
            task_id,
            score: task.score,
            timestamp: Utc::now(),
        });
        Ok(task)
    }

    /// Back to `Upload` from any state, discarding any pending run
    pub async fn reset(&self) {
        let mut inner = self.inner.lock().await;
        inner.cancel_run();
        inner.task_id = None;
        inner.error = None;
        inner.last_result = None;
        if inner.state != WorkflowState::Upload {
            self.transition(&mut inner, None, WorkflowState::Upload);
        }
    }

    /// Cancel any pending run, clear local state and end the session
    ///
    /// The local session and token are gone before the backend is notified;
    /// a failed notification is only logged.
    pub async fn logout(&self) -> ApiResult<()> {
        {
            let mut inner = self.inner.lock().await;
            inner.cancel_run();
            inner.task_id = None;
            inner.error = None;
            inner.last_result = None;
            inner.history.clear();
            if inner.state != WorkflowState::Login {
                self.transition(&mut inner, None, WorkflowState::Login);
            }
        }

        let token = self.session.bearer().await;
        let cleared = self.session.logout().await;

        if let Err(e) = self.api.notify_logout(token).await {
            warn!("Backend logout reported an error: {}", e);
        }
        cleared
    }

    /// Record a failed run and return to `Upload`
    ///
    /// Stale runs and cancellations leave state alone.
    async fn fail(
        &self,
        generation: u64,
        run_id: Uuid,
        message: &str,
        err: ApiError,
    ) -> ApiError {
        if matches!(err, ApiError::Cancelled) {
            return err;
        }

        let mut inner = self.inner.lock().await;
        if inner.generation != generation {
            return ApiError::Cancelled;
        }

        error!(run_id = %run_id, task_id = ?inner.task_id, "{}: {}", message, err);
        inner.error = Some(message.to_string());
        inner.run = None;
        self.transition(&mut inner, Some(run_id), WorkflowState::Upload);

        self.events.emit_lossy(ClientEvent::WorkflowFailed {
            run_id: Some(run_id),
            message: message.to_string(),
            detail: err.to_string(),
            timestamp: Utc::now(),
        });
        err
    }

    fn transition(&self, inner: &mut Inner, run_id: Option<Uuid>, new_state: WorkflowState) {
        let old_state = inner.state;
        inner.state = new_state;
        info!(%old_state, %new_state, "Workflow state changed");
        self.events.emit_lossy(ClientEvent::WorkflowStateChanged {
            run_id,
            old_state,
            new_state,
            timestamp: Utc::now(),
        });
    }
}

impl std::fmt::Debug for WorkflowController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowController")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
