//! Event types for the SketchCheck client event system
//!
//! The workflow controller and session store publish [`ClientEvent`]s on an
//! [`EventBus`]. Front ends subscribe to render progress and to surface
//! failure messages to the user.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::models::WorkflowState;

/// Client event types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    /// User logged in or out
    SessionChanged {
        authenticated: bool,
        user_id: Option<String>,
        timestamp: DateTime<Utc>,
    },

    /// Workflow controller moved between states
    WorkflowStateChanged {
        run_id: Option<Uuid>,
        old_state: WorkflowState,
        new_state: WorkflowState,
        timestamp: DateTime<Utc>,
    },

    /// Upload accepted by the backend
    UploadAccepted {
        run_id: Uuid,
        task_id: String,
        file_name: String,
        timestamp: DateTime<Utc>,
    },

    /// Score requested but the analysis is still running
    AnalysisPending {
        run_id: Uuid,
        task_id: String,
        attempt: u32,
        progress: Option<f64>,
        timestamp: DateTime<Utc>,
    },

    /// Analysis finished and the score was recorded in history
    ScoreReceived {
        run_id: Uuid,
        task_id: String,
        score: f64,
        timestamp: DateTime<Utc>,
    },

    /// User-facing failure; the workflow has returned to `upload`
    WorkflowFailed {
        run_id: Option<Uuid>,
        message: String,
        detail: String,
        timestamp: DateTime<Utc>,
    },
}

/// Broadcast bus for [`ClientEvent`]s
///
/// Cloning is cheap; all clones share the same channel.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ClientEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Examples
    ///
    /// ```
    /// use skc_common::events::EventBus;
    ///
    /// let event_bus = EventBus::new(64);
    /// assert_eq!(event_bus.capacity(), 64);
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: ClientEvent,
    ) -> Result<usize, broadcast::error::SendError<ClientEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: ClientEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(100)
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("capacity", &self.capacity)
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
