//! skc-client library interface
//!
//! HTTP API client, session store, auth callback handling, completion
//! waiting and the workflow controller behind the `skc` binary.

pub mod api;
pub mod callback;
pub mod completion;
pub mod error;
pub mod report;
pub mod session;
pub mod workflow;

pub use crate::error::{ApiError, ApiResult};

use std::sync::Arc;

use skc_common::config::ClientConfig;
use skc_common::storage::TokenStore;
use skc_common::EventBus;

use crate::api::ApiClient;
use crate::completion::CompletionPolicy;
use crate::session::SessionStore;
use crate::workflow::WorkflowController;

/// Wired-up client components sharing one token store and event bus
#[derive(Clone)]
pub struct ClientContext {
    pub config: ClientConfig,
    pub events: EventBus,
    pub session: SessionStore,
    pub api: Arc<ApiClient>,
    pub workflow: WorkflowController,
}

impl ClientContext {
    /// Components backed by the configured token file
    pub fn new(config: ClientConfig) -> ApiResult<Self> {
        let tokens = TokenStore::file(&config.storage_path);
        Self::with_tokens(config, tokens)
    }

    pub fn with_tokens(config: ClientConfig, tokens: TokenStore) -> ApiResult<Self> {
        let events = EventBus::new(100);
        let session = SessionStore::new(tokens.clone(), events.clone());
        let api = Arc::new(ApiClient::new(&config, tokens)?);
        let workflow = WorkflowController::new(
            api.clone(),
            session.clone(),
            events.clone(),
            CompletionPolicy::from_config(&config.analysis),
        );

        Ok(Self {
            config,
            events,
            session,
            api,
            workflow,
        })
    }
}
