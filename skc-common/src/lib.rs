//! # SketchCheck Common Library
//!
//! Shared code for the SketchCheck client crates including:
//! - Session, user and analysis data model
//! - API request/response types
//! - Access token storage and JWT payload decoding
//! - Client event types (ClientEvent enum) and the event bus
//! - Configuration loading

pub mod api;
pub mod config;
pub mod error;
pub mod events;
pub mod models;
pub mod storage;
pub mod time;

pub use error::{Error, Result};
pub use events::{ClientEvent, EventBus};
pub use models::{Session, UploadTask, User, WorkflowState};
