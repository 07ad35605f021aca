//! API module for shared scoring-service functionality
//!
//! # Design Principle
//!
//! This module contains ONLY:
//! - Pure functions (no HTTP client dependencies)
//! - Shared wire types
//!
//! The HTTP client itself lives in `skc-client`.

pub mod auth;
pub mod types;

pub use auth::{decode_claims, decode_user, user_from_claims};
pub use types::{
    AnalysisResult, AnalysisStatusResponse, AnalyzeResponse, ApiEnvelope, HealthResponse, Issue,
    Rating, Severity, TaskStatus,
};
