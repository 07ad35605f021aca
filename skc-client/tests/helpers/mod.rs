//! Test Helper Utilities
//!
//! Shared utilities for testing skc-client

#![allow(dead_code)]

pub mod fake_api;
pub mod mock_backend;

// Re-export commonly used items
pub use fake_api::FakeApi;
pub use mock_backend::{client_for, spawn_backend, unreachable_base_url};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde_json::Value;
use skc_client::api::UploadFile;
use skc_client::session::SessionStore;
use skc_common::storage::TokenStore;
use skc_common::{EventBus, User};

/// Smallest byte string recognised as a PNG
pub const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR\0\0\0\x01\0\0\0\x01";

pub fn png_file(name: &str) -> UploadFile {
    UploadFile::from_bytes(name, PNG_BYTES.to_vec()).unwrap()
}

/// Unsigned JWT carrying `claims` as its payload
pub fn make_token(claims: &Value) -> String {
    let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(claims).unwrap());
    format!("eyJhbGciOiJIUzI1NiJ9.{}.signature", payload)
}

pub fn test_user() -> User {
    User {
        id: "u-1".to_string(),
        email: "alex@example.com".to_string(),
        name: "Alex Johnson".to_string(),
        picture: None,
    }
}

/// Session store already logged in as [`test_user`]
pub async fn authenticated_session(tokens: TokenStore, events: EventBus) -> SessionStore {
    let session = SessionStore::new(tokens, events);
    session
        .login(test_user(), Some("stored.test.token".to_string()))
        .await
        .unwrap();
    session
}
