//! In-process mock of the SketchCheck backend
//!
//! Each test builds an axum `Router` with the routes it needs and serves it
//! on an ephemeral localhost port.

use std::time::Duration;

use axum::Router;
use skc_client::api::ApiClient;
use skc_common::storage::TokenStore;

/// Serve `router` on `127.0.0.1:0` and return its base URL
pub async fn spawn_backend(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

/// Base URL of a port nothing listens on
pub async fn unreachable_base_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

pub fn client_for(base_url: &str, tokens: TokenStore) -> ApiClient {
    ApiClient::with_base_url(base_url, Duration::from_secs(5), tokens).unwrap()
}
