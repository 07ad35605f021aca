//! Session (auth) store
//!
//! Holds the current [`Session`] behind a shared lock and mirrors the bearer
//! token into the [`TokenStore`]. Every login and logout is announced on the
//! event bus as [`ClientEvent::SessionChanged`].

use std::sync::Arc;

use chrono::Utc;
use skc_common::api::decode_user;
use skc_common::storage::TokenStore;
use skc_common::{ClientEvent, EventBus, Session, User};
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::error::ApiResult;

/// Shared, injectable session state
#[derive(Clone)]
pub struct SessionStore {
    state: Arc<RwLock<Session>>,
    tokens: TokenStore,
    events: EventBus,
}

impl SessionStore {
    pub fn new(tokens: TokenStore, events: EventBus) -> Self {
        Self {
            state: Arc::new(RwLock::new(Session::default())),
            tokens,
            events,
        }
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    pub async fn snapshot(&self) -> Session {
        self.state.read().await.clone()
    }

    pub async fn is_authenticated(&self) -> bool {
        self.state.read().await.is_authenticated
    }

    pub async fn user(&self) -> Option<User> {
        self.state.read().await.user.clone()
    }

    /// Bearer token of the current session, falling back to storage
    pub async fn bearer(&self) -> Option<String> {
        if let Some(token) = self.state.read().await.token.clone() {
            return Some(token);
        }
        match self.tokens.get_token() {
            Ok(token) => token,
            Err(e) => {
                warn!("Token store unreadable: {}", e);
                None
            }
        }
    }

    /// Mark `user` as logged in
    ///
    /// A `token` is persisted before the in-memory session changes; `None`
    /// logs in without touching storage (offline demo and tests).
    pub async fn login(&self, user: User, token: Option<String>) -> ApiResult<()> {
        if let Some(token) = &token {
            self.tokens.set_token(token)?;
        }

        let user_id = user.id.clone();
        *self.state.write().await = Session::authenticated(user, token);

        info!(user_id = %user_id, "Session authenticated");
        self.events.emit_lossy(ClientEvent::SessionChanged {
            authenticated: true,
            user_id: Some(user_id),
            timestamp: Utc::now(),
        });
        Ok(())
    }

    /// Clear the session and the stored token
    pub async fn logout(&self) -> ApiResult<()> {
        let removed = self.tokens.remove_token();
        *self.state.write().await = Session::default();

        info!("Session cleared");
        self.events.emit_lossy(ClientEvent::SessionChanged {
            authenticated: false,
            user_id: None,
            timestamp: Utc::now(),
        });
        Ok(removed?)
    }

    /// Record an authentication error for display
    pub async fn set_error(&self, message: impl Into<String>) {
        self.state.write().await.error = Some(message.into());
    }

    /// Rebuild the session from a previously stored token
    ///
    /// A stored token whose payload cannot be decoded is discarded.
    pub async fn restore(&self) -> ApiResult<Option<User>> {
        let Some(token) = self.tokens.get_token()? else {
            return Ok(None);
        };

        match decode_user(&token) {
            Some(user) => {
                let user_id = user.id.clone();
                *self.state.write().await = Session::authenticated(user.clone(), Some(token));
                info!(user_id = %user_id, "Session restored from stored token");
                self.events.emit_lossy(ClientEvent::SessionChanged {
                    authenticated: true,
                    user_id: Some(user_id),
                    timestamp: Utc::now(),
                });
                Ok(Some(user))
            }
            None => {
                warn!("Stored token is not decodable, discarding it");
                self.tokens.remove_token()?;
                Ok(None)
            }
        }
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // {"sub":"42","name":"Mina","email":"mina@example.com"}
    const TOKEN: &str =
        "h.eyJzdWIiOiI0MiIsIm5hbWUiOiJNaW5hIiwiZW1haWwiOiJtaW5hQGV4YW1wbGUuY29tIn0.s";

    fn mina() -> User {
        User {
            id: "42".to_string(),
            email: "mina@example.com".to_string(),
            name: "Mina".to_string(),
            picture: None,
        }
    }

    #[tokio::test]
    async fn test_login_persists_token_and_emits() {
        let events = EventBus::new(8);
        let mut rx = events.subscribe();
        let store = SessionStore::new(TokenStore::in_memory(), events);

        store.login(mina(), Some(TOKEN.to_string())).await.unwrap();

        assert!(store.is_authenticated().await);
        assert_eq!(store.tokens().get_token().unwrap().as_deref(), Some(TOKEN));
        match rx.recv().await.unwrap() {
            ClientEvent::SessionChanged {
                authenticated,
                user_id,
                ..
            } => {
                assert!(authenticated);
                assert_eq!(user_id.as_deref(), Some("42"));
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_login_without_token_leaves_storage_alone() {
        let store = SessionStore::new(TokenStore::in_memory(), EventBus::default());
        store.login(mina(), None).await.unwrap();
        assert!(store.is_authenticated().await);
        assert_eq!(store.tokens().get_token().unwrap(), None);
    }

    #[tokio::test]
    async fn test_logout_clears_everything() {
        let store = SessionStore::new(TokenStore::in_memory(), EventBus::default());
        store.login(mina(), Some(TOKEN.to_string())).await.unwrap();

        store.logout().await.unwrap();

        assert_eq!(store.snapshot().await, Session::default());
        assert_eq!(store.tokens().get_token().unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_error_keeps_auth_state() {
        let store = SessionStore::new(TokenStore::in_memory(), EventBus::default());
        store.set_error("token missing").await;
        let session = store.snapshot().await;
        assert_eq!(session.error.as_deref(), Some("token missing"));
        assert!(!session.is_authenticated);
    }

    #[tokio::test]
    async fn test_restore_from_stored_token() {
        let tokens = TokenStore::in_memory();
        tokens.set_token(TOKEN).unwrap();
        let store = SessionStore::new(tokens, EventBus::default());

        let user = store.restore().await.unwrap();
        assert_eq!(user, Some(mina()));
        assert_eq!(store.snapshot().await.token.as_deref(), Some(TOKEN));
    }

    #[tokio::test]
    async fn test_restore_discards_garbage_token() {
        let tokens = TokenStore::in_memory();
        tokens.set_token("not-a-jwt").unwrap();
        let store = SessionStore::new(tokens.clone(), EventBus::default());

        assert_eq!(store.restore().await.unwrap(), None);
        assert!(!store.is_authenticated().await);
        assert_eq!(tokens.get_token().unwrap(), None);
    }
}
