//! Users and opaque bearer sessions.
//!
//! A token is the id of a `Sessions_` row; verifying it is a lookup plus an
//! expiry check. [`service::AuthService`] owns password hashing and the TTL
//! policy, the [`IdentityStore`] port owns persistence.

pub mod memory;
pub mod mysql;
pub mod service;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::models::{session::Session, user::User};
use crate::tracker::UserId;

pub use service::{AuthService, LoginGrant, SessionPolicy};

/// The verified caller behind a bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub user_id: UserId,
    pub username: String,
}

pub type IdentityResult<T> = Result<T, IdentityError>;

#[derive(Debug, Clone, Error)]
pub enum IdentityError {
    #[error("{0}")]
    Validation(String),

    #[error("username {0} is already taken")]
    DuplicateUser(String),

    #[error("invalid credentials, could not log you in")]
    InvalidCredentials,

    /// Missing, unknown or expired token.
    #[error("authorization failed")]
    Unauthenticated,

    #[error("password hashing failed: {0}")]
    Hashing(String),

    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl IdentityError {
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}

impl From<bcrypt::BcryptError> for IdentityError {
    fn from(err: bcrypt::BcryptError) -> Self {
        Self::Hashing(err.to_string())
    }
}

#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// # Errors
    ///
    /// Returns [`IdentityError::DuplicateUser`] when the name is taken.
    async fn insert_user(&self, username: &str, password_hash: &str) -> IdentityResult<UserId>;

    async fn find_user_by_name(&self, username: &str) -> IdentityResult<Option<User>>;

    async fn find_user(&self, user_id: UserId) -> IdentityResult<Option<User>>;

    async fn insert_session(&self, session: &Session) -> IdentityResult<()>;

    async fn find_session(&self, session_id: &str) -> IdentityResult<Option<Session>>;

    /// Returns whether a session was removed.
    async fn delete_session(&self, session_id: &str) -> IdentityResult<bool>;

    /// Removes the user's sessions that expired at or before `now` and
    /// returns how many went.
    async fn delete_expired_sessions(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> IdentityResult<u64>;
}
