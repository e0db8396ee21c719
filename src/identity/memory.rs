//! In-memory users and sessions.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{IdentityError, IdentityResult, IdentityStore};
use crate::models::{session::Session, user::User};
use crate::tracker::UserId;

#[derive(Debug, Clone, Default)]
pub struct InMemoryIdentityStore {
    state: Arc<RwLock<IdentityState>>,
}

#[derive(Debug, Default)]
struct IdentityState {
    next_user_id: UserId,
    users: HashMap<UserId, User>,
    sessions: HashMap<String, Session>,
}

fn lock_error(err: impl ToString) -> IdentityError {
    IdentityError::persistence(std::io::Error::other(err.to_string()))
}

impl InMemoryIdentityStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IdentityStore for InMemoryIdentityStore {
    async fn insert_user(&self, username: &str, password_hash: &str) -> IdentityResult<UserId> {
        let mut state = self.state.write().map_err(lock_error)?;
        if state.users.values().any(|u| u.user_name == username) {
            return Err(IdentityError::DuplicateUser(username.to_owned()));
        }
        state.next_user_id += 1;
        let user_id = state.next_user_id;
        state.users.insert(
            user_id,
            User {
                user_id,
                user_name: username.to_owned(),
                password_hash: password_hash.to_owned(),
            },
        );
        Ok(user_id)
    }

    async fn find_user_by_name(&self, username: &str) -> IdentityResult<Option<User>> {
        let state = self.state.read().map_err(lock_error)?;
        Ok(state.users.values().find(|u| u.user_name == username).cloned())
    }

    async fn find_user(&self, user_id: UserId) -> IdentityResult<Option<User>> {
        let state = self.state.read().map_err(lock_error)?;
        Ok(state.users.get(&user_id).cloned())
    }

    async fn insert_session(&self, session: &Session) -> IdentityResult<()> {
        let mut state = self.state.write().map_err(lock_error)?;
        state
            .sessions
            .insert(session.session_id.clone(), session.clone());
        Ok(())
    }

    async fn find_session(&self, session_id: &str) -> IdentityResult<Option<Session>> {
        let state = self.state.read().map_err(lock_error)?;
        Ok(state.sessions.get(session_id).cloned())
    }

    async fn delete_session(&self, session_id: &str) -> IdentityResult<bool> {
        let mut state = self.state.write().map_err(lock_error)?;
        Ok(state.sessions.remove(session_id).is_some())
    }

    async fn delete_expired_sessions(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> IdentityResult<u64> {
        let mut state = self.state.write().map_err(lock_error)?;
        let before = state.sessions.len();
        state
            .sessions
            .retain(|_, s| s.user_id != user_id || !s.is_expired_at(now));
        Ok((before - state.sessions.len()) as u64)
    }
}
