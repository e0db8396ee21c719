use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::MySqlPool;

use super::{IdentityError, IdentityResult, IdentityStore};
use crate::models::{session::Session, user::User};
use crate::tracker::UserId;

#[derive(Debug, Clone)]
pub struct MySqlIdentityStore {
    pool: MySqlPool,
}

impl MySqlIdentityStore {
    #[must_use]
    pub const fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IdentityStore for MySqlIdentityStore {
    async fn insert_user(&self, username: &str, password_hash: &str) -> IdentityResult<UserId> {
        let result = sqlx::query("INSERT INTO Users_ (user_name, password_hash) VALUES (?, ?)")
            .bind(username)
            .bind(password_hash)
            .execute(&self.pool)
            .await;

        match result {
            Ok(done) => UserId::try_from(done.last_insert_id()).map_err(IdentityError::persistence),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(IdentityError::DuplicateUser(username.to_owned()))
            }
            Err(e) => Err(IdentityError::persistence(e)),
        }
    }

    async fn find_user_by_name(&self, username: &str) -> IdentityResult<Option<User>> {
        sqlx::query_as::<_, User>(
            "SELECT user_id, user_name, password_hash FROM Users_ WHERE user_name = ?",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(IdentityError::persistence)
    }

    async fn find_user(&self, user_id: UserId) -> IdentityResult<Option<User>> {
        sqlx::query_as::<_, User>(
            "SELECT user_id, user_name, password_hash FROM Users_ WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(IdentityError::persistence)
    }

    async fn insert_session(&self, session: &Session) -> IdentityResult<()> {
        sqlx::query(
            "INSERT INTO Sessions_ (session_id, user_id, expires_at, is_persistent) VALUES (?, ?, ?, ?)",
        )
        .bind(&session.session_id)
        .bind(session.user_id)
        .bind(session.expires_at)
        .bind(session.is_persistent)
        .execute(&self.pool)
        .await
        .map_err(IdentityError::persistence)?;
        Ok(())
    }

    async fn find_session(&self, session_id: &str) -> IdentityResult<Option<Session>> {
        sqlx::query_as::<_, Session>(
            "SELECT session_id, user_id, expires_at, is_persistent FROM Sessions_ WHERE session_id = ?",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(IdentityError::persistence)
    }

    async fn delete_session(&self, session_id: &str) -> IdentityResult<bool> {
        let done = sqlx::query("DELETE FROM Sessions_ WHERE session_id = ?")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(IdentityError::persistence)?;
        Ok(done.rows_affected() > 0)
    }

    async fn delete_expired_sessions(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> IdentityResult<u64> {
        let done = sqlx::query("DELETE FROM Sessions_ WHERE user_id = ? AND expires_at <= ?")
            .bind(user_id)
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(IdentityError::persistence)?;
        Ok(done.rows_affected())
    }
}
