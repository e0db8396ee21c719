//! Registration, login and token verification.

use std::sync::Arc;

use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::{DateTime, Duration, Utc};
use log::{info, warn};
use mockable::Clock;
use uuid::Uuid;

use super::{Identity, IdentityError, IdentityResult, IdentityStore};
use crate::models::session::Session;
use crate::tracker::UserId;

const MIN_PASSWORD_CHARS: usize = 4;

/// Token lifetimes: "remember me" logins get the long one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionPolicy {
    pub ttl: Duration,
    pub remember_ttl: Duration,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            ttl: Duration::hours(1),
            remember_ttl: Duration::days(1),
        }
    }
}

impl SessionPolicy {
    #[must_use]
    pub const fn ttl_for(&self, remember_me: bool) -> Duration {
        if remember_me {
            self.remember_ttl
        } else {
            self.ttl
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginGrant {
    pub token: String,
    pub identity: Identity,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn IdentityStore>,
    clock: Arc<dyn Clock + Send + Sync>,
    policy: SessionPolicy,
    hash_cost: u32,
}

impl AuthService {
    #[must_use]
    pub fn new(
        store: Arc<dyn IdentityStore>,
        clock: Arc<dyn Clock + Send + Sync>,
        policy: SessionPolicy,
    ) -> Self {
        Self {
            store,
            clock,
            policy,
            hash_cost: DEFAULT_COST,
        }
    }

    /// Overrides the bcrypt cost (tests use the minimum).
    #[must_use]
    pub const fn with_hash_cost(mut self, cost: u32) -> Self {
        self.hash_cost = cost;
        self
    }

    /// Registers a user with a bcrypt-hashed password.
    ///
    /// # Errors
    ///
    /// `Validation` for a blank name or short password, `DuplicateUser` when
    /// the name is taken.
    pub async fn register(&self, username: &str, password: &str) -> IdentityResult<Identity> {
        let username = checked_credentials(username, password)?;
        let password_hash = hash(password, self.hash_cost)?;
        let user_id = self.store.insert_user(username, &password_hash).await?;
        info!("User {} registered successfully", username);
        Ok(Identity {
            user_id,
            username: username.to_owned(),
        })
    }

    /// Registers `username` unless it already exists.
    ///
    /// # Errors
    ///
    /// See [`Self::register`].
    pub async fn ensure_user(&self, username: &str, password: &str) -> IdentityResult<()> {
        if self.store.find_user_by_name(username.trim()).await?.is_some() {
            return Ok(());
        }
        self.register(username, password).await.map(|_| ())
    }

    /// Checks the password and issues a token whose lifetime follows the
    /// session policy.
    ///
    /// # Errors
    ///
    /// `InvalidCredentials` for an unknown user or a wrong password.
    pub async fn login(
        &self,
        username: &str,
        password: &str,
        remember_me: bool,
    ) -> IdentityResult<LoginGrant> {
        let username = checked_credentials(username, password)?;
        let Some(user) = self.store.find_user_by_name(username).await? else {
            info!("Invalid username: {}", username);
            return Err(IdentityError::InvalidCredentials);
        };

        if !verify(password, &user.password_hash)? {
            info!("Invalid password for user: {}", username);
            return Err(IdentityError::InvalidCredentials);
        }

        let identity = Identity {
            user_id: user.user_id,
            username: user.user_name,
        };
        match self
            .store
            .delete_expired_sessions(identity.user_id, self.clock.utc())
            .await
        {
            Ok(0) => {}
            Ok(pruned) => info!("Pruned {} expired sessions for {}", pruned, identity.username),
            Err(e) => warn!("Failed to prune expired sessions: {}", e),
        }
        let session = self
            .issue_token(identity.user_id, self.policy.ttl_for(remember_me), remember_me)
            .await?;
        info!("User {} logged in successfully", identity.username);
        Ok(LoginGrant {
            token: session.session_id,
            identity,
            expires_at: session.expires_at,
        })
    }

    /// Stores a new session for `user_id` expiring after `ttl`.
    ///
    /// # Errors
    ///
    /// `Validation` when the expiry is past the representable range,
    /// `Persistence` when the session could not be stored.
    pub async fn issue_token(
        &self,
        user_id: UserId,
        ttl: Duration,
        persistent: bool,
    ) -> IdentityResult<Session> {
        let expires_at = self
            .clock
            .utc()
            .checked_add_signed(ttl)
            .ok_or_else(|| IdentityError::Validation("session lifetime is out of range".to_owned()))?;
        let session = Session {
            session_id: Uuid::new_v4().to_string(),
            user_id,
            expires_at,
            is_persistent: persistent,
        };
        self.store.insert_session(&session).await?;
        Ok(session)
    }

    /// Resolves a bearer token to its user. Expired sessions are removed.
    ///
    /// # Errors
    ///
    /// `Unauthenticated` for an unknown or expired token.
    pub async fn authenticate(&self, token: &str) -> IdentityResult<Identity> {
        let Some(session) = self.store.find_session(token).await? else {
            return Err(IdentityError::Unauthenticated);
        };

        if session.is_expired_at(self.clock.utc()) {
            if let Err(e) = self.store.delete_session(token).await {
                warn!("Failed to remove expired session: {}", e);
            }
            info!("Session expired for user {}", session.user_id);
            return Err(IdentityError::Unauthenticated);
        }

        let user = self
            .store
            .find_user(session.user_id)
            .await?
            .ok_or(IdentityError::Unauthenticated)?;
        Ok(Identity {
            user_id: user.user_id,
            username: user.user_name,
        })
    }

    /// # Errors
    ///
    /// `Unauthenticated` when the token names no session.
    pub async fn logout(&self, token: &str) -> IdentityResult<()> {
        if self.store.delete_session(token).await? {
            Ok(())
        } else {
            Err(IdentityError::Unauthenticated)
        }
    }
}

fn checked_credentials<'a>(username: &'a str, password: &str) -> IdentityResult<&'a str> {
    let username = username.trim();
    if username.is_empty() {
        return Err(IdentityError::Validation(
            "username must not be empty".to_owned(),
        ));
    }
    if password.trim().chars().count() < MIN_PASSWORD_CHARS {
        return Err(IdentityError::Validation(format!(
            "password must be at least {MIN_PASSWORD_CHARS} characters"
        )));
    }
    Ok(username)
}
