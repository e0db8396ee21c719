//! Process configuration read from the environment (after `.env`).

use std::env;
use std::str::FromStr;

use chrono::Duration;
use thiserror::Error;

use crate::identity::SessionPolicy;

const DEFAULT_SERVER_ADDRESS: &str = "0.0.0.0:8080";
const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_SESSION_TTL_MINUTES: i64 = 60;
const DEFAULT_REMEMBER_TTL_MINUTES: i64 = 24 * 60;
/// Ten years.
pub const MAX_TTL_MINUTES: i64 = 10 * 366 * 24 * 60;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} must be a number, got {value:?}")]
    InvalidNumber { name: &'static str, value: String },

    #[error("{0} must be positive")]
    NotPositive(&'static str),

    #[error("{0} is larger than {MAX_TTL_MINUTES} minutes")]
    OutOfRange(&'static str),

    #[error("SEED_USER is set but SEED_PASSWORD is missing")]
    MissingSeedPassword,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedUser {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// `None` runs against the in-memory stores.
    pub database_url: Option<String>,
    pub server_address: String,
    pub max_connections: u32,
    pub sessions: SessionPolicy,
    pub seed_user: Option<SeedUser>,
}

impl AppConfig {
    /// # Errors
    ///
    /// Returns [`ConfigError`] for malformed numeric settings or a seed user
    /// without a password.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// See [`Self::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let database_url = lookup("DATABASE_URL").filter(|url| !url.trim().is_empty());
        let server_address =
            lookup("SERVER_ADDRESS").unwrap_or_else(|| DEFAULT_SERVER_ADDRESS.to_owned());
        let max_connections =
            positive(&lookup, "DATABASE_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS)?;
        let ttl = ttl_minutes(&lookup, "SESSION_TTL_MINUTES", DEFAULT_SESSION_TTL_MINUTES)?;
        let remember_ttl = ttl_minutes(
            &lookup,
            "SESSION_REMEMBER_TTL_MINUTES",
            DEFAULT_REMEMBER_TTL_MINUTES,
        )?;

        let seed_user = match (lookup("SEED_USER"), lookup("SEED_PASSWORD")) {
            (Some(username), Some(password)) => Some(SeedUser { username, password }),
            (Some(_), None) => return Err(ConfigError::MissingSeedPassword),
            (None, _) => None,
        };

        Ok(Self {
            database_url,
            server_address,
            max_connections,
            sessions: SessionPolicy {
                ttl,
                remember_ttl,
            },
            seed_user,
        })
    }
}

fn ttl_minutes(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: i64,
) -> Result<Duration, ConfigError> {
    let minutes = positive(lookup, name, default)?;
    if minutes > MAX_TTL_MINUTES {
        return Err(ConfigError::OutOfRange(name));
    }
    Duration::try_minutes(minutes).ok_or(ConfigError::OutOfRange(name))
}

fn positive<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr + PartialOrd + Default,
{
    let Some(raw) = lookup(name) else {
        return Ok(default);
    };
    let value: T = raw.trim().parse().map_err(|_| ConfigError::InvalidNumber {
        name,
        value: raw.clone(),
    })?;
    if value <= T::default() {
        return Err(ConfigError::NotPositive(name));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        AppConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_without_database_use_memory() {
        let config = config_from(&[]).expect("defaults are valid");

        assert_eq!(config.database_url, None);
        assert_eq!(config.server_address, "0.0.0.0:8080");
        assert_eq!(config.max_connections, 5);
        assert_eq!(config.sessions, SessionPolicy::default());
        assert_eq!(config.seed_user, None);
    }

    #[test]
    fn reads_overrides() {
        let config = config_from(&[
            ("DATABASE_URL", "mysql://tracker@localhost/tracker"),
            ("SESSION_TTL_MINUTES", "30"),
            ("SESSION_REMEMBER_TTL_MINUTES", "14400"),
            ("SEED_USER", "test"),
            ("SEED_PASSWORD", "test"),
        ])
        .expect("valid config");

        assert_eq!(
            config.database_url.as_deref(),
            Some("mysql://tracker@localhost/tracker")
        );
        assert_eq!(config.sessions.ttl, Duration::minutes(30));
        assert_eq!(config.sessions.remember_ttl, Duration::days(10));
        assert!(config.seed_user.is_some());
    }

    #[test]
    fn rejects_malformed_numbers() {
        assert!(matches!(
            config_from(&[("DATABASE_MAX_CONNECTIONS", "many")]),
            Err(ConfigError::InvalidNumber { .. })
        ));
        assert_eq!(
            config_from(&[("SESSION_TTL_MINUTES", "0")]),
            Err(ConfigError::NotPositive("SESSION_TTL_MINUTES"))
        );
    }

    #[test]
    fn rejects_lifetimes_past_the_cap() {
        assert_eq!(
            config_from(&[("SESSION_TTL_MINUTES", "9223372036854775807")]),
            Err(ConfigError::OutOfRange("SESSION_TTL_MINUTES"))
        );
        assert_eq!(
            config_from(&[("SESSION_REMEMBER_TTL_MINUTES", "5270401")]),
            Err(ConfigError::OutOfRange("SESSION_REMEMBER_TTL_MINUTES"))
        );
        let config = config_from(&[("SESSION_REMEMBER_TTL_MINUTES", "5270400")])
            .expect("ten years is allowed");
        assert_eq!(config.sessions.remember_ttl, Duration::minutes(MAX_TTL_MINUTES));
    }

    #[test]
    fn seed_user_needs_password() {
        assert_eq!(
            config_from(&[("SEED_USER", "test")]),
            Err(ConfigError::MissingSeedPassword)
        );
    }
}
