//! Server configuration loaded from environment variables.
//!
//! DESIGN
//! ======
//! `main` calls `dotenvy::dotenv()` first, then `ServerConfig::from_env()`.
//! Parsing goes through a lookup function so tests can feed a map instead of
//! mutating the process environment. Unparseable optional values fall back
//! to their defaults; only `DATABASE_URL` and `JWT_SECRET` are required.

use std::path::PathBuf;

use crate::game::Rules;

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_TOKEN_TTL_SECS: i64 = 3600;
const DEFAULT_MATCH_SIZE: usize = 2;
const DEFAULT_CLIENT_CHANNEL_CAPACITY: usize = 256;
const DEFAULT_SNAPSHOT_FLUSH_INTERVAL_MS: u64 = 500;

pub const MIN_MATCH_SIZE: usize = 2;
pub const MAX_MATCH_SIZE: usize = 4;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(&'static str),
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub database_url: String,
    pub db_max_connections: u32,
    pub jwt_secret: String,
    pub token_ttl_secs: i64,
    /// Game size used when a queue join names none.
    pub match_size: usize,
    /// Bounded outbound queue per websocket connection.
    pub client_channel_capacity: usize,
    pub snapshot_flush_interval_ms: u64,
    pub dev_routes: bool,
    pub board_path: Option<PathBuf>,
    pub rules: Rules,
}

impl ServerConfig {
    /// Load from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if `DATABASE_URL` or `JWT_SECRET` is unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using `lookup` to resolve each variable.
    ///
    /// # Errors
    ///
    /// Returns an error if `DATABASE_URL` or `JWT_SECRET` is missing or blank.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let required = |key: &'static str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::Missing(key))
        };
        let database_url = required("DATABASE_URL")?;
        let jwt_secret = required("JWT_SECRET")?;

        let defaults = Rules::default();
        let match_size = env_parse(&lookup, "MATCH_SIZE", DEFAULT_MATCH_SIZE);

        Ok(Self {
            port: env_parse(&lookup, "PORT", DEFAULT_PORT),
            database_url,
            db_max_connections: env_parse(&lookup, "DB_MAX_CONNECTIONS", DEFAULT_DB_MAX_CONNECTIONS),
            jwt_secret,
            token_ttl_secs: env_parse(&lookup, "TOKEN_TTL_SECS", DEFAULT_TOKEN_TTL_SECS),
            match_size: if (MIN_MATCH_SIZE..=MAX_MATCH_SIZE).contains(&match_size) {
                match_size
            } else {
                DEFAULT_MATCH_SIZE
            },
            client_channel_capacity: env_parse(&lookup, "CLIENT_CHANNEL_CAPACITY", DEFAULT_CLIENT_CHANNEL_CAPACITY)
                .max(1),
            snapshot_flush_interval_ms: env_parse(
                &lookup,
                "SNAPSHOT_FLUSH_INTERVAL_MS",
                DEFAULT_SNAPSHOT_FLUSH_INTERVAL_MS,
            ),
            dev_routes: env_bool(&lookup, "ENABLE_DEV_ROUTES"),
            board_path: lookup("BOARD_CONFIG")
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
            rules: Rules {
                starting_money: env_parse(&lookup, "STARTING_MONEY", defaults.starting_money),
                go_bonus: env_parse(&lookup, "GO_BONUS", defaults.go_bonus),
                jail_fine: env_parse(&lookup, "JAIL_FINE", defaults.jail_fine),
            },
        })
    }
}

fn env_parse<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    lookup(key)
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

fn env_bool(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> bool {
    lookup(key).is_some_and(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
