use std::fmt::Display;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::catalog::{CardCatalog, CatalogError};
use crate::store::RetryPolicy;
use crate::types::GameConfig;

/// Process configuration, read once at startup
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    /// JSON deck to load instead of the built-in one
    pub cards_path: Option<PathBuf>,
    pub game: GameConfig,
    pub retry: RetryPolicy,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 4678)),
            cards_path: None,
            game: GameConfig::default(),
            retry: RetryPolicy::default(),
        }
    }
}

/// Parse `key` if set. Unparseable or rejected values fall back to `default`.
fn env_or<T>(key: &str, default: T, accept: impl Fn(&T) -> bool) -> T
where
    T: FromStr,
    T::Err: Display,
{
    let Ok(raw) = std::env::var(key) else {
        return default;
    };
    match raw.trim().parse::<T>() {
        Ok(value) if accept(&value) => value,
        Ok(_) => {
            tracing::warn!("{}={:?} is out of range, using default", key, raw);
            default
        }
        Err(e) => {
            tracing::warn!("Invalid {}={:?} ({}), using default", key, raw, e);
            default
        }
    }
}

impl ServerConfig {
    /// Load config from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let cards_path = std::env::var("IMPOSTER_CARDS")
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);

        let game = GameConfig {
            describe_seconds: env_or("DESCRIBE_SECONDS", defaults.game.describe_seconds, |s| *s > 0),
            vote_seconds: env_or("VOTE_SECONDS", defaults.game.vote_seconds, |s| *s > 0),
            max_description_chars: env_or(
                "MAX_DESCRIPTION_CHARS",
                defaults.game.max_description_chars,
                |n| *n > 0,
            ),
            expiry_policy: env_or("TIMER_EXPIRY_POLICY", defaults.game.expiry_policy, |_| true),
        };

        let retry = RetryPolicy {
            attempts: env_or("STORE_RETRY_ATTEMPTS", defaults.retry.attempts, |n| *n > 0),
            base_delay: Duration::from_millis(env_or(
                "STORE_RETRY_BASE_MS",
                defaults.retry.base_delay.as_millis() as u64,
                |_| true,
            )),
        };

        let config = Self {
            listen_addr: env_or("IMPOSTER_LISTEN_ADDR", defaults.listen_addr, |_| true),
            cards_path,
            game,
            retry,
        };

        tracing::info!(
            listen_addr = %config.listen_addr,
            describe_seconds = config.game.describe_seconds,
            vote_seconds = config.game.vote_seconds,
            expiry_policy = ?config.game.expiry_policy,
            "Server config loaded"
        );
        config
    }

    /// The configured deck, or the built-in one
    pub fn load_catalog(&self) -> Result<CardCatalog, CatalogError> {
        match &self.cards_path {
            Some(path) => {
                let catalog = CardCatalog::from_path(path)?;
                tracing::info!("Loaded {} cards from {}", catalog.len(), path.display());
                Ok(catalog)
            }
            None => Ok(CardCatalog::default()),
        }
    }
}
