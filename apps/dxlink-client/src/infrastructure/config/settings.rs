//! Configuration
//!
//! Environment-driven configuration for the streaming client. Values
//! come from environment variables (optionally loaded from a `.env`
//! file by the binary) with defaults suitable for the production API.

use std::env;
use std::time::Duration;

use chrono::Duration as ChronoDuration;
use thiserror::Error;

use crate::domain::market_data::DEFAULT_CANDLE_CAPACITY;

/// Default REST API base URL.
pub const DEFAULT_API_BASE_URL: &str = "https://api.tastyworks.com";

/// Feed channel id requested during the handshake.
pub const DEFAULT_FEED_CHANNEL: u64 = 3;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    MissingVar(&'static str),

    /// An environment variable failed to parse.
    #[error("invalid value for {var}: {message}")]
    InvalidVar {
        /// Variable name.
        var: &'static str,
        /// Parse failure description.
        message: String,
    },
}

// =============================================================================
// Credentials
// =============================================================================

/// REST session credentials.
///
/// The Debug implementation redacts the token so it cannot leak into
/// logs.
#[derive(Clone)]
pub struct Credentials {
    session_token: String,
}

impl Credentials {
    /// Wrap a session token.
    #[must_use]
    pub fn new(session_token: impl Into<String>) -> Self {
        Self {
            session_token: session_token.into(),
        }
    }

    /// The raw session token.
    #[must_use]
    pub fn session_token(&self) -> &str {
        &self.session_token
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("session_token", &"***")
            .finish()
    }
}

// =============================================================================
// Stream Settings
// =============================================================================

/// Tunables for the streaming connection.
#[derive(Debug, Clone)]
pub struct StreamSettings {
    /// Feed channel id requested during the handshake.
    pub feed_channel: u64,
    /// Interval between outbound KEEPALIVE frames.
    pub keepalive_interval: Duration,
    /// How long the handshake may take before connect fails.
    pub handshake_timeout: Duration,
    /// Candle history lookback used for `fromTime`.
    pub candle_history: ChronoDuration,
    /// Candles retained per symbol.
    pub candle_capacity: usize,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            feed_channel: DEFAULT_FEED_CHANNEL,
            keepalive_interval: Duration::from_secs(30),
            handshake_timeout: Duration::from_secs(30),
            candle_history: ChronoDuration::hours(24),
            candle_capacity: DEFAULT_CANDLE_CAPACITY,
        }
    }
}

// =============================================================================
// Client Config
// =============================================================================

/// Full configuration for the streaming client binary.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// REST API base URL.
    pub api_base_url: String,
    /// REST session credentials.
    pub credentials: Credentials,
    /// Streaming connection tunables.
    pub stream: StreamSettings,
}

impl ClientConfig {
    /// Load configuration from the environment.
    ///
    /// `TASTY_SESSION_TOKEN` is required; everything else falls back to
    /// defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the session token is missing or a
    /// numeric override fails to parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        let session_token = env::var("TASTY_SESSION_TOKEN")
            .map_err(|_| ConfigError::MissingVar("TASTY_SESSION_TOKEN"))?;

        let api_base_url = env::var("TASTY_API_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_API_BASE_URL.to_string());

        let stream = StreamSettings {
            feed_channel: parse_env_u64("DXLINK_FEED_CHANNEL", DEFAULT_FEED_CHANNEL)?,
            keepalive_interval: parse_env_duration_secs("DXLINK_KEEPALIVE_INTERVAL_SECS", 30)?,
            handshake_timeout: parse_env_duration_secs("DXLINK_HANDSHAKE_TIMEOUT_SECS", 30)?,
            candle_history: ChronoDuration::hours(i64::try_from(parse_env_u64(
                "DXLINK_CANDLE_HISTORY_HOURS",
                24,
            )?)
            .unwrap_or(24)),
            candle_capacity: usize::try_from(parse_env_u64(
                "DXLINK_CANDLE_CAPACITY",
                DEFAULT_CANDLE_CAPACITY as u64,
            )?)
            .unwrap_or(DEFAULT_CANDLE_CAPACITY),
        };

        Ok(Self {
            api_base_url,
            credentials: Credentials::new(session_token),
            stream,
        })
    }
}

fn parse_env_u64(var: &'static str, default: u64) -> Result<u64, ConfigError> {
    match env::var(var) {
        Ok(value) => value.parse().map_err(|err: std::num::ParseIntError| {
            ConfigError::InvalidVar {
                var,
                message: err.to_string(),
            }
        }),
        Err(_) => Ok(default),
    }
}

fn parse_env_duration_secs(var: &'static str, default_secs: u64) -> Result<Duration, ConfigError> {
    Ok(Duration::from_secs(parse_env_u64(var, default_secs)?))
}
