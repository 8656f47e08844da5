//! Configuration Module
//!
//! Environment-driven configuration for the streaming client.

mod settings;

pub use settings::{
    ClientConfig, ConfigError, Credentials, DEFAULT_API_BASE_URL, DEFAULT_FEED_CHANNEL,
    StreamSettings,
};
