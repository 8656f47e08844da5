//! Instrument Lookup
//!
//! HTTP-backed [`SymbolResolver`] that maps a requested equity symbol
//! to its streamer-native form via
//! `GET {base}/instruments/equities/{symbol}`. Failures are reported to
//! the caller, which degrades to the literal symbol rather than
//! aborting a subscription batch.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::application::ports::{ResolverError, SymbolResolver};

#[derive(Debug, Deserialize)]
struct InstrumentEnvelope {
    data: InstrumentBody,
}

#[derive(Debug, Deserialize)]
struct InstrumentBody {
    #[serde(rename = "streamer-symbol")]
    streamer_symbol: Option<String>,
}

/// Resolver backed by the instruments REST endpoint.
#[derive(Debug, Clone)]
pub struct InstrumentResolver {
    http: reqwest::Client,
    base_url: String,
    session_token: String,
}

impl InstrumentResolver {
    /// Create a resolver against `base_url` authenticating with the
    /// given REST session token.
    #[must_use]
    pub fn new(base_url: impl Into<String>, session_token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            session_token: session_token.into(),
        }
    }
}

#[async_trait]
impl SymbolResolver for InstrumentResolver {
    async fn resolve(&self, symbol: &str) -> Result<String, ResolverError> {
        let url = format!("{}/instruments/equities/{symbol}", self.base_url);
        debug!(symbol, "looking up streamer symbol");

        let response = self
            .http
            .get(&url)
            .header("Authorization", &self.session_token)
            .send()
            .await
            .map_err(|err| ResolverError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ResolverError::Status(status.as_u16()));
        }

        let envelope: InstrumentEnvelope = response
            .json()
            .await
            .map_err(|err| ResolverError::Transport(err.to_string()))?;

        envelope
            .data
            .streamer_symbol
            .filter(|native| !native.is_empty())
            .ok_or(ResolverError::MissingField)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_extracts_streamer_symbol() {
        let body = r#"{"data":{"symbol":"BRK/B","streamer-symbol":"BRK/B:NYSE"}}"#;
        let envelope: InstrumentEnvelope = serde_json::from_str(body).unwrap();
        assert_eq!(envelope.data.streamer_symbol.as_deref(), Some("BRK/B:NYSE"));
    }

    #[test]
    fn missing_streamer_symbol_deserializes_as_none() {
        let body = r#"{"data":{"symbol":"AAPL"}}"#;
        let envelope: InstrumentEnvelope = serde_json::from_str(body).unwrap();
        assert!(envelope.data.streamer_symbol.is_none());
    }
}
