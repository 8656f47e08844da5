//! Quote Token Exchange
//!
//! Exchanges a REST session token for short-lived DXLink streaming
//! credentials via `GET {base}/api-quote-tokens`. The streaming token
//! and gateway URL come back together; tokens are valid for 24 hours
//! and are fetched fresh on every connect.

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

/// Error code the API uses for accounts without market data access.
const NOT_ENTITLED_CODE: &str = "quote_streamer.customer_not_found_error";

/// Streaming credentials returned by the token exchange.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamCredentials {
    /// Short-lived DXLink streaming token.
    pub token: String,
    /// WebSocket URL of the DXLink gateway.
    #[serde(rename = "dxlink-url")]
    pub gateway_url: String,
    /// Data entitlement level (for example "api").
    #[serde(default)]
    pub level: String,
}

#[derive(Debug, Deserialize)]
struct TokenEnvelope {
    data: StreamCredentials,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    error: Option<ErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<String>,
}

/// Failures of the token exchange.
#[derive(Debug, Error)]
pub enum TokenError {
    /// Account has no streaming market data entitlement.
    #[error("account is not entitled to streaming market data")]
    NotEntitled,

    /// Exchange endpoint returned a non-success status.
    #[error("token exchange failed with status {0}")]
    Exchange(u16),

    /// Transport-level failure reaching the exchange endpoint.
    #[error("token exchange transport error: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for TokenError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

/// HTTP client for the quote token endpoint.
#[derive(Debug, Clone)]
pub struct QuoteTokenClient {
    http: reqwest::Client,
    base_url: String,
    session_token: String,
}

impl QuoteTokenClient {
    /// Create a client against `base_url` authenticating with the
    /// given REST session token.
    #[must_use]
    pub fn new(base_url: impl Into<String>, session_token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            session_token: session_token.into(),
        }
    }

    /// Fetch fresh streaming credentials.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::NotEntitled`] for a 403 carrying the
    /// customer-not-found error code, [`TokenError::Exchange`] for any
    /// other non-success status, and [`TokenError::Transport`] for
    /// network failures.
    pub async fn fetch(&self) -> Result<StreamCredentials, TokenError> {
        let url = format!("{}/api-quote-tokens", self.base_url);
        debug!(%url, "exchanging session token for streaming credentials");

        let response = self
            .http
            .get(&url)
            .header("Authorization", &self.session_token)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            let envelope: TokenEnvelope = response.json().await?;
            return Ok(envelope.data);
        }

        if status.as_u16() == 403 {
            let body = response.text().await.unwrap_or_default();
            if is_not_entitled(&body) {
                return Err(TokenError::NotEntitled);
            }
        }

        Err(TokenError::Exchange(status.as_u16()))
    }
}

fn is_not_entitled(body: &str) -> bool {
    serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .and_then(|envelope| envelope.error)
        .and_then(|error| error.code)
        .is_some_and(|code| code == NOT_ENTITLED_CODE)
}
