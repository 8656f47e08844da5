#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::match_same_arms,
        clippy::needless_pass_by_value,
        clippy::default_trait_access,
        clippy::items_after_statements
    )
)]

//! DXLink Client - Streaming Market Data
//!
//! A WebSocket client for the DXLink multiplexed-channel feed protocol.
//! Exchanges a REST session token for a short-lived streaming token,
//! performs the SETUP/AUTH/CHANNEL/FEED handshake, manages per-symbol
//! subscriptions, and normalizes compact feed events into quote and
//! candle records delivered through callbacks.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Core market data types with no I/O
//!   - `market_data`: Normalized quotes, candles, candle buffer
//!   - `subscription`: Watch-list tracking and diffing
//!
//! - **Application**: Port definitions
//!   - `ports`: Symbol resolution interface
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `dxlink`: WebSocket client, handshake, codec, normalizer
//!   - `tastytrade`: REST token exchange and instrument lookup
//!   - `config`: Environment-driven configuration
//!   - `metrics`: Prometheus instrumentation
//!   - `telemetry`: OpenTelemetry tracing integration
//!
//! # Data Flow
//!
//! ```text
//! REST /api-quote-tokens ──► token ──┐
//!                                    ▼
//! DXLink gateway WS ──► handshake ──► FEED_DATA ──► normalizer ──► callbacks
//!                          ▲                            │
//! REST /instruments ──► symbol resolution               └──► candle buffers
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Core market data types with no external dependencies.
pub mod domain;

/// Application layer - Port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::market_data::{CandleBuffer, CandleData, DEFAULT_CANDLE_CAPACITY, SymbolQuote};
pub use domain::subscription::{EventKind, SubscriptionDiff, SubscriptionSet};

// Ports
pub use application::ports::{ResolverError, SymbolResolver};

// Streaming client
pub use infrastructure::dxlink::{
    DxLinkClient, FeedNormalizer, HandshakeMachine, HandshakeState, StreamError, StreamEvent,
};

// REST adapters
pub use infrastructure::tastytrade::{
    InstrumentResolver, QuoteTokenClient, StreamCredentials, TokenError,
};

// Infrastructure config
pub use infrastructure::config::{ClientConfig, ConfigError, Credentials, StreamSettings};

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
