//! Infrastructure Layer - Adapters and external integrations.
//!
//! This layer contains the concrete implementations of the port interfaces
//! defined in the application layer.

/// DXLink WebSocket client (handshake, codec, keepalive, normalizer).
pub mod dxlink;

/// Tastytrade REST adapters (token exchange, instrument lookup).
pub mod tastytrade;

/// Configuration loading.
pub mod config;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// OpenTelemetry tracing integration.
pub mod telemetry;
