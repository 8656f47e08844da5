//! Domain Layer - Core market data types and business logic.
//!
//! This layer contains the core domain types for streaming market data
//! with no external dependencies beyond serialization support.

/// Normalized market data types (quotes, candles, rolling buffers).
pub mod market_data;

/// Desired-set subscription tracking and diffing.
pub mod subscription;
