//! Normalized Market Data Types
//!
//! Canonical internal representation of streamed market data: the
//! normalized quote record delivered to the quote callback, the candle
//! record delivered to the candle callback, and the bounded per-symbol
//! candle buffer.
//!
//! These types are wire-agnostic; positional decoding of compact feed
//! events lives in the infrastructure layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Quote
// =============================================================================

/// A normalized quote for one symbol.
///
/// `change` and `change_percent` are derived from the previously stored
/// last price at the moment the triggering event was processed, never
/// from a wire-provided delta.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolQuote {
    /// Requested (non-streamer-native) symbol.
    pub symbol: String,
    /// Best bid price. Equals the trade price for trade-driven updates.
    pub bid_price: f64,
    /// Best ask price. Equals the trade price for trade-driven updates.
    pub ask_price: f64,
    /// Effective last price (bid, else ask, else prior stored last).
    pub last_price: f64,
    /// Absolute change versus the previously stored last price.
    pub change: f64,
    /// Percent change versus the previously stored last price.
    pub change_percent: f64,
    /// Cumulative session volume accumulated from trade events.
    pub volume: f64,
    /// When this record was produced.
    pub timestamp: DateTime<Utc>,
}

// =============================================================================
// Candle
// =============================================================================

/// A single OHLCV candle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandleData {
    /// Start of the candle period.
    pub timestamp: DateTime<Utc>,
    /// Open price.
    pub open: f64,
    /// High price.
    pub high: f64,
    /// Low price.
    pub low: f64,
    /// Close price.
    pub close: f64,
    /// Volume traded during the period.
    pub volume: f64,
}

/// Default number of candles retained per symbol.
pub const DEFAULT_CANDLE_CAPACITY: usize = 100;

/// Rolling buffer of candles for one (symbol, period) pair.
///
/// Ordered by timestamp, bounded to the most recent `capacity` entries.
/// Inserting a candle whose timestamp already exists replaces the
/// stored candle in place (idempotent upsert, later write wins).
#[derive(Debug, Clone)]
pub struct CandleBuffer {
    candles: Vec<CandleData>,
    capacity: usize,
}

impl Default for CandleBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CANDLE_CAPACITY)
    }
}

impl CandleBuffer {
    /// Create an empty buffer retaining at most `capacity` candles.
    #[must_use]
    pub const fn new(capacity: usize) -> Self {
        Self {
            candles: Vec::new(),
            capacity,
        }
    }

    /// Insert or replace a candle.
    ///
    /// Replaces the existing entry with the same timestamp if present,
    /// otherwise appends. The buffer is then re-sorted by timestamp and
    /// truncated from the oldest end.
    pub fn upsert(&mut self, candle: CandleData) {
        if let Some(existing) = self
            .candles
            .iter_mut()
            .find(|c| c.timestamp == candle.timestamp)
        {
            *existing = candle;
        } else {
            self.candles.push(candle);
        }

        self.candles.sort_by_key(|c| c.timestamp);

        if self.candles.len() > self.capacity {
            let excess = self.candles.len() - self.capacity;
            self.candles.drain(..excess);
        }
    }

    /// Buffered candles, oldest first.
    #[must_use]
    pub fn as_slice(&self) -> &[CandleData] {
        &self.candles
    }

    /// Most recent candle, if any.
    #[must_use]
    pub fn latest(&self) -> Option<&CandleData> {
        self.candles.last()
    }

    /// Number of buffered candles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.candles.len()
    }

    /// Check whether the buffer is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }
}
