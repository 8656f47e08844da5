//! Feed Normalizer
//!
//! Folds decoded compact feed events into per-symbol state and produces
//! the normalized records delivered to callbacks. State is keyed by the
//! requested (original) symbol, not the streamer-native one, so callers
//! always see the symbols they asked for.
//!
//! Change math: `change` and `change_percent` derive from the last
//! price stored before the triggering event. When no prior last price
//! exists (or it is non-positive) both come back as zero; a first tick
//! is a baseline, not a move.

use std::collections::HashMap;

use chrono::{DateTime, TimeZone, Utc};
use tracing::debug;

use crate::domain::market_data::{CandleData, SymbolQuote};

use super::codec::FeedEvent;

// =============================================================================
// Per-Symbol State
// =============================================================================

/// Rolling state for one requested symbol.
///
/// Survives unsubscription so a re-added symbol resumes with its
/// session context; cleared only on disconnect or explicit reset.
#[derive(Debug, Clone, Copy, Default)]
pub struct SymbolState {
    /// Last known price (trade, effective quote last, or seeded close).
    pub last_price: f64,
    /// Cumulative session volume from trade events.
    pub volume: f64,
}

/// A normalized event ready for callback delivery.
#[derive(Debug, Clone, PartialEq)]
pub enum NormalizedEvent {
    /// Updated quote for a watch-list symbol.
    Quote(SymbolQuote),
    /// New or updated candle.
    Candle {
        /// Requested symbol the candle belongs to.
        symbol: String,
        /// The candle itself.
        candle: CandleData,
    },
}

// =============================================================================
// Normalizer
// =============================================================================

/// Stateful event normalizer.
#[derive(Debug, Default)]
pub struct FeedNormalizer {
    states: HashMap<String, SymbolState>,
}

impl FeedNormalizer {
    /// Create an empty normalizer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed state for a symbol, typically from a REST snapshot taken
    /// before streaming starts. Non-positive prices are ignored.
    pub fn seed(&mut self, symbol: &str, last_price: f64, volume: f64) {
        if last_price > 0.0 {
            let state = self.states.entry(symbol.to_string()).or_default();
            state.last_price = last_price;
            state.volume = volume;
        }
    }

    /// Stored state for a symbol, if any.
    #[must_use]
    pub fn state(&self, symbol: &str) -> Option<&SymbolState> {
        self.states.get(symbol)
    }

    /// Drop all per-symbol state.
    pub fn clear(&mut self) {
        self.states.clear();
    }

    /// Fold one decoded event into state.
    ///
    /// `symbol` must already be the requested symbol (reverse-mapped
    /// from the native one by the caller). Returns the normalized
    /// record to deliver, or `None` when the event only mutates state
    /// (Summary seeding) or cannot produce a meaningful update.
    pub fn apply(&mut self, symbol: &str, event: &FeedEvent) -> Option<NormalizedEvent> {
        match event {
            FeedEvent::Quote {
                bid_price,
                ask_price,
                ..
            } => self.apply_quote(symbol, *bid_price, *ask_price),
            FeedEvent::Trade { price, size, .. } => self.apply_trade(symbol, *price, *size),
            FeedEvent::Summary { prev_close, .. } => {
                self.apply_summary(symbol, *prev_close);
                None
            }
            FeedEvent::Candle {
                time_millis,
                open,
                high,
                low,
                close,
                volume,
                ..
            } => candle_timestamp(*time_millis).map(|timestamp| NormalizedEvent::Candle {
                symbol: symbol.to_string(),
                candle: CandleData {
                    timestamp,
                    open: *open,
                    high: *high,
                    low: *low,
                    close: *close,
                    volume: *volume,
                },
            }),
        }
    }

    fn apply_quote(
        &mut self,
        symbol: &str,
        bid_price: Option<f64>,
        ask_price: Option<f64>,
    ) -> Option<NormalizedEvent> {
        let previous = self.states.get(symbol).copied().unwrap_or_default();

        // Zero and negative sides count as absent.
        let bid = bid_price.filter(|p| *p > 0.0);
        let ask = ask_price.filter(|p| *p > 0.0);

        // Effective last: bid, else ask, else whatever was stored.
        let last_price = bid.or(ask).unwrap_or(previous.last_price);

        if last_price <= 0.0 {
            debug!(symbol, "quote with no usable price, skipping");
            return None;
        }

        let (change, change_percent) = change_from(previous.last_price, last_price);

        let state = self.states.entry(symbol.to_string()).or_default();
        state.last_price = last_price;

        Some(NormalizedEvent::Quote(SymbolQuote {
            symbol: symbol.to_string(),
            bid_price: bid.unwrap_or(last_price),
            ask_price: ask.unwrap_or(last_price),
            last_price,
            change,
            change_percent,
            volume: state.volume,
            timestamp: Utc::now(),
        }))
    }

    fn apply_trade(
        &mut self,
        symbol: &str,
        price: Option<f64>,
        size: Option<f64>,
    ) -> Option<NormalizedEvent> {
        let price = price.filter(|p| *p > 0.0)?;
        let previous = self.states.get(symbol).copied().unwrap_or_default();

        let (change, change_percent) = change_from(previous.last_price, price);

        let state = self.states.entry(symbol.to_string()).or_default();
        state.last_price = price;
        state.volume += size.unwrap_or(0.0);

        Some(NormalizedEvent::Quote(SymbolQuote {
            symbol: symbol.to_string(),
            bid_price: price,
            ask_price: price,
            last_price: price,
            change,
            change_percent,
            volume: state.volume,
            timestamp: Utc::now(),
        }))
    }

    /// Summary only seeds a missing last price; it never emits.
    fn apply_summary(&mut self, symbol: &str, prev_close: Option<f64>) {
        let Some(prev_close) = prev_close.filter(|p| *p > 0.0) else {
            return;
        };

        let state = self.states.entry(symbol.to_string()).or_default();
        if state.last_price <= 0.0 {
            debug!(symbol, prev_close, "seeding last price from summary");
            state.last_price = prev_close;
        }
    }
}

/// Change and percent change versus a prior last price.
///
/// A non-positive prior price yields (0, 0): there is no baseline to
/// measure against.
fn change_from(previous_last: f64, current: f64) -> (f64, f64) {
    if previous_last <= 0.0 {
        (0.0, 0.0)
    } else {
        let change = current - previous_last;
        (change, change / previous_last * 100.0)
    }
}

fn candle_timestamp(millis: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis).single()
}
