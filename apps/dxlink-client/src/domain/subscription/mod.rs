//! Subscription Tracking
//!
//! Tracks the set of symbols the caller currently wants streamed and
//! computes add/remove diffs when the watch list changes. The set holds
//! requested (non-streamer-native) symbols; resolution to native form
//! happens at subscription time in the infrastructure layer.

use std::collections::BTreeSet;

// =============================================================================
// Event Kinds
// =============================================================================

/// Feed event types understood by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Regular-session trade.
    Trade,
    /// Extended-hours trade.
    TradeEth,
    /// Bid/ask quote.
    Quote,
    /// Option greeks.
    Greeks,
    /// Instrument profile.
    Profile,
    /// Day summary (open/high/low/previous close).
    Summary,
    /// OHLCV candle.
    Candle,
}

impl EventKind {
    /// Wire name of this event type.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Trade => "Trade",
            Self::TradeEth => "TradeETH",
            Self::Quote => "Quote",
            Self::Greeks => "Greeks",
            Self::Profile => "Profile",
            Self::Summary => "Summary",
            Self::Candle => "Candle",
        }
    }

    /// The interest set subscribed for every watch-list symbol.
    #[must_use]
    pub const fn symbol_interest() -> &'static [Self] {
        &[Self::Trade, Self::Quote, Self::Profile, Self::Summary]
    }
}

// =============================================================================
// Diff
// =============================================================================

/// Result of replacing the desired symbol set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionDiff {
    /// Symbols present in the new set but not the old one.
    pub to_add: Vec<String>,
    /// Symbols present in the old set but not the new one.
    pub to_remove: Vec<String>,
}

impl SubscriptionDiff {
    /// Check if the diff carries no changes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }
}

// =============================================================================
// Subscription Set
// =============================================================================

/// The set of symbols the caller currently wants streamed.
///
/// Mutated only through [`SubscriptionSet::replace`] (and
/// [`SubscriptionSet::clear`] on disconnect), so the tracked set always
/// equals the argument of the most recent replace call.
#[derive(Debug, Default)]
pub struct SubscriptionSet {
    current: BTreeSet<String>,
}

impl SubscriptionSet {
    /// Create an empty set.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            current: BTreeSet::new(),
        }
    }

    /// Replace the desired set, returning the add/remove diff.
    ///
    /// Diff entries come back in lexicographic order. Duplicate symbols
    /// in the input collapse to one entry.
    pub fn replace(&mut self, symbols: &[String]) -> SubscriptionDiff {
        let next: BTreeSet<String> = symbols.iter().cloned().collect();

        let to_add = next.difference(&self.current).cloned().collect();
        let to_remove = self.current.difference(&next).cloned().collect();

        self.current = next;

        SubscriptionDiff { to_add, to_remove }
    }

    /// Symbols currently desired, in lexicographic order.
    #[must_use]
    pub fn symbols(&self) -> Vec<String> {
        self.current.iter().cloned().collect()
    }

    /// Check membership of a symbol.
    #[must_use]
    pub fn contains(&self, symbol: &str) -> bool {
        self.current.contains(symbol)
    }

    /// Check whether no symbols are desired.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.current.is_empty()
    }

    /// Number of desired symbols.
    #[must_use]
    pub fn len(&self) -> usize {
        self.current.len()
    }

    /// Drop all desired symbols.
    pub fn clear(&mut self) {
        self.current.clear();
    }
}
