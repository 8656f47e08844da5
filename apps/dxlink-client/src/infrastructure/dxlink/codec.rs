//! Frame Codec and Compact Event Decoding
//!
//! Decodes inbound WebSocket text into [`DxLinkMessage`] frames and
//! positional compact FEED_DATA arrays into typed [`FeedEvent`]s. Event
//! indices follow the field order declared in FEED_SETUP.
//!
//! Malformed or unrecognized events never abort a batch: each event
//! decodes independently and failures are skipped with a log line.

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use super::messages::DxLinkMessage;

// =============================================================================
// Errors
// =============================================================================

/// Codec-level failures.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Inbound text was not a valid protocol frame.
    #[error("failed to decode frame: {0}")]
    Decode(#[from] serde_json::Error),
}

// =============================================================================
// JSON Codec
// =============================================================================

/// JSON codec for DXLink frames.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl JsonCodec {
    /// Decode one inbound text frame.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Decode`] when the payload is not valid
    /// JSON or not an object. Unknown frame types decode successfully
    /// to [`DxLinkMessage::Unknown`].
    pub fn decode(text: &str) -> Result<DxLinkMessage, CodecError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Encode one outbound frame to text.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Decode`] if serialization fails, which
    /// cannot happen for the frame types this client constructs.
    pub fn encode(message: &DxLinkMessage) -> Result<String, CodecError> {
        Ok(serde_json::to_string(message)?)
    }
}

// =============================================================================
// Compact Feed Events
// =============================================================================

/// A decoded compact feed event.
///
/// Only the event types the normalizer consumes are represented; other
/// subscribed types (Profile) are skipped at decode time.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    /// Bid/ask update.
    Quote {
        /// Streamer-native symbol.
        symbol: String,
        /// Best bid, absent when not a finite number.
        bid_price: Option<f64>,
        /// Best ask, absent when not a finite number.
        ask_price: Option<f64>,
    },
    /// Trade print (Trade or TradeETH).
    Trade {
        /// Streamer-native symbol.
        symbol: String,
        /// Trade price.
        price: Option<f64>,
        /// Trade size.
        size: Option<f64>,
    },
    /// Day summary.
    Summary {
        /// Streamer-native symbol.
        symbol: String,
        /// Previous session close price.
        prev_close: Option<f64>,
    },
    /// OHLCV candle.
    Candle {
        /// Candle symbol including the period suffix.
        symbol: String,
        /// Candle period start in epoch milliseconds.
        time_millis: i64,
        /// Open price.
        open: f64,
        /// High price.
        high: f64,
        /// Low price.
        low: f64,
        /// Close price.
        close: f64,
        /// Period volume.
        volume: f64,
    },
}

/// Decode a FEED_DATA batch into typed events.
///
/// Each element must be a positional array `[eventType, eventSymbol,
/// field...]`. Elements that are malformed, carry an unknown event
/// type, or lack required fields are skipped.
#[must_use]
pub fn decode_feed_events(data: &[Value]) -> Vec<FeedEvent> {
    data.iter().filter_map(decode_one).collect()
}

fn decode_one(value: &Value) -> Option<FeedEvent> {
    let Some(cells) = value.as_array() else {
        warn!(?value, "skipping non-array feed event");
        return None;
    };

    let event_type = cells.first().and_then(Value::as_str)?;
    let symbol = cells.get(1).and_then(Value::as_str)?.to_string();

    match event_type {
        "Quote" => Some(FeedEvent::Quote {
            symbol,
            bid_price: num(cells, 2),
            ask_price: num(cells, 3),
        }),
        "Trade" | "TradeETH" => Some(FeedEvent::Trade {
            symbol,
            price: num(cells, 2),
            size: num(cells, 4),
        }),
        "Summary" => Some(FeedEvent::Summary {
            symbol,
            prev_close: num(cells, 6),
        }),
        "Candle" => {
            let time_millis = cells.get(2).and_then(Value::as_i64)?;
            Some(FeedEvent::Candle {
                symbol,
                time_millis,
                open: num(cells, 3)?,
                high: num(cells, 4)?,
                low: num(cells, 5)?,
                close: num(cells, 6)?,
                volume: num(cells, 7).unwrap_or(0.0),
            })
        }
        other => {
            debug!(event_type = other, "skipping unhandled feed event type");
            None
        }
    }
}

/// Read a finite number at a positional index.
fn num(cells: &[Value], idx: usize) -> Option<f64> {
    cells.get(idx).and_then(Value::as_f64).filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_quote_event() {
        let data = vec![json!(["Quote", "AAPL", 172.5, 172.52, 3, 5])];
        let events = decode_feed_events(&data);

        assert_eq!(
            events,
            vec![FeedEvent::Quote {
                symbol: "AAPL".to_string(),
                bid_price: Some(172.5),
                ask_price: Some(172.52),
            }]
        );
    }

    #[test]
    fn decodes_trade_with_size_at_index_four() {
        // Trade fields: [eventType, eventSymbol, price, dayVolume, size]
        let data = vec![json!(["Trade", "AAPL", 105.0, 1_000_000.0, 10.0])];
        let events = decode_feed_events(&data);

        assert_eq!(
            events,
            vec![FeedEvent::Trade {
                symbol: "AAPL".to_string(),
                price: Some(105.0),
                size: Some(10.0),
            }]
        );
    }

    #[test]
    fn trade_eth_decodes_like_trade() {
        let data = vec![json!(["TradeETH", "AAPL", 104.5, 0.0, 2.0])];
        let events = decode_feed_events(&data);

        assert!(matches!(
            events.as_slice(),
            [FeedEvent::Trade { price: Some(p), .. }] if (*p - 104.5).abs() < f64::EPSILON
        ));
    }

    #[test]
    fn decodes_summary_prev_close_at_index_six() {
        // Summary fields: [.., openInterest, dayOpen, dayHigh, dayLow, prevDayClose]
        let data = vec![json!(["Summary", "AAPL", 0, 170.0, 175.0, 169.0, 171.25])];
        let events = decode_feed_events(&data);

        assert_eq!(
            events,
            vec![FeedEvent::Summary {
                symbol: "AAPL".to_string(),
                prev_close: Some(171.25),
            }]
        );
    }

    #[test]
    fn decodes_candle_event() {
        let data = vec![json!([
            "Candle",
            "AAPL{=1m}",
            1_700_000_000_000_i64,
            100.0,
            101.0,
            99.5,
            100.5,
            1234.0
        ])];
        let events = decode_feed_events(&data);

        assert_eq!(
            events,
            vec![FeedEvent::Candle {
                symbol: "AAPL{=1m}".to_string(),
                time_millis: 1_700_000_000_000,
                open: 100.0,
                high: 101.0,
                low: 99.5,
                close: 100.5,
                volume: 1234.0,
            }]
        );
    }

    #[test]
    fn malformed_event_does_not_abort_batch() {
        let data = vec![
            json!({"not": "an array"}),
            json!(["Quote"]),
            json!(["Quote", "MSFT", 400.0, 400.1]),
        ];
        let events = decode_feed_events(&data);

        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], FeedEvent::Quote { symbol, .. } if symbol == "MSFT"));
    }

    #[test_case::test_case("Greeks" ; "greeks")]
    #[test_case::test_case("Profile" ; "profile")]
    #[test_case::test_case("Underlying" ; "undeclared type")]
    fn non_normalized_event_types_are_skipped(event_type: &str) {
        let data = vec![json!([event_type, "AAPL", 0.3, 0.5])];
        assert!(decode_feed_events(&data).is_empty());
    }

    #[test]
    fn null_prices_decode_as_absent() {
        let data = vec![json!(["Quote", "AAPL", null, 172.52])];
        let events = decode_feed_events(&data);

        assert_eq!(
            events,
            vec![FeedEvent::Quote {
                symbol: "AAPL".to_string(),
                bid_price: None,
                ask_price: Some(172.52),
            }]
        );
    }

    #[test]
    fn codec_rejects_non_json() {
        assert!(JsonCodec::decode("not json").is_err());
    }

    #[test]
    fn codec_roundtrips_keepalive() {
        let text = JsonCodec::encode(&DxLinkMessage::keepalive()).unwrap();
        let decoded = JsonCodec::decode(&text).unwrap();
        assert_eq!(decoded, DxLinkMessage::keepalive());
    }
}
