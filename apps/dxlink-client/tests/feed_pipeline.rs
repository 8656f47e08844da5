//! Feed Pipeline Integration Tests
//!
//! Exercises the path a FEED_DATA frame takes: JSON decode, compact
//! event decoding, normalization, and candle buffering, plus the
//! subscription diffing that drives FEED_SUBSCRIPTION frames.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]

use dxlink_client::infrastructure::dxlink::{
    DxLinkMessage, FeedNormalizer, FeedSubscriptionMessage, JsonCodec, NormalizedEvent,
    decode_feed_events, symbol_interest_entries,
};
use dxlink_client::{CandleBuffer, SubscriptionSet};

fn symbols(list: &[&str]) -> Vec<String> {
    list.iter().map(ToString::to_string).collect()
}

#[test]
fn feed_data_frame_normalizes_into_quotes() {
    let raw = r#"{"type":"FEED_DATA","channel":3,"data":[
        ["Quote","AAPL",100.0,101.0,3,5],
        ["Trade","MSFT",405.5,1000000,25.0]
    ]}"#;

    let DxLinkMessage::FeedData(frame) = JsonCodec::decode(raw).unwrap() else {
        panic!("expected FEED_DATA");
    };
    let events = decode_feed_events(&frame.data);
    assert_eq!(events.len(), 2);

    let mut normalizer = FeedNormalizer::new();
    let quote = match normalizer.apply("AAPL", &events[0]) {
        Some(NormalizedEvent::Quote(quote)) => quote,
        other => panic!("expected quote, got {other:?}"),
    };

    // First tick has no baseline: price flows, change stays zero.
    assert_eq!(quote.last_price, 100.0);
    assert_eq!(quote.change, 0.0);
    assert_eq!(quote.change_percent, 0.0);
}

#[test]
fn summary_then_trade_produces_session_change() {
    let data = decode_feed_events(&[
        serde_json::json!(["Summary", "AAPL", 0, 170.0, 175.0, 169.0, 100.0]),
        serde_json::json!(["Trade", "AAPL", 105.0, 0, 10.0]),
    ]);

    let mut normalizer = FeedNormalizer::new();
    assert!(normalizer.apply("AAPL", &data[0]).is_none());

    let quote = match normalizer.apply("AAPL", &data[1]) {
        Some(NormalizedEvent::Quote(quote)) => quote,
        other => panic!("expected quote, got {other:?}"),
    };

    assert_eq!(quote.last_price, 105.0);
    assert_eq!(quote.change, 5.0);
    assert_eq!(quote.change_percent, 5.0);
    assert_eq!(quote.volume, 10.0);
}

#[test]
fn candle_events_build_an_ordered_deduplicated_buffer() {
    let data = decode_feed_events(&[
        serde_json::json!(["Candle", "SPY{=5m}", 1_700_000_600_000_i64, 2.0, 2.0, 2.0, 2.0, 1.0]),
        serde_json::json!(["Candle", "SPY{=5m}", 1_700_000_300_000_i64, 1.0, 1.0, 1.0, 1.0, 1.0]),
        // Duplicate timestamp: the later write wins.
        serde_json::json!(["Candle", "SPY{=5m}", 1_700_000_300_000_i64, 9.0, 9.0, 9.0, 9.0, 9.0]),
    ]);

    let mut normalizer = FeedNormalizer::new();
    let mut buffer = CandleBuffer::default();
    for event in &data {
        if let Some(NormalizedEvent::Candle { candle, .. }) = normalizer.apply("SPY", event) {
            buffer.upsert(candle);
        }
    }

    assert_eq!(buffer.len(), 2);
    let closes: Vec<f64> = buffer.as_slice().iter().map(|c| c.close).collect();
    assert_eq!(closes, vec![9.0, 2.0]);
}

#[test]
fn watch_list_changes_map_to_subscription_frames() {
    let mut set = SubscriptionSet::new();

    // Initial watch list: everything added, sent with a reset.
    let diff = set.replace(&symbols(&["AAPL", "MSFT"]));
    let entries = symbol_interest_entries(&diff.to_add);
    let frame = DxLinkMessage::FeedSubscription(FeedSubscriptionMessage::reset_add(3, entries));
    let json = JsonCodec::encode(&frame).unwrap();

    assert!(json.contains(r#""reset":true"#));
    // Four event types per symbol.
    assert_eq!(json.matches(r#""symbol":"AAPL""#).count(), 4);
    assert_eq!(json.matches(r#""symbol":"MSFT""#).count(), 4);

    // Update: AAPL leaves, NVDA joins.
    let diff = set.replace(&symbols(&["MSFT", "NVDA"]));
    assert_eq!(diff.to_add, symbols(&["NVDA"]));
    assert_eq!(diff.to_remove, symbols(&["AAPL"]));

    let remove_frame = DxLinkMessage::FeedSubscription(FeedSubscriptionMessage::remove(
        3,
        symbol_interest_entries(&diff.to_remove),
    ));
    let json = JsonCodec::encode(&remove_frame).unwrap();
    assert!(json.contains(r#""remove""#));
    assert!(!json.contains(r#""reset""#));

    // The tracked set equals the most recent replace argument.
    assert_eq!(set.symbols(), symbols(&["MSFT", "NVDA"]));
}

#[test]
fn malformed_rows_inside_a_batch_are_dropped_not_fatal() {
    let data = decode_feed_events(&[
        serde_json::json!("just a string"),
        serde_json::json!(["Trade"]),
        serde_json::json!(["Quote", "GOOG", 170.1, 170.2]),
        serde_json::json!({"type": "Quote"}),
    ]);

    assert_eq!(data.len(), 1);
}
