//! DXLink Wire Message Types
//!
//! Frame types for the DXLink multiplexed-channel feed protocol. Every
//! frame is a JSON object with a `type` discriminator and a `channel`
//! number; connection-level frames (SETUP, AUTH, AUTH_STATE, KEEPALIVE)
//! travel on channel 0, feed frames on the channel negotiated via
//! CHANNEL_REQUEST/CHANNEL_OPENED.
//!
//! # Wire Format
//!
//! ```json
//! {"type":"SETUP","channel":0,"version":"0.1-dxlink-rs/0.1.0",
//!  "keepaliveTimeout":60,"acceptKeepaliveTimeout":60}
//! {"type":"FEED_SUBSCRIPTION","channel":3,"reset":true,
//!  "add":[{"type":"Quote","symbol":"AAPL"}]}
//! {"type":"FEED_DATA","channel":3,"data":[["Quote","AAPL",172.5,172.52,3,5]]}
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::subscription::EventKind;

// =============================================================================
// Constants
// =============================================================================

/// Connection-level control channel.
pub const CONTROL_CHANNEL: u64 = 0;

/// Keepalive timeout advertised in both directions during SETUP.
pub const KEEPALIVE_TIMEOUT_SECS: u64 = 60;

/// Protocol version string sent in SETUP.
pub const SETUP_VERSION: &str = "0.1-dxlink-rs/0.1.0";

/// Aggregation period requested in FEED_SETUP.
pub const ACCEPT_AGGREGATION_PERIOD: f64 = 0.1;

/// Data format requested in FEED_SETUP.
pub const COMPACT_FORMAT: &str = "COMPACT";

/// Feed service identifier for CHANNEL_REQUEST.
pub const FEED_SERVICE: &str = "FEED";

/// Ordered field list declared for Trade and TradeETH events.
pub const TRADE_FIELDS: &[&str] = &["eventType", "eventSymbol", "price", "dayVolume", "size"];

/// Ordered field list declared for Quote events.
pub const QUOTE_FIELDS: &[&str] = &[
    "eventType",
    "eventSymbol",
    "bidPrice",
    "askPrice",
    "bidSize",
    "askSize",
];

/// Ordered field list declared for Greeks events.
pub const GREEKS_FIELDS: &[&str] = &[
    "eventType",
    "eventSymbol",
    "volatility",
    "delta",
    "gamma",
    "theta",
    "rho",
    "vega",
];

/// Ordered field list declared for Profile events.
pub const PROFILE_FIELDS: &[&str] = &[
    "eventType",
    "eventSymbol",
    "description",
    "shortSaleRestriction",
    "tradingStatus",
    "statusReason",
    "haltStartTime",
    "haltEndTime",
    "highLimitPrice",
    "lowLimitPrice",
    "high52WeekPrice",
    "low52WeekPrice",
];

/// Ordered field list declared for Summary events.
pub const SUMMARY_FIELDS: &[&str] = &[
    "eventType",
    "eventSymbol",
    "openInterest",
    "dayOpenPrice",
    "dayHighPrice",
    "dayLowPrice",
    "prevDayClosePrice",
];

// =============================================================================
// Frame Envelope
// =============================================================================

/// A DXLink protocol frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DxLinkMessage {
    /// Capability/version announcement (both directions).
    #[serde(rename = "SETUP")]
    Setup(SetupMessage),

    /// Streaming token submission (client to gateway).
    #[serde(rename = "AUTH")]
    Auth(AuthMessage),

    /// Authorization state notification (gateway to client).
    #[serde(rename = "AUTH_STATE")]
    AuthState(AuthStateMessage),

    /// Request to open a logical channel.
    #[serde(rename = "CHANNEL_REQUEST")]
    ChannelRequest(ChannelRequestMessage),

    /// Acknowledgement that a channel is open.
    #[serde(rename = "CHANNEL_OPENED")]
    ChannelOpened(ChannelOpenedMessage),

    /// Feed format and per-event field-order declaration.
    #[serde(rename = "FEED_SETUP")]
    FeedSetup(FeedSetupMessage),

    /// Acknowledgement of the feed configuration.
    #[serde(rename = "FEED_CONFIG")]
    FeedConfig(FeedConfigMessage),

    /// Subscription add/remove request.
    #[serde(rename = "FEED_SUBSCRIPTION")]
    FeedSubscription(FeedSubscriptionMessage),

    /// Batch of compact market data events.
    #[serde(rename = "FEED_DATA")]
    FeedData(FeedDataMessage),

    /// Liveness message.
    #[serde(rename = "KEEPALIVE")]
    Keepalive(KeepaliveMessage),

    /// Gateway error notification.
    #[serde(rename = "ERROR")]
    Error(ErrorMessage),

    /// Any frame type this client does not handle.
    #[serde(other)]
    Unknown,
}

impl DxLinkMessage {
    /// Build the SETUP announcement for channel 0.
    #[must_use]
    pub fn setup() -> Self {
        Self::Setup(SetupMessage {
            channel: CONTROL_CHANNEL,
            version: SETUP_VERSION.to_string(),
            keepalive_timeout: KEEPALIVE_TIMEOUT_SECS,
            accept_keepalive_timeout: KEEPALIVE_TIMEOUT_SECS,
        })
    }

    /// Build an AUTH frame carrying the streaming token.
    #[must_use]
    pub fn auth(token: impl Into<String>) -> Self {
        Self::Auth(AuthMessage {
            channel: CONTROL_CHANNEL,
            token: token.into(),
        })
    }

    /// Build a CHANNEL_REQUEST for the feed service.
    #[must_use]
    pub fn channel_request(channel: u64) -> Self {
        Self::ChannelRequest(ChannelRequestMessage {
            channel,
            service: FEED_SERVICE.to_string(),
            parameters: ChannelParameters {
                contract: "AUTO".to_string(),
            },
        })
    }

    /// Build the FEED_SETUP frame declaring compact encoding and the
    /// exact field order expected for each event type.
    #[must_use]
    pub fn feed_setup(channel: u64) -> Self {
        let mut fields = BTreeMap::new();
        let declare = |list: &[&str]| list.iter().map(ToString::to_string).collect::<Vec<_>>();

        fields.insert(EventKind::Trade.as_str().to_string(), declare(TRADE_FIELDS));
        fields.insert(
            EventKind::TradeEth.as_str().to_string(),
            declare(TRADE_FIELDS),
        );
        fields.insert(EventKind::Quote.as_str().to_string(), declare(QUOTE_FIELDS));
        fields.insert(
            EventKind::Greeks.as_str().to_string(),
            declare(GREEKS_FIELDS),
        );
        fields.insert(
            EventKind::Profile.as_str().to_string(),
            declare(PROFILE_FIELDS),
        );
        fields.insert(
            EventKind::Summary.as_str().to_string(),
            declare(SUMMARY_FIELDS),
        );

        Self::FeedSetup(FeedSetupMessage {
            channel,
            accept_aggregation_period: ACCEPT_AGGREGATION_PERIOD,
            accept_data_format: COMPACT_FORMAT.to_string(),
            accept_event_fields: fields,
        })
    }

    /// Build a KEEPALIVE frame for the control channel.
    #[must_use]
    pub const fn keepalive() -> Self {
        Self::Keepalive(KeepaliveMessage {
            channel: CONTROL_CHANNEL,
        })
    }
}

// =============================================================================
// Frame Bodies
// =============================================================================

/// SETUP frame body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupMessage {
    /// Channel number (always 0).
    pub channel: u64,
    /// Client/protocol version string.
    pub version: String,
    /// Keepalive timeout this side advertises.
    pub keepalive_timeout: u64,
    /// Keepalive timeout accepted from the other side.
    pub accept_keepalive_timeout: u64,
}

/// AUTH frame body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthMessage {
    /// Channel number (always 0).
    pub channel: u64,
    /// Short-lived streaming token.
    pub token: String,
}

/// Authorization states reported by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthorizationState {
    /// Client must send AUTH before opening channels.
    Unauthorized,
    /// Client may open channels.
    Authorized,
}

/// AUTH_STATE frame body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthStateMessage {
    /// Channel number (always 0).
    #[serde(default)]
    pub channel: u64,
    /// Current authorization state.
    pub state: AuthorizationState,
}

/// CHANNEL_REQUEST frame body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelRequestMessage {
    /// Requested channel id.
    pub channel: u64,
    /// Service identifier ("FEED").
    pub service: String,
    /// Service parameters.
    pub parameters: ChannelParameters,
}

/// Parameters for a feed channel request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelParameters {
    /// Contract selection ("AUTO").
    pub contract: String,
}

/// CHANNEL_OPENED frame body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelOpenedMessage {
    /// Channel id that was opened.
    pub channel: u64,
    /// Service bound to the channel.
    #[serde(default)]
    pub service: Option<String>,
}

/// FEED_SETUP frame body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedSetupMessage {
    /// Feed channel id.
    pub channel: u64,
    /// Requested aggregation period in seconds.
    pub accept_aggregation_period: f64,
    /// Requested data format ("COMPACT").
    pub accept_data_format: String,
    /// Per-event-type ordered field lists.
    pub accept_event_fields: BTreeMap<String, Vec<String>>,
}

/// FEED_CONFIG frame body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedConfigMessage {
    /// Feed channel id.
    pub channel: u64,
    /// Data format confirmed by the gateway.
    #[serde(default)]
    pub data_format: Option<String>,
    /// Aggregation period confirmed by the gateway.
    #[serde(default)]
    pub aggregation_period: Option<f64>,
}

/// One (event type, symbol) entry in a FEED_SUBSCRIPTION.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionEntry {
    /// Event type name.
    #[serde(rename = "type")]
    pub kind: String,
    /// Streamer-native symbol.
    pub symbol: String,
    /// History start time in epoch seconds (candles only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_time: Option<i64>,
}

impl SubscriptionEntry {
    /// Create an entry without a history start time.
    #[must_use]
    pub fn new(kind: EventKind, symbol: impl Into<String>) -> Self {
        Self {
            kind: kind.as_str().to_string(),
            symbol: symbol.into(),
            from_time: None,
        }
    }

    /// Create a candle entry with a history start time.
    #[must_use]
    pub fn candle(symbol: impl Into<String>, from_time: i64) -> Self {
        Self {
            kind: EventKind::Candle.as_str().to_string(),
            symbol: symbol.into(),
            from_time: Some(from_time),
        }
    }
}

/// FEED_SUBSCRIPTION frame body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedSubscriptionMessage {
    /// Feed channel id.
    pub channel: u64,
    /// Drop all prior subscriptions first.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset: Option<bool>,
    /// Entries to add.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub add: Option<Vec<SubscriptionEntry>>,
    /// Entries to remove.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remove: Option<Vec<SubscriptionEntry>>,
}

impl FeedSubscriptionMessage {
    /// Resetting subscription carrying the full interest set.
    #[must_use]
    pub const fn reset_add(channel: u64, entries: Vec<SubscriptionEntry>) -> Self {
        Self {
            channel,
            reset: Some(true),
            add: Some(entries),
            remove: None,
        }
    }

    /// Additive subscription (no reset).
    #[must_use]
    pub const fn add(channel: u64, entries: Vec<SubscriptionEntry>) -> Self {
        Self {
            channel,
            reset: None,
            add: Some(entries),
            remove: None,
        }
    }

    /// Removal subscription.
    #[must_use]
    pub const fn remove(channel: u64, entries: Vec<SubscriptionEntry>) -> Self {
        Self {
            channel,
            reset: None,
            add: None,
            remove: Some(entries),
        }
    }
}

/// Build one entry per (event type x symbol) pair over the standard
/// symbol interest set {Trade, Quote, Profile, Summary}.
#[must_use]
pub fn symbol_interest_entries(symbols: &[String]) -> Vec<SubscriptionEntry> {
    symbols
        .iter()
        .flat_map(|symbol| {
            EventKind::symbol_interest()
                .iter()
                .map(move |kind| SubscriptionEntry::new(*kind, symbol.clone()))
        })
        .collect()
}

/// FEED_DATA frame body.
///
/// In compact format each element of `data` is a positional array
/// `[eventType, eventSymbol, field...]` per the FEED_SETUP declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedDataMessage {
    /// Feed channel id.
    pub channel: u64,
    /// Compact event arrays.
    pub data: Vec<serde_json::Value>,
}

/// KEEPALIVE frame body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeepaliveMessage {
    /// Channel number (always 0).
    pub channel: u64,
}

/// ERROR frame body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorMessage {
    /// Channel the error relates to.
    #[serde(default)]
    pub channel: u64,
    /// Error code.
    #[serde(default)]
    pub error: Option<String>,
    /// Human-readable description.
    #[serde(default)]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setup_frame_serializes_with_camel_case_timeouts() {
        let json = serde_json::to_string(&DxLinkMessage::setup()).unwrap();
        assert!(json.contains(r#""type":"SETUP""#));
        assert!(json.contains(r#""channel":0"#));
        assert!(json.contains(r#""keepaliveTimeout":60"#));
        assert!(json.contains(r#""acceptKeepaliveTimeout":60"#));
    }

    #[test]
    fn auth_state_deserializes() {
        let msg: DxLinkMessage =
            serde_json::from_str(r#"{"type":"AUTH_STATE","state":"UNAUTHORIZED"}"#).unwrap();
        match msg {
            DxLinkMessage::AuthState(state) => {
                assert_eq!(state.state, AuthorizationState::Unauthorized);
                assert_eq!(state.channel, 0);
            }
            other => panic!("expected AUTH_STATE, got {other:?}"),
        }
    }

    #[test]
    fn channel_request_carries_feed_service() {
        let json = serde_json::to_string(&DxLinkMessage::channel_request(3)).unwrap();
        assert!(json.contains(r#""type":"CHANNEL_REQUEST""#));
        assert!(json.contains(r#""channel":3"#));
        assert!(json.contains(r#""service":"FEED""#));
        assert!(json.contains(r#""contract":"AUTO""#));
    }

    #[test]
    fn feed_setup_declares_all_six_event_types() {
        let DxLinkMessage::FeedSetup(setup) = DxLinkMessage::feed_setup(3) else {
            panic!("expected FEED_SETUP");
        };

        assert_eq!(setup.accept_event_fields.len(), 6);
        assert_eq!(
            setup.accept_event_fields["Quote"],
            vec![
                "eventType",
                "eventSymbol",
                "bidPrice",
                "askPrice",
                "bidSize",
                "askSize"
            ]
        );
        assert_eq!(setup.accept_event_fields["TradeETH"], setup.accept_event_fields["Trade"]);
        assert_eq!(setup.accept_data_format, "COMPACT");
    }

    #[test]
    fn subscription_reset_add_serialization() {
        let msg = FeedSubscriptionMessage::reset_add(
            3,
            vec![SubscriptionEntry::new(EventKind::Quote, "AAPL")],
        );
        let json = serde_json::to_string(&DxLinkMessage::FeedSubscription(msg)).unwrap();

        assert!(json.contains(r#""reset":true"#));
        assert!(json.contains(r#""add":[{"type":"Quote","symbol":"AAPL"}]"#));
        assert!(!json.contains("remove"));
    }

    #[test]
    fn candle_entry_carries_from_time() {
        let entry = SubscriptionEntry::candle("AAPL{=1m}", 1_700_000_000);
        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains(r#""type":"Candle""#));
        assert!(json.contains(r#""symbol":"AAPL{=1m}""#));
        assert!(json.contains(r#""fromTime":1700000000"#));
    }

    #[test]
    fn interest_entries_cover_four_types_per_symbol() {
        let entries =
            symbol_interest_entries(&["AAPL".to_string(), "MSFT".to_string()]);

        assert_eq!(entries.len(), 8);
        let aapl: Vec<&str> = entries
            .iter()
            .filter(|e| e.symbol == "AAPL")
            .map(|e| e.kind.as_str())
            .collect();
        assert_eq!(aapl, vec!["Trade", "Quote", "Profile", "Summary"]);
    }

    #[test]
    fn unknown_frame_type_maps_to_unknown() {
        let msg: DxLinkMessage =
            serde_json::from_str(r#"{"type":"CHANNEL_CLOSED","channel":3}"#).unwrap();
        assert_eq!(msg, DxLinkMessage::Unknown);
    }

    #[test]
    fn feed_data_roundtrip() {
        let json = r#"{"type":"FEED_DATA","channel":3,"data":[["Quote","AAPL",172.5,172.52,3,5]]}"#;
        let msg: DxLinkMessage = serde_json::from_str(json).unwrap();
        match msg {
            DxLinkMessage::FeedData(data) => {
                assert_eq!(data.channel, 3);
                assert_eq!(data.data.len(), 1);
            }
            other => panic!("expected FEED_DATA, got {other:?}"),
        }
    }
}
