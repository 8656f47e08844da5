//! DXLink WebSocket Adapter
//!
//! Implements the DXLink multiplexed-channel feed protocol:
//!
//! - **messages**: Wire frame types (SETUP, AUTH, FEED_*, KEEPALIVE)
//! - **codec**: JSON frame codec and compact event decoding
//! - **handshake**: Message-driven connection state machine
//! - **keepalive**: Periodic KEEPALIVE sender
//! - **normalizer**: Per-symbol quote/candle normalization
//! - **client**: The assembled streaming client

pub mod client;
pub mod codec;
pub mod handshake;
pub mod keepalive;
pub mod messages;
pub mod normalizer;

pub use client::{DxLinkClient, StreamError, StreamEvent};
pub use codec::{CodecError, FeedEvent, JsonCodec, decode_feed_events};
pub use handshake::{HandshakeMachine, HandshakeState};
pub use keepalive::{KEEPALIVE_INTERVAL, KeepaliveConfig, KeepaliveTicker};
pub use messages::*;
pub use normalizer::{FeedNormalizer, NormalizedEvent, SymbolState};
