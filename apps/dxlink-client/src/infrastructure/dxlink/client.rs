//! DXLink Streaming Client
//!
//! Ties the pieces together: token exchange, WebSocket transport,
//! handshake, subscription management, and normalized event delivery.
//!
//! Task layout per connection:
//! - a writer task owns the WebSocket sink and drains an mpsc queue,
//!   so every outbound frame is serialized through one writer
//! - a read-loop task drives the handshake machine and the normalizer
//! - a keepalive task, started once the handshake reaches streaming,
//!   enqueues KEEPALIVE frames every 30 seconds
//!
//! Callbacks are invoked with no internal locks held, so a callback may
//! call [`DxLinkClient::disconnect`] without deadlocking.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::application::ports::SymbolResolver;
use crate::domain::market_data::{CandleBuffer, CandleData, SymbolQuote};
use crate::domain::subscription::SubscriptionSet;
use crate::infrastructure::config::StreamSettings;
use crate::infrastructure::metrics;
use crate::infrastructure::tastytrade::{QuoteTokenClient, TokenError};

use super::codec::{decode_feed_events, FeedEvent, JsonCodec};
use super::handshake::{HandshakeMachine, HandshakeState};
use super::keepalive::{KeepaliveConfig, KeepaliveTicker};
use super::messages::{
    symbol_interest_entries, DxLinkMessage, FeedDataMessage, FeedSubscriptionMessage,
    SubscriptionEntry,
};
use super::normalizer::{FeedNormalizer, NormalizedEvent};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Outbound queue depth. The writer drains promptly; this only absorbs
/// bursts of subscription frames.
const OUTBOUND_QUEUE_DEPTH: usize = 256;

// =============================================================================
// Errors and Events
// =============================================================================

/// Failures surfaced by the streaming client.
#[derive(Debug, Error)]
pub enum StreamError {
    /// Account has no streaming market data entitlement.
    #[error("account is not entitled to streaming market data")]
    NotEntitled,

    /// Token exchange returned a non-success status.
    #[error("quote token exchange failed with status {0}")]
    TokenExchange(u16),

    /// Transport-level failure (dial, token fetch, or mid-stream).
    #[error("connection failed: {0}")]
    Connection(String),

    /// WebSocket protocol failure.
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Handshake did not reach streaming within the configured timeout.
    #[error("handshake did not complete in time")]
    HandshakeStalled,
}

impl From<TokenError> for StreamError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::NotEntitled => Self::NotEntitled,
            TokenError::Exchange(status) => Self::TokenExchange(status),
            TokenError::Transport(inner) => Self::Connection(inner),
        }
    }
}

/// Lifecycle notifications delivered to the lifecycle callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEvent {
    /// Handshake completed, feed data flowing.
    Connected,
    /// Connection ended (remote close, transport error, or disconnect).
    Disconnected,
}

type QuoteCallback = Arc<dyn Fn(SymbolQuote) + Send + Sync>;
type CandleCallback = Arc<dyn Fn(&str, &CandleData) + Send + Sync>;
type LifecycleCallback = Arc<dyn Fn(StreamEvent) + Send + Sync>;

// =============================================================================
// Symbol Directory
// =============================================================================

/// Bidirectional requested/native symbol mapping.
///
/// Candle symbols (`SYM{=period}`) get a reverse-only alias so candle
/// events route back to the requested symbol without clobbering the
/// equity's native mapping.
#[derive(Debug, Default)]
struct SymbolDirectory {
    to_requested: HashMap<String, String>,
    to_native: HashMap<String, String>,
}

impl SymbolDirectory {
    fn insert(&mut self, requested: &str, native: &str) {
        self.to_requested
            .insert(native.to_string(), requested.to_string());
        self.to_native
            .insert(requested.to_string(), native.to_string());
    }

    fn alias(&mut self, native: &str, requested: &str) {
        self.to_requested
            .insert(native.to_string(), requested.to_string());
    }

    fn requested_for(&self, native: &str) -> Option<String> {
        self.to_requested.get(native).cloned()
    }

    fn native_for(&self, requested: &str) -> Option<String> {
        self.to_native.get(requested).cloned()
    }

    fn clear(&mut self) {
        self.to_requested.clear();
        self.to_native.clear();
    }
}

// =============================================================================
// Shared State
// =============================================================================

struct Callbacks {
    quote: Mutex<Option<QuoteCallback>>,
    candle: Mutex<Option<CandleCallback>>,
    lifecycle: Mutex<Option<LifecycleCallback>>,
}

struct Shared {
    settings: StreamSettings,
    resolver: Arc<dyn SymbolResolver>,
    subscriptions: Mutex<SubscriptionSet>,
    normalizer: Mutex<FeedNormalizer>,
    candles: Mutex<HashMap<String, CandleBuffer>>,
    directory: Mutex<SymbolDirectory>,
    callbacks: Callbacks,
    state_tx: watch::Sender<HandshakeState>,
    outbound: Mutex<Option<mpsc::Sender<DxLinkMessage>>>,
}

impl Shared {
    fn state(&self) -> HandshakeState {
        *self.state_tx.borrow()
    }

    fn set_state(&self, state: HandshakeState) {
        self.state_tx.send_replace(state);
    }

    /// Enqueue a frame for the writer. Dropped silently (with a log
    /// line) when no connection is up.
    fn send_frame(&self, frame: DxLinkMessage) {
        let sender = self.outbound.lock().clone();
        match sender {
            Some(tx) => {
                if let Err(err) = tx.try_send(frame) {
                    warn!(%err, "failed to enqueue outbound frame");
                }
            }
            None => debug!("dropping outbound frame, no connection"),
        }
    }

    fn emit_lifecycle(&self, event: StreamEvent) {
        let callback = self.callbacks.lifecycle.lock().clone();
        if let Some(callback) = callback {
            callback(event);
        }
    }

    fn emit_quote(&self, quote: SymbolQuote) {
        let callback = self.callbacks.quote.lock().clone();
        if let Some(callback) = callback {
            callback(quote);
        }
    }

    fn emit_candle(&self, symbol: &str, candle: &CandleData) {
        let callback = self.callbacks.candle.lock().clone();
        if let Some(callback) = callback {
            callback(symbol, candle);
        }
    }

    /// Resolve symbols to native form, recording mappings. A failed
    /// lookup degrades to the upper-cased literal and never aborts the
    /// batch.
    async fn resolve_symbols(&self, symbols: &[String]) -> Vec<(String, String)> {
        let mut resolved = Vec::with_capacity(symbols.len());

        for symbol in symbols {
            let native = match self.resolver.resolve(symbol).await {
                Ok(native) => native,
                Err(err) => {
                    warn!(symbol, %err, "symbol resolution failed, using literal form");
                    symbol.to_uppercase()
                }
            };
            resolved.push((symbol.clone(), native));
        }

        let mut directory = self.directory.lock();
        for (requested, native) in &resolved {
            directory.insert(requested, native);
        }

        resolved
    }

    /// Send the full current interest set with a reset. Used when the
    /// handshake completes with symbols already committed.
    async fn send_full_subscription(&self) {
        let symbols = self.subscriptions.lock().symbols();
        if symbols.is_empty() {
            return;
        }

        let resolved = self.resolve_symbols(&symbols).await;
        let natives: Vec<String> = resolved.into_iter().map(|(_, native)| native).collect();
        let entries = symbol_interest_entries(&natives);

        info!(symbols = symbols.len(), "sending initial feed subscription");
        self.send_frame(DxLinkMessage::FeedSubscription(
            FeedSubscriptionMessage::reset_add(self.settings.feed_channel, entries),
        ));
    }

    /// Send remove/add frames for a watch-list change while streaming.
    async fn send_subscription_diff(&self, to_add: &[String], to_remove: &[String]) {
        if !to_remove.is_empty() {
            let natives: Vec<String> = {
                let directory = self.directory.lock();
                to_remove
                    .iter()
                    .map(|symbol| {
                        directory
                            .native_for(symbol)
                            .unwrap_or_else(|| symbol.to_uppercase())
                    })
                    .collect()
            };
            let entries = symbol_interest_entries(&natives);
            self.send_frame(DxLinkMessage::FeedSubscription(
                FeedSubscriptionMessage::remove(self.settings.feed_channel, entries),
            ));
        }

        if !to_add.is_empty() {
            let resolved = self.resolve_symbols(to_add).await;
            let natives: Vec<String> = resolved.into_iter().map(|(_, native)| native).collect();
            let entries = symbol_interest_entries(&natives);
            self.send_frame(DxLinkMessage::FeedSubscription(FeedSubscriptionMessage::add(
                self.settings.feed_channel,
                entries,
            )));
        }
    }

    /// Gate an inbound FEED_DATA frame. Events only count when the
    /// frame targets the channel this session opened and the handshake
    /// has reached streaming.
    fn handle_feed_frame(&self, frame: &FeedDataMessage) {
        if frame.channel != self.settings.feed_channel {
            debug!(channel = frame.channel, "feed data for a foreign channel, ignoring");
            return;
        }
        if !self.state().is_streaming() {
            debug!("feed data before streaming state, ignoring");
            return;
        }
        self.handle_feed_data(&frame.data);
    }

    /// Fold a FEED_DATA batch into state and deliver callbacks.
    fn handle_feed_data(&self, data: &[serde_json::Value]) {
        let events = decode_feed_events(data);
        metrics::record_feed_events(events.len() as u64);

        for event in events {
            let native = match &event {
                FeedEvent::Quote { symbol, .. }
                | FeedEvent::Trade { symbol, .. }
                | FeedEvent::Summary { symbol, .. }
                | FeedEvent::Candle { symbol, .. } => symbol.clone(),
            };

            let requested = self
                .directory
                .lock()
                .requested_for(&native)
                .unwrap_or(native);

            let normalized = self.normalizer.lock().apply(&requested, &event);

            match normalized {
                Some(NormalizedEvent::Quote(quote)) => {
                    metrics::record_quote(&quote.symbol);
                    self.emit_quote(quote);
                }
                Some(NormalizedEvent::Candle { symbol, candle }) => {
                    metrics::record_candle(&symbol);
                    self.candles
                        .lock()
                        .entry(symbol.clone())
                        .or_insert_with(|| CandleBuffer::new(self.settings.candle_capacity))
                        .upsert(candle.clone());
                    self.emit_candle(&symbol, &candle);
                }
                None => {}
            }
        }
    }

    /// Spawn the keepalive ticker for the current connection. Called
    /// when the handshake reaches streaming; the negotiated timeout
    /// only starts mattering once the gateway accepts the session.
    fn start_keepalive(&self, cancel: &CancellationToken) {
        let Some(outbound) = self.outbound.lock().clone() else {
            return;
        };

        tokio::spawn(
            KeepaliveTicker::new(
                KeepaliveConfig {
                    interval: self.settings.keepalive_interval,
                },
                outbound,
                cancel.clone(),
            )
            .run(),
        );
    }

    /// Drop all session-scoped state.
    fn reset_session_state(&self) {
        self.subscriptions.lock().clear();
        self.normalizer.lock().clear();
        self.candles.lock().clear();
        self.directory.lock().clear();
        *self.outbound.lock() = None;
    }
}

// =============================================================================
// Read Loop
// =============================================================================

struct ReadLoop {
    stream: SplitStream<WsStream>,
    machine: HandshakeMachine,
    shared: Arc<Shared>,
    cancel: CancellationToken,
}

impl ReadLoop {
    async fn run(mut self) {
        loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    debug!("read loop cancelled");
                    break;
                }
                inbound = self.stream.next() => match inbound {
                    Some(Ok(Message::Text(text))) => self.on_text(text.as_str()).await,
                    Some(Ok(Message::Close(frame))) => {
                        info!(?frame, "gateway closed the connection");
                        self.on_connection_lost();
                        break;
                    }
                    Some(Ok(_)) => {} // ping/pong handled by the transport
                    Some(Err(err)) => {
                        error!(%err, "websocket read error");
                        self.on_connection_lost();
                        break;
                    }
                    None => {
                        info!("websocket stream ended");
                        self.on_connection_lost();
                        break;
                    }
                }
            }
        }
    }

    async fn on_text(&mut self, text: &str) {
        let message = match JsonCodec::decode(text) {
            Ok(message) => message,
            Err(err) => {
                warn!(%err, "discarding undecodable frame");
                return;
            }
        };
        metrics::record_frame(&message);

        if let DxLinkMessage::FeedData(data) = &message {
            self.shared.handle_feed_frame(data);
            return;
        }

        let was_streaming = self.machine.state().is_streaming();
        let replies = self.machine.on_message(&message);
        self.shared.set_state(self.machine.state());

        for reply in replies {
            self.shared.send_frame(reply);
        }

        if !was_streaming && self.machine.state().is_streaming() {
            metrics::record_connected();
            self.shared.start_keepalive(&self.cancel);
            self.shared.send_full_subscription().await;
            self.shared.emit_lifecycle(StreamEvent::Connected);
        }
    }

    /// Remote close or transport failure. No automatic reconnect;
    /// callers fall back to polling and decide when to dial again.
    fn on_connection_lost(&mut self) {
        self.machine.on_close();
        self.shared.set_state(HandshakeState::Closed);
        metrics::record_disconnected();
        if !self.cancel.is_cancelled() {
            self.shared.emit_lifecycle(StreamEvent::Disconnected);
        }
    }
}

async fn run_writer(
    mut sink: SplitSink<WsStream, Message>,
    mut queue: mpsc::Receiver<DxLinkMessage>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            () = cancel.cancelled() => {
                let _ = sink.close().await;
                break;
            }
            frame = queue.recv() => match frame {
                Some(frame) => {
                    let text = match JsonCodec::encode(&frame) {
                        Ok(text) => text,
                        Err(err) => {
                            error!(%err, "failed to encode outbound frame");
                            continue;
                        }
                    };
                    if let Err(err) = sink.send(Message::text(text)).await {
                        warn!(%err, "websocket write failed, writer stopping");
                        break;
                    }
                }
                None => {
                    let _ = sink.close().await;
                    break;
                }
            }
        }
    }
}

// =============================================================================
// Client
// =============================================================================

/// Streaming market data client for the DXLink gateway.
pub struct DxLinkClient {
    token_client: QuoteTokenClient,
    shared: Arc<Shared>,
    session: Mutex<Option<Session>>,
}

struct Session {
    cancel: CancellationToken,
}

impl DxLinkClient {
    /// Create a client. No I/O happens until [`DxLinkClient::connect`].
    #[must_use]
    pub fn new(
        token_client: QuoteTokenClient,
        resolver: Arc<dyn SymbolResolver>,
        settings: StreamSettings,
    ) -> Self {
        let (state_tx, _) = watch::channel(HandshakeState::Disconnected);

        Self {
            token_client,
            shared: Arc::new(Shared {
                settings,
                resolver,
                subscriptions: Mutex::new(SubscriptionSet::new()),
                normalizer: Mutex::new(FeedNormalizer::new()),
                candles: Mutex::new(HashMap::new()),
                directory: Mutex::new(SymbolDirectory::default()),
                callbacks: Callbacks {
                    quote: Mutex::new(None),
                    candle: Mutex::new(None),
                    lifecycle: Mutex::new(None),
                },
                state_tx,
                outbound: Mutex::new(None),
            }),
            session: Mutex::new(None),
        }
    }

    /// Register the quote callback. A later registration replaces the
    /// earlier one.
    pub fn on_quote(&self, callback: impl Fn(SymbolQuote) + Send + Sync + 'static) {
        *self.shared.callbacks.quote.lock() = Some(Arc::new(callback));
    }

    /// Register the candle callback. A later registration replaces the
    /// earlier one.
    pub fn on_candle(&self, callback: impl Fn(&str, &CandleData) + Send + Sync + 'static) {
        *self.shared.callbacks.candle.lock() = Some(Arc::new(callback));
    }

    /// Register the lifecycle callback. A later registration replaces
    /// the earlier one.
    pub fn on_lifecycle(&self, callback: impl Fn(StreamEvent) + Send + Sync + 'static) {
        *self.shared.callbacks.lifecycle.lock() = Some(Arc::new(callback));
    }

    /// Current handshake phase.
    #[must_use]
    pub fn state(&self) -> HandshakeState {
        self.shared.state()
    }

    /// Exchange the session token, dial the gateway, drive the
    /// handshake to streaming, and subscribe the given watch list.
    ///
    /// # Errors
    ///
    /// Fails on entitlement or token-exchange errors, transport
    /// failures, or when the handshake stalls past the configured
    /// timeout. The client is fully torn down on failure; calling
    /// connect again is safe.
    pub async fn connect(&self, symbols: &[String]) -> Result<(), StreamError> {
        self.disconnect();
        self.shared.subscriptions.lock().replace(symbols);

        let credentials = self.token_client.fetch().await?;
        info!(level = %credentials.level, "quote token acquired, dialing gateway");

        self.shared.set_state(HandshakeState::Connecting);
        let (ws, _) = connect_async(credentials.gateway_url.as_str()).await?;
        let (sink, stream) = ws.split();

        let cancel = CancellationToken::new();
        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_QUEUE_DEPTH);
        *self.shared.outbound.lock() = Some(outbound_tx);
        *self.session.lock() = Some(Session {
            cancel: cancel.clone(),
        });

        tokio::spawn(run_writer(sink, outbound_rx, cancel.clone()));

        let mut machine = HandshakeMachine::new(self.shared.settings.feed_channel, credentials.token);
        for frame in machine.on_open() {
            self.shared.send_frame(frame);
        }
        self.shared.set_state(machine.state());

        tokio::spawn(
            ReadLoop {
                stream,
                machine,
                shared: Arc::clone(&self.shared),
                cancel,
            }
            .run(),
        );

        self.await_streaming().await
    }

    async fn await_streaming(&self) -> Result<(), StreamError> {
        let mut state_rx = self.shared.state_tx.subscribe();

        let wait = async {
            loop {
                let state = *state_rx.borrow_and_update();
                if state.is_streaming() {
                    return Ok(());
                }
                if state.is_terminal() {
                    return Err(StreamError::Connection(
                        "connection closed during handshake".to_string(),
                    ));
                }
                if state_rx.changed().await.is_err() {
                    return Err(StreamError::Connection(
                        "state channel closed during handshake".to_string(),
                    ));
                }
            }
        };

        match tokio::time::timeout(self.shared.settings.handshake_timeout, wait).await {
            Ok(result) => {
                if result.is_err() {
                    self.disconnect();
                }
                result
            }
            Err(_) => {
                warn!("handshake timed out");
                self.disconnect();
                Err(StreamError::HandshakeStalled)
            }
        }
    }

    /// Replace the watch list with `symbols`.
    ///
    /// Ignored unless the feed is streaming; the watch list for the
    /// next session is whatever gets passed to [`DxLinkClient::connect`].
    /// While streaming, remove/add frames go out for the diff.
    pub async fn update_symbols(&self, symbols: &[String]) {
        if !self.shared.state().is_streaming() {
            debug!("not streaming, ignoring watch list update");
            return;
        }

        let diff = self.shared.subscriptions.lock().replace(symbols);
        if diff.is_empty() {
            debug!("watch list unchanged");
            return;
        }

        self.shared
            .send_subscription_diff(&diff.to_add, &diff.to_remove)
            .await;
    }

    /// Subscribe to candles for one symbol at the given period (for
    /// example `"5m"` or `"1d"`).
    ///
    /// `from_time` is the history start in epoch seconds; when absent
    /// it defaults to the configured lookback before now.
    pub async fn subscribe_to_candles(&self, symbol: &str, period: &str, from_time: Option<i64>) {
        let resolved = self.shared.resolve_symbols(&[symbol.to_string()]).await;
        let Some((requested, native)) = resolved.into_iter().next() else {
            return;
        };

        let candle_symbol = format!("{native}{{={period}}}");
        self.shared.directory.lock().alias(&candle_symbol, &requested);
        self.shared
            .candles
            .lock()
            .entry(requested.clone())
            .or_insert_with(|| CandleBuffer::new(self.shared.settings.candle_capacity));

        let from_time = from_time.unwrap_or_else(|| {
            (Utc::now() - self.shared.settings.candle_history).timestamp()
        });
        info!(symbol = %requested, candle_symbol, from_time, "subscribing to candles");

        self.shared.send_frame(DxLinkMessage::FeedSubscription(
            FeedSubscriptionMessage::add(
                self.shared.settings.feed_channel,
                vec![SubscriptionEntry::candle(candle_symbol, from_time)],
            ),
        ));
    }

    /// Seed per-symbol state from a REST snapshot so the first streamed
    /// tick has a change baseline.
    pub fn initialize_symbol_state(&self, symbol: &str, last_price: f64, volume: f64) {
        self.shared.normalizer.lock().seed(symbol, last_price, volume);
    }

    /// Buffered candles for a symbol, oldest first.
    #[must_use]
    pub fn candles(&self, symbol: &str) -> Vec<CandleData> {
        self.shared
            .candles
            .lock()
            .get(symbol)
            .map(|buffer| buffer.as_slice().to_vec())
            .unwrap_or_default()
    }

    /// Tear the connection down and drop all session state.
    ///
    /// Idempotent and safe to call from inside a callback: it never
    /// joins tasks or takes callback locks.
    pub fn disconnect(&self) {
        let session = self.session.lock().take();
        let Some(session) = session else {
            return;
        };

        info!("disconnecting");
        session.cancel.cancel();
        self.shared.reset_session_state();
        self.shared.set_state(HandshakeState::Disconnected);
        self.shared.emit_lifecycle(StreamEvent::Disconnected);
    }
}

impl Drop for DxLinkClient {
    fn drop(&mut self) {
        if let Some(session) = self.session.lock().take() {
            session.cancel.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::{MockSymbolResolver, ResolverError};
    use crate::infrastructure::tastytrade::QuoteTokenClient;

    fn client_with_resolver(resolver: MockSymbolResolver) -> DxLinkClient {
        DxLinkClient::new(
            QuoteTokenClient::new("https://api.example.com", "session-token"),
            Arc::new(resolver),
            StreamSettings::default(),
        )
    }

    #[tokio::test]
    async fn resolution_failure_falls_back_to_uppercase_literal() {
        let mut resolver = MockSymbolResolver::new();
        resolver
            .expect_resolve()
            .returning(|symbol| match symbol {
                "BRK/B" => Err(ResolverError::Status(404)),
                other => Ok(format!("{other}-NATIVE")),
            });
        let client = client_with_resolver(resolver);

        let resolved = client
            .shared
            .resolve_symbols(&["aapl".to_string(), "BRK/B".to_string()])
            .await;

        assert_eq!(
            resolved,
            vec![
                ("aapl".to_string(), "aapl-NATIVE".to_string()),
                ("BRK/B".to_string(), "BRK/B".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn resolution_records_reverse_mapping() {
        let mut resolver = MockSymbolResolver::new();
        resolver
            .expect_resolve()
            .returning(|_| Ok("NVDA-NATIVE".to_string()));
        let client = client_with_resolver(resolver);

        client.shared.resolve_symbols(&["NVDA".to_string()]).await;

        let directory = client.shared.directory.lock();
        assert_eq!(directory.requested_for("NVDA-NATIVE"), Some("NVDA".to_string()));
        assert_eq!(directory.native_for("NVDA"), Some("NVDA-NATIVE".to_string()));
    }

    #[tokio::test]
    async fn update_symbols_is_ignored_unless_streaming() {
        let client = client_with_resolver(MockSymbolResolver::new());

        client
            .update_symbols(&["AAPL".to_string(), "MSFT".to_string()])
            .await;

        // Not streaming: the tracked set stays empty and nothing resolves.
        assert!(client.shared.subscriptions.lock().symbols().is_empty());
        assert!(client.shared.directory.lock().native_for("AAPL").is_none());
    }

    #[tokio::test]
    async fn update_symbols_while_streaming_sends_diff_frames() {
        let mut resolver = MockSymbolResolver::new();
        resolver
            .expect_resolve()
            .returning(|symbol| Ok(symbol.to_string()));
        let client = client_with_resolver(resolver);

        let (tx, mut rx) = mpsc::channel(OUTBOUND_QUEUE_DEPTH);
        *client.shared.outbound.lock() = Some(tx);
        client.shared.set_state(HandshakeState::Streaming);

        client.update_symbols(&["AAPL".to_string()]).await;

        match rx.try_recv() {
            Ok(DxLinkMessage::FeedSubscription(sub)) => {
                assert_eq!(sub.channel, client.shared.settings.feed_channel);
                assert!(sub.reset.is_none());
                assert!(sub.remove.is_none());
                let entries = sub.add.expect("add entries");
                assert!(entries.iter().all(|entry| entry.symbol == "AAPL"));
            }
            other => panic!("expected FEED_SUBSCRIPTION, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn feed_data_routes_through_reverse_mapping() {
        let client = client_with_resolver(MockSymbolResolver::new());
        client.shared.directory.lock().insert("SPY", "SPY-NATIVE");

        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&received);
        client.on_quote(move |quote| sink.lock().push(quote));

        client.shared.handle_feed_data(&[serde_json::json!([
            "Quote",
            "SPY-NATIVE",
            450.0,
            450.05
        ])]);

        let quotes = received.lock();
        assert_eq!(quotes.len(), 1);
        assert_eq!(quotes[0].symbol, "SPY");
        assert!((quotes[0].last_price - 450.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn feed_data_for_a_foreign_channel_is_ignored() {
        let client = client_with_resolver(MockSymbolResolver::new());
        client.shared.directory.lock().insert("AAPL", "AAPL");
        client.shared.set_state(HandshakeState::Streaming);

        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&received);
        client.on_quote(move |quote| sink.lock().push(quote));

        let event = serde_json::json!(["Quote", "AAPL", 100.0, 101.0]);

        client.shared.handle_feed_frame(&FeedDataMessage {
            channel: client.shared.settings.feed_channel + 2,
            data: vec![event.clone()],
        });
        assert!(received.lock().is_empty());
        assert!(client.shared.normalizer.lock().state("AAPL").is_none());

        client.shared.handle_feed_frame(&FeedDataMessage {
            channel: client.shared.settings.feed_channel,
            data: vec![event],
        });
        assert_eq!(received.lock().len(), 1);
    }

    #[tokio::test]
    async fn feed_data_before_streaming_is_ignored() {
        let client = client_with_resolver(MockSymbolResolver::new());
        client.shared.directory.lock().insert("AAPL", "AAPL");

        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&received);
        client.on_quote(move |quote| sink.lock().push(quote));

        client.shared.handle_feed_frame(&FeedDataMessage {
            channel: client.shared.settings.feed_channel,
            data: vec![serde_json::json!(["Quote", "AAPL", 100.0, 101.0])],
        });

        assert!(received.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn keepalive_ticks_once_started() {
        let client = client_with_resolver(MockSymbolResolver::new());
        let (tx, mut rx) = mpsc::channel(OUTBOUND_QUEUE_DEPTH);
        *client.shared.outbound.lock() = Some(tx);

        let cancel = CancellationToken::new();
        client.shared.start_keepalive(&cancel);
        // Let the ticker task run and register its timer before advancing.
        tokio::task::yield_now().await;

        tokio::time::advance(client.shared.settings.keepalive_interval).await;
        tokio::time::advance(std::time::Duration::from_secs(1)).await;

        let frame = rx.try_recv().expect("keepalive frame");
        assert_eq!(frame, DxLinkMessage::keepalive());
        cancel.cancel();
    }

    #[tokio::test]
    async fn candle_events_fill_the_buffer_and_fire_callback() {
        let client = client_with_resolver(MockSymbolResolver::new());
        client.shared.directory.lock().alias("AAPL{=5m}", "AAPL");

        let count = Arc::new(Mutex::new(0_usize));
        let sink = Arc::clone(&count);
        client.on_candle(move |_, _| *sink.lock() += 1);

        client.shared.handle_feed_data(&[
            serde_json::json!([
                "Candle",
                "AAPL{=5m}",
                1_700_000_000_000_i64,
                100.0,
                101.0,
                99.0,
                100.5,
                10.0
            ]),
            serde_json::json!([
                "Candle",
                "AAPL{=5m}",
                1_700_000_300_000_i64,
                100.5,
                102.0,
                100.0,
                101.5,
                12.0
            ]),
        ]);

        assert_eq!(*count.lock(), 2);
        let candles = client.candles("AAPL");
        assert_eq!(candles.len(), 2);
        assert!(candles[0].timestamp < candles[1].timestamp);
    }

    #[tokio::test]
    async fn initialize_symbol_state_seeds_change_baseline() {
        let client = client_with_resolver(MockSymbolResolver::new());
        client.shared.directory.lock().insert("AAPL", "AAPL");
        client.initialize_symbol_state("AAPL", 100.0, 0.0);

        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&received);
        client.on_quote(move |quote| sink.lock().push(quote));

        client
            .shared
            .handle_feed_data(&[serde_json::json!(["Trade", "AAPL", 105.0, 0.0, 10.0])]);

        let quotes = received.lock();
        assert!((quotes[0].change - 5.0).abs() < f64::EPSILON);
        assert!((quotes[0].change_percent - 5.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn disconnect_without_session_is_a_no_op() {
        let client = client_with_resolver(MockSymbolResolver::new());
        client.disconnect();
        client.disconnect();
        assert_eq!(client.state(), HandshakeState::Disconnected);
    }

    #[tokio::test]
    async fn send_frame_without_connection_drops_silently() {
        let client = client_with_resolver(MockSymbolResolver::new());
        client.shared.send_frame(DxLinkMessage::keepalive());
    }
}
