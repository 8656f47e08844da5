//! Prometheus Metrics Module
//!
//! Exposes streaming client metrics via the Prometheus format.
//!
//! # Metrics Categories
//!
//! - **Frames**: Counts of protocol frames received by type
//! - **Events**: Decoded feed events and normalized records delivered
//! - **Connections**: Handshake completions and connection losses

use std::sync::OnceLock;

use metrics::{counter, describe_counter};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::infrastructure::dxlink::messages::DxLinkMessage;

// =============================================================================
// Global Metrics Handle
// =============================================================================

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics recorder.
///
/// # Panics
///
/// Panics if the recorder cannot be installed.
#[allow(clippy::expect_used)]
pub fn init_metrics() -> PrometheusHandle {
    PROMETHEUS_HANDLE
        .get_or_init(|| {
            let builder = PrometheusBuilder::new();
            let handle = builder
                .install_recorder()
                .expect("failed to install Prometheus recorder");

            register_metrics();
            handle
        })
        .clone()
}

/// Get the Prometheus handle for rendering metrics.
///
/// Returns `None` if metrics have not been initialized.
#[must_use]
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    describe_counter!(
        "dxlink_frames_received_total",
        "Total protocol frames received from the gateway by frame type"
    );
    describe_counter!(
        "dxlink_feed_events_total",
        "Total compact feed events decoded from FEED_DATA batches"
    );
    describe_counter!(
        "dxlink_quotes_delivered_total",
        "Total normalized quotes delivered to the quote callback"
    );
    describe_counter!(
        "dxlink_candles_delivered_total",
        "Total candles delivered to the candle callback"
    );
    describe_counter!(
        "dxlink_connections_total",
        "Total handshakes that reached the streaming state"
    );
    describe_counter!(
        "dxlink_disconnects_total",
        "Total connection losses (remote close or transport error)"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

const fn frame_label(message: &DxLinkMessage) -> &'static str {
    match message {
        DxLinkMessage::Setup(_) => "setup",
        DxLinkMessage::Auth(_) => "auth",
        DxLinkMessage::AuthState(_) => "auth_state",
        DxLinkMessage::ChannelRequest(_) => "channel_request",
        DxLinkMessage::ChannelOpened(_) => "channel_opened",
        DxLinkMessage::FeedSetup(_) => "feed_setup",
        DxLinkMessage::FeedConfig(_) => "feed_config",
        DxLinkMessage::FeedSubscription(_) => "feed_subscription",
        DxLinkMessage::FeedData(_) => "feed_data",
        DxLinkMessage::Keepalive(_) => "keepalive",
        DxLinkMessage::Error(_) => "error",
        DxLinkMessage::Unknown => "unknown",
    }
}

/// Record one inbound protocol frame.
pub fn record_frame(message: &DxLinkMessage) {
    counter!(
        "dxlink_frames_received_total",
        "frame_type" => frame_label(message)
    )
    .increment(1);
}

/// Record decoded feed events from one FEED_DATA batch.
pub fn record_feed_events(count: u64) {
    counter!("dxlink_feed_events_total").increment(count);
}

/// Record a normalized quote delivered to the callback.
pub fn record_quote(symbol: &str) {
    counter!(
        "dxlink_quotes_delivered_total",
        "symbol" => symbol.to_string()
    )
    .increment(1);
}

/// Record a candle delivered to the callback.
pub fn record_candle(symbol: &str) {
    counter!(
        "dxlink_candles_delivered_total",
        "symbol" => symbol.to_string()
    )
    .increment(1);
}

/// Record a handshake reaching the streaming state.
pub fn record_connected() {
    counter!("dxlink_connections_total").increment(1);
}

/// Record a connection loss.
pub fn record_disconnected() {
    counter!("dxlink_disconnects_total").increment(1);
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_labels() {
        assert_eq!(frame_label(&DxLinkMessage::setup()), "setup");
        assert_eq!(frame_label(&DxLinkMessage::keepalive()), "keepalive");
        assert_eq!(frame_label(&DxLinkMessage::Unknown), "unknown");
    }
}
