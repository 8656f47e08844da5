//! Keepalive Ticker
//!
//! Sends KEEPALIVE frames on channel 0 at a fixed cadence while the
//! connection is up. The cadence is half the negotiated 60-second
//! keepalive timeout, so a single missed tick does not drop the
//! session.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::messages::DxLinkMessage;

/// Interval between KEEPALIVE frames.
pub const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

/// Keepalive configuration.
#[derive(Debug, Clone, Copy)]
pub struct KeepaliveConfig {
    /// Interval between KEEPALIVE frames.
    pub interval: Duration,
}

impl Default for KeepaliveConfig {
    fn default() -> Self {
        Self {
            interval: KEEPALIVE_INTERVAL,
        }
    }
}

/// Periodic KEEPALIVE sender.
///
/// Runs as its own task; stops when cancelled or when the outbound
/// channel closes (writer task gone).
#[derive(Debug)]
pub struct KeepaliveTicker {
    config: KeepaliveConfig,
    outbound: mpsc::Sender<DxLinkMessage>,
    cancel: CancellationToken,
}

impl KeepaliveTicker {
    /// Create a ticker feeding the writer's outbound queue.
    #[must_use]
    pub const fn new(
        config: KeepaliveConfig,
        outbound: mpsc::Sender<DxLinkMessage>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            config,
            outbound,
            cancel,
        }
    }

    /// Run until cancelled or the writer goes away.
    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.config.interval);
        // First tick fires immediately; skip it so the cadence starts
        // one interval after the handshake.
        ticker.tick().await;

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    debug!("keepalive ticker stopping");
                    break;
                }
                _ = ticker.tick() => {
                    trace!("sending keepalive");
                    if self.outbound.send(DxLinkMessage::keepalive()).await.is_err() {
                        debug!("outbound queue closed, keepalive ticker stopping");
                        break;
                    }
                }
            }
        }
    }
}
