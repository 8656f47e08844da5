//! Handshake State Machine
//!
//! Drives the DXLink connection from socket-open to streaming. The
//! machine never acts on timers; every transition is caused by exactly
//! one inbound frame (or the initial socket-open event), and each
//! transition may emit frames to send.
//!
//! ```text
//! Disconnected -> Connecting -> AwaitingAuthState -> [Authorizing]
//!     -> AwaitingChannel -> AwaitingFeedConfig -> Streaming
//! ```
//!
//! The gateway may report AUTHORIZED without a prior UNAUTHORIZED
//! round-trip (token still valid from a previous session), so the
//! AUTHORIZED transition is accepted from both AwaitingAuthState and
//! Authorizing. Frames that do not match the expected type, channel,
//! or state are ignored rather than treated as errors.

use tracing::{debug, info, warn};

use super::messages::{AuthorizationState, DxLinkMessage};

// =============================================================================
// State
// =============================================================================

/// Connection phases of the DXLink handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    /// No socket.
    Disconnected,
    /// Socket dial in progress.
    Connecting,
    /// SETUP sent, waiting for AUTH_STATE.
    AwaitingAuthState,
    /// AUTH sent, waiting for AUTHORIZED.
    Authorizing,
    /// CHANNEL_REQUEST sent, waiting for CHANNEL_OPENED.
    AwaitingChannel,
    /// FEED_SETUP sent, waiting for FEED_CONFIG.
    AwaitingFeedConfig,
    /// Fully established, feed data flowing.
    Streaming,
    /// Torn down, terminal.
    Closed,
}

impl HandshakeState {
    /// Check whether the feed is fully established.
    #[must_use]
    pub const fn is_streaming(&self) -> bool {
        matches!(self, Self::Streaming)
    }

    /// Check whether this state is terminal.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed)
    }
}

// =============================================================================
// Machine
// =============================================================================

/// Message-driven handshake machine.
///
/// Owns no I/O. The read loop feeds inbound frames through
/// [`HandshakeMachine::on_message`] and writes whatever frames come
/// back out.
#[derive(Debug)]
pub struct HandshakeMachine {
    state: HandshakeState,
    feed_channel: u64,
    token: String,
}

impl HandshakeMachine {
    /// Create a machine that will authenticate with `token` and open
    /// the feed on `feed_channel`.
    #[must_use]
    pub const fn new(feed_channel: u64, token: String) -> Self {
        Self {
            state: HandshakeState::Disconnected,
            feed_channel,
            token,
        }
    }

    /// Current phase.
    #[must_use]
    pub const fn state(&self) -> HandshakeState {
        self.state
    }

    /// Mark the dial as started.
    pub fn on_connecting(&mut self) {
        self.state = HandshakeState::Connecting;
    }

    /// React to the socket opening: emit SETUP and await AUTH_STATE.
    pub fn on_open(&mut self) -> Vec<DxLinkMessage> {
        self.state = HandshakeState::AwaitingAuthState;
        vec![DxLinkMessage::setup()]
    }

    /// Mark the connection as torn down.
    pub fn on_close(&mut self) {
        self.state = HandshakeState::Closed;
    }

    /// Process one inbound frame, returning frames to send in order.
    ///
    /// Frames that do not advance the handshake (wrong type for the
    /// current state, wrong channel, or arriving while streaming)
    /// return an empty vec.
    pub fn on_message(&mut self, message: &DxLinkMessage) -> Vec<DxLinkMessage> {
        match (self.state, message) {
            (
                HandshakeState::AwaitingAuthState,
                DxLinkMessage::AuthState(auth),
            ) if auth.state == AuthorizationState::Unauthorized => {
                debug!("gateway requires authorization, sending token");
                self.state = HandshakeState::Authorizing;
                vec![DxLinkMessage::auth(self.token.clone())]
            }

            // AUTHORIZED can arrive without a prior UNAUTHORIZED.
            (
                HandshakeState::AwaitingAuthState | HandshakeState::Authorizing,
                DxLinkMessage::AuthState(auth),
            ) if auth.state == AuthorizationState::Authorized => {
                debug!(channel = self.feed_channel, "authorized, opening feed channel");
                self.state = HandshakeState::AwaitingChannel;
                vec![DxLinkMessage::channel_request(self.feed_channel)]
            }

            (HandshakeState::AwaitingChannel, DxLinkMessage::ChannelOpened(opened))
                if opened.channel == self.feed_channel =>
            {
                debug!(channel = opened.channel, "feed channel opened, configuring feed");
                self.state = HandshakeState::AwaitingFeedConfig;
                vec![DxLinkMessage::feed_setup(self.feed_channel)]
            }

            (HandshakeState::AwaitingFeedConfig, DxLinkMessage::FeedConfig(config))
                if config.channel == self.feed_channel =>
            {
                info!(channel = config.channel, "feed configured, streaming");
                self.state = HandshakeState::Streaming;
                vec![]
            }

            (_, DxLinkMessage::Error(err)) => {
                warn!(
                    error = err.error.as_deref().unwrap_or("unknown"),
                    message = err.message.as_deref().unwrap_or(""),
                    "gateway reported error"
                );
                vec![]
            }

            _ => {
                debug!(state = ?self.state, "ignoring frame that does not advance handshake");
                vec![]
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::dxlink::messages::{
        AuthStateMessage, ChannelOpenedMessage, FeedConfigMessage,
    };

    fn auth_state(state: AuthorizationState) -> DxLinkMessage {
        DxLinkMessage::AuthState(AuthStateMessage { channel: 0, state })
    }

    fn channel_opened(channel: u64) -> DxLinkMessage {
        DxLinkMessage::ChannelOpened(ChannelOpenedMessage {
            channel,
            service: Some("FEED".to_string()),
        })
    }

    fn feed_config(channel: u64) -> DxLinkMessage {
        DxLinkMessage::FeedConfig(FeedConfigMessage {
            channel,
            data_format: Some("COMPACT".to_string()),
            aggregation_period: Some(0.1),
        })
    }

    fn machine() -> HandshakeMachine {
        HandshakeMachine::new(3, "token-abc".to_string())
    }

    #[test]
    fn full_handshake_sequence() {
        let mut hs = machine();

        let out = hs.on_open();
        assert!(matches!(out.as_slice(), [DxLinkMessage::Setup(_)]));
        assert_eq!(hs.state(), HandshakeState::AwaitingAuthState);

        let out = hs.on_message(&auth_state(AuthorizationState::Unauthorized));
        assert!(matches!(out.as_slice(), [DxLinkMessage::Auth(a)] if a.token == "token-abc"));
        assert_eq!(hs.state(), HandshakeState::Authorizing);

        let out = hs.on_message(&auth_state(AuthorizationState::Authorized));
        assert!(matches!(out.as_slice(), [DxLinkMessage::ChannelRequest(r)] if r.channel == 3));
        assert_eq!(hs.state(), HandshakeState::AwaitingChannel);

        let out = hs.on_message(&channel_opened(3));
        assert!(matches!(out.as_slice(), [DxLinkMessage::FeedSetup(s)] if s.channel == 3));
        assert_eq!(hs.state(), HandshakeState::AwaitingFeedConfig);

        let out = hs.on_message(&feed_config(3));
        assert!(out.is_empty());
        assert!(hs.state().is_streaming());
    }

    #[test]
    fn authorized_without_prior_unauthorized_skips_auth() {
        let mut hs = machine();
        hs.on_open();

        let out = hs.on_message(&auth_state(AuthorizationState::Authorized));
        assert!(matches!(out.as_slice(), [DxLinkMessage::ChannelRequest(_)]));
        assert_eq!(hs.state(), HandshakeState::AwaitingChannel);
    }

    #[test]
    fn out_of_order_frame_is_ignored() {
        let mut hs = machine();
        hs.on_open();

        // FEED_CONFIG before the channel is even requested.
        let out = hs.on_message(&feed_config(3));
        assert!(out.is_empty());
        assert_eq!(hs.state(), HandshakeState::AwaitingAuthState);
    }

    #[test]
    fn channel_opened_for_wrong_channel_is_ignored() {
        let mut hs = machine();
        hs.on_open();
        hs.on_message(&auth_state(AuthorizationState::Authorized));

        let out = hs.on_message(&channel_opened(7));
        assert!(out.is_empty());
        assert_eq!(hs.state(), HandshakeState::AwaitingChannel);
    }

    #[test]
    fn duplicate_authorized_while_streaming_is_ignored() {
        let mut hs = machine();
        hs.on_open();
        hs.on_message(&auth_state(AuthorizationState::Authorized));
        hs.on_message(&channel_opened(3));
        hs.on_message(&feed_config(3));
        assert!(hs.state().is_streaming());

        let out = hs.on_message(&auth_state(AuthorizationState::Authorized));
        assert!(out.is_empty());
        assert!(hs.state().is_streaming());
    }

    #[test]
    fn unknown_frame_is_ignored() {
        let mut hs = machine();
        hs.on_open();

        let out = hs.on_message(&DxLinkMessage::Unknown);
        assert!(out.is_empty());
        assert_eq!(hs.state(), HandshakeState::AwaitingAuthState);
    }

    #[test]
    fn close_is_terminal() {
        let mut hs = machine();
        hs.on_open();
        hs.on_close();

        assert!(hs.state().is_terminal());
        let out = hs.on_message(&auth_state(AuthorizationState::Authorized));
        assert!(out.is_empty());
        assert_eq!(hs.state(), HandshakeState::Closed);
    }
}
