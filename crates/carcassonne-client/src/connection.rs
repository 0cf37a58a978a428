//! Connection lifecycle state machine.
//!
//! [`Connection`] owns every decision about the socket (when to open it, what
//! to send, when to retry) but performs no I/O itself. Each input returns a
//! list of [`Effect`]s that the driver in [`crate::transport`] carries out in
//! order. This keeps reconnect and queueing rules testable without a server.
//!
//! ```text
//! Disconnected --connect--> Connecting --open--> Connected
//! Connected --close(1000)--> Disconnected
//! Connected --close(other)--> Reconnecting --open--> Connected
//! Reconnecting --attempts exhausted--> Failed
//! ```

use crate::config::TransportConfig;
use crate::error::TransportError;
use crate::frame::FrameParser;
use crate::protocol::{Envelope, InboundMessage, OutboundMessage};
use carcassonne_core::PlayerColor;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// WebSocket close code for a deliberate shutdown
pub const CLOSE_NORMAL: u16 = 1000;
/// Close code used when the socket dropped without a close frame
pub const CLOSE_ABNORMAL: u16 = 1006;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    /// Reconnect attempts exhausted; only an explicit `connect` leaves this
    Failed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Reconnecting => "reconnecting",
            ConnectionState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Who we are to the server; sent in the CONNECT message on every open
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub player_id: String,
    pub name: String,
    pub color: PlayerColor,
}

/// Work for the I/O driver
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Open a socket to the configured URL
    Open,
    /// Transmit a serialized envelope
    Send(String),
    /// Close the socket with a code, abandoning any open still in flight
    Close { code: u16 },
    StartHeartbeat(Duration),
    StopHeartbeat,
    ScheduleReconnect(Duration),
    CancelReconnect,
    StateChanged(ConnectionState),
    /// Deliver a decoded message to subscribers
    Message(InboundMessage),
    /// Deliver an error to subscribers
    Error(TransportError),
}

/// Socket lifecycle, outbound queue and inbound frame buffer
#[derive(Debug)]
pub struct Connection {
    config: TransportConfig,
    state: ConnectionState,
    identity: Option<Identity>,
    /// Consecutive failed opens since the last successful one
    attempts: u32,
    /// Serialized envelopes waiting for a connection
    queue: VecDeque<String>,
    parser: FrameParser,
    last_pong: Option<Instant>,
}

impl Connection {
    pub fn new(config: TransportConfig) -> Self {
        let parser = FrameParser::new(config.max_buffer_len);
        Self {
            config,
            state: ConnectionState::Disconnected,
            identity: None,
            attempts: 0,
            queue: VecDeque::new(),
            parser,
            last_pong: None,
        }
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Messages waiting to be flushed
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// When the server last answered a PING
    pub fn last_pong(&self) -> Option<Instant> {
        self.last_pong
    }

    // ==================== Commands ====================

    /// Start connecting as `identity`. Ignored while connecting or connected.
    pub fn connect(&mut self, identity: Identity) -> Vec<Effect> {
        let mut effects = Vec::new();
        match self.state {
            ConnectionState::Connecting | ConnectionState::Connected => {
                debug!(state = %self.state, "Connect ignored");
                return effects;
            }
            ConnectionState::Reconnecting => {
                // Skip the remaining backoff and try right away
                self.identity = Some(identity);
                effects.push(Effect::CancelReconnect);
                effects.push(Effect::Open);
                return effects;
            }
            ConnectionState::Failed => self.attempts = 0,
            ConnectionState::Disconnected => {}
        }

        info!(url = %self.config.url, player = %identity.player_id, "Connecting");
        self.identity = Some(identity);
        self.transition(ConnectionState::Connecting, &mut effects);
        effects.push(Effect::Open);
        effects
    }

    /// Send now if connected, otherwise queue for the next open
    pub fn send(&mut self, message: OutboundMessage) -> Vec<Effect> {
        let json = match Envelope::new(message).to_json() {
            Ok(json) => json,
            Err(e) => return vec![Effect::Error(e)],
        };

        if self.state == ConnectionState::Connected {
            return vec![Effect::Send(json)];
        }

        self.queue.push_back(json);
        if self.queue.len() > self.config.max_queue_len {
            self.queue.pop_front();
            warn!(
                limit = self.config.max_queue_len,
                "Outbound queue full, dropped oldest message"
            );
        }
        Vec::new()
    }

    /// Put messages the socket failed to take back at the head of the queue,
    /// keeping their order. CONNECT and PING are left out, since the next
    /// open sends fresh ones.
    pub fn requeue_front(&mut self, unsent: Vec<String>) {
        let replay: Vec<String> = unsent
            .into_iter()
            .filter(|json| !is_session_message(json))
            .collect();
        if replay.is_empty() {
            return;
        }

        debug!(count = replay.len(), "Requeueing unsent messages");
        for json in replay.into_iter().rev() {
            self.queue.push_front(json);
        }
        while self.queue.len() > self.config.max_queue_len {
            self.queue.pop_front();
            warn!(
                limit = self.config.max_queue_len,
                "Outbound queue full, dropped oldest message"
            );
        }
    }

    /// Close cleanly and forget everything pending. Never reconnects.
    pub fn disconnect(&mut self) -> Vec<Effect> {
        let mut effects = vec![
            Effect::CancelReconnect,
            Effect::StopHeartbeat,
            Effect::Close { code: CLOSE_NORMAL },
        ];
        self.queue.clear();
        self.parser.reset();
        self.attempts = 0;
        self.transition(ConnectionState::Disconnected, &mut effects);
        effects
    }

    // ==================== Socket events ====================

    /// The socket opened: authenticate, start the heartbeat, flush the queue
    pub fn on_open(&mut self) -> Vec<Effect> {
        let mut effects = Vec::new();
        if !matches!(
            self.state,
            ConnectionState::Connecting | ConnectionState::Reconnecting
        ) {
            // Disconnected while the open was in flight
            debug!(state = %self.state, "Closing stale socket");
            effects.push(Effect::Close { code: CLOSE_NORMAL });
            return effects;
        }

        self.attempts = 0;
        self.parser.reset();
        self.transition(ConnectionState::Connected, &mut effects);

        if let Some(identity) = self.identity.clone() {
            let hello = OutboundMessage::Connect {
                player_id: identity.player_id,
                name: identity.name,
                color: identity.color,
            };
            match Envelope::new(hello).to_json() {
                Ok(json) => effects.push(Effect::Send(json)),
                Err(e) => effects.push(Effect::Error(e)),
            }
        }

        effects.push(Effect::StartHeartbeat(self.config.heartbeat_interval));

        if !self.queue.is_empty() {
            debug!(count = self.queue.len(), "Flushing queued messages");
        }
        effects.extend(self.queue.drain(..).map(Effect::Send));
        effects
    }

    /// A text chunk arrived
    pub fn on_text(&mut self, text: &str) -> Vec<Effect> {
        let mut effects = Vec::new();
        for frame in self.parser.feed(text) {
            let message = frame.and_then(InboundMessage::from_frame);
            match message {
                Ok(InboundMessage::Pong) => {
                    self.last_pong = Some(Instant::now());
                    effects.push(Effect::Message(InboundMessage::Pong));
                }
                Ok(InboundMessage::Error(err)) => {
                    warn!(message = %err.message, "Server reported an error");
                    effects.push(Effect::Error(err.into()));
                }
                Ok(message) => effects.push(Effect::Message(message)),
                Err(e) => effects.push(Effect::Error(e)),
            }
        }
        effects
    }

    /// The socket closed. Anything other than a normal close schedules a retry.
    pub fn on_close(&mut self, code: u16) -> Vec<Effect> {
        let mut effects = Vec::new();
        if matches!(
            self.state,
            ConnectionState::Disconnected | ConnectionState::Failed
        ) {
            return effects;
        }

        self.parser.reset();
        effects.push(Effect::StopHeartbeat);

        if code == CLOSE_NORMAL {
            info!("Connection closed");
            self.transition(ConnectionState::Disconnected, &mut effects);
        } else {
            warn!(code, "Connection lost");
            self.schedule_reconnect(&mut effects);
        }
        effects
    }

    /// The socket failed to open or errored
    pub fn on_error(&mut self, reason: impl Into<String>) -> Vec<Effect> {
        let reason = reason.into();
        warn!(%reason, "Socket error");
        vec![Effect::Error(TransportError::Connection(reason))]
    }

    // ==================== Timers ====================

    pub fn on_reconnect_timer(&mut self) -> Vec<Effect> {
        if self.state != ConnectionState::Reconnecting {
            return Vec::new();
        }
        info!(attempt = self.attempts, "Reconnecting");
        vec![Effect::Open]
    }

    pub fn on_heartbeat_tick(&mut self) -> Vec<Effect> {
        if self.state != ConnectionState::Connected {
            return Vec::new();
        }
        match Envelope::new(OutboundMessage::Ping {}).to_json() {
            Ok(json) => vec![Effect::Send(json)],
            Err(e) => vec![Effect::Error(e)],
        }
    }

    // ==================== Helper Methods ====================

    fn schedule_reconnect(&mut self, effects: &mut Vec<Effect>) {
        if self.attempts >= self.config.max_reconnect_attempts {
            warn!(attempts = self.attempts, "Giving up on reconnecting");
            self.transition(ConnectionState::Failed, effects);
            effects.push(Effect::Error(TransportError::ReconnectExhausted {
                attempts: self.attempts,
            }));
            return;
        }

        let delay = self.config.reconnect_delay(self.attempts);
        self.attempts += 1;
        self.transition(ConnectionState::Reconnecting, effects);
        debug!(attempt = self.attempts, delay_ms = delay.as_millis() as u64, "Reconnect scheduled");
        effects.push(Effect::ScheduleReconnect(delay));
    }

    fn transition(&mut self, next: ConnectionState, effects: &mut Vec<Effect>) {
        if self.state != next {
            debug!(from = %self.state, to = %next, "Connection state changed");
            self.state = next;
            effects.push(Effect::StateChanged(next));
        }
    }
}

/// Messages tied to one socket rather than to the application
fn is_session_message(json: &str) -> bool {
    serde_json::from_str::<Value>(json)
        .ok()
        .and_then(|v| v.get("type").and_then(Value::as_str).map(str::to_owned))
        .map_or(false, |kind| kind == "CONNECT" || kind == "PING")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn identity() -> Identity {
        Identity {
            player_id: "p1".to_string(),
            name: "Ada".to_string(),
            color: PlayerColor::Red,
        }
    }

    fn sent_types(effects: &[Effect]) -> Vec<String> {
        effects
            .iter()
            .filter_map(|e| match e {
                Effect::Send(json) => {
                    let value: Value = serde_json::from_str(json).unwrap();
                    Some(value["type"].as_str().unwrap().to_string())
                }
                _ => None,
            })
            .collect()
    }

    fn connected() -> Connection {
        let mut conn = Connection::new(TransportConfig::default());
        conn.connect(identity());
        conn.on_open();
        conn
    }

    #[test]
    fn test_connect_then_open() {
        let mut conn = Connection::new(TransportConfig::default());

        let effects = conn.connect(identity());
        assert_eq!(
            effects,
            vec![
                Effect::StateChanged(ConnectionState::Connecting),
                Effect::Open
            ]
        );

        // Second connect while connecting does nothing
        assert!(conn.connect(identity()).is_empty());

        let effects = conn.on_open();
        assert_eq!(conn.state(), ConnectionState::Connected);
        assert_eq!(effects[0], Effect::StateChanged(ConnectionState::Connected));
        assert_eq!(sent_types(&effects), vec!["CONNECT"]);
        assert!(effects.contains(&Effect::StartHeartbeat(Duration::from_secs(30))));
    }

    #[test]
    fn test_queue_flushes_in_order_after_connect() {
        let mut conn = Connection::new(TransportConfig::default());
        assert!(conn.send(OutboundMessage::ListRooms {}).is_empty());
        assert!(conn
            .send(OutboundMessage::JoinRoom {
                room_id: "r1".into()
            })
            .is_empty());
        assert_eq!(conn.queued(), 2);

        conn.connect(identity());
        let effects = conn.on_open();

        assert_eq!(sent_types(&effects), vec!["CONNECT", "LIST_ROOMS", "JOIN_ROOM"]);
        assert_eq!(conn.queued(), 0);
    }

    #[test]
    fn test_failed_flush_is_replayed_in_order() {
        let mut conn = Connection::new(TransportConfig::default());
        conn.send(OutboundMessage::ListRooms {});
        conn.send(OutboundMessage::JoinRoom {
            room_id: "r1".into(),
        });
        conn.connect(identity());

        // The socket dies before any of the flush goes out
        let unsent: Vec<String> = conn
            .on_open()
            .into_iter()
            .filter_map(|e| match e {
                Effect::Send(json) => Some(json),
                _ => None,
            })
            .collect();
        assert_eq!(unsent.len(), 3);
        conn.requeue_front(unsent);
        conn.on_close(CLOSE_ABNORMAL);
        assert_eq!(conn.queued(), 2);

        // Sent while reconnecting, so it belongs after the replayed ones
        conn.send(OutboundMessage::StartGame {});

        conn.on_reconnect_timer();
        let effects = conn.on_open();
        assert_eq!(
            sent_types(&effects),
            vec!["CONNECT", "LIST_ROOMS", "JOIN_ROOM", "GAME_START"]
        );
    }

    #[test]
    fn test_send_while_connected_is_immediate() {
        let mut conn = connected();
        let effects = conn.send(OutboundMessage::Ping {});
        assert_eq!(sent_types(&effects), vec!["PING"]);
        assert_eq!(conn.queued(), 0);
    }

    #[test]
    fn test_queue_cap_drops_oldest() {
        let config = TransportConfig {
            max_queue_len: 2,
            ..TransportConfig::default()
        };
        let mut conn = Connection::new(config);
        conn.send(OutboundMessage::ListRooms {});
        conn.send(OutboundMessage::Ping {});
        conn.send(OutboundMessage::StartGame {});

        conn.connect(identity());
        let effects = conn.on_open();
        assert_eq!(sent_types(&effects), vec!["CONNECT", "PING", "GAME_START"]);
    }

    #[test]
    fn test_backoff_then_failed() {
        let mut conn = connected();

        // Three abnormal closes in a row, each followed by a failed open
        let mut delays = Vec::new();
        for _ in 0..3 {
            let effects = conn.on_close(CLOSE_ABNORMAL);
            assert_eq!(effects[0], Effect::StopHeartbeat);
            let delay = effects.iter().find_map(|e| match e {
                Effect::ScheduleReconnect(d) => Some(*d),
                _ => None,
            });
            delays.push(delay.unwrap().as_millis() as u64);
            assert_eq!(conn.state(), ConnectionState::Reconnecting);
            assert_eq!(conn.on_reconnect_timer(), vec![Effect::Open]);
        }
        assert_eq!(delays, vec![1000, 2000, 4000]);

        // Fourth failure is terminal
        let effects = conn.on_close(CLOSE_ABNORMAL);
        assert_eq!(conn.state(), ConnectionState::Failed);
        assert!(!effects
            .iter()
            .any(|e| matches!(e, Effect::ScheduleReconnect(_))));
        assert!(effects.contains(&Effect::Error(TransportError::ReconnectExhausted {
            attempts: 3
        })));

        // Nothing more happens on its own
        assert!(conn.on_close(CLOSE_ABNORMAL).is_empty());
        assert!(conn.on_reconnect_timer().is_empty());
    }

    #[test]
    fn test_successful_reopen_resets_attempts() {
        let mut conn = connected();
        conn.on_close(CLOSE_ABNORMAL);
        conn.on_close(CLOSE_ABNORMAL);
        assert_eq!(conn.attempts(), 2);

        let effects = conn.on_open();
        assert_eq!(conn.attempts(), 0);
        assert_eq!(sent_types(&effects), vec!["CONNECT"]);

        let effects = conn.on_close(CLOSE_ABNORMAL);
        assert!(effects.contains(&Effect::ScheduleReconnect(Duration::from_millis(1000))));
    }

    #[test]
    fn test_normal_close_does_not_reconnect() {
        let mut conn = connected();
        let effects = conn.on_close(CLOSE_NORMAL);
        assert_eq!(
            effects,
            vec![
                Effect::StopHeartbeat,
                Effect::StateChanged(ConnectionState::Disconnected)
            ]
        );
    }

    #[test]
    fn test_disconnect_clears_everything() {
        let mut conn = connected();
        conn.on_close(CLOSE_ABNORMAL);
        conn.send(OutboundMessage::ListRooms {});
        conn.on_text(r#"{"type":"PO"#);

        let effects = conn.disconnect();
        assert_eq!(
            effects,
            vec![
                Effect::CancelReconnect,
                Effect::StopHeartbeat,
                Effect::Close { code: CLOSE_NORMAL },
                Effect::StateChanged(ConnectionState::Disconnected),
            ]
        );
        assert_eq!(conn.queued(), 0);
        assert_eq!(conn.attempts(), 0);

        // Close after disconnect is not a failure
        assert!(conn.on_close(CLOSE_ABNORMAL).is_empty());
        // Half-frame from before is gone
        assert!(conn.on_text(r#"NG"}"#).is_empty());
    }

    #[test]
    fn test_stale_open_is_closed() {
        let mut conn = Connection::new(TransportConfig::default());
        conn.connect(identity());
        conn.disconnect();
        assert_eq!(conn.on_open(), vec![Effect::Close { code: CLOSE_NORMAL }]);
        assert_eq!(conn.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_failed_connect_can_start_over() {
        let config = TransportConfig {
            max_reconnect_attempts: 0,
            ..TransportConfig::default()
        };
        let mut conn = Connection::new(config);
        conn.connect(identity());
        conn.on_close(CLOSE_ABNORMAL);
        assert_eq!(conn.state(), ConnectionState::Failed);

        let effects = conn.connect(identity());
        assert_eq!(conn.state(), ConnectionState::Connecting);
        assert!(effects.contains(&Effect::Open));
    }

    #[test]
    fn test_heartbeat_only_while_connected() {
        let mut conn = Connection::new(TransportConfig::default());
        assert!(conn.on_heartbeat_tick().is_empty());

        conn.connect(identity());
        conn.on_open();
        assert_eq!(sent_types(&conn.on_heartbeat_tick()), vec!["PING"]);
    }

    #[test]
    fn test_inbound_dispatch() {
        let mut conn = connected();
        let effects = conn.on_text(
            r#"{"type":"PONG","data":{}}{"type":"ERROR","data":{"message":"nope"}}{"type":"TURN_END","data":{"nextPlayer":1}}"#,
        );

        assert_eq!(effects.len(), 3);
        assert_eq!(effects[0], Effect::Message(InboundMessage::Pong));
        assert!(conn.last_pong().is_some());
        assert_eq!(
            effects[1],
            Effect::Error(TransportError::Server {
                message: "nope".into(),
                code: None
            })
        );
        assert!(matches!(effects[2], Effect::Message(InboundMessage::TurnEnd(_))));
    }
}
