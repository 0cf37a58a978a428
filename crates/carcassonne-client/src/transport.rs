//! Async WebSocket driver.
//!
//! [`TransportClient`] is a handle to a background task that owns the socket,
//! the heartbeat interval and the reconnect timer. The task feeds every
//! command, socket event and timer tick into a [`Connection`] and carries out
//! the effects it returns. Results reach the application through the
//! [`EventBus`].

use crate::config::TransportConfig;
use crate::connection::{Connection, ConnectionState, Effect, Identity, CLOSE_ABNORMAL};
use crate::error::TransportError;
use crate::events::{ClientEvent, EventBus, Subscription};
use crate::protocol::{OutboundMessage, WirePosition};
use carcassonne_core::BotDifficulty;
use futures_util::{SinkExt, StreamExt};
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep, Instant, Interval, MissedTickBehavior, Sleep};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Handshake in flight; dropping it abandons the attempt
type Opening = Pin<Box<dyn Future<Output = Result<Socket, tungstenite::Error>> + Send>>;

#[derive(Debug)]
enum Command {
    Connect(Identity),
    Send(OutboundMessage),
    Disconnect,
    Shutdown,
}

/// Handle to the transport task
#[derive(Debug)]
pub struct TransportClient {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<ConnectionState>,
    bus: EventBus,
    task: JoinHandle<()>,
}

impl TransportClient {
    /// Start the transport task. Must be called inside a tokio runtime.
    pub fn spawn(config: TransportConfig) -> Self {
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (state_tx, state) = watch::channel(ConnectionState::Disconnected);
        let bus = EventBus::new();

        let driver = Driver {
            connection: Connection::new(config),
            commands: command_rx,
            state: state_tx,
            bus: bus.clone(),
            socket: None,
            opening: None,
            heartbeat: None,
            reconnect: None,
        };
        let task = tokio::spawn(driver.run());

        Self {
            commands,
            state,
            bus,
            task,
        }
    }

    pub fn connect(&self, identity: Identity) -> Result<(), TransportError> {
        self.command(Command::Connect(identity))
    }

    /// Send now if connected, otherwise queue until the next (re)connect
    pub fn send(&self, message: OutboundMessage) -> Result<(), TransportError> {
        self.command(Command::Send(message))
    }

    pub fn disconnect(&self) -> Result<(), TransportError> {
        self.command(Command::Disconnect)
    }

    pub fn subscribe(&self) -> Subscription {
        self.bus.subscribe()
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Watch channel that follows every state change
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Disconnect and wait for the task to finish
    pub async fn shutdown(self) {
        let _ = self.commands.send(Command::Shutdown);
        if let Err(e) = self.task.await {
            warn!("Transport task ended abnormally: {}", e);
        }
    }

    // ==================== Lobby and game messages ====================

    pub fn list_rooms(&self) -> Result<(), TransportError> {
        self.send(OutboundMessage::ListRooms {})
    }

    pub fn create_room(&self, room_name: &str, max_players: u8) -> Result<(), TransportError> {
        self.send(OutboundMessage::CreateRoom {
            room_name: room_name.to_string(),
            max_players,
        })
    }

    pub fn join_room(&self, room_id: &str) -> Result<(), TransportError> {
        self.send(OutboundMessage::JoinRoom {
            room_id: room_id.to_string(),
        })
    }

    pub fn leave_room(&self, room_id: &str) -> Result<(), TransportError> {
        self.send(OutboundMessage::LeaveRoom {
            room_id: room_id.to_string(),
        })
    }

    pub fn add_bot(&self, bot_name: &str, difficulty: BotDifficulty) -> Result<(), TransportError> {
        self.send(OutboundMessage::AddBot {
            bot_name: bot_name.to_string(),
            difficulty,
        })
    }

    pub fn start_game(&self) -> Result<(), TransportError> {
        self.send(OutboundMessage::StartGame {})
    }

    pub fn place_tile(&self, position: WirePosition, rotation: u8) -> Result<(), TransportError> {
        self.send(OutboundMessage::PlaceTile { position, rotation })
    }

    pub fn place_meeple(&self, feature_id: usize) -> Result<(), TransportError> {
        self.send(OutboundMessage::PlaceMeeple { feature_id })
    }

    fn command(&self, command: Command) -> Result<(), TransportError> {
        self.commands
            .send(command)
            .map_err(|_| TransportError::ChannelClosed)
    }
}

/// What woke the driver loop
enum Wake {
    Command(Option<Command>),
    Socket(Option<Result<Message, tungstenite::Error>>),
    Opened(Result<Socket, tungstenite::Error>),
    Heartbeat,
    Reconnect,
}

struct Driver {
    connection: Connection,
    commands: mpsc::UnboundedReceiver<Command>,
    state: watch::Sender<ConnectionState>,
    bus: EventBus,
    socket: Option<Socket>,
    opening: Option<Opening>,
    heartbeat: Option<Interval>,
    reconnect: Option<Pin<Box<Sleep>>>,
}

impl Driver {
    async fn run(mut self) {
        loop {
            let wake = tokio::select! {
                command = self.commands.recv() => Wake::Command(command),
                message = next_message(&mut self.socket) => Wake::Socket(message),
                result = opened(&mut self.opening) => Wake::Opened(result),
                _ = next_tick(&mut self.heartbeat) => Wake::Heartbeat,
                _ = expired(&mut self.reconnect) => Wake::Reconnect,
            };

            let effects = match wake {
                Wake::Command(Some(Command::Connect(identity))) => self.connection.connect(identity),
                Wake::Command(Some(Command::Send(message))) => self.connection.send(message),
                Wake::Command(Some(Command::Disconnect)) => self.connection.disconnect(),
                Wake::Command(Some(Command::Shutdown)) | Wake::Command(None) => {
                    let effects = self.connection.disconnect();
                    self.apply(effects).await;
                    break;
                }
                Wake::Socket(message) => self.on_socket(message),
                Wake::Opened(result) => {
                    self.opening = None;
                    self.on_opened(result)
                }
                Wake::Heartbeat => self.connection.on_heartbeat_tick(),
                Wake::Reconnect => {
                    self.reconnect = None;
                    self.connection.on_reconnect_timer()
                }
            };

            self.apply(effects).await;
        }
        debug!("Transport task stopped");
    }

    fn on_opened(&mut self, result: Result<Socket, tungstenite::Error>) -> Vec<Effect> {
        match result {
            Ok(socket) => {
                info!(url = %self.connection.config().url, "WebSocket connected");
                self.socket = Some(socket);
                self.connection.on_open()
            }
            Err(e) => {
                let mut effects = self.connection.on_error(e.to_string());
                effects.extend(self.connection.on_close(CLOSE_ABNORMAL));
                effects
            }
        }
    }

    fn on_socket(&mut self, message: Option<Result<Message, tungstenite::Error>>) -> Vec<Effect> {
        match message {
            Some(Ok(Message::Text(text))) => self.connection.on_text(&text),
            Some(Ok(Message::Binary(bytes))) => {
                self.connection.on_text(&String::from_utf8_lossy(&bytes))
            }
            Some(Ok(Message::Close(frame))) => {
                self.socket = None;
                let code = frame.map_or(CLOSE_ABNORMAL, |f| u16::from(f.code));
                self.connection.on_close(code)
            }
            // Protocol-level pings are answered by tungstenite
            Some(Ok(_)) => Vec::new(),
            Some(Err(e)) => {
                self.socket = None;
                let mut effects = self.connection.on_error(e.to_string());
                effects.extend(self.connection.on_close(CLOSE_ABNORMAL));
                effects
            }
            None => {
                self.socket = None;
                self.connection.on_close(CLOSE_ABNORMAL)
            }
        }
    }

    /// Carry out effects in order, including the ones they produce
    async fn apply(&mut self, effects: Vec<Effect>) {
        let mut work: VecDeque<Effect> = effects.into();

        while let Some(effect) = work.pop_front() {
            match effect {
                Effect::Open => {
                    let url = self.connection.config().url.clone();
                    debug!(%url, "Opening WebSocket");
                    self.opening = Some(Box::pin(async move {
                        connect_async(url.as_str()).await.map(|(socket, _)| socket)
                    }));
                }
                Effect::Send(text) => {
                    let Some(socket) = self.socket.as_mut() else {
                        debug!("No socket, message dropped");
                        continue;
                    };
                    if let Err(e) = socket.send(Message::Text(text.clone())).await {
                        self.socket = None;
                        let unsent = take_unsent(text, &mut work);
                        self.connection.requeue_front(unsent);
                        work.extend(self.connection.on_error(e.to_string()));
                        work.extend(self.connection.on_close(CLOSE_ABNORMAL));
                    }
                }
                // Also abandons a handshake still in flight
                Effect::Close { code } => {
                    if self.opening.take().is_some() {
                        debug!("Pending open abandoned");
                    }
                    if let Some(mut socket) = self.socket.take() {
                        let frame = CloseFrame {
                            code: CloseCode::from(code),
                            reason: "".into(),
                        };
                        if let Err(e) = socket.close(Some(frame)).await {
                            debug!("Error while closing socket: {}", e);
                        }
                    }
                }
                Effect::StartHeartbeat(period) => {
                    let mut heartbeat = interval_at(Instant::now() + period, period);
                    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
                    self.heartbeat = Some(heartbeat);
                }
                Effect::StopHeartbeat => self.heartbeat = None,
                Effect::ScheduleReconnect(delay) => {
                    self.reconnect = Some(Box::pin(sleep(delay)));
                }
                Effect::CancelReconnect => self.reconnect = None,
                Effect::StateChanged(state) => {
                    self.state.send_replace(state);
                    self.bus.publish(ClientEvent::StateChanged(state));
                }
                Effect::Message(message) => {
                    self.bus.publish(ClientEvent::Message(message));
                }
                Effect::Error(error) => {
                    self.bus.publish(ClientEvent::Error(error));
                }
            }
        }
    }
}

async fn next_message(socket: &mut Option<Socket>) -> Option<Result<Message, tungstenite::Error>> {
    match socket {
        Some(socket) => socket.next().await,
        None => std::future::pending().await,
    }
}

/// The failed message followed by every send still waiting in `work`, in order
fn take_unsent(failed: String, work: &mut VecDeque<Effect>) -> Vec<String> {
    let (sends, rest): (VecDeque<Effect>, VecDeque<Effect>) = work
        .drain(..)
        .partition(|effect| matches!(effect, Effect::Send(_)));
    *work = rest;

    let mut unsent = vec![failed];
    unsent.extend(sends.into_iter().filter_map(|effect| match effect {
        Effect::Send(text) => Some(text),
        _ => None,
    }));
    unsent
}

async fn opened(opening: &mut Option<Opening>) -> Result<Socket, tungstenite::Error> {
    match opening {
        Some(opening) => opening.as_mut().await,
        None => std::future::pending().await,
    }
}

async fn next_tick(heartbeat: &mut Option<Interval>) {
    match heartbeat {
        Some(heartbeat) => {
            heartbeat.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn expired(timer: &mut Option<Pin<Box<Sleep>>>) {
    match timer {
        Some(timer) => timer.as_mut().await,
        None => std::future::pending().await,
    }
}
