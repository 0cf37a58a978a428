//! Carcassonne network client.
//!
//! Connects to the game server, asks for the room list and logs every event
//! until interrupted.

use carcassonne_client::{
    ClientEvent, Identity, InboundMessage, TransportClient, TransportConfig, TransportError,
};
use carcassonne_core::PlayerColor;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = TransportConfig::from_env()?;

    // Player identity from env or a fresh one
    let player_id = std::env::var("CARCASSONNE_PLAYER_ID")
        .unwrap_or_else(|_| format!("player-{}", Uuid::new_v4().simple()));
    let name = std::env::var("CARCASSONNE_PLAYER_NAME").unwrap_or_else(|_| "Player 1".into());
    let identity = Identity {
        player_id,
        name,
        color: PlayerColor::Red,
    };

    info!(url = %config.url, player = %identity.player_id, "Starting Carcassonne client...");

    let client = TransportClient::spawn(config);
    let mut events = client.subscribe();
    client.connect(identity)?;
    client.list_rooms()?;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("Interrupted, disconnecting");
                break;
            }
            event = events.recv() => match event {
                Some(ClientEvent::StateChanged(state)) => info!(%state, "Connection state"),
                Some(ClientEvent::Message(InboundMessage::RoomsList(rooms))) => {
                    info!(count = rooms.len(), "Rooms available");
                }
                Some(ClientEvent::Message(InboundMessage::Pong)) => {}
                Some(ClientEvent::Message(message)) => info!(?message, "Received"),
                Some(ClientEvent::Error(e @ TransportError::ReconnectExhausted { .. })) => {
                    error!("{}", e);
                    break;
                }
                Some(ClientEvent::Error(e)) => warn!("{}", e),
                None => {
                    error!("Transport stopped");
                    break;
                }
            },
        }
    }

    // Shutdown closes the socket with a normal close code
    client.shutdown().await;
    Ok(())
}
