//! Networked client for the Carcassonne engine.
//!
//! This crate contains:
//! - [`frame`]: Incremental JSON frame extraction from the socket stream
//! - [`protocol`]: Outbound and inbound message types and the wire schema
//! - [`connection`]: Sans-IO connection lifecycle with backoff and queueing
//! - [`transport`]: Tokio task that drives the connection over a WebSocket
//! - [`events`]: Typed event bus for subscribers
//! - [`adapter`]: Conversions between engine types and the wire schema
//! - [`config`]: Transport settings and their environment overrides

pub mod adapter;
pub mod config;
pub mod connection;
pub mod error;
pub mod events;
pub mod frame;
pub mod protocol;
pub mod transport;

pub use adapter::{AdapterError, GameSnapshot, CENTER_OFFSET};
pub use config::{ConfigError, TransportConfig};
pub use connection::{Connection, ConnectionState, Effect, Identity};
pub use error::TransportError;
pub use events::{ClientEvent, EventBus, Subscription};
pub use frame::FrameParser;
pub use protocol::{Envelope, InboundMessage, OutboundMessage};
pub use transport::TransportClient;
