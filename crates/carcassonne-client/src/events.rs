//! Typed event bus.
//!
//! Subscribers get their own unbounded channel. Dropping a [`Subscription`]
//! unsubscribes it; senders whose receiver is gone are pruned on the next
//! publish.

use crate::connection::ConnectionState;
use crate::error::TransportError;
use crate::protocol::InboundMessage;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;

pub type SubscriptionId = u64;

/// Everything the transport reports to the application
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    StateChanged(ConnectionState),
    Message(InboundMessage),
    Error(TransportError),
}

#[derive(Debug, Default)]
struct Subscribers {
    senders: DashMap<SubscriptionId, mpsc::UnboundedSender<ClientEvent>>,
    next_id: AtomicU64,
}

/// Fan-out of [`ClientEvent`]s to any number of subscribers
#[derive(Debug, Clone, Default)]
pub struct EventBus {
    inner: Arc<Subscribers>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.senders.insert(id, tx);
        Subscription {
            id,
            receiver: rx,
            bus: Arc::downgrade(&self.inner),
        }
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.inner.senders.remove(&id);
    }

    /// Send an event to every live subscriber, returning how many got it
    pub fn publish(&self, event: ClientEvent) -> usize {
        let mut delivered = 0;
        let mut closed = Vec::new();

        for entry in self.inner.senders.iter() {
            if entry.value().send(event.clone()).is_ok() {
                delivered += 1;
            } else {
                closed.push(*entry.key());
            }
        }

        // Shard locks are released once iteration ends
        for id in closed {
            self.inner.senders.remove(&id);
        }
        delivered
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.senders.len()
    }
}

/// Receiving end of one subscription
#[derive(Debug)]
pub struct Subscription {
    id: SubscriptionId,
    receiver: mpsc::UnboundedReceiver<ClientEvent>,
    bus: Weak<Subscribers>,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Next event, or `None` once the bus is gone
    pub async fn recv(&mut self) -> Option<ClientEvent> {
        self.receiver.recv().await
    }

    /// Next event if one is already waiting
    pub fn try_recv(&mut self) -> Option<ClientEvent> {
        self.receiver.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(bus) = self.bus.upgrade() {
            bus.senders.remove(&self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_publish_reaches_every_subscriber() {
        let bus = EventBus::new();
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();
        assert_ne!(a.id(), b.id());

        let event = ClientEvent::StateChanged(ConnectionState::Connected);
        assert_eq!(bus.publish(event.clone()), 2);

        assert_eq!(a.try_recv(), Some(event.clone()));
        assert_eq!(b.try_recv(), Some(event));
        assert_eq!(a.try_recv(), None);
    }

    #[test]
    fn test_drop_unsubscribes() {
        let bus = EventBus::new();
        let keep = bus.subscribe();
        let gone = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        drop(gone);
        assert_eq!(bus.subscriber_count(), 1);
        assert_eq!(bus.publish(ClientEvent::Message(InboundMessage::Pong)), 1);

        bus.unsubscribe(keep.id());
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_events_keep_order() {
        let bus = EventBus::new();
        let mut sub = bus.subscribe();
        bus.publish(ClientEvent::StateChanged(ConnectionState::Connecting));
        bus.publish(ClientEvent::StateChanged(ConnectionState::Connected));
        bus.publish(ClientEvent::Error(TransportError::ChannelClosed));

        let received: Vec<ClientEvent> = std::iter::from_fn(|| sub.try_recv()).collect();
        assert_eq!(
            received,
            vec![
                ClientEvent::StateChanged(ConnectionState::Connecting),
                ClientEvent::StateChanged(ConnectionState::Connected),
                ClientEvent::Error(TransportError::ChannelClosed),
            ]
        );
    }
}
