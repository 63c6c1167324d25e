//! Inbound event fan-out.
//!
//! The reader task turns PRIVMSG and NOTICE lines into [`InboundEvent`]s and
//! publishes them on the [`EventBus`]. Each consumer holds its own
//! [`Subscription`] for one [`EventKind`]; dropping the subscription removes
//! it from the bus, so a consumer only ever sees traffic while it is alive.

use dashmap::DashMap;
use r2d2_proto::{ChannelExt, Command, Message};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

/// Per-subscriber queue depth.
const SUBSCRIPTION_CAPACITY: usize = 256;

/// Which inbound lines a subscription receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Message,
    Notice,
}

/// A PRIVMSG or NOTICE from another user or service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    /// Nick of the sender. Empty when the line came from a server.
    pub sender: String,
    /// Channel or nick the line was addressed to.
    pub target: String,
    pub text: String,
    pub kind: EventKind,
}

impl InboundEvent {
    /// Build an event from a parsed line, if it is a PRIVMSG or NOTICE.
    pub fn from_message(msg: &Message) -> Option<Self> {
        let (kind, target, text) = match &msg.command {
            Command::PRIVMSG(target, text) => (EventKind::Message, target, text),
            Command::NOTICE(target, text) => (EventKind::Notice, target, text),
            _ => return None,
        };
        Some(Self {
            sender: msg.source_nickname().unwrap_or_default().to_string(),
            target: target.clone(),
            text: text.clone(),
            kind,
        })
    }

    /// The channel this event was sent to, if it was not a private query.
    pub fn channel(&self) -> Option<&str> {
        self.target
            .is_channel_name()
            .then_some(self.target.as_str())
    }
}

struct Subscriber {
    kind: EventKind,
    purpose: &'static str,
    tx: mpsc::Sender<InboundEvent>,
}

#[derive(Default)]
struct BusInner {
    next_id: AtomicU64,
    subscribers: DashMap<u64, Subscriber>,
}

/// Fan-out point for inbound events. Cheap to clone.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register interest in one kind of event.
    ///
    /// `purpose` names the consumer in logs.
    pub fn subscribe(&self, kind: EventKind, purpose: &'static str) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_CAPACITY);
        self.inner
            .subscribers
            .insert(id, Subscriber { kind, purpose, tx });
        debug!(id, purpose, ?kind, "subscribed");
        Subscription {
            id,
            rx,
            bus: Arc::clone(&self.inner),
        }
    }

    /// Deliver an event to every live subscriber of its kind.
    ///
    /// Never blocks: a subscriber whose queue is full misses the event.
    pub fn publish(&self, event: &InboundEvent) {
        let mut closed = Vec::new();
        for entry in self.inner.subscribers.iter() {
            let sub = entry.value();
            if sub.kind != event.kind {
                continue;
            }
            match sub.tx.try_send(event.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    warn!(purpose = sub.purpose, "subscriber lagging, event dropped");
                }
                Err(TrySendError::Closed(_)) => closed.push(*entry.key()),
            }
        }
        // Removal must happen outside the iteration to avoid a shard deadlock.
        for id in closed {
            self.inner.subscribers.remove(&id);
        }
    }

    /// Number of live subscriptions for `kind`.
    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.inner
            .subscribers
            .iter()
            .filter(|entry| entry.value().kind == kind)
            .count()
    }

    /// Drop every subscription's sender so that all consumers see the end of
    /// their stream. Used when the connection is gone.
    pub fn close(&self) {
        self.inner.subscribers.clear();
    }
}

/// A scoped registration on the [`EventBus`].
pub struct Subscription {
    id: u64,
    rx: mpsc::Receiver<InboundEvent>,
    bus: Arc<BusInner>,
}

impl Subscription {
    /// Next event, or `None` once the bus is closed.
    pub async fn recv(&mut self) -> Option<InboundEvent> {
        self.rx.recv().await
    }

    /// Next already-queued event, without waiting.
    pub fn try_recv(&mut self) -> Option<InboundEvent> {
        self.rx.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if self.bus.subscribers.remove(&self.id).is_some() {
            debug!(id = self.id, "unsubscribed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notice(text: &str) -> InboundEvent {
        InboundEvent {
            sender: "NickServ".into(),
            target: "r2d2".into(),
            text: text.into(),
            kind: EventKind::Notice,
        }
    }

    #[test]
    fn test_event_from_privmsg() {
        let msg: Message = ":luke!l@host PRIVMSG #rebels :r2d2: fly".parse().unwrap();
        let event = InboundEvent::from_message(&msg).unwrap();
        assert_eq!(event.sender, "luke");
        assert_eq!(event.channel(), Some("#rebels"));
        assert_eq!(event.kind, EventKind::Message);
    }

    #[test]
    fn test_private_query_has_no_channel() {
        let msg: Message = ":luke!l@host PRIVMSG r2d2 :hi".parse().unwrap();
        assert_eq!(InboundEvent::from_message(&msg).unwrap().channel(), None);
    }

    #[test]
    fn test_other_commands_are_not_events() {
        let msg: Message = "PING :x".parse().unwrap();
        assert!(InboundEvent::from_message(&msg).is_none());
    }

    #[tokio::test]
    async fn test_subscribers_only_see_their_kind() {
        let bus = EventBus::new();
        let mut notices = bus.subscribe(EventKind::Notice, "auth");
        let mut messages = bus.subscribe(EventKind::Message, "dispatch");

        bus.publish(&notice("hello"));

        assert_eq!(notices.recv().await.unwrap().text, "hello");
        assert!(messages.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_drop_unsubscribes() {
        let bus = EventBus::new();
        let sub = bus.subscribe(EventKind::Notice, "auth");
        assert_eq!(bus.subscriber_count(EventKind::Notice), 1);
        drop(sub);
        assert_eq!(bus.subscriber_count(EventKind::Notice), 0);
        // Publishing with nobody listening is fine.
        bus.publish(&notice("late"));
    }

    #[tokio::test]
    async fn test_close_ends_streams() {
        let bus = EventBus::new();
        let mut sub = bus.subscribe(EventKind::Message, "dispatch");
        bus.close();
        assert!(sub.recv().await.is_none());
    }
}
