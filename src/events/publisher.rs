use parking_lot::Mutex;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Identifier returned by [`EventBus::subscribe`], used to unsubscribe
pub type SubscriberId = u64;

/// Multi-listener event bus with one unbounded channel per subscriber.
///
/// Publishing never waits on a listener: a slow subscriber only grows its own
/// channel, and a subscriber whose receiver is gone is pruned on the next publish
/// without affecting delivery to the others.
#[derive(Debug)]
pub struct EventBus<E> {
    name: &'static str,
    next_id: AtomicU64,
    subscribers: Mutex<Vec<(SubscriberId, mpsc::UnboundedSender<E>)>>,
}

/// A live subscription; dropping it (or its receiver) ends delivery
#[derive(Debug)]
pub struct Subscription<E> {
    pub id: SubscriberId,
    pub receiver: mpsc::UnboundedReceiver<E>,
}

impl<E> Subscription<E> {
    pub async fn recv(&mut self) -> Option<E> {
        self.receiver.recv().await
    }
}

impl<E: Clone + Send + 'static> EventBus<E> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            next_id: AtomicU64::new(1),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    pub fn subscribe(&self) -> Subscription<E> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers.lock().push((id, sender));
        debug!(bus = self.name, subscriber_id = id, "Subscriber added");
        Subscription { id, receiver }
    }

    /// Subscribe with a callback driven by its own task. A panicking callback
    /// terminates only that listener task.
    pub fn subscribe_with<F, Fut>(&self, callback: F) -> SubscriberId
    where
        F: Fn(E) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let Subscription { id, mut receiver } = self.subscribe();
        let bus = self.name;
        tokio::spawn(async move {
            while let Some(event) = receiver.recv().await {
                callback(event).await;
            }
            debug!(bus, subscriber_id = id, "Listener task finished");
        });
        id
    }

    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let mut subscribers = self.subscribers.lock();
        let before = subscribers.len();
        subscribers.retain(|(sid, _)| *sid != id);
        before != subscribers.len()
    }

    /// Deliver `event` to every live subscriber
    pub fn publish(&self, event: E) {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|(id, sender)| match sender.send(event.clone()) {
            Ok(()) => true,
            Err(_) => {
                warn!(
                    bus = self.name,
                    subscriber_id = id,
                    "Dropping closed subscriber"
                );
                false
            }
        });
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}

/// Shared handle type used by the queue and the orchestrator
pub type SharedEventBus<E> = Arc<EventBus<E>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_every_subscriber_receives() {
        let bus: EventBus<u32> = EventBus::new("test");
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();

        bus.publish(7);

        assert_eq!(a.recv().await, Some(7));
        assert_eq!(b.recv().await, Some(7));
    }

    #[tokio::test]
    async fn test_dropped_subscriber_does_not_block_others() {
        let bus: EventBus<u32> = EventBus::new("test");
        let dropped = bus.subscribe();
        let mut alive = bus.subscribe();
        drop(dropped);

        bus.publish(1);
        bus.publish(2);

        assert_eq!(alive.recv().await, Some(1));
        assert_eq!(alive.recv().await, Some(2));
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn test_unsubscribe_stops_delivery() {
        let bus: EventBus<u32> = EventBus::new("test");
        let mut sub = bus.subscribe();
        assert!(bus.unsubscribe(sub.id));
        assert!(!bus.unsubscribe(sub.id));

        bus.publish(3);
        assert_eq!(sub.recv().await, None);
    }

    #[tokio::test]
    async fn test_panicking_listener_is_isolated() {
        let bus: EventBus<u32> = EventBus::new("test");
        bus.subscribe_with(|_| async { panic!("listener failure") });
        let mut healthy = bus.subscribe();

        bus.publish(1);
        bus.publish(2);

        assert_eq!(healthy.recv().await, Some(1));
        assert_eq!(healthy.recv().await, Some(2));
    }
}
