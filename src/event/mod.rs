//! Tag change notification.
//!
//! The session fans every [`TagChangeEvent`] out to its registered
//! [`TagObserver`]s in registration order, awaiting each before the next.
//! Two observers are provided: a slot holding the application's callback and
//! a broadcaster feeding [`Subscription`]s.

use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::sync::{RwLock, broadcast};

use crate::types::TagChangeEvent;

/// Receives tag change events.
pub trait TagObserver: Send + Sync {
    /// Handles one event. The next observer runs once this completes.
    fn tags_updated<'a>(&'a self, event: &'a TagChangeEvent) -> BoxFuture<'a, ()>;
}

/// Application callback for tag changes.
pub type TagCallback = Arc<dyn Fn(TagChangeEvent) -> BoxFuture<'static, ()> + Send + Sync>;

/// Observer that forwards to a replaceable callback.
#[derive(Default)]
pub struct CallbackSlot {
    callback: RwLock<Option<TagCallback>>,
}

impl CallbackSlot {
    /// Creates an empty slot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the callback. `None` clears it.
    pub async fn set(&self, callback: Option<TagCallback>) {
        *self.callback.write().await = callback;
    }
}

impl TagObserver for CallbackSlot {
    fn tags_updated<'a>(&'a self, event: &'a TagChangeEvent) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            // Clone out so the callback may replace itself
            let callback = self.callback.read().await.clone();
            if let Some(callback) = callback {
                callback(*event).await;
            }
        })
    }
}

/// A subscription to tag change events.
pub struct Subscription {
    receiver: broadcast::Receiver<TagChangeEvent>,
}

impl Subscription {
    /// Receives the next event.
    ///
    /// Events missed while lagging are skipped. Returns `None` once the
    /// broadcaster is gone.
    pub async fn recv(&mut self) -> Option<TagChangeEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!("subscription lagged, skipped {skipped} events");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

/// Observer that broadcasts events to subscribers.
#[derive(Clone)]
pub struct EventBroadcaster {
    sender: broadcast::Sender<TagChangeEvent>,
}

impl EventBroadcaster {
    /// Creates a broadcaster buffering up to `capacity` events per subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribes to events.
    #[must_use]
    pub fn subscribe(&self) -> Subscription {
        Subscription {
            receiver: self.sender.subscribe(),
        }
    }

    /// Dispatches an event to all subscribers.
    pub fn dispatch(&self, event: TagChangeEvent) {
        // No receivers is fine
        let _ = self.sender.send(event);
    }
}

impl TagObserver for EventBroadcaster {
    fn tags_updated<'a>(&'a self, event: &'a TagChangeEvent) -> BoxFuture<'a, ()> {
        self.dispatch(*event);
        Box::pin(async {})
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::types::Tag;

    fn placed(index: u8) -> TagChangeEvent {
        TagChangeEvent {
            tag: Tag::new(1, index, 0x00),
            is_removed: false,
        }
    }

    #[tokio::test]
    async fn test_broadcast_dispatch() {
        let broadcaster = EventBroadcaster::new(16);
        let mut sub = broadcaster.subscribe();

        broadcaster.tags_updated(&placed(3)).await;

        let event = tokio::time::timeout(Duration::from_millis(100), sub.recv())
            .await
            .unwrap();
        assert_eq!(event, Some(placed(3)));
    }

    #[tokio::test]
    async fn test_subscription_closed() {
        let broadcaster = EventBroadcaster::new(4);
        let mut sub = broadcaster.subscribe();
        drop(broadcaster);
        assert_eq!(sub.recv().await, None);
    }

    #[tokio::test]
    async fn test_callback_slot() {
        let slot = CallbackSlot::new();
        let calls = Arc::new(AtomicUsize::new(0));

        // Empty slot is a no-op
        slot.tags_updated(&placed(1)).await;

        let counter = Arc::clone(&calls);
        let callback: TagCallback = Arc::new(move |event| {
            let counter = Arc::clone(&counter);
            Box::pin(async move {
                assert_eq!(event.tag.index, 2);
                counter.fetch_add(1, Ordering::SeqCst);
            })
        });
        slot.set(Some(callback)).await;
        slot.tags_updated(&placed(2)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        slot.set(None).await;
        slot.tags_updated(&placed(2)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
