use tokio::sync::broadcast;
use tracing::debug;

use faceoff_types::feed::FeedEvent;

/// Downstream feed/notification collaborator. Publishing never blocks and
/// never fails the caller.
pub trait FeedSink: Send + Sync {
    fn publish(&self, event: FeedEvent);
}

/// Fans events out to any number of in-process subscribers.
#[derive(Clone)]
pub struct BroadcastFeed {
    tx: broadcast::Sender<FeedEvent>,
}

impl BroadcastFeed {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FeedEvent> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastFeed {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl FeedSink for BroadcastFeed {
    fn publish(&self, event: FeedEvent) {
        debug!(recipient = %event.recipient(), ?event, "feed event");
        // No subscribers is fine.
        let _ = self.tx.send(event);
    }
}

/// Discards everything.
pub struct NullFeed;

impl FeedSink for NullFeed {
    fn publish(&self, _event: FeedEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn subscribers_receive_published_events() {
        let feed = BroadcastFeed::new(8);
        let mut rx = feed.subscribe();
        let event = FeedEvent::MatchWon {
            match_id: Uuid::from_u128(1),
            photo_id: Uuid::from_u128(2),
            owner_id: Uuid::from_u128(3),
            viewer: Uuid::from_u128(4),
        };
        feed.publish(event.clone());
        assert_eq!(rx.try_recv().unwrap(), event);
    }

    #[test]
    fn publishing_without_subscribers_is_silent() {
        BroadcastFeed::default().publish(FeedEvent::MatchWon {
            match_id: Uuid::nil(),
            photo_id: Uuid::nil(),
            owner_id: Uuid::nil(),
            viewer: Uuid::nil(),
        });
    }
}
