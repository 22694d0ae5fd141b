use tokio::sync::broadcast;

use crate::{feed::Action, post::Post};

/// Announcements about posts that other parts of the app may care about.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    PostCreated(Post),
    PostDeleted { post_id: String },
}

impl FeedEvent {
    /// The store-side effect of the event.
    pub fn into_action(self) -> Action {
        match self {
            FeedEvent::PostCreated(post) => Action::PostCreated(post),
            FeedEvent::PostDeleted { post_id } => Action::PostDeleted(post_id),
        }
    }
}

/// In-process pub/sub for [`FeedEvent`]s. Cloning gives another handle on
/// the same channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<FeedEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish to every current subscriber. Returns how many received it.
    pub fn publish(&self, event: FeedEvent) -> usize {
        self.tx.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FeedEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(crate::constant::EVENT_BUS_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn every_subscriber_sees_events() {
        let bus = EventBus::default();
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();

        let sent = bus.publish(FeedEvent::PostDeleted {
            post_id: "p1".into(),
        });
        assert_eq!(sent, 2);

        let expected = FeedEvent::PostDeleted {
            post_id: "p1".into(),
        };
        assert_eq!(first.recv().await.unwrap(), expected);
        assert_eq!(second.recv().await.unwrap(), expected);
    }

    #[test]
    fn publishing_without_subscribers_is_fine() {
        let bus = EventBus::new(4);
        assert_eq!(
            bus.publish(FeedEvent::PostDeleted {
                post_id: "p1".into()
            }),
            0
        );
    }
}
