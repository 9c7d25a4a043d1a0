//! Event fan-out from the driver connection to per-node subscribers.
//!
//! A single pump task drains the driver's event receiver and re-broadcasts
//! on a `tokio::sync::broadcast` channel, so per-node delivery order matches
//! the order the transport reported. Subscribers that fall behind the
//! channel capacity observe a gap (logged) rather than blocking the pump.

use latchkey_core::NodeId;
use latchkey_driver::DriverEvent;
use tokio::sync::broadcast;
use tracing::warn;

/// Broadcast channel capacity. Slow subscribers past this lag lose the
/// oldest events.
const EVENT_BUFFER: usize = 256;

/// Fan-out hub for driver events.
///
/// Cheap to clone; all clones publish into and subscribe from the same
/// channel. The hub outlives individual connections: subscriptions stay
/// valid across a reconnect.
#[derive(Debug, Clone)]
pub struct EventHub {
    tx: broadcast::Sender<DriverEvent>,
}

impl EventHub {
    pub(crate) fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_BUFFER);
        Self { tx }
    }

    /// Subscribe to events for a single node.
    ///
    /// Only events scoped to `node_id` are delivered; dropping the
    /// subscription cancels it.
    #[must_use]
    pub fn subscribe(&self, node_id: NodeId) -> NodeSubscription {
        NodeSubscription {
            node_id,
            rx: self.tx.subscribe(),
        }
    }

    pub(crate) fn publish(&self, event: DriverEvent) {
        // Err means no live subscribers, which is fine.
        let _ = self.tx.send(event);
    }
}

/// A cancellable, per-node event subscription.
///
/// # Examples
///
/// ```no_run
/// use latchkey_session::EventHub;
/// # async fn example(hub: &EventHub) {
/// let node = latchkey_core::NodeId::new(8).unwrap();
/// let mut sub = hub.subscribe(node);
/// while let Some(event) = sub.next().await {
///     println!("node {node}: {event:?}");
/// }
/// # }
/// ```
#[derive(Debug)]
pub struct NodeSubscription {
    node_id: NodeId,
    rx: broadcast::Receiver<DriverEvent>,
}

impl NodeSubscription {
    /// Node this subscription is filtered to.
    #[must_use]
    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    /// Next event for the subscribed node.
    ///
    /// Returns `None` once the hub is gone (session fully shut down).
    /// A lagged subscriber skips the lost events and keeps receiving.
    pub async fn next(&mut self) -> Option<DriverEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) if event.node_id() == Some(self.node_id) => return Some(event),
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(
                        node_id = %self.node_id,
                        missed,
                        "event subscriber lagged, events lost"
                    );
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use latchkey_driver::NotificationKind;

    fn notification(node: u8, kind: NotificationKind) -> DriverEvent {
        DriverEvent::Notification {
            node_id: NodeId::new(node).unwrap(),
            kind,
            at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_subscription_filters_by_node() {
        let hub = EventHub::new();
        let mut sub = hub.subscribe(NodeId::new(8).unwrap());

        hub.publish(notification(9, NotificationKind::ManualLock));
        hub.publish(notification(8, NotificationKind::KeypadUnlock));

        let event = sub.next().await.unwrap();
        assert_eq!(event.node_id(), Some(NodeId::new(8).unwrap()));
        assert!(matches!(
            event,
            DriverEvent::Notification {
                kind: NotificationKind::KeypadUnlock,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_delivery_order_preserved_per_node() {
        let hub = EventHub::new();
        let mut sub = hub.subscribe(NodeId::new(8).unwrap());

        let kinds = [
            NotificationKind::ManualUnlock,
            NotificationKind::KeypadLock,
            NotificationKind::RfUnlock,
        ];
        for kind in kinds {
            hub.publish(notification(8, kind));
        }

        for expected in kinds {
            let event = sub.next().await.unwrap();
            assert!(
                matches!(event, DriverEvent::Notification { kind, .. } if kind == expected)
            );
        }
    }

    #[tokio::test]
    async fn test_next_returns_none_when_hub_dropped() {
        let hub = EventHub::new();
        let mut sub = hub.subscribe(NodeId::new(8).unwrap());
        drop(hub);

        assert!(sub.next().await.is_none());
    }
}
