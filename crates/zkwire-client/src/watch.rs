//! Watch registry -- fan-out of server notifications to observers.
//!
//! Watches are one-shot: a node event consumes the registrations it fires.
//! State-only notifications (event type `None`) broadcast to every
//! observer without consuming anything.

use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::mpsc;
use zkwire_proto::{EventType, WatchedEvent};

/// Which trigger a registration listens for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchKind {
    Data,
    Exist,
    Child,
}

pub type EventSender = mpsc::UnboundedSender<WatchedEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<WatchedEvent>;

#[derive(Debug, Default)]
struct PathWatchers {
    data: Vec<EventSender>,
    exist: Vec<EventSender>,
    child: Vec<EventSender>,
}

impl PathWatchers {
    fn is_empty(&self) -> bool {
        self.data.is_empty() && self.exist.is_empty() && self.child.is_empty()
    }
}

/// Registry of user watches, keyed by path.
#[derive(Debug, Default)]
pub struct WatchManager {
    inner: Mutex<HashMap<String, PathWatchers>>,
}

impl WatchManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a one-shot watch and return the channel its event arrives on.
    pub fn register(&self, path: &str, kind: WatchKind) -> EventReceiver {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.inner.lock().unwrap();
        let watchers = inner.entry(path.to_string()).or_default();
        match kind {
            WatchKind::Data => watchers.data.push(tx),
            WatchKind::Exist => watchers.exist.push(tx),
            WatchKind::Child => watchers.child.push(tx),
        }
        rx
    }

    /// Fan an event out to the registrations it triggers.
    pub fn process(&self, event: WatchedEvent) {
        let mut inner = self.inner.lock().unwrap();
        match event.event_type {
            EventType::None => {
                // Connection-state notification: broadcast, keep registrations.
                for watchers in inner.values() {
                    for tx in watchers
                        .data
                        .iter()
                        .chain(&watchers.exist)
                        .chain(&watchers.child)
                    {
                        let _ = tx.send(event.clone());
                    }
                }
                return;
            }
            EventType::NodeCreated | EventType::NodeDeleted | EventType::NodeDataChanged => {
                if let Some(watchers) = inner.get_mut(&event.path) {
                    for tx in watchers.data.drain(..).chain(watchers.exist.drain(..)) {
                        let _ = tx.send(event.clone());
                    }
                }
            }
            EventType::NodeChildrenChanged => {
                if let Some(watchers) = inner.get_mut(&event.path) {
                    for tx in watchers.child.drain(..) {
                        let _ = tx.send(event.clone());
                    }
                }
            }
        }
        if inner
            .get(&event.path)
            .map(|w| w.is_empty())
            .unwrap_or(false)
        {
            inner.remove(&event.path);
        }
    }

    /// Number of paths with at least one live registration.
    pub fn watched_paths(&self) -> usize {
        self.inner.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zkwire_proto::KeeperState;

    fn event(event_type: EventType, path: &str) -> WatchedEvent {
        WatchedEvent {
            event_type,
            state: KeeperState::SyncConnected,
            path: path.into(),
        }
    }

    #[test]
    fn test_data_watch_fires_once() {
        let watches = WatchManager::new();
        let mut rx = watches.register("/a", WatchKind::Data);

        watches.process(event(EventType::NodeDataChanged, "/a"));
        let got = rx.try_recv().unwrap();
        assert_eq!(got.event_type, EventType::NodeDataChanged);
        assert_eq!(got.path, "/a");

        // One-shot: a second event finds no registration.
        watches.process(event(EventType::NodeDataChanged, "/a"));
        assert!(rx.try_recv().is_err());
        assert_eq!(watches.watched_paths(), 0);
    }

    #[test]
    fn test_node_event_fires_data_and_exist_watches() {
        let watches = WatchManager::new();
        let mut data_rx = watches.register("/a", WatchKind::Data);
        let mut exist_rx = watches.register("/a", WatchKind::Exist);

        watches.process(event(EventType::NodeDeleted, "/a"));
        assert!(data_rx.try_recv().is_ok());
        assert!(exist_rx.try_recv().is_ok());
    }

    #[test]
    fn test_children_changed_only_fires_child_watches() {
        let watches = WatchManager::new();
        let mut data_rx = watches.register("/p", WatchKind::Data);
        let mut child_rx = watches.register("/p", WatchKind::Child);

        watches.process(event(EventType::NodeChildrenChanged, "/p"));
        assert!(child_rx.try_recv().is_ok());
        assert!(data_rx.try_recv().is_err());
        // The data watch survives.
        assert_eq!(watches.watched_paths(), 1);
    }

    #[test]
    fn test_other_paths_untouched() {
        let watches = WatchManager::new();
        let mut a_rx = watches.register("/a", WatchKind::Data);
        let mut b_rx = watches.register("/b", WatchKind::Data);

        watches.process(event(EventType::NodeDataChanged, "/a"));
        assert!(a_rx.try_recv().is_ok());
        assert!(b_rx.try_recv().is_err());
    }

    #[test]
    fn test_state_notification_broadcasts_without_consuming() {
        let watches = WatchManager::new();
        let mut a_rx = watches.register("/a", WatchKind::Data);
        let mut b_rx = watches.register("/b", WatchKind::Child);

        let disconnect = WatchedEvent {
            event_type: EventType::None,
            state: KeeperState::Disconnected,
            path: String::new(),
        };
        watches.process(disconnect);
        assert!(a_rx.try_recv().is_ok());
        assert!(b_rx.try_recv().is_ok());
        assert_eq!(watches.watched_paths(), 2);
    }
}
