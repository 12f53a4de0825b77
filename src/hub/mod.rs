//! Process-local fan-out of live GPS samples to the connections watching a
//! transport request. Delivery is best-effort: frames that do not fit in a
//! connection's outbound queue are dropped, and a connection whose queue is
//! gone is pruned on the next send.

mod message;

pub use message::{ClientMessage, ServerMessage};

use std::collections::{HashMap, HashSet};

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::auth::User;
use crate::entities::GpsTracking;

pub type ConnectionId = Uuid;

/// Frames a connection may have queued before further frames are dropped.
pub const OUTBOUND_CAPACITY: usize = 256;

struct Peer {
    viewer: User,
    sender: mpsc::Sender<ServerMessage>,
    requests: HashSet<Uuid>,
}

enum Delivery {
    Sent,
    Dropped,
    Closed,
}

impl Peer {
    fn deliver(&self, message: ServerMessage) -> Delivery {
        match self.sender.try_send(message) {
            Ok(()) => Delivery::Sent,
            Err(TrySendError::Full(_)) => Delivery::Dropped,
            Err(TrySendError::Closed(_)) => Delivery::Closed,
        }
    }
}

#[derive(Default)]
struct Registry {
    peers: HashMap<ConnectionId, Peer>,
    watchers: HashMap<Uuid, HashSet<ConnectionId>>,
}

impl Registry {
    fn remove_peer(&mut self, connection_id: &ConnectionId) -> bool {
        let peer = match self.peers.remove(connection_id) {
            Some(peer) => peer,
            None => return false,
        };

        for request_id in peer.requests {
            self.forget_watcher(connection_id, &request_id);
        }

        true
    }

    fn forget_watcher(&mut self, connection_id: &ConnectionId, request_id: &Uuid) {
        if let Some(watchers) = self.watchers.get_mut(request_id) {
            watchers.remove(connection_id);
            if watchers.is_empty() {
                self.watchers.remove(request_id);
            }
        }
    }
}

#[derive(Default)]
pub struct TrackingHub {
    registry: Mutex<Registry>,
}

impl TrackingHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new connection opened by `viewer` and hands back the queue
    /// the connection's writer drains.
    #[tracing::instrument(skip(self))]
    pub async fn connect(&self, viewer: User) -> (ConnectionId, mpsc::Receiver<ServerMessage>) {
        let (sender, receiver) = mpsc::channel(OUTBOUND_CAPACITY);
        let connection_id = Uuid::new_v4();

        self.registry.lock().await.peers.insert(
            connection_id,
            Peer {
                viewer,
                sender,
                requests: HashSet::new(),
            },
        );

        tracing::debug!(%connection_id, "connection registered");

        (connection_id, receiver)
    }

    /// Records interest of `connection_id` in `request_id`. Returns false if
    /// the connection is unknown or its queue has closed.
    #[tracing::instrument(skip(self))]
    pub async fn subscribe(&self, connection_id: ConnectionId, request_id: Uuid) -> bool {
        let mut registry = self.registry.lock().await;

        let delivery = match registry.peers.get(&connection_id) {
            Some(peer) => peer.deliver(ServerMessage::Subscribed { request_id }),
            None => return false,
        };

        if let Delivery::Closed = delivery {
            registry.remove_peer(&connection_id);
            tracing::debug!(%connection_id, "connection closed before subscribing");
            return false;
        }

        if let Some(peer) = registry.peers.get_mut(&connection_id) {
            peer.requests.insert(request_id);
        }

        registry
            .watchers
            .entry(request_id)
            .or_default()
            .insert(connection_id);

        tracing::debug!(%connection_id, %request_id, "subscribed to tracking");

        true
    }

    /// Stops delivering `request_id` to one connection.
    #[tracing::instrument(skip(self))]
    pub async fn unsubscribe(&self, connection_id: ConnectionId, request_id: Uuid) -> bool {
        let mut registry = self.registry.lock().await;

        let watched = match registry.peers.get_mut(&connection_id) {
            Some(peer) => peer.requests.remove(&request_id),
            None => return false,
        };

        if watched {
            registry.forget_watcher(&connection_id, &request_id);
            tracing::debug!(%connection_id, %request_id, "unsubscribed from tracking");
        }

        watched
    }

    /// Connections currently watching `request_id`, with who opened them.
    pub async fn watchers(&self, request_id: Uuid) -> Vec<(ConnectionId, User)> {
        let registry = self.registry.lock().await;

        registry
            .watchers
            .get(&request_id)
            .map(|watchers| {
                watchers
                    .iter()
                    .filter_map(|connection_id| {
                        registry
                            .peers
                            .get(connection_id)
                            .map(|peer| (*connection_id, peer.viewer.clone()))
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Sends a frame to one connection only.
    pub async fn notify(&self, connection_id: ConnectionId, message: ServerMessage) -> bool {
        let mut registry = self.registry.lock().await;

        let delivery = match registry.peers.get(&connection_id) {
            Some(peer) => peer.deliver(message),
            None => return false,
        };

        match delivery {
            Delivery::Sent => true,
            Delivery::Dropped => false,
            Delivery::Closed => {
                registry.remove_peer(&connection_id);
                false
            }
        }
    }

    /// Pushes the sample to every connection watching its request and returns
    /// how many accepted it.
    #[tracing::instrument(skip(self, sample), fields(request_id = %sample.request_id))]
    pub async fn publish(&self, sample: &GpsTracking) -> usize {
        let mut registry = self.registry.lock().await;

        let watchers: Vec<ConnectionId> = match registry.watchers.get(&sample.request_id) {
            Some(watchers) => watchers.iter().cloned().collect(),
            None => return 0,
        };

        let mut delivered = 0;
        let mut dropped = 0;
        let mut dead = vec![];

        for connection_id in watchers {
            let delivery = registry
                .peers
                .get(&connection_id)
                .map(|peer| peer.deliver(ServerMessage::LocationUpdate(sample.clone())))
                .unwrap_or(Delivery::Closed);

            match delivery {
                Delivery::Sent => delivered += 1,
                Delivery::Dropped => dropped += 1,
                Delivery::Closed => dead.push(connection_id),
            }
        }

        for connection_id in dead.iter() {
            registry.remove_peer(connection_id);
        }

        if !dead.is_empty() {
            tracing::info!(dropped = dead.len(), "dropped closed tracking connections");
        }

        if dropped > 0 {
            tracing::debug!(dropped, "skipped watchers with full queues");
        }

        tracing::debug!(delivered, "location update broadcast");

        delivered
    }

    /// Implicit unsubscribe from everything the connection watched.
    #[tracing::instrument(skip(self))]
    pub async fn disconnect(&self, connection_id: ConnectionId) {
        if self.registry.lock().await.remove_peer(&connection_id) {
            tracing::debug!(%connection_id, "connection removed");
        }
    }

    pub async fn subscriber_count(&self, request_id: Uuid) -> usize {
        self.registry
            .lock()
            .await
            .watchers
            .get(&request_id)
            .map(|watchers| watchers.len())
            .unwrap_or(0)
    }

    pub async fn connection_count(&self) -> usize {
        self.registry.lock().await.peers.len()
    }

    /// Drops every connection; their outbound queues close once drained.
    #[tracing::instrument(skip(self))]
    pub async fn shutdown(&self) {
        let mut registry = self.registry.lock().await;
        let connections = registry.peers.len();

        registry.peers.clear();
        registry.watchers.clear();

        tracing::info!(connections, "tracking hub shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::entities::{tracking::sample_at, LegStatus};
    use chrono::Utc;

    fn viewer() -> User {
        User::new(Uuid::new_v4(), Role::Client)
    }

    fn sample_for(request_id: Uuid) -> GpsTracking {
        GpsTracking::new(
            request_id,
            Uuid::new_v4(),
            sample_at(1.0, 2.0, LegStatus::EnRoute, Utc::now()),
        )
    }

    #[tokio::test]
    async fn publish_reaches_only_subscribers_of_the_request() {
        let hub = TrackingHub::new();
        let (r1, r2) = (Uuid::new_v4(), Uuid::new_v4());

        let (watcher, mut watcher_rx) = hub.connect(viewer()).await;
        let (bystander, mut bystander_rx) = hub.connect(viewer()).await;

        assert!(hub.subscribe(watcher, r1).await);
        assert!(hub.subscribe(bystander, r2).await);

        assert_eq!(
            watcher_rx.recv().await.unwrap(),
            ServerMessage::Subscribed { request_id: r1 }
        );
        assert_eq!(
            bystander_rx.recv().await.unwrap(),
            ServerMessage::Subscribed { request_id: r2 }
        );

        let sample = sample_for(r1);
        assert_eq!(hub.publish(&sample).await, 1);

        assert_eq!(
            watcher_rx.recv().await.unwrap(),
            ServerMessage::LocationUpdate(sample)
        );
        assert!(bystander_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn one_connection_may_watch_many_requests() {
        let hub = TrackingHub::new();
        let (r1, r2) = (Uuid::new_v4(), Uuid::new_v4());
        let (connection, mut rx) = hub.connect(viewer()).await;

        hub.subscribe(connection, r1).await;
        hub.subscribe(connection, r2).await;
        rx.recv().await.unwrap();
        rx.recv().await.unwrap();

        hub.publish(&sample_for(r1)).await;
        hub.publish(&sample_for(r2)).await;

        let mut seen = vec![];
        for _ in 0..2 {
            match rx.recv().await.unwrap() {
                ServerMessage::LocationUpdate(sample) => seen.push(sample.request_id),
                other => panic!("unexpected frame {:?}", other),
            }
        }
        assert_eq!(seen, vec![r1, r2]);
    }

    #[tokio::test]
    async fn disconnect_unsubscribes_everything() {
        let hub = TrackingHub::new();
        let request_id = Uuid::new_v4();
        let (connection, _rx) = hub.connect(viewer()).await;

        hub.subscribe(connection, request_id).await;
        assert_eq!(hub.subscriber_count(request_id).await, 1);

        hub.disconnect(connection).await;
        assert_eq!(hub.subscriber_count(request_id).await, 0);
        assert_eq!(hub.connection_count().await, 0);
        assert_eq!(hub.publish(&sample_for(request_id)).await, 0);
        assert!(!hub.subscribe(connection, request_id).await);
    }

    #[tokio::test]
    async fn dropped_receivers_are_pruned_on_publish() {
        let hub = TrackingHub::new();
        let request_id = Uuid::new_v4();

        let (gone, gone_rx) = hub.connect(viewer()).await;
        let (alive, mut alive_rx) = hub.connect(viewer()).await;
        hub.subscribe(gone, request_id).await;
        hub.subscribe(alive, request_id).await;
        drop(gone_rx);
        alive_rx.recv().await.unwrap();

        assert_eq!(hub.publish(&sample_for(request_id)).await, 1);
        assert_eq!(hub.subscriber_count(request_id).await, 1);
        assert_eq!(hub.connection_count().await, 1);
    }

    #[tokio::test]
    async fn shutdown_closes_every_queue() {
        let hub = TrackingHub::new();
        let (connection, mut rx) = hub.connect(viewer()).await;
        hub.subscribe(connection, Uuid::new_v4()).await;
        rx.recv().await.unwrap();

        hub.shutdown().await;

        assert!(rx.recv().await.is_none());
        assert_eq!(hub.connection_count().await, 0);
    }

    #[tokio::test]
    async fn stalled_watchers_do_not_grow_their_queue() {
        let hub = TrackingHub::new();
        let request_id = Uuid::new_v4();
        let (stalled, mut rx) = hub.connect(viewer()).await;

        hub.subscribe(stalled, request_id).await;
        rx.recv().await.unwrap();

        let mut delivered = 0;
        for _ in 0..OUTBOUND_CAPACITY + 100 {
            delivered += hub.publish(&sample_for(request_id)).await;
        }
        assert_eq!(delivered, OUTBOUND_CAPACITY);

        let mut queued = 0;
        while rx.try_recv().is_ok() {
            queued += 1;
        }
        assert_eq!(queued, OUTBOUND_CAPACITY);

        // a full queue is not a dead one
        assert_eq!(hub.subscriber_count(request_id).await, 1);
        assert_eq!(hub.publish(&sample_for(request_id)).await, 1);
    }

    #[tokio::test]
    async fn subscribing_a_closed_connection_prunes_it() {
        let hub = TrackingHub::new();
        let request_id = Uuid::new_v4();
        let (connection, rx) = hub.connect(viewer()).await;
        drop(rx);

        assert!(!hub.subscribe(connection, request_id).await);
        assert_eq!(hub.subscriber_count(request_id).await, 0);
        assert_eq!(hub.connection_count().await, 0);
    }

    #[tokio::test]
    async fn unsubscribe_keeps_other_requests() {
        let hub = TrackingHub::new();
        let (r1, r2) = (Uuid::new_v4(), Uuid::new_v4());
        let owner = viewer();
        let (connection, _rx) = hub.connect(owner.clone()).await;

        hub.subscribe(connection, r1).await;
        hub.subscribe(connection, r2).await;
        assert_eq!(hub.watchers(r1).await, vec![(connection, owner)]);

        assert!(hub.unsubscribe(connection, r1).await);
        assert!(!hub.unsubscribe(connection, r1).await);
        assert!(hub.watchers(r1).await.is_empty());
        assert_eq!(hub.subscriber_count(r2).await, 1);
        assert_eq!(hub.connection_count().await, 1);
    }

    #[test]
    fn concurrent_subscribers_are_all_registered() {
        use std::sync::Arc;
        use tokio_test::block_on;

        let hub = Arc::new(TrackingHub::new());
        let request_id = Uuid::new_v4();

        let count = block_on(async {
            let mut receivers = vec![];
            let mut handles = vec![];

            for _ in 0..16 {
                let (connection, rx) = hub.connect(viewer()).await;
                receivers.push(rx);

                let hub = hub.clone();
                handles.push(async move { hub.subscribe(connection, request_id).await });
            }

            let results = futures::future::join_all(handles).await;
            assert!(results.into_iter().all(|subscribed| subscribed));

            hub.subscriber_count(request_id).await
        });

        assert_eq!(count, 16);
    }
}
