//! Topic subscription and fan-out substrate.
//!
//! The relay core only talks to the substrate through [`TopicRegistry`], so
//! the server can be handed any implementation (tests inject a recording
//! fake). [`InMemoryTopicRegistry`] is the production implementation.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use dashmap::DashMap;
use filament_core::{CloseCode, ConnectionId, Topic};
use metrics::counter;
use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::metrics::RELAY_FANOUT_DROPS_TOTAL;
use crate::websocket::connection::ClientConnection;

/// Subscribe/publish capabilities the relay requires from its transport.
pub trait TopicRegistry: Send + Sync {
    /// Attach a live connection.
    fn register(&self, connection: Arc<ClientConnection>);

    /// Drop a connection and all of its subscriptions. Idempotent.
    fn unregister(&self, id: &ConnectionId);

    /// Subscribe a registered connection to a topic. Idempotent.
    ///
    /// Returns `false` if the connection is not registered.
    fn subscribe(&self, id: &ConnectionId, topic: &Topic) -> bool;

    /// Whether the connection is currently subscribed to the topic.
    fn is_subscribed(&self, id: &ConnectionId, topic: &Topic) -> bool;

    /// Deliver a payload to every subscriber of the topic, sender included.
    ///
    /// Returns the number of connections the payload was enqueued for.
    fn publish(&self, topic: &Topic, payload: Arc<str>) -> usize;

    /// Deliver a payload to exactly one connection.
    fn send(&self, id: &ConnectionId, payload: Arc<str>) -> bool;

    /// Close a connection and remove it from every topic.
    fn close(&self, id: &ConnectionId, code: CloseCode, reason: &str);

    /// Number of registered connections.
    fn connection_count(&self) -> usize;

    /// Number of topics with at least one subscriber.
    fn topic_count(&self) -> usize;

    /// Number of subscribers of a topic.
    fn subscriber_count(&self, topic: &Topic) -> usize;
}

/// In-process [`TopicRegistry`].
///
/// The topic table sits behind a single `RwLock` (concurrent readers,
/// serialized writers). The per-connection membership index answers
/// `is_subscribed` without touching that lock. Lock order is always the
/// topic table first, then a membership shard.
#[derive(Default)]
pub struct InMemoryTopicRegistry {
    connections: DashMap<ConnectionId, Arc<ClientConnection>>,
    topics: RwLock<HashMap<Topic, HashSet<ConnectionId>>>,
    memberships: DashMap<ConnectionId, HashSet<Topic>>,
}

impl InMemoryTopicRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn detach(&self, id: &ConnectionId) -> Option<Arc<ClientConnection>> {
        let connection = self.connections.remove(id).map(|(_, c)| c);
        let mut topics = self.topics.write();
        if let Some((_, subscribed)) = self.memberships.remove(id) {
            for topic in subscribed {
                if let Some(members) = topics.get_mut(&topic) {
                    let _ = members.remove(id);
                    if members.is_empty() {
                        let _ = topics.remove(&topic);
                    }
                }
            }
        }
        connection
    }
}

impl TopicRegistry for InMemoryTopicRegistry {
    fn register(&self, connection: Arc<ClientConnection>) {
        let id = connection.id().clone();
        let _ = self.memberships.entry(id.clone()).or_default();
        let _ = self.connections.insert(id, connection);
    }

    fn unregister(&self, id: &ConnectionId) {
        if self.detach(id).is_some() {
            debug!(conn_id = %id, "connection unregistered");
        }
    }

    fn subscribe(&self, id: &ConnectionId, topic: &Topic) -> bool {
        if !self.connections.contains_key(id) {
            warn!(conn_id = %id, %topic, "subscribe for unknown connection");
            return false;
        }
        let mut topics = self.topics.write();
        let _ = topics.entry(topic.clone()).or_default().insert(id.clone());
        let _ = self
            .memberships
            .entry(id.clone())
            .or_default()
            .insert(topic.clone());
        debug!(conn_id = %id, %topic, "subscribed");
        true
    }

    fn is_subscribed(&self, id: &ConnectionId, topic: &Topic) -> bool {
        self.memberships
            .get(id)
            .is_some_and(|topics| topics.contains(topic))
    }

    fn publish(&self, topic: &Topic, payload: Arc<str>) -> usize {
        let members: Vec<ConnectionId> = match self.topics.read().get(topic) {
            Some(members) => members.iter().cloned().collect(),
            None => return 0,
        };
        let mut delivered = 0;
        for id in &members {
            let Some(connection) = self.connections.get(id).map(|c| c.value().clone()) else {
                continue;
            };
            if connection.send(payload.clone()) {
                delivered += 1;
            } else {
                counter!(RELAY_FANOUT_DROPS_TOTAL).increment(1);
                warn!(conn_id = %id, %topic, "failed to enqueue fan-out frame");
            }
        }
        debug!(%topic, subscribers = members.len(), delivered, "published");
        delivered
    }

    fn send(&self, id: &ConnectionId, payload: Arc<str>) -> bool {
        let Some(connection) = self.connections.get(id).map(|c| c.value().clone()) else {
            return false;
        };
        connection.send(payload)
    }

    fn close(&self, id: &ConnectionId, code: CloseCode, reason: &str) {
        if let Some(connection) = self.detach(id) {
            let _ = connection.close(code, reason);
            debug!(conn_id = %id, %code, reason, "connection closed by relay");
        }
    }

    fn connection_count(&self) -> usize {
        self.connections.len()
    }

    fn topic_count(&self) -> usize {
        self.topics.read().len()
    }

    fn subscriber_count(&self, topic: &Topic) -> usize {
        self.topics.read().get(topic).map_or(0, HashSet::len)
    }
}
