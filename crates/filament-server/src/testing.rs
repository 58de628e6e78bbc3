//! Test doubles shared by unit tests.

use std::sync::Arc;

use filament_core::{CloseCode, ConnectionId, Topic};
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::registry::{InMemoryTopicRegistry, TopicRegistry};
use crate::websocket::connection::ClientConnection;

/// A registry call, as observed by [`RecordingRegistry`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    Subscribe(ConnectionId, Topic),
    Publish(Topic, String),
    Send(ConnectionId, String),
    Close(ConnectionId, CloseCode, String),
}

/// Wraps the in-memory registry and records every mutating call.
#[derive(Default)]
pub struct RecordingRegistry {
    inner: InMemoryTopicRegistry,
    calls: Mutex<Vec<Call>>,
}

impl RecordingRegistry {
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn subscribes(&self) -> usize {
        self.count(|c| matches!(c, Call::Subscribe(..)))
    }

    pub fn publishes(&self) -> usize {
        self.count(|c| matches!(c, Call::Publish(..)))
    }

    pub fn closes(&self) -> Vec<(ConnectionId, CloseCode, String)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Close(id, code, reason) => Some((id, code, reason)),
                _ => None,
            })
            .collect()
    }

    fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().iter().filter(|c| pred(c)).count()
    }

    fn push(&self, call: Call) {
        self.calls.lock().push(call);
    }
}

impl TopicRegistry for RecordingRegistry {
    fn register(&self, connection: Arc<ClientConnection>) {
        self.inner.register(connection);
    }

    fn unregister(&self, id: &ConnectionId) {
        self.inner.unregister(id);
    }

    fn subscribe(&self, id: &ConnectionId, topic: &Topic) -> bool {
        self.push(Call::Subscribe(id.clone(), topic.clone()));
        self.inner.subscribe(id, topic)
    }

    fn is_subscribed(&self, id: &ConnectionId, topic: &Topic) -> bool {
        self.inner.is_subscribed(id, topic)
    }

    fn publish(&self, topic: &Topic, payload: Arc<str>) -> usize {
        self.push(Call::Publish(topic.clone(), payload.to_string()));
        self.inner.publish(topic, payload)
    }

    fn send(&self, id: &ConnectionId, payload: Arc<str>) -> bool {
        self.push(Call::Send(id.clone(), payload.to_string()));
        self.inner.send(id, payload)
    }

    fn close(&self, id: &ConnectionId, code: CloseCode, reason: &str) {
        self.push(Call::Close(id.clone(), code, reason.to_string()));
        self.inner.close(id, code, reason);
    }

    fn connection_count(&self) -> usize {
        self.inner.connection_count()
    }

    fn topic_count(&self) -> usize {
        self.inner.topic_count()
    }

    fn subscriber_count(&self, topic: &Topic) -> usize {
        self.inner.subscriber_count(topic)
    }
}

/// Register a fresh connection and return it with its outbound receiver.
pub fn connect(registry: &dyn TopicRegistry) -> (Arc<ClientConnection>, mpsc::Receiver<Arc<str>>) {
    let (tx, rx) = mpsc::channel(64);
    let connection = Arc::new(ClientConnection::new(ConnectionId::new(), tx));
    registry.register(connection.clone());
    (connection, rx)
}

/// Drain every frame currently queued for a connection.
pub fn drain(rx: &mut mpsc::Receiver<Arc<str>>) -> Vec<String> {
    let mut frames = Vec::new();
    while let Ok(frame) = rx.try_recv() {
        frames.push(frame.to_string());
    }
    frames
}
