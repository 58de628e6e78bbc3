//! Inbound frame routing for subscribed sessions.

use std::sync::Arc;

use filament_core::{Frame, PONG, RelayError, Result, validate};
use tracing::{debug, instrument};

use super::session::Session;
use crate::activity::ActivityLog;
use crate::registry::TopicRegistry;

/// What happened to one inbound frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Routed {
    /// Keepalive answered.
    Pong,
    /// Message echoed to the sender and published to the topic.
    Delivered {
        /// Activity counter value for this message.
        seq: u64,
        /// Connections the publish reached.
        recipients: usize,
    },
    /// The session was not subscribed; the frame was dropped.
    Ignored,
}

/// Validates inbound frames and fans them out through the registry.
///
/// The router never closes a connection itself. An `Err` tells the caller
/// which close code to end the session with.
#[derive(Clone)]
pub struct MessageRouter {
    registry: Arc<dyn TopicRegistry>,
    activity: Arc<ActivityLog>,
}

impl MessageRouter {
    /// Create a router over a registry and an activity log.
    pub fn new(registry: Arc<dyn TopicRegistry>, activity: Arc<ActivityLog>) -> Self {
        Self { registry, activity }
    }

    /// Registry used for delivery.
    pub fn registry(&self) -> &Arc<dyn TopicRegistry> {
        &self.registry
    }

    /// Activity log messages are counted in.
    pub fn activity(&self) -> &Arc<ActivityLog> {
        &self.activity
    }

    /// Route a text frame.
    #[instrument(skip_all, fields(conn_id = %session.id()))]
    pub fn route_text(&self, session: &Session, payload: &str) -> Result<Routed> {
        if !session.is_subscribed() {
            return Ok(Routed::Ignored);
        }
        self.route(session, Frame::decode(payload)?)
    }

    /// Route a binary frame, decoded as UTF-8.
    #[instrument(skip_all, fields(conn_id = %session.id()))]
    pub fn route_bytes(&self, session: &Session, payload: &[u8]) -> Result<Routed> {
        if !session.is_subscribed() {
            return Ok(Routed::Ignored);
        }
        self.route(session, Frame::decode_bytes(payload)?)
    }

    fn route(&self, session: &Session, frame: Frame) -> Result<Routed> {
        let block = match frame {
            Frame::Ping => {
                let _ = self.registry.send(session.id(), Arc::from(PONG));
                return Ok(Routed::Pong);
            }
            Frame::Message(block) => block,
        };

        // Checked on every message: the binding is never cached.
        if !validate(&block.filament) {
            return Err(RelayError::IncompleteFilament);
        }
        let topic = block.filament.topic();
        if !self.registry.is_subscribed(session.id(), &topic) {
            return Err(RelayError::NotSubscribed { topic });
        }

        let entry = self.activity.record(&block.message);
        let payload: Arc<str> = Arc::from(block.message);
        let _ = self.registry.send(session.id(), payload.clone());
        let recipients = self.registry.publish(&topic, payload);
        debug!(%topic, seq = entry.seq, recipients, "message delivered");
        Ok(Routed::Delivered {
            seq: entry.seq,
            recipients,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Call, RecordingRegistry, connect, drain};
    use assert_matches::assert_matches;
    use filament_core::{Filament, MessageBlock};
    use tokio::sync::mpsc;

    struct Fixture {
        registry: Arc<RecordingRegistry>,
        router: MessageRouter,
    }

    impl Fixture {
        fn new() -> Self {
            let registry = Arc::new(RecordingRegistry::default());
            let router = MessageRouter::new(registry.clone(), Arc::new(ActivityLog::new()));
            Self { registry, router }
        }

        fn open(&self, domain: &str, name: &str) -> (Session, mpsc::Receiver<Arc<str>>) {
            let (conn, mut rx) = connect(self.registry.as_ref());
            let mut session = Session::new(conn.id().clone(), Filament::new(domain, name));
            let _ = session.open(self.registry.as_ref()).unwrap();
            // Discard the reconnect identity.
            let _ = drain(&mut rx);
            (session, rx)
        }

        fn count(&self) -> u64 {
            self.router.activity().count()
        }
    }

    fn envelope(domain: &str, name: &str, message: &str) -> String {
        serde_json::to_string(&MessageBlock::new(Filament::new(domain, name), message)).unwrap()
    }

    #[test]
    fn ping_replies_pong_only() {
        let fx = Fixture::new();
        let (session, mut rx) = fx.open("acme", "lobby");

        assert_eq!(fx.router.route_text(&session, "ping").unwrap(), Routed::Pong);

        assert_eq!(drain(&mut rx), vec!["pong".to_string()]);
        assert_eq!(fx.count(), 0);
        assert_eq!(fx.registry.publishes(), 0);
    }

    #[test]
    fn valid_message_is_echoed_then_published() {
        let fx = Fixture::new();
        let (session, mut rx) = fx.open("acme", "lobby");

        let routed = fx
            .router
            .route_text(&session, &envelope("acme", "lobby", "hi"))
            .unwrap();

        assert_eq!(routed, Routed::Delivered { seq: 1, recipients: 1 });
        assert_eq!(fx.count(), 1);
        // Echo plus fan-out: the sender sees it twice.
        assert_eq!(drain(&mut rx), vec!["hi".to_string(), "hi".to_string()]);

        let calls = fx.registry.calls();
        let send = calls.iter().position(|c| matches!(c, Call::Send(_, m) if m == "hi"));
        let publish = calls.iter().position(|c| matches!(c, Call::Publish(..)));
        assert!(send.unwrap() < publish.unwrap());
    }

    #[test]
    fn publish_reaches_every_subscriber() {
        let fx = Fixture::new();
        let (alice, mut alice_rx) = fx.open("acme", "lobby");
        let (_bob, mut bob_rx) = fx.open("acme", "lobby");
        let (_carol, mut carol_rx) = fx.open("other", "lobby");

        let routed = fx
            .router
            .route_text(&alice, &envelope("acme", "lobby", "hi"))
            .unwrap();

        assert_eq!(routed, Routed::Delivered { seq: 1, recipients: 2 });
        assert_eq!(drain(&mut alice_rx).len(), 2);
        assert_eq!(drain(&mut bob_rx), vec!["hi".to_string()]);
        assert!(drain(&mut carol_rx).is_empty());
    }

    #[test]
    fn foreign_topic_is_rejected_with_4100() {
        let fx = Fixture::new();
        let (session, mut rx) = fx.open("acme", "lobby");

        let err = fx
            .router
            .route_text(&session, &envelope("acme", "other", "hi"))
            .unwrap_err();

        assert_matches!(&err, RelayError::NotSubscribed { topic } if topic.as_str() == "acme/other");
        assert_eq!(err.close_code().as_u16(), 4100);
        assert_eq!(fx.registry.publishes(), 0);
        assert_eq!(fx.count(), 0);
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn blank_embedded_filament_is_rejected_with_4000() {
        let fx = Fixture::new();
        let (session, _rx) = fx.open("acme", "lobby");

        let err = fx
            .router
            .route_text(&session, &envelope("acme", "  ", "hi"))
            .unwrap_err();

        assert_matches!(err, RelayError::IncompleteFilament);
        assert_eq!(fx.registry.publishes(), 0);
    }

    #[test]
    fn whitespace_is_significant_for_the_binding() {
        let fx = Fixture::new();
        let (session, _rx) = fx.open("acme", "lobby");

        let err = fx
            .router
            .route_text(&session, &envelope("acme ", "lobby", "hi"))
            .unwrap_err();

        assert_matches!(err, RelayError::NotSubscribed { .. });
    }

    #[test]
    fn malformed_envelope_is_rejected_with_1007() {
        let fx = Fixture::new();
        let (session, _rx) = fx.open("acme", "lobby");

        let err = fx.router.route_text(&session, "{not json").unwrap_err();

        assert_eq!(err.close_code().as_u16(), 1007);
        assert_eq!(fx.count(), 0);
    }

    #[test]
    fn binary_frames_are_decoded_as_text() {
        let fx = Fixture::new();
        let (session, mut rx) = fx.open("acme", "lobby");

        let routed = fx
            .router
            .route_bytes(&session, envelope("acme", "lobby", "bin").as_bytes())
            .unwrap();

        assert_matches!(routed, Routed::Delivered { .. });
        assert_eq!(drain(&mut rx).len(), 2);
    }

    #[test]
    fn invalid_utf8_binary_is_malformed() {
        let fx = Fixture::new();
        let (session, _rx) = fx.open("acme", "lobby");
        let err = fx.router.route_bytes(&session, &[0xc3, 0x28]).unwrap_err();
        assert_matches!(err, RelayError::MalformedEnvelope(_));
    }

    #[test]
    fn unsubscribed_session_is_ignored() {
        let fx = Fixture::new();
        let (conn, mut rx) = connect(fx.registry.as_ref());
        let session = Session::new(conn.id().clone(), Filament::new("acme", "lobby"));

        assert_eq!(fx.router.route_text(&session, "ping").unwrap(), Routed::Ignored);
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn long_message_is_delivered_in_full() {
        let fx = Fixture::new();
        let (session, mut rx) = fx.open("acme", "lobby");
        let message = "m".repeat(100);

        let _ = fx
            .router
            .route_text(&session, &envelope("acme", "lobby", &message))
            .unwrap();

        let frames = drain(&mut rx);
        assert!(frames.iter().all(|f| f.len() == 100));
    }

    #[test]
    fn counter_increments_per_message() {
        let fx = Fixture::new();
        let (session, _rx) = fx.open("acme", "lobby");
        for i in 1..=3 {
            let routed = fx
                .router
                .route_text(&session, &envelope("acme", "lobby", "x"))
                .unwrap();
            assert_matches!(routed, Routed::Delivered { seq, .. } if seq == i);
        }
        assert_eq!(fx.count(), 3);
    }
}
