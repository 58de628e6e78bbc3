//! Per-connection lifecycle: `Connecting -> Open -> Subscribed -> Closed`.
//!
//! A [`Session`] owns the candidate filament captured from the upgrade path
//! and the reconnect identity handed to the client. It never touches the
//! socket directly; every side effect goes through the [`TopicRegistry`].

use std::sync::Arc;

use filament_core::{
    CloseCode, ConnectionId, Filament, ReconnectId, RelayError, Result, Topic, reconnect_frame,
    validate,
};
use metrics::counter;
use tracing::{debug, info, warn};

use crate::metrics::RELAY_REJECTIONS_TOTAL;
use crate::registry::TopicRegistry;

/// Lifecycle state of a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// Upgrade accepted, filament captured, not yet validated.
    Connecting,
    /// Filament validated, subscription in progress.
    Open,
    /// Subscribed to the filament topic; frames are routed.
    Subscribed,
    /// Terminal.
    Closed,
}

/// How a session ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CloseRecord {
    /// Close code sent or observed.
    pub code: CloseCode,
    /// Close reason sent or observed.
    pub reason: String,
}

impl CloseRecord {
    /// 1006 with no reason: the peer vanished without a close frame.
    pub fn is_abnormal_without_reason(&self) -> bool {
        self.code == CloseCode::Abnormal && self.reason.is_empty()
    }
}

/// State machine for one WebSocket connection.
#[derive(Debug)]
pub struct Session {
    id: ConnectionId,
    filament: Filament,
    topic: Topic,
    state: SessionState,
    reconnect_id: Option<ReconnectId>,
    close: Option<CloseRecord>,
}

impl Session {
    /// Capture the path-derived candidate filament for a new connection.
    pub fn new(id: ConnectionId, filament: Filament) -> Self {
        let topic = filament.topic();
        Self {
            id,
            filament,
            topic,
            state: SessionState::Connecting,
            reconnect_id: None,
            close: None,
        }
    }

    /// Connection this session is bound to.
    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    /// Candidate filament from the upgrade path.
    pub fn filament(&self) -> &Filament {
        &self.filament
    }

    /// Topic key of the candidate filament.
    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Whether inbound frames should be routed.
    pub fn is_subscribed(&self) -> bool {
        self.state == SessionState::Subscribed
    }

    /// Reconnect identity, once assigned.
    pub fn reconnect_id(&self) -> Option<&ReconnectId> {
        self.reconnect_id.as_ref()
    }

    /// How the session ended, once closed.
    pub fn close_record(&self) -> Option<&CloseRecord> {
        self.close.as_ref()
    }

    /// Validate the filament, subscribe, and hand out the reconnect identity.
    ///
    /// An invalid filament closes the connection with 4000 and never
    /// subscribes. A connection the registry does not know ends the session
    /// with 1006 and no identity is sent. Opening again while subscribed
    /// re-sends the same identity.
    pub fn open(&mut self, registry: &dyn TopicRegistry) -> Result<ReconnectId> {
        if self.state == SessionState::Closed {
            return Err(RelayError::SessionClosed);
        }
        if !validate(&self.filament) {
            let err = RelayError::IncompleteFilament;
            self.fail(&err, registry);
            return Err(err);
        }

        self.state = SessionState::Open;
        let reconnect_id = self
            .reconnect_id
            .get_or_insert_with(ReconnectId::new)
            .clone();
        if !registry.subscribe(&self.id, &self.topic) {
            warn!(conn_id = %self.id, topic = %self.topic, "subscribe refused, closing session");
            self.on_close(CloseCode::Abnormal, "");
            return Err(RelayError::SessionClosed);
        }
        self.state = SessionState::Subscribed;

        let frame: Arc<str> = Arc::from(reconnect_frame(&reconnect_id));
        if !registry.send(&self.id, frame) {
            warn!(conn_id = %self.id, "reconnect identity not delivered");
        }
        info!(conn_id = %self.id, topic = %self.topic, "session subscribed");
        Ok(reconnect_id)
    }

    /// Close the connection because of `err`.
    pub fn fail(&mut self, err: &RelayError, registry: &dyn TopicRegistry) {
        let code = err.close_code();
        warn!(conn_id = %self.id, code = code.as_u16(), error = %err, "closing session");
        counter!(RELAY_REJECTIONS_TOTAL, "code" => code.to_string()).increment(1);
        self.terminate(registry, code, err.close_reason());
    }

    /// Close the connection from the server side with `code` and `reason`.
    pub fn terminate(&mut self, registry: &dyn TopicRegistry, code: CloseCode, reason: &str) {
        if self.state == SessionState::Closed {
            return;
        }
        registry.close(&self.id, code, reason);
        self.on_close(code, reason);
    }

    /// Record that the connection closed. Only the first close is kept.
    pub fn on_close(&mut self, code: CloseCode, reason: &str) {
        if self.state == SessionState::Closed {
            return;
        }
        self.state = SessionState::Closed;
        let record = CloseRecord {
            code,
            reason: reason.to_string(),
        };
        if record.is_abnormal_without_reason() {
            debug!(conn_id = %self.id, "abnormal closure, no reason given");
        } else {
            debug!(conn_id = %self.id, code = code.as_u16(), reason, "session closed");
        }
        self.close = Some(record);
    }
}
