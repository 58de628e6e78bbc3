//! WebSocket client connection state.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use filament_core::{CloseCode, ConnectionId};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Close request shared between a connection and its writer task.
///
/// The writer holds this instead of the connection so that dropping the
/// last [`ClientConnection`] closes the outbound channel.
#[derive(Debug, Default)]
pub struct CloseSignal {
    token: CancellationToken,
    frame: Mutex<Option<(CloseCode, String)>>,
}

impl CloseSignal {
    /// Resolves once a close has been requested.
    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }

    /// Whether a close has been requested.
    pub fn is_requested(&self) -> bool {
        self.token.is_cancelled()
    }

    /// The requested close code and reason, if any.
    pub fn frame(&self) -> Option<(CloseCode, String)> {
        self.frame.lock().clone()
    }

    fn request(&self, code: CloseCode, reason: &str) -> bool {
        let mut frame = self.frame.lock();
        if frame.is_some() {
            return false;
        }
        *frame = Some((code, reason.to_string()));
        self.token.cancel();
        true
    }
}

/// A connected WebSocket client, as seen by the registry.
pub struct ClientConnection {
    id: ConnectionId,
    /// Send channel to the client's WebSocket write task.
    tx: mpsc::Sender<Arc<str>>,
    close: Arc<CloseSignal>,
    connected_at: Instant,
    /// Count of frames dropped because the channel was full or closed.
    dropped_messages: AtomicU64,
}

impl ClientConnection {
    /// Create a new connection.
    pub fn new(id: ConnectionId, tx: mpsc::Sender<Arc<str>>) -> Self {
        Self {
            id,
            tx,
            close: Arc::new(CloseSignal::default()),
            connected_at: Instant::now(),
            dropped_messages: AtomicU64::new(0),
        }
    }

    /// Connection ID.
    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    /// Enqueue a text frame for the client.
    ///
    /// Returns `false` if the connection is closing or the channel is full
    /// or closed; the frame is then dropped and counted.
    pub fn send(&self, payload: Arc<str>) -> bool {
        if !self.close.is_requested() && self.tx.try_send(payload).is_ok() {
            true
        } else {
            let _ = self.dropped_messages.fetch_add(1, Ordering::Relaxed);
            false
        }
    }

    /// Request that the writer send a close frame and stop.
    ///
    /// Only the first request wins; later calls return `false`.
    pub fn close(&self, code: CloseCode, reason: &str) -> bool {
        self.close.request(code, reason)
    }

    /// Whether a close has been requested.
    pub fn is_closing(&self) -> bool {
        self.close.is_requested()
    }

    /// Handle for the writer task.
    pub fn close_signal(&self) -> Arc<CloseSignal> {
        self.close.clone()
    }

    /// Total frames dropped for this connection.
    pub fn drop_count(&self) -> u64 {
        self.dropped_messages.load(Ordering::Relaxed)
    }

    /// Connection age.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }
}
