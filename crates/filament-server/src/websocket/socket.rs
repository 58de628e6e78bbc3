//! WebSocket session driver: one reader loop and one writer task per client.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use filament_core::{CloseCode, ConnectionId, Filament, RelayError};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use metrics::{counter, gauge};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::connection::{ClientConnection, CloseSignal};
use super::router::MessageRouter;
use super::session::{CloseRecord, Session};
use crate::metrics::{WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL, WS_DISCONNECTIONS_TOTAL};

/// How long teardown waits for the writer to flush its close frame.
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Close code reported for a peer close frame without a status.
const NO_STATUS_RECEIVED: u16 = 1005;

/// Everything a session needs besides its socket.
#[derive(Clone)]
pub struct SessionDeps {
    /// Frame router (and through it, the registry).
    pub router: MessageRouter,
    /// Outbound channel capacity.
    pub send_queue_capacity: usize,
    /// Close the connection after this long without an inbound frame.
    pub idle_timeout: Option<Duration>,
    /// Server-wide shutdown signal.
    pub shutdown: CancellationToken,
}

/// Run a WebSocket session for a connected client.
///
/// 1. Registers the connection and spawns the outbound writer
/// 2. Opens the session (validate, subscribe, send reconnect identity)
/// 3. Routes inbound frames until close, error, idle timeout, or shutdown
/// 4. Unregisters and waits for the writer to flush
///
/// Returns how the session ended.
#[instrument(skip_all, fields(conn_id = %id, topic = %filament))]
pub async fn run_ws_session(
    socket: WebSocket,
    id: ConnectionId,
    filament: Filament,
    deps: SessionDeps,
) -> Option<CloseRecord> {
    let (ws_tx, mut ws_rx) = socket.split();
    let (send_tx, send_rx) = mpsc::channel::<Arc<str>>(deps.send_queue_capacity.max(1));
    let connection = Arc::new(ClientConnection::new(id.clone(), send_tx));
    let registry = deps.router.registry().clone();

    info!("client connected");
    counter!(WS_CONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).increment(1.0);

    let mut writer = tokio::spawn(write_loop(ws_tx, send_rx, connection.close_signal()));
    registry.register(connection.clone());

    let mut session = Session::new(id.clone(), filament);
    if session.open(registry.as_ref()).is_ok() {
        loop {
            tokio::select! {
                () = deps.shutdown.cancelled() => {
                    session.terminate(registry.as_ref(), CloseCode::GoingAway, CloseCode::GoingAway.reason());
                    break;
                }
                idle = idle_elapsed(deps.idle_timeout) => {
                    session.fail(&RelayError::IdleTimeout(idle), registry.as_ref());
                    break;
                }
                next = ws_rx.next() => {
                    let routed = match next {
                        Some(Ok(Message::Text(text))) => deps.router.route_text(&session, text.as_str()),
                        Some(Ok(Message::Binary(data))) => deps.router.route_bytes(&session, &data),
                        Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
                        Some(Ok(Message::Close(frame))) => {
                            let (code, reason) = peer_close(frame);
                            session.on_close(code, &reason);
                            break;
                        }
                        Some(Err(e)) => {
                            debug!(error = %e, "websocket read failed");
                            session.on_close(CloseCode::Abnormal, "");
                            break;
                        }
                        None => {
                            session.on_close(CloseCode::Abnormal, "");
                            break;
                        }
                    };
                    if let Err(e) = routed {
                        session.fail(&e, registry.as_ref());
                        break;
                    }
                }
            }
        }
    }

    registry.unregister(&id);
    let dropped = connection.drop_count();
    let age = connection.age();
    // The writer ends once the last sender is gone.
    drop(connection);
    if tokio::time::timeout(WRITER_DRAIN_TIMEOUT, &mut writer)
        .await
        .is_err()
    {
        warn!("writer did not finish in {WRITER_DRAIN_TIMEOUT:?}, aborting");
        writer.abort();
    }

    counter!(WS_DISCONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).decrement(1.0);
    let record = session.close_record().cloned();
    info!(
        code = record.as_ref().map(|r| r.code.as_u16()),
        dropped,
        duration_ms = u64::try_from(age.as_millis()).unwrap_or(u64::MAX),
        "client disconnected"
    );
    record
}

/// Forward queued frames to the socket, then send the requested close frame.
///
/// Ends when every sender is gone (the registry dropped the connection) or
/// a close is requested. Frames already queued are flushed first.
async fn write_loop(
    mut ws_tx: SplitSink<WebSocket, Message>,
    mut send_rx: mpsc::Receiver<Arc<str>>,
    close: Arc<CloseSignal>,
) {
    loop {
        tokio::select! {
            biased;
            frame = send_rx.recv() => match frame {
                Some(text) => {
                    if ws_tx.send(Message::Text(text.to_string().into())).await.is_err() {
                        return;
                    }
                }
                None => break,
            },
            () = close.cancelled() => break,
        }
    }

    if let Some((code, reason)) = close.frame() {
        let frame = CloseFrame {
            code: code.as_u16(),
            reason: reason.into(),
        };
        let _ = ws_tx.send(Message::Close(Some(frame))).await;
    }
    let _ = ws_tx.close().await;
}

/// Resolves after `timeout`, or never when it is disabled.
async fn idle_elapsed(timeout: Option<Duration>) -> Duration {
    match timeout {
        Some(timeout) => {
            tokio::time::sleep(timeout).await;
            timeout
        }
        None => std::future::pending().await,
    }
}

fn peer_close(frame: Option<CloseFrame>) -> (CloseCode, String) {
    match frame {
        Some(frame) => (CloseCode::from(frame.code), frame.reason.to_string()),
        None => (CloseCode::Other(NO_STATUS_RECEIVED), String::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peer_close_with_frame() {
        let frame = CloseFrame {
            code: 1000,
            reason: "bye".into(),
        };
        assert_eq!(peer_close(Some(frame)), (CloseCode::Normal, "bye".to_string()));
    }

    #[test]
    fn peer_close_without_frame_is_no_status() {
        assert_eq!(peer_close(None), (CloseCode::Other(1005), String::new()));
    }

    #[tokio::test(start_paused = true)]
    async fn idle_timer_fires_after_timeout() {
        let elapsed = idle_elapsed(Some(Duration::from_secs(30))).await;
        assert_eq!(elapsed, Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn disabled_idle_timer_never_fires() {
        let fired = tokio::time::timeout(Duration::from_secs(3600), idle_elapsed(None)).await;
        assert!(fired.is_err());
    }
}
