//! Prometheus metrics recorder and metric names.

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Install the Prometheus metrics recorder (global).
///
/// Returns the handle used to render `GET /metrics`. Call once at startup,
/// before anything is recorded; a second install fails.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

/// Render Prometheus text format from the installed recorder.
pub fn render(handle: &PrometheusHandle) -> String {
    handle.render()
}

// Metric name constants to avoid typos across modules.

/// WebSocket connections opened total (counter).
pub const WS_CONNECTIONS_TOTAL: &str = "ws_connections_total";
/// WebSocket disconnections total (counter).
pub const WS_DISCONNECTIONS_TOTAL: &str = "ws_disconnections_total";
/// Active WebSocket connections (gauge).
pub const WS_CONNECTIONS_ACTIVE: &str = "ws_connections_active";
/// Messages delivered total (counter).
pub const RELAY_MESSAGES_TOTAL: &str = "relay_messages_total";
/// Sessions closed by the relay (counter, labels: code).
pub const RELAY_REJECTIONS_TOTAL: &str = "relay_rejections_total";
/// Fan-out frames dropped on a full or closed channel (counter).
pub const RELAY_FANOUT_DROPS_TOTAL: &str = "relay_fanout_drops_total";
