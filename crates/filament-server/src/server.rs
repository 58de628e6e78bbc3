//! `RelayServer`: Axum HTTP + WebSocket server.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::{Path, Request, State};
use axum::http::{HeaderValue, Method, StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{MethodRouter, get};
use filament_core::{ConnectionId, Filament};
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use crate::activity::ActivityLog;
use crate::config::ServerConfig;
use crate::cors::{ALLOW_HEADERS, ALLOW_METHODS, cors_layer};
use crate::registry::{InMemoryTopicRegistry, TopicRegistry};
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::router::MessageRouter;
use crate::websocket::socket::{SessionDeps, run_ws_session};

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Frame router shared by every session.
    pub router: MessageRouter,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Shutdown coordinator.
    pub shutdown: ShutdownCoordinator,
    /// Prometheus handle, when a recorder is installed.
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    fn session_deps(&self) -> SessionDeps {
        SessionDeps {
            router: self.router.clone(),
            send_queue_capacity: self.config.send_queue_capacity,
            idle_timeout: self.config.idle_timeout(),
            shutdown: self.shutdown.token(),
        }
    }
}

/// The filament relay server.
pub struct RelayServer {
    config: Arc<ServerConfig>,
    router: MessageRouter,
    shutdown: ShutdownCoordinator,
    metrics: Option<PrometheusHandle>,
}

impl RelayServer {
    /// Create a server backed by an [`InMemoryTopicRegistry`].
    pub fn new(config: ServerConfig) -> Self {
        Self::with_registry(config, Arc::new(InMemoryTopicRegistry::new()))
    }

    /// Create a server backed by the given registry.
    pub fn with_registry(config: ServerConfig, registry: Arc<dyn TopicRegistry>) -> Self {
        Self {
            config: Arc::new(config),
            router: MessageRouter::new(registry, Arc::new(ActivityLog::new())),
            shutdown: ShutdownCoordinator::new(),
            metrics: None,
        }
    }

    /// Serve `GET /metrics` from this handle.
    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            router: self.router.clone(),
            config: self.config.clone(),
            shutdown: self.shutdown.clone(),
            metrics: self.metrics.clone(),
        };

        let mut app = Router::new().route("/status", with_fallback(get(status_handler)));
        if self.metrics.is_some() {
            app = app.route("/metrics", with_fallback(get(metrics_handler)));
        }
        app.route("/{domain}/{filament}", with_fallback(get(upgrade_handler)))
            .fallback(fallback_handler)
            .with_state(state)
            .layer(TraceLayer::new_for_http())
            .layer(cors_layer(&self.config.allowed_origins))
            .layer(middleware::from_fn(departed_on_options))
    }

    /// Bind the listener and serve until the shutdown token is cancelled.
    ///
    /// Returns the bound address (useful with port `0`) and the serve task.
    pub async fn listen(&self) -> std::io::Result<(SocketAddr, JoinHandle<()>)> {
        let listener = TcpListener::bind(self.config.bind_addr()).await?;
        let addr = listener.local_addr()?;
        let app = self.router();
        let token = self.shutdown.token();

        info!(%addr, "filament relay listening");
        let handle = tokio::spawn(async move {
            let serve = axum::serve(listener, app)
                .with_graceful_shutdown(async move { token.cancelled().await });
            if let Err(e) = serve.await {
                error!(error = %e, "server exited with error");
            }
            info!("listener stopped");
        });
        Ok((addr, handle))
    }

    /// Get the shutdown coordinator.
    pub fn shutdown(&self) -> &ShutdownCoordinator {
        &self.shutdown
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Get the topic registry.
    pub fn registry(&self) -> &Arc<dyn TopicRegistry> {
        self.router.registry()
    }

    /// Get the activity log.
    pub fn activity(&self) -> &Arc<ActivityLog> {
        self.router.activity()
    }
}

/// Route other methods on a known path to the catch-all instead of 405.
fn with_fallback(route: MethodRouter<AppState>) -> MethodRouter<AppState> {
    route.fallback(fallback_handler)
}

/// GET /status
async fn status_handler() -> &'static str {
    "OK"
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => crate::metrics::render(handle).into_response(),
        None => not_found(),
    }
}

/// GET /{domain}/{filament}
async fn upgrade_handler(
    State(state): State<AppState>,
    Path((domain, name)): Path<(String, String)>,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let ws = match upgrade {
        Ok(ws) => ws,
        Err(rejection) => {
            debug!(%rejection, %domain, %name, "request is not a websocket upgrade");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Upgrade failed").into_response();
        }
    };

    let id = ConnectionId::new();
    let filament = Filament::new(domain, name);
    let deps = state.session_deps();
    ws.max_message_size(state.config.max_message_size)
        .on_failed_upgrade(|e| warn!(error = %e, "websocket upgrade failed"))
        .on_upgrade(move |socket| async move {
            let _ = run_ws_session(socket, id, filament, deps).await;
        })
}

/// Catch-all for unknown paths and unrouted methods.
async fn fallback_handler() -> Response {
    not_found()
}

/// `OPTIONS` on any path answers `200 Departed`.
///
/// Sits outside the CORS layer, which answers every `OPTIONS` itself, so
/// the allow-origin decision is kept and only the body and the advertised
/// methods and headers are replaced.
async fn departed_on_options(req: Request, next: Next) -> Response {
    if req.method() != Method::OPTIONS {
        return next.run(req).await;
    }
    let (mut parts, _) = next.run(req).await.into_parts();
    parts.status = StatusCode::OK;
    let _ = parts.headers.remove(header::CONTENT_LENGTH);
    let _ = parts.headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    let _ = parts.headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOW_METHODS),
    );
    let _ = parts.headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(ALLOW_HEADERS),
    );
    Response::from_parts(parts, Body::from("Departed"))
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, "Not Found").into_response()
}
