mod cors;
mod error;
mod http;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use wstudio_api::EventStore;

pub use error::ApiError;

pub const EVENTS_PATH: &str = "/api/2.0/resources/wstudio";

/// How the façade reacts to failures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApiOptions {
    /// Off: store errors are logged and answered with an empty 200.
    /// On: store errors → 500, incomplete write payloads → 400.
    pub strict_errors: bool,
}

#[derive(Clone)]
pub struct AppState {
    store: Arc<dyn EventStore>,
    options: ApiOptions,
}

impl AppState {
    pub fn new(store: Arc<dyn EventStore>, options: ApiOptions) -> Self {
        Self { store, options }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(http::handle_root))
        .route("/api/2.0", get(http::handle_status))
        .route("/api/2.0/", get(http::handle_status))
        .route(EVENTS_PATH, post(http::handle_write))
        .route(&format!("{EVENTS_PATH}/ts/{{id}}"), get(http::handle_list_keys))
        .route(&format!("{EVENTS_PATH}/{{id}}"), get(http::handle_read))
        .layer(axum::middleware::from_fn(cors::cors))
        .with_state(state)
}

/// Bind `0.0.0.0:{port}` and serve until `shutdown` is cancelled.
pub async fn run(port: u16, state: AppState, shutdown: CancellationToken) -> Result<(), String> {
    let listener = TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .map_err(|e| format!("bind api :{port}: {e}"))?;
    serve(listener, state, shutdown).await
}

/// Serve on an already bound listener until `shutdown` is cancelled,
/// then drain in-flight requests.
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    shutdown: CancellationToken,
) -> Result<(), String> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(%addr, "api server listening");
    }

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .map_err(|e| format!("axum serve: {e}"))?;

    tracing::info!("api server stopped");
    Ok(())
}
