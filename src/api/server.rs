use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use thiserror::Error;
use tokio::net::UnixListener;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::ServiceConfig;
use crate::diff::analyzer::{SharedReportAnalyzer, SlimAnalyzer};
use crate::diff::artifact::ArtifactNamer;
use crate::diff::orchestrator::DiffService;

#[derive(Clone)]
pub struct AppState {
    pub service_name: &'static str,
    pub service_version: &'static str,
    pub started_unix_ms: u128,
    pub diff_service: DiffService,
}

impl AppState {
    pub fn new(diff_service: DiffService) -> Self {
        Self {
            service_name: "slimdiff-backend",
            service_version: env!("CARGO_PKG_VERSION"),
            started_unix_ms: now_unix_ms(),
            diff_service,
        }
    }
}

#[derive(Debug, Error)]
pub enum ServeError {
    #[error("failed to prepare socket directory {}: {source}", path.display())]
    SocketDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to bind socket {}: {source}", path.display())]
    Bind {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("http server error: {0}")]
    Serve(#[source] std::io::Error),
}

pub fn diff_service_from_config(config: &ServiceConfig) -> DiffService {
    let analyzer: SharedReportAnalyzer = Arc::new(SlimAnalyzer::new(
        config.analyzer_program.as_str(),
        config.fetch_timeout,
    ));
    DiffService::with_analyzer(analyzer, ArtifactNamer::new(config.artifact_dir.as_path()))
}

pub fn build_router(config: &ServiceConfig) -> Router {
    build_router_with_diff_service(diff_service_from_config(config))
}

pub fn build_router_with_diff_service(diff_service: DiffService) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/diff", get(crate::api::diff::diff_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(AppState::new(diff_service))
}

/// Serves the API on `config.socket_path` until `shutdown` resolves. A stale
/// socket file is replaced on start and removed on exit.
pub async fn serve(
    config: ServiceConfig,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), ServeError> {
    let socket_path = config.socket_path.clone();
    let listener = bind_unix_socket(socket_path.as_path())?;
    let app = build_router(&config);
    info!(
        socket = %socket_path.display(),
        analyzer = %config.analyzer_program,
        artifact_dir = %config.artifact_dir.display(),
        timeout_secs = config.fetch_timeout.as_secs(),
        "starting slimdiff-backend HTTP surface"
    );

    let result = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(ServeError::Serve);
    remove_socket_file(socket_path.as_path());
    info!("slimdiff-backend stopped");
    result
}

pub fn bind_unix_socket(path: &Path) -> Result<UnixListener, ServeError> {
    remove_socket_file(path);
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| ServeError::SocketDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    UnixListener::bind(path).map_err(|source| ServeError::Bind {
        path: path.to_path_buf(),
        source,
    })
}

fn remove_socket_file(path: &Path) {
    if let Err(error) = std::fs::remove_file(path) {
        if error.kind() != std::io::ErrorKind::NotFound {
            warn!(socket = %path.display(), error = %error, "failed to remove socket file");
        }
    }
}

pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            warn!(error = %error, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(error) => {
                warn!(error = %error, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}

async fn health_handler(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "ok": true,
            "status": "ok",
            "service": state.service_name,
            "version": state.service_version,
            "started_unix_ms": state.started_unix_ms,
        })),
    )
}

fn now_unix_ms() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_millis())
}
