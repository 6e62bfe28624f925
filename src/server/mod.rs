use crate::config::Config;
use crate::streaming::{self, FileRangeServer, SessionManager, StreamResponder, TranscodeAdmission};
use anyhow::{Context, Result};
use axum::{
    http::{header, Method, StatusCode},
    response::IntoResponse,
    routing::get,
    Router,
};
use reelstream_av::{ProcessOptions, TranscodeSettings};
use reelstream_common::paths::AllowedRoots;
use reelstream_common::{DiagnosticSink, Error, EventLog, StreamEvent};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

mod client;
mod error;
pub mod routes_sessions;

pub use client::ClientInfo;
pub use error::AppError;

/// Shared application context
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Config>,
    /// Root-checked file access
    pub files: FileRangeServer,
    pub responder: Arc<StreamResponder>,
    /// Registry of in-flight streams
    pub sessions: SessionManager,
    /// Recent diagnostic events
    pub events: Arc<EventLog>,
    pub admission: TranscodeAdmission,
    pub transcode: Arc<TranscodeSettings>,
    pub process_options: ProcessOptions,
    /// Cancelled on shutdown; every session token is a child of it
    pub shutdown: CancellationToken,
}

impl AppContext {
    pub fn new(config: Config) -> Self {
        let events = Arc::new(EventLog::default());
        let roots = AllowedRoots::new(config.library.roots.iter().cloned());
        let process_options = config.transcode.process_options();
        let responder = StreamResponder::new(
            config.streaming.chunk_size,
            process_options.terminate_grace,
            events.clone(),
        );

        Self {
            files: FileRangeServer::new(roots),
            responder: Arc::new(responder),
            sessions: SessionManager::new(),
            admission: TranscodeAdmission::new(config.transcode.max_concurrent),
            transcode: Arc::new(config.transcode.settings()),
            process_options,
            shutdown: CancellationToken::new(),
            events,
            config: Arc::new(config),
        }
    }

    /// Record a request refused before any response body was produced.
    pub fn reject(&self, resource: &str, err: Error) -> AppError {
        self.events.emit(StreamEvent::Rejected {
            resource: resource.to_string(),
            status: err.http_status(),
            reason: err.to_string(),
        });
        AppError::new(err)
    }
}

/// Create the Axum router with all routes
pub fn create_router(ctx: AppContext) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::HEAD, Method::OPTIONS])
        .allow_headers([header::RANGE, header::CONTENT_TYPE])
        .expose_headers([
            header::CONTENT_RANGE,
            header::CONTENT_LENGTH,
            header::ACCEPT_RANGES,
        ]);

    Router::new()
        // Health check
        .route("/health", get(health_check))
        .nest("/api/stream", streaming::stream_router())
        .nest("/api", routes_sessions::session_routes())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

async fn health_check() -> impl IntoResponse {
    StatusCode::OK
}

/// Start the HTTP server
pub async fn start_server(config: Config) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;

    let ctx = AppContext::new(config);
    if ctx.files.roots().roots().is_empty() {
        tracing::warn!("No usable media roots; streaming requests will return 404");
    }
    for root in ctx.files.roots().roots() {
        tracing::info!("Serving media from {:?}", root);
    }
    if let Err(e) = reelstream_av::require_tool(&ctx.transcode.ffmpeg) {
        tracing::warn!("Transcoding unavailable: {}", e);
    }

    let shutdown = ctx.shutdown.clone();
    let app = create_router(ctx);

    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        shutdown_signal().await;
        // End open streams so the server can drain.
        shutdown.cancel();
    })
    .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => {}
            Err(e) => {
                tracing::error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
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

    tracing::info!("Shutdown signal received");
}
