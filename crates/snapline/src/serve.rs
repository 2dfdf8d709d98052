// SPDX-FileCopyrightText: 2026 Snapline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `snapline serve` command implementation.
//!
//! Wires the full relay together: SQLite storage, the LINE client, the
//! Drive client, the upload pipeline (dispatcher, aggregator, retry
//! worker), and the axum webhook server. Supports graceful shutdown via
//! signal handlers.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use snapline_config::model::SnaplineConfig;
use snapline_core::error::SnaplineError;
use snapline_core::traits::ChatApi;
use snapline_drive::DriveClient;
use snapline_line::LineClient;
use snapline_line::webhook::WebhookPayload;
use snapline_relay::{BatchAggregator, Dispatcher, RetryWorker, UploadProcessor};
use snapline_storage::Database;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// Shared state for the webhook handlers.
struct AppState {
    dispatcher: Dispatcher,
    channel_secret: String,
}

/// Runs the `snapline serve` command.
pub async fn run_serve(config: SnaplineConfig) -> Result<(), SnaplineError> {
    init_tracing(&config.server.log_level);

    info!("starting snapline serve");

    let channel_secret = config
        .line
        .channel_secret
        .clone()
        .ok_or_else(|| SnaplineError::Config("line.channel_secret is required".into()))?;

    // Opening the database applies embedded migrations.
    let db = Database::open(&config.storage.database_path).await?;
    info!(path = config.storage.database_path.as_str(), "storage ready");

    let chat: Arc<dyn ChatApi> = Arc::new(LineClient::new(&config.line)?);
    let drive = Arc::new(DriveClient::new(&config.google, db.clone())?);
    let processor = Arc::new(UploadProcessor::new(db.clone(), drive.clone()));

    let aggregator = Arc::new(BatchAggregator::new(
        Duration::from_secs(config.relay.batch_window_secs),
        chat.clone(),
    ));
    info!(
        window_secs = config.relay.batch_window_secs,
        "batch aggregator ready"
    );

    let dispatcher = Dispatcher::new(
        db.clone(),
        chat.clone(),
        drive,
        processor.clone(),
        aggregator.clone(),
        config.relay.default_upload_limit,
        config.relay.frontend_url.clone(),
    );

    let worker = Arc::new(RetryWorker::new(
        db.clone(),
        processor,
        config.relay.worker_batch_size,
    ));
    worker.start(Duration::from_secs(config.relay.worker_interval_secs));

    let state = Arc::new(AppState {
        dispatcher,
        channel_secret,
    });
    let app = router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| SnaplineError::Config(format!("cannot bind {addr}: {e}")))?;
    info!(addr = addr.as_str(), "webhook server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| SnaplineError::Internal(format!("server error: {e}")))?;

    // Stop background work before the database goes away. Open batch
    // sessions lose their courtesy summary, never their uploads.
    worker.stop();
    aggregator.cancel_all();
    db.close().await?;

    info!("snapline serve shutdown complete");
    Ok(())
}

fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/webhook", post(handle_webhook))
        .route("/health", get(|| async { "ok" }))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Webhook endpoint.
///
/// The signature is verified over the raw body before any JSON parsing.
/// Event handling failures are logged but still acknowledged with 200 so
/// the platform does not redeliver (and double-process) the batch.
async fn handle_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let signature = headers
        .get("x-line-signature")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if !snapline_line::signature::verify_signature(&state.channel_secret, &body, signature) {
        warn!("webhook rejected: bad signature");
        return StatusCode::UNAUTHORIZED;
    }

    let payload: WebhookPayload = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            warn!(error = %e, "webhook rejected: unparsable payload");
            return StatusCode::BAD_REQUEST;
        }
    };

    for event in &payload.events {
        if let Err(e) = state.dispatcher.handle_event(event).await {
            error!(error = %e, "event handling failed");
        }
    }
    StatusCode::OK
}

/// Resolves when SIGINT or SIGTERM arrives.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to install SIGINT handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => error!(error = %e, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}

/// Initializes the tracing subscriber with the given log level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("snapline={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
