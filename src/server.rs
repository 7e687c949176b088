use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tokio::signal;
use tracing::{error, info, warn};

use crate::dispatch::{self, Dispatcher, Outcome};
use crate::store::Gateway;
use crate::upstream::{AccountSource, OwnerSource, TransactionSource};
use crate::webhook::WebhookEvent;
use crate::CLIENT_NAME;

#[derive(Debug, Clone, Copy)]
struct PipelineTimeout(Duration);

pub fn router<S, G>(dispatcher: Arc<Dispatcher<S, G>>, pipeline_timeout: Duration) -> Router
where
    S: OwnerSource + AccountSource + TransactionSource + Send + Sync + 'static,
    G: Gateway + 'static,
{
    Router::new()
        .route("/webhooks/belvo", post(handle_webhook::<S, G>))
        .route("/health", get(health))
        .layer(Extension(dispatcher))
        .layer(Extension(PipelineTimeout(pipeline_timeout)))
}

pub async fn serve(addr: SocketAddr, router: Router) -> anyhow::Result<()> {
    let server = axum::Server::try_bind(&addr)?.serve(router.into_make_service());
    info!(addr = %server.local_addr(), "listening for webhooks");

    server.with_graceful_shutdown(shutdown_signal()).await?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!(error = %err, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                error!(error = %err, "failed to install signal handler");
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

    info!("signal received, starting graceful shutdown");
}

enum WebhookReply {
    Invalid,
    Done(Result<Outcome, dispatch::Error>),
    TimedOut(Duration),
}

impl IntoResponse for WebhookReply {
    fn into_response(self) -> Response {
        match self {
            WebhookReply::Invalid => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "Invalid webhook payload" })),
            ),
            WebhookReply::Done(Ok(Outcome::Succeeded)) => (
                StatusCode::OK,
                Json(json!({
                    "status": "success",
                    "message": "Webhook processed successfully",
                })),
            ),
            WebhookReply::Done(Ok(Outcome::ErrorReported(errors))) => (
                StatusCode::OK,
                Json(json!({
                    "status": "error",
                    "message": "Webhook contains errors",
                    "errors": errors,
                })),
            ),
            WebhookReply::Done(Ok(Outcome::UserNotFound)) => (
                StatusCode::OK,
                Json(json!({
                    "status": "error",
                    "message": "User not found for link_id",
                })),
            ),
            WebhookReply::Done(Err(err)) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "status": "error", "message": err.to_string() })),
            ),
            WebhookReply::TimedOut(after) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "status": "error",
                    "message": format!("webhook processing timed out after {}s", after.as_secs()),
                })),
            ),
        }
        .into_response()
    }
}

async fn handle_webhook<S, G>(
    Extension(dispatcher): Extension<Arc<Dispatcher<S, G>>>,
    Extension(PipelineTimeout(timeout)): Extension<PipelineTimeout>,
    body: Bytes,
) -> WebhookReply
where
    S: OwnerSource + AccountSource + TransactionSource + Send + Sync + 'static,
    G: Gateway + 'static,
{
    let event: WebhookEvent = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(err) => {
            warn!(error = %err, "rejecting malformed webhook body");
            return WebhookReply::Invalid;
        }
    };

    match tokio::time::timeout(timeout, dispatcher.dispatch(&event)).await {
        Ok(result) => WebhookReply::Done(result),
        Err(_) => {
            error!(
                webhook_id = %event.webhook_id,
                link_id = %event.link_id,
                "webhook processing timed out"
            );
            WebhookReply::TimedOut(timeout)
        }
    }
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "healthy", "service": CLIENT_NAME }))
}
