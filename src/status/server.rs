//! HTTP status endpoint
//!
//! `GET /status[?limit=N]` returns the status snapshot as JSON,
//! `GET /health` returns `{"status":"ok"}`.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{error, info};

use super::StatusReader;
use crate::error::{Error, Result};

#[derive(Debug, Default, Deserialize)]
pub struct StatusQuery {
    /// Maximum number of transactions to return
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

/// Build the status routes
pub fn router(reader: Arc<StatusReader>) -> Router {
    Router::new()
        .route("/status", get(status))
        .route("/health", get(|| async { Json(serde_json::json!({ "status": "ok" })) }))
        .with_state(reader)
}

async fn status(
    State(reader): State<Arc<StatusReader>>,
    Query(query): Query<StatusQuery>,
) -> Response {
    match reader.snapshot().await {
        Ok(mut snapshot) => {
            if let Some(limit) = query.limit {
                snapshot.truncate_transactions(limit);
            }
            Json(snapshot).into_response()
        }
        Err(e) => {
            error!("Status snapshot failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ErrorResponse {
                    error: format!("Store unavailable: {}", e),
                }),
            )
                .into_response()
        }
    }
}

/// Serve the status routes on `bind` until shutdown is signalled
pub async fn serve(
    bind: SocketAddr,
    reader: Arc<StatusReader>,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!("Status server listening on {}", listener.local_addr()?);

    axum::serve(listener, router(reader))
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await
        .map_err(|e| Error::Internal(format!("Status server failed: {}", e)))?;

    info!("Status server stopped");
    Ok(())
}
