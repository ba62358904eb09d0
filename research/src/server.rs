//! HTTP entry point: one synchronous research call per request.

use crate::Result;
use crate::controller::Controller;
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

#[derive(Debug, Deserialize)]
pub struct ResearchRequest {
    pub query: String,
}

/// Build the router with `/api/research` and `/health` routes.
pub fn router(controller: Arc<Controller>) -> Router {
    Router::new()
        .route("/api/research", post(research_handler))
        .route("/health", get(health_handler))
        .layer(CorsLayer::permissive())
        .with_state(controller)
}

async fn research_handler(
    State(controller): State<Arc<Controller>>,
    Json(request): Json<ResearchRequest>,
) -> Response {
    if let Err(err) = controller.run(&request.query).await {
        error!(query = %request.query, error = %err, "research run failed");
        return failure(err.to_string());
    }

    match controller.load_bundle(&request.query) {
        Ok(Some(bundle)) => Json(bundle).into_response(),
        Ok(None) => failure("Research pipeline failed to generate results.".to_string()),
        Err(err) => failure(err.to_string()),
    }
}

async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

fn failure(detail: String) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({ "detail": detail })),
    )
        .into_response()
}

pub async fn serve(controller: Arc<Controller>, addr: &str) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr, "research server listening");
    axum::serve(listener, router(controller)).await?;
    Ok(())
}
