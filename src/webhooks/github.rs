use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::Json,
};
use serde_json::Value;
use tracing::{info, warn};

use crate::webhooks::{pull_request, push, review, AppState};

pub async fn handle_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let event_name = headers
        .get("X-GitHub-Event")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown");

    let action = payload
        .get("action")
        .and_then(|v| v.as_str())
        .unwrap_or("-");

    info!("Received webhook: {} ({})", event_name, action);

    let result = match event_name {
        "pull_request" => pull_request::handle_pull_request_event(&state, &payload).await,
        "pull_request_review" => review::handle_review_event(&state, &payload).await,
        "push" => push::handle_push_event(&state, &payload).await,
        _ => {
            return (
                StatusCode::OK,
                Json(serde_json::json!({"status": "ignored"})),
            );
        }
    };

    match result {
        Ok(response) => (StatusCode::OK, response),
        Err(e) => {
            warn!("Webhook processing failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": e.to_string()})),
            )
        }
    }
}
