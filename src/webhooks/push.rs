use axum::response::Json;
use serde_json::Value;
use tracing::{debug, info};

use crate::error::Result;
use crate::webhooks::AppState;

/// Push events bypass rule matching entirely: they only schedule a
/// mergeable re-check for PRs targeting the pushed branch.
pub async fn handle_push_event(state: &AppState, payload: &Value) -> Result<Json<Value>> {
    let ref_name = payload
        .get("ref")
        .and_then(|r| r.as_str())
        .unwrap_or("");

    let Some(branch) = ref_name.strip_prefix("refs/heads/") else {
        debug!("Push to non-branch ref '{}' ignored", ref_name);
        return Ok(Json(serde_json::json!({"status": "ignored"})));
    };

    info!("Push to '{}'; scheduling mergeable re-check", branch);
    state.scheduler.on_push(branch);

    Ok(Json(serde_json::json!({"status": "scheduled"})))
}
