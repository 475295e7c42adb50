use std::collections::HashSet;

use axum::response::Json;
use serde_json::Value;
use tracing::info;

use crate::error::{BotError, Result};
use crate::github::types::ReviewState;
use crate::reconcile::labels::{FixMeTrigger, LabelReconciler};
use crate::webhooks::AppState;

pub async fn handle_review_event(state: &AppState, payload: &Value) -> Result<Json<Value>> {
    let action = payload
        .get("action")
        .and_then(|v| v.as_str())
        .unwrap_or("unknown");
    if action != "submitted" {
        return Ok(Json(serde_json::json!({"status": "ignored"})));
    }

    let review_state = payload
        .get("review")
        .and_then(|r| r.get("state"))
        .and_then(|s| s.as_str())
        .map(ReviewState::parse)
        .unwrap_or(ReviewState::Other);

    // COMMENT and APPROVE reviews never touch fix-me.
    if review_state != ReviewState::ChangesRequested {
        return Ok(Json(serde_json::json!({"status": "ignored"})));
    }

    let pr = payload
        .get("pull_request")
        .ok_or_else(|| BotError::WebhookError("Payload has no pull_request".to_string()))?;
    let number = pr
        .get("number")
        .and_then(|n| n.as_u64())
        .ok_or_else(|| BotError::WebhookError("Pull request has no number".to_string()))?;
    let labels: Vec<String> = pr
        .get("labels")
        .and_then(|l| l.as_array())
        .map(|labels| {
            labels
                .iter()
                .filter_map(|l| l.get("name").and_then(|n| n.as_str()))
                .map(|n| n.to_string())
                .collect()
        })
        .unwrap_or_default();

    info!("Changes requested on PR #{}", number);

    let plan = LabelReconciler::plan_fix_me(FixMeTrigger::ChangesRequested, &labels);
    if !plan.is_empty() {
        let lock = state.locks.lock_for(number).await;
        let _guard = lock.lock().await;
        let mut ensured = HashSet::new();
        LabelReconciler::apply(state.gateway.as_ref(), number, &plan, &mut ensured).await?;
    }

    Ok(Json(serde_json::json!({"status": "processed"})))
}
