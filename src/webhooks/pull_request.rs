//! Pull request event processing: rule matching, notification
//! reconciliation, rule labels, fix-me removal, and format checks.

use std::collections::{HashMap, HashSet};

use axum::response::Json;
use serde_json::Value;
use tracing::{info, warn};

use crate::error::{BotError, Result};
use crate::format::FormatChecker;
use crate::github::types::{Mergeable, PullRequestAction, PullRequestSnapshot, StatusState};
use crate::notify::CommentReconciler;
use crate::reconcile::labels::{FixMeTrigger, LabelReconciler};
use crate::rules::{aggregator, matcher};
use crate::webhooks::AppState;

pub const CONFIGURATION_CONTEXT: &str = "Configuration";

pub async fn handle_pull_request_event(
    state: &AppState,
    payload: &Value,
) -> Result<Json<Value>> {
    let action = payload
        .get("action")
        .and_then(|v| v.as_str())
        .unwrap_or("unknown");

    let action = PullRequestAction::parse(action);
    if action == PullRequestAction::Other {
        return Ok(Json(serde_json::json!({"status": "ignored"})));
    }

    let snapshot = snapshot_from_payload(state, payload).await?;
    info!(
        "Processing PR #{} ({:?}) targeting '{}'",
        snapshot.number, action, snapshot.base_ref
    );

    on_pull_request_event(state, action, &snapshot).await?;

    Ok(Json(serde_json::json!({"status": "processed"})))
}

/// Entry point for the dispatch layer; also reachable directly from tests.
pub async fn on_pull_request_event(
    state: &AppState,
    action: PullRequestAction,
    snapshot: &PullRequestSnapshot,
) -> Result<()> {
    if state.rules.blocked() {
        report_blocked_configuration(state, snapshot).await?;
        return Ok(());
    }

    let aggregate = aggregator::aggregate(&state.rules.rules, snapshot);

    let mut collaborator_status: HashMap<String, Option<bool>> = HashMap::new();
    for identity in aggregate.identities() {
        let status = match state.gateway.is_collaborator(identity).await {
            Ok(flag) => Some(flag),
            Err(e) => {
                warn!("Collaborator lookup for '{}' failed: {}", identity, e);
                None
            }
        };
        collaborator_status.insert(identity.to_string(), status);
    }

    let targets = aggregator::partition(&aggregate, snapshot, &collaborator_status);
    if !targets.diagnostics.is_empty() && !state.rules.config.emails.is_empty() {
        warn!(
            "Notification diagnostics for {:?}: {:?}",
            state.rules.config.emails, targets.diagnostics
        );
    }

    let rule_labels: Vec<String> = state
        .rules
        .rules
        .iter()
        .filter(|rule| matcher::matches(rule, snapshot).hit)
        .flat_map(|rule| rule.labels.iter().cloned())
        .collect();

    // All mutations against this PR happen under its lock; a concurrent
    // delivery for the same PR waits here.
    let lock = state.locks.lock_for(snapshot.number).await;
    let _guard = lock.lock().await;

    CommentReconciler::reconcile(state.gateway.as_ref(), snapshot, &targets.mentions, action)
        .await?;
    CommentReconciler::request_new_reviewers(state.gateway.as_ref(), snapshot, &targets.reviewers)
        .await?;

    let mut plan = LabelReconciler::plan_rule_labels(&rule_labels, &snapshot.labels);
    if action == PullRequestAction::Synchronize {
        plan = plan.merge(LabelReconciler::plan_fix_me(
            FixMeTrigger::NewCommits,
            &snapshot.labels,
        ));
    }
    let mut ensured = HashSet::new();
    LabelReconciler::apply(state.gateway.as_ref(), snapshot.number, &plan, &mut ensured).await?;

    FormatChecker::run(
        state.gateway.as_ref(),
        snapshot,
        &state.rules.config.format,
        &state.rules.config.project_key,
        &state.config.bot_logins(),
    )
    .await?;

    Ok(())
}

async fn report_blocked_configuration(
    state: &AppState,
    snapshot: &PullRequestSnapshot,
) -> Result<()> {
    let errors: Vec<&str> = state
        .rules
        .problems
        .iter()
        .map(|p| p.message.as_str())
        .collect();
    warn!(
        "Rule set blocked by configuration errors; skipping PR #{}: {:?}",
        snapshot.number, errors
    );

    state
        .gateway
        .create_commit_status(
            &snapshot.head_sha,
            StatusState::Error,
            "Rule configuration is invalid; see the repository rule file",
            CONFIGURATION_CONTEXT,
        )
        .await
}

async fn snapshot_from_payload(
    state: &AppState,
    payload: &Value,
) -> Result<PullRequestSnapshot> {
    let pr = payload
        .get("pull_request")
        .ok_or_else(|| BotError::WebhookError("Payload has no pull_request".to_string()))?;

    let number = pr
        .get("number")
        .and_then(|n| n.as_u64())
        .ok_or_else(|| BotError::WebhookError("Pull request has no number".to_string()))?;

    let changed_files = state.gateway.changed_files(number).await?;
    let commit_messages = state.gateway.commit_messages(number).await?;

    Ok(PullRequestSnapshot {
        id: pr.get("id").and_then(|v| v.as_u64()).unwrap_or(number),
        number,
        title: pr
            .get("title")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string(),
        body: pr
            .get("body")
            .and_then(|v| v.as_str())
            .map(|b| b.to_string()),
        head_sha: pr
            .get("head")
            .and_then(|h| h.get("sha"))
            .and_then(|s| s.as_str())
            .unwrap_or_default()
            .to_string(),
        base_ref: pr
            .get("base")
            .and_then(|b| b.get("ref"))
            .and_then(|r| r.as_str())
            .unwrap_or_default()
            .to_string(),
        changed_files,
        commit_messages,
        author: pr
            .get("user")
            .and_then(|u| u.get("login"))
            .and_then(|l| l.as_str())
            .unwrap_or_default()
            .to_string(),
        draft: pr.get("draft").and_then(|d| d.as_bool()).unwrap_or(false),
        labels: pr
            .get("labels")
            .and_then(|l| l.as_array())
            .map(|labels| {
                labels
                    .iter()
                    .filter_map(|l| l.get("name").and_then(|n| n.as_str()))
                    .map(|n| n.to_string())
                    .collect()
            })
            .unwrap_or_default(),
        requested_reviewers: pr
            .get("requested_reviewers")
            .and_then(|r| r.as_array())
            .map(|users| {
                users
                    .iter()
                    .filter_map(|u| u.get("login").and_then(|l| l.as_str()))
                    .map(|l| l.to_string())
                    .collect()
            })
            .unwrap_or_default(),
        mergeable: Mergeable::from_flag(
            pr.get("mergeable").and_then(|m| m.as_bool()),
        ),
    })
}
