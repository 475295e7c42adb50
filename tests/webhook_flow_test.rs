//! Webhook payloads driven through the dispatch layer: push scheduling,
//! review label handling, and pull request payload parsing.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::Json;
use serde_json::json;

use rules_bot::github::gateway::InMemoryGateway;
use rules_bot::github::types::Mergeable;
use rules_bot::reconcile::labels::{FIX_ME_LABEL, NEEDS_REBASE_LABEL};
use rules_bot::webhooks::{github, push, review};

mod common;
use common::{app_state, snapshot};

const RULES: &str = r#"
projectKey: WFLY
rules:
  - id: Title
    title: Title
    notify: [userA]
format:
  enabled: false
"#;

#[tokio::test]
async fn push_to_branch_schedules_a_mergeable_re_check() {
    let gateway = Arc::new(InMemoryGateway::new());
    let state = app_state(RULES, Arc::clone(&gateway));
    gateway.add_pull_request(snapshot(1, "anything"));
    gateway.set_mergeable_sequence(1, vec![Mergeable::Conflicted]);

    let payload = json!({"ref": "refs/heads/main"});
    push::handle_push_event(&state, &payload).await.unwrap();
    state.scheduler.wait_until_idle("main").await;

    assert_eq!(gateway.labels(1), vec![NEEDS_REBASE_LABEL]);
}

#[tokio::test]
async fn push_to_tag_is_ignored() {
    let gateway = Arc::new(InMemoryGateway::new());
    let state = app_state(RULES, Arc::clone(&gateway));
    gateway.add_pull_request(snapshot(2, "anything"));

    let payload = json!({"ref": "refs/tags/v1.0"});
    push::handle_push_event(&state, &payload).await.unwrap();

    assert_eq!(gateway.call_count("open_pull_requests"), 0);
}

#[tokio::test]
async fn changes_requested_review_adds_fix_me() {
    let gateway = Arc::new(InMemoryGateway::new());
    let state = app_state(RULES, Arc::clone(&gateway));
    gateway.add_pull_request(snapshot(3, "anything"));

    let payload = json!({
        "action": "submitted",
        "review": {"state": "changes_requested"},
        "pull_request": {"number": 3, "labels": []},
    });
    review::handle_review_event(&state, &payload).await.unwrap();

    assert_eq!(gateway.labels(3), vec![FIX_ME_LABEL]);
    assert_eq!(gateway.call_count("create_label_if_missing"), 1);
}

#[tokio::test]
async fn approving_review_touches_nothing() {
    let gateway = Arc::new(InMemoryGateway::new());
    let state = app_state(RULES, Arc::clone(&gateway));
    gateway.add_pull_request(snapshot(4, "anything"));

    let payload = json!({
        "action": "submitted",
        "review": {"state": "approved"},
        "pull_request": {"number": 4, "labels": [{"name": FIX_ME_LABEL}]},
    });
    review::handle_review_event(&state, &payload).await.unwrap();

    assert_eq!(gateway.mutation_count(), 0);
    assert_eq!(gateway.labels(4), vec![] as Vec<String>);
}

#[tokio::test]
async fn repeated_changes_requested_does_not_duplicate_fix_me() {
    let gateway = Arc::new(InMemoryGateway::new());
    let state = app_state(RULES, Arc::clone(&gateway));
    gateway.add_pull_request(snapshot(5, "anything"));

    let payload = json!({
        "action": "submitted",
        "review": {"state": "changes_requested"},
        "pull_request": {"number": 5, "labels": [{"name": FIX_ME_LABEL}]},
    });
    review::handle_review_event(&state, &payload).await.unwrap();

    // Label already present in the payload, so no mutation at all.
    assert_eq!(gateway.call_count("add_labels"), 0);
}

#[tokio::test]
async fn opened_payload_is_parsed_and_processed() {
    let gateway = Arc::new(InMemoryGateway::new());
    let state = Arc::new(app_state(RULES, Arc::clone(&gateway)));
    gateway.add_pull_request(snapshot(6, "Title of the PR"));

    let mut headers = HeaderMap::new();
    headers.insert("X-GitHub-Event", HeaderValue::from_static("pull_request"));
    let payload = json!({
        "action": "opened",
        "pull_request": {
            "id": 600,
            "number": 6,
            "title": "Title of the PR",
            "body": null,
            "head": {"sha": "abc123"},
            "base": {"ref": "main"},
            "user": {"login": "author"},
            "draft": false,
            "labels": [],
            "requested_reviewers": [],
            "mergeable": null,
        },
    });

    let (status, _) =
        github::handle_webhook(State(Arc::clone(&state)), headers, Json(payload)).await;

    assert_eq!(status, StatusCode::OK);
    let comments = gateway.comments(6);
    assert_eq!(comments.len(), 1);
    assert!(comments[0].body.contains("/cc @userA [Title]"));
}

#[tokio::test]
async fn unhandled_event_returns_ok_without_processing() {
    let gateway = Arc::new(InMemoryGateway::new());
    let state = Arc::new(app_state(RULES, Arc::clone(&gateway)));

    let mut headers = HeaderMap::new();
    headers.insert("X-GitHub-Event", HeaderValue::from_static("issues"));
    let payload = json!({"action": "opened"});

    let (status, body) =
        github::handle_webhook(State(Arc::clone(&state)), headers, Json(payload)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.0["status"], "ignored");
    assert!(gateway.calls().is_empty());
}

#[tokio::test]
async fn malformed_pull_request_payload_returns_server_error() {
    let gateway = Arc::new(InMemoryGateway::new());
    let state = Arc::new(app_state(RULES, Arc::clone(&gateway)));

    let mut headers = HeaderMap::new();
    headers.insert("X-GitHub-Event", HeaderValue::from_static("pull_request"));
    let payload = json!({"action": "opened"});

    let (status, _) =
        github::handle_webhook(State(Arc::clone(&state)), headers, Json(payload)).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn ignored_pull_request_action_makes_no_calls() {
    let gateway = Arc::new(InMemoryGateway::new());
    let state = Arc::new(app_state(RULES, Arc::clone(&gateway)));

    let mut headers = HeaderMap::new();
    headers.insert("X-GitHub-Event", HeaderValue::from_static("pull_request"));
    let payload = json!({
        "action": "closed",
        "pull_request": {"number": 7},
    });

    let (status, _) =
        github::handle_webhook(State(Arc::clone(&state)), headers, Json(payload)).await;

    assert_eq!(status, StatusCode::OK);
    assert!(gateway.calls().is_empty());
}
