//! Reconciles the single bot-authored "cc" comment on a pull request.
//!
//! The comment body is the only durable record of who was already notified,
//! so rendering and parsing must round-trip exactly. A hidden delimiter marks
//! the comment as bot-owned; structure is never re-derived from prose.

use regex::Regex;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::github::gateway::RepositoryGateway;
use crate::github::types::{PullRequestAction, PullRequestSnapshot};
use crate::rules::aggregator::NotificationAggregate;

/// Stable serialization marker. Changing it orphans every existing comment.
pub const BOT_MESSAGE_DELIMITER: &str = "<!-- rules-bot: cc -->";

/// Render an aggregate into the comment body.
///
/// `/cc @alice [rule-a], @bob [rule-a, rule-b]`
pub fn render_comment(aggregate: &NotificationAggregate) -> String {
    let mentions: Vec<String> = aggregate
        .iter()
        .map(|(identity, rule_ids)| format!("@{} [{}]", identity, rule_ids.join(", ")))
        .collect();

    format!("{}\n/cc {}", BOT_MESSAGE_DELIMITER, mentions.join(", "))
}

/// Inverse of [`render_comment`]. Returns `None` when the body is not a
/// bot-owned notification comment.
pub fn parse_comment(body: &str) -> Option<NotificationAggregate> {
    if !body.contains(BOT_MESSAGE_DELIMITER) {
        return None;
    }

    let cc_line = body.lines().find(|line| line.starts_with("/cc "))?;

    // Identities cannot contain whitespace or brackets; rule ids are
    // comma-separated inside the brackets.
    let mention = Regex::new(r"@([^\s\[\],]+) \[([^\]]*)\]").expect("static pattern");

    let mut aggregate = NotificationAggregate::new();
    for capture in mention.captures_iter(cc_line) {
        let identity = &capture[1];
        for rule_id in capture[2].split(", ").filter(|s| !s.is_empty()) {
            aggregate.push(identity, rule_id);
        }
    }

    Some(aggregate)
}

/// Merge the previously rendered aggregate with the new match result.
/// Identities keep their existing order; rule lists always reflect the new
/// result; identities that no longer match drop out; new identities append.
fn merge(previous: &NotificationAggregate, current: &NotificationAggregate) -> NotificationAggregate {
    let mut merged = NotificationAggregate::new();

    for identity in previous.identities() {
        if let Some(rule_ids) = current.rule_ids(identity) {
            merged.push_all(identity, rule_ids);
        }
    }
    for (identity, rule_ids) in current.iter() {
        if merged.rule_ids(identity).is_none() {
            merged.push_all(identity, rule_ids);
        }
    }

    merged
}

pub struct CommentReconciler;

impl CommentReconciler {
    /// Bring the bot comment in line with `mentions`. Idempotent: when
    /// nothing changed, no API mutation is issued.
    pub async fn reconcile(
        gateway: &dyn RepositoryGateway,
        snapshot: &PullRequestSnapshot,
        mentions: &NotificationAggregate,
        action: PullRequestAction,
    ) -> Result<()> {
        if action == PullRequestAction::Opened {
            if !mentions.is_empty() {
                let body = render_comment(mentions);
                gateway.create_comment(snapshot.number, &body).await?;
                info!("Created cc comment on PR #{}", snapshot.number);
            }
            return Ok(());
        }

        let existing = gateway
            .find_bot_comment(snapshot.number, BOT_MESSAGE_DELIMITER)
            .await?;

        match existing {
            None => {
                if !mentions.is_empty() {
                    let body = render_comment(mentions);
                    gateway.create_comment(snapshot.number, &body).await?;
                    info!("Created cc comment on PR #{}", snapshot.number);
                }
            }
            Some(comment) => {
                let previous = match parse_comment(&comment.body) {
                    Some(aggregate) => aggregate,
                    None => {
                        warn!(
                            "Bot comment {} on PR #{} did not parse; rebuilding",
                            comment.id, snapshot.number
                        );
                        NotificationAggregate::new()
                    }
                };

                let merged = merge(&previous, mentions);

                if merged.is_empty() {
                    gateway.delete_comment(comment.id).await?;
                    info!("Deleted cc comment on PR #{}", snapshot.number);
                } else if merged == previous {
                    debug!("cc comment on PR #{} unchanged", snapshot.number);
                } else {
                    gateway
                        .update_comment(comment.id, &render_comment(&merged))
                        .await?;
                    info!("Updated cc comment on PR #{}", snapshot.number);
                }
            }
        }

        Ok(())
    }

    /// Request formal review from newly notified collaborators. Draft PRs
    /// defer the request until the PR leaves draft.
    pub async fn request_new_reviewers(
        gateway: &dyn RepositoryGateway,
        snapshot: &PullRequestSnapshot,
        reviewers: &[String],
    ) -> Result<()> {
        if reviewers.is_empty() {
            return Ok(());
        }
        if snapshot.draft {
            debug!(
                "PR #{} is a draft; deferring review requests for {:?}",
                snapshot.number, reviewers
            );
            return Ok(());
        }

        gateway
            .request_reviewers(snapshot.number, reviewers)
            .await?;
        info!(
            "Requested review from {:?} on PR #{}",
            reviewers, snapshot.number
        );
        Ok(())
    }
}
