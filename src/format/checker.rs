//! Validates PR title, commit messages, and description against configured
//! patterns, defaulting to the repository's project key. Publishes one
//! "Format" commit status per run and maintains a single failure comment.

use regex::Regex;
use tracing::{debug, info};

use crate::config::loader::{CheckConfig, FormatConfig};
use crate::error::{BotError, Result};
use crate::github::gateway::RepositoryGateway;
use crate::github::types::{PullRequestSnapshot, StatusState};

pub const FORMAT_CONTEXT: &str = "Format";
pub const FORMAT_COMMENT_DELIMITER: &str = "<!-- rules-bot: format -->";

const SKIP_FORMAT_DIRECTIVE: &str = "skip format";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatOutcome {
    Disabled,
    Success,
    Failure(Vec<String>),
}

struct ResolvedCheck {
    name: &'static str,
    pattern: Regex,
    message: String,
}

fn resolve_check(
    config: &CheckConfig,
    name: &'static str,
    default_pattern: String,
    default_message: String,
) -> Result<Option<ResolvedCheck>> {
    if !config.enabled {
        return Ok(None);
    }

    let pattern = config.pattern.clone().unwrap_or(default_pattern);
    let pattern = Regex::new(&pattern)
        .map_err(|e| BotError::ConfigError(format!("Invalid {} format pattern: {}", name, e)))?;

    Ok(Some(ResolvedCheck {
        name,
        pattern,
        message: config.message.clone().unwrap_or(default_message),
    }))
}

pub struct FormatChecker;

impl FormatChecker {
    /// Run all enabled checks and reconcile the commit status plus the
    /// failure comment. `bot_logins` are the identities whose "skip format"
    /// directive disables the description check.
    pub async fn run(
        gateway: &dyn RepositoryGateway,
        snapshot: &PullRequestSnapshot,
        config: &FormatConfig,
        project_key: &str,
        bot_logins: &[String],
    ) -> Result<FormatOutcome> {
        if !config.enabled {
            debug!("Format checking disabled for PR #{}", snapshot.number);
            return Ok(FormatOutcome::Disabled);
        }

        let issue_pattern = format!(r"^\[?{}-\d+[\]:]?\s+\S", project_key);

        let title_check = resolve_check(
            &config.title,
            "title",
            issue_pattern.clone(),
            format!(
                "Wrong content of the title. The title has to begin with the {} issue key.",
                project_key
            ),
        )?;
        let commit_check = resolve_check(
            &config.commit,
            "commit",
            issue_pattern,
            format!(
                "Wrong content of a commit message. Every commit has to begin with the {} issue key.",
                project_key
            ),
        )?;
        let description_check = resolve_check(
            &config.description,
            "description",
            format!(r"{}-\d+", project_key),
            format!("The description has to reference a {} issue.", project_key),
        )?;

        let mut failed: Vec<&ResolvedCheck> = Vec::new();

        if let Some(check) = &title_check {
            if !check.pattern.is_match(&snapshot.title) {
                failed.push(check);
            }
        }

        if let Some(check) = &commit_check {
            // One bad commit fails the whole check.
            let bad_commit = snapshot
                .commit_messages
                .iter()
                .any(|message| !check.pattern.is_match(first_line(message)));
            if bad_commit {
                failed.push(check);
            }
        }

        if let Some(check) = &description_check {
            if skip_directive_present(snapshot.body.as_deref(), bot_logins) {
                debug!(
                    "Skip-format directive found on PR #{}; description check skipped",
                    snapshot.number
                );
            } else {
                let body_ok = snapshot
                    .body
                    .as_deref()
                    .map(|b| check.pattern.is_match(b))
                    .unwrap_or(false);
                if !body_ok {
                    failed.push(check);
                }
            }
        }

        let outcome = if failed.is_empty() {
            FormatOutcome::Success
        } else {
            FormatOutcome::Failure(failed.iter().map(|c| c.name.to_string()).collect())
        };

        Self::publish_status(gateway, snapshot, &outcome).await?;
        Self::reconcile_comment(gateway, snapshot, &failed).await?;

        Ok(outcome)
    }

    async fn publish_status(
        gateway: &dyn RepositoryGateway,
        snapshot: &PullRequestSnapshot,
        outcome: &FormatOutcome,
    ) -> Result<()> {
        let (state, description) = match outcome {
            FormatOutcome::Success | FormatOutcome::Disabled => {
                (StatusState::Success, "Valid format".to_string())
            }
            FormatOutcome::Failure(names) => (
                StatusState::Failure,
                format!("Failed checks: {}", names.join(", ")),
            ),
        };

        gateway
            .create_commit_status(&snapshot.head_sha, state, &description, FORMAT_CONTEXT)
            .await
    }

    async fn reconcile_comment(
        gateway: &dyn RepositoryGateway,
        snapshot: &PullRequestSnapshot,
        failed: &[&ResolvedCheck],
    ) -> Result<()> {
        let existing = gateway
            .find_bot_comment(snapshot.number, FORMAT_COMMENT_DELIMITER)
            .await?;

        if failed.is_empty() {
            if let Some(comment) = existing {
                gateway.delete_comment(comment.id).await?;
                info!("Format comment deleted on PR #{}", snapshot.number);
            }
            return Ok(());
        }

        let bullets: Vec<String> = failed.iter().map(|c| format!("- {}", c.message)).collect();
        let body = format!("{}\n{}", FORMAT_COMMENT_DELIMITER, bullets.join("\n\n"));

        match existing {
            Some(comment) if comment.body == body => {
                debug!("Format comment on PR #{} unchanged", snapshot.number);
            }
            Some(comment) => {
                gateway.update_comment(comment.id, &body).await?;
                info!("Format comment updated on PR #{}", snapshot.number);
            }
            None => {
                gateway.create_comment(snapshot.number, &body).await?;
                info!("Format comment created on PR #{}", snapshot.number);
            }
        }

        Ok(())
    }
}

fn first_line(message: &str) -> &str {
    message.lines().next().unwrap_or("")
}

/// The directive must mention the bot account verbatim; the actor mention is
/// case-sensitive.
fn skip_directive_present(body: Option<&str>, bot_logins: &[String]) -> bool {
    let Some(body) = body else {
        return false;
    };
    bot_logins.iter().any(|login| {
        body.contains(&format!("@{} {}", login, SKIP_FORMAT_DIRECTIVE))
    })
}
