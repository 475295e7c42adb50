//! Plans and applies mutations for the two bot-managed labels. All other
//! labels on a PR are read-only to the bot.

use std::collections::HashSet;

use rand::Rng;
use tracing::info;

use crate::error::Result;
use crate::github::gateway::RepositoryGateway;
use crate::github::types::Mergeable;

pub const NEEDS_REBASE_LABEL: &str = "needs-rebase";
pub const FIX_ME_LABEL: &str = "fix-me";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelPlan {
    pub to_add: Vec<String>,
    pub to_remove: Vec<String>,
}

impl LabelPlan {
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }

    pub fn merge(mut self, other: LabelPlan) -> LabelPlan {
        self.to_add.extend(other.to_add);
        self.to_remove.extend(other.to_remove);
        self
    }
}

/// What happened to the PR, as far as the fix-me label cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixMeTrigger {
    ChangesRequested,
    NewCommits,
    None,
}

pub struct LabelReconciler;

impl LabelReconciler {
    /// needs-rebase follows the mergeable tri-state. Unknown is a strict
    /// no-op: the caller re-polls instead of guessing.
    pub fn plan_rebase(mergeable: Mergeable, current_labels: &[String]) -> LabelPlan {
        let present = current_labels.iter().any(|l| l == NEEDS_REBASE_LABEL);
        let mut plan = LabelPlan::default();

        match mergeable {
            Mergeable::Conflicted if !present => {
                plan.to_add.push(NEEDS_REBASE_LABEL.to_string());
            }
            Mergeable::Mergeable if present => {
                plan.to_remove.push(NEEDS_REBASE_LABEL.to_string());
            }
            _ => {}
        }

        plan
    }

    /// fix-me is added when a review requests changes and removed when new
    /// commits arrive while it is present.
    pub fn plan_fix_me(trigger: FixMeTrigger, current_labels: &[String]) -> LabelPlan {
        let present = current_labels.iter().any(|l| l == FIX_ME_LABEL);
        let mut plan = LabelPlan::default();

        match trigger {
            FixMeTrigger::ChangesRequested if !present => {
                plan.to_add.push(FIX_ME_LABEL.to_string());
            }
            FixMeTrigger::NewCommits if present => {
                plan.to_remove.push(FIX_ME_LABEL.to_string());
            }
            _ => {}
        }

        plan
    }

    /// Labels a matched rule wants on the PR; only missing ones are added.
    pub fn plan_rule_labels(wanted: &[String], current_labels: &[String]) -> LabelPlan {
        let mut plan = LabelPlan::default();
        for label in wanted {
            if !current_labels.contains(label) && !plan.to_add.contains(label) {
                plan.to_add.push(label.clone());
            }
        }
        plan
    }

    /// Apply a plan. `ensured` caches label existence across one
    /// reconciliation pass so repeated passes over a batch of PRs do not
    /// re-check the same label.
    pub async fn apply(
        gateway: &dyn RepositoryGateway,
        pr_number: u64,
        plan: &LabelPlan,
        ensured: &mut HashSet<String>,
    ) -> Result<()> {
        if plan.is_empty() {
            return Ok(());
        }

        for label in &plan.to_add {
            if ensured.insert(label.clone()) {
                gateway
                    .create_label_if_missing(label, &generated_color(label))
                    .await?;
            }
        }

        if !plan.to_add.is_empty() {
            gateway.add_labels(pr_number, &plan.to_add).await?;
            info!("Added labels {:?} to PR #{}", plan.to_add, pr_number);
        }

        for label in &plan.to_remove {
            gateway.remove_label(pr_number, label).await?;
            info!("Removed label '{}' from PR #{}", label, pr_number);
        }

        Ok(())
    }
}

fn generated_color(_name: &str) -> String {
    format!("{:06x}", rand::thread_rng().gen_range(0..0x1000000))
}
