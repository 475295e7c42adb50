//! Folds rule matches into a per-identity notification aggregate and splits
//! it into mention targets and formal review targets.

use std::collections::HashMap;

use tracing::warn;

use crate::github::types::PullRequestSnapshot;
use crate::rules::matcher::{self, CompiledRule};

/// Insertion-ordered mapping identity -> matched rule ids. An identity
/// appears once; rule ids are de-duplicated and keep rule declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotificationAggregate {
    entries: Vec<(String, Vec<String>)>,
}

impl NotificationAggregate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, identity: &str, rule_id: &str) {
        match self.entries.iter_mut().find(|(i, _)| i == identity) {
            Some((_, rule_ids)) => {
                if !rule_ids.iter().any(|r| r == rule_id) {
                    rule_ids.push(rule_id.to_string());
                }
            }
            None => {
                self.entries
                    .push((identity.to_string(), vec![rule_id.to_string()]));
            }
        }
    }

    pub fn push_all(&mut self, identity: &str, rule_ids: &[String]) {
        for rule_id in rule_ids {
            self.push(identity, rule_id);
        }
    }

    pub fn rule_ids(&self, identity: &str) -> Option<&[String]> {
        self.entries
            .iter()
            .find(|(i, _)| i == identity)
            .map(|(_, ids)| ids.as_slice())
    }

    pub fn identities(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(i, _)| i.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(i, ids)| (i.as_str(), ids.as_slice()))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Run every rule against the snapshot in declared order and collect who
/// gets notified for which rules.
pub fn aggregate(rules: &[CompiledRule], snapshot: &PullRequestSnapshot) -> NotificationAggregate {
    let mut aggregate = NotificationAggregate::new();

    for rule in rules {
        if !matcher::matches(rule, snapshot).hit {
            continue;
        }
        for identity in &rule.notify {
            aggregate.push(identity, &rule.id);
        }
    }

    aggregate
}

/// The two notification channels plus diagnostics for identities whose
/// collaborator status could not be determined.
#[derive(Debug, Clone, Default)]
pub struct NotificationTargets {
    /// Non-collaborators, reachable only through the @mention comment.
    pub mentions: NotificationAggregate,
    /// Collaborators to request formal review from, excluding anyone
    /// already requested on the PR.
    pub reviewers: Vec<String>,
    pub diagnostics: Vec<String>,
}

/// Partition an aggregate by collaborator status. `None` means the lookup
/// failed; such identities fall back to the mention channel.
pub fn partition(
    aggregate: &NotificationAggregate,
    snapshot: &PullRequestSnapshot,
    collaborator_status: &HashMap<String, Option<bool>>,
) -> NotificationTargets {
    let mut targets = NotificationTargets::default();

    for (identity, rule_ids) in aggregate.iter() {
        match collaborator_status.get(identity).copied().flatten() {
            Some(true) => {
                if snapshot
                    .requested_reviewers
                    .iter()
                    .any(|r| r == identity)
                {
                    continue;
                }
                targets.reviewers.push(identity.to_string());
            }
            Some(false) => {
                targets.mentions.push_all(identity, rule_ids);
            }
            None => {
                let diagnostic = format!(
                    "Could not determine collaborator status for '{}'; review cannot be requested",
                    identity
                );
                warn!("{}", diagnostic);
                targets.diagnostics.push(diagnostic);
                targets.mentions.push_all(identity, rule_ids);
            }
        }
    }

    targets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::types::Mergeable;
    use crate::rules::matcher::Pattern;

    fn snapshot(title: &str) -> PullRequestSnapshot {
        PullRequestSnapshot {
            id: 1,
            number: 1,
            title: title.to_string(),
            body: None,
            head_sha: "abc".to_string(),
            base_ref: "main".to_string(),
            changed_files: vec![],
            commit_messages: vec![],
            author: "author".to_string(),
            draft: false,
            labels: vec![],
            requested_reviewers: vec![],
            mergeable: Mergeable::Unknown,
        }
    }

    fn rule(id: &str, title: &str, notify: &[&str]) -> CompiledRule {
        CompiledRule {
            id: id.to_string(),
            title: Some(Pattern::compile(title).unwrap()),
            body: None,
            title_body: None,
            directories: vec![],
            notify: notify.iter().map(|n| n.to_string()).collect(),
            labels: vec![],
        }
    }

    #[test]
    fn identity_notified_by_two_rules_appears_once() {
        let rules = vec![
            rule("one", "fix", &["alice"]),
            rule("two", "bug", &["alice", "bob"]),
        ];
        let agg = aggregate(&rules, &snapshot("fix a bug"));

        assert_eq!(agg.len(), 2);
        assert_eq!(agg.rule_ids("alice").unwrap(), ["one", "two"]);
        assert_eq!(agg.rule_ids("bob").unwrap(), ["two"]);
    }

    #[test]
    fn duplicate_rule_id_for_same_identity_is_skipped() {
        let mut agg = NotificationAggregate::new();
        agg.push("alice", "one");
        agg.push("alice", "one");
        assert_eq!(agg.rule_ids("alice").unwrap(), ["one"]);
    }

    #[test]
    fn identity_order_is_first_appearance() {
        let rules = vec![
            rule("one", "fix", &["bob", "alice"]),
            rule("two", "fix", &["carol"]),
        ];
        let agg = aggregate(&rules, &snapshot("fix"));
        let identities: Vec<&str> = agg.identities().collect();
        assert_eq!(identities, vec!["bob", "alice", "carol"]);
    }

    #[test]
    fn non_matching_rules_contribute_nothing() {
        let rules = vec![rule("one", "absent", &["alice"])];
        assert!(aggregate(&rules, &snapshot("other")).is_empty());
    }

    #[test]
    fn partition_splits_collaborators_from_mentions() {
        let mut agg = NotificationAggregate::new();
        agg.push("alice", "one");
        agg.push("bob", "one");

        let mut status = HashMap::new();
        status.insert("alice".to_string(), Some(true));
        status.insert("bob".to_string(), Some(false));

        let targets = partition(&agg, &snapshot("x"), &status);
        assert_eq!(targets.reviewers, vec!["alice"]);
        assert_eq!(
            targets.mentions.identities().collect::<Vec<_>>(),
            vec!["bob"]
        );
        assert!(targets.diagnostics.is_empty());
    }

    #[test]
    fn already_requested_reviewer_is_not_re_requested() {
        let mut agg = NotificationAggregate::new();
        agg.push("alice", "one");

        let mut status = HashMap::new();
        status.insert("alice".to_string(), Some(true));

        let mut snap = snapshot("x");
        snap.requested_reviewers = vec!["alice".to_string()];

        let targets = partition(&agg, &snap, &status);
        assert!(targets.reviewers.is_empty());
        assert!(targets.mentions.is_empty());
    }

    #[test]
    fn unknown_status_falls_back_to_mention_with_diagnostic() {
        let mut agg = NotificationAggregate::new();
        agg.push("ghost", "one");

        let mut status = HashMap::new();
        status.insert("ghost".to_string(), None);

        let targets = partition(&agg, &snapshot("x"), &status);
        assert!(targets.reviewers.is_empty());
        assert_eq!(
            targets.mentions.identities().collect::<Vec<_>>(),
            vec!["ghost"]
        );
        assert_eq!(targets.diagnostics.len(), 1);
        assert!(targets.diagnostics[0].contains("ghost"));
    }
}
