//! The platform seam. Core logic only ever talks to [`RepositoryGateway`];
//! production uses the octocrab adapter, tests use [`InMemoryGateway`].

use async_trait::async_trait;

use crate::error::Result;
use crate::github::types::{IssueComment, Mergeable, PullRequestSnapshot, StatusState};

#[async_trait]
pub trait RepositoryGateway: Send + Sync {
    /// Every file path in the repository tree. Used to check that configured
    /// rule directories actually exist.
    async fn repository_paths(&self) -> Result<Vec<String>>;

    async fn open_pull_requests(&self, base_branch: &str) -> Result<Vec<PullRequestSnapshot>>;

    async fn mergeable_state(&self, pr_number: u64) -> Result<Mergeable>;

    async fn changed_files(&self, pr_number: u64) -> Result<Vec<String>>;

    async fn commit_messages(&self, pr_number: u64) -> Result<Vec<String>>;

    async fn add_labels(&self, pr_number: u64, names: &[String]) -> Result<()>;

    async fn remove_label(&self, pr_number: u64, name: &str) -> Result<()>;

    /// Creating an existing label is a no-op.
    async fn create_label_if_missing(&self, name: &str, color: &str) -> Result<()>;

    /// The single comment owned by the bot on this PR, if any.
    async fn find_bot_comment(&self, pr_number: u64, marker: &str) -> Result<Option<IssueComment>>;

    async fn create_comment(&self, pr_number: u64, body: &str) -> Result<u64>;

    async fn update_comment(&self, comment_id: u64, body: &str) -> Result<()>;

    async fn delete_comment(&self, comment_id: u64) -> Result<()>;

    async fn request_reviewers(&self, pr_number: u64, logins: &[String]) -> Result<()>;

    async fn create_commit_status(
        &self,
        sha: &str,
        state: StatusState,
        description: &str,
        context: &str,
    ) -> Result<()>;

    async fn is_collaborator(&self, login: &str) -> Result<bool>;
}

pub use fake::InMemoryGateway;

mod fake {
    use std::collections::{HashMap, HashSet, VecDeque};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::error::{BotError, Result};
    use crate::github::types::{IssueComment, Mergeable, PullRequestSnapshot, StatusState};

    use super::RepositoryGateway;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct RecordedStatus {
        pub sha: String,
        pub state: String,
        pub description: String,
        pub context: String,
    }

    /// In-memory stand-in for the platform. Every mutating and reading call
    /// is appended to `calls` so tests can assert exact call counts.
    #[derive(Default)]
    pub struct InMemoryGateway {
        inner: Mutex<State>,
    }

    #[derive(Default)]
    struct State {
        repository_paths: Vec<String>,
        pull_requests: Vec<PullRequestSnapshot>,
        // Pending mergeable answers per PR; the last entry repeats forever.
        mergeable_sequences: HashMap<u64, VecDeque<Mergeable>>,
        comments: HashMap<u64, Vec<IssueComment>>,
        next_comment_id: u64,
        labels: HashMap<u64, Vec<String>>,
        repo_labels: HashSet<String>,
        collaborators: HashSet<String>,
        collaborator_lookup_fails: bool,
        requested_reviewers: HashMap<u64, Vec<String>>,
        statuses: Vec<RecordedStatus>,
        calls: Vec<String>,
    }

    impl InMemoryGateway {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set_repository_paths(&self, paths: &[&str]) {
            self.inner.lock().unwrap().repository_paths =
                paths.iter().map(|p| p.to_string()).collect();
        }

        pub fn add_pull_request(&self, snapshot: PullRequestSnapshot) {
            let mut inner = self.inner.lock().unwrap();
            inner
                .labels
                .insert(snapshot.number, snapshot.labels.clone());
            inner
                .requested_reviewers
                .insert(snapshot.number, snapshot.requested_reviewers.clone());
            inner.pull_requests.push(snapshot);
        }

        /// Queue the answers `mergeable_state` will return for a PR, in
        /// order. The final answer repeats once the queue drains.
        pub fn set_mergeable_sequence(&self, pr_number: u64, sequence: Vec<Mergeable>) {
            self.inner
                .lock()
                .unwrap()
                .mergeable_sequences
                .insert(pr_number, sequence.into());
        }

        pub fn add_collaborator(&self, login: &str) {
            self.inner
                .lock()
                .unwrap()
                .collaborators
                .insert(login.to_string());
        }

        pub fn fail_collaborator_lookups(&self) {
            self.inner.lock().unwrap().collaborator_lookup_fails = true;
        }

        pub fn seed_comment(&self, pr_number: u64, author: &str, body: &str) -> u64 {
            let mut inner = self.inner.lock().unwrap();
            inner.next_comment_id += 1;
            let id = inner.next_comment_id;
            inner.comments.entry(pr_number).or_default().push(IssueComment {
                id,
                author: author.to_string(),
                body: body.to_string(),
            });
            id
        }

        pub fn comments(&self, pr_number: u64) -> Vec<IssueComment> {
            self.inner
                .lock()
                .unwrap()
                .comments
                .get(&pr_number)
                .cloned()
                .unwrap_or_default()
        }

        /// Labels created at the repository level via `create_label_if_missing`.
        pub fn created_labels(&self) -> Vec<String> {
            let inner = self.inner.lock().unwrap();
            let mut names: Vec<String> = inner.repo_labels.iter().cloned().collect();
            names.sort();
            names
        }

        pub fn labels(&self, pr_number: u64) -> Vec<String> {
            self.inner
                .lock()
                .unwrap()
                .labels
                .get(&pr_number)
                .cloned()
                .unwrap_or_default()
        }

        pub fn requested_reviewers(&self, pr_number: u64) -> Vec<String> {
            self.inner
                .lock()
                .unwrap()
                .requested_reviewers
                .get(&pr_number)
                .cloned()
                .unwrap_or_default()
        }

        pub fn statuses(&self) -> Vec<RecordedStatus> {
            self.inner.lock().unwrap().statuses.clone()
        }

        pub fn calls(&self) -> Vec<String> {
            self.inner.lock().unwrap().calls.clone()
        }

        pub fn call_count(&self, name: &str) -> usize {
            self.inner
                .lock()
                .unwrap()
                .calls
                .iter()
                .filter(|c| c.starts_with(name))
                .count()
        }

        /// Calls that write through to the platform.
        pub fn mutation_count(&self) -> usize {
            const MUTATIONS: &[&str] = &[
                "add_labels",
                "remove_label",
                "create_label_if_missing",
                "create_comment",
                "update_comment",
                "delete_comment",
                "request_reviewers",
                "create_commit_status",
            ];
            self.inner
                .lock()
                .unwrap()
                .calls
                .iter()
                .filter(|c| MUTATIONS.iter().any(|m| c.starts_with(m)))
                .count()
        }

        fn record(&self, call: String) {
            self.inner.lock().unwrap().calls.push(call);
        }
    }

    #[async_trait]
    impl RepositoryGateway for InMemoryGateway {
        async fn repository_paths(&self) -> Result<Vec<String>> {
            self.record("repository_paths()".to_string());
            Ok(self.inner.lock().unwrap().repository_paths.clone())
        }

        async fn open_pull_requests(&self, base_branch: &str) -> Result<Vec<PullRequestSnapshot>> {
            self.record(format!("open_pull_requests({})", base_branch));
            let inner = self.inner.lock().unwrap();
            Ok(inner
                .pull_requests
                .iter()
                .filter(|pr| pr.base_ref == base_branch)
                .cloned()
                .collect())
        }

        async fn mergeable_state(&self, pr_number: u64) -> Result<Mergeable> {
            self.record(format!("mergeable_state({})", pr_number));
            let mut inner = self.inner.lock().unwrap();
            let sequence = inner.mergeable_sequences.entry(pr_number).or_default();
            let state = if sequence.len() > 1 {
                sequence.pop_front().unwrap()
            } else {
                sequence.front().copied().unwrap_or(Mergeable::Unknown)
            };
            Ok(state)
        }

        async fn changed_files(&self, pr_number: u64) -> Result<Vec<String>> {
            self.record(format!("changed_files({})", pr_number));
            let inner = self.inner.lock().unwrap();
            Ok(inner
                .pull_requests
                .iter()
                .find(|pr| pr.number == pr_number)
                .map(|pr| pr.changed_files.clone())
                .unwrap_or_default())
        }

        async fn commit_messages(&self, pr_number: u64) -> Result<Vec<String>> {
            self.record(format!("commit_messages({})", pr_number));
            let inner = self.inner.lock().unwrap();
            Ok(inner
                .pull_requests
                .iter()
                .find(|pr| pr.number == pr_number)
                .map(|pr| pr.commit_messages.clone())
                .unwrap_or_default())
        }

        async fn add_labels(&self, pr_number: u64, names: &[String]) -> Result<()> {
            self.record(format!("add_labels({}, {:?})", pr_number, names));
            let mut inner = self.inner.lock().unwrap();
            let labels = inner.labels.entry(pr_number).or_default();
            for name in names {
                if !labels.contains(name) {
                    labels.push(name.clone());
                }
            }
            Ok(())
        }

        async fn remove_label(&self, pr_number: u64, name: &str) -> Result<()> {
            self.record(format!("remove_label({}, {})", pr_number, name));
            let mut inner = self.inner.lock().unwrap();
            if let Some(labels) = inner.labels.get_mut(&pr_number) {
                labels.retain(|l| l != name);
            }
            Ok(())
        }

        async fn create_label_if_missing(&self, name: &str, color: &str) -> Result<()> {
            self.record(format!("create_label_if_missing({}, {})", name, color));
            self.inner
                .lock()
                .unwrap()
                .repo_labels
                .insert(name.to_string());
            Ok(())
        }

        async fn find_bot_comment(
            &self,
            pr_number: u64,
            marker: &str,
        ) -> Result<Option<IssueComment>> {
            self.record(format!("find_bot_comment({})", pr_number));
            let inner = self.inner.lock().unwrap();
            Ok(inner
                .comments
                .get(&pr_number)
                .and_then(|comments| comments.iter().find(|c| c.body.contains(marker)))
                .cloned())
        }

        async fn create_comment(&self, pr_number: u64, body: &str) -> Result<u64> {
            self.record(format!("create_comment({})", pr_number));
            let mut inner = self.inner.lock().unwrap();
            inner.next_comment_id += 1;
            let id = inner.next_comment_id;
            inner.comments.entry(pr_number).or_default().push(IssueComment {
                id,
                author: "rules-bot".to_string(),
                body: body.to_string(),
            });
            Ok(id)
        }

        async fn update_comment(&self, comment_id: u64, body: &str) -> Result<()> {
            self.record(format!("update_comment({})", comment_id));
            let mut inner = self.inner.lock().unwrap();
            for comments in inner.comments.values_mut() {
                if let Some(comment) = comments.iter_mut().find(|c| c.id == comment_id) {
                    comment.body = body.to_string();
                    return Ok(());
                }
            }
            Err(BotError::GitHubError(format!(
                "No such comment: {}",
                comment_id
            )))
        }

        async fn delete_comment(&self, comment_id: u64) -> Result<()> {
            self.record(format!("delete_comment({})", comment_id));
            let mut inner = self.inner.lock().unwrap();
            for comments in inner.comments.values_mut() {
                comments.retain(|c| c.id != comment_id);
            }
            Ok(())
        }

        async fn request_reviewers(&self, pr_number: u64, logins: &[String]) -> Result<()> {
            self.record(format!("request_reviewers({}, {:?})", pr_number, logins));
            let mut inner = self.inner.lock().unwrap();
            let requested = inner.requested_reviewers.entry(pr_number).or_default();
            for login in logins {
                if !requested.contains(login) {
                    requested.push(login.clone());
                }
            }
            Ok(())
        }

        async fn create_commit_status(
            &self,
            sha: &str,
            state: StatusState,
            description: &str,
            context: &str,
        ) -> Result<()> {
            self.record(format!("create_commit_status({}, {})", context, state.as_str()));
            self.inner.lock().unwrap().statuses.push(RecordedStatus {
                sha: sha.to_string(),
                state: state.as_str().to_string(),
                description: description.to_string(),
                context: context.to_string(),
            });
            Ok(())
        }

        async fn is_collaborator(&self, login: &str) -> Result<bool> {
            self.record(format!("is_collaborator({})", login));
            let inner = self.inner.lock().unwrap();
            if inner.collaborator_lookup_fails {
                return Err(BotError::GitHubError(
                    "collaborator lookup unavailable".to_string(),
                ));
            }
            Ok(inner.collaborators.contains(login))
        }
    }
}
