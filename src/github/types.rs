use serde::{Deserialize, Serialize};

/// GitHub computes pull request mergeability asynchronously; immediately
/// after a push the value is unknown until a background job resolves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mergeable {
    Mergeable,
    Conflicted,
    Unknown,
}

impl Mergeable {
    pub fn from_flag(flag: Option<bool>) -> Self {
        match flag {
            Some(true) => Self::Mergeable,
            Some(false) => Self::Conflicted,
            None => Self::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewState {
    Approved,
    ChangesRequested,
    Commented,
    Other,
}

impl ReviewState {
    pub fn parse(state: &str) -> Self {
        match state.to_ascii_lowercase().as_str() {
            "approved" => Self::Approved,
            "changes_requested" => Self::ChangesRequested,
            "commented" => Self::Commented,
            _ => Self::Other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullRequestAction {
    Opened,
    Edited,
    Synchronize,
    Reopened,
    ReadyForReview,
    Other,
}

impl PullRequestAction {
    pub fn parse(action: &str) -> Self {
        match action {
            "opened" => Self::Opened,
            "edited" => Self::Edited,
            "synchronize" => Self::Synchronize,
            "reopened" => Self::Reopened,
            "ready_for_review" => Self::ReadyForReview,
            _ => Self::Other,
        }
    }
}

/// Commit status states accepted by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusState {
    Success,
    Failure,
    Error,
    Pending,
}

impl StatusState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Error => "error",
            Self::Pending => "pending",
        }
    }
}

/// Immutable view of a pull request taken once per webhook delivery.
/// Re-evaluation always re-fetches a fresh snapshot rather than mutating one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequestSnapshot {
    pub id: u64,
    pub number: u64,
    pub title: String,
    pub body: Option<String>,
    pub head_sha: String,
    pub base_ref: String,
    pub changed_files: Vec<String>,
    pub commit_messages: Vec<String>,
    pub author: String,
    pub draft: bool,
    pub labels: Vec<String>,
    pub requested_reviewers: Vec<String>,
    pub mergeable: Mergeable,
}

/// An issue comment as the bot sees it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueComment {
    pub id: u64,
    pub author: String,
    pub body: String,
}
