use jsonwebtoken::EncodingKey;
use octocrab::models::CommentId;
use octocrab::Octocrab;
use tracing::debug;

use crate::error::{BotError, Result};
use crate::github::gateway::RepositoryGateway;
use crate::github::types::{IssueComment, Mergeable, PullRequestSnapshot, StatusState};

/// Production gateway: one client bound to one owner/repo.
pub struct GitHubClient {
    client: Octocrab,
    owner: String,
    repo: String,
}

impl GitHubClient {
    pub fn new(app_id: u64, private_key_path: &str, repository: &str) -> Result<Self> {
        let key = std::fs::read_to_string(private_key_path)
            .map_err(|e| BotError::ConfigError(format!("Failed to read private key: {}", e)))?;

        let key = EncodingKey::from_rsa_pem(key.as_bytes())
            .map_err(|e| BotError::ConfigError(format!("Invalid private key: {}", e)))?;

        let client = Octocrab::builder()
            .app(app_id.into(), key)
            .build()
            .map_err(|e| BotError::GitHubError(format!("Failed to create GitHub client: {}", e)))?;

        let (owner, repo) = repository
            .split_once('/')
            .ok_or_else(|| {
                BotError::ConfigError(format!("Repository must be owner/name: {}", repository))
            })?;

        Ok(Self {
            client,
            owner: owner.to_string(),
            repo: repo.to_string(),
        })
    }

    fn snapshot_from(pr: &octocrab::models::pulls::PullRequest) -> PullRequestSnapshot {
        PullRequestSnapshot {
            id: pr.id.0,
            number: pr.number,
            title: pr.title.clone().unwrap_or_default(),
            body: pr.body.clone(),
            head_sha: pr.head.sha.clone(),
            base_ref: pr.base.ref_field.clone(),
            changed_files: Vec::new(),
            commit_messages: Vec::new(),
            author: pr
                .user
                .as_ref()
                .map(|u| u.login.clone())
                .unwrap_or_default(),
            draft: pr.draft.unwrap_or(false),
            labels: pr
                .labels
                .as_ref()
                .map(|labels| labels.iter().map(|l| l.name.clone()).collect())
                .unwrap_or_default(),
            requested_reviewers: pr
                .requested_reviewers
                .as_ref()
                .map(|users| users.iter().map(|u| u.login.clone()).collect())
                .unwrap_or_default(),
            mergeable: Mergeable::from_flag(pr.mergeable),
        }
    }
}

#[async_trait::async_trait]
impl RepositoryGateway for GitHubClient {
    async fn repository_paths(&self) -> Result<Vec<String>> {
        let route = format!(
            "/repos/{}/{}/git/trees/HEAD?recursive=1",
            self.owner, self.repo
        );
        let tree: serde_json::Value = self.client.get(route, None::<&()>).await?;
        Ok(tree
            .get("tree")
            .and_then(|t| t.as_array())
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|e| e.get("path").and_then(|p| p.as_str()))
                    .map(|p| p.to_string())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn open_pull_requests(&self, base_branch: &str) -> Result<Vec<PullRequestSnapshot>> {
        let page = self
            .client
            .pulls(&self.owner, &self.repo)
            .list()
            .state(octocrab::params::State::Open)
            .base(base_branch)
            .per_page(100)
            .send()
            .await?;

        Ok(page.items.iter().map(Self::snapshot_from).collect())
    }

    async fn mergeable_state(&self, pr_number: u64) -> Result<Mergeable> {
        let pr = self
            .client
            .pulls(&self.owner, &self.repo)
            .get(pr_number)
            .await?;
        Ok(Mergeable::from_flag(pr.mergeable))
    }

    async fn changed_files(&self, pr_number: u64) -> Result<Vec<String>> {
        let page = self
            .client
            .pulls(&self.owner, &self.repo)
            .list_files(pr_number)
            .await?;
        Ok(page.items.into_iter().map(|f| f.filename).collect())
    }

    async fn commit_messages(&self, pr_number: u64) -> Result<Vec<String>> {
        let page = self
            .client
            .pulls(&self.owner, &self.repo)
            .pr_commits(pr_number)
            .send()
            .await?;
        Ok(page
            .items
            .into_iter()
            .map(|c| c.commit.message)
            .collect())
    }

    async fn add_labels(&self, pr_number: u64, names: &[String]) -> Result<()> {
        self.client
            .issues(&self.owner, &self.repo)
            .add_labels(pr_number, names)
            .await?;
        Ok(())
    }

    async fn remove_label(&self, pr_number: u64, name: &str) -> Result<()> {
        self.client
            .issues(&self.owner, &self.repo)
            .remove_label(pr_number, name)
            .await?;
        Ok(())
    }

    async fn create_label_if_missing(&self, name: &str, color: &str) -> Result<()> {
        match self
            .client
            .issues(&self.owner, &self.repo)
            .create_label(name, color, "")
            .await
        {
            Ok(_) => Ok(()),
            // already_exists comes back as a validation failure
            Err(e) => {
                debug!("Label '{}' not created (assumed existing): {}", name, e);
                Ok(())
            }
        }
    }

    async fn find_bot_comment(&self, pr_number: u64, marker: &str) -> Result<Option<IssueComment>> {
        let page = self
            .client
            .issues(&self.owner, &self.repo)
            .list_comments(pr_number)
            .per_page(100)
            .send()
            .await?;

        Ok(page
            .items
            .into_iter()
            .find(|c| {
                c.body
                    .as_deref()
                    .map(|b| b.contains(marker))
                    .unwrap_or(false)
            })
            .map(|c| IssueComment {
                id: c.id.0,
                author: c.user.login,
                body: c.body.unwrap_or_default(),
            }))
    }

    async fn create_comment(&self, pr_number: u64, body: &str) -> Result<u64> {
        let comment = self
            .client
            .issues(&self.owner, &self.repo)
            .create_comment(pr_number, body)
            .await?;
        Ok(comment.id.0)
    }

    async fn update_comment(&self, comment_id: u64, body: &str) -> Result<()> {
        self.client
            .issues(&self.owner, &self.repo)
            .update_comment(CommentId(comment_id), body)
            .await?;
        Ok(())
    }

    async fn delete_comment(&self, comment_id: u64) -> Result<()> {
        self.client
            .issues(&self.owner, &self.repo)
            .delete_comment(CommentId(comment_id))
            .await?;
        Ok(())
    }

    async fn request_reviewers(&self, pr_number: u64, logins: &[String]) -> Result<()> {
        self.client
            .pulls(&self.owner, &self.repo)
            .request_reviews(pr_number, logins.to_vec(), Vec::<String>::new())
            .await?;
        Ok(())
    }

    async fn create_commit_status(
        &self,
        sha: &str,
        state: StatusState,
        description: &str,
        context: &str,
    ) -> Result<()> {
        let route = format!("/repos/{}/{}/statuses/{}", self.owner, self.repo, sha);
        let body = serde_json::json!({
            "state": state.as_str(),
            "description": description,
            "context": context,
        });
        let _: serde_json::Value = self.client.post(route, Some(&body)).await?;
        Ok(())
    }

    async fn is_collaborator(&self, login: &str) -> Result<bool> {
        let route = format!(
            "/repos/{}/{}/collaborators/{}",
            self.owner, self.repo, login
        );
        match self.client._get(route).await {
            Ok(response) => Ok(response.status().is_success()),
            Err(octocrab::Error::GitHub { source, .. })
                if source.status_code.as_u16() == 404 =>
            {
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }
}
