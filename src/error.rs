use thiserror::Error;

#[derive(Error, Debug)]
pub enum BotError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("GitHub API error: {0}")]
    GitHubError(String),

    #[error("Webhook processing error: {0}")]
    WebhookError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

pub type Result<T, E = BotError> = std::result::Result<T, E>;

impl From<serde_json::Error> for BotError {
    fn from(err: serde_json::Error) -> Self {
        Self::WebhookError(format!("JSON error: {}", err))
    }
}

impl From<octocrab::Error> for BotError {
    fn from(err: octocrab::Error) -> Self {
        Self::GitHubError(err.to_string())
    }
}
