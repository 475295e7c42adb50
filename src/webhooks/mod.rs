pub mod github;
pub mod pull_request;
pub mod push;
pub mod review;

use std::sync::Arc;

use crate::config::loader::ValidatedConfig;
use crate::config::AppConfig;
use crate::github::gateway::RepositoryGateway;
use crate::github::PrLocks;
use crate::scheduler::PushDebounceScheduler;

/// Everything a webhook handler needs, shared across deliveries.
pub struct AppState {
    pub config: AppConfig,
    pub rules: ValidatedConfig,
    pub gateway: Arc<dyn RepositoryGateway>,
    pub scheduler: Arc<PushDebounceScheduler>,
    pub locks: Arc<PrLocks>,
}
