use std::sync::Arc;
use std::time::Duration;

use rules_bot::config::loader::RepositoryConfig;
use rules_bot::config::AppConfig;
use rules_bot::github::gateway::{InMemoryGateway, RepositoryGateway};
use rules_bot::github::types::{Mergeable, PullRequestSnapshot};
use rules_bot::github::PrLocks;
use rules_bot::scheduler::{PushDebounceScheduler, SchedulerConfig};
use rules_bot::webhooks::AppState;

pub fn test_app_config() -> AppConfig {
    AppConfig {
        github_app_id: 1,
        github_private_key_path: "unused.pem".to_string(),
        github_webhook_secret: "secret".to_string(),
        repository: "example/repository".to_string(),
        rules_file: "rules.yml".to_string(),
        bot_login: "rules-bot".to_string(),
        bot_aliases: vec!["rules-bot-fork".to_string()],
        server_host: "127.0.0.1".to_string(),
        server_port: 0,
        mergeable_poll_interval_secs: 1,
        mergeable_poll_timeout_secs: 2,
    }
}

/// Build an [`AppState`] around an in-memory gateway and the given rule
/// file contents.
pub fn app_state(rules_yaml: &str, gateway: Arc<InMemoryGateway>) -> AppState {
    let validated = RepositoryConfig::load_from_str(rules_yaml)
        .expect("test rule file parses")
        .validate(&[]);

    let locks = Arc::new(PrLocks::new());
    let scheduler = Arc::new(PushDebounceScheduler::new(
        Arc::clone(&gateway) as Arc<dyn RepositoryGateway>,
        Arc::clone(&locks),
        SchedulerConfig::new(Duration::from_millis(5), Duration::from_millis(100)),
    ));

    AppState {
        config: test_app_config(),
        rules: validated,
        gateway,
        scheduler,
        locks,
    }
}

pub fn snapshot(number: u64, title: &str) -> PullRequestSnapshot {
    PullRequestSnapshot {
        id: number,
        number,
        title: title.to_string(),
        body: None,
        head_sha: format!("sha-{}", number),
        base_ref: "main".to_string(),
        changed_files: vec![],
        commit_messages: vec![format!("WFLY-1 commit for {}", number)],
        author: "author".to_string(),
        draft: false,
        labels: vec![],
        requested_reviewers: vec![],
        mergeable: Mergeable::Unknown,
    }
}
