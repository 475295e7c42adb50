use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    response::Json,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rules_bot::config::loader::{RepositoryConfig, Severity};
use rules_bot::config::AppConfig;
use rules_bot::github::client::GitHubClient;
use rules_bot::github::gateway::RepositoryGateway;
use rules_bot::github::PrLocks;
use rules_bot::scheduler::{PushDebounceScheduler, SchedulerConfig};
use rules_bot::webhooks::{github, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rules_bot=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting rules-bot");

    let config = AppConfig::load()?;
    info!("Configuration loaded for {}", config.repository);

    let gateway: Arc<dyn RepositoryGateway> = Arc::new(GitHubClient::new(
        config.github_app_id,
        &config.github_private_key_path,
        &config.repository,
    )?);
    info!("GitHub client initialized");

    let rule_config = RepositoryConfig::load_from_file(Path::new(&config.rules_file))?;
    let repository_paths = match gateway.repository_paths().await {
        Ok(paths) => paths,
        Err(e) => {
            warn!("Repository tree unavailable; directory checks skipped: {}", e);
            Vec::new()
        }
    };
    let validated = rule_config.validate(&repository_paths);
    for problem in &validated.problems {
        match problem.severity {
            Severity::Warn => warn!("Rule config: {}", problem.message),
            Severity::Error => error!("Rule config: {}", problem.message),
        }
    }
    if validated.blocked() {
        // Processing stays up to answer webhooks, but every PR gets the
        // configuration-error status until the rule file is fixed.
        error!(
            "Rule set is blocked by configuration errors; notices would go to {:?}",
            validated.config.emails
        );
    }

    let locks = Arc::new(PrLocks::new());
    let scheduler = Arc::new(PushDebounceScheduler::new(
        Arc::clone(&gateway),
        Arc::clone(&locks),
        SchedulerConfig::new(
            Duration::from_secs(config.mergeable_poll_interval_secs),
            Duration::from_secs(config.mergeable_poll_timeout_secs),
        ),
    ));

    let addr = config.bind_addr()?;
    let state = Arc::new(AppState {
        config,
        rules: validated,
        gateway,
        scheduler,
        locks,
    });

    let app = Router::new()
        .route("/health", get(health_check))
        .route("/webhooks/github", post(github::handle_webhook))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .into_inner(),
        )
        .with_state(state);

    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "rules-bot",
    }))
}
