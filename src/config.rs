use serde::{Deserialize, Serialize};
use std::env;
use std::net::SocketAddr;

pub mod loader;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub github_app_id: u64,
    pub github_private_key_path: String,
    pub github_webhook_secret: String,
    pub repository: String,
    pub rules_file: String,
    pub bot_login: String,
    pub bot_aliases: Vec<String>,
    pub server_host: String,
    pub server_port: u16,
    pub mergeable_poll_interval_secs: u64,
    pub mergeable_poll_timeout_secs: u64,
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let github_app_id = env::var("GITHUB_APP_ID")
            .unwrap_or_else(|_| "123456".to_string())
            .parse()?;

        let github_private_key_path = env::var("GITHUB_PRIVATE_KEY_PATH")
            .unwrap_or_else(|_| "/path/to/private-key.pem".to_string());

        let github_webhook_secret = env::var("GITHUB_WEBHOOK_SECRET")
            .unwrap_or_else(|_| "your_webhook_secret_here".to_string());

        let repository = env::var("BOT_REPOSITORY")
            .unwrap_or_else(|_| "example/repository".to_string());

        let rules_file = env::var("BOT_RULES_FILE")
            .unwrap_or_else(|_| "rules.yml".to_string());

        let bot_login = env::var("BOT_LOGIN")
            .unwrap_or_else(|_| "rules-bot".to_string());

        // Fork deployments run under a different account; its mentions carry
        // the same authority as the canonical login.
        let bot_aliases = env::var("BOT_ALIASES")
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_else(|_| Vec::new());

        let server_host = env::var("SERVER_HOST")
            .unwrap_or_else(|_| "0.0.0.0".to_string());

        let server_port = env::var("SERVER_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()?;

        let mergeable_poll_interval_secs = env::var("MERGEABLE_POLL_INTERVAL_SECS")
            .unwrap_or_else(|_| "5".to_string())
            .parse()?;

        let mergeable_poll_timeout_secs = env::var("MERGEABLE_POLL_TIMEOUT_SECS")
            .unwrap_or_else(|_| "120".to_string())
            .parse()?;

        Ok(AppConfig {
            github_app_id,
            github_private_key_path,
            github_webhook_secret,
            repository,
            rules_file,
            bot_login,
            bot_aliases,
            server_host,
            server_port,
            mergeable_poll_interval_secs,
            mergeable_poll_timeout_secs,
        })
    }

    /// All logins that count as "the bot" when scanning for directives.
    pub fn bot_logins(&self) -> Vec<String> {
        let mut logins = vec![self.bot_login.clone()];
        logins.extend(self.bot_aliases.iter().cloned());
        logins
    }

    /// Address the webhook server binds to.
    pub fn bind_addr(&self) -> anyhow::Result<SocketAddr> {
        let addr = format!("{}:{}", self.server_host, self.server_port).parse()?;
        Ok(addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(host: &str, port: u16) -> AppConfig {
        AppConfig {
            github_app_id: 1,
            github_private_key_path: "key.pem".to_string(),
            github_webhook_secret: "secret".to_string(),
            repository: "example/repository".to_string(),
            rules_file: "rules.yml".to_string(),
            bot_login: "rules-bot".to_string(),
            bot_aliases: vec!["rules-bot-fork".to_string()],
            server_host: host.to_string(),
            server_port: port,
            mergeable_poll_interval_secs: 5,
            mergeable_poll_timeout_secs: 120,
        }
    }

    #[test]
    fn bind_addr_uses_configured_host_and_port() {
        let addr = config("127.0.0.1", 8080).bind_addr().unwrap();
        assert_eq!(addr.to_string(), "127.0.0.1:8080");
    }

    #[test]
    fn bind_addr_rejects_a_bad_host() {
        assert!(config("not a host", 8080).bind_addr().is_err());
    }

    #[test]
    fn bot_logins_include_aliases_after_the_canonical_login() {
        assert_eq!(
            config("0.0.0.0", 1).bot_logins(),
            vec!["rules-bot", "rules-bot-fork"]
        );
    }
}
