pub mod config;
pub mod error;
pub mod format;
pub mod github;
pub mod notify;
pub mod reconcile;
pub mod rules;
pub mod scheduler;
pub mod webhooks;

pub use error::BotError;
