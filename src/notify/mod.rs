//! The "cc" notification channel: one bot-owned comment per PR plus formal
//! reviewer requests for collaborators.

pub mod comment;

pub use comment::{parse_comment, render_comment, CommentReconciler, BOT_MESSAGE_DELIMITER};
