pub mod checker;

pub use checker::{FormatChecker, FormatOutcome, FORMAT_COMMENT_DELIMITER, FORMAT_CONTEXT};
