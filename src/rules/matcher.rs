//! Per-rule predicate evaluation. Pure: no I/O, no shared state.

use regex::RegexBuilder;

use crate::error::BotError;
use crate::github::types::PullRequestSnapshot;

/// Which predicate of a rule produced the hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredicateSource {
    Title,
    Body,
    TitleBody,
    Directory,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchResult {
    pub hit: bool,
    pub source: PredicateSource,
}

impl MatchResult {
    fn hit(source: PredicateSource) -> Self {
        Self { hit: true, source }
    }

    fn miss() -> Self {
        Self {
            hit: false,
            source: PredicateSource::None,
        }
    }
}

/// A configured text predicate. Plain tokens stay literal so that regex
/// metacharacter surprises cannot change what a simple word matches; anything
/// containing a metacharacter is compiled as a pattern and matched partially.
#[derive(Debug, Clone)]
pub enum Pattern {
    Literal(String),
    Regex(regex::Regex),
}

const REGEX_METACHARACTERS: &[char] = &[
    '.', '^', '$', '*', '+', '?', '(', ')', '[', ']', '{', '}', '|', '\\',
];

impl Pattern {
    pub fn compile(value: &str) -> Result<Self, BotError> {
        if !value.contains(REGEX_METACHARACTERS) {
            return Ok(Self::Literal(value.to_lowercase()));
        }

        let regex = RegexBuilder::new(value)
            .case_insensitive(true)
            .build()
            .map_err(|e| BotError::ConfigError(format!("Invalid rule pattern '{}': {}", value, e)))?;
        Ok(Self::Regex(regex))
    }

    pub fn is_match(&self, text: &str) -> bool {
        match self {
            Self::Literal(needle) => text.to_lowercase().contains(needle),
            Self::Regex(regex) => regex.is_match(text),
        }
    }
}

/// A rule whose patterns survived configuration validation.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    /// Declared rule id, or a synthetic positional marker when the
    /// configuration omitted one.
    pub id: String,
    pub title: Option<Pattern>,
    pub body: Option<Pattern>,
    pub title_body: Option<Pattern>,
    pub directories: Vec<String>,
    pub notify: Vec<String>,
    pub labels: Vec<String>,
}

/// Evaluate one rule against a snapshot. Predicates are alternatives: the
/// first one that fires decides the result.
pub fn matches(rule: &CompiledRule, snapshot: &PullRequestSnapshot) -> MatchResult {
    if let Some(pattern) = &rule.title {
        if pattern.is_match(&snapshot.title) {
            return MatchResult::hit(PredicateSource::Title);
        }
    }

    if let Some(pattern) = &rule.body {
        if let Some(body) = &snapshot.body {
            if pattern.is_match(body) {
                return MatchResult::hit(PredicateSource::Body);
            }
        }
    }

    if let Some(pattern) = &rule.title_body {
        let body_hit = snapshot
            .body
            .as_deref()
            .map(|b| pattern.is_match(b))
            .unwrap_or(false);
        if pattern.is_match(&snapshot.title) || body_hit {
            return MatchResult::hit(PredicateSource::TitleBody);
        }
    }

    for directory in &rule.directories {
        for file in &snapshot.changed_files {
            if path_overlaps(directory, file) {
                return MatchResult::hit(PredicateSource::Directory);
            }
        }
    }

    MatchResult::miss()
}

/// Segment-aware overlap: `rule_path` hits when it equals the changed path,
/// is an ancestor directory of it, or is nested inside it. Comparison is on
/// path segments, never raw string prefixes ("app" must not match
/// "appclient/test.txt").
fn path_overlaps(rule_path: &str, changed_file: &str) -> bool {
    let rule_path = rule_path.trim_end_matches('/');
    if rule_path.is_empty() {
        return false;
    }

    changed_file == rule_path
        || changed_file.starts_with(&format!("{}/", rule_path))
        || rule_path.starts_with(&format!("{}/", changed_file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::types::Mergeable;

    fn snapshot(title: &str, body: Option<&str>, files: &[&str]) -> PullRequestSnapshot {
        PullRequestSnapshot {
            id: 1,
            number: 1,
            title: title.to_string(),
            body: body.map(|b| b.to_string()),
            head_sha: "abc123".to_string(),
            base_ref: "main".to_string(),
            changed_files: files.iter().map(|f| f.to_string()).collect(),
            commit_messages: vec![],
            author: "alice".to_string(),
            draft: false,
            labels: vec![],
            requested_reviewers: vec![],
            mergeable: Mergeable::Unknown,
        }
    }

    fn rule_with_title(pattern: &str) -> CompiledRule {
        CompiledRule {
            id: "test".to_string(),
            title: Some(Pattern::compile(pattern).unwrap()),
            body: None,
            title_body: None,
            directories: vec![],
            notify: vec![],
            labels: vec![],
        }
    }

    #[test]
    fn plain_token_is_literal_substring() {
        // "ee" contains no metacharacters, so it must match inside "deep"
        // rather than being treated as a pattern.
        let rule = rule_with_title("ee");
        let result = matches(&rule, &snapshot("deep changes", None, &[]));
        assert!(result.hit);
        assert_eq!(result.source, PredicateSource::Title);
    }

    #[test]
    fn literal_match_is_case_insensitive() {
        let rule = rule_with_title("TITLE");
        assert!(matches(&rule, &snapshot("my title here", None, &[])).hit);
    }

    #[test]
    fn metacharacters_promote_to_regex() {
        let rule = rule_with_title("fix|feat");
        assert!(matches(&rule, &snapshot("feat: new thing", None, &[])).hit);
        assert!(matches(&rule, &snapshot("fix: old thing", None, &[])).hit);
        assert!(!matches(&rule, &snapshot("chore: cleanup", None, &[])).hit);
    }

    #[test]
    fn regex_is_partial_match_not_full() {
        let rule = rule_with_title(r"WFLY-\d+");
        assert!(matches(&rule, &snapshot("[WFLY-123] Fix the thing", None, &[])).hit);
    }

    #[test]
    fn invalid_regex_is_a_config_error() {
        assert!(matches!(
            Pattern::compile("[unclosed"),
            Err(BotError::ConfigError(_))
        ));
    }

    #[test]
    fn body_predicate_skips_missing_body() {
        let rule = CompiledRule {
            id: "b".to_string(),
            title: None,
            body: Some(Pattern::compile("something").unwrap()),
            title_body: None,
            directories: vec![],
            notify: vec![],
            labels: vec![],
        };
        assert!(!matches(&rule, &snapshot("something", None, &[])).hit);
        assert!(matches(&rule, &snapshot("x", Some("something here"), &[])).hit);
    }

    #[test]
    fn title_body_hits_on_either() {
        let rule = CompiledRule {
            id: "tb".to_string(),
            title: None,
            body: None,
            title_body: Some(Pattern::compile("token").unwrap()),
            directories: vec![],
            notify: vec![],
            labels: vec![],
        };
        let result = matches(&rule, &snapshot("token in title", None, &[]));
        assert_eq!(result.source, PredicateSource::TitleBody);
        assert!(matches(&rule, &snapshot("x", Some("token in body"), &[])).hit);
        assert!(!matches(&rule, &snapshot("x", Some("nothing"), &[])).hit);
    }

    #[test]
    fn directory_matching_is_segment_aware() {
        assert!(path_overlaps("appclient", "appclient/test.txt"));
        assert!(!path_overlaps("app", "appclient/test.txt"));
        assert!(path_overlaps("app", "app/test.txt"));
        assert!(path_overlaps("app/sub/file.txt", "app"));
        assert!(path_overlaps("docs", "docs"));
        assert!(!path_overlaps("doc", "docs"));
    }

    #[test]
    fn directory_predicate_checks_all_changed_files() {
        let rule = CompiledRule {
            id: "d".to_string(),
            title: None,
            body: None,
            title_body: None,
            directories: vec!["server".to_string()],
            notify: vec![],
            labels: vec![],
        };
        let result = matches(
            &rule,
            &snapshot("x", None, &["client/a.rs", "server/b.rs"]),
        );
        assert!(result.hit);
        assert_eq!(result.source, PredicateSource::Directory);
    }

    #[test]
    fn no_predicate_hit_reports_none() {
        let rule = rule_with_title("absent");
        let result = matches(&rule, &snapshot("other", None, &[]));
        assert!(!result.hit);
        assert_eq!(result.source, PredicateSource::None);
    }
}
