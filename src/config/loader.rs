//! Loads and validates the per-repository rule file (YAML).
//!
//! Validation distinguishes warnings from blocking errors: a rule without an
//! id still applies, while duplicate ids, malformed patterns, and directories
//! that do not exist in the repository block the whole rule set until fixed.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::BotError;
use crate::rules::matcher::{CompiledRule, Pattern};

pub const DEFAULT_PROJECT_KEY: &str = "WFLY";

const ID_RESERVED_CHARACTERS: &[char] = &[',', '[', ']'];

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RepositoryConfig {
    #[serde(rename = "projectKey", default = "default_project_key")]
    pub project_key: String,
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
    #[serde(default)]
    pub format: FormatConfig,
    /// Addresses for configuration-error notices. Delivery happens outside
    /// this crate; the addresses are carried through and logged.
    #[serde(default)]
    pub emails: Vec<String>,
}

fn default_project_key() -> String {
    DEFAULT_PROJECT_KEY.to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RuleConfig {
    pub id: Option<String>,
    pub title: Option<String>,
    pub body: Option<String>,
    #[serde(rename = "titleBody")]
    pub title_body: Option<String>,
    #[serde(default)]
    pub directories: Vec<String>,
    #[serde(default)]
    pub notify: Vec<String>,
    #[serde(default)]
    pub labels: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FormatConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub title: CheckConfig,
    #[serde(default)]
    pub commit: CheckConfig,
    #[serde(default)]
    pub description: CheckConfig,
}

impl Default for FormatConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            title: CheckConfig::default(),
            commit: CheckConfig::default(),
            description: CheckConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CheckConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub pattern: Option<String>,
    pub message: Option<String>,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            pattern: None,
            message: None,
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warn,
    Error,
}

#[derive(Debug, Clone)]
pub struct ConfigProblem {
    pub severity: Severity,
    pub message: String,
}

impl ConfigProblem {
    fn warn(message: String) -> Self {
        Self {
            severity: Severity::Warn,
            message,
        }
    }

    fn error(message: String) -> Self {
        Self {
            severity: Severity::Error,
            message,
        }
    }
}

pub fn has_blocking(problems: &[ConfigProblem]) -> bool {
    problems.iter().any(|p| p.severity == Severity::Error)
}

/// Result of validating and compiling a rule file.
pub struct ValidatedConfig {
    pub config: RepositoryConfig,
    pub rules: Vec<CompiledRule>,
    pub problems: Vec<ConfigProblem>,
}

impl ValidatedConfig {
    /// A single blocking problem disables the entire rule set for the
    /// repository until the configuration is fixed.
    pub fn blocked(&self) -> bool {
        has_blocking(&self.problems)
    }
}

impl RepositoryConfig {
    pub fn load_from_file(path: &Path) -> Result<Self, BotError> {
        if !path.exists() {
            return Err(BotError::ConfigError(format!(
                "Rule file not found: {:?}",
                path
            )));
        }

        let contents = fs::read_to_string(path)
            .map_err(|e| BotError::ConfigError(format!("Failed to read {:?}: {}", path, e)))?;

        Self::load_from_str(&contents)
    }

    pub fn load_from_str(contents: &str) -> Result<Self, BotError> {
        serde_yaml::from_str(contents)
            .map_err(|e| BotError::ConfigError(format!("Failed to parse rule file: {}", e)))
    }

    /// Validate and compile the rule set. `repository_paths` is the list of
    /// paths known to exist in the repository; when empty, directory
    /// existence is not checked (the tree could not be fetched).
    pub fn validate(self, repository_paths: &[String]) -> ValidatedConfig {
        let mut problems = Vec::new();
        let mut compiled = Vec::new();
        let mut seen_ids: HashSet<String> = HashSet::new();

        for (index, rule) in self.rules.iter().enumerate() {
            let id = match &rule.id {
                Some(id) => {
                    if !seen_ids.insert(id.clone()) {
                        problems.push(ConfigProblem::error(format!(
                            "Duplicate rule id: {}",
                            id
                        )));
                    }
                    // These characters delimit the rendered cc comment, so
                    // an id containing them would not survive a re-parse.
                    if id.contains(ID_RESERVED_CHARACTERS) {
                        problems.push(ConfigProblem::error(format!(
                            "Rule id '{}' contains a reserved character (one of ',', '[', ']')",
                            id
                        )));
                    }
                    id.clone()
                }
                None => {
                    let synthetic = format!("rule-{}", index + 1);
                    problems.push(ConfigProblem::warn(format!(
                        "Rule at position {} has no id; using '{}'",
                        index + 1,
                        synthetic
                    )));
                    synthetic
                }
            };

            let title = compile_pattern(&rule.title, &id, "title", &mut problems);
            let body = compile_pattern(&rule.body, &id, "body", &mut problems);
            let title_body = compile_pattern(&rule.title_body, &id, "titleBody", &mut problems);

            if !repository_paths.is_empty() {
                for directory in &rule.directories {
                    let exists = repository_paths.iter().any(|p| {
                        p == directory || p.starts_with(&format!("{}/", directory))
                    });
                    if !exists {
                        problems.push(ConfigProblem::error(format!(
                            "Rule '{}' references non-existent directory: {}",
                            id, directory
                        )));
                    }
                }
            }

            compiled.push(CompiledRule {
                id,
                title,
                body,
                title_body,
                directories: rule.directories.clone(),
                notify: rule.notify.clone(),
                labels: rule.labels.clone(),
            });
        }

        info!(
            "Rule file validated: {} rules, {} problems",
            compiled.len(),
            problems.len()
        );

        ValidatedConfig {
            config: self,
            rules: compiled,
            problems,
        }
    }
}

fn compile_pattern(
    value: &Option<String>,
    rule_id: &str,
    field: &str,
    problems: &mut Vec<ConfigProblem>,
) -> Option<Pattern> {
    let value = value.as_deref()?;
    match Pattern::compile(value) {
        Ok(pattern) => Some(pattern),
        Err(e) => {
            problems.push(ConfigProblem::error(format!(
                "Rule '{}' field '{}': {}",
                rule_id, field, e
            )));
            None
        }
    }
}
