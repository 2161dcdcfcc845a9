//! Engine configuration loaded from TOML
use crate::error::{ConfigError, EngineError};
use crate::step::Outcome;
use crate::store::DEFAULT_TREE;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub decisions: DecisionPolicy,
    pub storage: StorageConfig,
}

/// Rules applied to the free-text part of a decision.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DecisionPolicy {
    pub max_comment_len: usize,
    pub comment_required_for: Vec<Outcome>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub path: PathBuf,
    pub tree: String,
}

impl Default for DecisionPolicy {
    fn default() -> Self {
        Self {
            max_comment_len: 2000,
            comment_required_for: Vec::new(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("approvals.db"),
            tree: DEFAULT_TREE.to_string(),
        }
    }
}

impl EngineConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.decisions.max_comment_len == 0 {
            return Err(ConfigError::Validation(
                "decisions.max_comment_len must be greater than zero".into(),
            ));
        }
        if self.storage.tree.trim().is_empty() {
            return Err(ConfigError::Validation(
                "storage.tree must not be empty".into(),
            ));
        }
        Ok(())
    }
}

impl DecisionPolicy {
    /// Blank comments count as absent. Length is measured in characters.
    pub fn check_comment(&self, outcome: Outcome, comment: Option<&str>) -> Result<(), EngineError> {
        let comment = comment.map(str::trim).filter(|c| !c.is_empty());

        match comment {
            None if self.comment_required_for.contains(&outcome) => {
                Err(EngineError::CommentRequired(outcome))
            }
            Some(text) if text.chars().count() > self.max_comment_len => {
                Err(EngineError::CommentTooLong {
                    len: text.chars().count(),
                    max: self.max_comment_len,
                })
            }
            _ => Ok(()),
        }
    }
}
