//! Runtime configuration.
//!
//! Read from `huddle.toml` in the data directory. Every section is optional
//! and a missing file yields the defaults.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use huddle_graph::SuggestionConfig;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HuddleConfig {
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub suggestions: SuggestionsConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database file. Relative paths resolve against the data directory.
    #[serde(default)]
    pub path: Option<PathBuf>,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    4
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: None,
            max_connections: default_max_connections(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SuggestionsConfig {
    #[serde(default = "default_max_suggestions")]
    pub max_suggestions: usize,
}

fn default_max_suggestions() -> usize {
    SuggestionConfig::default().max_suggestions
}

impl Default for SuggestionsConfig {
    fn default() -> Self {
        Self {
            max_suggestions: default_max_suggestions(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
    /// `tracing-subscriber` filter directive, e.g. `huddle_graph=debug`.
    #[serde(default)]
    pub filter: Option<String>,
}

impl HuddleConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Resolve the database file against `base_dir`, falling back to `default`.
    pub fn database_path(&self, base_dir: &Path, default: &Path) -> PathBuf {
        match &self.database.path {
            Some(path) if path.is_absolute() => path.clone(),
            Some(path) => base_dir.join(path),
            None => default.to_path_buf(),
        }
    }

    pub fn suggestion_config(&self) -> SuggestionConfig {
        SuggestionConfig {
            max_suggestions: self.suggestions.max_suggestions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = HuddleConfig::load(&dir.path().join("huddle.toml")).unwrap();
        assert_eq!(config.database.max_connections, 4);
        assert_eq!(config.suggestions.max_suggestions, 12);
        assert!(config.logging.filter.is_none());
    }

    #[test]
    fn test_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("huddle.toml");
        std::fs::write(
            &path,
            "[database]\npath = \"graph.db\"\n\n[suggestions]\nmax_suggestions = 5\n",
        )
        .unwrap();

        let config = HuddleConfig::load(&path).unwrap();
        assert_eq!(config.database.max_connections, 4);
        assert_eq!(config.suggestion_config().max_suggestions, 5);
        assert_eq!(
            config.database_path(dir.path(), Path::new("/unused")),
            dir.path().join("graph.db")
        );
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("huddle.toml");
        std::fs::write(&path, "[suggestions]\nmax_suggestions = \"many\"\n").unwrap();
        assert!(HuddleConfig::load(&path).is_err());
    }
}
