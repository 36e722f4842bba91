//! Configuration types for tether workspaces.

use crate::error::{Result, TetherError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Comprehensive configuration for a tether workspace.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Config {
    /// Change graph backend configuration.
    #[serde(default)]
    pub graph: GraphConfig,

    /// Ancestor resolution configuration.
    #[serde(default)]
    pub resolver: ResolverConfig,

    /// Transcript configuration.
    #[serde(default)]
    pub transcript: TranscriptConfig,
}

impl Config {
    /// Load configuration from `<tether_dir>/config.toml`.
    ///
    /// A missing file yields the defaults.
    pub fn load(tether_dir: &Path) -> Result<Self> {
        let path = tether_dir.join("config.toml");
        if path.exists() {
            let content = fs::read_to_string(&path)
                .map_err(|e| TetherError::ConfigError(format!("failed to read config: {}", e)))?;
            let config: Config = toml::from_str(&content)
                .map_err(|e| TetherError::ConfigError(format!("failed to parse config: {}", e)))?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Save configuration to `<tether_dir>/config.toml`.
    pub fn save(&self, tether_dir: &Path) -> Result<()> {
        let path = tether_dir.join("config.toml");
        let content = toml::to_string_pretty(self)
            .map_err(|e| TetherError::ConfigError(format!("failed to serialize config: {}", e)))?;
        fs::write(&path, content)
            .map_err(|e| TetherError::ConfigError(format!("failed to write config: {}", e)))?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.resolver.default_depth == 0 {
            return Err(TetherError::ConfigError(
                "resolver.default_depth must be at least 1".to_string(),
            ));
        }
        if self.resolver.max_depth < self.resolver.default_depth {
            return Err(TetherError::ConfigError(format!(
                "resolver.max_depth ({}) is smaller than resolver.default_depth ({})",
                self.resolver.max_depth, self.resolver.default_depth
            )));
        }
        Ok(())
    }
}

/// Which change graph implementation to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GraphBackend {
    /// Shell out to the `jj` binary.
    Jj,
}

/// Change graph backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GraphConfig {
    /// Backend to use (default: jj).
    pub backend: GraphBackend,

    /// Name or path of the jj binary (default: "jj").
    pub jj_binary: String,

    /// Repository the graph lives in. Defaults to the workspace root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo_path: Option<PathBuf>,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            backend: GraphBackend::Jj,
            jj_binary: "jj".to_string(),
            repo_path: None,
        }
    }
}

/// What to do with a session whose lineage was rebased onto an unrelated parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RebasePolicy {
    /// Report the discontinuity and leave the session resumable.
    #[default]
    Warn,
    /// Report the discontinuity and retire the session.
    MarkNonResumable,
}

/// Ancestor resolution configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ResolverConfig {
    /// Hops walked when a query gives no depth (default: 1).
    pub default_depth: usize,

    /// Upper bound on requested depth (default: 64).
    pub max_depth: usize,

    /// Policy for lineages rebased onto unrelated parents (default: warn).
    pub on_unrelated_rebase: RebasePolicy,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            default_depth: 1,
            max_depth: 64,
            on_unrelated_rebase: RebasePolicy::Warn,
        }
    }
}

/// Transcript configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct TranscriptConfig {
    /// Match search queries case-sensitively (default: false).
    pub case_sensitive_search: bool,
}
