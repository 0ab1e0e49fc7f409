//! Configuration handling for the parcel resolver
//!
//! Configuration is stored in `.parcel/config.toml` (project) and
//! `~/.config/parcel/config.toml` (global). An explicit `--config` file
//! replaces the project file; command-line flags override both.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{AnyOfReading, ResolvePolicy};

/// Directory marking a project root
pub const PROJECT_DIR: &str = ".parcel";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse configuration: {0}")]
    Parse(String),
}

/// Defaults for `parcel resolve`
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ResolveConfig {
    /// Reading of required `anyOf` groups
    pub any_of: AnyOfReading,

    /// Resolve yanked invoices without `--allow-yanked`
    pub allow_yanked: bool,

    /// Groups opted into on every resolve
    pub opt_in: Vec<String>,
}

impl ResolveConfig {
    /// Base policy before command-line opt-ins are added
    pub fn policy(&self) -> ResolvePolicy {
        self.opt_in
            .iter()
            .fold(ResolvePolicy::new().with_any_of(self.any_of), |policy, group| {
                policy.opt_in(group.as_str())
            })
    }
}

/// Project-level configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ProjectConfig {
    pub resolve: ResolveConfig,
}

/// Global user configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct GlobalConfig {
    /// Default output format (text or json)
    pub default_format: OutputFormat,
}

/// Output format for commands
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Combined configuration (global + project)
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub project: ProjectConfig,
    pub global: GlobalConfig,

    /// File the project settings came from, if any
    pub source: Option<PathBuf>,
}

impl Config {
    /// Loads configuration from default locations
    pub fn load() -> Result<Self> {
        let global = Self::load_global()?;
        let (project, source) = match Self::find_project_root() {
            Some(root) => {
                let path = Self::project_config_path(&root);
                if path.exists() {
                    (Self::load_project_config(&path)?, Some(path))
                } else {
                    (ProjectConfig::default(), None)
                }
            }
            None => (ProjectConfig::default(), None),
        };

        Ok(Self {
            project,
            global,
            source,
        })
    }

    /// Loads global configuration plus an explicit project config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let global = Self::load_global()?;
        let project = Self::load_project_config(path)?;

        Ok(Self {
            project,
            global,
            source: Some(path.to_path_buf()),
        })
    }

    /// Returns the global config directory
    pub fn global_config_dir() -> Option<PathBuf> {
        ProjectDirs::from("dev", "parcel", "parcel-resolver")
            .map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Loads global configuration
    fn load_global() -> Result<GlobalConfig> {
        let config_dir = match Self::global_config_dir() {
            Some(dir) => dir,
            None => return Ok(GlobalConfig::default()),
        };

        let config_path = config_dir.join("config.toml");
        if !config_path.exists() {
            return Ok(GlobalConfig::default());
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read global config: {}", config_path.display()))?;

        toml::from_str(&content)
            .map_err(|e| ConfigError::Parse(e.to_string()))
            .context("Failed to parse global config")
    }

    /// Loads project configuration from a file
    fn load_project_config(config_path: &Path) -> Result<ProjectConfig> {
        let content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read project config: {}", config_path.display()))?;

        toml::from_str(&content)
            .map_err(|e| ConfigError::Parse(e.to_string()))
            .with_context(|| format!("Failed to parse project config: {}", config_path.display()))
    }

    pub fn project_config_path(root: &Path) -> PathBuf {
        root.join(PROJECT_DIR).join("config.toml")
    }

    /// Finds the project root by looking for a `.parcel/` directory
    pub fn find_project_root() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;
        Self::find_project_root_from(&current)
    }

    /// Walks up from `start` looking for a `.parcel/` directory
    pub fn find_project_root_from(start: &Path) -> Option<PathBuf> {
        let mut current = start.to_path_buf();

        loop {
            if current.join(PROJECT_DIR).is_dir() {
                return Some(current);
            }

            if !current.pop() {
                return None;
            }
        }
    }

    /// Resolve defaults in effect
    pub fn resolve(&self) -> &ResolveConfig {
        &self.project.resolve
    }
}
