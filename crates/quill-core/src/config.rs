//! Configuration types for orchestration, retrieval, refinement, and backends.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Complete pipeline configuration.
#[derive(Default, Debug, Clone, Serialize, Deserialize)]
pub struct QuillConfig {
    /// Orchestrator routing thresholds
    pub orchestrator: OrchestratorConfig,
    /// Retrieval configuration
    pub retrieval: RetrievalConfig,
    /// Refinement loop configuration
    pub refinement: RefinementConfig,
    /// Generation backend configuration
    pub backends: BackendConfig,
}

/// Orchestrator routing thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Confidence below which classification is treated as noise and the
    /// request short-circuits to a direct reply
    pub low_confidence_threshold: f64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            low_confidence_threshold: 0.3,
        }
    }
}

/// Retrieval configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Number of documents requested per search
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { top_k: 5 }
    }
}

/// Refinement loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefinementConfig {
    /// Maximum generate/validate attempts per request
    pub max_retries: u32,
    /// Whether to skip test generation entirely
    pub skip_tests: bool,
    /// Per-attempt deadline for the execution collaborator, in seconds
    pub execution_timeout_seconds: u64,
}

impl Default for RefinementConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            skip_tests: false,
            execution_timeout_seconds: 30,
        }
    }
}

/// Generation backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Model name for the local tier
    pub local_model: String,
    /// Model name for the remote tier
    pub remote_model: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            local_model: "qwen2.5-coder:7b".to_owned(),
            remote_model: "claude-sonnet".to_owned(),
        }
    }
}

impl QuillConfig {
    /// Get the default config directory path (`~/.quill`)
    ///
    /// # Errors
    /// Returns an error if the home directory cannot be determined
    pub fn config_dir() -> Result<PathBuf> {
        use dirs::home_dir;
        let home = home_dir()
            .ok_or_else(|| Error::Config("Could not determine home directory".to_owned()))?;
        Ok(home.join(".quill"))
    }

    /// Get the default config file path (`~/.quill/config.toml`)
    ///
    /// # Errors
    /// Returns an error if the home directory cannot be determined
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load config from the default location (`~/.quill/config.toml`)
    /// If the config doesn't exist, creates it with default values
    ///
    /// # Errors
    /// Returns an error if the config cannot be read or created
    pub fn load_or_create() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            Self::load_from_file(&config_path)
        } else {
            let config = Self::default();
            config.save_to_file(&config_path)?;
            Ok(config)
        }
    }

    /// Load config from a specific file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|error| Error::Config(format!("Failed to read config: {error}")))?;
        toml::from_str(&contents)
            .map_err(|error| Error::Config(format!("Failed to parse config: {error}")))
    }

    /// Save config to a specific file
    ///
    /// # Errors
    /// Returns an error if the file cannot be written
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|error| {
                Error::Config(format!("Failed to create config directory: {error}"))
            })?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|error| Error::Config(format!("Failed to serialize config: {error}")))?;

        let header = "# Quill Configuration File\n\
                      # This file is automatically generated on first run\n\
                      # Edit this file to customize your settings\n\n";

        fs::write(path, format!("{header}{contents}"))
            .map_err(|error| Error::Config(format!("Failed to write config: {error}")))?;

        Ok(())
    }
}
