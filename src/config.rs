//! Configuration loading and validation.
//!
//! Everything lives under `~/.agent-architect/`:
//! - `config.toml`: model routing, storage path, pipeline limits
//! - `.env`: optional API key (`GEMINI_API_KEY`), must be 0600
//! - `architect.db`: SQLite key-value store for agents, runs and settings
//! - `logs/`: rotated JSON logs

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::providers::gemini::DEFAULT_GEMINI_URL;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Model routing configuration.
    pub models: ModelsConfig,

    /// Storage configuration.
    pub storage: StorageConfig,

    /// Pipeline limits.
    pub limits: LimitsConfig,

    /// Oracle endpoint configuration.
    pub oracle: OracleConfig,
}

/// The pipeline task an oracle call serves. Each maps to a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OracleRole {
    /// Document summarization.
    Summarize,
    /// Primary sector discovery search.
    Discover,
    /// Targeted fallback discovery search.
    DiscoverFallback,
    /// Company website analysis.
    Analyze,
    /// Instruction text assembly.
    Assemble,
    /// Test scenario generation.
    Scenarios,
    /// Simulated agent answer.
    Answer,
    /// Answer evaluation.
    Evaluate,
    /// Instruction rewrite from failures.
    Improve,
    /// Demo chat and social replies.
    Chat,
}

impl OracleRole {
    /// Key used in `[models.roles]`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Summarize => "summarize",
            Self::Discover => "discover",
            Self::DiscoverFallback => "discover_fallback",
            Self::Analyze => "analyze",
            Self::Assemble => "assemble",
            Self::Scenarios => "scenarios",
            Self::Answer => "answer",
            Self::Evaluate => "evaluate",
            Self::Improve => "improve",
            Self::Chat => "chat",
        }
    }
}

/// Model routing: a default model plus per-role overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    /// Default model identifier.
    #[serde(default = "default_model")]
    pub default: String,

    /// Per-role model overrides, keyed by [`OracleRole::as_str`].
    #[serde(default = "default_roles")]
    pub roles: HashMap<String, String>,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            default: default_model(),
            roles: default_roles(),
        }
    }
}

impl ModelsConfig {
    /// Resolve the model for a role: role override, else default.
    pub fn resolve(&self, role: OracleRole) -> &str {
        self.roles
            .get(role.as_str())
            .map(String::as_str)
            .unwrap_or(&self.default)
    }
}

/// Storage configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite database path. Defaults to `architect.db` in the runtime dir.
    #[serde(default)]
    pub database: Option<PathBuf>,
}

/// Pipeline limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Extracted text is truncated to this many characters before summarizing.
    #[serde(default = "default_max_document_chars")]
    pub max_document_chars: usize,

    /// Maximum discovered candidates shown after deduplication.
    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,

    /// Instruction text is truncated to this many characters when generating
    /// scenarios.
    #[serde(default = "default_scenario_prompt_chars")]
    pub scenario_prompt_chars: usize,

    /// Maximum failed results quoted in an improvement request.
    #[serde(default = "default_max_improve_failures")]
    pub max_improve_failures: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_document_chars: default_max_document_chars(),
            max_candidates: default_max_candidates(),
            scenario_prompt_chars: default_scenario_prompt_chars(),
            max_improve_failures: default_max_improve_failures(),
        }
    }
}

/// Oracle endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleConfig {
    /// Base URL of the `generateContent` API.
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
        }
    }
}

// Default value functions for serde

fn default_model() -> String {
    "gemini-2.5-flash".to_owned()
}
fn default_roles() -> HashMap<String, String> {
    [OracleRole::Discover, OracleRole::Analyze, OracleRole::Improve]
        .into_iter()
        .map(|role| (role.as_str().to_owned(), "gemini-3-pro-preview".to_owned()))
        .collect()
}
fn default_max_document_chars() -> usize {
    100_000
}
fn default_max_candidates() -> usize {
    15
}
fn default_scenario_prompt_chars() -> usize {
    5_000
}
fn default_max_improve_failures() -> usize {
    5
}
fn default_base_url() -> String {
    DEFAULT_GEMINI_URL.to_owned()
}

/// Load configuration from a TOML file. A missing file yields defaults.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_config(path: &Path) -> anyhow::Result<Config> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::info!(path = %path.display(), "no config file found, using defaults");
            return Ok(Config::default());
        }
        Err(e) => {
            return Err(anyhow::anyhow!(
                "failed to read config at {}: {e}",
                path.display()
            ))
        }
    };
    let config: Config = toml::from_str(&contents)
        .map_err(|e| anyhow::anyhow!("failed to parse config at {}: {e}", path.display()))?;
    Ok(config)
}

/// Resolve the default config directory (`~/.agent-architect/`).
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined.
pub fn config_dir() -> anyhow::Result<PathBuf> {
    let home = directories::BaseDirs::new()
        .ok_or_else(|| anyhow::anyhow!("cannot determine home directory"))?;
    Ok(home.home_dir().join(".agent-architect"))
}

/// Well-known runtime file locations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimePaths {
    /// Runtime root directory.
    pub root: PathBuf,
    /// `config.toml` path.
    pub config_file: PathBuf,
    /// `.env` path.
    pub env_file: PathBuf,
    /// Default SQLite database path.
    pub database: PathBuf,
    /// Log directory.
    pub logs_dir: PathBuf,
}

impl RuntimePaths {
    /// Lay out runtime paths under `root`.
    pub fn under(root: PathBuf) -> Self {
        Self {
            config_file: root.join("config.toml"),
            env_file: root.join(".env"),
            database: root.join("architect.db"),
            logs_dir: root.join("logs"),
            root,
        }
    }

    /// Database path, honouring a `[storage].database` override.
    pub fn database_for(&self, config: &Config) -> PathBuf {
        config
            .storage
            .database
            .clone()
            .unwrap_or_else(|| self.database.clone())
    }
}

/// Resolve runtime paths under [`config_dir`].
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined.
pub fn runtime_paths() -> anyhow::Result<RuntimePaths> {
    Ok(RuntimePaths::under(config_dir()?))
}
