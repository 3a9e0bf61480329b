// src/infra/config.rs — Configuration loading (TOML)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::infra::paths;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub models: ModelsConfig,

    #[serde(default)]
    pub limits: LimitsConfig,

    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub openai: OpenAiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    pub generator: String,
    pub evaluator: String,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            generator: "gpt-5".into(),
            evaluator: "gpt-5".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    pub generate: usize,
    pub evaluate: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            generate: 50,
            evaluate: 50,
        }
    }
}

/// Explicit locations; unset entries fall back to `infra::paths`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PathsConfig {
    pub database: Option<PathBuf>,
    pub site_dir: Option<PathBuf>,
    pub psalms_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    pub base_url: String,
    pub generation_effort: String,
    pub evaluation_effort: String,
    pub verbosity: String,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".into(),
            generation_effort: "high".into(),
            evaluation_effort: "medium".into(),
            verbosity: "medium".into(),
        }
    }
}

impl Config {
    /// Load config from file, falling back to defaults, then apply env overrides.
    pub fn load() -> anyhow::Result<Self> {
        let path = paths::config_file_path();
        let mut config = if path.exists() {
            Self::load_from(&path)?
        } else {
            Self::default()
        };
        config.apply_env();
        Ok(config)
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// PSALM_PAIRS_MODEL / PSALM_PAIRS_EVAL_MODEL override the file.
    pub fn apply_env(&mut self) {
        if let Ok(model) = std::env::var("PSALM_PAIRS_MODEL") {
            if !model.trim().is_empty() {
                self.models.generator = model;
            }
        }
        if let Ok(model) = std::env::var("PSALM_PAIRS_EVAL_MODEL") {
            if !model.trim().is_empty() {
                self.models.evaluator = model;
            }
        }
    }

    pub fn db_path(&self) -> PathBuf {
        self.paths.database.clone().unwrap_or_else(paths::db_path)
    }

    pub fn site_dir(&self) -> PathBuf {
        self.paths.site_dir.clone().unwrap_or_else(paths::site_dir)
    }

    pub fn psalms_dir(&self) -> PathBuf {
        self.paths.psalms_dir.clone().unwrap_or_else(paths::psalms_dir)
    }
}
