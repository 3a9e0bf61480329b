// src/provider/resolver.rs — Credential discovery and provider construction

use std::path::Path;
use std::sync::Arc;

use super::openai::OpenAIProvider;
use super::ModelProvider;
use crate::infra::config::Config;
use crate::infra::errors::PipelineError;
use crate::infra::paths;

/// Resolve the API key: OPENAI_API_KEY first, then the key file.
pub fn load_api_key() -> Result<String, PipelineError> {
    if let Ok(key) = std::env::var("OPENAI_API_KEY") {
        if !key.trim().is_empty() {
            return Ok(key.trim().to_string());
        }
    }
    load_key_file(&paths::openai_key_path())
}

pub fn load_key_file(path: &Path) -> Result<String, PipelineError> {
    if !path.exists() {
        return Err(PipelineError::MissingCredential {
            path: path.to_path_buf(),
        });
    }
    let key = std::fs::read_to_string(path)?;
    let key = key.trim();
    if key.is_empty() {
        return Err(PipelineError::Config(format!(
            "{} is empty",
            path.display()
        )));
    }
    Ok(key.to_string())
}

/// Build the provider for a run. Fails before any work if no credential exists.
pub fn provider_from_config(config: &Config) -> Result<Arc<dyn ModelProvider>, PipelineError> {
    let key = load_api_key()?;
    Ok(Arc::new(OpenAIProvider::with_base_url(
        key,
        config.openai.base_url.clone(),
    )))
}
