// src/infra/errors.rs — Error types for the pair pipeline

use std::path::PathBuf;

use thiserror::Error;

use crate::evaluator::parser::ValidationError;
use crate::pairs::PairError;

#[derive(Error, Debug)]
pub enum PipelineError {
    // Config errors (fatal at startup)
    #[error("No OpenAI credential found. Set OPENAI_API_KEY or create {}", path.display())]
    MissingCredential { path: PathBuf },

    #[error("Configuration error: {0}")]
    Config(String),

    // Capability errors (per item, the item stays pending)
    #[error("Provider '{provider}' error: {message}")]
    Provider {
        provider: String,
        message: String,
        retriable: bool,
    },

    #[error("Rate limited by '{provider}', retry after {retry_after_ms}ms")]
    RateLimited {
        provider: String,
        retry_after_ms: u64,
    },

    #[error("Provider '{provider}' returned an empty response")]
    EmptyResponse { provider: String },

    // Payload errors (per item, nothing persisted)
    #[error("Invalid evaluation payload: {0}")]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Pair(#[from] PairError),

    // Store errors
    #[error("Schema reconciliation failed for {table}.{column}: {source}")]
    Schema {
        table: String,
        column: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Store table {table} cannot be used: {message}")]
    IncompatibleSchema { table: String, message: String },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PipelineError {
    /// Errors that only affect the current pair or argument.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PipelineError::Provider { .. }
                | PipelineError::RateLimited { .. }
                | PipelineError::EmptyResponse { .. }
        )
    }

    /// Errors that abort the whole run before or during work.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            PipelineError::MissingCredential { .. }
                | PipelineError::Config(_)
                | PipelineError::Schema { .. }
                | PipelineError::IncompatibleSchema { .. }
        )
    }
}
