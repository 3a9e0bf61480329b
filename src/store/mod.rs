// src/store/mod.rs — Store lifecycle

pub mod schema;
pub mod store;

use rusqlite::Connection;
use std::path::Path;
use tracing::info;

use crate::infra::errors::PipelineError;

/// Owns the reconciled store for one run.
pub struct Database {
    pub store: store::Store,
    pub reconcile: schema::ReconcileReport,
}

impl Database {
    /// Open (or create) the database at the given path and reconcile its schema.
    pub fn open(path: &Path) -> Result<Self, PipelineError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::from_connection(conn)
    }

    /// Create an in-memory database (for testing).
    pub fn in_memory() -> Result<Self, PipelineError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, PipelineError> {
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        let reconcile = schema::reconcile(&conn)?;
        if !reconcile.added.is_empty() {
            info!(
                "Reconciled store schema v{} -> v{} ({} column(s) added)",
                reconcile.version_before,
                reconcile.version_after,
                reconcile.added.len()
            );
        }
        Ok(Self {
            store: store::Store::new(conn),
            reconcile,
        })
    }
}
