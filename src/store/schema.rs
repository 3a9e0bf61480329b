// src/store/schema.rs — Versioned schema descriptors + additive reconciliation
//
// There are no migration scripts. Each table is created with its original
// column set and every column added since is listed with the schema version
// that introduced it. On open, any expected column missing from the persisted
// table is added as a nullable column. Nothing is dropped, renamed or retyped.

use rusqlite::Connection;
use tracing::{info, warn};

use crate::infra::errors::PipelineError;

/// Bump when a column is appended to a descriptor below.
pub const SCHEMA_VERSION: u32 = 3;

#[derive(Debug, Clone, Copy)]
pub struct ColumnDef {
    pub name: &'static str,
    pub sql_type: &'static str,
    pub since: u32,
}

const fn col(name: &'static str, sql_type: &'static str, since: u32) -> ColumnDef {
    ColumnDef {
        name,
        sql_type,
        since,
    }
}

#[derive(Debug)]
pub struct TableSchema {
    pub name: &'static str,
    /// DDL for the version-1 shape of the table.
    pub create: &'static str,
    /// Columns appended after version 1, in the order they were introduced.
    pub added: &'static [ColumnDef],
    /// Index DDL, run after columns are reconciled.
    pub indexes: &'static [&'static str],
    /// Columns that must not carry a UNIQUE constraint on their own.
    pub not_unique_alone: &'static [&'static str],
}

pub const PAIR_ARGUMENTS: TableSchema = TableSchema {
    name: "pair_arguments",
    create: "CREATE TABLE IF NOT EXISTS pair_arguments (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        psalm_x INTEGER NOT NULL,
        psalm_y INTEGER NOT NULL,
        prompt TEXT NOT NULL,
        response_text TEXT NOT NULL,
        response_json TEXT NOT NULL,
        model TEXT NOT NULL,
        created_at TEXT NOT NULL,
        UNIQUE (psalm_x, psalm_y)
    );",
    added: &[
        col("total_tokens", "INTEGER", 2),
        col("reasoning_tokens", "INTEGER", 2),
        col("non_reasoning_tokens", "INTEGER", 2),
    ],
    indexes: &[],
    not_unique_alone: &[],
};

pub const PAIR_EVALUATIONS: TableSchema = TableSchema {
    name: "pair_evaluations",
    create: "CREATE TABLE IF NOT EXISTS pair_evaluations (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        pair_id INTEGER NOT NULL,
        score REAL NOT NULL,
        justification TEXT NOT NULL,
        evaluator_model TEXT NOT NULL,
        evaluation_json TEXT NOT NULL,
        created_at TEXT NOT NULL,
        FOREIGN KEY(pair_id) REFERENCES pair_arguments(id) ON DELETE CASCADE
    );",
    added: &[
        col("evaluator_version", "INTEGER", 2),
        col("checks_json", "TEXT", 2),
        col("flags_json", "TEXT", 2),
        col("vocabulary_specificity", "REAL", 2),
        col("total_tokens", "INTEGER", 2),
        col("reasoning_tokens", "INTEGER", 2),
        col("non_reasoning_tokens", "INTEGER", 2),
        col("key_order", "TEXT", 3),
    ],
    indexes: &[
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_pair_evaluations_pair_version
         ON pair_evaluations (pair_id, evaluator_version)",
    ],
    // One record per argument would block every later rubric version.
    not_unique_alone: &["pair_id"],
};

pub const TABLES: &[&TableSchema] = &[&PAIR_ARGUMENTS, &PAIR_EVALUATIONS];

/// What a reconciliation pass changed.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    pub version_before: u32,
    pub version_after: u32,
    /// `(table, column)` for every column added in this pass.
    pub added: Vec<(String, String)>,
}

/// Bring the persisted schema up to the descriptors above. Idempotent.
pub fn reconcile(conn: &Connection) -> Result<ReconcileReport, PipelineError> {
    let version_before = user_version(conn)?;
    if version_before > SCHEMA_VERSION {
        warn!(
            "Store schema v{} is newer than this build (v{}); continuing with known columns",
            version_before, SCHEMA_VERSION
        );
    }

    let mut added = Vec::new();
    let tx = conn.unchecked_transaction()?;

    for table in TABLES {
        tx.execute_batch(table.create)
            .map_err(|e| schema_error(table.name, "*", e))?;

        for column in table.not_unique_alone {
            if let Some(index) = single_column_unique_index(&tx, table.name, column)? {
                return Err(PipelineError::IncompatibleSchema {
                    table: table.name.to_string(),
                    message: format!(
                        "UNIQUE constraint on {column} alone (index {index}) allows one \
                         evaluation per argument, so records from a later rubric version \
                         cannot be stored; rebuild the table without that constraint"
                    ),
                });
            }
        }

        let existing = table_columns(&tx, table.name)?;
        for column in table.added {
            if existing.iter().any(|c| c == column.name) {
                continue;
            }
            let sql = format!(
                "ALTER TABLE {} ADD COLUMN {} {}",
                table.name, column.name, column.sql_type
            );
            tx.execute(&sql, [])
                .map_err(|e| schema_error(table.name, column.name, e))?;
            info!(
                "Added column {}.{} (schema v{})",
                table.name, column.name, column.since
            );
            added.push((table.name.to_string(), column.name.to_string()));
        }

        for index in table.indexes {
            tx.execute_batch(index)
                .map_err(|e| schema_error(table.name, "index", e))?;
        }
    }

    let version_after = version_before.max(SCHEMA_VERSION);
    tx.pragma_update(None, "user_version", version_after)
        .map_err(|e| schema_error("pragma", "user_version", e))?;
    tx.commit()?;

    Ok(ReconcileReport {
        version_before,
        version_after,
        added,
    })
}

/// Column names of `table` in declaration order.
pub fn table_columns(conn: &Connection, table: &str) -> Result<Vec<String>, PipelineError> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(1))?;
    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

/// Name of a UNIQUE index (declared or implicit) covering exactly `column`.
pub fn single_column_unique_index(
    conn: &Connection,
    table: &str,
    column: &str,
) -> Result<Option<String>, PipelineError> {
    let mut stmt = conn.prepare(&format!("PRAGMA index_list({})", table))?;
    let indexes = stmt
        .query_map([], |row| Ok((row.get::<_, String>(1)?, row.get::<_, bool>(2)?)))?
        .collect::<Result<Vec<_>, _>>()?;

    for (name, unique) in indexes {
        if !unique {
            continue;
        }
        let mut info = conn.prepare(&format!("PRAGMA index_info(\"{}\")", name))?;
        let columns = info
            .query_map([], |row| row.get::<_, Option<String>>(2))?
            .collect::<Result<Vec<_>, _>>()?;
        if columns.len() == 1 && columns[0].as_deref() == Some(column) {
            return Ok(Some(name));
        }
    }
    Ok(None)
}

pub fn user_version(conn: &Connection) -> Result<u32, PipelineError> {
    Ok(conn.query_row("PRAGMA user_version", [], |r| r.get(0))?)
}

fn schema_error(table: &str, column: &str, source: rusqlite::Error) -> PipelineError {
    PipelineError::Schema {
        table: table.to_string(),
        column: column.to_string(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_store_gets_every_column() {
        let conn = Connection::open_in_memory().unwrap();
        let report = reconcile(&conn).unwrap();

        assert_eq!(report.version_before, 0);
        assert_eq!(report.version_after, SCHEMA_VERSION);
        assert_eq!(
            report.added.len(),
            PAIR_ARGUMENTS.added.len() + PAIR_EVALUATIONS.added.len()
        );

        let cols = table_columns(&conn, "pair_evaluations").unwrap();
        assert!(cols.contains(&"evaluator_version".to_string()));
        assert!(cols.contains(&"key_order".to_string()));
    }

    #[test]
    fn test_reconcile_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        reconcile(&conn).unwrap();
        let before = table_columns(&conn, "pair_arguments").unwrap();

        let second = reconcile(&conn).unwrap();
        assert!(second.added.is_empty());
        assert_eq!(second.version_before, SCHEMA_VERSION);
        assert_eq!(table_columns(&conn, "pair_arguments").unwrap(), before);
    }

    #[test]
    fn test_newer_user_version_is_not_lowered() {
        let conn = Connection::open_in_memory().unwrap();
        conn.pragma_update(None, "user_version", SCHEMA_VERSION + 4)
            .unwrap();
        let report = reconcile(&conn).unwrap();
        assert_eq!(report.version_after, SCHEMA_VERSION + 4);
        assert_eq!(user_version(&conn).unwrap(), SCHEMA_VERSION + 4);
    }

    #[test]
    fn test_descriptor_versions_are_bounded() {
        for table in TABLES {
            for column in table.added {
                assert!(column.since >= 2 && column.since <= SCHEMA_VERSION);
            }
        }
    }

    #[test]
    fn test_unique_evaluation_per_argument_is_refused() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE pair_evaluations (
                 id INTEGER PRIMARY KEY AUTOINCREMENT,
                 pair_id INTEGER NOT NULL,
                 score REAL NOT NULL,
                 justification TEXT NOT NULL,
                 evaluator_model TEXT NOT NULL,
                 evaluation_json TEXT NOT NULL,
                 created_at TEXT NOT NULL,
                 UNIQUE (pair_id)
             );",
        )
        .unwrap();

        let err = reconcile(&conn).unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("UNIQUE constraint on pair_id alone"));

        // Nothing was applied
        assert_eq!(user_version(&conn).unwrap(), 0);
        let cols = table_columns(&conn, "pair_evaluations").unwrap();
        assert!(!cols.contains(&"evaluator_version".to_string()));
    }

    #[test]
    fn test_composite_unique_index_is_accepted() {
        let conn = Connection::open_in_memory().unwrap();
        reconcile(&conn).unwrap();
        assert_eq!(
            single_column_unique_index(&conn, "pair_evaluations", "pair_id").unwrap(),
            None
        );
        assert_eq!(
            single_column_unique_index(&conn, "pair_evaluations", "evaluator_version").unwrap(),
            None
        );
    }
}
