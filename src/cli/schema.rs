// src/cli/schema.rs — Schema status command
//
// Reconciliation runs on every open; this command makes the result visible.

use crate::infra::config::Config;
use crate::store::schema::{self, SCHEMA_VERSION, TABLES};
use crate::store::Database;

pub fn run_schema(config: &Config) -> anyhow::Result<()> {
    let db_path = config.db_path();
    let db = Database::open(&db_path)?;
    let conn = db.store.conn();

    println!("Database: {}", db_path.display());
    println!(
        "Schema version: {} (code expects {})",
        schema::user_version(conn)?,
        SCHEMA_VERSION
    );

    if db.reconcile.added.is_empty() {
        println!("No columns added.");
    } else {
        println!("Added columns:");
        for (table, column) in &db.reconcile.added {
            println!("  + {}.{}", table, column);
        }
    }

    for table in TABLES {
        println!();
        println!("{}:", table.name);
        for column in schema::table_columns(conn, table.name)? {
            println!("  {}", column);
        }
    }
    Ok(())
}
