//! Picture table schema.
//!
//! The store has a single schema, tracked by SQLite's `user_version` pragma.
//! A fresh database is created at [`SCHEMA_VERSION`]; a database stamped with a
//! newer version was written by a newer build and is refused.

use picforge_common::{Error, Result};
use rusqlite::Connection;

/// Version stamped into `user_version` once the schema exists.
pub const SCHEMA_VERSION: i64 = 1;

const SCHEMA_SQL: &str = include_str!("schema.sql");

/// Version currently stamped on the database, 0 when it is empty.
pub fn schema_version(conn: &Connection) -> Result<i64> {
    conn.query_row("PRAGMA user_version", [], |row| row.get(0))
        .map_err(|e| Error::database(format!("Failed to read schema version: {}", e)))
}

/// Create the picture tables if the database is still empty.
///
/// Returns `true` when the schema was created by this call.
pub fn ensure_schema(conn: &Connection) -> Result<bool> {
    match schema_version(conn)? {
        0 => {}
        SCHEMA_VERSION => return Ok(false),
        other => {
            return Err(Error::database(format!(
                "Database schema version {} is newer than supported version {}",
                other, SCHEMA_VERSION
            )))
        }
    }

    let tx = conn
        .unchecked_transaction()
        .map_err(|e| Error::database(e.to_string()))?;
    tx.execute_batch(SCHEMA_SQL)
        .and_then(|_| tx.pragma_update(None, "user_version", SCHEMA_VERSION))
        .and_then(|_| tx.commit())
        .map_err(|e| Error::database(format!("Failed to create schema: {}", e)))?;

    tracing::info!("Created picture schema version {}", SCHEMA_VERSION);
    Ok(true)
}
