//! Schema migrations keyed on `PRAGMA user_version`.

use crate::error::{Error, Result};
use rusqlite::{Connection, Transaction};
use tracing::info;

const CURRENT_SCHEMA_VERSION: i32 = 1;

/// Bring the schema up to [`CURRENT_SCHEMA_VERSION`] in one transaction.
pub fn run_migrations(conn: &mut Connection) -> Result<()> {
    let mut version: i32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

    if version > CURRENT_SCHEMA_VERSION {
        return Err(Error::Migration {
            message: format!(
                "database version ({version}) is newer than supported schema ({CURRENT_SCHEMA_VERSION})"
            ),
        });
    }

    if version == CURRENT_SCHEMA_VERSION {
        return Ok(());
    }

    let tx = conn.transaction()?;
    while version < CURRENT_SCHEMA_VERSION {
        let next_version = version + 1;
        apply_migration(&tx, next_version)?;
        info!("Applied schema migration v{next_version}");
        version = next_version;
    }

    tx.pragma_update(None, "user_version", CURRENT_SCHEMA_VERSION)?;
    tx.commit()?;
    Ok(())
}

fn apply_migration(tx: &Transaction<'_>, version: i32) -> Result<()> {
    let sql = match version {
        1 => include_str!("schemas/schema_v1.sql"),
        _ => {
            return Err(Error::Migration {
                message: format!("unknown migration target version: {version}"),
            });
        }
    };

    tx.execute_batch(sql).map_err(|e| Error::Migration {
        message: format!("migration to version {version} failed: {e}"),
    })
}
