//! Record store contracts and SQLite implementations.
//!
//! # Responsibility
//! - Define the lookups and the compare-and-write primitive the lock
//!   protocol depends on.
//! - Keep SQL details out of service orchestration.
//!
//! # Invariants
//! - Write paths validate models before SQL mutations.
//! - Article writes that change lock fields are conditioned on the prior
//!   lock snapshot; a mismatch is reported as `WriteConflict`, never applied.

use rusqlite::Connection;

pub mod article_repo;
pub mod error;
pub mod user_repo;

pub use error::{RepoError, RepoResult};

/// Fails with `MissingRequiredTable` unless every table exists.
pub(crate) fn ensure_tables(conn: &Connection, tables: &[&'static str]) -> RepoResult<()> {
    for table in tables {
        let exists: i64 = conn.query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table],
            |row| row.get(0),
        )?;
        if exists != 1 {
            return Err(RepoError::MissingRequiredTable(table));
        }
    }
    Ok(())
}
