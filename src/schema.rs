//! # SQLite Schema for GameStats
//!
//! This module derives the `stats` table from a [`FieldDeclaration`] and
//! makes sure it exists in the database file.
//!
//! ## Table Layout
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │ stats                                                     │
//! ├──────────┬──────┬──────────────┬──────────────┬───────────┤
//! │ username │ date │ <field 1>    │ <field 2>    │ ...       │
//! │ TEXT     │ TEXT │ by StatKind  │ by StatKind  │           │
//! └──────────┴──────┴──────────────┴──────────────┴───────────┘
//! ```
//!
//! The two fixed columns lead; declared fields follow in declaration order.
//! Inserts bind values positionally, so that order must never change.
//!
//! ## Type Mapping
//!
//! | StatKind | Column type | Affinity |
//! |----------|-------------|----------|
//! | Integer  | `INTEGER`   | INTEGER  |
//! | Boolean  | `INTEGER`   | INTEGER (0/1) |
//! | Real     | `REAL`      | REAL     |
//! | Text     | `TEXT`      | TEXT     |
//!
//! Booleans lose their type tag on disk. Reads restore it from the
//! declaration.
//!
//! ## Existing Files
//!
//! There are no migrations. If the table already exists, its column names
//! and types must match the declaration exactly (case-insensitively, in
//! order); otherwise [`Error::SchemaMismatch`] is returned and the file is left alone.

use std::fs;
use std::path::Path;
use std::time::Duration;

use rusqlite::Connection;
use tracing::{debug, info, warn};

use crate::config::DEFAULT_BUSY_TIMEOUT_MS;
use crate::types::{FieldDeclaration, StatKind, DATE_COLUMN, USERNAME_COLUMN};
use crate::{Error, Result};

/// Name of the single table every store writes to.
pub const TABLE_NAME: &str = "stats";

// =============================================================================
// DDL Generation
// =============================================================================

/// Maps a stat kind to the SQLite column type that gives it the right
/// affinity.
pub fn column_type(kind: StatKind) -> &'static str {
    match kind {
        StatKind::Integer | StatKind::Boolean => "INTEGER",
        StatKind::Real => "REAL",
        StatKind::Text => "TEXT",
    }
}

/// Builds the `CREATE TABLE` statement for a declaration.
///
/// Field names are interpolated directly; [`FieldName`](crate::types::FieldName)
/// guarantees they are plain identifiers.
pub fn create_table_sql(decl: &FieldDeclaration) -> String {
    let mut columns = vec![
        format!("    {USERNAME_COLUMN} TEXT"),
        format!("    {DATE_COLUMN} TEXT"),
    ];
    columns.extend(
        decl.iter()
            .map(|(name, kind)| format!("    {name} {}", column_type(kind))),
    );
    format!(
        "CREATE TABLE IF NOT EXISTS {TABLE_NAME} (\n{}\n)",
        columns.join(",\n")
    )
}

// =============================================================================
// Connections
// =============================================================================

/// Opens a connection with the store's lock wait applied.
pub(crate) fn open_connection(path: &Path, busy_timeout: Duration) -> Result<Connection> {
    let conn = Connection::open(path)?;
    conn.busy_timeout(busy_timeout)?;
    Ok(conn)
}

// =============================================================================
// Schema Builder
// =============================================================================

/// Makes sure the `stats` table for `decl` exists in the database at `path`.
///
/// # Behavior
///
/// - Creates missing parent directories and the database file.
/// - Creates the table if it is absent.
/// - If the table is present, checks its columns against `decl`.
///
/// Calling this repeatedly with the same declaration is harmless.
///
/// # Errors
///
/// - `Error::Io` if the directory can't be created
/// - `Error::Schema` if the DDL fails; a file created by this call is
///   removed again, so the file is either absent or holds a complete table
/// - `Error::SchemaMismatch` if an existing table has different columns
///
/// # Example
///
/// ```rust,no_run
/// use gamestats::schema::ensure_schema;
/// use gamestats::types::{FieldDeclaration, StatKind};
///
/// let decl = FieldDeclaration::new([("score", StatKind::Integer)])?;
/// ensure_schema(&decl, ".gamestats/stats.sqlite")?;
/// # Ok::<(), gamestats::Error>(())
/// ```
pub fn ensure_schema(decl: &FieldDeclaration, path: impl AsRef<Path>) -> Result<()> {
    ensure_schema_with_timeout(
        decl,
        path.as_ref(),
        Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS),
    )
}

pub(crate) fn ensure_schema_with_timeout(
    decl: &FieldDeclaration,
    path: &Path,
    busy_timeout: Duration,
) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let existed = path.exists();
    let result = open_connection(path, busy_timeout).and_then(|mut conn| {
        let created = create_or_verify(&mut conn, decl)?;
        if let Err((_, e)) = conn.close() {
            warn!(path = %path.display(), error = %e, "closing schema connection failed");
        }
        Ok(created)
    });

    match result {
        Ok(true) => {
            info!(path = %path.display(), fields = decl.len(), "created stats table");
            Ok(())
        }
        Ok(false) => {
            debug!(path = %path.display(), "stats table already present");
            Ok(())
        }
        Err(e) => {
            if !existed && path.exists() {
                if let Err(cleanup) = fs::remove_file(path) {
                    warn!(path = %path.display(), error = %cleanup, "removing half-created database failed");
                }
            }
            Err(e)
        }
    }
}

/// Creates the table or verifies the existing one, inside one transaction.
///
/// Returns `true` if the table was created.
fn create_or_verify(conn: &mut Connection, decl: &FieldDeclaration) -> Result<bool> {
    let tx = conn.transaction().map_err(Error::schema)?;

    let found = existing_columns(&tx)?;
    let created = if found.is_empty() {
        tx.execute_batch(&create_table_sql(decl))
            .map_err(Error::schema)?;
        true
    } else {
        verify_columns(decl, found)?;
        false
    };

    // Dropping `tx` without committing rolls back, so any `?` above leaves
    // no partial table behind.
    tx.commit().map_err(Error::schema)?;
    Ok(created)
}

/// Name and declared type of every column of the existing `stats` table,
/// empty if there is none.
fn existing_columns(conn: &Connection) -> Result<Vec<(String, String)>> {
    let mut stmt = conn
        .prepare(&format!("PRAGMA table_info({TABLE_NAME})"))
        .map_err(Error::schema)?;
    let columns = stmt
        .query_map([], |row| {
            Ok((row.get::<_, String>(1)?, row.get::<_, String>(2)?))
        })
        .map_err(Error::schema)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(Error::schema)?;
    Ok(columns)
}

/// The `(name, type)` pairs `create_table_sql` produces for `decl`.
fn expected_columns(decl: &FieldDeclaration) -> Vec<(String, &'static str)> {
    [(USERNAME_COLUMN, "TEXT"), (DATE_COLUMN, "TEXT")]
        .into_iter()
        .map(|(name, ty)| (name.to_string(), ty))
        .chain(
            decl.iter()
                .map(|(name, kind)| (name.to_string(), column_type(kind))),
        )
        .collect()
}

/// Names and types must both agree, or rankings would silently compare
/// under the wrong affinity.
fn verify_columns(decl: &FieldDeclaration, found: Vec<(String, String)>) -> Result<()> {
    let expected = expected_columns(decl);
    let matches = expected.len() == found.len()
        && expected.iter().zip(&found).all(|((en, et), (fname, ft))| {
            en.eq_ignore_ascii_case(fname) && et.eq_ignore_ascii_case(ft)
        });

    if matches {
        Ok(())
    } else {
        Err(Error::SchemaMismatch {
            expected: expected
                .into_iter()
                .map(|(name, ty)| format!("{name} {ty}"))
                .collect(),
            found: found
                .into_iter()
                .map(|(name, ty)| format!("{name} {ty}"))
                .collect(),
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
