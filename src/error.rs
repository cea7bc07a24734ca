//! # Error Handling for GameStats
//!
//! This module defines the error types used throughout the crate. A single
//! error enum ([`Error`]) represents every failure mode, so callers match on
//! one type no matter which operation failed.
//!
//! ## Rust Pattern: thiserror
//!
//! We use the `thiserror` crate to derive `std::error::Error` implementations.
//! This provides:
//! - Automatic `Display` implementation from the `#[error(...)]` attributes
//! - Automatic `From` implementations from the `#[from]` attributes
//! - Proper error source chaining via `#[source]`
//!
//! ## Error Categories
//!
//! | Category | Variants | Typical Response |
//! |----------|----------|------------------|
//! | Schema | `Schema`, `SchemaMismatch` | Fix the declaration or move the old file |
//! | Write | `Write` | Nothing was stored; retry the whole call if desired |
//! | Query | `UnknownField`, `NotNumeric`, `Query` | Caller bug, fix the request |
//! | Validation | `Validation` | Caller bug, fix the declaration or snapshot |
//! | Internal | `Sqlite`, `Io` | Log and investigate |
//!
//! Every error is returned after the triggering operation's transaction has
//! been rolled back. Nothing is retried internally.

use thiserror::Error;

// =============================================================================
// Error Type
// =============================================================================

/// All errors that can occur in GameStats operations.
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Schema Errors
    // =========================================================================

    /// Creating the stats table failed, or the database layout is unusable.
    ///
    /// When the database file did not exist before the failed attempt, it is
    /// removed again so a half-created file is never left behind.
    #[error("schema error: {0}")]
    Schema(String),

    /// The existing `stats` table does not have the column names and types
    /// the field declaration describes.
    ///
    /// # Recovery
    ///
    /// There is no migration. Either restore the previous declaration or
    /// point the store at a fresh database file.
    #[error("schema mismatch: expected columns {expected:?}, but the table has {found:?}")]
    SchemaMismatch {
        /// `name TYPE` of each column the declaration implies, in order.
        expected: Vec<String>,
        /// `name TYPE` of each column in the existing table, in order.
        found: Vec<String>,
    },

    // =========================================================================
    // Write Errors
    // =========================================================================

    /// Inserting a record failed. The transaction was rolled back, so rows
    /// written before this call are unaffected and no partial row exists.
    #[error("write failed: {0}")]
    Write(#[source] rusqlite::Error),

    // =========================================================================
    // Query Errors
    // =========================================================================

    /// A ranking query named a field that is not part of the declaration.
    #[error("unknown stat field '{0}'")]
    UnknownField(String),

    /// A numeric comparison was requested on a field that is not numeric.
    #[error("stat field '{0}' is not numeric")]
    NotNumeric(String),

    /// A raw query was rejected before reaching the database.
    #[error("query rejected: {0}")]
    Query(String),

    // =========================================================================
    // Validation Errors
    // =========================================================================

    /// A field declaration or a host snapshot broke the record contract.
    ///
    /// # When This Happens
    ///
    /// - A field name is not a plain identifier, or is reserved
    /// - The same field is declared twice
    /// - A snapshot is missing a declared field, carries an extra one, or
    ///   carries a value of the wrong kind
    #[error("validation error: {0}")]
    Validation(String),

    // =========================================================================
    // Internal Errors
    // =========================================================================

    /// Any other SQLite failure: opening the file, reading rows, committing.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Creating the stats directory failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Wraps a SQLite failure raised while creating the schema.
    pub(crate) fn schema(err: rusqlite::Error) -> Self {
        Error::Schema(err.to_string())
    }

    /// Returns `true` for errors caused by the caller's request rather than
    /// by the database.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Error::UnknownField(_) | Error::NotNumeric(_) | Error::Query(_) | Error::Validation(_)
        )
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// A `Result` type alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

// =============================================================================
// Tests
// =============================================================================
