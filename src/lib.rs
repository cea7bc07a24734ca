//! # GameStats - Per-Session Game Statistics
//!
//! GameStats records one row of statistics per game round (a player name, a
//! date and a set of declared stats) in a small SQLite file, and answers the
//! ranking questions a game asks about them: the all-time high score, a
//! player's personal best, today's best, leaderboards and daily trends.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Host (game session)                         │
//! │          supplies a username and a StatSource snapshot          │
//! └─────────────────────────────┬───────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         StatsStore                              │
//! │        one connection + one transaction per operation           │
//! │                                                                 │
//! │  ┌─────────────┐  ┌─────────────────┐  ┌─────────────────────┐  │
//! │  │   Schema    │  │  Append (bound  │  │  Ranking queries    │  │
//! │  │   Builder   │  │   parameters)   │  │  (reader module)    │  │
//! │  └─────────────┘  └─────────────────┘  └─────────────────────┘  │
//! └─────────────────────────────┬───────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                 SQLite: <dir>/.gamestats/stats.sqlite           │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Core Invariants
//!
//! 1. **Schema matches declaration**: the `stats` table has exactly
//!    `username, date` followed by the declared fields, in order
//! 2. **Injection safety**: values are always bound; the only interpolated
//!    identifiers are validated [`FieldName`]s
//! 3. **All-or-nothing**: every operation commits fully or rolls back fully
//! 4. **No leaked connections**: a connection lives for exactly one operation
//!
//! ## Module Organization
//!
//! - [`error`]: The single error enum
//! - [`types`]: Field declarations, values, the host trait, result rows
//! - [`config`]: Store configuration and file layout
//! - [`schema`]: Table derivation and creation
//! - [`reader`]: SQL for every read
//! - [`store`]: The per-operation connection bracket and public operations
//! - [`feedback`]: High-score verdicts for a finished round

/// Error types for GameStats operations.
pub mod error;

/// Domain types: field declarations, stat values and query results.
pub mod types;

/// Store configuration (directory and file naming, lock wait).
pub mod config;

/// SQLite schema derivation and the one-time table creation.
pub mod schema;

/// Read queries over a borrowed connection.
///
/// Usable directly by callers that manage their own `rusqlite::Connection`.
pub mod reader;

/// The stats store: writes, ranking queries and batches.
pub mod store;

/// High-score feedback for a finished round.
pub mod feedback;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::StoreConfig;
pub use error::{Error, Result};
pub use feedback::{record_session, Achievement};
pub use reader::RecordFilter;
pub use schema::ensure_schema;
pub use store::{Batch, StatsStore};

pub use types::{
    DailyBest, DayBest, FieldDeclaration, FieldName, Record, Row, Snapshot, StatKind,
    StatSource, StatValue, UserBest,
};
