//! # Stats Store
//!
//! [`StatsStore`] binds a [`FieldDeclaration`] to one database file and
//! exposes the write and ranking operations.
//!
//! ## Connection Lifecycle
//!
//! No connection is held between calls. Every operation runs the same
//! bracket:
//!
//! ```text
//! open ──► BEGIN ──► work ──┬── Ok  ──► COMMIT   ──┐
//!                           └── Err ──► ROLLBACK ──┴──► close ──► return
//! ```
//!
//! Each call is therefore atomic on its own, and a crash between calls
//! leaves nothing open. The price is one `open` per call, which is fine for a
//! game that stores a row per round.
//!
//! Callers that need several operations in one transaction use
//! [`StatsStore::batch`], which runs a closure inside a single bracket.
//!
//! ## Concurrency
//!
//! The store is synchronous and takes `&self` everywhere. Locking against
//! other processes touching the same file is left to SQLite; the store only
//! sets a busy timeout (see [`StoreConfig`]).

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use rusqlite::{Connection, ToSql};
use tracing::{debug, warn};

use crate::config::StoreConfig;
use crate::reader::{self, RecordFilter};
use crate::schema::{ensure_schema_with_timeout, open_connection, TABLE_NAME};
use crate::types::{
    DailyBest, DayBest, FieldDeclaration, Record, Row, Snapshot, StatSource, UserBest,
};
use crate::{Error, Result};

// =============================================================================
// Stats Store
// =============================================================================

/// A stats table in one SQLite file.
///
/// # Example
///
/// ```rust,no_run
/// use gamestats::types::{FieldDeclaration, Snapshot, StatKind};
/// use gamestats::StatsStore;
///
/// let decl = FieldDeclaration::new([("score", StatKind::Integer)])?;
/// let store = StatsStore::open(".gamestats/stats.sqlite", decl)?;
///
/// store.append("alice", &Snapshot::from([("score".to_string(), 7.into())]))?;
///
/// let best = store.top_by_stat("score", 1)?;
/// println!("high score: {:?} by {}", best[0].get("score"), best[0].username);
/// # Ok::<(), gamestats::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct StatsStore {
    path: PathBuf,
    decl: FieldDeclaration,
    config: StoreConfig,
    /// `INSERT INTO stats (username, date, ...) VALUES (?, ?, ...)`, built
    /// once from the declaration.
    insert_sql: String,
}

impl StatsStore {
    /// Opens (creating if needed) the stats database at `path`.
    ///
    /// # Errors
    ///
    /// See [`ensure_schema`](crate::schema::ensure_schema).
    pub fn open(path: impl AsRef<Path>, decl: FieldDeclaration) -> Result<Self> {
        Self::open_with_config(path, decl, StoreConfig::default())
    }

    pub fn open_with_config(
        path: impl AsRef<Path>,
        decl: FieldDeclaration,
        config: StoreConfig,
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        ensure_schema_with_timeout(&decl, &path, config.busy_timeout)?;

        let insert_sql = insert_sql(&decl);
        debug!(path = %path.display(), fields = decl.len(), "opened stats store");

        Ok(Self {
            path,
            decl,
            config,
            insert_sql,
        })
    }

    /// Opens the store in the conventional location beside the host's data:
    /// `base_dir/<config.dir_name>/<config.file_name>`.
    pub fn open_in(
        base_dir: impl AsRef<Path>,
        decl: FieldDeclaration,
        config: StoreConfig,
    ) -> Result<Self> {
        let path = config.database_path(base_dir);
        Self::open_with_config(path, decl, config)
    }

    /// Opens the store after checking that `source` supplies every declared
    /// field with a value of the declared kind.
    ///
    /// # Errors
    ///
    /// `Error::Validation` if the host's snapshot doesn't match `decl`.
    /// Nothing is created on disk in that case.
    pub fn with_source(
        path: impl AsRef<Path>,
        decl: FieldDeclaration,
        source: &impl StatSource,
    ) -> Result<Self> {
        decl.check_snapshot(&source.snapshot())?;
        Self::open(path, decl)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The field declaration this store was opened with.
    pub fn fields(&self) -> &FieldDeclaration {
        &self.decl
    }

    // =========================================================================
    // Connection Bracket
    // =========================================================================

    /// Runs `work` inside one connection and one transaction.
    ///
    /// Commits when `work` returns `Ok`, rolls back when it returns `Err`,
    /// and closes the connection on both paths. The error from `work` is
    /// what the caller sees even if the rollback itself fails.
    fn with_connection<T>(
        &self,
        op: &'static str,
        work: impl FnOnce(&Connection) -> Result<T>,
    ) -> Result<T> {
        let mut conn = open_connection(&self.path, self.config.busy_timeout)?;

        let outcome = match conn.transaction() {
            Ok(tx) => match work(&tx) {
                Ok(value) => tx.commit().map(|()| value).map_err(Error::from),
                Err(e) => {
                    if let Err(rollback) = tx.rollback() {
                        warn!(op, error = %rollback, "rollback failed");
                    }
                    debug!(op, error = %e, "operation rolled back");
                    Err(e)
                }
            },
            Err(e) => Err(Error::from(e)),
        };

        if let Err((_, e)) = conn.close() {
            warn!(op, error = %e, "closing connection failed");
        }
        outcome
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Appends one record for `username`, dated today (local time).
    ///
    /// `values` must contain exactly the declared fields.
    ///
    /// # Errors
    ///
    /// - `Error::Validation` if `values` is missing a field, has an extra
    ///   one, or holds a value of the wrong kind
    /// - `Error::Write` if the insert fails
    ///
    /// Either way nothing is written.
    pub fn append(&self, username: &str, values: &Snapshot) -> Result<()> {
        self.append_dated(username, today(), values)
    }

    /// Appends one record under an explicit date, e.g. when importing
    /// history.
    pub fn append_dated(&self, username: &str, date: NaiveDate, values: &Snapshot) -> Result<()> {
        self.with_connection("append", |conn| {
            insert_record(conn, &self.decl, &self.insert_sql, username, date, values)
        })
    }

    /// Reads the host's current values and appends them for `username`.
    pub fn record(&self, username: &str, source: &impl StatSource) -> Result<()> {
        self.append(username, &source.snapshot())
    }

    // =========================================================================
    // Filtered Reads
    // =========================================================================

    /// Every record, in insertion order.
    pub fn all(&self) -> Result<Vec<Record>> {
        self.query(&RecordFilter::any())
    }

    pub fn all_by_user(&self, username: &str) -> Result<Vec<Record>> {
        self.query(&RecordFilter::any().user(username))
    }

    pub fn all_on_date(&self, date: NaiveDate) -> Result<Vec<Record>> {
        self.query(&RecordFilter::any().date(date))
    }

    pub fn by_user_on_date(&self, username: &str, date: NaiveDate) -> Result<Vec<Record>> {
        self.query(&RecordFilter::any().user(username).date(date))
    }

    /// Every record matching `filter`, in insertion order.
    pub fn query(&self, filter: &RecordFilter) -> Result<Vec<Record>> {
        self.with_connection("query", |conn| {
            reader::read_records(conn, &self.decl, filter)
        })
    }

    /// Number of records matching `filter`.
    pub fn count(&self, filter: &RecordFilter) -> Result<u64> {
        self.with_connection("count", |conn| reader::count_records(conn, filter))
    }

    // =========================================================================
    // Ranking Queries
    // =========================================================================
    // All rankings order by the field descending, then by insertion order.
    // An empty result is an empty vec, never an error. Pass `limit = 1` for
    // the single best record.

    /// The `limit` best records of all time.
    pub fn top_by_stat(&self, field: &str, limit: usize) -> Result<Vec<Record>> {
        self.top(&RecordFilter::any(), field, limit)
    }

    /// The `limit` best records on `date`.
    pub fn top_by_stat_on_date(
        &self,
        date: NaiveDate,
        field: &str,
        limit: usize,
    ) -> Result<Vec<Record>> {
        self.top(&RecordFilter::any().date(date), field, limit)
    }

    /// The `limit` best records of one user.
    pub fn top_by_stat_by_user(
        &self,
        username: &str,
        field: &str,
        limit: usize,
    ) -> Result<Vec<Record>> {
        self.top(&RecordFilter::any().user(username), field, limit)
    }

    /// The `limit` best records of one user on `date`.
    pub fn top_by_stat_by_user_on_date(
        &self,
        username: &str,
        date: NaiveDate,
        field: &str,
        limit: usize,
    ) -> Result<Vec<Record>> {
        self.top(&RecordFilter::any().user(username).date(date), field, limit)
    }

    /// The `limit` best records matching an arbitrary filter.
    pub fn top(&self, filter: &RecordFilter, field: &str, limit: usize) -> Result<Vec<Record>> {
        self.with_connection("top", |conn| {
            reader::read_top(conn, &self.decl, filter, field, limit)
        })
    }

    /// Who held the best `field` value on the earliest day on or after
    /// `first_day`. At most one element.
    pub fn first_per_date(&self, field: &str, first_day: NaiveDate) -> Result<Vec<DailyBest>> {
        self.with_connection("first_per_date", |conn| {
            reader::first_per_date(conn, &self.decl, field, first_day)
        })
    }

    /// Leaderboard: each user's best `field` value, best first.
    pub fn top_users(&self, field: &str, limit: usize) -> Result<Vec<UserBest>> {
        self.with_connection("top_users", |conn| {
            reader::top_users(conn, &self.decl, field, limit)
        })
    }

    /// Trend: the best `field` value of each day on or after `first_day`.
    pub fn best_per_date(&self, field: &str, first_day: NaiveDate) -> Result<Vec<DayBest>> {
        self.with_connection("best_per_date", |conn| {
            reader::best_per_date(conn, &self.decl, field, first_day)
        })
    }

    // =========================================================================
    // Escape Hatch
    // =========================================================================

    /// Runs caller-written read-only SQL.
    ///
    /// Nothing is bound or escaped: the caller owns injection safety.
    /// Statements that could modify the database are rejected with
    /// `Error::Query`.
    pub fn execute(&self, sql: &str) -> Result<Vec<Row>> {
        self.with_connection("execute", |conn| reader::execute_raw(conn, sql))
    }

    // =========================================================================
    // Batches
    // =========================================================================

    /// Runs several operations in a single transaction.
    ///
    /// Commits if `work` returns `Ok`; rolls everything back if it returns
    /// `Err`.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// # use gamestats::types::{FieldDeclaration, Snapshot, StatKind};
    /// # use gamestats::StatsStore;
    /// # let decl = FieldDeclaration::new([("score", StatKind::Integer)])?;
    /// # let store = StatsStore::open("stats.sqlite", decl)?;
    /// let left = Snapshot::from([("score".to_string(), 3.into())]);
    /// let right = Snapshot::from([("score".to_string(), 5.into())]);
    ///
    /// // Both players' rows land together or not at all.
    /// store.batch(|b| {
    ///     b.append("left", &left)?;
    ///     b.append("right", &right)
    /// })?;
    /// # Ok::<(), gamestats::Error>(())
    /// ```
    pub fn batch<T>(&self, work: impl FnOnce(&Batch<'_>) -> Result<T>) -> Result<T> {
        self.with_connection("batch", |conn| work(&Batch { conn, store: self }))
    }
}

// =============================================================================
// Batch
// =============================================================================

/// Operations sharing one open transaction. See [`StatsStore::batch`].
pub struct Batch<'a> {
    conn: &'a Connection,
    store: &'a StatsStore,
}

impl Batch<'_> {
    pub fn append(&self, username: &str, values: &Snapshot) -> Result<()> {
        self.append_dated(username, today(), values)
    }

    pub fn append_dated(&self, username: &str, date: NaiveDate, values: &Snapshot) -> Result<()> {
        insert_record(
            self.conn,
            &self.store.decl,
            &self.store.insert_sql,
            username,
            date,
            values,
        )
    }

    pub fn record(&self, username: &str, source: &impl StatSource) -> Result<()> {
        self.append(username, &source.snapshot())
    }

    pub fn query(&self, filter: &RecordFilter) -> Result<Vec<Record>> {
        reader::read_records(self.conn, &self.store.decl, filter)
    }

    pub fn count(&self, filter: &RecordFilter) -> Result<u64> {
        reader::count_records(self.conn, filter)
    }

    pub fn top(&self, filter: &RecordFilter, field: &str, limit: usize) -> Result<Vec<Record>> {
        reader::read_top(self.conn, &self.store.decl, filter, field, limit)
    }

    pub fn first_per_date(&self, field: &str, first_day: NaiveDate) -> Result<Vec<DailyBest>> {
        reader::first_per_date(self.conn, &self.store.decl, field, first_day)
    }

    pub fn top_users(&self, field: &str, limit: usize) -> Result<Vec<UserBest>> {
        reader::top_users(self.conn, &self.store.decl, field, limit)
    }

    pub fn best_per_date(&self, field: &str, first_day: NaiveDate) -> Result<Vec<DayBest>> {
        reader::best_per_date(self.conn, &self.store.decl, field, first_day)
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// The current local calendar date.
pub(crate) fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

fn insert_sql(decl: &FieldDeclaration) -> String {
    let columns = decl.column_names();
    let placeholders = vec!["?"; columns.len()].join(", ");
    format!(
        "INSERT INTO {TABLE_NAME} ({}) VALUES ({placeholders})",
        columns.join(", ")
    )
}

/// Inserts one row, binding values positionally in declaration order.
fn insert_record(
    conn: &Connection,
    decl: &FieldDeclaration,
    insert_sql: &str,
    username: &str,
    date: NaiveDate,
    values: &Snapshot,
) -> Result<()> {
    let ordered = decl.ordered_values(values)?;

    let mut params: Vec<&dyn ToSql> = Vec::with_capacity(ordered.len() + 2);
    params.push(&username);
    params.push(&date);
    params.extend(ordered.into_iter().map(|v| v as &dyn ToSql));

    conn.execute(insert_sql, &params[..]).map_err(Error::Write)?;
    debug!(username, %date, "appended stats record");
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{StatKind, StatValue};

    fn decl() -> FieldDeclaration {
        FieldDeclaration::new([("score", StatKind::Integer), ("dist", StatKind::Real)]).unwrap()
    }

    fn snap(score: i64, dist: f64) -> Snapshot {
        Snapshot::from([
            ("score".to_string(), score.into()),
            ("dist".to_string(), dist.into()),
        ])
    }

    fn temp_store() -> (tempfile::TempDir, StatsStore) {
        let dir = tempfile::tempdir().expect("should create temp dir");
        let store = StatsStore::open(dir.path().join("stats.sqlite"), decl()).expect("open store");
        (dir, store)
    }

    #[test]
    fn test_insert_sql() {
        assert_eq!(
            insert_sql(&decl()),
            "INSERT INTO stats (username, date, score, dist) VALUES (?, ?, ?, ?)"
        );
    }

    #[test]
    fn test_append_and_read_back() {
        let (_dir, store) = temp_store();
        store.append("alice", &snap(7, 1.5)).unwrap();

        let rows = store.all_by_user("alice").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].date, today());
        assert_eq!(rows[0].get("score"), Some(&StatValue::Integer(7)));
        assert_eq!(rows[0].get("dist"), Some(&StatValue::Real(1.5)));
    }

    #[test]
    fn test_failed_append_writes_nothing() {
        let (_dir, store) = temp_store();
        store.append("alice", &snap(1, 1.0)).unwrap();

        let bad = Snapshot::from([("score".to_string(), "lots".into()), ("dist".to_string(), 0.into())]);
        assert!(store.append("alice", &bad).is_err());

        assert_eq!(store.count(&RecordFilter::any()).unwrap(), 1);
    }

    #[test]
    fn test_batch_commits_together() {
        let (_dir, store) = temp_store();
        let total = store
            .batch(|b| {
                b.append("left", &snap(3, 0.0))?;
                b.append("right", &snap(5, 0.0))?;
                b.count(&RecordFilter::any())
            })
            .unwrap();

        assert_eq!(total, 2);
        assert_eq!(store.all().unwrap().len(), 2);
    }

    #[test]
    fn test_batch_rolls_back_on_error() {
        let (_dir, store) = temp_store();
        let result = store.batch(|b| {
            b.append("left", &snap(3, 0.0))?;
            b.top(&RecordFilter::any(), "nope", 1)
        });

        assert!(matches!(result, Err(Error::UnknownField(_))));
        assert!(store.all().unwrap().is_empty());
    }

    #[test]
    fn test_with_source_validates_host() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.sqlite");

        let host = Snapshot::from([("score".to_string(), 1.into())]);
        let err = StatsStore::with_source(&path, decl(), &host).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(!path.exists());

        let host = snap(1, 2.0);
        let store = StatsStore::with_source(&path, decl(), &host).unwrap();
        store.record("bob", &host).unwrap();
        assert_eq!(store.all().unwrap()[0].username, "bob");
    }
}
