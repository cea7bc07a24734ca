//! # Stats Reader
//!
//! Direct read functions over a borrowed SQLite connection. Both the
//! per-operation [`StatsStore`](crate::StatsStore) methods and the scoped
//! [`Batch`](crate::store::Batch) call into these, so a query behaves the
//! same whether or not it shares a transaction with other work.
//!
//! ## Injection Safety
//!
//! ```text
//! SELECT username, date, score FROM stats WHERE username = ? ORDER BY score DESC LIMIT ?
//!                        ^^^^^                         ^              ^^^^^            ^
//!                        FieldName (validated)         bound          FieldName        bound
//! ```
//!
//! Identifiers come only from a [`FieldDeclaration`], whose names passed the
//! allow-list check in [`FieldName::new`](crate::types::FieldName::new).
//! Every value (usernames, dates, limits) is a bound parameter. The one
//! exception is [`execute_raw`], which runs caller-supplied SQL as is.
//!
//! ## Ordering
//!
//! Ranking ties are broken by insertion order (`rowid` ascending), so
//! repeated calls return the same rows in the same order.

use chrono::NaiveDate;
use rusqlite::{Connection, ToSql};
use tracing::debug;

use crate::schema::TABLE_NAME;
use crate::types::{
    DailyBest, DayBest, FieldDeclaration, Record, Row, StatKind, StatValue, UserBest,
    DATE_COLUMN, USERNAME_COLUMN,
};
use crate::{Error, Result};

// =============================================================================
// Filters
// =============================================================================

/// Equality predicates on the fixed columns.
///
/// # Example
///
/// ```rust
/// use chrono::NaiveDate;
/// use gamestats::reader::RecordFilter;
///
/// let day = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
/// let filter = RecordFilter::any().user("alice").date(day);
/// assert_eq!(filter.username.as_deref(), Some("alice"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFilter {
    pub username: Option<String>,
    pub date: Option<NaiveDate>,
}

impl RecordFilter {
    /// Matches every record.
    pub fn any() -> Self {
        Self::default()
    }

    pub fn user(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    /// Builds the `WHERE` clause (possibly empty) and its bound values.
    fn where_clause(&self) -> (String, Vec<&dyn ToSql>) {
        let mut predicates = Vec::new();
        let mut params: Vec<&dyn ToSql> = Vec::new();

        if let Some(username) = &self.username {
            predicates.push(format!("{USERNAME_COLUMN} = ?"));
            params.push(username);
        }
        if let Some(date) = &self.date {
            predicates.push(format!("{DATE_COLUMN} = ?"));
            params.push(date);
        }

        if predicates.is_empty() {
            (String::new(), params)
        } else {
            (format!(" WHERE {}", predicates.join(" AND ")), params)
        }
    }
}

// =============================================================================
// Row Decoding
// =============================================================================

/// `username, date, <fields...>` in declaration order.
fn select_list(decl: &FieldDeclaration) -> String {
    decl.column_names().join(", ")
}

fn column_value(
    row: &rusqlite::Row<'_>,
    idx: usize,
    kind: Option<StatKind>,
) -> rusqlite::Result<StatValue> {
    let value = row.get_ref(idx)?;
    StatValue::from_column(value, kind)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, value.data_type(), Box::new(e)))
}

fn decode_record(row: &rusqlite::Row<'_>, decl: &FieldDeclaration) -> rusqlite::Result<Record> {
    let username: String = row.get(0)?;
    let date: NaiveDate = row.get(1)?;

    let mut values = Vec::with_capacity(decl.len());
    for (i, (name, kind)) in decl.iter().enumerate() {
        values.push((name.to_string(), column_value(row, i + 2, Some(kind))?));
    }

    Ok(Record {
        username,
        date,
        values,
    })
}

fn collect_records(
    conn: &Connection,
    decl: &FieldDeclaration,
    sql: &str,
    params: &[&dyn ToSql],
) -> Result<Vec<Record>> {
    let mut stmt = conn.prepare(sql)?;
    let records = stmt
        .query_map(params, |row| decode_record(row, decl))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    debug!(rows = records.len(), "read stats records");
    Ok(records)
}

// =============================================================================
// Direct Read Functions
// =============================================================================

/// Reads every record matching `filter`, in insertion order.
///
/// Returns an empty vec when nothing matches.
pub fn read_records(
    conn: &Connection,
    decl: &FieldDeclaration,
    filter: &RecordFilter,
) -> Result<Vec<Record>> {
    let (where_clause, params) = filter.where_clause();
    let sql = format!(
        "SELECT {} FROM {TABLE_NAME}{where_clause} ORDER BY rowid",
        select_list(decl)
    );
    collect_records(conn, decl, &sql, &params)
}

/// Reads the `limit` records matching `filter` with the highest `field`.
///
/// # Ordering
///
/// `field` descending (NULLs last), then insertion order.
///
/// # Errors
///
/// `Error::UnknownField` if `field` is not declared.
pub fn read_top(
    conn: &Connection,
    decl: &FieldDeclaration,
    filter: &RecordFilter,
    field: &str,
    limit: usize,
) -> Result<Vec<Record>> {
    let (name, _) = decl.resolve(field)?;
    let limit = sql_limit(limit);
    let (where_clause, mut params) = filter.where_clause();
    params.push(&limit);

    let sql = format!(
        "SELECT {} FROM {TABLE_NAME}{where_clause} ORDER BY {name} DESC, rowid ASC LIMIT ?",
        select_list(decl)
    );
    collect_records(conn, decl, &sql, &params)
}

/// Finds who held the best `field` value on the earliest day on or after
/// `first_day`.
///
/// # Algorithm
///
/// ```text
/// mud: per (username, date) → max(field), and the row that reached it
/// md:  per date             → max(field)
/// join mud ⋈ md on (date, max) → keep the earliest date
/// ```
///
/// Joining per-user maxima against per-day maxima attributes the winning
/// value to a real row and user. When several users tie on the winning value,
/// the one whose row was inserted first wins.
///
/// Returns at most one element.
pub fn first_per_date(
    conn: &Connection,
    decl: &FieldDeclaration,
    field: &str,
    first_day: NaiveDate,
) -> Result<Vec<DailyBest>> {
    let (name, kind) = decl.resolve(field)?;

    // With a single MAX() aggregate, SQLite takes the bare `rowid` from the
    // row holding the maximum.
    let sql = format!(
        "SELECT mud.username, mud.date, mud.mx
         FROM (
             SELECT {USERNAME_COLUMN}, {DATE_COLUMN}, MAX({name}) AS mx, rowid AS row_id
             FROM {TABLE_NAME}
             WHERE {DATE_COLUMN} >= ?1
             GROUP BY {USERNAME_COLUMN}, {DATE_COLUMN}
         ) AS mud
         JOIN (
             SELECT {DATE_COLUMN}, MAX({name}) AS mx
             FROM {TABLE_NAME}
             WHERE {DATE_COLUMN} >= ?1
             GROUP BY {DATE_COLUMN}
         ) AS md
         ON mud.date = md.date AND mud.mx = md.mx
         ORDER BY mud.date, mud.row_id
         LIMIT 1"
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([first_day], |row| {
            Ok(DailyBest {
                username: row.get(0)?,
                date: row.get(1)?,
                best: column_value(row, 2, Some(kind))?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Each user's best `field` value, best first, ties by username.
pub fn top_users(
    conn: &Connection,
    decl: &FieldDeclaration,
    field: &str,
    limit: usize,
) -> Result<Vec<UserBest>> {
    let (name, kind) = decl.resolve(field)?;
    let sql = format!(
        "SELECT {USERNAME_COLUMN}, MAX({name}) AS mx
         FROM {TABLE_NAME}
         GROUP BY {USERNAME_COLUMN}
         ORDER BY mx DESC, {USERNAME_COLUMN} ASC
         LIMIT ?1"
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([sql_limit(limit)], |row| {
            Ok(UserBest {
                username: row.get(0)?,
                best: column_value(row, 1, Some(kind))?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// The best `field` value of every day on or after `first_day`, oldest day
/// first.
///
/// The bound is inclusive (`date >= first_day`), so a trend starting today
/// already has today's point.
pub fn best_per_date(
    conn: &Connection,
    decl: &FieldDeclaration,
    field: &str,
    first_day: NaiveDate,
) -> Result<Vec<DayBest>> {
    let (name, kind) = decl.resolve(field)?;
    let sql = format!(
        "SELECT {DATE_COLUMN}, MAX({name}) AS mx
         FROM {TABLE_NAME}
         WHERE {DATE_COLUMN} >= ?1
         GROUP BY {DATE_COLUMN}
         ORDER BY {DATE_COLUMN}"
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([first_day], |row| {
            Ok(DayBest {
                date: row.get(0)?,
                best: column_value(row, 1, Some(kind))?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Counts the records matching `filter`.
pub fn count_records(conn: &Connection, filter: &RecordFilter) -> Result<u64> {
    let (where_clause, params) = filter.where_clause();
    let sql = format!("SELECT COUNT(*) FROM {TABLE_NAME}{where_clause}");
    let count: i64 = conn.query_row(&sql, &params[..], |row| row.get(0))?;
    Ok(count as u64)
}

/// Runs an arbitrary read-only query and materializes every row.
///
/// No parameters are bound and nothing is escaped. Statements SQLite does not
/// consider read-only are rejected with `Error::Query` before they run.
/// Only the first statement of `sql` is prepared.
pub fn execute_raw(conn: &Connection, sql: &str) -> Result<Vec<Row>> {
    let mut stmt = conn.prepare(sql)?;
    if !stmt.readonly() {
        return Err(Error::Query(format!("not a read-only statement: {sql}")));
    }

    let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let mut rows = stmt.query([])?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let mut columns = Vec::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            columns.push((name.clone(), column_value(row, i, None)?));
        }
        out.push(Row { columns });
    }

    debug!(rows = out.len(), "raw query");
    Ok(out)
}

/// SQLite takes `LIMIT` as a signed integer.
fn sql_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

// =============================================================================
// Tests
// =============================================================================
