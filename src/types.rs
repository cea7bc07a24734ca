//! # Domain Types for GameStats
//!
//! This module defines the types that describe what a stats table holds and
//! what queries return.
//!
//! ## Design Philosophy: Validate Once, Trust Afterwards
//!
//! Column names are interpolated into SQL text (SQLite cannot bind
//! identifiers). To keep that safe, every field name is wrapped in a
//! [`FieldName`] newtype that can only be built through an allow-list check:
//!
//! ```text
//! "score"      → FieldName ✓
//! "max_combo2" → FieldName ✓
//! "x; DROP"    → Error::Validation
//! "select"     → Error::Validation (SQL keyword)
//! "username"   → Error::Validation (fixed column)
//! ```
//!
//! After construction, a [`FieldDeclaration`] holds only validated names, so
//! query builders can interpolate them without further escaping. Values are
//! always bound as parameters.
//!
//! ## Host Snapshots
//!
//! The game session (the "host") exposes its current stat values through
//! [`StatSource::snapshot`], a plain name → value map. The store never
//! reaches into the host any other way.

use std::collections::HashMap;
use std::fmt;

use chrono::NaiveDate;
use rusqlite::types::{FromSqlError, ToSqlOutput, ValueRef};
use rusqlite::ToSql;

use crate::{Error, Result};

// =============================================================================
// Fixed Columns
// =============================================================================

/// Name of the fixed column holding the player name.
pub const USERNAME_COLUMN: &str = "username";

/// Name of the fixed column holding the calendar date (`YYYY-MM-DD`).
pub const DATE_COLUMN: &str = "date";

/// Names that would shadow SQLite's implicit row id. Ranking ties are broken
/// by `rowid`, so a declared column must never take one of these names.
const ROWID_ALIASES: &[&str] = &["ROWID", "OID", "_ROWID_"];

/// SQLite keywords, upper-case and sorted for binary search.
///
/// Source: <https://www.sqlite.org/lang_keywords.html>
const SQL_KEYWORDS: &[&str] = &[
    "ABORT", "ACTION", "ADD", "AFTER", "ALL", "ALTER", "ALWAYS", "ANALYZE", "AND", "AS", "ASC",
    "ATTACH", "AUTOINCREMENT", "BEFORE", "BEGIN", "BETWEEN", "BY", "CASCADE", "CASE", "CAST",
    "CHECK", "COLLATE", "COLUMN", "COMMIT", "CONFLICT", "CONSTRAINT", "CREATE", "CROSS",
    "CURRENT", "CURRENT_DATE", "CURRENT_TIME", "CURRENT_TIMESTAMP", "DATABASE", "DEFAULT",
    "DEFERRABLE", "DEFERRED", "DELETE", "DESC", "DETACH", "DISTINCT", "DO", "DROP", "EACH",
    "ELSE", "END", "ESCAPE", "EXCEPT", "EXCLUDE", "EXCLUSIVE", "EXISTS", "EXPLAIN", "FAIL",
    "FILTER", "FIRST", "FOLLOWING", "FOR", "FOREIGN", "FROM", "FULL", "GENERATED", "GLOB",
    "GROUP", "GROUPS", "HAVING", "IF", "IGNORE", "IMMEDIATE", "IN", "INDEX", "INDEXED",
    "INITIALLY", "INNER", "INSERT", "INSTEAD", "INTERSECT", "INTO", "IS", "ISNULL", "JOIN",
    "KEY", "LAST", "LEFT", "LIKE", "LIMIT", "MATCH", "MATERIALIZED", "NATURAL", "NO", "NOT",
    "NOTHING", "NOTNULL", "NULL", "NULLS", "OF", "OFFSET", "ON", "OR", "ORDER", "OTHERS",
    "OUTER", "OVER", "PARTITION", "PLAN", "PRAGMA", "PRECEDING", "PRIMARY", "QUERY", "RAISE",
    "RANGE", "RECURSIVE", "REFERENCES", "REGEXP", "REINDEX", "RELEASE", "RENAME", "REPLACE",
    "RESTRICT", "RETURNING", "RIGHT", "ROLLBACK", "ROW", "ROWS", "SAVEPOINT", "SELECT", "SET",
    "TABLE", "TEMP", "TEMPORARY", "THEN", "TIES", "TO", "TRANSACTION", "TRIGGER", "UNBOUNDED",
    "UNION", "UNIQUE", "UPDATE", "USING", "VACUUM", "VALUES", "VIEW", "VIRTUAL", "WHEN",
    "WHERE", "WINDOW", "WITH", "WITHOUT",
];

// =============================================================================
// Stat Kinds and Values
// =============================================================================

/// The semantic type of a declared stat.
///
/// SQLite has no boolean storage class, so `Boolean` is stored as an integer
/// (0/1). Nothing in the file records that a column was boolean; readers get
/// that back from the [`FieldDeclaration`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatKind {
    Integer,
    Real,
    Text,
    Boolean,
}

impl StatKind {
    /// Returns `true` for kinds that can be ranked numerically.
    pub fn is_numeric(self) -> bool {
        !matches!(self, StatKind::Text)
    }
}

impl fmt::Display for StatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StatKind::Integer => "integer",
            StatKind::Real => "real",
            StatKind::Text => "text",
            StatKind::Boolean => "boolean",
        };
        f.write_str(name)
    }
}

/// A single stat value, as supplied by the host or read back from a row.
#[derive(Debug, Clone, PartialEq)]
pub enum StatValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Boolean(bool),
}

impl StatValue {
    /// Returns `true` if this value may be stored in a column of `kind`.
    ///
    /// `Null` fits any column. Integers fit `Real` columns because REAL
    /// affinity converts them losslessly.
    pub fn fits(&self, kind: StatKind) -> bool {
        matches!(
            (self, kind),
            (StatValue::Null, _)
                | (StatValue::Integer(_), StatKind::Integer)
                | (StatValue::Integer(_), StatKind::Real)
                | (StatValue::Real(_), StatKind::Real)
                | (StatValue::Text(_), StatKind::Text)
                | (StatValue::Boolean(_), StatKind::Boolean)
        )
    }

    /// Numeric view of the value, used for high-score comparisons.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            StatValue::Integer(v) => Some(*v as f64),
            StatValue::Real(v) => Some(*v),
            StatValue::Boolean(v) => Some(if *v { 1.0 } else { 0.0 }),
            StatValue::Null | StatValue::Text(_) => None,
        }
    }

    /// Integer view of the value. Booleans read as 0/1; reals are not
    /// truncated and give `None`.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            StatValue::Integer(v) => Some(*v),
            StatValue::Boolean(v) => Some(i64::from(*v)),
            _ => None,
        }
    }

    /// The text of a `Text` value; `None` for every other variant.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            StatValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, StatValue::Null)
    }

    /// Decodes a column value, using the declared kind (if any) to restore
    /// booleans and to widen integers stored in REAL columns.
    ///
    /// A value whose storage class disagrees with the declaration (possible
    /// when a column's affinity could not convert it) is returned as stored.
    pub(crate) fn from_column(
        value: ValueRef<'_>,
        kind: Option<StatKind>,
    ) -> std::result::Result<Self, FromSqlError> {
        Ok(match (value, kind) {
            (ValueRef::Null, _) => StatValue::Null,
            (ValueRef::Integer(i), Some(StatKind::Boolean)) => StatValue::Boolean(i != 0),
            (ValueRef::Integer(i), Some(StatKind::Real)) => StatValue::Real(i as f64),
            (ValueRef::Integer(i), _) => StatValue::Integer(i),
            (ValueRef::Real(f), _) => StatValue::Real(f),
            (ValueRef::Text(bytes), _) => {
                let text = std::str::from_utf8(bytes).map_err(|e| FromSqlError::Other(Box::new(e)))?;
                StatValue::Text(text.to_string())
            }
            (ValueRef::Blob(_), _) => return Err(FromSqlError::InvalidType),
        })
    }
}

impl ToSql for StatValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            StatValue::Null => ToSqlOutput::from(rusqlite::types::Null),
            StatValue::Integer(v) => ToSqlOutput::from(*v),
            StatValue::Real(v) => ToSqlOutput::from(*v),
            StatValue::Text(s) => ToSqlOutput::from(s.as_str()),
            StatValue::Boolean(v) => ToSqlOutput::from(i64::from(*v)),
        })
    }
}

impl fmt::Display for StatValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatValue::Null => f.write_str("NULL"),
            StatValue::Integer(v) => write!(f, "{v}"),
            StatValue::Real(v) => write!(f, "{v}"),
            StatValue::Text(s) => f.write_str(s),
            StatValue::Boolean(v) => write!(f, "{v}"),
        }
    }
}

impl From<i64> for StatValue {
    fn from(v: i64) -> Self {
        StatValue::Integer(v)
    }
}

impl From<i32> for StatValue {
    fn from(v: i32) -> Self {
        StatValue::Integer(i64::from(v))
    }
}

impl From<u32> for StatValue {
    fn from(v: u32) -> Self {
        StatValue::Integer(i64::from(v))
    }
}

impl From<f64> for StatValue {
    fn from(v: f64) -> Self {
        StatValue::Real(v)
    }
}

impl From<bool> for StatValue {
    fn from(v: bool) -> Self {
        StatValue::Boolean(v)
    }
}

impl From<&str> for StatValue {
    fn from(v: &str) -> Self {
        StatValue::Text(v.to_string())
    }
}

impl From<String> for StatValue {
    fn from(v: String) -> Self {
        StatValue::Text(v)
    }
}

impl<T: Into<StatValue>> From<Option<T>> for StatValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(StatValue::Null, Into::into)
    }
}

// =============================================================================
// Field Names
// =============================================================================

/// A validated stat column name.
///
/// # Rust Pattern: Newtype with Private Constructor
///
/// The inner `String` is private and the only constructor validates, so
/// holding a `FieldName` proves the name is safe to interpolate into SQL.
///
/// # Rules
///
/// - ASCII letter or `_` first, then ASCII letters, digits or `_`
/// - Not `username` or `date` (the fixed columns)
/// - Not an SQLite keyword, and not a `rowid` alias
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldName(String);

impl FieldName {
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();

        let mut chars = name.chars();
        let starts_well = chars
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
        if !starts_well || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(Error::Validation(format!(
                "field name '{name}' must be an identifier (letters, digits, underscore)"
            )));
        }

        if name.eq_ignore_ascii_case(USERNAME_COLUMN) || name.eq_ignore_ascii_case(DATE_COLUMN) {
            return Err(Error::Validation(format!(
                "field name '{name}' collides with a fixed column"
            )));
        }

        let upper = name.to_ascii_uppercase();
        if SQL_KEYWORDS.binary_search(&upper.as_str()).is_ok()
            || ROWID_ALIASES.contains(&upper.as_str())
        {
            return Err(Error::Validation(format!(
                "field name '{name}' is a reserved word"
            )));
        }

        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FieldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for FieldName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// =============================================================================
// Field Declaration
// =============================================================================

/// The ordered set of stat columns for a session.
///
/// Column order is load-bearing: the table is created in this order and
/// inserts bind values positionally in this order.
///
/// # Example
///
/// ```rust
/// use gamestats::types::{FieldDeclaration, StatKind};
///
/// let decl = FieldDeclaration::new([
///     ("winner", StatKind::Boolean),
///     ("left_score", StatKind::Real),
///     ("right_score", StatKind::Real),
/// ])?;
/// assert_eq!(decl.len(), 3);
/// # Ok::<(), gamestats::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDeclaration {
    fields: Vec<(FieldName, StatKind)>,
}

impl FieldDeclaration {
    /// Builds a declaration, validating every name and rejecting duplicates.
    ///
    /// Duplicates are compared case-insensitively, like SQLite column names.
    pub fn new<I, S>(fields: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, StatKind)>,
        S: Into<String>,
    {
        let mut validated: Vec<(FieldName, StatKind)> = Vec::new();
        for (name, kind) in fields {
            let name = FieldName::new(name)?;
            if validated
                .iter()
                .any(|(existing, _)| existing.as_str().eq_ignore_ascii_case(name.as_str()))
            {
                return Err(Error::Validation(format!("field '{name}' declared twice")));
            }
            validated.push((name, kind));
        }
        Ok(Self { fields: validated })
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterates over `(name, kind)` pairs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&FieldName, StatKind)> {
        self.fields.iter().map(|(name, kind)| (name, *kind))
    }

    pub fn kind_of(&self, field: &str) -> Option<StatKind> {
        self.fields
            .iter()
            .find(|(name, _)| name.as_str() == field)
            .map(|(_, kind)| *kind)
    }

    /// Looks up a declared field by name, for use as a ranking key.
    pub fn resolve(&self, field: &str) -> Result<(&FieldName, StatKind)> {
        self.fields
            .iter()
            .find(|(name, _)| name.as_str() == field)
            .map(|(name, kind)| (name, *kind))
            .ok_or_else(|| Error::UnknownField(field.to_string()))
    }

    /// Like [`resolve`](Self::resolve), but also requires a numeric kind.
    pub fn resolve_numeric(&self, field: &str) -> Result<(&FieldName, StatKind)> {
        let (name, kind) = self.resolve(field)?;
        if !kind.is_numeric() {
            return Err(Error::NotNumeric(field.to_string()));
        }
        Ok((name, kind))
    }

    /// All table columns, fixed ones first.
    pub fn column_names(&self) -> Vec<String> {
        [USERNAME_COLUMN, DATE_COLUMN]
            .into_iter()
            .map(String::from)
            .chain(self.fields.iter().map(|(name, _)| name.to_string()))
            .collect()
    }

    /// Checks that a snapshot carries exactly the declared fields, each with
    /// a value of the declared kind.
    pub fn check_snapshot(&self, snapshot: &Snapshot) -> Result<()> {
        for (name, kind) in &self.fields {
            match snapshot.get(name.as_str()) {
                None => {
                    return Err(Error::Validation(format!(
                        "snapshot is missing declared field '{name}'"
                    )))
                }
                Some(value) if !value.fits(*kind) => {
                    return Err(Error::Validation(format!(
                        "field '{name}' is declared {kind}, but the snapshot holds {value:?}"
                    )))
                }
                Some(_) => {}
            }
        }

        if snapshot.len() != self.fields.len() {
            let mut extra: Vec<&str> = snapshot
                .keys()
                .map(String::as_str)
                .filter(|key| self.kind_of(key).is_none())
                .collect();
            extra.sort_unstable();
            return Err(Error::Validation(format!(
                "snapshot has undeclared fields {extra:?}"
            )));
        }

        Ok(())
    }

    /// Returns snapshot values in declaration order, after
    /// [`check_snapshot`](Self::check_snapshot).
    pub(crate) fn ordered_values<'a>(&self, snapshot: &'a Snapshot) -> Result<Vec<&'a StatValue>> {
        self.check_snapshot(snapshot)?;
        Ok(self
            .fields
            .iter()
            .filter_map(|(name, _)| snapshot.get(name.as_str()))
            .collect())
    }
}

// =============================================================================
// Host Interface
// =============================================================================

/// Current stat values keyed by field name.
pub type Snapshot = HashMap<String, StatValue>;

/// The game session object that supplies stat values.
///
/// Implementors return every declared field with its current value. The store
/// only reads snapshots; it never keeps or mutates the host.
///
/// # Example
///
/// ```rust
/// use gamestats::types::{Snapshot, StatSource};
///
/// struct Scoreboard {
///     score: i64,
///     distance: f64,
/// }
///
/// impl StatSource for Scoreboard {
///     fn snapshot(&self) -> Snapshot {
///         Snapshot::from([
///             ("score".to_string(), self.score.into()),
///             ("distance".to_string(), self.distance.into()),
///         ])
///     }
/// }
/// ```
pub trait StatSource {
    fn snapshot(&self) -> Snapshot;
}

impl StatSource for Snapshot {
    fn snapshot(&self) -> Snapshot {
        self.clone()
    }
}

impl<T: StatSource + ?Sized> StatSource for &T {
    fn snapshot(&self) -> Snapshot {
        (**self).snapshot()
    }
}

// =============================================================================
// Query Results
// =============================================================================

/// One persisted stats row.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub username: String,
    pub date: NaiveDate,
    /// Declared field values, in declaration order.
    pub values: Vec<(String, StatValue)>,
}

impl Record {
    /// Returns the value of a declared field.
    pub fn get(&self, field: &str) -> Option<&StatValue> {
        self.values
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value)
    }
}

/// A row from an arbitrary read query: column name → value, in column order.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub columns: Vec<(String, StatValue)>,
}

impl Row {
    pub fn get(&self, column: &str) -> Option<&StatValue> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    /// Column values in select-list order, without their names.
    pub fn values(&self) -> impl Iterator<Item = &StatValue> {
        self.columns.iter().map(|(_, value)| value)
    }
}

/// The winning row of the earliest qualifying day: who set the day's best
/// value, and what it was.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyBest {
    pub username: String,
    pub date: NaiveDate,
    pub best: StatValue,
}

/// A user's best value of one stat, for leaderboards.
#[derive(Debug, Clone, PartialEq)]
pub struct UserBest {
    pub username: String,
    pub best: StatValue,
}

/// The best value of one stat on one day, for trend charts.
#[derive(Debug, Clone, PartialEq)]
pub struct DayBest {
    pub date: NaiveDate,
    pub best: StatValue,
}

// =============================================================================
// Tests
// =============================================================================
