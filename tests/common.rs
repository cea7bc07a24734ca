#![allow(dead_code)]

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use gamestats::{FieldDeclaration, Snapshot, StatKind, StatValue, StatsStore};
use rusqlite::Connection;

pub fn score_decl() -> FieldDeclaration {
    FieldDeclaration::new([("score", StatKind::Integer)]).expect("valid declaration")
}

pub fn score(value: i64) -> Snapshot {
    Snapshot::from([("score".to_string(), StatValue::Integer(value))])
}

pub fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

pub fn temp_db_path(name: &str) -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::TempDir::new().expect("create temp dir");
    let path = dir.path().join(".gamestats").join(name);
    (dir, path)
}

pub fn temp_store(decl: FieldDeclaration) -> (tempfile::TempDir, StatsStore) {
    let (dir, path) = temp_db_path("stats.sqlite");
    let store = StatsStore::open(&path, decl).expect("open store");
    (dir, store)
}

pub fn open_read_write(path: &Path) -> Connection {
    Connection::open(path).expect("open read-write connection")
}

pub fn row_count(path: &Path) -> i64 {
    open_read_write(path)
        .query_row("SELECT COUNT(*) FROM stats", [], |row| row.get(0))
        .expect("count rows")
}
