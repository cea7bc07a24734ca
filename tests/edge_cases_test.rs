//! Edge Cases and Boundary Condition Tests
//!
//! Tests for:
//! - Type mapping of boolean, real and text fields
//! - Schema idempotence and mismatched declarations
//! - Identifier validation
//! - The raw query escape hatch
//! - Hosts exposing stats through `StatSource`

mod common;

use gamestats::{
    ensure_schema, Error, FieldDeclaration, Snapshot, StatKind, StatSource, StatValue, StatsStore,
};

fn mixed_decl() -> FieldDeclaration {
    FieldDeclaration::new([
        ("flag", StatKind::Boolean),
        ("dist", StatKind::Real),
        ("name", StatKind::Text),
    ])
    .unwrap()
}

fn mixed(flag: bool, dist: impl Into<StatValue>, name: &str) -> Snapshot {
    Snapshot::from([
        ("flag".to_string(), StatValue::Boolean(flag)),
        ("dist".to_string(), dist.into()),
        ("name".to_string(), StatValue::from(name)),
    ])
}

#[test]
fn declared_types_round_trip() {
    let (_dir, store) = common::temp_store(mixed_decl());
    store.append("a", &mixed(true, 2.75, "rocket")).unwrap();
    store.append("b", &mixed(false, 3, "snail")).unwrap();

    let rows = store.all().unwrap();
    assert_eq!(rows[0].get("flag"), Some(&StatValue::Boolean(true)));
    assert_eq!(rows[0].get("dist"), Some(&StatValue::Real(2.75)));
    assert_eq!(rows[0].get("name"), Some(&StatValue::Text("rocket".into())));
    assert_eq!(rows[1].get("flag"), Some(&StatValue::Boolean(false)));
    assert_eq!(rows[1].get("dist"), Some(&StatValue::Real(3.0)));

    let stored = store
        .execute("SELECT typeof(flag) AS f, typeof(dist) AS d, typeof(name) AS n FROM stats")
        .unwrap();
    assert_eq!(stored[0].get("f"), Some(&StatValue::Text("integer".into())));
    assert_eq!(stored[0].get("d"), Some(&StatValue::Text("real".into())));
    assert_eq!(stored[0].get("n"), Some(&StatValue::Text("text".into())));
}

#[test]
fn affinity_coercions_are_accepted() {
    let (_dir, store) = common::temp_store(mixed_decl());
    let conn = common::open_read_write(store.path());
    conn.execute(
        "INSERT INTO stats (username, date, flag, dist, name) VALUES ('x', '2024-01-01', '1', '0.5', 42)",
        [],
    )
    .unwrap();

    let rows = store.all().unwrap();
    assert_eq!(rows[0].get("flag"), Some(&StatValue::Boolean(true)));
    assert_eq!(rows[0].get("dist"), Some(&StatValue::Real(0.5)));
    assert_eq!(rows[0].get("name"), Some(&StatValue::Text("42".into())));
}

#[test]
fn null_values_are_stored_and_ranked_last() {
    let (_dir, store) = common::temp_store(common::score_decl());
    store
        .append("ghost", &Snapshot::from([("score".to_string(), StatValue::Null)]))
        .unwrap();
    store.append("real", &common::score(-4)).unwrap();

    let top = store.top_by_stat("score", 2).unwrap();
    assert_eq!(top[0].username, "real");
    assert!(top[1].get("score").unwrap().is_null());
}

#[test]
fn schema_ensure_twice_leaves_one_table() {
    let (_dir, path) = common::temp_db_path("twice.sqlite");
    ensure_schema(&mixed_decl(), &path).unwrap();
    ensure_schema(&mixed_decl(), &path).unwrap();

    let tables: i64 = common::open_read_write(&path)
        .query_row("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'", [], |row| row.get(0))
        .unwrap();
    assert_eq!(tables, 1);
}

#[test]
fn reopening_with_a_different_declaration_fails_fast() {
    let (_dir, path) = common::temp_db_path("mismatch.sqlite");
    let store = StatsStore::open(&path, mixed_decl()).unwrap();
    store.append("a", &mixed(true, 1.0, "x")).unwrap();

    let err = StatsStore::open(&path, common::score_decl()).unwrap_err();
    assert!(matches!(err, Error::SchemaMismatch { .. }));

    // The file is untouched.
    assert_eq!(common::row_count(&path), 1);
}

#[test]
fn reopening_over_a_retyped_column_fails_fast() {
    let (_dir, path) = common::temp_db_path("retyped.sqlite");
    let as_text = FieldDeclaration::new([("score", StatKind::Text)]).unwrap();
    drop(StatsStore::open(&path, as_text).unwrap());

    // Same name, different type: integers would otherwise rank as text.
    let err = StatsStore::open(&path, common::score_decl()).unwrap_err();
    match err {
        Error::SchemaMismatch { expected, found } => {
            assert!(expected.contains(&"score INTEGER".to_string()), "{expected:?}");
            assert!(found.contains(&"score TEXT".to_string()), "{found:?}");
        }
        other => panic!("expected SchemaMismatch, got {other:?}"),
    }
}

#[test]
fn unsafe_identifiers_never_reach_sql() {
    for bad in ["score DESC; DROP TABLE stats; --", "username", "select", "a b"] {
        let err = FieldDeclaration::new([(bad, StatKind::Integer)]).unwrap_err();
        assert!(matches!(err, Error::Validation(_)), "{bad:?} should be rejected");
    }
}

#[test]
fn usernames_are_bound_not_interpolated() {
    let (_dir, store) = common::temp_store(common::score_decl());
    let sneaky = "x' OR '1'='1";
    store.append(sneaky, &common::score(1)).unwrap();
    store.append("bob", &common::score(2)).unwrap();

    let rows = store.all_by_user(sneaky).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].username, sneaky);
}

#[test]
fn raw_execute_reads_but_never_writes() {
    let (_dir, store) = common::temp_store(common::score_decl());
    store.append("a", &common::score(3)).unwrap();
    store.append("b", &common::score(5)).unwrap();

    let rows = store
        .execute("SELECT username, MAX(score) AS mx FROM stats")
        .unwrap();
    assert_eq!(rows[0].get("mx"), Some(&StatValue::Integer(5)));
    let values: Vec<_> = rows[0].values().collect();
    assert_eq!(values[0].as_str(), Some("b"));
    assert_eq!(values[1].as_i64(), Some(5));

    assert!(matches!(store.execute("DROP TABLE stats"), Err(Error::Query(_))));
    assert!(matches!(store.execute("SELECT * FROM nowhere"), Err(Error::Sqlite(_))));
    assert_eq!(store.all().unwrap().len(), 2);
}

struct Scoreboard {
    ups: i64,
    downs: i64,
    distance: f64,
}

impl StatSource for Scoreboard {
    fn snapshot(&self) -> Snapshot {
        Snapshot::from([
            ("ups".to_string(), self.ups.into()),
            ("downs".to_string(), self.downs.into()),
            ("distance".to_string(), self.distance.into()),
        ])
    }
}

#[test]
fn host_values_are_read_at_call_time() {
    let (_dir, path) = common::temp_db_path("host.sqlite");
    let decl = FieldDeclaration::new([
        ("ups", StatKind::Integer),
        ("downs", StatKind::Integer),
        ("distance", StatKind::Real),
    ])
    .unwrap();

    let mut board = Scoreboard {
        ups: 0,
        downs: 0,
        distance: 0.0,
    };
    let store = StatsStore::with_source(&path, decl, &board).unwrap();

    board.ups = 15;
    board.downs = 5;
    board.distance = 170.0;
    store.record("mjo", &board).unwrap();

    let row = &store.all().unwrap()[0];
    assert_eq!(row.get("ups"), Some(&StatValue::Integer(15)));
    assert_eq!(row.get("downs"), Some(&StatValue::Integer(5)));
    assert_eq!(row.get("distance"), Some(&StatValue::Real(170.0)));
}

#[test]
fn host_missing_a_declared_field_is_rejected() {
    let (_dir, path) = common::temp_db_path("bad_host.sqlite");
    let decl = FieldDeclaration::new([("lives", StatKind::Integer)]).unwrap();
    let board = Scoreboard {
        ups: 1,
        downs: 1,
        distance: 1.0,
    };

    let err = StatsStore::with_source(&path, decl, &board).unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}
