//! High-Score Feedback Tests
//!
//! Plays a sequence of rounds and checks the verdict for each one against
//! the bests that existed before it.

mod common;

use gamestats::{record_session, Achievement, Error, FieldDeclaration, Snapshot, StatKind};

fn decl() -> FieldDeclaration {
    FieldDeclaration::new([
        ("ups", StatKind::Integer),
        ("downs", StatKind::Integer),
        ("distance", StatKind::Real),
        ("comment", StatKind::Text),
    ])
    .unwrap()
}

fn round(ups: i64, downs: i64, distance: f64) -> Snapshot {
    Snapshot::from([
        ("ups".to_string(), ups.into()),
        ("downs".to_string(), downs.into()),
        ("distance".to_string(), distance.into()),
        ("comment".to_string(), "gg".into()),
    ])
}

#[test]
fn verdicts_follow_previous_bests() {
    let (_dir, store) = common::temp_store(decl());

    let rounds = [
        ("mjo", 50.0, Some(Achievement::AllTimeBest)),
        ("fnron", 20.0, None),
        ("mjo", 80.0, Some(Achievement::AllTimeBest)),
        ("bozar", 10.0, None),
        ("bozar", 30.0, Some(Achievement::PersonalBest)),
        ("mjo", 60.0, None),
        ("fnron", 25.0, Some(Achievement::PersonalBest)),
    ];

    for (user, distance, expected) in rounds {
        let verdict = record_session(&store, user, &round(10, 10, distance), "distance").unwrap();
        assert_eq!(verdict, expected, "{user} at {distance}");
    }

    assert_eq!(store.all().unwrap().len(), rounds.len());
}

#[test]
fn daily_best_needs_an_earlier_round_today() {
    let (_dir, store) = common::temp_store(decl());
    let long_ago = common::day(2000, 1, 1);

    store.append_dated("old", long_ago, &round(0, 0, 500.0)).unwrap();
    store.append_dated("amy", long_ago, &round(0, 0, 100.0)).unwrap();

    // First round today: nobody to beat today, no personal history.
    let first = record_session(&store, "newbie", &round(0, 0, 40.0), "distance").unwrap();
    assert_eq!(first, None);

    let second = record_session(&store, "other", &round(0, 0, 45.0), "distance").unwrap();
    assert_eq!(second, Some(Achievement::DailyBest));

    // amy's best is 100 from long ago, and 44 doesn't beat today's 45.
    let third = record_session(&store, "amy", &round(0, 0, 44.0), "distance").unwrap();
    assert_eq!(third, None);
}

#[test]
fn zero_first_round_is_not_a_high_score() {
    let (_dir, store) = common::temp_store(decl());
    let verdict = record_session(&store, "c2c", &round(0, 0, 0.0), "ups").unwrap();
    assert_eq!(verdict, None);
    assert_eq!(store.all().unwrap().len(), 1);
}

#[test]
fn stat_of_interest_must_be_numeric_and_declared() {
    let (_dir, store) = common::temp_store(decl());

    let err = record_session(&store, "a", &round(1, 1, 1.0), "comment").unwrap_err();
    assert!(matches!(err, Error::NotNumeric(_)));

    let err = record_session(&store, "a", &round(1, 1, 1.0), "lives").unwrap_err();
    assert!(matches!(err, Error::UnknownField(_)));

    assert!(store.all().unwrap().is_empty());
}

#[test]
fn failed_store_reports_error_and_writes_nothing() {
    let (_dir, store) = common::temp_store(decl());
    let mut bad = round(1, 1, 1.0);
    bad.remove("comment");

    assert!(matches!(
        record_session(&store, "a", &bad, "ups"),
        Err(Error::Validation(_))
    ));
    assert!(store.all().unwrap().is_empty());
}
