use std::collections::BTreeSet;

use rusqlite::Connection;

use halfline::completeness::{DEFAULT_REQUIRED, completeness_report, find_incomplete_fixtures};
use halfline::model::{Period, StatColumn, StatRow, StatValue};
use halfline::store;

fn row(fixture_id: u64, team_id: u64, period: Period, stats: &[(StatColumn, i64)]) -> StatRow {
    let mut out = StatRow::new(fixture_id, team_id, period, "t");
    for (column, value) in stats {
        out.set(*column, Some(StatValue::Int(*value)));
    }
    out
}

fn seeded() -> Connection {
    let mut conn = store::open_in_memory().unwrap();
    let rows = vec![
        // complete: both teams carry goals
        row(1, 10, Period::FirstHalf, &[(StatColumn::Goals, 1)]),
        row(1, 20, Period::FirstHalf, &[(StatColumn::Goals, 0)]),
        // a single team
        row(2, 10, Period::FirstHalf, &[(StatColumn::Goals, 2)]),
        // second team has only a non-required column
        row(3, 10, Period::FirstHalf, &[(StatColumn::Goals, 0)]),
        row(3, 20, Period::FirstHalf, &[(StatColumn::Corners, 4)]),
        // one required column per team is enough
        row(4, 10, Period::FirstHalf, &[(StatColumn::Saves, 2)]),
        row(4, 20, Period::FirstHalf, &[(StatColumn::Attacks, 31)]),
        // no first-half rows at all: not considered
        row(5, 10, Period::SecondHalf, &[]),
        // a bare first-half row for each team
        row(6, 10, Period::FirstHalf, &[]),
        row(6, 20, Period::FirstHalf, &[]),
    ];
    store::insert_stat_rows(&mut conn, &rows).unwrap();
    conn
}

#[test]
fn flags_missing_team_and_all_null_rows() {
    let conn = seeded();
    let incomplete = find_incomplete_fixtures(&conn, &DEFAULT_REQUIRED).unwrap();
    assert_eq!(incomplete, vec![2, 3, 6]);
}

#[test]
fn classification_matches_row_level_rules() {
    let conn = seeded();
    let incomplete = find_incomplete_fixtures(&conn, &DEFAULT_REQUIRED)
        .unwrap()
        .into_iter()
        .collect::<BTreeSet<_>>();

    for fixture_id in 1..=6u64 {
        let first_half = store::load_stat_rows(&conn, fixture_id)
            .unwrap()
            .into_iter()
            .filter(|r| r.period == Period::FirstHalf)
            .collect::<Vec<_>>();
        if first_half.is_empty() {
            assert!(!incomplete.contains(&fixture_id));
            continue;
        }
        let teams = first_half.iter().map(|r| r.team_id).collect::<BTreeSet<_>>();
        let any_all_null = first_half.iter().any(|r| r.all_null(&DEFAULT_REQUIRED));
        let violates = teams.len() < 2 || any_all_null;
        assert_eq!(
            incomplete.contains(&fixture_id),
            violates,
            "fixture {fixture_id}"
        );
    }
}

#[test]
fn narrower_required_set_changes_the_verdict() {
    let conn = seeded();
    let incomplete = find_incomplete_fixtures(&conn, &[StatColumn::Goals]).unwrap();
    assert_eq!(incomplete, vec![2, 3, 4, 6]);
}

#[test]
fn empty_required_set_flags_every_checked_fixture() {
    let conn = seeded();
    assert_eq!(
        find_incomplete_fixtures(&conn, &[]).unwrap(),
        vec![1, 2, 3, 4, 6]
    );
}

#[test]
fn report_counts_first_half_fixtures() {
    let conn = seeded();
    let report = completeness_report(&conn, &DEFAULT_REQUIRED).unwrap();
    assert_eq!(report.checked, 5);
    assert_eq!(report.incomplete, vec![2, 3, 6]);
}
