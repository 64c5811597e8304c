use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rusqlite::Connection;

use halfline::export::{feature_header, write_csv, write_xlsx};
use halfline::features::{
    Candidate, Exclusion, FeatureConfig, Side, build_dataset, derive_feature_row, load_candidates,
};
use halfline::model::{
    Fixture, FixtureStatus, OddsRow, Period, PressureRow, StatColumn, StatRow, StatValue,
};
use halfline::store;

fn fixture(id: u64, home: u64, away: u64, status: FixtureStatus, score: (i64, i64)) -> Fixture {
    Fixture {
        fixture_id: id,
        league_id: Some(8),
        season_id: 100,
        stage_id: None,
        round_id: None,
        round_finished: None,
        starting_at: Some("2024-03-02 15:00:00".to_string()),
        status,
        home_team_id: Some(home),
        away_team_id: Some(away),
        home_score: status.is_finished().then_some(score.0),
        away_score: status.is_finished().then_some(score.1),
    }
}

fn first_half(fixture_id: u64, team_id: u64, stats: &[(StatColumn, i64)]) -> StatRow {
    let mut row = StatRow::new(fixture_id, team_id, Period::FirstHalf, "t");
    for (column, value) in stats {
        row.set(*column, Some(StatValue::Int(*value)));
    }
    row
}

fn quote(fixture_id: u64, label: &str, price: f64) -> OddsRow {
    OddsRow {
        odds_id: None,
        fixture_id,
        market_id: 1,
        bookmaker_id: 20,
        label: label.to_string(),
        handicap: String::new(),
        total: String::new(),
        name: None,
        market_description: None,
        price: Some(price),
        probability: None,
        fractional: None,
        american: None,
        winning: false,
        stopped: false,
        bookmaker_updated_at: None,
    }
}

fn config() -> FeatureConfig {
    FeatureConfig {
        feature_stats: vec![StatColumn::Goals, StatColumn::Fouls, StatColumn::Corners],
        ..FeatureConfig::default()
    }
}

fn seeded() -> Connection {
    use StatColumn::{Corners, Fouls, Goals};
    let mut conn = store::open_in_memory().unwrap();
    store::upsert_fixtures(
        &mut conn,
        &[
            fixture(1001, 10, 20, FixtureStatus::Finished, (3, 1)),
            fixture(1002, 30, 40, FixtureStatus::FinishedAfterExtraTime, (1, 1)),
            fixture(1003, 50, 60, FixtureStatus::Finished, (0, 0)),
            fixture(1004, 70, 80, FixtureStatus::Finished, (2, 0)),
            fixture(1005, 90, 91, FixtureStatus::Finished, (1, 0)),
            fixture(1006, 92, 93, FixtureStatus::NotStarted, (0, 0)),
        ],
    )
    .unwrap();
    store::insert_stat_rows(
        &mut conn,
        &[
            first_half(1001, 10, &[(Goals, 1), (Fouls, 3)]),
            first_half(1001, 20, &[(Goals, 0), (Fouls, 5)]),
            first_half(1002, 30, &[(Goals, 1), (Fouls, 7), (Corners, 2)]),
            first_half(1002, 40, &[(Goals, 1), (Fouls, 4), (Corners, 6)]),
            first_half(1003, 50, &[(Goals, 0)]),
            first_half(1003, 60, &[(Goals, 0)]),
            first_half(1004, 70, &[(Goals, 1)]),
            first_half(1004, 80, &[(Corners, 3)]),
            first_half(1005, 90, &[(Goals, 1)]),
            first_half(1005, 91, &[(Goals, 0)]),
            first_half(1006, 92, &[(Goals, 0)]),
            first_half(1006, 93, &[(Goals, 0)]),
        ],
    )
    .unwrap();
    store::insert_odds_rows(
        &mut conn,
        &[
            quote(1001, "Home", 1.5),
            quote(1001, "Draw", 4.2),
            quote(1001, "Away", 4.0),
            quote(1002, "1", 3.0),
            quote(1002, "X", 3.5),
            quote(1002, "2", 1.8),
            quote(1003, "Home", 2.5),
            quote(1003, "Draw", 3.1),
            quote(1003, "Away", 2.5),
            quote(1004, "Home", 1.4),
            quote(1004, "Away", 6.0),
            quote(1006, "Home", 2.0),
            quote(1006, "Away", 3.0),
        ],
    )
    .unwrap();
    conn
}

#[test]
fn two_team_scenario_produces_home_favorite_row() {
    let conn = seeded();
    let (rows, _) = build_dataset(&conn, &config()).unwrap();
    let row = rows.iter().find(|r| r.fixture_id == 1001).unwrap();

    assert_eq!(row.favorite, Side::Home);
    assert_eq!(row.odds_fav, 1.5);
    assert_eq!(row.odds_und, 4.0);
    assert_eq!(row.ht_diff(StatColumn::Goals), Some(1.0));
    assert_eq!(row.ht_diff(StatColumn::Fouls), Some(-2.0));
    assert_eq!(row.ht_diff(StatColumn::Corners), None);
    assert_eq!(row.odds_ratio_hw, 1.5 / 4.0);
    let margin = 1.0 / 1.5 + 1.0 / 4.2 + 1.0 / 4.0 - 1.0;
    assert!((row.prob_margin - margin).abs() < 1e-12);
    assert_eq!(row.avg_pressure_index_1st_half, None);
    // second half 2-1 to the favorite
    assert_eq!(row.target, 1);
}

#[test]
fn raw_payload_flows_through_to_a_feature_row() {
    let doc = serde_json::json!({
        "data": {
            "id": 2001,
            "periods": [{
                "id": 1,
                "description": "1st-half",
                "statistics": [
                    {"participant_id": 1, "type": {"code": "goals"}, "data": {"value": 1}},
                    {"participant_id": 1, "type": {"code": "fouls"}, "data": {"value": 3}},
                    {"participant_id": 2, "type": {"code": "goals"}, "data": {"value": 0}},
                    {"participant_id": 2, "type": {"code": "fouls"}, "data": {"value": 5}}
                ]
            }]
        }
    });
    let rows = halfline::stats::normalize_fixture_stats(&doc, "t");
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].get(StatColumn::Goals), Some(StatValue::Int(1)));
    assert_eq!(rows[1].get(StatColumn::Goals), Some(StatValue::Int(0)));

    let mut conn = store::open_in_memory().unwrap();
    store::upsert_fixtures(&mut conn, &[fixture(2001, 1, 2, FixtureStatus::Finished, (1, 0))])
        .unwrap();
    store::insert_stat_rows(&mut conn, &rows).unwrap();
    store::insert_odds_rows(
        &mut conn,
        &[
            quote(2001, "Home", 1.5),
            quote(2001, "Draw", 3.9),
            quote(2001, "Away", 4.0),
        ],
    )
    .unwrap();

    let (features, _) = build_dataset(&conn, &config()).unwrap();
    assert_eq!(features.len(), 1);
    let row = &features[0];
    assert_eq!(row.favorite.as_str(), "home");
    assert_eq!(row.odds_fav, 1.5);
    assert_eq!(row.ht_diff(StatColumn::Goals), Some(1.0));
    assert_eq!(row.ht_diff(StatColumn::Fouls), Some(-2.0));
    // no second-half goals for either side
    assert_eq!(row.target, 0);
}

#[test]
fn away_favorite_differentials_use_away_minus_home() {
    let conn = seeded();
    let (rows, _) = build_dataset(&conn, &config()).unwrap();
    let row = rows.iter().find(|r| r.fixture_id == 1002).unwrap();

    assert_eq!(row.favorite, Side::Away);
    assert_eq!(row.odds_fav, 1.8);
    assert_eq!(row.odds_draw, 3.5);
    assert_eq!(row.ht_diff(StatColumn::Fouls), Some(4.0 - 7.0));
    assert_eq!(row.ht_diff(StatColumn::Corners), Some(6.0 - 2.0));
    assert_eq!(row.ht_diff(StatColumn::Goals), Some(0.0));
    assert_eq!(row.target, 0);
}

#[test]
fn report_accounts_for_every_candidate() {
    let conn = seeded();
    let (rows, report) = build_dataset(&conn, &config()).unwrap();

    assert_eq!(rows.iter().map(|r| r.fixture_id).collect::<Vec<_>>(), vec![1001, 1002]);
    assert_eq!(report.candidates, 5);
    assert_eq!(report.excluded_incomplete, 1);
    assert_eq!(report.exclusions.get("no_favorite"), Some(&1));
    assert_eq!(report.exclusions.get("missing_price"), Some(&1));
    assert_eq!(report.rows, 2);
}

#[test]
fn candidates_only_include_finished_fixtures() {
    let conn = seeded();
    let ids = load_candidates(&conn, &config())
        .unwrap()
        .into_iter()
        .map(|c| c.fixture_id)
        .collect::<Vec<_>>();
    assert!(!ids.contains(&1006));
    assert!(ids.contains(&1002));
}

fn synthetic(odds_home: f64, odds_away: f64, home_goals: f64, away_goals: f64) -> Candidate {
    let mut c = Candidate {
        fixture_id: 1,
        home_team_id: 1,
        away_team_id: 2,
        home_score: Some(home_goals as i64 + 1),
        away_score: Some(away_goals as i64),
        odds_home: Some(odds_home),
        odds_draw: Some(3.3),
        odds_away: Some(odds_away),
        ..Candidate::default()
    };
    c.home_stats.insert(StatColumn::Goals, home_goals);
    c.away_stats.insert(StatColumn::Goals, away_goals);
    c.home_stats.insert(StatColumn::Tackles, 9.0);
    c.away_stats.insert(StatColumn::Tackles, 4.0);
    c
}

#[test]
fn differential_sign_follows_the_favorite() {
    let cfg = FeatureConfig::default();

    let home_fav = derive_feature_row(&synthetic(1.7, 5.0, 2.0, 1.0), &cfg).unwrap();
    assert_eq!(home_fav.ht_diff(StatColumn::Tackles), Some(9.0 - 4.0));
    assert_eq!(home_fav.ht_diff(StatColumn::Goals), Some(2.0 - 1.0));

    let away_fav = derive_feature_row(&synthetic(5.0, 1.7, 2.0, 1.0), &cfg).unwrap();
    assert_eq!(away_fav.ht_diff(StatColumn::Tackles), Some(4.0 - 9.0));
    assert_eq!(away_fav.ht_diff(StatColumn::Goals), Some(1.0 - 2.0));
}

#[test]
fn equal_prices_never_produce_a_row() {
    let cfg = FeatureConfig::default();
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..500 {
        let home = rng.gen_range(1..=8) as f64 * 0.5;
        let away = rng.gen_range(1..=8) as f64 * 0.5;
        let c = synthetic(home, away, 1.0, 1.0);
        match derive_feature_row(&c, &cfg) {
            Ok(row) => {
                assert_ne!(home, away);
                let expected = if home < away { Side::Home } else { Side::Away };
                assert_eq!(row.favorite, expected);
                assert_eq!(row.odds_fav, home.min(away));
                assert_eq!(row.odds_und, home.max(away));
            }
            Err(reason) => {
                assert_eq!(home, away);
                assert_eq!(reason, Exclusion::NoFavorite);
            }
        }
    }
}

#[test]
fn missing_inputs_are_excluded_not_imputed() {
    let cfg = FeatureConfig::default();

    let mut c = synthetic(1.5, 4.0, 1.0, 0.0);
    c.odds_away = None;
    assert_eq!(derive_feature_row(&c, &cfg), Err(Exclusion::MissingPrice));

    let mut c = synthetic(1.5, 4.0, 1.0, 0.0);
    c.odds_home = Some(0.0);
    assert_eq!(derive_feature_row(&c, &cfg), Err(Exclusion::InvalidPrice));

    let mut c = synthetic(1.5, 4.0, 1.0, 0.0);
    c.away_score = None;
    assert_eq!(derive_feature_row(&c, &cfg), Err(Exclusion::MissingScore));

    let mut c = synthetic(1.5, 4.0, 1.0, 0.0);
    c.home_stats.remove(&StatColumn::Goals);
    assert_eq!(
        derive_feature_row(&c, &cfg),
        Err(Exclusion::MissingHalfTimeGoals)
    );

    // a draw price is as mandatory as the other two
    let mut c = synthetic(1.5, 4.0, 1.0, 0.0);
    c.odds_draw = None;
    assert_eq!(derive_feature_row(&c, &cfg), Err(Exclusion::MissingPrice));

    let mut c = synthetic(1.5, 4.0, 1.0, 0.0);
    c.odds_draw = Some(f64::NAN);
    assert_eq!(derive_feature_row(&c, &cfg), Err(Exclusion::InvalidPrice));

    let mut conn = store::open_in_memory().unwrap();
    store::upsert_fixtures(&mut conn, &[fixture(3001, 1, 2, FixtureStatus::Finished, (2, 0))])
        .unwrap();
    store::insert_stat_rows(
        &mut conn,
        &[
            first_half(3001, 1, &[(StatColumn::Goals, 1)]),
            first_half(3001, 2, &[(StatColumn::Goals, 0)]),
        ],
    )
    .unwrap();
    store::insert_odds_rows(&mut conn, &[quote(3001, "Home", 1.5), quote(3001, "Away", 4.0)])
        .unwrap();
    let (rows, report) = build_dataset(&conn, &cfg).unwrap();
    assert!(rows.is_empty());
    assert_eq!(report.exclusions.get("missing_price"), Some(&1));
}

#[test]
fn first_half_pressure_is_an_opt_in_column() {
    let mut conn = seeded();
    let readings = [
        (10, 1, 62.5),
        (20, 1, 37.5),
        (10, 45, 40.0),
        (20, 45, 60.0),
        // second half readings never count
        (10, 70, 95.0),
    ]
    .map(|(team_id, minute, pressure_index)| PressureRow {
        fixture_id: 1001,
        team_id,
        minute,
        pressure_index,
        recorded_at: "t".to_string(),
    });
    store::insert_pressure_rows(&mut conn, &readings).unwrap();

    let (plain, _) = build_dataset(&conn, &config()).unwrap();
    assert_eq!(plain.len(), 2);
    assert!(!feature_header(&config()).contains(&"avg_pressure_index_1st_half".to_string()));

    let cfg = FeatureConfig {
        pressure_feature: true,
        ..config()
    };
    let (rows, report) = build_dataset(&conn, &cfg).unwrap();
    assert_eq!(rows.iter().map(|r| r.fixture_id).collect::<Vec<_>>(), vec![1001]);
    assert_eq!(rows[0].avg_pressure_index_1st_half, Some(50.0));
    assert_eq!(report.exclusions.get("missing_pressure"), Some(&1));

    let header = feature_header(&cfg);
    let pos = header
        .iter()
        .position(|h| h == "avg_pressure_index_1st_half")
        .unwrap();
    assert_eq!(pos, header.len() - 2);
}

#[test]
fn handicap_line_moves_the_target() {
    // favorite wins the second half by exactly one goal
    let c = synthetic(1.5, 4.0, 1.0, 1.0);
    let half = derive_feature_row(&c, &FeatureConfig::default()).unwrap();
    assert_eq!(half.target, 1);

    let cfg = FeatureConfig {
        handicap_line: -1.5,
        ..FeatureConfig::default()
    };
    assert_eq!(derive_feature_row(&c, &cfg).unwrap().target, 0);
}

#[test]
fn csv_export_matches_header() {
    let conn = seeded();
    let cfg = config();
    let (rows, report) = build_dataset(&conn, &cfg).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out").join("dataset.csv");
    write_csv(&path, &cfg, &rows).unwrap();

    let mut reader = csv::Reader::from_path(&path).unwrap();
    let header = reader
        .headers()
        .unwrap()
        .iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>();
    assert_eq!(header, feature_header(&cfg));
    assert_eq!(header.first().map(String::as_str), Some("fixture_id"));
    assert_eq!(
        header.last().map(String::as_str),
        Some("target_fav_covers_ah_neg0_5_2h")
    );
    assert!(header.contains(&"ht_diff_goals".to_string()));

    let records = reader.records().collect::<Result<Vec<_>, _>>().unwrap();
    assert_eq!(records.len(), 2);
    let first = &records[0];
    let col = |name: &str| header.iter().position(|h| h == name).unwrap();
    assert_eq!(&first[col("fixture_id")], "1001");
    assert_eq!(&first[col("favorite_location")], "home");
    assert_eq!(&first[col("ht_diff_goals")], "1");
    assert_eq!(&first[col("ht_diff_corners")], "");
    assert_eq!(&first[col("odds_fav")], "1.5");

    let xlsx = dir.path().join("dataset.xlsx");
    write_xlsx(&xlsx, &cfg, &rows, &report).unwrap();
    assert!(xlsx.exists());
}
