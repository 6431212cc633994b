//! SQLite store integration tests.
//!
//! Run with: `cargo test --features persistence --test sqlite_store`

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, TimeZone, Utc};
use tempfile::TempDir;

use geotrack::{
    closest_position, dates_with_data, position_count_for_day, AdmissionFilter,
    AdmissionThresholds, MultiCriterionFilter, Position, PositionInterpolator, PositionStore,
    RangeQuery, SqlitePositionStore, Track, TrackConfig,
};

fn t(secs: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap() + Duration::seconds(secs)
}

/// Helper: open a store in a fresh temp dir and return it with the dir guard.
fn setup_store() -> (SqlitePositionStore, TempDir, String) {
    let tmp_dir = TempDir::new().expect("failed to create temp dir");
    let db_path = tmp_dir.path().join("positions.db");
    let db_path = db_path.to_str().unwrap().to_string();
    let store = SqlitePositionStore::new(&db_path).expect("failed to open store");
    (store, tmp_dir, db_path)
}

fn leg(id: &str, count: i64) -> Vec<Position> {
    (0..count)
        .map(|i| {
            Position::new(id, t(i * 10), 40.0, -105.0 + i as f64 * 1e-4)
                .with_heading(if i % 2 == 0 { 350.0 } else { 10.0 })
                .with_altitude(1600.0 + i as f64)
                .with_precision(5.0)
        })
        .collect()
}

#[test]
fn test_data_survives_reopen() {
    let (mut store, _dir, path) = setup_store();
    assert_eq!(store.insert_batch(&leg("truck", 30)).unwrap(), 30);
    assert_eq!(store.insert_batch(&leg("drone", 5)).unwrap(), 5);
    drop(store);

    let reopened = SqlitePositionStore::new(&path).unwrap();
    assert_eq!(reopened.count("truck").unwrap(), 30);
    assert_eq!(
        reopened.track_ids().unwrap(),
        vec!["drone".to_string(), "truck".to_string()]
    );

    let last = reopened.most_recent("truck").unwrap().unwrap();
    assert_eq!(last.timestamp, t(290));
    assert_eq!(last.altitude, Some(1629.0));
    assert_eq!(last.precision_meters, Some(5.0));
}

#[test]
fn test_range_query_limits_and_order() {
    let (mut store, _dir, _) = setup_store();
    store.insert_batch(&leg("truck", 30)).unwrap();

    let window = store
        .range_query("truck", &RangeQuery::ascending().from(t(50)).to(t(100)))
        .unwrap();
    assert_eq!(window.len(), 6);
    assert_eq!(window[0].timestamp, t(50));

    let head = store
        .range_query("truck", &RangeQuery::ascending().from(t(50)).limit(2))
        .unwrap();
    assert_eq!(head.len(), 2);
    assert_eq!(head[1].timestamp, t(60));

    let tail = store
        .range_query("truck", &RangeQuery::descending().limit(3))
        .unwrap();
    let times: Vec<_> = tail.iter().map(|p| p.timestamp).collect();
    assert_eq!(times, vec![t(290), t(280), t(270)]);
}

#[test]
fn test_interpolate_from_sqlite() {
    let (mut store, _dir, _) = setup_store();
    store.insert_batch(&leg("truck", 30)).unwrap();

    let mut interp =
        PositionInterpolator::new(&store, &Track::new("truck"), &TrackConfig::default()).unwrap();

    // between a 350 and a 10 degree sample
    let mid = interp.interpolate(t(5)).unwrap().unwrap();
    let heading = mid.heading.unwrap();
    assert!(heading < 1e-9 || 360.0 - heading < 1e-9, "heading = {}", heading);
    assert!((mid.altitude.unwrap() - 1600.5).abs() < 1e-9);

    let exact = interp.interpolate(t(100)).unwrap().unwrap();
    assert_eq!(exact.longitude, -105.0 + 10.0 * 1e-4);

    assert!(interp.interpolate(t(291)).unwrap().is_none());
}

#[test]
fn test_closest_position_from_sqlite() {
    let (mut store, _dir, _) = setup_store();
    store.insert_batch(&leg("truck", 3)).unwrap();

    let near = closest_position(&store, "truck", t(14), 120.0).unwrap().unwrap();
    assert_eq!(near.timestamp, t(10));
    assert!(closest_position(&store, "truck", t(500), 120.0)
        .unwrap()
        .is_none());
}

#[test]
fn test_admission_writes_through_to_sqlite() {
    let (store, _dir, _) = setup_store();
    let thresholds = AdmissionThresholds {
        seconds: Some(60.0),
        meters: Some(20.0),
        ..Default::default()
    };

    {
        let seed = store.most_recent("truck").unwrap();
        let mut filter =
            MultiCriterionFilter::new(thresholds, seed, |s: &Position| store.insert(s)).unwrap();

        // stationary for 3 minutes, reported every 10s
        for i in 0..18 {
            filter
                .offer(Position::new("truck", t(i * 10), 40.0, -105.0))
                .unwrap();
        }
    }

    // t=0 (first), t=70 and t=140 (time criterion)
    let kept = store.positions_for_track("truck").unwrap();
    let times: Vec<_> = kept.iter().map(|p| p.timestamp).collect();
    assert_eq!(times, vec![t(0), t(70), t(140)]);
}

#[test]
fn test_daily_counts_from_sqlite() {
    let (mut store, _dir, _) = setup_store();
    // 30 samples every 10 minutes from 2024-06-01 20:00 UTC
    let night: Vec<Position> = (0..30)
        .map(|i| Position::new("truck", t(20 * 3600 + i * 600), 40.0, -105.0))
        .collect();
    store.insert_batch(&night).unwrap();

    // UTC-6: local midnight is 06:00 UTC, so all samples fall on June 1 local
    let mountain = FixedOffset::west_opt(6 * 3600).unwrap();
    let june_1 = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
    assert_eq!(dates_with_data(&store, "truck", mountain).unwrap(), vec![june_1]);
    assert_eq!(position_count_for_day(&store, "truck", june_1, mountain).unwrap(), 30);

    // in UTC the run crosses midnight after 24 samples
    let utc = FixedOffset::east_opt(0).unwrap();
    let june_2 = june_1.succ_opt().unwrap();
    assert_eq!(dates_with_data(&store, "truck", utc).unwrap(), vec![june_1, june_2]);
    assert_eq!(position_count_for_day(&store, "truck", june_1, utc).unwrap(), 24);
    assert_eq!(position_count_for_day(&store, "truck", june_2, utc).unwrap(), 6);
}
