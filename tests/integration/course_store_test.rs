//! Course store round trips, record rules and GPX course import on disk.

use super::trainer_mock::steady_course;
use kickr_racer::racing::checkpoint::CheckpointTime;
use kickr_racer::racing::ghost::RecordRun;
use kickr_racer::racing::results::{HighScore, LapResult, RunSubmission};
use kickr_racer::storage::database::{CourseStore, Database, DatabaseError};
use kickr_racer::world::course::Course;
use kickr_racer::world::import::import_gpx_file;
use tempfile::tempdir;

fn submission(name: &str, lap_times: &[(f64, bool)]) -> RunSubmission {
    RunSubmission {
        runner_name: name.to_string(),
        total_time: lap_times.iter().map(|(t, _)| t).sum(),
        laps: lap_times
            .iter()
            .enumerate()
            .map(|(i, &(lap_time, completed))| LapResult {
                lap_number: i as u32 + 1,
                lap_time,
                checkpoint_times: vec![CheckpointTime {
                    percent: 0.5,
                    time: lap_time / 2.0,
                    distance: 1.0,
                }],
                completed,
            })
            .collect(),
    }
}

fn seeded() -> Database {
    let db = Database::open_in_memory().unwrap();
    db.insert_course(&steady_course("loop", 2.0, 1.0)).unwrap();
    db
}

#[test]
fn test_course_round_trip() {
    let db = seeded();
    let course = db.load_course("loop").unwrap().unwrap();

    assert_eq!(course.name, "loop course");
    assert_eq!(course.total_distance(), 2.0);
    assert_eq!(course.checkpoints.len(), 1);
    assert_eq!(db.load_route("loop").unwrap(), course.route);
    assert!(db.load_record_run("loop").unwrap().is_none());
}

#[test]
fn test_unknown_course() {
    let db = seeded();
    assert!(db.load_course("nope").unwrap().is_none());
    assert!(matches!(
        db.load_route("nope"),
        Err(DatabaseError::NotFound(_))
    ));
}

#[test]
fn test_record_only_replaced_by_faster_lap() {
    let db = seeded();

    assert!(db.save_run("loop", &submission("Ada", &[(600.0, true)])).unwrap());
    assert!(!db.save_run("loop", &submission("Lin", &[(600.0, true)])).unwrap());
    assert!(!db.save_run("loop", &submission("Lin", &[(650.0, true)])).unwrap());
    assert!(db.save_run("loop", &submission("Lin", &[(640.0, true), (590.0, true)])).unwrap());

    let record = db.load_record_run("loop").unwrap().unwrap();
    assert_eq!(record.runner_name, "Lin");
    assert_eq!(record.total_time, 590.0);
    assert_eq!(record.checkpoint_times[0].time, 295.0);

    let runs = db.list_runs("loop").unwrap();
    assert_eq!(runs.len(), 4);
    assert!(runs[0].new_record);
    assert_eq!(runs[0].best_lap_time, Some(590.0));

    let summary = &db.list_courses().unwrap()[0];
    assert_eq!(summary.record_time, Some(590.0));
}

#[test]
fn test_incomplete_run_never_becomes_record() {
    let db = seeded();
    assert!(!db.save_run("loop", &submission("Ada", &[(30.0, false)])).unwrap());
    assert!(db.load_record_run("loop").unwrap().is_none());
    assert_eq!(db.list_runs("loop").unwrap()[0].best_lap_time, None);
}

#[test]
fn test_legacy_record_is_migrated_on_load() {
    let db = seeded();
    db.connection()
        .execute(
            "UPDATE courses SET record_json = ?1 WHERE id = 'loop'",
            [r#"{"runnerName":"Old","totalTime":700.0,"checkpointTimes":[{"mile":0.5,"time":330.0}]}"#],
        )
        .unwrap();

    let record = db.load_record_run("loop").unwrap().unwrap();
    assert_eq!(record.checkpoint_times[0].distance, 1.0);

    // A migrated record still has to be beaten
    assert!(!db.save_run("loop", &submission("Ada", &[(700.0, true)])).unwrap());
    assert!(db.save_run("loop", &submission("Ada", &[(699.0, true)])).unwrap());
}

#[test]
fn test_set_record_run_on_missing_course() {
    let db = seeded();
    let record = RecordRun {
        runner_name: "x".to_string(),
        total_time: 1.0,
        checkpoint_times: Vec::new(),
    };
    assert!(matches!(
        db.set_record_run("missing", &record),
        Err(DatabaseError::NotFound(_))
    ));
}

#[test]
fn test_high_scores_ranked() {
    let db = seeded();
    for (name, points) in [("Ada", 120), ("Lin", 340), ("Bo", 90)] {
        db.save_high_score(
            "loop",
            &HighScore {
                name: name.to_string(),
                points,
            },
        )
        .unwrap();
    }

    let top = db.top_high_scores("loop", 2).unwrap();
    assert_eq!(top.len(), 2);
    assert_eq!(top[0].name, "Lin");
    assert_eq!(top[1].points, 120);
}

#[test]
fn test_imported_gpx_course_persists_across_reopen() {
    let dir = tempdir().unwrap();
    let gpx_path = dir.path().join("ridge.gpx");
    std::fs::write(
        &gpx_path,
        r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="test" xmlns="http://www.topografix.com/GPX/1/1">
  <trk><name>Ridge</name><trkseg>
    <trkpt lat="46.0" lon="8.0"><ele>400</ele></trkpt>
    <trkpt lat="46.005" lon="8.0"><ele>420</ele></trkpt>
    <trkpt lat="46.01" lon="8.0"><ele>410</ele></trkpt>
  </trkseg></trk>
</gpx>"#,
    )
    .unwrap();

    let imported = import_gpx_file(&gpx_path).unwrap();
    let course = Course::with_checkpoint_count("ridge", "Ridge", imported.route, 3);

    let db_path = dir.path().join("courses.db");
    {
        let db = Database::open(&db_path).unwrap();
        db.insert_course(&course).unwrap();
        assert!(db.insert_course(&course).is_err());
    }

    let db = Database::open(&db_path).unwrap();
    let loaded = db.load_course("ridge").unwrap().unwrap();
    assert_eq!(loaded.route, course.route);
    assert_eq!(loaded.checkpoints.len(), 3);
    assert!(loaded.route.gradient_at(0.1).unwrap() > 0.0);
    assert!(loaded.route.gradient_at(loaded.total_distance() - 0.01).unwrap() < 0.0);
}
