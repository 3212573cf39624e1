//! Unit tests for record comparison, lap selection and pace scoring.

use kickr_racer::racing::checkpoint::{evenly_spaced, CheckpointTracker};
use kickr_racer::racing::ghost::RecordRun;
use kickr_racer::racing::results::{is_new_record, LapResult, PaceScore, RunSubmission};

fn lap(lap_number: u32, lap_time: f64, completed: bool) -> LapResult {
    LapResult {
        lap_number,
        lap_time,
        checkpoint_times: Vec::new(),
        completed,
    }
}

fn record(total_time: f64) -> RecordRun {
    RecordRun {
        runner_name: "holder".to_string(),
        total_time,
        checkpoint_times: Vec::new(),
    }
}

#[test]
fn test_first_run_sets_record() {
    assert!(is_new_record(999.0, None));
}

#[test]
fn test_faster_run_beats_record() {
    assert!(is_new_record(119.9, Some(&record(120.0))));
}

#[test]
fn test_tie_keeps_holder() {
    assert!(!is_new_record(120.0, Some(&record(120.0))));
}

#[test]
fn test_fraction_faster_is_record() {
    assert!(!is_new_record(100.0, Some(&record(100.0))));
    assert!(is_new_record(99.999, Some(&record(100.0))));
}

#[test]
fn test_slower_run_loses() {
    assert!(!is_new_record(121.0, Some(&record(120.0))));
}

#[test]
fn test_fastest_completed_lap_is_candidate() {
    let run = RunSubmission {
        runner_name: "Ada".to_string(),
        total_time: 400.0,
        laps: vec![lap(1, 140.0, true), lap(2, 125.0, true), lap(3, 60.0, false)],
    };

    let candidate = run.record_candidate().unwrap();
    assert_eq!(candidate.total_time, 125.0);
    assert_eq!(candidate.runner_name, "Ada");
}

#[test]
fn test_no_completed_lap_means_no_candidate() {
    let run = RunSubmission {
        runner_name: "Ada".to_string(),
        total_time: 30.0,
        laps: vec![lap(1, 30.0, false)],
    };
    assert!(run.record_candidate().is_none());
}

#[test]
fn test_pace_closeness() {
    assert_eq!(PaceScore::closeness(200.0, 200.0), 1.0);
    assert!((PaceScore::closeness(150.0, 200.0) - 0.75).abs() < 1e-12);
    assert_eq!(PaceScore::closeness(600.0, 200.0), 0.0);
}

#[test]
fn test_pace_points_accumulate() {
    let mut pace = PaceScore::new();
    for _ in 0..10 {
        pace.accrue(200.0, 200.0, 1.0);
    }
    assert!((pace.points() - 100.0).abs() < 1e-9);

    let score = pace.to_high_score("Ada").unwrap();
    assert_eq!(score.name, "Ada");
    assert_eq!(score.points, 100);
}

#[test]
fn test_no_points_no_high_score() {
    assert!(PaceScore::new().to_high_score("Ada").is_none());
}

#[test]
fn test_checkpoints_cross_in_order() {
    let mut tracker = CheckpointTracker::new(evenly_spaced(3.0, 2));
    assert_eq!(tracker.advance(0.5, 10.0), 0);

    // One tick past both checkpoints records both at the same time
    assert_eq!(tracker.advance(2.5, 40.0), 2);
    assert_eq!(tracker.next_index(), 2);

    let times = tracker.times();
    assert_eq!(times.len(), 2);
    assert_eq!(times[0].time, 40.0);
    assert!((times[0].distance - 1.0).abs() < 1e-12);
    assert!((times[1].distance - 2.0).abs() < 1e-12);
}

#[test]
fn test_tracker_reset_returns_lap_times() {
    let mut tracker = CheckpointTracker::new(evenly_spaced(2.0, 1));
    tracker.advance(1.2, 30.0);

    let times = tracker.reset();
    assert_eq!(times.len(), 1);
    assert_eq!(tracker.next_index(), 0);
    assert!(tracker.times().is_empty());
}
