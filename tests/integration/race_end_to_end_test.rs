//! End-to-end races driven tick by tick through the engine.

use super::trainer_mock::{steady_course, steady_route};
use kickr_racer::racing::engine::{RaceConfig, RaceEngine, RacePhase};
use kickr_racer::racing::results::is_new_record;
use kickr_racer::world::physics::{PhysicsEngine, MPS_TO_MPH};

const TICK: f64 = 0.1;

fn config() -> RaceConfig {
    RaceConfig {
        runner_name: "Ada".to_string(),
        rider_weight_lbs: 175.0,
        countdown_secs: 0,
        ..RaceConfig::default()
    }
}

/// Tick until the race completes, returning the number of ticks.
fn ride(engine: &mut RaceEngine, watts: f64) -> usize {
    engine.start_countdown().unwrap();
    engine.update_power(watts);

    let mut ticks = 0;
    while engine.phase() != RacePhase::Complete {
        engine.tick(TICK);
        ticks += 1;
        assert!(ticks < 1_000_000, "race never completed");
    }
    ticks
}

#[test]
fn test_flat_mile_matches_physics() {
    let course = steady_course("flat", 1.0, 0.0);
    let mut engine = RaceEngine::from_course(&course, None, config()).unwrap();
    ride(&mut engine, 200.0);

    let mph = PhysicsEngine::from_weight_lbs(175.0).speed_from_power(200.0, 0.0) * MPS_TO_MPH;
    let expected = 3600.0 / mph;
    let actual = engine.state().elapsed_time;

    assert!(
        (actual - expected).abs() / expected < 0.05,
        "took {:.1}s, expected about {:.1}s",
        actual,
        expected
    );
    assert!(engine.state().rider_finished);
    assert_eq!(engine.state().distance_covered, 1.0);
    assert_eq!(engine.state().checkpoint_times.len(), 1);
}

#[test]
fn test_climb_is_slower_than_flat() {
    let mut flat = RaceEngine::new(steady_route(0.5, 0.0), vec![], None, config()).unwrap();
    let mut climb = RaceEngine::new(steady_route(0.5, 5.0), vec![], None, config()).unwrap();
    ride(&mut flat, 250.0);
    ride(&mut climb, 250.0);

    assert!(climb.state().elapsed_time > flat.state().elapsed_time * 1.5);
}

#[test]
fn test_faster_rider_beats_ghost_and_sets_record() {
    let course = steady_course("ghosted", 0.5, 0.0);

    let mut first = RaceEngine::from_course(&course, None, config()).unwrap();
    let mut submission = None;
    first.start_countdown().unwrap();
    first.update_power(180.0);
    while first.phase() != RacePhase::Complete {
        if let Some(done) = first.tick(TICK).finished {
            submission = Some(done);
        }
    }
    let record = submission.unwrap().record_candidate().unwrap();
    assert_eq!(record.checkpoint_times.len(), 1);

    let mut rematch = RaceEngine::from_course(&course, Some(record.clone()), config()).unwrap();
    rematch.start_countdown().unwrap();
    rematch.update_power(260.0);

    let mut finished = None;
    let mut led_at_midpoint = false;
    while rematch.phase() != RacePhase::Complete {
        let outcome = rematch.tick(TICK);
        if !led_at_midpoint && rematch.state().distance_covered > 0.25 {
            led_at_midpoint =
                rematch.state().distance_covered > rematch.state().ghost_distance_covered;
        }
        if outcome.finished.is_some() {
            // Rider is ahead, so the ghost is still out on the course
            assert_eq!(rematch.phase(), RacePhase::RiderFinishedWaitingGhost);
            finished = outcome.finished;
        }
    }

    assert!(led_at_midpoint);
    let candidate = finished.unwrap().record_candidate().unwrap();
    assert!(candidate.total_time < record.total_time);
    assert!(is_new_record(candidate.total_time, Some(&record)));
    assert!(rematch.state().ghost_finished);
}

#[test]
fn test_slower_rider_trails_ghost() {
    let course = steady_course("chase", 0.3, 2.0);

    let mut fast = RaceEngine::from_course(&course, None, config()).unwrap();
    fast.start_countdown().unwrap();
    fast.update_power(300.0);
    let mut record = None;
    while fast.phase() != RacePhase::Complete {
        if let Some(done) = fast.tick(TICK).finished {
            record = done.record_candidate();
        }
    }
    let record = record.unwrap();

    let mut slow = RaceEngine::from_course(&course, Some(record.clone()), config()).unwrap();
    slow.start_countdown().unwrap();
    slow.update_power(150.0);
    for _ in 0..100 {
        slow.tick(TICK);
    }
    assert!(slow.state().ghost_distance_covered > slow.state().distance_covered);
    assert!(slow.state().ghost_gap_seconds > 0.0);

    let mut final_time = None;
    while slow.phase() != RacePhase::Complete {
        if let Some(done) = slow.tick(TICK).finished {
            // The ghost got home first
            assert_eq!(slow.phase(), RacePhase::Complete);
            final_time = Some(done.total_time);
        }
    }
    assert!(!is_new_record(final_time.unwrap(), Some(&record)));
}

#[test]
fn test_multi_lap_record_is_fastest_lap() {
    let cfg = RaceConfig { laps: 3, ..config() };
    let mut engine = RaceEngine::new(steady_route(0.1, 0.0), vec![], None, cfg).unwrap();
    engine.start_countdown().unwrap();

    let mut laps = Vec::new();
    let mut submission = None;
    let mut watts = 150.0;
    while engine.phase() != RacePhase::Complete {
        engine.update_power(watts);
        let outcome = engine.tick(TICK);
        if let Some(lap) = outcome.lap_completed {
            laps.push(lap);
            // Second lap is the fast one
            watts = if laps.len() == 1 { 350.0 } else { 150.0 };
        }
        if outcome.finished.is_some() {
            submission = outcome.finished;
        }
    }

    let submission = submission.unwrap();
    assert_eq!(laps.len(), 3);
    assert_eq!(submission.laps, laps);

    let candidate = submission.record_candidate().unwrap();
    assert_eq!(candidate.total_time, laps[1].lap_time);
    assert!((engine.state().total_distance_ridden - 0.3).abs() < 1e-9);
    assert!((submission.total_time - laps.iter().map(|l| l.lap_time).sum::<f64>()).abs() < 1e-6);
}

#[test]
fn test_checkpoint_times_strictly_increase() {
    let course = kickr_racer::world::course::Course::with_checkpoint_count(
        "marks",
        "Marks",
        steady_route(1.0, 1.0),
        4,
    );
    let mut engine = RaceEngine::from_course(&course, None, config()).unwrap();
    ride(&mut engine, 220.0);

    let times = &engine.state().checkpoint_times;
    assert_eq!(times.len(), 4);
    for pair in times.windows(2) {
        assert!(pair[1].time > pair[0].time);
        assert!(pair[1].distance > pair[0].distance);
    }
    assert_eq!(engine.state().next_checkpoint_index, 4);
}
