//! Unit tests for the power to speed solver.

use kickr_racer::world::physics::{
    lbs_to_kg, mps_to_mph, power_from_speed, speed_from_power, PhysicsEngine,
    MAX_SOLVER_SPEED_MPS,
};

fn rider() -> PhysicsEngine {
    PhysicsEngine::from_weight_lbs(175.0)
}

#[test]
fn test_solver_inverts_power_required() {
    let physics = rider();
    for &gradient in &[-15.0, -4.0, 0.0, 3.0, 8.0, 15.0] {
        for &watts in &[25.0, 80.0, 200.0, 400.0, 600.0] {
            let speed = physics.speed_from_power(watts, gradient);
            let back = physics.power_required(speed, gradient);
            assert!(
                (back - watts).abs() < 1e-2,
                "{}W at {}% solved to {} m/s, which needs {}W",
                watts,
                gradient,
                speed,
                back
            );
        }
    }
}

#[test]
fn test_speed_rises_with_power() {
    let physics = rider();
    let mut previous = 0.0;
    for watts in (50..=500).step_by(50) {
        let speed = physics.speed_from_power(watts as f64, 2.0);
        assert!(speed > previous);
        previous = speed;
    }
}

#[test]
fn test_speed_falls_with_gradient() {
    let physics = rider();
    let flat = physics.speed_from_power(250.0, 0.0);
    let climb = physics.speed_from_power(250.0, 6.0);
    let descent = physics.speed_from_power(250.0, -3.0);
    assert!(climb < flat);
    assert!(descent > flat);
}

#[test]
fn test_heavier_rider_climbs_slower() {
    let light = PhysicsEngine::from_weight_lbs(130.0).speed_from_power(250.0, 7.0);
    let heavy = PhysicsEngine::from_weight_lbs(220.0).speed_from_power(250.0, 7.0);
    assert!(heavy < light);
}

#[test]
fn test_no_power_means_no_speed() {
    assert_eq!(rider().speed_from_power(0.0, 0.0), 0.0);
    assert_eq!(rider().speed_from_power(-20.0, 0.0), 0.0);
}

#[test]
fn test_speed_stays_within_solver_bracket() {
    let speed = rider().speed_from_power(5000.0, -10.0);
    assert!(speed <= MAX_SOLVER_SPEED_MPS);
}

#[test]
fn test_flat_200w_is_a_plausible_pace() {
    let mph = mps_to_mph(rider().speed_from_power(200.0, 0.0));
    assert!(mph > 18.0 && mph < 23.0, "got {} mph", mph);
}

#[test]
fn test_free_functions_match_engine() {
    let mass = lbs_to_kg(175.0);
    let engine = rider();
    assert!((speed_from_power(200.0, 1.0, mass) - engine.speed_from_power(200.0, 1.0)).abs() < 1e-12);
    assert!((power_from_speed(9.0, 1.0, mass) - engine.power_required(9.0, 1.0)).abs() < 1e-12);
}

#[test]
fn test_unit_conversions() {
    assert!((lbs_to_kg(100.0) - 45.3592).abs() < 1e-9);
    assert!((mps_to_mph(10.0) - 22.3694).abs() < 1e-9);
}
