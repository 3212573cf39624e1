//! Kickr Racer - smart trainer control and ghost racing
//!
//! Drives an FTMS smart trainer over BLE, simulates rider progress along an
//! imported route from live power, and races the rider against a recorded
//! ghost of the course's best run.

pub mod racing;
pub mod sensors;
pub mod storage;
pub mod world;

// Re-export commonly used types
pub use racing::engine::RaceEngine;
pub use racing::session::RaceSession;
pub use sensors::trainer::TrainerController;
pub use storage::config::AppConfig;
pub use storage::database::{CourseStore, Database};
pub use world::route::Route;
