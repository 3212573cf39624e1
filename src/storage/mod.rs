//! Storage module for the course store and configuration.

pub mod config;
pub mod database;
pub mod schema;

pub use config::{AppConfig, ConfigError, RaceSettings, RiderSettings, TrainerSettings};
pub use database::{CourseStore, CourseSummary, Database, DatabaseError, PersistenceError, RunRecord};
