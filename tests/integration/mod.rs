//! Integration test modules.

mod course_store_test;
mod race_end_to_end_test;
mod trainer_mock;
