//! Unit test modules.

mod physics_test;
mod race_results_test;
mod route_test;
