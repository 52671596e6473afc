// Integration tests: several simulated instances sharing one store

#[path = "../test_utils.rs"]
mod test_utils;

mod batch_scenario_tests;
mod lock_tests;
mod redis_tests;
