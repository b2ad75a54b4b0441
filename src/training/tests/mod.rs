//! End-to-end tests driving the control loop with the regression hook

pub mod integration_tests;

// Utility modules for testing
pub mod test_utils;
