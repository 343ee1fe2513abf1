//! Helpers shared by the test suites of the workspace.

pub mod database;
pub mod recording;

/// Print `tracing` events (through their `log` records) with `env_logger`.
/// Safe to call from every test.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
