//! Worker runtime: consumes check requests off the bus in a queue group,
//! drives the module's probe with a bounded in-flight pool, and publishes
//! stamped results.

mod worker;

pub use worker::{execute_probe, run_worker};
