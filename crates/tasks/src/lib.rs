//! Supervision for long-running service tasks: spawn critical tasks, watch
//! for the first failure, and fan a shutdown signal out to everything else.

mod manager;
mod shutdown;

pub use manager::{TaskError, TaskExecutor, TaskManager};
pub use shutdown::{ShutdownGuard, ShutdownSignal};
