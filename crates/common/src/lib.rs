//! Reusable utils for services that handle common behavior, such as
//! initializing the tracing framework and env parsing.

pub mod env;
pub mod logging;
