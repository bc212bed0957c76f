//! Core types shared across the check pipeline: scheduling targets, bus wire
//! contracts, probe reports, and the probe trait the workers drive.

pub mod check;
pub mod module;
pub mod probe;
pub mod result;
pub mod target;

pub use check::CheckRequest;
pub use module::Module;
pub use probe::Probe;
pub use result::{CheckerIdentity, ErrorKind, ProbeReport, ProbeResult, Status};
pub use target::Target;
