use async_trait::async_trait;

use crate::{check::CheckRequest, module::Module, result::ProbeReport};

/// A protocol-specific prober the worker runtime drives.
///
/// Implementations never return errors to the caller: every failure mode is
/// folded into the report's taxonomy so the worker can publish it.
#[async_trait]
pub trait Probe: Send + Sync {
    /// Module whose requests this probe understands.
    fn module(&self) -> Module;

    /// Runs one check. Must respect its own per-operation deadlines; the
    /// worker additionally enforces the overall probe budget.
    async fn probe(&self, request: &CheckRequest) -> ProbeReport;
}
