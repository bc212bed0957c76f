//! Read/update access to the chronicler-owned target registry.
//!
//! The pipeline only ever touches two columns: the publisher advances
//! `last_queued_at`, everything else belongs to discovery and the
//! chronicler.

mod clickhouse;
mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hosh_primitives::{Module, Target};
use thiserror::Error;

pub use clickhouse::ClickHouseRegistry;
pub use memory::MemoryRegistry;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("registry request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("registry returned status {code}: {body}")]
    Status { code: u16, body: String },
    #[error("failed to decode registry row: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("no such target {host} ({module})")]
    UnknownTarget { host: String, module: Module },
}

/// The scheduling view of the target registry.
#[async_trait]
pub trait TargetRegistry: Send + Sync {
    /// All targets of one module, regardless of staleness.
    async fn list_targets(&self, module: Module) -> Result<Vec<Target>, RegistryError>;

    /// Advances `last_queued_at`; called before the matching request is
    /// published so a crash in between costs a cycle, not a duplicate storm.
    async fn mark_queued(
        &self,
        hostname: &str,
        module: Module,
        at: DateTime<Utc>,
    ) -> Result<(), RegistryError>;
}
