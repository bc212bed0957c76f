use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hosh_primitives::{Module, Target};
use tokio::sync::Mutex;

use crate::{RegistryError, TargetRegistry};

/// In-memory registry for tests and local development.
#[derive(Default)]
pub struct MemoryRegistry {
    targets: Mutex<HashMap<(String, Module), Target>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, target: Target) {
        let key = (target.hostname.clone(), target.module);
        self.targets.lock().await.insert(key, target);
    }

    pub async fn get(&self, hostname: &str, module: Module) -> Option<Target> {
        self.targets
            .lock()
            .await
            .get(&(hostname.to_string(), module))
            .cloned()
    }

    /// Chronicler stand-in: advances `last_checked_at`.
    pub async fn set_checked(&self, hostname: &str, module: Module, at: DateTime<Utc>) {
        if let Some(t) = self
            .targets
            .lock()
            .await
            .get_mut(&(hostname.to_string(), module))
        {
            t.last_checked_at = Some(at);
        }
    }
}

#[async_trait]
impl TargetRegistry for MemoryRegistry {
    async fn list_targets(&self, module: Module) -> Result<Vec<Target>, RegistryError> {
        let mut targets: Vec<Target> = self
            .targets
            .lock()
            .await
            .values()
            .filter(|t| t.module == module)
            .cloned()
            .collect();
        targets.sort_by(|a, b| a.hostname.cmp(&b.hostname));
        Ok(targets)
    }

    async fn mark_queued(
        &self,
        hostname: &str,
        module: Module,
        at: DateTime<Utc>,
    ) -> Result<(), RegistryError> {
        let mut targets = self.targets.lock().await;
        let target = targets
            .get_mut(&(hostname.to_string(), module))
            .ok_or_else(|| RegistryError::UnknownTarget {
                host: hostname.to_string(),
                module,
            })?;
        target.last_queued_at = Some(at);
        Ok(())
    }
}
