use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{module::Module, target::Target};

/// A check request as published on `check.<module>`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CheckRequest {
    pub host: String,
    pub port: u16,
    pub module: Module,
    /// Correlation id, unique per emission. Downstream de-duplicates
    /// redelivered results by this id.
    pub check_id: String,
    #[serde(default)]
    pub user_submitted: bool,
    #[serde(default)]
    pub dry_run: bool,
    /// Module-specific hint, e.g. the advertised Electrum version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl CheckRequest {
    /// Builds a request for a registry target with a freshly minted id.
    pub fn for_target(target: &Target) -> Self {
        Self {
            host: target.hostname.clone(),
            port: target.port(),
            module: target.module,
            check_id: Uuid::new_v4().to_string(),
            user_submitted: target.user_submitted,
            dry_run: false,
            version: target.version.clone(),
        }
    }
}
