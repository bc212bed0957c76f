use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Protocol family a target is checked with.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Module {
    /// Electrum-protocol Bitcoin servers.
    Btc,
    /// lightwalletd gRPC Zcash servers.
    Zec,
    /// Block-explorer HTTP endpoints.
    Http,
}

impl Module {
    pub const ALL: [Module; 3] = [Module::Btc, Module::Zec, Module::Http];

    pub fn as_str(&self) -> &'static str {
        match self {
            Module::Btc => "btc",
            Module::Zec => "zec",
            Module::Http => "http",
        }
    }

    /// Port assumed when a target row carries none.
    pub fn default_port(&self) -> u16 {
        match self {
            Module::Btc => 50002,
            Module::Zec => 9067,
            Module::Http => 443,
        }
    }

    /// Queue group the module's workers subscribe in.
    pub fn queue_group(&self) -> String {
        format!("{}_checkers", self.as_str())
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown module '{0}'")]
pub struct ParseModuleError(String);

impl FromStr for Module {
    type Err = ParseModuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "btc" => Ok(Module::Btc),
            "zec" => Ok(Module::Zec),
            "http" => Ok(Module::Http),
            other => Err(ParseModuleError(other.to_string())),
        }
    }
}
