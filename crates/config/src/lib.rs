//! Service configuration: TOML files with usable defaults, plus env-var
//! overrides for the knobs the deployment tooling sets.

mod config;
mod explorers;

pub use config::{
    BusConfig, CheckerConfig, Config, ConfigError, PublisherConfig, RegistryConfig, TorConfig,
};
pub use explorers::{default_explorers, ExplorerConfig, ExtractorSpec};
