use std::path::Path;

use hosh_common::env::{parse_env_or, read_env};
use hosh_primitives::Module;
use serde::Deserialize;
use thiserror::Error;

use crate::explorers::{default_explorers, ExplorerConfig};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Deserialize)]
pub struct BusConfig {
    /// NATS server url.
    #[serde(default = "default_bus_url")]
    pub url: String,
    /// Subject prefix, trailing dot included.
    #[serde(default = "default_subject_prefix")]
    pub prefix: String,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            url: default_bus_url(),
            prefix: default_subject_prefix(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TorConfig {
    #[serde(default = "default_tor_host")]
    pub proxy_host: String,
    #[serde(default = "default_tor_port")]
    pub proxy_port: u16,
}

impl TorConfig {
    pub fn proxy_addr(&self) -> String {
        format!("{}:{}", self.proxy_host, self.proxy_port)
    }
}

impl Default for TorConfig {
    fn default() -> Self {
        Self {
            proxy_host: default_tor_host(),
            proxy_port: default_tor_port(),
        }
    }
}

/// Where the chronicler-owned target registry is reachable.
#[derive(Debug, Clone, Deserialize)]
pub struct RegistryConfig {
    #[serde(default = "default_registry_url")]
    pub url: String,
    #[serde(default = "default_registry_db")]
    pub database: String,
    #[serde(default = "default_registry_user")]
    pub user: String,
    #[serde(default)]
    pub password: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            url: default_registry_url(),
            database: default_registry_db(),
            user: default_registry_user(),
            password: String::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PublisherConfig {
    /// Scan period, seconds.
    #[serde(default = "default_publish_interval")]
    pub publish_interval: u64,
    /// Staleness threshold for scheduled targets, seconds.
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval: u64,
    /// Window during which a queued-but-unchecked target counts as in flight.
    #[serde(default = "default_in_flight_ttl")]
    pub in_flight_ttl: u64,
    /// Recheck window for user-submitted targets, seconds.
    #[serde(default = "default_user_recheck_window")]
    pub user_recheck_window: u64,
    /// Delay before retrying a cycle after a registry read failure.
    #[serde(default = "default_cycle_retry_delay")]
    pub cycle_retry_delay: u64,
    /// Modules this publisher instance schedules.
    #[serde(default = "default_modules")]
    pub modules: Vec<Module>,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            publish_interval: default_publish_interval(),
            refresh_interval: default_refresh_interval(),
            in_flight_ttl: default_in_flight_ttl(),
            user_recheck_window: default_user_recheck_window(),
            cycle_retry_delay: default_cycle_retry_delay(),
            modules: default_modules(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckerConfig {
    /// Bound on concurrently running probes per worker.
    #[serde(default = "default_max_concurrent_checks")]
    pub max_concurrent_checks: usize,
    /// Overall wall-clock budget per probe, seconds.
    #[serde(default = "default_probe_budget")]
    pub probe_budget: u64,
    /// Result publish attempts before giving up on a message.
    #[serde(default = "default_publish_retry_max")]
    pub publish_retry_max: u32,
    #[serde(default = "default_checker_id")]
    pub checker_id: String,
    #[serde(default = "default_checker_location")]
    pub location: String,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_checks: default_max_concurrent_checks(),
            probe_budget: default_probe_budget(),
            publish_retry_max: default_publish_retry_max(),
            checker_id: default_checker_id(),
            location: default_checker_location(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub bus: BusConfig,
    #[serde(default)]
    pub tor: TorConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub publisher: PublisherConfig,
    #[serde(default)]
    pub checker: CheckerConfig,
    #[serde(default = "default_explorers")]
    pub explorers: Vec<ExplorerConfig>,
}

impl Config {
    /// Loads a TOML config file and applies env overrides on top.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&raw)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Defaults plus env overrides, for running without a config file.
    pub fn from_env() -> Self {
        let mut config = Config {
            explorers: default_explorers(),
            ..Default::default()
        };
        config.apply_env_overrides();
        config
    }

    /// Env vars win over file contents; names match the deployment tooling.
    pub fn apply_env_overrides(&mut self) {
        if let Some(url) = read_env("NATS_URL") {
            self.bus.url = url;
        }
        if let Some(prefix) = read_env("NATS_PREFIX") {
            self.bus.prefix = prefix;
        }
        if let Some(host) = read_env("TOR_PROXY_HOST") {
            self.tor.proxy_host = host;
        }
        self.tor.proxy_port = parse_env_or("TOR_PROXY_PORT", self.tor.proxy_port);
        self.publisher.publish_interval =
            parse_env_or("CHECK_INTERVAL", self.publisher.publish_interval);
        self.publisher.refresh_interval = parse_env_or(
            "SERVER_REFRESH_INTERVAL_SECONDS",
            self.publisher.refresh_interval,
        );
        if let Some(url) = read_env("CLICKHOUSE_URL") {
            self.registry.url = url;
        }
        if let Some(db) = read_env("CLICKHOUSE_DB") {
            self.registry.database = db;
        }
        if let Some(user) = read_env("CLICKHOUSE_USER") {
            self.registry.user = user;
        }
        if let Some(password) = read_env("CLICKHOUSE_PASSWORD") {
            self.registry.password = password;
        }
        if let Some(id) = read_env("CHECKER_ID") {
            self.checker.checker_id = id;
        }
        if let Some(location) = read_env("CHECKER_LOCATION") {
            self.checker.location = location;
        }
    }
}

fn default_bus_url() -> String {
    "nats://nats:4222".to_string()
}

fn default_subject_prefix() -> String {
    "hosh.".to_string()
}

fn default_tor_host() -> String {
    "tor".to_string()
}

fn default_tor_port() -> u16 {
    9050
}

fn default_registry_url() -> String {
    "http://chronicler:8123".to_string()
}

fn default_registry_db() -> String {
    "hosh".to_string()
}

fn default_registry_user() -> String {
    "hosh".to_string()
}

fn default_publish_interval() -> u64 {
    300
}

fn default_refresh_interval() -> u64 {
    300
}

fn default_in_flight_ttl() -> u64 {
    120
}

fn default_user_recheck_window() -> u64 {
    60
}

fn default_cycle_retry_delay() -> u64 {
    10
}

fn default_modules() -> Vec<Module> {
    Module::ALL.to_vec()
}

fn default_max_concurrent_checks() -> usize {
    32
}

fn default_probe_budget() -> u64 {
    45
}

fn default_publish_retry_max() -> u32 {
    5
}

fn default_checker_id() -> String {
    "hosh-checker".to_string()
}

fn default_checker_location() -> String {
    "unknown".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_load() {
        let config_string = r#"
            [bus]
            url = "nats://localhost:4222"
            prefix = "hosh."

            [tor]
            proxy_host = "127.0.0.1"
            proxy_port = 9150

            [registry]
            url = "http://localhost:8123"
            database = "hosh"
            user = "hosh"
            password = "secret"

            [publisher]
            publish_interval = 60
            refresh_interval = 300
            in_flight_ttl = 120
            modules = ["btc", "zec"]

            [checker]
            max_concurrent_checks = 16
            probe_budget = 45
            location = "eu-west"

            [[explorers]]
            explorer_id = "mempool.space"
            chain = "btc"
            url = "https://mempool.space/api/blocks/tip/height"
            extractor = { type = "regex", pattern = '(\d+)' }
        "#;

        let config = toml::from_str::<Config>(config_string);
        assert!(
            config.is_ok(),
            "should be able to load TOML config but got: {:?}",
            config.err()
        );
        let config = config.unwrap();
        assert_eq!(config.publisher.modules, vec![Module::Btc, Module::Zec]);
        assert_eq!(config.checker.max_concurrent_checks, 16);
        assert_eq!(config.explorers.len(), 1);
    }

    #[test]
    fn test_empty_config_is_runnable() {
        let config = toml::from_str::<Config>("").expect("empty config should parse");
        assert_eq!(config.bus.url, "nats://nats:4222");
        assert_eq!(config.bus.prefix, "hosh.");
        assert_eq!(config.tor.proxy_addr(), "tor:9050");
        assert_eq!(config.publisher.in_flight_ttl, 120);
        assert_eq!(config.checker.max_concurrent_checks, 32);
        assert!(
            !config.explorers.is_empty(),
            "stock explorer catalogue should apply"
        );
    }
}
