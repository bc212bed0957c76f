use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use hosh_config::RegistryConfig;
use hosh_primitives::{Module, Target};
use serde::Deserialize;
use tracing::*;

use crate::{RegistryError, TargetRegistry};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Registry adapter over the ClickHouse HTTP interface.
pub struct ClickHouseRegistry {
    http: reqwest::Client,
    url: String,
    database: String,
    user: String,
    password: String,
}

/// One `targets` row in `FORMAT JSONEachRow`.
#[derive(Debug, Deserialize)]
struct TargetRow {
    hostname: String,
    module: Module,
    #[serde(default)]
    port: Option<u16>,
    #[serde(default)]
    user_submitted: u8,
    #[serde(default)]
    last_queued_at: Option<String>,
    #[serde(default)]
    last_checked_at: Option<String>,
    #[serde(default)]
    version: Option<String>,
}

impl ClickHouseRegistry {
    pub fn new(config: &RegistryConfig) -> Result<Self, RegistryError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            url: config.url.clone(),
            database: config.database.clone(),
            user: config.user.clone(),
            password: config.password.clone(),
        })
    }

    async fn execute(&self, query: String) -> Result<String, RegistryError> {
        let resp = self
            .http
            .post(&self.url)
            .query(&[("database", self.database.as_str())])
            .header("X-ClickHouse-User", &self.user)
            .header("X-ClickHouse-Key", &self.password)
            .body(query)
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(RegistryError::Status {
                code: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }
}

#[async_trait]
impl TargetRegistry for ClickHouseRegistry {
    async fn list_targets(&self, module: Module) -> Result<Vec<Target>, RegistryError> {
        let query = format!(
            "SELECT hostname, module, port, user_submitted, \
             last_queued_at, last_checked_at, version \
             FROM targets WHERE module = '{module}' FORMAT JSONEachRow"
        );
        let body = self.execute(query).await?;

        let mut targets = Vec::new();
        for line in body.lines().filter(|l| !l.trim().is_empty()) {
            let row: TargetRow = serde_json::from_str(line)?;
            targets.push(row.into_target());
        }
        debug!(%module, count = targets.len(), "listed registry targets");
        Ok(targets)
    }

    async fn mark_queued(
        &self,
        hostname: &str,
        module: Module,
        at: DateTime<Utc>,
    ) -> Result<(), RegistryError> {
        let query = format!(
            "ALTER TABLE targets UPDATE last_queued_at = toDateTime({}) \
             WHERE hostname = '{}' AND module = '{}'",
            at.timestamp(),
            escape(hostname),
            module,
        );
        self.execute(query).await?;
        Ok(())
    }
}

impl TargetRow {
    fn into_target(self) -> Target {
        Target {
            hostname: self.hostname,
            module: self.module,
            port: self.port.filter(|p| *p != 0),
            user_submitted: self.user_submitted != 0,
            last_queued_at: parse_timestamp(self.last_queued_at.as_deref()),
            last_checked_at: parse_timestamp(self.last_checked_at.as_deref()),
            version: self.version.filter(|v| !v.is_empty() && v != "unknown"),
        }
    }
}

/// Parses a ClickHouse `DateTime` column value. The epoch zero value means
/// "never" on non-nullable columns.
fn parse_timestamp(value: Option<&str>) -> Option<DateTime<Utc>> {
    let raw = value?;
    let parsed = NaiveDateTime::parse_from_str(raw, DATETIME_FORMAT).ok()?;
    let ts = parsed.and_utc();
    (ts.timestamp() != 0).then_some(ts)
}

/// Escapes a string literal for interpolation into a ClickHouse query.
fn escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}
