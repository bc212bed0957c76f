use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::{stream::BoxStream, StreamExt};
use hosh_bus::{BusClient, Subjects};
use hosh_config::PublisherConfig;
use hosh_primitives::{target::classify_host, CheckRequest, Module, Target};
use hosh_registry::TargetRegistry;
use hosh_tasks::ShutdownGuard;
use serde::Deserialize;
use tracing::*;

use crate::policy::{evaluate, Staleness, StalenessPolicy};

/// Where emitted requests go. Seam for tests; the bus client is the real
/// implementation.
#[async_trait]
pub trait RequestSink: Send + Sync {
    async fn publish_request(&self, subject: &str, request: &CheckRequest) -> anyhow::Result<()>;
}

#[async_trait]
impl RequestSink for BusClient {
    async fn publish_request(&self, subject: &str, request: &CheckRequest) -> anyhow::Result<()> {
        self.publish_json(subject, request).await?;
        Ok(())
    }
}

/// What one scan did, for the cycle log line.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct CycleStats {
    pub scanned: usize,
    pub fresh: usize,
    pub in_flight: usize,
    pub published: usize,
}

/// Payload of `check.<module>.trigger`: one host, or everything when empty.
#[derive(Debug, Default, Deserialize)]
pub struct TriggerRequest {
    #[serde(default, alias = "url")]
    pub host: Option<String>,
}

pub struct Publisher<R, S> {
    registry: Arc<R>,
    sink: Arc<S>,
    subjects: Subjects,
    policy: StalenessPolicy,
    modules: Vec<Module>,
}

impl<R: TargetRegistry, S: RequestSink> Publisher<R, S> {
    pub fn new(
        registry: Arc<R>,
        sink: Arc<S>,
        subjects: Subjects,
        policy: StalenessPolicy,
        modules: Vec<Module>,
    ) -> Self {
        Self {
            registry,
            sink,
            subjects,
            policy,
            modules,
        }
    }

    /// One scan over every module this publisher owns. A registry read
    /// failure aborts the cycle; the task loop retries after a fixed delay.
    pub async fn run_cycle(&self, now: DateTime<Utc>) -> anyhow::Result<CycleStats> {
        let mut stats = CycleStats::default();

        for module in &self.modules {
            let mut targets = self.registry.list_targets(*module).await?;
            // Named hosts first, then hidden services, then bare IPs.
            targets.sort_by(|a, b| {
                classify_host(&a.hostname)
                    .cmp(&classify_host(&b.hostname))
                    .then_with(|| a.hostname.cmp(&b.hostname))
            });
            for target in targets {
                stats.scanned += 1;
                match evaluate(&self.policy, &target, now) {
                    Staleness::Fresh => stats.fresh += 1,
                    Staleness::InFlight => stats.in_flight += 1,
                    Staleness::Due => {
                        self.emit(&target, now).await?;
                        stats.published += 1;
                    }
                }
            }
        }

        Ok(stats)
    }

    /// On-demand emission, staleness gate bypassed. `host` narrows to one
    /// target; `None` hits every target of the module.
    pub async fn run_trigger(
        &self,
        module: Module,
        host: Option<&str>,
        now: DateTime<Utc>,
    ) -> anyhow::Result<usize> {
        let targets = self.registry.list_targets(module).await?;
        let mut published = 0;

        for target in targets {
            if host.is_some_and(|h| h != target.hostname) {
                continue;
            }
            self.emit(&target, now).await?;
            published += 1;
        }

        if let Some(host) = host {
            if published == 0 {
                warn!(%module, %host, "trigger matched no registry target");
            }
        }
        Ok(published)
    }

    async fn emit(&self, target: &Target, now: DateTime<Utc>) -> anyhow::Result<()> {
        let request = CheckRequest::for_target(target);

        // Advance last_queued_at before the publish: a crash in between
        // costs a skipped cycle, never a duplicate storm.
        self.registry
            .mark_queued(&target.hostname, target.module, now)
            .await?;

        let subject = if target.user_submitted && target.module == Module::Btc {
            self.subjects.check_user(target.module)
        } else {
            self.subjects.check(target.module)
        };
        self.sink.publish_request(&subject, &request).await?;

        debug!(
            host = %target.hostname,
            module = %target.module,
            check_id = %request.check_id,
            %subject,
            "queued check"
        );
        Ok(())
    }
}

/// The scheduler loop: periodic cycles plus trigger-subject handling, until
/// shutdown.
pub async fn publisher_task<R>(
    publisher: Arc<Publisher<R, BusClient>>,
    bus: BusClient,
    config: PublisherConfig,
    mut shutdown: ShutdownGuard,
) -> anyhow::Result<()>
where
    R: TargetRegistry + 'static,
{
    let mut triggers: Vec<BoxStream<'static, (Module, hosh_bus::Message)>> = Vec::new();
    for module in config.modules.clone() {
        let subject = bus.subjects().trigger(module);
        let subscription = bus.subscribe(&subject).await?;
        triggers.push(subscription.map(move |msg| (module, msg)).boxed());
    }
    // select_all rejects an empty set; a pending stream keeps the select arm
    // inert when no module is configured.
    triggers.push(futures::stream::pending().boxed());
    let mut triggers = futures::stream::select_all(triggers);

    let mut interval = tokio::time::interval(Duration::from_secs(config.publish_interval));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let retry_delay = Duration::from_secs(config.cycle_retry_delay);

    info!(modules = ?config.modules, interval_s = config.publish_interval, "publisher started");

    loop {
        tokio::select! {
            _ = shutdown.wait_for_shutdown() => {
                info!("publisher shutting down");
                break;
            }

            _ = interval.tick() => {
                match publisher.run_cycle(Utc::now()).await {
                    Ok(stats) => info!(
                        scanned = stats.scanned,
                        fresh = stats.fresh,
                        in_flight = stats.in_flight,
                        published = stats.published,
                        "cycle complete"
                    ),
                    Err(e) => {
                        warn!(err = %e, "cycle failed, retrying once after delay");
                        tokio::time::sleep(retry_delay).await;
                        match publisher.run_cycle(Utc::now()).await {
                            Ok(stats) => info!(published = stats.published, "retry cycle complete"),
                            Err(e) => error!(err = %e, "retry cycle failed, waiting for next tick"),
                        }
                    }
                }
            }

            Some((module, msg)) = triggers.next() => {
                let trigger = if msg.payload.is_empty() {
                    TriggerRequest::default()
                } else {
                    match serde_json::from_slice::<TriggerRequest>(&msg.payload) {
                        Ok(trigger) => trigger,
                        Err(e) => {
                            warn!(%module, err = %e, "dropping undecodable trigger");
                            continue;
                        }
                    }
                };

                let host = trigger.host.as_deref().filter(|h| !h.is_empty());
                match publisher.run_trigger(module, host, Utc::now()).await {
                    Ok(published) => info!(%module, host = host.unwrap_or("*"), %published, "trigger served"),
                    Err(e) => error!(%module, err = %e, "trigger failed"),
                }
            }
        }
    }

    Ok(())
}
