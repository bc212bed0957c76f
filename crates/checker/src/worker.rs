use std::{sync::Arc, time::Duration};

use chrono::Utc;
use futures::StreamExt;
use hosh_bus::BusClient;
use hosh_config::CheckerConfig;
use hosh_primitives::{
    CheckRequest, CheckerIdentity, ErrorKind, Module, Probe, ProbeReport, ProbeResult,
};
use hosh_tasks::ShutdownGuard;
use tokio::sync::Semaphore;
use tracing::*;

/// Runs one module's worker until shutdown.
///
/// BTC workers consume the user-submitted lane alongside the scheduled one,
/// in the same queue group, so priority traffic shares the fleet.
pub async fn run_worker(
    bus: BusClient,
    probe: Arc<dyn Probe>,
    config: CheckerConfig,
    mut shutdown: ShutdownGuard,
) -> anyhow::Result<()> {
    let module = probe.module();
    let group = module.queue_group();

    let mut subscriptions = vec![
        bus.queue_subscribe(&bus.subjects().check(module), &group)
            .await?,
    ];
    if module == Module::Btc {
        subscriptions.push(
            bus.queue_subscribe(&bus.subjects().check_user(module), &group)
                .await?,
        );
    }
    let mut requests = futures::stream::select_all(subscriptions);

    let identity = CheckerIdentity::new(config.checker_id.clone(), config.location.clone());
    let limiter = Arc::new(Semaphore::new(config.max_concurrent_checks));
    let budget = Duration::from_secs(config.probe_budget);

    info!(%module, %group, concurrency = config.max_concurrent_checks, "worker subscribed");

    loop {
        tokio::select! {
            _ = shutdown.wait_for_shutdown() => {
                info!(%module, "worker shutting down");
                break;
            }
            maybe_msg = requests.next() => {
                let Some(msg) = maybe_msg else {
                    anyhow::bail!("bus subscription closed");
                };

                // Backpressure: hold off pulling the next message until a
                // probe slot frees, so the bus redistributes to idle peers.
                let permit = limiter
                    .clone()
                    .acquire_owned()
                    .await
                    .expect("worker: probe limiter closed");

                let request: CheckRequest = match serde_json::from_slice(&msg.payload) {
                    Ok(request) => request,
                    Err(e) => {
                        warn!(subject = %msg.subject, err = %e, "dropping undecodable check request");
                        continue;
                    }
                };

                debug!(host = %request.host, check_id = %request.check_id, "handling check request");
                let bus = bus.clone();
                let probe = probe.clone();
                let identity = identity.clone();
                let retry_max = config.publish_retry_max;
                tokio::spawn(async move {
                    let _permit = permit;
                    handle_check(bus, probe, request, identity, budget, retry_max).await;
                });
            }
        }
    }

    Ok(())
}

async fn handle_check(
    bus: BusClient,
    probe: Arc<dyn Probe>,
    request: CheckRequest,
    identity: CheckerIdentity,
    budget: Duration,
    retry_max: u32,
) {
    let module = request.module;
    let dry_run = request.dry_run;
    let report = execute_probe(probe, request.clone(), budget).await;
    let result = ProbeResult::stamp(&request, report, &identity, Utc::now());

    let subject = if dry_run {
        bus.subjects().result_dry_run(module)
    } else {
        bus.subjects().result(module)
    };

    if let Err(e) = bus
        .publish_json_with_retry(&subject, &result, retry_max)
        .await
    {
        // The scheduler re-emits this target once the in-flight window
        // lapses; losing the publish costs a cycle, not the observation
        // history.
        error!(%subject, check_id = %result.check_id, err = %e, "giving up on publishing result");
    }
}

/// Runs the probe inside its own task so a panic or a blown budget becomes
/// a structured result instead of a lost message.
pub async fn execute_probe(
    probe: Arc<dyn Probe>,
    request: CheckRequest,
    budget: Duration,
) -> ProbeReport {
    let host = request.host.clone();
    let mut handle = tokio::spawn(async move { probe.probe(&request).await });

    match tokio::time::timeout(budget, &mut handle).await {
        Ok(Ok(report)) => report,
        Ok(Err(join_err)) => {
            error!(%host, err = %join_err, "probe crashed");
            ProbeReport::offline(
                ErrorKind::InternalError,
                format!("probe crashed: {join_err}"),
            )
        }
        Err(_) => {
            handle.abort();
            warn!(%host, "probe budget exceeded, aborting");
            ProbeReport::offline(ErrorKind::Timeout, "probe budget exceeded")
        }
    }
}
