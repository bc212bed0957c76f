//! Checker worker binary: one process per protocol module.

use std::{sync::Arc, time::Duration};

use anyhow::Context;
use hosh_bus::BusClient;
use hosh_checker::run_worker;
use hosh_common::logging::{self, LoggerConfig};
use hosh_config::Config;
use hosh_electrum::ElectrumProbe;
use hosh_explorer::HttpProbe;
use hosh_primitives::{Module, Probe};
use hosh_tasks::TaskManager;
use hosh_zcash::ZcashProbe;
use tracing::*;

use crate::args::Args;

mod args;

fn main() -> anyhow::Result<()> {
    let args: Args = argh::from_env();
    if let Err(e) = main_inner(args) {
        eprintln!("FATAL ERROR: {e}");
        return Err(e);
    }
    Ok(())
}

fn main_inner(args: Args) -> anyhow::Result<()> {
    let config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::from_env(),
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("hosh-checker-rt")
        .build()
        .expect("init: build rt");
    let task_manager = TaskManager::new(runtime.handle().clone());
    let executor = task_manager.executor();

    logging::init(LoggerConfig::new(format!("hosh-checker-{}", args.module)));

    let bus = executor
        .handle()
        .block_on(BusClient::connect(&config.bus.url, &config.bus.prefix))?;

    let probe: Arc<dyn Probe> = match args.module {
        Module::Btc => Arc::new(ElectrumProbe::new(config.tor.proxy_addr())),
        Module::Zec => Arc::new(ZcashProbe::new()),
        Module::Http => Arc::new(
            HttpProbe::new(config.explorers.clone(), &config.tor.proxy_addr())
                .context("init: http probe")?,
        ),
    };

    info!(module = %args.module, checker_id = %config.checker.checker_id, "starting checker");

    let checker_config = config.checker.clone();
    executor.spawn_critical_with_shutdown("checker-worker", move |shutdown| {
        run_worker(bus, probe, checker_config, shutdown)
    });

    task_manager.start_signal_listeners();
    task_manager.monitor(Some(Duration::from_millis(500)))
}
