//! Publisher binary: scans the registry and schedules checks. Run one
//! replica per deployment; duplicate requests from an accidental second one
//! are de-duplicated downstream by check id.

use std::{sync::Arc, time::Duration};

use hosh_bus::BusClient;
use hosh_common::logging::{self, LoggerConfig};
use hosh_config::Config;
use hosh_publisher::{publisher_task, Publisher, StalenessPolicy};
use hosh_registry::ClickHouseRegistry;
use hosh_tasks::TaskManager;
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
        .thread_name("hosh-publisher-rt")
        .build()
        .expect("init: build rt");
    let task_manager = TaskManager::new(runtime.handle().clone());
    let executor = task_manager.executor();

    logging::init(LoggerConfig::new("hosh-publisher".to_string()));

    let bus = executor
        .handle()
        .block_on(BusClient::connect(&config.bus.url, &config.bus.prefix))?;
    let registry = Arc::new(ClickHouseRegistry::new(&config.registry)?);

    let policy = StalenessPolicy::from_config(&config.publisher);
    let publisher = Arc::new(Publisher::new(
        registry,
        Arc::new(bus.clone()),
        bus.subjects().clone(),
        policy,
        config.publisher.modules.clone(),
    ));

    info!(modules = ?config.publisher.modules, "starting publisher");

    let publisher_config = config.publisher.clone();
    executor.spawn_critical_with_shutdown("publisher", move |shutdown| {
        publisher_task(publisher, bus, publisher_config, shutdown)
    });

    task_manager.start_signal_listeners();
    task_manager.monitor(Some(Duration::from_millis(500)))
}
