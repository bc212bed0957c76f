use std::{future::Future, sync::Arc, time::Duration};

use anyhow::anyhow;
use futures_util::FutureExt;
use tokio::{
    runtime::Handle,
    sync::{mpsc, watch},
};
use tracing::*;

use crate::shutdown::{ShutdownGuard, ShutdownSignal};

/// How a critical task came down.
#[derive(Debug)]
pub struct TaskError {
    pub name: &'static str,
    pub error: String,
}

/// Owns the shutdown channel and the critical-error channel for one process.
pub struct TaskManager {
    handle: Handle,
    shutdown_tx: Arc<watch::Sender<bool>>,
    shutdown_rx: watch::Receiver<bool>,
    err_tx: mpsc::UnboundedSender<TaskError>,
    err_rx: mpsc::UnboundedReceiver<TaskError>,
}

impl TaskManager {
    pub fn new(handle: Handle) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (err_tx, err_rx) = mpsc::unbounded_channel();
        Self {
            handle,
            shutdown_tx: Arc::new(shutdown_tx),
            shutdown_rx,
            err_tx,
            err_rx,
        }
    }

    pub fn executor(&self) -> TaskExecutor {
        TaskExecutor {
            handle: self.handle.clone(),
            shutdown_rx: self.shutdown_rx.clone(),
            err_tx: self.err_tx.clone(),
        }
    }

    pub fn shutdown_signal(&self) -> ShutdownSignal {
        ShutdownSignal::new(self.shutdown_tx.clone())
    }

    /// Spawns a listener that turns ctrl-c into a shutdown signal.
    pub fn start_signal_listeners(&self) {
        let signal = self.shutdown_signal();
        self.handle.spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("received ctrl-c, shutting down");
                    signal.send();
                }
                Err(e) => warn!(err = %e, "failed to install ctrl-c handler"),
            }
        });
    }

    /// Blocks until a critical task fails or shutdown is signalled, then
    /// propagates shutdown and waits out the grace period.
    pub fn monitor(mut self, grace: Option<Duration>) -> anyhow::Result<()> {
        let handle = self.handle.clone();
        let mut shutdown_rx = self.shutdown_rx.clone();
        let outcome = handle.block_on(async {
            tokio::select! {
                maybe_err = self.err_rx.recv() => maybe_err,
                // wait_for observes an already-signalled shutdown too.
                _ = shutdown_rx.wait_for(|stop| *stop) => None,
            }
        });

        self.shutdown_tx.send_replace(true);
        if let Some(grace) = grace {
            handle.block_on(tokio::time::sleep(grace));
        }

        match outcome {
            Some(err) => {
                error!(name = %err.name, err = %err.error, "critical task failed, exiting");
                Err(anyhow!("critical task {} failed: {}", err.name, err.error))
            }
            None => {
                info!("shutdown complete");
                Ok(())
            }
        }
    }
}

/// Handle for spawning supervised tasks; clones share the same channels.
#[derive(Clone)]
pub struct TaskExecutor {
    handle: Handle,
    shutdown_rx: watch::Receiver<bool>,
    err_tx: mpsc::UnboundedSender<TaskError>,
}

impl TaskExecutor {
    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    /// Spawns a task whose failure (error return or panic) takes the whole
    /// process down through the manager.
    pub fn spawn_critical_async<F>(&self, name: &'static str, fut: F)
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let err_tx = self.err_tx.clone();
        self.handle.spawn(async move {
            match std::panic::AssertUnwindSafe(fut).catch_unwind().await {
                Ok(Ok(())) => debug!(%name, "critical task finished"),
                Ok(Err(e)) => {
                    let _ = err_tx.send(TaskError {
                        name,
                        error: format!("{e:#}"),
                    });
                }
                Err(_) => {
                    let _ = err_tx.send(TaskError {
                        name,
                        error: "task panicked".to_string(),
                    });
                }
            }
        });
    }

    /// Like [`spawn_critical_async`](Self::spawn_critical_async) but hands
    /// the task a shutdown guard so it can wind down cooperatively.
    pub fn spawn_critical_with_shutdown<F, Fut>(&self, name: &'static str, f: F)
    where
        F: FnOnce(ShutdownGuard) -> Fut,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let guard = ShutdownGuard::new(self.shutdown_rx.clone());
        self.spawn_critical_async(name, f(guard));
    }
}
