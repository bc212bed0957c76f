use std::sync::Arc;

use tokio::sync::watch;

/// Sender half of the shutdown channel. Cheap to clone and share.
#[derive(Clone, Debug)]
pub struct ShutdownSignal(Arc<watch::Sender<bool>>);

impl ShutdownSignal {
    pub(crate) fn new(tx: Arc<watch::Sender<bool>>) -> Self {
        Self(tx)
    }

    /// Asks every task holding a guard to wind down.
    pub fn send(&self) {
        let _ = self.0.send(true);
    }
}

/// Receiver half handed to spawned tasks.
#[derive(Clone, Debug)]
pub struct ShutdownGuard(watch::Receiver<bool>);

impl ShutdownGuard {
    pub(crate) fn new(rx: watch::Receiver<bool>) -> Self {
        Self(rx)
    }

    /// Non-blocking check, for loop bodies that poll between steps.
    pub fn should_shutdown(&self) -> bool {
        *self.0.borrow()
    }

    /// Resolves once shutdown has been signalled (or the manager dropped).
    pub async fn wait_for_shutdown(&mut self) {
        while !*self.0.borrow_and_update() {
            if self.0.changed().await.is_err() {
                break;
            }
        }
    }
}
