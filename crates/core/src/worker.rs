//! Restartable periodic background task.
//!
//! Shared by the scheduler, RSS monitor and automation engine. A tick is
//! never cancelled midway; shutdown is observed between ticks.

use std::future::Future;
use std::time::Duration;

use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

struct RunningLoop {
    shutdown_tx: broadcast::Sender<()>,
    handle: JoinHandle<()>,
}

pub(crate) struct LoopWorker {
    name: &'static str,
    slot: Mutex<Option<RunningLoop>>,
}

impl LoopWorker {
    pub(crate) fn new(name: &'static str) -> Self {
        Self {
            name,
            slot: Mutex::new(None),
        }
    }

    /// Spawn the loop. Returns false if it was already running.
    pub(crate) async fn start<F, Fut>(&self, interval: Duration, mut tick: F) -> bool
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut slot = self.slot.lock().await;
        if let Some(running) = slot.as_ref() {
            if !running.handle.is_finished() {
                warn!("{} loop already running", self.name);
                return false;
            }
        }

        let (shutdown_tx, mut shutdown_rx) = broadcast::channel(1);
        let name = self.name;

        let handle = tokio::spawn(async move {
            info!(interval_ms = interval.as_millis() as u64, "{} loop started", name);
            loop {
                match shutdown_rx.try_recv() {
                    Err(broadcast::error::TryRecvError::Empty) => {}
                    _ => break,
                }

                tick().await;

                tokio::select! {
                    biased;
                    _ = shutdown_rx.recv() => {
                        debug!("{} loop received shutdown signal", name);
                        break;
                    }
                    _ = tokio::time::sleep(interval) => {}
                }
            }
            info!("{} loop stopped", name);
        });

        *slot = Some(RunningLoop {
            shutdown_tx,
            handle,
        });
        true
    }

    /// Signal the loop and wait for it to exit. No-op when not running.
    pub(crate) async fn stop(&self) {
        let running = self.slot.lock().await.take();
        let Some(running) = running else {
            debug!("{} loop not running", self.name);
            return;
        };

        let _ = running.shutdown_tx.send(());
        if let Err(e) = running.handle.await {
            warn!("{} loop ended abnormally: {}", self.name, e);
        }
    }

    pub(crate) async fn is_running(&self) -> bool {
        self.slot
            .lock()
            .await
            .as_ref()
            .is_some_and(|r| !r.handle.is_finished())
    }
}
