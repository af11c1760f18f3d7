//! Background worker tasks.
//!
//! Each transfer, version check and download runs on its own thread. The
//! control thread gets a `TaskHandle` back and receives typed progress events
//! and exactly one terminal result over channels, so nothing is ever invoked
//! on the control thread from a worker.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread;
use chrono::Utc;
use crossbeam_channel::{bounded, select, unbounded, Receiver};
use tracing::{error, warn};
use uuid::Uuid;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::job::transfer_job;
use crate::model::{DownloadResult, TransferOutcome, TransferResult};
use crate::progress::{ChannelProgress, ProgressUpdate};
use crate::registry::JobRegistry;
use crate::update::{self, CheckOutcome, CheckTrigger};

/// Receiving end of one background task.
pub struct TaskHandle<T> {
    updates: Receiver<ProgressUpdate>,
    result: Receiver<T>,
}

impl<T> TaskHandle<T> {
    /// Progress events, in emission order.
    pub fn updates(&self) -> &Receiver<ProgressUpdate> {
        &self.updates
    }

    /// Delivers the single terminal result.
    pub fn result(&self) -> &Receiver<T> {
        &self.result
    }

    /// Block until the task finishes, handing every progress event to `on_update` first.
    ///
    /// Returns `None` only if the worker died without producing a result.
    pub fn wait(self, mut on_update: impl FnMut(ProgressUpdate)) -> Option<T> {
        loop {
            select! {
                recv(self.updates) -> update => match update {
                    Ok(update) => on_update(update),
                    Err(_) => return self.result.recv().ok(),
                },
                recv(self.result) -> result => {
                    // Everything was sent before the result, so this drains the rest
                    for update in self.updates.try_iter() {
                        on_update(update);
                    }
                    return result.ok();
                }
            }
        }
    }
}

fn spawn_task<T, F>(name: &str, task: F) -> TaskHandle<T>
where
    T: Send + 'static,
    F: FnOnce(&ChannelProgress) -> T + Send + 'static,
{
    let (update_tx, update_rx) = unbounded();
    let (result_tx, result_rx) = bounded(1);

    let spawned = thread::Builder::new().name(name.to_string()).spawn(move || {
        let progress = ChannelProgress::new(update_tx);
        let _ = result_tx.send(task(&progress));
    });
    if let Err(e) = spawned {
        error!(task = name, error = %e, "failed to spawn worker thread");
    }

    TaskHandle {
        updates: update_rx,
        result: result_rx,
    }
}

/// Tracks destination roots with a transfer in flight.
#[derive(Debug, Default)]
pub struct TransferGate {
    busy: Mutex<HashSet<PathBuf>>,
}

/// Holds a destination root for one transfer; released on drop.
#[derive(Debug)]
pub struct GateGuard {
    gate: Arc<TransferGate>,
    destination: PathBuf,
}

impl TransferGate {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Claim `destination`, failing if another transfer already holds it.
    pub fn try_acquire(self: &Arc<Self>, destination: &Path) -> Result<GateGuard, EngineError> {
        let mut busy = self.busy.lock().unwrap_or_else(|p| p.into_inner());
        if !busy.insert(destination.to_path_buf()) {
            return Err(EngineError::TransferInProgress {
                destination: destination.to_path_buf(),
            });
        }
        Ok(GateGuard {
            gate: Arc::clone(self),
            destination: destination.to_path_buf(),
        })
    }

    pub fn is_busy(&self, destination: &Path) -> bool {
        self.busy
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .contains(destination)
    }
}

impl Drop for GateGuard {
    fn drop(&mut self) {
        self.gate
            .busy
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .remove(&self.destination);
    }
}

/// Transfer `job_name` on a worker thread.
///
/// If another transfer into the same destination root is still running, the
/// returned handle resolves immediately to a `TransferInProgress` failure.
pub fn spawn_transfer(
    registry: Arc<JobRegistry>,
    config: Arc<EngineConfig>,
    gate: &Arc<TransferGate>,
    job_name: String,
) -> TaskHandle<TransferResult> {
    let guard = gate.try_acquire(&config.destination_root);

    spawn_task("transfer", move |progress| match guard {
        Ok(_guard) => transfer_job(&registry, &job_name, &config, Some(progress)),
        Err(e) => {
            warn!(job = %job_name, error = %e, "transfer rejected");
            let now = Utc::now();
            TransferResult {
                id: Uuid::new_v4(),
                job_name,
                outcome: TransferOutcome::Failure(e),
                messages: Vec::new(),
                started_at: now,
                finished_at: now,
            }
        }
    })
}

/// Check for a newer release on a worker thread.
pub fn spawn_update_check(config: Arc<EngineConfig>, trigger: CheckTrigger) -> TaskHandle<CheckOutcome> {
    spawn_task("update-check", move |_| update::check_for_update(&config, trigger))
}

/// Download an update binary on a worker thread.
pub fn spawn_download(url: String, target: PathBuf) -> TaskHandle<DownloadResult> {
    spawn_task("update-download", move |progress| {
        update::download_update(&url, &target, Some(progress))
    })
}
