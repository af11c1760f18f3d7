//! Transfer orchestration.
//!
//! A transfer stages one job into the shared destination tree:
//! 1. validate that the job's `Label Data` and `Pix` folders exist
//! 2. clear the destination `Label Data`
//! 3. copy source `Label Data` over it (full mirror)
//! 4. overwrite-merge source `Pix` into destination `Pix` (never cleared)
//! 5. optionally mirror an ad-hoc job folder into the default root
//!
//! The first failing step aborts the rest. Completed steps stay on disk.

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::fs_ops::{self, MirrorOutcome};
use crate::model::{Job, TransferOutcome, TransferPaths, TransferResult};
use crate::paths::{resolve_paths, validate_sources};
use crate::progress::ProgressCallback;
use crate::registry::JobRegistry;

pub const MSG_CLEARING: &str = "Clearing Label Data directory...";
pub const MSG_COPY_LABEL_DATA: &str = "Copying Label Data files...";
pub const MSG_COPY_PIX: &str = "Copying Pix files...";
pub const MSG_MIRRORING: &str = "Copying job to default root...";
pub const MSG_MIRROR_EXISTS: &str = "Job already exists in default root, skipping...";
pub const MSG_MIRROR_DONE: &str = "Job copied to default root successfully!";
pub const MSG_COMPLETE: &str = "Transfer completed successfully!";

/// Collects progress messages and forwards them to the optional callback.
struct StepReporter<'a> {
    messages: Vec<String>,
    callback: Option<&'a dyn ProgressCallback>,
}

impl<'a> StepReporter<'a> {
    fn new(callback: Option<&'a dyn ProgressCallback>) -> Self {
        StepReporter {
            messages: Vec::new(),
            callback,
        }
    }

    fn emit(&mut self, message: &str) {
        info!("{}", message);
        if let Some(callback) = self.callback {
            callback.on_message(message);
        }
        self.messages.push(message.to_string());
    }
}

/// Run the transfer steps for already-resolved paths.
fn execute_steps(paths: &TransferPaths, reporter: &mut StepReporter<'_>) -> Result<(), EngineError> {
    validate_sources(paths)?;

    reporter.emit(MSG_CLEARING);
    fs_ops::clear_directory(&paths.dst_label_data)?;

    reporter.emit(MSG_COPY_LABEL_DATA);
    let label_stats = fs_ops::copy_tree(&paths.src_label_data, &paths.dst_label_data)?;

    reporter.emit(MSG_COPY_PIX);
    let pix_stats = fs_ops::copy_tree_overwrite_merge(&paths.src_pix, &paths.dst_pix)?;

    info!(
        label_files = label_stats.files_copied,
        pix_files = pix_stats.files_copied,
        bytes = label_stats.bytes_copied + pix_stats.bytes_copied,
        "staged job files"
    );

    if let Some(mirror_dest) = &paths.mirror_dest {
        reporter.emit(MSG_MIRRORING);
        match fs_ops::mirror_to_default_root(&paths.src_job_folder, mirror_dest)? {
            MirrorOutcome::AlreadyExists => reporter.emit(MSG_MIRROR_EXISTS),
            MirrorOutcome::Copied(_) => reporter.emit(MSG_MIRROR_DONE),
        }
    }

    reporter.emit(MSG_COMPLETE);
    Ok(())
}

/// Transfer `job` into the configured destination root.
///
/// Never returns an error: failures are folded into the result's outcome
/// together with the messages emitted before the failing step.
pub fn run_transfer(
    job: &Job,
    config: &EngineConfig,
    progress_callback: Option<&dyn ProgressCallback>,
) -> TransferResult {
    let id = Uuid::new_v4();
    let started_at = Utc::now();
    let paths = resolve_paths(job, &config.default_root, &config.destination_root);
    info!(%id, job = %job.name, source = %paths.src_job_folder.display(), "starting transfer");

    let mut reporter = StepReporter::new(progress_callback);
    let outcome = match execute_steps(&paths, &mut reporter) {
        Ok(()) => TransferOutcome::Success,
        Err(e) => {
            warn!(%id, job = %job.name, error = %e, "transfer failed");
            TransferOutcome::Failure(e)
        }
    };

    TransferResult {
        id,
        job_name: job.name.clone(),
        outcome,
        messages: reporter.messages,
        started_at,
        finished_at: Utc::now(),
    }
}

/// Look `job_name` up in the registry and transfer it.
///
/// A mirrored ad-hoc job that transfers successfully now lives under the
/// default root, so its ad-hoc registration is dropped.
pub fn transfer_job(
    registry: &JobRegistry,
    job_name: &str,
    config: &EngineConfig,
    progress_callback: Option<&dyn ProgressCallback>,
) -> TransferResult {
    let job = registry.job(job_name);
    let result = run_transfer(&job, config, progress_callback);

    if result.is_success() && job.is_ad_hoc() && job.mirror_requested {
        registry.promote(job_name);
    }
    result
}
