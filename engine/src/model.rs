//! Core data model.
//!
//! This module defines the data structures shared by the transfer and update pipelines:
//! - Job: a named unit of work and where its source lives
//! - TransferPaths: the resolved directories for one transfer
//! - TransferResult / DownloadResult: terminal outcomes handed back to the UI

use std::path::PathBuf;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;
use crate::error::EngineError;

/// Name of the design-output subfolder every job carries.
pub const LABEL_DATA_DIR: &str = "Label Data";

/// Name of the photo subfolder every job carries.
pub const PIX_DIR: &str = "Pix";

/// Where a job's source tree comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceKind {
    /// Discovered under the default jobs root
    Default,
    /// Supplied directly by the user (dropped or selected folder)
    AdHoc { path: PathBuf },
}

/// A named unit of work with a source tree containing `Label Data` and `Pix`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    /// Job name, unique within a registry
    pub name: String,

    /// Default or ad-hoc source
    pub source: SourceKind,

    /// Back the ad-hoc folder up into the default root after transferring.
    /// Always false for default jobs.
    pub mirror_requested: bool,
}

impl Job {
    /// A job discovered under the default root.
    pub fn default_source(name: impl Into<String>) -> Self {
        Job {
            name: name.into(),
            source: SourceKind::Default,
            mirror_requested: false,
        }
    }

    /// A job whose source is a user-supplied folder.
    pub fn ad_hoc(name: impl Into<String>, path: impl Into<PathBuf>, mirror: bool) -> Self {
        Job {
            name: name.into(),
            source: SourceKind::AdHoc { path: path.into() },
            mirror_requested: mirror,
        }
    }

    pub fn ad_hoc_path(&self) -> Option<&PathBuf> {
        match &self.source {
            SourceKind::AdHoc { path } => Some(path),
            SourceKind::Default => None,
        }
    }

    pub fn is_ad_hoc(&self) -> bool {
        self.ad_hoc_path().is_some()
    }
}

/// The directories a single transfer reads from and writes to.
///
/// Derived per transfer and never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferPaths {
    /// The job folder itself (parent of the two source subfolders)
    pub src_job_folder: PathBuf,
    pub src_label_data: PathBuf,
    pub src_pix: PathBuf,
    pub dst_label_data: PathBuf,
    pub dst_pix: PathBuf,
    /// Backup location under the default root; only set for mirrored ad-hoc jobs
    pub mirror_dest: Option<PathBuf>,
}

/// Final outcome of a transfer.
#[derive(Debug)]
pub enum TransferOutcome {
    Success,
    Failure(EngineError),
}

/// Everything the UI needs to know about a finished transfer.
#[derive(Debug)]
pub struct TransferResult {
    /// Unique identifier for this run
    pub id: Uuid,

    pub job_name: String,

    pub outcome: TransferOutcome,

    /// Progress messages in the order they were emitted
    pub messages: Vec<String>,

    pub started_at: DateTime<Utc>,

    pub finished_at: DateTime<Utc>,
}

impl TransferResult {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, TransferOutcome::Success)
    }

    /// The failure, if the transfer did not succeed.
    pub fn error(&self) -> Option<&EngineError> {
        match &self.outcome {
            TransferOutcome::Success => None,
            TransferOutcome::Failure(e) => Some(e),
        }
    }
}

/// Remote description of the latest published release.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UpdateDescriptor {
    /// Dot-separated non-negative integers, e.g. "1.0.1"
    pub version: String,

    pub download_url: String,

    #[serde(default)]
    pub release_notes: Option<String>,
}

impl UpdateDescriptor {
    pub fn release_notes_or_default(&self) -> &str {
        self.release_notes
            .as_deref()
            .unwrap_or("No release notes available.")
    }
}

/// Final outcome of a download.
#[derive(Debug)]
pub enum DownloadOutcome {
    /// The update was written to this local path
    Success(PathBuf),
    Failure(EngineError),
}

/// Result of streaming an update binary to disk.
#[derive(Debug)]
pub struct DownloadResult {
    pub outcome: DownloadOutcome,

    /// Percentages reported during the download, non-decreasing towards 100.
    /// `None` when the server did not send a content length.
    pub progress: Option<Vec<u8>>,

    pub bytes_written: u64,
}

impl DownloadResult {
    pub fn local_path(&self) -> Option<&PathBuf> {
        match &self.outcome {
            DownloadOutcome::Success(path) => Some(path),
            DownloadOutcome::Failure(_) => None,
        }
    }
}
