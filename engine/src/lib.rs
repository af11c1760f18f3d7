//! # Job Manager Engine
//!
//! Headless core of the job manager: stages a named job's files into a shared
//! working tree and keeps the application itself up to date. Presentation
//! layers (the CLI, or any other front end) supply a job name and receive
//! progress strings plus one final result.
//!
//! ## Overview
//!
//! - Every job folder has a `Label Data` and a `Pix` subfolder
//! - `Label Data` is cleared and fully replaced on each transfer
//! - `Pix` is overwrite-merged and never cleared, so photos accumulate
//! - Folders dropped in from elsewhere are registered as ad-hoc jobs and
//!   backed up into the default jobs root after their first transfer
//! - The updater checks a remote descriptor, downloads the new binary and
//!   swaps it in through a helper script
//!
//! ## Basic Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use engine::{EngineConfig, JobRegistry, worker::{spawn_transfer, TransferGate}};
//!
//! let config = Arc::new(EngineConfig::from_env("1.0.0"));
//! let registry = Arc::new(JobRegistry::new());
//! let gate = TransferGate::new();
//!
//! let handle = spawn_transfer(registry, config, &gate, "Kitchen-42".to_string());
//! let result = handle.wait(|update| println!("{:?}", update));
//! if let Some(result) = result {
//!     println!("success: {}", result.is_success());
//! }
//! ```
//!
//! ## Modules
//!
//! - **model**: Core data structures (Job, TransferPaths, results)
//! - **error**: Error taxonomy
//! - **config**: Roots, endpoint and timeouts
//! - **paths**: Source/destination path resolution
//! - **fs_ops**: Clear, copy, merge and mirror primitives
//! - **registry**: Ad-hoc job registry and job discovery
//! - **job**: Transfer orchestration
//! - **progress**: Progress callback trait and channel adapter
//! - **update**: Version check, download and self-replacement
//! - **worker**: Background tasks delivering results over channels

pub mod model;
pub mod error;
pub mod config;
pub mod paths;
pub mod fs_ops;
pub mod registry;
pub mod job;
pub mod progress;
pub mod update;
pub mod worker;

#[cfg(test)]
mod test_support;

// Re-export main types and functions
pub use model::{
    Job, SourceKind, TransferPaths, TransferOutcome, TransferResult, UpdateDescriptor,
    DownloadOutcome, DownloadResult,
};
pub use error::{EngineError, ErrorKind};
pub use config::EngineConfig;
pub use registry::{JobRegistry, JobListing, Registration};
pub use job::{run_transfer, transfer_job};
pub use progress::{ProgressCallback, ProgressUpdate};
