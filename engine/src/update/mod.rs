//! Self-update pipeline: check, download, apply.
//!
//! ```no_run
//! use engine::{EngineConfig, update::{self, CheckTrigger}};
//!
//! let config = EngineConfig::from_env("1.0.0");
//! let outcome = update::check_for_update(&config, CheckTrigger::Manual);
//! if let Some(descriptor) = outcome.available() {
//!     let result = update::download_update(&descriptor.download_url, &config.update_file_path(), None);
//!     if let Some(path) = result.local_path() {
//!         let applier = update::UpdateApplier::for_current_exe(path, &config.work_dir).unwrap();
//!         // Exits the process on success
//!         let _ = applier.apply();
//!     }
//! }
//! ```

pub mod apply;
pub mod download;
pub mod version;

pub use apply::{ApplyState, UpdateApplier};
pub use download::download_update;
pub use version::{check_for_update, fetch_descriptor, is_newer_version, CheckOutcome, CheckTrigger, UpdateCheck, Version};
