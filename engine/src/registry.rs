//! Job discovery and the ad-hoc source registry.
//!
//! The registry maps job names to user-supplied folders. It is shared between
//! the control thread (which registers dropped folders) and transfer workers
//! (which look jobs up and promote them), so all access goes through one mutex.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{info, warn};
use crate::error::EngineError;
use crate::model::{Job, LABEL_DATA_DIR, PIX_DIR};

#[derive(Debug, Clone)]
struct AdHocEntry {
    path: PathBuf,
    mirror: bool,
}

/// Result of registering a folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Registration {
    /// A job name the registry had not seen before
    Added(Job),
    /// An existing ad-hoc job now points at a different folder
    Updated(Job),
}

impl Registration {
    pub fn job(&self) -> &Job {
        match self {
            Registration::Added(job) | Registration::Updated(job) => job,
        }
    }
}

/// Tracks which job names currently have an ad-hoc source.
#[derive(Debug, Default)]
pub struct JobRegistry {
    ad_hoc: Mutex<HashMap<String, AdHocEntry>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, AdHocEntry>> {
        // A panicking holder cannot leave the map half-written, so keep going
        self.ad_hoc.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register a user-supplied job folder.
    ///
    /// The folder must contain `Label Data` and `Pix`; its final path component
    /// becomes the job name.
    pub fn register_folder(&self, folder: &Path, mirror: bool) -> Result<Registration, EngineError> {
        if !folder.is_dir() {
            return Err(EngineError::InvalidJob {
                reason: format!("{} is not a directory", folder.display()),
            });
        }

        let name = folder
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| EngineError::InvalidJob {
                reason: format!("cannot derive a job name from {}", folder.display()),
            })?;

        for what in [LABEL_DATA_DIR, PIX_DIR] {
            if !folder.join(what).is_dir() {
                return Err(EngineError::PathNotFound {
                    path: folder.to_path_buf(),
                    what: what.to_string(),
                });
            }
        }

        let entry = AdHocEntry {
            path: folder.to_path_buf(),
            mirror,
        };
        let job = Job::ad_hoc(name.clone(), folder, mirror);
        let previous = self.entries().insert(name.clone(), entry);

        info!(job = %name, path = %folder.display(), "registered ad-hoc job");
        Ok(match previous {
            None => Registration::Added(job),
            Some(_) => Registration::Updated(job),
        })
    }

    /// Look up `name`, falling back to a default-root job.
    pub fn job(&self, name: &str) -> Job {
        match self.entries().get(name) {
            Some(entry) => Job::ad_hoc(name, entry.path.clone(), entry.mirror),
            None => Job::default_source(name),
        }
    }

    pub fn ad_hoc_path(&self, name: &str) -> Option<PathBuf> {
        self.entries().get(name).map(|e| e.path.clone())
    }

    /// Discard the ad-hoc metadata for `name`; it is a default-root job from now on.
    ///
    /// Returns whether anything was removed.
    pub fn promote(&self, name: &str) -> bool {
        let removed = self.entries().remove(name).is_some();
        if removed {
            info!(job = %name, "promoted ad-hoc job to default root");
        }
        removed
    }

    /// Ad-hoc job names, sorted.
    pub fn ad_hoc_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries().keys().cloned().collect();
        names.sort();
        names
    }

    /// All known jobs: ad-hoc ones first, then subdirectories of `default_root`.
    ///
    /// A name registered as ad-hoc is listed once, as ad-hoc. A missing or
    /// unreadable default root still yields the ad-hoc jobs.
    pub fn list_jobs(&self, default_root: &Path) -> JobListing {
        let mut jobs: Vec<Job> = self.ad_hoc_names().iter().map(|n| self.job(n)).collect();
        let ad_hoc_count = jobs.len();

        let root_error = match discover_jobs(default_root) {
            Ok(names) => {
                for name in names {
                    if !jobs.iter().any(|j| j.name == name) {
                        jobs.push(Job::default_source(name));
                    }
                }
                None
            }
            Err(e) => {
                warn!(root = %default_root.display(), error = %e, "default root unavailable");
                Some(e)
            }
        };

        JobListing {
            jobs,
            ad_hoc_count,
            root_error,
        }
    }
}

/// Jobs known to the registry plus the default-root scan outcome.
#[derive(Debug)]
pub struct JobListing {
    pub jobs: Vec<Job>,
    pub ad_hoc_count: usize,
    /// Why the default root could not be scanned, if it could not
    pub root_error: Option<EngineError>,
}

/// Names of the subdirectories directly under `default_root`, sorted.
pub fn discover_jobs(default_root: &Path) -> Result<Vec<String>, EngineError> {
    if !default_root.is_dir() {
        return Err(EngineError::PathNotFound {
            path: default_root.to_path_buf(),
            what: "Jobs".to_string(),
        });
    }

    let entries = fs::read_dir(default_root)
        .map_err(|e| EngineError::io("reading directory", default_root, e))?;

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| EngineError::io("reading directory", default_root, e))?;
        if entry.path().is_dir() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}
