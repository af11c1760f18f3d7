//! Engine configuration.
//!
//! The defaults mirror a single-user workstation: jobs live in the user's
//! OneDrive folder and are staged into the CAD machine's working tree.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Identity substituted into the default root when no username is set.
pub const FALLBACK_USER: &str = "continental";

/// Endpoint serving the update descriptor JSON.
pub const DEFAULT_UPDATE_URL: &str =
    "https://raw.githubusercontent.com/Steffy69/JobManagerCK/main/version.json";

/// Destination root shared by every job.
pub const DEFAULT_DESTINATION_ROOT: &str = "C:\\CADCode";

/// File name the downloader writes the new binary to.
#[cfg(windows)]
pub const UPDATE_FILE_NAME: &str = "JobManager_update.exe";
#[cfg(not(windows))]
pub const UPDATE_FILE_NAME: &str = "jobmanager_update";

/// Settings shared by the transfer and update pipelines.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Root under which default jobs are discovered
    pub default_root: PathBuf,

    /// Working tree holding the currently staged job
    pub destination_root: PathBuf,

    /// Where the update descriptor is fetched from
    pub update_url: String,

    /// Version of the running application
    pub current_version: String,

    /// Bound on the version check request
    pub check_timeout: Duration,

    /// Directory receiving the downloaded binary and the helper script
    pub work_dir: PathBuf,
}

impl EngineConfig {
    /// Build the default configuration from the environment.
    pub fn from_env(current_version: impl Into<String>) -> Self {
        let user = username();
        EngineConfig {
            default_root: default_root_for(&user),
            destination_root: PathBuf::from(DEFAULT_DESTINATION_ROOT),
            update_url: DEFAULT_UPDATE_URL.to_string(),
            current_version: current_version.into(),
            check_timeout: Duration::from_secs(5),
            work_dir: PathBuf::from("."),
        }
    }

    pub fn with_default_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.default_root = root.into();
        self
    }

    pub fn with_destination_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.destination_root = root.into();
        self
    }

    pub fn with_update_url(mut self, url: impl Into<String>) -> Self {
        self.update_url = url.into();
        self
    }

    pub fn with_work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_dir = dir.into();
        self
    }

    /// Fixed local path the update binary is downloaded to.
    pub fn update_file_path(&self) -> PathBuf {
        self.work_dir.join(UPDATE_FILE_NAME)
    }
}

/// The current user's name, or the fallback identity.
pub fn username() -> String {
    env::var("USERNAME")
        .or_else(|_| env::var("USER"))
        .ok()
        .filter(|u| !u.trim().is_empty())
        .unwrap_or_else(|| FALLBACK_USER.to_string())
}

/// Default per-user jobs root for `user`.
pub fn default_root_for(user: &str) -> PathBuf {
    PathBuf::from(format!("C:\\Users\\{}\\OneDrive\\Jobs", user))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_default_root_substitutes_user() {
        let root = default_root_for("alex");
        let rendered = root.to_string_lossy();
        assert!(rendered.contains("alex"));
        assert!(rendered.ends_with("Jobs"));
    }

    #[test]
    fn test_builder_overrides() {
        let config = EngineConfig::from_env("1.0.0")
            .with_default_root("/jobs")
            .with_destination_root("/cad")
            .with_update_url("http://127.0.0.1:9/version.json")
            .with_work_dir("/tmp/work");

        assert_eq!(config.default_root, PathBuf::from("/jobs"));
        assert_eq!(config.destination_root, PathBuf::from("/cad"));
        assert_eq!(config.update_url, "http://127.0.0.1:9/version.json");
        assert_eq!(config.update_file_path(), Path::new("/tmp/work").join(UPDATE_FILE_NAME));
        assert_eq!(config.check_timeout, Duration::from_secs(5));
    }
}
