//! Remote version check.

use std::cmp::Ordering;
use std::fmt;
use std::time::Duration;
use reqwest::blocking::Client;
use tracing::{debug, info, warn};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::model::UpdateDescriptor;

const USER_AGENT: &str = concat!("jobmanager/", env!("CARGO_PKG_VERSION"));

/// A dot-separated sequence of non-negative integers.
///
/// Missing trailing components compare as zero, so `1.2` equals `1.2.0`.
#[derive(Debug, Clone)]
pub struct Version(Vec<u64>);

impl Version {
    pub fn parse(text: &str) -> Result<Self, EngineError> {
        let text = text.trim();
        let parts = text
            .split('.')
            .map(|part| part.trim().parse::<u64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| EngineError::MalformedResponse {
                reason: format!("invalid version {:?}: {}", text, e),
            })?;
        Ok(Version(parts))
    }

    fn component(&self, index: usize) -> u64 {
        self.0.get(index).copied().unwrap_or(0)
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.0.len().max(other.0.len());
        (0..len)
            .map(|i| self.component(i).cmp(&other.component(i)))
            .find(|ord| *ord != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(u64::to_string).collect();
        write!(f, "{}", parts.join("."))
    }
}

/// Whether `remote` is strictly newer than `current`.
pub fn is_newer_version(remote: &str, current: &str) -> Result<bool, EngineError> {
    Ok(Version::parse(remote)? > Version::parse(current)?)
}

/// Who asked for the check; decides whether failures are shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckTrigger {
    /// The user explicitly asked ("Check for Updates")
    Manual,
    /// Timer-driven check at startup
    Background,
}

#[derive(Debug)]
pub enum UpdateCheck {
    UpToDate,
    Available(UpdateDescriptor),
    Failed(EngineError),
}

/// Result of a version check plus the trigger that started it.
#[derive(Debug)]
pub struct CheckOutcome {
    pub trigger: CheckTrigger,
    pub check: UpdateCheck,
}

impl CheckOutcome {
    /// The failure to show the user, if any. Background failures stay silent.
    pub fn reportable_error(&self) -> Option<&EngineError> {
        match (&self.check, self.trigger) {
            (UpdateCheck::Failed(e), CheckTrigger::Manual) => Some(e),
            _ => None,
        }
    }

    pub fn available(&self) -> Option<&UpdateDescriptor> {
        match &self.check {
            UpdateCheck::Available(descriptor) => Some(descriptor),
            _ => None,
        }
    }
}

/// Fetch and parse the update descriptor at `url`.
pub fn fetch_descriptor(url: &str, timeout: Duration) -> Result<UpdateDescriptor, EngineError> {
    let client = Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| EngineError::network(url, e))?;

    debug!(%url, "fetching update descriptor");
    let body = client
        .get(url)
        .send()
        .and_then(|response| response.error_for_status())
        .and_then(|response| response.text())
        .map_err(|e| EngineError::network(url, e))?;

    let descriptor: UpdateDescriptor =
        serde_json::from_str(&body).map_err(|e| EngineError::MalformedResponse {
            reason: e.to_string(),
        })?;
    Version::parse(&descriptor.version)?;
    Ok(descriptor)
}

/// Check the configured endpoint for a release newer than the running version.
pub fn check_for_update(config: &EngineConfig, trigger: CheckTrigger) -> CheckOutcome {
    let check = match fetch_descriptor(&config.update_url, config.check_timeout)
        .and_then(|d| is_newer_version(&d.version, &config.current_version).map(|newer| (d, newer)))
    {
        Ok((descriptor, true)) => {
            info!(version = %descriptor.version, "update available");
            UpdateCheck::Available(descriptor)
        }
        Ok((descriptor, false)) => {
            debug!(remote = %descriptor.version, current = %config.current_version, "up to date");
            UpdateCheck::UpToDate
        }
        Err(e) => {
            match trigger {
                CheckTrigger::Manual => warn!(error = %e, "update check failed"),
                CheckTrigger::Background => debug!(error = %e, "background update check failed"),
            }
            UpdateCheck::Failed(e)
        }
    };

    CheckOutcome { trigger, check }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::update::test_server::serve_once;

    #[test]
    fn test_missing_trailing_components_compare_as_zero() {
        assert!(!is_newer_version("1.2", "1.2.0").unwrap());
        assert!(!is_newer_version("1.2.0", "1.2").unwrap());
        assert_eq!(Version::parse("1.2").unwrap(), Version::parse("1.2.0.0").unwrap());
    }

    #[test]
    fn test_components_compare_numerically() {
        assert!(is_newer_version("1.10.0", "1.9.0").unwrap());
        assert!(is_newer_version("2", "1.9.9").unwrap());
        assert!(is_newer_version("1.0.1", "1.0.0").unwrap());
        assert!(!is_newer_version("1.0.0", "1.0.1").unwrap());
        assert!(!is_newer_version("1.0.0", "1.0.0").unwrap());
    }

    #[test]
    fn test_invalid_version_is_malformed() {
        for bad in ["", "1..2", "1.x", "v1.2", "-1"] {
            let err = Version::parse(bad).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::NetworkFailure, "{:?} should be rejected", bad);
        }
    }

    #[test]
    fn test_version_display() {
        assert_eq!(Version::parse(" 1.10.3 ").unwrap().to_string(), "1.10.3");
    }

    fn config_with_url(url: String, current: &str) -> EngineConfig {
        EngineConfig::from_env(current).with_update_url(url)
    }

    #[test]
    fn test_check_finds_newer_release() {
        let body = r#"{"version": "1.0.1", "download_url": "http://example.invalid/JobManager.exe", "release_notes": "Fixed bug with file transfers"}"#;
        let url = serve_once("200 OK", body.as_bytes().to_vec(), true);

        let outcome = check_for_update(&config_with_url(url, "1.0.0"), CheckTrigger::Manual);

        let descriptor = outcome.available().expect("Update should be available");
        assert_eq!(descriptor.version, "1.0.1");
        assert_eq!(descriptor.release_notes.as_deref(), Some("Fixed bug with file transfers"));
        assert!(outcome.reportable_error().is_none());
    }

    #[test]
    fn test_check_same_version_is_up_to_date() {
        let body = r#"{"version": "1.0", "download_url": "http://example.invalid/x"}"#;
        let url = serve_once("200 OK", body.as_bytes().to_vec(), true);

        let outcome = check_for_update(&config_with_url(url, "1.0.0"), CheckTrigger::Manual);

        assert!(matches!(outcome.check, UpdateCheck::UpToDate));
    }

    #[test]
    fn test_malformed_descriptor_reported_only_when_manual() {
        let body = r#"{"latest": "1.0.1"}"#;
        let url = serve_once("200 OK", body.as_bytes().to_vec(), true);
        let manual = check_for_update(&config_with_url(url, "1.0.0"), CheckTrigger::Manual);
        let err = manual.reportable_error().expect("Manual check should report");
        assert!(matches!(err, EngineError::MalformedResponse { .. }));

        let url = serve_once("200 OK", body.as_bytes().to_vec(), true);
        let background = check_for_update(&config_with_url(url, "1.0.0"), CheckTrigger::Background);
        assert!(matches!(background.check, UpdateCheck::Failed(_)));
        assert!(background.reportable_error().is_none());
    }

    #[test]
    fn test_server_error_is_network_failure() {
        let url = serve_once("500 Internal Server Error", b"oops".to_vec(), true);

        let err = fetch_descriptor(&url, Duration::from_secs(5)).unwrap_err();

        assert!(matches!(err, EngineError::Network { .. }));
    }
}
