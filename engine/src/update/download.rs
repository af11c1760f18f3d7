//! Streaming download of an update binary.

use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;
use std::time::Duration;
use reqwest::blocking::Client;
use tracing::{info, warn};
use crate::error::EngineError;
use crate::model::{DownloadOutcome, DownloadResult};
use crate::progress::ProgressCallback;

/// Size of each read from the response body.
pub const CHUNK_SIZE: usize = 8192;

/// Turns byte counts into a non-decreasing percentage sequence.
struct PercentTracker<'a> {
    total: u64,
    last: Option<u8>,
    history: Vec<u8>,
    callback: Option<&'a dyn ProgressCallback>,
}

impl<'a> PercentTracker<'a> {
    fn update(&mut self, downloaded: u64) {
        let percent = (downloaded.saturating_mul(100) / self.total).min(100) as u8;
        if self.last.map_or(true, |last| percent > last) {
            self.last = Some(percent);
            self.history.push(percent);
            if let Some(callback) = self.callback {
                callback.on_percent(percent);
            }
        }
    }
}

/// Copy `reader` into `target` in bounded chunks.
///
/// Percentages are only tracked when `total` is a known, non-zero length.
fn stream_to_file<R: Read>(
    mut reader: R,
    total: Option<u64>,
    url: &str,
    target: &Path,
    progress_callback: Option<&dyn ProgressCallback>,
) -> (Result<u64, EngineError>, Option<Vec<u8>>) {
    let mut tracker = total.filter(|t| *t > 0).map(|total| PercentTracker {
        total,
        last: None,
        history: Vec::new(),
        callback: progress_callback,
    });

    let result = write_chunks(&mut reader, url, target, tracker.as_mut());
    (result, tracker.map(|t| t.history))
}

fn write_chunks<R: Read>(
    reader: &mut R,
    url: &str,
    target: &Path,
    mut tracker: Option<&mut PercentTracker<'_>>,
) -> Result<u64, EngineError> {
    let mut file = fs::File::create(target).map_err(|e| EngineError::io("writing", target, e))?;
    if let Some(tracker) = tracker.as_deref_mut() {
        tracker.update(0);
    }

    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut downloaded = 0u64;
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(EngineError::network(url, e)),
        };
        file.write_all(&buf[..n])
            .map_err(|e| EngineError::io("writing", target, e))?;
        downloaded += n as u64;
        if let Some(tracker) = tracker.as_deref_mut() {
            tracker.update(downloaded);
        }
    }
    file.flush().map_err(|e| EngineError::io("writing", target, e))?;
    Ok(downloaded)
}

/// Download `url` to `target`, overwriting any previous download.
///
/// The transfer itself has no timeout. A failed download removes whatever
/// partial file it had written.
pub fn download_update(
    url: &str,
    target: &Path,
    progress_callback: Option<&dyn ProgressCallback>,
) -> DownloadResult {
    info!(%url, target = %target.display(), "downloading update");

    let response = Client::builder()
        .timeout(None::<Duration>)
        .build()
        .and_then(|client| client.get(url).send())
        .and_then(|response| response.error_for_status());

    let (result, progress) = match response {
        Ok(response) => {
            let total = response.content_length();
            stream_to_file(response, total, url, target, progress_callback)
        }
        Err(e) => (Err(EngineError::network(url, e)), None),
    };

    match result {
        Ok(bytes_written) => {
            info!(bytes = bytes_written, "update downloaded");
            DownloadResult {
                outcome: DownloadOutcome::Success(target.to_path_buf()),
                progress,
                bytes_written,
            }
        }
        Err(e) => {
            warn!(error = %e, "update download failed");
            if let Err(remove_err) = fs::remove_file(target) {
                if remove_err.kind() != io::ErrorKind::NotFound {
                    warn!(path = %target.display(), error = %remove_err, "could not remove partial download");
                }
            }
            DownloadResult {
                outcome: DownloadOutcome::Failure(e),
                progress,
                bytes_written: 0,
            }
        }
    }
}
