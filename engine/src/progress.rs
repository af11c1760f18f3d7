//! Progress reporting.
//!
//! This module defines the ProgressCallback trait, which decouples the transfer
//! and update pipelines from whatever presents their progress. Workers use
//! `ChannelProgress` to forward typed events to the control thread.

use crossbeam_channel::Sender;

/// Trait for receiving progress updates from a running operation.
///
/// All methods are called synchronously on the worker thread performing the operation.
pub trait ProgressCallback: Send + Sync {
    /// Called with a human-readable status line ("Copying Pix files...").
    fn on_message(&self, message: &str);

    /// Called with the percentage complete of a download.
    fn on_percent(&self, percent: u8);
}

/// A progress event as seen by the control thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressUpdate {
    Message(String),
    Percent(u8),
}

/// A ProgressCallback that sends every event down a channel.
///
/// Send failures are ignored: a dropped receiver only means nobody is
/// listening any more, and the operation itself keeps running.
pub struct ChannelProgress {
    sender: Sender<ProgressUpdate>,
}

impl ChannelProgress {
    pub fn new(sender: Sender<ProgressUpdate>) -> Self {
        ChannelProgress { sender }
    }
}

impl ProgressCallback for ChannelProgress {
    fn on_message(&self, message: &str) {
        let _ = self.sender.send(ProgressUpdate::Message(message.to_string()));
    }

    fn on_percent(&self, percent: u8) {
        let _ = self.sender.send(ProgressUpdate::Percent(percent));
    }
}
