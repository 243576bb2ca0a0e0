//! Per-`installId` multi-writer/single-reader progress stream (§5, §6).
//!
//! One `tokio::sync::broadcast` channel per in-flight install, keyed in a
//! shared map. A subscriber that stops reading is detected the ordinary way
//! broadcast detects lagging/closed receivers: the next `send` simply
//! returns an error we ignore, per "drops heartbeats and non-final events
//! only if a subscriber's write fails."

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::Utc;
use forgehook_core::{InstallId, ProgressEvent, ProgressPhase};
use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 64;

/// Registry of active install progress channels.
#[derive(Default)]
pub struct ProgressBus {
    channels: Mutex<HashMap<InstallId, broadcast::Sender<ProgressEvent>>>,
}

impl ProgressBus {
    /// Empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    fn sender(&self, install_id: &InstallId) -> broadcast::Sender<ProgressEvent> {
        let mut channels = self.channels.lock().expect("progress bus mutex poisoned");
        channels
            .entry(install_id.clone())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }

    /// Attach a new subscriber; immediately queues a `connected` event.
    pub fn subscribe(&self, install_id: &InstallId) -> broadcast::Receiver<ProgressEvent> {
        let sender = self.sender(install_id);
        let receiver = sender.subscribe();
        let _ = sender.send(ProgressEvent::Connected {
            install_id: install_id.clone(),
            at: Utc::now(),
        });
        receiver
    }

    /// Publish a phase transition. Write failures (no subscribers) are
    /// silently ignored — they are not lost data, just nobody listening.
    pub fn publish_progress(&self, install_id: &InstallId, phase: ProgressPhase, message: Option<String>) {
        let sender = self.sender(install_id);
        let _ = sender.send(ProgressEvent::Progress {
            install_id: install_id.clone(),
            phase,
            message,
            at: Utc::now(),
        });
    }

    /// Publish a keep-alive heartbeat.
    pub fn publish_heartbeat(&self, install_id: &InstallId) {
        let sender = self.sender(install_id);
        let _ = sender.send(ProgressEvent::Heartbeat {
            install_id: install_id.clone(),
            at: Utc::now(),
        });
    }

    /// Publish the terminal success event and retire the channel.
    pub fn publish_complete(&self, install_id: &InstallId) {
        let sender = self.sender(install_id);
        let _ = sender.send(ProgressEvent::Complete {
            install_id: install_id.clone(),
            at: Utc::now(),
        });
        self.retire(install_id);
    }

    /// Publish the terminal failure event and retire the channel.
    pub fn publish_error(&self, install_id: &InstallId, message: impl Into<String>) {
        let sender = self.sender(install_id);
        let _ = sender.send(ProgressEvent::Error {
            install_id: install_id.clone(),
            message: message.into(),
            at: Utc::now(),
        });
        self.retire(install_id);
    }

    fn retire(&self, install_id: &InstallId) {
        self.channels.lock().expect("progress bus mutex poisoned").remove(install_id);
    }
}
