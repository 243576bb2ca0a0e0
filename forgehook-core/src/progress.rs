//! Wire envelope for the install progress stream (§6).
//!
//! The bus itself — a per-installId multi-writer/single-reader channel with
//! a ticker-driven heartbeat — lives in `forgehook-lifecycle`, since it needs
//! an async runtime. This module only defines the envelope shape, which is
//! part of the shared data model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::InstallId;

/// Phase reached by an in-flight install.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressPhase {
    /// Pulling or loading the image/module.
    Pull,
    /// Creating the container/record.
    Create,
    /// Starting the instance.
    Start,
    /// Waiting for the first health check.
    Healthcheck,
    /// Install finished successfully.
    Complete,
    /// Install failed.
    Error,
}

/// One envelope delivered to external transport subscribers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProgressEvent {
    /// Sent once, immediately after a subscriber attaches.
    Connected {
        /// The install this subscription follows.
        install_id: InstallId,
        /// When the subscription was accepted.
        at: DateTime<Utc>,
    },
    /// A phase transition.
    Progress {
        /// The install this event concerns.
        install_id: InstallId,
        /// Phase reached.
        phase: ProgressPhase,
        /// Optional human-readable detail.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        /// When the phase was reached.
        at: DateTime<Utc>,
    },
    /// A keep-alive sent every 30s while no phase transition has occurred.
    Heartbeat {
        /// The install this heartbeat concerns.
        install_id: InstallId,
        /// When the heartbeat was sent.
        at: DateTime<Utc>,
    },
    /// Terminal success. The stream closes after this.
    Complete {
        /// The install that finished.
        install_id: InstallId,
        /// When it finished.
        at: DateTime<Utc>,
    },
    /// Terminal failure. The stream closes after this.
    Error {
        /// The install that failed.
        install_id: InstallId,
        /// Failure message.
        message: String,
        /// When it failed.
        at: DateTime<Utc>,
    },
}

impl ProgressEvent {
    /// The install id this event concerns, regardless of variant.
    pub fn install_id(&self) -> &InstallId {
        match self {
            Self::Connected { install_id, .. }
            | Self::Progress { install_id, .. }
            | Self::Heartbeat { install_id, .. }
            | Self::Complete { install_id, .. }
            | Self::Error { install_id, .. } => install_id,
        }
    }

    /// Whether this event terminates the stream (`complete` or `error`).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete { .. } | Self::Error { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn complete_and_error_are_terminal() {
        let now = Utc::now();
        let install_id = InstallId::new("abc");
        assert!(ProgressEvent::Complete {
            install_id: install_id.clone(),
            at: now,
        }
        .is_terminal());
        assert!(ProgressEvent::Error {
            install_id: install_id.clone(),
            message: "boom".into(),
            at: now,
        }
        .is_terminal());
        assert!(!ProgressEvent::Heartbeat {
            install_id,
            at: now,
        }
        .is_terminal());
    }

    #[test]
    fn serializes_with_tagged_type_field() {
        let event = ProgressEvent::Progress {
            install_id: InstallId::new("xyz"),
            phase: ProgressPhase::Pull,
            message: None,
            at: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "progress");
        assert_eq!(json["phase"], "pull");
        assert_eq!(json["install_id"], "xyz");
    }
}
