//! Per-engine recording status.
//!
//! Three booleans, owned by one engine and never shared:
//!
//! - `paused`: domain actions still change state but are not recorded
//! - `locked`: nothing changes state
//! - `subscribed`: a console is currently listening
//!
//! Flags change only in [`StatusFlags::observe`], which runs before the
//! message reaches the lifted reducer.

use tracing::debug;

use crate::messages::{ConsoleCommand, IncomingMessage};

/// Recording status of one engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusFlags {
    paused: bool,
    locked: bool,
    subscribed: bool,
}

impl StatusFlags {
    /// Seed flags from configuration. Nothing is subscribed yet.
    pub fn from_config(record_changes: bool, start_locked: bool) -> Self {
        Self {
            paused: !record_changes,
            locked: start_locked,
            subscribed: false,
        }
    }

    /// Whether recording is paused.
    pub fn paused(&self) -> bool {
        self.paused
    }

    /// Whether all changes are locked.
    pub fn locked(&self) -> bool {
        self.locked
    }

    /// Whether a console is listening.
    pub fn subscribed(&self) -> bool {
        self.subscribed
    }

    /// Update flags for an incoming message.
    ///
    /// Returns `false` for `START`/`STOP`, which only affect the subscription
    /// and must not reach the reducer.
    pub fn observe(&mut self, message: &IncomingMessage) -> bool {
        match message {
            IncomingMessage::Start => {
                self.subscribed = true;
                false
            }
            IncomingMessage::Stop => {
                self.subscribed = false;
                false
            }
            IncomingMessage::Dispatch {
                payload: ConsoleCommand::PauseRecording { status },
                ..
            } => {
                debug!(paused = *status, "recording status changed");
                self.paused = *status;
                true
            }
            IncomingMessage::Dispatch {
                payload: ConsoleCommand::LockChanges { status },
                ..
            } => {
                debug!(locked = *status, "lock status changed");
                self.locked = *status;
                true
            }
            _ => true,
        }
    }
}
