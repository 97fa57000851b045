//! The lifted state: the live value plus the log waiting to be drained.
//!
//! # Guarantees
//!
//! - **FIFO**: entries are drained in the order they were appended
//! - **In-memory only**: nothing is persisted
//! - **Drain-once**: an entry leaves the log exactly when it is drained
//!
//! `state` always equals the starting snapshot folded through every unskipped
//! recorded action in staged order.

use std::collections::VecDeque;

use crate::codec::ActionEnvelope;
use crate::history::StagedHistory;

/// One entry in the outgoing log.
#[derive(Debug, Clone, PartialEq)]
pub enum LogEntry<S> {
    /// Start of a recording epoch; the console re-initializes its view.
    Init(S),
    /// A recorded action and the state it produced.
    Action(ActionEnvelope, S),
    /// A state-only checkpoint carrying the console's staged history.
    Checkpoint(StagedHistory<S>),
}

impl<S> LogEntry<S> {
    /// Whether this is an `Init` entry.
    pub fn is_init(&self) -> bool {
        matches!(self, LogEntry::Init(_))
    }

    /// Whether this is a checkpoint entry.
    pub fn is_checkpoint(&self) -> bool {
        matches!(self, LogEntry::Checkpoint(_))
    }

    /// The recorded envelope, for action entries.
    pub fn envelope(&self) -> Option<&ActionEnvelope> {
        match self {
            LogEntry::Action(envelope, _) => Some(envelope),
            _ => None,
        }
    }
}

/// The live value and the log of entries not yet drained.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionState<S> {
    /// The current domain state.
    pub state: S,
    /// Entries waiting for the transport, oldest first.
    pub actions: VecDeque<LogEntry<S>>,
}

impl<S: Clone> ActionState<S> {
    /// A state with an empty log.
    pub fn cleared(state: S) -> Self {
        Self {
            state,
            actions: VecDeque::new(),
        }
    }

    /// A state whose log is a single `Init` entry for it.
    pub fn initialized(state: S) -> Self {
        let mut actions = VecDeque::with_capacity(1);
        actions.push_back(LogEntry::Init(state.clone()));
        Self { state, actions }
    }

    /// Start a new recording epoch at `state`.
    pub fn reinitialize(&mut self, state: S) {
        *self = Self::initialized(state);
    }

    /// Replace the state and drop the log.
    pub fn clear(&mut self, state: S) {
        *self = Self::cleared(state);
    }

    /// Move to `next` and record the action that produced it.
    pub fn record(&mut self, envelope: ActionEnvelope, next: S) {
        self.actions
            .push_back(LogEntry::Action(envelope, next.clone()));
        self.state = next;
    }

    /// Move to `next` and append a checkpoint for `history`.
    pub fn checkpoint(&mut self, next: S, history: StagedHistory<S>) {
        self.actions.push_back(LogEntry::Checkpoint(history));
        self.state = next;
    }
}

impl<S> ActionState<S> {
    /// Number of entries waiting to be drained.
    pub fn pending(&self) -> usize {
        self.actions.len()
    }

    /// Remove and return the oldest entry.
    pub fn pop(&mut self) -> Option<LogEntry<S>> {
        self.actions.pop_front()
    }

    /// Drain every pending entry, oldest first.
    ///
    /// The iterator stops at the end of the log; entries appended afterwards
    /// stay for the next drain.
    pub fn drain(&mut self) -> std::collections::vec_deque::Drain<'_, LogEntry<S>> {
        self.actions.drain(..)
    }
}
