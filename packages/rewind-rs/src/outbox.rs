//! Outgoing messages and the transport seam.
//!
//! The engine never talks to the console itself. Drained log entries are
//! encoded into [`Outbound`] messages and handed to a [`Connection`], which
//! the host implements for whatever transport it uses.
//!
//! # Mapping
//!
//! | Log entry | Outbound | Connection call |
//! |---|---|---|
//! | `Init(state)` | `Init { state }` | `init(state)` |
//! | `Action(envelope, state)` | `Record { action, state }` | `send(Some(action), state)` |
//! | `Checkpoint(history)` | `Checkpoint { history }` | `send(None, history)` |
//!
//! # Example
//!
//! ```ignore
//! use rewind::{Connection, Outbound};
//!
//! struct StdoutConnection;
//!
//! #[async_trait]
//! impl Connection for StdoutConnection {
//!     async fn init(&self, state: Value) -> anyhow::Result<()> {
//!         println!("{}", json!({"type": "INIT", "state": state}));
//!         Ok(())
//!     }
//!
//!     async fn send(&self, action: Option<Value>, state: Value) -> anyhow::Result<()> {
//!         println!("{}", json!({"type": "ACTION", "action": action, "state": state}));
//!         Ok(())
//!     }
//! }
//! ```

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::DevtoolsError;
use crate::state::LogEntry;

// =============================================================================
// Outbound
// =============================================================================

/// A message for the console, already encoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outbound {
    /// Re-initialize the console's view at `state`.
    Init {
        /// The encoded state.
        state: Value,
    },
    /// A state-only update carrying the staged history.
    Checkpoint {
        /// The encoded history.
        history: Value,
    },
    /// A recorded action and the state it produced.
    Record {
        /// The encoded envelope.
        action: Value,
        /// The encoded state.
        state: Value,
    },
}

impl Outbound {
    /// Encode a log entry.
    pub fn from_entry<S: Serialize>(entry: &LogEntry<S>) -> Result<Self, DevtoolsError> {
        Ok(match entry {
            LogEntry::Init(state) => Outbound::Init {
                state: encode("state", state)?,
            },
            LogEntry::Checkpoint(history) => Outbound::Checkpoint {
                history: encode("staged history", history)?,
            },
            LogEntry::Action(envelope, state) => Outbound::Record {
                action: envelope.to_value(),
                state: encode("state", state)?,
            },
        })
    }

    /// Name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Outbound::Init { .. } => "init",
            Outbound::Checkpoint { .. } => "checkpoint",
            Outbound::Record { .. } => "record",
        }
    }
}

fn encode<T: Serialize>(what: &'static str, value: &T) -> Result<Value, DevtoolsError> {
    serde_json::to_value(value).map_err(|source| DevtoolsError::Encode { what, source })
}

// =============================================================================
// Connection
// =============================================================================

/// The host's transport to the console.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Re-initialize the console's view.
    async fn init(&self, state: Value) -> Result<()>;

    /// Send an update. `action` is `None` for checkpoints.
    async fn send(&self, action: Option<Value>, state: Value) -> Result<()>;
}

#[async_trait]
impl<C: Connection + ?Sized> Connection for Arc<C> {
    async fn init(&self, state: Value) -> Result<()> {
        (**self).init(state).await
    }

    async fn send(&self, action: Option<Value>, state: Value) -> Result<()> {
        (**self).send(action, state).await
    }
}

/// Hand one outbound message to `connection`.
pub async fn deliver<C: Connection + ?Sized>(connection: &C, message: Outbound) -> Result<()> {
    match message {
        Outbound::Init { state } => connection.init(state).await,
        Outbound::Checkpoint { history } => connection.send(None, history).await,
        Outbound::Record { action, state } => connection.send(Some(action), state).await,
    }
}

// =============================================================================
// Tests
// =============================================================================
