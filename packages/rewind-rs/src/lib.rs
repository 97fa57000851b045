//! # Rewind
//!
//! Time-travel debugging for plain reducers: record, pause, roll back, replay
//! and skip transitions, driven by a devtools console.
//!
//! ## Core Concepts
//!
//! Rewind lifts two caller-owned pieces:
//! - [`Reducer`] = a pure transition `(state, action) -> state`
//! - [`Action`] = the transition request, plain data or an opaque callable
//!
//! The lifted reducer keeps the live state plus a log of what happened, and
//! obeys the console's history commands.
//!
//! ## Architecture
//!
//! ```text
//! Host                               Console
//!  │ dispatch(action)                  │ {"type":"DISPATCH",...}
//!  ▼                                   ▼
//! Devtools ──► StatusFlags.observe() ──┤
//!  │                                   │
//!  ▼                                   │
//! LiftReducer ─┬─ locked  → no-op      │
//!              ├─ message → incoming handler ─► toggle / eval
//!              ├─ paused  → reducer only
//!              └─ record  → reducer + ActionCodec.normalize()
//!                              │
//!                              ▼
//!                     ActionState.actions (FIFO)
//!                              │ drain_outbound()
//!                              ▼
//!                     Outbound ─► Connection (host transport)
//! ```
//!
//! ## Key Invariants
//!
//! 1. **Locked means frozen** - nothing changes state while changes are locked
//! 2. **Paused means unrecorded** - state still moves, the log does not grow
//! 3. **The log drains in order** - entries leave exactly once, oldest first
//! 4. **Reducer errors are the reducer's** - never caught, never rewrapped
//! 5. **Nothing is compiled** - callables resolve through a per-engine registry
//!
//! ## Guarantees
//!
//! - **In-memory only**: history lives in the console; the engine keeps only
//!   what has not been drained
//! - **Per-engine state**: flags, ids and callable registries are never shared
//!   between engines
//!
//! ## Example
//!
//! ```ignore
//! use rewind::{Devtools, DevtoolsConfig};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! #[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
//! enum CounterAction {
//!     Add { amount: i64 },
//!     Reset,
//! }
//! rewind::serde_action!(CounterAction);
//!
//! let counter = |count: &i64, action: &CounterAction| -> anyhow::Result<i64> {
//!     Ok(match action {
//!         CounterAction::Add { amount } => count + amount,
//!         CounterAction::Reset => 0,
//!     })
//! };
//!
//! let mut devtools = Devtools::builder(counter, 0)
//!     .config(DevtoolsConfig::from_env()?)
//!     .build();
//!
//! devtools.dispatch(CounterAction::Add { amount: 5 })?;
//! devtools.receive_json(&line_from_console)?;
//!
//! for message in devtools.drain_outbound() {
//!     deliver(&connection, message).await?;
//! }
//! ```
//!
//! ## What This Is Not
//!
//! Rewind is **not**:
//! - A console UI
//! - A transport to the browser extension
//! - A persistence layer

// Core modules
mod codec;
mod core;
mod engine;
mod error;
mod history;
mod incoming;
mod lift;
mod messages;
mod state;
mod status;
mod toggle;

// Action expressions typed into the console
pub mod eval;

// Outbound messages and the transport seam
pub mod outbox;

// Async pump between engine and connection
pub mod session;

// Configuration
pub mod config;

// Testing utilities (feature-gated)
#[cfg(any(test, feature = "testing"))]
pub mod testing;


// Re-export core traits
pub use crate::core::{Action, ActionForm, CallableId, Lifted, Reducer};

// Re-export error types
pub use crate::error::{DevtoolsError, EvalError};

// Re-export codec types
pub use codec::{ActionCodec, ActionEnvelope, CALLABLE_KEY, WRAPPED_KEY};

// Re-export console message types
pub use messages::{ActionPayload, ConsoleCommand, IncomingMessage};

// Re-export history and log types
pub use history::{ComputedState, PerformAction, StagedHistory};
pub use state::{ActionState, LogEntry};

// Re-export the lifted reducer and its parts
pub use lift::{InitialState, LiftReducer};
pub use status::StatusFlags;
pub use toggle::{toggle_action, Toggled};

// Re-export engine types (primary entry point)
pub use engine::{ConnectOptions, Devtools, DevtoolsBuilder, SharedDevtools};

// Re-export frequently used module items
pub use config::{DevtoolsConfig, Features};
pub use eval::{ActionCreator, ActionCreators, CreatorNode};
pub use outbox::{deliver, Connection, Outbound};
pub use session::{Session, SessionInput};

// Re-export commonly used external types
pub use async_trait::async_trait;

#[doc(hidden)]
pub use serde_json as __serde_json;
