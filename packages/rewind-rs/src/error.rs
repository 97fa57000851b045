//! Structured error types for rewind.
//!
//! `DevtoolsError` provides pattern-matchable errors instead of generic
//! `anyhow::Error`. `EvalError` covers the free-form action expressions the
//! console sends with `ACTION` messages.
//!
//! # The Reducer Boundary Rule
//!
//! > **Domain reducer failures are never caught or rewrapped.**
//!
//! - Reducers and action creators return `anyhow::Result`
//! - `DevtoolsError::Reducer` is transparent: `Display` and `source()` are the
//!   reducer's own, and `downcast_ref` on the inner error still finds the
//!   domain error type
//!
//! # Example
//!
//! ```ignore
//! use rewind::DevtoolsError;
//!
//! match devtools.receive(message) {
//!     Ok(()) => {}
//!     Err(DevtoolsError::Snapshot { command, source }) => {
//!         tracing::error!(%command, error = %source, "console sent a corrupt snapshot");
//!     }
//!     Err(DevtoolsError::Reducer(e)) => return Err(e),
//!     Err(other) => tracing::warn!(error = %other, "devtools command failed"),
//! }
//! ```

use thiserror::Error;

use crate::core::CallableId;

/// Structured error type for devtools operations.
#[derive(Debug, Error)]
pub enum DevtoolsError {
    /// Snapshot text attached to a console command could not be decoded.
    ///
    /// Corrupt snapshots are never accepted silently: the asserted state
    /// would no longer match the history the console shows.
    #[error("malformed snapshot for {command}: {source}")]
    Snapshot {
        /// The console command that carried the snapshot.
        command: &'static str,
        /// The underlying decode failure.
        #[source]
        source: serde_json::Error,
    },

    /// A command that needs snapshot text arrived without any.
    #[error("{command} requires a state snapshot but none was sent")]
    MissingSnapshot {
        /// The console command missing its snapshot.
        command: &'static str,
    },

    /// The staged history is structurally inconsistent.
    #[error("inconsistent staged history: {reason}")]
    History {
        /// What was wrong with it.
        reason: String,
    },

    /// An envelope referenced a callable this engine never registered.
    #[error("no callable registered under {id}")]
    CallableNotFound {
        /// The unknown id.
        id: CallableId,
    },

    /// An envelope could not be decoded back into a domain action.
    #[error("failed to decode action {kind}: {source}")]
    ActionDecode {
        /// The envelope discriminant.
        kind: String,
        /// The underlying decode failure.
        #[source]
        source: serde_json::Error,
    },

    /// A state or action could not be encoded for the console.
    #[error("failed to encode {what}: {source}")]
    Encode {
        /// What was being encoded.
        what: &'static str,
        /// The underlying encode failure.
        #[source]
        source: serde_json::Error,
    },

    /// A console message was not valid JSON or had an unknown shape.
    #[error("malformed console message: {0}")]
    Message(#[source] serde_json::Error),

    /// An `ACTION` expression could not be evaluated.
    #[error(transparent)]
    Eval(#[from] EvalError),

    /// The domain reducer failed. Passed through unchanged.
    #[error(transparent)]
    Reducer(anyhow::Error),
}

impl DevtoolsError {
    /// Returns true if this error came from the domain reducer.
    pub fn is_reducer(&self) -> bool {
        matches!(self, DevtoolsError::Reducer(_))
    }

    /// Unwrap the domain reducer's error, if this is one.
    pub fn into_reducer_error(self) -> Option<anyhow::Error> {
        match self {
            DevtoolsError::Reducer(e) => Some(e),
            _ => None,
        }
    }
}

/// Errors from evaluating a free-form action expression.
#[derive(Debug, Error)]
pub enum EvalError {
    /// The expression is not a JSON object literal or a creator call.
    #[error("cannot parse action expression {input:?}: {message}")]
    Parse {
        /// The expression text.
        input: String,
        /// Parser diagnostic.
        message: String,
    },

    /// The call arguments are not a valid JSON list.
    #[error("invalid arguments for {name}: {source}")]
    Arguments {
        /// The creator being called.
        name: String,
        /// The underlying decode failure.
        #[source]
        source: serde_json::Error,
    },

    /// No action creator with this name is configured.
    #[error("unknown action creator {name}")]
    UnknownCreator {
        /// The requested creator name.
        name: String,
    },

    /// The action creator itself returned an error.
    #[error("action creator {name} failed: {source}")]
    Creator {
        /// The creator that failed.
        name: String,
        /// Its error.
        #[source]
        source: anyhow::Error,
    },

    /// A literal action could not be decoded as the domain action type.
    #[error("literal action does not match the action type: {0}")]
    Literal(#[source] serde_json::Error),
}
