//! Messages the devtools console sends to an instance.
//!
//! The console speaks a small JSON protocol:
//!
//! ```text
//! {"type": "DISPATCH", "payload": {"type": "<COMMAND>", ...}, "state": "<json text>"}
//! {"type": "ACTION",   "payload": "<expression>"}
//! {"type": "START"} / {"type": "STOP"}
//! ```
//!
//! Both layers are closed tagged unions. Anything the engine does not act on
//! decodes into an explicit catch-all variant instead of failing.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::DevtoolsError;

/// A message received from the devtools console.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IncomingMessage {
    /// A history command, optionally carrying snapshot text.
    Dispatch {
        /// The command itself.
        payload: ConsoleCommand,
        /// JSON text of the state (or staged history) the command refers to.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        state: Option<String>,
    },
    /// A free-form action typed into the console's dispatcher.
    Action {
        /// Expression text or a selected creator with arguments.
        payload: ActionPayload,
    },
    /// The console started listening to this instance.
    Start,
    /// The console stopped listening to this instance.
    Stop,
    /// Any message type this engine does not handle.
    #[serde(other)]
    Unknown,
}

impl IncomingMessage {
    /// Parse a console message from JSON text.
    pub fn parse(text: &str) -> Result<Self, DevtoolsError> {
        serde_json::from_str(text).map_err(DevtoolsError::Message)
    }

    /// A `DISPATCH` message without snapshot text.
    pub fn dispatch(command: ConsoleCommand) -> Self {
        IncomingMessage::Dispatch {
            payload: command,
            state: None,
        }
    }

    /// A `DISPATCH` message carrying snapshot text.
    pub fn dispatch_with_state(command: ConsoleCommand, state: impl Into<String>) -> Self {
        IncomingMessage::Dispatch {
            payload: command,
            state: Some(state.into()),
        }
    }

    /// An `ACTION` message with expression text.
    pub fn action(expression: impl Into<String>) -> Self {
        IncomingMessage::Action {
            payload: ActionPayload::Expression(expression.into()),
        }
    }

    /// Name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            IncomingMessage::Dispatch { payload, .. } => payload.name(),
            IncomingMessage::Action { .. } => "ACTION",
            IncomingMessage::Start => "START",
            IncomingMessage::Stop => "STOP",
            IncomingMessage::Unknown => "UNKNOWN",
        }
    }
}

/// Payload of an `ACTION` message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ActionPayload {
    /// Expression text: a JSON object literal or a creator call.
    Expression(String),
    /// A creator picked from the catalog the console was given.
    Selected {
        /// Index into the catalog.
        selected: usize,
        /// One JSON literal per declared argument.
        #[serde(default)]
        args: Vec<String>,
        /// JSON array text spread after `args`.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        rest: Option<String>,
    },
}

/// History commands carried by `DISPATCH` messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConsoleCommand {
    /// Restart from the initial state.
    Reset,
    /// Make the current state the new starting point.
    Commit,
    /// Go back to the committed state sent along.
    Rollback,
    /// Show the state sent along without recording anything.
    #[serde(rename_all = "camelCase")]
    JumpToState {
        /// Position in the console's list.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        index: Option<usize>,
        /// Id of the selected action.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        action_id: Option<u64>,
    },
    /// Show the state after the given action.
    #[serde(rename_all = "camelCase")]
    JumpToAction {
        /// Id of the selected action.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        action_id: Option<u64>,
    },
    /// Flip the skip status of one recorded action.
    ToggleAction {
        /// Id of the action in the staged history.
        id: u64,
    },
    /// Replace the history with an imported one.
    #[serde(rename_all = "camelCase")]
    ImportState {
        /// The imported history, in whatever shape the file had.
        next_lifted_state: Value,
        /// Extra state the console may send along with the import.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        preloaded_state: Option<Value>,
    },
    /// Pause or resume recording.
    PauseRecording {
        /// True to pause.
        status: bool,
    },
    /// Lock or unlock all changes.
    LockChanges {
        /// True to lock.
        status: bool,
    },
    /// Enable or disable a range of actions.
    SetActionsActive,
    /// Drop skipped actions from the history.
    Sweep,
    /// Move an action within the history.
    ReorderAction,
    /// Any command this engine does not handle.
    #[serde(other)]
    Other,
}

impl ConsoleCommand {
    /// The command name as the console spells it.
    pub fn name(&self) -> &'static str {
        match self {
            ConsoleCommand::Reset => "RESET",
            ConsoleCommand::Commit => "COMMIT",
            ConsoleCommand::Rollback => "ROLLBACK",
            ConsoleCommand::JumpToState { .. } => "JUMP_TO_STATE",
            ConsoleCommand::JumpToAction { .. } => "JUMP_TO_ACTION",
            ConsoleCommand::ToggleAction { .. } => "TOGGLE_ACTION",
            ConsoleCommand::ImportState { .. } => "IMPORT_STATE",
            ConsoleCommand::PauseRecording { .. } => "PAUSE_RECORDING",
            ConsoleCommand::LockChanges { .. } => "LOCK_CHANGES",
            ConsoleCommand::SetActionsActive => "SET_ACTIONS_ACTIVE",
            ConsoleCommand::Sweep => "SWEEP",
            ConsoleCommand::ReorderAction => "REORDER_ACTION",
            ConsoleCommand::Other => "OTHER",
        }
    }
}
