//! Console message handling.
//!
//! | Command | Effect |
//! |---|---|
//! | `RESET` | initial value, log = `[Init]` |
//! | `COMMIT` | current value, log = `[Init]` |
//! | `ROLLBACK` | snapshot value, log = `[Init]` |
//! | `JUMP_TO_STATE` / `JUMP_TO_ACTION` | snapshot value, log emptied |
//! | `TOGGLE_ACTION` | recomputed value, checkpoint appended |
//! | `IMPORT_STATE` | last imported value, checkpoint appended |
//! | `PAUSE_RECORDING` | on resume: current value, log = `[Init]` |
//! | `ACTION` | evaluated, then recorded like any dispatch |
//!
//! Everything else is a no-op. RESET, COMMIT, ROLLBACK and resume start a
//! new recording epoch; the console drops its history then, so the callable
//! registry is cleared along with it.

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::core::{Action, Reducer};
use crate::error::DevtoolsError;
use crate::history::StagedHistory;
use crate::lift::LiftReducer;
use crate::messages::{ConsoleCommand, IncomingMessage};
use crate::state::ActionState;
use crate::toggle::toggle_action;

impl<S, A, R> LiftReducer<S, A, R>
where
    S: Clone + Serialize + DeserializeOwned,
    A: Action,
    R: Reducer<S, A>,
{
    /// Handle a console message. `paused` is the already-updated flag.
    ///
    /// On error `state` is unchanged.
    pub fn handle(
        &mut self,
        state: &mut ActionState<S>,
        message: IncomingMessage,
        paused: bool,
    ) -> Result<(), DevtoolsError> {
        match message {
            IncomingMessage::Dispatch {
                payload,
                state: snapshot,
            } => self.handle_command(state, payload, snapshot.as_deref(), paused),
            IncomingMessage::Action { payload } => {
                let action = self
                    .evaluator
                    .evaluate(&payload, self.action_creators.as_ref())?;
                debug!("evaluated console action");
                self.record(state, action)
            }
            IncomingMessage::Start | IncomingMessage::Stop | IncomingMessage::Unknown => {
                debug!(message = message.name(), "message ignored");
                Ok(())
            }
        }
    }

    fn handle_command(
        &mut self,
        state: &mut ActionState<S>,
        command: ConsoleCommand,
        snapshot: Option<&str>,
        paused: bool,
    ) -> Result<(), DevtoolsError> {
        let name = command.name();
        debug!(command = name, "handling console command");

        match command {
            ConsoleCommand::Reset => {
                let initial = self.initial.resolve();
                self.start_epoch(state, initial);
            }
            ConsoleCommand::Commit => {
                let current = state.state.clone();
                self.start_epoch(state, current);
            }
            ConsoleCommand::Rollback => {
                let committed = decode_snapshot(name, snapshot)?;
                self.start_epoch(state, committed);
            }
            ConsoleCommand::JumpToState { .. } | ConsoleCommand::JumpToAction { .. } => {
                let target = decode_snapshot(name, snapshot)?;
                state.clear(target);
            }
            ConsoleCommand::ToggleAction { id } => {
                let history: StagedHistory<S> = decode_snapshot(name, snapshot)?;
                let toggled = toggle_action(
                    &self.reducer,
                    &self.codec,
                    state.state.clone(),
                    id,
                    history,
                )?;
                state.checkpoint(toggled.next_state, toggled.history);
            }
            ConsoleCommand::ImportState {
                next_lifted_state, ..
            } => self.import(state, next_lifted_state)?,
            ConsoleCommand::PauseRecording { .. } => {
                if !paused {
                    let current = state.state.clone();
                    self.start_epoch(state, current);
                }
            }
            ConsoleCommand::LockChanges { .. }
            | ConsoleCommand::SetActionsActive
            | ConsoleCommand::Sweep
            | ConsoleCommand::ReorderAction
            | ConsoleCommand::Other => {}
        }

        Ok(())
    }

    fn import(&mut self, state: &mut ActionState<S>, lifted: Value) -> Result<(), DevtoolsError> {
        if lifted.get("computedStates").is_none() {
            debug!("imported state has no computedStates, ignored");
            return Ok(());
        }

        let history: StagedHistory<S> =
            serde_json::from_value(lifted).map_err(|source| DevtoolsError::Snapshot {
                command: "IMPORT_STATE",
                source,
            })?;
        let next = history
            .last_state()
            .cloned()
            .unwrap_or_else(|| state.state.clone());

        if history.computed_states.is_empty() {
            warn!("imported history has no computed states, keeping current state");
        }
        state.checkpoint(next, history);
        Ok(())
    }

    fn start_epoch(&mut self, state: &mut ActionState<S>, at: S) {
        self.codec.forget_callables();
        state.reinitialize(at);
    }
}

fn decode_snapshot<T: DeserializeOwned>(
    command: &'static str,
    snapshot: Option<&str>,
) -> Result<T, DevtoolsError> {
    let text = snapshot.ok_or(DevtoolsError::MissingSnapshot { command })?;
    serde_json::from_str(text).map_err(|source| DevtoolsError::Snapshot { command, source })
}
