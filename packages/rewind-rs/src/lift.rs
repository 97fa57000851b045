//! The lifted reducer.
//!
//! Wraps a domain [`Reducer`] so that every call also maintains the
//! recording log. One call handles one input:
//!
//! ```text
//! locked?           → nothing changes
//! console message?  → incoming handler
//! paused?           → state moves, nothing recorded
//! otherwise         → state moves, one Action entry appended
//! ```
//!
//! # Key Properties
//!
//! - **Compute then commit**: the domain reducer runs before anything is
//!   written, so a failing reducer leaves the lifted state untouched
//! - **One instance, one registry**: callables registered while recording are
//!   only ever resolved by the same `LiftReducer`

use std::fmt;

use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

use crate::codec::ActionCodec;
use crate::core::{Action, Lifted, Reducer};
use crate::error::DevtoolsError;
use crate::eval::{ActionCreators, Evaluator};
use crate::state::ActionState;
use crate::status::StatusFlags;

/// Where RESET gets its starting value from.
pub enum InitialState<S> {
    /// A fixed value, cloned on every reset.
    Value(S),
    /// Recomputed on every reset.
    Lazy(Box<dyn Fn() -> S + Send + Sync>),
}

impl<S: Clone> InitialState<S> {
    /// An initializer called on every reset.
    pub fn lazy<F>(init: F) -> Self
    where
        F: Fn() -> S + Send + Sync + 'static,
    {
        InitialState::Lazy(Box::new(init))
    }

    /// Produce the starting value.
    pub fn resolve(&self) -> S {
        match self {
            InitialState::Value(state) => state.clone(),
            InitialState::Lazy(init) => init(),
        }
    }
}

impl<S> From<S> for InitialState<S> {
    fn from(state: S) -> Self {
        InitialState::Value(state)
    }
}

impl<S: fmt::Debug> fmt::Debug for InitialState<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InitialState::Value(state) => f.debug_tuple("Value").field(state).finish(),
            InitialState::Lazy(_) => f.write_str("Lazy(..)"),
        }
    }
}

/// A domain reducer lifted over [`ActionState`].
pub struct LiftReducer<S, A, R> {
    pub(crate) reducer: R,
    pub(crate) initial: InitialState<S>,
    pub(crate) codec: ActionCodec<A>,
    pub(crate) evaluator: Evaluator<A>,
    pub(crate) action_creators: Option<ActionCreators<A>>,
}

impl<S, A, R> LiftReducer<S, A, R>
where
    S: Clone + Serialize + DeserializeOwned,
    A: Action,
    R: Reducer<S, A>,
{
    /// Lift `reducer`, resetting to `initial`.
    pub fn new(reducer: R, initial: impl Into<InitialState<S>>) -> Self {
        Self {
            reducer,
            initial: initial.into(),
            codec: ActionCodec::new(),
            evaluator: Evaluator::new(),
            action_creators: None,
        }
    }

    /// Creators the console may call through `ACTION` messages.
    pub fn with_action_creators(mut self, creators: ActionCreators<A>) -> Self {
        self.action_creators = Some(creators);
        self
    }

    /// The starting value a RESET would produce now.
    pub fn initial_state(&self) -> S {
        self.initial.resolve()
    }

    /// The domain reducer.
    pub fn reducer(&self) -> &R {
        &self.reducer
    }

    /// The action codec, with this instance's callable registry.
    pub fn codec(&self) -> &ActionCodec<A> {
        &self.codec
    }

    /// Configured action creators.
    pub fn action_creators(&self) -> Option<&ActionCreators<A>> {
        self.action_creators.as_ref()
    }

    /// Handle one input.
    ///
    /// On error `state` is unchanged.
    pub fn reduce(
        &mut self,
        state: &mut ActionState<S>,
        input: Lifted<A>,
        flags: &StatusFlags,
    ) -> Result<(), DevtoolsError> {
        if flags.locked() {
            debug!("changes locked, input dropped");
            return Ok(());
        }

        match input {
            Lifted::Incoming(message) => self.handle(state, message, flags.paused()),
            Lifted::Domain(action) if flags.paused() => {
                state.state = self
                    .reducer
                    .reduce(&state.state, &action)
                    .map_err(DevtoolsError::Reducer)?;
                Ok(())
            }
            Lifted::Domain(action) => self.record(state, action),
        }
    }

    /// Apply `action` and append it to the log.
    pub(crate) fn record(
        &mut self,
        state: &mut ActionState<S>,
        action: A,
    ) -> Result<(), DevtoolsError> {
        let next = self
            .reducer
            .reduce(&state.state, &action)
            .map_err(DevtoolsError::Reducer)?;
        let envelope = self.codec.normalize(&action);
        debug!(action = %envelope.kind, "recorded action");
        state.record(envelope, next);
        Ok(())
    }
}

impl<S: fmt::Debug, A, R> fmt::Debug for LiftReducer<S, A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiftReducer")
            .field("initial", &self.initial)
            .field("action_creators", &self.action_creators.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;
    use crate::messages::{ConsoleCommand, IncomingMessage};
    use crate::state::LogEntry;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
    enum Op {
        Add { amount: i64 },
        Fail,
    }
    crate::serde_action!(Op);

    fn counter() -> impl Reducer<i64, Op> {
        |s: &i64, a: &Op| -> anyhow::Result<i64> {
            match a {
                Op::Add { amount } => Ok(s + amount),
                Op::Fail => anyhow::bail!("refused"),
            }
        }
    }

    fn lifted() -> LiftReducer<i64, Op, impl Reducer<i64, Op>> {
        LiftReducer::new(counter(), 0)
    }

    fn add(amount: i64) -> Lifted<Op> {
        Lifted::Domain(Op::Add { amount })
    }

    #[test]
    fn test_records_domain_actions() {
        let mut lift = lifted();
        let mut state = ActionState::initialized(0);
        let flags = StatusFlags::from_config(true, false);

        lift.reduce(&mut state, add(5), &flags).unwrap();
        lift.reduce(&mut state, add(2), &flags).unwrap();

        assert_eq!(state.state, 7);
        assert_eq!(state.pending(), 3);
        match &state.actions[2] {
            LogEntry::Action(envelope, next) => {
                assert_eq!(envelope.kind, "ADD");
                assert_eq!(*next, 7);
            }
            other => panic!("Expected action entry, got {:?}", other),
        }
    }

    #[test]
    fn test_add_then_reset() {
        let mut lift = lifted();
        let mut state = ActionState::initialized(0);
        let flags = StatusFlags::from_config(true, false);

        lift.reduce(&mut state, add(5), &flags).unwrap();
        lift.reduce(
            &mut state,
            IncomingMessage::dispatch(ConsoleCommand::Reset).into(),
            &flags,
        )
        .unwrap();

        assert_eq!(state, ActionState::initialized(0));
    }

    #[test]
    fn test_lock_ignores_everything() {
        let mut lift = lifted();
        let mut state = ActionState::initialized(3);
        let flags = StatusFlags::from_config(true, true);
        let before = state.clone();

        for i in 0..100 {
            let input = if i % 3 == 0 {
                IncomingMessage::dispatch(ConsoleCommand::Reset).into()
            } else {
                add(i)
            };
            lift.reduce(&mut state, input, &flags).unwrap();
        }

        assert_eq!(state, before);
    }

    #[test]
    fn test_pause_applies_without_recording() {
        let mut lift = lifted();
        let mut state = ActionState::initialized(0);
        let flags = StatusFlags::from_config(false, false);

        lift.reduce(&mut state, add(4), &flags).unwrap();
        assert_eq!(state.state, 4);
        assert_eq!(state.actions.len(), 1);
        assert!(state.actions[0].is_init());
    }

    #[test]
    fn test_reducer_error_leaves_state_untouched() {
        let mut lift = lifted();
        let mut state = ActionState::initialized(1);
        let before = state.clone();

        let err = lift
            .reduce(
                &mut state,
                Lifted::Domain(Op::Fail),
                &StatusFlags::from_config(true, false),
            )
            .unwrap_err();
        assert!(err.is_reducer());
        assert_eq!(err.to_string(), "refused");
        assert_eq!(state, before);

        lift.reduce(
            &mut state,
            Lifted::Domain(Op::Fail),
            &StatusFlags::from_config(false, false),
        )
        .unwrap_err();
        assert_eq!(state, before);
    }

    #[test]
    fn test_lazy_initial_state_is_recomputed() {
        use std::sync::atomic::{AtomicI64, Ordering};
        use std::sync::Arc;

        let seed = Arc::new(AtomicI64::new(10));
        let seed_clone = seed.clone();
        let lift: LiftReducer<i64, Op, _> = LiftReducer::new(
            counter(),
            InitialState::lazy(move || seed_clone.load(Ordering::SeqCst)),
        );

        assert_eq!(lift.initial_state(), 10);
        seed.store(20, Ordering::SeqCst);
        assert_eq!(lift.initial_state(), 20);
    }
}
