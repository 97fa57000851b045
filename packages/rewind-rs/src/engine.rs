//! Devtools engine - one lifted reducer with its state, flags, and identity.
//!
//! ```text
//! dispatch(action) ─┐
//!                   ├─→ StatusFlags ─→ LiftReducer ─→ ActionState.actions
//! receive(message) ─┘                                        │
//!                                                            ↓
//!                                   drain_outbound() → Outbound → Connection
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use rewind::Devtools;
//!
//! let mut devtools = Devtools::builder(counter, 0)
//!     .name("counter")
//!     .build();
//!
//! devtools.dispatch(CounterAction::Add { amount: 5 })?;
//! devtools.receive_json(r#"{"type":"DISPATCH","payload":{"type":"RESET"}}"#)?;
//! assert_eq!(*devtools.state(), 0);
//!
//! for message in devtools.drain_outbound() {
//!     deliver(&connection, message).await?;
//! }
//! ```
//!
//! # Sharing
//!
//! `Devtools` is `&mut`-owned. Hosts that dispatch from one place and drain
//! from another wrap it in [`SharedDevtools`], which serializes both through
//! one lock.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::{DevtoolsConfig, Features};
use crate::core::{Action, Lifted, Reducer};
use crate::error::DevtoolsError;
use crate::eval::{ActionCreators, CreatorDescription};
use crate::lift::{InitialState, LiftReducer};
use crate::messages::IncomingMessage;
use crate::outbox::Outbound;
use crate::state::{ActionState, LogEntry};
use crate::status::StatusFlags;

// =============================================================================
// Devtools
// =============================================================================

/// A reducer instrumented for a devtools console.
pub struct Devtools<S, A, R> {
    lift: LiftReducer<S, A, R>,
    state: ActionState<S>,
    flags: StatusFlags,
    instance_id: String,
    name: String,
    features: Features,
}

impl<S, A, R> Devtools<S, A, R>
where
    S: Clone + Serialize + DeserializeOwned,
    A: Action,
    R: Reducer<S, A>,
{
    /// Start building an engine around `reducer`.
    pub fn builder(reducer: R, initial: impl Into<InitialState<S>>) -> DevtoolsBuilder<S, A, R> {
        DevtoolsBuilder::new(reducer, initial)
    }

    /// Dispatch a domain action.
    ///
    /// Reducer failures come back as [`DevtoolsError::Reducer`]; the state is
    /// left as it was.
    pub fn dispatch(&mut self, action: A) -> Result<(), DevtoolsError> {
        self.lift
            .reduce(&mut self.state, Lifted::Domain(action), &self.flags)
    }

    /// Handle a message from the console.
    pub fn receive(&mut self, message: IncomingMessage) -> Result<(), DevtoolsError> {
        if !self.flags.observe(&message) {
            info!(
                instance = %self.instance_id,
                subscribed = self.flags.subscribed(),
                "console subscription changed"
            );
            return Ok(());
        }

        self.lift
            .reduce(&mut self.state, Lifted::Incoming(message), &self.flags)
    }

    /// Parse and handle a console message.
    pub fn receive_json(&mut self, text: &str) -> Result<(), DevtoolsError> {
        let message = IncomingMessage::parse(text)?;
        self.receive(message)
    }

    /// The current domain state.
    pub fn state(&self) -> &S {
        &self.state.state
    }

    /// The lifted state: current value and undrained log.
    pub fn action_state(&self) -> &ActionState<S> {
        &self.state
    }

    /// Current recording status.
    pub fn flags(&self) -> StatusFlags {
        self.flags
    }

    /// The id this instance reports to the console.
    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// The name this instance reports to the console.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Remove every pending log entry, oldest first.
    pub fn drain_entries(&mut self) -> Vec<LogEntry<S>> {
        self.state.drain().collect()
    }

    /// Pop and encode the oldest pending entry.
    ///
    /// An entry that cannot be encoded is still removed; the error is
    /// returned in its place.
    pub fn next_outbound(&mut self) -> Option<Result<Outbound, DevtoolsError>> {
        let entry = self.state.pop()?;
        Some(Outbound::from_entry(&entry))
    }

    /// Pop and encode every pending entry, oldest first.
    ///
    /// Entries that cannot be encoded are logged and dropped.
    pub fn drain_outbound(&mut self) -> Vec<Outbound> {
        let mut out = Vec::with_capacity(self.state.pending());
        while let Some(next) = self.next_outbound() {
            match next {
                Ok(message) => out.push(message),
                Err(e) => error!(
                    instance = %self.instance_id,
                    error = %e,
                    "dropping unencodable log entry"
                ),
            }
        }
        debug!(instance = %self.instance_id, count = out.len(), "drained outbound messages");
        out
    }

    /// What the host passes to the console when connecting.
    pub fn connect_options(&self) -> ConnectOptions {
        let action_creators = self
            .lift
            .action_creators()
            .map(ActionCreators::describe)
            .unwrap_or_default();

        ConnectOptions {
            name: self.name.clone(),
            instance_id: self.instance_id.clone(),
            features: self.features.clone(),
            action_creators,
        }
    }

    /// Wrap in a lock-serialized shared handle.
    pub fn into_shared(self) -> SharedDevtools<S, A, R> {
        SharedDevtools::new(self)
    }
}

impl<S: fmt::Debug, A, R> fmt::Debug for Devtools<S, A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Devtools")
            .field("instance_id", &self.instance_id)
            .field("name", &self.name)
            .field("flags", &self.flags)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// Connection parameters for the console.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectOptions {
    /// Name shown in the console's instance list.
    pub name: String,
    /// Id the console keys this instance by.
    pub instance_id: String,
    /// Capabilities the console may offer.
    pub features: Features,
    /// Creators offered in the console's dispatcher, in catalog order.
    pub action_creators: Vec<CreatorDescription>,
}

// =============================================================================
// Builder
// =============================================================================

/// Builder for [`Devtools`].
///
/// # Example
///
/// ```ignore
/// let devtools = Devtools::builder(todos, InitialState::lazy(load_todos))
///     .name("todos")
///     .action_creators(ActionCreators::List(vec![add_todo(), clear()]))
///     .start_locked(true)
///     .build();
/// ```
pub struct DevtoolsBuilder<S, A, R> {
    reducer: R,
    initial: InitialState<S>,
    config: DevtoolsConfig<A>,
}

impl<S, A, R> DevtoolsBuilder<S, A, R>
where
    S: Clone + Serialize + DeserializeOwned,
    A: Action,
    R: Reducer<S, A>,
{
    /// Create a builder with default configuration.
    pub fn new(reducer: R, initial: impl Into<InitialState<S>>) -> Self {
        Self {
            reducer,
            initial: initial.into(),
            config: DevtoolsConfig::default(),
        }
    }

    /// Replace the whole configuration, e.g. one loaded with
    /// [`DevtoolsConfig::from_env`].
    pub fn config(mut self, config: DevtoolsConfig<A>) -> Self {
        self.config = config;
        self
    }

    /// Name shown in the console.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = Some(name.into());
        self
    }

    /// Fixed instance id instead of a generated one.
    pub fn instance_id(mut self, id: impl Into<String>) -> Self {
        self.config.instance_id = Some(id.into());
        self
    }

    /// Creators callable from the console's dispatcher.
    pub fn action_creators(mut self, creators: ActionCreators<A>) -> Self {
        self.config.action_creators = Some(creators);
        self
    }

    /// Whether recording starts enabled.
    pub fn record_changes(mut self, record: bool) -> Self {
        self.config.should_record_changes = record;
        self
    }

    /// Whether changes start locked.
    pub fn start_locked(mut self, locked: bool) -> Self {
        self.config.should_start_locked = locked;
        self
    }

    /// Build the engine. The log starts with one `Init` entry.
    pub fn build(self) -> Devtools<S, A, R> {
        let config = self.config;
        let instance_id = config
            .instance_id
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let name = config
            .name
            .unwrap_or_else(|| format!("rewind {}", instance_id));

        let mut lift = LiftReducer::new(self.reducer, self.initial);
        if let Some(creators) = config.action_creators {
            lift = lift.with_action_creators(creators);
        }

        let initial = lift.initial_state();
        let flags =
            StatusFlags::from_config(config.should_record_changes, config.should_start_locked);

        info!(
            instance = %instance_id,
            %name,
            paused = flags.paused(),
            locked = flags.locked(),
            "devtools instance created"
        );

        Devtools {
            lift,
            state: ActionState::initialized(initial),
            flags,
            instance_id,
            name,
            features: config.features,
        }
    }
}

// =============================================================================
// Shared handle
// =============================================================================

/// A cloneable handle serializing dispatch and drain through one lock.
pub struct SharedDevtools<S, A, R> {
    inner: Arc<Mutex<Devtools<S, A, R>>>,
}

impl<S, A, R> Clone for SharedDevtools<S, A, R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S, A, R> SharedDevtools<S, A, R>
where
    S: Clone + Serialize + DeserializeOwned,
    A: Action,
    R: Reducer<S, A>,
{
    /// Share an engine.
    pub fn new(devtools: Devtools<S, A, R>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(devtools)),
        }
    }

    /// Acquire the engine, recovering from poison if necessary.
    ///
    /// Every mutation completes before the lifted state is written, so a
    /// panic inside the domain reducer leaves the engine consistent.
    pub fn lock(&self) -> MutexGuard<'_, Devtools<S, A, R>> {
        self.inner.lock().unwrap_or_else(|poisoned| {
            warn!("devtools mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// See [`Devtools::dispatch`].
    pub fn dispatch(&self, action: A) -> Result<(), DevtoolsError> {
        self.lock().dispatch(action)
    }

    /// See [`Devtools::receive`].
    pub fn receive(&self, message: IncomingMessage) -> Result<(), DevtoolsError> {
        self.lock().receive(message)
    }

    /// See [`Devtools::receive_json`].
    pub fn receive_json(&self, text: &str) -> Result<(), DevtoolsError> {
        self.lock().receive_json(text)
    }

    /// A copy of the current domain state.
    pub fn state(&self) -> S {
        self.lock().state().clone()
    }

    /// See [`Devtools::drain_outbound`].
    pub fn drain_outbound(&self) -> Vec<Outbound> {
        self.lock().drain_outbound()
    }
}

impl<S, A, R> fmt::Debug for SharedDevtools<S, A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedDevtools").finish_non_exhaustive()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde::Deserialize;
    use serde_json::{json, Value};

    use super::*;
    use crate::core::ActionForm;
    use crate::eval::ActionCreator;
    use crate::messages::ConsoleCommand;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
    enum CounterAction {
        Add { amount: i64 },
        Reset,
    }
    crate::serde_action!(CounterAction);

    fn counter() -> impl Reducer<i64, CounterAction> {
        |s: &i64, a: &CounterAction| -> anyhow::Result<i64> {
            Ok(match a {
                CounterAction::Add { amount } => s + amount,
                CounterAction::Reset => 0,
            })
        }
    }

    fn devtools() -> Devtools<i64, CounterAction, impl Reducer<i64, CounterAction>> {
        Devtools::builder(counter(), 0).instance_id("test").build()
    }

    fn command(command: ConsoleCommand) -> IncomingMessage {
        IncomingMessage::dispatch(command)
    }

    #[test]
    fn test_starts_with_init_entry() {
        let devtools = devtools();
        assert_eq!(devtools.action_state(), &ActionState::initialized(0));
        assert_eq!(devtools.name(), "rewind test");
    }

    #[test]
    fn test_generated_instance_ids_differ() {
        let a = Devtools::builder(counter(), 0).build();
        let b = Devtools::builder(counter(), 0).build();
        assert_ne!(a.instance_id(), b.instance_id());
    }

    #[test]
    fn test_add_then_reset() {
        let mut devtools = devtools();
        devtools.dispatch(CounterAction::Add { amount: 5 }).unwrap();
        assert_eq!(*devtools.state(), 5);

        devtools.receive(command(ConsoleCommand::Reset)).unwrap();
        assert_eq!(*devtools.state(), 0);
        assert_eq!(devtools.drain_entries(), vec![LogEntry::Init(0)]);
    }

    #[test]
    fn test_pause_dispatch_resume() {
        let mut devtools = devtools();
        devtools.dispatch(CounterAction::Add { amount: 1 }).unwrap();

        devtools
            .receive(command(ConsoleCommand::PauseRecording { status: true }))
            .unwrap();
        devtools.dispatch(CounterAction::Add { amount: 4 }).unwrap();
        assert_eq!(*devtools.state(), 5);
        assert_eq!(devtools.action_state().pending(), 2);

        devtools
            .receive(command(ConsoleCommand::PauseRecording { status: false }))
            .unwrap();
        assert_eq!(devtools.drain_entries(), vec![LogEntry::Init(5)]);
    }

    #[test]
    fn test_lock_ignores_dispatches() {
        let mut devtools = devtools();
        devtools
            .receive(command(ConsoleCommand::LockChanges { status: true }))
            .unwrap();
        let before = devtools.action_state().clone();

        for i in 0..100 {
            devtools.dispatch(CounterAction::Add { amount: i }).unwrap();
        }
        devtools.receive(command(ConsoleCommand::Reset)).unwrap();
        assert_eq!(devtools.action_state(), &before);

        devtools
            .receive(command(ConsoleCommand::LockChanges { status: false }))
            .unwrap();
        devtools.dispatch(CounterAction::Add { amount: 2 }).unwrap();
        assert_eq!(*devtools.state(), 2);
    }

    #[test]
    fn test_start_locked_and_unrecorded_from_config() {
        let config = DevtoolsConfig::default()
            .record_changes(false)
            .start_locked(true);
        let devtools = Devtools::builder(counter(), 0).config(config).build();
        assert!(devtools.flags().paused());
        assert!(devtools.flags().locked());
        assert!(!devtools.flags().subscribed());
    }

    #[test]
    fn test_start_stop_only_touch_subscription() {
        let mut devtools = devtools();
        let before = devtools.action_state().clone();

        devtools.receive_json(r#"{"type": "START"}"#).unwrap();
        assert!(devtools.flags().subscribed());
        devtools.receive_json(r#"{"type": "STOP"}"#).unwrap();
        assert!(!devtools.flags().subscribed());
        assert_eq!(devtools.action_state(), &before);
    }

    #[test]
    fn test_receive_json_rejects_garbage() {
        let mut devtools = devtools();
        let err = devtools.receive_json("not json").unwrap_err();
        assert!(matches!(err, DevtoolsError::Message(_)));
    }

    #[test]
    fn test_drain_outbound_in_order() {
        let mut devtools = devtools();
        devtools.dispatch(CounterAction::Add { amount: 2 }).unwrap();
        devtools.dispatch(CounterAction::Add { amount: 3 }).unwrap();

        let out = devtools.drain_outbound();
        assert_eq!(
            out,
            vec![
                Outbound::Init { state: json!(0) },
                Outbound::Record {
                    action: json!({"type": "ADD", "amount": 2}),
                    state: json!(2)
                },
                Outbound::Record {
                    action: json!({"type": "ADD", "amount": 3}),
                    state: json!(5)
                },
            ]
        );
        assert!(devtools.drain_outbound().is_empty());
        assert!(devtools.next_outbound().is_none());
    }

    #[test]
    fn test_connect_options() {
        let creators = ActionCreators::List(vec![ActionCreator::new("add", |args: &[Value]| {
            Ok(CounterAction::Add {
                amount: args.first().and_then(Value::as_i64).unwrap_or(1),
            })
        })
        .with_args(&["amount"])]);
        let devtools = Devtools::builder(counter(), 0)
            .name("counter")
            .instance_id("42")
            .action_creators(creators)
            .build();

        let options = serde_json::to_value(devtools.connect_options()).unwrap();
        assert_eq!(options["name"], json!("counter"));
        assert_eq!(options["instanceId"], json!("42"));
        assert_eq!(options["features"]["import"], json!("custom"));
        assert_eq!(
            options["actionCreators"],
            json!([{"name": "add", "args": ["amount"]}])
        );
    }

    #[test]
    fn test_console_action_uses_creators() {
        let creators = ActionCreators::List(vec![ActionCreator::new("reset", |_: &[Value]| {
            Ok(CounterAction::Reset)
        })]);
        let mut devtools = Devtools::builder(counter(), 0)
            .action_creators(creators)
            .build();
        devtools.dispatch(CounterAction::Add { amount: 9 }).unwrap();

        devtools
            .receive_json(r#"{"type": "ACTION", "payload": "reset()"}"#)
            .unwrap();
        assert_eq!(*devtools.state(), 0);
        assert_eq!(devtools.action_state().pending(), 3);
    }

    #[derive(Clone)]
    enum Step {
        By(i64),
        Map(&'static str, Arc<dyn Fn(i64) -> i64 + Send + Sync>),
    }

    impl Action for Step {
        fn form(&self) -> ActionForm {
            match self {
                Step::By(n) => ActionForm::Data(json!({"type": "BY", "n": n})),
                Step::Map(label, _) => ActionForm::Callable {
                    label: label.to_string(),
                },
            }
        }

        fn from_data(value: Value) -> Result<Self, serde_json::Error> {
            #[derive(Deserialize)]
            struct By {
                n: i64,
            }
            serde_json::from_value::<By>(value).map(|by| Step::By(by.n))
        }
    }

    #[test]
    fn test_toggle_replays_callables() {
        let reducer = |s: &i64, a: &Step| -> anyhow::Result<i64> {
            Ok(match a {
                Step::By(n) => s + n,
                Step::Map(_, f) => f(*s),
            })
        };
        let mut devtools = Devtools::builder(reducer, 1).build();
        devtools.dispatch(Step::By(1)).unwrap();
        devtools
            .dispatch(Step::Map("double", Arc::new(|s| s * 2)))
            .unwrap();
        assert_eq!(*devtools.state(), 4);

        let entries = devtools.drain_entries();
        let mut actions_by_id = serde_json::Map::new();
        actions_by_id.insert(
            "0".into(),
            json!({"type": "PERFORM_ACTION", "action": {"type": "@@INIT"}}),
        );
        for (id, entry) in entries.iter().enumerate().skip(1) {
            actions_by_id.insert(
                id.to_string(),
                json!({"type": "PERFORM_ACTION", "action": entry.envelope().unwrap()}),
            );
        }
        let history = json!({
            "stagedActionIds": [0, 1, 2],
            "skippedActionIds": [],
            "actionsById": actions_by_id,
            "computedStates": [{"state": 1}, {"state": 2}, {"state": 4}]
        });

        devtools
            .receive(IncomingMessage::dispatch_with_state(
                ConsoleCommand::ToggleAction { id: 1 },
                history.to_string(),
            ))
            .unwrap();
        // double applied straight to the initial 1
        assert_eq!(*devtools.state(), 2);
    }

    #[test]
    fn test_shared_handle_serializes_access() {
        let shared = devtools().into_shared();
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let shared = shared.clone();
                std::thread::spawn(move || {
                    for _ in 0..25 {
                        shared.dispatch(CounterAction::Add { amount: 1 }).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(shared.state(), 100);
        assert_eq!(shared.drain_outbound().len(), 101);
    }

    #[test]
    fn test_shared_handle_survives_poison() {
        let shared = devtools().into_shared();
        let poisoner = shared.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.lock();
            panic!("poison the lock");
        })
        .join();

        shared.dispatch(CounterAction::Add { amount: 3 }).unwrap();
        assert_eq!(shared.state(), 3);
    }
}
