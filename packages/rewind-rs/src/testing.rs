//! Testing utilities for lifted reducers.
//!
//! # Feature Flag
//!
//! This module is only available with the `testing` feature:
//!
//! ```toml
//! [dev-dependencies]
//! rewind = { version = "0.1", features = ["testing"] }
//! ```
//!
//! # Quick Start
//!
//! ## Using `assert_log!` Macro
//!
//! ```ignore
//! use rewind::{assert_log, LogEntry};
//!
//! devtools.dispatch(CounterAction::Add { amount: 5 })?;
//!
//! assert_log!(devtools, [
//!     LogEntry::Init(0),
//!     LogEntry::Action(_, 5),
//! ]);
//! ```
//!
//! ## Using Fluent Builder
//!
//! ```ignore
//! use rewind::testing::DevtoolsTest;
//!
//! DevtoolsTest::new(Devtools::builder(counter, 0).build())
//!     .dispatch(CounterAction::Add { amount: 5 })
//!     .expect_state(5)
//!     .console(ConsoleCommand::Commit)
//!     .expect_entries(vec![LogEntry::Init(5)])
//!     .console(ConsoleCommand::Rollback)
//!     .expect_err(|e| matches!(e, DevtoolsError::MissingSnapshot { .. }));
//! ```

use std::fmt::Debug;

use serde::{de::DeserializeOwned, Serialize};

use crate::core::{Action, Reducer};
use crate::engine::Devtools;
use crate::error::DevtoolsError;
use crate::history::StagedHistory;
use crate::messages::{ConsoleCommand, IncomingMessage};
use crate::state::LogEntry;

/// Asserts the pending log entries of an engine, oldest first.
///
/// Each entry is a pattern matched against `&LogEntry<S>`. Nothing is
/// drained.
///
/// # Syntax
///
/// ```ignore
/// assert_log!(devtools, [
///     LogEntry::Init(0),
///     LogEntry::Action(envelope, 5),
///     LogEntry::Checkpoint(_),
/// ]);
/// ```
///
/// # Panics
///
/// Panics if the log length differs or any entry does not match.
#[macro_export]
macro_rules! assert_log {
    ($devtools:expr, [$($entry:pat),* $(,)?]) => {{
        let actual: Vec<_> = $devtools.action_state().actions.iter().collect();
        let expected: &[&str] = &[$(stringify!($entry)),*];
        assert_eq!(
            actual.len(),
            expected.len(),
            "Log length mismatch\n  expected: {:?}\n  actual: {:?}",
            expected,
            actual
        );
        let mut index = 0;
        $(
            assert!(
                matches!(actual[index], $entry),
                "Log entry {} mismatch\n  expected: {}\n  actual: {:?}",
                index,
                stringify!($entry),
                actual[index]
            );
            index += 1;
        )*
        let _ = index;
    }};
}

pub use assert_log;

/// Fluent test builder for an engine.
///
/// Every step records its outcome; the `expect_*` methods assert on the most
/// recent one.
pub struct DevtoolsTest<S, A, R> {
    devtools: Devtools<S, A, R>,
    last_error: Option<DevtoolsError>,
}

impl<S, A, R> DevtoolsTest<S, A, R>
where
    S: Clone + Serialize + DeserializeOwned + Debug + PartialEq,
    A: Action,
    R: Reducer<S, A>,
{
    /// Create a test around an engine.
    pub fn new(devtools: Devtools<S, A, R>) -> Self {
        Self {
            devtools,
            last_error: None,
        }
    }

    /// Dispatch a domain action.
    pub fn dispatch(mut self, action: A) -> Self {
        self.last_error = self.devtools.dispatch(action).err();
        self
    }

    /// Deliver a console message.
    pub fn receive(mut self, message: IncomingMessage) -> Self {
        self.last_error = self.devtools.receive(message).err();
        self
    }

    /// Deliver a console command without snapshot text.
    pub fn console(self, command: ConsoleCommand) -> Self {
        self.receive(IncomingMessage::dispatch(command))
    }

    /// Deliver a console command with `snapshot` encoded as its state text.
    pub fn console_with<T: Serialize>(self, command: ConsoleCommand, snapshot: &T) -> Self {
        let text = serde_json::to_string(snapshot).expect("snapshot must encode");
        self.receive(IncomingMessage::dispatch_with_state(command, text))
    }

    /// Toggle `id` in `history`.
    pub fn toggle(self, id: u64, history: &StagedHistory<S>) -> Self {
        self.console_with(ConsoleCommand::ToggleAction { id }, history)
    }

    /// Assert the last step succeeded.
    pub fn expect_ok(self) -> Self {
        assert!(
            self.last_error.is_none(),
            "Expected success, got {:?}",
            self.last_error
        );
        self
    }

    /// Assert the last step failed with an error matching `predicate`.
    pub fn expect_err<F>(self, predicate: F) -> Self
    where
        F: FnOnce(&DevtoolsError) -> bool,
    {
        match &self.last_error {
            Some(e) => assert!(predicate(e), "Error predicate failed for {:?}", e),
            None => panic!("Expected an error, got success"),
        }
        self
    }

    /// Assert the current domain state.
    pub fn expect_state(self, expected: S) -> Self {
        assert_eq!(
            self.devtools.state(),
            &expected,
            "State mismatch\n  expected: {:?}\n  actual: {:?}",
            expected,
            self.devtools.state()
        );
        self
    }

    /// Assert the number of pending log entries.
    pub fn expect_pending(self, expected: usize) -> Self {
        assert_eq!(
            self.devtools.action_state().pending(),
            expected,
            "Pending entries: {:?}",
            self.devtools.action_state().actions
        );
        self
    }

    /// Drain the log and assert it equals `expected`.
    pub fn expect_entries(mut self, expected: Vec<LogEntry<S>>) -> Self {
        let actual = self.devtools.drain_entries();
        assert_eq!(actual, expected, "Log mismatch");
        self
    }

    /// Assert the engine matches a predicate.
    pub fn assert_devtools<F>(self, predicate: F) -> Self
    where
        F: FnOnce(&Devtools<S, A, R>) -> bool,
    {
        assert!(predicate(&self.devtools), "Devtools predicate failed");
        self
    }

    /// Get a reference to the engine for custom assertions.
    pub fn devtools(&self) -> &Devtools<S, A, R> {
        &self.devtools
    }

    /// Get a mutable reference to the engine.
    pub fn devtools_mut(&mut self) -> &mut Devtools<S, A, R> {
        &mut self.devtools
    }

    /// The error of the last step, if it failed.
    pub fn last_error(&self) -> Option<&DevtoolsError> {
        self.last_error.as_ref()
    }

    /// Consume the test and return the engine.
    pub fn into_devtools(self) -> Devtools<S, A, R> {
        self.devtools
    }
}

/// Extension trait for engines to enable fluent testing.
///
/// ```ignore
/// Devtools::builder(counter, 0)
///     .build()
///     .test()
///     .dispatch(CounterAction::Add { amount: 1 })
///     .expect_state(1);
/// ```
pub trait DevtoolsTestExt<S, A, R>: Sized {
    /// Wrap in a [`DevtoolsTest`].
    fn test(self) -> DevtoolsTest<S, A, R>;
}

impl<S, A, R> DevtoolsTestExt<S, A, R> for Devtools<S, A, R>
where
    S: Clone + Serialize + DeserializeOwned + Debug + PartialEq,
    A: Action,
    R: Reducer<S, A>,
{
    fn test(self) -> DevtoolsTest<S, A, R> {
        DevtoolsTest::new(self)
    }
}
