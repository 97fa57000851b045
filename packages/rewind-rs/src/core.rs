//! Core traits for lifting a reducer.
//!
//! # Overview
//!
//! rewind wraps two caller-owned pieces:
//! - a [`Reducer`] = pure transition `(state, action) -> state`
//! - an [`Action`] = the transition request, either plain data or an opaque
//!   callable
//!
//! Everything else (history, skip flags, console commands) is bookkeeping
//! around repeated calls to the reducer.
//!
//! # Callables
//!
//! Actions that carry closures cannot be turned into JSON. They report
//! [`ActionForm::Callable`] and the codec keeps the original value in a
//! per-engine registry keyed by [`CallableId`]; only the id ever leaves the
//! process.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::messages::IncomingMessage;

/// A pure state transition.
///
/// Reducers must be deterministic: toggling a recorded action replays the
/// reducer over stored actions and expects the same results the first run
/// produced.
///
/// Any `Fn(&S, &A) -> anyhow::Result<S>` is a reducer.
///
/// # Example
///
/// ```ignore
/// let reducer = |count: &i64, action: &CounterAction| -> anyhow::Result<i64> {
///     Ok(match action {
///         CounterAction::Add { amount } => count + amount,
///         CounterAction::Reset => 0,
///     })
/// };
/// ```
pub trait Reducer<S, A>: Send + Sync + 'static {
    /// Compute the next state. Errors are propagated to the caller unchanged.
    fn reduce(&self, state: &S, action: &A) -> anyhow::Result<S>;
}

impl<S, A, F> Reducer<S, A> for F
where
    F: Fn(&S, &A) -> anyhow::Result<S> + Send + Sync + 'static,
{
    fn reduce(&self, state: &S, action: &A) -> anyhow::Result<S> {
        self(state, action)
    }
}

/// How an action looks to the console.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionForm {
    /// Plain data. Objects with a string `type` field are recorded as-is.
    Data(Value),
    /// An opaque callable, shown under `label`.
    Callable {
        /// Human-readable name for the console list.
        label: String,
    },
}

/// A transition request that can be recorded and replayed.
///
/// Plain-data actions implement this through serde; see
/// [`serde_action!`](crate::serde_action).
pub trait Action: Clone + Send + 'static {
    /// The recorded form of this action.
    fn form(&self) -> ActionForm;

    /// Rebuild a plain-data action from its recorded value.
    fn from_data(value: Value) -> Result<Self, serde_json::Error>;
}

impl Action for Value {
    fn form(&self) -> ActionForm {
        ActionForm::Data(self.clone())
    }

    fn from_data(value: Value) -> Result<Self, serde_json::Error> {
        Ok(value)
    }
}

/// Implements [`Action`] for plain-data types through serde.
///
/// ```ignore
/// #[derive(Debug, Clone, Serialize, Deserialize)]
/// #[serde(tag = "type")]
/// enum TodoAction { Add { text: String }, Clear }
///
/// rewind::serde_action!(TodoAction);
/// ```
#[macro_export]
macro_rules! serde_action {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl $crate::Action for $ty {
                fn form(&self) -> $crate::ActionForm {
                    match $crate::__serde_json::to_value(self) {
                        Ok(value) => $crate::ActionForm::Data(value),
                        Err(e) => $crate::ActionForm::Callable {
                            label: format!("unserializable {}: {}", stringify!($ty), e),
                        },
                    }
                }

                fn from_data(value: $crate::__serde_json::Value) -> Result<Self, $crate::__serde_json::Error> {
                    $crate::__serde_json::from_value(value)
                }
            }
        )+
    };
}

/// Opaque id for a callable action held in the codec registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallableId(Uuid);

impl CallableId {
    /// Create a new random callable id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the inner UUID value.
    pub fn into_inner(self) -> Uuid {
        self.0
    }
}

impl Default for CallableId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for CallableId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl fmt::Display for CallableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Input to the lifted reducer.
///
/// The variant is the marker that separates console commands from domain
/// actions; a domain action can never be mistaken for a command.
#[derive(Debug, Clone)]
pub enum Lifted<A> {
    /// A regular domain action dispatched by the application.
    Domain(A),
    /// A message received from the devtools console.
    Incoming(IncomingMessage),
}

impl<A> From<IncomingMessage> for Lifted<A> {
    fn from(message: IncomingMessage) -> Self {
        Lifted::Incoming(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
    enum CounterAction {
        Add { amount: i64 },
        Reset,
    }
    crate::serde_action!(CounterAction);

    #[test]
    fn test_closure_is_reducer() {
        let reducer = |s: &i64, a: &CounterAction| -> anyhow::Result<i64> {
            Ok(match a {
                CounterAction::Add { amount } => s + amount,
                CounterAction::Reset => 0,
            })
        };
        assert_eq!(
            reducer.reduce(&1, &CounterAction::Add { amount: 2 }).unwrap(),
            3
        );
        assert_eq!(reducer.reduce(&7, &CounterAction::Reset).unwrap(), 0);
    }

    #[test]
    fn test_serde_action_form_and_back() {
        let action = CounterAction::Add { amount: 5 };
        let form = action.form();
        assert_eq!(form, ActionForm::Data(json!({"type": "ADD", "amount": 5})));

        let ActionForm::Data(value) = form else {
            panic!("Expected data form");
        };
        assert_eq!(CounterAction::from_data(value).unwrap(), action);
    }

    #[test]
    fn test_value_is_action() {
        let value = json!([1, 2, 3]);
        assert_eq!(value.form(), ActionForm::Data(json!([1, 2, 3])));
    }

    #[test]
    fn test_callable_id_display_and_serde() {
        let uuid = Uuid::new_v4();
        let id = CallableId::from(uuid);
        assert_eq!(id.to_string(), uuid.to_string());
        assert_eq!(id.into_inner(), uuid);

        let encoded = serde_json::to_value(id).unwrap();
        assert_eq!(encoded, json!(uuid.to_string()));
        let decoded: CallableId = serde_json::from_value(encoded).unwrap();
        assert_eq!(decoded, id);
    }

    #[test]
    fn test_callable_ids_are_unique() {
        assert_ne!(CallableId::new(), CallableId::new());
    }
}
