//! Action envelopes: the canonical recorded form of an action.
//!
//! Every recorded action carries a string `type`. Actions that already do
//! are recorded as-is. Everything else is wrapped:
//!
//! ```text
//! 5                      → {"type": "dispatch: 5", "payload": 5, "meta": {WRAPPED: true}}
//! <callable "double">    → {"type": "dispatch: double", "meta": {WRAPPED: true, CALLABLE: "<uuid>"}}
//! ```
//!
//! Callables never leave the process. The codec keeps the original value in
//! a registry and the envelope only carries its id, so decoding an envelope
//! never compiles or evaluates anything.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::core::{Action, ActionForm, CallableId};
use crate::error::DevtoolsError;

/// Meta key marking an envelope as a wrapped, untagged value.
pub const WRAPPED_KEY: &str = "@@REWIND/IS_WRAPPED_ACTION";

/// Meta key holding the registry id of a wrapped callable.
pub const CALLABLE_KEY: &str = "@@REWIND/CALLABLE";

/// Canonical recorded form of an action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionEnvelope {
    /// The discriminant shown by the console.
    #[serde(rename = "type")]
    pub kind: String,
    /// Every other field of the action.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl ActionEnvelope {
    /// An envelope with only a discriminant.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            fields: Map::new(),
        }
    }

    /// Normalize plain data: pass tagged objects through, wrap the rest.
    pub fn from_data(value: Value) -> Self {
        match value {
            Value::Object(mut fields) => match fields.remove("type") {
                Some(Value::String(kind)) => Self { kind, fields },
                Some(other) => {
                    fields.insert("type".to_string(), other);
                    Self::wrap(Value::Object(fields))
                }
                None => Self::wrap(Value::Object(fields)),
            },
            other => Self::wrap(other),
        }
    }

    fn wrap(payload: Value) -> Self {
        let mut fields = Map::new();
        let kind = format!("dispatch: {}", payload);
        fields.insert("payload".to_string(), payload);
        fields.insert("meta".to_string(), json!({ WRAPPED_KEY: true }));
        Self { kind, fields }
    }

    fn wrap_callable(label: &str, id: CallableId) -> Self {
        let mut fields = Map::new();
        fields.insert(
            "meta".to_string(),
            json!({ WRAPPED_KEY: true, CALLABLE_KEY: id }),
        );
        Self {
            kind: format!("dispatch: {}", label),
            fields,
        }
    }

    fn meta(&self) -> Option<&Map<String, Value>> {
        self.fields.get("meta").and_then(Value::as_object)
    }

    /// Whether this envelope wraps an untagged value.
    pub fn is_wrapped(&self) -> bool {
        self.meta()
            .and_then(|meta| meta.get(WRAPPED_KEY))
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Registry id of the wrapped callable, if this envelope wraps one.
    pub fn callable_id(&self) -> Option<CallableId> {
        if !self.is_wrapped() {
            return None;
        }
        let id = self.meta()?.get(CALLABLE_KEY)?;
        serde_json::from_value(id.clone()).ok()
    }

    /// The wrapped payload, if any.
    pub fn payload(&self) -> Option<&Value> {
        self.fields.get("payload")
    }

    /// The envelope as one JSON object.
    pub fn to_value(&self) -> Value {
        let mut object = self.fields.clone();
        object.insert("type".to_string(), Value::String(self.kind.clone()));
        Value::Object(object)
    }
}

/// Converts domain actions to envelopes and back.
///
/// One codec per engine instance; the callable registry is never shared.
#[derive(Debug)]
pub struct ActionCodec<A> {
    callables: HashMap<CallableId, A>,
}

impl<A: Action> ActionCodec<A> {
    /// Create a codec with an empty callable registry.
    pub fn new() -> Self {
        Self {
            callables: HashMap::new(),
        }
    }

    /// Record form of `action`.
    pub fn normalize(&mut self, action: &A) -> ActionEnvelope {
        match action.form() {
            ActionForm::Data(value) => ActionEnvelope::from_data(value),
            ActionForm::Callable { label } => {
                let id = CallableId::new();
                self.callables.insert(id, action.clone());
                debug!(%id, %label, "registered callable action");
                ActionEnvelope::wrap_callable(&label, id)
            }
        }
    }

    /// Rebuild the domain action an envelope was made from.
    pub fn denormalize(&self, envelope: &ActionEnvelope) -> Result<A, DevtoolsError> {
        if let Some(id) = envelope.callable_id() {
            return self
                .callables
                .get(&id)
                .cloned()
                .ok_or(DevtoolsError::CallableNotFound { id });
        }

        let value = if envelope.is_wrapped() {
            envelope.payload().cloned().unwrap_or(Value::Null)
        } else {
            envelope.to_value()
        };

        A::from_data(value).map_err(|source| DevtoolsError::ActionDecode {
            kind: envelope.kind.clone(),
            source,
        })
    }

    /// Number of callables currently held.
    pub fn registered(&self) -> usize {
        self.callables.len()
    }

    /// Drop every registered callable.
    ///
    /// Called when a new recording epoch starts: the console discards its
    /// history then, so no envelope can refer to the old ids anymore.
    pub fn forget_callables(&mut self) {
        self.callables.clear();
    }
}

impl<A: Action> Default for ActionCodec<A> {
    fn default() -> Self {
        Self::new()
    }
}
