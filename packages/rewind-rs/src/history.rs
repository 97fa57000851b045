//! Staged history as the devtools console keeps it.
//!
//! The console owns this structure; instances receive it as JSON text with
//! `TOGGLE_ACTION` and `IMPORT_STATE`, mutate it, and send it back in a
//! checkpoint entry. Fields the engine does not touch (`monitorState`,
//! `nextActionId`, `currentStateIndex`, ...) are carried through verbatim.
//!
//! `computedStates[i]` is the state after `stagedActionIds[i]`. Position 0 is
//! the initial action, so every other position has a predecessor.

use std::collections::BTreeMap;

use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::codec::ActionEnvelope;

/// Recorded action ids, their skip status, and the state after each one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StagedHistory<S> {
    /// Action ids in the order they are applied.
    #[serde(default)]
    pub staged_action_ids: Vec<u64>,
    /// Ids whose actions are currently skipped.
    #[serde(default)]
    pub skipped_action_ids: Vec<u64>,
    /// The recorded action for each id.
    #[serde(default, deserialize_with = "deserialize_action_ids")]
    pub actions_by_id: BTreeMap<u64, PerformAction>,
    /// State after each staged action, index-aligned with `staged_action_ids`.
    pub computed_states: Vec<ComputedState<S>>,
    /// Everything else the console keeps in its history.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl<S> StagedHistory<S> {
    /// Position of `id` in the staged list.
    pub fn position(&self, id: u64) -> Option<usize> {
        self.staged_action_ids.iter().position(|&staged| staged == id)
    }

    /// Whether `id` is currently skipped.
    pub fn is_skipped(&self, id: u64) -> bool {
        self.skipped_action_ids.contains(&id)
    }

    /// The state after the last staged action, if any were computed.
    pub fn last_state(&self) -> Option<&S> {
        self.computed_states.last().map(|computed| &computed.state)
    }

    /// Number of staged actions.
    pub fn len(&self) -> usize {
        self.staged_action_ids.len()
    }

    /// Whether nothing is staged.
    pub fn is_empty(&self) -> bool {
        self.staged_action_ids.is_empty()
    }
}

// Flattened structs are buffered before decoding, and buffered map keys stay
// strings, so numeric ids are parsed here.
fn deserialize_action_ids<'de, D>(
    deserializer: D,
) -> Result<BTreeMap<u64, PerformAction>, D::Error>
where
    D: Deserializer<'de>,
{
    BTreeMap::<String, PerformAction>::deserialize(deserializer)?
        .into_iter()
        .map(|(key, action)| {
            key.parse::<u64>()
                .map(|id| (id, action))
                .map_err(|_| de::Error::custom(format!("action id {:?} is not a number", key)))
        })
        .collect()
}

/// One entry of `actionsById`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformAction {
    /// Always `PERFORM_ACTION` in histories produced by the console.
    #[serde(rename = "type", default = "PerformAction::default_kind")]
    pub kind: String,
    /// The recorded envelope.
    pub action: ActionEnvelope,
    /// Milliseconds since the epoch when the console received it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,
    /// Anything else (`stack`, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PerformAction {
    /// The discriminant the console uses for recorded actions.
    pub const KIND: &'static str = "PERFORM_ACTION";

    /// Wrap a recorded envelope.
    pub fn new(action: ActionEnvelope) -> Self {
        Self {
            kind: Self::KIND.to_string(),
            action,
            timestamp: None,
            extra: Map::new(),
        }
    }

    fn default_kind() -> String {
        Self::KIND.to_string()
    }
}

/// One entry of `computedStates`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComputedState<S> {
    /// The state after the corresponding staged action.
    pub state: S,
    /// Error text the console recorded for this step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<S> ComputedState<S> {
    /// A computed state without an error.
    pub fn new(state: S) -> Self {
        Self { state, error: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Value {
        json!({
            "stagedActionIds": [0, 1, 2],
            "skippedActionIds": [2],
            "actionsById": {
                "0": {"type": "PERFORM_ACTION", "action": {"type": "@@INIT"}, "timestamp": 1},
                "1": {"type": "PERFORM_ACTION", "action": {"type": "ADD", "amount": 5}, "timestamp": 2},
                "2": {"type": "PERFORM_ACTION", "action": {"type": "ADD", "amount": 3}, "timestamp": 3, "stack": "at x"}
            },
            "computedStates": [{"state": 0}, {"state": 5}, {"state": 8}],
            "currentStateIndex": 2,
            "nextActionId": 3,
            "monitorState": {}
        })
    }

    #[test]
    fn test_decode_typed_history() {
        let history: StagedHistory<i64> = serde_json::from_value(sample()).unwrap();
        assert_eq!(history.staged_action_ids, vec![0, 1, 2]);
        assert!(history.is_skipped(2));
        assert!(!history.is_skipped(1));
        assert_eq!(history.position(1), Some(1));
        assert_eq!(history.position(9), None);
        assert_eq!(history.last_state(), Some(&8));
        assert_eq!(history.actions_by_id[&1].action.kind, "ADD");
        assert_eq!(history.len(), 3);
    }

    #[test]
    fn test_unknown_fields_survive_round_trip() {
        let history: StagedHistory<i64> = serde_json::from_value(sample()).unwrap();
        assert_eq!(history.extra["nextActionId"], json!(3));
        assert_eq!(history.actions_by_id[&2].extra["stack"], json!("at x"));

        let encoded = serde_json::to_value(&history).unwrap();
        assert_eq!(encoded, sample());
    }

    #[test]
    fn test_defaults_for_missing_lists() {
        let history: StagedHistory<i64> = serde_json::from_value(json!({
            "stagedActionIds": [],
            "computedStates": []
        }))
        .unwrap();
        assert!(history.is_empty());
        assert!(history.skipped_action_ids.is_empty());
        assert!(history.actions_by_id.is_empty());
        assert_eq!(history.last_state(), None);
    }

    #[test]
    fn test_non_numeric_action_id_is_rejected() {
        let result = serde_json::from_value::<StagedHistory<i64>>(json!({
            "stagedActionIds": [0],
            "actionsById": {"zero": {"action": {"type": "@@INIT"}}},
            "computedStates": [{"state": 0}]
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_perform_action_kind_defaults() {
        let perform: PerformAction =
            serde_json::from_value(json!({"action": {"type": "ADD"}})).unwrap();
        assert_eq!(perform.kind, PerformAction::KIND);
        assert_eq!(perform.timestamp, None);
    }
}
