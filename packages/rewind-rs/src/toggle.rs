//! Skip/unskip recompute.
//!
//! Flipping the skip status of one action changes every state computed after
//! it, so toggling replays the reducer forward from the first affected
//! position:
//!
//! ```text
//! staged:    [0]   [1]   [2]   [3]
//! computed:   0     5     3     8
//!                         ^ toggle 2 (skip)
//! seed = computed[1] = 5
//! [2] left as-is, [3] = reduce(5, action 3)
//! ```
//!
//! Positions that are already skipped keep their computed entry and do not
//! advance the running value. When an action is unskipped, its own position
//! is recomputed too.

use tracing::{debug, warn};

use crate::codec::ActionCodec;
use crate::core::{Action, Reducer};
use crate::error::DevtoolsError;
use crate::history::StagedHistory;

/// Result of a toggle: the new live state and the updated history.
#[derive(Debug, Clone, PartialEq)]
pub struct Toggled<S> {
    /// The state after the last staged action.
    pub next_state: S,
    /// The history with recomputed states and flipped skip status.
    pub history: StagedHistory<S>,
}

/// Flip the skip status of `id` and recompute the states after it.
///
/// Unknown ids, and the initial action at position 0, leave both `current`
/// and `history` untouched.
pub fn toggle_action<S, A, R>(
    reducer: &R,
    codec: &ActionCodec<A>,
    current: S,
    id: u64,
    mut history: StagedHistory<S>,
) -> Result<Toggled<S>, DevtoolsError>
where
    S: Clone,
    A: Action,
    R: Reducer<S, A>,
{
    let start = match history.position(id) {
        Some(0) => {
            warn!(id, "initial action cannot be toggled");
            return Ok(Toggled {
                next_state: current,
                history,
            });
        }
        Some(start) => start,
        None => {
            warn!(id, "toggle for unknown action id ignored");
            return Ok(Toggled {
                next_state: current,
                history,
            });
        }
    };

    if history.computed_states.len() < history.staged_action_ids.len() {
        return Err(DevtoolsError::History {
            reason: format!(
                "{} staged actions but only {} computed states",
                history.staged_action_ids.len(),
                history.computed_states.len()
            ),
        });
    }

    let skipped_at = history
        .skipped_action_ids
        .iter()
        .position(|&skipped| skipped == id);
    let from = if skipped_at.is_some() { start } else { start + 1 };

    let mut next = history.computed_states[start - 1].state.clone();

    for i in from..history.staged_action_ids.len() {
        let action_id = history.staged_action_ids[i];
        if i != start && history.is_skipped(action_id) {
            continue;
        }

        let perform = history
            .actions_by_id
            .get(&action_id)
            .ok_or_else(|| DevtoolsError::History {
                reason: format!("staged action {} missing from actionsById", action_id),
            })?;
        let action = codec.denormalize(&perform.action)?;

        next = reducer
            .reduce(&next, &action)
            .map_err(DevtoolsError::Reducer)?;
        history.computed_states[i].state = next.clone();
    }

    match skipped_at {
        Some(index) => {
            history.skipped_action_ids.remove(index);
        }
        None => history.skipped_action_ids.push(id),
    }

    debug!(
        id,
        skipped = skipped_at.is_none(),
        recomputed = history.staged_action_ids.len() - from,
        "toggled action"
    );

    Ok(Toggled {
        next_state: next,
        history,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use serde::{Deserialize, Serialize};
    use serde_json::{json, Map};

    use super::*;
    use crate::codec::ActionEnvelope;
    use crate::history::{ComputedState, PerformAction};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
    enum Op {
        Init,
        Add { amount: i64 },
        Sub { amount: i64 },
    }
    crate::serde_action!(Op);

    fn reducer() -> impl Reducer<i64, Op> {
        |s: &i64, a: &Op| -> anyhow::Result<i64> {
            Ok(match a {
                Op::Init => *s,
                Op::Add { amount } => s + amount,
                Op::Sub { amount } => s - amount,
            })
        }
    }

    fn history(ops: &[Op], computed: &[i64]) -> StagedHistory<i64> {
        let mut codec = ActionCodec::<Op>::new();
        let mut actions_by_id = BTreeMap::new();
        for (id, op) in ops.iter().enumerate() {
            actions_by_id.insert(id as u64, PerformAction::new(codec.normalize(op)));
        }
        StagedHistory {
            staged_action_ids: (0..ops.len() as u64).collect(),
            skipped_action_ids: vec![],
            actions_by_id,
            computed_states: computed.iter().copied().map(ComputedState::new).collect(),
            extra: Map::new(),
        }
    }

    fn states(history: &StagedHistory<i64>) -> Vec<i64> {
        history.computed_states.iter().map(|c| c.state).collect()
    }

    // staged [0,1,2,3], computed [0,5,3,8]: 1 = +5, 2 = -2, 3 = +5
    fn scenario() -> StagedHistory<i64> {
        history(
            &[
                Op::Init,
                Op::Add { amount: 5 },
                Op::Sub { amount: 2 },
                Op::Add { amount: 5 },
            ],
            &[0, 5, 3, 8],
        )
    }

    #[test]
    fn test_skip_recomputes_from_predecessor() {
        let codec = ActionCodec::<Op>::new();
        let toggled = toggle_action(&reducer(), &codec, 8, 2, scenario()).unwrap();

        // position 2 untouched, id 3 reapplied to 5 instead of 3
        assert_eq!(states(&toggled.history), vec![0, 5, 3, 10]);
        assert_eq!(toggled.next_state, 10);
        assert_eq!(toggled.history.skipped_action_ids, vec![2]);
    }

    #[test]
    fn test_toggle_twice_restores_history() {
        let codec = ActionCodec::<Op>::new();
        let original = scenario();

        let skipped = toggle_action(&reducer(), &codec, 8, 2, original.clone()).unwrap();
        let restored = toggle_action(
            &reducer(),
            &codec,
            skipped.next_state,
            2,
            skipped.history,
        )
        .unwrap();

        assert_eq!(restored.history, original);
        assert_eq!(restored.next_state, 8);
    }

    #[test]
    fn test_already_skipped_positions_are_left_alone() {
        let codec = ActionCodec::<Op>::new();
        let first = toggle_action(&reducer(), &codec, 8, 3, scenario()).unwrap();
        assert_eq!(first.next_state, 3);

        let second = toggle_action(&reducer(), &codec, first.next_state, 1, first.history).unwrap();
        // 2 recomputed from 0, 3 still skipped and untouched
        assert_eq!(states(&second.history), vec![0, 5, -2, 8]);
        assert_eq!(second.next_state, -2);
        assert_eq!(second.history.skipped_action_ids, vec![3, 1]);
    }

    #[test]
    fn test_skip_last_action_returns_predecessor() {
        let codec = ActionCodec::<Op>::new();
        let toggled = toggle_action(&reducer(), &codec, 8, 3, scenario()).unwrap();
        assert_eq!(toggled.next_state, 3);
        assert_eq!(states(&toggled.history), vec![0, 5, 3, 8]);
    }

    #[test]
    fn test_unknown_id_is_noop() {
        let codec = ActionCodec::<Op>::new();
        let original = scenario();
        let toggled = toggle_action(&reducer(), &codec, 8, 42, original.clone()).unwrap();
        assert_eq!(toggled.next_state, 8);
        assert_eq!(toggled.history, original);
    }

    #[test]
    fn test_initial_action_is_noop() {
        let codec = ActionCodec::<Op>::new();
        let original = scenario();
        let toggled = toggle_action(&reducer(), &codec, 8, 0, original.clone()).unwrap();
        assert_eq!(toggled.next_state, 8);
        assert_eq!(toggled.history, original);
    }

    #[test]
    fn test_short_computed_states_is_error() {
        let codec = ActionCodec::<Op>::new();
        let mut broken = scenario();
        broken.computed_states.truncate(2);
        let err = toggle_action(&reducer(), &codec, 8, 2, broken).unwrap_err();
        assert!(matches!(err, DevtoolsError::History { .. }));
    }

    #[test]
    fn test_missing_action_is_error() {
        let codec = ActionCodec::<Op>::new();
        let mut broken = scenario();
        broken.actions_by_id.remove(&3);
        let err = toggle_action(&reducer(), &codec, 8, 2, broken).unwrap_err();
        assert!(err.to_string().contains("missing from actionsById"));
    }

    #[test]
    fn test_reducer_error_propagates() {
        let failing = |_: &i64, _: &Op| -> anyhow::Result<i64> { anyhow::bail!("boom") };
        let codec = ActionCodec::<Op>::new();
        let err = toggle_action(&failing, &codec, 8, 2, scenario()).unwrap_err();
        assert!(err.is_reducer());
        assert_eq!(err.to_string(), "boom");
    }

    #[test]
    fn test_works_on_console_json() {
        let codec = ActionCodec::<Op>::new();
        let history: StagedHistory<i64> = serde_json::from_value(json!({
            "stagedActionIds": [0, 1, 2],
            "skippedActionIds": [],
            "actionsById": {
                "0": {"type": "PERFORM_ACTION", "action": {"type": "INIT"}},
                "1": {"type": "PERFORM_ACTION", "action": {"type": "ADD", "amount": 4}},
                "2": {"type": "PERFORM_ACTION", "action": {"type": "ADD", "amount": 1}}
            },
            "computedStates": [{"state": 0}, {"state": 4}, {"state": 5}]
        }))
        .unwrap();

        let toggled = toggle_action(&reducer(), &codec, 5, 1, history).unwrap();
        assert_eq!(toggled.next_state, 1);
        assert_eq!(states(&toggled.history), vec![0, 4, 1]);

        let envelope: &ActionEnvelope = &toggled.history.actions_by_id[&1].action;
        assert_eq!(envelope.kind, "ADD");
    }
}
