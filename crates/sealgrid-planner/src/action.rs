//! Actions exchanged between the planner and the executor.

use std::fmt;

use serde::{Deserialize, Serialize};

use sealgrid_core::{NodeIndex, OutputId, Role};

/// One schedulable unit of work, executed by `node`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    /// Copy `node`'s package for `role` onto `target`.
    Migrate {
        node: NodeIndex,
        role: Role,
        target: NodeIndex,
    },
    /// Run the mapper over dataset item `item`.
    Map {
        node: NodeIndex,
        item: usize,
        output_id: OutputId,
    },
    /// Combine two earlier outputs with the reducer.
    Reduce {
        node: NodeIndex,
        first_input: OutputId,
        second_input: OutputId,
        output_id: OutputId,
    },
    /// Turn the fully reduced output into the final result.
    Finalize {
        node: NodeIndex,
        input_id: OutputId,
        output_id: OutputId,
    },
}

impl Action {
    /// The node that executes this action.
    pub fn node(&self) -> NodeIndex {
        match *self {
            Action::Migrate { node, .. }
            | Action::Map { node, .. }
            | Action::Reduce { node, .. }
            | Action::Finalize { node, .. } => node,
        }
    }

    pub fn kind(&self) -> ActionKind {
        match self {
            Action::Migrate { .. } => ActionKind::Migrate,
            Action::Map { .. } => ActionKind::Map,
            Action::Reduce { .. } => ActionKind::Reduce,
            Action::Finalize { .. } => ActionKind::Finalize,
        }
    }

    /// The output this action produces. Migrations produce none.
    pub fn output_id(&self) -> Option<OutputId> {
        match *self {
            Action::Migrate { .. } => None,
            Action::Map { output_id, .. }
            | Action::Reduce { output_id, .. }
            | Action::Finalize { output_id, .. } => Some(output_id),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Migrate { node, role, target } => {
                write!(f, "node {node}: migrate {role} -> node {target}")
            }
            Action::Map {
                node,
                item,
                output_id,
            } => write!(f, "node {node}: map item {item} -> #{output_id}"),
            Action::Reduce {
                node,
                first_input,
                second_input,
                output_id,
            } => write!(
                f,
                "node {node}: reduce #{first_input} + #{second_input} -> #{output_id}"
            ),
            Action::Finalize {
                node,
                input_id,
                output_id,
            } => write!(f, "node {node}: finalize #{input_id} -> #{output_id}"),
        }
    }
}

/// Discriminant of [`Action`], used as a key for telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Migrate,
    Map,
    Reduce,
    Finalize,
}

impl ActionKind {
    pub const ALL: [ActionKind; 4] = [
        ActionKind::Migrate,
        ActionKind::Map,
        ActionKind::Reduce,
        ActionKind::Finalize,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Migrate => "migrate",
            ActionKind::Map => "map",
            ActionKind::Reduce => "reduce",
            ActionKind::Finalize => "finalize",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_action_tag() {
        let action = Action::Reduce {
            node: 3,
            first_input: 0,
            second_input: 1,
            output_id: 7,
        };
        let json = serde_json::to_value(action).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "action": "reduce",
                "node": 3,
                "first_input": 0,
                "second_input": 1,
                "output_id": 7,
            })
        );
    }

    #[test]
    fn migrate_role_is_lowercase() {
        let action = Action::Migrate {
            node: 0,
            role: Role::Mapper,
            target: 2,
        };
        let json = serde_json::to_string(&action).unwrap();
        assert!(json.contains(r#""role":"mapper""#));
        let back: Action = serde_json::from_str(&json).unwrap();
        assert_eq!(back, action);
    }

    #[test]
    fn accessors_cover_every_kind() {
        let actions = [
            Action::Migrate {
                node: 1,
                role: Role::Reducer,
                target: 2,
            },
            Action::Map {
                node: 2,
                item: 0,
                output_id: 0,
            },
            Action::Reduce {
                node: 3,
                first_input: 0,
                second_input: 1,
                output_id: 2,
            },
            Action::Finalize {
                node: 4,
                input_id: 2,
                output_id: 3,
            },
        ];
        let nodes: Vec<_> = actions.iter().map(Action::node).collect();
        assert_eq!(nodes, vec![1, 2, 3, 4]);
        let kinds: Vec<_> = actions.iter().map(Action::kind).collect();
        assert_eq!(kinds, ActionKind::ALL.to_vec());
        assert_eq!(actions[0].output_id(), None);
        assert_eq!(actions[3].output_id(), Some(3));
    }

    #[test]
    fn display_is_readable() {
        let action = Action::Finalize {
            node: 0,
            input_id: 12,
            output_id: 13,
        };
        assert_eq!(action.to_string(), "node 0: finalize #12 -> #13");
    }
}
