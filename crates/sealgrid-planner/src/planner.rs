//! Planner — decides which node does what next.
//!
//! [`MapReducePlanner`] tracks free nodes, which nodes hold each role's
//! package, unmapped items, and outputs waiting to be paired. Each call to
//! [`Planner::next_actions`] checks the readiness of every action kind in a
//! fixed order (migrate mapper, migrate reducer, map, reduce, finalize) and
//! issues everything that can run right now.

use std::collections::BTreeSet;

use tracing::{debug, trace};

use sealgrid_core::{NodeIndex, OutputId, Role, RoleMap};

use crate::action::Action;
use crate::error::{PlanError, PlanResult};
use crate::ranking::NodeRanking;

/// Contract between the executor and a planning strategy.
///
/// The executor calls [`next_actions`](Planner::next_actions), dispatches
/// the returned actions, and reports each completion exactly once through
/// [`action_done`](Planner::action_done) before asking for more work.
pub trait Planner: Send {
    /// Issue every action that can start now, updating state as if they
    /// had already been dispatched.
    fn next_actions(&mut self) -> Vec<Action>;

    /// Record the completion of an action returned by `next_actions`.
    fn action_done(&mut self, action: &Action);

    /// True once the final output has been produced.
    fn is_done(&self) -> bool;

    /// Id of the final output; `None` until [`is_done`](Planner::is_done).
    fn output_id(&self) -> Option<OutputId>;
}

/// Which nodes hold a migratable role's package.
#[derive(Debug, Clone)]
struct Coverage {
    /// Nodes holding a usable copy. Only ever grows.
    holders: BTreeSet<NodeIndex>,
    /// Ranks of nodes that lack a copy and have no migration in flight.
    missing: BTreeSet<usize>,
}

impl Coverage {
    fn new(root: NodeIndex, ranking: &NodeRanking) -> Self {
        Self {
            holders: BTreeSet::from([root]),
            missing: (0..ranking.len())
                .filter(|rank| ranking.node(*rank) != root)
                .collect(),
        }
    }
}

/// The default planner: a balanced binary reduction over all items, with
/// mapper and reducer packages spread across the pool on demand.
#[derive(Debug, Clone)]
pub struct MapReducePlanner {
    roots: RoleMap<NodeIndex>,
    ranking: NodeRanking,
    /// Ranks of nodes with no action assigned.
    free: BTreeSet<usize>,
    mapper: Coverage,
    reducer: Coverage,
    /// Items not yet mapped; popped from the back.
    unmapped: Vec<usize>,
    /// Outputs waiting to be paired, smallest id first.
    reduce_queue: BTreeSet<OutputId>,
    next_output_id: OutputId,
    /// Id of the reduce that completes the reduction (`2N-2`).
    last_reduce_id: OutputId,
    reduction_complete: bool,
    finalize_issued: bool,
    output_id: Option<OutputId>,
}

impl MapReducePlanner {
    /// Create a planner for `items` data items over a pool of `nodes` nodes.
    ///
    /// `roots` names the node initially holding each role's package.
    pub fn new(items: usize, nodes: usize, roots: RoleMap<NodeIndex>) -> PlanResult<Self> {
        if items == 0 {
            return Err(PlanError::NoItems);
        }
        if nodes == 0 {
            return Err(PlanError::NoNodes);
        }
        for (role, &node) in roots.iter() {
            if node >= nodes {
                return Err(PlanError::RootOutOfRange { role, node, nodes });
            }
        }

        let ranking = NodeRanking::new(nodes, &roots);
        debug!(items, nodes, order = ?ranking.order(), "planner created");

        Ok(Self {
            roots,
            free: (0..nodes).collect(),
            mapper: Coverage::new(roots.mapper, &ranking),
            reducer: Coverage::new(roots.reducer, &ranking),
            ranking,
            unmapped: (0..items).rev().collect(),
            reduce_queue: BTreeSet::new(),
            next_output_id: 0,
            last_reduce_id: 2 * items as OutputId - 2,
            reduction_complete: false,
            finalize_issued: false,
            output_id: None,
        })
    }

    /// The node order this planner dispatches by.
    pub fn ranking(&self) -> &NodeRanking {
        &self.ranking
    }

    /// Nodes currently holding `role`'s package, in index order.
    pub fn holders(&self, role: Role) -> Vec<NodeIndex> {
        match role {
            Role::Mapper => self.mapper.holders.iter().copied().collect(),
            Role::Reducer => self.reducer.holders.iter().copied().collect(),
            Role::Finalizer => vec![self.roots.finalizer],
        }
    }

    /// Nodes with no action assigned, in rank order.
    pub fn free_nodes(&self) -> Vec<NodeIndex> {
        self.free.iter().map(|rank| self.ranking.node(*rank)).collect()
    }

    /// Id the reduction's last output receives.
    pub fn last_reduce_id(&self) -> OutputId {
        self.last_reduce_id
    }

    fn coverage(&self, role: Role) -> &Coverage {
        match role {
            Role::Mapper => &self.mapper,
            Role::Reducer => &self.reducer,
            Role::Finalizer => unreachable!("finalizer packages never migrate"),
        }
    }

    fn coverage_mut(&mut self, role: Role) -> &mut Coverage {
        match role {
            Role::Mapper => &mut self.mapper,
            Role::Reducer => &mut self.reducer,
            Role::Finalizer => unreachable!("finalizer packages never migrate"),
        }
    }

    /// Free nodes holding `role`'s package, in rank order.
    fn free_holders(&self, role: Role) -> Vec<NodeIndex> {
        let holders = &self.coverage(role).holders;
        self.free
            .iter()
            .map(|rank| self.ranking.node(*rank))
            .filter(|node| holders.contains(node))
            .collect()
    }

    fn take_node(&mut self, node: NodeIndex) {
        let removed = self.free.remove(&self.ranking.rank(node));
        debug_assert!(removed, "node {node} dispatched while busy");
    }

    fn allocate_output_id(&mut self) -> OutputId {
        let id = self.next_output_id;
        self.next_output_id += 1;
        id
    }

    fn migrate_actions(&mut self, role: Role) -> Vec<Action> {
        let mut actions = Vec::new();
        if self.coverage(role).missing.is_empty() {
            return actions;
        }

        for source in self.free_holders(role) {
            let missing = &mut self.coverage_mut(role).missing;
            // Mapper coverage grows up from rank 0, reducer coverage down
            // from the last rank.
            let target_rank = match role {
                Role::Mapper => missing.pop_first(),
                _ => missing.pop_last(),
            };
            let Some(target_rank) = target_rank else { break };
            let target = self.ranking.node(target_rank);

            self.take_node(source);
            actions.push(Action::Migrate {
                node: source,
                role,
                target,
            });
        }
        actions
    }

    fn map_actions(&mut self) -> Vec<Action> {
        let mut actions = Vec::new();
        if self.unmapped.is_empty() {
            return actions;
        }

        for node in self.free_holders(Role::Mapper) {
            let Some(item) = self.unmapped.pop() else { break };
            self.take_node(node);
            let output_id = self.allocate_output_id();
            actions.push(Action::Map {
                node,
                item,
                output_id,
            });
        }
        actions
    }

    fn reduce_actions(&mut self) -> Vec<Action> {
        let mut actions = Vec::new();
        if self.reduce_queue.len() < 2 {
            return actions;
        }

        // Nodes nearest the reducer root go first.
        for node in self.free_holders(Role::Reducer).into_iter().rev() {
            if self.reduce_queue.len() < 2 {
                break;
            }
            let (Some(first_input), Some(second_input)) =
                (self.reduce_queue.pop_first(), self.reduce_queue.pop_first())
            else {
                unreachable!("reduce queue holds at least two outputs");
            };
            self.take_node(node);
            let output_id = self.allocate_output_id();
            actions.push(Action::Reduce {
                node,
                first_input,
                second_input,
                output_id,
            });
        }
        actions
    }

    fn finalize_actions(&mut self) -> Vec<Action> {
        let node = self.roots.finalizer;
        if !self.reduction_complete
            || self.finalize_issued
            || !self.free.contains(&self.ranking.rank(node))
        {
            return Vec::new();
        }

        self.finalize_issued = true;
        self.take_node(node);
        let input_id = self.last_reduce_id;
        let output_id = self.allocate_output_id();
        vec![Action::Finalize {
            node,
            input_id,
            output_id,
        }]
    }

    /// Queue a map or reduce output for pairing, or close the reduction if
    /// it is the last one.
    fn enqueue_output(&mut self, output_id: OutputId) {
        if output_id == self.last_reduce_id {
            debug!(output_id, "reduction complete");
            self.reduction_complete = true;
        } else {
            self.reduce_queue.insert(output_id);
        }
    }
}

impl Planner for MapReducePlanner {
    fn next_actions(&mut self) -> Vec<Action> {
        let mut actions = self.migrate_actions(Role::Mapper);
        actions.extend(self.migrate_actions(Role::Reducer));
        actions.extend(self.map_actions());
        actions.extend(self.reduce_actions());
        actions.extend(self.finalize_actions());

        debug!(
            issued = actions.len(),
            free = self.free.len(),
            unmapped = self.unmapped.len(),
            queued = self.reduce_queue.len(),
            "planned batch"
        );
        actions
    }

    fn action_done(&mut self, action: &Action) {
        let node = action.node();
        assert!(
            self.free.insert(self.ranking.rank(node)),
            "completion reported for idle node {node}: {action}"
        );
        trace!(%action, "action done");

        match *action {
            Action::Migrate { role, target, .. } => {
                self.coverage_mut(role).holders.insert(target);
            }
            Action::Map { output_id, .. } | Action::Reduce { output_id, .. } => {
                self.enqueue_output(output_id);
            }
            Action::Finalize { output_id, .. } => {
                debug!(output_id, "final output recorded");
                self.output_id = Some(output_id);
            }
        }
    }

    fn is_done(&self) -> bool {
        self.output_id.is_some()
    }

    fn output_id(&self) -> Option<OutputId> {
        self.output_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn planner(items: usize, nodes: usize, root: NodeIndex) -> MapReducePlanner {
        MapReducePlanner::new(items, nodes, RoleMap::uniform(root)).unwrap()
    }

    #[test]
    fn rejects_empty_job() {
        assert_eq!(
            MapReducePlanner::new(0, 2, RoleMap::uniform(0)).unwrap_err(),
            PlanError::NoItems
        );
        assert_eq!(
            MapReducePlanner::new(3, 0, RoleMap::uniform(0)).unwrap_err(),
            PlanError::NoNodes
        );
    }

    #[test]
    fn rejects_root_outside_pool() {
        let err = MapReducePlanner::new(3, 2, RoleMap::new(0, 2, 0)).unwrap_err();
        assert_eq!(
            err,
            PlanError::RootOutOfRange {
                role: Role::Reducer,
                node: 2,
                nodes: 2
            }
        );
    }

    #[test]
    fn first_batch_migrates_mapper_upward() {
        let mut p = planner(7, 4, 0);
        let batch = p.next_actions();
        assert_eq!(
            batch,
            vec![Action::Migrate {
                node: 0,
                role: Role::Mapper,
                target: 1
            }]
        );
        assert_eq!(p.free_nodes(), vec![1, 2, 3]);
    }

    #[test]
    fn reducer_migrates_to_highest_rank() {
        let mut p = MapReducePlanner::new(4, 4, RoleMap::new(0, 3, 0)).unwrap();
        let batch = p.next_actions();
        assert_eq!(
            batch,
            vec![
                Action::Migrate {
                    node: 0,
                    role: Role::Mapper,
                    target: 1
                },
                Action::Migrate {
                    node: 3,
                    role: Role::Reducer,
                    target: 2
                },
            ]
        );
    }

    #[test]
    fn single_item_skips_reduction() {
        let mut p = planner(1, 1, 0);
        let batch = p.next_actions();
        assert_eq!(
            batch,
            vec![Action::Map {
                node: 0,
                item: 0,
                output_id: 0
            }]
        );
        p.action_done(&batch[0]);

        let batch = p.next_actions();
        assert_eq!(
            batch,
            vec![Action::Finalize {
                node: 0,
                input_id: 0,
                output_id: 1
            }]
        );
        p.action_done(&batch[0]);
        assert!(p.is_done());
        assert_eq!(p.output_id(), Some(1));
    }

    #[test]
    fn reduce_pairs_smallest_ids() {
        let mut p = planner(4, 1, 0);
        for expected in 0..4 {
            let batch = p.next_actions();
            assert_eq!(batch.len(), 1);
            assert_eq!(batch[0].output_id(), Some(expected));
            p.action_done(&batch[0]);
        }
        let batch = p.next_actions();
        assert_eq!(
            batch,
            vec![Action::Reduce {
                node: 0,
                first_input: 0,
                second_input: 1,
                output_id: 4
            }]
        );
    }

    #[test]
    fn finalize_runs_once_on_finalizer_root() {
        let mut p = MapReducePlanner::new(2, 2, RoleMap::new(0, 1, 0)).unwrap();
        let mut in_flight: Vec<Action> = p.next_actions();
        let mut finalizes = 0;
        while !p.is_done() {
            let action = in_flight.remove(0);
            p.action_done(&action);
            let batch = p.next_actions();
            finalizes += batch
                .iter()
                .filter(|a| matches!(a, Action::Finalize { node: 0, .. }))
                .count();
            in_flight.extend(batch);
        }
        assert_eq!(finalizes, 1);
        assert_eq!(p.output_id(), Some(3));
    }

    #[test]
    fn idle_planner_issues_nothing_twice() {
        let mut p = planner(3, 2, 0);
        let first = p.next_actions();
        assert!(!first.is_empty());
        assert!(p.next_actions().is_empty());
    }

    #[test]
    #[should_panic(expected = "completion reported for idle node")]
    fn reporting_unissued_action_panics() {
        let mut p = planner(3, 2, 0);
        p.action_done(&Action::Map {
            node: 1,
            item: 0,
            output_id: 0,
        });
    }

    #[test]
    fn batches_never_repeat_a_node() {
        for nodes in 1..6 {
            let mut p = planner(9, nodes, 0);
            while !p.is_done() {
                let batch = p.next_actions();
                let distinct: HashSet<_> = batch.iter().map(Action::node).collect();
                assert_eq!(distinct.len(), batch.len());
                for action in &batch {
                    p.action_done(action);
                }
            }
        }
    }
}
