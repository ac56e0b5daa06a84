//! Fixed node order used for every dispatch decision.
//!
//! The mapper root ranks first, the finalizer root second, the reducer root
//! last, and every other node fills the middle in index order. Mapper
//! coverage spreads upward from rank 0 and reducer coverage downward from the
//! last rank, so the two fronts meet in the middle.
//!
//! When roots coincide, a node keeps the first position it is given: a node
//! that is both mapper and finalizer root ranks first, and a node that is
//! both reducer and finalizer root ranks last.

use sealgrid_core::{NodeIndex, RoleMap};

/// Total order over a node pool, fixed for one job execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeRanking {
    order: Vec<NodeIndex>,
    rank_of: Vec<usize>,
}

impl NodeRanking {
    /// Rank a pool of `nodes` nodes. Every root must be `< nodes`.
    pub fn new(nodes: usize, roots: &RoleMap<NodeIndex>) -> Self {
        let mut order: Vec<NodeIndex> = Vec::with_capacity(nodes);
        order.push(roots.mapper);
        order.extend(
            (0..nodes).filter(|n| *n != roots.mapper && *n != roots.reducer && *n != roots.finalizer),
        );
        if !order.contains(&roots.reducer) {
            order.push(roots.reducer);
        }
        if !order.contains(&roots.finalizer) {
            order.insert(1, roots.finalizer);
        }

        let mut rank_of = vec![0; nodes];
        for (rank, node) in order.iter().enumerate() {
            rank_of[*node] = rank;
        }
        Self { order, rank_of }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn rank(&self, node: NodeIndex) -> usize {
        self.rank_of[node]
    }

    pub fn node(&self, rank: usize) -> NodeIndex {
        self.order[rank]
    }

    /// Nodes from first to last rank.
    pub fn order(&self) -> &[NodeIndex] {
        &self.order
    }
}
