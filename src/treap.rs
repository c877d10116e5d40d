//! Order-statistics treap over bid commitments.
//!
//! Nodes live in an arena pre-sized to the bid count and link to each other by
//! index. Besides the usual `parent/left/right` links every node is threaded into
//! a doubly-linked list in ascending value order, so the next-lower commitment is
//! one hop away. Nodes are only ever inserted, never removed.

use crate::interfaces::{units_at, Bid, Commitment, Price, Units};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;

/// Slot of a node in the arena
pub type NodeId = usize;

#[derive(Debug, Clone)]
struct Node {
    value: Commitment,
    weight: u32,
    count: usize,
    subtree_size: usize,
    parent: Option<NodeId>,
    left: Option<NodeId>,
    right: Option<NodeId>,
    prev: Option<NodeId>,
    next: Option<NodeId>,
}

impl Node {
    fn leaf(value: Commitment, weight: u32, parent: Option<NodeId>) -> Self {
        Node {
            value,
            weight,
            count: 1,
            subtree_size: 1,
            parent,
            left: None,
            right: None,
            prev: None,
            next: None,
        }
    }
}

/// First broken invariant found by [`AugmentedTreap::check_invariants`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TreapViolation {
    #[error("root {root} has a parent")]
    RootHasParent { root: NodeId },

    #[error("node {child} does not point back to its parent {parent}")]
    ParentLink { parent: NodeId, child: NodeId },

    #[error("node {node} records subtree size {found}, expected {expected}")]
    SubtreeSize {
        node: NodeId,
        expected: usize,
        found: usize,
    },

    #[error("child {child} outweighs its parent {parent}")]
    HeapOrder { parent: NodeId, child: NodeId },

    #[error("in-order position {position} is not strictly ascending")]
    SearchOrder { position: usize },

    #[error("threaded list diverges from in-order traversal at position {position}")]
    ThreadedList { position: usize },

    #[error("only {reached} of {total} nodes are reachable from the root")]
    Unreachable { reached: usize, total: usize },

    #[error("tree holds {found} bids, expected {expected}")]
    Length { expected: usize, found: usize },
}

pub struct AugmentedTreap<'a, R = StdRng> {
    bids: &'a [Bid],
    nodes: Vec<Node>,
    root: Option<NodeId>,
    // extrémités de la liste chaînée
    lowest: Option<NodeId>,
    highest: Option<NodeId>,
    len: usize,
    rng: R,
}

impl<'a> AugmentedTreap<'a, StdRng> {
    /// Treap over `bids` with weights drawn from OS entropy.
    pub fn new(bids: &'a [Bid]) -> Self {
        Self::with_rng(bids, StdRng::from_entropy())
    }
}

impl<'a, R: Rng> AugmentedTreap<'a, R> {
    /// Treap over `bids` drawing weights from `rng`.
    pub fn with_rng(bids: &'a [Bid], rng: R) -> Self {
        AugmentedTreap {
            bids,
            nodes: Vec::with_capacity(bids.len()),
            root: None,
            lowest: None,
            highest: None,
            len: 0,
            rng,
        }
    }

    /// Number of bids inserted so far
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of distinct commitment values
    pub fn distinct_len(&self) -> usize {
        self.nodes.len()
    }

    /// Largest inserted commitment, 0 when empty
    pub fn max_value(&self) -> Commitment {
        self.highest.map_or(0, |id| self.nodes[id].value)
    }

    pub fn value_of(&self, id: NodeId) -> Commitment {
        self.nodes[id].value
    }

    /// Bids merged into node `id`
    pub fn count_of(&self, id: NodeId) -> usize {
        self.nodes[id].count
    }

    #[inline(always)]
    fn size(&self, id: Option<NodeId>) -> usize {
        id.map_or(0, |id| self.nodes[id].subtree_size)
    }

    /// Adds one to the subtree size of `from` and every ancestor above it.
    #[inline(always)]
    fn grow_path(&mut self, from: Option<NodeId>) {
        let mut cursor = from;
        while let Some(id) = cursor {
            self.nodes[id].subtree_size += 1;
            cursor = self.nodes[id].parent;
        }
    }

    #[inline(always)]
    fn refresh_size(&mut self, id: NodeId) {
        let node = &self.nodes[id];
        let size = node.count + self.size(node.left) + self.size(node.right);
        self.nodes[id].subtree_size = size;
    }

    /// Inserts the bid at `bid_index` and returns the node now holding its
    /// commitment.
    pub fn insert(&mut self, bid_index: usize) -> NodeId {
        let value = self.bids[bid_index].commitment();
        self.len += 1;

        let Some(mut cursor) = self.root else {
            let weight = self.rng.gen::<u32>();
            self.nodes.push(Node::leaf(value, weight, None));
            let id = self.nodes.len() - 1;
            self.root = Some(id);
            self.lowest = Some(id);
            self.highest = Some(id);
            return id;
        };

        loop {
            let node = &self.nodes[cursor];
            if value == node.value {
                self.nodes[cursor].count += 1;
                self.grow_path(Some(cursor));
                return cursor;
            }
            let (child, goes_right) = if value > node.value {
                (node.right, true)
            } else {
                (node.left, false)
            };
            match child {
                Some(child) => cursor = child,
                None => {
                    let id = self.attach(cursor, value, goes_right);
                    self.grow_path(Some(cursor));
                    self.rotate_up(id);
                    return id;
                }
            }
        }
    }

    /// Hangs a new leaf under `parent` and splices it into the threaded list.
    /// A new right child sits right after its parent in value order, a new left
    /// child right before it.
    fn attach(&mut self, parent: NodeId, value: Commitment, right: bool) -> NodeId {
        let weight = self.rng.gen::<u32>();
        self.nodes.push(Node::leaf(value, weight, Some(parent)));
        let id = self.nodes.len() - 1;

        if right {
            let after = self.nodes[parent].next;
            self.nodes[parent].right = Some(id);
            self.nodes[parent].next = Some(id);
            self.nodes[id].prev = Some(parent);
            self.nodes[id].next = after;
            match after {
                Some(after) => self.nodes[after].prev = Some(id),
                None => self.highest = Some(id),
            }
        } else {
            let before = self.nodes[parent].prev;
            self.nodes[parent].left = Some(id);
            self.nodes[parent].prev = Some(id);
            self.nodes[id].next = Some(parent);
            self.nodes[id].prev = before;
            match before {
                Some(before) => self.nodes[before].next = Some(id),
                None => self.lowest = Some(id),
            }
        }
        id
    }

    /// Rotates `id` upward while its parent has a strictly smaller weight.
    fn rotate_up(&mut self, id: NodeId) {
        while let Some(parent) = self.nodes[id].parent {
            if self.nodes[parent].weight >= self.nodes[id].weight {
                break;
            }
            let grand = self.nodes[parent].parent;

            // le sous-arbre intérieur de `id` change de parent
            let inner = if self.nodes[parent].right == Some(id) {
                let inner = self.nodes[id].left;
                self.nodes[id].left = Some(parent);
                self.nodes[parent].right = inner;
                inner
            } else {
                let inner = self.nodes[id].right;
                self.nodes[id].right = Some(parent);
                self.nodes[parent].left = inner;
                inner
            };
            if let Some(inner) = inner {
                self.nodes[inner].parent = Some(parent);
            }
            self.nodes[parent].parent = Some(id);
            self.nodes[id].parent = grand;

            match grand {
                None => self.root = Some(id),
                Some(grand) => {
                    if self.nodes[grand].left == Some(parent) {
                        self.nodes[grand].left = Some(id);
                    } else {
                        self.nodes[grand].right = Some(id);
                    }
                }
            }

            self.refresh_size(parent);
            self.refresh_size(id);
        }
    }

    /// One descent answering two questions about `target`: the node holding the
    /// smallest value `>= target` (if any), and how many inserted bids have a
    /// value strictly below `target`.
    pub fn size_below_and_index_of_smallest_ge(
        &self,
        target: Commitment,
    ) -> (Option<NodeId>, usize) {
        let mut below = 0;
        let mut candidate = None;
        let mut cursor = self.root;

        while let Some(id) = cursor {
            let node = &self.nodes[id];
            if node.value == target {
                return (Some(id), below + self.size(node.left));
            }
            if node.value < target {
                below += node.count + self.size(node.left);
                cursor = node.right;
            } else {
                candidate = Some(id);
                cursor = node.left;
            }
        }
        (candidate, below)
    }

    /// Node holding the next-lower commitment.
    #[inline(always)]
    pub fn predecessor_of(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id].prev
    }

    /// Node holding the next-higher commitment.
    #[inline(always)]
    pub fn successor_of(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id].next
    }

    /// Ascending `(value, count)` pairs, following the threaded list.
    pub fn iter(&self) -> impl Iterator<Item = (Commitment, usize)> + '_ {
        std::iter::successors(self.lowest, move |&id| self.nodes[id].next)
            .map(move |id| (self.nodes[id].value, self.nodes[id].count))
    }

    /// Units demanded at `price` by every inserted bid, capped at `total_units`.
    ///
    /// Walks commitment tiers downward from the largest value. All bids in
    /// `[tier * price, previous threshold)` buy exactly `tier` units, so each
    /// tier costs one rank query and one predecessor hop.
    pub fn demand_at_price(&self, price: Price, total_units: Units) -> Units {
        let Some(highest) = self.highest else {
            return 0;
        };
        let cap = u64::from(total_units);
        let mut tier = units_at(self.nodes[highest].value, price);
        if tier >= cap {
            return total_units;
        }

        let mut demand = 0u64;
        let mut above = self.len;
        loop {
            // tier * price <= valeur courante, pas de débordement
            let threshold = tier * u64::from(price);
            let (boundary, below) = self.size_below_and_index_of_smallest_ge(threshold);
            let bidders = (above - below) as u64;
            demand = demand.saturating_add(tier.saturating_mul(bidders));
            if demand >= cap {
                return total_units;
            }
            above = below;

            match boundary.and_then(|id| self.predecessor_of(id)) {
                Some(lower) => tier = units_at(self.nodes[lower].value, price),
                // demand < cap <= Units::MAX
                None => return Units::try_from(demand).unwrap_or(total_units),
            }
        }
    }

    /// Verifies every structural invariant: parent links, subtree sizes, heap
    /// order on weights, search order on values, and that the threaded list
    /// matches the in-order traversal.
    pub fn check_invariants(&self) -> Result<(), TreapViolation> {
        if let Some(root) = self.root {
            if self.nodes[root].parent.is_some() {
                return Err(TreapViolation::RootHasParent { root });
            }
        }

        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack = Vec::new();
        let mut cursor = self.root;
        while cursor.is_some() || !stack.is_empty() {
            while let Some(id) = cursor {
                stack.push(id);
                cursor = self.nodes[id].left;
            }
            if let Some(id) = stack.pop() {
                order.push(id);
                cursor = self.nodes[id].right;
            }
        }

        if order.len() != self.nodes.len() {
            return Err(TreapViolation::Unreachable {
                reached: order.len(),
                total: self.nodes.len(),
            });
        }

        let mut total = 0;
        for &id in &order {
            let node = &self.nodes[id];
            total += node.count;
            for child in [node.left, node.right].into_iter().flatten() {
                if self.nodes[child].parent != Some(id) {
                    return Err(TreapViolation::ParentLink { parent: id, child });
                }
                if self.nodes[child].weight > node.weight {
                    return Err(TreapViolation::HeapOrder { parent: id, child });
                }
            }
            let expected = node.count + self.size(node.left) + self.size(node.right);
            if node.subtree_size != expected {
                return Err(TreapViolation::SubtreeSize {
                    node: id,
                    expected,
                    found: node.subtree_size,
                });
            }
        }

        if total != self.len {
            return Err(TreapViolation::Length {
                expected: self.len,
                found: total,
            });
        }

        for (position, pair) in order.windows(2).enumerate() {
            if self.nodes[pair[0]].value >= self.nodes[pair[1]].value {
                return Err(TreapViolation::SearchOrder {
                    position: position + 1,
                });
            }
        }

        let mut threaded = std::iter::successors(self.lowest, |&id| self.nodes[id].next);
        let mut previous = None;
        for (position, &id) in order.iter().enumerate() {
            if threaded.next() != Some(id) || self.nodes[id].prev != previous {
                return Err(TreapViolation::ThreadedList { position });
            }
            previous = Some(id);
        }
        if threaded.next().is_some() || self.highest != previous {
            return Err(TreapViolation::ThreadedList {
                position: order.len(),
            });
        }

        Ok(())
    }
}
