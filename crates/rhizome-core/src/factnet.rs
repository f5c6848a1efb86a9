//! Fact pattern network.
//!
//! The network is a quad-linked trie keyed by field position:
//! `next_level` descends, `right_node` moves to a sibling, `last_level`
//! points back to the node this one hangs under, `left_node` to the
//! previous sibling. The save-time find pass and the data pass must visit
//! nodes in the identical order, so the traversal lives in exactly one
//! place: [`preorder`].

use crate::expr::ExprId;

/// Handle to a fact pattern node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PatternNodeId(pub(crate) u32);

impl PatternNodeId {
    #[inline]
    pub fn as_u32(self) -> u32 {
        self.0
    }

    #[inline]
    pub fn from_raw(index: u32) -> Self {
        Self(index)
    }
}

#[derive(Debug, Clone)]
pub struct FactPatternNode {
    pub next_level: Option<PatternNodeId>,
    pub last_level: Option<PatternNodeId>,
    pub left_node: Option<PatternNodeId>,
    pub right_node: Option<PatternNodeId>,
    pub which_field: u16,
    pub which_slot: u16,
    pub multifield_node: bool,
    pub network_test: Option<ExprId>,
    /// Dense index assigned during the save-time find pass; -1 otherwise.
    pub bsave_id: i64,
}

impl FactPatternNode {
    pub fn new(which_field: u16, which_slot: u16) -> Self {
        Self {
            next_level: None,
            last_level: None,
            left_node: None,
            right_node: None,
            which_field,
            which_slot,
            multifield_node: false,
            network_test: None,
            bsave_id: -1,
        }
    }
}

/// Iterative pre-order walk of a pattern network: down `next_level` first,
/// then sideways via `right_node`, backtracking through `last_level` until
/// a right sibling is found or the walk is exhausted. No recursion, so
/// arbitrarily deep networks cannot overflow the stack.
pub fn preorder(
    nodes: &[FactPatternNode],
    root: Option<PatternNodeId>,
) -> impl Iterator<Item = PatternNodeId> + '_ {
    Preorder {
        nodes,
        next: root,
    }
}

struct Preorder<'a> {
    nodes: &'a [FactPatternNode],
    next: Option<PatternNodeId>,
}

impl Iterator for Preorder<'_> {
    type Item = PatternNodeId;

    fn next(&mut self) -> Option<PatternNodeId> {
        let current = self.next?;

        let node = &self.nodes[current.0 as usize];
        self.next = if let Some(down) = node.next_level {
            Some(down)
        } else {
            // Backtrack until some ancestor (or this node) has an
            // unvisited right sibling.
            let mut at = Some(current);
            loop {
                match at {
                    None => break None,
                    Some(id) => {
                        let n = &self.nodes[id.0 as usize];
                        if let Some(right) = n.right_node {
                            break Some(right);
                        }
                        at = n.last_level;
                    }
                }
            }
        };

        Some(current)
    }
}
