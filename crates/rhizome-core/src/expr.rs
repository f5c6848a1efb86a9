//! Flat expression pool.
//!
//! Expression trees are stored as index-linked nodes: `arg_list` points to
//! the first argument, `next_arg` to the following sibling. This is the
//! same shape the image format uses on disk, so flattening is positional.

use crate::atoms::{BitmapId, FloatId, IntegerId, SymbolId};
use crate::functions::FunctionId;

/// Handle to a node in the expression pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExprId(pub(crate) u32);

impl ExprId {
    #[inline]
    pub fn as_u32(self) -> u32 {
        self.0
    }

    #[inline]
    pub fn from_raw(index: u32) -> Self {
        Self(index)
    }
}

/// Payload of an expression node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExprKind {
    Void,
    SymbolAtom(SymbolId),
    FloatAtom(FloatId),
    IntegerAtom(IntegerId),
    BitmapAtom(BitmapId),
    FunctionCall(FunctionId),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExprNode {
    pub kind: ExprKind,
    pub arg_list: Option<ExprId>,
    pub next_arg: Option<ExprId>,
}

impl ExprNode {
    pub fn leaf(kind: ExprKind) -> Self {
        Self {
            kind,
            arg_list: None,
            next_arg: None,
        }
    }
}

/// Arena of expression nodes.
#[derive(Debug, Clone, Default)]
pub struct ExprPool {
    nodes: Vec<ExprNode>,
}

impl ExprPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, node: ExprNode) -> ExprId {
        let id = ExprId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    pub fn get(&self, id: ExprId) -> &ExprNode {
        &self.nodes[id.0 as usize]
    }

    pub fn get_mut(&mut self, id: ExprId) -> &mut ExprNode {
        &mut self.nodes[id.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Drop every node at or past `base`. Used when a loaded image is
    /// released; valid only because the image's constructs are released in
    /// the same pass.
    pub fn truncate(&mut self, base: usize) {
        self.nodes.truncate(base);
    }

    /// Number of nodes in the tree rooted at `id`, counting sibling chains.
    pub fn size(&self, id: Option<ExprId>) -> usize {
        let mut count = 0;
        let mut stack = Vec::new();
        if let Some(id) = id {
            stack.push(id);
        }
        while let Some(id) = stack.pop() {
            count += 1;
            let node = self.get(id);
            if let Some(next) = node.next_arg {
                stack.push(next);
            }
            if let Some(args) = node.arg_list {
                stack.push(args);
            }
        }
        count
    }

    /// Structural equality of two trees, comparing node payloads in the
    /// same pool-independent way the image round trip preserves them.
    pub fn trees_equal(&self, a: Option<ExprId>, b: Option<ExprId>) -> bool {
        match (a, b) {
            (None, None) => true,
            (Some(a), Some(b)) => {
                let na = self.get(a);
                let nb = self.get(b);
                na.kind == nb.kind
                    && self.trees_equal(na.arg_list, nb.arg_list)
                    && self.trees_equal(na.next_arg, nb.next_arg)
            }
            _ => false,
        }
    }
}
