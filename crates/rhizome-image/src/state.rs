//! Mutable state carried across one save or load.
//!
//! [`ImageState`] is owned by the [`ImageContext`](crate::ImageContext)
//! and handed to every codec phase. It holds the save-time mark set and
//! counters, the load-time index→handle arrays, the per-construct
//! bookkeeping, and the saved-counts queue.

use indexmap::IndexMap;
use rhizome_core::{
    BitmapId, ConstraintId, ExprId, FloatId, FunctionId, IntegerId, PatternNodeId, SlotId,
    SymbolId, TemplateId,
};

/// Load-time arrays mapping on-disk atom indices to live handles.
///
/// Populated by the atom codec's read routines, consulted by every other
/// codec's load routine, and dropped once the whole load completes.
/// Resolution does not bump reference counts; codecs that keep a handle
/// long-term retain it explicitly.
#[derive(Debug, Clone, Default)]
pub struct AtomValueArrays {
    pub symbols: Vec<SymbolId>,
    pub floats: Vec<FloatId>,
    pub integers: Vec<IntegerId>,
    pub bitmaps: Vec<BitmapId>,
}

impl AtomValueArrays {
    pub fn symbol(&self, index: i64) -> Option<SymbolId> {
        if index < 0 {
            None
        } else {
            self.symbols.get(index as usize).copied()
        }
    }

    pub fn float(&self, index: i64) -> Option<FloatId> {
        if index < 0 {
            None
        } else {
            self.floats.get(index as usize).copied()
        }
    }

    pub fn integer(&self, index: i64) -> Option<IntegerId> {
        if index < 0 {
            None
        } else {
            self.integers.get(index as usize).copied()
        }
    }

    pub fn bitmap(&self, index: i64) -> Option<BitmapId> {
        if index < 0 {
            None
        } else {
            self.bitmaps.get(index as usize).copied()
        }
    }
}

/// Allocation seam for the chunked bulk loader. The default allocator
/// never fails; tests inject constrained ones to exercise the shrinking
/// retry path.
pub trait ChunkAllocator {
    /// Try to allocate a zeroed buffer of `bytes` bytes.
    fn try_alloc(&mut self, bytes: usize) -> Option<Vec<u8>>;

    /// Invoked exactly once when even a single object's buffer cannot be
    /// allocated, before the load aborts.
    fn out_of_memory(&mut self, bytes: usize);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultAllocator;

impl ChunkAllocator for DefaultAllocator {
    fn try_alloc(&mut self, bytes: usize) -> Option<Vec<u8>> {
        Some(vec![0u8; bytes])
    }

    fn out_of_memory(&mut self, _bytes: usize) {}
}

/// In-memory counts captured while a save runs on top of an active image.
///
/// A construct's find phase is about to overwrite its live count fields
/// for save-time bookkeeping, so it pushes them here first and its data
/// phase pops them back in the same order. Pushes and pops are no-ops
/// while no image is active.
#[derive(Debug, Clone, Default)]
pub struct SavedCounts {
    queue: std::collections::VecDeque<i64>,
}

impl SavedCounts {
    pub fn push(&mut self, active: bool, value: i64) {
        if active {
            self.queue.push_back(value);
        }
    }

    pub fn pop_into(&mut self, active: bool, slot: &mut i64) {
        if active
            && let Some(value) = self.queue.pop_front()
        {
            *slot = value;
        }
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

/// Deftemplate codec bookkeeping.
#[derive(Debug, Clone, Default)]
pub struct TemplateBinState {
    pub template_count: i64,
    pub slot_count: i64,
    /// Arena index the loaded templates start at.
    pub template_base: usize,
    pub slot_base: usize,
    /// On-disk index → live handle, for the current image.
    pub template_map: Vec<TemplateId>,
    pub slot_map: Vec<SlotId>,
}

/// Fact pattern network codec bookkeeping.
#[derive(Debug, Clone, Default)]
pub struct FactBinState {
    pub node_count: i64,
    pub node_base: usize,
    pub node_map: Vec<PatternNodeId>,
}

/// All per-operation image state.
pub struct ImageState {
    /// Whether a loaded binary image is currently active.
    pub active: bool,
    pub saved_counts: SavedCounts,

    // Save-time: insertion-ordered mark set defining on-disk expression
    // indices, plus the running node counter the find phases accumulate.
    pub expr_marks: IndexMap<ExprId, ()>,
    pub expression_count: u64,

    // Load-time temporaries, freed at the end of a successful load.
    pub atoms: AtomValueArrays,
    pub functions: Vec<FunctionId>,

    // Load-time expression pool placement.
    pub expr_base: usize,
    pub expr_count: usize,

    // Load-time constraint table placement.
    pub constraint_base: usize,
    pub constraint_map: Vec<ConstraintId>,

    pub templates: TemplateBinState,
    pub factnet: FactBinState,

    pub alloc: Box<dyn ChunkAllocator>,
}

impl Default for ImageState {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageState {
    pub fn new() -> Self {
        Self {
            active: false,
            saved_counts: SavedCounts::default(),
            expr_marks: IndexMap::new(),
            expression_count: 0,
            atoms: AtomValueArrays::default(),
            functions: Vec::new(),
            expr_base: 0,
            expr_count: 0,
            constraint_base: 0,
            constraint_map: Vec::new(),
            templates: TemplateBinState::default(),
            factnet: FactBinState::default(),
            alloc: Box::new(DefaultAllocator),
        }
    }

    /// Reset the save-time bookkeeping at the start of a save.
    pub fn begin_save(&mut self) {
        self.expr_marks.clear();
        self.expression_count = 0;
    }

    /// Drop the load-time index arrays once every codec has resolved its
    /// references.
    pub fn free_load_temporaries(&mut self) {
        self.atoms = AtomValueArrays::default();
        self.functions = Vec::new();
    }
}
