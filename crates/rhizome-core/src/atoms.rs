//! Interned atom pools.
//!
//! Every primitive value in the knowledge base — symbol, float, integer,
//! bit map — is interned exactly once and shared by handle. Interning is
//! idempotent: equal input yields the same handle. Entries carry a
//! reference count (owners of long-lived handles call `retain`/`release`)
//! plus two fields used only by the image subsystem: a `needed` mark set
//! during the save-time mark pass, and the dense on-disk index assigned
//! while the pool is being written.

use std::collections::HashMap;

/// Bit maps longer than this cannot be represented in the image format:
/// the on-disk length prefix is a single byte.
pub const MAX_BITMAP_LEN: usize = 255;

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum AtomError {
    /// Bit map exceeds the single-byte length prefix of the image format.
    #[error("bit map of {0} bytes exceeds the {MAX_BITMAP_LEN}-byte format limit")]
    BitmapTooLarge(usize),
}

macro_rules! atom_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub(crate) u32);

        impl $name {
            /// Raw index, for serialization and debugging.
            #[inline]
            pub fn as_u32(self) -> u32 {
                self.0
            }

            /// Rebuild a handle from a raw index. Use only for deserialization.
            #[inline]
            pub fn from_raw(index: u32) -> Self {
                Self(index)
            }
        }
    };
}

atom_id!(
    /// Handle to an interned symbol.
    SymbolId
);
atom_id!(
    /// Handle to an interned float.
    FloatId
);
atom_id!(
    /// Handle to an interned integer.
    IntegerId
);
atom_id!(
    /// Handle to an interned bit map.
    BitmapId
);

/// One interned value plus its bookkeeping.
#[derive(Debug, Clone)]
pub struct AtomEntry<T> {
    pub value: T,
    pub refcount: u32,
    pub needed: bool,
    /// Dense on-disk index assigned while writing an image; -1 otherwise.
    pub save_index: i64,
}

impl<T> AtomEntry<T> {
    fn new(value: T) -> Self {
        Self {
            value,
            refcount: 0,
            needed: false,
            save_index: -1,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct Pool<T> {
    entries: Vec<AtomEntry<T>>,
}

impl<T> Pool<T> {
    fn push(&mut self, value: T) -> u32 {
        let index = self.entries.len() as u32;
        self.entries.push(AtomEntry::new(value));
        index
    }
}

/// The four intern pools of an environment.
#[derive(Debug, Clone, Default)]
pub struct AtomTables {
    symbols: Pool<String>,
    floats: Pool<f64>,
    integers: Pool<i64>,
    bitmaps: Pool<Vec<u8>>,

    symbol_map: HashMap<String, u32>,
    float_map: HashMap<u64, u32>,
    integer_map: HashMap<i64, u32>,
    bitmap_map: HashMap<Vec<u8>, u32>,
}

impl AtomTables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern_symbol(&mut self, text: &str) -> SymbolId {
        if let Some(&index) = self.symbol_map.get(text) {
            return SymbolId(index);
        }
        let index = self.symbols.push(text.to_owned());
        self.symbol_map.insert(text.to_owned(), index);
        SymbolId(index)
    }

    pub fn intern_float(&mut self, value: f64) -> FloatId {
        // Keyed by bit pattern so -0.0 and NaN payloads intern distinctly.
        if let Some(&index) = self.float_map.get(&value.to_bits()) {
            return FloatId(index);
        }
        let index = self.floats.push(value);
        self.float_map.insert(value.to_bits(), index);
        FloatId(index)
    }

    pub fn intern_integer(&mut self, value: i64) -> IntegerId {
        if let Some(&index) = self.integer_map.get(&value) {
            return IntegerId(index);
        }
        let index = self.integers.push(value);
        self.integer_map.insert(value, index);
        IntegerId(index)
    }

    pub fn intern_bitmap(&mut self, bytes: &[u8]) -> Result<BitmapId, AtomError> {
        if bytes.len() > MAX_BITMAP_LEN {
            return Err(AtomError::BitmapTooLarge(bytes.len()));
        }
        if let Some(&index) = self.bitmap_map.get(bytes) {
            return Ok(BitmapId(index));
        }
        let index = self.bitmaps.push(bytes.to_vec());
        self.bitmap_map.insert(bytes.to_vec(), index);
        Ok(BitmapId(index))
    }

    pub fn symbol_text(&self, id: SymbolId) -> &str {
        &self.symbols.entries[id.0 as usize].value
    }

    pub fn float_value(&self, id: FloatId) -> f64 {
        self.floats.entries[id.0 as usize].value
    }

    pub fn integer_value(&self, id: IntegerId) -> i64 {
        self.integers.entries[id.0 as usize].value
    }

    pub fn bitmap_bytes(&self, id: BitmapId) -> &[u8] {
        &self.bitmaps.entries[id.0 as usize].value
    }

    pub fn symbol_count(&self) -> usize {
        self.symbols.entries.len()
    }

    // Reference counting. Callers that store a handle long-term retain it;
    // the matching clear path releases it.

    pub fn retain_symbol(&mut self, id: SymbolId) {
        self.symbols.entries[id.0 as usize].refcount += 1;
    }

    pub fn release_symbol(&mut self, id: SymbolId) {
        let entry = &mut self.symbols.entries[id.0 as usize];
        entry.refcount = entry.refcount.saturating_sub(1);
    }

    pub fn symbol_refcount(&self, id: SymbolId) -> u32 {
        self.symbols.entries[id.0 as usize].refcount
    }

    // Needed marks, consumed by the atom codec.

    pub fn mark_symbol(&mut self, id: SymbolId) {
        self.symbols.entries[id.0 as usize].needed = true;
    }

    pub fn mark_float(&mut self, id: FloatId) {
        self.floats.entries[id.0 as usize].needed = true;
    }

    pub fn mark_integer(&mut self, id: IntegerId) {
        self.integers.entries[id.0 as usize].needed = true;
    }

    pub fn mark_bitmap(&mut self, id: BitmapId) {
        self.bitmaps.entries[id.0 as usize].needed = true;
    }

    /// Clear all needed marks and save indices across the four pools.
    /// Runs before every mark pass and again after a save completes.
    pub fn reset_save_state(&mut self) {
        fn reset<T>(pool: &mut Pool<T>) {
            for entry in &mut pool.entries {
                entry.needed = false;
                entry.save_index = -1;
            }
        }
        reset(&mut self.symbols);
        reset(&mut self.floats);
        reset(&mut self.integers);
        reset(&mut self.bitmaps);
    }

    // Save-index plumbing. The image codec assigns dense indices while
    // scanning each pool and every other codec translates handles through
    // these accessors.

    pub fn needed_symbols(&mut self) -> Vec<SymbolId> {
        let mut out = Vec::new();
        for (i, entry) in self.symbols.entries.iter_mut().enumerate() {
            if entry.needed {
                entry.save_index = out.len() as i64;
                out.push(SymbolId(i as u32));
            }
        }
        out
    }

    pub fn needed_floats(&mut self) -> Vec<FloatId> {
        let mut out = Vec::new();
        for (i, entry) in self.floats.entries.iter_mut().enumerate() {
            if entry.needed {
                entry.save_index = out.len() as i64;
                out.push(FloatId(i as u32));
            }
        }
        out
    }

    pub fn needed_integers(&mut self) -> Vec<IntegerId> {
        let mut out = Vec::new();
        for (i, entry) in self.integers.entries.iter_mut().enumerate() {
            if entry.needed {
                entry.save_index = out.len() as i64;
                out.push(IntegerId(i as u32));
            }
        }
        out
    }

    pub fn needed_bitmaps(&mut self) -> Vec<BitmapId> {
        let mut out = Vec::new();
        for (i, entry) in self.bitmaps.entries.iter_mut().enumerate() {
            if entry.needed {
                entry.save_index = out.len() as i64;
                out.push(BitmapId(i as u32));
            }
        }
        out
    }

    pub fn symbol_save_index(&self, id: SymbolId) -> i64 {
        self.symbols.entries[id.0 as usize].save_index
    }

    pub fn float_save_index(&self, id: FloatId) -> i64 {
        self.floats.entries[id.0 as usize].save_index
    }

    pub fn integer_save_index(&self, id: IntegerId) -> i64 {
        self.integers.entries[id.0 as usize].save_index
    }

    pub fn bitmap_save_index(&self, id: BitmapId) -> i64 {
        self.bitmaps.entries[id.0 as usize].save_index
    }
}
