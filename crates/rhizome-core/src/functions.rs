//! Function registry.
//!
//! Maps function names to ids for expression nodes. The image format
//! stores function references by name, so load resolves each saved name
//! against this registry with a case-sensitive exact match.

use indexmap::IndexMap;

/// Handle to a registered function.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FunctionId(pub(crate) u32);

impl FunctionId {
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
pub struct FunctionDef {
    pub name: String,
    pub needed: bool,
    /// Dense on-disk index assigned while writing an image; -1 otherwise.
    pub save_index: i64,
}

/// Insertion-ordered registry of engine functions.
#[derive(Debug, Clone, Default)]
pub struct FunctionRegistry {
    defs: Vec<FunctionDef>,
    by_name: IndexMap<String, u32>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a function, returning the existing id if the name is taken.
    pub fn register(&mut self, name: &str) -> FunctionId {
        if let Some(&index) = self.by_name.get(name) {
            return FunctionId(index);
        }
        let index = self.defs.len() as u32;
        self.defs.push(FunctionDef {
            name: name.to_owned(),
            needed: false,
            save_index: -1,
        });
        self.by_name.insert(name.to_owned(), index);
        FunctionId(index)
    }

    /// Case-sensitive exact-match lookup.
    pub fn find(&self, name: &str) -> Option<FunctionId> {
        self.by_name.get(name).copied().map(FunctionId)
    }

    pub fn name(&self, id: FunctionId) -> &str {
        &self.defs[id.0 as usize].name
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    pub fn mark_needed(&mut self, id: FunctionId) {
        self.defs[id.0 as usize].needed = true;
    }

    /// Assign dense save indices to the needed functions, in registration
    /// order, and return them.
    pub fn needed_functions(&mut self) -> Vec<FunctionId> {
        let mut out = Vec::new();
        for (i, def) in self.defs.iter_mut().enumerate() {
            if def.needed {
                def.save_index = out.len() as i64;
                out.push(FunctionId(i as u32));
            }
        }
        out
    }

    pub fn save_index(&self, id: FunctionId) -> i64 {
        self.defs[id.0 as usize].save_index
    }

    pub fn reset_save_state(&mut self) {
        for def in &mut self.defs {
            def.needed = false;
            def.save_index = -1;
        }
    }
}
