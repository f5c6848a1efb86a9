//! The binary item registry.
//!
//! Each construct type participates in the save/load protocol by
//! implementing [`BinaryItem`] and registering under a name and a
//! priority. The registry keeps entries in descending priority order;
//! the save and load drivers invoke phases in that order, which is how
//! cross-construct dependencies (mark my atoms before yours) are encoded.

use std::io::Write;
use std::rc::Rc;

use rhizome_core::Environment;

use crate::ImageResult;
use crate::io::ImageSource;
use crate::state::ImageState;

/// One construct type's participation contract.
///
/// Every method has a default no-op body; the `saves_*`/`loads_*`
/// predicates say which phases the item actually implements, so the
/// drivers know whether to emit a tagged block for it (save) or to skip
/// an incoming block (load).
pub trait BinaryItem {
    /// Registered type name; truncated to the 20-byte tag width on disk.
    fn type_name(&self) -> &'static str;

    /// Save-time: assign dense indices to live instances and mark the
    /// atoms they reference as needed.
    fn find(&self, _env: &mut Environment, _st: &mut ImageState) {}

    /// Save-time: mark the expressions live instances reference.
    fn mark_expressions(&self, _env: &mut Environment, _st: &mut ImageState) {}

    fn saves_storage(&self) -> bool {
        false
    }

    /// Write the storage-size block payload (byte count, then instance
    /// counts) so the load side can pre-allocate exact arrays.
    fn write_storage(
        &self,
        _env: &mut Environment,
        _st: &mut ImageState,
        _out: &mut dyn Write,
    ) -> ImageResult<()> {
        Ok(())
    }

    fn saves_data(&self) -> bool {
        false
    }

    /// Write the data block payload: one fixed-layout record per
    /// instance, pointers replaced by indices.
    fn write_data(
        &self,
        _env: &mut Environment,
        _st: &mut ImageState,
        _out: &mut dyn Write,
    ) -> ImageResult<()> {
        Ok(())
    }

    fn loads_storage(&self) -> bool {
        false
    }

    fn read_storage(
        &self,
        _env: &mut Environment,
        _st: &mut ImageState,
        _src: &mut dyn ImageSource,
    ) -> ImageResult<()> {
        Ok(())
    }

    fn loads_data(&self) -> bool {
        false
    }

    fn read_data(
        &self,
        _env: &mut Environment,
        _st: &mut ImageState,
        _src: &mut dyn ImageSource,
    ) -> ImageResult<()> {
        Ok(())
    }

    /// Whether this item's loaded state may be released right now.
    fn clear_ready(&self, _env: &Environment, _st: &ImageState) -> bool {
        true
    }

    /// Release the loaded state: drop retained atom references, free the
    /// live arrays, re-establish any intrinsic invariant clearing broke.
    fn clear(&self, _env: &mut Environment, _st: &mut ImageState) {}
}

#[derive(Clone)]
pub struct RegistryEntry {
    pub name: &'static str,
    pub priority: i32,
    pub item: Rc<dyn BinaryItem>,
}

/// Registration list, kept in descending priority order.
#[derive(Clone, Default)]
pub struct BinaryRegistry {
    entries: Vec<RegistryEntry>,
}

impl BinaryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert before the first entry whose priority is strictly less than
    /// the new one. Among equal priorities the most recently inserted
    /// entry therefore comes first.
    pub fn add(&mut self, priority: i32, item: Rc<dyn BinaryItem>) {
        let name = item.type_name();
        let entry = RegistryEntry {
            name,
            priority,
            item,
        };
        let pos = self
            .entries
            .iter()
            .position(|e| e.priority < priority)
            .unwrap_or(self.entries.len());
        self.entries.insert(pos, entry);
    }

    /// Linear search by registered name.
    pub fn find(&self, name: &str) -> Option<&RegistryEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Snapshot of the entries in priority order. Drivers iterate over
    /// the snapshot so they can hand the state to item callbacks without
    /// holding a borrow on the registry.
    pub fn snapshot(&self) -> Vec<RegistryEntry> {
        self.entries.clone()
    }
}

/// Hook invoked around a load: before it starts, after it completes, or
/// when function resolution aborts it.
#[derive(Clone, Copy)]
pub struct Hook {
    pub name: &'static str,
    pub priority: i32,
    pub f: fn(&mut Environment),
}

/// Priority-ordered hook list with the same splice rule as the registry.
#[derive(Clone, Default)]
pub struct HookList {
    hooks: Vec<Hook>,
}

impl HookList {
    pub fn add(&mut self, name: &'static str, priority: i32, f: fn(&mut Environment)) {
        let pos = self
            .hooks
            .iter()
            .position(|h| h.priority < priority)
            .unwrap_or(self.hooks.len());
        self.hooks.insert(pos, Hook { name, priority, f });
    }

    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.hooks.len();
        self.hooks.retain(|h| h.name != name);
        before != self.hooks.len()
    }

    pub fn run(&self, env: &mut Environment) {
        for hook in &self.hooks {
            (hook.f)(env);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }
}
