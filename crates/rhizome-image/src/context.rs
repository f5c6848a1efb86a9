//! The image context.
//!
//! One [`ImageContext`] per environment owns everything the binary image
//! subsystem needs between operations: the construct registry, the three
//! hook lists, and the carried [`ImageState`]. The two built-in codecs
//! register on construction; embedders add their own construct types
//! through [`ImageContext::add_binary_item`].

use std::rc::Rc;

use rhizome_core::Environment;

use crate::fact_codec::{FactNetItem, FACT_NET_PRIORITY};
use crate::registry::{BinaryItem, BinaryRegistry, HookList};
use crate::state::{ChunkAllocator, ImageState};
use crate::template_codec::TemplateItem;

/// Priority at which releasing a loaded image participates in a full
/// environment clear: ahead of every construct type.
pub const CLEAR_PRIORITY: i32 = 10_000;

pub struct ImageContext {
    pub(crate) registry: BinaryRegistry,
    pub(crate) before_bload: HookList,
    pub(crate) after_bload: HookList,
    pub(crate) abort_bload: HookList,
    pub(crate) state: ImageState,
}

impl Default for ImageContext {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageContext {
    pub fn new() -> Self {
        let mut registry = BinaryRegistry::new();
        registry.add(FACT_NET_PRIORITY, Rc::new(FactNetItem));
        registry.add(0, Rc::new(TemplateItem));
        Self {
            registry,
            before_bload: HookList::default(),
            after_bload: HookList::default(),
            abort_bload: HookList::default(),
            state: ImageState::new(),
        }
    }

    /// Whether a loaded binary image is currently active.
    pub fn bloaded(&self) -> bool {
        self.state.active
    }

    /// Priority for clearing the loaded image during an environment clear.
    pub fn clear_priority(&self) -> i32 {
        CLEAR_PRIORITY
    }

    /// Register a construct type's codec at the given priority.
    pub fn add_binary_item(&mut self, priority: i32, item: Rc<dyn BinaryItem>) {
        self.registry.add(priority, item);
    }

    pub fn find_binary_item(&self, name: &str) -> bool {
        self.registry.find(name).is_some()
    }

    /// Replace the allocator the chunked loader draws buffers from.
    pub fn set_allocator(&mut self, alloc: Box<dyn ChunkAllocator>) {
        self.state.alloc = alloc;
    }

    pub fn add_before_bload(&mut self, name: &'static str, priority: i32, f: fn(&mut Environment)) {
        self.before_bload.add(name, priority, f);
    }

    pub fn remove_before_bload(&mut self, name: &str) -> bool {
        self.before_bload.remove(name)
    }

    pub fn add_after_bload(&mut self, name: &'static str, priority: i32, f: fn(&mut Environment)) {
        self.after_bload.add(name, priority, f);
    }

    pub fn remove_after_bload(&mut self, name: &str) -> bool {
        self.after_bload.remove(name)
    }

    pub fn add_abort_bload(&mut self, name: &'static str, priority: i32, f: fn(&mut Environment)) {
        self.abort_bload.add(name, priority, f);
    }

    pub fn remove_abort_bload(&mut self, name: &str) -> bool {
        self.abort_bload.remove(name)
    }
}
