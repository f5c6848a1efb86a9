//! The engine environment.
//!
//! Owns every table the engine mutates at runtime. Passed explicitly to
//! everything that needs it; two environments are fully independent.

use crate::atoms::{AtomTables, SymbolId};
use crate::constraints::{ConstraintId, ConstraintRecord, ConstraintTable};
use crate::diag::Diagnostics;
use crate::expr::{ExprId, ExprKind, ExprNode, ExprPool};
use crate::factnet::{FactPatternNode, PatternNodeId};
use crate::functions::{FunctionId, FunctionRegistry};
use crate::templates::{Deftemplate, SlotId, TemplateId, TemplateSlot};

/// Name of the synthetic deftemplate that must always exist.
pub const INITIAL_FACT_NAME: &str = "initial-fact";

#[derive(Debug)]
pub struct Environment {
    pub atoms: AtomTables,
    pub exprs: ExprPool,
    pub constraints: ConstraintTable,
    pub functions: FunctionRegistry,
    pub templates: Vec<Deftemplate>,
    pub slots: Vec<TemplateSlot>,
    pub pattern_nodes: Vec<FactPatternNode>,
    pub diagnostics: Diagnostics,

    /// Whether constraint records participate in saves.
    pub dynamic_constraint_checking: bool,

    modules: Vec<String>,
    current_module: usize,
    clear_lock: bool,
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment {
    pub fn new() -> Self {
        let mut env = Self {
            atoms: AtomTables::new(),
            exprs: ExprPool::new(),
            constraints: ConstraintTable::new(),
            functions: FunctionRegistry::new(),
            templates: Vec::new(),
            slots: Vec::new(),
            pattern_nodes: Vec::new(),
            diagnostics: Diagnostics::new(),
            dynamic_constraint_checking: true,
            modules: vec!["MAIN".to_owned()],
            current_module: 0,
            clear_lock: false,
        };
        env.ensure_initial_fact();
        env
    }

    // ------------------------------------------------------------------
    // Modules

    pub fn current_module(&self) -> usize {
        self.current_module
    }

    pub fn set_current_module(&mut self, module: usize) {
        debug_assert!(module < self.modules.len());
        self.current_module = module;
    }

    pub fn module_name(&self, module: usize) -> &str {
        &self.modules[module]
    }

    pub fn add_module(&mut self, name: &str) -> usize {
        self.modules.push(name.to_owned());
        self.modules.len() - 1
    }

    // ------------------------------------------------------------------
    // Deftemplates

    /// Create a deftemplate in the current module.
    pub fn new_deftemplate(&mut self, name: &str) -> TemplateId {
        let name = self.atoms.intern_symbol(name);
        self.atoms.retain_symbol(name);
        let id = TemplateId(self.templates.len() as u32);
        self.templates.push(Deftemplate {
            name,
            first_slot: None,
            slot_count: 0,
            pattern_network: None,
            system: false,
            bsave_id: -1,
        });
        id
    }

    /// Append a slot to a template's chain, preserving declaration order.
    pub fn add_slot(&mut self, template: TemplateId, mut slot: TemplateSlot) -> SlotId {
        self.atoms.retain_symbol(slot.name);
        slot.next = None;
        let id = SlotId(self.slots.len() as u32);
        self.slots.push(slot);

        let tmpl = &mut self.templates[template.0 as usize];
        tmpl.slot_count += 1;
        match tmpl.first_slot {
            None => tmpl.first_slot = Some(id),
            Some(first) => {
                let mut at = first;
                while let Some(next) = self.slots[at.0 as usize].next {
                    at = next;
                }
                self.slots[at.0 as usize].next = Some(id);
            }
        }
        id
    }

    pub fn template(&self, id: TemplateId) -> &Deftemplate {
        &self.templates[id.0 as usize]
    }

    pub fn template_mut(&mut self, id: TemplateId) -> &mut Deftemplate {
        &mut self.templates[id.0 as usize]
    }

    pub fn slot(&self, id: SlotId) -> &TemplateSlot {
        &self.slots[id.0 as usize]
    }

    pub fn slot_mut(&mut self, id: SlotId) -> &mut TemplateSlot {
        &mut self.slots[id.0 as usize]
    }

    /// User-visible deftemplates, in definition order.
    pub fn deftemplates(&self) -> impl Iterator<Item = TemplateId> + '_ {
        self.templates
            .iter()
            .enumerate()
            .filter(|(_, t)| !t.system)
            .map(|(i, _)| TemplateId(i as u32))
    }

    pub fn number_of_deftemplates(&self) -> usize {
        self.templates.iter().filter(|t| !t.system).count()
    }

    pub fn find_deftemplate(&self, name: &str) -> Option<TemplateId> {
        self.templates
            .iter()
            .position(|t| self.atoms.symbol_text(t.name) == name)
            .map(|i| TemplateId(i as u32))
    }

    /// Slot ids of a template in chain order.
    pub fn slots_of(&self, template: TemplateId) -> Vec<SlotId> {
        let mut out = Vec::new();
        let mut at = self.templates[template.0 as usize].first_slot;
        while let Some(id) = at {
            out.push(id);
            at = self.slots[id.0 as usize].next;
        }
        out
    }

    /// Recreate the synthetic `initial-fact` deftemplate if it is missing.
    pub fn ensure_initial_fact(&mut self) {
        if self.find_deftemplate(INITIAL_FACT_NAME).is_some() {
            return;
        }
        let name = self.atoms.intern_symbol(INITIAL_FACT_NAME);
        self.atoms.retain_symbol(name);
        self.templates.push(Deftemplate {
            name,
            first_slot: None,
            slot_count: 0,
            pattern_network: None,
            system: true,
            bsave_id: -1,
        });
    }

    // ------------------------------------------------------------------
    // Fact pattern network

    pub fn alloc_pattern_node(&mut self, node: FactPatternNode) -> PatternNodeId {
        let id = PatternNodeId(self.pattern_nodes.len() as u32);
        self.pattern_nodes.push(node);
        id
    }

    pub fn pattern_node(&self, id: PatternNodeId) -> &FactPatternNode {
        &self.pattern_nodes[id.0 as usize]
    }

    pub fn pattern_node_mut(&mut self, id: PatternNodeId) -> &mut FactPatternNode {
        &mut self.pattern_nodes[id.0 as usize]
    }

    // ------------------------------------------------------------------
    // Constraints

    pub fn add_constraint(&mut self, record: ConstraintRecord) -> ConstraintId {
        self.constraints.add(record)
    }

    // ------------------------------------------------------------------
    // Expression builders

    pub fn expr_integer(&mut self, value: i64) -> ExprId {
        let atom = self.atoms.intern_integer(value);
        self.exprs.alloc(ExprNode::leaf(ExprKind::IntegerAtom(atom)))
    }

    pub fn expr_float(&mut self, value: f64) -> ExprId {
        let atom = self.atoms.intern_float(value);
        self.exprs.alloc(ExprNode::leaf(ExprKind::FloatAtom(atom)))
    }

    pub fn expr_symbol(&mut self, text: &str) -> ExprId {
        let atom = self.atoms.intern_symbol(text);
        self.exprs.alloc(ExprNode::leaf(ExprKind::SymbolAtom(atom)))
    }

    /// A function call with the given argument chain.
    pub fn expr_call(&mut self, function: FunctionId, args: &[ExprId]) -> ExprId {
        for pair in args.windows(2) {
            self.exprs.get_mut(pair[0]).next_arg = Some(pair[1]);
        }
        self.exprs.alloc(ExprNode {
            kind: ExprKind::FunctionCall(function),
            arg_list: args.first().copied(),
            next_arg: None,
        })
    }

    // ------------------------------------------------------------------
    // Clearing

    /// Whether the environment may be cleared right now.
    pub fn clear_ready(&self) -> bool {
        !self.clear_lock
    }

    /// Block or unblock clearing. Used by embedding applications while
    /// constructs are in use.
    pub fn set_clear_lock(&mut self, locked: bool) {
        self.clear_lock = locked;
    }

    /// Discard all constructs, expressions, and constraints while keeping
    /// the atom pools and function registry. Releases the symbols the
    /// constructs retained, then recreates `initial-fact`.
    pub fn clear_constructs(&mut self) {
        for template in &self.templates {
            self.atoms.release_symbol(template.name);
        }
        let slot_names: Vec<SymbolId> = self.slots.iter().map(|s| s.name).collect();
        for name in slot_names {
            self.atoms.release_symbol(name);
        }

        self.templates.clear();
        self.slots.clear();
        self.pattern_nodes.clear();
        self.constraints.clear();
        self.exprs.truncate(0);
        self.ensure_initial_fact();
    }
}
