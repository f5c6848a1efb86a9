//! Core engine state for Rhizome.
//!
//! This crate owns everything a running engine keeps in memory: the four
//! interned atom pools, the flat expression pool, the constraint table, the
//! function registry, deftemplates with their slots, and the fact pattern
//! network. All of it hangs off an explicit [`Environment`] — there is no
//! ambient global state, so two environments never interfere.

pub mod atoms;
pub mod constraints;
pub mod diag;
pub mod environment;
pub mod expr;
pub mod factnet;
pub mod functions;
pub mod templates;

#[cfg(test)]
mod diag_tests;
#[cfg(test)]
mod environment_tests;

pub use atoms::{AtomError, AtomTables, BitmapId, FloatId, IntegerId, MAX_BITMAP_LEN, SymbolId};
pub use constraints::{ConstraintId, ConstraintRecord, ConstraintTable};
pub use diag::{Diagnostic, Diagnostics, Severity};
pub use environment::Environment;
pub use expr::{ExprId, ExprKind, ExprNode, ExprPool};
pub use factnet::{FactPatternNode, PatternNodeId, preorder};
pub use functions::{FunctionId, FunctionRegistry};
pub use templates::{Deftemplate, SlotId, TemplateId, TemplateSlot};
