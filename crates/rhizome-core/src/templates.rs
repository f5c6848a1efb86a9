//! Deftemplates and their slots.
//!
//! Templates and slots live in two arenas on the environment. A template's
//! slots form an id-linked chain through `next`; the chain order is the
//! slot order the user declared.

use crate::atoms::SymbolId;
use crate::constraints::ConstraintId;
use crate::expr::ExprId;
use crate::factnet::PatternNodeId;

/// Handle to a deftemplate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TemplateId(pub(crate) u32);

impl TemplateId {
    #[inline]
    pub fn as_u32(self) -> u32 {
        self.0
    }

    #[inline]
    pub fn from_raw(index: u32) -> Self {
        Self(index)
    }
}

/// Handle to a template slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SlotId(pub(crate) u32);

impl SlotId {
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
pub struct Deftemplate {
    pub name: SymbolId,
    pub first_slot: Option<SlotId>,
    pub slot_count: u32,
    pub pattern_network: Option<PatternNodeId>,
    /// Synthetic templates (`initial-fact`) are never saved and are
    /// excluded from user-visible counts.
    pub system: bool,
    /// Dense index assigned during the save-time find pass; -1 otherwise.
    pub bsave_id: i64,
}

#[derive(Debug, Clone)]
pub struct TemplateSlot {
    pub name: SymbolId,
    pub constraints: Option<ConstraintId>,
    pub multislot: bool,
    pub no_default: bool,
    pub default_present: bool,
    pub default_dynamic: bool,
    pub default_list: Option<ExprId>,
    pub next: Option<SlotId>,
    /// Dense index assigned during the save-time find pass; -1 otherwise.
    pub bsave_id: i64,
}

impl TemplateSlot {
    pub fn single(name: SymbolId) -> Self {
        Self {
            name,
            constraints: None,
            multislot: false,
            no_default: false,
            default_present: false,
            default_dynamic: false,
            default_list: None,
            next: None,
            bsave_id: -1,
        }
    }

    pub fn multi(name: SymbolId) -> Self {
        Self {
            multislot: true,
            ..Self::single(name)
        }
    }
}
