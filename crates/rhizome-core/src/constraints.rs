//! Constraint descriptor records.
//!
//! A constraint record is a fixed bundle of type-allowed and
//! restriction-kind flags plus six optional expression references. The
//! image format persists exactly the eighteen flags below; `void_allowed`
//! and the multifield chain pointer are load-time state and never written.

use crate::expr::ExprId;

/// Handle into the environment's constraint table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ConstraintId(pub(crate) u32);

impl ConstraintId {
    #[inline]
    pub fn as_u32(self) -> u32 {
        self.0
    }

    #[inline]
    pub fn from_raw(index: u32) -> Self {
        Self(index)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConstraintRecord {
    // Type-allowed flags.
    pub any_allowed: bool,
    pub symbols_allowed: bool,
    pub strings_allowed: bool,
    pub floats_allowed: bool,
    pub integers_allowed: bool,
    pub instance_names_allowed: bool,
    pub instance_addresses_allowed: bool,
    pub external_addresses_allowed: bool,
    pub fact_addresses_allowed: bool,
    pub multifields_allowed: bool,
    pub singlefields_allowed: bool,

    // Restriction-kind flags.
    pub any_restriction: bool,
    pub symbol_restriction: bool,
    pub string_restriction: bool,
    pub float_restriction: bool,
    pub integer_restriction: bool,
    pub class_restriction: bool,
    pub instance_name_restriction: bool,

    // Not persisted.
    pub void_allowed: bool,
    pub multifield: Option<ConstraintId>,

    // Expression references.
    pub restriction_list: Option<ExprId>,
    pub class_list: Option<ExprId>,
    pub min_value: Option<ExprId>,
    pub max_value: Option<ExprId>,
    pub min_fields: Option<ExprId>,
    pub max_fields: Option<ExprId>,

    /// Dense index assigned while writing an image; -1 otherwise.
    pub bsave_index: i64,
}

impl ConstraintRecord {
    /// A constraint accepting only integers.
    pub fn integer_only() -> Self {
        Self {
            integers_allowed: true,
            singlefields_allowed: true,
            bsave_index: -1,
            ..Self::default()
        }
    }

    /// A constraint accepting any single-field value.
    pub fn any() -> Self {
        Self {
            any_allowed: true,
            singlefields_allowed: true,
            bsave_index: -1,
            ..Self::default()
        }
    }
}

/// Table of constraint records owned by the environment.
#[derive(Debug, Clone, Default)]
pub struct ConstraintTable {
    records: Vec<ConstraintRecord>,
}

impl ConstraintTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, record: ConstraintRecord) -> ConstraintId {
        let id = ConstraintId(self.records.len() as u32);
        self.records.push(record);
        id
    }

    pub fn get(&self, id: ConstraintId) -> &ConstraintRecord {
        &self.records[id.0 as usize]
    }

    pub fn get_mut(&mut self, id: ConstraintId) -> &mut ConstraintRecord {
        &mut self.records[id.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ConstraintId, &ConstraintRecord)> {
        self.records
            .iter()
            .enumerate()
            .map(|(i, r)| (ConstraintId(i as u32), r))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (ConstraintId, &mut ConstraintRecord)> {
        self.records
            .iter_mut()
            .enumerate()
            .map(|(i, r)| (ConstraintId(i as u32), r))
    }

    /// Drop every record at or past `base`.
    pub fn truncate(&mut self, base: usize) {
        self.records.truncate(base);
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}
