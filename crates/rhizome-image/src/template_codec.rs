//! Deftemplate codec.
//!
//! Saves every non-synthetic deftemplate and its slot chain. The find
//! pass assigns dense indices (templates in definition order, slots
//! grouped per template in chain order) and marks the name symbols; the
//! data pass writes one fixed record per template, then one per slot.
//! Slot records carry an explicit `next` index rather than relying on the
//! chain being contiguous on disk.

use std::io::Write;

use rhizome_core::{
    ConstraintId, Deftemplate, Environment, ExprId, PatternNodeId, SlotId, SymbolId, TemplateId,
    TemplateSlot,
};

use crate::chunked::bload_and_refresh;
use crate::constraint_codec::constraint_index;
use crate::expr_codec::expression_index;
use crate::io::{corrupt, get_i64, get_u32, read_u64, write_i64, write_u32, write_u64, ImageSource};
use crate::registry::BinaryItem;
use crate::state::ImageState;
use crate::ImageResult;

pub const TEMPLATE_TYPE_NAME: &str = "deftemplate";

/// Template record: name, pattern network root, first slot, slot count.
pub const TEMPLATE_RECORD_SIZE: usize = 3 * 8 + 4;

/// Slot record: name, constraint, default list, next slot, flag word.
pub const SLOT_RECORD_SIZE: usize = 4 * 8 + 4;

const SLOT_MULTI: u32 = 1 << 0;
const SLOT_NO_DEFAULT: u32 = 1 << 1;
const SLOT_DEFAULT_PRESENT: u32 = 1 << 2;
const SLOT_DEFAULT_DYNAMIC: u32 = 1 << 3;

/// Binary image participation for deftemplates.
#[derive(Debug, Default)]
pub struct TemplateItem;

impl BinaryItem for TemplateItem {
    fn type_name(&self) -> &'static str {
        TEMPLATE_TYPE_NAME
    }

    fn find(&self, env: &mut Environment, st: &mut ImageState) {
        st.saved_counts.push(st.active, st.templates.template_count);
        st.saved_counts.push(st.active, st.templates.slot_count);

        let mut template_index = 0i64;
        let mut slot_index = 0i64;
        for i in 0..env.templates.len() {
            let id = TemplateId::from_raw(i as u32);
            if env.templates[i].system {
                env.templates[i].bsave_id = -1;
                continue;
            }
            env.templates[i].bsave_id = template_index;
            template_index += 1;

            let name = env.templates[i].name;
            env.atoms.mark_symbol(name);

            for slot in env.slots_of(id) {
                let slot = &mut env.slots[slot.as_u32() as usize];
                slot.bsave_id = slot_index;
                slot_index += 1;
                env.atoms.mark_symbol(slot.name);
            }
        }
        st.templates.template_count = template_index;
        st.templates.slot_count = slot_index;
    }

    fn mark_expressions(&self, env: &mut Environment, st: &mut ImageState) {
        let defaults: Vec<Option<ExprId>> = saved_templates(env)
            .into_iter()
            .flat_map(|id| env.slots_of(id))
            .map(|slot| env.slot(slot).default_list)
            .collect();
        for root in defaults {
            crate::expr_codec::mark_needed_expression(env, st, root);
        }
    }

    fn saves_storage(&self) -> bool {
        true
    }

    fn write_storage(
        &self,
        _env: &mut Environment,
        st: &mut ImageState,
        out: &mut dyn Write,
    ) -> ImageResult<()> {
        write_u64(out, st.templates.template_count as u64)?;
        write_u64(out, st.templates.slot_count as u64)?;
        Ok(())
    }

    fn saves_data(&self) -> bool {
        true
    }

    fn write_data(
        &self,
        env: &mut Environment,
        st: &mut ImageState,
        out: &mut dyn Write,
    ) -> ImageResult<()> {
        for id in saved_templates(env) {
            let template = env.template(id);
            write_i64(out, env.atoms.symbol_save_index(template.name))?;
            write_i64(out, pattern_node_index(env, template.pattern_network))?;
            write_i64(out, slot_bsave_index(env, template.first_slot))?;
            write_u32(out, template.slot_count)?;
        }
        for id in saved_templates(env) {
            for slot_id in env.slots_of(id) {
                let slot = env.slot(slot_id);
                let mut flags = 0u32;
                if slot.multislot {
                    flags |= SLOT_MULTI;
                }
                if slot.no_default {
                    flags |= SLOT_NO_DEFAULT;
                }
                if slot.default_present {
                    flags |= SLOT_DEFAULT_PRESENT;
                }
                if slot.default_dynamic {
                    flags |= SLOT_DEFAULT_DYNAMIC;
                }
                write_i64(out, env.atoms.symbol_save_index(slot.name))?;
                write_i64(out, constraint_index(env, slot.constraints))?;
                write_i64(out, expression_index(st, slot.default_list))?;
                write_i64(out, slot_bsave_index(env, slot.next))?;
                write_u32(out, flags)?;
            }
        }

        st.saved_counts
            .pop_into(st.active, &mut st.templates.template_count);
        st.saved_counts
            .pop_into(st.active, &mut st.templates.slot_count);
        Ok(())
    }

    fn loads_storage(&self) -> bool {
        true
    }

    fn read_storage(
        &self,
        env: &mut Environment,
        st: &mut ImageState,
        src: &mut dyn ImageSource,
    ) -> ImageResult<()> {
        st.templates.template_count = read_u64(src)? as i64;
        st.templates.slot_count = read_u64(src)? as i64;
        st.templates.template_base = env.templates.len();
        st.templates.slot_base = env.slots.len();
        env.templates.reserve(st.templates.template_count as usize);
        env.slots.reserve(st.templates.slot_count as usize);
        Ok(())
    }

    fn loads_data(&self) -> bool {
        true
    }

    fn read_data(
        &self,
        env: &mut Environment,
        st: &mut ImageState,
        src: &mut dyn ImageSource,
    ) -> ImageResult<()> {
        struct RawTemplate {
            name: SymbolId,
            pattern_network: Option<PatternNodeId>,
            first_slot: Option<SlotId>,
            slot_count: u32,
        }
        struct RawSlot {
            name: SymbolId,
            constraints: Option<ConstraintId>,
            default_list: Option<ExprId>,
            next: Option<SlotId>,
            flags: u32,
        }

        let template_count = st.templates.template_count as usize;
        let slot_count = st.templates.slot_count as usize;
        let slot_base = st.templates.slot_base;
        let node_base = st.factnet.node_base;
        let node_count = st.factnet.node_count as usize;

        let resolve_slot = move |raw: i64| -> ImageResult<Option<SlotId>> {
            if raw < 0 {
                Ok(None)
            } else if (raw as usize) < slot_count {
                Ok(Some(SlotId::from_raw((slot_base + raw as usize) as u32)))
            } else {
                Err(corrupt("slot", raw))
            }
        };
        let resolve_node = move |raw: i64| -> ImageResult<Option<PatternNodeId>> {
            if raw < 0 {
                Ok(None)
            } else if (raw as usize) < node_count {
                Ok(Some(PatternNodeId::from_raw(
                    (node_base + raw as usize) as u32,
                )))
            } else {
                Err(corrupt("pattern node", raw))
            }
        };

        let mut raw_templates: Vec<RawTemplate> = Vec::with_capacity(template_count);
        {
            let ImageState { alloc, atoms, .. } = st;
            bload_and_refresh(
                src,
                alloc.as_mut(),
                template_count,
                TEMPLATE_RECORD_SIZE,
                &mut |buf, _| {
                    let name = get_i64(buf, 0);
                    raw_templates.push(RawTemplate {
                        name: atoms.symbol(name).ok_or_else(|| corrupt("symbol", name))?,
                        pattern_network: resolve_node(get_i64(buf, 8))?,
                        first_slot: resolve_slot(get_i64(buf, 16))?,
                        slot_count: get_u32(buf, 24),
                    });
                    Ok(())
                },
            )?;
        }

        let mut raw_slots: Vec<RawSlot> = Vec::with_capacity(slot_count);
        {
            let expr_base = st.expr_base;
            let expr_count = st.expr_count;
            let ImageState {
                alloc,
                atoms,
                constraint_map,
                ..
            } = st;
            bload_and_refresh(
                src,
                alloc.as_mut(),
                slot_count,
                SLOT_RECORD_SIZE,
                &mut |buf, _| {
                    let name = get_i64(buf, 0);
                    let constraint = get_i64(buf, 8);
                    let default_list = get_i64(buf, 16);
                    raw_slots.push(RawSlot {
                        name: atoms.symbol(name).ok_or_else(|| corrupt("symbol", name))?,
                        constraints: if constraint < 0 {
                            None
                        } else {
                            Some(
                                constraint_map
                                    .get(constraint as usize)
                                    .copied()
                                    .ok_or_else(|| corrupt("constraint", constraint))?,
                            )
                        },
                        default_list: if default_list < 0 {
                            None
                        } else if (default_list as usize) < expr_count {
                            Some(ExprId::from_raw((expr_base + default_list as usize) as u32))
                        } else {
                            return Err(corrupt("expression", default_list));
                        },
                        next: resolve_slot(get_i64(buf, 24))?,
                        flags: get_u32(buf, 32),
                    });
                    Ok(())
                },
            )?;
        }

        st.templates.template_map = Vec::with_capacity(template_count);
        for raw in raw_templates {
            env.atoms.retain_symbol(raw.name);
            let id = TemplateId::from_raw(env.templates.len() as u32);
            env.templates.push(Deftemplate {
                name: raw.name,
                first_slot: raw.first_slot,
                slot_count: raw.slot_count,
                pattern_network: raw.pattern_network,
                system: false,
                bsave_id: -1,
            });
            st.templates.template_map.push(id);
        }

        st.templates.slot_map = Vec::with_capacity(slot_count);
        for raw in raw_slots {
            env.atoms.retain_symbol(raw.name);
            let id = SlotId::from_raw(env.slots.len() as u32);
            env.slots.push(TemplateSlot {
                name: raw.name,
                constraints: raw.constraints,
                multislot: raw.flags & SLOT_MULTI != 0,
                no_default: raw.flags & SLOT_NO_DEFAULT != 0,
                default_present: raw.flags & SLOT_DEFAULT_PRESENT != 0,
                default_dynamic: raw.flags & SLOT_DEFAULT_DYNAMIC != 0,
                default_list: raw.default_list,
                next: raw.next,
                bsave_id: -1,
            });
            st.templates.slot_map.push(id);
        }
        Ok(())
    }

    fn clear(&self, env: &mut Environment, st: &mut ImageState) {
        for template in env.templates.iter().skip(st.templates.template_base) {
            env.atoms.release_symbol(template.name);
        }
        let names: Vec<SymbolId> = env
            .slots
            .iter()
            .skip(st.templates.slot_base)
            .map(|s| s.name)
            .collect();
        for name in names {
            env.atoms.release_symbol(name);
        }

        env.templates.truncate(st.templates.template_base);
        env.slots.truncate(st.templates.slot_base);
        st.templates = Default::default();
        env.ensure_initial_fact();
    }
}

/// Templates that participate in a save, in on-disk index order.
pub(crate) fn saved_templates(env: &Environment) -> Vec<TemplateId> {
    env.deftemplates().collect()
}

fn slot_bsave_index(env: &Environment, id: Option<SlotId>) -> i64 {
    match id {
        None => -1,
        Some(id) => env.slot(id).bsave_id,
    }
}

fn pattern_node_index(env: &Environment, id: Option<PatternNodeId>) -> i64 {
    match id {
        None => -1,
        Some(id) => env.pattern_node(id).bsave_id,
    }
}
