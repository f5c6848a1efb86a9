//! Constraint table codec.
//!
//! Constraint records ride along in the image only while dynamic
//! constraint checking is on; with checking off the save writes a zero
//! count and slots load with no constraint attached. Eighteen boolean
//! flags pack into one word, followed by six expression indices.

use std::io::Write;

use rhizome_core::{ConstraintId, ConstraintRecord, Environment, ExprId};

use crate::chunked::bload_and_refresh;
use crate::io::{corrupt, get_i64, get_u32, read_u64, write_i64, write_u32, write_u64, ImageSource};
use crate::state::ImageState;
use crate::ImageResult;

/// On-disk size of one constraint record: a flag word and six expression
/// indices.
pub const CONSTRAINT_RECORD_SIZE: usize = 4 + 6 * 8;

/// Assign dense on-disk indices to every constraint record, in table
/// order. With dynamic constraint checking off no record gets an index
/// and references serialize as none.
pub fn find_constraints(env: &mut Environment) {
    if !env.dynamic_constraint_checking {
        for (_, record) in env.constraints.iter_mut() {
            record.bsave_index = -1;
        }
        return;
    }
    let mut next = 0i64;
    for (_, record) in env.constraints.iter_mut() {
        record.bsave_index = next;
        next += 1;
    }
}

/// On-disk index of a constraint reference; -1 for none or when
/// constraints are not being saved.
pub fn constraint_index(env: &Environment, id: Option<ConstraintId>) -> i64 {
    match id {
        None => -1,
        Some(id) => env.constraints.get(id).bsave_index,
    }
}

/// Load-time: live handle for an on-disk constraint index.
pub fn constraint_handle(st: &ImageState, index: i64) -> ImageResult<Option<ConstraintId>> {
    if index < 0 {
        return Ok(None);
    }
    st.constraint_map
        .get(index as usize)
        .copied()
        .map(Some)
        .ok_or_else(|| corrupt("constraint", index))
}

fn pack_flags(r: &ConstraintRecord) -> u32 {
    let flags = [
        r.any_allowed,
        r.symbols_allowed,
        r.strings_allowed,
        r.floats_allowed,
        r.integers_allowed,
        r.instance_names_allowed,
        r.instance_addresses_allowed,
        r.external_addresses_allowed,
        r.fact_addresses_allowed,
        r.multifields_allowed,
        r.singlefields_allowed,
        r.any_restriction,
        r.symbol_restriction,
        r.string_restriction,
        r.float_restriction,
        r.integer_restriction,
        r.class_restriction,
        r.instance_name_restriction,
    ];
    flags
        .iter()
        .enumerate()
        .fold(0, |word, (bit, &set)| word | ((set as u32) << bit))
}

fn unpack_flags(word: u32) -> ConstraintRecord {
    let bit = |n: usize| word & (1 << n) != 0;
    ConstraintRecord {
        any_allowed: bit(0),
        symbols_allowed: bit(1),
        strings_allowed: bit(2),
        floats_allowed: bit(3),
        integers_allowed: bit(4),
        instance_names_allowed: bit(5),
        instance_addresses_allowed: bit(6),
        external_addresses_allowed: bit(7),
        fact_addresses_allowed: bit(8),
        multifields_allowed: bit(9),
        singlefields_allowed: bit(10),
        any_restriction: bit(11),
        symbol_restriction: bit(12),
        string_restriction: bit(13),
        float_restriction: bit(14),
        integer_restriction: bit(15),
        class_restriction: bit(16),
        instance_name_restriction: bit(17),
        bsave_index: -1,
        ..ConstraintRecord::default()
    }
}

/// Write the constraint count and, if they are being saved, every record
/// in table order.
pub fn write_constraints(
    env: &mut Environment,
    st: &mut ImageState,
    out: &mut dyn Write,
) -> ImageResult<()> {
    if !env.dynamic_constraint_checking {
        if !env.constraints.is_empty() {
            env.diagnostics.warning(
                "CSTRNBIN",
                1,
                "dynamic constraint checking is off; constraints will not be saved",
            );
        }
        write_u64(out, 0)?;
        return Ok(());
    }

    write_u64(out, env.constraints.len() as u64)?;
    let records: Vec<(u32, [i64; 6])> = env
        .constraints
        .iter()
        .map(|(_, r)| {
            (
                pack_flags(r),
                [
                    expr_index(st, r.restriction_list),
                    expr_index(st, r.class_list),
                    expr_index(st, r.min_value),
                    expr_index(st, r.max_value),
                    expr_index(st, r.min_fields),
                    expr_index(st, r.max_fields),
                ],
            )
        })
        .collect();
    for (flags, refs) in records {
        write_u32(out, flags)?;
        for index in refs {
            write_i64(out, index)?;
        }
    }
    Ok(())
}

fn expr_index(st: &ImageState, id: Option<ExprId>) -> i64 {
    crate::expr_codec::expression_index(st, id)
}

/// Read the constraint block: a count, then that many records appended to
/// the live table.
pub fn read_constraints(
    env: &mut Environment,
    st: &mut ImageState,
    src: &mut dyn ImageSource,
) -> ImageResult<()> {
    let count = read_u64(src)? as usize;
    st.constraint_base = env.constraints.len();
    st.constraint_map = Vec::with_capacity(count);

    let ImageState {
        alloc,
        constraint_map,
        expr_base,
        expr_count,
        ..
    } = st;
    let expr_base = *expr_base;
    let expr_count = *expr_count;
    let constraints = &mut env.constraints;

    bload_and_refresh(
        src,
        alloc.as_mut(),
        count,
        CONSTRAINT_RECORD_SIZE,
        &mut |buf, _index| {
            let resolve = |raw: i64| -> ImageResult<Option<ExprId>> {
                if raw < 0 {
                    Ok(None)
                } else if (raw as usize) < expr_count {
                    Ok(Some(ExprId::from_raw((expr_base + raw as usize) as u32)))
                } else {
                    Err(corrupt("expression", raw))
                }
            };

            let mut record = unpack_flags(get_u32(buf, 0));
            record.restriction_list = resolve(get_i64(buf, 4))?;
            record.class_list = resolve(get_i64(buf, 12))?;
            record.min_value = resolve(get_i64(buf, 20))?;
            record.max_value = resolve(get_i64(buf, 28))?;
            record.min_fields = resolve(get_i64(buf, 36))?;
            record.max_fields = resolve(get_i64(buf, 44))?;
            constraint_map.push(constraints.add(record));
            Ok(())
        },
    )
}

/// Release the constraint records a load appended to the table.
pub fn release_bloaded_constraints(env: &mut Environment, st: &mut ImageState) {
    env.constraints.truncate(st.constraint_base);
    st.constraint_map.clear();
}
