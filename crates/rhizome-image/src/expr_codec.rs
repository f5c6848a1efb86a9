//! Expression pool codec.
//!
//! Save-time, construct find passes call [`mark_needed_expression`] on
//! every expression tree they reference. Marking inserts each node into an
//! insertion-ordered set; a node's position in that set is its on-disk
//! index, so shared subtrees are written once and every referrer stores
//! the same index. Marking also propagates needed flags to the atoms and
//! functions the nodes carry.
//!
//! Load-time, the pool is grown by `expr_count` placeholder nodes first
//! ([`allocate_expressions`]), so that `arg_list`/`next_arg` indices can
//! be resolved to final handles while the records stream in.

use std::io::Write;

use rhizome_core::{Environment, ExprId, ExprKind, ExprNode};

use crate::chunked::bload_and_refresh;
use crate::io::{corrupt, get_i64, get_u32, write_i64, write_u32, ImageSource};
use crate::state::ImageState;
use crate::ImageResult;

/// On-disk size of one expression record: kind, payload, arg list index,
/// next arg index.
pub const EXPR_RECORD_SIZE: usize = 4 + 8 + 8 + 8;

const KIND_VOID: u32 = 0;
const KIND_SYMBOL: u32 = 1;
const KIND_FLOAT: u32 = 2;
const KIND_INTEGER: u32 = 3;
const KIND_BITMAP: u32 = 4;
const KIND_CALL: u32 = 5;

/// Mark every node of the tree rooted at `root` as needed, along with the
/// atoms and functions those nodes reference. Idempotent per node, so
/// shared subtrees keep the index their first marking assigned.
pub fn mark_needed_expression(env: &mut Environment, st: &mut ImageState, root: Option<ExprId>) {
    let mut stack = Vec::new();
    if let Some(id) = root {
        stack.push(id);
    }

    while let Some(id) = stack.pop() {
        if st.expr_marks.insert(id, ()).is_some() {
            // Already marked, and so is its whole subtree.
            continue;
        }
        st.expression_count += 1;

        let node = *env.exprs.get(id);
        if let Some(next) = node.next_arg {
            stack.push(next);
        }
        if let Some(args) = node.arg_list {
            stack.push(args);
        }

        match node.kind {
            ExprKind::Void => {}
            ExprKind::SymbolAtom(atom) => env.atoms.mark_symbol(atom),
            ExprKind::FloatAtom(atom) => env.atoms.mark_float(atom),
            ExprKind::IntegerAtom(atom) => env.atoms.mark_integer(atom),
            ExprKind::BitmapAtom(atom) => env.atoms.mark_bitmap(atom),
            ExprKind::FunctionCall(f) => env.functions.mark_needed(f),
        }
    }
}

/// On-disk index of a marked expression; -1 for none.
pub fn expression_index(st: &ImageState, id: Option<ExprId>) -> i64 {
    match id {
        None => -1,
        Some(id) => match st.expr_marks.get_index_of(&id) {
            Some(index) => index as i64,
            None => -1,
        },
    }
}

/// Load-time: live handle for an on-disk expression index; -1 maps to none.
pub fn expression_handle(st: &ImageState, index: i64) -> ImageResult<Option<ExprId>> {
    if index < 0 {
        return Ok(None);
    }
    if (index as usize) >= st.expr_count {
        return Err(corrupt("expression", index));
    }
    Ok(Some(ExprId::from_raw((st.expr_base + index as usize) as u32)))
}

/// Write every marked expression as a fixed record, in mark order.
pub fn write_expressions(
    env: &mut Environment,
    st: &mut ImageState,
    out: &mut dyn Write,
) -> ImageResult<()> {
    let marked: Vec<ExprId> = st.expr_marks.keys().copied().collect();
    for id in marked {
        let node = *env.exprs.get(id);
        let (kind, payload) = match node.kind {
            ExprKind::Void => (KIND_VOID, -1),
            ExprKind::SymbolAtom(atom) => (KIND_SYMBOL, env.atoms.symbol_save_index(atom)),
            ExprKind::FloatAtom(atom) => (KIND_FLOAT, env.atoms.float_save_index(atom)),
            ExprKind::IntegerAtom(atom) => (KIND_INTEGER, env.atoms.integer_save_index(atom)),
            ExprKind::BitmapAtom(atom) => (KIND_BITMAP, env.atoms.bitmap_save_index(atom)),
            ExprKind::FunctionCall(f) => (KIND_CALL, env.functions.save_index(f)),
        };
        write_u32(out, kind)?;
        write_i64(out, payload)?;
        write_i64(out, expression_index(st, node.arg_list))?;
        write_i64(out, expression_index(st, node.next_arg))?;
    }
    Ok(())
}

/// Grow the live pool by `count` placeholder nodes so incoming records can
/// link to nodes not yet read.
pub fn allocate_expressions(env: &mut Environment, st: &mut ImageState, count: usize) {
    st.expr_base = env.exprs.len();
    st.expr_count = count;
    for _ in 0..count {
        env.exprs.alloc(ExprNode::leaf(ExprKind::Void));
    }
}

/// Stream the expression records in and overwrite the placeholders.
pub fn read_expressions(
    env: &mut Environment,
    st: &mut ImageState,
    src: &mut dyn ImageSource,
) -> ImageResult<()> {
    let ImageState {
        alloc,
        atoms,
        functions,
        expr_base,
        expr_count,
        ..
    } = st;
    let expr_base = *expr_base;
    let expr_count = *expr_count;
    let exprs = &mut env.exprs;

    bload_and_refresh(
        src,
        alloc.as_mut(),
        expr_count,
        EXPR_RECORD_SIZE,
        &mut |buf, index| {
            let kind_code = get_u32(buf, 0);
            let payload = get_i64(buf, 4);
            let arg_list = get_i64(buf, 12);
            let next_arg = get_i64(buf, 20);

            let kind = match kind_code {
                KIND_VOID => ExprKind::Void,
                KIND_SYMBOL => ExprKind::SymbolAtom(
                    atoms.symbol(payload).ok_or_else(|| corrupt("symbol", payload))?,
                ),
                KIND_FLOAT => ExprKind::FloatAtom(
                    atoms.float(payload).ok_or_else(|| corrupt("float", payload))?,
                ),
                KIND_INTEGER => ExprKind::IntegerAtom(
                    atoms.integer(payload).ok_or_else(|| corrupt("integer", payload))?,
                ),
                KIND_BITMAP => ExprKind::BitmapAtom(
                    atoms.bitmap(payload).ok_or_else(|| corrupt("bit map", payload))?,
                ),
                KIND_CALL => {
                    if payload < 0 || payload as usize >= functions.len() {
                        return Err(corrupt("function", payload));
                    }
                    ExprKind::FunctionCall(functions[payload as usize])
                }
                other => return Err(corrupt("expression kind", other as i64)),
            };

            let resolve = |raw: i64| -> ImageResult<Option<ExprId>> {
                if raw < 0 {
                    Ok(None)
                } else if (raw as usize) < expr_count {
                    Ok(Some(ExprId::from_raw((expr_base + raw as usize) as u32)))
                } else {
                    Err(corrupt("expression", raw))
                }
            };

            let node = exprs.get_mut(ExprId::from_raw((expr_base + index) as u32));
            node.kind = kind;
            node.arg_list = resolve(arg_list)?;
            node.next_arg = resolve(next_arg)?;
            Ok(())
        },
    )
}

/// Release the expressions a load appended to the pool.
pub fn release_bloaded_expressions(env: &mut Environment, st: &mut ImageState) {
    env.exprs.truncate(st.expr_base);
    st.expr_count = 0;
}

/// Mark the expressions referenced from every constraint record. Runs only
/// when dynamic constraint checking is on; otherwise constraints are not
/// part of the image at all.
pub fn mark_constraint_expressions(env: &mut Environment, st: &mut ImageState) {
    if !env.dynamic_constraint_checking {
        return;
    }
    let refs: Vec<Option<ExprId>> = env
        .constraints
        .iter()
        .flat_map(|(_, r)| {
            [
                r.restriction_list,
                r.class_list,
                r.min_value,
                r.max_value,
                r.min_fields,
                r.max_fields,
            ]
        })
        .collect();
    for root in refs {
        mark_needed_expression(env, st, root);
    }
}
