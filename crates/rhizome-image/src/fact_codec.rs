//! Fact pattern network codec.
//!
//! Registers at a higher priority than the deftemplate codec so its
//! storage block is read first: template records resolve their pattern
//! network root against the node placement this codec establishes.
//!
//! The find pass and the data pass both walk every template's network
//! through [`preorder`], so the dense indices the find pass assigns are
//! exactly the record order the data pass writes.

use std::io::Write;

use rhizome_core::{preorder, Environment, ExprId, FactPatternNode, PatternNodeId};

use crate::chunked::bload_and_refresh;
use crate::expr_codec::expression_index;
use crate::io::{corrupt, get_i64, get_u16, get_u32, read_u64, write_i64, write_u16, write_u32, write_u64, ImageSource};
use crate::registry::BinaryItem;
use crate::state::ImageState;
use crate::template_codec::saved_templates;
use crate::ImageResult;

pub const FACT_NET_TYPE_NAME: &str = "factptn";

/// Priority of this codec in the registry. Above the deftemplate codec's.
pub const FACT_NET_PRIORITY: i32 = 100;

/// Node record: four links, a test expression, two field positions, flags.
pub const NODE_RECORD_SIZE: usize = 5 * 8 + 2 * 2 + 4;

const NODE_MULTIFIELD: u32 = 1 << 0;

/// Binary image participation for the fact pattern network.
#[derive(Debug, Default)]
pub struct FactNetItem;

impl BinaryItem for FactNetItem {
    fn type_name(&self) -> &'static str {
        FACT_NET_TYPE_NAME
    }

    fn find(&self, env: &mut Environment, st: &mut ImageState) {
        st.saved_counts.push(st.active, st.factnet.node_count);

        let mut index = 0i64;
        for template in saved_templates(env) {
            let root = env.template(template).pattern_network;
            let order: Vec<PatternNodeId> = preorder(&env.pattern_nodes, root).collect();
            for id in order {
                env.pattern_node_mut(id).bsave_id = index;
                index += 1;
            }
        }
        st.factnet.node_count = index;
    }

    fn mark_expressions(&self, env: &mut Environment, st: &mut ImageState) {
        let tests: Vec<Option<ExprId>> = saved_templates(env)
            .into_iter()
            .flat_map(|template| {
                let root = env.template(template).pattern_network;
                preorder(&env.pattern_nodes, root)
                    .map(|id| env.pattern_node(id).network_test)
                    .collect::<Vec<_>>()
            })
            .collect();
        for root in tests {
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
        write_u64(out, st.factnet.node_count as u64)?;
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
        for template in saved_templates(env) {
            let root = env.template(template).pattern_network;
            for id in preorder(&env.pattern_nodes, root) {
                let node = env.pattern_node(id);
                write_i64(out, link_index(env, node.next_level))?;
                write_i64(out, link_index(env, node.last_level))?;
                write_i64(out, link_index(env, node.left_node))?;
                write_i64(out, link_index(env, node.right_node))?;
                write_i64(out, expression_index(st, node.network_test))?;
                write_u16(out, node.which_field)?;
                write_u16(out, node.which_slot)?;
                let mut flags = 0u32;
                if node.multifield_node {
                    flags |= NODE_MULTIFIELD;
                }
                write_u32(out, flags)?;
            }
        }

        st.saved_counts
            .pop_into(st.active, &mut st.factnet.node_count);
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
        st.factnet.node_count = read_u64(src)? as i64;
        st.factnet.node_base = env.pattern_nodes.len();
        env.pattern_nodes.reserve(st.factnet.node_count as usize);
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
        let node_count = st.factnet.node_count as usize;
        let node_base = st.factnet.node_base;
        let expr_base = st.expr_base;
        let expr_count = st.expr_count;

        let resolve_link = move |raw: i64| -> ImageResult<Option<PatternNodeId>> {
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

        let mut nodes: Vec<FactPatternNode> = Vec::with_capacity(node_count);
        bload_and_refresh(
            src,
            st.alloc.as_mut(),
            node_count,
            NODE_RECORD_SIZE,
            &mut |buf, _| {
                let test = get_i64(buf, 32);
                let flags = get_u32(buf, 44);
                nodes.push(FactPatternNode {
                    next_level: resolve_link(get_i64(buf, 0))?,
                    last_level: resolve_link(get_i64(buf, 8))?,
                    left_node: resolve_link(get_i64(buf, 16))?,
                    right_node: resolve_link(get_i64(buf, 24))?,
                    which_field: get_u16(buf, 40),
                    which_slot: get_u16(buf, 42),
                    multifield_node: flags & NODE_MULTIFIELD != 0,
                    network_test: if test < 0 {
                        None
                    } else if (test as usize) < expr_count {
                        Some(ExprId::from_raw((expr_base + test as usize) as u32))
                    } else {
                        return Err(corrupt("expression", test));
                    },
                    bsave_id: -1,
                });
                Ok(())
            },
        )?;

        st.factnet.node_map = Vec::with_capacity(node_count);
        for node in nodes {
            st.factnet.node_map.push(env.alloc_pattern_node(node));
        }
        Ok(())
    }

    fn clear(&self, env: &mut Environment, st: &mut ImageState) {
        env.pattern_nodes.truncate(st.factnet.node_base);
        st.factnet = Default::default();
    }
}

fn link_index(env: &Environment, id: Option<PatternNodeId>) -> i64 {
    match id {
        None => -1,
        Some(id) => env.pattern_node(id).bsave_id,
    }
}
