//! The binary save driver.
//!
//! Runs the two-pass protocol over every registered construct codec:
//! first the find and mark passes (dense index assignment, needed flags),
//! then the write passes producing the image sections in their fixed
//! order. Each tagged block is buffered so its byte length lands between
//! the tag and the payload; load-time skipping of unknown blocks depends
//! on that length.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use rhizome_core::Environment;

use crate::atom_codec;
use crate::constraint_codec;
use crate::context::ImageContext;
use crate::expr_codec;
use crate::io::{write_footer, write_tag, write_u8, write_u64, IMAGE_PREFIX, IMAGE_VERSION};
use crate::{ImageError, ImageResult};

impl ImageContext {
    /// Save the environment's constructs as a binary image at `path`.
    ///
    /// Refused while a loaded image is active; no file is created in that
    /// case.
    pub fn bsave(&mut self, env: &mut Environment, path: &Path) -> ImageResult<()> {
        if self.state.active {
            env.diagnostics.error(
                "BSAVE",
                1,
                "cannot perform a binary save while a binary load is in effect",
            );
            return Err(ImageError::SaveWhileLoaded);
        }
        let file = File::create(path)?;
        let mut out = BufWriter::new(file);
        self.bsave_to(env, &mut out)?;
        out.flush()?;
        Ok(())
    }

    /// Save to an arbitrary writer. Same protocol, same refusal while an
    /// image is active.
    pub fn bsave_to(&mut self, env: &mut Environment, out: &mut dyn Write) -> ImageResult<()> {
        if self.state.active {
            env.diagnostics.error(
                "BSAVE",
                1,
                "cannot perform a binary save while a binary load is in effect",
            );
            return Err(ImageError::SaveWhileLoaded);
        }

        // The find passes run relative to a fixed module context.
        let saved_module = env.current_module();
        let result = self.write_image(env, out);

        atom_codec::restore_atom_buckets(env);
        env.set_current_module(saved_module);
        result
    }

    fn write_image(&mut self, env: &mut Environment, out: &mut dyn Write) -> ImageResult<()> {
        let st = &mut self.state;
        let items = self.registry.snapshot();

        out.write_all(IMAGE_PREFIX)?;
        out.write_all(IMAGE_VERSION)?;

        st.begin_save();
        atom_codec::init_needed_flags(env);

        for entry in &items {
            entry.item.find(env, st);
        }
        constraint_codec::find_constraints(env);

        for entry in &items {
            entry.item.mark_expressions(env, st);
        }
        expr_codec::mark_constraint_expressions(env, st);

        write_needed_functions(env, out)?;
        atom_codec::write_needed_atoms(env, out)?;
        write_u64(out, st.expression_count)?;

        let mut block = Vec::new();
        for entry in &items {
            if !entry.item.saves_storage() {
                continue;
            }
            block.clear();
            entry.item.write_storage(env, st, &mut block)?;
            write_tag(out, entry.name)?;
            write_u64(out, block.len() as u64)?;
            out.write_all(&block)?;
        }
        write_footer(out)?;

        expr_codec::write_expressions(env, st, out)?;
        constraint_codec::write_constraints(env, st, out)?;

        for entry in &items {
            if !entry.item.saves_data() {
                continue;
            }
            block.clear();
            entry.item.write_data(env, st, &mut block)?;
            write_tag(out, entry.name)?;
            write_u64(out, block.len() as u64)?;
            out.write_all(&block)?;
        }
        write_footer(out)?;

        Ok(())
    }
}

/// Write the needed-function table: a count, the total name bytes, then
/// the names NUL-terminated in dense index order.
fn write_needed_functions(env: &mut Environment, out: &mut dyn Write) -> ImageResult<()> {
    let needed = env.functions.needed_functions();
    let size: u64 = needed
        .iter()
        .map(|&id| env.functions.name(id).len() as u64 + 1)
        .sum();

    write_u64(out, needed.len() as u64)?;
    write_u64(out, size)?;
    for id in needed {
        out.write_all(env.functions.name(id).as_bytes())?;
        write_u8(out, 0)?;
    }
    Ok(())
}
