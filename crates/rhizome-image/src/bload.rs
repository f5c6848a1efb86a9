//! The binary load driver.
//!
//! Validates the image header, releases whatever was loaded before,
//! clears the environment, then reads the sections back in save order,
//! dispatching tagged blocks to the registered codecs by name. Blocks
//! with no registered loader are skipped over their recorded byte length.
//!
//! Function resolution is the one failure that runs the abort hooks: by
//! then the environment has already been cleared, so embedders get a
//! chance to rebuild what they had. Header rejections happen before
//! anything was touched and abort silently.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use rhizome_core::{Environment, FunctionId};

use crate::atom_codec;
use crate::constraint_codec;
use crate::context::ImageContext;
use crate::expr_codec;
use crate::io::{
    footer_tag, read_exact_vec, read_tag, read_u64, tag_name, ImageSource, IMAGE_PREFIX,
    IMAGE_VERSION,
};
use crate::{ImageError, ImageResult};

impl ImageContext {
    /// Load a binary image from `path`, replacing the environment's
    /// constructs.
    pub fn bload(&mut self, env: &mut Environment, path: &Path) -> ImageResult<()> {
        let file = File::open(path)?;
        let mut src = BufReader::new(file);
        self.bload_from(env, &mut src)
    }

    /// Load a binary image from an arbitrary seekable source.
    pub fn bload_from(
        &mut self,
        env: &mut Environment,
        src: &mut dyn ImageSource,
    ) -> ImageResult<()> {
        let mut prefix = [0u8; IMAGE_PREFIX.len()];
        src.read_exact(&mut prefix)?;
        if &prefix != IMAGE_PREFIX {
            env.diagnostics
                .error("BLOAD", 2, "file is not a binary construct file");
            return Err(ImageError::NotBinaryFile);
        }

        let mut version = [0u8; IMAGE_VERSION.len()];
        src.read_exact(&mut version)?;
        if &version != IMAGE_VERSION {
            env.diagnostics.error(
                "BLOAD",
                3,
                "file is an incompatible binary construct file version",
            );
            return Err(ImageError::IncompatibleVersion);
        }

        if self.state.active {
            self.clear_bload(env)?;
        }

        if !env.clear_ready() {
            env.diagnostics.error(
                "BLOAD",
                7,
                "the environment could not be cleared for the binary load",
            );
            return Err(ImageError::EnvironmentNotReady);
        }
        env.clear_constructs();

        self.before_bload.run(env);

        match read_needed_functions(env, src)? {
            Ok(functions) => self.state.functions = functions,
            Err(missing) => {
                env.diagnostics.error(
                    "BLOAD",
                    6,
                    format!(
                        "the binary image references undefined functions: {}",
                        missing.join(", ")
                    ),
                );
                self.abort_bload.run(env);
                return Err(ImageError::MissingFunctions(missing));
            }
        }

        let st = &mut self.state;
        let items = self.registry.snapshot();

        atom_codec::read_needed_atoms(env, st, src)?;

        let expression_count = read_u64(src)? as usize;
        expr_codec::allocate_expressions(env, st, expression_count);

        // Storage blocks, terminated by a footer tag.
        loop {
            let tag = read_tag(src)?;
            if tag == footer_tag() {
                break;
            }
            let space = read_u64(src)?;
            let name = tag_name(&tag);
            match items.iter().find(|e| e.name == name) {
                Some(entry) if entry.item.loads_storage() => {
                    entry.item.read_storage(env, st, src)?;
                }
                _ => {
                    skip_block(env, src, &name, space)?;
                }
            }
        }

        expr_codec::read_expressions(env, st, src)?;
        constraint_codec::read_constraints(env, st, src)?;

        // Data blocks, same framing.
        loop {
            let tag = read_tag(src)?;
            if tag == footer_tag() {
                break;
            }
            let space = read_u64(src)?;
            let name = tag_name(&tag);
            match items.iter().find(|e| e.name == name) {
                Some(entry) if entry.item.loads_data() => {
                    entry.item.read_data(env, st, src)?;
                }
                _ => {
                    skip_block(env, src, &name, space)?;
                }
            }
        }

        st.free_load_temporaries();
        st.active = true;

        self.after_bload.run(env);
        Ok(())
    }

    /// Release the active binary image.
    ///
    /// Every registered codec is asked first; if any refuses, nothing is
    /// released and the image stays active.
    pub fn clear_bload(&mut self, env: &mut Environment) -> ImageResult<()> {
        if !self.state.active {
            return Ok(());
        }

        let items = self.registry.snapshot();
        let busy: Vec<&str> = items
            .iter()
            .filter(|e| !e.item.clear_ready(env, &self.state))
            .map(|e| e.name)
            .collect();
        if !busy.is_empty() {
            env.diagnostics.error(
                "BLOAD",
                1,
                format!(
                    "the binary image cannot be cleared while in use: {}",
                    busy.join(", ")
                ),
            );
            return Err(ImageError::ClearFailed);
        }

        let st = &mut self.state;
        for entry in &items {
            entry.item.clear(env, st);
        }
        expr_codec::release_bloaded_expressions(env, st);
        constraint_codec::release_bloaded_constraints(env, st);
        st.active = false;
        Ok(())
    }
}

/// Seek past an unloadable block. A zero-length block is skipped
/// silently; anything with content gets a warning so the loss is visible.
fn skip_block(
    env: &mut Environment,
    src: &mut dyn ImageSource,
    name: &str,
    space: u64,
) -> ImageResult<()> {
    if space > 0 {
        env.diagnostics.warning(
            "BLOAD",
            5,
            format!("binary block `{name}` has no registered loader and will be skipped"),
        );
    }
    src.seek(SeekFrom::Current(space as i64))?;
    Ok(())
}

/// Read the needed-function table and resolve every name against the
/// live registry. Resolution is all-or-nothing: every missing name is
/// collected before the load gives up.
fn read_needed_functions(
    env: &mut Environment,
    src: &mut dyn ImageSource,
) -> ImageResult<Result<Vec<FunctionId>, Vec<String>>> {
    let count = read_u64(src)? as usize;
    let size = read_u64(src)? as usize;
    let blob = read_exact_vec(src, size)?;

    let mut functions = Vec::with_capacity(count);
    let mut missing = Vec::new();
    let mut at = 0;
    for _ in 0..count {
        if at >= blob.len() {
            return Err(crate::io::truncated("function"));
        }
        let end = blob[at..]
            .iter()
            .position(|&b| b == 0)
            .map(|p| at + p)
            .unwrap_or(blob.len());
        let name = String::from_utf8_lossy(&blob[at..end]).into_owned();
        match env.functions.find(&name) {
            Some(id) => functions.push(id),
            None => missing.push(name),
        }
        at = end + 1;
    }

    if missing.is_empty() {
        Ok(Ok(functions))
    } else {
        Ok(Err(missing))
    }
}
