//! Atom table codec.
//!
//! Serializes the four interned-value pools. Only entries marked needed
//! by the save-time mark pass are written; each gets a dense on-disk
//! index in pool-scan order. Loading interns every entry back and stores
//! the resulting handle positionally in the load-time
//! [`AtomValueArrays`](crate::state::AtomValueArrays).
//!
//! Variable-length pools (symbols, bit maps) are written as a count, a
//! total byte size, then the payload: NUL-terminated strings, or
//! single-byte-length-prefixed blobs. The one-byte length prefix caps a
//! bit map at 255 bytes; that limit is part of the format.

use std::io::Write;

use rhizome_core::{Environment, SymbolId};

use crate::io::{
    read_exact_vec, read_f64, read_i64, read_u64, truncated, write_f64, write_i64, write_u8,
    write_u64,
};
use crate::state::ImageState;
use crate::ImageResult;

/// Clear all needed flags and save indices. Must run before any mark pass.
pub fn init_needed_flags(env: &mut Environment) {
    env.atoms.reset_save_state();
    env.functions.reset_save_state();
}

/// Reset the pools' save-time bookkeeping after a save completes.
pub fn restore_atom_buckets(env: &mut Environment) {
    env.atoms.reset_save_state();
    env.functions.reset_save_state();
}

// ----------------------------------------------------------------------
// Save

pub fn write_needed_symbols(env: &mut Environment, out: &mut dyn Write) -> ImageResult<()> {
    let needed = env.atoms.needed_symbols();
    let size: u64 = needed
        .iter()
        .map(|&id| env.atoms.symbol_text(id).len() as u64 + 1)
        .sum();

    write_u64(out, needed.len() as u64)?;
    write_u64(out, size)?;
    for id in needed {
        out.write_all(env.atoms.symbol_text(id).as_bytes())?;
        write_u8(out, 0)?;
    }
    Ok(())
}

pub fn write_needed_floats(env: &mut Environment, out: &mut dyn Write) -> ImageResult<()> {
    let needed = env.atoms.needed_floats();
    write_u64(out, needed.len() as u64)?;
    for id in needed {
        write_f64(out, env.atoms.float_value(id))?;
    }
    Ok(())
}

pub fn write_needed_integers(env: &mut Environment, out: &mut dyn Write) -> ImageResult<()> {
    let needed = env.atoms.needed_integers();
    write_u64(out, needed.len() as u64)?;
    for id in needed {
        write_i64(out, env.atoms.integer_value(id))?;
    }
    Ok(())
}

pub fn write_needed_bitmaps(env: &mut Environment, out: &mut dyn Write) -> ImageResult<()> {
    let needed = env.atoms.needed_bitmaps();
    let size: u64 = needed
        .iter()
        .map(|&id| env.atoms.bitmap_bytes(id).len() as u64 + 1)
        .sum();

    write_u64(out, needed.len() as u64)?;
    write_u64(out, size)?;
    for id in needed {
        let bytes = env.atoms.bitmap_bytes(id).to_vec();
        debug_assert!(bytes.len() <= u8::MAX as usize);
        write_u8(out, bytes.len() as u8)?;
        out.write_all(&bytes)?;
    }
    Ok(())
}

/// Write all four pools in their fixed file order.
pub fn write_needed_atoms(env: &mut Environment, out: &mut dyn Write) -> ImageResult<()> {
    write_needed_symbols(env, out)?;
    write_needed_floats(env, out)?;
    write_needed_integers(env, out)?;
    write_needed_bitmaps(env, out)?;
    Ok(())
}

// ----------------------------------------------------------------------
// Load

pub fn read_needed_symbols(
    env: &mut Environment,
    st: &mut ImageState,
    src: &mut dyn std::io::Read,
) -> ImageResult<()> {
    let count = read_u64(src)? as usize;
    let size = read_u64(src)? as usize;
    let blob = read_exact_vec(src, size)?;

    let mut symbols: Vec<SymbolId> = Vec::with_capacity(count);
    let mut at = 0;
    for _ in 0..count {
        if at >= blob.len() {
            return Err(truncated("symbol"));
        }
        let end = blob[at..]
            .iter()
            .position(|&b| b == 0)
            .map(|p| at + p)
            .unwrap_or(blob.len());
        let text = String::from_utf8_lossy(&blob[at..end]);
        symbols.push(env.atoms.intern_symbol(&text));
        at = end + 1;
    }
    st.atoms.symbols = symbols;
    Ok(())
}

pub fn read_needed_floats(
    env: &mut Environment,
    st: &mut ImageState,
    src: &mut dyn std::io::Read,
) -> ImageResult<()> {
    let count = read_u64(src)? as usize;
    let mut floats = Vec::with_capacity(count);
    for _ in 0..count {
        let value = read_f64(src)?;
        floats.push(env.atoms.intern_float(value));
    }
    st.atoms.floats = floats;
    Ok(())
}

pub fn read_needed_integers(
    env: &mut Environment,
    st: &mut ImageState,
    src: &mut dyn std::io::Read,
) -> ImageResult<()> {
    let count = read_u64(src)? as usize;
    let mut integers = Vec::with_capacity(count);
    for _ in 0..count {
        let value = read_i64(src)?;
        integers.push(env.atoms.intern_integer(value));
    }
    st.atoms.integers = integers;
    Ok(())
}

pub fn read_needed_bitmaps(
    env: &mut Environment,
    st: &mut ImageState,
    src: &mut dyn std::io::Read,
) -> ImageResult<()> {
    let count = read_u64(src)? as usize;
    let size = read_u64(src)? as usize;
    let blob = read_exact_vec(src, size)?;

    let mut bitmaps = Vec::with_capacity(count);
    let mut at = 0;
    for _ in 0..count {
        if at >= blob.len() {
            return Err(truncated("bit map"));
        }
        let len = blob[at] as usize;
        if at + 1 + len > blob.len() {
            return Err(truncated("bit map"));
        }
        let bytes = &blob[at + 1..at + 1 + len];
        // The one-byte length prefix cannot exceed the intern limit.
        let id = match env.atoms.intern_bitmap(bytes) {
            Ok(id) => id,
            Err(_) => return Err(truncated("bit map")),
        };
        bitmaps.push(id);
        at += 1 + len;
    }
    st.atoms.bitmaps = bitmaps;
    Ok(())
}

/// Read all four pools in their fixed file order.
pub fn read_needed_atoms(
    env: &mut Environment,
    st: &mut ImageState,
    src: &mut dyn std::io::Read,
) -> ImageResult<()> {
    read_needed_symbols(env, st, src)?;
    read_needed_floats(env, st, src)?;
    read_needed_integers(env, st, src)?;
    read_needed_bitmaps(env, st, src)?;
    Ok(())
}
