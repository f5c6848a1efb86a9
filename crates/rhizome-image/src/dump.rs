//! Human-readable image inspection.
//!
//! Walks an image's framing without an environment: section counts, the
//! tag and byte length of every block, and nothing of the payloads. Meant
//! for debugging image files, not for validating their contents.

use std::io::{Seek, SeekFrom, Write};

use crate::constraint_codec::CONSTRAINT_RECORD_SIZE;
use crate::expr_codec::EXPR_RECORD_SIZE;
use crate::io::{
    footer_tag, read_tag, read_u64, tag_name, ImageSource, IMAGE_PREFIX, IMAGE_VERSION,
};
use crate::{ImageError, ImageResult};

/// Write one line per image section to `out`.
pub fn dump(src: &mut dyn ImageSource, out: &mut dyn Write) -> ImageResult<()> {
    use std::io::Read;

    let mut prefix = [0u8; IMAGE_PREFIX.len()];
    src.read_exact(&mut prefix)?;
    if &prefix != IMAGE_PREFIX {
        return Err(ImageError::NotBinaryFile);
    }
    let mut version = [0u8; IMAGE_VERSION.len()];
    src.read_exact(&mut version)?;
    let version_text = String::from_utf8_lossy(&version[..version.len() - 1]).into_owned();
    writeln!(out, "binary image, version {version_text}")?;
    if &version != IMAGE_VERSION {
        return Err(ImageError::IncompatibleVersion);
    }

    let function_count = read_u64(src)?;
    let function_bytes = read_u64(src)?;
    src.seek(SeekFrom::Current(function_bytes as i64))?;
    writeln!(out, "functions: {function_count}")?;

    let symbol_count = read_u64(src)?;
    let symbol_bytes = read_u64(src)?;
    src.seek(SeekFrom::Current(symbol_bytes as i64))?;
    writeln!(out, "symbols: {symbol_count} ({symbol_bytes} bytes)")?;

    let float_count = read_u64(src)?;
    src.seek(SeekFrom::Current(float_count as i64 * 8))?;
    writeln!(out, "floats: {float_count}")?;

    let integer_count = read_u64(src)?;
    src.seek(SeekFrom::Current(integer_count as i64 * 8))?;
    writeln!(out, "integers: {integer_count}")?;

    let bitmap_count = read_u64(src)?;
    let bitmap_bytes = read_u64(src)?;
    src.seek(SeekFrom::Current(bitmap_bytes as i64))?;
    writeln!(out, "bit maps: {bitmap_count} ({bitmap_bytes} bytes)")?;

    let expression_count = read_u64(src)?;
    writeln!(out, "expressions: {expression_count}")?;

    loop {
        let tag = read_tag(src)?;
        if tag == footer_tag() {
            break;
        }
        let space = read_u64(src)?;
        src.seek(SeekFrom::Current(space as i64))?;
        writeln!(out, "storage block: {} ({space} bytes)", tag_name(&tag))?;
    }

    src.seek(SeekFrom::Current(
        expression_count as i64 * EXPR_RECORD_SIZE as i64,
    ))?;

    let constraint_count = read_u64(src)?;
    src.seek(SeekFrom::Current(
        constraint_count as i64 * CONSTRAINT_RECORD_SIZE as i64,
    ))?;
    writeln!(out, "constraints: {constraint_count}")?;

    loop {
        let tag = read_tag(src)?;
        if tag == footer_tag() {
            break;
        }
        let space = read_u64(src)?;
        src.seek(SeekFrom::Current(space as i64))?;
        writeln!(out, "data block: {} ({space} bytes)", tag_name(&tag))?;
    }

    writeln!(out, "end of image")?;
    Ok(())
}
