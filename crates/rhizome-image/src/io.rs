//! Stream primitives for the image format.
//!
//! All multi-byte integers are written in host byte order with no
//! endianness normalization; images are not portable across architectures
//! with differing endianness. Construct tags are exactly [`TAG_LEN`] bytes,
//! NUL-padded or truncated.

use std::io::{Read, Seek, Write};

use crate::{ImageError, ImageResult};

/// Fixed prefix identifying a binary image file: four control bytes, the
/// ASCII text `CLIPS`, and a terminating NUL.
pub const IMAGE_PREFIX: &[u8; 10] = b"\x01\x02\x03\x04CLIPS\0";

/// Version ID string. Loading rejects any image whose version bytes
/// differ from this build's.
pub const IMAGE_VERSION: &[u8; 6] = b"V6.30\0";

/// Fixed width of a construct tag.
pub const TAG_LEN: usize = 20;

/// Readable, seekable image input.
pub trait ImageSource: Read + Seek {}

impl<T: Read + Seek> ImageSource for T {}

/// Error for an on-disk index that does not resolve against the arrays
/// read earlier in the same load.
pub(crate) fn corrupt(what: &str, index: i64) -> ImageError {
    ImageError::Io(std::io::Error::new(
        std::io::ErrorKind::InvalidData,
        format!("binary image references {what} {index} which was not saved"),
    ))
}

/// Error for a variable-length table whose payload ends before its
/// declared entry count is satisfied.
pub(crate) fn truncated(section: &str) -> ImageError {
    ImageError::Io(std::io::Error::new(
        std::io::ErrorKind::InvalidData,
        format!("binary image {section} table is truncated"),
    ))
}

// ----------------------------------------------------------------------
// Stream writers

pub fn write_u8(out: &mut dyn Write, v: u8) -> ImageResult<()> {
    out.write_all(&[v])?;
    Ok(())
}

pub fn write_u16(out: &mut dyn Write, v: u16) -> ImageResult<()> {
    out.write_all(&v.to_ne_bytes())?;
    Ok(())
}

pub fn write_u32(out: &mut dyn Write, v: u32) -> ImageResult<()> {
    out.write_all(&v.to_ne_bytes())?;
    Ok(())
}

pub fn write_u64(out: &mut dyn Write, v: u64) -> ImageResult<()> {
    out.write_all(&v.to_ne_bytes())?;
    Ok(())
}

pub fn write_i64(out: &mut dyn Write, v: i64) -> ImageResult<()> {
    out.write_all(&v.to_ne_bytes())?;
    Ok(())
}

pub fn write_f64(out: &mut dyn Write, v: f64) -> ImageResult<()> {
    out.write_all(&v.to_ne_bytes())?;
    Ok(())
}

/// Write a construct tag: the name truncated to [`TAG_LEN`] bytes and
/// NUL-padded to exactly that width.
pub fn write_tag(out: &mut dyn Write, name: &str) -> ImageResult<()> {
    let mut tag = [0u8; TAG_LEN];
    let bytes = name.as_bytes();
    let n = bytes.len().min(TAG_LEN);
    tag[..n].copy_from_slice(&bytes[..n]);
    out.write_all(&tag)?;
    Ok(())
}

/// The footer marker: a tag slot holding the prefix ID bytes.
pub fn footer_tag() -> [u8; TAG_LEN] {
    let mut tag = [0u8; TAG_LEN];
    tag[..IMAGE_PREFIX.len()].copy_from_slice(IMAGE_PREFIX);
    tag
}

pub fn write_footer(out: &mut dyn Write) -> ImageResult<()> {
    out.write_all(&footer_tag())?;
    Ok(())
}

// ----------------------------------------------------------------------
// Stream readers

pub fn read_u8(src: &mut dyn Read) -> ImageResult<u8> {
    let mut buf = [0u8; 1];
    src.read_exact(&mut buf)?;
    Ok(buf[0])
}

pub fn read_u16(src: &mut dyn Read) -> ImageResult<u16> {
    let mut buf = [0u8; 2];
    src.read_exact(&mut buf)?;
    Ok(u16::from_ne_bytes(buf))
}

pub fn read_u32(src: &mut dyn Read) -> ImageResult<u32> {
    let mut buf = [0u8; 4];
    src.read_exact(&mut buf)?;
    Ok(u32::from_ne_bytes(buf))
}

pub fn read_u64(src: &mut dyn Read) -> ImageResult<u64> {
    let mut buf = [0u8; 8];
    src.read_exact(&mut buf)?;
    Ok(u64::from_ne_bytes(buf))
}

pub fn read_i64(src: &mut dyn Read) -> ImageResult<i64> {
    let mut buf = [0u8; 8];
    src.read_exact(&mut buf)?;
    Ok(i64::from_ne_bytes(buf))
}

pub fn read_f64(src: &mut dyn Read) -> ImageResult<f64> {
    let mut buf = [0u8; 8];
    src.read_exact(&mut buf)?;
    Ok(f64::from_ne_bytes(buf))
}

pub fn read_exact_vec(src: &mut dyn Read, len: usize) -> ImageResult<Vec<u8>> {
    let mut buf = vec![0u8; len];
    src.read_exact(&mut buf)?;
    Ok(buf)
}

pub fn read_tag(src: &mut dyn Read) -> ImageResult<[u8; TAG_LEN]> {
    let mut tag = [0u8; TAG_LEN];
    src.read_exact(&mut tag)?;
    Ok(tag)
}

/// Name stored in a tag, up to the first NUL.
pub fn tag_name(tag: &[u8; TAG_LEN]) -> String {
    let end = tag.iter().position(|&b| b == 0).unwrap_or(TAG_LEN);
    String::from_utf8_lossy(&tag[..end]).into_owned()
}

// ----------------------------------------------------------------------
// Fixed-record slice accessors, used by the chunked bulk loader's
// per-record transforms.

pub fn get_u16(buf: &[u8], off: usize) -> u16 {
    u16::from_ne_bytes(buf[off..off + 2].try_into().unwrap())
}

pub fn get_u32(buf: &[u8], off: usize) -> u32 {
    u32::from_ne_bytes(buf[off..off + 4].try_into().unwrap())
}

pub fn get_i64(buf: &[u8], off: usize) -> i64 {
    i64::from_ne_bytes(buf[off..off + 8].try_into().unwrap())
}

pub fn get_u64(buf: &[u8], off: usize) -> u64 {
    u64::from_ne_bytes(buf[off..off + 8].try_into().unwrap())
}

pub fn get_f64(buf: &[u8], off: usize) -> f64 {
    f64::from_ne_bytes(buf[off..off + 8].try_into().unwrap())
}
