//! Stream primitive tests.

use std::io::Cursor;

use crate::io::{
    footer_tag, read_f64, read_i64, read_tag, read_u16, read_u32, read_u64, read_u8, tag_name,
    write_f64, write_i64, write_tag, write_u16, write_u32, write_u64, write_u8, IMAGE_PREFIX,
    TAG_LEN,
};

#[test]
fn scalar_round_trip() {
    let mut buf = Vec::new();
    write_u8(&mut buf, 7).unwrap();
    write_u16(&mut buf, 0xBEEF).unwrap();
    write_u32(&mut buf, 0xDEAD_BEEF).unwrap();
    write_u64(&mut buf, u64::MAX - 1).unwrap();
    write_i64(&mut buf, -42).unwrap();
    write_f64(&mut buf, 2.5).unwrap();

    let mut src = Cursor::new(buf);
    assert_eq!(read_u8(&mut src).unwrap(), 7);
    assert_eq!(read_u16(&mut src).unwrap(), 0xBEEF);
    assert_eq!(read_u32(&mut src).unwrap(), 0xDEAD_BEEF);
    assert_eq!(read_u64(&mut src).unwrap(), u64::MAX - 1);
    assert_eq!(read_i64(&mut src).unwrap(), -42);
    assert_eq!(read_f64(&mut src).unwrap(), 2.5);
}

#[test]
fn tag_is_nul_padded() {
    let mut buf = Vec::new();
    write_tag(&mut buf, "deftemplate").unwrap();
    assert_eq!(buf.len(), TAG_LEN);
    assert_eq!(&buf[..11], b"deftemplate");
    assert!(buf[11..].iter().all(|&b| b == 0));

    let tag = read_tag(&mut Cursor::new(buf)).unwrap();
    assert_eq!(tag_name(&tag), "deftemplate");
}

#[test]
fn overlong_tag_is_truncated() {
    let mut buf = Vec::new();
    write_tag(&mut buf, "a-construct-name-well-past-twenty-bytes").unwrap();
    assert_eq!(buf.len(), TAG_LEN);
    let tag = read_tag(&mut Cursor::new(buf)).unwrap();
    assert_eq!(tag_name(&tag).len(), TAG_LEN);
}

#[test]
fn footer_holds_prefix_bytes() {
    let tag = footer_tag();
    assert_eq!(&tag[..IMAGE_PREFIX.len()], IMAGE_PREFIX);
    assert!(tag[IMAGE_PREFIX.len()..].iter().all(|&b| b == 0));
}

#[test]
fn truncated_read_is_an_error() {
    let mut src = Cursor::new(vec![1u8, 2, 3]);
    assert!(read_u64(&mut src).is_err());
}
