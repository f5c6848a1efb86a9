//! Image dump tests.

use std::io::Cursor;

use rhizome_core::{Environment, TemplateSlot};

use crate::context::ImageContext;
use crate::dump::dump;
use crate::ImageError;

fn saved_image() -> Vec<u8> {
    let mut env = Environment::new();
    let point = env.new_deftemplate("point");
    let x = env.atoms.intern_symbol("x");
    let y = env.atoms.intern_symbol("y");
    env.add_slot(point, TemplateSlot::single(x));
    env.add_slot(point, TemplateSlot::single(y));

    let mut ctx = ImageContext::new();
    let mut buf = Vec::new();
    ctx.bsave_to(&mut env, &mut buf).unwrap();
    buf
}

#[test]
fn lists_every_section() {
    let image = saved_image();
    let mut out = Vec::new();
    dump(&mut Cursor::new(image), &mut out).unwrap();
    let text = String::from_utf8(out).unwrap();

    assert!(text.contains("version V6.30"));
    assert!(text.contains("storage block: factptn"));
    assert!(text.contains("storage block: deftemplate"));
    assert!(text.contains("data block: factptn"));
    assert!(text.contains("data block: deftemplate"));
    assert!(text.ends_with("end of image\n"));
}

#[test]
fn block_order_follows_registry_priority() {
    let image = saved_image();
    let mut out = Vec::new();
    dump(&mut Cursor::new(image), &mut out).unwrap();
    let text = String::from_utf8(out).unwrap();

    let factptn = text.find("storage block: factptn").unwrap();
    let deftemplate = text.find("storage block: deftemplate").unwrap();
    assert!(factptn < deftemplate);
}

#[test]
fn rejects_a_non_image_file() {
    let mut out = Vec::new();
    let result = dump(&mut Cursor::new(b"just some text".to_vec()), &mut out);
    assert!(matches!(result, Err(ImageError::NotBinaryFile)));
}
