//! End-to-end save/load tests over real files.

use std::io::Write;
use std::path::Path;
use std::rc::Rc;

use rhizome_core::{
    preorder, ConstraintRecord, Environment, ExprKind, FactPatternNode, TemplateSlot,
};
use rhizome_image::{BinaryItem, ImageContext, ImageError, ImageResult, ImageState, SavedCounts};

/// Build an environment holding one `point` template: slot `x` with an
/// integer constraint and a default of 0, multislot `tags`, and a small
/// pattern network with a test expression calling `eq`.
fn sample_environment() -> Environment {
    let mut env = Environment::new();
    let eq = env.functions.register("eq");

    let point = env.new_deftemplate("point");

    let constraint = env.add_constraint(ConstraintRecord::integer_only());
    let zero = env.expr_integer(0);
    let x = env.atoms.intern_symbol("x");
    let mut slot = TemplateSlot::single(x);
    slot.constraints = Some(constraint);
    slot.default_present = true;
    slot.default_list = Some(zero);
    env.add_slot(point, slot);

    let tags = env.atoms.intern_symbol("tags");
    env.add_slot(point, TemplateSlot::multi(tags));

    let arg = env.expr_integer(7);
    let test = env.expr_call(eq, &[arg]);
    let mut root = FactPatternNode::new(0, 0);
    root.network_test = Some(test);
    let root = env.alloc_pattern_node(root);
    let mut child = FactPatternNode::new(1, 1);
    child.last_level = Some(root);
    child.multifield_node = true;
    let child = env.alloc_pattern_node(child);
    env.pattern_node_mut(root).next_level = Some(child);
    env.template_mut(point).pattern_network = Some(root);

    env
}

fn fresh_loader() -> Environment {
    let mut env = Environment::new();
    env.functions.register("eq");
    env
}

fn save_sample(path: &Path) {
    let mut env = sample_environment();
    let mut ctx = ImageContext::new();
    ctx.bsave(&mut env, path).unwrap();
}

#[test]
fn constructs_survive_a_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sample.bin");
    save_sample(&path);

    let mut env = fresh_loader();
    let mut ctx = ImageContext::new();
    ctx.bload(&mut env, &path).unwrap();
    assert!(ctx.bloaded());
    assert!(!env.diagnostics.has_errors());

    assert_eq!(env.number_of_deftemplates(), 1);
    let point = env.find_deftemplate("point").unwrap();
    let slots = env.slots_of(point);
    assert_eq!(slots.len(), 2);
    assert_eq!(env.template(point).slot_count, 2);

    let x = env.slot(slots[0]);
    assert_eq!(env.atoms.symbol_text(x.name), "x");
    assert!(!x.multislot);
    assert!(x.default_present);
    let constraint = env.constraints.get(x.constraints.unwrap());
    assert!(constraint.integers_allowed);
    assert!(constraint.singlefields_allowed);
    assert!(!constraint.any_allowed);

    let expected = env.expr_integer(0);
    let x = env.slot(slots[0]);
    assert!(env.exprs.trees_equal(x.default_list, Some(expected)));

    let tags = env.slot(slots[1]);
    assert_eq!(env.atoms.symbol_text(tags.name), "tags");
    assert!(tags.multislot);
    assert!(tags.default_list.is_none());

    let root = env.template(point).pattern_network.unwrap();
    let order: Vec<_> = preorder(&env.pattern_nodes, Some(root)).collect();
    assert_eq!(order.len(), 2);
    let root_node = env.pattern_node(order[0]);
    let eq = env.functions.find("eq").unwrap();
    let test = env.exprs.get(root_node.network_test.unwrap());
    assert_eq!(test.kind, ExprKind::FunctionCall(eq));
    let arg = env.exprs.get(test.arg_list.unwrap());
    let seven = env.atoms.intern_integer(7);
    assert_eq!(arg.kind, ExprKind::IntegerAtom(seven));
    let child_node = env.pattern_node(order[1]);
    assert_eq!(child_node.which_field, 1);
    assert_eq!(child_node.which_slot, 1);
    assert!(child_node.multifield_node);
    assert_eq!(child_node.last_level, Some(order[0]));
}

#[test]
fn empty_environment_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("empty.bin");

    let mut env = Environment::new();
    let mut ctx = ImageContext::new();
    ctx.bsave(&mut env, &path).unwrap();

    let mut env = Environment::new();
    let mut ctx = ImageContext::new();
    ctx.bload(&mut env, &path).unwrap();
    assert!(ctx.bloaded());
    assert_eq!(env.number_of_deftemplates(), 0);
    assert!(env.find_deftemplate("initial-fact").is_some());
    assert!(!env.diagnostics.has_errors());
}

#[test]
fn bitmap_at_the_format_limit_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bitmap.bin");

    let payload = [0x5Au8; 255];
    {
        let mut env = Environment::new();
        let flags = env.new_deftemplate("flags");
        let bitmap = env.atoms.intern_bitmap(&payload).unwrap();
        let default = env
            .exprs
            .alloc(rhizome_core::ExprNode::leaf(ExprKind::BitmapAtom(bitmap)));
        let mask = env.atoms.intern_symbol("mask");
        let mut slot = TemplateSlot::single(mask);
        slot.default_present = true;
        slot.default_list = Some(default);
        env.add_slot(flags, slot);

        let mut ctx = ImageContext::new();
        ctx.bsave(&mut env, &path).unwrap();
    }

    let mut env = Environment::new();
    let mut ctx = ImageContext::new();
    ctx.bload(&mut env, &path).unwrap();

    let flags = env.find_deftemplate("flags").unwrap();
    let slot = env.slot(env.slots_of(flags)[0]);
    let node = env.exprs.get(slot.default_list.unwrap());
    match node.kind {
        ExprKind::BitmapAtom(id) => assert_eq!(env.atoms.bitmap_bytes(id), &payload[..]),
        other => panic!("expected a bit map default, got {other:?}"),
    }
}

#[test]
fn save_while_loaded_is_refused_without_creating_a_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sample.bin");
    save_sample(&path);

    let mut env = fresh_loader();
    let mut ctx = ImageContext::new();
    ctx.bload(&mut env, &path).unwrap();

    let second = dir.path().join("second.bin");
    let result = ctx.bsave(&mut env, &second);
    assert!(matches!(result, Err(ImageError::SaveWhileLoaded)));
    assert!(!second.exists());
    assert!(env.diagnostics.find("BSAVE", 1).is_some());
}

#[test]
fn loading_twice_replaces_the_first_image() {
    let dir = tempfile::tempdir().unwrap();
    let first = dir.path().join("first.bin");
    save_sample(&first);

    let second = dir.path().join("second.bin");
    {
        let mut env = Environment::new();
        env.new_deftemplate("marker");
        let mut ctx = ImageContext::new();
        ctx.bsave(&mut env, &second).unwrap();
    }

    let mut env = fresh_loader();
    let mut ctx = ImageContext::new();
    ctx.bload(&mut env, &first).unwrap();
    assert!(env.find_deftemplate("point").is_some());

    ctx.bload(&mut env, &second).unwrap();
    assert!(env.find_deftemplate("point").is_none());
    assert!(env.find_deftemplate("marker").is_some());
    assert_eq!(env.number_of_deftemplates(), 1);
}

#[test]
fn clear_bload_releases_everything() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sample.bin");
    save_sample(&path);

    let mut env = fresh_loader();
    let mut ctx = ImageContext::new();
    ctx.bload(&mut env, &path).unwrap();
    let expr_count_loaded = env.exprs.len();
    assert!(expr_count_loaded > 0);

    ctx.clear_bload(&mut env).unwrap();
    assert!(!ctx.bloaded());
    assert_eq!(env.number_of_deftemplates(), 0);
    assert!(env.find_deftemplate("initial-fact").is_some());
    assert!(env.exprs.len() < expr_count_loaded);
    assert_eq!(env.constraints.len(), 0);
    assert!(env.pattern_nodes.is_empty());

    // Clearing again is a no-op.
    ctx.clear_bload(&mut env).unwrap();
}

struct Pinned;

impl BinaryItem for Pinned {
    fn type_name(&self) -> &'static str {
        "pinned"
    }

    fn clear_ready(&self, _env: &Environment, _st: &ImageState) -> bool {
        false
    }
}

#[test]
fn a_busy_item_blocks_clearing_and_reloading() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sample.bin");
    save_sample(&path);

    let mut env = fresh_loader();
    let mut ctx = ImageContext::new();
    ctx.add_binary_item(0, Rc::new(Pinned));
    ctx.bload(&mut env, &path).unwrap();

    let result = ctx.clear_bload(&mut env);
    assert!(matches!(result, Err(ImageError::ClearFailed)));
    assert!(ctx.bloaded());
    assert!(env.diagnostics.find("BLOAD", 1).is_some());

    // A new load needs the old image released first, so it fails the
    // same way and the loaded constructs stay put.
    let result = ctx.bload(&mut env, &path);
    assert!(matches!(result, Err(ImageError::ClearFailed)));
    assert!(env.find_deftemplate("point").is_some());
}

#[test]
fn header_rejection_leaves_the_environment_alone() {
    let dir = tempfile::tempdir().unwrap();
    let garbage = dir.path().join("garbage.bin");
    std::fs::write(&garbage, b"definitely not an image").unwrap();

    let mut env = Environment::new();
    env.new_deftemplate("survivor");
    let mut ctx = ImageContext::new();

    let result = ctx.bload(&mut env, &garbage);
    assert!(matches!(result, Err(ImageError::NotBinaryFile)));
    assert!(env.diagnostics.find("BLOAD", 2).is_some());
    assert!(env.find_deftemplate("survivor").is_some());

    // Right prefix, wrong version.
    let stale = dir.path().join("stale.bin");
    let mut bytes = rhizome_image::IMAGE_PREFIX.to_vec();
    bytes.extend_from_slice(b"V6.29\0");
    std::fs::write(&stale, bytes).unwrap();

    let result = ctx.bload(&mut env, &stale);
    assert!(matches!(result, Err(ImageError::IncompatibleVersion)));
    assert!(env.diagnostics.find("BLOAD", 3).is_some());
    assert!(env.find_deftemplate("survivor").is_some());
}

#[test]
fn missing_functions_abort_after_clearing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sample.bin");
    save_sample(&path);

    // No `eq` registered here.
    let mut env = Environment::new();
    env.new_deftemplate("doomed");
    let mut ctx = ImageContext::new();
    ctx.add_abort_bload("note-abort", 0, |env| {
        env.diagnostics.warning("TEST", 100, "abort hook ran");
    });

    let result = ctx.bload(&mut env, &path);
    match result {
        Err(ImageError::MissingFunctions(names)) => {
            assert_eq!(names, ["eq"]);
        }
        other => panic!("expected missing functions, got {other:?}"),
    }
    assert!(env.diagnostics.find("BLOAD", 6).is_some());
    assert!(env.diagnostics.find("TEST", 100).is_some());
    assert!(!ctx.bloaded());
    // The environment was already cleared when resolution failed.
    assert!(env.find_deftemplate("doomed").is_none());
}

#[test]
fn before_and_after_hooks_run_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sample.bin");
    save_sample(&path);

    let mut env = fresh_loader();
    let mut ctx = ImageContext::new();
    ctx.add_before_bload("note-before", 0, |env| {
        env.diagnostics.warning("TEST", 1, "before");
    });
    ctx.add_after_bload("note-after", 0, |env| {
        env.diagnostics.warning("TEST", 2, "after");
    });
    ctx.bload(&mut env, &path).unwrap();

    let codes: Vec<u32> = env
        .diagnostics
        .iter()
        .filter(|d| d.module == "TEST")
        .map(|d| d.code)
        .collect();
    assert_eq!(codes, [1, 2]);
}

/// Item that contributes an opaque storage block no loader knows about.
struct Extra {
    bytes: usize,
}

impl BinaryItem for Extra {
    fn type_name(&self) -> &'static str {
        "extra"
    }

    fn saves_storage(&self) -> bool {
        true
    }

    fn write_storage(
        &self,
        _env: &mut Environment,
        _st: &mut ImageState,
        out: &mut dyn Write,
    ) -> ImageResult<()> {
        out.write_all(&vec![0xAB; self.bytes])?;
        Ok(())
    }
}

#[test]
fn unknown_blocks_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("extra.bin");
    {
        let mut env = sample_environment();
        let mut ctx = ImageContext::new();
        ctx.add_binary_item(50, Rc::new(Extra { bytes: 4 }));
        ctx.bsave(&mut env, &path).unwrap();
    }

    let mut env = fresh_loader();
    let mut ctx = ImageContext::new();
    ctx.bload(&mut env, &path).unwrap();
    assert!(ctx.bloaded());
    assert!(env.diagnostics.find("BLOAD", 5).is_some());
    assert!(env.find_deftemplate("point").is_some());
}

#[test]
fn empty_unknown_blocks_skip_silently() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("extra.bin");
    {
        let mut env = sample_environment();
        let mut ctx = ImageContext::new();
        ctx.add_binary_item(50, Rc::new(Extra { bytes: 0 }));
        ctx.bsave(&mut env, &path).unwrap();
    }

    let mut env = fresh_loader();
    let mut ctx = ImageContext::new();
    ctx.bload(&mut env, &path).unwrap();
    assert!(ctx.bloaded());
    assert!(env.diagnostics.find("BLOAD", 5).is_none());
}

#[test]
fn saved_counts_queue_is_first_in_first_out() {
    let mut counts = SavedCounts::default();
    counts.push(true, 3);
    counts.push(true, 9);
    counts.push(false, 77);
    assert_eq!(counts.len(), 2);

    let mut a = 0;
    let mut b = 0;
    counts.pop_into(true, &mut a);
    counts.pop_into(true, &mut b);
    assert_eq!((a, b), (3, 9));

    let mut untouched = -1;
    counts.pop_into(false, &mut untouched);
    assert_eq!(untouched, -1);
    assert!(counts.is_empty());
}
