//! Registry ordering tests.

use std::rc::Rc;

use rhizome_core::Environment;

use crate::registry::{BinaryItem, BinaryRegistry, HookList};

struct Named(&'static str);

impl BinaryItem for Named {
    fn type_name(&self) -> &'static str {
        self.0
    }
}

fn names(registry: &BinaryRegistry) -> Vec<&'static str> {
    registry.snapshot().iter().map(|e| e.name).collect()
}

#[test]
fn entries_sort_by_descending_priority() {
    let mut registry = BinaryRegistry::new();
    registry.add(0, Rc::new(Named("low")));
    registry.add(100, Rc::new(Named("high")));
    registry.add(50, Rc::new(Named("mid")));
    assert_eq!(names(&registry), ["high", "mid", "low"]);
}

#[test]
fn equal_priorities_order_newest_first() {
    let mut registry = BinaryRegistry::new();
    registry.add(5, Rc::new(Named("a")));
    registry.add(10, Rc::new(Named("b")));
    registry.add(5, Rc::new(Named("c")));
    registry.add(1, Rc::new(Named("d")));
    assert_eq!(names(&registry), ["b", "c", "a", "d"]);
}

#[test]
fn find_by_name() {
    let mut registry = BinaryRegistry::new();
    registry.add(3, Rc::new(Named("one")));
    registry.add(7, Rc::new(Named("two")));
    assert_eq!(registry.find("one").map(|e| e.priority), Some(3));
    assert!(registry.find("three").is_none());
}

#[test]
fn hooks_run_in_priority_order() {
    let mut hooks = HookList::default();
    hooks.add("second", 10, |env| {
        env.diagnostics.warning("TEST", 2, "second");
    });
    hooks.add("first", 20, |env| {
        env.diagnostics.warning("TEST", 1, "first");
    });

    let mut env = Environment::new();
    hooks.run(&mut env);

    let codes: Vec<u32> = env.diagnostics.iter().map(|d| d.code).collect();
    assert_eq!(codes, [1, 2]);
}

#[test]
fn hook_removal_by_name() {
    let mut hooks = HookList::default();
    hooks.add("gone", 5, |env| {
        env.diagnostics.warning("TEST", 9, "should not run");
    });
    assert!(hooks.remove("gone"));
    assert!(!hooks.remove("gone"));

    let mut env = Environment::new();
    hooks.run(&mut env);
    assert!(env.diagnostics.is_empty());
}
