use crate::environment::Environment;
use crate::templates::TemplateSlot;

#[test]
fn fresh_environment_has_initial_fact_only() {
    let env = Environment::new();

    assert_eq!(env.number_of_deftemplates(), 0);
    assert!(env.find_deftemplate("initial-fact").is_some());
}

#[test]
fn slots_keep_declaration_order() {
    let mut env = Environment::new();
    let t = env.new_deftemplate("T");
    let a_name = env.atoms.intern_symbol("a");
    let b_name = env.atoms.intern_symbol("b");
    let a = env.add_slot(t, TemplateSlot::single(a_name));
    let b = env.add_slot(t, TemplateSlot::multi(b_name));

    assert_eq!(env.slots_of(t), vec![a, b]);
    assert_eq!(env.template(t).slot_count, 2);
    assert!(env.slot(b).multislot);
}

#[test]
fn template_names_are_retained() {
    let mut env = Environment::new();
    let t = env.new_deftemplate("T");
    let name = env.template(t).name;

    assert_eq!(env.atoms.symbol_refcount(name), 1);
    env.clear_constructs();
    assert_eq!(env.atoms.symbol_refcount(name), 0);
}

#[test]
fn clear_constructs_recreates_initial_fact() {
    let mut env = Environment::new();
    env.new_deftemplate("T");
    assert_eq!(env.number_of_deftemplates(), 1);

    env.clear_constructs();
    assert_eq!(env.number_of_deftemplates(), 0);
    assert!(env.find_deftemplate("initial-fact").is_some());
}

#[test]
fn clear_lock_blocks_readiness() {
    let mut env = Environment::new();
    assert!(env.clear_ready());
    env.set_clear_lock(true);
    assert!(!env.clear_ready());
    env.set_clear_lock(false);
    assert!(env.clear_ready());
}
