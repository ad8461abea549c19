mod common;

use common::{global_int, outer_type, root};
use varobj_core::sim::SimTarget;
use varobj_core::{EvalContext, EvalError, VarobjConfig, VarobjError, VarobjStore};

#[test]
fn duplicate_names_are_rejected() {
    let mut sim = SimTarget::new();
    global_int(&mut sim, "x", 1);
    let mut store = VarobjStore::new();

    let first = store
        .create(&mut sim, Some("v"), "x", EvalContext::CurrentFrame)
        .unwrap();
    let err = store
        .create(&mut sim, Some("v"), "x", EvalContext::CurrentFrame)
        .unwrap_err();

    assert!(matches!(err, VarobjError::DuplicateName { ref name } if name == "v"));
    assert_eq!(store.lookup("v").unwrap(), first);
    assert_eq!(store.list_roots(), vec![first]);
    assert_eq!(store.len(), 1);
}

#[test]
fn roots_are_listed_most_recent_first() {
    let mut sim = SimTarget::new();
    global_int(&mut sim, "x", 1);
    global_int(&mut sim, "y", 2);
    let mut store = VarobjStore::new();

    let x = root(&mut store, &mut sim, "x");
    let y = root(&mut store, &mut sim, "y");
    assert_eq!(store.list_roots(), vec![y, x]);

    store.delete(y, false);
    assert_eq!(store.list_roots(), vec![x]);
}

#[test]
fn generated_names_skip_names_in_use() {
    let mut sim = SimTarget::new();
    global_int(&mut sim, "x", 1);
    let mut store = VarobjStore::new();

    assert_eq!(store.gen_name(), "var1");
    store
        .create(&mut sim, Some("var2"), "x", EvalContext::CurrentFrame)
        .unwrap();
    assert_eq!(store.gen_name(), "var3");
}

#[test]
fn generated_names_use_the_configured_prefix() {
    let config = VarobjConfig::from_toml_str("name_prefix = \"watch\"").unwrap();
    let mut store = VarobjStore::with_config(config);
    assert_eq!(store.gen_name(), "watch1");
}

#[test]
fn temporaries_are_not_registered() {
    let mut sim = SimTarget::new();
    global_int(&mut sim, "x", 3);
    let mut store = VarobjStore::new();

    let temp = store
        .create(&mut sim, None, "x", EvalContext::CurrentFrame)
        .unwrap();
    assert!(store.list_roots().is_empty());
    assert_eq!(store.get_objname(temp), None);
    assert_eq!(store.get_value(temp).as_deref(), Some("3"));
    assert!(store.delete(temp, false).is_empty());
    assert!(!store.contains(temp));
}

#[test]
fn type_names_are_not_expressions() {
    let mut sim = SimTarget::new();
    let mut store = VarobjStore::new();

    let err = store
        .create(&mut sim, Some("t"), "int", EvalContext::CurrentFrame)
        .unwrap_err();
    assert!(matches!(err, VarobjError::TypeName { .. }));
    let err = store
        .create(&mut sim, Some("t"), "unsigned int", EvalContext::CurrentFrame)
        .unwrap_err();
    assert!(matches!(err, VarobjError::TypeName { .. }));
    assert!(store.is_empty());
}

#[test]
fn multi_word_casts_compile() {
    let mut sim = SimTarget::new();
    global_int(&mut sim, "x", -1);
    let mut store = VarobjStore::new();

    let t = root(&mut store, &mut sim, "(unsigned int) x");
    assert_eq!(store.get_type(t).as_deref(), Some("unsigned int"));
    assert_eq!(store.get_value(t).as_deref(), Some("4294967295"));
}

#[test]
fn bad_expressions_fail_creation() {
    let mut sim = SimTarget::new();
    global_int(&mut sim, "x", 1);
    let mut store = VarobjStore::new();

    let err = store
        .create(&mut sim, Some("v"), "x +", EvalContext::CurrentFrame)
        .unwrap_err();
    assert!(matches!(err, VarobjError::Parse { .. }));

    let err = store
        .create(&mut sim, Some("v"), "nope", EvalContext::CurrentFrame)
        .unwrap_err();
    assert!(matches!(
        err,
        VarobjError::Parse {
            source: EvalError::UnknownSymbol { .. },
            ..
        }
    ));
    assert!(store.lookup("v").is_err());
}

#[test]
fn delete_lists_children_before_parents() {
    let mut sim = SimTarget::new();
    let outer = outer_type(&mut sim);
    sim.add_global("o", &outer);
    let mut store = VarobjStore::new();

    let o = root(&mut store, &mut sim, "o");
    let children = store.list_children(&mut sim, o).unwrap();
    store.list_children(&mut sim, children[0]).unwrap();
    assert_eq!(store.len(), 5);

    let deleted = store.delete(o, false);
    assert_eq!(deleted, vec!["o.p.a", "o.p.b", "o.p", "o.n", "o"]);
    for name in &deleted {
        assert!(matches!(
            store.lookup(name),
            Err(VarobjError::NotFound { .. })
        ));
    }
    assert!(store.is_empty());
    assert!(store.list_roots().is_empty());
}

#[test]
fn delete_children_only_keeps_the_object() {
    let mut sim = SimTarget::new();
    let outer = outer_type(&mut sim);
    sim.add_global("o", &outer);
    let mut store = VarobjStore::new();

    let o = root(&mut store, &mut sim, "o");
    let children = store.list_children(&mut sim, o).unwrap();
    store.list_children(&mut sim, children[0]).unwrap();

    let deleted = store.delete(o, true);
    assert_eq!(deleted, vec!["o.p.a", "o.p.b", "o.p", "o.n"]);
    assert_eq!(store.lookup("o").unwrap(), o);
    assert!(store.get(o).children().is_empty());

    // Listing again creates fresh children under the same names.
    let again = store.list_children(&mut sim, o).unwrap();
    assert_eq!(again.len(), 2);
    assert_eq!(store.lookup("o.n").unwrap(), again[1]);
}

#[test]
fn deleting_a_child_detaches_it_from_its_parent() {
    let mut sim = SimTarget::new();
    let outer = outer_type(&mut sim);
    sim.add_global("o", &outer);
    let mut store = VarobjStore::new();

    let o = root(&mut store, &mut sim, "o");
    let children = store.list_children(&mut sim, o).unwrap();
    assert_eq!(store.delete(children[1], false), vec!["o.n"]);
    assert_eq!(store.get(o).children().len(), 1);

    // The missing child is created again on the next listing.
    let again = store.list_children(&mut sim, o).unwrap();
    assert_eq!(again[0], children[0]);
    assert_ne!(again[1], children[1]);
}
