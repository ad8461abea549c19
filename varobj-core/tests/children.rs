mod common;

use common::{global_int, pair_type, root};
use varobj_core::safe;
use varobj_core::sim::SimTarget;
use varobj_core::target::ValueProvider;
use varobj_core::types::Type;
use varobj_core::{DisplayFormat, EvalContext, VarobjError, VarobjId, VarobjStore};

/// Evaluate `path` from scratch and read it as an integer.
fn eval_int(sim: &mut SimTarget, path: &str) -> i128 {
    let expr = sim.compile(path, None).unwrap();
    let mut value = sim.evaluate(&expr).unwrap();
    sim.fetch_lazy(&mut value).unwrap();
    value.as_i128().unwrap()
}

/// Whether `path`, evaluated from scratch, equals the stored value of `id`.
fn path_matches(sim: &mut SimTarget, store: &VarobjStore, id: VarobjId, path: &str) -> bool {
    let expr = sim.compile(path, None).unwrap();
    let fresh = sim.evaluate(&expr).unwrap();
    let cmp = safe::value_equal(sim, store.get(id).value(), Some(&fresh));
    cmp.equal && !cmp.new_errored
}

#[test]
fn struct_fields_and_assignment() {
    let mut sim = SimTarget::new();
    let pair = pair_type(&mut sim);
    sim.add_global("x", &pair);
    let mut store = VarobjStore::new();

    let x = root(&mut store, &mut sim, "x");
    assert_eq!(store.get_num_children(x), Some(2));
    assert_eq!(store.get_value(x).as_deref(), Some("{...}"));
    assert!(!store.editable(x));

    let children = store.list_children(&mut sim, x).unwrap();
    let a = children[0];
    assert_eq!(store.get_expression(a), "a");
    assert_eq!(store.get_objname(a), Some("x.a"));
    assert_eq!(store.path_expr(a), "(x).a");
    assert_eq!(store.get_type(a).as_deref(), Some("int"));
    assert_eq!(store.get_value(a).as_deref(), Some("0"));
    assert!(store.editable(a));
    assert_eq!(store.attributes(a).bits(), 1);

    store.set_value(&mut sim, a, "5").unwrap();
    assert_eq!(store.get_value(a).as_deref(), Some("5"));
    assert_eq!(eval_int(&mut sim, "x.a"), 5);

    let status = store.update(&mut sim, x).unwrap();
    let changes = status.into_changes();
    assert_eq!(changes.len(), 1);
    assert!(changes.contains(a));
}

#[test]
fn child_count_is_stable() {
    let mut sim = SimTarget::new();
    let int = sim.int_type();
    let array = Type::array_of(&int, Some(4));
    sim.add_global("arr", &array);
    let mut store = VarobjStore::new();

    let arr = root(&mut store, &mut sim, "arr");
    assert_eq!(store.get_num_children(arr), Some(4));
    assert_eq!(store.get_value(arr).as_deref(), Some("[4]"));
    let first = store.list_children(&mut sim, arr).unwrap();
    let second = store.list_children(&mut sim, arr).unwrap();
    assert_eq!(first, second);
    assert_eq!(store.get_num_children(arr), Some(4));
    assert_eq!(store.get_objname(first[3]), Some("arr.3"));
}

#[test]
fn path_expressions_evaluate_to_the_child() {
    let mut sim = SimTarget::new();
    let int = sim.int_type();
    let pair = pair_type(&mut sim);

    let s = sim.add_global("s", &pair);
    sim.poke_int(s, 4, 11).unwrap();
    sim.poke_int(s + 4, 4, 12).unwrap();

    let arr = sim.add_global("arr", &Type::array_of(&int, Some(3)));
    for i in 0..3 {
        sim.poke_int(arr + 4 * i, 4, 20 + i as i128).unwrap();
    }

    let heap = sim.malloc(8);
    sim.poke_int(heap, 4, 31).unwrap();
    sim.poke_int(heap + 4, 4, 32).unwrap();
    let p = sim.add_global("p", &Type::pointer_to(&pair));
    sim.poke_int(p, 8, heap as i128).unwrap();

    let ip = sim.add_global("ip", &Type::pointer_to(&int));
    sim.poke_int(ip, 8, (arr + 8) as i128).unwrap();

    let mut store = VarobjStore::new();
    for expression in ["s", "arr", "p", "ip"] {
        let obj = root(&mut store, &mut sim, expression);
        for child in store.list_children(&mut sim, obj).unwrap() {
            let path = store.path_expr(child);
            assert!(path_matches(&mut sim, &store, child, &path), "{}", path);
        }
    }

    let p = store.lookup("p").unwrap();
    let fields = store.list_children(&mut sim, p).unwrap();
    assert_eq!(store.path_expr(fields[1]), "(p)->b");
    assert_eq!(store.get_value(fields[1]).as_deref(), Some("32"));

    let ip = store.lookup("ip").unwrap();
    let pointee = store.list_children(&mut sim, ip).unwrap();
    assert_eq!(store.get_expression(pointee[0]), "*ip");
    assert_eq!(store.path_expr(pointee[0]), "*(ip)");
    assert_eq!(store.get_value(pointee[0]).as_deref(), Some("22"));
}

#[test]
fn unreadable_pointee_marks_the_child_in_error() {
    let mut sim = SimTarget::new();
    let int = sim.int_type();
    sim.add_global("ip", &Type::pointer_to(&int));
    let mut store = VarobjStore::new();

    let ip = root(&mut store, &mut sim, "ip");
    assert_eq!(store.get_value(ip).as_deref(), Some("0x0"));
    let children = store.list_children(&mut sim, ip).unwrap();
    let pointee = store.get(children[0]);
    assert!(pointee.error());
    assert!(pointee.value().is_none());
    assert_eq!(store.get_value(children[0]), None);
    assert!(matches!(
        store.set_value(&mut sim, children[0], "1"),
        Err(VarobjError::NotEditable)
    ));
}

#[test]
fn unknown_child_count_cannot_be_listed() {
    let mut sim = SimTarget::new();
    let mut store = VarobjStore::new();

    // Only resolvable once a frame that knows `w` is selected.
    let w = store
        .create(&mut sim, Some("w"), "w", EvalContext::SelectedFrame)
        .unwrap();
    assert_eq!(store.get_num_children(w), None);
    assert_eq!(store.get_type(w).as_deref(), Some("<error getting type>"));
    assert_eq!(store.get_value(w), None);
    assert!(matches!(
        store.list_children(&mut sim, w),
        Err(VarobjError::UnknownChildCount { .. })
    ));
}

#[test]
fn display_format_applies_to_the_value() {
    let mut sim = SimTarget::new();
    global_int(&mut sim, "x", 255);
    let mut store = VarobjStore::new();

    let x = root(&mut store, &mut sim, "x");
    assert_eq!(store.format(x), DisplayFormat::Natural);
    store.set_format(x, DisplayFormat::Hexadecimal);
    assert_eq!(store.get_value(x).as_deref(), Some("0xff"));
    store.set_format(x, DisplayFormat::Binary);
    assert_eq!(store.get_value(x).as_deref(), Some("11111111"));
}

#[test]
fn assignment_rejects_bad_input() {
    let mut sim = SimTarget::new();
    global_int(&mut sim, "x", 1);
    let pair = pair_type(&mut sim);
    sim.add_global("s", &pair);
    let mut store = VarobjStore::new();

    let x = root(&mut store, &mut sim, "x");
    assert!(matches!(
        store.set_value(&mut sim, x, "1 +"),
        Err(VarobjError::Parse { .. })
    ));
    assert!(matches!(
        store.set_value(&mut sim, x, "s"),
        Err(VarobjError::Assign { .. })
    ));
    assert_eq!(store.get_value(x).as_deref(), Some("1"));

    let s = root(&mut store, &mut sim, "s");
    assert!(matches!(
        store.set_value(&mut sim, s, "1"),
        Err(VarobjError::NotEditable)
    ));
}
