//! Program fixtures shared by the integration tests.
#![allow(dead_code)]

use varobj_core::sim::SimTarget;
use varobj_core::types::{Access, BaseClass, Field, Layout, Type, TypeRef};
use varobj_core::{EvalContext, VarobjId, VarobjStore};

/// Route log output through the test harness. Safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

/// `struct pair { int a; int b; }`
pub fn pair_type(sim: &mut SimTarget) -> TypeRef {
    let int = sim.int_type();
    let pair = Type::structure(
        "struct pair",
        8,
        Layout::new(vec![Field::new("a", int.clone(), 0), Field::new("b", int, 4)]),
    );
    sim.add_type(&pair);
    pair
}

/// `struct outer { struct pair p; int n; }`
pub fn outer_type(sim: &mut SimTarget) -> TypeRef {
    let int = sim.int_type();
    let pair = pair_type(sim);
    let outer = Type::structure(
        "struct outer",
        12,
        Layout::new(vec![Field::new("p", pair, 0), Field::new("n", int, 8)]),
    );
    sim.add_type(&outer);
    outer
}

/// A global `int` holding `value`.
pub fn global_int(sim: &mut SimTarget, name: &str, value: i128) -> u64 {
    let int = sim.int_type();
    let address = sim.add_global(name, &int);
    sim.poke_int(address, 4, value).unwrap();
    address
}

/// A registered root for `expression` named after it.
pub fn root(store: &mut VarobjStore, sim: &mut SimTarget, expression: &str) -> VarobjId {
    store
        .create(sim, Some(expression), expression, EvalContext::CurrentFrame)
        .unwrap()
}

/// The C++ shapes hierarchy: `Shape` with a vtable and a public `id`, and
/// two classes derived from it with one private field each.
pub struct Shapes {
    pub shape: TypeRef,
    pub circle: TypeRef,
    pub square: TypeRef,
}

pub fn shapes(sim: &mut SimTarget) -> Shapes {
    let int = sim.int_type();
    let void = sim.lookup_type("void").unwrap();
    let shape = Type::structure(
        "Shape",
        16,
        Layout::new(vec![
            Field::new("_vptr.Shape", Type::pointer_to(&void), 0),
            Field::new("id", int.clone(), 8),
        ])
        .with_vptr(0),
    );
    let derived = |name: &str, field: &str| {
        Type::structure(
            name,
            24,
            Layout::new(vec![
                Field::new(field, int.clone(), 16).with_access(Access::Private)
            ])
            .with_bases(vec![BaseClass {
                ty: shape.clone(),
                offset: 0,
            }]),
        )
    };
    let circle = derived("Circle", "radius");
    let square = derived("Square", "side");
    for ty in [&shape, &circle, &square] {
        sim.add_type(ty);
    }
    Shapes {
        shape,
        circle,
        square,
    }
}

/// Allocate an object of `class`, register its dynamic type and set its
/// `id` field.
pub fn new_object(sim: &mut SimTarget, class: &TypeRef, id: i128) -> u64 {
    let address = sim.malloc(class.size());
    sim.poke_int(address + 8, 4, id).unwrap();
    sim.register_object(address, class);
    address
}

/// Set a pointer variable to `address`.
pub fn point(sim: &mut SimTarget, pointer: u64, address: u64) {
    sim.poke_int(pointer, 8, address as i128).unwrap();
}
