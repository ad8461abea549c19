//! C++
//!
//! Classes show their direct base classes first, followed by one synthetic
//! group per non-empty access level (public, private, protected in that
//! order). The fields live under the groups. Pointers and references to
//! classes are looked through. Everything else behaves as in C.

use crate::safe;
use crate::store::VarobjStore;
use crate::target::Target;
use crate::types::{check_typedef, target_type, Access, BaseClass, Field, Layout, TypeRef};
use crate::value::Value;
use crate::varobj::VarobjId;

use super::{LanguageStrategy, C};

#[derive(Debug, Clone, Copy, Default)]
pub struct Cplus;

/// Effective type of `obj` with one level of pointer or reference removed,
/// and whether one was removed.
fn type_deref(store: &VarobjStore, obj: VarobjId) -> Option<(TypeRef, bool)> {
    let ty = store.effective_type(obj)?;
    if ty.is_pointer_or_reference() {
        target_type(&ty).map(|target| (target, true))
    } else {
        Some((ty, false))
    }
}

/// The class an object's children come from, if it is one.
fn class_of(store: &VarobjStore, obj: VarobjId) -> Option<(TypeRef, bool)> {
    type_deref(store, obj).filter(|(ty, _)| ty.is_struct_or_union())
}

/// Access levels that have at least one data field, in display order.
fn groups(layout: Option<&Layout>) -> Vec<Access> {
    let Some(layout) = layout else {
        return Vec::new();
    };
    Access::ORDER
        .into_iter()
        .filter(|access| layout.count_with_access(*access) > 0)
        .collect()
}

fn base_count(class: &TypeRef) -> usize {
    class.layout().map_or(0, |layout| layout.bases.len())
}

fn base_at(class: &TypeRef, index: usize) -> Option<&BaseClass> {
    class.layout()?.bases.get(index)
}

/// The object whose class provides the fields of an access group.
fn group_owner(store: &VarobjStore, group: VarobjId) -> VarobjId {
    match store.get(group).parent() {
        Some(owner) => owner,
        None => panic!("access group \"{}\" has no parent", store.get(group).name()),
    }
}

/// The `index`th field shown under an access group, with whether the owning
/// object is a pointer.
fn grouped_field(
    store: &VarobjStore,
    group: VarobjId,
    access: Access,
    index: usize,
) -> (Field, bool) {
    let owner = group_owner(store, group);
    let Some((class, is_ptr)) = class_of(store, owner) else {
        panic!("access group under \"{}\", which is not a class", store.get(owner).name());
    };
    match class
        .layout()
        .and_then(|layout| layout.nth_with_access(access, index))
    {
        Some(field) => (field.clone(), is_ptr),
        None => panic!("class {} has no {} field {}", class, access, index),
    }
}

impl LanguageStrategy for Cplus {
    fn number_of_children(&self, store: &VarobjStore, obj: VarobjId) -> Option<usize> {
        if let Some(access) = store.get(obj).access_group() {
            let (class, _) = class_of(store, group_owner(store, obj))?;
            return Some(class.layout().map_or(0, |layout| layout.count_with_access(access)));
        }
        let (ty, _) = type_deref(store, obj)?;
        if ty.is_struct_or_union() {
            return Some(base_count(&ty) + groups(ty.layout()).len());
        }
        C.number_of_children(store, obj)
    }

    fn name_of_child(&self, store: &VarobjStore, parent: VarobjId, index: usize) -> String {
        if let Some(access) = store.get(parent).access_group() {
            return grouped_field(store, parent, access, index).0.name;
        }
        if let Some((class, _)) = class_of(store, parent) {
            if let Some(base) = base_at(&class, index) {
                return base.ty.to_string();
            }
            if let Some(access) = self.child_access_group(store, parent, index) {
                return access.as_str().to_string();
            }
        }
        C.name_of_child(store, parent, index)
    }

    fn child_access_group(
        &self,
        store: &VarobjStore,
        parent: VarobjId,
        index: usize,
    ) -> Option<Access> {
        if store.get(parent).is_fake() {
            return None;
        }
        let (class, _) = class_of(store, parent)?;
        let group = index.checked_sub(base_count(&class))?;
        groups(class.layout()).get(group).copied()
    }

    fn path_expr_of_child(
        &self,
        store: &VarobjStore,
        parent: VarobjId,
        child: VarobjId,
    ) -> String {
        // Groups contribute no syntax of their own.
        if store.get(child).is_fake() {
            return store.path_expr(parent);
        }
        let index = store.get(child).index();
        if let Some(access) = store.get(parent).access_group() {
            let (field, is_ptr) = grouped_field(store, parent, access, index);
            let parent_expr = store.path_expr(parent);
            return if is_ptr {
                format!("({})->{}", parent_expr, field.name)
            } else {
                format!("({}).{}", parent_expr, field.name)
            };
        }
        if let Some((class, is_ptr)) = class_of(store, parent) {
            if let Some(base) = base_at(&class, index) {
                let parent_expr = store.path_expr(parent);
                return if is_ptr {
                    format!("(({} *) {})", base.ty, parent_expr)
                } else {
                    format!("(({}) {})", base.ty, parent_expr)
                };
            }
        }
        C.path_expr_of_child(store, parent, child)
    }

    fn value_of_child(
        &self,
        store: &VarobjStore,
        target: &mut dyn Target,
        parent: VarobjId,
        index: usize,
    ) -> Option<Value> {
        if let Some(access) = store.get(parent).access_group() {
            let (field, _) = grouped_field(store, parent, access, index);
            let owner_value = store.get(group_owner(store, parent)).value()?;
            return safe::member(target, owner_value, &field.name).ok();
        }
        if let Some((class, _)) = class_of(store, parent) {
            let Some(base) = base_at(&class, index) else {
                // An access group has no value of its own.
                return None;
            };
            let parent_value = store.get(parent).value()?;
            let object = if check_typedef(parent_value.ty()).is_pointer_or_reference() {
                match safe::dereference(target, parent_value) {
                    Ok(object) => object,
                    Err(_) => return C.value_of_child(store, target, parent, index),
                }
            } else {
                parent_value.clone()
            };
            return safe::cast(target, &object, &base.ty).ok();
        }
        C.value_of_child(store, target, parent, index)
    }

    fn type_of_child(
        &self,
        store: &VarobjStore,
        parent: VarobjId,
        index: usize,
    ) -> Option<TypeRef> {
        if let Some(access) = store.get(parent).access_group() {
            return Some(grouped_field(store, parent, access, index).0.ty);
        }
        if let Some((class, _)) = class_of(store, parent) {
            return base_at(&class, index).map(|base| base.ty.clone());
        }
        C.type_of_child(store, parent, index)
    }

    fn editable(&self, store: &VarobjStore, obj: VarobjId) -> bool {
        !store.get(obj).is_fake() && C.editable(store, obj)
    }

    fn value_to_string(&self, store: &VarobjStore, obj: VarobjId) -> Option<String> {
        if store.get(obj).is_fake() {
            return Some(String::new());
        }
        C.value_to_string(store, obj)
    }
}
