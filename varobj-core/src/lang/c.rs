//! C
//!
//! Arrays have one child per element, structs and unions one per field.
//! Pointers to aggregates are dereferenced automatically and show the
//! pointee's fields; other pointers have a single `*name` child.

use crate::format::format_value;
use crate::safe;
use crate::store::VarobjStore;
use crate::target::Target;
use crate::types::{check_typedef, TypeKind, TypeRef};
use crate::value::Value;
use crate::varobj::VarobjId;

use super::LanguageStrategy;

#[derive(Debug, Clone, Copy, Default)]
pub struct C;

/// Number of children of an object whose type (typedefs stripped) is `ty`.
pub fn child_count(ty: &TypeRef) -> Option<usize> {
    match ty.kind() {
        TypeKind::Array { element, length } => {
            let element = check_typedef(element);
            if length.is_some() && ty.size() > 0 && element.size() > 0 {
                Some((ty.size() / element.size()) as usize)
            } else {
                None
            }
        }
        TypeKind::Struct(_) | TypeKind::Union(_) => {
            Some(ty.layout().map_or(0, |layout| layout.fields.len()))
        }
        TypeKind::Pointer(target) => {
            let target = check_typedef(target);
            match target.kind() {
                TypeKind::Struct(_) | TypeKind::Union(_) => {
                    Some(target.layout().map_or(0, |layout| layout.fields.len()))
                }
                TypeKind::Function { .. } | TypeKind::Void => Some(0),
                _ => Some(1),
            }
        }
        _ => Some(0),
    }
}

/// Whether `ty` points to a struct or union.
fn points_to_aggregate(ty: &TypeRef) -> bool {
    match ty.kind() {
        TypeKind::Pointer(target) => check_typedef(target).is_struct_or_union(),
        _ => false,
    }
}

fn parent_type(store: &VarobjStore, parent: VarobjId) -> TypeRef {
    match store.effective_type(parent) {
        Some(ty) => ty,
        None => panic!(
            "child requested of \"{}\", which has no type",
            store.get(parent).name()
        ),
    }
}

fn field_name(ty: &TypeRef, index: usize) -> String {
    let layout = ty.layout();
    match layout.and_then(|layout| layout.fields.get(index)) {
        Some(field) => field.name.clone(),
        None => panic!("type {} has no field {}", ty, index),
    }
}

impl LanguageStrategy for C {
    fn number_of_children(&self, store: &VarobjStore, obj: VarobjId) -> Option<usize> {
        let ty = store.effective_type(obj)?;
        child_count(&ty)
    }

    fn name_of_child(&self, store: &VarobjStore, parent: VarobjId, index: usize) -> String {
        let ty = parent_type(store, parent);
        match ty.kind() {
            TypeKind::Array { .. } => index.to_string(),
            TypeKind::Struct(_) | TypeKind::Union(_) => field_name(&ty, index),
            TypeKind::Pointer(target) => {
                let target = check_typedef(target);
                if target.is_struct_or_union() {
                    field_name(&target, index)
                } else {
                    format!("*{}", store.get(parent).name())
                }
            }
            _ => panic!("type {} does not have children", ty),
        }
    }

    fn path_expr_of_child(
        &self,
        store: &VarobjStore,
        parent: VarobjId,
        child: VarobjId,
    ) -> String {
        let parent_expr = store.path_expr(parent);
        let name = store.get(child).name();
        let ty = parent_type(store, parent);
        match ty.kind() {
            TypeKind::Array { .. } => format!("({})[{}]", parent_expr, name),
            TypeKind::Struct(_) | TypeKind::Union(_) => format!("({}).{}", parent_expr, name),
            TypeKind::Pointer(_) if points_to_aggregate(&ty) => {
                format!("({})->{}", parent_expr, name)
            }
            TypeKind::Pointer(_) => format!("*({})", parent_expr),
            _ => panic!("type {} does not have children", ty),
        }
    }

    fn value_of_child(
        &self,
        store: &VarobjStore,
        target: &mut dyn Target,
        parent: VarobjId,
        index: usize,
    ) -> Option<Value> {
        let child = store.child(parent, index);
        let name = store.get(child).name();
        let parent_value = store.get(parent).value()?;
        let ty = store.effective_type(parent)?;
        let result = match ty.kind() {
            TypeKind::Array { .. } => safe::subscript(target, parent_value, index as u64),
            TypeKind::Struct(_) | TypeKind::Union(_) => safe::member(target, parent_value, name),
            TypeKind::Pointer(_) if points_to_aggregate(&ty) => {
                safe::member(target, parent_value, name)
            }
            TypeKind::Pointer(_) => safe::dereference(target, parent_value),
            _ => return None,
        };
        result.ok()
    }

    fn type_of_child(
        &self,
        store: &VarobjStore,
        parent: VarobjId,
        index: usize,
    ) -> Option<TypeRef> {
        let ty = store.effective_type(parent)?;
        match ty.kind() {
            TypeKind::Array { .. } => {
                // The declared element type, typedef names kept.
                let declared = check_typedef(store.get(parent).ty()?);
                declared.target().cloned()
            }
            TypeKind::Struct(_) | TypeKind::Union(_) => {
                let name = store.get(store.child(parent, index)).name();
                let layout = ty.layout()?;
                layout.lookup_field(name).map(|(field, _)| field.ty.clone())
            }
            TypeKind::Pointer(target) => {
                let target = check_typedef(target);
                if target.is_struct_or_union() {
                    let name = store.get(store.child(parent, index)).name();
                    let layout = target.layout()?;
                    layout.lookup_field(name).map(|(field, _)| field.ty.clone())
                } else {
                    Some(target)
                }
            }
            _ => None,
        }
    }

    fn editable(&self, store: &VarobjStore, obj: VarobjId) -> bool {
        match store.effective_type(obj) {
            Some(ty) => !matches!(
                ty.kind(),
                TypeKind::Struct(_)
                    | TypeKind::Union(_)
                    | TypeKind::Array { .. }
                    | TypeKind::Function { .. }
                    | TypeKind::Member
                    | TypeKind::Method
            ),
            None => false,
        }
    }

    fn value_to_string(&self, store: &VarobjStore, obj: VarobjId) -> Option<String> {
        let ty = store.effective_type(obj)?;
        match ty.kind() {
            TypeKind::Struct(_) | TypeKind::Union(_) => Some("{...}".to_string()),
            TypeKind::Array { .. } => match self.number_of_children(store, obj) {
                Some(count) => Some(format!("[{}]", count)),
                None => Some("[?]".to_string()),
            },
            _ => {
                let node = store.get(obj);
                format_value(node.value()?, node.format())
            }
        }
    }
}
