//! Java
//!
//! Java objects are shown like C++ classes. The only difference is in child
//! names: `.` separates the components of a registered name, so periods in
//! names (package-qualified class names, mostly) are written as `-`.

use crate::store::VarobjStore;
use crate::target::Target;
use crate::types::{Access, TypeRef};
use crate::value::Value;
use crate::varobj::VarobjId;

use super::{Cplus, LanguageStrategy};

#[derive(Debug, Clone, Copy, Default)]
pub struct Java;

pub fn escape_name(name: &str) -> String {
    name.replace('.', "-")
}

impl LanguageStrategy for Java {
    fn number_of_children(&self, store: &VarobjStore, obj: VarobjId) -> Option<usize> {
        Cplus.number_of_children(store, obj)
    }

    fn name_of_child(&self, store: &VarobjStore, parent: VarobjId, index: usize) -> String {
        escape_name(&Cplus.name_of_child(store, parent, index))
    }

    fn child_access_group(
        &self,
        store: &VarobjStore,
        parent: VarobjId,
        index: usize,
    ) -> Option<Access> {
        Cplus.child_access_group(store, parent, index)
    }

    fn path_expr_of_child(
        &self,
        store: &VarobjStore,
        parent: VarobjId,
        child: VarobjId,
    ) -> String {
        Cplus.path_expr_of_child(store, parent, child)
    }

    fn value_of_child(
        &self,
        store: &VarobjStore,
        target: &mut dyn Target,
        parent: VarobjId,
        index: usize,
    ) -> Option<Value> {
        Cplus.value_of_child(store, target, parent, index)
    }

    fn type_of_child(
        &self,
        store: &VarobjStore,
        parent: VarobjId,
        index: usize,
    ) -> Option<TypeRef> {
        Cplus.type_of_child(store, parent, index)
    }

    fn editable(&self, store: &VarobjStore, obj: VarobjId) -> bool {
        Cplus.editable(store, obj)
    }

    fn value_to_string(&self, store: &VarobjStore, obj: VarobjId) -> Option<String> {
        Cplus.value_to_string(store, obj)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_name() {
        assert_eq!(escape_name("java.lang.Object"), "java-lang-Object");
        assert_eq!(escape_name("count"), "count");
    }
}
