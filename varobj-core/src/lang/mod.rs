//! Per-language behaviour
//!
//! How an object's children are counted, named, reached and typed, whether
//! the object can be assigned, and how its value is shown all depend on the
//! source language of the root expression. Each language is a
//! [`LanguageStrategy`]; the root picks one when it is created.

pub mod c;
pub mod cplus;
pub mod java;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::store::VarobjStore;
use crate::target::{SourceLanguage, Target};
use crate::types::{Access, TypeRef};
use crate::value::Value;
use crate::varobj::VarobjId;

pub use c::C;
pub use cplus::Cplus;
pub use java::Java;

/// Language strategy selected for a root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Language {
    #[default]
    C,
    Cplus,
    Java,
}

impl Language {
    /// Unknown languages are handled like C.
    pub fn from_source(language: SourceLanguage) -> Self {
        match language {
            SourceLanguage::Cplus | SourceLanguage::ObjCplus => Language::Cplus,
            SourceLanguage::Java => Language::Java,
            _ => Language::C,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::C => "C",
            Language::Cplus => "C++",
            Language::Java => "Java",
        }
    }

    pub fn strategy(&self) -> &'static dyn LanguageStrategy {
        match self {
            Language::C => &C,
            Language::Cplus => &Cplus,
            Language::Java => &Java,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Language-dependent operations on variable objects.
///
/// Child operations take the parent and a position in `0..count`, where
/// `count` is what [`number_of_children`](Self::number_of_children) returned
/// for the parent. Operations that need the child itself expect it to have
/// been created already.
pub trait LanguageStrategy: Sync {
    /// `None` when the count cannot be determined.
    fn number_of_children(&self, store: &VarobjStore, obj: VarobjId) -> Option<usize>;

    fn name_of_child(&self, store: &VarobjStore, parent: VarobjId, index: usize) -> String;

    /// The access level when the child at `index` is a synthetic group.
    fn child_access_group(
        &self,
        store: &VarobjStore,
        parent: VarobjId,
        index: usize,
    ) -> Option<Access> {
        let _ = (store, parent, index);
        None
    }

    /// Expression that evaluates to `child` starting from the root expression.
    fn path_expr_of_child(&self, store: &VarobjStore, parent: VarobjId, child: VarobjId)
        -> String;

    fn value_of_child(
        &self,
        store: &VarobjStore,
        target: &mut dyn Target,
        parent: VarobjId,
        index: usize,
    ) -> Option<Value>;

    fn type_of_child(&self, store: &VarobjStore, parent: VarobjId, index: usize)
        -> Option<TypeRef>;

    fn editable(&self, store: &VarobjStore, obj: VarobjId) -> bool;

    fn value_to_string(&self, store: &VarobjStore, obj: VarobjId) -> Option<String>;
}
