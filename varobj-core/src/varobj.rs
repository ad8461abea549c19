//! Variable object nodes
//!
//! A variable object is one node of a tree rooted at a watched expression.
//! Nodes live in the arena of a [`VarobjStore`](crate::store::VarobjStore)
//! and refer to each other by [`VarobjId`].

use std::cell::OnceCell;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::format::DisplayFormat;
use crate::lang::Language;
use crate::target::{Block, CompiledExpr, FrameId};
use crate::types::{Access, TypeRef};
use crate::value::Value;

/// Handle of a variable object inside its store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VarobjId(pub(crate) u64);

impl fmt::Display for VarobjId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What a node holds.
#[derive(Debug)]
pub enum NodeKind {
    /// An object with a type and (possibly) a value.
    Real {
        ty: Option<TypeRef>,
        /// Most-derived type of the value, when it could be determined.
        dynamic_type: Option<TypeRef>,
        value: Option<Value>,
    },
    /// Synthetic "public"/"private"/"protected" grouping of class fields.
    AccessGroup(Access),
}

impl NodeKind {
    pub(crate) fn real() -> Self {
        NodeKind::Real {
            ty: None,
            dynamic_type: None,
            value: None,
        }
    }
}

/// Metadata carried only by root objects.
#[derive(Debug)]
pub struct RootInfo {
    /// `None` when the expression could not be compiled or resolved yet.
    pub expr: Option<CompiledExpr>,
    /// Block the expression was resolved in; `None` means global scope.
    pub valid_block: Option<Block>,
    pub frame: Option<FrameId>,
    /// Re-resolve against the selected frame on every update.
    pub use_selected_frame: bool,
    pub in_scope: bool,
    pub language: Language,
}

impl RootInfo {
    pub(crate) fn new(use_selected_frame: bool) -> Self {
        Self {
            expr: None,
            valid_block: None,
            frame: None,
            use_selected_frame,
            in_scope: false,
            language: Language::C,
        }
    }
}

#[derive(Debug)]
pub struct Varobj {
    /// Expression text for roots, accessor name for children.
    pub(crate) name: String,
    /// Registered name; `None` for temporaries and children of temporaries.
    pub(crate) obj_name: Option<String>,
    pub(crate) path_expr: OnceCell<String>,
    pub(crate) kind: NodeKind,
    pub(crate) error: bool,
    /// Set by assignment; forces a change report on the next update.
    pub(crate) updated: bool,
    pub(crate) format: DisplayFormat,
    pub(crate) parent: Option<VarobjId>,
    /// Position among the parent's children.
    pub(crate) index: usize,
    pub(crate) children: BTreeMap<usize, VarobjId>,
    /// Cached child count; `None` until computed.
    pub(crate) num_children: Option<usize>,
    pub(crate) root: VarobjId,
    pub(crate) root_info: Option<RootInfo>,
}

impl Varobj {
    pub(crate) fn new_root(id: VarobjId, expression: &str, info: RootInfo) -> Self {
        Self {
            name: expression.to_string(),
            obj_name: None,
            path_expr: OnceCell::new(),
            kind: NodeKind::real(),
            error: false,
            updated: false,
            format: DisplayFormat::default(),
            parent: None,
            index: 0,
            children: BTreeMap::new(),
            num_children: None,
            root: id,
            root_info: Some(info),
        }
    }

    pub(crate) fn new_child(
        name: String,
        obj_name: Option<String>,
        kind: NodeKind,
        parent: VarobjId,
        index: usize,
        root: VarobjId,
    ) -> Self {
        Self {
            name,
            obj_name,
            path_expr: OnceCell::new(),
            kind,
            error: false,
            updated: false,
            format: DisplayFormat::default(),
            parent: Some(parent),
            index,
            children: BTreeMap::new(),
            num_children: None,
            root,
            root_info: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn obj_name(&self) -> Option<&str> {
        self.obj_name.as_deref()
    }

    pub fn parent(&self) -> Option<VarobjId> {
        self.parent
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn is_root(&self) -> bool {
        self.root_info.is_some()
    }

    pub fn is_fake(&self) -> bool {
        matches!(self.kind, NodeKind::AccessGroup(_))
    }

    pub fn access_group(&self) -> Option<Access> {
        match self.kind {
            NodeKind::AccessGroup(access) => Some(access),
            NodeKind::Real { .. } => None,
        }
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// Static type; `None` for access groups and unresolved roots.
    pub fn ty(&self) -> Option<&TypeRef> {
        match &self.kind {
            NodeKind::Real { ty, .. } => ty.as_ref(),
            NodeKind::AccessGroup(_) => None,
        }
    }

    pub fn dynamic_type(&self) -> Option<&TypeRef> {
        match &self.kind {
            NodeKind::Real { dynamic_type, .. } => dynamic_type.as_ref(),
            NodeKind::AccessGroup(_) => None,
        }
    }

    pub fn value(&self) -> Option<&Value> {
        match &self.kind {
            NodeKind::Real { value, .. } => value.as_ref(),
            NodeKind::AccessGroup(_) => None,
        }
    }

    pub fn error(&self) -> bool {
        self.error
    }

    pub fn format(&self) -> DisplayFormat {
        self.format
    }

    pub fn children(&self) -> &BTreeMap<usize, VarobjId> {
        &self.children
    }

    pub fn root_info(&self) -> Option<&RootInfo> {
        self.root_info.as_ref()
    }

    pub(crate) fn set_type(&mut self, new_ty: Option<TypeRef>) {
        if let NodeKind::Real { ty, .. } = &mut self.kind {
            *ty = new_ty;
        }
    }

    pub(crate) fn set_dynamic_type(&mut self, new_ty: Option<TypeRef>) {
        if let NodeKind::Real { dynamic_type, .. } = &mut self.kind {
            *dynamic_type = new_ty;
        }
    }

    /// Replace the stored value. Access groups never hold one.
    pub(crate) fn replace_value(&mut self, new_value: Option<Value>) -> Option<Value> {
        match &mut self.kind {
            NodeKind::Real { value, .. } => std::mem::replace(value, new_value),
            NodeKind::AccessGroup(_) => None,
        }
    }

    pub(crate) fn root_info_mut(&mut self) -> &mut RootInfo {
        match self.root_info.as_mut() {
            Some(info) => info,
            None => panic!("variable object \"{}\" is not a root", self.name),
        }
    }
}
