//! Type model
//!
//! The subset of a debugger's type information that variable objects need:
//! kinds, sizes, aggregate layouts (fields with access levels, base classes,
//! the virtual-table pointer) and printable names.
//!
//! Aggregate layouts are filled in once after the type is created so that
//! self-referential types (`struct node { struct node *next; }`) can be built.

use std::cell::OnceCell;
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

pub type TypeRef = Rc<Type>;

/// Size of pointers and references on the modelled targets.
pub const POINTER_SIZE: u64 = 8;

#[derive(Debug)]
pub struct Type {
    name: Option<String>,
    size: u64,
    kind: TypeKind,
}

#[derive(Debug)]
pub enum TypeKind {
    Void,
    Int { signed: bool },
    Char { signed: bool },
    Bool,
    Float,
    Enum { enumerators: Vec<(String, i64)> },
    Pointer(TypeRef),
    Reference(TypeRef),
    /// `length` is `None` when the bounds cannot be determined.
    Array { element: TypeRef, length: Option<u64> },
    Struct(Composite),
    Union(Composite),
    Function { return_type: TypeRef },
    Member,
    Method,
    Typedef(TypeRef),
}

/// Member access level in class-like languages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Access {
    Public,
    Private,
    Protected,
}

impl Access {
    /// Fixed display order of access groups.
    pub const ORDER: [Access; 3] = [Access::Public, Access::Private, Access::Protected];

    pub fn as_str(&self) -> &'static str {
        match self {
            Access::Public => "public",
            Access::Private => "private",
            Access::Protected => "protected",
        }
    }
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct Field {
    pub name: String,
    pub ty: TypeRef,
    pub offset: u64,
    pub access: Access,
}

impl Field {
    pub fn new(name: impl Into<String>, ty: TypeRef, offset: u64) -> Self {
        Self {
            name: name.into(),
            ty,
            offset,
            access: Access::Public,
        }
    }

    pub fn with_access(mut self, access: Access) -> Self {
        self.access = access;
        self
    }
}

#[derive(Debug, Clone)]
pub struct BaseClass {
    pub ty: TypeRef,
    pub offset: u64,
}

/// Field layout of a struct, union or class
#[derive(Debug, Default)]
pub struct Layout {
    pub bases: Vec<BaseClass>,
    pub fields: Vec<Field>,
    /// Index into `fields` of the virtual-table pointer, if this type owns one.
    pub vptr_field: Option<usize>,
}

impl Layout {
    pub fn new(fields: Vec<Field>) -> Self {
        Self {
            bases: Vec::new(),
            fields,
            vptr_field: None,
        }
    }

    pub fn with_bases(mut self, bases: Vec<BaseClass>) -> Self {
        self.bases = bases;
        self
    }

    pub fn with_vptr(mut self, field: usize) -> Self {
        self.vptr_field = Some(field);
        self
    }

    /// Fields that carry user data, in declaration order (the vptr is skipped).
    pub fn data_fields(&self) -> impl Iterator<Item = (usize, &Field)> {
        self.fields
            .iter()
            .enumerate()
            .filter(move |(i, _)| Some(*i) != self.vptr_field)
    }

    /// Number of data fields at the given access level.
    pub fn count_with_access(&self, access: Access) -> usize {
        self.data_fields()
            .filter(|(_, field)| field.access == access)
            .count()
    }

    /// The `n`th data field with the given access level.
    pub fn nth_with_access(&self, access: Access, n: usize) -> Option<&Field> {
        self.data_fields()
            .filter(|(_, field)| field.access == access)
            .nth(n)
            .map(|(_, field)| field)
    }

    /// Find a field by name, searching base classes depth first.
    /// Returns the field and its offset from the start of this type.
    pub fn lookup_field(&self, name: &str) -> Option<(&Field, u64)> {
        if let Some(field) = self.fields.iter().find(|f| f.name == name) {
            return Some((field, field.offset));
        }
        self.bases.iter().find_map(|base| {
            base.ty
                .layout_through_typedefs()
                .and_then(|layout| layout.lookup_field(name))
                .map(|(field, off)| (field, off + base.offset))
        })
    }
}

#[derive(Debug, Default)]
pub struct Composite {
    layout: OnceCell<Layout>,
}

impl Composite {
    fn complete(layout: Layout) -> Self {
        let cell = OnceCell::new();
        let _ = cell.set(layout);
        Self { layout: cell }
    }
}

impl Type {
    pub fn new(name: Option<String>, size: u64, kind: TypeKind) -> TypeRef {
        Rc::new(Self { name, size, kind })
    }

    pub fn void() -> TypeRef {
        Self::new(Some("void".to_string()), 1, TypeKind::Void)
    }

    pub fn int(name: &str, size: u64, signed: bool) -> TypeRef {
        Self::new(Some(name.to_string()), size, TypeKind::Int { signed })
    }

    pub fn char(name: &str, signed: bool) -> TypeRef {
        Self::new(Some(name.to_string()), 1, TypeKind::Char { signed })
    }

    pub fn bool(name: &str) -> TypeRef {
        Self::new(Some(name.to_string()), 1, TypeKind::Bool)
    }

    pub fn float(name: &str, size: u64) -> TypeRef {
        Self::new(Some(name.to_string()), size, TypeKind::Float)
    }

    pub fn enumeration(name: &str, size: u64, enumerators: Vec<(String, i64)>) -> TypeRef {
        Self::new(Some(name.to_string()), size, TypeKind::Enum { enumerators })
    }

    pub fn pointer_to(target: &TypeRef) -> TypeRef {
        Self::new(None, POINTER_SIZE, TypeKind::Pointer(target.clone()))
    }

    pub fn reference_to(target: &TypeRef) -> TypeRef {
        Self::new(None, POINTER_SIZE, TypeKind::Reference(target.clone()))
    }

    pub fn array_of(element: &TypeRef, length: Option<u64>) -> TypeRef {
        let size = length.map(|n| n * element.size()).unwrap_or(0);
        Self::new(
            None,
            size,
            TypeKind::Array {
                element: element.clone(),
                length,
            },
        )
    }

    pub fn function(return_type: &TypeRef) -> TypeRef {
        Self::new(
            None,
            1,
            TypeKind::Function {
                return_type: return_type.clone(),
            },
        )
    }

    pub fn typedef(name: &str, target: &TypeRef) -> TypeRef {
        Self::new(
            Some(name.to_string()),
            target.size(),
            TypeKind::Typedef(target.clone()),
        )
    }

    /// A complete struct.
    pub fn structure(name: &str, size: u64, layout: Layout) -> TypeRef {
        Self::new(
            Some(name.to_string()),
            size,
            TypeKind::Struct(Composite::complete(layout)),
        )
    }

    /// A complete union.
    pub fn union(name: &str, size: u64, layout: Layout) -> TypeRef {
        Self::new(
            Some(name.to_string()),
            size,
            TypeKind::Union(Composite::complete(layout)),
        )
    }

    /// A struct whose layout is supplied later with [`Type::complete`].
    pub fn declare_struct(name: &str, size: u64) -> TypeRef {
        Self::new(
            Some(name.to_string()),
            size,
            TypeKind::Struct(Composite::default()),
        )
    }

    /// Fill in the layout of a declared struct or union.
    /// Returns false if the type is not an aggregate or was already complete.
    pub fn complete(&self, layout: Layout) -> bool {
        match &self.kind {
            TypeKind::Struct(c) | TypeKind::Union(c) => c.layout.set(layout).is_ok(),
            _ => false,
        }
    }

    pub fn kind(&self) -> &TypeKind {
        &self.kind
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Layout of a struct or union. Incomplete aggregates have an empty layout.
    pub fn layout(&self) -> Option<&Layout> {
        match &self.kind {
            TypeKind::Struct(c) | TypeKind::Union(c) => c.layout.get(),
            _ => None,
        }
    }

    /// Layout of this type after stripping typedefs.
    pub fn layout_through_typedefs(&self) -> Option<&Layout> {
        match &self.kind {
            TypeKind::Typedef(target) => target.layout_through_typedefs(),
            _ => self.layout(),
        }
    }

    pub fn is_struct_or_union(&self) -> bool {
        matches!(self.kind, TypeKind::Struct(_) | TypeKind::Union(_))
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self.kind, TypeKind::Pointer(_))
    }

    pub fn is_pointer_or_reference(&self) -> bool {
        matches!(self.kind, TypeKind::Pointer(_) | TypeKind::Reference(_))
    }

    /// Whether values of this type are plain numbers (or addresses).
    pub fn is_scalar(&self) -> bool {
        matches!(
            self.kind,
            TypeKind::Int { .. }
                | TypeKind::Char { .. }
                | TypeKind::Bool
                | TypeKind::Float
                | TypeKind::Enum { .. }
                | TypeKind::Pointer(_)
                | TypeKind::Reference(_)
        )
    }

    /// The type this one points to, refers to, contains, returns or aliases.
    pub fn target(&self) -> Option<&TypeRef> {
        match &self.kind {
            TypeKind::Pointer(t) | TypeKind::Reference(t) | TypeKind::Typedef(t) => Some(t),
            TypeKind::Array { element, .. } => Some(element),
            TypeKind::Function { return_type } => Some(return_type),
            _ => None,
        }
    }
}

/// Strip typedefs.
pub fn check_typedef(ty: &TypeRef) -> TypeRef {
    let mut ty = ty.clone();
    while let TypeKind::Typedef(target) = &ty.kind {
        let next = target.clone();
        ty = next;
    }
    ty
}

/// The target of `ty`, with typedefs stripped.
pub fn target_type(ty: &TypeRef) -> Option<TypeRef> {
    ty.target().map(check_typedef)
}

/// Type identity as used by variable objects: the same node, or the same printed name.
pub fn same_type(a: &TypeRef, b: &TypeRef) -> bool {
    Rc::ptr_eq(a, b) || a.to_string() == b.to_string()
}

/// Offset of `base` inside `derived`, searching the base-class graph.
pub fn base_offset(derived: &TypeRef, base: &TypeRef) -> Option<u64> {
    let derived = check_typedef(derived);
    let base = check_typedef(base);
    if same_type(&derived, &base) {
        return Some(0);
    }
    let layout = derived.layout()?;
    layout
        .bases
        .iter()
        .find_map(|b| base_offset(&b.ty, &base).map(|off| off + b.offset))
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(name) = &self.name {
            return f.write_str(name);
        }
        match &self.kind {
            TypeKind::Pointer(target) => {
                let inner = target.to_string();
                if inner.ends_with('*') {
                    write!(f, "{}*", inner)
                } else {
                    write!(f, "{} *", inner)
                }
            }
            TypeKind::Reference(target) => write!(f, "{} &", target),
            TypeKind::Array { element, length } => match length {
                Some(n) => write!(f, "{} [{}]", element, n),
                None => write!(f, "{} []", element),
            },
            TypeKind::Function { return_type } => write!(f, "{} (void)", return_type),
            TypeKind::Member => f.write_str("<member>"),
            TypeKind::Method => f.write_str("<method>"),
            _ => f.write_str("<unnamed>"),
        }
    }
}
