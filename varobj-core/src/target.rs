//! Target collaborators
//!
//! Variable objects never parse expressions or touch memory themselves.
//! Everything they need from the debugged program goes through the traits
//! in this module: a [`ValueProvider`] that compiles and evaluates
//! expressions, and a [`FrameProvider`] that knows about stack frames and
//! thread scheduling.

use std::any::Any;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::EvalError;
use crate::types::TypeRef;
use crate::value::Value;

/// Identity of a stack frame. Stable for as long as the frame is live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameId(pub u64);

/// A lexical block: the code address range `[start, end)` in which its
/// symbols are visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Block {
    pub start: u64,
    pub end: u64,
}

impl Block {
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, pc: u64) -> bool {
        self.start <= pc && pc < self.end
    }
}

/// Source language an expression was compiled in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceLanguage {
    #[default]
    C,
    Cplus,
    ObjC,
    ObjCplus,
    Java,
    Asm,
    Unknown,
}

/// An expression compiled by a [`ValueProvider`].
///
/// The core only inspects the metadata; the handle itself is opaque and
/// owned by whoever compiled it.
pub struct CompiledExpr {
    language: SourceLanguage,
    innermost_block: Option<Block>,
    is_type: bool,
    handle: Box<dyn Any>,
}

impl CompiledExpr {
    pub fn new(
        language: SourceLanguage,
        innermost_block: Option<Block>,
        is_type: bool,
        handle: impl Any,
    ) -> Self {
        Self {
            language,
            innermost_block,
            is_type,
            handle: Box::new(handle),
        }
    }

    pub fn language(&self) -> SourceLanguage {
        self.language
    }

    /// Innermost block containing a symbol the expression refers to.
    /// `None` means the expression only uses globals.
    pub fn innermost_block(&self) -> Option<Block> {
        self.innermost_block
    }

    /// Whether the expression denotes a type rather than a value.
    pub fn is_type(&self) -> bool {
        self.is_type
    }

    pub fn handle<T: Any>(&self) -> Option<&T> {
        self.handle.downcast_ref()
    }
}

impl fmt::Debug for CompiledExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledExpr")
            .field("language", &self.language)
            .field("innermost_block", &self.innermost_block)
            .field("is_type", &self.is_type)
            .finish_non_exhaustive()
    }
}

/// Expression compilation and value operations.
///
/// Any method may fail; evaluation may run code in the debugged program.
pub trait ValueProvider {
    /// Compile `text` in the scope of `block`. With no block the expression
    /// is resolved in the scope of the selected frame, or globally when there
    /// is no frame.
    fn compile(&self, text: &str, block: Option<Block>) -> Result<CompiledExpr, EvalError>;

    /// Evaluate in the context of the selected frame.
    fn evaluate(&mut self, expr: &CompiledExpr) -> Result<Value, EvalError>;

    /// Determine the static type of the expression without reading memory.
    fn evaluate_type(&mut self, expr: &CompiledExpr) -> Result<TypeRef, EvalError>;

    /// Store `rhs` into the lvalue `lhs`, returning the updated lvalue.
    fn assign(&mut self, lhs: &Value, rhs: &Value) -> Result<Value, EvalError>;

    /// Read the contents of a lazy value.
    fn fetch_lazy(&mut self, value: &mut Value) -> Result<(), EvalError>;

    /// Most-derived class of the object a pointer or reference designates.
    fn dynamic_type(&mut self, value: &Value) -> Result<Option<TypeRef>, EvalError>;

    fn value_equal(&mut self, a: &Value, b: &Value) -> Result<bool, EvalError>;

    fn subscript(&mut self, array: &Value, index: u64) -> Result<Value, EvalError>;

    /// Member access; pointers to aggregates are dereferenced first.
    fn member(&mut self, value: &Value, name: &str) -> Result<Value, EvalError>;

    fn dereference(&mut self, value: &Value) -> Result<Value, EvalError>;

    fn cast(&mut self, value: &Value, ty: &TypeRef) -> Result<Value, EvalError>;
}

/// Stack frames, program counters and thread scheduling.
pub trait FrameProvider {
    fn selected_frame(&self) -> Option<FrameId>;

    fn select_frame(&mut self, frame: FrameId);

    /// Program counter of a live frame; `None` if the frame no longer exists.
    fn frame_pc(&self, frame: FrameId) -> Option<u64>;

    /// Innermost block at the frame's program counter.
    fn frame_block(&self, frame: FrameId) -> Option<Block>;

    fn frame_exists(&self, frame: FrameId) -> bool {
        self.frame_pc(frame).is_some()
    }

    /// Enable or disable scheduler locking, returning the previous setting.
    fn set_scheduler_locking(&mut self, locked: bool) -> bool;
}

/// Everything variable objects need from a debugged program.
pub trait Target: ValueProvider + FrameProvider {}

impl<T: ValueProvider + FrameProvider + ?Sized> Target for T {}
