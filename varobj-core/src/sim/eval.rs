//! Expression evaluator for the simulated target
//!
//! Values of variables are produced lazily: an identifier evaluates to an
//! unfetched lvalue at its address, and contents are read from memory only
//! when an operation needs them.

use std::collections::HashMap;

use super::ast::{BinOp, Expr, UnaryOp};
use super::memory::Memory;
use crate::error::EvalError;
use crate::types::{base_offset, check_typedef, target_type, Type, TypeKind, TypeRef};
use crate::value::Value;

/// Where a symbol lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Storage {
    /// Fixed address.
    Static(u64),
    /// Offset from the base of the frame it is read in.
    Frame(u64),
}

#[derive(Debug, Clone)]
pub struct Binding {
    pub ty: TypeRef,
    pub storage: Storage,
}

/// Compiled form of an expression: the syntax tree with every identifier
/// resolved to a symbol.
#[derive(Debug)]
pub struct SimExpr {
    pub expr: Expr,
    pub bindings: HashMap<String, Binding>,
}

/// Evaluation context: the memory to read and the frame locals live in.
pub struct Evaluator<'a> {
    pub memory: &'a Memory,
    pub frame_base: Option<u64>,
    pub int_type: &'a TypeRef,
    pub char_type: &'a TypeRef,
}

fn invalid_op(op: &str, ty: &TypeRef) -> EvalError {
    EvalError::invalid_op(op, ty.to_string())
}

impl Evaluator<'_> {
    pub fn eval(&self, expr: &Expr, bindings: &HashMap<String, Binding>) -> Result<Value, EvalError> {
        match expr {
            Expr::Ident(name) => {
                let binding = bindings
                    .get(name)
                    .ok_or_else(|| EvalError::unknown_symbol(name))?;
                let address = match binding.storage {
                    Storage::Static(address) => address,
                    Storage::Frame(offset) => self.frame_base.ok_or(EvalError::NoFrame)? + offset,
                };
                Ok(Value::lazy(binding.ty.clone(), address))
            }
            Expr::Int(value) => Ok(Value::from_i128(self.int_type.clone(), *value)),
            Expr::Char(c) => Ok(Value::from_i128(self.char_type.clone(), *c as i128)),
            Expr::Member { expr, field } => {
                let base = self.eval(expr, bindings)?;
                self.member(&base, field)
            }
            Expr::Arrow { expr, field } => {
                let base = self.eval(expr, bindings)?;
                if !check_typedef(base.ty()).is_pointer() {
                    return Err(invalid_op("->", base.ty()));
                }
                self.member(&base, field)
            }
            Expr::Index { expr, index } => {
                let base = self.eval(expr, bindings)?;
                let index = self.fetch(&self.eval(index, bindings)?)?;
                match index.as_i128() {
                    Some(i) if i >= 0 => self.subscript(&base, i as u64),
                    _ => Err(invalid_op("[]", index.ty())),
                }
            }
            Expr::Unary { op, expr } => {
                let operand = self.eval(expr, bindings)?;
                match op {
                    UnaryOp::Deref => self.dereference(&operand),
                    UnaryOp::Ref => self.address_of(&operand),
                    UnaryOp::Neg => self.negate(&operand),
                }
            }
            Expr::Binary { left, op, right } => {
                let left = self.eval(left, bindings)?;
                let right = self.eval(right, bindings)?;
                self.binary(&left, *op, &right)
            }
            Expr::Cast { ty, expr } => {
                let operand = self.eval(expr, bindings)?;
                self.cast(&operand, ty)
            }
            Expr::Type(_) => Err(EvalError::TypeAsValue),
        }
    }

    /// Static type of an expression, without reading memory.
    pub fn type_of(&self, expr: &Expr, bindings: &HashMap<String, Binding>) -> Result<TypeRef, EvalError> {
        match expr {
            Expr::Ident(name) => bindings
                .get(name)
                .map(|binding| binding.ty.clone())
                .ok_or_else(|| EvalError::unknown_symbol(name)),
            Expr::Int(_) => Ok(self.int_type.clone()),
            Expr::Char(_) => Ok(self.char_type.clone()),
            Expr::Member { expr, field } | Expr::Arrow { expr, field } => {
                let mut ty = check_typedef(&self.type_of(expr, bindings)?);
                if ty.is_pointer_or_reference() {
                    ty = target_type(&ty).ok_or_else(|| invalid_op("->", &ty))?;
                }
                let layout = ty.layout().ok_or_else(|| invalid_op(".", &ty))?;
                layout
                    .lookup_field(field)
                    .map(|(field, _)| field.ty.clone())
                    .ok_or_else(|| EvalError::FieldNotFound {
                        field: field.clone(),
                    })
            }
            Expr::Index { expr, .. } => {
                let ty = check_typedef(&self.type_of(expr, bindings)?);
                match ty.kind() {
                    TypeKind::Array { element, .. } => Ok(element.clone()),
                    TypeKind::Pointer(target) => Ok(target.clone()),
                    _ => Err(invalid_op("[]", &ty)),
                }
            }
            Expr::Unary { op, expr } => {
                let ty = self.type_of(expr, bindings)?;
                match op {
                    UnaryOp::Deref => match check_typedef(&ty).kind() {
                        TypeKind::Pointer(target) | TypeKind::Reference(target) => Ok(target.clone()),
                        _ => Err(EvalError::NotAPointer),
                    },
                    UnaryOp::Ref => Ok(Type::pointer_to(&ty)),
                    UnaryOp::Neg => Ok(ty),
                }
            }
            Expr::Binary { left, right, .. } => {
                let left = self.type_of(left, bindings)?;
                let right = self.type_of(right, bindings)?;
                Ok(self.result_type(&left, &right))
            }
            Expr::Cast { ty, .. } => Ok(ty.clone()),
            Expr::Type(_) => Err(EvalError::TypeAsValue),
        }
    }

    fn result_type(&self, left: &TypeRef, right: &TypeRef) -> TypeRef {
        if check_typedef(left).is_pointer() {
            return left.clone();
        }
        let widest = if right.size() > left.size() { right } else { left };
        if widest.size() > self.int_type.size() {
            widest.clone()
        } else {
            self.int_type.clone()
        }
    }

    /// The value with its contents read.
    pub fn fetch(&self, value: &Value) -> Result<Value, EvalError> {
        if !value.is_lazy() {
            return Ok(value.clone());
        }
        let address = value
            .address()
            .ok_or_else(|| EvalError::Internal("lazy value without an address".to_string()))?;
        let size = check_typedef(value.ty()).size();
        let bytes = self.memory.read(address, size)?;
        Ok(Value::at(value.ty().clone(), address, bytes))
    }

    /// The `ty`-typed part of `value` at `offset`.
    fn part(&self, value: &Value, ty: TypeRef, offset: u64) -> Result<Value, EvalError> {
        let size = check_typedef(&ty).size();
        let start = offset as usize;
        let end = start + size as usize;
        let address = value.address().map(|address| address + offset);
        match (value.contents(), address) {
            (Some(bytes), Some(address)) if end <= bytes.len() => {
                Ok(Value::at(ty, address, bytes[start..end].to_vec()))
            }
            (Some(bytes), None) if end <= bytes.len() => {
                Ok(Value::from_bytes(ty, bytes[start..end].to_vec()))
            }
            (_, Some(address)) => Ok(Value::lazy(ty, address)),
            (_, None) => Err(EvalError::Internal(format!(
                "offset {} outside of a {} value",
                offset,
                value.ty()
            ))),
        }
    }

    /// Member access; pointers and references are followed first.
    pub fn member(&self, value: &Value, name: &str) -> Result<Value, EvalError> {
        let object = if check_typedef(value.ty()).is_pointer_or_reference() {
            self.dereference(value)?
        } else {
            value.clone()
        };
        let ty = check_typedef(object.ty());
        if !ty.is_struct_or_union() {
            return Err(invalid_op(".", &ty));
        }
        let (field, offset) = ty
            .layout()
            .and_then(|layout| layout.lookup_field(name))
            .ok_or_else(|| EvalError::FieldNotFound {
                field: name.to_string(),
            })?;
        self.part(&object, field.ty.clone(), offset)
    }

    pub fn subscript(&self, value: &Value, index: u64) -> Result<Value, EvalError> {
        let ty = check_typedef(value.ty());
        match ty.kind() {
            TypeKind::Array { element, .. } => {
                let size = check_typedef(element).size();
                self.part(value, element.clone(), index * size)
            }
            TypeKind::Pointer(target) => {
                let size = check_typedef(target).size();
                let address = self.pointer_target(value)?;
                Ok(Value::lazy(target.clone(), address + index * size))
            }
            _ => Err(invalid_op("[]", &ty)),
        }
    }

    fn pointer_target(&self, value: &Value) -> Result<u64, EvalError> {
        self.fetch(value)?
            .as_address()
            .ok_or(EvalError::NotAPointer)
    }

    pub fn dereference(&self, value: &Value) -> Result<Value, EvalError> {
        let ty = check_typedef(value.ty());
        match ty.kind() {
            TypeKind::Pointer(target) | TypeKind::Reference(target) => {
                if matches!(check_typedef(target).kind(), TypeKind::Void) {
                    return Err(EvalError::NotAPointer);
                }
                let address = self.pointer_target(value)?;
                Ok(Value::lazy(target.clone(), address))
            }
            _ => Err(EvalError::NotAPointer),
        }
    }

    pub fn address_of(&self, value: &Value) -> Result<Value, EvalError> {
        let address = value.address().ok_or(EvalError::NotAnLvalue)?;
        Ok(Value::from_i128(Type::pointer_to(value.ty()), address as i128))
    }

    fn negate(&self, value: &Value) -> Result<Value, EvalError> {
        let value = self.fetch(value)?;
        let ty = check_typedef(value.ty());
        match ty.kind() {
            TypeKind::Float => {
                let f = value.as_f64().ok_or_else(|| invalid_op("-", &ty))?;
                Ok(Value::from_f64(value.ty().clone(), -f))
            }
            TypeKind::Int { .. } | TypeKind::Char { .. } | TypeKind::Enum { .. } | TypeKind::Bool => {
                let n = value.as_i128().ok_or_else(|| invalid_op("-", &ty))?;
                Ok(Value::from_i128(self.result_type(value.ty(), value.ty()), -n))
            }
            _ => Err(invalid_op("-", &ty)),
        }
    }

    fn binary(&self, left: &Value, op: BinOp, right: &Value) -> Result<Value, EvalError> {
        let left = self.fetch(left)?;
        let right = self.fetch(right)?;
        let left_ty = check_typedef(left.ty());
        if let TypeKind::Pointer(target) = left_ty.kind() {
            let offset = right.as_i128().ok_or_else(|| invalid_op(op.as_str(), right.ty()))?;
            let address = left.as_address().ok_or(EvalError::NotAPointer)? as i128;
            let scaled = offset * check_typedef(target).size() as i128;
            let result = match op {
                BinOp::Add => address + scaled,
                BinOp::Sub => address - scaled,
                BinOp::Mul => return Err(invalid_op(op.as_str(), left.ty())),
            };
            return Ok(Value::from_i128(left.ty().clone(), result));
        }
        if !left_ty.is_scalar() {
            return Err(invalid_op(op.as_str(), left.ty()));
        }
        let l = left.as_i128().ok_or_else(|| invalid_op(op.as_str(), left.ty()))?;
        let r = right.as_i128().ok_or_else(|| invalid_op(op.as_str(), right.ty()))?;
        let result = match op {
            BinOp::Add => l.wrapping_add(r),
            BinOp::Sub => l.wrapping_sub(r),
            BinOp::Mul => l.wrapping_mul(r),
        };
        Ok(Value::from_i128(self.result_type(left.ty(), right.ty()), result))
    }

    /// Convert `value` to `ty`.
    ///
    /// Pointers between related classes are adjusted by the offset of the
    /// base class; a class object converts to any of its bases.
    pub fn cast(&self, value: &Value, ty: &TypeRef) -> Result<Value, EvalError> {
        let from = check_typedef(value.ty());
        let to = check_typedef(ty);
        let invalid = || EvalError::InvalidCast {
            from: value.ty().to_string(),
            to: ty.to_string(),
        };

        if from.is_struct_or_union() || to.is_struct_or_union() {
            let offset = base_offset(&from, &to).ok_or_else(invalid)?;
            return self.part(value, ty.clone(), offset);
        }
        if !from.is_scalar() || !to.is_scalar() {
            return Err(invalid());
        }

        let fetched = self.fetch(value)?;
        let converted = if from.is_pointer_or_reference() && to.is_pointer_or_reference() {
            let address = fetched.as_address().ok_or_else(invalid)?;
            let adjusted = match (target_type(&from), target_type(&to)) {
                _ if address == 0 => address,
                (Some(source), Some(dest)) => {
                    if let Some(offset) = base_offset(&source, &dest) {
                        address + offset
                    } else if let Some(offset) = base_offset(&dest, &source) {
                        address - offset
                    } else {
                        address
                    }
                }
                _ => address,
            };
            Value::from_i128(ty.clone(), adjusted as i128)
        } else if matches!(to.kind(), TypeKind::Float) {
            let f = match fetched.as_f64() {
                Some(f) => f,
                None => fetched.as_i128().ok_or_else(invalid)? as f64,
            };
            Value::from_f64(ty.clone(), f)
        } else {
            Value::from_i128(ty.clone(), fetched.as_i128().ok_or_else(invalid)?)
        };

        // Same-sized conversions still designate the original object.
        match (value.address(), converted.contents()) {
            (Some(address), Some(bytes)) if to.size() == from.size() => {
                Ok(Value::at(ty.clone(), address, bytes.to_vec()))
            }
            _ => Ok(converted),
        }
    }

    /// Compare two scalars.
    pub fn equal(&self, a: &Value, b: &Value) -> Result<bool, EvalError> {
        let a = self.fetch(a)?;
        let b = self.fetch(b)?;
        let ty = check_typedef(a.ty());
        if !ty.is_scalar() || !check_typedef(b.ty()).is_scalar() {
            return Err(invalid_op("==", &ty));
        }
        if let (Some(x), Some(y)) = (a.as_f64(), b.as_f64()) {
            return Ok(x == y);
        }
        match (a.as_i128(), b.as_i128()) {
            (Some(x), Some(y)) => Ok(x == y),
            _ => Err(invalid_op("==", &ty)),
        }
    }
}
