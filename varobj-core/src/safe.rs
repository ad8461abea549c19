//! Failure-insulated target calls
//!
//! Every call into the target goes through this module. Errors come back as
//! [`EvalError`] values and a panic inside the provider is caught and turned
//! into [`EvalError::Internal`], so nothing escapes a public operation.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

use tracing::{debug, warn};

use crate::error::EvalError;
use crate::target::{Block, CompiledExpr, Target};
use crate::types::TypeRef;
use crate::value::Value;

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        return message.to_string();
    }
    payload
        .downcast_ref::<String>()
        .cloned()
        .unwrap_or_else(|| "unknown panic".to_string())
}

/// Run `f`, converting a panic into an internal evaluation error.
pub fn insulate<T>(
    what: &str,
    f: impl FnOnce() -> Result<T, EvalError>,
) -> Result<T, EvalError> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            warn!("target fault during {}: {}", what, message);
            Err(EvalError::Internal(format!("{}: {}", what, message)))
        }
    }
}

pub fn compile(
    target: &dyn Target,
    text: &str,
    block: Option<Block>,
) -> Result<CompiledExpr, EvalError> {
    insulate("compile", || target.compile(text, block))
}

pub fn evaluate(target: &mut dyn Target, expr: &CompiledExpr) -> Result<Value, EvalError> {
    insulate("evaluate", || target.evaluate(expr))
}

pub fn evaluate_type(target: &mut dyn Target, expr: &CompiledExpr) -> Result<TypeRef, EvalError> {
    insulate("evaluate_type", || target.evaluate_type(expr))
}

pub fn assign(target: &mut dyn Target, lhs: &Value, rhs: &Value) -> Result<Value, EvalError> {
    insulate("assign", || target.assign(lhs, rhs))
}

pub fn fetch_lazy(target: &mut dyn Target, value: &mut Value) -> Result<(), EvalError> {
    insulate("fetch_lazy", || target.fetch_lazy(value))
}

pub fn subscript(target: &mut dyn Target, array: &Value, index: u64) -> Result<Value, EvalError> {
    insulate("subscript", || target.subscript(array, index))
}

pub fn member(target: &mut dyn Target, value: &Value, name: &str) -> Result<Value, EvalError> {
    insulate("member", || target.member(value, name))
}

pub fn dereference(target: &mut dyn Target, value: &Value) -> Result<Value, EvalError> {
    insulate("dereference", || target.dereference(value))
}

pub fn cast(target: &mut dyn Target, value: &Value, ty: &TypeRef) -> Result<Value, EvalError> {
    insulate("cast", || target.cast(value, ty))
}

/// Most-derived class lookup. Failures are logged and reported as "no
/// dynamic type".
pub fn dynamic_type(target: &mut dyn Target, value: &Value) -> Option<TypeRef> {
    match insulate("dynamic_type", || target.dynamic_type(value)) {
        Ok(ty) => ty,
        Err(err) => {
            debug!("dynamic type lookup failed: {}", err);
            None
        }
    }
}

/// Outcome of comparing an old value with a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Comparison {
    pub equal: bool,
    /// Reading the new value failed.
    pub new_errored: bool,
}

/// Compare two possibly missing values without ever failing.
///
/// Two missing values are equal, one missing value is a change. A value that
/// cannot even be compared with itself is in error; a change in error-ness
/// is a change, while two values that both fail are considered unchanged.
pub fn value_equal(
    target: &mut dyn Target,
    old: Option<&Value>,
    new: Option<&Value>,
) -> Comparison {
    let (old, new) = match (old, new) {
        (None, None) => {
            return Comparison {
                equal: true,
                new_errored: false,
            }
        }
        (Some(old), Some(new)) => (old, new),
        _ => {
            return Comparison {
                equal: false,
                new_errored: false,
            }
        }
    };

    let mut compare =
        |a: &Value, b: &Value| insulate("value_equal", || target.value_equal(a, b));
    let old_errored = compare(old, old).is_err();
    let new_errored = compare(new, new).is_err();
    if old_errored != new_errored {
        return Comparison {
            equal: false,
            new_errored,
        };
    }
    // Both sides already compared equal to themselves, or both failed.
    let equal = compare(old, new).unwrap_or(true);
    Comparison { equal, new_errored }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Type;

    #[test]
    fn test_insulate_catches_panic() {
        let result: Result<(), EvalError> = insulate("boom", || panic!("inferior crashed"));
        assert!(matches!(result, Err(EvalError::Internal(ref msg)) if msg.contains("inferior crashed")));
    }

    #[test]
    fn test_insulate_passes_errors_through() {
        let result: Result<(), EvalError> = insulate("fail", || Err(EvalError::NoFrame));
        assert!(matches!(result, Err(EvalError::NoFrame)));
    }

    #[test]
    fn test_missing_values() {
        let mut sim = crate::sim::SimTarget::new();
        let int = Type::int("int", 4, true);
        let v = Value::from_i128(int, 1);
        assert!(value_equal(&mut sim, None, None).equal);
        assert!(!value_equal(&mut sim, Some(&v), None).equal);
        assert!(!value_equal(&mut sim, None, Some(&v)).equal);
    }

    #[test]
    fn test_scalar_comparison() {
        let mut sim = crate::sim::SimTarget::new();
        let int = Type::int("int", 4, true);
        let a = Value::from_i128(int.clone(), 1);
        let b = Value::from_i128(int.clone(), 2);
        let c = Value::from_i128(int, 1);
        assert!(!value_equal(&mut sim, Some(&a), Some(&b)).equal);
        assert!(value_equal(&mut sim, Some(&a), Some(&c)).equal);
    }

    #[test]
    fn test_error_transitions() {
        let mut sim = crate::sim::SimTarget::new();
        let int = Type::int("int", 4, true);
        let good = Value::from_i128(int.clone(), 1);
        let bad = Value::lazy(int.clone(), 0);
        let also_bad = Value::lazy(int, 0);

        let cmp = value_equal(&mut sim, Some(&good), Some(&bad));
        assert!(!cmp.equal);
        assert!(cmp.new_errored);

        let cmp = value_equal(&mut sim, Some(&bad), Some(&good));
        assert!(!cmp.equal);
        assert!(!cmp.new_errored);

        let cmp = value_equal(&mut sim, Some(&bad), Some(&also_bad));
        assert!(cmp.equal);
        assert!(cmp.new_errored);
    }
}
