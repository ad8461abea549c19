//! Error types
//!
//! `EvalError` is what a target reports when compiling or evaluating an
//! expression fails. `VarobjError` is what the variable-object API reports.

use thiserror::Error;

/// Failure reported by the target while compiling or evaluating.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    // Compile-time errors
    #[error("Parse error: {message}")]
    ParseError { message: String },

    #[error("No symbol \"{name}\" in current context.")]
    UnknownSymbol { name: String },

    #[error("No type named {name}.")]
    UnknownType { name: String },

    // Runtime errors
    #[error("No frame selected.")]
    NoFrame,

    #[error("Cannot access memory at address 0x{address:x}")]
    MemoryAccess { address: u64 },

    #[error("Attempt to take contents of a non-pointer value.")]
    NotAPointer,

    #[error("Left operand of assignment is not an lvalue.")]
    NotAnLvalue,

    #[error("There is no member named {field}.")]
    FieldNotFound { field: String },

    #[error("Cannot apply operator '{op}' to a value of type {operand}")]
    InvalidOperation { op: String, operand: String },

    #[error("Invalid cast from {from} to {to}")]
    InvalidCast { from: String, to: String },

    #[error("Attempt to use a type name as an expression")]
    TypeAsValue,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl EvalError {
    pub fn parse(message: impl Into<String>) -> Self {
        EvalError::ParseError {
            message: message.into(),
        }
    }

    pub fn unknown_symbol(name: impl Into<String>) -> Self {
        EvalError::UnknownSymbol { name: name.into() }
    }

    pub fn invalid_op(op: impl Into<String>, operand: impl Into<String>) -> Self {
        EvalError::InvalidOperation {
            op: op.into(),
            operand: operand.into(),
        }
    }
}

/// Failure of a variable-object operation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum VarobjError {
    #[error("Cannot create variable object for \"{expression}\": {source}")]
    Parse {
        expression: String,
        #[source]
        source: EvalError,
    },

    #[error("Attempt to use a type name as an expression: \"{expression}\"")]
    TypeName { expression: String },

    #[error("Duplicate variable object name: {name}")]
    DuplicateName { name: String },

    #[error("Variable object not found: {name}")]
    NotFound { name: String },

    #[error("Only root variable objects can be updated")]
    NotRoot,

    #[error("Variable object is not editable")]
    NotEditable,

    #[error("Number of children of \"{expression}\" cannot be determined")]
    UnknownChildCount { expression: String },

    #[error("Cannot assign \"{expression}\": {source}")]
    Assign {
        expression: String,
        #[source]
        source: EvalError,
    },

    #[error(transparent)]
    Eval(#[from] EvalError),
}

pub type Result<T> = std::result::Result<T, VarobjError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = EvalError::MemoryAccess { address: 0x10 };
        assert_eq!(err.to_string(), "Cannot access memory at address 0x10");

        let err = VarobjError::Parse {
            expression: "a +".to_string(),
            source: EvalError::parse("unexpected end of input"),
        };
        assert!(err.to_string().contains("a +"));
        assert!(err.to_string().contains("unexpected end of input"));
    }

    #[test]
    fn test_eval_error_converts() {
        let err: VarobjError = EvalError::NoFrame.into();
        assert!(matches!(err, VarobjError::Eval(EvalError::NoFrame)));
    }
}
