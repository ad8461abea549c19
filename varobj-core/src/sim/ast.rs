//! Syntax tree of the simulated expression language

use crate::types::TypeRef;

#[derive(Debug, Clone)]
pub enum Expr {
    /// Variable: x
    Ident(String),

    /// Integer literal: 42
    Int(i128),

    /// Character literal: 'a'
    Char(char),

    /// Field access: a.b
    Member { expr: Box<Expr>, field: String },

    /// Field access through a pointer: p->b
    Arrow { expr: Box<Expr>, field: String },

    /// Subscript: a[i]
    Index { expr: Box<Expr>, index: Box<Expr> },

    /// Unary operation: -a, *p, &a
    Unary { op: UnaryOp, expr: Box<Expr> },

    /// Binary operation: a + b
    Binary {
        left: Box<Expr>,
        op: BinOp,
        right: Box<Expr>,
    },

    /// C cast: (T) a
    Cast { ty: TypeRef, expr: Box<Expr> },

    /// A type name on its own
    Type(TypeRef),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,   // -
    Deref, // *
    Ref,   // &
}

impl UnaryOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Deref => "*",
            UnaryOp::Ref => "&",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add, // +
    Sub, // -
    Mul, // *
}

impl BinOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
        }
    }
}

impl Expr {
    /// Visit every identifier the expression reads.
    pub fn for_each_ident(&self, f: &mut impl FnMut(&str)) {
        match self {
            Expr::Ident(name) => f(name),
            Expr::Int(_) | Expr::Char(_) | Expr::Type(_) => {}
            Expr::Member { expr, .. }
            | Expr::Arrow { expr, .. }
            | Expr::Unary { expr, .. }
            | Expr::Cast { expr, .. } => expr.for_each_ident(f),
            Expr::Index { expr, index } => {
                expr.for_each_ident(f);
                index.for_each_ident(f);
            }
            Expr::Binary { left, right, .. } => {
                left.for_each_ident(f);
                right.for_each_ident(f);
            }
        }
    }
}
