//! Simulated target
//!
//! An in-process implementation of [`Target`](crate::target::Target): a small
//! C-family expression language evaluated over simulated memory, frames and
//! lexical blocks. Used by the tests and by embedders that need a
//! deterministic target.

pub mod ast;
pub mod eval;
pub mod lexer;
pub mod memory;
pub mod parser;
mod target;

pub use target::SimTarget;
