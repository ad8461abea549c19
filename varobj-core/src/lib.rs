//! Variable objects for debugger front ends
//!
//! A variable object watches an expression in the debugged program:
//! - roots are created from expression text and an evaluation context
//! - children (fields, elements, pointees, base classes) are created on demand
//! - after each stop, `update` reports what changed and tracks scope
//! - per-language behaviour for C, C++ and Java
//!
//! Everything the objects need from the program goes through the
//! [`target::Target`] traits; [`sim::SimTarget`] implements them in process.

pub mod config;
pub mod error;
pub mod format;
pub mod guard;
pub mod info;
pub mod lang;
pub mod safe;
pub mod sim;
pub mod store;
pub mod target;
pub mod types;
pub mod update;
pub mod value;
pub mod varobj;

pub use config::VarobjConfig;
pub use error::{EvalError, Result, VarobjError};
pub use format::DisplayFormat;
pub use info::{ChangeRecord, VarobjInfo};
pub use lang::Language;
pub use store::{Attributes, EvalContext, VarobjStore};
pub use target::{Block, CompiledExpr, FrameId, SourceLanguage, Target};
pub use update::{ChangeEntry, ChangeList, TypeChange, UpdateStatus};
pub use value::Value;
pub use varobj::{Varobj, VarobjId};
