//! contains all important data structures

pub mod ast;
pub use ast::*;

pub mod value;
pub use value::*;

pub mod ops;
pub use ops::{OpError, Operator};

pub mod instruction;
pub use instruction::*;

pub mod program;
pub use program::*;

pub mod symbols;
pub use symbols::*;

pub mod scopes;
pub use scopes::*;
