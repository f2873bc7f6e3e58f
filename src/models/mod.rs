//! Data models for the chain auditor.

mod ast;
mod finding;
mod source;

pub use ast::*;
pub use finding::*;
pub use source::*;
