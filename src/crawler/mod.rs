//! Project file discovery.

mod traverser;

pub use traverser::*;
