//! Method compilation.
//!
//! [`MethodBuilder`] is the composition root: it owns a routine's signature,
//! locals and statement list, drives emission into a
//! [`CodeBuffer`](crate::vm::CodeBuffer) and renders the routine as
//! pseudo-source.
//!
//! ## Design
//!
//! - Statements are checked as a whole before anything is lowered
//! - Void methods get an implicit trailing `ret`
//! - Stack depth and labels are tracked by the sink, not the builder

mod method;
mod options;


pub use method::{CompiledMethod, MethodBuilder};
pub use options::MethodOptions;
