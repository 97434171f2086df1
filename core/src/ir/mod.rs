//! Typed node tree.
//!
//! Nodes are built through a [`NodeBuilder`], which fixes each node's static
//! type and rejects malformed operands up front. A finished tree can then be
//! emitted into an [`InstructionSink`](crate::vm::InstructionSink) and printed
//! through a [`CodeWriter`](crate::writer::CodeWriter), any number of times,
//! in any order.
//!
//! Emission checks the whole subtree before writing the first instruction:
//! a node that fails to emit leaves the sink exactly as it found it.

mod builder;
mod expr;
mod reference;
mod stmt;


pub use builder::NodeBuilder;
pub use expr::{BinaryOp, CompareOp, Expr, ExprInner, Literal, LogicalOp, UnaryOp};
pub use reference::{Reference, SLOT_LIMIT};
pub use stmt::{Stmt, ends_with_return};

pub(crate) use stmt::{lower_all, print_all, verify_all};
