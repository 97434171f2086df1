//! Target instruction set, the sink nodes emit into, and finished code.

mod code;
mod instruction_set;
mod sink;

pub use code::Code;
pub use instruction_set::{CallSite, ElemKind, Instruction, Label};
pub use sink::{CodeBuffer, InstructionSink};
