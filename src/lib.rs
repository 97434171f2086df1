//! Stackgen - typed expression trees lowered to stack-machine bytecode
//!
//! # Overview
//!
//! Stackgen is a small code-generation toolkit. Calling code builds a tree
//! of typed expression and statement nodes, then:
//!
//! - emits it into an [`InstructionSink`] as bytecode for a managed stack
//!   machine, with implicit type conversions inserted where values cross a
//!   type boundary;
//! - renders the same tree as indented pseudo-source through a
//!   [`CodeWriter`], for debugging and golden tests.
//!
//! # Quick Start
//!
//! ```
//! use bumpalo::Bump;
//! use stackgen::{CodeBuffer, Instruction, NodeBuilder, Primitive, Type, TypeManager};
//!
//! let arena = Bump::new();
//! let types = TypeManager::new(&arena);
//! let nodes = NodeBuilder::new(&arena, types);
//!
//! // Argument 1, an i64 called `x`.
//! let x = nodes.argument(1, Type::I64, "x").unwrap();
//!
//! let mut sink = CodeBuffer::new();
//! x.emit_store(&mut sink, nodes.i32(5)).unwrap();
//! assert_eq!(
//!     sink.instructions(),
//!     &[
//!         Instruction::LdcI4S(5),
//!         Instruction::Conv(Primitive::I64),
//!         Instruction::StArg1,
//!     ]
//! );
//! ```
//!
//! # Conversions
//!
//! Implicit conversions only ever widen, box, unbox or upcast. Narrowing and
//! downcasts need an explicit cast node, which emits overflow-checked or
//! runtime-checked instructions. See [`casting`] for the full table.
//!
//! # Whole Methods
//!
//! [`MethodBuilder`] assembles arguments, locals and statements into a
//! routine and produces a [`CompiledMethod`] whose [`Code`] prints as a
//! labelled listing with `{:?}`.

pub use stackgen_core::{casting, compiler, errors, ir, types, vm, writer};

pub use stackgen_core::casting::{CastError, Conversion, ConversionMode};
pub use stackgen_core::compiler::{CompiledMethod, MethodBuilder, MethodOptions};
pub use stackgen_core::errors::{CompileError, ConfigError, OperandError};
pub use stackgen_core::ir::{
    BinaryOp, CompareOp, Expr, Literal, LogicalOp, NodeBuilder, Reference, Stmt, UnaryOp,
};
pub use stackgen_core::types::{
    ClassInfo, FieldInfo, MethodInfo, MethodKind, Primitive, Type, TypeManager,
};
pub use stackgen_core::vm::{Code, CodeBuffer, ElemKind, Instruction, InstructionSink, Label};
pub use stackgen_core::writer::{CodeWriter, WriterOptions};
