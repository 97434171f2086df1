//! Method body builder.

use core::fmt::Write as _;

use crate::{
    String, Vec,
    errors::{CompileError, OperandError},
    ir::{self, NodeBuilder, Reference, Stmt},
    types::{ClassInfo, Type},
    vm::{CodeBuffer, Code, Instruction, InstructionSink},
    writer::{CodeWriter, WriterOptions},
    compiler::MethodOptions,
};

/// Assembles a routine: its signature, local variable table and body.
///
/// Arguments and locals are handed out as [`Reference`]s bound to their
/// slots; statements built from them are pushed in order and lowered by
/// [`compile`](Self::compile).
pub struct MethodBuilder<'a> {
    nodes: NodeBuilder<'a>,
    name: &'a str,
    owner: Option<&'a ClassInfo<'a>>,
    /// Argument references in slot order, `this` first for instance methods.
    params: Vec<Reference<'a>>,
    ret: Type<'a>,
    locals: Vec<Reference<'a>>,
    body: Vec<Stmt<'a>>,
    options: MethodOptions,
}

/// A lowered method body together with its frame layout.
#[derive(Debug)]
pub struct CompiledMethod<'a> {
    pub name: &'a str,
    /// Argument types in slot order, including `this`.
    pub params: Vec<Type<'a>>,
    pub ret: Type<'a>,
    pub locals: Vec<Type<'a>>,
    pub code: Code,
}

impl<'a> MethodBuilder<'a> {
    pub fn new_static(nodes: NodeBuilder<'a>, name: &str, ret: Type<'a>) -> Self {
        Self {
            nodes,
            name: nodes.arena().alloc_str(name),
            owner: None,
            params: Vec::new(),
            ret,
            locals: Vec::new(),
            body: Vec::new(),
            options: MethodOptions::default(),
        }
    }

    /// An instance method of `owner`; argument 0 is `this`.
    pub fn new_instance(
        nodes: NodeBuilder<'a>,
        owner: &'a ClassInfo<'a>,
        name: &str,
        ret: Type<'a>,
    ) -> Self {
        let mut method = Self::new_static(nodes, name, ret);
        method.owner = Some(owner);
        method.params.push(Reference::Argument {
            index: 0,
            ty: Type::Class(owner),
            name: "this",
        });
        method
    }

    pub fn with_options(mut self, options: MethodOptions) -> Self {
        self.options = options;
        self
    }

    pub fn nodes(&self) -> NodeBuilder<'a> {
        self.nodes
    }

    pub fn name(&self) -> &'a str {
        self.name
    }

    pub fn return_type(&self) -> Type<'a> {
        self.ret
    }

    pub fn is_static(&self) -> bool {
        self.owner.is_none()
    }

    /// Append a parameter and return the reference to its slot.
    pub fn param(&mut self, name: &str, ty: Type<'a>) -> Result<Reference<'a>, CompileError> {
        let reference = self.nodes.argument(self.params.len(), ty, name)?;
        self.params.push(reference);
        Ok(reference)
    }

    /// Argument `index`, counting `this` as argument 0 of instance methods.
    pub fn argument(&self, index: usize) -> Result<Reference<'a>, OperandError> {
        self.params
            .get(index)
            .copied()
            .ok_or(OperandError::SlotOutOfRange {
                what: "argument",
                index,
                limit: self.params.len(),
            })
    }

    pub fn this(&self) -> Option<Reference<'a>> {
        self.owner.and_then(|_| self.params.first().copied())
    }

    /// Allocate the next local slot.
    pub fn declare_local(&mut self, name: &str, ty: Type<'a>) -> Result<Reference<'a>, CompileError> {
        let slot = self.locals.len();
        let limit = self.options.max_locals as usize;
        // Type errors take precedence over running out of slots.
        let reference = self.nodes.local(slot, ty, name)?;
        if slot >= limit {
            return Err(OperandError::SlotOutOfRange {
                what: "local",
                index: slot,
                limit,
            }
            .into());
        }
        self.locals.push(reference);
        Ok(reference)
    }

    pub fn push(&mut self, stmt: Stmt<'a>) {
        self.body.push(stmt);
    }

    pub fn body(&self) -> &[Stmt<'a>] {
        &self.body
    }

    /// Lower the body into a fresh [`CodeBuffer`].
    ///
    /// Void methods that fall off the end get an implicit `ret`; any other
    /// method must end in a `return` on every path.
    pub fn compile(&self) -> Result<CompiledMethod<'a>, CompileError> {
        ir::verify_all(&self.body, self.ret)?;
        let falls_through = !ir::ends_with_return(&self.body);
        if falls_through && !self.ret.is_void() {
            return Err(CompileError::MissingReturn {
                method: String::from(self.name),
            });
        }

        let mut buffer = CodeBuffer::new();
        ir::lower_all(&mut buffer, &self.body, self.ret)?;
        if falls_through {
            buffer.emit(Instruction::Ret);
        }
        let code = buffer.finish()?;

        tracing::debug!(
            method = self.name,
            instructions = code.instructions.len(),
            bytes = code.byte_len(),
            max_stack = code.max_stack_size,
            traps = code.instructions.iter().filter(|i| i.can_trap()).count(),
            "compiled method"
        );

        Ok(CompiledMethod {
            name: self.name,
            params: self.params.iter().map(Reference::static_type).collect(),
            ret: self.ret,
            locals: self.locals.iter().map(Reference::static_type).collect(),
            code,
        })
    }

    /// Render the whole routine: signature, local declarations and body.
    pub fn print(&self, w: &mut CodeWriter) {
        if self.is_static() {
            w.write("static ");
        }
        let _ = write!(w, "{} {}(", self.ret, self.name);
        let skip = if self.is_static() { 0 } else { 1 };
        for (i, param) in self.params.iter().skip(skip).enumerate() {
            if i > 0 {
                w.write(", ");
            }
            let _ = write!(w, "{} ", param.static_type());
            param.print(w);
        }
        w.open_scope(") {");
        for local in &self.locals {
            let _ = write!(w, "{} ", local.static_type());
            local.print(w);
            w.write_line(";");
        }
        ir::print_all(w, &self.body);
        w.close_scope("}");
    }

    pub fn to_source(&self, options: WriterOptions) -> String {
        let mut w = CodeWriter::with_options(options);
        self.print(&mut w);
        w.finish()
    }
}
