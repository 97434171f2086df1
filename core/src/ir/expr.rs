use core::fmt::Write as _;

use crate::{
    casting::{self, ConversionMode},
    errors::CompileError,
    ir::Reference,
    types::{ClassInfo, MethodInfo, MethodKind, Primitive, Type},
    vm::{CallSite, ElemKind, Instruction, InstructionSink},
    writer::CodeWriter,
};

/// A typed expression node. The type is fixed when the node is built.
#[derive(Debug)]
pub struct Expr<'a>(pub Type<'a>, pub ExprInner<'a>);

#[derive(Debug)]
pub enum ExprInner<'a> {
    Literal(Literal<'a>),
    Load(Reference<'a>),
    Unary {
        op: UnaryOp,
        operand: &'a Expr<'a>,
    },
    /// Arithmetic or bitwise operation; both operands are converted to the
    /// node's own type first.
    Binary {
        op: BinaryOp,
        left: &'a Expr<'a>,
        right: &'a Expr<'a>,
    },
    Compare {
        op: CompareOp,
        /// Promoted numeric kind, `None` for bool and reference equality.
        operand: Option<Primitive>,
        left: &'a Expr<'a>,
        right: &'a Expr<'a>,
    },
    Logical {
        op: LogicalOp,
        left: &'a Expr<'a>,
        right: &'a Expr<'a>,
    },
    Call {
        method: &'a MethodInfo<'a>,
        target: Option<&'a Expr<'a>>,
        args: &'a [&'a Expr<'a>],
    },
    New {
        ctor: &'a MethodInfo<'a>,
        args: &'a [&'a Expr<'a>],
    },
    NewArray {
        length: &'a Expr<'a>,
    },
    ArrayLength {
        array: &'a Expr<'a>,
    },
    Cast {
        operand: &'a Expr<'a>,
    },
    InstanceOf {
        operand: &'a Expr<'a>,
        class: &'a ClassInfo<'a>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Literal<'a> {
    Bool(bool),
    /// UTF-16 code unit.
    Char(u16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Str(&'a str),
    Null,
}

impl Literal<'_> {
    fn emit(&self, sink: &mut dyn InstructionSink) {
        let instruction = match *self {
            Literal::Bool(value) => Instruction::LdcI4S(value as i8),
            Literal::Char(unit) => Instruction::load_i32(unit as i32),
            Literal::I32(value) => Instruction::load_i32(value),
            Literal::I64(value) => Instruction::LdcI8(value),
            Literal::F32(value) => Instruction::LdcR4(value),
            Literal::F64(value) => Instruction::LdcR8(value),
            Literal::Str(value) => Instruction::LdStr(sink.intern_string(value)),
            Literal::Null => Instruction::LdNull,
        };
        sink.emit(instruction);
    }

    /// Prints with a leading `-`.
    fn is_negative(&self) -> bool {
        match *self {
            Literal::I32(value) => value < 0,
            Literal::I64(value) => value < 0,
            Literal::F32(value) => value.is_sign_negative(),
            Literal::F64(value) => value.is_sign_negative(),
            _ => false,
        }
    }

    fn print(&self, w: &mut CodeWriter) {
        let _ = match *self {
            Literal::Bool(value) => write!(w, "{}", value),
            Literal::Char(unit) => match char::from_u32(unit as u32) {
                Some(c) => write!(w, "'{}'", c.escape_default()),
                None => write!(w, "'\\u{{{:x}}}'", unit),
            },
            Literal::I32(value) => write!(w, "{}", value),
            Literal::I64(value) => write!(w, "{}L", value),
            Literal::F32(value) => write!(w, "{:?}f", value),
            Literal::F64(value) => write!(w, "{:?}", value),
            Literal::Str(value) => write!(w, "\"{}\"", value.escape_default()),
            Literal::Null => write!(w, "null"),
        };
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    /// Logical not on `bool`, bitwise complement on integers.
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    And,
    Or,
    Xor,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::And => "&",
            BinaryOp::Or => "|",
            BinaryOp::Xor => "^",
        }
    }

    pub fn is_bitwise(self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or | BinaryOp::Xor)
    }

    fn instruction(self) -> Instruction {
        match self {
            BinaryOp::Add => Instruction::Add,
            BinaryOp::Sub => Instruction::Sub,
            BinaryOp::Mul => Instruction::Mul,
            BinaryOp::Div => Instruction::Div,
            BinaryOp::Rem => Instruction::Rem,
            BinaryOp::And => Instruction::And,
            BinaryOp::Or => Instruction::Or,
            BinaryOp::Xor => Instruction::Xor,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    pub fn symbol(self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }

    pub fn is_equality(self) -> bool {
        matches!(self, CompareOp::Eq | CompareOp::Ne)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

impl LogicalOp {
    pub fn symbol(self) -> &'static str {
        match self {
            LogicalOp::And => "&&",
            LogicalOp::Or => "||",
        }
    }
}

impl<'a> Expr<'a> {
    pub fn static_type(&self) -> Type<'a> {
        self.0
    }

    /// Emit the instructions leaving this node's value on the stack.
    ///
    /// The whole subtree is checked before the first instruction is written,
    /// so on error the sink is left as it was.
    pub fn emit_load(&self, sink: &mut dyn InstructionSink) -> Result<(), CompileError> {
        self.verify()?;
        self.lower(sink)
    }

    /// Render as pseudo-source.
    pub fn print(&self, w: &mut CodeWriter) {
        match &self.1 {
            ExprInner::Literal(literal) => literal.print(w),
            ExprInner::Load(reference) => reference.print(w),
            ExprInner::Unary { op, operand } => {
                let symbol = match op {
                    UnaryOp::Neg => "-",
                    UnaryOp::Not if operand.0.is_bool() => "!",
                    UnaryOp::Not => "~",
                };
                w.write(symbol);
                if operand.needs_unary_parens() {
                    w.write("(");
                    operand.print(w);
                    w.write(")");
                } else {
                    operand.print(w);
                }
            }
            ExprInner::Binary { op, left, right } => print_infix(w, left, op.symbol(), right),
            ExprInner::Compare {
                op, left, right, ..
            } => print_infix(w, left, op.symbol(), right),
            ExprInner::Logical { op, left, right } => print_infix(w, left, op.symbol(), right),
            ExprInner::Call {
                method,
                target,
                args,
            } => {
                match target {
                    Some(target) => target.print(w),
                    None => w.write(method.owner.name),
                }
                w.write(".");
                w.write(method.name);
                print_args(w, args);
            }
            ExprInner::New { ctor, args } => {
                w.write("new ");
                w.write(ctor.owner.name);
                print_args(w, args);
            }
            ExprInner::NewArray { length } => {
                let elem = self.0.element().unwrap_or(Type::Void);
                let _ = write!(w, "new {}[", elem);
                length.print(w);
                w.write("]");
            }
            ExprInner::ArrayLength { array } => {
                array.print(w);
                w.write(".length");
            }
            ExprInner::Cast { operand } => {
                let _ = write!(w, "(({}) ", self.0);
                operand.print(w);
                w.write(")");
            }
            ExprInner::InstanceOf { operand, class } => {
                w.write("(");
                operand.print(w);
                w.write(" is ");
                w.write(class.name);
                w.write(")");
            }
        }
    }

    /// Whether [`print`](Self::print) already wraps the whole node in
    /// parentheses.
    pub fn is_parenthesized(&self) -> bool {
        matches!(
            self.1,
            ExprInner::Binary { .. }
                | ExprInner::Compare { .. }
                | ExprInner::Logical { .. }
                | ExprInner::Cast { .. }
                | ExprInner::InstanceOf { .. }
        )
    }

    /// A prefix operator glued to another prefix operator or to a negative
    /// literal would read as `--x`.
    fn needs_unary_parens(&self) -> bool {
        match &self.1 {
            ExprInner::Unary { .. } => true,
            ExprInner::Literal(literal) => literal.is_negative(),
            _ => false,
        }
    }

    /// Leaves print on one line and need no argument scope inside a call.
    pub fn is_leaf(&self) -> bool {
        match &self.1 {
            ExprInner::Literal(_) => true,
            ExprInner::Load(reference) => reference.is_simple(),
            _ => false,
        }
    }

    /// Check every conversion in the subtree without emitting anything.
    pub(crate) fn verify(&self) -> Result<(), CompileError> {
        match &self.1 {
            ExprInner::Literal(_) => Ok(()),
            ExprInner::Load(reference) => reference.verify_load(),
            ExprInner::Unary { op, operand } => {
                operand.verify()?;
                if !(*op == UnaryOp::Not && self.0.is_bool()) {
                    casting::classify(operand.0, self.0, ConversionMode::Implicit)?;
                }
                Ok(())
            }
            ExprInner::Binary { left, right, .. } => {
                left.verify()?;
                right.verify()?;
                casting::classify(left.0, self.0, ConversionMode::Implicit)?;
                casting::classify(right.0, self.0, ConversionMode::Implicit)?;
                Ok(())
            }
            ExprInner::Compare {
                operand,
                left,
                right,
                ..
            } => {
                left.verify()?;
                right.verify()?;
                if let Some(p) = operand {
                    let common = Type::Primitive(*p);
                    casting::classify(left.0, common, ConversionMode::Implicit)?;
                    casting::classify(right.0, common, ConversionMode::Implicit)?;
                }
                Ok(())
            }
            ExprInner::Logical { left, right, .. } => {
                left.verify()?;
                right.verify()
            }
            ExprInner::Call {
                method,
                target,
                args,
            } => {
                if let Some(target) = target {
                    target.verify()?;
                }
                verify_args(method, args)
            }
            ExprInner::New { ctor, args } => verify_args(ctor, args),
            ExprInner::NewArray { length } => length.verify(),
            ExprInner::ArrayLength { array } => array.verify(),
            ExprInner::Cast { operand } => {
                operand.verify()?;
                casting::classify(operand.0, self.0, ConversionMode::Explicit)?;
                Ok(())
            }
            ExprInner::InstanceOf { operand, .. } => operand.verify(),
        }
    }

    /// Emit without checking first. Only called on verified subtrees.
    pub(crate) fn lower(&self, sink: &mut dyn InstructionSink) -> Result<(), CompileError> {
        match &self.1 {
            ExprInner::Literal(literal) => literal.emit(sink),
            ExprInner::Load(reference) => reference.lower_load(sink)?,
            ExprInner::Unary { op, operand } => {
                operand.lower(sink)?;
                match op {
                    UnaryOp::Neg => {
                        casting::convert(sink, operand.0, self.0)?;
                        sink.emit(Instruction::Neg);
                    }
                    UnaryOp::Not if self.0.is_bool() => {
                        sink.emit(Instruction::LdcI4S(0));
                        sink.emit(Instruction::Ceq);
                    }
                    UnaryOp::Not => {
                        casting::convert(sink, operand.0, self.0)?;
                        sink.emit(Instruction::Not);
                    }
                }
            }
            ExprInner::Binary { op, left, right } => {
                left.lower(sink)?;
                casting::convert(sink, left.0, self.0)?;
                right.lower(sink)?;
                casting::convert(sink, right.0, self.0)?;
                sink.emit(op.instruction());
            }
            ExprInner::Compare {
                op,
                operand,
                left,
                right,
            } => {
                left.lower(sink)?;
                if let Some(p) = operand {
                    casting::convert(sink, left.0, Type::Primitive(*p))?;
                }
                right.lower(sink)?;
                if let Some(p) = operand {
                    casting::convert(sink, right.0, Type::Primitive(*p))?;
                }
                let floating = operand.is_some_and(Primitive::is_floating);
                emit_comparison(sink, *op, floating);
            }
            ExprInner::Logical { op, left, right } => {
                // Leaves the deciding operand on the stack when it short-circuits.
                let end = sink.define_label();
                left.lower(sink)?;
                sink.emit(Instruction::Dup);
                sink.emit(match op {
                    LogicalOp::And => Instruction::BrFalse(end),
                    LogicalOp::Or => Instruction::BrTrue(end),
                });
                sink.emit(Instruction::Pop);
                right.lower(sink)?;
                sink.mark_label(end);
            }
            ExprInner::Call {
                method,
                target,
                args,
            } => {
                if let Some(target) = target {
                    target.lower(sink)?;
                }
                lower_args(sink, method, args)?;
                let site = call_site(method);
                sink.emit(match method.kind {
                    MethodKind::Virtual => Instruction::CallVirt(site),
                    _ => Instruction::Call(site),
                });
            }
            ExprInner::New { ctor, args } => {
                lower_args(sink, ctor, args)?;
                sink.emit(Instruction::NewObj(call_site(ctor)));
            }
            ExprInner::NewArray { length } => {
                length.lower(sink)?;
                let elem = self.0.element().unwrap_or(Type::Void);
                sink.emit(Instruction::NewArr(ElemKind::of(elem)));
            }
            ExprInner::ArrayLength { array } => {
                array.lower(sink)?;
                sink.emit(Instruction::LdLen);
            }
            ExprInner::Cast { operand } => {
                operand.lower(sink)?;
                casting::convert_explicit(sink, operand.0, self.0)?;
            }
            ExprInner::InstanceOf { operand, class } => {
                operand.lower(sink)?;
                sink.emit(Instruction::IsInst(class.id));
                sink.emit(Instruction::LdNull);
                sink.emit(Instruction::CgtUn);
            }
        }
        Ok(())
    }
}

fn print_infix(w: &mut CodeWriter, left: &Expr<'_>, symbol: &str, right: &Expr<'_>) {
    w.write("(");
    left.print(w);
    let _ = write!(w, " {} ", symbol);
    right.print(w);
    w.write(")");
}

/// Arguments print inline when they are all leaves, otherwise one per line
/// in a nested scope.
fn print_args(w: &mut CodeWriter, args: &[&Expr<'_>]) {
    if args.iter().all(|arg| arg.is_leaf()) {
        w.write("(");
        for (i, arg) in args.iter().enumerate() {
            if i > 0 {
                w.write(", ");
            }
            arg.print(w);
        }
        w.write(")");
        return;
    }

    w.open_scope("(");
    for (i, arg) in args.iter().enumerate() {
        arg.print(w);
        if i + 1 < args.len() {
            w.write(",");
        }
        w.new_line();
    }
    w.close_scope(")");
}

fn verify_args(method: &MethodInfo<'_>, args: &[&Expr<'_>]) -> Result<(), CompileError> {
    for (arg, param) in args.iter().zip(method.params) {
        arg.verify()?;
        casting::classify(arg.0, *param, ConversionMode::Implicit)?;
    }
    Ok(())
}

fn lower_args(
    sink: &mut dyn InstructionSink,
    method: &MethodInfo<'_>,
    args: &[&Expr<'_>],
) -> Result<(), CompileError> {
    for (arg, param) in args.iter().zip(method.params) {
        arg.lower(sink)?;
        casting::convert(sink, arg.0, *param)?;
    }
    Ok(())
}

fn call_site(method: &MethodInfo<'_>) -> CallSite {
    let this = if method.has_this() { 1 } else { 0 };
    let pushes = match method.kind {
        MethodKind::Constructor => 1,
        _ if method.ret.is_void() => 0,
        _ => 1,
    };
    CallSite {
        method: method.id,
        pops: (method.params.len() + this) as u16,
        pushes,
    }
}

/// The machine only has `ceq`, `clt` and `cgt`; the rest are negations.
/// `<=` on floats negates the unordered `>` so that NaN compares false.
fn emit_comparison(sink: &mut dyn InstructionSink, op: CompareOp, floating: bool) {
    fn negate(sink: &mut dyn InstructionSink) {
        sink.emit(Instruction::LdcI4S(0));
        sink.emit(Instruction::Ceq);
    }

    match op {
        CompareOp::Eq => sink.emit(Instruction::Ceq),
        CompareOp::Ne => {
            sink.emit(Instruction::Ceq);
            negate(sink);
        }
        CompareOp::Lt => sink.emit(Instruction::Clt),
        CompareOp::Gt => sink.emit(Instruction::Cgt),
        CompareOp::Le => {
            sink.emit(if floating {
                Instruction::CgtUn
            } else {
                Instruction::Cgt
            });
            negate(sink);
        }
        CompareOp::Ge => {
            sink.emit(if floating {
                Instruction::CltUn
            } else {
                Instruction::Clt
            });
            negate(sink);
        }
    }
}
