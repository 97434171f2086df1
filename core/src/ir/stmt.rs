use crate::{
    casting,
    errors::{CompileError, OperandError},
    ir::{Expr, Reference},
    types::Type,
    vm::{Instruction, InstructionSink},
    writer::CodeWriter,
};

#[derive(Debug, Clone, Copy)]
pub enum Stmt<'a> {
    /// Evaluate for side effects; a non-void result is popped.
    Expr(&'a Expr<'a>),
    Assign {
        target: Reference<'a>,
        value: &'a Expr<'a>,
    },
    Return(Option<&'a Expr<'a>>),
    If {
        cond: &'a Expr<'a>,
        then_branch: &'a [Stmt<'a>],
        else_branch: &'a [Stmt<'a>],
    },
    While {
        cond: &'a Expr<'a>,
        body: &'a [Stmt<'a>],
    },
    Block(&'a [Stmt<'a>]),
}

impl<'a> Stmt<'a> {
    /// Whether control never falls off the end of this statement.
    pub fn always_returns(&self) -> bool {
        match self {
            Stmt::Return(_) => true,
            Stmt::Block(body) => ends_with_return(body),
            Stmt::If {
                then_branch,
                else_branch,
                ..
            } => ends_with_return(then_branch) && ends_with_return(else_branch),
            _ => false,
        }
    }

    /// Check every conversion in the statement, `ret` being the enclosing
    /// method's return type.
    pub(crate) fn verify(&self, ret: Type<'a>) -> Result<(), CompileError> {
        match self {
            Stmt::Expr(expr) => expr.verify(),
            Stmt::Assign { target, value } => target.verify_store(value),
            Stmt::Return(value) => {
                let source = match value {
                    Some(value) => {
                        value.verify()?;
                        value.0
                    }
                    None => Type::Void,
                };
                // A bare `return` in a void method is the only void-to-void case.
                if !(source.is_void() && ret.is_void()) {
                    casting::classify(source, ret, casting::ConversionMode::Implicit)?;
                }
                Ok(())
            }
            Stmt::If {
                cond,
                then_branch,
                else_branch,
            } => {
                cond.verify()?;
                verify_all(then_branch, ret)?;
                verify_all(else_branch, ret)
            }
            Stmt::While { cond, body } => {
                cond.verify()?;
                verify_all(body, ret)
            }
            Stmt::Block(body) => verify_all(body, ret),
        }
    }

    pub(crate) fn lower(
        &self,
        sink: &mut dyn InstructionSink,
        ret: Type<'a>,
    ) -> Result<(), CompileError> {
        match self {
            Stmt::Expr(expr) => {
                expr.lower(sink)?;
                if !expr.0.is_void() {
                    sink.emit(Instruction::Pop);
                }
            }
            Stmt::Assign { target, value } => target.lower_store(sink, value)?,
            Stmt::Return(value) => {
                if let Some(value) = value {
                    value.lower(sink)?;
                    casting::convert(sink, value.0, ret)?;
                }
                sink.emit(Instruction::Ret);
            }
            Stmt::If {
                cond,
                then_branch,
                else_branch,
            } => {
                let otherwise = sink.define_label();
                cond.lower(sink)?;
                sink.emit(Instruction::BrFalse(otherwise));
                lower_all(sink, then_branch, ret)?;
                if else_branch.is_empty() {
                    sink.mark_label(otherwise);
                } else {
                    let end = (!ends_with_return(then_branch)).then(|| sink.define_label());
                    if let Some(end) = end {
                        sink.emit(Instruction::Br(end));
                    }
                    sink.mark_label(otherwise);
                    lower_all(sink, else_branch, ret)?;
                    if let Some(end) = end {
                        sink.mark_label(end);
                    }
                }
            }
            Stmt::While { cond, body } => {
                let start = sink.define_label();
                let end = sink.define_label();
                sink.mark_label(start);
                cond.lower(sink)?;
                sink.emit(Instruction::BrFalse(end));
                lower_all(sink, body, ret)?;
                sink.emit(Instruction::Br(start));
                sink.mark_label(end);
            }
            Stmt::Block(body) => lower_all(sink, body, ret)?,
        }
        Ok(())
    }

    pub fn print(&self, w: &mut CodeWriter) {
        match self {
            Stmt::Expr(expr) => {
                expr.print(w);
                w.write_line(";");
            }
            Stmt::Assign { target, value } => {
                target.print(w);
                w.write(" = ");
                value.print(w);
                w.write_line(";");
            }
            Stmt::Return(None) => w.write_line("return;"),
            Stmt::Return(Some(value)) => {
                w.write("return ");
                value.print(w);
                w.write_line(";");
            }
            Stmt::If {
                cond,
                then_branch,
                else_branch,
            } => {
                w.write("if ");
                print_condition(w, cond);
                w.open_scope(" {");
                print_all(w, then_branch);
                if !else_branch.is_empty() {
                    w.close_scope("} else {");
                    w.new_line();
                    w.indent();
                    print_all(w, else_branch);
                }
                w.close_scope("}");
                w.new_line();
            }
            Stmt::While { cond, body } => {
                w.write("while ");
                print_condition(w, cond);
                w.scope(" {", "}", |w| print_all(w, body));
                w.new_line();
            }
            Stmt::Block(body) => {
                w.scope("{", "}", |w| print_all(w, body));
                w.new_line();
            }
        }
    }
}

/// `(cond)`, without doubling the parentheses of an infix condition.
fn print_condition(w: &mut CodeWriter, cond: &Expr<'_>) {
    if cond.is_parenthesized() {
        cond.print(w);
    } else {
        w.write("(");
        cond.print(w);
        w.write(")");
    }
}

/// Reject conditions that are not `bool`.
pub(crate) fn check_condition(cond: &Expr<'_>) -> Result<(), OperandError> {
    if cond.0.is_bool() {
        Ok(())
    } else {
        Err(OperandError::NonBooleanCondition {
            ty: crate::format!("{}", cond.0),
        })
    }
}

pub fn ends_with_return(body: &[Stmt<'_>]) -> bool {
    body.last().is_some_and(Stmt::always_returns)
}

pub(crate) fn verify_all<'a>(body: &[Stmt<'a>], ret: Type<'a>) -> Result<(), CompileError> {
    body.iter().try_for_each(|stmt| stmt.verify(ret))
}

pub(crate) fn lower_all<'a>(
    sink: &mut dyn InstructionSink,
    body: &[Stmt<'a>],
    ret: Type<'a>,
) -> Result<(), CompileError> {
    for stmt in body {
        stmt.lower(sink, ret)?;
    }
    Ok(())
}

pub(crate) fn print_all(w: &mut CodeWriter, body: &[Stmt<'_>]) {
    for stmt in body {
        stmt.print(w);
    }
}

impl core::fmt::Display for Stmt<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let mut w = CodeWriter::new();
        self.print(&mut w);
        write!(f, "{}", w.as_str().trim_end())
    }
}
