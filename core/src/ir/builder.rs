use bumpalo::Bump;

use crate::{
    casting,
    errors::{CompileError, OperandError},
    ir::{
        BinaryOp, CompareOp, Expr, ExprInner, Literal, LogicalOp, Reference, Stmt, UnaryOp,
        reference::is_index_type, stmt::check_condition,
    },
    types::{ClassInfo, FieldInfo, MethodInfo, MethodKind, Primitive, Type, TypeManager},
};

/// Allocates nodes in the arena, checking operands as each node is built.
///
/// Every node's static type is computed here, once; composite constructors
/// fail with an [`OperandError`] rather than producing a node that could
/// never be emitted.
#[derive(Clone, Copy)]
pub struct NodeBuilder<'a> {
    arena: &'a Bump,
    types: &'a TypeManager<'a>,
}

impl<'a> NodeBuilder<'a> {
    pub fn new(arena: &'a Bump, types: &'a TypeManager<'a>) -> Self {
        Self { arena, types }
    }

    pub fn arena(&self) -> &'a Bump {
        self.arena
    }

    pub fn types(&self) -> &'a TypeManager<'a> {
        self.types
    }

    fn alloc(&self, ty: Type<'a>, inner: ExprInner<'a>) -> &'a Expr<'a> {
        self.arena.alloc(Expr(ty, inner))
    }

    fn literal(&self, ty: Type<'a>, literal: Literal<'a>) -> &'a Expr<'a> {
        self.alloc(ty, ExprInner::Literal(literal))
    }

    // === Literals ===

    pub fn bool(&self, value: bool) -> &'a Expr<'a> {
        self.literal(Type::BOOL, Literal::Bool(value))
    }

    pub fn char(&self, unit: u16) -> &'a Expr<'a> {
        self.literal(Type::CHAR, Literal::Char(unit))
    }

    pub fn i32(&self, value: i32) -> &'a Expr<'a> {
        self.literal(Type::I32, Literal::I32(value))
    }

    pub fn i64(&self, value: i64) -> &'a Expr<'a> {
        self.literal(Type::I64, Literal::I64(value))
    }

    pub fn f32(&self, value: f32) -> &'a Expr<'a> {
        self.literal(Type::F32, Literal::F32(value))
    }

    pub fn f64(&self, value: f64) -> &'a Expr<'a> {
        self.literal(Type::F64, Literal::F64(value))
    }

    pub fn str(&self, value: &str) -> &'a Expr<'a> {
        let value = self.arena.alloc_str(value);
        self.literal(self.types.string_type(), Literal::Str(value))
    }

    pub fn null(&self) -> &'a Expr<'a> {
        self.literal(Type::Null, Literal::Null)
    }

    // === References ===

    pub fn argument(
        &self,
        index: usize,
        ty: Type<'a>,
        name: &str,
    ) -> Result<Reference<'a>, CompileError> {
        Reference::argument(index, ty, self.arena.alloc_str(name))
    }

    pub fn local(&self, slot: usize, ty: Type<'a>, name: &str) -> Result<Reference<'a>, CompileError> {
        Reference::local(slot, ty, self.arena.alloc_str(name))
    }

    pub fn field(
        &self,
        field: &'a FieldInfo<'a>,
        target: Option<&'a Expr<'a>>,
    ) -> Result<Reference<'a>, CompileError> {
        Reference::field(field, target)
    }

    pub fn element(
        &self,
        array: &'a Expr<'a>,
        index: &'a Expr<'a>,
    ) -> Result<Reference<'a>, CompileError> {
        Reference::array_element(array, index)
    }

    /// Read a storage location.
    pub fn load(&self, reference: Reference<'a>) -> &'a Expr<'a> {
        self.alloc(reference.static_type(), ExprInner::Load(reference))
    }

    // === Operators ===

    pub fn unary(&self, op: UnaryOp, operand: &'a Expr<'a>) -> Result<&'a Expr<'a>, OperandError> {
        let ty = value_type(operand)?;
        let symbol = match op {
            UnaryOp::Neg => "-",
            UnaryOp::Not => "!",
        };
        let result = match (op, ty.primitive()) {
            (UnaryOp::Not, Some(Primitive::Bool)) => Type::BOOL,
            (UnaryOp::Neg, Some(p)) if p.is_numeric() => promoted(p, p),
            (UnaryOp::Not, Some(p)) if p.is_integral() => promoted(p, p),
            _ => return Err(invalid_operand(symbol, ty)),
        };
        Ok(self.alloc(result, ExprInner::Unary { op, operand }))
    }

    pub fn binary(
        &self,
        op: BinaryOp,
        left: &'a Expr<'a>,
        right: &'a Expr<'a>,
    ) -> Result<&'a Expr<'a>, OperandError> {
        let (l, r) = (value_type(left)?, value_type(right)?);
        let result = match (l.primitive(), r.primitive()) {
            (Some(Primitive::Bool), Some(Primitive::Bool)) if op.is_bitwise() => Type::BOOL,
            (Some(a), Some(b)) if op.is_bitwise() && a.is_integral() && b.is_integral() => {
                promoted(a, b)
            }
            (Some(a), Some(b)) if !op.is_bitwise() && a.is_numeric() && b.is_numeric() => {
                promoted(a, b)
            }
            _ => return Err(mismatched(op.symbol(), l, r)),
        };
        Ok(self.alloc(result, ExprInner::Binary { op, left, right }))
    }

    pub fn compare(
        &self,
        op: CompareOp,
        left: &'a Expr<'a>,
        right: &'a Expr<'a>,
    ) -> Result<&'a Expr<'a>, OperandError> {
        let (l, r) = (value_type(left)?, value_type(right)?);
        let operand = match (l.primitive(), r.primitive()) {
            (Some(a), Some(b)) if a.is_numeric() && b.is_numeric() => casting::promote(a, b),
            (Some(Primitive::Bool), Some(Primitive::Bool)) if op.is_equality() => None,
            (None, None)
                if op.is_equality()
                    && (l == r || l.is_assignable_to(&r) || r.is_assignable_to(&l)) =>
            {
                None
            }
            _ => return Err(mismatched(op.symbol(), l, r)),
        };
        Ok(self.alloc(
            Type::BOOL,
            ExprInner::Compare {
                op,
                operand,
                left,
                right,
            },
        ))
    }

    pub fn logical(
        &self,
        op: LogicalOp,
        left: &'a Expr<'a>,
        right: &'a Expr<'a>,
    ) -> Result<&'a Expr<'a>, OperandError> {
        let (l, r) = (value_type(left)?, value_type(right)?);
        if !l.is_bool() || !r.is_bool() {
            return Err(mismatched(op.symbol(), l, r));
        }
        Ok(self.alloc(Type::BOOL, ExprInner::Logical { op, left, right }))
    }

    // === Objects and arrays ===

    /// Call a static, instance or virtual method. `target` is required
    /// exactly when the method has a `this`.
    pub fn call(
        &self,
        method: &'a MethodInfo<'a>,
        target: Option<&'a Expr<'a>>,
        args: &[&'a Expr<'a>],
    ) -> Result<&'a Expr<'a>, OperandError> {
        let name = || crate::format!("{}.{}", method.owner.name, method.name);
        if method.kind == MethodKind::Constructor {
            return Err(OperandError::ConstructorCall { method: name() });
        }
        match (method.has_this(), target) {
            (true, None) => {
                return Err(OperandError::MissingTarget {
                    what: "method",
                    name: name(),
                });
            }
            (false, Some(_)) => {
                return Err(OperandError::UnexpectedTarget {
                    what: "method",
                    name: name(),
                });
            }
            (true, Some(target)) => {
                let ty = value_type(target)?;
                let owner = Type::Class(method.owner);
                if ty != owner && !ty.is_assignable_to(&owner) {
                    return Err(invalid_operand(".", ty));
                }
            }
            (false, None) => {}
        }
        let args = self.check_args(method, args)?;
        Ok(self.alloc(
            method.ret,
            ExprInner::Call {
                method,
                target,
                args,
            },
        ))
    }

    pub fn new_object(
        &self,
        ctor: &'a MethodInfo<'a>,
        args: &[&'a Expr<'a>],
    ) -> Result<&'a Expr<'a>, OperandError> {
        if ctor.kind != MethodKind::Constructor {
            return Err(OperandError::NotAConstructor {
                method: crate::format!("{}.{}", ctor.owner.name, ctor.name),
            });
        }
        let args = self.check_args(ctor, args)?;
        Ok(self.alloc(Type::Class(ctor.owner), ExprInner::New { ctor, args }))
    }

    pub fn new_array(
        &self,
        elem: Type<'a>,
        length: &'a Expr<'a>,
    ) -> Result<&'a Expr<'a>, CompileError> {
        let ty = self.types.array(elem)?;
        if !is_index_type(length.0) {
            return Err(invalid_operand("new[]", length.0).into());
        }
        Ok(self.alloc(ty, ExprInner::NewArray { length }))
    }

    pub fn array_length(&self, array: &'a Expr<'a>) -> Result<&'a Expr<'a>, OperandError> {
        if array.0.element().is_none() {
            return Err(OperandError::NotAnArray {
                ty: crate::format!("{}", array.0),
            });
        }
        Ok(self.alloc(Type::I32, ExprInner::ArrayLength { array }))
    }

    /// Explicit conversion. Whether one exists is only decided at emission.
    pub fn cast(&self, target: Type<'a>, operand: &'a Expr<'a>) -> Result<&'a Expr<'a>, OperandError> {
        value_type(operand)?;
        Ok(self.alloc(target, ExprInner::Cast { operand }))
    }

    pub fn instance_of(
        &self,
        operand: &'a Expr<'a>,
        class: &'a ClassInfo<'a>,
    ) -> Result<&'a Expr<'a>, OperandError> {
        let ty = value_type(operand)?;
        if !ty.is_reference() {
            return Err(invalid_operand("is", ty));
        }
        Ok(self.alloc(Type::BOOL, ExprInner::InstanceOf { operand, class }))
    }

    fn check_args(
        &self,
        method: &'a MethodInfo<'a>,
        args: &[&'a Expr<'a>],
    ) -> Result<&'a [&'a Expr<'a>], OperandError> {
        if args.len() != method.params.len() {
            return Err(OperandError::ArgumentCount {
                method: crate::format!("{}.{}", method.owner.name, method.name),
                expected: method.params.len(),
                received: args.len(),
            });
        }
        for arg in args {
            value_type(arg)?;
        }
        Ok(self.arena.alloc_slice_copy(args))
    }

    // === Statements ===

    pub fn expr_stmt(&self, expr: &'a Expr<'a>) -> Stmt<'a> {
        Stmt::Expr(expr)
    }

    pub fn assign(&self, target: Reference<'a>, value: &'a Expr<'a>) -> Result<Stmt<'a>, OperandError> {
        value_type(value)?;
        Ok(Stmt::Assign { target, value })
    }

    pub fn ret(&self, value: Option<&'a Expr<'a>>) -> Stmt<'a> {
        Stmt::Return(value)
    }

    pub fn if_else(
        &self,
        cond: &'a Expr<'a>,
        then_branch: &[Stmt<'a>],
        else_branch: &[Stmt<'a>],
    ) -> Result<Stmt<'a>, OperandError> {
        check_condition(cond)?;
        Ok(Stmt::If {
            cond,
            then_branch: self.arena.alloc_slice_copy(then_branch),
            else_branch: self.arena.alloc_slice_copy(else_branch),
        })
    }

    pub fn while_loop(&self, cond: &'a Expr<'a>, body: &[Stmt<'a>]) -> Result<Stmt<'a>, OperandError> {
        check_condition(cond)?;
        Ok(Stmt::While {
            cond,
            body: self.arena.alloc_slice_copy(body),
        })
    }

    pub fn block(&self, body: &[Stmt<'a>]) -> Stmt<'a> {
        Stmt::Block(self.arena.alloc_slice_copy(body))
    }
}

/// Type of an operand that must produce a value.
fn value_type<'a>(expr: &Expr<'a>) -> Result<Type<'a>, OperandError> {
    if expr.0.is_void() {
        return Err(OperandError::VoidValue);
    }
    Ok(expr.0)
}

fn promoted(a: Primitive, b: Primitive) -> Type<'static> {
    // Only reached with numeric operands, for which promotion always exists.
    Type::Primitive(casting::promote(a, b).unwrap_or(Primitive::I32))
}

fn invalid_operand(op: &'static str, ty: Type<'_>) -> OperandError {
    OperandError::InvalidOperandType {
        op,
        ty: crate::format!("{}", ty),
    }
}

fn mismatched(op: &'static str, left: Type<'_>, right: Type<'_>) -> OperandError {
    OperandError::MismatchedOperands {
        op,
        left: crate::format!("{}", left),
        right: crate::format!("{}", right),
    }
}
