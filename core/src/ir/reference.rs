//! Addressable storage locations: arguments, locals, fields and array
//! elements.
//!
//! Every constructor rejects a `void` declared type on the spot; nothing
//! about a reference is left to be discovered at emission time except
//! conversions of the value being stored.

use crate::{
    String,
    casting::{self, ConversionMode},
    errors::{CompileError, ConfigError, OperandError},
    ir::Expr,
    types::{FieldInfo, Type},
    vm::{ElemKind, Instruction, InstructionSink},
    writer::CodeWriter,
};

/// Largest slot count the instruction encoding can address.
pub const SLOT_LIMIT: usize = u16::MAX as usize + 1;

#[derive(Debug, Clone, Copy)]
pub enum Reference<'a> {
    Argument {
        index: u16,
        ty: Type<'a>,
        name: &'a str,
    },
    Local {
        slot: u16,
        ty: Type<'a>,
        name: &'a str,
    },
    /// Static when `target` is `None`.
    Field {
        field: &'a FieldInfo<'a>,
        target: Option<&'a Expr<'a>>,
    },
    ArrayElement {
        array: &'a Expr<'a>,
        index: &'a Expr<'a>,
        elem: Type<'a>,
    },
}

impl<'a> Reference<'a> {
    pub fn argument(index: usize, ty: Type<'a>, name: &'a str) -> Result<Self, CompileError> {
        check_declared("argument", name, ty)?;
        let index = check_slot("argument", index)?;
        Ok(Reference::Argument { index, ty, name })
    }

    pub fn local(slot: usize, ty: Type<'a>, name: &'a str) -> Result<Self, CompileError> {
        check_declared("local", name, ty)?;
        let slot = check_slot("local", slot)?;
        Ok(Reference::Local { slot, ty, name })
    }

    /// Reference to `field`, read through `target` for instance fields.
    pub fn field(
        field: &'a FieldInfo<'a>,
        target: Option<&'a Expr<'a>>,
    ) -> Result<Self, CompileError> {
        let qualified = || crate::format!("{}.{}", field.owner.name, field.name);
        check_declared("field", &qualified(), field.ty)?;

        match (field.is_static, target) {
            (true, Some(_)) => {
                return Err(OperandError::UnexpectedTarget {
                    what: "field",
                    name: qualified(),
                }
                .into());
            }
            (false, None) => {
                return Err(OperandError::MissingTarget {
                    what: "field",
                    name: qualified(),
                }
                .into());
            }
            (false, Some(target)) => {
                let owner = Type::Class(field.owner);
                if target.0.is_void() {
                    return Err(OperandError::VoidValue.into());
                }
                if target.0 != owner && !target.0.is_assignable_to(&owner) {
                    return Err(OperandError::InvalidOperandType {
                        op: ".",
                        ty: crate::format!("{}", target.0),
                    }
                    .into());
                }
            }
            (true, None) => {}
        }
        Ok(Reference::Field { field, target })
    }

    pub fn array_element(array: &'a Expr<'a>, index: &'a Expr<'a>) -> Result<Self, CompileError> {
        let elem = array.0.element().ok_or_else(|| OperandError::NotAnArray {
            ty: crate::format!("{}", array.0),
        })?;
        check_declared("array element", &crate::format!("{}", array.0), elem)?;
        if !is_index_type(index.0) {
            return Err(OperandError::InvalidIndexType {
                ty: crate::format!("{}", index.0),
            }
            .into());
        }
        Ok(Reference::ArrayElement { array, index, elem })
    }

    pub fn static_type(&self) -> Type<'a> {
        match self {
            Reference::Argument { ty, .. } | Reference::Local { ty, .. } => *ty,
            Reference::Field { field, .. } => field.ty,
            Reference::ArrayElement { elem, .. } => *elem,
        }
    }

    /// Arguments, locals and static fields: no sub-expressions to evaluate.
    pub fn is_simple(&self) -> bool {
        matches!(
            self,
            Reference::Argument { .. } | Reference::Local { .. } | Reference::Field { target: None, .. }
        )
    }

    pub fn emit_load(&self, sink: &mut dyn InstructionSink) -> Result<(), CompileError> {
        self.verify_load()?;
        self.lower_load(sink)
    }

    /// Assign `value` to this location.
    ///
    /// Emits, in order: the location prefix (instance target, or array and
    /// index), the value, its conversion to this reference's type and the
    /// store. If no implicit conversion exists nothing is emitted.
    pub fn emit_store(
        &self,
        sink: &mut dyn InstructionSink,
        value: &Expr<'a>,
    ) -> Result<(), CompileError> {
        self.verify_store(value)?;
        self.lower_store(sink, value)
    }

    pub fn print(&self, w: &mut CodeWriter) {
        match self {
            Reference::Argument { name, .. } | Reference::Local { name, .. } => w.write(name),
            Reference::Field { field, target } => {
                match target {
                    Some(target) => target.print(w),
                    None => w.write(field.owner.name),
                }
                w.write(".");
                w.write(field.name);
            }
            Reference::ArrayElement { array, index, .. } => {
                array.print(w);
                w.write("[");
                index.print(w);
                w.write("]");
            }
        }
    }

    pub(crate) fn verify_load(&self) -> Result<(), CompileError> {
        match self {
            Reference::Argument { .. } | Reference::Local { .. } => Ok(()),
            Reference::Field { target, .. } => match target {
                Some(target) => target.verify(),
                None => Ok(()),
            },
            Reference::ArrayElement { array, index, .. } => {
                array.verify()?;
                index.verify()
            }
        }
    }

    pub(crate) fn verify_store(&self, value: &Expr<'a>) -> Result<(), CompileError> {
        if value.0.is_void() {
            return Err(OperandError::VoidValue.into());
        }
        self.verify_load()?;
        value.verify()?;
        casting::classify(value.0, self.static_type(), ConversionMode::Implicit)?;
        Ok(())
    }

    pub(crate) fn lower_load(&self, sink: &mut dyn InstructionSink) -> Result<(), CompileError> {
        match self {
            Reference::Argument { index, .. } => sink.emit(Instruction::load_arg(*index)),
            Reference::Local { slot, .. } => sink.emit(Instruction::load_local(*slot)),
            Reference::Field { field, target } => match target {
                Some(target) => {
                    target.lower(sink)?;
                    sink.emit(Instruction::LdFld(field.id));
                }
                None => sink.emit(Instruction::LdsFld(field.id)),
            },
            Reference::ArrayElement { array, index, elem } => {
                array.lower(sink)?;
                index.lower(sink)?;
                sink.emit(Instruction::LdElem(ElemKind::of(*elem)));
            }
        }
        Ok(())
    }

    pub(crate) fn lower_store(
        &self,
        sink: &mut dyn InstructionSink,
        value: &Expr<'a>,
    ) -> Result<(), CompileError> {
        match self {
            Reference::Field {
                target: Some(target),
                ..
            } => target.lower(sink)?,
            Reference::ArrayElement { array, index, .. } => {
                array.lower(sink)?;
                index.lower(sink)?;
            }
            _ => {}
        }

        value.lower(sink)?;
        casting::convert(sink, value.0, self.static_type())?;

        sink.emit(match self {
            Reference::Argument { index, .. } => Instruction::store_arg(*index),
            Reference::Local { slot, .. } => Instruction::store_local(*slot),
            Reference::Field {
                field,
                target: Some(_),
            } => Instruction::StFld(field.id),
            Reference::Field { field, target: None } => Instruction::StsFld(field.id),
            Reference::ArrayElement { elem, .. } => Instruction::StElem(ElemKind::of(*elem)),
        });
        Ok(())
    }
}

/// Indices and lengths: integers carried as int32 on the stack.
pub(crate) fn is_index_type(ty: Type<'_>) -> bool {
    ty.primitive()
        .is_some_and(|p| p.is_integral() && p.is_int32_on_stack())
}

fn check_declared(what: &'static str, name: &str, ty: Type<'_>) -> Result<(), ConfigError> {
    if ty.is_void() {
        return Err(ConfigError::VoidType {
            what,
            name: String::from(name),
        });
    }
    Ok(())
}

fn check_slot(what: &'static str, index: usize) -> Result<u16, OperandError> {
    u16::try_from(index).map_err(|_| OperandError::SlotOutOfRange {
        what,
        index,
        limit: SLOT_LIMIT,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{ExprInner, Literal, NodeBuilder};
    use crate::types::{Primitive, TypeManager};
    use crate::vm::CodeBuffer;
    use bumpalo::Bump;
    use pretty_assertions::assert_eq;

    fn stored(reference: &Reference<'_>, value: &Expr<'_>) -> Vec<Instruction> {
        let mut sink = CodeBuffer::new();
        reference.emit_store(&mut sink, value).unwrap();
        sink.instructions().to_vec()
    }

    #[test]
    fn test_argument_round_trip() {
        let bump = Bump::new();
        let tm = TypeManager::new(&bump);
        let b = NodeBuilder::new(&bump, tm);
        let x = Reference::argument(1, Type::I64, "x").unwrap();

        let mut w = CodeWriter::new();
        x.print(&mut w);
        assert_eq!(w.as_str(), "x");

        let mut sink = CodeBuffer::new();
        x.emit_load(&mut sink).unwrap();
        assert_eq!(sink.instructions(), &[Instruction::LdArg1]);

        assert_eq!(
            stored(&x, b.i32(5)),
            vec![
                Instruction::LdcI4S(5),
                Instruction::Conv(Primitive::I64),
                Instruction::StArg1,
            ]
        );
    }

    #[test]
    fn test_slots_past_three_use_generic_form() {
        let bump = Bump::new();
        let tm = TypeManager::new(&bump);
        let b = NodeBuilder::new(&bump, tm);

        let third = Reference::argument(3, Type::I32, "c").unwrap();
        let fourth = Reference::argument(4, Type::I32, "d").unwrap();
        let mut sink = CodeBuffer::new();
        third.emit_load(&mut sink).unwrap();
        fourth.emit_load(&mut sink).unwrap();
        third.emit_store(&mut sink, b.i32(0)).unwrap();
        fourth.emit_store(&mut sink, b.i32(0)).unwrap();
        assert_eq!(
            sink.instructions(),
            &[
                Instruction::LdArg3,
                Instruction::LdArg(4),
                Instruction::LdcI4S(0),
                Instruction::StArg3,
                Instruction::LdcI4S(0),
                Instruction::StArg(4),
            ]
        );

        let local = Reference::local(4, Type::F64, "total").unwrap();
        assert_eq!(
            stored(&local, b.f64(1.5)),
            vec![Instruction::LdcR8(1.5), Instruction::StLoc(4)]
        );
        let local = Reference::local(0, Type::F64, "total").unwrap();
        assert_eq!(
            stored(&local, b.f64(1.5)),
            vec![Instruction::LdcR8(1.5), Instruction::StLoc0]
        );
    }

    #[test]
    fn test_void_is_rejected_for_every_variant() {
        let bump = Bump::new();
        let tm = TypeManager::new(&bump);
        let b = NodeBuilder::new(&bump, tm);

        assert!(matches!(
            Reference::argument(0, Type::Void, "a"),
            Err(CompileError::Config(ConfigError::VoidType { what: "argument", .. }))
        ));
        assert!(matches!(
            Reference::local(0, Type::Void, "l"),
            Err(CompileError::Config(ConfigError::VoidType { what: "local", .. }))
        ));

        // The manager refuses void fields, so build the descriptor by hand.
        let bad_field = bump.alloc(FieldInfo {
            id: crate::types::FieldId(99),
            name: "nothing",
            owner: tm.object(),
            ty: Type::Void,
            is_static: true,
        });
        assert!(matches!(
            Reference::field(bad_field, None),
            Err(CompileError::Config(ConfigError::VoidType { what: "field", .. }))
        ));

        let void_array: &Expr = bump.alloc(Expr(
            Type::Array(bump.alloc(Type::Void)),
            ExprInner::Literal(Literal::Null),
        ));
        assert!(matches!(
            Reference::array_element(void_array, b.i32(0)),
            Err(CompileError::Config(ConfigError::VoidType {
                what: "array element",
                ..
            }))
        ));
    }

    #[test]
    fn test_slot_out_of_range() {
        assert_eq!(
            Reference::argument(70_000, Type::I32, "x").unwrap_err(),
            CompileError::Operand(OperandError::SlotOutOfRange {
                what: "argument",
                index: 70_000,
                limit: SLOT_LIMIT,
            })
        );
        assert!(Reference::local(65_535, Type::I32, "x").is_ok());
    }

    #[test]
    fn test_field_targets() {
        let bump = Bump::new();
        let tm = TypeManager::new(&bump);
        let b = NodeBuilder::new(&bump, tm);
        let point = tm.declare_class("Point", None, &[]).unwrap();
        let x = tm.declare_field(point, "x", Type::I32, false).unwrap();
        let origin = tm
            .declare_field(point, "origin", Type::Class(point), true)
            .unwrap();

        assert!(matches!(
            Reference::field(x, None),
            Err(CompileError::Operand(OperandError::MissingTarget { .. }))
        ));
        let p = b.load(Reference::argument(0, Type::Class(point), "p").unwrap());
        assert!(matches!(
            Reference::field(origin, Some(p)),
            Err(CompileError::Operand(OperandError::UnexpectedTarget { .. }))
        ));
        assert!(matches!(
            Reference::field(x, Some(b.i32(1))),
            Err(CompileError::Operand(OperandError::InvalidOperandType { .. }))
        ));

        let px = Reference::field(x, Some(p)).unwrap();
        assert_eq!(
            stored(&px, b.i32(7)),
            vec![
                Instruction::LdArg0,
                Instruction::LdcI4S(7),
                Instruction::StFld(x.id),
            ]
        );
        let mut w = CodeWriter::new();
        px.print(&mut w);
        Reference::field(origin, None).unwrap().print(&mut w);
        assert_eq!(w.as_str(), "p.xPoint.origin");
    }

    #[test]
    fn test_array_element_store_order() {
        let bump = Bump::new();
        let tm = TypeManager::new(&bump);
        let b = NodeBuilder::new(&bump, tm);
        let longs = tm.array(Type::I64).unwrap();
        let arr = b.load(Reference::argument(0, longs, "values").unwrap());
        let i = b.load(Reference::local(2, Type::I32, "i").unwrap());

        let element = Reference::array_element(arr, i).unwrap();
        assert_eq!(element.static_type(), Type::I64);
        assert_eq!(
            stored(&element, b.i32(-1)),
            vec![
                Instruction::LdArg0,
                Instruction::LdLoc2,
                Instruction::LdcI4S(-1),
                Instruction::Conv(Primitive::I64),
                Instruction::StElem(ElemKind::Primitive(Primitive::I64)),
            ]
        );

        assert!(matches!(
            Reference::array_element(i, i),
            Err(CompileError::Operand(OperandError::NotAnArray { .. }))
        ));
        assert!(matches!(
            Reference::array_element(arr, b.i64(0)),
            Err(CompileError::Operand(OperandError::InvalidIndexType { .. }))
        ));
    }

    #[test]
    fn test_illegal_store_leaves_sink_unchanged() {
        let bump = Bump::new();
        let tm = TypeManager::new(&bump);
        let b = NodeBuilder::new(&bump, tm);
        let cat = tm.declare_class("Cat", None, &[]).unwrap();
        let dog = tm.declare_class("Dog", None, &[]).unwrap();
        let pet = Reference::local(0, Type::Class(dog), "pet").unwrap();
        let tom = b.load(Reference::argument(0, Type::Class(cat), "tom").unwrap());

        let mut sink = CodeBuffer::new();
        sink.emit(Instruction::Nop);
        let before = sink.len();

        let err = pet.emit_store(&mut sink, tom).unwrap_err();
        assert!(matches!(err, CompileError::Conversion(_)));
        assert_eq!(sink.len(), before);

        // Narrowing is not implicit either.
        let small = Reference::local(1, Type::I16, "s").unwrap();
        assert!(small.emit_store(&mut sink, b.i32(1)).is_err());
        assert_eq!(sink.len(), before);
    }
}
