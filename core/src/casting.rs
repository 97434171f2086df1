//! Type conversion engine
//!
//! Decides, and emits, the instructions that turn the value on top of the
//! stack from one static type into another.
//!
//! # Policy
//!
//! Implicit conversions (stores, call arguments, returns, operand promotion):
//!
//! | source → destination                  | outcome          | instructions   |
//! |---------------------------------------|------------------|----------------|
//! | `T` → `T`, `T` not `void`             | identity         | none           |
//! | narrower numeric → wider numeric      | widen            | `conv.*`       |
//! | wider numeric → narrower numeric      | **rejected**     | none           |
//! | primitive → `object`                  | box              | `box`          |
//! | `object` → primitive                  | unbox            | `unbox.any`    |
//! | reference → supertype, `null` → ref   | upcast           | none           |
//! | anything else, or `void` on a side    | **rejected**     | none           |
//!
//! `void` carries no value, so `void` → `void` is rejected like any other
//! conversion touching `void`. A bare `return;` in a `void` method converts
//! nothing and never asks.
//!
//! Explicit conversions (cast nodes) additionally allow numeric narrowing
//! through an overflow-checked `conv.ovf.*` and class downcasts through
//! `castclass`. Values are never truncated silently.
//!
//! Unboxing the wrong kind, a failed downcast or an overflowing checked
//! narrowing all trap when the code runs; they are not compile-time errors.
//!
//! A conversion is always fully decided before anything is emitted, so a
//! rejected conversion leaves the sink untouched.

use thiserror::Error;

use crate::String;
use crate::types::{ClassInfo, Primitive, Type};
use crate::vm::{Instruction, InstructionSink};

/// Outcome of a legal conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conversion<'a> {
    Identity,
    /// Value-preserving numeric conversion to the given kind.
    Widen(Primitive),
    /// Numeric conversion to the given kind that traps on overflow.
    CheckedNarrow(Primitive),
    Box(Primitive),
    Unbox(Primitive),
    /// Reference conversion to a supertype; nothing to emit.
    Upcast,
    /// Runtime-checked conversion to a subclass.
    Downcast(&'a ClassInfo<'a>),
}

impl Conversion<'_> {
    /// The instruction this conversion needs, if any.
    pub fn instruction(&self) -> Option<Instruction> {
        match self {
            Conversion::Identity | Conversion::Upcast => None,
            Conversion::Widen(to) => Some(Instruction::Conv(*to)),
            Conversion::CheckedNarrow(to) => Some(Instruction::ConvChecked(*to)),
            Conversion::Box(from) => Some(Instruction::Box(*from)),
            Conversion::Unbox(to) => Some(Instruction::UnboxAny(*to)),
            Conversion::Downcast(class) => Some(Instruction::CastClass(class.id)),
        }
    }

    pub fn emit(&self, sink: &mut dyn InstructionSink) {
        if let Some(instruction) = self.instruction() {
            sink.emit(instruction);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionMode {
    Implicit,
    Explicit,
}

/// Errors that can occur during conversion classification
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CastError {
    #[error("cannot implicitly narrow `{from}` to `{to}`; use an explicit cast")]
    Narrowing { from: String, to: String },

    #[error("no conversion from `{from}` to `{to}`")]
    Illegal { from: String, to: String },

    #[error("cannot convert `{from}` to `{to}`: void has no value")]
    Void { from: String, to: String },
}

impl CastError {
    fn narrowing(source: Type<'_>, dest: Type<'_>) -> Self {
        CastError::Narrowing {
            from: crate::format!("{}", source),
            to: crate::format!("{}", dest),
        }
    }

    fn illegal(source: Type<'_>, dest: Type<'_>) -> Self {
        CastError::Illegal {
            from: crate::format!("{}", source),
            to: crate::format!("{}", dest),
        }
    }

    fn void(source: Type<'_>, dest: Type<'_>) -> Self {
        CastError::Void {
            from: crate::format!("{}", source),
            to: crate::format!("{}", dest),
        }
    }
}

/// Whether `from → to` is a value-preserving numeric widening.
pub const fn is_widening(from: Primitive, to: Primitive) -> bool {
    use Primitive::*;
    matches!(
        (from, to),
        (I8, I16 | I32 | I64 | F32 | F64)
            | (I16, I32 | I64 | F32 | F64)
            | (Char, I32 | I64 | F32 | F64)
            | (I32, I64 | F32 | F64)
            | (I64, F32 | F64)
            | (F32, F64)
    )
}

/// Common type two numeric operands are widened to before a binary operation.
///
/// Operands narrower than `i32` are promoted to `i32`. Returns `None` when
/// either side is not numeric.
pub fn promote(a: Primitive, b: Primitive) -> Option<Primitive> {
    if !a.is_numeric() || !b.is_numeric() {
        return None;
    }
    let result = if a == Primitive::F64 || b == Primitive::F64 {
        Primitive::F64
    } else if a == Primitive::F32 || b == Primitive::F32 {
        Primitive::F32
    } else if a == Primitive::I64 || b == Primitive::I64 {
        Primitive::I64
    } else {
        Primitive::I32
    };
    Some(result)
}

/// Decide how to convert a `source` value into a `dest` value.
///
/// Pure: emits nothing and returns the same answer for the same inputs.
pub fn classify<'a>(
    source: Type<'a>,
    dest: Type<'a>,
    mode: ConversionMode,
) -> Result<Conversion<'a>, CastError> {
    let conversion = match (source, dest) {
        (Type::Void, _) | (_, Type::Void) => return Err(CastError::void(source, dest)),

        _ if source == dest => Conversion::Identity,

        (Type::Primitive(from), Type::Primitive(to)) => {
            if is_widening(from, to) {
                Conversion::Widen(to)
            } else if from.is_numeric() && to.is_numeric() {
                match mode {
                    ConversionMode::Implicit => return Err(CastError::narrowing(source, dest)),
                    ConversionMode::Explicit => Conversion::CheckedNarrow(to),
                }
            } else {
                return Err(CastError::illegal(source, dest));
            }
        }

        (Type::Primitive(from), Type::Class(class)) if class.is_root() => Conversion::Box(from),
        (Type::Class(class), Type::Primitive(to)) if class.is_root() => Conversion::Unbox(to),
        (Type::Primitive(_), _) | (_, Type::Primitive(_)) | (_, Type::Null) => {
            return Err(CastError::illegal(source, dest));
        }

        _ if source.is_assignable_to(&dest) => Conversion::Upcast,

        (Type::Class(_), Type::Class(target))
            if mode == ConversionMode::Explicit && dest.is_assignable_to(&source) =>
        {
            Conversion::Downcast(target)
        }

        _ => return Err(CastError::illegal(source, dest)),
    };
    Ok(conversion)
}

/// Convert the value on top of the stack implicitly.
///
/// On error nothing has been emitted.
pub fn convert<'a>(
    sink: &mut dyn InstructionSink,
    source: Type<'a>,
    dest: Type<'a>,
) -> Result<Conversion<'a>, CastError> {
    apply(sink, source, dest, ConversionMode::Implicit)
}

/// Like [`convert`], but also allows checked narrowing and downcasts.
pub fn convert_explicit<'a>(
    sink: &mut dyn InstructionSink,
    source: Type<'a>,
    dest: Type<'a>,
) -> Result<Conversion<'a>, CastError> {
    apply(sink, source, dest, ConversionMode::Explicit)
}

fn apply<'a>(
    sink: &mut dyn InstructionSink,
    source: Type<'a>,
    dest: Type<'a>,
    mode: ConversionMode,
) -> Result<Conversion<'a>, CastError> {
    let conversion = classify(source, dest, mode)?;
    tracing::trace!(%source, %dest, ?conversion, "conversion");
    conversion.emit(sink);
    Ok(conversion)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeManager;
    use crate::vm::CodeBuffer;
    use bumpalo::Bump;
    use pretty_assertions::assert_eq;

    fn emitted<'a>(source: Type<'a>, dest: Type<'a>) -> Result<Vec<Instruction>, CastError> {
        let mut sink = CodeBuffer::new();
        sink.emit(Instruction::Nop);
        convert(&mut sink, source, dest)?;
        Ok(sink.instructions()[1..].to_vec())
    }

    #[test]
    fn test_identity_for_every_type() {
        let bump = Bump::new();
        let tm = TypeManager::new(&bump);
        let animal = tm.declare_class("Animal", None, &[]).unwrap();
        let mut types: Vec<Type> = Primitive::ALL.iter().map(|p| Type::Primitive(*p)).collect();
        types.push(tm.object_type());
        types.push(tm.string_type());
        types.push(Type::Class(animal));
        types.push(tm.array(Type::I32).unwrap());
        types.push(Type::Null);

        for ty in types {
            assert_eq!(
                classify(ty, ty, ConversionMode::Implicit),
                Ok(Conversion::Identity),
                "{}",
                ty
            );
            assert_eq!(emitted(ty, ty), Ok(vec![]), "{}", ty);
        }
    }

    #[test]
    fn test_widening_emits_single_conv() {
        assert_eq!(
            emitted(Type::I32, Type::I64),
            Ok(vec![Instruction::Conv(Primitive::I64)])
        );
        assert_eq!(
            emitted(Type::I8, Type::I16),
            Ok(vec![Instruction::Conv(Primitive::I16)])
        );
        assert_eq!(
            emitted(Type::CHAR, Type::F64),
            Ok(vec![Instruction::Conv(Primitive::F64)])
        );
        assert_eq!(
            emitted(Type::I64, Type::F32),
            Ok(vec![Instruction::Conv(Primitive::F32)])
        );
    }

    #[test]
    fn test_widening_table_is_total_and_antisymmetric() {
        for from in Primitive::ALL {
            for to in Primitive::ALL {
                let outcome = classify(
                    Type::Primitive(from),
                    Type::Primitive(to),
                    ConversionMode::Implicit,
                );
                if from == to {
                    assert_eq!(outcome, Ok(Conversion::Identity));
                } else if is_widening(from, to) {
                    assert!(!is_widening(to, from), "{} <-> {}", from, to);
                    assert_eq!(outcome, Ok(Conversion::Widen(to)));
                } else {
                    assert!(outcome.is_err(), "{} -> {} should be rejected", from, to);
                }
            }
        }
    }

    #[test]
    fn test_implicit_narrowing_is_rejected() {
        let result = emitted(Type::I64, Type::I32);
        assert_eq!(
            result,
            Err(CastError::Narrowing {
                from: "i64".into(),
                to: "i32".into(),
            })
        );
        assert!(emitted(Type::F64, Type::F32).is_err());
        assert!(emitted(Type::I16, Type::CHAR).is_err());
        assert!(emitted(Type::CHAR, Type::I16).is_err());
    }

    #[test]
    fn test_explicit_narrowing_is_checked() {
        let mut sink = CodeBuffer::new();
        let conversion = convert_explicit(&mut sink, Type::I64, Type::I8).unwrap();
        assert_eq!(conversion, Conversion::CheckedNarrow(Primitive::I8));
        assert_eq!(
            sink.instructions(),
            &[Instruction::ConvChecked(Primitive::I8)]
        );
    }

    #[test]
    fn test_bool_never_converts_to_numbers() {
        for p in Primitive::ALL.into_iter().filter(|p| p.is_numeric()) {
            let ty = Type::Primitive(p);
            assert!(classify(Type::BOOL, ty, ConversionMode::Explicit).is_err());
            assert!(classify(ty, Type::BOOL, ConversionMode::Explicit).is_err());
        }
    }

    #[test]
    fn test_box_and_unbox() {
        let bump = Bump::new();
        let tm = TypeManager::new(&bump);

        assert_eq!(
            emitted(Type::I32, tm.object_type()),
            Ok(vec![Instruction::Box(Primitive::I32)])
        );
        assert_eq!(
            emitted(tm.object_type(), Type::F64),
            Ok(vec![Instruction::UnboxAny(Primitive::F64)])
        );
        // Only the root class holds boxed values.
        assert!(emitted(Type::I32, tm.string_type()).is_err());
        assert!(emitted(tm.string_type(), Type::I32).is_err());
    }

    #[test]
    fn test_reference_upcast_emits_nothing() {
        let bump = Bump::new();
        let tm = TypeManager::new(&bump);
        let named = tm.declare_interface("Named", &[]).unwrap();
        let animal = tm.declare_class("Animal", None, &[named]).unwrap();
        let dog = tm.declare_class("Dog", Some(animal), &[]).unwrap();

        for target in [Type::Class(animal), Type::Class(named), tm.object_type()] {
            assert_eq!(
                classify(Type::Class(dog), target, ConversionMode::Implicit),
                Ok(Conversion::Upcast)
            );
            assert_eq!(emitted(Type::Class(dog), target), Ok(vec![]));
        }
        assert_eq!(
            classify(Type::Null, Type::Class(dog), ConversionMode::Implicit),
            Ok(Conversion::Upcast)
        );
        let dogs = tm.array(Type::Class(dog)).unwrap();
        let animals = tm.array(Type::Class(animal)).unwrap();
        assert_eq!(
            classify(dogs, animals, ConversionMode::Implicit),
            Ok(Conversion::Upcast)
        );
        assert_eq!(
            classify(dogs, tm.object_type(), ConversionMode::Implicit),
            Ok(Conversion::Upcast)
        );
    }

    #[test]
    fn test_downcast_only_when_explicit() {
        let bump = Bump::new();
        let tm = TypeManager::new(&bump);
        let animal = tm.declare_class("Animal", None, &[]).unwrap();
        let dog = tm.declare_class("Dog", Some(animal), &[]).unwrap();

        assert!(classify(Type::Class(animal), Type::Class(dog), ConversionMode::Implicit).is_err());

        let mut sink = CodeBuffer::new();
        let conversion = convert_explicit(&mut sink, Type::Class(animal), Type::Class(dog)).unwrap();
        assert_eq!(conversion, Conversion::Downcast(dog));
        assert_eq!(sink.instructions(), &[Instruction::CastClass(dog.id)]);
    }

    #[test]
    fn test_unrelated_references_leave_sink_unchanged() {
        let bump = Bump::new();
        let tm = TypeManager::new(&bump);
        let cat = tm.declare_class("Cat", None, &[]).unwrap();
        let dog = tm.declare_class("Dog", None, &[]).unwrap();

        let mut sink = CodeBuffer::new();
        sink.emit(Instruction::LdArg0);
        let before = sink.len();

        for mode in [ConversionMode::Implicit, ConversionMode::Explicit] {
            let result = classify(Type::Class(cat), Type::Class(dog), mode);
            assert_eq!(
                result,
                Err(CastError::Illegal {
                    from: "Cat".into(),
                    to: "Dog".into(),
                })
            );
        }
        assert!(convert(&mut sink, Type::Class(cat), Type::Class(dog)).is_err());
        assert!(convert_explicit(&mut sink, Type::Class(cat), Type::Class(dog)).is_err());
        assert_eq!(sink.len(), before);
    }

    #[test]
    fn test_void_is_never_convertible() {
        let bump = Bump::new();
        let tm = TypeManager::new(&bump);
        for ty in [Type::Void, Type::I32, tm.object_type()] {
            assert!(matches!(
                classify(Type::Void, ty, ConversionMode::Explicit),
                Err(CastError::Void { .. })
            ));
            assert!(matches!(
                classify(ty, Type::Void, ConversionMode::Explicit),
                Err(CastError::Void { .. })
            ));
        }
    }

    #[test]
    fn test_classification_is_deterministic() {
        for from in Primitive::ALL {
            for to in Primitive::ALL {
                let first = emitted(Type::Primitive(from), Type::Primitive(to));
                let second = emitted(Type::Primitive(from), Type::Primitive(to));
                assert_eq!(first, second);
            }
        }
    }

    #[test]
    fn test_promote() {
        assert_eq!(promote(Primitive::I8, Primitive::I16), Some(Primitive::I32));
        assert_eq!(promote(Primitive::I32, Primitive::I64), Some(Primitive::I64));
        assert_eq!(promote(Primitive::I64, Primitive::F32), Some(Primitive::F32));
        assert_eq!(promote(Primitive::F32, Primitive::F64), Some(Primitive::F64));
        assert_eq!(promote(Primitive::Char, Primitive::Char), Some(Primitive::I32));
        assert_eq!(promote(Primitive::Bool, Primitive::I32), None);
    }
}
