//! Target instruction set for the stack machine.
//!
//! # Encoding
//!
//! Every instruction is a one-byte opcode followed by zero or more operand
//! bytes. Common operand values get dedicated operand-less opcodes:
//!
//! ```text
//! ldarg.1        1 byte      ldarg 4        3 bytes (opcode + u16)
//! stloc.3        1 byte      stloc 200      3 bytes
//! ldc.i4.s 7     2 bytes     ldc.i4 1000    5 bytes
//! ```
//!
//! Both forms behave identically when executed; the compact ones only exist to
//! keep method bodies small. [`Instruction::load_arg`] and friends pick the
//! right form for a given operand.
//!
//! # Stack Discipline
//!
//! Stack effect notation: `[..., operand1, operand2] -> [..., result]`.
//! The evaluation stack has four kinds of slot: int32 (`bool`, `char`, `i8`,
//! `i16`, `i32`), int64, float (`f32`, `f64`) and object reference.

use core::fmt;

use crate::types::{ClassId, FieldId, MethodId, Primitive, Type};

/// A branch target. Labels are created and resolved by the sink.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Label(pub u32);

impl fmt::Debug for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// Element kind for array instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElemKind {
    Primitive(Primitive),
    Ref,
}

impl ElemKind {
    pub fn of(ty: Type<'_>) -> Self {
        match ty.primitive() {
            Some(p) => ElemKind::Primitive(p),
            None => ElemKind::Ref,
        }
    }

    fn suffix(self) -> &'static str {
        match self {
            ElemKind::Primitive(p) => conv_suffix(p),
            ElemKind::Ref => "ref",
        }
    }
}

/// Operand of call instructions: the callee plus how many values the call
/// consumes (target included) and produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallSite {
    pub method: MethodId,
    pub pops: u16,
    pub pushes: u16,
}

#[derive(Clone, Copy, PartialEq)]
pub enum Instruction {
    /// No operation
    Nop,

    // ========================================================================
    // Arguments
    // ========================================================================
    /// Load argument 0-3 (compact)
    /// Stack: [...] -> [..., value]
    LdArg0,
    LdArg1,
    LdArg2,
    LdArg3,
    /// Load argument by index
    /// Operand: u16 index | Stack: [...] -> [..., value]
    LdArg(u16),

    /// Store argument 0-3 (compact)
    /// Stack: [..., value] -> [...]
    StArg0,
    StArg1,
    StArg2,
    StArg3,
    /// Store argument by index
    /// Operand: u16 index | Stack: [..., value] -> [...]
    StArg(u16),

    // ========================================================================
    // Locals
    // ========================================================================
    LdLoc0,
    LdLoc1,
    LdLoc2,
    LdLoc3,
    /// Operand: u16 slot | Stack: [...] -> [..., value]
    LdLoc(u16),

    StLoc0,
    StLoc1,
    StLoc2,
    StLoc3,
    /// Operand: u16 slot | Stack: [..., value] -> [...]
    StLoc(u16),

    // ========================================================================
    // Constants
    // ========================================================================
    /// Stack: [...] -> [..., null]
    LdNull,
    /// Push small signed integer (-128 to 127) as int32
    LdcI4S(i8),
    LdcI4(i32),
    LdcI8(i64),
    LdcR4(f32),
    LdcR8(f64),
    /// Push string constant
    /// Operand: u32 index into the string pool
    LdStr(u32),

    // ========================================================================
    // Fields
    // ========================================================================
    /// Stack: [..., obj] -> [..., value]
    LdFld(FieldId),
    /// Stack: [..., obj, value] -> [...]
    StFld(FieldId),
    /// Stack: [...] -> [..., value]
    LdsFld(FieldId),
    /// Stack: [..., value] -> [...]
    StsFld(FieldId),

    // ========================================================================
    // Arrays
    // ========================================================================
    /// Stack: [..., length: i32] -> [..., array]
    NewArr(ElemKind),
    /// Stack: [..., array] -> [..., length: i32]
    LdLen,
    /// Stack: [..., array, index] -> [..., value] (can trap on bounds)
    LdElem(ElemKind),
    /// Stack: [..., array, index, value] -> [...] (can trap on bounds)
    StElem(ElemKind),

    // ========================================================================
    // Conversions
    // ========================================================================
    /// Numeric conversion, value-preserving when used for widening
    /// Stack: [..., value] -> [..., converted]
    Conv(Primitive),
    /// Numeric conversion that traps on overflow
    ConvChecked(Primitive),
    /// Stack: [..., value] -> [..., object]
    Box(Primitive),
    /// Stack: [..., object] -> [..., value] (traps on kind mismatch)
    UnboxAny(Primitive),
    /// Stack: [..., object] -> [..., object] (traps if not an instance)
    CastClass(ClassId),
    /// Stack: [..., object] -> [..., object or null]
    IsInst(ClassId),

    // ========================================================================
    // Arithmetic, bitwise and comparison
    // ========================================================================
    /// Stack: [..., a, b] -> [..., result]
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    And,
    Or,
    Xor,
    /// Stack: [..., a] -> [..., result]
    Neg,
    Not,
    /// Stack: [..., a, b] -> [..., result: i32 (0 or 1)]
    Ceq,
    Clt,
    Cgt,
    /// Unordered comparisons: true when either float operand is NaN
    CltUn,
    CgtUn,

    // ========================================================================
    // Calls
    // ========================================================================
    /// Stack: [..., target?, args...] -> [..., result?]
    Call(CallSite),
    CallVirt(CallSite),
    /// Stack: [..., args...] -> [..., object]
    NewObj(CallSite),

    // ========================================================================
    // Stack manipulation and control flow
    // ========================================================================
    /// Stack: [..., a] -> [..., a, a]
    Dup,
    /// Stack: [..., a] -> [...]
    Pop,
    Br(Label),
    /// Stack: [..., cond] -> [...]
    BrTrue(Label),
    BrFalse(Label),
    /// Stack: [retval?] -> []
    Ret,
}

static_assertions::assert_impl_all!(Instruction: Copy, Send, Sync);

impl Instruction {
    /// Load argument `index`, compact form for slots 0-3.
    pub const fn load_arg(index: u16) -> Self {
        match index {
            0 => Self::LdArg0,
            1 => Self::LdArg1,
            2 => Self::LdArg2,
            3 => Self::LdArg3,
            n => Self::LdArg(n),
        }
    }

    pub const fn store_arg(index: u16) -> Self {
        match index {
            0 => Self::StArg0,
            1 => Self::StArg1,
            2 => Self::StArg2,
            3 => Self::StArg3,
            n => Self::StArg(n),
        }
    }

    pub const fn load_local(slot: u16) -> Self {
        match slot {
            0 => Self::LdLoc0,
            1 => Self::LdLoc1,
            2 => Self::LdLoc2,
            3 => Self::LdLoc3,
            n => Self::LdLoc(n),
        }
    }

    pub const fn store_local(slot: u16) -> Self {
        match slot {
            0 => Self::StLoc0,
            1 => Self::StLoc1,
            2 => Self::StLoc2,
            3 => Self::StLoc3,
            n => Self::StLoc(n),
        }
    }

    /// Push an int32 constant, compact form for values that fit in a byte.
    pub const fn load_i32(value: i32) -> Self {
        if value >= i8::MIN as i32 && value <= i8::MAX as i32 {
            Self::LdcI4S(value as i8)
        } else {
            Self::LdcI4(value)
        }
    }

    /// Size of the encoded instruction in bytes.
    pub const fn encoded_len(&self) -> usize {
        match self {
            Self::LdArg(_) | Self::StArg(_) | Self::LdLoc(_) | Self::StLoc(_) => 3,
            Self::LdcI4S(_) => 2,
            Self::LdcI4(_) | Self::LdcR4(_) | Self::LdStr(_) => 5,
            Self::LdcI8(_) | Self::LdcR8(_) => 9,
            Self::LdFld(_) | Self::StFld(_) | Self::LdsFld(_) | Self::StsFld(_) => 5,
            Self::NewArr(_) | Self::Box(_) | Self::UnboxAny(_) => 5,
            Self::CastClass(_) | Self::IsInst(_) => 5,
            Self::Call(_) | Self::CallVirt(_) | Self::NewObj(_) => 5,
            Self::Br(_) | Self::BrTrue(_) | Self::BrFalse(_) => 5,
            _ => 1,
        }
    }

    /// Number of values popped and pushed.
    ///
    /// `Ret` reports `(0, 0)`; it ends the method, so whatever is left on the
    /// stack is consumed by the return itself.
    pub const fn stack_effect(&self) -> (usize, usize) {
        match self {
            Self::Nop | Self::Br(_) | Self::Ret => (0, 0),

            Self::LdArg0
            | Self::LdArg1
            | Self::LdArg2
            | Self::LdArg3
            | Self::LdArg(_)
            | Self::LdLoc0
            | Self::LdLoc1
            | Self::LdLoc2
            | Self::LdLoc3
            | Self::LdLoc(_)
            | Self::LdNull
            | Self::LdcI4S(_)
            | Self::LdcI4(_)
            | Self::LdcI8(_)
            | Self::LdcR4(_)
            | Self::LdcR8(_)
            | Self::LdStr(_)
            | Self::LdsFld(_) => (0, 1),

            Self::StArg0
            | Self::StArg1
            | Self::StArg2
            | Self::StArg3
            | Self::StArg(_)
            | Self::StLoc0
            | Self::StLoc1
            | Self::StLoc2
            | Self::StLoc3
            | Self::StLoc(_)
            | Self::StsFld(_)
            | Self::Pop
            | Self::BrTrue(_)
            | Self::BrFalse(_) => (1, 0),

            Self::LdFld(_)
            | Self::NewArr(_)
            | Self::LdLen
            | Self::Conv(_)
            | Self::ConvChecked(_)
            | Self::Box(_)
            | Self::UnboxAny(_)
            | Self::CastClass(_)
            | Self::IsInst(_)
            | Self::Neg
            | Self::Not => (1, 1),

            Self::StFld(_) => (2, 0),
            Self::StElem(_) => (3, 0),

            Self::LdElem(_)
            | Self::Add
            | Self::Sub
            | Self::Mul
            | Self::Div
            | Self::Rem
            | Self::And
            | Self::Or
            | Self::Xor
            | Self::Ceq
            | Self::Clt
            | Self::Cgt
            | Self::CltUn
            | Self::CgtUn => (2, 1),

            Self::Dup => (1, 2),

            Self::Call(site) | Self::CallVirt(site) => (site.pops as usize, site.pushes as usize),
            Self::NewObj(site) => (site.pops as usize, 1),
        }
    }

    /// Branch target, if this is a branch.
    pub const fn branch_target(&self) -> Option<Label> {
        match self {
            Self::Br(label) | Self::BrTrue(label) | Self::BrFalse(label) => Some(*label),
            _ => None,
        }
    }

    /// Whether execution never falls through to the next instruction.
    pub const fn ends_block(&self) -> bool {
        matches!(self, Self::Br(_) | Self::Ret)
    }

    /// Whether this instruction can trap at run time.
    pub const fn can_trap(&self) -> bool {
        matches!(
            self,
            Self::Div
                | Self::Rem
                | Self::LdFld(_)
                | Self::StFld(_)
                | Self::LdElem(_)
                | Self::StElem(_)
                | Self::LdLen
                | Self::NewArr(_)
                | Self::ConvChecked(_)
                | Self::UnboxAny(_)
                | Self::CastClass(_)
                | Self::CallVirt(_)
        )
    }
}

const fn conv_suffix(p: Primitive) -> &'static str {
    match p {
        Primitive::Bool => "bool",
        Primitive::Char => "u2",
        Primitive::I8 => "i1",
        Primitive::I16 => "i2",
        Primitive::I32 => "i4",
        Primitive::I64 => "i8",
        Primitive::F32 => "r4",
        Primitive::F64 => "r8",
    }
}

impl fmt::Debug for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nop => write!(f, "nop"),
            Self::LdArg0 => write!(f, "ldarg.0"),
            Self::LdArg1 => write!(f, "ldarg.1"),
            Self::LdArg2 => write!(f, "ldarg.2"),
            Self::LdArg3 => write!(f, "ldarg.3"),
            Self::LdArg(idx) => write!(f, "ldarg {}", idx),
            Self::StArg0 => write!(f, "starg.0"),
            Self::StArg1 => write!(f, "starg.1"),
            Self::StArg2 => write!(f, "starg.2"),
            Self::StArg3 => write!(f, "starg.3"),
            Self::StArg(idx) => write!(f, "starg {}", idx),
            Self::LdLoc0 => write!(f, "ldloc.0"),
            Self::LdLoc1 => write!(f, "ldloc.1"),
            Self::LdLoc2 => write!(f, "ldloc.2"),
            Self::LdLoc3 => write!(f, "ldloc.3"),
            Self::LdLoc(slot) => write!(f, "ldloc {}", slot),
            Self::StLoc0 => write!(f, "stloc.0"),
            Self::StLoc1 => write!(f, "stloc.1"),
            Self::StLoc2 => write!(f, "stloc.2"),
            Self::StLoc3 => write!(f, "stloc.3"),
            Self::StLoc(slot) => write!(f, "stloc {}", slot),
            Self::LdNull => write!(f, "ldnull"),
            Self::LdcI4S(val) => write!(f, "ldc.i4.s {}", val),
            Self::LdcI4(val) => write!(f, "ldc.i4 {}", val),
            Self::LdcI8(val) => write!(f, "ldc.i8 {}", val),
            Self::LdcR4(val) => write!(f, "ldc.r4 {:?}", val),
            Self::LdcR8(val) => write!(f, "ldc.r8 {:?}", val),
            Self::LdStr(idx) => write!(f, "ldstr #{}", idx),
            Self::LdFld(field) => write!(f, "ldfld field#{}", field.0),
            Self::StFld(field) => write!(f, "stfld field#{}", field.0),
            Self::LdsFld(field) => write!(f, "ldsfld field#{}", field.0),
            Self::StsFld(field) => write!(f, "stsfld field#{}", field.0),
            Self::NewArr(kind) => write!(f, "newarr {}", kind.suffix()),
            Self::LdLen => write!(f, "ldlen"),
            Self::LdElem(kind) => write!(f, "ldelem.{}", kind.suffix()),
            Self::StElem(kind) => write!(f, "stelem.{}", kind.suffix()),
            Self::Conv(p) => write!(f, "conv.{}", conv_suffix(*p)),
            Self::ConvChecked(p) => write!(f, "conv.ovf.{}", conv_suffix(*p)),
            Self::Box(p) => write!(f, "box {}", p),
            Self::UnboxAny(p) => write!(f, "unbox.any {}", p),
            Self::CastClass(class) => write!(f, "castclass class#{}", class.0),
            Self::IsInst(class) => write!(f, "isinst class#{}", class.0),
            Self::Add => write!(f, "add"),
            Self::Sub => write!(f, "sub"),
            Self::Mul => write!(f, "mul"),
            Self::Div => write!(f, "div"),
            Self::Rem => write!(f, "rem"),
            Self::And => write!(f, "and"),
            Self::Or => write!(f, "or"),
            Self::Xor => write!(f, "xor"),
            Self::Neg => write!(f, "neg"),
            Self::Not => write!(f, "not"),
            Self::Ceq => write!(f, "ceq"),
            Self::Clt => write!(f, "clt"),
            Self::Cgt => write!(f, "cgt"),
            Self::CltUn => write!(f, "clt.un"),
            Self::CgtUn => write!(f, "cgt.un"),
            Self::Call(site) => write!(f, "call method#{}", site.method.0),
            Self::CallVirt(site) => write!(f, "callvirt method#{}", site.method.0),
            Self::NewObj(site) => write!(f, "newobj method#{}", site.method.0),
            Self::Dup => write!(f, "dup"),
            Self::Pop => write!(f, "pop"),
            Self::Br(label) => write!(f, "br {:?}", label),
            Self::BrTrue(label) => write!(f, "brtrue {:?}", label),
            Self::BrFalse(label) => write!(f, "brfalse {:?}", label),
            Self::Ret => write!(f, "ret"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compact_argument_forms() {
        assert_eq!(Instruction::load_arg(0), Instruction::LdArg0);
        assert_eq!(Instruction::load_arg(3), Instruction::LdArg3);
        assert_eq!(Instruction::load_arg(4), Instruction::LdArg(4));
        assert_eq!(Instruction::store_arg(2), Instruction::StArg2);
        assert_eq!(Instruction::store_arg(4), Instruction::StArg(4));
    }

    #[test]
    fn test_compact_local_forms() {
        assert_eq!(Instruction::load_local(1), Instruction::LdLoc1);
        assert_eq!(Instruction::load_local(255), Instruction::LdLoc(255));
        assert_eq!(Instruction::store_local(3), Instruction::StLoc3);
        assert_eq!(Instruction::store_local(4), Instruction::StLoc(4));
    }

    #[test]
    fn test_compact_forms_are_smaller() {
        assert_eq!(Instruction::load_arg(3).encoded_len(), 1);
        assert_eq!(Instruction::load_arg(4).encoded_len(), 3);
        assert_eq!(Instruction::store_local(0).encoded_len(), 1);
        assert_eq!(Instruction::store_local(9).encoded_len(), 3);
    }

    #[test]
    fn test_load_i32_picks_short_form() {
        assert_eq!(Instruction::load_i32(-128), Instruction::LdcI4S(-128));
        assert_eq!(Instruction::load_i32(127), Instruction::LdcI4S(127));
        assert_eq!(Instruction::load_i32(128), Instruction::LdcI4(128));
        assert_eq!(Instruction::load_i32(-129), Instruction::LdcI4(-129));
    }

    #[test]
    fn test_stack_effects() {
        assert_eq!(Instruction::LdArg0.stack_effect(), (0, 1));
        assert_eq!(Instruction::StArg(7).stack_effect(), (1, 0));
        assert_eq!(Instruction::StFld(FieldId(0)).stack_effect(), (2, 0));
        assert_eq!(Instruction::StElem(ElemKind::Ref).stack_effect(), (3, 0));
        assert_eq!(Instruction::Dup.stack_effect(), (1, 2));

        let site = CallSite {
            method: MethodId(3),
            pops: 3,
            pushes: 0,
        };
        assert_eq!(Instruction::CallVirt(site).stack_effect(), (3, 0));
        assert_eq!(Instruction::NewObj(site).stack_effect(), (3, 1));
    }

    #[test]
    fn test_can_trap() {
        assert!(Instruction::UnboxAny(Primitive::I32).can_trap());
        assert!(Instruction::ConvChecked(Primitive::I8).can_trap());
        assert!(!Instruction::Conv(Primitive::I64).can_trap());
        assert!(!Instruction::Box(Primitive::I32).can_trap());
    }

    #[test]
    fn test_ends_block() {
        assert!(Instruction::Ret.ends_block());
        assert!(Instruction::Br(Label(0)).ends_block());
        assert!(!Instruction::BrFalse(Label(0)).ends_block());
        assert!(!Instruction::CallVirt(CallSite {
            method: MethodId(0),
            pops: 1,
            pushes: 0,
        })
        .ends_block());
    }

    #[test]
    fn test_debug_formatting() {
        assert_eq!(format!("{:?}", Instruction::LdArg1), "ldarg.1");
        assert_eq!(format!("{:?}", Instruction::LdArg(4)), "ldarg 4");
        assert_eq!(format!("{:?}", Instruction::Conv(Primitive::I64)), "conv.i8");
        assert_eq!(
            format!("{:?}", Instruction::ConvChecked(Primitive::Char)),
            "conv.ovf.u2"
        );
        assert_eq!(format!("{:?}", Instruction::BrFalse(Label(2))), "brfalse L2");
        assert_eq!(
            format!("{:?}", Instruction::StElem(ElemKind::Primitive(Primitive::F64))),
            "stelem.r8"
        );
    }
}
