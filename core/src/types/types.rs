use core::fmt::{self, Display};
use core::hash::{Hash, Hasher};

/// Primitive value kinds.
///
/// `Bool`, `Char`, `I8`, `I16` and `I32` all occupy a 32-bit slot on the
/// evaluation stack; `I64`, `F32` and `F64` have their own stack kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum Primitive {
    Bool = 0,
    /// 16-bit unsigned code unit.
    Char = 1,
    I8 = 2,
    I16 = 3,
    I32 = 4,
    I64 = 5,
    F32 = 6,
    F64 = 7,
}

impl Primitive {
    pub const ALL: [Primitive; 8] = [
        Primitive::Bool,
        Primitive::Char,
        Primitive::I8,
        Primitive::I16,
        Primitive::I32,
        Primitive::I64,
        Primitive::F32,
        Primitive::F64,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Primitive::Bool => "bool",
            Primitive::Char => "char",
            Primitive::I8 => "i8",
            Primitive::I16 => "i16",
            Primitive::I32 => "i32",
            Primitive::I64 => "i64",
            Primitive::F32 => "f32",
            Primitive::F64 => "f64",
        }
    }

    pub const fn is_integral(self) -> bool {
        matches!(
            self,
            Primitive::Char | Primitive::I8 | Primitive::I16 | Primitive::I32 | Primitive::I64
        )
    }

    pub const fn is_floating(self) -> bool {
        matches!(self, Primitive::F32 | Primitive::F64)
    }

    pub const fn is_numeric(self) -> bool {
        self.is_integral() || self.is_floating()
    }

    /// Whether values of this kind are carried as a 32-bit integer on the stack.
    pub const fn is_int32_on_stack(self) -> bool {
        matches!(
            self,
            Primitive::Bool | Primitive::Char | Primitive::I8 | Primitive::I16 | Primitive::I32
        )
    }
}

impl Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MethodId(pub u32);

/// A class or interface known to a `TypeManager`.
///
/// Equality and hashing go through `id`; two descriptors with the same id are
/// the same class.
pub struct ClassInfo<'a> {
    pub id: ClassId,
    pub name: &'a str,
    /// `None` only for the root `object` class and for interfaces.
    pub parent: Option<&'a ClassInfo<'a>>,
    pub interfaces: &'a [&'a ClassInfo<'a>],
    pub is_interface: bool,
}

impl<'a> ClassInfo<'a> {
    pub fn is_root(&self) -> bool {
        self.parent.is_none() && !self.is_interface
    }

    /// Reflexive, transitive subtype check over parents and implemented interfaces.
    pub fn is_subtype_of(&self, other: &ClassInfo<'_>) -> bool {
        if self.id == other.id || other.is_root() {
            return true;
        }
        if self.interfaces.iter().any(|iface| iface.is_subtype_of(other)) {
            return true;
        }
        match self.parent {
            Some(parent) => parent.is_subtype_of(other),
            None => false,
        }
    }
}

impl PartialEq for ClassInfo<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ClassInfo<'_> {}

impl Hash for ClassInfo<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for ClassInfo<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClassInfo({}#{})", self.name, self.id.0)
    }
}

pub struct FieldInfo<'a> {
    pub id: FieldId,
    pub name: &'a str,
    pub owner: &'a ClassInfo<'a>,
    pub ty: Type<'a>,
    pub is_static: bool,
}

impl fmt::Debug for FieldInfo<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FieldInfo({}.{}: {})", self.owner.name, self.name, self.ty)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodKind {
    Static,
    Instance,
    Virtual,
    Constructor,
}

pub struct MethodInfo<'a> {
    pub id: MethodId,
    pub name: &'a str,
    pub owner: &'a ClassInfo<'a>,
    pub params: &'a [Type<'a>],
    pub ret: Type<'a>,
    pub kind: MethodKind,
}

impl MethodInfo<'_> {
    /// Whether a call needs a target instance on the stack.
    pub fn has_this(&self) -> bool {
        matches!(self.kind, MethodKind::Instance | MethodKind::Virtual)
    }
}

impl fmt::Debug for MethodInfo<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MethodInfo({}.{}(", self.owner.name, self.name)?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", param)?;
        }
        write!(f, ") -> {})", self.ret)
    }
}

/// The static type of a value.
///
/// `Void` is the "no value" marker: it may appear as a method return type but
/// never as the type of an argument, local, field or array element.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type<'a> {
    Void,
    /// Type of the `null` literal.
    Null,
    Primitive(Primitive),
    Class(&'a ClassInfo<'a>),
    Array(&'a Type<'a>),
}

impl<'a> Type<'a> {
    pub const BOOL: Type<'static> = Type::Primitive(Primitive::Bool);
    pub const CHAR: Type<'static> = Type::Primitive(Primitive::Char);
    pub const I8: Type<'static> = Type::Primitive(Primitive::I8);
    pub const I16: Type<'static> = Type::Primitive(Primitive::I16);
    pub const I32: Type<'static> = Type::Primitive(Primitive::I32);
    pub const I64: Type<'static> = Type::Primitive(Primitive::I64);
    pub const F32: Type<'static> = Type::Primitive(Primitive::F32);
    pub const F64: Type<'static> = Type::Primitive(Primitive::F64);

    pub fn is_void(&self) -> bool {
        matches!(self, Type::Void)
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, Type::Null | Type::Class(_) | Type::Array(_))
    }

    pub fn primitive(&self) -> Option<Primitive> {
        match self {
            Type::Primitive(p) => Some(*p),
            _ => None,
        }
    }

    pub fn element(&self) -> Option<Type<'a>> {
        match self {
            Type::Array(elem) => Some(**elem),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        self.primitive().is_some_and(Primitive::is_numeric)
    }

    pub fn is_integral(&self) -> bool {
        self.primitive().is_some_and(Primitive::is_integral)
    }

    pub fn is_bool(&self) -> bool {
        matches!(self, Type::Primitive(Primitive::Bool))
    }

    /// Reference assignability: identity, upcast, array covariance, `null`.
    ///
    /// Always false for primitives and `void`; those go through the
    /// conversion engine instead.
    pub fn is_assignable_to(&self, target: &Type<'_>) -> bool {
        match (self, target) {
            (Type::Null, Type::Class(_) | Type::Array(_)) => true,
            (Type::Class(from), Type::Class(to)) => from.is_subtype_of(to),
            (Type::Array(_), Type::Class(to)) => to.is_root(),
            (Type::Array(from), Type::Array(to)) => {
                from == to || (from.is_reference() && from.is_assignable_to(to))
            }
            _ => false,
        }
    }
}

impl Display for Type<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Void => write!(f, "void"),
            Type::Null => write!(f, "null"),
            Type::Primitive(p) => write!(f, "{}", p),
            Type::Class(class) => write!(f, "{}", class.name),
            Type::Array(elem) => write!(f, "{}[]", elem),
        }
    }
}

impl fmt::Debug for Type<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Type({})", self)
    }
}
