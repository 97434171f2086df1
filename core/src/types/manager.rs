use crate::{
    errors::ConfigError,
    types::types::{
        ClassId, ClassInfo, FieldId, FieldInfo, MethodId, MethodInfo, MethodKind, Type,
    },
};
use bumpalo::Bump;
use core::cell::{Cell, RefCell};
use hashbrown::{DefaultHashBuilder, HashMap};

/// Registry of every reference type a compilation can mention.
///
/// Classes, fields and methods are allocated in the arena and handed out as
/// `&'a` references, so descriptors stay valid for as long as the arena does.
/// Array types are interned: asking twice for `i32[]` yields the same pointer.
pub struct TypeManager<'a> {
    // Arena holding all descriptors from this TypeManager.
    arena: &'a Bump,
    interned_strs: RefCell<HashMap<&'a str, &'a str, DefaultHashBuilder, &'a Bump>>,
    classes: RefCell<HashMap<&'a str, &'a ClassInfo<'a>, DefaultHashBuilder, &'a Bump>>,
    arrays: RefCell<HashMap<Type<'a>, &'a Type<'a>, DefaultHashBuilder, &'a Bump>>,
    object: &'a ClassInfo<'a>,
    string: &'a ClassInfo<'a>,
    next_class: Cell<u32>,
    next_field: Cell<u32>,
    next_method: Cell<u32>,
}

impl<'a> TypeManager<'a> {
    pub const OBJECT: &'static str = "object";
    pub const STRING: &'static str = "string";

    pub fn new(arena: &'a Bump) -> &'a Self {
        let object: &'a ClassInfo<'a> = arena.alloc(ClassInfo {
            id: ClassId(0),
            name: arena.alloc_str(Self::OBJECT),
            parent: None,
            interfaces: &[],
            is_interface: false,
        });
        let string: &'a ClassInfo<'a> = arena.alloc(ClassInfo {
            id: ClassId(1),
            name: arena.alloc_str(Self::STRING),
            parent: Some(object),
            interfaces: &[],
            is_interface: false,
        });

        let manager = arena.alloc(Self {
            arena,
            interned_strs: RefCell::new(HashMap::new_in(arena)),
            classes: RefCell::new(HashMap::new_in(arena)),
            arrays: RefCell::new(HashMap::new_in(arena)),
            object,
            string,
            next_class: Cell::new(2),
            next_field: Cell::new(0),
            next_method: Cell::new(0),
        });
        for builtin in [object, string] {
            manager.interned_strs.borrow_mut().insert(builtin.name, builtin.name);
            manager.classes.borrow_mut().insert(builtin.name, builtin);
        }
        manager
    }

    pub(super) fn intern_str(&self, s: &str) -> &'a str {
        if let Some(&interned_str) = self.interned_strs.borrow().get(s) {
            return interned_str;
        }
        let arena_str = self.arena.alloc_str(s);
        self.interned_strs.borrow_mut().insert(arena_str, arena_str);
        arena_str
    }

    fn next_id(counter: &Cell<u32>) -> u32 {
        let id = counter.get();
        counter.set(id + 1);
        id
    }

    fn alloc_class(
        &self,
        name: &str,
        parent: Option<&'a ClassInfo<'a>>,
        interfaces: &[&'a ClassInfo<'a>],
        is_interface: bool,
    ) -> &'a ClassInfo<'a> {
        let name = self.intern_str(name);
        let class = self.arena.alloc(ClassInfo {
            id: ClassId(Self::next_id(&self.next_class)),
            name,
            parent,
            interfaces: self.arena.alloc_slice_copy(interfaces),
            is_interface,
        });
        self.classes.borrow_mut().insert(name, class);
        tracing::trace!(class = name, id = class.id.0, "declared class");
        class
    }

    /// The root class every reference type is assignable to.
    pub fn object(&self) -> &'a ClassInfo<'a> {
        self.object
    }

    pub fn string(&self) -> &'a ClassInfo<'a> {
        self.string
    }

    pub fn object_type(&self) -> Type<'a> {
        Type::Class(self.object())
    }

    pub fn string_type(&self) -> Type<'a> {
        Type::Class(self.string())
    }

    pub fn lookup_class(&self, name: &str) -> Option<&'a ClassInfo<'a>> {
        self.classes.borrow().get(name).copied()
    }

    /// Declare a class. A missing `parent` means the root `object` class.
    pub fn declare_class(
        &self,
        name: &str,
        parent: Option<&'a ClassInfo<'a>>,
        interfaces: &[&'a ClassInfo<'a>],
    ) -> Result<&'a ClassInfo<'a>, ConfigError> {
        if self.lookup_class(name).is_some() {
            return Err(ConfigError::DuplicateClass {
                name: crate::String::from(name),
            });
        }
        if let Some(parent) = parent {
            if parent.is_interface {
                return Err(ConfigError::InterfaceAsParent {
                    class: crate::String::from(name),
                    interface: crate::String::from(parent.name),
                });
            }
        }
        let parent = parent.unwrap_or_else(|| self.object());
        Ok(self.alloc_class(name, Some(parent), interfaces, false))
    }

    pub fn declare_interface(
        &self,
        name: &str,
        extends: &[&'a ClassInfo<'a>],
    ) -> Result<&'a ClassInfo<'a>, ConfigError> {
        if self.lookup_class(name).is_some() {
            return Err(ConfigError::DuplicateClass {
                name: crate::String::from(name),
            });
        }
        Ok(self.alloc_class(name, None, extends, true))
    }

    pub fn array(&self, elem: Type<'a>) -> Result<Type<'a>, ConfigError> {
        if elem.is_void() || matches!(elem, Type::Null) {
            return Err(ConfigError::InvalidElementType {
                ty: crate::format!("{}", elem),
            });
        }
        if let Some(&interned) = self.arrays.borrow().get(&elem) {
            return Ok(Type::Array(interned));
        }
        let arena_elem = self.arena.alloc(elem);
        self.arrays.borrow_mut().insert(elem, arena_elem);
        Ok(Type::Array(arena_elem))
    }

    pub fn declare_field(
        &self,
        owner: &'a ClassInfo<'a>,
        name: &str,
        ty: Type<'a>,
        is_static: bool,
    ) -> Result<&'a FieldInfo<'a>, ConfigError> {
        if ty.is_void() {
            return Err(ConfigError::VoidType {
                what: "field",
                name: crate::format!("{}.{}", owner.name, name),
            });
        }
        Ok(self.arena.alloc(FieldInfo {
            id: FieldId(Self::next_id(&self.next_field)),
            name: self.intern_str(name),
            owner,
            ty,
            is_static,
        }))
    }

    /// Declare a method. Constructors always return the owner type,
    /// whatever `ret` says.
    pub fn declare_method(
        &self,
        owner: &'a ClassInfo<'a>,
        name: &str,
        params: &[Type<'a>],
        ret: Type<'a>,
        kind: MethodKind,
    ) -> Result<&'a MethodInfo<'a>, ConfigError> {
        if let Some(index) = params.iter().position(Type::is_void) {
            return Err(ConfigError::VoidType {
                what: "parameter",
                name: crate::format!("{}.{}#{}", owner.name, name, index),
            });
        }
        let ret = match kind {
            MethodKind::Constructor => Type::Class(owner),
            _ => ret,
        };
        Ok(self.arena.alloc(MethodInfo {
            id: MethodId(Self::next_id(&self.next_method)),
            name: self.intern_str(name),
            owner,
            params: self.arena.alloc_slice_copy(params),
            ret,
            kind,
        }))
    }
}
