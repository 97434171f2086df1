use super::manager::TypeManager;
use super::types::{MethodKind, Primitive, Type};
use crate::errors::ConfigError;
use alloc::string::ToString;
use bumpalo::Bump;

#[test]
fn test_builtin_classes() {
    let bump = Bump::new();
    let manager = TypeManager::new(&bump);

    let object = manager.object();
    let string = manager.string();
    assert!(object.is_root());
    assert!(!string.is_root());
    assert!(core::ptr::eq(string.parent.unwrap(), object));
    assert!(core::ptr::eq(manager.lookup_class("object").unwrap(), object));
    assert!(core::ptr::eq(manager.lookup_class("string").unwrap(), string));
    assert!(manager.lookup_class("missing").is_none());
}

#[test]
fn test_interning_array() {
    let bump = Bump::new();
    let manager = TypeManager::new(&bump);

    let ints = manager.array(Type::I32).unwrap();
    let same_ints = manager.array(Type::I32).unwrap();
    match (ints, same_ints) {
        (Type::Array(a), Type::Array(b)) => assert!(core::ptr::eq(a, b)),
        _ => panic!("expected array types"),
    }

    let nested = manager.array(ints).unwrap();
    assert_eq!(nested.to_string(), "i32[][]");
    assert_eq!(nested.element(), Some(ints));
}

#[test]
fn test_array_of_void_or_null_rejected() {
    let bump = Bump::new();
    let manager = TypeManager::new(&bump);

    assert_eq!(
        manager.array(Type::Void),
        Err(ConfigError::InvalidElementType {
            ty: "void".to_string()
        })
    );
    assert!(manager.array(Type::Null).is_err());
}

#[test]
fn test_declare_class_hierarchy() {
    let bump = Bump::new();
    let manager = TypeManager::new(&bump);

    let named = manager.declare_interface("Named", &[]).unwrap();
    let animal = manager.declare_class("Animal", None, &[named]).unwrap();
    let dog = manager.declare_class("Dog", Some(animal), &[]).unwrap();
    let cat = manager.declare_class("Cat", Some(animal), &[]).unwrap();

    assert!(named.is_interface);
    assert!(core::ptr::eq(animal.parent.unwrap(), manager.object()));
    assert!(dog.is_subtype_of(animal));
    assert!(dog.is_subtype_of(named));
    assert!(dog.is_subtype_of(manager.object()));
    assert!(named.is_subtype_of(manager.object()));
    assert!(!animal.is_subtype_of(dog));
    assert!(!dog.is_subtype_of(cat));
    assert_ne!(dog.id, cat.id);
}

#[test]
fn test_declare_class_errors() {
    let bump = Bump::new();
    let manager = TypeManager::new(&bump);
    let named = manager.declare_interface("Named", &[]).unwrap();

    assert_eq!(
        manager.declare_class("string", None, &[]).unwrap_err(),
        ConfigError::DuplicateClass {
            name: "string".to_string()
        }
    );
    assert!(manager.declare_interface("Named", &[]).is_err());
    assert_eq!(
        manager.declare_class("Person", Some(named), &[]).unwrap_err(),
        ConfigError::InterfaceAsParent {
            class: "Person".to_string(),
            interface: "Named".to_string(),
        }
    );
}

#[test]
fn test_assignability() {
    let bump = Bump::new();
    let manager = TypeManager::new(&bump);
    let animal = manager.declare_class("Animal", None, &[]).unwrap();
    let dog = manager.declare_class("Dog", Some(animal), &[]).unwrap();

    let dogs = manager.array(Type::Class(dog)).unwrap();
    let animals = manager.array(Type::Class(animal)).unwrap();
    let ints = manager.array(Type::I32).unwrap();
    let longs = manager.array(Type::I64).unwrap();

    assert!(Type::Null.is_assignable_to(&Type::Class(dog)));
    assert!(Type::Null.is_assignable_to(&ints));
    assert!(dogs.is_assignable_to(&animals));
    assert!(!animals.is_assignable_to(&dogs));
    assert!(ints.is_assignable_to(&manager.object_type()));
    assert!(!ints.is_assignable_to(&longs));
    assert!(!Type::I32.is_assignable_to(&Type::I64));
    assert!(!Type::Void.is_assignable_to(&manager.object_type()));
}

#[test]
fn test_declare_members() {
    let bump = Bump::new();
    let manager = TypeManager::new(&bump);
    let point = manager.declare_class("Point", None, &[]).unwrap();

    let x = manager.declare_field(point, "x", Type::I32, false).unwrap();
    let y = manager.declare_field(point, "y", Type::I32, false).unwrap();
    assert_ne!(x.id, y.id);
    assert_eq!(x.ty, Type::I32);
    assert!(!x.is_static);

    assert_eq!(
        manager.declare_field(point, "none", Type::Void, true).unwrap_err(),
        ConfigError::VoidType {
            what: "field",
            name: "Point.none".to_string(),
        }
    );

    let ctor = manager
        .declare_method(point, "new", &[Type::I32, Type::I32], Type::Void, MethodKind::Constructor)
        .unwrap();
    assert_eq!(ctor.ret, Type::Class(point));
    assert!(!ctor.has_this());

    let len = manager
        .declare_method(point, "length", &[], Type::F64, MethodKind::Virtual)
        .unwrap();
    assert!(len.has_this());
    assert_ne!(len.id, ctor.id);

    assert!(matches!(
        manager.declare_method(point, "bad", &[Type::I32, Type::Void], Type::Void, MethodKind::Static),
        Err(ConfigError::VoidType { what: "parameter", .. })
    ));
}

#[test]
fn test_primitive_kinds() {
    for p in Primitive::ALL {
        assert_eq!(p.is_numeric(), p != Primitive::Bool);
        assert_eq!(Type::Primitive(p).to_string(), p.name());
    }
    assert!(Primitive::Char.is_int32_on_stack());
    assert!(!Primitive::I64.is_int32_on_stack());
    assert!(Primitive::F32.is_floating());
    assert!(!Primitive::F32.is_integral());
}
