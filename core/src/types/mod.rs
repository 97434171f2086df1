//! Static types: the closed primitive set, reference types and the
//! descriptors (classes, fields, methods) that nodes are bound to.

pub mod manager;
mod types;

#[cfg(test)]
mod manager_test;

pub use manager::TypeManager;
pub use types::{
    ClassId, ClassInfo, FieldId, FieldInfo, MethodId, MethodInfo, MethodKind, Primitive, Type,
};
