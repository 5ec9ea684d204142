//! Runtime object model: values, classes, builtin types and iterators.

pub mod class;
pub mod iter;
pub mod locals;
pub mod types;
pub mod value;

pub use class::{
    BoundMethod, BoundNative, ClassObject, Closure, EnumObject, ExceptionObject, Instance,
    InterfaceObject, NativeFn, NativeFunction,
};
pub use iter::{IterSource, IterState};
pub use locals::Locals;
pub use types::{NativeMethod, TypeDescriptor};
pub use value::{new_hash_table, type_descriptor, HashKey, HashTable, Value};
