//! User-defined types and callable wrappers.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use super::locals::Locals;
use super::types::NativeMethod;
use super::value::Value;
use crate::bytecode::Method;
use crate::error::RuntimeError;
use crate::vm::Vm;

/// Signature of builtin functions.
pub type NativeFn = fn(&mut Vm, Vec<Value>) -> Result<Value, RuntimeError>;

/// A class created by the compiler.
///
/// Methods are fixed at compile time. Bases are attached by `INHERIT` when the
/// declaring code runs, and static attributes may be assigned at any time.
pub struct ClassObject {
    pub name: String,
    pub constructor: Option<Rc<Method>>,
    pub instance_methods: IndexMap<String, Rc<Method>>,
    /// Static methods, static fields and nested types.
    pub attributes: RefCell<IndexMap<String, Value>>,
    pub bases: RefCell<Vec<Value>>,
}

impl ClassObject {
    pub fn new(
        name: impl Into<String>,
        constructor: Option<Rc<Method>>,
        instance_methods: IndexMap<String, Rc<Method>>,
        attributes: IndexMap<String, Value>,
    ) -> Self {
        Self {
            name: name.into(),
            constructor,
            instance_methods,
            attributes: RefCell::new(attributes),
            bases: RefCell::new(Vec::new()),
        }
    }

    /// Every compiled method owned directly by this class.
    pub fn methods(&self) -> Vec<Rc<Method>> {
        let mut methods: Vec<Rc<Method>> = self.constructor.iter().cloned().collect();
        methods.extend(self.instance_methods.values().cloned());
        for value in self.attributes.borrow().values() {
            if let Value::Method(method) = value {
                methods.push(method.clone());
            }
        }
        methods
    }

    fn base_classes(&self) -> Vec<Rc<ClassObject>> {
        self.bases
            .borrow()
            .iter()
            .filter_map(|base| match base {
                Value::Class(class) => Some(class.clone()),
                _ => None,
            })
            .collect()
    }

    /// Instance method lookup, depth-first through the bases.
    pub fn find_method(&self, name: &str) -> Option<Rc<Method>> {
        if let Some(method) = self.instance_methods.get(name) {
            return Some(method.clone());
        }
        self.base_classes()
            .iter()
            .find_map(|base| base.find_method(name))
    }

    /// Class attribute lookup, depth-first through the bases.
    pub fn find_attribute(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.attributes.borrow().get(name) {
            return Some(value.clone());
        }
        self.base_classes()
            .iter()
            .find_map(|base| base.find_attribute(name))
    }

    /// The constructor of this class or the first base that has one.
    pub fn find_constructor(&self) -> Option<Rc<Method>> {
        if let Some(constructor) = &self.constructor {
            return Some(constructor.clone());
        }
        self.base_classes()
            .iter()
            .find_map(|base| base.find_constructor())
    }

    /// Whether `self` is `other` or derives from it.
    pub fn is_subclass_of(&self, other: &ClassObject) -> bool {
        if std::ptr::eq(self, other) {
            return true;
        }
        self.base_classes()
            .iter()
            .any(|base| base.is_subclass_of(other))
    }

    /// Whether this class declares (or explicitly implements) `interface`.
    pub fn implements(&self, interface: &InterfaceObject) -> bool {
        let declared = self.bases.borrow().iter().any(|base| match base {
            Value::Interface(i) => std::ptr::eq(&**i, interface),
            _ => false,
        });
        declared
            || self
                .base_classes()
                .iter()
                .any(|base| base.implements(interface))
    }
}

impl fmt::Debug for ClassObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassObject")
            .field("name", &self.name)
            .field("methods", &self.instance_methods.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// An instance of a user class.
pub struct Instance {
    pub class: Rc<ClassObject>,
    pub attributes: RefCell<IndexMap<String, Value>>,
}

impl Instance {
    pub fn new(class: Rc<ClassObject>) -> Self {
        Self {
            class,
            attributes: RefCell::new(IndexMap::new()),
        }
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.attributes.borrow().get(name).cloned()
    }

    pub fn set(&self, name: impl Into<String>, value: Value) {
        self.attributes.borrow_mut().insert(name.into(), value);
    }

    /// Whether the instance provides `name`, as an attribute or a method.
    pub fn responds_to(&self, name: &str) -> bool {
        self.attributes.borrow().contains_key(name) || self.class.find_method(name).is_some()
    }

    /// Structural interface check: every interface method must be present.
    pub fn satisfies(&self, interface: &InterfaceObject) -> bool {
        self.class.implements(interface)
            || interface
                .methods
                .iter()
                .all(|method| self.responds_to(&method.name))
    }
}

/// `enum Name { A, B = 10 }`: member names mapped to ordinals.
#[derive(Debug)]
pub struct EnumObject {
    pub name: String,
    pub members: IndexMap<String, i64>,
}

impl EnumObject {
    pub fn contains(&self, ordinal: i64) -> bool {
        self.members.values().any(|v| *v == ordinal)
    }
}

/// `interface Name { func m() }`: bodiless method signatures.
#[derive(Debug)]
pub struct InterfaceObject {
    pub name: String,
    pub methods: Vec<Rc<Method>>,
}

/// A lambda bound to the locals and receiver of the frame that created it.
pub struct Closure {
    pub method: Rc<Method>,
    pub locals: Locals,
    pub self_value: Value,
}

/// An instance method bound to its receiver.
pub struct BoundMethod {
    pub receiver: Value,
    pub method: Rc<Method>,
}

/// A builtin function.
pub struct NativeFunction {
    pub name: &'static str,
    /// `None` accepts any number of arguments.
    pub arity: Option<usize>,
    pub func: NativeFn,
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NativeFunction({})", self.name)
    }
}

/// A builtin type method bound to the value it was looked up on.
pub struct BoundNative {
    pub receiver: Value,
    pub method: &'static NativeMethod,
}

/// An exception raised by the VM or constructed with `Exception(message)`.
#[derive(Debug, Clone)]
pub struct ExceptionObject {
    pub kind: String,
    pub message: String,
}

impl ExceptionObject {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// Build the object a script sees when a runtime error is caught.
    pub fn from_error(error: &RuntimeError) -> Self {
        Self::new(error.kind(), error.message())
    }
}

impl fmt::Display for ExceptionObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::MethodKind;
    use crate::span::Span;

    fn method(name: &str) -> Rc<Method> {
        Rc::new(Method::new(
            name,
            MethodKind::Instance,
            IndexMap::new(),
            false,
            0,
            Vec::new(),
        ))
    }

    fn class(name: &str, methods: &[&str]) -> Rc<ClassObject> {
        let methods = methods
            .iter()
            .map(|m| (m.to_string(), method(m)))
            .collect();
        Rc::new(ClassObject::new(name, None, methods, IndexMap::new()))
    }

    #[test]
    fn test_method_lookup_walks_bases() {
        let base = class("Base", &["greet"]);
        let derived = class("Derived", &["run"]);
        derived.bases.borrow_mut().push(Value::Class(base.clone()));

        assert!(derived.find_method("greet").is_some());
        assert!(derived.find_method("missing").is_none());
        assert!(derived.is_subclass_of(&base));
        assert!(!base.is_subclass_of(&derived));
    }

    #[test]
    fn test_structural_interface_check() {
        let shape = InterfaceObject {
            name: "Shape".into(),
            methods: vec![method("area")],
        };
        let square = Instance::new(class("Square", &["area"]));
        let label = Instance::new(class("Label", &["text"]));
        assert!(square.satisfies(&shape));
        assert!(!label.satisfies(&shape));
    }

    #[test]
    fn test_exception_from_error() {
        let error = RuntimeError::division_by_zero(Span::new(0, 1, 2, 3));
        let exception = ExceptionObject::from_error(&error);
        assert_eq!(exception.kind, "DivisionByZeroException");
        assert_eq!(exception.to_string(), "DivisionByZeroException: Division by zero");
    }
}
