//! Runtime values of the Iodine VM.

use std::cell::RefCell;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use indexmap::IndexMap;

use super::class::{
    BoundMethod, BoundNative, ClassObject, Closure, EnumObject, ExceptionObject, Instance,
    InterfaceObject, NativeFunction,
};
use super::iter::IterState;
use super::types::{self, TypeDescriptor};
use crate::bytecode::{Method, Module};

/// Ordered hash table backing `Hash` values.
pub type HashTable = IndexMap<HashKey, Value, ahash::RandomState>;

pub fn new_hash_table() -> HashTable {
    IndexMap::with_hasher(ahash::RandomState::new())
}

/// The subset of values usable as hash keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HashKey {
    Null,
    Bool(bool),
    Int(i64),
    /// Bit pattern of the float, so NaN keys stay stable.
    Float(u64),
    Str(Rc<str>),
}

impl Hash for HashKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            HashKey::Null => {}
            HashKey::Bool(b) => b.hash(state),
            HashKey::Int(n) => n.hash(state),
            HashKey::Float(bits) => bits.hash(state),
            HashKey::Str(s) => s.hash(state),
        }
    }
}

impl HashKey {
    pub fn from_value(value: &Value) -> Option<HashKey> {
        match value {
            Value::Null => Some(HashKey::Null),
            Value::Bool(b) => Some(HashKey::Bool(*b)),
            Value::Int(n) => Some(HashKey::Int(*n)),
            Value::Float(f) if f.fract() == 0.0 && f.is_finite() => {
                Some(HashKey::Int(*f as i64))
            }
            Value::Float(f) => Some(HashKey::Float(f.to_bits())),
            Value::Str(s) => Some(HashKey::Str(s.clone())),
            _ => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            HashKey::Null => Value::Null,
            HashKey::Bool(b) => Value::Bool(*b),
            HashKey::Int(n) => Value::Int(*n),
            HashKey::Float(bits) => Value::Float(f64::from_bits(*bits)),
            HashKey::Str(s) => Value::Str(s.clone()),
        }
    }
}

/// A runtime value.
///
/// Primitives are stored inline; everything with identity lives behind an
/// `Rc` and compares by pointer.
#[derive(Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    List(Rc<RefCell<Vec<Value>>>),
    Tuple(Rc<Vec<Value>>),
    Hash(Rc<RefCell<HashTable>>),
    /// A compiled function, method or static method.
    Method(Rc<Method>),
    /// A lambda together with the frame it was created in.
    Closure(Rc<Closure>),
    /// An instance method bound to its receiver.
    BoundMethod(Rc<BoundMethod>),
    /// A builtin function.
    Native(Rc<NativeFunction>),
    /// A builtin type method bound to its receiver, e.g. `"abc".upper`.
    BoundNative(Rc<BoundNative>),
    Class(Rc<ClassObject>),
    Instance(Rc<Instance>),
    Enum(Rc<EnumObject>),
    Interface(Rc<InterfaceObject>),
    Module(Rc<Module>),
    /// A builtin type such as `Int` or `List`.
    Type(&'static TypeDescriptor),
    Exception(Rc<ExceptionObject>),
    Iterator(Rc<RefCell<IterState>>),
}

impl Value {
    pub fn str(s: impl AsRef<str>) -> Value {
        Value::Str(Rc::from(s.as_ref()))
    }

    pub fn list(items: Vec<Value>) -> Value {
        Value::List(Rc::new(RefCell::new(items)))
    }

    pub fn tuple(items: Vec<Value>) -> Value {
        Value::Tuple(Rc::new(items))
    }

    pub fn hash(table: HashTable) -> Value {
        Value::Hash(Rc::new(RefCell::new(table)))
    }

    pub fn exception(kind: impl Into<String>, message: impl Into<String>) -> Value {
        Value::Exception(Rc::new(ExceptionObject::new(kind, message)))
    }

    /// Name shown by `typeof` and in error messages. Instances report their class.
    pub fn type_name(&self) -> String {
        match self {
            Value::Instance(instance) => instance.class.name.clone(),
            Value::Exception(exception) => exception.kind.clone(),
            other => type_descriptor(other).name.to_string(),
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) => !items.borrow().is_empty(),
            Value::Tuple(items) => !items.is_empty(),
            Value::Hash(table) => !table.borrow().is_empty(),
            _ => true,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Source-like rendering: strings are quoted, containers recurse.
    pub fn repr(&self) -> String {
        match self {
            Value::Str(s) => format!("{:?}", &**s),
            other => other.to_string(),
        }
    }
}

/// The builtin type a value belongs to.
pub fn type_descriptor(value: &Value) -> &'static TypeDescriptor {
    match value {
        Value::Null => &types::NULL,
        Value::Bool(_) => &types::BOOL,
        Value::Int(_) => &types::INT,
        Value::Float(_) => &types::FLOAT,
        Value::Str(_) => &types::STR,
        Value::List(_) => &types::LIST,
        Value::Tuple(_) => &types::TUPLE,
        Value::Hash(_) => &types::HASH,
        Value::Method(_) | Value::Closure(_) | Value::BoundMethod(_) => &types::FUNCTION,
        Value::Native(_) | Value::BoundNative(_) => &types::BUILTIN,
        Value::Class(_) => &types::CLASS,
        Value::Instance(_) => &types::OBJECT,
        Value::Enum(_) => &types::ENUM,
        Value::Interface(_) => &types::INTERFACE,
        Value::Module(_) => &types::MODULE,
        Value::Type(_) => &types::TYPE,
        Value::Exception(_) => &types::EXCEPTION,
        Value::Iterator(_) => &types::ITERATOR,
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::str(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(Rc::from(s))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        equal(self, other, &mut Vec::new())
    }
}

/// Container pairs already under comparison. Meeting one again means the
/// walk has gone round a cycle, which compares equal.
type Comparing = Vec<(*const (), *const ())>;

fn equal(left: &Value, right: &Value, comparing: &mut Comparing) -> bool {
    match (left, right) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Int(a), Value::Int(b)) => a == b,
        (Value::Float(a), Value::Float(b)) => a == b,
        (Value::Int(a), Value::Float(b)) => (*a as f64) == *b,
        (Value::Float(a), Value::Int(b)) => *a == (*b as f64),
        (Value::Str(a), Value::Str(b)) => a == b,
        (Value::List(a), Value::List(b)) => {
            if Rc::ptr_eq(a, b) {
                return true;
            }
            let pair = (Rc::as_ptr(a) as *const (), Rc::as_ptr(b) as *const ());
            if comparing.contains(&pair) {
                return true;
            }
            comparing.push(pair);
            let result = equal_items(&a.borrow(), &b.borrow(), comparing);
            comparing.pop();
            result
        }
        (Value::Tuple(a), Value::Tuple(b)) => equal_items(a, b, comparing),
        (Value::Hash(a), Value::Hash(b)) => {
            if Rc::ptr_eq(a, b) {
                return true;
            }
            let pair = (Rc::as_ptr(a) as *const (), Rc::as_ptr(b) as *const ());
            if comparing.contains(&pair) {
                return true;
            }
            comparing.push(pair);
            let (a, b) = (a.borrow(), b.borrow());
            let result = a.len() == b.len()
                && a.iter().all(|(k, v)| {
                    b.get(k)
                        .is_some_and(|other| equal(v, other, comparing))
                });
            comparing.pop();
            result
        }
        (Value::Method(a), Value::Method(b)) => Rc::ptr_eq(a, b),
        (Value::Closure(a), Value::Closure(b)) => Rc::ptr_eq(a, b),
        (Value::BoundMethod(a), Value::BoundMethod(b)) => {
            Rc::ptr_eq(&a.method, &b.method) && equal(&a.receiver, &b.receiver, comparing)
        }
        (Value::Native(a), Value::Native(b)) => Rc::ptr_eq(a, b),
        (Value::BoundNative(a), Value::BoundNative(b)) => {
            std::ptr::eq(a.method, b.method) && equal(&a.receiver, &b.receiver, comparing)
        }
        (Value::Class(a), Value::Class(b)) => Rc::ptr_eq(a, b),
        (Value::Instance(a), Value::Instance(b)) => Rc::ptr_eq(a, b),
        (Value::Enum(a), Value::Enum(b)) => Rc::ptr_eq(a, b),
        (Value::Interface(a), Value::Interface(b)) => Rc::ptr_eq(a, b),
        (Value::Module(a), Value::Module(b)) => Rc::ptr_eq(a, b),
        (Value::Type(a), Value::Type(b)) => std::ptr::eq(*a, *b),
        (Value::Exception(a), Value::Exception(b)) => Rc::ptr_eq(a, b),
        (Value::Iterator(a), Value::Iterator(b)) => Rc::ptr_eq(a, b),
        _ => false,
    }
}

fn equal_items(a: &[Value], b: &[Value], comparing: &mut Comparing) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| equal(x, y, comparing))
}

fn write_items(
    f: &mut fmt::Formatter<'_>,
    items: &[Value],
    printing: &mut Vec<*const ()>,
) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        item.render(f, printing, true)?;
    }
    Ok(())
}

impl Value {
    /// Write the value, quoting strings when `quoted`. `printing` holds the
    /// containers already open further up, which render as `[...]`/`{...}`.
    fn render(
        &self,
        f: &mut fmt::Formatter<'_>,
        printing: &mut Vec<*const ()>,
        quoted: bool,
    ) -> fmt::Result {
        match self {
            Value::Str(s) if quoted => write!(f, "{:?}", &**s),
            Value::List(items) => {
                let id = Rc::as_ptr(items) as *const ();
                if printing.contains(&id) {
                    return write!(f, "[...]");
                }
                printing.push(id);
                let result = write_list(f, &items.borrow(), printing);
                printing.pop();
                result
            }
            Value::Tuple(items) => {
                write!(f, "(")?;
                write_items(f, items, printing)?;
                if items.len() == 1 {
                    write!(f, ",")?;
                }
                write!(f, ")")
            }
            Value::Hash(table) => {
                let id = Rc::as_ptr(table) as *const ();
                if printing.contains(&id) {
                    return write!(f, "{{...}}");
                }
                printing.push(id);
                let result = write_entries(f, &table.borrow(), printing);
                printing.pop();
                result
            }
            other => write!(f, "{}", other),
        }
    }
}

fn write_list(
    f: &mut fmt::Formatter<'_>,
    items: &[Value],
    printing: &mut Vec<*const ()>,
) -> fmt::Result {
    write!(f, "[")?;
    write_items(f, items, printing)?;
    write!(f, "]")
}

fn write_entries(
    f: &mut fmt::Formatter<'_>,
    table: &HashTable,
    printing: &mut Vec<*const ()>,
) -> fmt::Result {
    write!(f, "{{")?;
    for (i, (key, value)) in table.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        key.to_value().render(f, printing, true)?;
        write!(f, " : ")?;
        value.render(f, printing, true)?;
    }
    write!(f, "}}")
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(n) if n.fract() == 0.0 && n.is_finite() => write!(f, "{:.1}", n),
            Value::Float(n) => write!(f, "{}", n),
            Value::Str(s) => write!(f, "{}", s),
            Value::List(_) | Value::Tuple(_) | Value::Hash(_) => {
                self.render(f, &mut Vec::new(), false)
            }
            Value::Method(method) => write!(f, "<function {}>", method.name),
            Value::Closure(closure) => write!(f, "<lambda {}>", closure.method.name),
            Value::BoundMethod(bound) => write!(
                f,
                "<bound method {}.{}>",
                bound.receiver.type_name(),
                bound.method.name
            ),
            Value::Native(native) => write!(f, "<builtin {}>", native.name),
            Value::BoundNative(bound) => write!(
                f,
                "<builtin method {}.{}>",
                bound.receiver.type_name(),
                bound.method.name
            ),
            Value::Class(class) => write!(f, "<class {}>", class.name),
            Value::Instance(instance) => write!(f, "<{} instance>", instance.class.name),
            Value::Enum(e) => write!(f, "<enum {}>", e.name),
            Value::Interface(i) => write!(f, "<interface {}>", i.name),
            Value::Module(m) => write!(f, "<module {}>", m.name),
            Value::Type(t) => write!(f, "<type {}>", t.name),
            Value::Exception(e) => write!(f, "{}", e),
            Value::Iterator(_) => write!(f, "<iterator>"),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(_) => write!(f, "Str({})", self.repr()),
            Value::Int(n) => write!(f, "Int({})", n),
            Value::Float(n) => write!(f, "Float({})", n),
            Value::Bool(b) => write!(f, "Bool({})", b),
            other => write!(f, "{}", other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let list = Value::list(vec![Value::Int(1), Value::from("a"), Value::Float(2.0)]);
        assert_eq!(list.to_string(), "[1, \"a\", 2.0]");
        assert_eq!(Value::tuple(vec![Value::Null]).to_string(), "(null,)");
        let mut table = new_hash_table();
        table.insert(HashKey::Str(Rc::from("k")), Value::Bool(true));
        assert_eq!(Value::hash(table).to_string(), "{\"k\" : true}");
        assert_eq!(Value::Float(0.5).to_string(), "0.5");
    }

    #[test]
    fn test_self_containing_containers_print_and_compare() {
        let list = Value::list(vec![Value::Int(1)]);
        if let Value::List(items) = &list {
            items.borrow_mut().push(list.clone());
        }
        assert_eq!(list.to_string(), "[1, [...]]");
        let twin = Value::list(vec![Value::Int(1)]);
        if let Value::List(items) = &twin {
            items.borrow_mut().push(twin.clone());
        }
        assert_eq!(list, twin);

        let table = Value::hash(new_hash_table());
        if let Value::Hash(entries) = &table {
            entries
                .borrow_mut()
                .insert(HashKey::Str(Rc::from("me")), table.clone());
        }
        assert_eq!(table.to_string(), "{\"me\" : {...}}");
        assert_eq!(table, table.clone());
    }

    #[test]
    fn test_equality() {
        assert_eq!(Value::Int(2), Value::Float(2.0));
        assert_eq!(Value::from("x"), Value::from("x"));
        assert_eq!(
            Value::list(vec![Value::Int(1)]),
            Value::list(vec![Value::Int(1)])
        );
        assert_ne!(Value::Null, Value::Bool(false));
        assert_eq!(Value::Type(&types::INT), Value::Type(&types::INT));
        assert_ne!(Value::Type(&types::INT), Value::Type(&types::STR));
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::Null.is_truthy());
        assert!(!Value::Int(0).is_truthy());
        assert!(!Value::from("").is_truthy());
        assert!(!Value::list(Vec::new()).is_truthy());
        assert!(Value::Type(&types::INT).is_truthy());
        assert!(Value::from("0").is_truthy());
    }

    #[test]
    fn test_hash_keys_unify_integral_floats() {
        assert_eq!(
            HashKey::from_value(&Value::Float(3.0)),
            HashKey::from_value(&Value::Int(3))
        );
        assert!(HashKey::from_value(&Value::list(Vec::new())).is_none());
    }
}
