//! Builtin type descriptors and the native methods they expose.
//!
//! Every value belongs to a [`TypeDescriptor`]. Attribute lookups on
//! primitives (`"abc".upper`, `[1].append`) fall back to the descriptor's
//! method table, and descriptors with a constructor are callable
//! (`Int("42")`, `List((1, 2))`).

use std::cell::RefCell;
use std::cmp::Ordering;
use std::rc::Rc;

use super::class::{ExceptionObject, NativeFn};
use super::iter::{IterSource, IterState};
use super::value::{new_hash_table, HashKey, Value};
use crate::error::RuntimeError;
use crate::span::Span;
use crate::vm::Vm;

/// Signature of a builtin method: VM, receiver, arguments.
pub type NativeMethodFn = fn(&mut Vm, &Value, Vec<Value>) -> Result<Value, RuntimeError>;

pub struct NativeMethod {
    pub name: &'static str,
    /// `None` when the method checks its own argument count.
    pub arity: Option<usize>,
    pub func: NativeMethodFn,
}

pub struct TypeDescriptor {
    pub name: &'static str,
    pub methods: &'static [NativeMethod],
    /// Called when the type itself is invoked.
    pub construct: Option<NativeFn>,
}

impl TypeDescriptor {
    pub fn find_method(&'static self, name: &str) -> Option<&'static NativeMethod> {
        self.methods.iter().find(|method| method.name == name)
    }
}

impl std::fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TypeDescriptor({})", self.name)
    }
}

macro_rules! native {
    ($name:literal, $arity:expr, $func:expr) => {
        NativeMethod {
            name: $name,
            arity: $arity,
            func: $func,
        }
    };
}

pub static NULL: TypeDescriptor = TypeDescriptor {
    name: "Null",
    methods: &[],
    construct: None,
};

pub static BOOL: TypeDescriptor = TypeDescriptor {
    name: "Bool",
    methods: &[],
    construct: Some(construct_bool),
};

pub static INT: TypeDescriptor = TypeDescriptor {
    name: "Int",
    methods: &[],
    construct: Some(construct_int),
};

pub static FLOAT: TypeDescriptor = TypeDescriptor {
    name: "Float",
    methods: &[
        native!("floor", Some(0), float_floor),
        native!("ceil", Some(0), float_ceil),
        native!("round", Some(0), float_round),
    ],
    construct: Some(construct_float),
};

pub static STR: TypeDescriptor = TypeDescriptor {
    name: "Str",
    methods: &[
        native!("len", Some(0), str_len),
        native!("upper", Some(0), str_upper),
        native!("lower", Some(0), str_lower),
        native!("trim", Some(0), str_trim),
        native!("split", None, str_split),
        native!("contains", Some(1), str_contains),
        native!("startsWith", Some(1), str_starts_with),
        native!("endsWith", Some(1), str_ends_with),
        native!("indexOf", Some(1), str_index_of),
        native!("substr", None, str_substr),
        native!("replace", Some(2), str_replace),
        native!("join", Some(1), str_join),
    ],
    construct: Some(construct_str),
};

pub static LIST: TypeDescriptor = TypeDescriptor {
    name: "List",
    methods: &[
        native!("append", None, list_append),
        native!("pop", Some(0), list_pop),
        native!("insert", Some(2), list_insert),
        native!("remove", Some(1), list_remove),
        native!("contains", Some(1), sequence_contains),
        native!("indexOf", Some(1), sequence_index_of),
        native!("len", Some(0), sequence_len),
        native!("clear", Some(0), list_clear),
        native!("reverse", Some(0), list_reverse),
        native!("sort", Some(0), list_sort),
        native!("map", Some(1), sequence_map),
        native!("filter", Some(1), sequence_filter),
    ],
    construct: Some(construct_list),
};

pub static TUPLE: TypeDescriptor = TypeDescriptor {
    name: "Tuple",
    methods: &[
        native!("contains", Some(1), sequence_contains),
        native!("indexOf", Some(1), sequence_index_of),
        native!("len", Some(0), sequence_len),
        native!("map", Some(1), sequence_map),
        native!("filter", Some(1), sequence_filter),
    ],
    construct: Some(construct_tuple),
};

pub static HASH: TypeDescriptor = TypeDescriptor {
    name: "Hash",
    methods: &[
        native!("keys", Some(0), hash_keys),
        native!("values", Some(0), hash_values),
        native!("contains", Some(1), hash_contains),
        native!("get", None, hash_get),
        native!("set", Some(2), hash_set),
        native!("remove", Some(1), hash_remove),
        native!("len", Some(0), sequence_len),
    ],
    construct: Some(construct_hash),
};

pub static FUNCTION: TypeDescriptor = TypeDescriptor {
    name: "Function",
    methods: &[],
    construct: None,
};

pub static BUILTIN: TypeDescriptor = TypeDescriptor {
    name: "Builtin",
    methods: &[],
    construct: None,
};

pub static CLASS: TypeDescriptor = TypeDescriptor {
    name: "Class",
    methods: &[],
    construct: None,
};

pub static OBJECT: TypeDescriptor = TypeDescriptor {
    name: "Object",
    methods: &[],
    construct: None,
};

pub static ENUM: TypeDescriptor = TypeDescriptor {
    name: "Enum",
    methods: &[],
    construct: None,
};

pub static INTERFACE: TypeDescriptor = TypeDescriptor {
    name: "Interface",
    methods: &[],
    construct: None,
};

pub static MODULE: TypeDescriptor = TypeDescriptor {
    name: "Module",
    methods: &[],
    construct: None,
};

pub static TYPE: TypeDescriptor = TypeDescriptor {
    name: "Type",
    methods: &[],
    construct: None,
};

pub static EXCEPTION: TypeDescriptor = TypeDescriptor {
    name: "Exception",
    methods: &[],
    construct: Some(construct_exception),
};

pub static ITERATOR: TypeDescriptor = TypeDescriptor {
    name: "Iterator",
    methods: &[],
    construct: None,
};

/// Types exposed to scripts as globals.
pub static BUILTIN_TYPES: [&TypeDescriptor; 8] =
    [&INT, &FLOAT, &STR, &BOOL, &LIST, &TUPLE, &HASH, &EXCEPTION];

// ===== Argument helpers =====

fn type_error(message: impl Into<String>) -> RuntimeError {
    RuntimeError::type_error(message, Span::default())
}

fn arg_count(args: &[Value], min: usize, max: usize) -> Result<(), RuntimeError> {
    if args.len() < min || args.len() > max {
        let expected = if args.len() < min { min } else { max };
        return Err(RuntimeError::wrong_arity(expected, args.len(), Span::default()));
    }
    Ok(())
}

fn str_arg<'a>(args: &'a [Value], index: usize, method: &str) -> Result<&'a str, RuntimeError> {
    match args.get(index) {
        Some(Value::Str(s)) => Ok(s),
        Some(other) => Err(type_error(format!(
            "{} expects a Str argument, got {}",
            method,
            other.type_name()
        ))),
        None => Err(type_error(format!("{} is missing an argument", method))),
    }
}

fn int_arg(args: &[Value], index: usize, method: &str) -> Result<i64, RuntimeError> {
    match args.get(index) {
        Some(Value::Int(n)) => Ok(*n),
        Some(other) => Err(type_error(format!(
            "{} expects an Int argument, got {}",
            method,
            other.type_name()
        ))),
        None => Err(type_error(format!("{} is missing an argument", method))),
    }
}

/// Items of any builtin sequence, used by conversions and iteration.
pub fn sequence_items(value: &Value) -> Option<Vec<Value>> {
    match value {
        Value::List(items) => Some(items.borrow().clone()),
        Value::Tuple(items) => Some(items.to_vec()),
        Value::Str(s) => Some(s.chars().map(|c| Value::str(c.to_string())).collect()),
        Value::Hash(table) => Some(table.borrow().keys().map(HashKey::to_value).collect()),
        _ => None,
    }
}

/// Iterator over a builtin value, if it has one.
pub fn builtin_iterator(value: &Value) -> Option<IterState> {
    match value {
        Value::List(items) => Some(IterState::new(IterSource::List(items.clone()))),
        other => sequence_items(other).map(|items| IterState::new(IterSource::Items(items))),
    }
}

/// Ordering for builtin values that have one.
pub fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        (Value::Int(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
        (Value::Float(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)),
        (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
        (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

// ===== Constructors =====

fn construct_bool(_vm: &mut Vm, args: Vec<Value>) -> Result<Value, RuntimeError> {
    arg_count(&args, 0, 1)?;
    Ok(Value::Bool(args.first().is_some_and(Value::is_truthy)))
}

fn construct_int(_vm: &mut Vm, args: Vec<Value>) -> Result<Value, RuntimeError> {
    arg_count(&args, 0, 1)?;
    match args.first() {
        None => Ok(Value::Int(0)),
        Some(Value::Int(n)) => Ok(Value::Int(*n)),
        Some(Value::Float(f)) => Ok(Value::Int(f.trunc() as i64)),
        Some(Value::Bool(b)) => Ok(Value::Int(i64::from(*b))),
        Some(Value::Str(s)) => s
            .trim()
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| type_error(format!("cannot convert {:?} to Int", &**s))),
        Some(other) => Err(type_error(format!(
            "cannot convert {} to Int",
            other.type_name()
        ))),
    }
}

fn construct_float(_vm: &mut Vm, args: Vec<Value>) -> Result<Value, RuntimeError> {
    arg_count(&args, 0, 1)?;
    match args.first() {
        None => Ok(Value::Float(0.0)),
        Some(Value::Int(n)) => Ok(Value::Float(*n as f64)),
        Some(Value::Float(f)) => Ok(Value::Float(*f)),
        Some(Value::Str(s)) => s
            .trim()
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| type_error(format!("cannot convert {:?} to Float", &**s))),
        Some(other) => Err(type_error(format!(
            "cannot convert {} to Float",
            other.type_name()
        ))),
    }
}

fn construct_str(vm: &mut Vm, args: Vec<Value>) -> Result<Value, RuntimeError> {
    arg_count(&args, 0, 1)?;
    match args.into_iter().next() {
        None => Ok(Value::str("")),
        Some(value) => Ok(Value::str(vm.stringify(&value)?)),
    }
}

fn construct_list(_vm: &mut Vm, args: Vec<Value>) -> Result<Value, RuntimeError> {
    arg_count(&args, 0, 1)?;
    match args.first() {
        None => Ok(Value::list(Vec::new())),
        Some(value) => sequence_items(value)
            .map(Value::list)
            .ok_or_else(|| type_error(format!("cannot convert {} to List", value.type_name()))),
    }
}

fn construct_tuple(_vm: &mut Vm, args: Vec<Value>) -> Result<Value, RuntimeError> {
    arg_count(&args, 0, 1)?;
    match args.first() {
        None => Ok(Value::tuple(Vec::new())),
        Some(value) => sequence_items(value)
            .map(Value::tuple)
            .ok_or_else(|| type_error(format!("cannot convert {} to Tuple", value.type_name()))),
    }
}

fn construct_hash(_vm: &mut Vm, args: Vec<Value>) -> Result<Value, RuntimeError> {
    arg_count(&args, 0, 1)?;
    match args.first() {
        None => Ok(Value::hash(new_hash_table())),
        Some(Value::Hash(table)) => Ok(Value::hash(table.borrow().clone())),
        Some(other) => Err(type_error(format!(
            "cannot convert {} to Hash",
            other.type_name()
        ))),
    }
}

fn construct_exception(vm: &mut Vm, args: Vec<Value>) -> Result<Value, RuntimeError> {
    arg_count(&args, 0, 1)?;
    let message = match args.first() {
        Some(value) => vm.stringify(value)?,
        None => String::new(),
    };
    Ok(Value::Exception(Rc::new(ExceptionObject::new(
        "Exception",
        message,
    ))))
}

// ===== Float =====

fn float_value(receiver: &Value) -> f64 {
    match receiver {
        Value::Float(f) => *f,
        Value::Int(n) => *n as f64,
        _ => 0.0,
    }
}

fn float_floor(_vm: &mut Vm, receiver: &Value, _args: Vec<Value>) -> Result<Value, RuntimeError> {
    Ok(Value::Int(float_value(receiver).floor() as i64))
}

fn float_ceil(_vm: &mut Vm, receiver: &Value, _args: Vec<Value>) -> Result<Value, RuntimeError> {
    Ok(Value::Int(float_value(receiver).ceil() as i64))
}

fn float_round(_vm: &mut Vm, receiver: &Value, _args: Vec<Value>) -> Result<Value, RuntimeError> {
    Ok(Value::Int(float_value(receiver).round() as i64))
}

// ===== Str =====

fn receiver_str(receiver: &Value) -> &str {
    receiver.as_str().unwrap_or_default()
}

fn str_len(_vm: &mut Vm, receiver: &Value, _args: Vec<Value>) -> Result<Value, RuntimeError> {
    Ok(Value::Int(receiver_str(receiver).chars().count() as i64))
}

fn str_upper(_vm: &mut Vm, receiver: &Value, _args: Vec<Value>) -> Result<Value, RuntimeError> {
    Ok(Value::str(receiver_str(receiver).to_uppercase()))
}

fn str_lower(_vm: &mut Vm, receiver: &Value, _args: Vec<Value>) -> Result<Value, RuntimeError> {
    Ok(Value::str(receiver_str(receiver).to_lowercase()))
}

fn str_trim(_vm: &mut Vm, receiver: &Value, _args: Vec<Value>) -> Result<Value, RuntimeError> {
    Ok(Value::str(receiver_str(receiver).trim()))
}

fn str_split(_vm: &mut Vm, receiver: &Value, args: Vec<Value>) -> Result<Value, RuntimeError> {
    arg_count(&args, 0, 1)?;
    let s = receiver_str(receiver);
    let parts: Vec<Value> = if args.is_empty() {
        s.split_whitespace().map(Value::str).collect()
    } else {
        let separator = str_arg(&args, 0, "split")?;
        if separator.is_empty() {
            return Err(type_error("split separator cannot be empty"));
        }
        s.split(separator).map(Value::str).collect()
    };
    Ok(Value::list(parts))
}

fn str_contains(_vm: &mut Vm, receiver: &Value, args: Vec<Value>) -> Result<Value, RuntimeError> {
    let needle = str_arg(&args, 0, "contains")?;
    Ok(Value::Bool(receiver_str(receiver).contains(needle)))
}

fn str_starts_with(
    _vm: &mut Vm,
    receiver: &Value,
    args: Vec<Value>,
) -> Result<Value, RuntimeError> {
    let prefix = str_arg(&args, 0, "startsWith")?;
    Ok(Value::Bool(receiver_str(receiver).starts_with(prefix)))
}

fn str_ends_with(_vm: &mut Vm, receiver: &Value, args: Vec<Value>) -> Result<Value, RuntimeError> {
    let suffix = str_arg(&args, 0, "endsWith")?;
    Ok(Value::Bool(receiver_str(receiver).ends_with(suffix)))
}

fn str_index_of(_vm: &mut Vm, receiver: &Value, args: Vec<Value>) -> Result<Value, RuntimeError> {
    let needle = str_arg(&args, 0, "indexOf")?;
    let s = receiver_str(receiver);
    let index = s
        .find(needle)
        .map(|byte| s[..byte].chars().count() as i64)
        .unwrap_or(-1);
    Ok(Value::Int(index))
}

fn str_substr(_vm: &mut Vm, receiver: &Value, args: Vec<Value>) -> Result<Value, RuntimeError> {
    arg_count(&args, 1, 2)?;
    let chars: Vec<char> = receiver_str(receiver).chars().collect();
    let start = int_arg(&args, 0, "substr")?;
    let end = if args.len() == 2 {
        int_arg(&args, 1, "substr")?
    } else {
        chars.len() as i64
    };
    if start < 0 || end < start || end as usize > chars.len() {
        return Err(RuntimeError::IndexOutOfBounds {
            index: if start < 0 { start } else { end },
            length: chars.len(),
            span: Span::default(),
        });
    }
    Ok(Value::str(
        chars[start as usize..end as usize].iter().collect::<String>(),
    ))
}

fn str_replace(_vm: &mut Vm, receiver: &Value, args: Vec<Value>) -> Result<Value, RuntimeError> {
    let from = str_arg(&args, 0, "replace")?;
    let to = str_arg(&args, 1, "replace")?;
    Ok(Value::str(receiver_str(receiver).replace(from, to)))
}

fn str_join(vm: &mut Vm, receiver: &Value, args: Vec<Value>) -> Result<Value, RuntimeError> {
    let items = args
        .first()
        .and_then(sequence_items)
        .ok_or_else(|| type_error("join expects a sequence"))?;
    let mut parts = Vec::with_capacity(items.len());
    for item in &items {
        parts.push(vm.stringify(item)?);
    }
    Ok(Value::str(parts.join(receiver_str(receiver))))
}

// ===== List, Tuple =====

/// Run `f` on the list under a mutable borrow. `f` must not compare or print
/// values, since those may reach back into the same list.
fn with_list<T>(
    receiver: &Value,
    f: impl FnOnce(&mut Vec<Value>) -> T,
) -> Result<T, RuntimeError> {
    match receiver {
        Value::List(items) => Ok(f(&mut items.borrow_mut())),
        other => Err(type_error(format!("expected List, got {}", other.type_name()))),
    }
}

fn list_append(_vm: &mut Vm, receiver: &Value, args: Vec<Value>) -> Result<Value, RuntimeError> {
    with_list(receiver, |items| items.extend(args))?;
    Ok(Value::Null)
}

fn list_pop(_vm: &mut Vm, receiver: &Value, _args: Vec<Value>) -> Result<Value, RuntimeError> {
    with_list(receiver, |items| items.pop())?.ok_or(RuntimeError::IndexOutOfBounds {
        index: 0,
        length: 0,
        span: Span::default(),
    })
}

fn list_insert(_vm: &mut Vm, receiver: &Value, args: Vec<Value>) -> Result<Value, RuntimeError> {
    let index = int_arg(&args, 0, "insert")?;
    let value = args.get(1).cloned().unwrap_or(Value::Null);
    with_list(receiver, |items| {
        let length = items.len();
        if index < 0 || index as usize > length {
            return Err(RuntimeError::IndexOutOfBounds {
                index,
                length,
                span: Span::default(),
            });
        }
        items.insert(index as usize, value);
        Ok(Value::Null)
    })?
}

fn list_remove(_vm: &mut Vm, receiver: &Value, args: Vec<Value>) -> Result<Value, RuntimeError> {
    let target = args.first().cloned().unwrap_or(Value::Null);
    // The target may be the list itself, so search before borrowing mutably.
    let position = match receiver {
        Value::List(items) => items.borrow().iter().position(|item| *item == target),
        other => return Err(type_error(format!("expected List, got {}", other.type_name()))),
    };
    match position {
        Some(index) => {
            with_list(receiver, |items| items.remove(index))?;
            Ok(Value::Bool(true))
        }
        None => Ok(Value::Bool(false)),
    }
}

fn list_clear(_vm: &mut Vm, receiver: &Value, _args: Vec<Value>) -> Result<Value, RuntimeError> {
    with_list(receiver, |items| items.clear())?;
    Ok(Value::Null)
}

fn list_reverse(_vm: &mut Vm, receiver: &Value, _args: Vec<Value>) -> Result<Value, RuntimeError> {
    with_list(receiver, |items| items.reverse())?;
    Ok(Value::Null)
}

fn list_sort(_vm: &mut Vm, receiver: &Value, _args: Vec<Value>) -> Result<Value, RuntimeError> {
    let mut incomparable = false;
    with_list(receiver, |items| {
        items.sort_by(|a, b| {
            compare(a, b).unwrap_or_else(|| {
                incomparable = true;
                Ordering::Equal
            })
        })
    })?;
    if incomparable {
        return Err(type_error("list contains values that cannot be compared"));
    }
    Ok(Value::Null)
}

fn sequence_contains(
    _vm: &mut Vm,
    receiver: &Value,
    args: Vec<Value>,
) -> Result<Value, RuntimeError> {
    let target = args.first().cloned().unwrap_or(Value::Null);
    let items = sequence_items(receiver).unwrap_or_default();
    Ok(Value::Bool(items.contains(&target)))
}

fn sequence_index_of(
    _vm: &mut Vm,
    receiver: &Value,
    args: Vec<Value>,
) -> Result<Value, RuntimeError> {
    let target = args.first().cloned().unwrap_or(Value::Null);
    let items = sequence_items(receiver).unwrap_or_default();
    let index = items.iter().position(|item| *item == target);
    Ok(Value::Int(index.map_or(-1, |i| i as i64)))
}

fn sequence_len(_vm: &mut Vm, receiver: &Value, _args: Vec<Value>) -> Result<Value, RuntimeError> {
    let length = match receiver {
        Value::List(items) => items.borrow().len(),
        Value::Tuple(items) => items.len(),
        Value::Hash(table) => table.borrow().len(),
        _ => 0,
    };
    Ok(Value::Int(length as i64))
}

fn sequence_map(vm: &mut Vm, receiver: &Value, args: Vec<Value>) -> Result<Value, RuntimeError> {
    let func = args.first().cloned().unwrap_or(Value::Null);
    let items = sequence_items(receiver).unwrap_or_default();
    let mut mapped = Vec::with_capacity(items.len());
    for item in items {
        mapped.push(vm.call_value(&func, vec![item])?);
    }
    Ok(Value::list(mapped))
}

fn sequence_filter(
    vm: &mut Vm,
    receiver: &Value,
    args: Vec<Value>,
) -> Result<Value, RuntimeError> {
    let func = args.first().cloned().unwrap_or(Value::Null);
    let items = sequence_items(receiver).unwrap_or_default();
    let mut kept = Vec::new();
    for item in items {
        if vm.call_value(&func, vec![item.clone()])?.is_truthy() {
            kept.push(item);
        }
    }
    Ok(Value::list(kept))
}

// ===== Hash =====

fn with_hash<T>(
    receiver: &Value,
    f: impl FnOnce(&mut super::value::HashTable) -> T,
) -> Result<T, RuntimeError> {
    match receiver {
        Value::Hash(table) => Ok(f(&mut table.borrow_mut())),
        other => Err(type_error(format!("expected Hash, got {}", other.type_name()))),
    }
}

fn key_arg(args: &[Value]) -> Result<HashKey, RuntimeError> {
    let key = args.first().cloned().unwrap_or(Value::Null);
    HashKey::from_value(&key)
        .ok_or_else(|| type_error(format!("{} cannot be used as a hash key", key.type_name())))
}

fn hash_keys(_vm: &mut Vm, receiver: &Value, _args: Vec<Value>) -> Result<Value, RuntimeError> {
    let keys = with_hash(receiver, |table| {
        table.keys().map(HashKey::to_value).collect()
    })?;
    Ok(Value::list(keys))
}

fn hash_values(_vm: &mut Vm, receiver: &Value, _args: Vec<Value>) -> Result<Value, RuntimeError> {
    let values = with_hash(receiver, |table| table.values().cloned().collect())?;
    Ok(Value::list(values))
}

fn hash_contains(_vm: &mut Vm, receiver: &Value, args: Vec<Value>) -> Result<Value, RuntimeError> {
    let key = key_arg(&args)?;
    Ok(Value::Bool(with_hash(receiver, |table| {
        table.contains_key(&key)
    })?))
}

fn hash_get(_vm: &mut Vm, receiver: &Value, args: Vec<Value>) -> Result<Value, RuntimeError> {
    arg_count(&args, 1, 2)?;
    let key = key_arg(&args)?;
    let default = args.get(1).cloned().unwrap_or(Value::Null);
    with_hash(receiver, |table| table.get(&key).cloned().unwrap_or(default))
}

fn hash_set(_vm: &mut Vm, receiver: &Value, mut args: Vec<Value>) -> Result<Value, RuntimeError> {
    let key = key_arg(&args)?;
    let value = args.pop().unwrap_or(Value::Null);
    with_hash(receiver, |table| table.insert(key, value))?;
    Ok(Value::Null)
}

fn hash_remove(_vm: &mut Vm, receiver: &Value, args: Vec<Value>) -> Result<Value, RuntimeError> {
    let key = key_arg(&args)?;
    with_hash(receiver, |table| {
        table.shift_remove(&key).unwrap_or(Value::Null)
    })
}

/// A fresh iterator value over `value`, for builtins that hand one out.
pub fn iterator_value(state: IterState) -> Value {
    Value::Iterator(Rc::new(RefCell::new(state)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_tables() {
        assert!(STR.find_method("upper").is_some());
        assert!(LIST.find_method("append").is_some());
        assert!(HASH.find_method("keys").is_some());
        assert!(INT.find_method("upper").is_none());
    }

    #[test]
    fn test_compare() {
        assert_eq!(compare(&Value::Int(1), &Value::Float(1.5)), Some(Ordering::Less));
        assert_eq!(
            compare(&Value::from("b"), &Value::from("a")),
            Some(Ordering::Greater)
        );
        assert_eq!(compare(&Value::Null, &Value::Int(1)), None);
    }

    #[test]
    fn test_sequence_items() {
        let items = sequence_items(&Value::from("ab")).unwrap();
        assert_eq!(items, vec![Value::from("a"), Value::from("b")]);
        assert!(sequence_items(&Value::Int(3)).is_none());
    }
}
