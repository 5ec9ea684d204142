//! Global builtin functions and types.

use std::rc::Rc;

use indexmap::IndexMap;

use crate::error::RuntimeError;
use crate::object::types::{iterator_value, BUILTIN_TYPES};
use crate::object::{IterSource, IterState, NativeFn, NativeFunction, Value};
use crate::span::Span;

use super::vm::Vm;

const FUNCTIONS: &[(&str, Option<usize>, NativeFn)] = &[
    ("print", None, print),
    ("len", Some(1), len),
    ("str", Some(1), to_str),
    ("repr", Some(1), repr),
    ("typeof", Some(1), type_of),
    ("range", None, range),
];

/// Register every builtin under its global name.
pub fn install(globals: &mut IndexMap<String, Value>) {
    for &(name, arity, func) in FUNCTIONS {
        let native = NativeFunction { name, arity, func };
        globals.insert(name.to_string(), Value::Native(Rc::new(native)));
    }
    for descriptor in BUILTIN_TYPES {
        globals.insert(descriptor.name.to_string(), Value::Type(descriptor));
    }
}

fn print(vm: &mut Vm, args: Vec<Value>) -> Result<Value, RuntimeError> {
    let mut parts = Vec::with_capacity(args.len());
    for arg in &args {
        parts.push(vm.stringify(arg)?);
    }
    vm.write_line(parts.join(" "));
    Ok(Value::Null)
}

fn len(vm: &mut Vm, args: Vec<Value>) -> Result<Value, RuntimeError> {
    vm.length(&args[0], Span::default()).map(Value::Int)
}

fn to_str(vm: &mut Vm, args: Vec<Value>) -> Result<Value, RuntimeError> {
    vm.stringify(&args[0]).map(Value::str)
}

fn repr(vm: &mut Vm, args: Vec<Value>) -> Result<Value, RuntimeError> {
    match &args[0] {
        Value::Instance(_) => vm.stringify(&args[0]).map(Value::str),
        other => Ok(Value::str(other.repr())),
    }
}

fn type_of(_vm: &mut Vm, args: Vec<Value>) -> Result<Value, RuntimeError> {
    Ok(Value::str(args[0].type_name()))
}

/// `range(end)`, `range(start, end)` or `range(start, end, step)` as a lazy
/// iterator.
fn range(_vm: &mut Vm, args: Vec<Value>) -> Result<Value, RuntimeError> {
    let mut bounds = Vec::with_capacity(args.len());
    for arg in &args {
        match arg {
            Value::Int(n) => bounds.push(*n),
            other => {
                return Err(RuntimeError::type_error(
                    format!("range expects Int arguments, got {}", other.type_name()),
                    Span::default(),
                ))
            }
        }
    }
    let (start, end, step) = match bounds[..] {
        [end] => (0, end, 1),
        [start, end] => (start, end, 1),
        [start, end, step] => (start, end, step),
        _ => {
            return Err(RuntimeError::wrong_arity(
                if args.is_empty() { 1 } else { 3 },
                args.len(),
                Span::default(),
            ))
        }
    };
    if step == 0 {
        return Err(RuntimeError::new("range step cannot be zero", Span::default()));
    }

    Ok(iterator_value(IterState::new(IterSource::Range { start, end, step })))
}

impl Vm {
    /// Text of a value as `print` and `Str` show it, honouring `_str`.
    pub fn stringify(&mut self, value: &Value) -> Result<String, RuntimeError> {
        if let Some(result) = self.call_dunder(value, "_str", Vec::new()) {
            return match result? {
                Value::Str(s) => Ok(s.to_string()),
                other => Ok(other.to_string()),
            };
        }
        Ok(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ints(value: Value) -> Vec<i64> {
        let Value::Iterator(state) = value else {
            panic!("expected an iterator");
        };
        let mut state = state.borrow_mut();
        let mut ints = Vec::new();
        while state.move_next() == Some(true) {
            ints.extend(state.current().as_int());
        }
        ints
    }

    #[test]
    fn test_range_forms() {
        let mut vm = Vm::new();
        assert_eq!(ints(range(&mut vm, vec![Value::Int(3)]).unwrap()), vec![0, 1, 2]);
        assert_eq!(
            ints(range(&mut vm, vec![Value::Int(5), Value::Int(1), Value::Int(-2)]).unwrap()),
            vec![5, 3]
        );
        assert!(range(&mut vm, vec![Value::Int(0), Value::Int(1), Value::Int(0)]).is_err());
    }

    #[test]
    fn test_type_names_are_globals() {
        let vm = Vm::new();
        assert!(matches!(vm.global("Int"), Some(Value::Type(_))));
        assert!(matches!(vm.global("print"), Some(Value::Native(_))));
    }
}
