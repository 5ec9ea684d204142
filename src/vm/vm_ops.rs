//! Operators, indexing and iteration.
//!
//! Builtin values are handled directly; instances dispatch to their
//! underscore methods (`_add`, `_getItem`, `_iter`, ...).

use std::cmp::Ordering;
use std::rc::Rc;

use crate::ast::{BinaryOp, UnaryOp};
use crate::error::RuntimeError;
use crate::object::types::{builtin_iterator, compare, iterator_value};
use crate::object::{HashKey, IterSource, IterState, Value};
use crate::span::Span;

use super::vm::Vm;

/// Method an instance implements to overload `op`.
fn operator_method(op: BinaryOp) -> Option<&'static str> {
    let name = match op {
        BinaryOp::Add => "_add",
        BinaryOp::Subtract => "_sub",
        BinaryOp::Multiply => "_mul",
        BinaryOp::Divide => "_div",
        BinaryOp::Modulo => "_mod",
        BinaryOp::Equal => "_equals",
        BinaryOp::NotEqual => "_notEquals",
        BinaryOp::Less => "_lt",
        BinaryOp::LessEqual => "_lte",
        BinaryOp::Greater => "_gt",
        BinaryOp::GreaterEqual => "_gte",
        BinaryOp::BitAnd => "_and",
        BinaryOp::BitOr => "_or",
        BinaryOp::BitXor => "_xor",
        BinaryOp::ShiftLeft => "_lshift",
        BinaryOp::ShiftRight => "_rshift",
        BinaryOp::InstanceOf => return None,
    };
    Some(name)
}

fn symbol(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Add => "+",
        BinaryOp::Subtract => "-",
        BinaryOp::Multiply => "*",
        BinaryOp::Divide => "/",
        BinaryOp::Modulo => "%",
        BinaryOp::Equal => "==",
        BinaryOp::NotEqual => "!=",
        BinaryOp::Less => "<",
        BinaryOp::LessEqual => "<=",
        BinaryOp::Greater => ">",
        BinaryOp::GreaterEqual => ">=",
        BinaryOp::ShiftLeft => "<<",
        BinaryOp::ShiftRight => ">>",
        BinaryOp::BitAnd => "&",
        BinaryOp::BitOr => "|",
        BinaryOp::BitXor => "^",
        BinaryOp::InstanceOf => "is",
    }
}

fn unsupported(op: BinaryOp, left: &Value, right: &Value, span: Span) -> RuntimeError {
    RuntimeError::type_error(
        format!(
            "unsupported operand types for {}: {} and {}",
            symbol(op),
            left.type_name(),
            right.type_name()
        ),
        span,
    )
}

fn index_of(index: i64, length: usize, span: Span) -> Result<usize, RuntimeError> {
    usize::try_from(index)
        .ok()
        .filter(|i| *i < length)
        .ok_or(RuntimeError::IndexOutOfBounds {
            index,
            length,
            span,
        })
}

impl Vm {
    pub(crate) fn binary(
        &mut self,
        op: BinaryOp,
        left: Value,
        right: Value,
        span: Span,
    ) -> Result<Value, RuntimeError> {
        if op == BinaryOp::InstanceOf {
            return self.is_instance(&left, &right, span).map(Value::Bool);
        }
        if let Value::Instance(_) = left {
            if let Some(name) = operator_method(op) {
                if let Some(result) = self.call_dunder(&left, name, vec![right.clone()]) {
                    return result;
                }
                if op == BinaryOp::NotEqual {
                    if let Some(result) = self.call_dunder(&left, "_equals", vec![right.clone()]) {
                        return result.map(|v| Value::Bool(!v.is_truthy()));
                    }
                }
            }
        }

        match op {
            BinaryOp::Equal => Ok(Value::Bool(left == right)),
            BinaryOp::NotEqual => Ok(Value::Bool(left != right)),
            BinaryOp::Less | BinaryOp::LessEqual | BinaryOp::Greater | BinaryOp::GreaterEqual => {
                let ordering =
                    compare(&left, &right).ok_or_else(|| unsupported(op, &left, &right, span))?;
                let result = match op {
                    BinaryOp::Less => ordering == Ordering::Less,
                    BinaryOp::LessEqual => ordering != Ordering::Greater,
                    BinaryOp::Greater => ordering == Ordering::Greater,
                    _ => ordering != Ordering::Less,
                };
                Ok(Value::Bool(result))
            }
            _ => self.arithmetic(op, left, right, span),
        }
    }

    fn arithmetic(
        &mut self,
        op: BinaryOp,
        left: Value,
        right: Value,
        span: Span,
    ) -> Result<Value, RuntimeError> {
        match (&left, &right) {
            (Value::Int(a), Value::Int(b)) => int_op(op, *a, *b, span)
                .ok_or_else(|| unsupported(op, &left, &right, span))?,
            (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
                let a = as_float(&left);
                let b = as_float(&right);
                float_op(op, a, b, span).ok_or_else(|| unsupported(op, &left, &right, span))?
            }
            (Value::Str(a), Value::Str(b)) if op == BinaryOp::Add => {
                Ok(Value::str(format!("{}{}", a, b)))
            }
            (Value::Str(s), Value::Int(n)) if op == BinaryOp::Multiply => {
                repeat_str(s, *n, span)
            }
            (Value::List(a), Value::List(b)) if op == BinaryOp::Add => {
                let mut items = a.borrow().clone();
                items.extend(b.borrow().iter().cloned());
                Ok(Value::list(items))
            }
            (Value::Tuple(a), Value::Tuple(b)) if op == BinaryOp::Add => {
                Ok(Value::tuple(a.iter().chain(b.iter()).cloned().collect()))
            }
            (Value::Bool(a), Value::Bool(b)) => match op {
                BinaryOp::BitAnd => Ok(Value::Bool(a & b)),
                BinaryOp::BitOr => Ok(Value::Bool(a | b)),
                BinaryOp::BitXor => Ok(Value::Bool(a ^ b)),
                _ => Err(unsupported(op, &left, &right, span)),
            },
            _ => Err(unsupported(op, &left, &right, span)),
        }
    }

    pub(crate) fn unary(
        &mut self,
        op: UnaryOp,
        operand: Value,
        span: Span,
    ) -> Result<Value, RuntimeError> {
        match (op, &operand) {
            (UnaryOp::Not, _) => Ok(Value::Bool(!operand.is_truthy())),
            (UnaryOp::Negate, Value::Int(n)) => Ok(Value::Int(n.wrapping_neg())),
            (UnaryOp::Negate, Value::Float(f)) => Ok(Value::Float(-f)),
            (UnaryOp::BitNot, Value::Int(n)) => Ok(Value::Int(!n)),
            (UnaryOp::Negate, Value::Instance(_)) | (UnaryOp::BitNot, Value::Instance(_)) => {
                let name = if op == UnaryOp::Negate {
                    "_negate"
                } else {
                    "_invert"
                };
                self.call_dunder(&operand, name, Vec::new())
                    .unwrap_or_else(|| Err(unary_error(op, &operand, span)))
            }
            _ => Err(unary_error(op, &operand, span)),
        }
    }

    // --- Indexing ---

    pub fn get_index(
        &mut self,
        object: &Value,
        index: &Value,
        span: Span,
    ) -> Result<Value, RuntimeError> {
        match (object, index) {
            (Value::List(items), Value::Int(i)) => {
                let items = items.borrow();
                Ok(items[index_of(*i, items.len(), span)?].clone())
            }
            (Value::Tuple(items), Value::Int(i)) => Ok(items[index_of(*i, items.len(), span)?].clone()),
            (Value::Str(s), Value::Int(i)) => {
                let length = s.chars().count();
                let position = index_of(*i, length, span)?;
                Ok(s.chars()
                    .nth(position)
                    .map(|c| Value::str(c.to_string()))
                    .unwrap_or(Value::Null))
            }
            (Value::Hash(table), key) => {
                let hash_key = HashKey::from_value(key).ok_or_else(|| {
                    RuntimeError::type_error(
                        format!("{} cannot be used as a hash key", key.type_name()),
                        span,
                    )
                })?;
                table
                    .borrow()
                    .get(&hash_key)
                    .cloned()
                    .ok_or_else(|| RuntimeError::KeyNotFound {
                        key: key.repr(),
                        span,
                    })
            }
            (Value::Instance(_), _) => self
                .call_dunder(object, "_getItem", vec![index.clone()])
                .unwrap_or_else(|| Err(not_indexable(object, span))),
            _ => Err(not_indexable(object, span)),
        }
    }

    pub fn set_index(
        &mut self,
        object: &Value,
        index: Value,
        value: Value,
        span: Span,
    ) -> Result<(), RuntimeError> {
        match (object, &index) {
            (Value::List(items), Value::Int(i)) => {
                let mut items = items.borrow_mut();
                let position = index_of(*i, items.len(), span)?;
                items[position] = value;
                Ok(())
            }
            (Value::Hash(table), key) => {
                let hash_key = HashKey::from_value(key).ok_or_else(|| {
                    RuntimeError::type_error(
                        format!("{} cannot be used as a hash key", key.type_name()),
                        span,
                    )
                })?;
                table.borrow_mut().insert(hash_key, value);
                Ok(())
            }
            (Value::Instance(_), _) => self
                .call_dunder(object, "_setItem", vec![index, value])
                .unwrap_or_else(|| Err(not_indexable(object, span)))
                .map(|_| ()),
            _ => Err(RuntimeError::type_error(
                format!("{} does not support item assignment", object.type_name()),
                span,
            )),
        }
    }

    /// Length of a sized value, honouring `_len` on instances.
    pub fn length(&mut self, value: &Value, span: Span) -> Result<i64, RuntimeError> {
        let length = match value {
            Value::Str(s) => s.chars().count(),
            Value::List(items) => items.borrow().len(),
            Value::Tuple(items) => items.len(),
            Value::Hash(table) => table.borrow().len(),
            Value::Instance(_) => {
                let result = self
                    .call_dunder(value, "_len", Vec::new())
                    .unwrap_or_else(|| Err(no_length(value, span)))?;
                return result.as_int().ok_or_else(|| {
                    RuntimeError::type_error("_len must return an Int", span)
                });
            }
            other => return Err(no_length(other, span)),
        };
        Ok(length as i64)
    }

    // --- Iteration ---

    /// `GET_ITER`.
    pub(crate) fn get_iterator(&mut self, iterable: Value, span: Span) -> Result<Value, RuntimeError> {
        if let Value::Iterator(_) = iterable {
            return Ok(iterable);
        }
        if let Some(state) = builtin_iterator(&iterable) {
            return Ok(iterator_value(state));
        }
        let Value::Instance(instance) = &iterable else {
            return Err(not_iterable(&iterable, span));
        };

        let source = if instance.class.find_method("_iter").is_some() {
            let produced = self
                .call_dunder(&iterable, "_iter", Vec::new())
                .unwrap_or(Ok(Value::Null))?;
            if !matches!(produced, Value::Instance(_)) {
                return self.get_iterator(produced, span);
            }
            produced
        } else if instance.class.find_method("_iterMoveNext").is_some() {
            iterable.clone()
        } else {
            return Err(not_iterable(&iterable, span));
        };

        if let Some(result) = self.call_dunder(&source, "_iterReset", Vec::new()) {
            result?;
        }
        Ok(iterator_value(IterState::new(IterSource::Object(source))))
    }

    /// `ITER_MOVE_NEXT`.
    pub(crate) fn iter_move_next(&mut self, iterator: &Value, span: Span) -> Result<bool, RuntimeError> {
        let state = iterator_state(iterator, span)?;
        let step = state.borrow_mut().move_next();
        match step {
            Some(more) => Ok(more),
            None => {
                let object = state.borrow().object().unwrap_or(Value::Null);
                let more = self
                    .call_dunder(&object, "_iterMoveNext", Vec::new())
                    .unwrap_or_else(|| Err(not_iterable(&object, span)))?;
                Ok(more.is_truthy())
            }
        }
    }

    /// `ITER_GET_NEXT`.
    pub(crate) fn iter_current(&mut self, iterator: &Value, span: Span) -> Result<Value, RuntimeError> {
        let state = iterator_state(iterator, span)?;
        let object = state.borrow().object();
        match object {
            None => Ok(state.borrow().current()),
            Some(object) => self
                .call_dunder(&object, "_iterGetCurrent", Vec::new())
                .unwrap_or_else(|| Err(not_iterable(&object, span))),
        }
    }
}

fn iterator_state(
    iterator: &Value,
    span: Span,
) -> Result<Rc<std::cell::RefCell<IterState>>, RuntimeError> {
    match iterator {
        Value::Iterator(state) => Ok(state.clone()),
        other => Err(not_iterable(other, span)),
    }
}

fn int_op(op: BinaryOp, a: i64, b: i64, span: Span) -> Option<Result<Value, RuntimeError>> {
    let value = match op {
        BinaryOp::Add => a.wrapping_add(b),
        BinaryOp::Subtract => a.wrapping_sub(b),
        BinaryOp::Multiply => a.wrapping_mul(b),
        BinaryOp::Divide | BinaryOp::Modulo if b == 0 => {
            return Some(Err(RuntimeError::division_by_zero(span)))
        }
        BinaryOp::Divide => a.wrapping_div(b),
        BinaryOp::Modulo => a.wrapping_rem(b),
        BinaryOp::BitAnd => a & b,
        BinaryOp::BitOr => a | b,
        BinaryOp::BitXor => a ^ b,
        BinaryOp::ShiftLeft => a.wrapping_shl(b as u32),
        BinaryOp::ShiftRight => a.wrapping_shr(b as u32),
        _ => return None,
    };
    Some(Ok(Value::Int(value)))
}

fn float_op(op: BinaryOp, a: f64, b: f64, span: Span) -> Option<Result<Value, RuntimeError>> {
    let value = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Subtract => a - b,
        BinaryOp::Multiply => a * b,
        BinaryOp::Divide | BinaryOp::Modulo if b == 0.0 => {
            return Some(Err(RuntimeError::division_by_zero(span)))
        }
        BinaryOp::Divide => a / b,
        BinaryOp::Modulo => a % b,
        _ => return None,
    };
    Some(Ok(Value::Float(value)))
}

fn as_float(value: &Value) -> f64 {
    match value {
        Value::Int(n) => *n as f64,
        Value::Float(f) => *f,
        _ => 0.0,
    }
}

/// Longest string `str * int` may build, in bytes.
const MAX_REPEAT_LEN: usize = 1 << 28;

/// `str * n`; a count below one gives the empty string.
fn repeat_str(s: &str, count: i64, span: Span) -> Result<Value, RuntimeError> {
    let count = usize::try_from(count).unwrap_or(0);
    match s.len().checked_mul(count) {
        Some(length) if length <= MAX_REPEAT_LEN => Ok(Value::str(s.repeat(count))),
        _ => Err(RuntimeError::new(
            format!(
                "string repetition of {} bytes by {} exceeds the {} byte limit",
                s.len(),
                count,
                MAX_REPEAT_LEN
            ),
            span,
        )),
    }
}

fn unary_error(op: UnaryOp, operand: &Value, span: Span) -> RuntimeError {
    let symbol = match op {
        UnaryOp::Negate => "-",
        UnaryOp::Not => "!",
        UnaryOp::BitNot => "~",
    };
    RuntimeError::type_error(
        format!("bad operand type for unary {}: {}", symbol, operand.type_name()),
        span,
    )
}

fn not_indexable(value: &Value, span: Span) -> RuntimeError {
    RuntimeError::type_error(format!("{} is not indexable", value.type_name()), span)
}

fn not_iterable(value: &Value, span: Span) -> RuntimeError {
    RuntimeError::type_error(format!("{} is not iterable", value.type_name()), span)
}

fn no_length(value: &Value, span: Span) -> RuntimeError {
    RuntimeError::type_error(format!("{} has no length", value.type_name()), span)
}
