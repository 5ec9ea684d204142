//! Class operations for the VM: attribute access, inheritance and `is`.

use std::rc::Rc;

use crate::error::RuntimeError;
use crate::object::{type_descriptor, BoundMethod, BoundNative, Value};
use crate::span::Span;

use super::vm::Vm;

impl Vm {
    /// Resolve `object.name`.
    ///
    /// Instances look at their own attributes, then class methods (bound to
    /// the instance), then class attributes and bases. Builtin values fall
    /// back to the native methods of their type.
    pub fn get_attribute(
        &self,
        object: &Value,
        name: &str,
        span: Span,
    ) -> Result<Value, RuntimeError> {
        let found = match object {
            Value::Instance(instance) => instance
                .get(name)
                .or_else(|| {
                    instance.class.find_method(name).map(|method| {
                        Value::BoundMethod(Rc::new(BoundMethod {
                            receiver: object.clone(),
                            method,
                        }))
                    })
                })
                .or_else(|| instance.class.find_attribute(name)),
            Value::Class(class) => class
                .find_attribute(name)
                .or_else(|| class.find_method(name).map(Value::Method)),
            Value::Enum(members) => members.members.get(name).copied().map(Value::Int),
            Value::Module(module) => module.get_attribute(name),
            Value::Exception(exception) => match name {
                "kind" => Some(Value::str(&exception.kind)),
                "message" => Some(Value::str(&exception.message)),
                _ => None,
            },
            _ => None,
        };

        found
            .or_else(|| {
                type_descriptor(object).find_method(name).map(|method| {
                    Value::BoundNative(Rc::new(BoundNative {
                        receiver: object.clone(),
                        method,
                    }))
                })
            })
            .ok_or_else(|| RuntimeError::no_such_attribute(object.type_name(), name, span))
    }

    /// Assign `object.name = value`. Only instances, classes and modules carry
    /// writable attributes.
    pub fn set_attribute(
        &self,
        object: &Value,
        name: &str,
        value: Value,
        span: Span,
    ) -> Result<(), RuntimeError> {
        match object {
            Value::Instance(instance) => instance.set(name, value),
            Value::Class(class) => {
                class.attributes.borrow_mut().insert(name.to_string(), value);
            }
            Value::Module(module) => module.set_attribute(name, value),
            other => {
                return Err(RuntimeError::type_error(
                    format!("cannot set attribute '{}' on {}", name, other.type_name()),
                    span,
                ))
            }
        }
        Ok(())
    }

    /// `INHERIT`: attach base classes and implemented interfaces.
    pub(crate) fn inherit(
        &self,
        class: &Value,
        bases: Vec<Value>,
        span: Span,
    ) -> Result<(), RuntimeError> {
        let Value::Class(class) = class else {
            return Err(RuntimeError::type_error(
                format!("cannot inherit into {}", class.type_name()),
                span,
            ));
        };
        for base in &bases {
            match base {
                Value::Class(base) if Rc::ptr_eq(base, class) || base.is_subclass_of(class) => {
                    return Err(RuntimeError::type_error(
                        format!("class '{}' cannot inherit from itself", class.name),
                        span,
                    ));
                }
                Value::Class(_) | Value::Interface(_) => {}
                other => {
                    return Err(RuntimeError::type_error(
                        format!(
                            "class '{}' cannot inherit from {}",
                            class.name,
                            other.type_name()
                        ),
                        span,
                    ))
                }
            }
        }
        class.bases.borrow_mut().extend(bases);
        Ok(())
    }

    /// `value is target`.
    pub(crate) fn is_instance(
        &self,
        value: &Value,
        target: &Value,
        span: Span,
    ) -> Result<bool, RuntimeError> {
        let result = match target {
            Value::Class(class) => match value {
                Value::Instance(instance) => instance.class.is_subclass_of(class),
                _ => false,
            },
            Value::Interface(interface) => match value {
                Value::Instance(instance) => instance.satisfies(interface),
                _ => false,
            },
            Value::Type(descriptor) => std::ptr::eq(type_descriptor(value), *descriptor),
            Value::Enum(members) => match value {
                Value::Int(ordinal) => members.contains(*ordinal),
                _ => false,
            },
            other => {
                return Err(RuntimeError::type_error(
                    format!("right side of 'is' must be a type, got {}", other.type_name()),
                    span,
                ))
            }
        };
        Ok(result)
    }
}
