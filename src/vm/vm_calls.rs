//! Function call dispatch for the VM.

use std::rc::Rc;

use crate::bytecode::{Method, MethodKind, Module};
use crate::error::RuntimeError;
use crate::object::{BoundMethod, ClassObject, Instance, Locals, Value};
use crate::span::Span;

use super::vm::{Frame, Vm};

/// What preparing a call produced.
enum Call {
    /// A bytecode frame was pushed and is now running.
    Frame,
    /// A native finished immediately.
    Done(Value),
}

impl Vm {
    /// Call any callable value from native code and wait for its result.
    pub fn call_value(&mut self, callee: &Value, args: Vec<Value>) -> Result<Value, RuntimeError> {
        let base_depth = self.frames.len();
        let stack_len = self.stack.len();
        match self.prepare_call(callee.clone(), args, Span::default())? {
            Call::Done(value) => Ok(value),
            Call::Frame => {
                let result = self.run_until(base_depth);
                if result.is_err() {
                    self.stack.truncate(stack_len);
                }
                result
            }
        }
    }

    /// Look up `name` on `receiver` and call it.
    pub fn call_attribute(
        &mut self,
        receiver: &Value,
        name: &str,
        args: Vec<Value>,
        span: Span,
    ) -> Result<Value, RuntimeError> {
        let callee = self.get_attribute(receiver, name, span)?;
        self.call_value(&callee, args).map_err(|err| err.at(span))
    }

    /// `INVOKE`: bytecode callees continue in the dispatch loop, natives push
    /// their result straight away.
    pub(crate) fn invoke(
        &mut self,
        callee: Value,
        args: Vec<Value>,
        span: Span,
    ) -> Result<(), RuntimeError> {
        if let Call::Done(value) = self.prepare_call(callee, args, span)? {
            self.push(value);
        }
        Ok(())
    }

    fn prepare_call(
        &mut self,
        callee: Value,
        args: Vec<Value>,
        span: Span,
    ) -> Result<Call, RuntimeError> {
        match callee {
            Value::Method(method) => {
                self.enter_method(method, Value::Null, args, false, span)?;
                Ok(Call::Frame)
            }
            Value::BoundMethod(bound) => {
                self.enter_method(bound.method.clone(), bound.receiver.clone(), args, false, span)?;
                Ok(Call::Frame)
            }
            Value::Closure(closure) => {
                let module = method_module(&closure.method, span)?;
                let locals = closure.locals.enter(closure.method.own_slots.clone());
                bind_into(&closure.method, &locals, args, span)?;
                let frame = Frame::new(
                    closure.method.clone(),
                    module,
                    locals,
                    closure.self_value.clone(),
                );
                self.push_frame(frame, span)?;
                Ok(Call::Frame)
            }
            Value::Native(native) => {
                if let Some(expected) = native.arity {
                    if args.len() != expected {
                        return Err(RuntimeError::wrong_arity(expected, args.len(), span));
                    }
                }
                let value = (native.func)(self, args).map_err(|err| err.at(span))?;
                Ok(Call::Done(value))
            }
            Value::BoundNative(bound) => {
                if let Some(expected) = bound.method.arity {
                    if args.len() != expected {
                        return Err(RuntimeError::wrong_arity(expected, args.len(), span));
                    }
                }
                let value =
                    (bound.method.func)(self, &bound.receiver, args).map_err(|err| err.at(span))?;
                Ok(Call::Done(value))
            }
            Value::Class(class) => self.instantiate(class, args, span),
            Value::Type(descriptor) => match descriptor.construct {
                Some(construct) => {
                    let value = construct(self, args).map_err(|err| err.at(span))?;
                    Ok(Call::Done(value))
                }
                None => Err(RuntimeError::not_callable(
                    format!("type {}", descriptor.name),
                    span,
                )),
            },
            Value::Instance(ref instance) => match instance.class.find_method("_call") {
                Some(method) => {
                    self.enter_method(method, callee.clone(), args, false, span)?;
                    Ok(Call::Frame)
                }
                None => Err(RuntimeError::not_callable(callee.type_name(), span)),
            },
            other => Err(RuntimeError::not_callable(other.type_name(), span)),
        }
    }

    /// Push a frame running `method` on `receiver`.
    fn enter_method(
        &mut self,
        method: Rc<Method>,
        receiver: Value,
        args: Vec<Value>,
        returns_self: bool,
        span: Span,
    ) -> Result<(), RuntimeError> {
        if method.kind == MethodKind::Abstract {
            return Err(RuntimeError::new(
                format!("cannot call abstract method '{}'", method.name),
                span,
            ));
        }
        let module = method_module(&method, span)?;
        let locals = Locals::new(method.local_count);
        bind_into(&method, &locals, args, span)?;
        let mut frame = Frame::new(method, module, locals, receiver);
        frame.returns_self = returns_self;
        self.push_frame(frame, span)
    }

    /// Calling a class makes an instance and runs the nearest constructor on it.
    fn instantiate(
        &mut self,
        class: Rc<ClassObject>,
        args: Vec<Value>,
        span: Span,
    ) -> Result<Call, RuntimeError> {
        let instance = Value::Instance(Rc::new(Instance::new(class.clone())));
        match class.find_constructor() {
            Some(constructor) => {
                self.enter_method(constructor, instance, args, true, span)?;
                Ok(Call::Frame)
            }
            None if args.is_empty() => Ok(Call::Done(instance)),
            None => Err(RuntimeError::wrong_arity(0, args.len(), span)),
        }
    }

    /// `INVOKE_SUPER`: run the first base constructor on the current receiver.
    pub(crate) fn invoke_super(
        &mut self,
        class: Value,
        args: Vec<Value>,
        span: Span,
    ) -> Result<(), RuntimeError> {
        let Value::Class(class) = class else {
            return Err(RuntimeError::type_error(
                format!("super expects a class, got {}", class.type_name()),
                span,
            ));
        };
        let constructor = class.bases.borrow().iter().find_map(|base| match base {
            Value::Class(base) => base.find_constructor(),
            _ => None,
        });
        let receiver = self.frame().self_value.clone();
        match constructor {
            Some(constructor) => self.enter_method(constructor, receiver, args, false, span),
            None if args.is_empty() => {
                self.push(Value::Null);
                Ok(())
            }
            None => Err(RuntimeError::wrong_arity(0, args.len(), span)),
        }
    }

    /// Call an instance method found by name, if the class defines it.
    pub(crate) fn call_dunder(
        &mut self,
        receiver: &Value,
        name: &str,
        args: Vec<Value>,
    ) -> Option<Result<Value, RuntimeError>> {
        let Value::Instance(instance) = receiver else {
            return None;
        };
        let method = instance.class.find_method(name)?;
        let bound = Value::BoundMethod(Rc::new(BoundMethod {
            receiver: receiver.clone(),
            method,
        }));
        Some(self.call_value(&bound, args))
    }
}

fn method_module(method: &Method, span: Span) -> Result<Rc<Module>, RuntimeError> {
    method.module().ok_or_else(|| {
        RuntimeError::new(
            format!("method '{}' does not belong to a loaded module", method.name),
            span,
        )
    })
}

/// Store arguments into parameter slots. A variadic method collects the
/// surplus into a tuple in its last parameter.
fn bind_into(
    method: &Method,
    locals: &Locals,
    mut args: Vec<Value>,
    span: Span,
) -> Result<(), RuntimeError> {
    let arity = method.arity();
    if method.variadic {
        let fixed = arity.saturating_sub(1);
        if args.len() < fixed {
            return Err(RuntimeError::wrong_arity(fixed, args.len(), span));
        }
        let rest = args.split_off(fixed);
        args.push(Value::tuple(rest));
    } else if args.len() != arity {
        return Err(RuntimeError::wrong_arity(arity, args.len(), span));
    }

    for (slot, value) in method.parameters.values().zip(args) {
        locals.set(*slot, value);
    }
    Ok(())
}
