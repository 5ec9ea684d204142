//! The bytecode virtual machine: frames, the value stack and dispatch.

use std::rc::Rc;

use indexmap::IndexMap;
use tracing::trace;

use crate::ast::{BinaryOp, UnaryOp};
use crate::bytecode::instruction::{decode_binary, decode_unary};
use crate::bytecode::{Instruction, Method, Module, Opcode};
use crate::config::Config;
use crate::error::RuntimeError;
use crate::object::{Closure, HashKey, Locals, Value};
use crate::span::Span;

use super::builtins;
use super::loader::ModuleLoader;

/// One activation of a method.
pub struct Frame {
    pub method: Rc<Method>,
    /// Module whose constant pool and namespace the method uses.
    pub module: Rc<Module>,
    pub ip: usize,
    /// Shared with any lambda created by this frame.
    pub locals: Locals,
    pub self_value: Value,
    /// Stack height when the frame was entered.
    pub stack_base: usize,
    /// Exception caught by the most recent handler in this frame.
    pub exception: Value,
    /// Constructors hand back their receiver instead of the returned value.
    pub returns_self: bool,
}

impl Frame {
    pub fn new(
        method: Rc<Method>,
        module: Rc<Module>,
        locals: Locals,
        self_value: Value,
    ) -> Self {
        Self {
            method,
            module,
            ip: 0,
            locals,
            self_value,
            stack_base: 0,
            exception: Value::Null,
            returns_self: false,
        }
    }
}

/// A handler installed by `PUSH_HANDLER`.
#[derive(Debug, Clone, Copy)]
pub struct ExceptionHandler {
    /// Instruction index of the `except` block.
    pub target: usize,
    /// Number of frames when the handler was installed.
    pub frame_depth: usize,
    /// Stack height to restore before jumping.
    pub stack_len: usize,
}

/// The bytecode VM.
pub struct Vm {
    pub stack: Vec<Value>,
    pub frames: Vec<Frame>,
    pub handlers: Vec<ExceptionHandler>,
    pub(crate) builtins: IndexMap<String, Value>,
    pub(crate) loader: ModuleLoader,
    /// The value thrown by the error currently unwinding, if any.
    pub(crate) raised: Option<Value>,
    pub(crate) max_call_depth: usize,
    /// Lines written by `print` while capture is on.
    pub output: Vec<String>,
    capture: bool,
}

impl Vm {
    pub fn new() -> Self {
        Self::with_config(&Config::default())
    }

    pub fn with_config(config: &Config) -> Self {
        let mut vm = Self {
            stack: Vec::with_capacity(256),
            frames: Vec::with_capacity(64),
            handlers: Vec::new(),
            builtins: IndexMap::new(),
            loader: ModuleLoader::new(config.clone()),
            raised: None,
            max_call_depth: config.max_call_depth,
            output: Vec::new(),
            capture: false,
        };
        builtins::install(&mut vm.builtins);
        vm
    }

    /// Collect `print` output in [`Vm::output`] instead of writing to stdout.
    pub fn capture_output(&mut self, capture: bool) {
        self.capture = capture;
    }

    pub(crate) fn write_line(&mut self, line: String) {
        if self.capture {
            self.output.push(line);
        } else {
            println!("{}", line);
        }
    }

    /// Run a module's initializer and return the value it finished with.
    ///
    /// An uncaught `raise` surfaces as [`RuntimeError::Uncaught`]; other
    /// failures keep their own variant.
    pub fn execute(&mut self, module: &Rc<Module>) -> Result<Value, RuntimeError> {
        let result = self.run_module(module);
        self.raised = None;
        result
    }

    pub(crate) fn run_module(&mut self, module: &Rc<Module>) -> Result<Value, RuntimeError> {
        let method = module.initializer.clone();
        let locals = Locals::new(method.local_count);
        let frame = Frame::new(method, module.clone(), locals, Value::Null);
        self.run_frame(frame, Span::default())
    }

    /// Push `frame` and run it to completion.
    pub(crate) fn run_frame(&mut self, frame: Frame, span: Span) -> Result<Value, RuntimeError> {
        let base_depth = self.frames.len();
        let stack_len = self.stack.len();
        self.push_frame(frame, span)?;
        let result = self.run_until(base_depth);
        if result.is_err() {
            self.stack.truncate(stack_len);
        }
        result
    }

    pub(crate) fn push_frame(&mut self, mut frame: Frame, span: Span) -> Result<(), RuntimeError> {
        if self.frames.len() >= self.max_call_depth {
            return Err(RuntimeError::StackOverflow(self.max_call_depth, span));
        }
        frame.stack_base = self.stack.len();
        trace!(method = %frame.method.name, depth = self.frames.len() + 1, "enter");
        self.frames.push(frame);
        Ok(())
    }

    /// Execute until the frame count drops back to `base_depth`.
    ///
    /// Errors are routed to handlers installed above `base_depth`; anything
    /// left unhandled unwinds to `base_depth` and is returned.
    pub(crate) fn run_until(&mut self, base_depth: usize) -> Result<Value, RuntimeError> {
        loop {
            match self.step(base_depth) {
                Ok(Some(value)) => return Ok(value),
                Ok(None) => {}
                Err(err) => self.recover(err, base_depth)?,
            }
        }
    }

    fn step(&mut self, base_depth: usize) -> Result<Option<Value>, RuntimeError> {
        let frame = self.frame_mut();
        let Some(instruction) = frame.method.instructions.get(frame.ip).copied() else {
            return Ok(self.return_from_frame(base_depth));
        };
        frame.ip += 1;
        self.execute_instruction(instruction, base_depth)
            .map_err(|err| err.at(instruction.span))
    }

    fn execute_instruction(
        &mut self,
        instruction: Instruction,
        base_depth: usize,
    ) -> Result<Option<Value>, RuntimeError> {
        let Instruction {
            opcode,
            argument,
            span,
        } = instruction;

        match opcode {
            Opcode::Nop => {}
            Opcode::Pop => {
                self.pop();
            }
            Opcode::Dup => {
                let value = self.peek(0).clone();
                self.push(value);
            }

            Opcode::LoadConst => {
                let value = self.constant(argument)?;
                self.push(value);
            }
            Opcode::LoadNull => self.push(Value::Null),
            Opcode::LoadTrue => self.push(Value::Bool(true)),
            Opcode::LoadFalse => self.push(Value::Bool(false)),
            Opcode::LoadSelf => {
                let value = self.frame().self_value.clone();
                self.push(value);
            }
            Opcode::LoadLocal => {
                let value = self.frame().locals.get(argument as usize);
                self.push(value);
            }
            Opcode::StoreLocal => {
                let value = self.pop();
                self.frame().locals.set(argument as usize, value);
            }
            Opcode::LoadGlobal => {
                let name = self.name(argument)?;
                let value = self.load_global(&name, span)?;
                self.push(value);
            }
            Opcode::StoreGlobal => {
                let name = self.name(argument)?;
                let value = self.pop();
                self.frame().module.set_attribute(&*name, value);
            }
            Opcode::LoadAttribute => {
                let name = self.name(argument)?;
                let object = self.pop();
                let value = self.get_attribute(&object, &name, span)?;
                self.push(value);
            }
            Opcode::StoreAttribute => {
                let name = self.name(argument)?;
                let object = self.pop();
                let value = self.pop();
                self.set_attribute(&object, &name, value, span)?;
            }
            Opcode::LoadIndex => {
                let index = self.pop();
                let object = self.pop();
                let value = self.get_index(&object, &index, span)?;
                self.push(value);
            }
            Opcode::StoreIndex => {
                let index = self.pop();
                let object = self.pop();
                let value = self.pop();
                self.set_index(&object, index, value, span)?;
            }

            Opcode::BinOp => {
                let op = decode_binary(argument).unwrap_or(BinaryOp::Add);
                let right = self.pop();
                let left = self.pop();
                let value = self.binary(op, left, right, span)?;
                self.push(value);
            }
            Opcode::UnaryOp => {
                let op = decode_unary(argument).unwrap_or(UnaryOp::Not);
                let operand = self.pop();
                let value = self.unary(op, operand, span)?;
                self.push(value);
            }

            Opcode::Invoke => {
                let args = self.pop_n(argument as usize);
                let callee = self.pop();
                self.invoke(callee, args, span)?;
            }
            Opcode::InvokeSuper => {
                let args = self.pop_n(argument as usize);
                let class = self.pop();
                self.invoke_super(class, args, span)?;
            }
            Opcode::Return => return Ok(self.return_from_frame(base_depth)),

            Opcode::Jump => self.frame_mut().ip = argument as usize,
            Opcode::JumpIfTrue => {
                if self.pop().is_truthy() {
                    self.frame_mut().ip = argument as usize;
                }
            }
            Opcode::JumpIfFalse => {
                if !self.pop().is_truthy() {
                    self.frame_mut().ip = argument as usize;
                }
            }

            Opcode::PushExceptionHandler => {
                self.handlers.push(ExceptionHandler {
                    target: argument as usize,
                    frame_depth: self.frames.len(),
                    stack_len: self.stack.len(),
                });
            }
            Opcode::PopExceptionHandler => {
                self.handlers.pop();
            }
            Opcode::LoadException => {
                let value = self.frame().exception.clone();
                self.push(value);
            }
            Opcode::Raise => {
                let value = self.pop();
                return Err(self.raise(value, span));
            }

            Opcode::BuildList => {
                let items = self.pop_n(argument as usize);
                self.push(Value::list(items));
            }
            Opcode::BuildTuple => {
                let items = self.pop_n(argument as usize);
                self.push(Value::tuple(items));
            }
            Opcode::BuildHash => {
                let items = self.pop_n(argument as usize * 2);
                let mut table = crate::object::new_hash_table();
                let mut items = items.into_iter();
                while let (Some(key), Some(value)) = (items.next(), items.next()) {
                    let key = HashKey::from_value(&key).ok_or_else(|| {
                        RuntimeError::type_error(
                            format!("{} cannot be used as a hash key", key.type_name()),
                            span,
                        )
                    })?;
                    table.insert(key, value);
                }
                self.push(Value::hash(table));
            }
            Opcode::BuildClosure => {
                let method = match self.constant(argument)? {
                    Value::Method(method) => method,
                    other => {
                        return Err(RuntimeError::type_error(
                            format!("cannot build a closure from {}", other.type_name()),
                            span,
                        ))
                    }
                };
                let frame = self.frame();
                let closure = Closure {
                    method,
                    locals: frame.locals.clone(),
                    self_value: frame.self_value.clone(),
                };
                self.push(Value::Closure(Rc::new(closure)));
            }
            Opcode::Inherit => {
                let bases = self.pop_n(argument as usize);
                let class = self.pop();
                self.inherit(&class, bases, span)?;
            }

            Opcode::GetIter => {
                let iterable = self.pop();
                let iterator = self.get_iterator(iterable, span)?;
                self.push(iterator);
            }
            Opcode::IterMoveNext => {
                let iterator = self.pop();
                let more = self.iter_move_next(&iterator, span)?;
                self.push(Value::Bool(more));
            }
            Opcode::IterGetNext => {
                let iterator = self.pop();
                let value = self.iter_current(&iterator, span)?;
                self.push(value);
            }

            Opcode::Import => {
                let name = self.name(argument)?;
                self.import(&name, span)?;
            }
            Opcode::ImportFrom => {
                let name = self.name(argument)?;
                let names = self.pop();
                self.import_from(&name, &names, span)?;
            }
            Opcode::ImportAll => {
                let name = self.name(argument)?;
                self.import_all(&name, span)?;
            }
        }
        Ok(None)
    }

    /// Pop the current frame. Returns the result once `base_depth` is reached,
    /// otherwise pushes it for the caller.
    fn return_from_frame(&mut self, base_depth: usize) -> Option<Value> {
        let frame = self.frames.pop().expect("return without a frame");
        let value = if frame.returns_self {
            frame.self_value
        } else if self.stack.len() > frame.stack_base {
            self.pop()
        } else {
            Value::Null
        };
        self.stack.truncate(frame.stack_base);
        let depth = self.frames.len();
        self.handlers.retain(|handler| handler.frame_depth <= depth);

        if depth <= base_depth {
            Some(value)
        } else {
            self.push(value);
            None
        }
    }

    fn load_global(&self, name: &str, span: Span) -> Result<Value, RuntimeError> {
        if let Some(value) = self.frame().module.get_attribute(name) {
            return Ok(value);
        }
        self.builtins
            .get(name)
            .cloned()
            .ok_or_else(|| RuntimeError::undefined_variable(name, span))
    }

    /// Look up a global visible to scripts: module attributes of the running
    /// module first, then builtins.
    pub fn global(&self, name: &str) -> Option<Value> {
        self.frames
            .last()
            .and_then(|frame| frame.module.get_attribute(name))
            .or_else(|| self.builtins.get(name).cloned())
    }

    // --- Stack operations ---

    #[inline]
    pub fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    #[inline]
    pub fn pop(&mut self) -> Value {
        self.stack.pop().unwrap_or(Value::Null)
    }

    #[inline]
    pub fn peek(&self, distance: usize) -> &Value {
        &self.stack[self.stack.len() - 1 - distance]
    }

    fn pop_n(&mut self, count: usize) -> Vec<Value> {
        let start = self.stack.len().saturating_sub(count);
        self.stack.split_off(start)
    }

    // --- Helpers ---

    pub(crate) fn frame(&self) -> &Frame {
        self.frames.last().expect("no active frame")
    }

    pub(crate) fn frame_mut(&mut self) -> &mut Frame {
        self.frames.last_mut().expect("no active frame")
    }

    fn constant(&self, index: i32) -> Result<Value, RuntimeError> {
        self.frame()
            .module
            .constant(index)
            .cloned()
            .ok_or_else(|| RuntimeError::new(format!("invalid constant index {}", index), Span::default()))
    }

    fn name(&self, index: i32) -> Result<Rc<str>, RuntimeError> {
        self.frame()
            .module
            .name_at(index)
            .ok_or_else(|| RuntimeError::new(format!("constant {} is not a name", index), Span::default()))
    }
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}
