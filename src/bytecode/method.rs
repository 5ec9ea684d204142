//! Compiled methods and the builder the compiler emits into.

use std::cell::OnceCell;
use std::fmt;
use std::ops::Range;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;

use super::instruction::{Instruction, Opcode};
use super::module::Module;
use crate::optimizer::Optimizer;
use crate::span::Span;

/// What role a method plays; decides how the VM binds `self` and arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodKind {
    /// Module initializer (top-level statements).
    Initializer,
    /// Module-level `func`.
    Function,
    /// Instance method, called with a receiver.
    Instance,
    /// `static func` on a class.
    Static,
    /// Class constructor.
    Constructor,
    /// `lambda`, sees the locals of the frame that created it.
    Lambda,
    /// Interface placeholder without a body.
    Abstract,
}

/// A compiled method. Immutable once built.
pub struct Method {
    pub name: String,
    pub kind: MethodKind,
    /// Parameter name to local slot, in declaration order.
    pub parameters: IndexMap<String, usize>,
    pub local_count: usize,
    /// The last parameter collects surplus arguments into a tuple.
    pub variadic: bool,
    pub instructions: Vec<Instruction>,
    /// Slots each call gets fresh storage for. A lambda owns only the slots
    /// its own scope allocates and reaches every other slot through the
    /// locals it captured.
    pub own_slots: Range<usize>,
    module: OnceCell<Weak<Module>>,
}

impl Method {
    pub fn new(
        name: impl Into<String>,
        kind: MethodKind,
        parameters: IndexMap<String, usize>,
        variadic: bool,
        local_count: usize,
        instructions: Vec<Instruction>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            parameters,
            local_count,
            variadic,
            instructions,
            own_slots: 0..local_count,
            module: OnceCell::new(),
        }
    }

    /// Restrict per-call storage to `slots`.
    pub fn with_own_slots(mut self, slots: Range<usize>) -> Self {
        self.own_slots = slots;
        self
    }

    /// A bodiless interface method.
    pub fn placeholder(
        name: impl Into<String>,
        parameters: IndexMap<String, usize>,
        variadic: bool,
    ) -> Self {
        let local_count = parameters.len();
        Self::new(
            name,
            MethodKind::Abstract,
            parameters,
            variadic,
            local_count,
            Vec::new(),
        )
    }

    pub fn arity(&self) -> usize {
        self.parameters.len()
    }

    /// The module whose constant pool this method's instructions address.
    pub fn module(&self) -> Option<Rc<Module>> {
        self.module.get().and_then(Weak::upgrade)
    }

    /// Attach the owning module; later calls are ignored.
    pub(crate) fn bind_module(&self, module: &Rc<Module>) {
        let _ = self.module.set(Rc::downgrade(module));
    }
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Method")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("parameters", &self.parameters)
            .field("local_count", &self.local_count)
            .field("variadic", &self.variadic)
            .field("own_slots", &self.own_slots)
            .field("instructions", &self.instructions.len())
            .finish()
    }
}

/// Forward-reference placeholder for a jump target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Label(usize);

/// Mutable instruction buffer for one method under compilation.
///
/// Jumps are emitted against [`Label`]s and resolved exactly once by
/// [`MethodBuilder::finalize_labels`]; after that the optimizer only ever sees
/// concrete instruction indices.
#[derive(Debug)]
pub struct MethodBuilder {
    name: String,
    kind: MethodKind,
    parameters: IndexMap<String, usize>,
    variadic: bool,
    instructions: Vec<Instruction>,
    labels: Vec<Option<usize>>,
    finalized: bool,
}

impl MethodBuilder {
    pub fn new(name: impl Into<String>, kind: MethodKind) -> Self {
        Self {
            name: name.into(),
            kind,
            parameters: IndexMap::new(),
            variadic: false,
            instructions: Vec::new(),
            labels: Vec::new(),
            finalized: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> MethodKind {
        self.kind
    }

    pub fn add_parameter(&mut self, name: impl Into<String>, slot: usize) {
        self.parameters.insert(name.into(), slot);
    }

    pub fn set_variadic(&mut self, variadic: bool) {
        self.variadic = variadic;
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn emit(&mut self, opcode: Opcode, argument: i32, span: Span) -> usize {
        debug_assert!(!opcode.is_jump(), "jumps must be emitted against a label");
        self.push(Instruction::new(opcode, argument, span))
    }

    pub fn emit_simple(&mut self, opcode: Opcode, span: Span) -> usize {
        self.emit(opcode, 0, span)
    }

    /// Emit a jump-style instruction whose target is `label`.
    pub fn emit_jump(&mut self, opcode: Opcode, label: Label, span: Span) -> usize {
        assert!(opcode.is_jump(), "{} is not a jump", opcode.name());
        self.push(Instruction::new(opcode, label.0 as i32, span))
    }

    fn push(&mut self, instruction: Instruction) -> usize {
        assert!(!self.finalized, "method '{}' is already finalized", self.name);
        let offset = self.instructions.len();
        self.instructions.push(instruction);
        offset
    }

    pub fn create_label(&mut self) -> Label {
        self.labels.push(None);
        Label(self.labels.len() - 1)
    }

    /// Bind `label` to the next instruction to be emitted.
    pub fn mark_label(&mut self, label: Label) {
        let slot = &mut self.labels[label.0];
        assert!(slot.is_none(), "label {} marked twice in '{}'", label.0, self.name);
        *slot = Some(self.instructions.len());
    }

    /// Rewrite every label reference into an instruction index.
    ///
    /// # Panics
    ///
    /// On a second call, or when a referenced label was never marked.
    pub fn finalize_labels(&mut self) {
        assert!(
            !self.finalized,
            "labels of '{}' finalized more than once",
            self.name
        );
        for instruction in &mut self.instructions {
            if instruction.opcode.is_jump() {
                let label = instruction.argument as usize;
                let target = self.labels[label].unwrap_or_else(|| {
                    panic!("label {} in '{}' was never marked", label, self.name)
                });
                instruction.argument = target as i32;
            }
        }
        self.finalized = true;
    }

    /// Finalize labels, optionally optimize, and freeze into a [`Method`].
    pub fn build(mut self, local_count: usize, optimize: bool) -> Method {
        self.finalize_labels();
        let instructions = if optimize {
            Optimizer::new().run(self.instructions)
        } else {
            self.instructions
        };
        Method::new(
            self.name,
            self.kind,
            self.parameters,
            self.variadic,
            local_count,
            instructions,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_resolve_forward_and_backward() {
        let span = Span::default();
        let mut builder = MethodBuilder::new("loop", MethodKind::Function);
        let top = builder.create_label();
        let exit = builder.create_label();
        builder.mark_label(top);
        builder.emit_simple(Opcode::LoadTrue, span);
        builder.emit_jump(Opcode::JumpIfFalse, exit, span);
        builder.emit_jump(Opcode::Jump, top, span);
        builder.mark_label(exit);
        builder.emit_simple(Opcode::LoadNull, span);

        let method = builder.build(0, false);
        assert_eq!(method.instructions[1].argument, 3);
        assert_eq!(method.instructions[2].argument, 0);
    }

    #[test]
    #[should_panic(expected = "finalized more than once")]
    fn test_finalize_twice_panics() {
        let mut builder = MethodBuilder::new("f", MethodKind::Function);
        builder.finalize_labels();
        builder.finalize_labels();
    }

    #[test]
    #[should_panic(expected = "never marked")]
    fn test_unmarked_label_panics() {
        let mut builder = MethodBuilder::new("f", MethodKind::Function);
        let label = builder.create_label();
        builder.emit_jump(Opcode::Jump, label, Span::default());
        builder.finalize_labels();
    }

    #[test]
    fn test_parameters_keep_declaration_order() {
        let mut builder = MethodBuilder::new("add", MethodKind::Function);
        builder.add_parameter("b", 1);
        builder.add_parameter("a", 0);
        let method = builder.build(2, false);
        let names: Vec<_> = method.parameters.keys().cloned().collect();
        assert_eq!(names, vec!["b", "a"]);
        assert_eq!(method.arity(), 2);
        assert!(method.module().is_none());
    }
}
