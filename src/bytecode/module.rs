//! Compiled modules and the build context that accumulates them.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use super::method::Method;
use crate::object::Value;

/// A compilation unit: constant pool, attribute namespace, imports and the
/// initializer holding the top-level statements.
pub struct Module {
    pub name: String,
    pub constants: Vec<Value>,
    /// Classes, functions, enums and interfaces declared at compile time;
    /// globals assigned by the initializer land here too.
    pub attributes: RefCell<IndexMap<String, Value>>,
    pub imports: Vec<String>,
    pub initializer: Rc<Method>,
}

impl Module {
    pub fn constant(&self, index: i32) -> Option<&Value> {
        usize::try_from(index).ok().and_then(|i| self.constants.get(i))
    }

    /// The constant at `index` as a name, for attribute and global opcodes.
    pub fn name_at(&self, index: i32) -> Option<Rc<str>> {
        match self.constant(index) {
            Some(Value::Str(name)) => Some(name.clone()),
            _ => None,
        }
    }

    pub fn get_attribute(&self, name: &str) -> Option<Value> {
        self.attributes.borrow().get(name).cloned()
    }

    pub fn set_attribute(&self, name: impl Into<String>, value: Value) {
        self.attributes.borrow_mut().insert(name.into(), value);
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("name", &self.name)
            .field("constants", &self.constants.len())
            .field("attributes", &self.attributes.borrow().keys().collect::<Vec<_>>())
            .field("imports", &self.imports)
            .finish()
    }
}

/// Dedup key for literal constants. Methods and classes are never shared.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ConstantKey {
    Null,
    Bool(bool),
    Int(i64),
    Float(u64),
    Str(Rc<str>),
    Names(Vec<Rc<str>>),
}

impl ConstantKey {
    fn of(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(ConstantKey::Null),
            Value::Bool(b) => Some(ConstantKey::Bool(*b)),
            Value::Int(n) => Some(ConstantKey::Int(*n)),
            Value::Float(n) => Some(ConstantKey::Float(n.to_bits())),
            Value::Str(s) => Some(ConstantKey::Str(s.clone())),
            Value::Tuple(items) => items
                .iter()
                .map(|item| match item {
                    Value::Str(s) => Some(s.clone()),
                    _ => None,
                })
                .collect::<Option<Vec<_>>>()
                .map(ConstantKey::Names),
            _ => None,
        }
    }
}

/// Everything one compilation unit accumulates before it is frozen.
#[derive(Default)]
pub struct ModuleBuilder {
    name: String,
    constants: Vec<Value>,
    constant_index: IndexMap<ConstantKey, usize>,
    attributes: IndexMap<String, Value>,
    imports: Vec<String>,
    methods: Vec<Rc<Method>>,
}

impl ModuleBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Intern a constant and return its pool index. Literals are deduplicated.
    pub fn add_constant(&mut self, value: Value) -> usize {
        let key = ConstantKey::of(&value);
        if let Some(index) = key.as_ref().and_then(|k| self.constant_index.get(k)) {
            return *index;
        }
        let index = self.constants.len();
        self.constants.push(value);
        if let Some(key) = key {
            self.constant_index.insert(key, index);
        }
        index
    }

    /// Reserve a pool slot for a value that does not exist yet, such as a
    /// class referenced from its own constructor.
    pub fn reserve_constant(&mut self) -> usize {
        self.constants.push(Value::Null);
        self.constants.len() - 1
    }

    /// Fill a slot handed out by [`ModuleBuilder::reserve_constant`].
    pub fn set_constant(&mut self, index: usize, value: Value) {
        self.constants[index] = value;
    }

    /// Intern a name (identifier or attribute) as a string constant.
    pub fn add_name(&mut self, name: &str) -> usize {
        self.add_constant(Value::from(name))
    }

    /// Intern a tuple of names, as used by `use x, y from m`.
    pub fn add_names(&mut self, names: &[String]) -> usize {
        let items = names.iter().map(|n| Value::from(n.as_str())).collect();
        self.add_constant(Value::Tuple(Rc::new(items)))
    }

    /// Track a compiled method so it can be bound to the finished module.
    pub fn register_method(&mut self, method: Method) -> Rc<Method> {
        let method = Rc::new(method);
        self.methods.push(method.clone());
        method
    }

    /// Bind a compile-time attribute. Returns false if the name is taken.
    pub fn define(&mut self, name: &str, value: Value) -> bool {
        if self.attributes.contains_key(name) {
            return false;
        }
        self.attributes.insert(name.to_string(), value);
        true
    }

    pub fn add_import(&mut self, module: &str) {
        if !self.imports.iter().any(|m| m == module) {
            self.imports.push(module.to_string());
        }
    }

    pub fn constants(&self) -> &[Value] {
        &self.constants
    }

    /// Freeze into an immutable [`Module`] and bind every method to it.
    pub fn finish(self, initializer: Method) -> Rc<Module> {
        let initializer = Rc::new(initializer);
        let module = Rc::new(Module {
            name: self.name,
            constants: self.constants,
            attributes: RefCell::new(self.attributes),
            imports: self.imports,
            initializer: initializer.clone(),
        });
        initializer.bind_module(&module);
        for method in &self.methods {
            method.bind_module(&module);
        }
        module
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::method::MethodKind;

    #[test]
    fn test_literal_constants_are_deduplicated() {
        let mut builder = ModuleBuilder::new("main");
        let a = builder.add_constant(Value::Int(42));
        let b = builder.add_name("x");
        let c = builder.add_constant(Value::Int(42));
        let d = builder.add_name("x");
        let e = builder.add_constant(Value::Float(42.0));
        assert_eq!(a, c);
        assert_eq!(b, d);
        assert_ne!(a, e);
        assert_eq!(builder.constants().len(), 3);
    }

    #[test]
    fn test_reserved_constants_are_not_shared() {
        let mut builder = ModuleBuilder::new("main");
        let null = builder.add_constant(Value::Null);
        let reserved = builder.reserve_constant();
        assert_ne!(null, reserved);
        builder.set_constant(reserved, Value::Int(7));
        assert_eq!(builder.add_constant(Value::Null), null);
        assert_eq!(builder.constants()[reserved], Value::Int(7));
    }

    #[test]
    fn test_name_tuples_are_deduplicated() {
        let mut builder = ModuleBuilder::new("main");
        let names = vec!["a".to_string(), "b".to_string()];
        assert_eq!(builder.add_names(&names), builder.add_names(&names));
    }

    #[test]
    fn test_methods_are_not_deduplicated() {
        let mut builder = ModuleBuilder::new("main");
        let f = builder.register_method(Method::new(
            "f",
            MethodKind::Function,
            IndexMap::new(),
            false,
            0,
            Vec::new(),
        ));
        let first = builder.add_constant(Value::Method(f.clone()));
        let second = builder.add_constant(Value::Method(f));
        assert_ne!(first, second);
    }

    #[test]
    fn test_finish_binds_methods() {
        let mut builder = ModuleBuilder::new("main");
        let f = builder.register_method(Method::new(
            "f",
            MethodKind::Function,
            IndexMap::new(),
            false,
            0,
            Vec::new(),
        ));
        assert!(builder.define("f", Value::Method(f.clone())));
        assert!(!builder.define("f", Value::Null));

        let init = Method::new(
            "main",
            MethodKind::Initializer,
            IndexMap::new(),
            false,
            0,
            Vec::new(),
        );
        let module = builder.finish(init);
        assert!(Rc::ptr_eq(&f.module().unwrap(), &module));
        assert!(Rc::ptr_eq(&module.initializer.module().unwrap(), &module));
        assert!(module.get_attribute("f").is_some());
    }
}
