//! Module registry and file loader behind `use`.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::rc::Rc;

use tracing::debug;

use crate::bytecode::Module;
use crate::config::Config;
use crate::error::RuntimeError;
use crate::object::Value;
use crate::span::Span;

use super::vm::Vm;

/// Extension of Iodine source files.
pub const SOURCE_EXTENSION: &str = "id";

/// Loaded modules by dotted name, plus where to find new ones.
pub struct ModuleLoader {
    config: Config,
    modules: HashMap<String, Rc<Module>, ahash::RandomState>,
}

impl ModuleLoader {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            modules: HashMap::default(),
        }
    }

    pub fn get(&self, name: &str) -> Option<Rc<Module>> {
        self.modules.get(name).cloned()
    }

    pub fn insert(&mut self, module: Rc<Module>) {
        self.modules.insert(module.name.clone(), module);
    }

    /// `a.b` resolves to `a/b.id` under the first search path that has it.
    pub fn find(&self, name: &str) -> Option<PathBuf> {
        let relative = PathBuf::from(name.replace('.', "/")).with_extension(SOURCE_EXTENSION);
        self.config
            .search_paths
            .iter()
            .map(|dir| dir.join(&relative))
            .find(|path| path.is_file())
    }

    fn compile(&self, name: &str, span: Span) -> Result<Rc<Module>, RuntimeError> {
        let path = self
            .find(name)
            .ok_or_else(|| RuntimeError::import(name, "not found on the search path", span))?;
        let source = fs::read_to_string(&path)
            .map_err(|err| RuntimeError::import(name, err.to_string(), span))?;
        debug!(module = name, path = %path.display(), "compiling import");
        crate::compile_with(&source, name, &self.config)
            .map_err(|err| RuntimeError::import(name, err.to_string(), span))
    }
}

impl Vm {
    /// Make `module` importable by name without touching the filesystem.
    pub fn register_module(&mut self, module: Rc<Module>) {
        self.loader.insert(module);
    }

    /// Fetch a module, compiling and initializing it on first use.
    ///
    /// The module is registered before its initializer runs, so a cyclic
    /// import sees the partly initialized module instead of recursing.
    pub fn load_module(&mut self, name: &str, span: Span) -> Result<Rc<Module>, RuntimeError> {
        if let Some(module) = self.loader.get(name) {
            return Ok(module);
        }
        let module = self.loader.compile(name, span)?;
        self.loader.insert(module.clone());
        self.run_module(&module)?;
        debug!(module = name, "module initialized");
        Ok(module)
    }

    /// `use a.b` binds the module as `b`.
    pub(crate) fn import(&mut self, name: &str, span: Span) -> Result<(), RuntimeError> {
        let module = self.load_module(name, span)?;
        let binding = name.rsplit('.').next().unwrap_or(name);
        self.frame()
            .module
            .set_attribute(binding, Value::Module(module));
        Ok(())
    }

    /// `use x, y from a.b`.
    pub(crate) fn import_from(
        &mut self,
        name: &str,
        names: &Value,
        span: Span,
    ) -> Result<(), RuntimeError> {
        let module = self.load_module(name, span)?;
        let Value::Tuple(names) = names else {
            return Err(RuntimeError::import(name, "malformed import list", span));
        };
        for item in names.iter() {
            let item = item.as_str().unwrap_or_default();
            let value = module.get_attribute(item).ok_or_else(|| {
                RuntimeError::import(name, format!("module has no attribute '{}'", item), span)
            })?;
            self.frame().module.set_attribute(item, value);
        }
        Ok(())
    }

    /// `use * from a.b`.
    pub(crate) fn import_all(&mut self, name: &str, span: Span) -> Result<(), RuntimeError> {
        let module = self.load_module(name, span)?;
        let attributes: Vec<(String, Value)> = module
            .attributes
            .borrow()
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        let target = self.frame().module.clone();
        for (key, value) in attributes {
            target.set_attribute(key, value);
        }
        Ok(())
    }
}
