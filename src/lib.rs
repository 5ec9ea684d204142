//! Iodine: a dynamically-typed, class-based scripting language.
//!
//! Source goes through a fixed pipeline:
//!
//! lex → parse → analyse → compile (+ optimize) → run
//!
//! Every front-end phase reports into a shared [`error::ErrorLog`] and the
//! pipeline stops after the first phase that logged anything.

#![allow(clippy::module_inception)]
#![allow(clippy::result_large_err)]
#![allow(clippy::new_without_default)]
#![allow(clippy::too_many_arguments)]

pub mod ast;
pub mod bytecode;
pub mod compiler;
pub mod config;
pub mod error;
pub mod lexer;
pub mod object;
pub mod optimizer;
pub mod parser;
pub mod span;
pub mod vm;

use std::path::Path;
use std::rc::Rc;

use tracing::debug;

use ast::Program;
use bytecode::Module;
use compiler::{Compiler, SemanticAnalyser};
use config::Config;
use error::{ErrorLog, IodineError};
use object::Value;
use vm::Vm;

/// Lex and parse `source`.
pub fn parse(source: &str) -> Result<Program, IodineError> {
    let mut log = ErrorLog::new();
    let tokens = lexer::Scanner::new(source).scan_tokens(&mut log);
    log.check()?;
    let program = parser::Parser::new(tokens).parse(&mut log);
    log.check()?;
    Ok(program)
}

/// Compile `source` as a module named `main` with default settings.
pub fn compile(source: &str) -> Result<Rc<Module>, IodineError> {
    compile_with(source, "main", &Config::default())
}

/// Compile `source` into a module called `name`.
pub fn compile_with(source: &str, name: &str, config: &Config) -> Result<Rc<Module>, IodineError> {
    let program = parse(source)?;

    let mut log = ErrorLog::new();
    let symbols = SemanticAnalyser::new(&mut log).analyse(&program);
    log.check()?;

    let module = Compiler::new(name, symbols, config.optimize, &mut log).compile(&program);
    log.check()?;
    debug!(module = name, "compiled");
    Ok(module)
}

/// Compile and run `source` with default settings.
pub fn run(source: &str) -> Result<Value, IodineError> {
    run_with(source, &Config::default())
}

/// Compile and run `source` on a fresh VM.
pub fn run_with(source: &str, config: &Config) -> Result<Value, IodineError> {
    let mut vm = Vm::with_config(config);
    run_in(&mut vm, source, "main", config)
}

/// Compile `source` and run it on `vm`, registering it as module `name`.
pub fn run_in(
    vm: &mut Vm,
    source: &str,
    name: &str,
    config: &Config,
) -> Result<Value, IodineError> {
    let module = compile_with(source, name, config)?;
    if config.disassemble {
        print!("{}", bytecode::disassemble_module(&module));
    }
    vm.register_module(module.clone());
    Ok(vm.execute(&module)?)
}

/// Run a script file. Its directory is searched first for imports.
pub fn run_file(path: &Path, config: &Config) -> Result<Value, IodineError> {
    let source = std::fs::read_to_string(path)?;
    let mut config = config.clone();
    if let Some(dir) = path.parent() {
        let dir = if dir.as_os_str().is_empty() {
            Path::new(".")
        } else {
            dir
        };
        config = config.with_search_path(dir);
    }
    let mut vm = Vm::with_config(&config);
    run_in(&mut vm, &source, module_name(path), &config)
}

/// Compile a script file without running it.
pub fn compile_file(path: &Path, config: &Config) -> Result<Rc<Module>, IodineError> {
    let source = std::fs::read_to_string(path)?;
    compile_with(&source, module_name(path), config)
}

/// Module name for a script: its file stem, or `main`.
fn module_name(path: &Path) -> &str {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("main")
}

/// Compile `source` and render its bytecode.
pub fn disassemble(source: &str, config: &Config) -> Result<String, IodineError> {
    let module = compile_with(source, "main", config)?;
    Ok(bytecode::disassemble_module(&module))
}
