//! Bytecode disassembler for debug output.

use std::fmt::Write;
use std::rc::Rc;

use super::instruction::{decode_binary, decode_unary, Instruction, Opcode};
use super::method::Method;
use super::module::Module;
use crate::object::Value;

/// Disassemble a whole module: the initializer, then every method reachable
/// from its attributes and constant pool (functions, lambdas, class members).
pub fn disassemble_module(module: &Module) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "== module {} ({} constants) ==",
        module.name,
        module.constants.len()
    );
    disassemble_method_into(&module.initializer, module, &mut out);

    let mut methods: Vec<Rc<Method>> = Vec::new();
    let attributes: Vec<Value> = module.attributes.borrow().values().cloned().collect();
    for value in attributes.iter().chain(module.constants.iter()) {
        collect_methods(value, &mut methods);
    }
    for method in methods {
        out.push('\n');
        disassemble_method_into(&method, module, &mut out);
    }
    out
}

fn collect_methods(value: &Value, methods: &mut Vec<Rc<Method>>) {
    let mut push = |method: Rc<Method>| {
        if !methods.iter().any(|m| Rc::ptr_eq(m, &method)) {
            methods.push(method);
        }
    };
    match value {
        Value::Method(method) => push(method.clone()),
        Value::Class(class) => {
            for method in class.methods() {
                push(method);
            }
            let nested: Vec<Value> = class.attributes.borrow().values().cloned().collect();
            for value in &nested {
                if matches!(value, Value::Class(_)) {
                    collect_methods(value, methods);
                }
            }
        }
        _ => {}
    }
}

/// Disassemble one method against the module that owns its constants.
pub fn disassemble_method(method: &Method, module: &Module) -> String {
    let mut out = String::new();
    disassemble_method_into(method, module, &mut out);
    out
}

fn disassemble_method_into(method: &Method, module: &Module, out: &mut String) {
    let params: Vec<&str> = method.parameters.keys().map(String::as_str).collect();
    let _ = writeln!(
        out,
        "== {} ({:?}, params=[{}]{}, locals={}) ==",
        method.name,
        method.kind,
        params.join(", "),
        if method.variadic { ", variadic" } else { "" },
        method.local_count
    );

    let mut last_line = None;
    for (offset, instruction) in method.instructions.iter().enumerate() {
        let line = instruction.span.line;
        let line_str = if last_line == Some(line) {
            "   |".to_string()
        } else {
            format!("{:4}", line)
        };
        last_line = Some(line);
        let _ = writeln!(
            out,
            "{:04} {} {}",
            offset,
            line_str,
            format_instruction(instruction, module)
        );
    }
}

/// One instruction in `NAME argument (detail)` form.
pub fn format_instruction(instruction: &Instruction, module: &Module) -> String {
    let name = instruction.opcode.name();
    let arg = instruction.argument;
    match instruction.opcode {
        op if op.uses_constant() => {
            format!(
                "{:<16} {:>5} ({})",
                name,
                arg,
                format_constant(module.constant(arg))
            )
        }
        Opcode::BinOp => match decode_binary(arg) {
            Some(op) => format!("{:<16} {:>5} ({})", name, arg, op),
            None => format!("{:<16} {:>5} (?)", name, arg),
        },
        Opcode::UnaryOp => match decode_unary(arg) {
            Some(op) => format!("{:<16} {:>5} ({})", name, arg, op),
            None => format!("{:<16} {:>5} (?)", name, arg),
        },
        Opcode::LoadLocal
        | Opcode::StoreLocal
        | Opcode::Invoke
        | Opcode::InvokeSuper
        | Opcode::BuildList
        | Opcode::BuildTuple
        | Opcode::BuildHash
        | Opcode::Inherit => format!("{:<16} {:>5}", name, arg),
        op if op.is_jump() => format!("{:<16} {:>5}", name, arg),
        _ => name.to_string(),
    }
}

fn format_constant(val: Option<&Value>) -> String {
    match val {
        Some(Value::Str(s)) => format!("\"{}\"", s),
        Some(Value::Method(m)) => format!("<method {}>", m.name),
        Some(Value::Class(c)) => format!("<class {}>", c.name),
        Some(Value::Enum(e)) => format!("<enum {}>", e.name),
        Some(Value::Interface(i)) => format!("<interface {}>", i.name),
        Some(other) => other.to_string(),
        None => "???".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn test_disassemble_function() {
        let module = crate::compile_with(
            "func add(a, b) { return a + b }",
            "main",
            &Config::default(),
        )
        .unwrap();
        let text = disassemble_module(&module);
        assert!(text.contains("== add (Function, params=[a, b], locals=2) =="));
        assert!(text.contains("LOAD_LOCAL"));
        assert!(text.contains("BIN_OP"));
        assert!(text.contains("(+)"));
        assert!(text.contains("RETURN"));
    }

    #[test]
    fn test_constant_operands_are_shown() {
        let module =
            crate::compile_with("greeting = \"hi\"", "main", &Config::default()).unwrap();
        let text = disassemble_module(&module);
        assert!(text.contains("\"hi\""));
        assert!(text.contains("STORE_GLOBAL"));
        assert!(text.contains("\"greeting\""));
    }
}
