//! Class, enum and interface compilation.
//!
//! Types are built at compile time and live in the constant pool. Only base
//! lists and static field initializers produce code, which runs where the
//! declaration appears.

use std::rc::Rc;

use indexmap::IndexMap;

use super::compiler::Compiler;
use crate::ast::{ClassDecl, ClassMember, EnumDecl, InterfaceDecl};
use crate::bytecode::{Method, MethodKind, Opcode};
use crate::error::CompileError;
use crate::object::{ClassObject, EnumObject, InterfaceObject, Value};
use crate::span::Span;

impl Compiler<'_> {
    /// Compile a class and return it with its constant pool index.
    ///
    /// Member methods are compiled first, then `INHERIT` for the bases, then
    /// the static field initializers. Member errors are logged.
    pub(crate) fn compile_class(&mut self, decl: &ClassDecl) -> (Rc<ClassObject>, usize) {
        let index = self.module.reserve_constant();
        self.classes.push(index);

        let mut constructor = None;
        let mut methods: IndexMap<String, Rc<Method>> = IndexMap::new();
        let mut attributes: IndexMap<String, Value> = IndexMap::new();

        for member in &decl.members {
            match member {
                ClassMember::Constructor(f) => {
                    let method = self.compile_function(f, MethodKind::Constructor);
                    if constructor.replace(method).is_some() {
                        self.log.push(CompileError::new(
                            format!("Class '{}' declares more than one constructor", decl.name),
                            f.span,
                        ));
                    }
                }
                ClassMember::Method(f) => {
                    let method = self.compile_function(f, MethodKind::Instance);
                    if methods.insert(f.name.clone(), method).is_some() {
                        self.duplicate_member(&decl.name, &f.name, f.span);
                    }
                }
                ClassMember::StaticMethod(f) => {
                    let method = self.compile_function(f, MethodKind::Static);
                    self.add_class_attribute(
                        &mut attributes,
                        decl,
                        &f.name,
                        Value::Method(method),
                        f.span,
                    );
                }
                ClassMember::Class(nested) => {
                    let (class, _) = self.compile_class(nested);
                    self.add_class_attribute(
                        &mut attributes,
                        decl,
                        &nested.name,
                        Value::Class(class),
                        nested.span,
                    );
                }
                ClassMember::Enum(e) => {
                    let value = Value::Enum(Rc::new(self.build_enum(e)));
                    self.add_class_attribute(&mut attributes, decl, &e.name, value, e.span);
                }
                ClassMember::Interface(i) => {
                    let value = Value::Interface(Rc::new(self.build_interface(i)));
                    self.add_class_attribute(&mut attributes, decl, &i.name, value, i.span);
                }
                ClassMember::StaticField { .. } => {}
            }
        }
        self.classes.pop();

        let class = Rc::new(ClassObject::new(
            decl.name.clone(),
            constructor,
            methods,
            attributes,
        ));
        self.module
            .set_constant(index, Value::Class(class.clone()));

        if !decl.bases.is_empty() {
            self.emit(Opcode::LoadConst, index, decl.span);
            for base in &decl.bases {
                if let Err(err) = self.compile_expr(base) {
                    self.log.push(err);
                }
            }
            self.emit(Opcode::Inherit, decl.bases.len(), decl.span);
        }

        for member in &decl.members {
            if let ClassMember::StaticField { name, value, span } = member {
                if let Err(err) = self.compile_expr(value) {
                    self.log.push(err);
                    continue;
                }
                self.emit(Opcode::LoadConst, index, *span);
                let name = self.name_constant(name);
                self.emit(Opcode::StoreAttribute, name, *span);
            }
        }

        (class, index)
    }

    fn duplicate_member(&mut self, class: &str, name: &str, span: Span) {
        self.log.push(CompileError::new(
            format!("'{}' is already defined in class '{}'", name, class),
            span,
        ));
    }

    fn add_class_attribute(
        &mut self,
        attributes: &mut IndexMap<String, Value>,
        decl: &ClassDecl,
        name: &str,
        value: Value,
        span: Span,
    ) {
        if attributes.insert(name.to_string(), value).is_some() {
            self.duplicate_member(&decl.name, name, span);
        }
    }

    /// Members count up from zero; an explicit value restarts the count.
    pub(crate) fn build_enum(&mut self, decl: &EnumDecl) -> EnumObject {
        let mut members = IndexMap::new();
        let mut next = 0i64;
        for member in &decl.members {
            let value = member.value.unwrap_or(next);
            next = value.wrapping_add(1);
            if members.insert(member.name.clone(), value).is_some() {
                self.log.push(CompileError::new(
                    format!("Duplicate member '{}' in enum '{}'", member.name, decl.name),
                    member.span,
                ));
            }
        }
        EnumObject {
            name: decl.name.clone(),
            members,
        }
    }

    pub(crate) fn build_interface(&mut self, decl: &InterfaceDecl) -> InterfaceObject {
        let methods = decl
            .methods
            .iter()
            .map(|method| {
                let parameters = method
                    .params
                    .iter()
                    .enumerate()
                    .map(|(slot, param)| (param.name.clone(), slot))
                    .collect();
                Rc::new(Method::placeholder(
                    method.name.clone(),
                    parameters,
                    method.variadic,
                ))
            })
            .collect();
        InterfaceObject {
            name: decl.name.clone(),
            methods,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::bytecode::Opcode;
    use crate::config::Config;
    use crate::object::Value;
    use pretty_assertions::assert_eq;

    fn compile(source: &str) -> std::rc::Rc<crate::bytecode::Module> {
        crate::compile_with(source, "test", &Config::default()).expect("source should compile")
    }

    #[test]
    fn test_class_members_are_sorted_by_role() {
        let module = compile(
            "class Point {\n\
               func Point(x) { self.x = x }\n\
               func getX() { return self.x }\n\
               static func origin() { return Point(0) }\n\
               static count = 0\n\
             }",
        );
        let class = match module.get_attribute("Point") {
            Some(Value::Class(c)) => c,
            other => panic!("expected class, found {:?}", other),
        };
        assert!(class.constructor.is_some());
        assert!(class.instance_methods.contains_key("getX"));
        assert!(matches!(
            class.attributes.borrow().get("origin"),
            Some(Value::Method(_))
        ));
        // Static fields are assigned when the initializer runs.
        assert!(class.attributes.borrow().get("count").is_none());
        let opcodes: Vec<_> = module.initializer.instructions.iter().map(|i| i.opcode).collect();
        assert_eq!(
            opcodes,
            vec![
                Opcode::LoadConst,
                Opcode::LoadConst,
                Opcode::StoreAttribute,
                Opcode::LoadNull
            ]
        );
    }

    #[test]
    fn test_bases_are_attached_by_inherit() {
        let module = compile("class A { }\nclass B : A { }");
        let opcodes: Vec<_> = module.initializer.instructions.iter().map(|i| i.opcode).collect();
        assert_eq!(
            opcodes,
            vec![
                Opcode::LoadConst,
                Opcode::LoadGlobal,
                Opcode::Inherit,
                Opcode::LoadNull
            ]
        );
    }

    #[test]
    fn test_enum_counter_restarts_after_explicit_value() {
        let module = compile("enum Color { Red, Green = 10, Blue }");
        let colors = match module.get_attribute("Color") {
            Some(Value::Enum(e)) => e,
            other => panic!("expected enum, found {:?}", other),
        };
        let members: Vec<_> = colors.members.iter().map(|(k, v)| (k.as_str(), *v)).collect();
        assert_eq!(members, vec![("Red", 0), ("Green", 10), ("Blue", 11)]);
    }

    #[test]
    fn test_interface_methods_are_placeholders() {
        let module = compile("interface Shape { func area() func scale(f) }");
        let shape = match module.get_attribute("Shape") {
            Some(Value::Interface(i)) => i,
            other => panic!("expected interface, found {:?}", other),
        };
        let names: Vec<_> = shape.methods.iter().map(|m| (m.name.as_str(), m.arity())).collect();
        assert_eq!(names, vec![("area", 0), ("scale", 1)]);
        assert!(shape.methods.iter().all(|m| m.instructions.is_empty()));
    }

    #[test]
    fn test_duplicate_methods_are_reported() {
        let err = crate::compile_with(
            "class A { func m() { } func m() { } }",
            "test",
            &Config::default(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("'m' is already defined in class 'A'"));
    }

    #[test]
    fn test_super_loads_the_declaring_class() {
        let module = compile("class A { }\nclass B : A { func B(x) { super(x) } }");
        let class = match module.get_attribute("B") {
            Some(Value::Class(c)) => c,
            other => panic!("expected class, found {:?}", other),
        };
        let ctor = class.constructor.clone().expect("constructor");
        let code = &ctor.instructions;
        assert_eq!(code[0].opcode, Opcode::LoadConst);
        assert!(matches!(
            module.constant(code[0].argument),
            Some(Value::Class(c)) if c.name == "B"
        ));
        assert_eq!(code[2].opcode, Opcode::InvokeSuper);
    }
}
