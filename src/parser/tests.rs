//! Parser tests.

use crate::ast::*;
use crate::error::ErrorLog;
use crate::lexer::Scanner;
use crate::parser::Parser;

fn parse_with_log(source: &str) -> (Program, ErrorLog) {
    let mut log = ErrorLog::new();
    let tokens = Scanner::new(source).scan_tokens(&mut log);
    let program = Parser::new(tokens).parse(&mut log);
    (program, log)
}

fn parse(source: &str) -> Program {
    let (program, log) = parse_with_log(source);
    assert!(log.is_empty(), "unexpected parse errors:\n{}", log);
    program
}

fn parse_expr(source: &str) -> Expr {
    match parse(source).statements.into_iter().next().unwrap().kind {
        StmtKind::Expression(expr) => expr,
        other => panic!("Expected expression statement, got {:?}", other),
    }
}

#[test]
fn test_binary_expr() {
    let expr = parse_expr("1 + 2;");
    match expr.kind {
        ExprKind::Binary { operator, .. } => assert_eq!(operator, BinaryOp::Add),
        _ => panic!("Expected binary expression"),
    }
}

#[test]
fn test_precedence() {
    // 1 + 2 * 3 should parse as 1 + (2 * 3)
    let expr = parse_expr("1 + 2 * 3");
    match expr.kind {
        ExprKind::Binary {
            operator: BinaryOp::Add,
            right,
            ..
        } => match right.kind {
            ExprKind::Binary {
                operator: BinaryOp::Multiply,
                ..
            } => {}
            _ => panic!("Expected multiply on right"),
        },
        _ => panic!("Expected add at top"),
    }
}

#[test]
fn test_bitwise_binds_looser_than_comparison() {
    // a | b == c parses as a | (b == c)
    let expr = parse_expr("a | b == c");
    match expr.kind {
        ExprKind::Binary {
            operator: BinaryOp::BitOr,
            right,
            ..
        } => assert!(matches!(
            right.kind,
            ExprKind::Binary {
                operator: BinaryOp::Equal,
                ..
            }
        )),
        _ => panic!("Expected bitwise or at top"),
    }
}

#[test]
fn test_is_operator() {
    let expr = parse_expr("x is Foo");
    assert!(matches!(
        expr.kind,
        ExprKind::Binary {
            operator: BinaryOp::InstanceOf,
            ..
        }
    ));
}

#[test]
fn test_call_and_attribute_chain() {
    let expr = parse_expr("a.b(1, 2)[0]");
    match expr.kind {
        ExprKind::Index { object, .. } => match object.kind {
            ExprKind::Call { callee, arguments } => {
                assert_eq!(arguments.len(), 2);
                assert!(matches!(callee.kind, ExprKind::Attribute { ref name, .. } if name == "b"));
            }
            _ => panic!("Expected call"),
        },
        _ => panic!("Expected index"),
    }
}

#[test]
fn test_assignment_is_right_associative() {
    let expr = parse_expr("a = b = 3");
    match expr.kind {
        ExprKind::Assign { value, .. } => {
            assert!(matches!(value.kind, ExprKind::Assign { .. }))
        }
        _ => panic!("Expected assignment"),
    }
}

#[test]
fn test_compound_assignment_desugars() {
    let expr = parse_expr("x += 2");
    match expr.kind {
        ExprKind::Assign { target, value } => {
            assert_eq!(target.kind, ExprKind::Identifier("x".to_string()));
            match value.kind {
                ExprKind::Binary { left, operator, .. } => {
                    assert_eq!(operator, BinaryOp::Add);
                    assert_eq!(left.kind, ExprKind::Identifier("x".to_string()));
                }
                _ => panic!("Expected binary value"),
            }
        }
        _ => panic!("Expected assignment"),
    }
}

#[test]
fn test_invalid_assignment_target() {
    let (_, log) = parse_with_log("1 + 2 = 3");
    assert_eq!(log.len(), 1);
}

#[test]
fn test_collections() {
    assert!(matches!(parse_expr("[1, 2, 3]").kind, ExprKind::List(ref v) if v.len() == 3));
    assert!(matches!(parse_expr("(1, 2)").kind, ExprKind::Tuple(ref v) if v.len() == 2));
    assert!(matches!(parse_expr("(1,)").kind, ExprKind::Tuple(ref v) if v.len() == 1));
    assert!(matches!(parse_expr("(1)").kind, ExprKind::Grouping(_)));
    assert!(matches!(parse_expr("x = {\"a\" : 1, \"b\" : 2}").kind, ExprKind::Assign { .. }));
}

#[test]
fn test_lambda_forms() {
    match parse_expr("lambda (x, y) => x + y").kind {
        ExprKind::Lambda(decl) => {
            assert_eq!(decl.params.len(), 2);
            assert!(matches!(decl.body[0].kind, StmtKind::Return(Some(_))));
        }
        _ => panic!("Expected lambda"),
    }
    match parse_expr("lambda (*args) { print(args) }").kind {
        ExprKind::Lambda(decl) => assert!(decl.variadic),
        _ => panic!("Expected lambda"),
    }
}

#[test]
fn test_function_declaration() {
    let program = parse("func add(a, b) { return a + b }");
    match &program.statements[0].kind {
        StmtKind::Function(decl) => {
            assert_eq!(decl.name, "add");
            assert_eq!(decl.params.len(), 2);
            assert!(!decl.variadic);
            assert_eq!(decl.body.len(), 1);
        }
        _ => panic!("Expected function"),
    }
}

#[test]
fn test_variadic_must_be_last() {
    let (_, log) = parse_with_log("func f(*a, b) { }");
    assert!(!log.is_empty());
}

#[test]
fn test_class_declaration() {
    let program = parse(
        r#"
        class Point : Base, pkg.Mixin {
            func Point(x, y) { self.x = x; self.y = y }
            func norm() { return self.x * self.x + self.y * self.y }
            static func origin() { return Point(0, 0) }
            static count = 0
            enum Axis { X, Y }
        }
        "#,
    );
    match &program.statements[0].kind {
        StmtKind::Class(decl) => {
            assert_eq!(decl.name, "Point");
            assert_eq!(decl.bases.len(), 2);
            assert!(matches!(decl.bases[1].kind, ExprKind::Attribute { .. }));
            assert_eq!(decl.members.len(), 5);
            assert!(decl.constructor().is_some());
            assert!(matches!(decl.members[2], ClassMember::StaticMethod(_)));
            assert!(matches!(decl.members[3], ClassMember::StaticField { .. }));
        }
        _ => panic!("Expected class"),
    }
}

#[test]
fn test_enum_values() {
    let program = parse("enum Color { Red, Green = 5, Blue, Low = -1 }");
    match &program.statements[0].kind {
        StmtKind::Enum(decl) => {
            let values: Vec<_> = decl.members.iter().map(|m| m.value).collect();
            assert_eq!(values, vec![None, Some(5), None, Some(-1)]);
        }
        _ => panic!("Expected enum"),
    }
}

#[test]
fn test_interface_declaration() {
    let program = parse("interface Shape { func area() func scale(factor) }");
    match &program.statements[0].kind {
        StmtKind::Interface(decl) => {
            assert_eq!(decl.methods.len(), 2);
            assert_eq!(decl.methods[1].params.len(), 1);
        }
        _ => panic!("Expected interface"),
    }
}

#[test]
fn test_use_forms() {
    let program = parse("use os\nuse a.b\nuse x, y from lib.tools\nuse * from math");
    let uses: Vec<_> = program
        .statements
        .iter()
        .map(|s| match &s.kind {
            StmtKind::Use(decl) => (decl.module.clone(), decl.items.clone()),
            _ => panic!("Expected use"),
        })
        .collect();
    assert_eq!(uses[0], ("os".to_string(), UseItems::Module));
    assert_eq!(uses[1], ("a.b".to_string(), UseItems::Module));
    assert_eq!(
        uses[2],
        (
            "lib.tools".to_string(),
            UseItems::Names(vec!["x".to_string(), "y".to_string()])
        )
    );
    assert_eq!(uses[3], ("math".to_string(), UseItems::All));
}

#[test]
fn test_control_flow_statements() {
    let program = parse(
        r#"
        func f(xs) {
            for (i = 0; i < 10; i += 1) { continue }
            foreach (x in xs) { break }
            while (true) { break; }
            try { raise "boom" } except (e) { print(e) }
            switch (xs) { case 1, 2 { return 1 } default { return 0 } }
            if (xs) return 1 else return 2
        }
        "#,
    );
    match &program.statements[0].kind {
        StmtKind::Function(decl) => {
            let kinds: Vec<_> = decl.body.iter().map(|s| s.kind.keyword()).collect();
            assert_eq!(kinds, vec!["for", "foreach", "while", "try", "switch", "if"]);
        }
        _ => panic!("Expected function"),
    }
}

#[test]
fn test_switch_cases() {
    let program = parse("func f(v) { switch (v) { case 1, 2 { } case 3 { } } }");
    let StmtKind::Function(decl) = &program.statements[0].kind else {
        panic!("Expected function");
    };
    match &decl.body[0].kind {
        StmtKind::Switch { cases, default, .. } => {
            assert_eq!(cases.len(), 2);
            assert_eq!(cases[0].values.len(), 2);
            assert!(default.is_none());
        }
        _ => panic!("Expected switch"),
    }
}

#[test]
fn test_error_recovery_reports_every_statement() {
    let (program, log) = parse_with_log("x = ;\ny = 2\nz = );\nw = 4");
    assert_eq!(log.len(), 2);
    assert_eq!(program.statements.len(), 2);
}

#[test]
fn test_recovery_inside_function_body() {
    let (program, log) = parse_with_log("func f() { a = ; b = 1 }\nfunc g() { }");
    assert_eq!(log.len(), 1);
    assert_eq!(program.statements.len(), 2);
}
