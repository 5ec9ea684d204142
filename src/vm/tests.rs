//! End-to-end tests: source in, printed lines and results out.

use std::fs;

use pretty_assertions::assert_eq;

use crate::config::Config;
use crate::error::{IodineError, RuntimeError};
use crate::object::Value;
use crate::vm::Vm;

fn run_source(source: &str, config: &Config) -> (Vm, Result<Value, IodineError>) {
    let mut vm = Vm::with_config(config);
    vm.capture_output(true);
    let result = crate::run_in(&mut vm, source, "main", config);
    (vm, result)
}

/// Run `source` and return everything it printed.
fn output(source: &str) -> Vec<String> {
    let (vm, result) = run_source(source, &Config::default());
    if let Err(err) = result {
        panic!("script failed: {}\noutput so far: {:?}", err, vm.output);
    }
    vm.output
}

fn runtime_error(source: &str) -> RuntimeError {
    match run_source(source, &Config::default()).1 {
        Err(IodineError::Runtime(err)) => err,
        Err(other) => panic!("expected a runtime error, got {}", other),
        Ok(value) => panic!("expected a runtime error, got {}", value),
    }
}

fn global(vm: &Vm, name: &str) -> Option<Value> {
    vm.loader.get("main")?.get_attribute(name)
}

#[test]
fn test_function_call() {
    let (vm, result) = run_source(
        "func add(a, b) { return a + b }\nresult = add(2, 3)",
        &Config::default(),
    );
    assert!(result.is_ok());
    assert_eq!(global(&vm, "result"), Some(Value::Int(5)));
}

#[test]
fn test_print_joins_arguments() {
    assert_eq!(output("print(1, 2.5, \"x\", true, null)"), vec!["1 2.5 x true null"]);
}

#[test]
fn test_arithmetic_and_strings() {
    let lines = output(
        r#"
        print(7 / 2, 7 % 3, 2 * 3 + 1)
        print(1.5 * 2)
        print("ab" + "cd", "ab" * 3)
        print(1 << 4, 6 & 3, 6 | 3, 6 ^ 3)
        print(-(3), !true, ~0)
        "#,
    );
    assert_eq!(
        lines,
        vec!["3 1 7", "3.0", "abcd ababab", "16 2 7 5", "-3 false -1"]
    );
}

#[test]
fn test_optimizer_does_not_change_results() {
    let source = r#"
        func f(n) {
            total = 0
            for (i = 0; i < n; i += 1) {
                if (i % 2 == 0) { total += i } else { total -= 1 }
            }
            return total
        }
        print(f(10))
    "#;
    let optimized = output(source);
    let config = Config {
        optimize: false,
        ..Config::default()
    };
    let (vm, result) = run_source(source, &config);
    assert!(result.is_ok());
    assert_eq!(optimized, vm.output);
    assert_eq!(optimized, vec!["15"]);
}

#[test]
fn test_loops() {
    let lines = output(
        r#"
        func main() {
            i = 0
            while (true) {
                i += 1
                if (i == 3) continue
                if (i > 5) break
                print(i)
            }
            foreach (x in [10, 20]) { print(x) }
            foreach (c in "hi") { print(c) }
            foreach (n in range(3)) { print(n) }
        }
        main()
        "#,
    );
    assert_eq!(
        lines,
        vec!["1", "2", "4", "5", "10", "20", "h", "i", "0", "1", "2"]
    );
}

#[test]
fn test_huge_range_is_iterated_lazily() {
    let lines = output(
        r#"
        func main() {
            total = 0
            foreach (i in range(1 << 40)) {
                if (i == 3) break
                total += i
            }
            print(total, typeof(range(2)))
        }
        main()
        "#,
    );
    assert_eq!(lines, vec!["3 Iterator"]);
}

#[test]
fn test_nested_foreach_with_break() {
    let lines = output(
        r#"
        func main() {
            foreach (a in [1, 2]) {
                foreach (b in [1, 2, 3]) {
                    if (b == 2) break
                    print(a * 10 + b)
                }
            }
        }
        main()
        "#,
    );
    assert_eq!(lines, vec!["11", "21"]);
}

#[test]
fn test_switch() {
    let lines = output(
        r#"
        func name(v) {
            switch (v) {
                case 1, 2 { return "small" }
                case 3 { return "three" }
                default { return "other" }
            }
        }
        print(name(2), name(3), name(9))
        "#,
    );
    assert_eq!(lines, vec!["small three other"]);
}

#[test]
fn test_classes_and_methods() {
    let lines = output(
        r#"
        class Point {
            func Point(x, y) { self.x = x; self.y = y }
            func sum() { return self.x + self.y }
            static func origin() { return Point(0, 0) }
            static count = 2
        }
        p = Point(3, 4)
        print(p.sum(), p.x)
        print(Point.origin().sum(), Point.count)
        "#,
    );
    assert_eq!(lines, vec!["7 3", "0 2"]);
}

#[test]
fn test_inheritance_and_super() {
    let lines = output(
        r#"
        class Animal {
            func Animal(name) { self.name = name }
            func speak() { return self.name + " makes a sound" }
        }
        class Dog : Animal {
            func Dog(name) { super(name) }
            func bark() { return self.name + " barks" }
        }
        d = Dog("Rex")
        print(d.speak())
        print(d.bark())
        print(d is Dog, d is Animal)
        "#,
    );
    assert_eq!(lines, vec!["Rex makes a sound", "Rex barks", "true true"]);
}

#[test]
fn test_operator_overloading() {
    let lines = output(
        r#"
        class Vec {
            func Vec(x) { self.x = x }
            func _add(other) { return Vec(self.x + other.x) }
            func _equals(other) { return self.x == other.x }
            func _str() { return "Vec(" + Str(self.x) + ")" }
        }
        print(Vec(1) + Vec(2))
        print(Vec(1) == Vec(1), Vec(1) != Vec(2))
        "#,
    );
    assert_eq!(lines, vec!["Vec(3)", "true true"]);
}

#[test]
fn test_custom_iterator() {
    let lines = output(
        r#"
        class Countdown {
            func Countdown(n) { self.n = n }
            func _iterReset() { self.i = self.n + 1 }
            func _iterMoveNext() { self.i = self.i - 1; return self.i > 0 }
            func _iterGetCurrent() { return self.i }
        }
        func main() {
            foreach (x in Countdown(3)) { print(x) }
        }
        main()
        "#,
    );
    assert_eq!(lines, vec!["3", "2", "1"]);
}

#[test]
fn test_lambdas_capture_locals() {
    let lines = output(
        r#"
        func adder(n) {
            return lambda (x) => x + n
        }
        add5 = adder(5)
        print(add5(1))
        print([1, 2, 3].map(lambda (x) => x * 2))
        "#,
    );
    assert_eq!(lines, vec!["6", "[2, 4, 6]"]);
}

#[test]
fn test_recursive_lambda_gets_fresh_parameters() {
    let lines = output(
        r#"
        fact = lambda (n) {
            if (n <= 1) { return 1 }
            return fact(n - 1) * n
        }
        print(fact(4))
        func make() {
            return lambda (n) {
                if (n <= 1) { return 1 }
                return g(n - 1) + n
            }
        }
        g = make()
        print(g(4))
        "#,
    );
    assert_eq!(lines, vec!["24", "10"]);
}

#[test]
fn test_lambdas_write_through_to_captured_locals() {
    let lines = output(
        r#"
        func counter() {
            count = 0
            return lambda () {
                count = count + 1
                return count
            }
        }
        tick = counter()
        tick()
        print(tick())
        curry = lambda (a) => lambda (b) => a - b
        minus = curry(10)
        curry(100)
        print(minus(3))
        "#,
    );
    assert_eq!(lines, vec!["2", "7"]);
}

#[test]
fn test_variadic_arguments() {
    let lines = output(
        r#"
        func count(first, *rest) { return len(rest) }
        print(count(1), count(1, 2, 3))
        "#,
    );
    assert_eq!(lines, vec!["0 2"]);
}

#[test]
fn test_collections_and_natives() {
    let lines = output(
        r#"
        xs = [3, 1, 2]
        xs.append(4)
        xs[0] = 0
        h = {"a" : 1}
        h["b"] = 2
        print(xs, len(xs), h["b"], h.contains("a"))
        print("Hello".upper(), (1, 2)[1])
        "#,
    );
    assert_eq!(lines, vec!["[0, 1, 2, 4] 4 2 true", "HELLO 2"]);
}

#[test]
fn test_enums_and_type_checks() {
    let lines = output(
        r#"
        enum Color { Red, Green = 5, Blue }
        print(Color.Red, Color.Blue)
        print(1 is Int, "s" is Str, 1 is Str, typeof(1.0))
        "#,
    );
    assert_eq!(lines, vec!["0 6", "true true false Float"]);
}

#[test]
fn test_exceptions_are_caught() {
    let lines = output(
        r#"
        func main() {
            try { raise "boom" } except (e) { print("caught", e) }
            try { x = 1 / 0 } except (e) { print(e.kind) }
            try { [1][5] } except { print("index") }
            print("after")
        }
        main()
        "#,
    );
    assert_eq!(
        lines,
        vec!["caught boom", "DivisionByZeroException", "index", "after"]
    );
}

#[test]
fn test_exception_unwinds_through_calls() {
    let lines = output(
        r#"
        func inner() { raise "deep" }
        func middle() { inner(); print("unreachable") }
        func main() {
            try { middle() } except (e) { print(e) }
            print("done")
        }
        main()
        "#,
    );
    assert_eq!(lines, vec!["deep", "done"]);
}

#[test]
fn test_exception_from_callback_inside_native() {
    let lines = output(
        r#"
        func main() {
            try {
                [1, 2].map(lambda (x) => x / 0)
            } except (e) {
                print(e.kind)
            }
        }
        main()
        "#,
    );
    assert_eq!(lines, vec!["DivisionByZeroException"]);
}

#[test]
fn test_oversized_string_repetition_is_catchable() {
    let lines = output(
        r#"
        func main() {
            try { s = "ab" * 9223372036854775807 } except (e) { print(e.kind) }
            print("ab" * 3, len("ab" * -2))
        }
        main()
        "#,
    );
    assert_eq!(lines, vec!["Exception", "ababab 0"]);
}

#[test]
fn test_self_containing_containers_print_and_compare() {
    let lines = output(
        r#"
        l = [1]
        l.append(l)
        print(str(l))
        a = [1]
        a.append(a)
        print(l == a, l != a)
        h = {}
        h["me"] = h
        print(h)
        "#,
    );
    assert_eq!(lines, vec!["[1, [...]]", "true false", "{\"me\" : {...}}"]);
}

#[test]
fn test_list_remove_may_compare_against_the_list_itself() {
    let lines = output(
        r#"
        l = [[1]]
        print(l.remove(l), len(l))
        l.append(l)
        print(l.remove(l), len(l))
        "#,
    );
    assert_eq!(lines, vec!["false 1", "true 1"]);
}

#[test]
fn test_raise_exception_object() {
    let lines = output(
        r#"
        func main() {
            try { raise Exception("bad input") } except (e) {
                print(e is Exception, e.message)
            }
        }
        main()
        "#,
    );
    assert_eq!(lines, vec!["true bad input"]);
}

#[test]
fn test_interfaces_match_structurally() {
    let lines = output(
        r#"
        interface Shape { func area() }
        class Square {
            func Square(side) { self.side = side }
            func area() { return self.side * self.side }
        }
        class Blob { }
        print(Square(2) is Shape, Blob() is Shape, Square(3).area())
        "#,
    );
    assert_eq!(lines, vec!["true false 9"]);
}

#[test]
fn test_indexing_and_call_dunders() {
    let lines = output(
        r#"
        class Table {
            func Table() { self.rows = {} }
            func _getItem(key) { return self.rows.get(key, 0) }
            func _setItem(key, value) { self.rows[key] = value }
            func _call(x) { return x * 10 }
            func _len() { return 42 }
        }
        t = Table()
        t["a"] = 5
        print(t["a"], t["b"], t(4), len(t))
        "#,
    );
    assert_eq!(lines, vec!["5 0 40 42"]);
}

#[test]
fn test_short_circuit_yields_operand() {
    assert_eq!(
        output("print(null || \"x\", 0 && 1, 2 && 3, false || false)"),
        vec!["x 0 3 false"]
    );
}

#[test]
fn test_uncaught_raise() {
    let err = runtime_error("func main() { raise \"bad\" }\nmain()");
    assert_eq!(err.kind(), "Exception");
    assert_eq!(err.message(), "bad");
}

#[test]
fn test_runtime_error_kinds() {
    assert!(matches!(
        runtime_error("x = 1 / 0"),
        RuntimeError::DivisionByZero(_)
    ));
    assert!(matches!(
        runtime_error("f = 1\nf()"),
        RuntimeError::NotCallable(..)
    ));
    assert!(matches!(
        runtime_error("func f(a) { }\nf()"),
        RuntimeError::WrongArity { .. }
    ));
    assert!(matches!(
        runtime_error("x = missing"),
        RuntimeError::UndefinedVariable(..)
    ));
}

#[test]
fn test_stack_overflow() {
    let config = Config {
        max_call_depth: 64,
        ..Config::default()
    };
    let (_, result) = run_source("func f(n) { return f(n + 1) }\nf(0)", &config);
    match result {
        Err(IodineError::Runtime(RuntimeError::StackOverflow(depth, _))) => {
            assert_eq!(depth, 64)
        }
        other => panic!("expected a stack overflow, got {:?}", other.map(|v| v.to_string())),
    }
}

#[test]
fn test_import_module_from_search_path() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join("lib")).unwrap();
    fs::write(
        dir.path().join("lib").join("maths.id"),
        "func square(x) { return x * x }\nanswer = 42",
    )
    .unwrap();

    let config = Config::default().with_search_path(dir.path());
    let (vm, result) = run_source(
        "use lib.maths\nuse square from lib.maths\nprint(maths.answer, square(3))",
        &config,
    );
    assert!(result.is_ok(), "{:?}", result.err().map(|e| e.to_string()));
    assert_eq!(vm.output, vec!["42 9"]);
}

#[test]
fn test_import_all_and_missing_module() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("util.id"), "greeting = \"hi\"").unwrap();

    let config = Config::default().with_search_path(dir.path());
    let (vm, result) = run_source("use * from util\nprint(greeting)", &config);
    assert!(result.is_ok());
    assert_eq!(vm.output, vec!["hi"]);

    let (_, result) = run_source("use nowhere", &config);
    assert!(matches!(
        result,
        Err(IodineError::Runtime(RuntimeError::Import { .. }))
    ));
}

#[test]
fn test_compile_errors_stop_before_running() {
    let (vm, result) = run_source("print(1)\nwhile (true) { }", &Config::default());
    assert!(matches!(result, Err(IodineError::Compilation(_))));
    assert!(vm.output.is_empty());
}

#[test]
fn test_compile_file_names_the_module_after_the_script() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shapes.id");
    fs::write(&path, "func area(w, h) { return w * h }").unwrap();

    let module = crate::compile_file(&path, &Config::default()).unwrap();
    assert_eq!(module.name, "shapes");
    assert!(module.get_attribute("area").is_some());

    fs::write(&path, "func broken( {").unwrap();
    assert!(crate::compile_file(&path, &Config::default()).is_err());
    assert!(matches!(
        crate::compile_file(&dir.path().join("missing.id"), &Config::default()),
        Err(IodineError::Io(_))
    ));
}
