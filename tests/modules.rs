use clou::interpreter::Clou;
use clou::Result;

/// Engine with captured output and a prepared module store.
fn run_main(files: &[(&str, &str)]) -> Result<String> {
    let (mut clou, output) = Clou::with_captured_output();

    for (path, content) in files {
        clou.modules().add_file(*path, *content);
    }

    clou.run_file("main.clou")?;

    let text = output.borrow().clone();
    Ok(text)
}

fn assert_main_output(files: &[(&str, &str)], expected: &str) {
    match run_main(files) {
        Ok(out) => assert_eq!(out, expected),

        Err(e) => panic!("script failed: {}", e),
    }
}

#[test]
fn require_binds_exported_functions() {
    assert_main_output(
        &[
            (
                "math.clou",
                "function add(a,b){return a+b;} exports.add = add;",
            ),
            (
                "main.clou",
                "const m = require(\"./math.clou\"); print(m.add(2,3));",
            ),
        ],
        "5\n",
    );
}

#[test]
fn require_resolves_without_extension() {
    assert_main_output(
        &[
            ("math.clou", "exports.answer = 42;"),
            ("main.clou", "print(require(\"math\").answer);"),
        ],
        "42\n",
    );
}

#[test]
fn require_twice_returns_the_same_exports_identity() {
    assert_main_output(
        &[
            ("state.clou", "exports.items = [];"),
            (
                "main.clou",
                r#"
                const a = require("./state.clou");
                const b = require("./state.clou");
                print(a == b);
                a.items[0] = "shared";
                print(b.items);
                "#,
            ),
        ],
        "true\n[shared]\n",
    );
}

#[test]
fn module_body_runs_once() {
    assert_main_output(
        &[
            ("loud.clou", "print(\"loading\"); exports.ok = true;"),
            (
                "main.clou",
                "require(\"./loud.clou\"); require(\"./loud.clou\"); print(\"done\");",
            ),
        ],
        "loading\ndone\n",
    );
}

#[test]
fn nested_requires_resolve_relative_to_the_module() {
    assert_main_output(
        &[
            ("lib/helper.clou", "exports.tag = \"helper\";"),
            (
                "lib/util.clou",
                "const h = require(\"./helper.clou\"); exports.tag = \"util+\" + h.tag;",
            ),
            ("main.clou", "print(require(\"lib/util.clou\").tag);"),
        ],
        "util+helper\n",
    );
}

#[test]
fn circular_dependencies() {
    assert_main_output(
        &[
            (
                "a.clou",
                r#"
                const b = require("./b.clou");
                function getValue() { return "A" + b.getValue(); }
                exports.getValue = getValue;
                "#,
            ),
            (
                "b.clou",
                r#"
                const a = require("./a.clou");
                function getValue() { return "B" + a.getValue(); }
                exports.getValue = getValue;
                "#,
            ),
            (
                "main.clou",
                "const a = require(\"./a.clou\"); print(\"Value:\", a.getValue());",
            ),
        ],
        "Value: AB\n",
    );
}

#[test]
fn cycle_partial_exports_are_visible_to_both_sides() {
    assert_main_output(
        &[
            (
                "a.clou",
                r#"
                exports.early = "from-a";
                const b = require("./b.clou");
                exports.late = "late-a";
                exports.seen = b.seen_in_a;
                "#,
            ),
            (
                "b.clou",
                r#"
                const a = require("./a.clou");
                exports.seen_in_a = a.early;
                "#,
            ),
            (
                "main.clou",
                "const a = require(\"./a.clou\"); print(a.seen, a.late);",
            ),
        ],
        "from-a late-a\n",
    );
}

#[test]
fn module_scope_recursion_guard_does_not_affect_main_scope() {
    // fib lives in the interpreter's global scope; ordinary recursion must
    // keep working even though module-scope re-entry is cut short.
    assert_main_output(
        &[(
            "main.clou",
            "function fib(n){ if (n <= 1) return n; return fib(n-1)+fib(n-2); } print(fib(12));",
        )],
        "144\n",
    );
}

#[test]
fn missing_module_is_a_runtime_error() {
    let err = run_main(&[("main.clou", "require(\"ghost\");")]).unwrap_err();

    assert!(err.to_string().contains("Module not found: 'ghost'"));
}

#[test]
fn require_needs_a_string_path() {
    let err = run_main(&[("main.clou", "require(42);")]).unwrap_err();

    assert!(err
        .to_string()
        .contains("require() expects a module path string"));
}

#[test]
fn exports_rebound_to_non_object_is_an_error() {
    let err = run_main(&[
        ("bad.clou", "exports = 42;"),
        ("main.clou", "require(\"./bad.clou\");"),
    ])
    .unwrap_err();

    assert!(err.to_string().contains("'exports' must be an object"));
}

#[test]
fn module_locals_stay_isolated_from_the_requiring_scope() {
    let err = run_main(&[
        ("one.clou", "let secret = 1; exports.ok = true;"),
        ("main.clou", "require(\"./one.clou\"); print(secret);"),
    ])
    .unwrap_err();

    assert!(err.to_string().contains("Undefined variable 'secret'"));
}

#[test]
fn exports_object_prints_in_insertion_order() {
    assert_main_output(
        &[
            ("mod.clou", "exports.b = 1; exports.a = 2; exports.c = 3;"),
            ("main.clou", "print(require(\"./mod.clou\"));"),
        ],
        "{ b: 1, a: 2, c: 3 }\n",
    );
}
