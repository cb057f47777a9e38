use clou::ast_printer::Ast;
use clou::error::Result;
use clou::parser::Parser;
use clou::scanner::Scanner;
use clou::token::Token;

fn parse(source: &str) -> Result<String> {
    let tokens: Vec<Token> = Scanner::new(source).collect::<Result<Vec<Token>>>()?;
    let program = Parser::new(tokens).parse()?;

    Ok(Ast.print_program(&program))
}

fn assert_parses_to(source: &str, expected: &str) {
    match parse(source) {
        Ok(rendered) => assert_eq!(rendered, expected, "source: {}", source),

        Err(e) => panic!("parse failed: {}\nsource: {}", e, source),
    }
}

fn assert_parse_error(source: &str, fragment: &str) {
    match parse(source) {
        Ok(rendered) => panic!(
            "expected error containing {:?}, parsed as {}",
            fragment, rendered
        ),

        Err(e) => {
            let rendered = e.to_string();
            assert!(
                rendered.contains(fragment),
                "error {:?} does not contain {:?}",
                rendered,
                fragment
            );
        }
    }
}

#[test]
fn multiplication_binds_tighter_than_addition() {
    assert_parses_to("1 + 2 * 3;", "(+ 1.0 (* 2.0 3.0))");
}

#[test]
fn power_is_right_associative() {
    assert_parses_to("2 ^ 3 ^ 2;", "(^ 2.0 (^ 3.0 2.0))");
}

#[test]
fn power_binds_tighter_than_unary() {
    assert_parses_to("-2 ^ 2;", "(- (^ 2.0 2.0))");
}

#[test]
fn comparison_below_additive() {
    assert_parses_to("1 + 2 < 4;", "(< (+ 1.0 2.0) 4.0)");
}

#[test]
fn logical_precedence_or_below_and() {
    assert_parses_to("a or b and c;", "(or a (and b c))");
}

#[test]
fn assignment_is_right_associative() {
    assert_parses_to("a = b = 1;", "(= a (= b 1.0))");
}

#[test]
fn assignment_targets() {
    assert_parses_to("a.b = 1;", "(set a b 1.0)");
    assert_parses_to("a[0] = 1;", "(index= a 0.0 1.0)");
}

#[test]
fn invalid_assignment_target() {
    assert_parse_error("1 = 2;", "Invalid assignment target.");
}

#[test]
fn postfix_chains_are_left_associative() {
    assert_parses_to("a.b[0](1);", "(call (index (get a b) 0.0) 1.0)");
}

#[test]
fn for_desugars_to_while() {
    assert_parses_to(
        "for (let i = 0; i < 3; i = i + 1) print(i);",
        "(block (let i 0.0) (while (< i 3.0) (block (call print i) (= i (+ i 1.0)))))",
    );
}

#[test]
fn for_without_clauses_loops_on_true() {
    let rendered = parse("for (;;) { }").unwrap();

    assert!(rendered.starts_with("(while true"), "got {}", rendered);
}

#[test]
fn class_with_superclass_and_methods() {
    assert_parses_to(
        "class B extends A { function init(n) { this.n = n; } }",
        "(class B (extends A) (method init (n) (set this n n)))",
    );
}

#[test]
fn function_parameters_with_default_and_rest() {
    let rendered = parse("function f(a, b = 1, ...rest) { return a; }").unwrap();

    assert!(rendered.contains("...rest"), "got {}", rendered);
    assert!(rendered.contains("(return a)"), "got {}", rendered);
}

#[test]
fn rest_parameter_must_be_last() {
    assert_parse_error(
        "function f(...a, b) { }",
        "Rest parameter must be the last parameter.",
    );
}

#[test]
fn new_is_distinct_from_call() {
    assert_parses_to("new Point(1, 2);", "(new Point 1.0 2.0)");
}

#[test]
fn array_and_object_literals() {
    assert_parses_to("[1, 2];", "(array 1.0 2.0)");
    assert_parses_to("let o = { a: 1, b: 2 };", "(let o (object (a 1.0) (b 2.0)))");
}

#[test]
fn anonymous_function_expression() {
    assert_parses_to(
        "let f = function(x) { return x; };",
        "(let f (fn (x) (return x)))",
    );
}

#[test]
fn missing_semicolons_are_reported() {
    assert_parse_error("let x = 1", "Expect ';' after variable declaration.");
    assert_parse_error("1 + 2", "Expect ';' after expression.");
}

#[test]
fn const_without_initializer_is_rejected() {
    assert_parse_error("const x;", "Const declaration requires an initializer.");
}

#[test]
fn error_reports_the_offending_line() {
    let err = parse("let a = 1;\nlet b = ;\n").unwrap_err();

    assert!(err.to_string().contains("[line 2]"));
    assert!(err.to_string().contains("Expect expression."));
}
