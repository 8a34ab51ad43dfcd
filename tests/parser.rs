#[cfg(test)]
mod parser_tests {
    use typthon as tp;

    use tp::ast_printer::AstPrinter;
    use tp::error::TypthonError;
    use tp::parser::Parser;
    use tp::resolver::Resolver;
    use tp::types::Type;

    fn print(source: &str) -> String {
        let statements = Parser::new(source)
            .parse()
            .unwrap_or_else(|e| panic!("parse failed: {}", e));

        AstPrinter::print_program(&statements)
    }

    fn parse_error(source: &str) -> TypthonError {
        match Parser::new(source).parse() {
            Ok(statements) => panic!(
                "expected a parse error, got {}",
                AstPrinter::print_program(&statements)
            ),
            Err(e) => e,
        }
    }

    fn resolve_error(source: &str) -> TypthonError {
        let statements = Parser::new(source)
            .parse()
            .unwrap_or_else(|e| panic!("parse failed: {}", e));

        Resolver::new()
            .resolve(&statements)
            .expect_err("expected a resolve error")
    }

    // ───────────────────────── expressions ─────────────────────────

    #[test]
    fn test_arithmetic_precedence() {
        assert_eq!(print("x = 1 + 2 * 3\n"), "(= x (+ 1.0 (* 2.0 3.0)))");
        assert_eq!(print("(1 + 2) * 3\n"), "(* (+ 1.0 2.0) 3.0)");
        assert_eq!(print("a - b - c\n"), "(- (- a b) c)");
        assert_eq!(print("7 // 2 % 3\n"), "(% (// 7.0 2.0) 3.0)");
    }

    #[test]
    fn test_power_is_right_associative() {
        assert_eq!(print("2 ** 3 ** 2\n"), "(** 2.0 (** 3.0 2.0))");
    }

    #[test]
    fn test_unary_binds_tighter_than_power() {
        assert_eq!(print("-2 ** 2\n"), "(** (- 2.0) 2.0)");
        assert_eq!(print("not a\n"), "(not a)");
    }

    #[test]
    fn test_logical_and_comparison_operators() {
        assert_eq!(print("a or b and c\n"), "(or a (and b c))");
        assert_eq!(print("x not in y\n"), "(not in x y)");
        assert_eq!(print("a is not None\n"), "(is not a None)");
        assert_eq!(print("a < b == c\n"), "(== (< a b) c)");
    }

    #[test]
    fn test_conditional_expression() {
        assert_eq!(print("a if b else c\n"), "(if b a c)");
    }

    #[test]
    fn test_postfix_chains() {
        assert_eq!(print("obj.items[0](1, 2)\n"), "(call ([] (. obj items) 0.0) 1.0 2.0)");
        assert_eq!(print("f()\n"), "(call f)");
    }

    #[test]
    fn test_container_displays() {
        assert_eq!(
            print("d = {'a': 1, 'b': [2]}\n"),
            "(= d (dict (\"a\" 1.0) (\"b\" (list 2.0))))"
        );
        assert_eq!(print("s = {1, 2}\n"), "(= s (set 1.0 2.0))");
        assert_eq!(print("e = {}\n"), "(= e (dict))");
        assert_eq!(print("t = (1,)\n"), "(= t (tuple 1.0))");
        assert_eq!(print("u = ()\n"), "(= u (tuple))");
    }

    #[test]
    fn test_lambda() {
        assert_eq!(
            print("f = lambda x, y: x + y\n"),
            "(= f (lambda (x y) (block (return (+ x y)))))"
        );
    }

    #[test]
    fn test_adjacent_strings_concatenate() {
        assert_eq!(print("'a' 'b'\n"), "\"ab\"");
    }

    // ───────────────────────── statements ──────────────────────────

    #[test]
    fn test_assignment_forms() {
        assert_eq!(print("a, b = b, a\n"), "(= (tuple a b) (tuple b a))");
        assert_eq!(print("a = b = 0\n"), "(= a b 0.0)");
        assert_eq!(print("x += 1\n"), "(+= x 1.0)");
        assert_eq!(print("self.n **= 2\n"), "(**= (. self n) 2.0)");
        assert_eq!(print("x: list[int] = []\n"), "(: x list[int] (list))");
        assert_eq!(print("y: str\n"), "(: y str)");
    }

    #[test]
    fn test_function_definition() {
        assert_eq!(
            print("def f(a: int, b) -> str:\n    return a\n"),
            "(def f (a: int b) -> str (block (return a)))"
        );
    }

    #[test]
    fn test_class_definition() {
        assert_eq!(print("class B(A):\n    pass\n"), "(class B (A) (block (pass)))");
        assert_eq!(print("class C:\n    x = 1\n"), "(class C () (block (= x 1.0)))");
    }

    #[test]
    fn test_if_elif_else() {
        assert_eq!(print("if a:\n    x\n"), "(if a (block x))");
        assert_eq!(
            print("if a:\n    x\nelif b:\n    y\nelse:\n    z\n"),
            "(cond (if a (block x)) (elif b (block y)) (else (block z)))"
        );
    }

    #[test]
    fn test_same_line_suite_with_semicolons() {
        assert_eq!(
            print("if a: x = 1; y = 2\n"),
            "(if a (block (= x 1.0) (= y 2.0)))"
        );
    }

    #[test]
    fn test_loops() {
        assert_eq!(
            print("while i < 3:\n    i += 1\n    continue\n"),
            "(while (< i 3.0) (block (+= i 1.0) (continue)))"
        );
        assert_eq!(
            print("for k, v in d.items():\n    break\n"),
            "(for (tuple k v) (call (. d items)) (block (break)))"
        );
    }

    #[test]
    fn test_try_statement() {
        assert_eq!(
            print("try:\n    f()\nexcept ValueError as e:\n    pass\nfinally:\n    g()\n"),
            "(try (block (call f)) (except ValueError as e (block (pass))) (finally (block (call g))))"
        );
    }

    #[test]
    fn test_with_import_and_misc() {
        assert_eq!(
            print("with open(p) as fh:\n    pass\n"),
            "(with (call open p) as fh (block (pass)))"
        );
        assert_eq!(print("import os.path as p, sys\n"), "(import os.path as p sys)");
        assert_eq!(print("from m import a, b as c\n"), "(from m a b as c)");
        assert_eq!(print("assert x, 'msg'\n"), "(assert x \"msg\")");
        assert_eq!(print("raise\n"), "(raise)");
    }

    #[test]
    fn test_statement_lines() {
        let statements = Parser::new("a = 1\n\nif a:\n    b = 2\n").parse().unwrap();
        let lines: Vec<usize> = statements.iter().map(|s| s.line).collect();

        assert_eq!(lines, vec![1, 3]);
    }

    // ───────────────────────── type annotations ────────────────────

    #[test]
    fn test_parse_type() {
        assert_eq!(Parser::new("int").parse_type().unwrap(), Type::Int);
        assert_eq!(
            Parser::new("dict[str, list[int]]").parse_type().unwrap(),
            Type::dict(Type::Str, Type::list(Type::Int))
        );
        assert_eq!(
            Parser::new("(int, str) -> bool").parse_type().unwrap(),
            Type::function(vec![Type::Int, Type::Str], Type::Bool)
        );
        assert_eq!(Parser::new("Widget").parse_type().unwrap(), Type::Any);
    }

    // ───────────────────────── errors ──────────────────────────────

    #[test]
    fn test_missing_colon() {
        match parse_error("if x\n    y\n") {
            TypthonError::Parse {
                token,
                line,
                message,
            } => {
                assert_eq!(line, 1);
                assert_eq!(token, "newline");
                assert_eq!(message, "Expected ':'");
            }
            other => panic!("expected Parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_bad_parameter_list() {
        let error = parse_error("def f(:\n    pass\n");

        assert_eq!(
            error.to_string(),
            "[line 1] Error at ':': Expected parameter name"
        );
    }

    #[test]
    fn test_unexpected_indent() {
        let error = parse_error("x = 1\n    y = 2\n");

        assert!(error.to_string().contains("Unexpected indent"), "got: {}", error);
    }

    #[test]
    fn test_missing_block() {
        let error = parse_error("while x:\npass\n");

        assert!(
            error.to_string().contains("Expected an indented block"),
            "got: {}",
            error
        );
    }

    #[test]
    fn test_incomplete_expression() {
        let error = parse_error("x = 1 +\n");

        assert!(error.to_string().contains("Expected expression"), "got: {}", error);
    }

    // ───────────────────────── static checks ───────────────────────

    #[test]
    fn test_resolver_rejects_misplaced_statements() {
        let cases = [
            ("return 1\n", "'return' outside function"),
            ("break\n", "'break' outside loop"),
            ("def f():\n    continue\n", "'continue' outside loop"),
            ("nonlocal x\n", "nonlocal declaration not allowed at module level"),
            ("def f(a, a):\n    pass\n", "duplicate argument 'a' in function definition"),
        ];

        for (source, expected) in cases {
            match resolve_error(source) {
                TypthonError::Resolve { message, .. } => assert_eq!(message, expected),
                other => panic!("expected Resolve error, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_resolver_accepts_nested_scopes() {
        let statements = Parser::new(
            "def outer():\n    x = 0\n    def inner():\n        nonlocal x\n        for i in []:\n            if i:\n                break\n        return x\n    return inner\n",
        )
        .parse()
        .unwrap();

        assert!(Resolver::new().resolve(&statements).is_ok());
    }
}
