#[cfg(test)]
mod interpreter_tests {
    use typthon as tp;

    use tp::error::TypthonError;
    use tp::interpreter::{Interpreter, InterpreterOptions};
    use tp::parser::Parser;
    use tp::value::Value;

    fn run(source: &str) -> Vec<String> {
        let mut interpreter = Interpreter::new(source);
        interpreter.capture_output();

        if let Err(e) = interpreter.run() {
            panic!("program failed: {}", e);
        }

        interpreter.take_output()
    }

    fn run_err(source: &str) -> TypthonError {
        let mut interpreter = Interpreter::new(source);
        interpreter.capture_output();

        interpreter.run().expect_err("expected the program to fail")
    }

    fn uncaught_kind(source: &str) -> String {
        match run_err(source) {
            TypthonError::Uncaught { kind, .. } => kind,
            other => panic!("expected an uncaught exception, got {:?}", other),
        }
    }

    // ───────────────────────── functions and scope ─────────────────

    #[test]
    fn test_function_call() {
        let output = run("def add(a, b):\n    return a + b\nprint(add(2, 3))\n");

        assert_eq!(output, vec!["5"]);
    }

    #[test]
    fn test_local_and_global_assignment() {
        let source = "\
x = 1
def f():
    x = 2
f()
print(x)
def g():
    global x
    x = 2
g()
print(x)
";

        assert_eq!(run(source), vec!["1", "2"]);
    }

    #[test]
    fn test_closure_counter_with_nonlocal() {
        let source = "\
def make_counter():
    count = 0
    def inc():
        nonlocal count
        count += 1
        return count
    return inc
c = make_counter()
print(c())
print(c())
print(c())
";

        assert_eq!(run(source), vec!["1", "2", "3"]);
    }

    #[test]
    fn test_closures_capture_parameters() {
        let source = "\
def adder(n):
    return lambda x: x + n
add5 = adder(5)
add7 = adder(7)
print(add5(10), add7(10))
";

        assert_eq!(run(source), vec!["15 17"]);
    }

    #[test]
    fn test_return_unwinds_nested_blocks() {
        let source = "\
def find():
    i = 0
    while True:
        i += 1
        if i == 3:
            return i
            print('unreachable')
        print(i)
    print('after loop')
print(find())
";

        assert_eq!(run(source), vec!["1", "2", "3"]);
    }

    #[test]
    fn test_recursion() {
        let source = "\
def fact(n):
    if n <= 1:
        return 1
    return n * fact(n - 1)
print(fact(10))
";

        assert_eq!(run(source), vec!["3628800"]);
    }

    #[test]
    fn test_call_depth_limit() {
        let options = InterpreterOptions {
            max_call_depth: 20,
            ..InterpreterOptions::default()
        };
        let mut interpreter =
            Interpreter::with_options("def r(n):\n    return r(n + 1)\nr(0)\n", options);
        assert_eq!(interpreter.options().max_call_depth, 20);
        assert!(interpreter.options().check_types);

        match interpreter.run() {
            Err(TypthonError::Uncaught { kind, .. }) => assert_eq!(kind, "RecursionError"),
            other => panic!("expected RecursionError, got {:?}", other),
        }
    }

    #[test]
    fn test_arity_mismatch() {
        assert_eq!(
            uncaught_kind("def f(a):\n    return a\nf(1, 2)\n"),
            "TypeError"
        );
    }

    #[test]
    fn test_nonlocal_without_binding() {
        assert_eq!(uncaught_kind("def f():\n    nonlocal z\nf()\n"), "NameError");
    }

    // ───────────────────────── values and operators ────────────────

    #[test]
    fn test_truthiness() {
        let source = "\
for v in [0, '', [], None, {}, 1, 'a', [0], True]:
    if v:
        print('T')
    else:
        print('F')
";

        assert_eq!(
            run(source),
            vec!["F", "F", "F", "F", "F", "T", "T", "T", "T"]
        );
    }

    #[test]
    fn test_arithmetic_semantics() {
        let output = run("print(7 // 2, -7 // 2, 7 % -3, 2 ** 10, 7 / 2, -2 ** 2)\n");

        assert_eq!(output, vec!["3 -4 -2 1024 3.5 4"]);
    }

    #[test]
    fn test_short_circuit_returns_operand() {
        let output = run("print(0 or 'x', 1 and [], None or 0)\n");

        assert_eq!(output, vec!["x [] 0"]);
    }

    #[test]
    fn test_string_and_sequence_operators() {
        let output = run("print('ab' * 3, 'x' + 'y', 'b' in 'abc', 3 in [1, 2], [1] + [2])\n");

        assert_eq!(output, vec!["ababab xy True False [1, 2]"]);
    }

    #[test]
    fn test_list_aliasing() {
        let source = "\
a = [1, 2]
b = a
b.append(3)
print(a)
def add_item(lst):
    lst += [4]
add_item(a)
print(len(a), b)
";

        assert_eq!(run(source), vec!["[1, 2, 3]", "4 [1, 2, 3, 4]"]);
    }

    #[test]
    fn test_tuple_unpacking() {
        assert_eq!(run("a, b = 1, 2\na, b = b, a\nprint(a, b)\n"), vec!["2 1"]);
        assert_eq!(uncaught_kind("a, b = [1, 2, 3]\n"), "ValueError");
    }

    // ───────────────────────── control flow ────────────────────────

    #[test]
    fn test_break_and_continue_affect_innermost_loop() {
        let source = "\
for i in range(3):
    for j in range(3):
        if j == 1:
            break
        print(i, j)
    if i == 1:
        continue
    print('end', i)
";

        assert_eq!(
            run(source),
            vec!["0 0", "end 0", "1 0", "2 0", "end 2"]
        );
    }

    #[test]
    fn test_dict_iteration_and_methods() {
        let source = "\
d = {'b': 2, 'a': 1}
d['c'] = 3
print(d.keys(), d.get('z', 0), d['a'], len(d))
for k in d:
    print(k)
";

        assert_eq!(run(source), vec!["['a', 'b', 'c'] 0 1 3", "a", "b", "c"]);
    }

    // ───────────────────────── classes ─────────────────────────────

    #[test]
    fn test_instances_keep_separate_state() {
        let source = "\
class Counter:
    def __init__(self):
        self.count = 0
    def increment(self):
        self.count += 1
        return self.count
a = Counter()
b = Counter()
print(a.increment())
print(a.increment())
print(b.increment())
";

        assert_eq!(run(source), vec!["1", "2", "1"]);
    }

    #[test]
    fn test_inheritance_and_override() {
        let source = "\
class Animal:
    def __init__(self, name):
        self.name = name
    def speak(self):
        return self.name + ' makes a sound'
class Dog(Animal):
    def speak(self):
        return self.name + ' barks'
print(Dog('Rex').speak(), Animal('Cat').speak())
print(isinstance(Dog('a'), Animal), isinstance(Animal('b'), Dog))
";

        assert_eq!(
            run(source),
            vec!["Rex barks Cat makes a sound", "True False"]
        );
    }

    #[test]
    fn test_user_str_is_used_by_print() {
        let source = "\
class Point:
    def __init__(self, x, y):
        self.x = x
        self.y = y
    def __str__(self):
        return '({}, {})'.format(self.x, self.y)
print(Point(1, 2))
";

        assert_eq!(run(source), vec!["(1, 2)"]);
    }

    #[test]
    fn test_class_body_names_hidden_from_methods() {
        let source = "\
class A:
    x = 1
    def f(self):
        return x
    def g(self):
        return self.x
print(A().g())
A().f()
";

        let mut interpreter = Interpreter::new(source);
        interpreter.capture_output();

        match interpreter.run() {
            Err(TypthonError::Uncaught { kind, line, .. }) => {
                assert_eq!(kind, "NameError");
                assert_eq!(line, 4);
            }
            other => panic!("expected NameError, got {:?}", other),
        }
        assert_eq!(interpreter.take_output(), vec!["1"]);
    }

    #[test]
    fn test_methods_still_see_module_names() {
        let source = "\
y = 5
class A:
    y = 1
    def f(self):
        return y
print(A().f(), A.y)
";

        assert_eq!(run(source), vec!["5 1"]);
    }

    #[test]
    fn test_class_without_init_rejects_arguments() {
        assert_eq!(uncaught_kind("class E:\n    pass\nE(1)\n"), "TypeError");
    }

    // ───────────────────────── exceptions ──────────────────────────

    #[test]
    fn test_caught_exception_continues() {
        let source = "\
try:
    raise ValueError('bad')
    print('skipped')
except ValueError as e:
    print('caught', e)
print('after')
";

        assert_eq!(run(source), vec!["caught bad", "after"]);
    }

    #[test]
    fn test_runtime_errors_are_catchable() {
        let source = "\
try:
    x = [1, 2][5]
except IndexError as e:
    print(type(e).__name__, e)
try:
    1 / 0
except Exception as e:
    print('zero:', e)
";

        assert_eq!(
            run(source),
            vec!["IndexError list index out of range", "zero: division by zero"]
        );
    }

    #[test]
    fn test_handlers_match_in_order() {
        let source = "\
class AppError(Exception):
    pass
try:
    raise AppError('boom')
except ValueError:
    print('wrong handler')
except AppError as e:
    print('caught', e)
";

        assert_eq!(run(source), vec!["caught boom"]);
    }

    #[test]
    fn test_bare_raise_reraises() {
        let source = "\
try:
    try:
        raise KeyError('k')
    except KeyError:
        print('inner')
        raise
except KeyError as e:
    print('outer', e)
";

        assert_eq!(run(source), vec!["inner", "outer k"]);
    }

    #[test]
    fn test_finally_always_runs() {
        let source = "\
def f():
    try:
        return 'body'
    finally:
        print('cleanup')
print(f())
def g():
    try:
        raise ValueError('x')
    finally:
        return 'finally wins'
print(g())
";

        assert_eq!(run(source), vec!["cleanup", "body", "finally wins"]);
    }

    #[test]
    fn test_else_runs_only_without_exception() {
        let source = "\
for n in [1, 0]:
    try:
        r = 10 / n
    except ZeroDivisionError:
        print('zero')
    else:
        print('ok', r)
";

        assert_eq!(run(source), vec!["ok 10", "zero"]);
    }

    #[test]
    fn test_uncaught_exception_reports_line() {
        match run_err("x = 1\ny = undefined_name\n") {
            TypthonError::Uncaught {
                kind,
                message,
                line,
            } => {
                assert_eq!(kind, "NameError");
                assert_eq!(line, 2);
                assert!(message.contains("undefined_name"));
            }
            other => panic!("expected NameError, got {:?}", other),
        }

        match run_err("def f():\n    return 1 / 0\nf()\n") {
            TypthonError::Uncaught { kind, line, .. } => {
                assert_eq!(kind, "ZeroDivisionError");
                assert_eq!(line, 2);
            }
            other => panic!("expected ZeroDivisionError, got {:?}", other),
        }
    }

    #[test]
    fn test_assert_statement() {
        match run_err("assert 1 == 2, 'math broke'\n") {
            TypthonError::Uncaught { kind, message, .. } => {
                assert_eq!(kind, "AssertionError");
                assert_eq!(message, "math broke");
            }
            other => panic!("expected AssertionError, got {:?}", other),
        }
    }

    #[test]
    fn test_with_calls_enter_and_exit() {
        let source = "\
class Ctx:
    def __enter__(self):
        print('enter')
        return self
    def __exit__(self, kind, value, tb):
        print('exit', kind is None)
        return False
with Ctx() as c:
    print('body')
";

        assert_eq!(run(source), vec!["enter", "body", "exit True"]);
    }

    #[test]
    fn test_exit_can_suppress() {
        let source = "\
class Quiet:
    def __exit__(self, kind, value, tb):
        print('suppressing', value)
        return True
with Quiet():
    raise ValueError('noise')
print('still running')
";

        assert_eq!(run(source), vec!["suppressing noise", "still running"]);
    }

    // ───────────────────────── type annotations ────────────────────

    #[test]
    fn test_annotations_accept_matching_values() {
        let source = "\
x: int = 42
names: list[str] = ['a', 'b']
ages: dict[str, int] = {'a': 1}
flag: bool = True
print(x, names, ages, flag)
";

        assert_eq!(run(source), vec!["42 ['a', 'b'] {'a': 1} True"]);
    }

    #[test]
    fn test_annotation_mismatches_raise_type_error() {
        let cases = [
            "x: int = 'hello'\n",
            "x: int = 1\nx = 'a'\n",
            "def f(n: int) -> int:\n    return n\nf('a')\n",
            "def f() -> int:\n    return 'a'\nf()\n",
        ];

        for source in cases {
            assert_eq!(uncaught_kind(source), "TypeError", "for {:?}", source);
        }
    }

    #[test]
    fn test_type_checks_can_be_disabled() {
        let options = InterpreterOptions {
            check_types: false,
            ..InterpreterOptions::default()
        };
        let mut interpreter = Interpreter::with_options("x: int = 'hello'\nprint(x)\n", options);
        interpreter.capture_output();

        assert!(interpreter.run().is_ok());
        assert_eq!(interpreter.take_output(), vec!["hello"]);
    }

    // ───────────────────────── builtins ────────────────────────────

    #[test]
    fn test_conversion_builtins() {
        let output = run("print(len('hello'), len([1, 2]), str(3), int('42') + 1, float('2.5'), bool([]))\n");

        assert_eq!(output, vec!["5 2 3 43 2.5 False"]);
    }

    #[test]
    fn test_numeric_builtins() {
        let output = run(
            "print(sorted([3, 1, 2]), min(4, 2, 8), max([1, 9, 3]), sum([1, 2, 3]), abs(-4))\nprint(list(range(2, 10, 3)), round(2.5), round(3.14159, 2))\n",
        );

        assert_eq!(output, vec!["[1, 2, 3] 2 9 6 4", "[2, 5, 8] 2 3.14"]);
    }

    #[test]
    fn test_string_methods() {
        let output = run(
            "print('a,b,c'.split(','), '-'.join(['x', 'y']), '  hi '.strip().upper())\nprint('{} + {} = {:.1f}'.format(1, 2, 3))\n",
        );

        assert_eq!(output, vec!["['a', 'b', 'c'] x-y HI", "1 + 2 = 3.0"]);
    }

    #[test]
    fn test_list_methods() {
        let source = "\
xs = [3, 1]
xs.insert(0, 9)
xs.extend([7])
last = xs.pop()
xs.remove(1)
print(xs, last, xs.index(3))
";

        assert_eq!(run(source), vec!["[9, 3] 7 1"]);
    }

    #[test]
    fn test_yield_await_and_imports_are_inert() {
        let source = "\
import math
from os import path
def gen():
    yield 1
    return 2
print(gen())
await 5
print('ok')
";

        assert_eq!(run(source), vec!["2", "ok"]);
    }

    // ───────────────────────── static errors ───────────────────────

    #[test]
    fn test_static_errors_abort_before_execution() {
        let mut interpreter = Interpreter::new("print(1)\nreturn 5\n");
        interpreter.capture_output();

        assert!(matches!(
            interpreter.run(),
            Err(TypthonError::Resolve { .. })
        ));
        assert!(interpreter.take_output().is_empty());

        let mut interpreter = Interpreter::new("print('a')\nx = (\n");
        interpreter.capture_output();

        assert!(matches!(interpreter.run(), Err(TypthonError::Parse { .. })));
        assert!(interpreter.take_output().is_empty());
    }

    // ───────────────────────── embedding ───────────────────────────

    #[test]
    fn test_register_builtin() {
        let mut interpreter = Interpreter::new("print(double(21))\n");
        interpreter.capture_output();
        interpreter.register_builtin("double", Some(1), |_, args| {
            Ok(Value::Number(args[0].as_number().unwrap_or(0.0) * 2.0))
        });

        assert!(interpreter.run().is_ok());
        assert_eq!(interpreter.take_output(), vec!["42"]);
    }

    #[test]
    fn test_host_calls_into_script() {
        let mut interpreter =
            Interpreter::new("def square(x):\n    return x * x\nclass P:\n    pass\np = P()\n");
        interpreter.run().unwrap();

        let square = interpreter.globals().borrow().lookup("square").unwrap();
        let result = interpreter
            .call_function(&square, vec![Value::Number(7.0)])
            .unwrap();
        assert_eq!(result, Value::Number(49.0));

        let p = interpreter.globals().borrow().lookup("p").unwrap();
        assert!(interpreter.set_attribute(&p, "x", Value::Number(1.0)));
        assert_eq!(interpreter.get_attribute(&p, "x").unwrap(), Value::Number(1.0));
        assert!(!interpreter.set_attribute(&Value::Number(1.0), "x", Value::None));
        assert!(interpreter.get_attribute(&p, "missing").is_err());

        let statements = Parser::new("y = square(6) + 6\n").parse().unwrap();
        let globals = interpreter.globals();
        assert!(interpreter.execute_block(&statements, &globals).is_normal());
        assert_eq!(
            interpreter.globals().borrow().lookup("y"),
            Some(Value::Number(42.0))
        );
    }

    // ───────────────────────── self-reference and limits ─────────────

    #[test]
    fn test_self_referencing_containers_print() {
        let source = "\
a = [1]
a.append(a)
print(a)
print(a == a, len(a))
d = {}
d['self'] = d
print(d)
t = (a,)
print(t)
";

        assert_eq!(
            run(source),
            vec!["[1, [...]]", "True 2", "{'self': {...}}", "([1, [...]],)"]
        );
    }

    #[test]
    fn test_container_methods_given_their_own_container() {
        let source = "\
a = [[1]]
try:
    a.remove(a)
except ValueError:
    print('missing')
a.append(a)
a.remove(a)
print(len(a))
s = set()
s.add(s)
s.add(s)
print(len(s))
s.remove(s)
print(len(s))
b = [1, 2, 2]
b.remove(2)
print(b, b.index(2))
";

        assert_eq!(run(source), vec!["missing", "1", "1", "0", "[1, 2] 1"]);
    }

    #[test]
    fn test_oversized_repetition_raises_memory_error() {
        let source = "\
try:
    [1, 2] * 10 ** 19
except MemoryError:
    print('list')
try:
    'ab' * 10 ** 19
except MemoryError:
    print('text')
print([] * 10 ** 19, '' * 10 ** 19 == '', [0] * -3)
";

        assert_eq!(run(source), vec!["list", "text", "[] True []"]);
        assert_eq!(uncaught_kind("x = 'a' * 10 ** 12\n"), "MemoryError");
    }

    #[test]
    fn test_range_near_integer_limit() {
        let source = "\
print(len(range(0, 9223372036854775807, 9000000000000000000)))
print(range(0, -9000000000000000000, -5000000000000000000))
";

        assert_eq!(run(source), vec!["2", "[0, -5000000000000000000]"]);
    }
}
