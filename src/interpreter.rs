//! Tree‑walking evaluator.
//!
//! Statements produce an [`ExecutionResult`]; expressions produce an
//! [`Eval<Value>`]. A runtime error raised while evaluating an expression
//! travels as `Err(Exception)` until the enclosing statement boundary, where
//! [`Interpreter::execute`] folds it into `ExecutionResult::Exception`. Blocks
//! stop at the first non‑`Normal` result, loops consume `Break`/`Continue`,
//! calls consume `Return`.
//!
//! # Public API
//!
//! - `Interpreter::new(source)` / `Interpreter::with_options(source, options)`
//! - `run()` parses, checks and executes the program once.
//! - `capture_output()` / `take_output()` redirect `print` into a buffer.
//! - `register_builtin(name, arity, fn)` adds host functions before `run()`.
//! - `call_function`, `get_attribute`, `set_attribute`, `execute_block`,
//!   `globals()` for embedding.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use log::{debug, info};

use crate::ast::{ExceptHandler, Expr, LiteralValue, Stmt, StmtKind, Target};
use crate::builtins;
use crate::environment::Environment;
use crate::error::{Result, TypthonError};
use crate::exception::{ErrorKind, Eval, Exception, MAX_SEQUENCE_LEN};
use crate::parser::Parser;
use crate::resolver::Resolver;
use crate::types::Type;
use crate::value::{ClassObject, FunctionObject, InstanceObject, Value};

/// Outcome of executing one statement or block. At most one intent is
/// active at a time.
#[derive(Debug, Clone)]
pub enum ExecutionResult {
    Normal,
    Return(Value),
    Break,
    Continue,
    Exception(Exception),
}

impl ExecutionResult {
    #[inline]
    pub fn is_normal(&self) -> bool {
        matches!(self, ExecutionResult::Normal)
    }
}

#[derive(Debug, Clone)]
pub struct InterpreterOptions {
    /// Nested user calls allowed before `RecursionError`.
    pub max_call_depth: usize,

    /// Check annotated parameters, returns and assignments at runtime.
    pub check_types: bool,
}

impl Default for InterpreterOptions {
    fn default() -> Self {
        Self {
            max_call_depth: 100,
            check_types: true,
        }
    }
}

/// Where `print` writes.
#[derive(Debug)]
pub enum Output {
    Stdout,
    Captured(Vec<String>),
}

pub struct Interpreter {
    source: String,
    globals: Rc<RefCell<Environment>>,
    program: Option<Rc<Vec<Stmt>>>,
    output: Output,
    options: InterpreterOptions,
    exception_classes: HashMap<String, Rc<ClassObject>>,
    depth: usize,
    /// Exceptions whose `except` clause is running; a bare `raise` re‑raises the top.
    handling: Vec<Exception>,
}

impl Interpreter {
    pub fn new<S: Into<String>>(source: S) -> Self {
        Self::with_options(source, InterpreterOptions::default())
    }

    pub fn with_options<S: Into<String>>(source: S, options: InterpreterOptions) -> Self {
        info!("Initializing Interpreter with {:?}", options);

        let mut interpreter = Self {
            source: source.into(),
            globals: Environment::new().into_shared(),
            program: None,
            output: Output::Stdout,
            options,
            exception_classes: HashMap::new(),
            depth: 0,
            handling: Vec::new(),
        };

        builtins::install(&mut interpreter);

        interpreter
    }

    // ───────────────────────── host surface ─────────────────────────

    pub fn options(&self) -> &InterpreterOptions {
        &self.options
    }

    pub fn globals(&self) -> Rc<RefCell<Environment>> {
        self.globals.clone()
    }

    /// Collect printed lines instead of writing them to stdout.
    pub fn capture_output(&mut self) {
        self.output = Output::Captured(Vec::new());
    }

    /// Drains captured lines. Empty when printing to stdout.
    pub fn take_output(&mut self) -> Vec<String> {
        match &mut self.output {
            Output::Captured(lines) => std::mem::take(lines),
            Output::Stdout => Vec::new(),
        }
    }

    pub fn write_line(&mut self, line: String) {
        match &mut self.output {
            Output::Stdout => println!("{}", line),
            Output::Captured(lines) => lines.push(line),
        }
    }

    /// Binds a host function in the global scope. `arity` of `None` accepts
    /// any number of arguments.
    pub fn register_builtin<S, F>(&mut self, name: S, arity: Option<usize>, func: F)
    where
        S: Into<String>,
        F: Fn(&mut Interpreter, Vec<Value>) -> Eval<Value> + 'static,
    {
        let name: String = name.into();
        debug!("Registering builtin '{}'", name);

        let value = Value::native(name.clone(), arity, func);
        self.globals.borrow_mut().define(&name, value);
    }

    pub(crate) fn register_exception_class(&mut self, class: Rc<ClassObject>) {
        self.globals
            .borrow_mut()
            .define(&class.name, Value::Class(class.clone()));
        self.exception_classes.insert(class.name.clone(), class);
    }

    /// Parses and checks the program on first use, then executes it in the
    /// global environment.
    pub fn run(&mut self) -> Result<()> {
        info!("Running program");

        let program = match self.program.clone() {
            Some(program) => program,
            None => {
                let statements = Parser::new(&self.source).parse()?;
                Resolver::new().resolve(&statements)?;

                let program = Rc::new(statements);
                self.program = Some(program.clone());
                program
            }
        };

        let globals = self.globals.clone();

        match self.execute_block(&program, &globals) {
            ExecutionResult::Exception(exception) => {
                info!("Uncaught exception: {}", exception);

                Err(TypthonError::Uncaught {
                    kind: exception.kind,
                    message: exception.message,
                    line: exception.line.unwrap_or(0),
                })
            }

            _ => {
                info!("Program executed successfully");
                Ok(())
            }
        }
    }

    // ───────────────────────── statements ───────────────────────────

    /// Runs statements in order, stopping at the first non‑`Normal` result.
    pub fn execute_block(
        &mut self,
        statements: &[Stmt],
        env: &Rc<RefCell<Environment>>,
    ) -> ExecutionResult {
        for stmt in statements {
            let result = self.execute(stmt, env);

            if !result.is_normal() {
                return result;
            }
        }

        ExecutionResult::Normal
    }

    /// Executes one statement; runtime errors surface as
    /// `ExecutionResult::Exception` tagged with the statement's line.
    pub fn execute(&mut self, stmt: &Stmt, env: &Rc<RefCell<Environment>>) -> ExecutionResult {
        debug!("Executing statement on line {}", stmt.line);

        match self.execute_statement(stmt, env) {
            Ok(ExecutionResult::Exception(exception)) | Err(exception) => {
                ExecutionResult::Exception(exception.at_line(stmt.line))
            }
            Ok(result) => result,
        }
    }

    fn execute_statement(
        &mut self,
        stmt: &Stmt,
        env: &Rc<RefCell<Environment>>,
    ) -> Eval<ExecutionResult> {
        match &stmt.kind {
            StmtKind::Expression(expr) => {
                self.evaluate(expr, env)?;
            }

            StmtKind::Assign { targets, value } => {
                let value = self.evaluate(value, env)?;

                for target in targets {
                    self.bind_target(target, value.clone(), env)?;
                }
            }

            StmtKind::AugAssign {
                target,
                operator,
                value,
            } => self.augmented_assign(target, operator, value, env)?,

            StmtKind::AnnAssign {
                name,
                annotation,
                value,
            } => {
                env.borrow_mut().declare_type(name, annotation.clone());

                if let Some(value) = value {
                    let value = self.evaluate(value, env)?;
                    self.assign_name(name, value, env)?;
                }
            }

            StmtKind::Return(value) => {
                let value = match value {
                    Some(expr) => self.evaluate(expr, env)?,
                    None => Value::None,
                };
                return Ok(ExecutionResult::Return(value));
            }

            StmtKind::Break => return Ok(ExecutionResult::Break),

            StmtKind::Continue => return Ok(ExecutionResult::Continue),

            StmtKind::Pass => {}

            StmtKind::If {
                branches,
                else_branch,
            } => {
                for (condition, body) in branches {
                    if self.evaluate(condition, env)?.is_truthy() {
                        return Ok(self.execute_block(body, env));
                    }
                }

                if let Some(body) = else_branch {
                    return Ok(self.execute_block(body, env));
                }
            }

            StmtKind::While { condition, body } => {
                while self.evaluate(condition, env)?.is_truthy() {
                    match self.execute_block(body, env) {
                        ExecutionResult::Break => break,
                        ExecutionResult::Normal | ExecutionResult::Continue => {}
                        other => return Ok(other),
                    }
                }
            }

            StmtKind::For {
                target,
                iterable,
                body,
            } => {
                let items = self.evaluate(iterable, env)?.iter_values()?;

                for item in items {
                    self.bind_target(target, item, env)?;

                    match self.execute_block(body, env) {
                        ExecutionResult::Break => break,
                        ExecutionResult::Normal | ExecutionResult::Continue => {}
                        other => return Ok(other),
                    }
                }
            }

            StmtKind::Try {
                body,
                handlers,
                else_branch,
                finally,
            } => {
                return Ok(self.execute_try(
                    body,
                    handlers,
                    else_branch.as_deref(),
                    finally.as_deref(),
                    env,
                ))
            }

            StmtKind::With {
                context,
                alias,
                body,
            } => return self.execute_with(context, alias.as_deref(), body, env),

            StmtKind::Import(names) => {
                for name in names {
                    info!("Ignoring import of '{}'", name.path);
                }
            }

            StmtKind::FromImport { module, names } => {
                info!(
                    "Ignoring import of {} name(s) from '{}'",
                    names.len(),
                    module
                );
            }

            StmtKind::Raise(value) => return Err(self.raise(value.as_ref(), env)?),

            StmtKind::Assert { test, message } => {
                if !self.evaluate(test, env)?.is_truthy() {
                    let message = match message {
                        Some(message) => {
                            let value = self.evaluate(message, env)?;
                            self.display(&value)?
                        }
                        None => String::new(),
                    };
                    return Err(Exception::new(ErrorKind::AssertionError, message));
                }
            }

            StmtKind::Yield(value) => {
                if let Some(value) = value {
                    let value = self.evaluate(value, env)?;
                    debug!("yield {} has no consumer", value.repr());
                }
            }

            StmtKind::Await(value) => {
                let value = self.evaluate(value, env)?;
                debug!("await {} completes immediately", value.repr());
            }

            StmtKind::Global(names) => {
                for name in names {
                    env.borrow_mut().declare_global(name);
                }
            }

            StmtKind::Nonlocal(names) => {
                for name in names {
                    env.borrow_mut().declare_nonlocal(name)?;
                }
            }

            StmtKind::FunctionDef(decl) => {
                debug!("Defining function '{}'", decl.name);

                let function = Value::Function(Rc::new(FunctionObject {
                    decl: decl.clone(),
                    closure: env.clone(),
                }));
                env.borrow_mut().assign(&decl.name, function)?;
            }

            StmtKind::Class { name, bases, body } => {
                let class = self.create_class(name, bases, body, env)?;
                env.borrow_mut().assign(name, class)?;
            }
        }

        Ok(ExecutionResult::Normal)
    }

    fn execute_try(
        &mut self,
        body: &[Stmt],
        handlers: &[ExceptHandler],
        else_branch: Option<&[Stmt]>,
        finally: Option<&[Stmt]>,
        env: &Rc<RefCell<Environment>>,
    ) -> ExecutionResult {
        let mut result = match self.execute_block(body, env) {
            ExecutionResult::Exception(exception) => self.handle(exception, handlers, env),

            ExecutionResult::Normal => match else_branch {
                Some(else_branch) => self.execute_block(else_branch, env),
                None => ExecutionResult::Normal,
            },

            other => other,
        };

        if let Some(finally) = finally {
            let outcome = self.execute_block(finally, env);

            if !outcome.is_normal() {
                debug!("finally overrides pending {:?}", result);
                result = outcome;
            }
        }

        result
    }

    /// Runs the first matching handler, or hands the exception back.
    fn handle(
        &mut self,
        exception: Exception,
        handlers: &[ExceptHandler],
        env: &Rc<RefCell<Environment>>,
    ) -> ExecutionResult {
        for handler in handlers {
            let matched = match &handler.kind {
                None => true,
                Some(kind) => match self.matches_handler(&exception, kind, env) {
                    Ok(matched) => matched,
                    Err(error) => {
                        return ExecutionResult::Exception(error.at_line(handler.line))
                    }
                },
            };

            if !matched {
                continue;
            }

            debug!("Handling {} on line {}", exception, handler.line);

            if let Some(name) = &handler.name {
                let value = self.exception_value(&exception);

                if let Err(error) = env.borrow_mut().assign(name, value) {
                    return ExecutionResult::Exception(error.at_line(handler.line));
                }
            }

            self.handling.push(exception);
            let result = self.execute_block(&handler.body, env);
            self.handling.pop();

            return result;
        }

        ExecutionResult::Exception(exception)
    }

    fn matches_handler(
        &mut self,
        exception: &Exception,
        kind: &Expr,
        env: &Rc<RefCell<Environment>>,
    ) -> Eval<bool> {
        match self.evaluate(kind, env)? {
            Value::Class(class) => Ok(exception.is_instance_of(&class)),

            Value::Tuple(classes) => Ok(classes.iter().any(|class| match class {
                Value::Class(class) => exception.is_instance_of(class),
                _ => false,
            })),

            other => Err(Exception::type_error(format!(
                "catching '{}' is not allowed, expected an exception class",
                other.type_name()
            ))),
        }
    }

    fn execute_with(
        &mut self,
        context: &Expr,
        alias: Option<&str>,
        body: &[Stmt],
        env: &Rc<RefCell<Environment>>,
    ) -> Eval<ExecutionResult> {
        let manager = self.evaluate(context, env)?;

        let entered = if has_method(&manager, "__enter__") {
            self.call_method(&manager, "__enter__", Vec::new())?
        } else {
            manager.clone()
        };

        if let Some(alias) = alias {
            self.assign_name(alias, entered, env)?;
        }

        let result = self.execute_block(body, env);

        if !has_method(&manager, "__exit__") {
            return Ok(result);
        }

        let exit_args = match &result {
            ExecutionResult::Exception(exception) => vec![
                self.exception_class_value(exception),
                self.exception_value(exception),
                Value::None,
            ],
            _ => vec![Value::None, Value::None, Value::None],
        };

        let suppress = self.call_method(&manager, "__exit__", exit_args)?.is_truthy();

        match result {
            ExecutionResult::Exception(exception) if suppress => {
                debug!("__exit__ suppressed {}", exception);
                Ok(ExecutionResult::Normal)
            }
            other => Ok(other),
        }
    }

    /// Builds the exception a `raise` statement throws.
    fn raise(&mut self, value: Option<&Expr>, env: &Rc<RefCell<Environment>>) -> Eval<Exception> {
        let Some(expr) = value else {
            return match self.handling.last() {
                Some(exception) => Ok(exception.clone()),
                None => Err(Exception::new(
                    ErrorKind::RuntimeError,
                    "No active exception to reraise",
                )),
            };
        };

        let exception = match self.evaluate(expr, env)? {
            instance @ Value::Instance(_) => Exception::from_value(instance),

            Value::Class(class) => {
                let instance = self.instantiate(&class, Vec::new())?;
                Exception::from_value(instance)
            }

            other => Exception::new(ErrorKind::Exception, self.display(&other)?),
        };

        debug!("Raising {}", exception);

        Ok(exception)
    }

    fn create_class(
        &mut self,
        name: &str,
        bases: &[Expr],
        body: &[Stmt],
        env: &Rc<RefCell<Environment>>,
    ) -> Eval<Value> {
        debug!("Creating class '{}'", name);

        let mut class = ClassObject::new(name);

        for base in bases {
            match self.evaluate(base, env)? {
                Value::Class(base) => {
                    class
                        .methods
                        .extend(base.methods.iter().map(|(k, v)| (k.clone(), v.clone())));
                    class.lineage.push(base.name.clone());
                    class.lineage.extend(base.lineage.iter().cloned());
                }
                other => {
                    return Err(Exception::type_error(format!(
                        "base of class '{}' must be a class, not '{}'",
                        name,
                        other.type_name()
                    )))
                }
            }
        }

        let scope = Environment::with_enclosing(env.clone()).into_shared();

        match self.execute_block(body, &scope) {
            ExecutionResult::Exception(exception) => return Err(exception),
            ExecutionResult::Normal => {}
            other => debug!("class body of '{}' ended with {:?}", name, other),
        }

        // Class-body names are not visible from method bodies: functions
        // defined in the body close over the scope around the class.
        let members = scope.borrow().bindings();
        class.methods.extend(members.into_iter().map(|(member, value)| match value {
            Value::Function(function) if Rc::ptr_eq(&function.closure, &scope) => {
                let rebound = FunctionObject {
                    decl: function.decl.clone(),
                    closure: env.clone(),
                };
                (member, Value::Function(Rc::new(rebound)))
            }
            other => (member, other),
        }));

        info!(
            "Class '{}' created with {} member(s), lineage {:?}",
            name,
            class.methods.len(),
            class.lineage
        );

        Ok(Value::Class(Rc::new(class)))
    }

    // ───────────────────────── binding ──────────────────────────────

    /// Writes a name through the scope rules, enforcing any annotation.
    fn assign_name(&mut self, name: &str, value: Value, env: &Rc<RefCell<Environment>>) -> Eval<()> {
        if self.options.check_types {
            let declared = env.borrow().declared_type(name);

            if let Some(ty) = declared {
                if !ty.accepts(&value) {
                    return Err(Exception::type_error(format!(
                        "cannot assign {} to '{}' declared as {}",
                        value.type_name(),
                        name,
                        ty
                    )));
                }
            }
        }

        env.borrow_mut().assign(name, value)
    }

    fn bind_target(
        &mut self,
        target: &Target,
        value: Value,
        env: &Rc<RefCell<Environment>>,
    ) -> Eval<()> {
        match target {
            Target::Name(name) => self.assign_name(name, value, env),

            Target::Attribute { object, name } => {
                let object = self.evaluate(object, env)?;
                self.store_attribute(&object, name, value)
            }

            Target::Index { object, index } => {
                let object = self.evaluate(object, env)?;
                let index = self.evaluate(index, env)?;
                set_index(&object, &index, value)
            }

            Target::Tuple(targets) => {
                let items = match &value {
                    Value::List(items) => items.borrow().clone(),
                    Value::Tuple(items) => items.as_ref().clone(),
                    other => {
                        return Err(Exception::type_error(format!(
                            "cannot unpack non-sequence {}",
                            other.type_name()
                        )))
                    }
                };

                if items.len() < targets.len() {
                    return Err(Exception::value_error(format!(
                        "not enough values to unpack (expected {}, got {})",
                        targets.len(),
                        items.len()
                    )));
                }

                if items.len() > targets.len() {
                    return Err(Exception::value_error(format!(
                        "too many values to unpack (expected {})",
                        targets.len()
                    )));
                }

                for (target, item) in targets.iter().zip(items) {
                    self.bind_target(target, item, env)?;
                }

                Ok(())
            }
        }
    }

    fn augmented_assign(
        &mut self,
        target: &Target,
        operator: &str,
        value: &Expr,
        env: &Rc<RefCell<Environment>>,
    ) -> Eval<()> {
        match target {
            Target::Name(name) => {
                let current = env.borrow().get(name)?;
                let operand = self.evaluate(value, env)?;
                let result = augment(operator, current, operand)?;
                self.assign_name(name, result, env)
            }

            Target::Attribute { object, name } => {
                let object = self.evaluate(object, env)?;
                let current = self.get_attribute(&object, name)?;
                let operand = self.evaluate(value, env)?;
                let result = augment(operator, current, operand)?;
                self.store_attribute(&object, name, result)
            }

            Target::Index { object, index } => {
                let object = self.evaluate(object, env)?;
                let index = self.evaluate(index, env)?;
                let current = get_index(&object, &index)?;
                let operand = self.evaluate(value, env)?;
                let result = augment(operator, current, operand)?;
                set_index(&object, &index, result)
            }

            Target::Tuple(_) => Err(Exception::type_error(
                "illegal target for augmented assignment",
            )),
        }
    }

    fn store_attribute(&mut self, object: &Value, name: &str, value: Value) -> Eval<()> {
        if self.set_attribute(object, name, value) {
            return Ok(());
        }

        Err(Exception::attribute_error(format!(
            "'{}' object attribute '{}' is read-only",
            object.type_name(),
            name
        )))
    }

    // ───────────────────────── expressions ──────────────────────────

    pub fn evaluate(&mut self, expr: &Expr, env: &Rc<RefCell<Environment>>) -> Eval<Value> {
        match expr {
            Expr::Literal(literal) => Ok(match literal {
                LiteralValue::Number(n) => Value::Number(*n),
                LiteralValue::Str(s) => Value::text(s.as_str()),
                LiteralValue::True => Value::Bool(true),
                LiteralValue::False => Value::Bool(false),
                LiteralValue::None => Value::None,
            }),

            Expr::Variable(name) => env.borrow().get(name),

            Expr::Unary { operator, operand } => {
                let operand = self.evaluate(operand, env)?;
                unary(operator, operand)
            }

            Expr::Binary {
                left,
                operator,
                right,
            } => match operator.as_str() {
                "and" => {
                    let left = self.evaluate(left, env)?;
                    if !left.is_truthy() {
                        return Ok(left);
                    }
                    self.evaluate(right, env)
                }

                "or" => {
                    let left = self.evaluate(left, env)?;
                    if left.is_truthy() {
                        return Ok(left);
                    }
                    self.evaluate(right, env)
                }

                _ => {
                    let left = self.evaluate(left, env)?;
                    let right = self.evaluate(right, env)?;
                    binary(operator, left, right)
                }
            },

            Expr::Conditional {
                condition,
                then,
                otherwise,
            } => {
                if self.evaluate(condition, env)?.is_truthy() {
                    self.evaluate(then, env)
                } else {
                    self.evaluate(otherwise, env)
                }
            }

            Expr::Call { callee, arguments } => {
                let callee = self.evaluate(callee, env)?;

                let mut args: Vec<Value> = Vec::with_capacity(arguments.len());
                for argument in arguments {
                    args.push(self.evaluate(argument, env)?);
                }

                self.call_function(&callee, args)
            }

            Expr::Attribute { object, name } => {
                let object = self.evaluate(object, env)?;
                self.get_attribute(&object, name)
            }

            Expr::Index { object, index } => {
                let object = self.evaluate(object, env)?;
                let index = self.evaluate(index, env)?;
                get_index(&object, &index)
            }

            Expr::List(items) => Ok(Value::list(self.evaluate_all(items, env)?)),

            Expr::Tuple(items) => Ok(Value::tuple(self.evaluate_all(items, env)?)),

            Expr::Set(items) => Ok(Value::set(self.evaluate_all(items, env)?)),

            Expr::Dict(entries) => {
                let mut map: BTreeMap<String, Value> = BTreeMap::new();

                for (key, value) in entries {
                    let key = self.evaluate(key, env)?.to_key()?;
                    let value = self.evaluate(value, env)?;
                    map.insert(key, value);
                }

                Ok(Value::dict(map))
            }

            Expr::Lambda(decl) => Ok(Value::Function(Rc::new(FunctionObject {
                decl: decl.clone(),
                closure: env.clone(),
            }))),
        }
    }

    fn evaluate_all(&mut self, exprs: &[Expr], env: &Rc<RefCell<Environment>>) -> Eval<Vec<Value>> {
        let mut values: Vec<Value> = Vec::with_capacity(exprs.len());

        for expr in exprs {
            values.push(self.evaluate(expr, env)?);
        }

        Ok(values)
    }

    // ───────────────────────── calls ────────────────────────────────

    /// Invokes any callable value with positional arguments.
    pub fn call_function(&mut self, callee: &Value, args: Vec<Value>) -> Eval<Value> {
        match callee {
            Value::Function(function) => self.call_user_function(function, args),

            Value::Builtin(native) => {
                if let Some(arity) = native.arity {
                    if args.len() != arity {
                        return Err(Exception::type_error(format!(
                            "{}() takes {} argument(s) but {} were given",
                            native.name,
                            arity,
                            args.len()
                        )));
                    }
                }

                debug!("Calling builtin '{}'", native.name);

                let func = native.func.clone();
                func(self, args)
            }

            Value::Method(method) => {
                let mut full: Vec<Value> = Vec::with_capacity(args.len() + 1);
                full.push(method.receiver.clone());
                full.extend(args);

                self.call_function(&method.callable, full)
            }

            Value::Class(class) => self.instantiate(class, args),

            other => Err(Exception::type_error(format!(
                "'{}' object is not callable",
                other.type_name()
            ))),
        }
    }

    fn call_user_function(&mut self, function: &Rc<FunctionObject>, args: Vec<Value>) -> Eval<Value> {
        let decl = function.decl.clone();

        if args.len() != decl.params.len() {
            return Err(Exception::type_error(format!(
                "{}() takes {} positional argument(s) but {} were given",
                decl.name,
                decl.params.len(),
                args.len()
            )));
        }

        if self.depth >= self.options.max_call_depth {
            return Err(Exception::new(
                ErrorKind::RecursionError,
                "maximum recursion depth exceeded",
            ));
        }

        debug!("Calling function '{}' with {} argument(s)", decl.name, args.len());

        let mut scope = Environment::with_enclosing(function.closure.clone());

        for ((param, ty), arg) in decl.params.iter().zip(&decl.param_types).zip(args) {
            if *ty != Type::Any {
                if self.options.check_types && !ty.accepts(&arg) {
                    return Err(Exception::type_error(format!(
                        "argument '{}' of {}() expected {}, got {}",
                        param,
                        decl.name,
                        ty,
                        arg.type_name()
                    )));
                }
                scope.declare_type(param, ty.clone());
            }
            scope.define(param, arg);
        }

        let scope = scope.into_shared();

        self.depth += 1;
        let result = self.execute_block(&decl.body, &scope);
        self.depth -= 1;

        let value = match result {
            ExecutionResult::Return(value) => value,
            ExecutionResult::Exception(exception) => return Err(exception),
            ExecutionResult::Normal | ExecutionResult::Break | ExecutionResult::Continue => {
                Value::None
            }
        };

        if self.options.check_types && !decl.return_type.accepts(&value) {
            return Err(Exception::type_error(format!(
                "{}() should return {}, got {}",
                decl.name,
                decl.return_type,
                value.type_name()
            )));
        }

        Ok(value)
    }

    /// Constructs an instance and runs `__init__` when the class has one.
    pub fn instantiate(&mut self, class: &Rc<ClassObject>, args: Vec<Value>) -> Eval<Value> {
        let instance = Value::Instance(Rc::new(InstanceObject::new(class.clone())));

        match class.find_method("__init__") {
            Some(init) => {
                let mut full: Vec<Value> = Vec::with_capacity(args.len() + 1);
                full.push(instance.clone());
                full.extend(args);

                self.call_function(&init, full)?;
            }

            None if !args.is_empty() => {
                return Err(Exception::type_error(format!(
                    "{}() takes no arguments",
                    class.name
                )))
            }

            None => {}
        }

        Ok(instance)
    }

    pub fn call_method(&mut self, receiver: &Value, name: &str, args: Vec<Value>) -> Eval<Value> {
        let method = self.get_attribute(receiver, name)?;
        self.call_function(&method, args)
    }

    // ───────────────────────── attributes ───────────────────────────

    /// Instance fields first, then class members (functions come back
    /// bound); lists, dicts, sets and text expose builtin methods.
    pub fn get_attribute(&self, base: &Value, name: &str) -> Eval<Value> {
        match base {
            Value::Instance(instance) => {
                if let Some(value) = instance.field(name) {
                    return Ok(value);
                }

                if let Some(member) = instance.class.find_method(name) {
                    return Ok(match member {
                        Value::Function(_) | Value::Builtin(_) => Value::bind(base.clone(), member),
                        other => other,
                    });
                }

                if name == "__class__" {
                    return Ok(Value::Class(instance.class.clone()));
                }
            }

            Value::Class(class) => {
                if let Some(member) = class.find_method(name) {
                    return Ok(member);
                }

                if name == "__name__" {
                    return Ok(Value::text(class.name.as_str()));
                }
            }

            _ => {
                if let Some(method) = builtins::method(base, name) {
                    return Ok(method);
                }
            }
        }

        Err(Exception::attribute_error(format!(
            "'{}' object has no attribute '{}'",
            base.type_name(),
            name
        )))
    }

    /// Writes an instance field. Any other base is rejected with `false`.
    pub fn set_attribute(&mut self, base: &Value, name: &str, value: Value) -> bool {
        match base {
            Value::Instance(instance) => {
                instance.set_field(name, value);
                true
            }
            _ => false,
        }
    }

    /// `str(value)`, honouring a user `__str__`.
    pub fn display(&mut self, value: &Value) -> Eval<String> {
        if has_method(value, "__str__") {
            return Ok(self.call_method(value, "__str__", Vec::new())?.to_string());
        }

        Ok(value.to_string())
    }

    // ───────────────────────── exceptions ───────────────────────────

    /// The script object bound by `except ... as name`. Errors raised by the
    /// interpreter itself get an instance of their builtin class.
    fn exception_value(&self, exception: &Exception) -> Value {
        if let Some(value) = &exception.value {
            return value.clone();
        }

        let class = match self.exception_classes.get(&exception.kind) {
            Some(class) => class.clone(),
            None => {
                let mut class = ClassObject::new(exception.kind.as_str());
                class.lineage.push(ErrorKind::Exception.name().to_string());
                Rc::new(class)
            }
        };

        let instance = InstanceObject::new(class);
        instance.set_field("message", Value::text(exception.message.as_str()));
        instance.set_field(
            "args",
            Value::tuple(vec![Value::text(exception.message.as_str())]),
        );

        Value::Instance(Rc::new(instance))
    }

    fn exception_class_value(&self, exception: &Exception) -> Value {
        match &exception.value {
            Some(Value::Instance(instance)) => Value::Class(instance.class.clone()),
            _ => self
                .exception_classes
                .get(&exception.kind)
                .map(|class| Value::Class(class.clone()))
                .unwrap_or(Value::None),
        }
    }
}

// ───────────────────────── operators ───────────────────────────────

#[inline(always)]
fn has_method(value: &Value, name: &str) -> bool {
    match value {
        Value::Instance(instance) => instance.class.find_method(name).is_some(),
        _ => false,
    }
}

fn unary(operator: &str, operand: Value) -> Eval<Value> {
    match operator {
        "not" => Ok(Value::Bool(!operand.is_truthy())),

        "-" | "+" => match operand.as_number() {
            Some(n) if operator == "-" => Ok(Value::Number(-n)),
            Some(n) => Ok(Value::Number(n)),
            None => Err(Exception::type_error(format!(
                "bad operand type for unary {}: '{}'",
                operator,
                operand.type_name()
            ))),
        },

        _ => Err(Exception::type_error(format!(
            "unknown unary operator '{}'",
            operator
        ))),
    }
}

/// `+=` on a list extends it in place, so aliases observe the change.
fn augment(operator: &str, current: Value, operand: Value) -> Eval<Value> {
    if operator == "+" {
        if let Value::List(items) = &current {
            let extra = match &operand {
                Value::List(other) => Some(other.borrow().clone()),
                Value::Tuple(other) => Some(other.as_ref().clone()),
                _ => None,
            };

            if let Some(extra) = extra {
                items.borrow_mut().extend(extra);
                return Ok(current);
            }
        }
    }

    binary(operator, current, operand)
}

pub fn binary(operator: &str, left: Value, right: Value) -> Eval<Value> {
    match operator {
        "==" => return Ok(Value::Bool(left.equals(&right))),
        "!=" => return Ok(Value::Bool(!left.equals(&right))),
        "is" => return Ok(Value::Bool(left.is_same(&right))),
        "is not" => return Ok(Value::Bool(!left.is_same(&right))),
        "in" => return contains(&right, &left).map(Value::Bool),
        "not in" => return contains(&right, &left).map(|found| Value::Bool(!found)),
        "<" | "<=" | ">" | ">=" => {
            let ordering = left.compare(&right).map_err(|_| {
                Exception::type_error(format!(
                    "'{}' not supported between instances of '{}' and '{}'",
                    operator,
                    left.type_name(),
                    right.type_name()
                ))
            })?;

            return Ok(Value::Bool(match operator {
                "<" => ordering.is_lt(),
                "<=" => ordering.is_le(),
                ">" => ordering.is_gt(),
                _ => ordering.is_ge(),
            }));
        }
        _ => {}
    }

    if let (Some(a), Some(b)) = (left.as_number(), right.as_number()) {
        return arithmetic(operator, a, b);
    }

    match (operator, &left, &right) {
        ("+", Value::Text(a), Value::Text(b)) => Ok(Value::text(format!("{}{}", a, b))),

        ("+", Value::List(a), Value::List(b)) => {
            let mut items = a.borrow().clone();
            items.extend(b.borrow().iter().cloned());
            Ok(Value::list(items))
        }

        ("+", Value::Tuple(a), Value::Tuple(b)) => {
            let mut items = a.as_ref().clone();
            items.extend(b.iter().cloned());
            Ok(Value::tuple(items))
        }

        ("*", Value::Text(s), count) | ("*", count, Value::Text(s)) if count.as_number().is_some() => {
            let times = repeat_count(s.len(), count)?;
            Ok(Value::text(s.repeat(times)))
        }

        ("*", Value::List(items), count) | ("*", count, Value::List(items))
            if count.as_number().is_some() =>
        {
            let items = items.borrow();
            let times = repeat_count(items.len(), count)?;
            let mut repeated: Vec<Value> = Vec::with_capacity(items.len() * times);
            for _ in 0..times {
                repeated.extend(items.iter().cloned());
            }
            Ok(Value::list(repeated))
        }

        _ => Err(Exception::type_error(format!(
            "unsupported operand type(s) for {}: '{}' and '{}'",
            operator,
            left.type_name(),
            right.type_name()
        ))),
    }
}

/// Number of copies for `seq * count`. Negative counts give zero copies;
/// a result longer than `MAX_SEQUENCE_LEN` raises MemoryError.
fn repeat_count(len: usize, count: &Value) -> Eval<usize> {
    let times = count
        .as_number()
        .map_or(0, |n| if n > 0.0 { n as usize } else { 0 });

    if len == 0 {
        return Ok(0);
    }

    match len.checked_mul(times) {
        Some(total) if total <= MAX_SEQUENCE_LEN => Ok(times),
        _ => Err(Exception::memory_error("repeated sequence is too large")),
    }
}

fn arithmetic(operator: &str, a: f64, b: f64) -> Eval<Value> {
    let result = match operator {
        "+" => a + b,
        "-" => a - b,
        "*" => a * b,
        "**" => a.powf(b),

        "/" => {
            if b == 0.0 {
                return Err(Exception::zero_division("division by zero"));
            }
            a / b
        }

        "//" => {
            if b == 0.0 {
                return Err(Exception::zero_division(
                    "integer division or modulo by zero",
                ));
            }
            (a / b).floor()
        }

        "%" => {
            if b == 0.0 {
                return Err(Exception::zero_division("integer modulo by zero"));
            }
            let r = a % b;
            // result takes the sign of the divisor
            if r != 0.0 && (r < 0.0) != (b < 0.0) {
                r + b
            } else {
                r
            }
        }

        _ => {
            return Err(Exception::type_error(format!(
                "unsupported operand type(s) for {}: 'int' and 'int'",
                operator
            )))
        }
    };

    Ok(Value::Number(result))
}

fn contains(container: &Value, item: &Value) -> Eval<bool> {
    match container {
        Value::List(items) | Value::Set(items) => Ok(items.borrow().iter().any(|x| x.equals(item))),

        Value::Tuple(items) => Ok(items.iter().any(|x| x.equals(item))),

        Value::Dict(entries) => Ok(entries.borrow().contains_key(&item.to_key()?)),

        Value::Text(haystack) => match item {
            Value::Text(needle) => Ok(haystack.contains(needle.as_str())),
            other => Err(Exception::type_error(format!(
                "'in <string>' requires string as left operand, not {}",
                other.type_name()
            ))),
        },

        other => Err(Exception::type_error(format!(
            "argument of type '{}' is not iterable",
            other.type_name()
        ))),
    }
}

// ───────────────────────── indexing ────────────────────────────────

/// Resolves a possibly negative index against `len`.
fn normalize_index(index: &Value, len: usize, kind: &str) -> Eval<usize> {
    let n = match index {
        Value::Number(n) if n.fract() == 0.0 => *n as i64,
        Value::Bool(b) => *b as i64,
        other => {
            return Err(Exception::type_error(format!(
                "{} indices must be integers, not {}",
                kind,
                other.type_name()
            )))
        }
    };

    let resolved = if n < 0 { n + len as i64 } else { n };

    if resolved < 0 || resolved >= len as i64 {
        return Err(Exception::index_error(format!("{} index out of range", kind)));
    }

    Ok(resolved as usize)
}

pub fn get_index(object: &Value, index: &Value) -> Eval<Value> {
    match object {
        Value::List(items) => {
            let items = items.borrow();
            let i = normalize_index(index, items.len(), "list")?;
            Ok(items[i].clone())
        }

        Value::Tuple(items) => {
            let i = normalize_index(index, items.len(), "tuple")?;
            Ok(items[i].clone())
        }

        Value::Text(s) => {
            let chars: Vec<char> = s.chars().collect();
            let i = normalize_index(index, chars.len(), "string")?;
            Ok(Value::Text(chars[i].to_string()))
        }

        Value::Dict(entries) => {
            let key = index.to_key()?;
            entries
                .borrow()
                .get(&key)
                .cloned()
                .ok_or_else(|| Exception::key_error(index.repr()))
        }

        other => Err(Exception::type_error(format!(
            "'{}' object is not subscriptable",
            other.type_name()
        ))),
    }
}

pub fn set_index(object: &Value, index: &Value, value: Value) -> Eval<()> {
    match object {
        Value::List(items) => {
            let mut items = items.borrow_mut();
            let i = normalize_index(index, items.len(), "list assignment")?;
            items[i] = value;
            Ok(())
        }

        Value::Dict(entries) => {
            let key = index.to_key()?;
            entries.borrow_mut().insert(key, value);
            Ok(())
        }

        other => Err(Exception::type_error(format!(
            "'{}' object does not support item assignment",
            other.type_name()
        ))),
    }
}
