//! Static resolver pass for **Typthon** programs.
//!
//! Name binding is dynamic (see [`crate::environment`]), so this walk only
//! enforces the context rules that can be decided without running code:
//! 1. `return` and `yield` appear inside a function body.
//! 2. `break` and `continue` appear inside a loop of the current function.
//! 3. `nonlocal` never appears at module level.
//! 4. Parameter names are unique per function.
//!
//! The first violation aborts the pass with [`TypthonError::Resolve`].

use std::collections::HashSet;

use crate::ast::{Expr, FunctionDecl, Stmt, StmtKind, Target};
use crate::error::{Result, TypthonError};
use log::{debug, info};

/// What kind of body are we inside?
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum FunctionType {
    None,
    Function,
    Method,
    Lambda,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum ClassType {
    None,
    Class,
}

pub struct Resolver {
    current_function: FunctionType,
    current_class: ClassType,
    /// Loops enclosing the current statement within the current function.
    loop_depth: usize,
}

impl Resolver {
    pub fn new() -> Self {
        info!("Resolver instantiated");

        Resolver {
            current_function: FunctionType::None,
            current_class: ClassType::None,
            loop_depth: 0,
        }
    }

    /// Walk all top‑level statements.
    pub fn resolve(&mut self, statements: &[Stmt]) -> Result<()> {
        info!(
            "Beginning resolve pass over {} statement(s)",
            statements.len()
        );

        self.resolve_block(statements)
    }

    fn resolve_block(&mut self, statements: &[Stmt]) -> Result<()> {
        for stmt in statements {
            self.resolve_stmt(stmt)?;
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Statement resolution
    // ─────────────────────────────────────────────────────────────────────────

    fn resolve_stmt(&mut self, stmt: &Stmt) -> Result<()> {
        debug!("Resolving stmt on line {}", stmt.line);

        let line = stmt.line;

        match &stmt.kind {
            StmtKind::Expression(expr) | StmtKind::Await(expr) => self.resolve_expr(expr)?,

            StmtKind::Assign { targets, value } => {
                self.resolve_expr(value)?;
                for target in targets {
                    self.resolve_target(target)?;
                }
            }

            StmtKind::AugAssign { target, value, .. } => {
                self.resolve_target(target)?;
                self.resolve_expr(value)?;
            }

            StmtKind::AnnAssign { value, .. } => {
                if let Some(value) = value {
                    self.resolve_expr(value)?;
                }
            }

            StmtKind::Return(value) => {
                if self.current_function == FunctionType::None {
                    return Err(TypthonError::resolve(line, "'return' outside function"));
                }
                if let Some(value) = value {
                    self.resolve_expr(value)?;
                }
            }

            StmtKind::Yield(value) => {
                if self.current_function == FunctionType::None {
                    return Err(TypthonError::resolve(line, "'yield' outside function"));
                }
                if let Some(value) = value {
                    self.resolve_expr(value)?;
                }
            }

            StmtKind::Break | StmtKind::Continue => {
                if self.loop_depth == 0 {
                    let keyword = if stmt.kind == StmtKind::Break {
                        "break"
                    } else {
                        "continue"
                    };
                    return Err(TypthonError::resolve(
                        line,
                        format!("'{}' outside loop", keyword),
                    ));
                }
            }

            StmtKind::Pass | StmtKind::Import(_) | StmtKind::FromImport { .. } => {}

            StmtKind::Global(_) => {}

            StmtKind::Nonlocal(names) => {
                if self.current_function == FunctionType::None {
                    return Err(TypthonError::resolve(
                        line,
                        "nonlocal declaration not allowed at module level",
                    ));
                }
                debug!("nonlocal {:?} accepted", names);
            }

            StmtKind::If {
                branches,
                else_branch,
            } => {
                for (condition, body) in branches {
                    self.resolve_expr(condition)?;
                    self.resolve_block(body)?;
                }
                if let Some(body) = else_branch {
                    self.resolve_block(body)?;
                }
            }

            StmtKind::While { condition, body } => {
                self.resolve_expr(condition)?;
                self.resolve_loop_body(body)?;
            }

            StmtKind::For {
                target,
                iterable,
                body,
            } => {
                self.resolve_target(target)?;
                self.resolve_expr(iterable)?;
                self.resolve_loop_body(body)?;
            }

            StmtKind::Try {
                body,
                handlers,
                else_branch,
                finally,
            } => {
                self.resolve_block(body)?;
                for handler in handlers {
                    if let Some(kind) = &handler.kind {
                        self.resolve_expr(kind)?;
                    }
                    self.resolve_block(&handler.body)?;
                }
                if let Some(body) = else_branch {
                    self.resolve_block(body)?;
                }
                if let Some(body) = finally {
                    self.resolve_block(body)?;
                }
            }

            StmtKind::With { context, body, .. } => {
                self.resolve_expr(context)?;
                self.resolve_block(body)?;
            }

            StmtKind::Raise(value) => {
                if let Some(value) = value {
                    self.resolve_expr(value)?;
                }
            }

            StmtKind::Assert { test, message } => {
                self.resolve_expr(test)?;
                if let Some(message) = message {
                    self.resolve_expr(message)?;
                }
            }

            StmtKind::FunctionDef(decl) => {
                let kind = if self.current_class == ClassType::Class {
                    FunctionType::Method
                } else {
                    FunctionType::Function
                };
                self.resolve_function(decl, kind)?;
            }

            StmtKind::Class { bases, body, .. } => {
                for base in bases {
                    self.resolve_expr(base)?;
                }

                let enclosing_class = self.current_class;
                let enclosing_loops = self.loop_depth;
                self.current_class = ClassType::Class;
                self.loop_depth = 0;

                let result = self.resolve_block(body);

                self.current_class = enclosing_class;
                self.loop_depth = enclosing_loops;
                result?;
            }
        }

        Ok(())
    }

    fn resolve_loop_body(&mut self, body: &[Stmt]) -> Result<()> {
        self.loop_depth += 1;
        let result = self.resolve_block(body);
        self.loop_depth -= 1;
        result
    }

    fn resolve_target(&mut self, target: &Target) -> Result<()> {
        match target {
            Target::Name(_) => Ok(()),
            Target::Attribute { object, .. } => self.resolve_expr(object),
            Target::Index { object, index } => {
                self.resolve_expr(object)?;
                self.resolve_expr(index)
            }
            Target::Tuple(targets) => {
                for target in targets {
                    self.resolve_target(target)?;
                }
                Ok(())
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Expression resolution
    // ─────────────────────────────────────────────────────────────────────────

    fn resolve_expr(&mut self, expr: &Expr) -> Result<()> {
        match expr {
            Expr::Literal(_) | Expr::Variable(_) => {}

            Expr::Unary { operand, .. } => self.resolve_expr(operand)?,

            Expr::Binary { left, right, .. } => {
                self.resolve_expr(left)?;
                self.resolve_expr(right)?;
            }

            Expr::Conditional {
                condition,
                then,
                otherwise,
            } => {
                self.resolve_expr(condition)?;
                self.resolve_expr(then)?;
                self.resolve_expr(otherwise)?;
            }

            Expr::Call { callee, arguments } => {
                self.resolve_expr(callee)?;
                for arg in arguments {
                    self.resolve_expr(arg)?;
                }
            }

            Expr::Attribute { object, .. } => self.resolve_expr(object)?,

            Expr::Index { object, index } => {
                self.resolve_expr(object)?;
                self.resolve_expr(index)?;
            }

            Expr::List(items) | Expr::Tuple(items) | Expr::Set(items) => {
                for item in items {
                    self.resolve_expr(item)?;
                }
            }

            Expr::Dict(entries) => {
                for (key, value) in entries {
                    self.resolve_expr(key)?;
                    self.resolve_expr(value)?;
                }
            }

            Expr::Lambda(decl) => self.resolve_function(decl, FunctionType::Lambda)?,
        }

        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Function helper
    // ─────────────────────────────────────────────────────────────────────────

    /// Enter a function body with a fresh loop context.
    fn resolve_function(&mut self, decl: &FunctionDecl, kind: FunctionType) -> Result<()> {
        let mut seen: HashSet<&str> = HashSet::new();

        for param in &decl.params {
            if !seen.insert(param.as_str()) {
                return Err(TypthonError::resolve(
                    decl.line,
                    format!("duplicate argument '{}' in function definition", param),
                ));
            }
        }

        let enclosing_function = self.current_function;
        let enclosing_class = self.current_class;
        let enclosing_loops = self.loop_depth;

        self.current_function = kind;
        self.current_class = ClassType::None;
        self.loop_depth = 0;

        let result = self.resolve_block(&decl.body);

        self.current_function = enclosing_function;
        self.current_class = enclosing_class;
        self.loop_depth = enclosing_loops;

        result
    }
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new()
    }
}
