//! Abstract syntax tree produced by [`crate::parser::Parser`].
//!
//! Both node categories are closed sum types; the interpreter, the resolver
//! and the printer all match on them exhaustively.

use serde::Serialize;
use std::rc::Rc;

use crate::types::Type;

/// A **literal constant** that appears directly in the source code.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum LiteralValue {
    /// Numeric literal ‑ stored as IEEE‑754 `f64`.
    Number(f64),

    /// String literal, escapes already processed.
    Str(String),

    True,

    False,

    None,
}

/// **Abstract‑Syntax‑Tree node** for every kind of expression.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Expr {
    Literal(LiteralValue),

    /// Name lookup through the environment chain.
    Variable(String),

    /// Prefix operator: `not`, `-` or `+`.
    Unary {
        operator: String,
        operand: Box<Expr>,
    },

    /// Infix operator, including the short‑circuiting `and` / `or`.
    Binary {
        left: Box<Expr>,
        operator: String,
        right: Box<Expr>,
    },

    /// `then if condition else otherwise`
    Conditional {
        condition: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },

    Call {
        callee: Box<Expr>,
        arguments: Vec<Expr>,
    },

    /// `object.name`
    Attribute {
        object: Box<Expr>,
        name: String,
    },

    /// `object[index]`
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
    },

    List(Vec<Expr>),

    Tuple(Vec<Expr>),

    Set(Vec<Expr>),

    Dict(Vec<(Expr, Expr)>),

    Lambda(Rc<FunctionDecl>),
}

/// Left‑hand side of an assignment or a `for` loop.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Target {
    Name(String),

    Attribute { object: Expr, name: String },

    Index { object: Expr, index: Expr },

    /// `a, b = ...` unpacking
    Tuple(Vec<Target>),
}

/// Shared declaration behind both `def` statements and `lambda` expressions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionDecl {
    pub name: String,
    pub params: Vec<String>,
    /// One entry per parameter; unannotated parameters are `Any`.
    pub param_types: Vec<Type>,
    pub return_type: Type,
    pub body: Vec<Stmt>,
    pub is_lambda: bool,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExceptHandler {
    /// Class (or tuple of classes) to match; `None` catches everything.
    pub kind: Option<Expr>,
    pub name: Option<String>,
    pub body: Vec<Stmt>,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportName {
    /// Dotted path for `import`, single name (or `*`) for `from ... import`.
    pub path: String,
    pub alias: Option<String>,
}

/// A statement together with the line it starts on.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stmt {
    pub kind: StmtKind,
    pub line: usize,
}

impl Stmt {
    pub fn new(kind: StmtKind, line: usize) -> Self {
        Self { kind, line }
    }
}

/// **Abstract‑Syntax‑Tree node** for statements.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum StmtKind {
    Expression(Expr),

    /// `a = b = value`; targets are bound left to right.
    Assign {
        targets: Vec<Target>,
        value: Expr,
    },

    /// `target op= value`; `operator` is the bare binary operator (`+`).
    AugAssign {
        target: Target,
        operator: String,
        value: Expr,
    },

    /// `name: annotation [= value]`
    AnnAssign {
        name: String,
        annotation: Type,
        value: Option<Expr>,
    },

    Return(Option<Expr>),

    Break,

    Continue,

    Pass,

    /// `if` / `elif` chain; the first truthy branch wins.
    If {
        branches: Vec<(Expr, Vec<Stmt>)>,
        else_branch: Option<Vec<Stmt>>,
    },

    While {
        condition: Expr,
        body: Vec<Stmt>,
    },

    For {
        target: Target,
        iterable: Expr,
        body: Vec<Stmt>,
    },

    Try {
        body: Vec<Stmt>,
        handlers: Vec<ExceptHandler>,
        else_branch: Option<Vec<Stmt>>,
        finally: Option<Vec<Stmt>>,
    },

    With {
        context: Expr,
        alias: Option<String>,
        body: Vec<Stmt>,
    },

    Import(Vec<ImportName>),

    FromImport {
        module: String,
        names: Vec<ImportName>,
    },

    Raise(Option<Expr>),

    Assert {
        test: Expr,
        message: Option<Expr>,
    },

    Yield(Option<Expr>),

    Await(Expr),

    Global(Vec<String>),

    Nonlocal(Vec<String>),

    FunctionDef(Rc<FunctionDecl>),

    Class {
        name: String,
        bases: Vec<Expr>,
        body: Vec<Stmt>,
    },
}
