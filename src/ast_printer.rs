use crate::ast::{Expr, LiteralValue, Stmt, StmtKind, Target};
use crate::types::Type;

/// Renders the AST in parenthesised prefix form, one top‑level statement
/// per line. Used by the `parse` subcommand and by tests.
pub struct AstPrinter;

impl AstPrinter {
    pub fn print_program(statements: &[Stmt]) -> String {
        statements
            .iter()
            .map(Self::print_stmt)
            .collect::<Vec<String>>()
            .join("\n")
    }

    pub fn print(expr: &Expr) -> String {
        match expr {
            // ── literals ────────────────────────────────────────────────
            Expr::Literal(lit) => match lit {
                LiteralValue::True => "True".into(),

                LiteralValue::False => "False".into(),

                LiteralValue::None => "None".into(),

                LiteralValue::Str(s) => format!("{:?}", s),

                LiteralValue::Number(n) => {
                    if n.fract() == 0.0 {
                        // 3.0 → 3.0, so numbers never read as names
                        format!("{:.1}", n)
                    } else {
                        n.to_string()
                    }
                }
            },

            Expr::Variable(name) => name.clone(),

            // ── operators ───────────────────────────────────────────────
            Expr::Unary { operator, operand } => {
                format!("({} {})", operator, Self::print(operand))
            }

            Expr::Binary {
                left,
                operator,
                right,
            } => format!("({} {} {})", operator, Self::print(left), Self::print(right)),

            Expr::Conditional {
                condition,
                then,
                otherwise,
            } => format!(
                "(if {} {} {})",
                Self::print(condition),
                Self::print(then),
                Self::print(otherwise)
            ),

            // ── postfix ─────────────────────────────────────────────────
            Expr::Call { callee, arguments } => {
                let mut s = format!("(call {}", Self::print(callee));
                for arg in arguments {
                    s.push(' ');
                    s.push_str(&Self::print(arg));
                }
                s.push(')');
                s
            }

            Expr::Attribute { object, name } => format!("(. {} {})", Self::print(object), name),

            Expr::Index { object, index } => {
                format!("([] {} {})", Self::print(object), Self::print(index))
            }

            // ── displays ────────────────────────────────────────────────
            Expr::List(items) => Self::node("list", items.iter().map(Self::print)),

            Expr::Tuple(items) => Self::node("tuple", items.iter().map(Self::print)),

            Expr::Set(items) => Self::node("set", items.iter().map(Self::print)),

            Expr::Dict(entries) => Self::node(
                "dict",
                entries
                    .iter()
                    .map(|(k, v)| format!("({} {})", Self::print(k), Self::print(v))),
            ),

            Expr::Lambda(decl) => format!(
                "(lambda ({}) {})",
                decl.params.join(" "),
                Self::block(&decl.body)
            ),
        }
    }

    pub fn print_stmt(stmt: &Stmt) -> String {
        match &stmt.kind {
            StmtKind::Expression(expr) => Self::print(expr),

            StmtKind::Assign { targets, value } => {
                let mut parts: Vec<String> = targets.iter().map(Self::target).collect();
                parts.push(Self::print(value));
                Self::node("=", parts.into_iter())
            }

            StmtKind::AugAssign {
                target,
                operator,
                value,
            } => format!("({}= {} {})", operator, Self::target(target), Self::print(value)),

            StmtKind::AnnAssign {
                name,
                annotation,
                value,
            } => match value {
                Some(value) => format!("(: {} {} {})", name, annotation, Self::print(value)),
                None => format!("(: {} {})", name, annotation),
            },

            StmtKind::Return(value) => Self::keyword_with("return", value.as_ref()),

            StmtKind::Break => "(break)".into(),

            StmtKind::Continue => "(continue)".into(),

            StmtKind::Pass => "(pass)".into(),

            StmtKind::If {
                branches,
                else_branch,
            } => {
                let mut parts: Vec<String> = Vec::new();
                for (i, (condition, body)) in branches.iter().enumerate() {
                    let head = if i == 0 { "if" } else { "elif" };
                    parts.push(format!("({} {} {})", head, Self::print(condition), Self::block(body)));
                }
                if let Some(body) = else_branch {
                    parts.push(format!("(else {})", Self::block(body)));
                }
                if parts.len() == 1 {
                    parts.remove(0)
                } else {
                    Self::node("cond", parts.into_iter())
                }
            }

            StmtKind::While { condition, body } => {
                format!("(while {} {})", Self::print(condition), Self::block(body))
            }

            StmtKind::For {
                target,
                iterable,
                body,
            } => format!(
                "(for {} {} {})",
                Self::target(target),
                Self::print(iterable),
                Self::block(body)
            ),

            StmtKind::Try {
                body,
                handlers,
                else_branch,
                finally,
            } => {
                let mut parts: Vec<String> = vec![Self::block(body)];

                for handler in handlers {
                    let mut head = String::from("(except");
                    if let Some(kind) = &handler.kind {
                        head.push(' ');
                        head.push_str(&Self::print(kind));
                    }
                    if let Some(name) = &handler.name {
                        head.push_str(" as ");
                        head.push_str(name);
                    }
                    parts.push(format!("{} {})", head, Self::block(&handler.body)));
                }

                if let Some(body) = else_branch {
                    parts.push(format!("(else {})", Self::block(body)));
                }
                if let Some(body) = finally {
                    parts.push(format!("(finally {})", Self::block(body)));
                }

                Self::node("try", parts.into_iter())
            }

            StmtKind::With {
                context,
                alias,
                body,
            } => match alias {
                Some(alias) => format!(
                    "(with {} as {} {})",
                    Self::print(context),
                    alias,
                    Self::block(body)
                ),
                None => format!("(with {} {})", Self::print(context), Self::block(body)),
            },

            StmtKind::Import(names) => Self::node(
                "import",
                names.iter().map(|name| match &name.alias {
                    Some(alias) => format!("{} as {}", name.path, alias),
                    None => name.path.clone(),
                }),
            ),

            StmtKind::FromImport { module, names } => Self::node(
                "from",
                std::iter::once(module.clone()).chain(names.iter().map(|name| {
                    match &name.alias {
                        Some(alias) => format!("{} as {}", name.path, alias),
                        None => name.path.clone(),
                    }
                })),
            ),

            StmtKind::Raise(value) => Self::keyword_with("raise", value.as_ref()),

            StmtKind::Assert { test, message } => match message {
                Some(message) => format!("(assert {} {})", Self::print(test), Self::print(message)),
                None => format!("(assert {})", Self::print(test)),
            },

            StmtKind::Yield(value) => Self::keyword_with("yield", value.as_ref()),

            StmtKind::Await(value) => format!("(await {})", Self::print(value)),

            StmtKind::Global(names) => Self::node("global", names.iter().cloned()),

            StmtKind::Nonlocal(names) => Self::node("nonlocal", names.iter().cloned()),

            StmtKind::FunctionDef(decl) => {
                let params: Vec<String> = decl
                    .params
                    .iter()
                    .zip(&decl.param_types)
                    .map(|(name, ty)| match ty {
                        Type::Any => name.clone(),
                        ty => format!("{}: {}", name, ty),
                    })
                    .collect();

                let ret = match &decl.return_type {
                    Type::Any => String::new(),
                    ty => format!(" -> {}", ty),
                };

                format!(
                    "(def {} ({}){} {})",
                    decl.name,
                    params.join(" "),
                    ret,
                    Self::block(&decl.body)
                )
            }

            StmtKind::Class { name, bases, body } => {
                let bases: Vec<String> = bases.iter().map(Self::print).collect();
                format!("(class {} ({}) {})", name, bases.join(" "), Self::block(body))
            }
        }
    }

    fn target(target: &Target) -> String {
        match target {
            Target::Name(name) => name.clone(),
            Target::Attribute { object, name } => format!("(. {} {})", Self::print(object), name),
            Target::Index { object, index } => {
                format!("([] {} {})", Self::print(object), Self::print(index))
            }
            Target::Tuple(targets) => Self::node("tuple", targets.iter().map(Self::target)),
        }
    }

    fn block(body: &[Stmt]) -> String {
        Self::node("block", body.iter().map(Self::print_stmt))
    }

    fn keyword_with(keyword: &str, value: Option<&Expr>) -> String {
        match value {
            Some(value) => format!("({} {})", keyword, Self::print(value)),
            None => format!("({})", keyword),
        }
    }

    fn node<I: Iterator<Item = String>>(head: &str, parts: I) -> String {
        let mut s = format!("({}", head);
        for part in parts {
            s.push(' ');
            s.push_str(&part);
        }
        s.push(')');
        s
    }
}
