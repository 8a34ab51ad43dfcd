/*!
Recursive‑descent parser for Typthon.

The parser pulls tokens lazily from a [`Lexer`] with a single token of
lookahead (`peek` / `consume` / `matches`). Block structure arrives as
`NEWLINE`, `INDENT` and `DEDENT` tokens, so a suite is simply
`":" NEWLINE INDENT statement+ DEDENT` (or simple statements on the same line).

### Logging Policy

| Location                     | Level  | Purpose                                   |
|------------------------------|--------|-------------------------------------------|
| `Parser::new`, `parse`       | `info` | Lifecycle milestones.                     |
| `statement`, `compound`      | `debug`| High‑level descent into grammar branches. |

--------------------------------------------------------------------------------
Grammar (condensed EBNF)
--------------------------------------------------------

```text
program        → ( NEWLINE | statement )* END ;
statement      → compound | simple_line ;
simple_line    → simple ( ";" simple )* [";"] NEWLINE ;
compound       → if | while | for | try | with | def | class ;
suite          → ":" ( simple_line | NEWLINE INDENT statement+ DEDENT ) ;
simple         → "return" [exprlist] | "break" | "continue" | "pass"
               | "import" dotted ["as" NAME] ("," ...)*
               | "from" dotted "import" ( "*" | NAME ["as" NAME] ("," ...)* )
               | "raise" [expr] | "assert" expr ["," expr]
               | "yield" [exprlist] | "await" expr
               | "global" NAME ("," NAME)* | "nonlocal" NAME ("," NAME)*
               | NAME ":" type ["=" exprlist]
               | exprlist ( ("=" exprlist)+ | AUGOP exprlist )? ;
def            → "def" NAME "(" [param ("," param)*] ")" ["->" type] suite ;
param          → NAME [":" type] ;
class          → "class" NAME ["(" [expr ("," expr)*] ")"] suite ;
expression     → lambda | conditional ;
conditional    → or ["if" or "else" expression] ;
or             → and ( "or" and )* ;
and            → equality ( "and" equality )* ;
equality       → comparison ( ( "==" | "!=" | "is" ["not"] ) comparison )* ;
comparison     → additive ( ( "<" | "<=" | ">" | ">=" | "in" | "not" "in" ) additive )* ;
additive       → multiplicative ( ( "+" | "-" ) multiplicative )* ;
multiplicative → power ( ( "*" | "/" | "//" | "%" ) power )* ;
power          → unary [ "**" power ] ;
unary          → ( "not" | "-" | "+" ) unary | call ;
call           → primary ( "(" args ")" | "." NAME | "[" expression "]" )* ;
primary        → NUMBER | STRING+ | "True" | "False" | "None" | NAME
               | "(" [expression ("," expression)* [","]] ")"
               | "[" ... "]" | "{" ... "}" | lambda ;
lambda         → "lambda" [NAME ("," NAME)*] ":" expression ;
type           → "int" | "str" | "bool" | "None" | NAME
               | ("list"|"List") "[" type "]" | ("dict"|"Dict") "[" type "," type "]"
               | "(" [type ("," type)*] ")" "->" type ;
```
*/

use std::rc::Rc;

use crate::ast::{
    ExceptHandler, Expr, FunctionDecl, ImportName, LiteralValue, Stmt, StmtKind, Target,
};
use crate::error::{Result, TypthonError};
use crate::lexer::Lexer;
use crate::token::{Token, TokenType};
use crate::types::Type;

use log::{debug, info};

const AUGMENTED_OPERATORS: [&str; 7] = ["+=", "-=", "*=", "/=", "//=", "%=", "**="];

/// Top‑level parser over a lazily scanned token stream.
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    lookahead: Option<Token>,
}

impl<'a> Parser<'a> {
    /// Construct a parser over raw source text.
    pub fn new(source: &'a str) -> Self {
        Self::from_lexer(Lexer::new(source))
    }

    pub fn from_lexer(lexer: Lexer<'a>) -> Self {
        info!("Parser created");

        Self {
            lexer,
            lookahead: None,
        }
    }

    // ───────────────────────── public API ─────────────────────────

    /// Parse an entire program and return its statement list. The first
    /// lexical or syntax error aborts the parse.
    pub fn parse(&mut self) -> Result<Vec<Stmt>> {
        info!("Beginning parse phase");

        let mut statements: Vec<Stmt> = Vec::new();

        loop {
            self.skip_newlines()?;

            if self.check_kind(TokenType::END)? {
                break;
            }

            statements.extend(self.statement()?);
        }

        info!("Parsed {} top-level statements", statements.len());

        Ok(statements)
    }

    // ───────────────────────── statements ─────────────────────────

    fn statement(&mut self) -> Result<Vec<Stmt>> {
        let token = self.peek()?;

        debug!("Entering statement at {}", token);

        if token.kind == TokenType::INDENT {
            return Err(self.error("Unexpected indent"));
        }

        if token.kind == TokenType::KEYWORD {
            let stmt = match token.text.as_str() {
                "if" => Some(self.if_statement()?),
                "while" => Some(self.while_statement()?),
                "for" => Some(self.for_statement()?),
                "try" => Some(self.try_statement()?),
                "with" => Some(self.with_statement()?),
                "def" => Some(self.function_definition()?),
                "class" => Some(self.class_definition()?),
                _ => None,
            };

            if let Some(stmt) = stmt {
                return Ok(vec![stmt]);
            }
        }

        self.simple_line()
    }

    /// One or more `;`‑separated simple statements closing a logical line.
    fn simple_line(&mut self) -> Result<Vec<Stmt>> {
        let mut statements: Vec<Stmt> = vec![self.simple_statement()?];

        while self.matches(TokenType::SYMBOL, ";")? {
            if self.check_kind(TokenType::NEWLINE)? || self.check_kind(TokenType::END)? {
                break;
            }

            statements.push(self.simple_statement()?);
        }

        if !self.matches_kind(TokenType::NEWLINE)? && !self.check_kind(TokenType::END)? {
            return Err(self.error("Expected end of line"));
        }

        Ok(statements)
    }

    fn simple_statement(&mut self) -> Result<Stmt> {
        let token = self.peek()?.clone();
        let line = token.line;

        if token.kind != TokenType::KEYWORD {
            return self.assignment_or_expression();
        }

        let kind = match token.text.as_str() {
            "return" => {
                self.consume()?;
                StmtKind::Return(self.optional_expression_list()?)
            }

            "break" => {
                self.consume()?;
                StmtKind::Break
            }

            "continue" => {
                self.consume()?;
                StmtKind::Continue
            }

            "pass" => {
                self.consume()?;
                StmtKind::Pass
            }

            "import" => {
                self.consume()?;
                let mut names: Vec<ImportName> = Vec::new();

                loop {
                    let path = self.dotted_name()?;
                    let alias = self.optional_alias()?;
                    names.push(ImportName { path, alias });

                    if !self.matches(TokenType::SYMBOL, ",")? {
                        break;
                    }
                }

                StmtKind::Import(names)
            }

            "from" => {
                self.consume()?;
                let module = self.dotted_name()?;
                self.expect(TokenType::KEYWORD, "import", "Expected 'import' after module name")?;

                let names = if self.matches(TokenType::OPERATOR, "*")? {
                    vec![ImportName {
                        path: "*".to_string(),
                        alias: None,
                    }]
                } else {
                    let parenthesized = self.matches(TokenType::SYMBOL, "(")?;
                    let mut names: Vec<ImportName> = Vec::new();

                    loop {
                        let path = self.identifier("Expected name to import")?;
                        let alias = self.optional_alias()?;
                        names.push(ImportName { path, alias });

                        if !self.matches(TokenType::SYMBOL, ",")? {
                            break;
                        }

                        if parenthesized && self.check(TokenType::SYMBOL, ")")? {
                            break;
                        }
                    }

                    if parenthesized {
                        self.expect(TokenType::SYMBOL, ")", "Expected ')' after imported names")?;
                    }

                    names
                };

                StmtKind::FromImport { module, names }
            }

            "raise" => {
                self.consume()?;
                let value = if self.at_statement_end()? {
                    None
                } else {
                    Some(self.expression()?)
                };
                StmtKind::Raise(value)
            }

            "assert" => {
                self.consume()?;
                let test = self.expression()?;
                let message = if self.matches(TokenType::SYMBOL, ",")? {
                    Some(self.expression()?)
                } else {
                    None
                };
                StmtKind::Assert { test, message }
            }

            "yield" => {
                self.consume()?;
                StmtKind::Yield(self.optional_expression_list()?)
            }

            "await" => {
                self.consume()?;
                StmtKind::Await(self.expression()?)
            }

            "global" => {
                self.consume()?;
                StmtKind::Global(self.name_list()?)
            }

            "nonlocal" => {
                self.consume()?;
                StmtKind::Nonlocal(self.name_list()?)
            }

            _ => return self.assignment_or_expression(),
        };

        Ok(Stmt::new(kind, line))
    }

    fn assignment_or_expression(&mut self) -> Result<Stmt> {
        let line = self.peek()?.line;
        let expr = self.expression_list()?;

        // name: annotation [= value]
        if self.check(TokenType::SYMBOL, ":")? {
            let Expr::Variable(name) = expr else {
                return Err(self.error("Only simple names can be annotated"));
            };

            self.consume()?;
            let annotation = self.parse_type()?;
            let value = if self.matches(TokenType::OPERATOR, "=")? {
                Some(self.expression_list()?)
            } else {
                None
            };

            return Ok(Stmt::new(
                StmtKind::AnnAssign {
                    name,
                    annotation,
                    value,
                },
                line,
            ));
        }

        if self.check(TokenType::OPERATOR, "=")? {
            let mut targets: Vec<Target> = Vec::new();
            let mut value = expr;

            while self.matches(TokenType::OPERATOR, "=")? {
                targets.push(self.to_target(value, line)?);
                value = self.expression_list()?;
            }

            return Ok(Stmt::new(StmtKind::Assign { targets, value }, line));
        }

        let token = self.peek()?;

        if token.kind == TokenType::OPERATOR && AUGMENTED_OPERATORS.contains(&token.text.as_str()) {
            let operator = self.consume()?.text;
            let target = match self.to_target(expr, line)? {
                Target::Tuple(_) => {
                    return Err(TypthonError::parse(
                        line,
                        operator,
                        "Illegal target for augmented assignment",
                    ))
                }
                target => target,
            };
            let value = self.expression_list()?;

            return Ok(Stmt::new(
                StmtKind::AugAssign {
                    target,
                    operator: operator.trim_end_matches('=').to_string(),
                    value,
                },
                line,
            ));
        }

        Ok(Stmt::new(StmtKind::Expression(expr), line))
    }

    fn to_target(&self, expr: Expr, line: usize) -> Result<Target> {
        match expr {
            Expr::Variable(name) => Ok(Target::Name(name)),

            Expr::Attribute { object, name } => Ok(Target::Attribute {
                object: *object,
                name,
            }),

            Expr::Index { object, index } => Ok(Target::Index {
                object: *object,
                index: *index,
            }),

            Expr::Tuple(items) | Expr::List(items) => Ok(Target::Tuple(
                items
                    .into_iter()
                    .map(|item| self.to_target(item, line))
                    .collect::<Result<Vec<Target>>>()?,
            )),

            _ => Err(TypthonError::parse(
                line,
                "=",
                "Cannot assign to expression",
            )),
        }
    }

    // ───────────────────────── compound statements ─────────────────

    fn if_statement(&mut self) -> Result<Stmt> {
        let line = self.consume()?.line;
        debug!("Parsing if statement on line {}", line);

        let mut branches: Vec<(Expr, Vec<Stmt>)> = Vec::new();
        let condition = self.expression()?;
        branches.push((condition, self.suite()?));

        while self.matches(TokenType::KEYWORD, "elif")? {
            let condition = self.expression()?;
            branches.push((condition, self.suite()?));
        }

        let else_branch = if self.matches(TokenType::KEYWORD, "else")? {
            Some(self.suite()?)
        } else {
            None
        };

        Ok(Stmt::new(
            StmtKind::If {
                branches,
                else_branch,
            },
            line,
        ))
    }

    fn while_statement(&mut self) -> Result<Stmt> {
        let line = self.consume()?.line;
        debug!("Parsing while statement on line {}", line);

        let condition = self.expression()?;
        let body = self.suite()?;

        Ok(Stmt::new(StmtKind::While { condition, body }, line))
    }

    fn for_statement(&mut self) -> Result<Stmt> {
        let line = self.consume()?.line;
        debug!("Parsing for statement on line {}", line);

        // Targets stop short of comparison level so `in` is left alone.
        let mut targets: Vec<Expr> = vec![self.call()?];
        while self.matches(TokenType::SYMBOL, ",")? {
            targets.push(self.call()?);
        }

        let target = if targets.len() == 1 {
            self.to_target(targets.remove(0), line)?
        } else {
            self.to_target(Expr::Tuple(targets), line)?
        };

        self.expect(TokenType::KEYWORD, "in", "Expected 'in' after loop target")?;
        let iterable = self.expression_list()?;
        let body = self.suite()?;

        Ok(Stmt::new(
            StmtKind::For {
                target,
                iterable,
                body,
            },
            line,
        ))
    }

    fn try_statement(&mut self) -> Result<Stmt> {
        let line = self.consume()?.line;
        debug!("Parsing try statement on line {}", line);

        let body = self.suite()?;
        let mut handlers: Vec<ExceptHandler> = Vec::new();

        while self.check(TokenType::KEYWORD, "except")? {
            let handler_line = self.consume()?.line;

            let kind = if self.check(TokenType::SYMBOL, ":")? {
                None
            } else {
                Some(self.expression()?)
            };

            let name = self.optional_alias()?;
            let body = self.suite()?;

            handlers.push(ExceptHandler {
                kind,
                name,
                body,
                line: handler_line,
            });
        }

        let else_branch = if !handlers.is_empty() && self.matches(TokenType::KEYWORD, "else")? {
            Some(self.suite()?)
        } else {
            None
        };

        let finally = if self.matches(TokenType::KEYWORD, "finally")? {
            Some(self.suite()?)
        } else {
            None
        };

        if handlers.is_empty() && finally.is_none() {
            return Err(self.error("Expected 'except' or 'finally' block"));
        }

        Ok(Stmt::new(
            StmtKind::Try {
                body,
                handlers,
                else_branch,
                finally,
            },
            line,
        ))
    }

    fn with_statement(&mut self) -> Result<Stmt> {
        let line = self.consume()?.line;

        let context = self.expression()?;
        let alias = self.optional_alias()?;
        let body = self.suite()?;

        Ok(Stmt::new(
            StmtKind::With {
                context,
                alias,
                body,
            },
            line,
        ))
    }

    fn function_definition(&mut self) -> Result<Stmt> {
        let line = self.consume()?.line;
        let name = self.identifier("Expected function name")?;
        debug!("Parsing def '{}' on line {}", name, line);

        self.expect(TokenType::SYMBOL, "(", "Expected '(' after function name")?;

        let mut params: Vec<String> = Vec::new();
        let mut param_types: Vec<Type> = Vec::new();

        while !self.check(TokenType::SYMBOL, ")")? {
            params.push(self.identifier("Expected parameter name")?);

            let annotation = if self.matches(TokenType::SYMBOL, ":")? {
                self.parse_type()?
            } else {
                Type::Any
            };
            param_types.push(annotation);

            if !self.matches(TokenType::SYMBOL, ",")? {
                break;
            }
        }

        self.expect(TokenType::SYMBOL, ")", "Expected ')' after parameters")?;

        let return_type = if self.matches(TokenType::OPERATOR, "->")? {
            self.parse_type()?
        } else {
            Type::Any
        };

        let body = self.suite()?;

        Ok(Stmt::new(
            StmtKind::FunctionDef(Rc::new(FunctionDecl {
                name,
                params,
                param_types,
                return_type,
                body,
                is_lambda: false,
                line,
            })),
            line,
        ))
    }

    fn class_definition(&mut self) -> Result<Stmt> {
        let line = self.consume()?.line;
        let name = self.identifier("Expected class name")?;
        debug!("Parsing class '{}' on line {}", name, line);

        let mut bases: Vec<Expr> = Vec::new();

        if self.matches(TokenType::SYMBOL, "(")? {
            while !self.check(TokenType::SYMBOL, ")")? {
                bases.push(self.expression()?);

                if !self.matches(TokenType::SYMBOL, ",")? {
                    break;
                }
            }

            self.expect(TokenType::SYMBOL, ")", "Expected ')' after base classes")?;
        }

        let body = self.suite()?;

        Ok(Stmt::new(StmtKind::Class { name, bases, body }, line))
    }

    /// `":"` followed by either an indented block or same‑line statements.
    fn suite(&mut self) -> Result<Vec<Stmt>> {
        self.expect(TokenType::SYMBOL, ":", "Expected ':'")?;

        if !self.matches_kind(TokenType::NEWLINE)? {
            return self.simple_line();
        }

        if !self.matches_kind(TokenType::INDENT)? {
            return Err(self.error("Expected an indented block"));
        }

        let mut body: Vec<Stmt> = Vec::new();

        loop {
            self.skip_newlines()?;

            if self.matches_kind(TokenType::DEDENT)? || self.check_kind(TokenType::END)? {
                break;
            }

            body.extend(self.statement()?);
        }

        Ok(body)
    }

    // ───────────────────────── expressions ────────────────────────

    /// Comma‑separated expressions; more than one builds a tuple.
    fn expression_list(&mut self) -> Result<Expr> {
        let first = self.expression()?;

        if !self.check(TokenType::SYMBOL, ",")? {
            return Ok(first);
        }

        let mut items: Vec<Expr> = vec![first];

        while self.matches(TokenType::SYMBOL, ",")? {
            if self.at_list_end()? {
                break;
            }

            items.push(self.expression()?);
        }

        Ok(Expr::Tuple(items))
    }

    fn optional_expression_list(&mut self) -> Result<Option<Expr>> {
        if self.at_statement_end()? {
            Ok(None)
        } else {
            Ok(Some(self.expression_list()?))
        }
    }

    pub fn expression(&mut self) -> Result<Expr> {
        if self.check(TokenType::KEYWORD, "lambda")? {
            return self.lambda();
        }

        let then = self.or()?;

        if self.matches(TokenType::KEYWORD, "if")? {
            let condition = self.or()?;
            self.expect(TokenType::KEYWORD, "else", "Expected 'else' in conditional expression")?;
            let otherwise = self.expression()?;

            return Ok(Expr::Conditional {
                condition: Box::new(condition),
                then: Box::new(then),
                otherwise: Box::new(otherwise),
            });
        }

        Ok(then)
    }

    fn lambda(&mut self) -> Result<Expr> {
        let line = self.consume()?.line;
        let mut params: Vec<String> = Vec::new();

        while !self.check(TokenType::SYMBOL, ":")? {
            params.push(self.identifier("Expected lambda parameter")?);

            if !self.matches(TokenType::SYMBOL, ",")? {
                break;
            }
        }

        self.expect(TokenType::SYMBOL, ":", "Expected ':' after lambda parameters")?;
        let body = self.expression()?;

        Ok(Expr::Lambda(Rc::new(FunctionDecl {
            name: "<lambda>".to_string(),
            param_types: vec![Type::Any; params.len()],
            params,
            return_type: Type::Any,
            body: vec![Stmt::new(StmtKind::Return(Some(body)), line)],
            is_lambda: true,
            line,
        })))
    }

    fn or(&mut self) -> Result<Expr> {
        let mut expr = self.and()?;

        while self.matches(TokenType::KEYWORD, "or")? {
            let right = self.and()?;
            expr = binary(expr, "or", right);
        }

        Ok(expr)
    }

    fn and(&mut self) -> Result<Expr> {
        let mut expr = self.equality()?;

        while self.matches(TokenType::KEYWORD, "and")? {
            let right = self.equality()?;
            expr = binary(expr, "and", right);
        }

        Ok(expr)
    }

    fn equality(&mut self) -> Result<Expr> {
        let mut expr = self.comparison()?;

        loop {
            let operator = if self.matches(TokenType::OPERATOR, "==")? {
                "=="
            } else if self.matches(TokenType::OPERATOR, "!=")? {
                "!="
            } else if self.matches(TokenType::KEYWORD, "is")? {
                if self.matches(TokenType::KEYWORD, "not")? {
                    "is not"
                } else {
                    "is"
                }
            } else {
                break;
            };

            let right = self.comparison()?;
            expr = binary(expr, operator, right);
        }

        Ok(expr)
    }

    fn comparison(&mut self) -> Result<Expr> {
        let mut expr = self.additive()?;

        loop {
            let token = self.peek()?;

            let operator = match (token.kind, token.text.as_str()) {
                (TokenType::OPERATOR, op @ ("<" | "<=" | ">" | ">=")) => op.to_string(),
                (TokenType::KEYWORD, "in") => "in".to_string(),
                // after a complete operand, `not` can only start `not in`
                (TokenType::KEYWORD, "not") => {
                    self.consume()?;
                    self.expect(TokenType::KEYWORD, "in", "Expected 'in' after 'not'")?;
                    let right = self.additive()?;
                    expr = binary(expr, "not in", right);
                    continue;
                }
                _ => break,
            };

            self.consume()?;
            let right = self.additive()?;
            expr = binary(expr, &operator, right);
        }

        Ok(expr)
    }

    fn additive(&mut self) -> Result<Expr> {
        let mut expr = self.multiplicative()?;

        while let Some(operator) = self.match_operator(&["+", "-"])? {
            let right = self.multiplicative()?;
            expr = binary(expr, &operator, right);
        }

        Ok(expr)
    }

    fn multiplicative(&mut self) -> Result<Expr> {
        let mut expr = self.power()?;

        while let Some(operator) = self.match_operator(&["*", "/", "//", "%"])? {
            let right = self.power()?;
            expr = binary(expr, &operator, right);
        }

        Ok(expr)
    }

    /// Right‑associative: `2 ** 3 ** 2 == 2 ** 9`.
    fn power(&mut self) -> Result<Expr> {
        let base = self.unary()?;

        if self.matches(TokenType::OPERATOR, "**")? {
            let exponent = self.power()?;
            return Ok(binary(base, "**", exponent));
        }

        Ok(base)
    }

    fn unary(&mut self) -> Result<Expr> {
        let operator = if self.matches(TokenType::KEYWORD, "not")? {
            Some("not".to_string())
        } else {
            self.match_operator(&["-", "+"])?
        };

        if let Some(operator) = operator {
            let operand = self.unary()?;
            return Ok(Expr::Unary {
                operator,
                operand: Box::new(operand),
            });
        }

        self.call()
    }

    fn call(&mut self) -> Result<Expr> {
        let mut expr = self.primary()?;

        loop {
            if self.matches(TokenType::SYMBOL, "(")? {
                let arguments = self.sequence(")")?;
                expr = Expr::Call {
                    callee: Box::new(expr),
                    arguments,
                };
            } else if self.matches(TokenType::SYMBOL, ".")? {
                let name = self.identifier("Expected attribute name after '.'")?;
                expr = Expr::Attribute {
                    object: Box::new(expr),
                    name,
                };
            } else if self.matches(TokenType::SYMBOL, "[")? {
                let index = self.expression_list()?;
                self.expect(TokenType::SYMBOL, "]", "Expected ']' after index")?;
                expr = Expr::Index {
                    object: Box::new(expr),
                    index: Box::new(index),
                };
            } else {
                break;
            }
        }

        Ok(expr)
    }

    fn primary(&mut self) -> Result<Expr> {
        let token = self.peek()?.clone();

        match token.kind {
            TokenType::NUMBER => {
                self.consume()?;
                let n: f64 = token.text.parse().map_err(|_| {
                    TypthonError::parse(token.line, token.text.clone(), "Invalid number literal")
                })?;
                Ok(Expr::Literal(LiteralValue::Number(n)))
            }

            TokenType::STRING => {
                self.consume()?;
                let mut text = token.text;

                // adjacent literals concatenate
                while self.check_kind(TokenType::STRING)? {
                    text.push_str(&self.consume()?.text);
                }

                Ok(Expr::Literal(LiteralValue::Str(text)))
            }

            TokenType::IDENTIFIER => {
                self.consume()?;
                Ok(Expr::Variable(token.text))
            }

            TokenType::KEYWORD => match token.text.as_str() {
                "True" => {
                    self.consume()?;
                    Ok(Expr::Literal(LiteralValue::True))
                }
                "False" => {
                    self.consume()?;
                    Ok(Expr::Literal(LiteralValue::False))
                }
                "None" => {
                    self.consume()?;
                    Ok(Expr::Literal(LiteralValue::None))
                }
                "lambda" => self.lambda(),
                _ => Err(self.error("Expected expression")),
            },

            TokenType::SYMBOL => match token.text.as_str() {
                "(" => {
                    self.consume()?;

                    if self.matches(TokenType::SYMBOL, ")")? {
                        return Ok(Expr::Tuple(Vec::new()));
                    }

                    let first = self.expression()?;

                    if self.matches(TokenType::SYMBOL, ")")? {
                        return Ok(first);
                    }

                    self.expect(TokenType::SYMBOL, ",", "Expected ')' after expression")?;
                    let mut items = vec![first];
                    items.extend(self.sequence(")")?);

                    Ok(Expr::Tuple(items))
                }

                "[" => {
                    self.consume()?;
                    Ok(Expr::List(self.sequence("]")?))
                }

                "{" => {
                    self.consume()?;
                    self.brace_literal()
                }

                _ => Err(self.error("Expected expression")),
            },

            _ => Err(self.error("Expected expression")),
        }
    }

    /// Dict or set display; the opening `{` is already consumed.
    fn brace_literal(&mut self) -> Result<Expr> {
        if self.matches(TokenType::SYMBOL, "}")? {
            return Ok(Expr::Dict(Vec::new()));
        }

        let first = self.expression()?;

        if !self.matches(TokenType::SYMBOL, ":")? {
            let mut items = vec![first];

            if self.matches(TokenType::SYMBOL, ",")? {
                items.extend(self.sequence("}")?);
            } else {
                self.expect(TokenType::SYMBOL, "}", "Expected '}' after set items")?;
            }

            return Ok(Expr::Set(items));
        }

        let mut entries: Vec<(Expr, Expr)> = vec![(first, self.expression()?)];

        while self.matches(TokenType::SYMBOL, ",")? {
            if self.check(TokenType::SYMBOL, "}")? {
                break;
            }

            let key = self.expression()?;
            self.expect(TokenType::SYMBOL, ":", "Expected ':' after dict key")?;
            entries.push((key, self.expression()?));
        }

        self.expect(TokenType::SYMBOL, "}", "Expected '}' after dict entries")?;

        Ok(Expr::Dict(entries))
    }

    /// Comma‑separated expressions up to `close`, trailing comma allowed.
    fn sequence(&mut self, close: &str) -> Result<Vec<Expr>> {
        let mut items: Vec<Expr> = Vec::new();

        while !self.check(TokenType::SYMBOL, close)? {
            items.push(self.expression()?);

            if !self.matches(TokenType::SYMBOL, ",")? {
                break;
            }
        }

        self.expect(TokenType::SYMBOL, close, &format!("Expected '{}'", close))?;

        Ok(items)
    }

    // ───────────────────────── type annotations ───────────────────

    pub fn parse_type(&mut self) -> Result<Type> {
        let token = self.peek()?.clone();

        match token.kind {
            TokenType::SYMBOL if token.text == "(" => {
                self.consume()?;
                let mut params: Vec<Type> = Vec::new();

                while !self.check(TokenType::SYMBOL, ")")? {
                    params.push(self.parse_type()?);

                    if !self.matches(TokenType::SYMBOL, ",")? {
                        break;
                    }
                }

                self.expect(TokenType::SYMBOL, ")", "Expected ')' in function type")?;
                self.expect(TokenType::OPERATOR, "->", "Expected '->' in function type")?;
                let ret = self.parse_type()?;

                Ok(Type::function(params, ret))
            }

            TokenType::KEYWORD if token.text == "None" => {
                self.consume()?;
                Ok(Type::None)
            }

            // forward reference such as 'Node'
            TokenType::STRING => {
                self.consume()?;
                Ok(Type::Any)
            }

            TokenType::IDENTIFIER => {
                self.consume()?;

                if !self.matches(TokenType::SYMBOL, "[")? {
                    return Ok(Type::from_name(&token.text));
                }

                let ty = match token.text.as_str() {
                    "list" | "List" => Type::list(self.parse_type()?),

                    "dict" | "Dict" => {
                        let key = self.parse_type()?;
                        self.expect(TokenType::SYMBOL, ",", "Expected ',' in dict type")?;
                        Type::dict(key, self.parse_type()?)
                    }

                    "Callable" => {
                        self.expect(TokenType::SYMBOL, "[", "Expected '[' in Callable type")?;
                        let mut params: Vec<Type> = Vec::new();

                        while !self.check(TokenType::SYMBOL, "]")? {
                            params.push(self.parse_type()?);

                            if !self.matches(TokenType::SYMBOL, ",")? {
                                break;
                            }
                        }

                        self.expect(TokenType::SYMBOL, "]", "Expected ']' in Callable type")?;
                        self.expect(TokenType::SYMBOL, ",", "Expected ',' in Callable type")?;
                        Type::function(params, self.parse_type()?)
                    }

                    // unknown generics are parsed for shape only
                    _ => {
                        while !self.check(TokenType::SYMBOL, "]")? {
                            self.parse_type()?;

                            if !self.matches(TokenType::SYMBOL, ",")? {
                                break;
                            }
                        }

                        Type::Any
                    }
                };

                self.expect(TokenType::SYMBOL, "]", "Expected ']' after type arguments")?;

                Ok(ty)
            }

            _ => Err(self.error("Expected type annotation")),
        }
    }

    // ────────────────────── utility helpers ───────────────────────

    fn identifier(&mut self, message: &str) -> Result<String> {
        Ok(self.expect_kind(TokenType::IDENTIFIER, message)?.text)
    }

    fn dotted_name(&mut self) -> Result<String> {
        let mut path = self.identifier("Expected module name")?;

        while self.matches(TokenType::SYMBOL, ".")? {
            path.push('.');
            path.push_str(&self.identifier("Expected name after '.'")?);
        }

        Ok(path)
    }

    fn optional_alias(&mut self) -> Result<Option<String>> {
        if self.matches(TokenType::KEYWORD, "as")? {
            Ok(Some(self.identifier("Expected name after 'as'")?))
        } else {
            Ok(None)
        }
    }

    fn name_list(&mut self) -> Result<Vec<String>> {
        let mut names = vec![self.identifier("Expected name")?];

        while self.matches(TokenType::SYMBOL, ",")? {
            names.push(self.identifier("Expected name")?);
        }

        Ok(names)
    }

    fn match_operator(&mut self, operators: &[&str]) -> Result<Option<String>> {
        let token = self.peek()?;

        if token.kind == TokenType::OPERATOR && operators.contains(&token.text.as_str()) {
            return Ok(Some(self.consume()?.text));
        }

        Ok(None)
    }

    fn at_statement_end(&mut self) -> Result<bool> {
        let token = self.peek()?;

        Ok(matches!(token.kind, TokenType::NEWLINE | TokenType::END) || token.is_symbol(";"))
    }

    /// Positions where a trailing comma may end an expression list.
    fn at_list_end(&mut self) -> Result<bool> {
        let token = self.peek()?;

        Ok(matches!(token.kind, TokenType::NEWLINE | TokenType::END)
            || token.is_operator("=")
            || [";", ":", ")", "]", "}"].iter().any(|s| token.is_symbol(s)))
    }

    fn skip_newlines(&mut self) -> Result<()> {
        while self.matches_kind(TokenType::NEWLINE)? {}
        Ok(())
    }

    #[inline]
    fn peek(&mut self) -> Result<&Token> {
        let token = match self.lookahead.take() {
            Some(token) => token,
            None => self.lexer.next_token()?,
        };

        Ok(self.lookahead.insert(token))
    }

    #[inline]
    fn consume(&mut self) -> Result<Token> {
        match self.lookahead.take() {
            Some(token) => Ok(token),
            None => self.lexer.next_token(),
        }
    }

    #[inline]
    fn check(&mut self, kind: TokenType, text: &str) -> Result<bool> {
        Ok(self.peek()?.is(kind, text))
    }

    #[inline]
    fn check_kind(&mut self, kind: TokenType) -> Result<bool> {
        Ok(self.peek()?.kind == kind)
    }

    #[inline]
    fn matches(&mut self, kind: TokenType, text: &str) -> Result<bool> {
        if self.check(kind, text)? {
            self.consume()?;
            return Ok(true);
        }

        Ok(false)
    }

    #[inline]
    fn matches_kind(&mut self, kind: TokenType) -> Result<bool> {
        if self.check_kind(kind)? {
            self.consume()?;
            return Ok(true);
        }

        Ok(false)
    }

    fn expect(&mut self, kind: TokenType, text: &str, message: &str) -> Result<Token> {
        if self.check(kind, text)? {
            return self.consume();
        }

        Err(self.error(message))
    }

    fn expect_kind(&mut self, kind: TokenType, message: &str) -> Result<Token> {
        if self.check_kind(kind)? {
            return self.consume();
        }

        Err(self.error(message))
    }

    /// Builds a parse error pointing at the lookahead token.
    fn error(&mut self, message: &str) -> TypthonError {
        match self.peek() {
            Ok(token) => {
                debug!("Parse error at {}: {}", token, message);
                TypthonError::parse(token.line, token.describe(), message)
            }
            Err(e) => e,
        }
    }
}

fn binary(left: Expr, operator: &str, right: Expr) -> Expr {
    Expr::Binary {
        left: Box::new(left),
        operator: operator.to_string(),
        right: Box::new(right),
    }
}
