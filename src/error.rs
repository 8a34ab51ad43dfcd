//! Centralised error hierarchy for the **Typthon interpreter**.
//!
//! Structural failures (lexer, parser, static checker) and the terminal
//! outcome of an uncaught script exception are all converted into one of the
//! variants defined here, so hosts see a uniform `Result<T>` from
//! [`Interpreter::run`](crate::interpreter::Interpreter::run).
//!
//! Script-level exceptions that are still in flight live in
//! [`crate::exception`]; they only become a [`TypthonError`] once they escape
//! the top-level program.
//!
//! The module **does not** print diagnostics itself

use thiserror::Error;

use log::info;

/// Canonical error type used throughout the interpreter.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TypthonError {
    /// Lexical error: malformed indentation, bad character, open string.
    #[error("[line {line}] Error: {message}")]
    Lex {
        /// Human‑readable description.
        message: String,

        /// 1‑based line where the error occurred.
        line: usize,
    },

    /// Syntactic (parser) error, carrying the offending token text.
    #[error("[line {line}] Error at '{token}': {message}")]
    Parse {
        message: String,
        token: String,
        line: usize,
    },

    /// Static‑check failure (e.g. `return` outside a function).
    #[error("[line {line}] Error: {message}")]
    Resolve { message: String, line: usize },

    /// A script exception that reached the top level unhandled.
    #[error("[line {line}] {kind}: {message}")]
    Uncaught {
        kind: String,
        message: String,
        line: usize,
    },
}

impl TypthonError {
    /// Helper constructor for the **lexer**.
    pub fn lex<S: Into<String>>(line: usize, msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating Lex error: line={}, msg={}", line, message);

        TypthonError::Lex { message, line }
    }

    /// Helper constructor for the **parser**.
    pub fn parse<S: Into<String>, T: Into<String>>(line: usize, token: T, msg: S) -> Self {
        let message: String = msg.into();
        let token: String = token.into();

        info!(
            "Creating Parse error: line={}, token={:?}, msg={}",
            line, token, message
        );

        TypthonError::Parse {
            message,
            token,
            line,
        }
    }

    /// Helper constructor for the **resolver**.
    pub fn resolve<S: Into<String>>(line: usize, msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating Resolve error: line={}, msg={}", line, message);

        TypthonError::Resolve { message, line }
    }

    /// Structural errors abort before execution; the CLI maps them to exit 65.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            TypthonError::Lex { .. } | TypthonError::Parse { .. } | TypthonError::Resolve { .. }
        )
    }
}

/// Crate‑wide `Result` alias.
pub type Result<T> = std::result::Result<T, TypthonError>;
