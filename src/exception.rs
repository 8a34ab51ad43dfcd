//! Script‑level exceptions.
//!
//! An [`Exception`] is what travels through `ExecutionResult::Exception` and,
//! during expression evaluation, through `Err(..)` of an [`Eval`]. It only
//! becomes a host error once it escapes the top‑level program.

use std::fmt;

use crate::value::{ClassObject, Value};

/// Upper bound on the element count of a list, tuple or text built by
/// repetition or `range`.
pub const MAX_SEQUENCE_LEN: usize = 1 << 28;

/// Expression‑level result: `Err` carries a script exception.
pub type Eval<T> = std::result::Result<T, Exception>;

/// Builtin exception classes registered in every interpreter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Exception,
    NameError,
    TypeError,
    ValueError,
    IndexError,
    KeyError,
    AttributeError,
    ZeroDivisionError,
    AssertionError,
    RecursionError,
    RuntimeError,
    MemoryError,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 12] = [
        ErrorKind::Exception,
        ErrorKind::NameError,
        ErrorKind::TypeError,
        ErrorKind::ValueError,
        ErrorKind::IndexError,
        ErrorKind::KeyError,
        ErrorKind::AttributeError,
        ErrorKind::ZeroDivisionError,
        ErrorKind::AssertionError,
        ErrorKind::RecursionError,
        ErrorKind::RuntimeError,
        ErrorKind::MemoryError,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ErrorKind::Exception => "Exception",
            ErrorKind::NameError => "NameError",
            ErrorKind::TypeError => "TypeError",
            ErrorKind::ValueError => "ValueError",
            ErrorKind::IndexError => "IndexError",
            ErrorKind::KeyError => "KeyError",
            ErrorKind::AttributeError => "AttributeError",
            ErrorKind::ZeroDivisionError => "ZeroDivisionError",
            ErrorKind::AssertionError => "AssertionError",
            ErrorKind::RecursionError => "RecursionError",
            ErrorKind::RuntimeError => "RuntimeError",
            ErrorKind::MemoryError => "MemoryError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone)]
pub struct Exception {
    /// Class name, e.g. `TypeError` or a user class.
    pub kind: String,

    pub message: String,

    /// The object the script raised, if any. Errors produced by the
    /// interpreter itself are materialised lazily when bound with `as`.
    pub value: Option<Value>,

    /// Line of the statement where the exception surfaced.
    pub line: Option<usize>,
}

impl Exception {
    pub fn new<S: Into<String>>(kind: ErrorKind, message: S) -> Self {
        Self {
            kind: kind.name().to_string(),
            message: message.into(),
            value: None,
            line: None,
        }
    }

    pub fn name_error<S: Into<String>>(message: S) -> Self {
        Self::new(ErrorKind::NameError, message)
    }

    pub fn type_error<S: Into<String>>(message: S) -> Self {
        Self::new(ErrorKind::TypeError, message)
    }

    pub fn value_error<S: Into<String>>(message: S) -> Self {
        Self::new(ErrorKind::ValueError, message)
    }

    pub fn index_error<S: Into<String>>(message: S) -> Self {
        Self::new(ErrorKind::IndexError, message)
    }

    pub fn key_error<S: Into<String>>(message: S) -> Self {
        Self::new(ErrorKind::KeyError, message)
    }

    pub fn attribute_error<S: Into<String>>(message: S) -> Self {
        Self::new(ErrorKind::AttributeError, message)
    }

    pub fn zero_division<S: Into<String>>(message: S) -> Self {
        Self::new(ErrorKind::ZeroDivisionError, message)
    }

    pub fn memory_error<S: Into<String>>(message: S) -> Self {
        Self::new(ErrorKind::MemoryError, message)
    }

    /// Wraps a value passed to `raise`.
    pub fn from_value(value: Value) -> Self {
        match &value {
            Value::Instance(instance) => Self {
                kind: instance.class.name.clone(),
                message: instance
                    .field("message")
                    .map(|m| m.to_string())
                    .unwrap_or_default(),
                value: Some(value.clone()),
                line: None,
            },

            other => Self {
                kind: ErrorKind::Exception.name().to_string(),
                message: other.to_string(),
                value: Some(value.clone()),
                line: None,
            },
        }
    }

    /// Records the line once; the innermost statement wins.
    pub fn at_line(mut self, line: usize) -> Self {
        if self.line.is_none() {
            self.line = Some(line);
        }
        self
    }

    /// Does an `except <class>` clause catch this exception?
    pub fn is_instance_of(&self, class: &ClassObject) -> bool {
        if class.name == ErrorKind::Exception.name() || class.name == "BaseException" {
            return true;
        }

        match &self.value {
            Some(Value::Instance(instance)) => instance.class.is_subclass_of(&class.name),
            _ => self.kind == class.name,
        }
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{}: {}", self.kind, self.message)
        }
    }
}
