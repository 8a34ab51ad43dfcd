pub mod ast;
pub mod ast_printer;
pub mod builtins;
pub mod environment;
pub mod error;
pub mod exception;
pub mod interpreter;
pub mod lexer;
pub mod parser;
pub mod resolver;
pub mod token;
pub mod types;
pub mod value;
