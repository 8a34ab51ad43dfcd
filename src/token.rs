use log::debug;
use serde::Serialize;
use std::fmt;

/// The different kinds of tokens recognized by the Typthon lexer.
///
/// Layout tokens (`NEWLINE`, `INDENT`, `DEDENT`) are synthesised from line
/// breaks and leading whitespace; they carry an empty `text`.
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TokenType {
    /// A user‑defined name
    IDENTIFIER,

    /// A numeric literal; `text` holds the digits as written
    NUMBER,

    /// A string literal; `text` holds the unescaped contents
    STRING,

    /// A reserved word such as `def` or `while`
    KEYWORD,

    /// Arithmetic, comparison and assignment operators
    OPERATOR,

    /// Punctuation: brackets, `,`, `:`, `.`, `;`
    SYMBOL,

    /// End of a logical line
    NEWLINE,

    /// Indentation increased
    INDENT,

    /// Indentation decreased by one level
    DEDENT,

    /// End‑of‑input marker, repeated forever once reached
    END,
}

impl TokenType {
    pub fn name(self) -> &'static str {
        match self {
            TokenType::IDENTIFIER => "IDENTIFIER",
            TokenType::NUMBER => "NUMBER",
            TokenType::STRING => "STRING",
            TokenType::KEYWORD => "KEYWORD",
            TokenType::OPERATOR => "OPERATOR",
            TokenType::SYMBOL => "SYMBOL",
            TokenType::NEWLINE => "NEWLINE",
            TokenType::INDENT => "INDENT",
            TokenType::DEDENT => "DEDENT",
            TokenType::END => "END",
        }
    }
}

/// A scanned token, including its kind, its text and the line number where
/// it was found.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Token {
    /// The category of this token.
    pub kind: TokenType,

    /// Lexeme text. Unescaped contents for strings, empty for layout tokens.
    pub text: String,

    /// 1‑based line number in the source.
    pub line: usize,
}

impl Token {
    pub fn new<S: Into<String>>(kind: TokenType, text: S, line: usize) -> Self {
        let text: String = text.into();

        debug!(
            "Creating new token: kind={:?}, text={:?}, line={}",
            kind, text, line
        );

        Self { kind, text, line }
    }

    /// Synthesised layout token with no text.
    pub fn layout(kind: TokenType, line: usize) -> Self {
        Self::new(kind, "", line)
    }

    #[inline]
    pub fn is(&self, kind: TokenType, text: &str) -> bool {
        self.kind == kind && self.text == text
    }

    #[inline]
    pub fn is_keyword(&self, word: &str) -> bool {
        self.is(TokenType::KEYWORD, word)
    }

    #[inline]
    pub fn is_operator(&self, op: &str) -> bool {
        self.is(TokenType::OPERATOR, op)
    }

    #[inline]
    pub fn is_symbol(&self, sym: &str) -> bool {
        self.is(TokenType::SYMBOL, sym)
    }

    /// Text used when the token shows up in a diagnostic.
    pub fn describe(&self) -> String {
        match self.kind {
            TokenType::NEWLINE => "newline".to_string(),
            TokenType::INDENT => "indent".to_string(),
            TokenType::DEDENT => "dedent".to_string(),
            TokenType::END => "end of input".to_string(),
            _ => self.text.clone(),
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TokenType::STRING => write!(f, "{} {:?}", self.kind.name(), self.text),
            TokenType::NEWLINE | TokenType::INDENT | TokenType::DEDENT | TokenType::END => {
                write!(f, "{}", self.kind.name())
            }
            _ => write!(f, "{} {}", self.kind.name(), self.text),
        }
    }
}
