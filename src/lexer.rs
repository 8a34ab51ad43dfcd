//! Module `lexer` implements a one‑pass, streaming lexer for Typthon source.
//!
//! Python‑style block structure is recovered from leading whitespace: the
//! lexer keeps a stack of indentation widths and synthesises `INDENT`,
//! `DEDENT` and `NEWLINE` tokens around the ordinary ones.
//!
//! # Public API
//!
//! - `Lexer::new(src: &'a str) -> Lexer<'a>`
//!   Create a new lexer over the source text.
//!
//! - `Lexer::next_token(&mut self) -> Result<Token>`
//!   Pull exactly one token. Once input is exhausted every call returns `END`.
//!
//! - `impl Iterator for Lexer<'a>`
//!   Yields `Result<Token, TypthonError>` up to and including the first `END`,
//!   then stops. Fused.
//!
//! # Core Phases
//!
//! 1. **Line start**
//!    - Measure leading spaces (a tab advances to the next multiple of 8).
//!    - Blank and comment‑only lines are swallowed without emitting anything.
//!    - Compare the width to the top of the indent stack: deeper pushes and
//!      queues one `INDENT`, shallower pops and queues one `DEDENT` per level.
//!      A width that matches no stack entry is a lexical error.
//!
//! 2. **Token Recognition** (`scan_token`)
//!    - Symbols: `(`, `)`, `[`, `]`, `{`, `}`, `,`, `:`, `.`, `;`.
//!    - Operators, longest match first: `**=`, `//=`, `**`, `//`, `==`, `!=`,
//!      `<=`, `>=`, `->`, `+=`, `-=`, `*=`, `/=`, `%=`, then single characters.
//!    - String literals in `'` or `"`, optionally triple‑quoted.
//!    - Numeric literals: digits with an optional single fractional part.
//!    - Identifiers/keywords, resolved via a perfect‑hash `KEYWORDS` set.
//!
//! 3. **Line end**
//!    - A `\n` outside brackets closes the logical line with `NEWLINE` (only
//!      if the line produced tokens). Inside brackets it is ignored.
//!
//! 4. **End of input**
//!    - Emit a pending `NEWLINE`, one `DEDENT` per open level, then `END`.
//!
//! # Example
//!
//! ```rust
//! use typthon::lexer::Lexer;
//!
//! let source = "if x:\n    y = 1\n";
//! for result in Lexer::new(source) {
//!     match result {
//!         Ok(token) => println!("{}", token),
//!         Err(err) => eprintln!("Lex error: {}", err),
//!     }
//! }
//! ```

use crate::error::{Result, TypthonError};
use crate::token::{Token, TokenType};
use log::{debug, info};
use memchr::memchr;
use phf::phf_set;
use std::collections::VecDeque;
use std::iter::FusedIterator;

// ─────────────────────────────────────────────────────────────────────────────
// Static keyword set (compile‑time perfect hash)
// ─────────────────────────────────────────────────────────────────────────────

static KEYWORDS: phf::Set<&'static str> = phf_set! {
    "False", "None", "True", "and", "as", "assert", "await", "break",
    "class", "continue", "def", "elif", "else", "except", "finally", "for",
    "from", "global", "if", "import", "in", "is", "lambda", "nonlocal",
    "not", "or", "pass", "raise", "return", "try", "while", "with", "yield",
};

/// Returns `true` when `word` is reserved.
pub fn is_keyword(word: &str) -> bool {
    KEYWORDS.contains(word)
}

const TAB_WIDTH: usize = 8;

/// A streaming, indentation‑aware lexer.
pub struct Lexer<'a> {
    src: &'a str,
    bytes: &'a [u8],
    start: usize,                // first byte of the current lexeme
    curr: usize,                 // one past the last byte examined
    line: usize,                 // 1‑based line counter
    at_line_start: bool,         // next byte begins a physical line
    line_has_tokens: bool,       // current logical line emitted something
    nesting: usize,              // open (), [], {} pairs
    indent_stack: Vec<usize>,    // always starts with 0
    pending: VecDeque<Token>,    // synthesised tokens waiting to be emitted
    exhausted: bool,             // EOF layout has been queued
    fused: bool,                 // iterator already yielded END
}

impl<'a> Lexer<'a> {
    /// Create a new lexer over `src`.
    #[inline]
    pub fn new(src: &'a str) -> Self {
        info!("Lexer created over {} bytes", src.len());

        Self {
            src,
            bytes: src.as_bytes(),
            start: 0,
            curr: 0,
            line: 1,
            at_line_start: true,
            line_has_tokens: false,
            nesting: 0,
            indent_stack: vec![0],
            pending: VecDeque::new(),
            exhausted: false,
            fused: false,
        }
    }

    /// Pull the next token. After the input is exhausted this keeps
    /// returning `END`.
    pub fn next_token(&mut self) -> Result<Token> {
        loop {
            if let Some(token) = self.pending.pop_front() {
                return Ok(token);
            }

            if self.exhausted {
                return Ok(Token::layout(TokenType::END, self.line));
            }

            if self.at_line_start && self.nesting == 0 {
                if let Some(width) = self.measure_indent() {
                    self.emit_indentation(width)?;
                }

                continue;
            }

            if self.is_at_end() {
                self.finish();
                continue;
            }

            self.start = self.curr;

            if let Some(token) = self.scan_token()? {
                if token.kind != TokenType::NEWLINE {
                    self.line_has_tokens = true;
                }

                return Ok(token);
            }
        }
    }

    // ───────────────────────────── primitive helpers ────────────────────────

    #[inline(always)]
    fn is_at_end(&self) -> bool {
        self.curr >= self.bytes.len()
    }

    #[inline(always)]
    fn advance(&mut self) -> u8 {
        let b = self.bytes[self.curr];
        self.curr += 1;
        b
    }

    /// Peek at the current byte; `0` past EOF.
    #[inline(always)]
    fn peek(&self) -> u8 {
        self.bytes.get(self.curr).copied().unwrap_or(0)
    }

    #[inline(always)]
    fn peek_next(&self) -> u8 {
        self.bytes.get(self.curr + 1).copied().unwrap_or(0)
    }

    #[inline(always)]
    fn match_byte(&mut self, expected: u8) -> bool {
        if !self.is_at_end() && self.peek() == expected {
            self.curr += 1;
            true
        } else {
            false
        }
    }

    #[inline]
    fn lexeme(&self) -> &'a str {
        &self.src[self.start..self.curr]
    }

    /// Jump to the next `\n` (not consuming it), or to EOF.
    fn skip_comment(&mut self) {
        match memchr(b'\n', &self.bytes[self.curr..]) {
            Some(pos) => self.curr += pos,
            None => self.curr = self.bytes.len(),
        }
    }

    // ───────────────────────────── indentation ──────────────────────────────

    /// Consume leading whitespace of a physical line. Returns the width when
    /// the line carries code, `None` for blank/comment lines and at EOF.
    fn measure_indent(&mut self) -> Option<usize> {
        let mut width = 0;

        loop {
            match self.peek() {
                b' ' => width += 1,
                b'\t' => width = (width / TAB_WIDTH + 1) * TAB_WIDTH,
                b'\r' | 0x0c => {}
                _ => break,
            }

            self.curr += 1;
        }

        if self.is_at_end() {
            self.at_line_start = false;
            return None;
        }

        match self.peek() {
            b'\n' => {
                self.curr += 1;
                self.line += 1;
                None
            }

            b'#' => {
                self.skip_comment();
                None
            }

            _ => {
                self.at_line_start = false;
                Some(width)
            }
        }
    }

    fn emit_indentation(&mut self, width: usize) -> Result<()> {
        let top = self.indent_stack.last().copied().unwrap_or(0);

        if width > top {
            debug!("Indent {} -> {} on line {}", top, width, self.line);

            self.indent_stack.push(width);
            self.pending
                .push_back(Token::layout(TokenType::INDENT, self.line));
        } else if width < top {
            while let Some(&level) = self.indent_stack.last() {
                if level <= width {
                    break;
                }

                self.indent_stack.pop();
                self.pending
                    .push_back(Token::layout(TokenType::DEDENT, self.line));
            }

            if self.indent_stack.last().copied().unwrap_or(0) != width {
                return Err(TypthonError::lex(
                    self.line,
                    format!(
                        "Unindent to column {} does not match any outer indentation level",
                        width
                    ),
                ));
            }

            debug!("Dedent to {} on line {}", width, self.line);
        }

        Ok(())
    }

    /// Queue the closing layout tokens once input runs out.
    fn finish(&mut self) {
        if self.line_has_tokens {
            self.line_has_tokens = false;
            self.pending
                .push_back(Token::layout(TokenType::NEWLINE, self.line));
        }

        while self.indent_stack.len() > 1 {
            self.indent_stack.pop();
            self.pending
                .push_back(Token::layout(TokenType::DEDENT, self.line));
        }

        debug!("Input exhausted at line {}", self.line);

        self.exhausted = true;
    }

    // ───────────────────────────── core lexing ─────────────────────────────

    /// Scan a *single* lexeme at `self.curr`. Whitespace, comments and
    /// swallowed newlines yield `Ok(None)`.
    fn scan_token(&mut self) -> Result<Option<Token>> {
        let b = self.advance();

        let kind = match b {
            b' ' | b'\t' | b'\r' | 0x0c => return Ok(None),

            b'\n' => {
                let line = self.line;
                self.line += 1;

                if self.nesting > 0 {
                    return Ok(None);
                }

                self.at_line_start = true;

                if self.line_has_tokens {
                    self.line_has_tokens = false;
                    return Ok(Some(Token::layout(TokenType::NEWLINE, line)));
                }

                return Ok(None);
            }

            // explicit line continuation
            b'\\' if self.peek() == b'\n' => {
                self.curr += 1;
                self.line += 1;
                return Ok(None);
            }

            b'#' => {
                self.skip_comment();
                return Ok(None);
            }

            b'(' | b'[' | b'{' => {
                self.nesting += 1;
                TokenType::SYMBOL
            }

            b')' | b']' | b'}' => {
                self.nesting = self.nesting.saturating_sub(1);
                TokenType::SYMBOL
            }

            b',' | b':' | b'.' | b';' => TokenType::SYMBOL,

            // `*`, `**`, `*=`, `**=` and the `/` family alike
            b'*' | b'/' => {
                self.match_byte(b);
                self.match_byte(b'=');
                TokenType::OPERATOR
            }

            b'-' => {
                if !self.match_byte(b'>') {
                    self.match_byte(b'=');
                }
                TokenType::OPERATOR
            }

            b'+' | b'%' | b'=' | b'<' | b'>' => {
                self.match_byte(b'=');
                TokenType::OPERATOR
            }

            b'!' => {
                if !self.match_byte(b'=') {
                    return Err(TypthonError::lex(self.line, "Unexpected character: !"));
                }
                TokenType::OPERATOR
            }

            b'"' | b'\'' => return self.read_string(b).map(Some),

            b'0'..=b'9' => {
                self.read_number();
                TokenType::NUMBER
            }

            b'a'..=b'z' | b'A'..=b'Z' | b'_' => return Ok(Some(self.read_identifier())),

            _ => {
                // re‑align on a char boundary so multi‑byte input is reported whole
                let ch = self.src[self.start..].chars().next().unwrap_or('?');
                self.curr = self.start + ch.len_utf8();

                return Err(TypthonError::lex(
                    self.line,
                    format!("Unexpected character: {}", ch),
                ));
            }
        };

        Ok(Some(Token::new(kind, self.lexeme(), self.line)))
    }

    /// Read a string literal whose opening quote was already consumed.
    fn read_string(&mut self, quote: u8) -> Result<Token> {
        let start_line = self.line;
        let triple = self.peek() == quote && self.peek_next() == quote;

        if triple {
            self.curr += 2;
        }

        let mut text: Vec<u8> = Vec::new();

        loop {
            if self.is_at_end() {
                return Err(TypthonError::lex(start_line, "Unterminated string."));
            }

            let b = self.advance();

            match b {
                b'\n' if !triple => {
                    self.line += 1;
                    self.at_line_start = self.nesting == 0;
                    return Err(TypthonError::lex(start_line, "Unterminated string."));
                }

                b'\n' => {
                    self.line += 1;
                    text.push(b'\n');
                }

                b'\\' => {
                    if self.is_at_end() {
                        return Err(TypthonError::lex(start_line, "Unterminated string."));
                    }

                    match self.advance() {
                        b'n' => text.push(b'\n'),
                        b't' => text.push(b'\t'),
                        b'r' => text.push(b'\r'),
                        b'0' => text.push(0),
                        b'\\' => text.push(b'\\'),
                        b'\'' => text.push(b'\''),
                        b'"' => text.push(b'"'),
                        b'\n' => self.line += 1,
                        other => {
                            text.push(b'\\');
                            text.push(other);
                        }
                    }
                }

                _ if b == quote => {
                    if !triple {
                        break;
                    }

                    if self.peek() == quote && self.peek_next() == quote {
                        self.curr += 2;
                        break;
                    }

                    text.push(b);
                }

                _ => text.push(b),
            }
        }

        // Escapes only ever replace ASCII, so the bytes stay valid UTF‑8.
        let text = String::from_utf8(text).map_err(|e| TypthonError::lex(start_line, e.to_string()))?;

        Ok(Token::new(TokenType::STRING, text, start_line))
    }

    /// Digits with at most one fractional part (`123`, `3.14`).
    fn read_number(&mut self) {
        while self.peek().is_ascii_digit() {
            self.curr += 1;
        }

        if self.peek() == b'.' && self.peek_next().is_ascii_digit() {
            self.curr += 1;

            while self.peek().is_ascii_digit() {
                self.curr += 1;
            }
        }
    }

    fn read_identifier(&mut self) -> Token {
        while {
            let c: u8 = self.peek();
            c.is_ascii_alphanumeric() || c == b'_'
        } {
            self.curr += 1;
        }

        let text = self.lexeme();
        let kind = if is_keyword(text) {
            TokenType::KEYWORD
        } else {
            TokenType::IDENTIFIER
        };

        Token::new(kind, text, self.line)
    }
}

// ───────────────────────── Iterator implementation ─────────────────────────

impl<'a> Iterator for Lexer<'a> {
    type Item = Result<Token>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.fused {
            return None;
        }

        match self.next_token() {
            Ok(token) => {
                if token.kind == TokenType::END {
                    self.fused = true;
                }

                Some(Ok(token))
            }

            Err(e) => Some(Err(e)),
        }
    }
}

impl<'a> FusedIterator for Lexer<'a> {}
