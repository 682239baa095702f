//! Lexical scanner for metadata files, loosely based on the scanner design
//! from chapter 4 of "Crafting Interpreters" by Robert Nystrom.
//!
//! The scanner reads an input string and turns it into a stream of tokens,
//! which the parser consumes to build a list of metadata rules. It is used
//! in a loop that requests tokens with [`Scanner::next_token`] until
//! [`TokenKind::Eof`] is returned.
//!
//! Malformed input (unexpected characters, unterminated strings or
//! comments) is reported to the shared [`Diagnostics`] container with file
//! name and line number, and scanning resynchronizes; lexical errors never
//! abort processing of a metadata file.

use crate::diagnostics::{DiagnosticCategory, Diagnostics};

/// The type of a scanned token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// `.` — introduces a nested or relative rule
    Dot,
    /// `=` — separates an argument name from its value
    Equal,
    /// `#` — introduces a type selector
    Hash,
    /// Identifiers: letters, digits and `()_-:?*{},`
    Identifier,
    /// A double-quoted string; a backslash escapes the quote only
    Str,
    /// End of line — significant, it terminates a rule
    Newline,
    /// End of input; returned for every request past the end
    Eof,
}

/// A single scanned token with its text and source position.
#[derive(Debug, Clone)]
pub struct Token {
    /// The token type
    pub kind: TokenKind,
    /// The token text; for strings, without the surrounding quotes
    pub text: String,
    /// Character position in the input, for line-number computation
    pub position: usize,
}

/// Lexical scanner for the metadata DSL.
pub struct Scanner<'a> {
    filename: &'a str,
    chars: Vec<char>,
    start: usize,
    current: usize,
    diagnostics: &'a Diagnostics,
}

impl<'a> Scanner<'a> {
    /// Create a new lexical scanner.
    ///
    /// The filename is only used in diagnostic messages.
    pub fn new(filename: &'a str, contents: &str, diagnostics: &'a Diagnostics) -> Self {
        Self {
            filename,
            chars: contents.chars().collect(),
            start: 0,
            current: 0,
            diagnostics,
        }
    }

    /// The filename this scanner reads from.
    pub fn filename(&self) -> &str {
        self.filename
    }

    /// Start position of the token most recently returned.
    pub fn start(&self) -> usize {
        self.start
    }

    /// Scan and return the next token. Once the input is exhausted, every
    /// subsequent call returns an end-of-file token.
    pub fn next_token(&mut self) -> Token {
        loop {
            if self.is_at_end() {
                return self.make_token(TokenKind::Eof);
            }

            self.start = self.current;
            let c = self.advance();
            match c {
                ' ' | '\t' | '\r' => continue,
                '.' => return self.make_token(TokenKind::Dot),
                '=' => return self.make_token(TokenKind::Equal),
                '#' => return self.make_token(TokenKind::Hash),
                '\n' => return self.make_token(TokenKind::Newline),
                '"' => return self.scan_string(),
                '/' => {
                    if self.matches('/') {
                        self.skip_single_line_comment();
                    } else if self.matches('*') {
                        self.skip_multi_line_comment();
                    } else {
                        self.error("Unexpected character");
                    }
                }
                _ => {
                    if is_identifier_char(c) {
                        return self.scan_identifier();
                    }
                    self.error("Unexpected character");
                }
            }
        }
    }

    /// Get the 1-based line number for the given position.
    pub fn line_of(&self, position: usize) -> usize {
        1 + self
            .chars
            .iter()
            .take(position)
            .filter(|&&c| c == '\n')
            .count()
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.chars.len()
    }

    // Return the next char, and update the current position
    fn advance(&mut self) -> char {
        let c = self.chars[self.current];
        self.current += 1;
        c
    }

    // Return the next char, but don't update anything
    fn peek(&self) -> char {
        if self.is_at_end() {
            '\0'
        } else {
            self.chars[self.current]
        }
    }

    // Advance only if the next char matches expectation
    fn matches(&mut self, expected: char) -> bool {
        if self.peek() != expected {
            return false;
        }
        self.current += 1;
        true
    }

    fn scan_identifier(&mut self) -> Token {
        while is_identifier_char(self.peek()) {
            self.advance();
        }
        self.make_token(TokenKind::Identifier)
    }

    fn scan_string(&mut self) -> Token {
        while self.peek() != '"' && self.peek() != '\n' && !self.is_at_end() {
            let c = self.advance();
            if c == '\\' {
                // handle escaped quotes
                self.matches('"');
            }
        }

        if self.peek() == '\n' || self.is_at_end() {
            self.error("Unterminated string");
        } else {
            // The closing '"'
            self.advance();
        }

        // Trim the surrounding quotes
        let end = self.current.saturating_sub(1);
        let text: String = if end > self.start {
            self.chars[self.start + 1..end].iter().collect()
        } else {
            String::new()
        };
        Token {
            kind: TokenKind::Str,
            text,
            position: self.start,
        }
    }

    // Skip past a '// ...' comment
    fn skip_single_line_comment(&mut self) {
        while !self.is_at_end() && self.peek() != '\n' {
            self.advance();
        }
    }

    // Skip past a '/* ... */' comment
    fn skip_multi_line_comment(&mut self) {
        loop {
            if self.is_at_end() {
                self.error("Unterminated comment");
                return;
            }
            let c = self.advance();
            if c == '*' && self.matches('/') {
                return;
            }
        }
    }

    fn make_token(&self, kind: TokenKind) -> Token {
        Token {
            kind,
            text: self.chars[self.start..self.current].iter().collect(),
            position: self.current,
        }
    }

    fn error(&self, message: &str) {
        self.diagnostics.error(
            DiagnosticCategory::Scanner,
            format!(
                "{}: {}: {}",
                self.filename,
                self.line_of(self.start),
                message
            ),
        );
    }
}

fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || matches!(c, '(' | ')' | '_' | '-' | ':' | '?' | '*' | '{' | '}' | ',')
}
