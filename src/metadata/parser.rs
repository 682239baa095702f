//! Parser for metadata files. The parser drives the [`Scanner`] to tokenize
//! the file contents, and builds a forest of metadata rules.
//!
//! Grammar:
//!
//! ```text
//! metadata ::= [ rule [ '\n' relativerule ]* ]
//! rule ::= pattern ' ' [ args ]
//! relativerule ::= '.' rule
//! pattern ::= glob [ '#' selector ] [ '.' pattern ]
//! args ::= ( identifier [ '=' ( string | identifier ) ] )*
//! ```
//!
//! All grammar violations are reported with file name and line number and
//! are non-fatal: the parser keeps what it understood, so one malformed
//! rule does not discard the rest of the file.

use std::path::Path;

use indexmap::IndexMap;

use crate::diagnostics::{DiagnosticCategory, Diagnostics};
use crate::metadata::scanner::{Scanner, Token, TokenKind};
use crate::metadata::Rule;
use crate::Result;

// A "root" rule can have multiple "relative" rules on the following lines.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Relation {
    Root,
    Relative,
}

/// Parser for metadata rule files.
pub struct Parser<'a> {
    scanner: Scanner<'a>,
    token: Token,
    diagnostics: &'a Diagnostics,
}

impl<'a> Parser<'a> {
    /// Create a parser over the given metadata file contents. The filename
    /// is only used in diagnostic messages.
    pub fn new(filename: &'a str, contents: &str, diagnostics: &'a Diagnostics) -> Self {
        let mut scanner = Scanner::new(filename, contents, diagnostics);
        let token = scanner.next_token();
        Self {
            scanner,
            token,
            diagnostics,
        }
    }

    /// Parse the metadata contents into a list of root rules. Loops until
    /// the entire input has been consumed.
    pub fn parse(&mut self) -> Vec<Rule> {
        let mut rules = Vec::new();
        while let Some(rule) = self.parse_rule(Relation::Root) {
            rules.push(rule);
        }
        rules
    }

    // Parse a rule, with all rules below it. Returns None at end of input.
    fn parse_rule(&mut self, relation: Relation) -> Option<Rule> {
        let mut selector = None;
        let mut children = Vec::new();
        let mut args: IndexMap<String, Option<String>> = IndexMap::new();

        // Skip empty lines
        while self.token.kind == TokenKind::Newline {
            self.advance();
        }

        // Skip leading '.'
        if self.token.kind == TokenKind::Dot {
            self.advance();
        }

        // End of file?
        if self.token.kind == TokenKind::Eof {
            return None;
        }

        // Read the glob pattern
        self.expect(&[TokenKind::Identifier]);
        let glob = self.token.text.clone();
        self.advance();

        // Read #selector
        if self.token.kind == TokenKind::Hash {
            self.advance();
            self.expect(&[TokenKind::Identifier]);
            selector = Some(self.token.text.clone());
            self.advance();
        }

        // Recursively parse rules on the same line
        if self.token.kind == TokenKind::Dot {
            if let Some(child) = self.parse_rule(relation) {
                children.push(child);
            }
            return Some(Rule::from_parts(glob, selector, args, children));
        }

        // Read argument names and values
        while self.token.kind == TokenKind::Identifier {
            let name = self.token.text.clone();
            self.advance();
            let mut value = None;
            if self.token.kind == TokenKind::Equal {
                self.advance();
                self.expect(&[TokenKind::Str, TokenKind::Identifier]);
                value = Some(self.token.text.clone());
                self.advance();
            }
            args.insert(name, value);
        }

        // We should be at the end of the line by now
        self.expect(&[TokenKind::Newline, TokenKind::Eof]);

        // Parse relative rules (starting with a dot) on following lines
        if relation == Relation::Root {
            loop {
                // Skip empty lines
                while self.token.kind == TokenKind::Newline {
                    self.advance();
                }

                // Scan relative rule
                if self.token.kind == TokenKind::Dot {
                    if let Some(child) = self.parse_rule(Relation::Relative) {
                        children.push(child);
                    }
                } else {
                    break;
                }
            }
        }

        Some(Rule::from_parts(glob, selector, args, children))
    }

    // Scan the next token
    fn advance(&mut self) {
        self.token = self.scanner.next_token();
    }

    // Report an error if the current token has none of the expected kinds.
    // Parsing continues with the current token either way.
    fn expect(&self, expected: &[TokenKind]) {
        if expected.contains(&self.token.kind) {
            return;
        }
        self.diagnostics.error(
            DiagnosticCategory::Parser,
            format!(
                "{}: {}: Invalid token {:?}, expected one of: {:?}",
                self.scanner.filename(),
                self.scanner.line_of(self.scanner.start()),
                self.token.kind,
                expected
            ),
        );
    }
}

/// Load and parse the metadata rules for a repository.
///
/// Metadata files are resolved by the fixed naming convention
/// `"{name}-{version}.metadata"` inside `dir`. A repository without a
/// metadata file is perfectly normal: the file's absence is not an error
/// and yields an empty rule list.
///
/// # Errors
///
/// Returns [`crate::Error::FileError`] when the file exists but cannot be
/// read.
pub fn load_rules(
    dir: &Path,
    name: &str,
    version: &str,
    diagnostics: &Diagnostics,
) -> Result<Vec<Rule>> {
    let filename = format!("{name}-{version}.metadata");
    let path = dir.join(&filename);

    if !path.exists() {
        // No metadata found for this repository
        return Ok(Vec::new());
    }

    let contents = std::fs::read_to_string(&path)?;
    Ok(Parser::new(&filename, &contents, diagnostics).parse())
}
