//! Diagnostics collection for metadata processing and tree rewriting.
//!
//! This module provides types for collecting and reporting diagnostic messages
//! while metadata rules are scanned, parsed and applied to a GIR tree. The
//! rewrite engine is deliberately lenient: a malformed glob, an unparseable
//! rule or a rule that matches nothing must be reported but must never abort
//! the generation of an entire library.
//!
//! # Architecture
//!
//! The diagnostics container is shared across the pipeline:
//! - **Scanner**: reports lexical issues (unterminated strings/comments)
//! - **Parser**: reports grammar violations (unexpected tokens)
//! - **Matcher**: reports unmatched rules, invalid globs, failed reparents
//!
//! The [`Diagnostics`] container uses `boxcar::Vec` for thread-safe,
//! lock-free append operations, so diagnostics can be collected without
//! synchronization overhead even when several repositories are processed
//! from different threads.
//!
//! # Usage Examples
//!
//! ```rust
//! use girscope::diagnostics::{Diagnostics, DiagnosticCategory};
//!
//! let diagnostics = Diagnostics::new();
//!
//! diagnostics.warning(
//!     DiagnosticCategory::Rule,
//!     "Gtk-4.0.metadata: 12: Rule 'Button.clicked' does not match anything",
//! );
//!
//! if diagnostics.has_warnings() {
//!     for entry in diagnostics.iter() {
//!         println!("{entry}");
//!     }
//! }
//! ```

use std::fmt;

/// Severity level of a diagnostic entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticSeverity {
    /// Informational message, not indicating a problem.
    Info,

    /// Warning about a rule or pattern that had no effect.
    ///
    /// Processing continues; the rule is treated as a no-op. Typical
    /// examples: a rule that matched zero nodes, a reparent target that
    /// could not be resolved.
    Warning,

    /// Error indicating malformed input.
    ///
    /// Processing still continues — the offending rule or token is skipped
    /// and the scanner/parser resynchronizes — but the metadata file needs
    /// fixing. Typical examples: unterminated string literals, unexpected
    /// tokens, invalid glob patterns.
    Error,
}

impl fmt::Display for DiagnosticSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticSeverity::Info => write!(f, "INFO"),
            DiagnosticSeverity::Warning => write!(f, "WARN"),
            DiagnosticSeverity::Error => write!(f, "ERROR"),
        }
    }
}

/// Category indicating the source of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticCategory {
    /// Lexical issues in a metadata file.
    ///
    /// Examples: unexpected characters, unterminated strings or comments.
    Scanner,

    /// Grammar violations while building the rule tree.
    ///
    /// Examples: a missing pattern after a leading dot, an unexpected token
    /// where an identifier was required.
    Parser,

    /// Issues while matching or applying a rule.
    ///
    /// Examples: a rule that matches no nodes, an attribute value missing
    /// at end of line.
    Rule,

    /// Issues with glob-to-regex compilation.
    Glob,

    /// Issues while relocating a node to a different parent.
    ///
    /// Examples: the target type or namespace does not exist.
    Reparent,
}

impl fmt::Display for DiagnosticCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticCategory::Scanner => write!(f, "Scanner"),
            DiagnosticCategory::Parser => write!(f, "Parser"),
            DiagnosticCategory::Rule => write!(f, "Rule"),
            DiagnosticCategory::Glob => write!(f, "Glob"),
            DiagnosticCategory::Reparent => write!(f, "Reparent"),
        }
    }
}

/// A single diagnostic entry.
///
/// The message carries its own source context (file name and line number)
/// where one is available, formatted as `"file: line: message"` the way the
/// scanner and parser produce it.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    /// Severity level of this diagnostic.
    pub severity: DiagnosticSeverity,

    /// Category indicating the source of this diagnostic.
    pub category: DiagnosticCategory,

    /// Human-readable description of the issue.
    pub message: String,
}

impl Diagnostic {
    /// Creates a new diagnostic entry.
    pub fn new(
        severity: DiagnosticSeverity,
        category: DiagnosticCategory,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            category,
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity, self.category, self.message)
    }
}

/// Thread-safe container for collecting diagnostic entries.
///
/// Uses `boxcar::Vec` internally for lock-free concurrent append operations.
/// Multiple threads can safely add diagnostics simultaneously.
#[derive(Debug, Default)]
pub struct Diagnostics {
    entries: boxcar::Vec<Diagnostic>,
}

impl Diagnostics {
    /// Creates a new empty diagnostics container.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: boxcar::Vec::new(),
        }
    }

    /// Adds an informational diagnostic.
    pub fn info(&self, category: DiagnosticCategory, message: impl Into<String>) {
        self.push(Diagnostic::new(DiagnosticSeverity::Info, category, message));
    }

    /// Adds a warning diagnostic.
    pub fn warning(&self, category: DiagnosticCategory, message: impl Into<String>) {
        self.push(Diagnostic::new(
            DiagnosticSeverity::Warning,
            category,
            message,
        ));
    }

    /// Adds an error diagnostic.
    pub fn error(&self, category: DiagnosticCategory, message: impl Into<String>) {
        self.push(Diagnostic::new(
            DiagnosticSeverity::Error,
            category,
            message,
        ));
    }

    /// Adds a diagnostic entry directly.
    pub fn push(&self, diagnostic: Diagnostic) {
        self.entries.push(diagnostic);
    }

    /// Returns true if any diagnostics have been collected.
    pub fn has_any(&self) -> bool {
        self.entries.count() > 0
    }

    /// Returns true if any error-level diagnostics have been collected.
    pub fn has_errors(&self) -> bool {
        self.entries
            .iter()
            .any(|(_, d)| d.severity == DiagnosticSeverity::Error)
    }

    /// Returns true if any warning-level diagnostics have been collected.
    pub fn has_warnings(&self) -> bool {
        self.entries
            .iter()
            .any(|(_, d)| d.severity == DiagnosticSeverity::Warning)
    }

    /// Returns the total number of diagnostics.
    pub fn count(&self) -> usize {
        self.entries.count()
    }

    /// Returns the number of error-level diagnostics.
    pub fn error_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|(_, d)| d.severity == DiagnosticSeverity::Error)
            .count()
    }

    /// Returns the number of warning-level diagnostics.
    pub fn warning_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|(_, d)| d.severity == DiagnosticSeverity::Warning)
            .count()
    }

    /// Returns an iterator over all diagnostics.
    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter().map(|(_, d)| d)
    }

    /// Returns diagnostics filtered by category.
    pub fn by_category(&self, category: DiagnosticCategory) -> Vec<&Diagnostic> {
        self.entries
            .iter()
            .filter(|(_, d)| d.category == category)
            .map(|(_, d)| d)
            .collect()
    }
}
