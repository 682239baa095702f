//! The metadata rule engine: a small line-oriented DSL for correcting GIR
//! trees before code generation.
//!
//! Introspection data is not always right — annotations are missing,
//! ownership transfer is declared wrong, some elements should simply be
//! skipped. Rather than hand-editing generated output, corrections are
//! written as *metadata rules*, one file per `(library, version)` pair,
//! and applied to the parsed tree.
//!
//! # Key Components
//!
//! - [`Scanner`] / [`Parser`] - Tokenize and parse metadata files into rules
//! - [`Rule`] - One pattern + selector + argument set + nested rules
//! - [`Glob`] - The two glob-to-regex compilation variants
//! - [`apply`] - Match rules against a tree and apply the edits
//! - [`load_rules`] - Resolve a `{Name}-{Version}.metadata` file on disk
//!
//! # Rule Language
//!
//! ```text
//! // Skip one function, rename another
//! Gtk.show_uri skip
//! Gtk.init name=initialize
//!
//! // Mark every method of TextBuffer as not deprecated
//! Gtk.TextBuffer.*#method deprecated=0
//!
//! // Relative rules: apply within the matched set of the root rule
//! Gtk.Window introspectable=0
//! .present skip
//! .close skip
//! ```
//!
//! Arguments without `=` default to `"1"`. The value `"()"` removes the
//! attribute. A `{{value}}` placeholder splices the previous attribute
//! value into the new one. The `girscope-parent` argument relocates matched
//! nodes to another type or namespace.
//!
//! # Error Handling
//!
//! Every malformed-input condition — lexical errors, grammar violations,
//! uncompilable patterns, rules that match nothing — is reported to a
//! shared [`crate::Diagnostics`] container with file and line context, and
//! the offending rule degrades to a no-op. Applying metadata never aborts a
//! library's generation.

mod glob;
mod matcher;
mod parser;
mod rule;
mod scanner;

pub use glob::Glob;
pub use matcher::{apply, REPARENT_KEY};
pub use parser::{load_rules, Parser};
pub use rule::Rule;
pub use scanner::{Scanner, Token, TokenKind};
