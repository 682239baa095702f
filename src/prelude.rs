//! # girscope Prelude
//!
//! This module provides a convenient prelude for the most commonly used
//! types and traits of the library. Import it to get quick access to the
//! essential pieces of both the tree-rewriting side and the runtime side.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all girscope operations
pub use crate::Error;

/// The result type used throughout girscope
pub use crate::Result;

/// Lock-free diagnostics collection for the rewrite pipeline
pub use crate::diagnostics::{Diagnostic, DiagnosticCategory, DiagnosticSeverity, Diagnostics};

// ================================================================================================
// Tree Model
// ================================================================================================

/// The attributed GIR tree model
pub use crate::gir::{ElementKind, Library, Node, NodeId, Platforms};

// ================================================================================================
// Metadata Rules and Patches
// ================================================================================================

/// Metadata DSL parsing and rule application
pub use crate::metadata::{load_rules, Glob, Parser, Rule};

/// Programmatic tree patches
pub use crate::patch::{apply_patches, Patch};

// ================================================================================================
// Runtime Support
// ================================================================================================

/// Native object lifetime management
pub use crate::runtime::{
    Constructor, InstanceCache, MemoryCleaner, NativeBackend, NativeType, ObjectProxy, Proxy,
    ProxyBase, ProxyKind, RawPointer, RefState, TypeRegistry,
};
