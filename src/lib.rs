// Copyright 2025 The girscope developers
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![allow(dead_code)]

//! # girscope
//!
//! A framework for loading, patching and analyzing GObject-Introspection
//! (GIR) interface models, together with the runtime support layer that
//! generated bindings use to manage native object lifetimes.
//!
//! ## Features
//!
//! - **📐 Attributed tree model** - Typed, attributed GIR elements in an
//!   arena with cheap handles and safe reparenting
//! - **✏️ Metadata rule engine** - A small line-oriented DSL for correcting
//!   introspection data before code generation, with lenient, diagnostic-
//!   collecting error handling
//! - **🩹 Programmatic patches** - Structural edits expressed in code and
//!   folded over the tree in registration order
//! - **♻️ Instance cache** - One live proxy per native object address,
//!   coordinated with native reference counting via toggle notifications
//! - **🗂️ Type registry** - Dynamic-type-driven proxy construction with
//!   race-free registration
//! - **🧹 Memory cleaner** - Ownership-tracked cleanup for value types
//!
//! ## Quick Start
//!
//! Add `girscope` to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! girscope = "0.2"
//! ```
//!
//! ### Correcting a GIR tree
//!
//! ```rust
//! use girscope::prelude::*;
//!
//! let mut library = Library::new();
//! let repository = library.add_repository();
//! let namespace = library.add_child_with(
//!     repository,
//!     ElementKind::Namespace,
//!     [("name", "Gtk"), ("version", "4.0")],
//! );
//! let button = library.add_child_with(namespace, ElementKind::Class, [("name", "Button")]);
//!
//! let diagnostics = Diagnostics::new();
//! let rules = Parser::new("Gtk-4.0.metadata", "Gtk.Button deprecated=1", &diagnostics).parse();
//! girscope::metadata::apply(&rules, &mut library, &diagnostics);
//!
//! assert_eq!(library.node(button).attr("deprecated"), Some("1"));
//! ```
//!
//! ### Managing native instances
//!
//! ```rust
//! use std::sync::Arc;
//! use girscope::prelude::*;
//! use girscope::runtime::testing::MockBackend;
//!
//! let backend = Arc::new(MockBackend::new());
//! let ty = backend.define_type(NativeType::NONE);
//! let address = backend.allocate(ty);
//!
//! let cache = InstanceCache::new(backend, Arc::new(TypeRegistry::new()));
//! let first = cache.get_for_type(address, Some(|a| ObjectProxy::new(a))).unwrap();
//! let second = cache.get_for_type(address, Some(|a| ObjectProxy::new(a))).unwrap();
//! assert!(Arc::ptr_eq(&first, &second));
//! ```
//!
//! ## Architecture
//!
//! `girscope` is organized into several key modules:
//!
//! - [`prelude`] - Convenient re-exports of commonly used types and traits
//! - [`gir`] - The attributed tree model for parsed GIR repositories
//! - [`metadata`] - The metadata DSL: scanner, parser, rules, glob
//!   matching and rule application
//! - [`patch`] - Programmatic structural patches
//! - [`runtime`] - Instance cache, type registry and memory cleaner
//! - [`diagnostics`] - Lenient, lock-free diagnostics collection
//! - [`Error`] and [`Result`] - Error handling for recoverable conditions
//!
//! The XML front-end that parses `.gir` files into the tree model, and the
//! code emission that turns corrected trees into source code, are separate
//! concerns and live outside this crate.

pub mod diagnostics;
pub mod gir;
pub mod metadata;
pub mod patch;
pub mod prelude;
pub mod runtime;

mod error;

pub use diagnostics::Diagnostics;
pub use error::{Error, Result};
