//! Registry of native type identifiers and proxy constructors.
//!
//! Using this registry, the correct proxy type is always instantiated for a
//! native object, based on its dynamic type rather than the static type of
//! whatever call returned it.
//!
//! # Thread Safety
//!
//! The registry is designed for first-use races during module
//! initialization: registration is insert-if-absent, so any number of
//! threads racing to register the same type converge on one winning
//! constructor, and lookups never block each other.

use dashmap::DashMap;

use crate::runtime::{NativeBackend, NativeType, Proxy, RawPointer};
use std::sync::Arc;

/// Constructor producing a proxy for a native address.
///
/// Registered once per proxy type, alongside the type's definition, instead
/// of being discovered dynamically.
pub type Constructor = fn(RawPointer) -> Arc<dyn Proxy>;

/// Maps native type identifiers to proxy constructors.
///
/// Populated when a proxy type is first registered or observed; consulted
/// by the instance cache whenever an address of a previously-unseen type
/// must be wrapped. Lives for the process lifetime and is never torn down.
///
/// # Examples
///
/// ```rust
/// use girscope::runtime::{Constructor, NativeType, ObjectProxy, TypeRegistry};
///
/// let registry = TypeRegistry::new();
/// let ctor: Constructor = |address| ObjectProxy::new(address);
///
/// registry.register(NativeType(7), ctor);
/// assert!(registry.lookup(NativeType(7)).is_some());
/// ```
#[derive(Debug, Default)]
pub struct TypeRegistry {
    constructors: DashMap<NativeType, Constructor>,
}

impl TypeRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a constructor for a native type.
    ///
    /// Insert-if-absent: when two threads race to register the same type,
    /// the first insertion wins and both observe the same constructor,
    /// which is returned.
    pub fn register(&self, ty: NativeType, ctor: Constructor) -> Constructor {
        *self.constructors.entry(ty).or_insert(ctor)
    }

    /// The constructor registered for exactly this type, if any.
    #[must_use]
    pub fn lookup(&self, ty: NativeType) -> Option<Constructor> {
        self.constructors.get(&ty).map(|entry| *entry)
    }

    /// Resolve a constructor for a native type.
    ///
    /// When the type itself has no registered constructor — an anonymous
    /// subtype, or a type from a library without generated bindings — the
    /// native parent-type chain is walked upwards and the nearest
    /// registered ancestor's constructor is adopted (and registered for
    /// the type, so the walk happens once). When the whole chain is
    /// unregistered, the fallback is registered and returned instead.
    ///
    /// Returns `None` only for [`NativeType::NONE`] or when no fallback is
    /// provided and nothing is registered.
    pub fn resolve(
        &self,
        backend: &dyn NativeBackend,
        ty: NativeType,
        fallback: Option<Constructor>,
    ) -> Option<Constructor> {
        if ty.is_none() {
            return None;
        }

        if let Some(ctor) = self.lookup(ty) {
            return Some(ctor);
        }

        let mut parent = backend.type_parent(ty);
        while !parent.is_none() {
            if let Some(ctor) = self.lookup(parent) {
                return Some(self.register(ty, ctor));
            }
            parent = backend.type_parent(parent);
        }

        fallback.map(|ctor| self.register(ty, ctor))
    }

    /// Number of registered types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.constructors.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.constructors.is_empty()
    }
}
