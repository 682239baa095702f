//! Runtime support layer for generated bindings: native object lifetime
//! and identity management.
//!
//! Generated binding code does not manage native memory itself; it goes
//! through this module. Three cooperating pieces cover the whole lifecycle
//! of a native object's managed wrapper:
//!
//! - [`InstanceCache`] - one live proxy per native address, kept in sync
//!   with the native reference count through toggle notifications
//! - [`TypeRegistry`] - maps native type identifiers to proxy
//!   constructors, so the dynamic type of an object picks its wrapper
//! - [`MemoryCleaner`] - ownership-tracked cleanup for value types that
//!   are not reference counted
//!
//! The native library itself is reached through the [`NativeBackend`]
//! trait; [`testing::MockBackend`] provides an in-memory simulation for
//! tests.
//!
//! # Process-wide state
//!
//! A real process has exactly one native library, so cache, registry and
//! cleaner are process-wide singletons: install the backend once with
//! [`init`], then use [`instance_cache`], [`type_registry`] and
//! [`memory_cleaner`]. They are initialized on first use, live for the
//! process lifetime and are never torn down. Libraries and tests that
//! need isolated state construct [`InstanceCache`] and friends directly
//! instead.
//!
//! # Concurrency
//!
//! Any thread calling into the native library may trigger cache lookups
//! and insertions. All shared state lives in concurrent maps with
//! per-entry locking; state transitions are linearizable per address and
//! operations on distinct addresses do not contend. The construction
//! stack is thread-local and needs no synchronization.
//!
//! # Failure semantics
//!
//! Native call failures on the toggle-reference and finalizer paths are
//! *fatal* and panic with the address and call name. These paths run while
//! a proxy is being dropped, where no caller can recover, and carrying on
//! could free memory that is still referenced — a worse outcome than a
//! crash.

mod backend;
mod cache;
mod cleaner;
mod proxy;
mod registry;
pub mod testing;

pub use backend::{NativeBackend, NativeType, RawPointer, ToggleNotify};
pub use cache::{InstanceCache, RefState};
pub use cleaner::MemoryCleaner;
pub use proxy::{ObjectProxy, Proxy, ProxyBase, ProxyKind};
pub use registry::{Constructor, TypeRegistry};

use std::sync::{Arc, OnceLock};

static BACKEND: OnceLock<Arc<dyn NativeBackend>> = OnceLock::new();
static REGISTRY: OnceLock<Arc<TypeRegistry>> = OnceLock::new();
static CACHE: OnceLock<InstanceCache> = OnceLock::new();
static CLEANER: OnceLock<MemoryCleaner> = OnceLock::new();

/// Install the process-wide native backend.
///
/// The first call wins; later calls are ignored and return `false`. Must
/// happen before the first use of [`instance_cache`] or [`memory_cleaner`].
pub fn init(backend: Arc<dyn NativeBackend>) -> bool {
    BACKEND.set(backend).is_ok()
}

/// The installed process-wide backend.
///
/// # Panics
///
/// Panics when [`init`] has not been called yet.
pub fn backend() -> &'static Arc<dyn NativeBackend> {
    BACKEND
        .get()
        .expect("runtime::init must be called before using the runtime singletons")
}

/// The process-wide type registry. Available before [`init`]: type
/// registration happens during module initialization, possibly earlier
/// than backend installation.
pub fn type_registry() -> &'static Arc<TypeRegistry> {
    REGISTRY.get_or_init(|| Arc::new(TypeRegistry::new()))
}

/// The process-wide instance cache, created on first use from the
/// installed backend.
///
/// # Panics
///
/// Panics when [`init`] has not been called yet.
pub fn instance_cache() -> &'static InstanceCache {
    CACHE.get_or_init(|| InstanceCache::new(Arc::clone(backend()), Arc::clone(type_registry())))
}

/// The process-wide memory cleaner, created on first use from the
/// installed backend.
///
/// # Panics
///
/// Panics when [`init`] has not been called yet.
pub fn memory_cleaner() -> &'static MemoryCleaner {
    CLEANER.get_or_init(|| MemoryCleaner::new(Arc::clone(backend())))
}
