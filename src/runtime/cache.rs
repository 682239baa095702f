//! The instance cache: one live proxy per native object address.
//!
//! Every proxy handed out for a reference-counted native object is
//! registered here, keyed by address, so that repeated sightings of the
//! same object resolve to the same proxy — address equality *is* object
//! identity.
//!
//! # Strong and weak states
//!
//! A cache entry is either strong (the cache keeps the proxy alive) or
//! weak (it does not). The state is driven exclusively by the native
//! object's toggle notification: while native code holds references beyond
//! the cache's own toggle reference, the entry is strong — the proxy must
//! not disappear while the native object can still surface. When the
//! toggle reference becomes the last one, the entry flips to weak and the
//! proxy lives only as long as callers hold it.
//!
//! # Finalization
//!
//! Dropping the last handle of a cached proxy runs its finalizer, which
//! removes the toggle reference from the native object and evicts the
//! cache entry. Toggle removal is not reentrant-safe in the native
//! library, so it is posted to the default main context whenever one is
//! running, and executed inline otherwise.
//!
//! # Failure semantics
//!
//! Native call failures on the toggle-install and finalizer paths are
//! fatal: they panic with the address and the failing call name. These
//! paths run during cleanup where no caller can handle an error, and
//! continuing would risk freeing memory that a live proxy still
//! references.

use std::cell::RefCell;
use std::sync::{Arc, Weak};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::runtime::{
    Constructor, NativeBackend, NativeType, Proxy, ProxyKind, RawPointer, ToggleNotify,
    TypeRegistry,
};

/// Observable state of a cache entry, for diagnostics and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefState {
    /// The cache holds the proxy alive.
    Strong,
    /// The cache tracks the proxy without keeping it alive.
    Weak,
}

// A strong or weak reference to a proxy. Toggle notifications flip cache
// entries between the two.
enum Ref {
    Strong(Arc<dyn Proxy>),
    Weak(Weak<dyn Proxy>),
}

impl Ref {
    fn get(&self) -> Option<Arc<dyn Proxy>> {
        match self {
            Ref::Strong(proxy) => Some(Arc::clone(proxy)),
            Ref::Weak(weak) => weak.upgrade(),
        }
    }

    fn to_weak(&self) -> Ref {
        match self {
            Ref::Strong(proxy) => Ref::Weak(Arc::downgrade(proxy)),
            Ref::Weak(weak) => Ref::Weak(Weak::clone(weak)),
        }
    }

    fn to_strong(&self, address: RawPointer) -> Ref {
        match self {
            Ref::Strong(proxy) => Ref::Strong(Arc::clone(proxy)),
            Ref::Weak(weak) => match weak.upgrade() {
                Some(proxy) => Ref::Strong(proxy),
                None => panic!(
                    "toggle re-ref for object {address:#x} found a dead proxy \
                     whose finalizer has not evicted the cache entry yet"
                ),
            },
        }
    }

    fn state(&self) -> RefState {
        match self {
            Ref::Strong(_) => RefState::Strong,
            Ref::Weak(_) => RefState::Weak,
        }
    }
}

// Frame of the thread-local construction stack: a proxy whose native
// instance is being constructed right now, and the type it was created as.
struct ConstructFrame {
    proxy: Arc<dyn Proxy>,
    ty: NativeType,
}

thread_local! {
    // Stack of proxies currently under construction on this thread: the
    // native allocation has been requested but has not returned an address
    // yet. A stack rather than a single slot, because constructing one
    // object can trigger the construction of another on the same thread.
    static CONSTRUCT_STACK: RefCell<Vec<ConstructFrame>> = const { RefCell::new(Vec::new()) };
}

pub(crate) struct CacheShared {
    backend: Arc<dyn NativeBackend>,
    registry: Arc<TypeRegistry>,
    references: DashMap<RawPointer, Ref>,
}

impl CacheShared {
    // Flip the cache entry for `address` between strong and weak. The
    // replaced value is dropped only after the map guard is released:
    // downgrading can release the last handle of the proxy, and its
    // finalizer must not re-enter the locked entry.
    fn toggle(&self, address: RawPointer, is_last_ref: bool) {
        let previous;
        {
            let Some(mut entry) = self.references.get_mut(&address) else {
                return;
            };
            let next = if is_last_ref {
                log::debug!("toggle {address:#x} to weak reference (is last ref)");
                entry.value().to_weak()
            } else {
                log::debug!("toggle {address:#x} to strong reference");
                entry.value().to_strong(address)
            };
            previous = std::mem::replace(entry.value_mut(), next);
        }
        drop(previous);
    }

    // Remove the toggle reference and evict the entry, once the proxy for
    // `address` has been dropped. Runs on the default main context when one
    // is active, because the native library does not allow toggle removal
    // from arbitrary threads.
    fn finalize(self: &Arc<Self>, address: RawPointer) {
        log::debug!("unref {address:#x}");
        let shared = Arc::clone(self);
        let cleanup = move || {
            if let Err(err) = shared.backend.remove_toggle_ref(address) {
                panic!("instance cache invariant violated during finalization: {err}");
            }
            shared.references.remove(&address);
        };

        if self.backend.main_context_active() {
            self.backend.invoke_on_main_context(Box::new(cleanup));
        } else {
            cleanup();
        }
    }
}

/// Caches proxies so the same instance is used for the same native memory
/// address.
///
/// The cache is cheap to clone (clones share the same state) and is
/// usually used through the process-wide instance returned by
/// [`crate::runtime::instance_cache`]. All operations are safe to call
/// from any thread; state transitions are linearizable per address, and
/// operations on distinct addresses never contend.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use girscope::runtime::{testing::MockBackend, InstanceCache, ObjectProxy, TypeRegistry};
///
/// let backend = Arc::new(MockBackend::new());
/// let ty = backend.define_type(girscope::runtime::NativeType::NONE);
/// let address = backend.allocate(ty);
///
/// let cache = InstanceCache::new(backend, Arc::new(TypeRegistry::new()));
/// let proxy = cache
///     .get_for_type(address, Some(|a| ObjectProxy::new(a)))
///     .unwrap();
/// assert_eq!(proxy.handle(), address);
/// ```
#[derive(Clone)]
pub struct InstanceCache {
    shared: Arc<CacheShared>,
}

impl InstanceCache {
    /// Create a cache operating through the given backend, consulting the
    /// given type registry to pick proxy constructors.
    #[must_use]
    pub fn new(backend: Arc<dyn NativeBackend>, registry: Arc<TypeRegistry>) -> Self {
        Self {
            shared: Arc::new(CacheShared {
                backend,
                registry,
                references: DashMap::new(),
            }),
        }
    }

    /// The type registry this cache consults.
    #[must_use]
    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.shared.registry
    }

    /// Retrieve the cached proxy for a native address.
    ///
    /// Returns `None` for the null address, for addresses never cached, and
    /// for weak entries whose proxy has already been dropped — absence is a
    /// normal value, never an error.
    #[must_use]
    pub fn lookup(&self, address: RawPointer) -> Option<Arc<dyn Proxy>> {
        if address == 0 {
            return None;
        }
        self.shared
            .references
            .get(&address)
            .and_then(|entry| entry.get())
    }

    /// Get a proxy for the provided native address, creating and caching
    /// one if none exists yet.
    ///
    /// The proxy type is chosen by the *dynamic* native type of the object:
    /// the backend reads the type identifier from the instance, and the
    /// type registry resolves a constructor (walking parent types), with
    /// `fallback` as the last resort.
    ///
    /// If a construction is in progress on this thread and the observed
    /// dynamic type matches the type being constructed, the in-progress
    /// proxy is bound to this address and cached instead of a second proxy
    /// being created — the native call that allocated the object is also
    /// the first to observe its address.
    ///
    /// Reference-counted results are cached via [`InstanceCache::put`];
    /// floating value types are sunk immediately and returned uncached.
    pub fn get_for_type(
        &self,
        address: RawPointer,
        fallback: Option<Constructor>,
    ) -> Option<Arc<dyn Proxy>> {
        if address == 0 {
            return None;
        }

        if let Some(proxy) = self.lookup(address) {
            return Some(proxy);
        }

        let ty = self.shared.backend.type_of(address);
        let ctor = self
            .shared
            .registry
            .resolve(self.shared.backend.as_ref(), ty, fallback)?;

        let fresh = ctor(address);

        // Rendezvous with an in-progress construction on this thread
        let in_progress = CONSTRUCT_STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .filter(|frame| frame.ty == ty)
                .map(|frame| Arc::clone(&frame.proxy))
        });
        if let Some(proxy) = in_progress {
            proxy.base().bind(address);
            return Some(self.put(address, proxy));
        }

        match fresh.kind() {
            ProxyKind::Object => Some(self.put(address, fresh)),
            ProxyKind::FloatingValue => {
                self.fatal_check(self.shared.backend.ref_sink(address));
                Some(fresh)
            }
            ProxyKind::Value => Some(fresh),
        }
    }

    /// Add a proxy to the cache.
    ///
    /// Atomic insert-if-absent: when an entry for the address already
    /// exists, the new proxy is discarded and the cached one is returned —
    /// the first writer wins, all callers observe one canonical proxy.
    ///
    /// On successful insertion the cache sinks a floating reference if the
    /// proxy carries one, installs the toggle notification, releases its
    /// own temporary strong native reference (the toggle reference keeps
    /// the object alive from here on), and arms the proxy's finalizer.
    ///
    /// # Panics
    ///
    /// Panics when a native call on the toggle-install path fails, or when
    /// the existing entry holds a dead proxy whose finalizer has not run
    /// yet — both are unrecoverable lifetime-invariant violations.
    pub fn put(&self, address: RawPointer, proxy: Arc<dyn Proxy>) -> Arc<dyn Proxy> {
        match self.shared.references.entry(address) {
            Entry::Occupied(entry) => {
                return entry.get().get().unwrap_or_else(|| {
                    panic!(
                        "instance cache entry for {address:#x} holds a dead proxy \
                         whose finalizer has not evicted it yet"
                    )
                });
            }
            Entry::Vacant(entry) => {
                entry.insert(Ref::Strong(Arc::clone(&proxy)));
            }
        }

        log::debug!("new proxy for {address:#x}");

        // Sink floating references
        if proxy.is_floating() {
            self.fatal_check(self.shared.backend.ref_sink(address));
        }

        if proxy.kind() == ProxyKind::Object {
            // Set up a toggle ref, and release the temporary strong
            // reference: from here on the toggle reference keeps the native
            // object alive while the entry is strong.
            let weak = Arc::downgrade(&self.shared);
            let notify: ToggleNotify = Arc::new(move |addr, is_last_ref| {
                if let Some(shared) = weak.upgrade() {
                    shared.toggle(addr, is_last_ref);
                }
            });
            self.fatal_check(self.shared.backend.add_toggle_ref(address, notify));
            self.fatal_check(self.shared.backend.unref(address));

            // Arm the finalizer that removes the toggle reference once the
            // last handle is dropped
            let weak = Arc::downgrade(&self.shared);
            proxy.base().arm_finalizer(Box::new(move |addr| {
                if let Some(shared) = weak.upgrade() {
                    shared.finalize(addr);
                }
            }));
        }

        proxy
    }

    /// Construct a new native instance for `proxy` and cache it.
    ///
    /// Pushes the proxy onto the thread-local construction stack, asks the
    /// backend to construct an instance of `ty` (defaulting to the proxy's
    /// registered native type), binds the returned address and caches the
    /// proxy. Native code running during construction that hands the new
    /// address back into [`InstanceCache::get_for_type`] receives this same
    /// proxy, not a second one. Construction may recurse: the stack is
    /// LIFO.
    ///
    /// # Panics
    ///
    /// Panics when native construction returns null.
    pub fn construct(&self, proxy: Arc<dyn Proxy>, ty: Option<NativeType>) -> Arc<dyn Proxy> {
        let ty = ty.unwrap_or_else(|| proxy.native_type());

        CONSTRUCT_STACK.with(|stack| {
            stack.borrow_mut().push(ConstructFrame {
                proxy: Arc::clone(&proxy),
                ty,
            });
        });

        let address = self.shared.backend.construct(ty);

        let result = if address == 0 {
            None
        } else {
            proxy.base().bind(address);
            Some(self.put(address, proxy))
        };

        CONSTRUCT_STACK.with(|stack| {
            stack.borrow_mut().pop();
        });

        result.unwrap_or_else(|| panic!("native construction of type {ty:?} returned null"))
    }

    /// Deliver a toggle notification for `address`.
    ///
    /// Flips the entry to weak when the toggle reference has become the
    /// last reference, and back to strong when native code referenced the
    /// object again. Backends installed through
    /// [`crate::runtime::NativeBackend::add_toggle_ref`] deliver
    /// notifications directly; this entry point exists for embedders
    /// driving the cache manually.
    pub fn toggle_notify(&self, address: RawPointer, is_last_ref: bool) {
        self.shared.toggle(address, is_last_ref);
    }

    /// The state of the entry for `address`, if one exists.
    #[must_use]
    pub fn state(&self, address: RawPointer) -> Option<RefState> {
        self.shared
            .references
            .get(&address)
            .map(|entry| entry.state())
    }

    /// Number of cached entries (strong and weak).
    #[must_use]
    pub fn len(&self) -> usize {
        self.shared.references.len()
    }

    /// Whether the cache has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shared.references.is_empty()
    }

    fn fatal_check(&self, result: crate::Result<()>) {
        if let Err(err) = result {
            panic!("instance cache invariant violated: {err}");
        }
    }
}

impl std::fmt::Debug for InstanceCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstanceCache")
            .field("entries", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::testing::{MockBackend, NativeEvent};
    use crate::runtime::{ObjectProxy, ProxyBase};
    use std::sync::Mutex;

    fn object_ctor(address: RawPointer) -> Arc<dyn Proxy> {
        ObjectProxy::new(address)
    }

    fn setup() -> (Arc<MockBackend>, InstanceCache, NativeType) {
        let backend = Arc::new(MockBackend::new());
        let ty = backend.define_type(NativeType::NONE);
        let cache = InstanceCache::new(
            Arc::clone(&backend) as Arc<dyn NativeBackend>,
            Arc::new(TypeRegistry::new()),
        );
        (backend, cache, ty)
    }

    #[test]
    fn test_lookup_null_address() {
        let (_, cache, _) = setup();
        assert!(cache.lookup(0).is_none());
        assert!(cache.get_for_type(0, Some(object_ctor)).is_none());
    }

    #[test]
    fn test_get_for_type_caches_one_proxy() {
        let (backend, cache, ty) = setup();
        let address = backend.allocate(ty);

        let first = cache.get_for_type(address, Some(object_ctor)).unwrap();
        let second = cache.get_for_type(address, Some(object_ctor)).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
        assert!(backend.has_toggle(address));
    }

    #[test]
    fn test_put_first_writer_wins() {
        let (backend, cache, ty) = setup();
        let address = backend.allocate(ty);

        let winner = cache.put(address, ObjectProxy::new(address));
        let loser = ObjectProxy::new(address);
        let returned = cache.put(address, loser);

        assert!(Arc::ptr_eq(&winner, &returned));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_entry_is_weak_when_toggle_is_last_ref() {
        let (backend, cache, ty) = setup();
        let address = backend.allocate(ty);

        // After put, the toggle reference is the only native reference, so
        // the entry immediately toggles to weak.
        let _proxy = cache.get_for_type(address, Some(object_ctor)).unwrap();
        assert_eq!(cache.state(address), Some(RefState::Weak));
        assert_eq!(backend.refcount(address), Some(1));
    }

    #[test]
    fn test_toggle_round_trip_preserves_identity() {
        let (backend, cache, ty) = setup();
        let address = backend.allocate(ty);
        let proxy = cache.get_for_type(address, Some(object_ctor)).unwrap();

        // Native code takes a reference: entry flips to strong
        backend.ref_object(address);
        assert_eq!(cache.state(address), Some(RefState::Strong));

        // ... and releases it again: back to weak
        backend.unref_object(address);
        assert_eq!(cache.state(address), Some(RefState::Weak));

        let cached = cache.lookup(address).unwrap();
        assert!(Arc::ptr_eq(&proxy, &cached));
    }

    #[test]
    fn test_strong_entry_outlives_caller_handles() {
        let (backend, cache, ty) = setup();
        let address = backend.allocate(ty);
        let proxy = cache.get_for_type(address, Some(object_ctor)).unwrap();

        backend.ref_object(address);
        drop(proxy);

        // The strong entry keeps the proxy alive while native code holds
        // references
        assert!(cache.lookup(address).is_some());
        assert!(backend.is_alive(address));
    }

    #[test]
    fn test_drop_of_last_handle_finalizes() {
        let (backend, cache, ty) = setup();
        let address = backend.allocate(ty);

        let proxy = cache.get_for_type(address, Some(object_ctor)).unwrap();
        drop(proxy);

        assert!(cache.is_empty());
        assert!(!backend.is_alive(address));
        assert_eq!(backend.event_count(&NativeEvent::Destroyed(address)), 1);
    }

    #[test]
    fn test_weak_to_dead_entry_reads_as_not_found() {
        let (backend, cache, ty) = setup();
        let address = backend.allocate(ty);

        // Keep a native reference so dropping the proxy does not finalize
        // (the entry stays, strong, held by native code)
        backend.ref_object(address);
        let proxy = cache.get_for_type(address, Some(object_ctor)).unwrap();
        backend.unref_object(address); // entry weak again
        drop(proxy); // finalizer evicts

        assert!(cache.lookup(address).is_none());
    }

    #[test]
    fn test_finalizer_dispatches_to_running_main_context() {
        let (backend, cache, ty) = setup();
        backend.set_main_context_active(true);
        let address = backend.allocate(ty);

        let proxy = cache.get_for_type(address, Some(object_ctor)).unwrap();
        drop(proxy);

        // Toggle removal is queued, not yet executed
        assert!(backend.is_alive(address));
        assert!(backend.has_toggle(address));
        assert_eq!(cache.len(), 1);

        assert_eq!(backend.run_pending(), 1);
        assert!(!backend.is_alive(address));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_floating_value_is_sunk_and_not_cached() {
        struct ParamProxy {
            base: ProxyBase,
        }
        impl Proxy for ParamProxy {
            fn base(&self) -> &ProxyBase {
                &self.base
            }
            fn kind(&self) -> ProxyKind {
                ProxyKind::FloatingValue
            }
        }
        fn param_ctor(address: RawPointer) -> Arc<dyn Proxy> {
            Arc::new(ParamProxy {
                base: ProxyBase::new(address),
            })
        }

        let (backend, cache, ty) = setup();
        let address = backend.allocate_floating(ty);

        let proxy = cache.get_for_type(address, Some(param_ctor)).unwrap();
        assert_eq!(proxy.handle(), address);
        assert!(cache.is_empty());
        // The floating reference was claimed without growing the count
        assert_eq!(backend.refcount(address), Some(1));
    }

    #[test]
    fn test_floating_object_is_sunk_then_cached() {
        struct FloatingObject {
            base: ProxyBase,
        }
        impl Proxy for FloatingObject {
            fn base(&self) -> &ProxyBase {
                &self.base
            }
            fn is_floating(&self) -> bool {
                true
            }
        }

        let (backend, cache, ty) = setup();
        let address = backend.allocate_floating(ty);

        let proxy: Arc<dyn Proxy> = Arc::new(FloatingObject {
            base: ProxyBase::new(address),
        });
        cache.put(address, proxy);

        // ref_sink claimed the floating reference, add_toggle_ref added
        // one, unref released the claimed one: the toggle ref remains
        assert_eq!(backend.refcount(address), Some(1));
        assert_eq!(cache.state(address), Some(RefState::Weak));
    }

    #[test]
    fn test_construct_rendezvous_returns_same_proxy() {
        struct TypedProxy {
            base: ProxyBase,
            ty: NativeType,
        }
        impl Proxy for TypedProxy {
            fn base(&self) -> &ProxyBase {
                &self.base
            }
            fn native_type(&self) -> NativeType {
                self.ty
            }
        }

        let (backend, cache, ty) = setup();

        // Native instance-init hands the fresh address back into the cache
        // before the constructor returns
        let seen: Arc<Mutex<Option<Arc<dyn Proxy>>>> = Arc::new(Mutex::new(None));
        let seen_in_hook = Arc::clone(&seen);
        let reentrant = cache.clone();
        backend.set_construct_hook(Arc::new(move |address| {
            let proxy = reentrant.get_for_type(address, Some(object_ctor)).unwrap();
            *seen_in_hook.lock().unwrap() = Some(proxy);
        }));

        let proxy = cache.construct(
            Arc::new(TypedProxy {
                base: ProxyBase::unbound(),
                ty,
            }),
            None,
        );

        let observed = seen.lock().unwrap().take().unwrap();
        assert!(Arc::ptr_eq(&proxy, &observed));
        assert_eq!(proxy.handle(), observed.handle());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_construct_binds_address() {
        let (backend, cache, ty) = setup();

        let proxy = cache.construct(ObjectProxy::unbound(), Some(ty));
        assert_ne!(proxy.handle(), 0);
        assert_eq!(backend.type_of(proxy.handle()), ty);
    }

    #[test]
    #[should_panic(expected = "instance cache invariant violated")]
    fn test_toggle_install_failure_is_fatal() {
        let (_, cache, _) = setup();
        // The backend has never heard of this address, so add_toggle_ref
        // fails and the invariant violation aborts
        cache.put(0x9999, ObjectProxy::new(0x9999));
    }

    #[test]
    fn test_get_for_type_without_constructor() {
        let (backend, cache, _) = setup();
        let unknown = backend.allocate(NativeType(777)); // type never defined

        // type_of works but no constructor resolves and no fallback given
        assert!(cache.get_for_type(unknown, None).is_none());
    }
}
