//! Ownership tracking and cleanup for value-type proxies.
//!
//! The instance cache handles reference-counted objects; everything else —
//! plain structs, unions, boxed types — goes through the memory cleaner.
//! It records, per native address, whether the managed side owns the
//! memory and which native function releases it. When the last handle of a
//! registered proxy is dropped (or [`MemoryCleaner::free`] is called
//! explicitly), the memory is released through the recorded function —
//! exactly once, and only while ownership lies on the managed side.
//!
//! Ownership moves with transfer annotations: a value returned with full
//! transfer is taken; a value passed into native code with full transfer
//! is yielded and will not be freed from here.

use std::sync::Arc;

use dashmap::DashMap;

use crate::runtime::{NativeBackend, NativeType, Proxy, RawPointer};

// How the native memory behind a tracked address is released.
#[derive(Debug, Clone, Copy)]
enum Cleanup {
    // Plain deallocation
    Default,
    // g_boxed_free with the recorded boxed type
    Boxed(NativeType),
    // A named specialized free function
    Custom(&'static str),
}

#[derive(Debug, Clone, Copy)]
struct Cached {
    owned: bool,
    cleanup: Cleanup,
}

pub(crate) struct CleanerShared {
    backend: Arc<dyn NativeBackend>,
    cache: DashMap<RawPointer, Cached>,
}

/// Tracks every native address a value-type proxy was created for, and
/// releases owned memory when the proxy goes away.
///
/// Cheap to clone (clones share state); usually used through the
/// process-wide instance returned by [`crate::runtime::memory_cleaner`].
#[derive(Clone)]
pub struct MemoryCleaner {
    shared: Arc<CleanerShared>,
}

impl MemoryCleaner {
    /// Create a cleaner releasing memory through the given backend.
    #[must_use]
    pub fn new(backend: Arc<dyn NativeBackend>) -> Self {
        Self {
            shared: Arc::new(CleanerShared {
                backend,
                cache: DashMap::new(),
            }),
        }
    }

    /// Register a proxy's address to be cleaned when the proxy is dropped.
    ///
    /// Newly registered addresses start *unowned*: nothing is freed until
    /// [`MemoryCleaner::take_ownership`] is called for the address.
    /// Registering the same address again is a no-op.
    pub fn register(&self, proxy: &Arc<dyn Proxy>) {
        let address = proxy.handle();
        if address == 0 {
            return;
        }

        self.shared.cache.entry(address).or_insert(Cached {
            owned: false,
            cleanup: Cleanup::Default,
        });

        let weak = Arc::downgrade(&self.shared);
        proxy.base().arm_finalizer(Box::new(move |addr| {
            if let Some(shared) = weak.upgrade() {
                MemoryCleaner { shared }.free(addr);
            }
        }));
    }

    /// Record a specialized cleanup function for this address, replacing
    /// the default deallocation.
    pub fn set_free_func(&self, proxy: &Arc<dyn Proxy>, func: &'static str) {
        self.register(proxy);
        if let Some(mut cached) = self.shared.cache.get_mut(&proxy.handle()) {
            cached.cleanup = Cleanup::Custom(func);
        }
    }

    /// Record this address as a boxed value of the given type; cleanup goes
    /// through the boxed-type free function.
    pub fn set_boxed_type(&self, proxy: &Arc<dyn Proxy>, ty: NativeType) {
        self.register(proxy);
        if let Some(mut cached) = self.shared.cache.get_mut(&proxy.handle()) {
            cached.cleanup = Cleanup::Boxed(ty);
        }
    }

    /// Take ownership of this address: when the proxy is dropped, the
    /// memory will be released.
    pub fn take_ownership(&self, proxy: &Arc<dyn Proxy>) {
        if proxy.handle() == 0 {
            return;
        }
        self.register(proxy);
        if let Some(mut cached) = self.shared.cache.get_mut(&proxy.handle()) {
            cached.owned = true;
        }
    }

    /// Yield ownership of this address: the memory now belongs to native
    /// code and will not be released from here, even when the proxy is
    /// dropped.
    pub fn yield_ownership(&self, proxy: &Arc<dyn Proxy>) {
        self.shared.cache.remove(&proxy.handle());
    }

    /// Release the memory behind `address` now, if it is tracked and owned.
    ///
    /// The tracking entry is consumed first, so the release runs at most
    /// once per address: a second call — from a duplicate cleanup signal or
    /// from the proxy finalizer racing an explicit free — is a no-op.
    pub fn free(&self, address: RawPointer) {
        let Some((_, cached)) = self.shared.cache.remove(&address) else {
            return;
        };

        // Without ownership, the free-function must not run
        if !cached.owned {
            return;
        }

        log::debug!("free {address:#x}");
        match cached.cleanup {
            Cleanup::Default => self.shared.backend.free(address),
            Cleanup::Boxed(ty) => self.shared.backend.boxed_free(ty, address),
            Cleanup::Custom(func) => self.shared.backend.free_with(func, address),
        }
    }

    /// Number of tracked addresses.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shared.cache.len()
    }

    /// Whether no addresses are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shared.cache.is_empty()
    }
}

impl std::fmt::Debug for MemoryCleaner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCleaner")
            .field("tracked", &self.len())
            .finish()
    }
}
