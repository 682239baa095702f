use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use crate::runtime::{NativeType, RawPointer};

/// How a proxied native value manages its memory, which determines how the
/// instance cache treats it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyKind {
    /// A reference-counted object. Cached with a toggle reference; the
    /// native object stays alive at least as long as the proxy.
    Object,

    /// A self-owned value type with floating-reference semantics (a
    /// `GParamSpec` in GObject terms). Sunk on first sight, never cached.
    FloatingValue,

    /// A plain value or boxed struct. Never cached in the instance cache;
    /// its memory is tracked by [`crate::runtime::MemoryCleaner`].
    Value,
}

/// A managed wrapper around a native object address.
///
/// Generated binding types implement this trait by embedding a
/// [`ProxyBase`] and returning it from [`Proxy::base`]. Everything else has
/// a default: proxies are reference-counted objects unless they say
/// otherwise.
///
/// Proxies are handed around as `Arc<dyn Proxy>`; the instance cache
/// guarantees at most one live proxy per native address, so address
/// equality is object identity.
pub trait Proxy: Send + Sync + 'static {
    /// The embedded proxy state.
    fn base(&self) -> &ProxyBase;

    /// How the native side owns this value.
    fn kind(&self) -> ProxyKind {
        ProxyKind::Object
    }

    /// Whether new instances of this type start with a floating reference
    /// that must be sunk by the first owner.
    fn is_floating(&self) -> bool {
        false
    }

    /// The native type this proxy class was registered for, used to match
    /// an in-progress construction with the instance it produces. Returns
    /// [`NativeType::NONE`] for types without native registration.
    fn native_type(&self) -> NativeType {
        NativeType::NONE
    }

    /// The native address this proxy wraps; `0` while construction is still
    /// in progress.
    fn handle(&self) -> RawPointer {
        self.base().address()
    }
}

type FinalizerFn = Box<dyn FnOnce(RawPointer) + Send + Sync>;

/// Per-proxy state embedded in every proxy type.
///
/// Holds the native address (bindable exactly once, to support proxies
/// created before `g_object_new` has returned their address) and the
/// finalizer slot armed by the instance cache or memory cleaner. The
/// finalizer runs when the last handle to the proxy is dropped — the
/// deterministic equivalent of the original design's unreachability
/// cleanup — and is consumed on invocation, so it runs at most once.
pub struct ProxyBase {
    address: AtomicUsize,
    finalizer: OnceLock<FinalizerFn>,
}

impl ProxyBase {
    /// State for a proxy wrapping an existing native object.
    #[must_use]
    pub fn new(address: RawPointer) -> Self {
        Self {
            address: AtomicUsize::new(address),
            finalizer: OnceLock::new(),
        }
    }

    /// State for a proxy whose native instance has not been allocated yet.
    /// The address is bound later, by the construction rendezvous.
    #[must_use]
    pub fn unbound() -> Self {
        Self::new(0)
    }

    /// The wrapped native address, or `0` while unbound.
    #[must_use]
    pub fn address(&self) -> RawPointer {
        self.address.load(Ordering::Acquire)
    }

    /// Bind the native address of a proxy created before its instance.
    /// Only the first bind takes effect.
    pub(crate) fn bind(&self, address: RawPointer) {
        let _ = self
            .address
            .compare_exchange(0, address, Ordering::AcqRel, Ordering::Acquire);
    }

    /// Arm the drop finalizer. Only the first arm takes effect; the cache
    /// arms cached objects, the memory cleaner arms tracked values.
    pub(crate) fn arm_finalizer(&self, finalizer: FinalizerFn) {
        let _ = self.finalizer.set(finalizer);
    }
}

impl Drop for ProxyBase {
    fn drop(&mut self) {
        if let Some(finalizer) = self.finalizer.take() {
            finalizer(self.address.load(Ordering::Acquire));
        }
    }
}

impl std::fmt::Debug for ProxyBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyBase")
            .field("address", &format_args!("{:#x}", self.address()))
            .finish()
    }
}

/// General-purpose proxy for a reference-counted native object.
///
/// Used as the fallback constructor when no specific proxy type is
/// registered for a native type, and as the base wrapper in tests.
#[derive(Debug)]
pub struct ObjectProxy {
    base: ProxyBase,
}

impl ObjectProxy {
    /// Wrap an existing native object.
    #[must_use]
    pub fn new(address: RawPointer) -> Arc<Self> {
        Arc::new(Self {
            base: ProxyBase::new(address),
        })
    }

    /// Create a proxy whose native instance will be constructed through
    /// [`crate::runtime::InstanceCache::construct`].
    #[must_use]
    pub fn unbound() -> Arc<Self> {
        Arc::new(Self {
            base: ProxyBase::unbound(),
        })
    }
}

impl Proxy for ObjectProxy {
    fn base(&self) -> &ProxyBase {
        &self.base
    }
}
