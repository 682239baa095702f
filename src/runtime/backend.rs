use std::fmt;
use std::sync::Arc;

use crate::Result;

/// A raw native memory address.
///
/// Addresses are opaque to this crate: they identify native objects but are
/// only dereferenced by the backend. The value `0` is the null address and
/// never identifies an object.
pub type RawPointer = usize;

/// A native type identifier (a `GType` in GObject terms).
///
/// Identifiers are opaque integers assigned by the native type system at
/// registration time. [`NativeType::NONE`] marks "no type" and terminates
/// parent-type chains.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NativeType(pub u64);

impl NativeType {
    /// The absent type, also the end marker of a parent-type chain.
    pub const NONE: NativeType = NativeType(0);

    /// Returns the raw identifier value
    #[must_use]
    pub fn value(self) -> u64 {
        self.0
    }

    /// Whether this is the absent type
    #[must_use]
    pub fn is_none(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Debug for NativeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NativeType({})", self.0)
    }
}

impl fmt::Display for NativeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Callback invoked by the native library whenever an object's reference
/// count crosses the "exactly one ⟷ more than one" boundary. The arguments
/// are the object address and whether the remaining reference is the last
/// one.
pub type ToggleNotify = Arc<dyn Fn(RawPointer, bool) + Send + Sync>;

/// The native ABI boundary consumed by the lifetime subsystem.
///
/// An implementation of this trait wraps the handful of native entry points
/// the instance cache and memory cleaner need: reading an object's dynamic
/// type identifier through its class pointer, manipulating reference
/// counts, installing toggle notifications, constructing and freeing
/// instances, and posting work onto the default main context.
///
/// # Thread Safety
///
/// All methods may be called from any thread; the one exception the
/// *native* side imposes — toggle-reference removal — is honored by the
/// caller, which routes removal through
/// [`NativeBackend::invoke_on_main_context`] whenever a context is running.
///
/// # Failure Semantics
///
/// The `Result`-returning methods report native call failure. When such a
/// failure surfaces on the toggle-install or finalizer path the instance
/// cache treats it as an unrecoverable invariant violation and panics;
/// continuing could free memory still referenced by a live proxy.
pub trait NativeBackend: Send + Sync + 'static {
    /// Read the dynamic type identifier of a native object (through the
    /// object's first memory word: the class pointer, then the type-id
    /// field within the class structure). Returns [`NativeType::NONE`] for
    /// unknown or invalid objects.
    fn type_of(&self, object: RawPointer) -> NativeType;

    /// The parent of a native type, or [`NativeType::NONE`] at the root.
    fn type_parent(&self, ty: NativeType) -> NativeType;

    /// Construct a new native instance of the given type. Returns the
    /// address of the new instance, or `0` on failure.
    fn construct(&self, ty: NativeType) -> RawPointer;

    /// Sink a floating reference, claiming ownership of it.
    fn ref_sink(&self, object: RawPointer) -> Result<()>;

    /// Decrement the reference count of a native object.
    fn unref(&self, object: RawPointer) -> Result<()>;

    /// Install a toggle notification on a reference-counted object. The
    /// notification fires on every boundary crossing of the reference
    /// count until removed. Installing the toggle reference counts as one
    /// strong reference.
    fn add_toggle_ref(&self, object: RawPointer, notify: ToggleNotify) -> Result<()>;

    /// Remove the toggle reference installed by
    /// [`NativeBackend::add_toggle_ref`], releasing the strong reference it
    /// held.
    fn remove_toggle_ref(&self, object: RawPointer) -> Result<()>;

    /// Release plain native memory.
    fn free(&self, memory: RawPointer);

    /// Release a boxed-type value via the type's registered copy/free pair.
    fn boxed_free(&self, ty: NativeType, memory: RawPointer);

    /// Release native memory through a named specialized free function.
    fn free_with(&self, func: &'static str, memory: RawPointer);

    /// Whether a default main context is currently running.
    fn main_context_active(&self) -> bool;

    /// Post an action to run when the default main context is next idle.
    /// Fire-and-forget: the caller does not wait for completion.
    fn invoke_on_main_context(&self, action: Box<dyn FnOnce() + Send>);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_type_none() {
        assert!(NativeType::NONE.is_none());
        assert!(!NativeType(42).is_none());
        assert_eq!(NativeType(42).value(), 42);
    }
}
