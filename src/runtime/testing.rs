//! In-memory [`NativeBackend`] for exercising the lifetime subsystem
//! without a native library.
//!
//! [`MockBackend`] simulates the relevant slice of GObject semantics:
//! reference counts, floating references, a single toggle notification per
//! object, a parent-type chain and a default main context modeled as an
//! explicit work queue. Tests drive native-side events — extra references,
//! releases, context iterations — and observe what the cache and cleaner
//! did through the recorded [`NativeEvent`] log.
//!
//! This module is part of the public API so that binding generators built
//! on this crate can test their own proxy types against the same
//! simulation.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use dashmap::DashMap;

use crate::runtime::{NativeBackend, NativeType, RawPointer, ToggleNotify};
use crate::{Error, Result};

/// A native-side event recorded by the mock backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NativeEvent {
    /// An object's reference count reached zero and it was destroyed.
    Destroyed(RawPointer),
    /// Plain memory was released.
    Freed(RawPointer),
    /// A boxed value was released through its type's free function.
    BoxedFreed(NativeType, RawPointer),
    /// Memory was released through a named specialized free function.
    CustomFreed(&'static str, RawPointer),
}

struct MockObject {
    ty: NativeType,
    refcount: u32,
    floating: bool,
    toggle: Option<ToggleNotify>,
}

type ConstructHook = Arc<dyn Fn(RawPointer) + Send + Sync>;

/// Simulated native library backing the instance cache in tests.
///
/// # Examples
///
/// ```rust
/// use girscope::runtime::{testing::MockBackend, NativeType};
///
/// let backend = MockBackend::new();
/// let ty = backend.define_type(NativeType::NONE);
/// let address = backend.allocate(ty);
///
/// assert_eq!(backend.refcount(address), Some(1));
/// assert!(backend.is_alive(address));
/// ```
#[derive(Default)]
pub struct MockBackend {
    types: DashMap<NativeType, NativeType>,
    next_type: AtomicU64,
    objects: DashMap<RawPointer, MockObject>,
    next_address: AtomicUsize,
    context_active: AtomicBool,
    pending: Mutex<Vec<Box<dyn FnOnce() + Send>>>,
    events: Mutex<Vec<NativeEvent>>,
    construct_hook: Mutex<Option<ConstructHook>>,
}

impl MockBackend {
    /// Creates a backend with no types, no objects and no running context.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_type: AtomicU64::new(1),
            next_address: AtomicUsize::new(0x1000),
            ..Self::default()
        }
    }

    /// Define a native type deriving from `parent` (use
    /// [`NativeType::NONE`] for a root type). Returns the fresh type id.
    pub fn define_type(&self, parent: NativeType) -> NativeType {
        let ty = NativeType(self.next_type.fetch_add(1, Ordering::Relaxed));
        self.types.insert(ty, parent);
        ty
    }

    /// Create a native object of the given type with one reference.
    pub fn allocate(&self, ty: NativeType) -> RawPointer {
        self.allocate_inner(ty, false)
    }

    /// Create a native object with one *floating* reference.
    pub fn allocate_floating(&self, ty: NativeType) -> RawPointer {
        self.allocate_inner(ty, true)
    }

    fn allocate_inner(&self, ty: NativeType, floating: bool) -> RawPointer {
        let address = self.next_address.fetch_add(0x10, Ordering::Relaxed);
        self.objects.insert(
            address,
            MockObject {
                ty,
                refcount: 1,
                floating,
                toggle: None,
            },
        );
        address
    }

    /// Simulate native code taking a reference on an object.
    pub fn ref_object(&self, object: RawPointer) {
        let notify = {
            let mut obj = self.objects.get_mut(&object).expect("unknown object");
            obj.refcount += 1;
            // crossing 1 -> 2: the toggle reference is no longer the last one
            (obj.refcount == 2).then(|| obj.toggle.clone()).flatten()
        };
        if let Some(notify) = notify {
            notify(object, false);
        }
    }

    /// Simulate native code releasing a reference on an object.
    pub fn unref_object(&self, object: RawPointer) {
        self.unref(object).expect("unknown object");
    }

    /// Install a callback invoked with each newly constructed address while
    /// [`NativeBackend::construct`] runs — the mock equivalent of native
    /// instance-init code calling back into the bindings before the
    /// constructor has returned.
    pub fn set_construct_hook(&self, hook: ConstructHook) {
        *self.construct_hook.lock().unwrap() = Some(hook);
    }

    /// Mark the default main context as running (or not). While running,
    /// work posted by [`NativeBackend::invoke_on_main_context`] queues up
    /// until [`MockBackend::run_pending`] is called.
    pub fn set_main_context_active(&self, active: bool) {
        self.context_active.store(active, Ordering::SeqCst);
    }

    /// Run everything queued on the simulated main context. Returns the
    /// number of actions executed.
    pub fn run_pending(&self) -> usize {
        let actions: Vec<_> = std::mem::take(&mut *self.pending.lock().unwrap());
        let count = actions.len();
        for action in actions {
            action();
        }
        count
    }

    /// Whether the object is still alive on the native side.
    #[must_use]
    pub fn is_alive(&self, object: RawPointer) -> bool {
        self.objects.contains_key(&object)
    }

    /// The current reference count of an object.
    #[must_use]
    pub fn refcount(&self, object: RawPointer) -> Option<u32> {
        self.objects.get(&object).map(|obj| obj.refcount)
    }

    /// Whether a toggle notification is installed on the object.
    #[must_use]
    pub fn has_toggle(&self, object: RawPointer) -> bool {
        self.objects
            .get(&object)
            .is_some_and(|obj| obj.toggle.is_some())
    }

    /// All recorded native events, in order.
    #[must_use]
    pub fn events(&self) -> Vec<NativeEvent> {
        self.events.lock().unwrap().clone()
    }

    /// How often the given event was recorded.
    #[must_use]
    pub fn event_count(&self, event: &NativeEvent) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| *e == event)
            .count()
    }

    fn record(&self, event: NativeEvent) {
        self.events.lock().unwrap().push(event);
    }

    fn missing(call: &'static str, address: RawPointer) -> Error {
        Error::NativeCall { call, address }
    }
}

impl NativeBackend for MockBackend {
    fn type_of(&self, object: RawPointer) -> NativeType {
        self.objects
            .get(&object)
            .map_or(NativeType::NONE, |obj| obj.ty)
    }

    fn type_parent(&self, ty: NativeType) -> NativeType {
        self.types.get(&ty).map_or(NativeType::NONE, |parent| *parent)
    }

    fn construct(&self, ty: NativeType) -> RawPointer {
        if !self.types.contains_key(&ty) {
            return 0;
        }
        let address = self.allocate(ty);

        // Run instance-init code outside the hook lock, so that nested
        // construction can install and reach the hook again
        let hook = self.construct_hook.lock().unwrap().clone();
        if let Some(hook) = hook {
            hook(address);
        }
        address
    }

    fn ref_sink(&self, object: RawPointer) -> Result<()> {
        let mut obj = self
            .objects
            .get_mut(&object)
            .ok_or(Self::missing("g_object_ref_sink", object))?;
        if obj.floating {
            obj.floating = false;
        } else {
            obj.refcount += 1;
        }
        Ok(())
    }

    fn unref(&self, object: RawPointer) -> Result<()> {
        let (destroyed, notify) = {
            let mut obj = self
                .objects
                .get_mut(&object)
                .ok_or(Self::missing("g_object_unref", object))?;
            obj.refcount -= 1;
            let notify = (obj.refcount == 1).then(|| obj.toggle.clone()).flatten();
            (obj.refcount == 0, notify)
        };

        if destroyed {
            self.objects.remove(&object);
            self.record(NativeEvent::Destroyed(object));
        } else if let Some(notify) = notify {
            // crossing 2 -> 1: the toggle reference is now the last one
            notify(object, true);
        }
        Ok(())
    }

    fn add_toggle_ref(&self, object: RawPointer, notify: ToggleNotify) -> Result<()> {
        let mut obj = self
            .objects
            .get_mut(&object)
            .ok_or(Self::missing("g_object_add_toggle_ref", object))?;
        if obj.toggle.is_some() {
            return Err(Self::missing("g_object_add_toggle_ref", object));
        }
        obj.toggle = Some(notify);
        obj.refcount += 1;
        Ok(())
    }

    fn remove_toggle_ref(&self, object: RawPointer) -> Result<()> {
        let destroyed = {
            let mut obj = self
                .objects
                .get_mut(&object)
                .ok_or(Self::missing("g_object_remove_toggle_ref", object))?;
            if obj.toggle.take().is_none() {
                return Err(Self::missing("g_object_remove_toggle_ref", object));
            }
            obj.refcount -= 1;
            obj.refcount == 0
        };

        if destroyed {
            self.objects.remove(&object);
            self.record(NativeEvent::Destroyed(object));
        }
        Ok(())
    }

    fn free(&self, memory: RawPointer) {
        self.record(NativeEvent::Freed(memory));
    }

    fn boxed_free(&self, ty: NativeType, memory: RawPointer) {
        self.record(NativeEvent::BoxedFreed(ty, memory));
    }

    fn free_with(&self, func: &'static str, memory: RawPointer) {
        self.record(NativeEvent::CustomFreed(func, memory));
    }

    fn main_context_active(&self) -> bool {
        self.context_active.load(Ordering::SeqCst)
    }

    fn invoke_on_main_context(&self, action: Box<dyn FnOnce() + Send>) {
        self.pending.lock().unwrap().push(action);
    }
}
