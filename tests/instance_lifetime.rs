//! Integration tests for the lifetime subsystem: proxy identity under
//! concurrency, toggle-reference transitions, finalization and memory
//! cleanup, driven through the in-memory mock backend.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Mutex};

use girscope::runtime::testing::{MockBackend, NativeEvent};
use girscope::runtime::{
    InstanceCache, MemoryCleaner, NativeBackend, NativeType, ObjectProxy, Proxy, ProxyBase,
    ProxyKind, RawPointer, RefState, TypeRegistry,
};

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
fn concurrent_get_for_type_yields_one_canonical_proxy() {
    const THREADS: usize = 8;

    let (backend, cache, ty) = setup();
    let address = backend.allocate(ty);
    let barrier = Arc::new(Barrier::new(THREADS));

    let mut handles = Vec::new();
    for _ in 0..THREADS {
        let cache = cache.clone();
        let barrier = Arc::clone(&barrier);
        handles.push(std::thread::spawn(move || {
            barrier.wait();
            cache.get_for_type(address, Some(object_ctor)).unwrap()
        }));
    }

    let proxies: Vec<Arc<dyn Proxy>> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let canonical = &proxies[0];
    for proxy in &proxies {
        assert!(Arc::ptr_eq(canonical, proxy));
    }
    assert_eq!(cache.len(), 1);
    assert!(backend.has_toggle(address));
}

#[test]
fn distinct_addresses_do_not_interfere() {
    const THREADS: usize = 8;
    const PER_THREAD: usize = 25;

    let (backend, cache, ty) = setup();
    let addresses: Vec<RawPointer> = (0..THREADS * PER_THREAD)
        .map(|_| backend.allocate(ty))
        .collect();
    let addresses = Arc::new(addresses);

    let mut handles = Vec::new();
    for t in 0..THREADS {
        let cache = cache.clone();
        let addresses = Arc::clone(&addresses);
        handles.push(std::thread::spawn(move || {
            let mut held = Vec::new();
            for &address in &addresses[t * PER_THREAD..(t + 1) * PER_THREAD] {
                held.push(cache.get_for_type(address, Some(object_ctor)).unwrap());
            }
            held
        }));
    }

    let held: Vec<_> = handles.into_iter().flat_map(|h| h.join().unwrap()).collect();
    assert_eq!(cache.len(), THREADS * PER_THREAD);
    drop(held);

    // Every proxy was finalized exactly once, every native object freed
    assert_eq!(cache.len(), 0);
    for &address in addresses.iter() {
        assert!(!backend.is_alive(address));
        assert_eq!(backend.event_count(&NativeEvent::Destroyed(address)), 1);
    }
}

#[test]
fn toggle_storm_preserves_identity_for_concurrent_readers() {
    const READERS: usize = 4;
    const CYCLES: usize = 500;

    let (backend, cache, ty) = setup();
    let address = backend.allocate(ty);
    let proxy = cache.get_for_type(address, Some(object_ctor)).unwrap();

    let stop = Arc::new(AtomicUsize::new(0));
    let mut handles = Vec::new();

    for _ in 0..READERS {
        let cache = cache.clone();
        let stop = Arc::clone(&stop);
        let original = Arc::clone(&proxy);
        handles.push(std::thread::spawn(move || {
            while stop.load(Ordering::Relaxed) == 0 {
                if let Some(seen) = cache.lookup(address) {
                    assert!(Arc::ptr_eq(&original, &seen));
                }
            }
        }));
    }

    // The "native side" takes and releases references, flipping the entry
    // between strong and weak the whole time
    for _ in 0..CYCLES {
        backend.ref_object(address);
        backend.unref_object(address);
    }
    stop.store(1, Ordering::Relaxed);
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(cache.state(address), Some(RefState::Weak));
    let cached = cache.lookup(address).unwrap();
    assert!(Arc::ptr_eq(&proxy, &cached));
}

#[test]
fn nested_construction_binds_each_level() {
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

    let backend = Arc::new(MockBackend::new());
    let outer_ty = backend.define_type(NativeType::NONE);
    let inner_ty = backend.define_type(NativeType::NONE);
    let cache = InstanceCache::new(
        Arc::clone(&backend) as Arc<dyn NativeBackend>,
        Arc::new(TypeRegistry::new()),
    );

    // Instance-init of the outer object constructs an inner object, then
    // observes its own address — both rendezvous must hit the right frame.
    let observed: Arc<Mutex<Vec<Arc<dyn Proxy>>>> = Arc::new(Mutex::new(Vec::new()));
    let hook_backend = Arc::clone(&backend);
    let hook_cache = cache.clone();
    let hook_observed = Arc::clone(&observed);
    backend.set_construct_hook(Arc::new(move |address| {
        if hook_backend.type_of(address) == outer_ty {
            let inner = hook_cache.construct(
                Arc::new(TypedProxy {
                    base: ProxyBase::unbound(),
                    ty: inner_ty,
                }),
                None,
            );
            hook_observed.lock().unwrap().push(inner);

            let outer = hook_cache.get_for_type(address, Some(object_ctor)).unwrap();
            hook_observed.lock().unwrap().push(outer);
        }
    }));

    let outer = cache.construct(
        Arc::new(TypedProxy {
            base: ProxyBase::unbound(),
            ty: outer_ty,
        }),
        None,
    );

    let observed = observed.lock().unwrap();
    assert_eq!(observed.len(), 2);
    let (inner, outer_seen) = (&observed[0], &observed[1]);

    assert_eq!(backend.type_of(inner.handle()), inner_ty);
    assert!(Arc::ptr_eq(outer_seen, &outer));
    assert_ne!(inner.handle(), outer.handle());
    assert_eq!(cache.len(), 2);
}

#[test]
fn finalization_from_worker_thread_runs_on_main_context() {
    let (backend, cache, ty) = setup();
    backend.set_main_context_active(true);
    let address = backend.allocate(ty);

    let proxy = cache.get_for_type(address, Some(object_ctor)).unwrap();

    let worker_cache = cache.clone();
    std::thread::spawn(move || {
        let held = worker_cache.lookup(address);
        drop(held);
        drop(proxy); // last handle dropped off the main thread
    })
    .join()
    .unwrap();

    // The toggle removal was posted, not run inline on the worker
    assert!(backend.is_alive(address));
    assert_eq!(backend.run_pending(), 1);
    assert!(!backend.is_alive(address));
    assert!(cache.is_empty());
}

#[test]
fn cleaner_frees_owned_memory_exactly_once() {
    struct ValueProxy {
        base: ProxyBase,
    }
    impl Proxy for ValueProxy {
        fn base(&self) -> &ProxyBase {
            &self.base
        }
        fn kind(&self) -> ProxyKind {
            ProxyKind::Value
        }
    }

    let backend = Arc::new(MockBackend::new());
    let cleaner = MemoryCleaner::new(Arc::clone(&backend) as Arc<dyn NativeBackend>);

    let address = 0x7700;
    let proxy: Arc<dyn Proxy> = Arc::new(ValueProxy {
        base: ProxyBase::new(address),
    });
    cleaner.take_ownership(&proxy);

    // Duplicate cleanup signals: an explicit free plus the drop finalizer
    cleaner.free(address);
    cleaner.free(address);
    drop(proxy);

    assert_eq!(backend.event_count(&NativeEvent::Freed(address)), 1);
}

#[test]
fn cleaner_drop_releases_through_recorded_function() {
    struct ValueProxy {
        base: ProxyBase,
    }
    impl Proxy for ValueProxy {
        fn base(&self) -> &ProxyBase {
            &self.base
        }
        fn kind(&self) -> ProxyKind {
            ProxyKind::Value
        }
    }

    let backend = Arc::new(MockBackend::new());
    let cleaner = MemoryCleaner::new(Arc::clone(&backend) as Arc<dyn NativeBackend>);
    let boxed_ty = NativeType(11);

    let boxed: Arc<dyn Proxy> = Arc::new(ValueProxy {
        base: ProxyBase::new(0x8800),
    });
    cleaner.set_boxed_type(&boxed, boxed_ty);
    cleaner.take_ownership(&boxed);

    let custom: Arc<dyn Proxy> = Arc::new(ValueProxy {
        base: ProxyBase::new(0x9900),
    });
    cleaner.set_free_func(&custom, "g_error_free");
    cleaner.take_ownership(&custom);

    drop(boxed);
    drop(custom);

    assert_eq!(
        backend.event_count(&NativeEvent::BoxedFreed(boxed_ty, 0x8800)),
        1
    );
    assert_eq!(
        backend.event_count(&NativeEvent::CustomFreed("g_error_free", 0x9900)),
        1
    );
}

#[test]
fn cleaner_yielded_memory_is_never_freed() {
    struct ValueProxy {
        base: ProxyBase,
    }
    impl Proxy for ValueProxy {
        fn base(&self) -> &ProxyBase {
            &self.base
        }
        fn kind(&self) -> ProxyKind {
            ProxyKind::Value
        }
    }

    let backend = Arc::new(MockBackend::new());
    let cleaner = MemoryCleaner::new(Arc::clone(&backend) as Arc<dyn NativeBackend>);

    let address = 0xaa00;
    let proxy: Arc<dyn Proxy> = Arc::new(ValueProxy {
        base: ProxyBase::new(address),
    });
    cleaner.take_ownership(&proxy);
    // Ownership transfers to native code before the proxy goes away
    cleaner.yield_ownership(&proxy);
    drop(proxy);

    assert_eq!(backend.event_count(&NativeEvent::Freed(address)), 0);
}

#[test]
fn fallback_constructor_registers_for_future_lookups() {
    let (backend, cache, ty) = setup();
    let first_address = backend.allocate(ty);
    let second_address = backend.allocate(ty);

    let _first = cache.get_for_type(first_address, Some(object_ctor)).unwrap();
    // The fallback was registered for the type, so the second object
    // resolves without one
    let second = cache.get_for_type(second_address, None).unwrap();
    assert_eq!(second.handle(), second_address);
}
