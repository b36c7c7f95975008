//! Type synthesis cache tests
//!
//! Sharing of synthesized types between equal requests, hook equality,
//! concurrent requests, naming and disposal.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use interpose_engine::proxy::{try_unwrap_proxy, TypeSynthesisCache};

use super::harness::*;

#[derive(Debug)]
struct KeyedHook {
    key: &'static str,
    generations: AtomicUsize,
}

impl KeyedHook {
    fn new(key: &'static str) -> Arc<Self> {
        Arc::new(Self {
            key,
            generations: AtomicUsize::new(0),
        })
    }
}

impl GenerationHook for KeyedHook {
    fn should_intercept_method(&self, _ty: &TypeDef, _method: &MethodDef) -> bool {
        true
    }

    fn methods_inspected(&self) {
        self.generations.fetch_add(1, Ordering::SeqCst);
    }

    fn cache_key(&self) -> Option<String> {
        Some(self.key.to_string())
    }
}

#[derive(Debug)]
struct PlainHook;

impl GenerationHook for PlainHook {
    fn should_intercept_method(&self, _ty: &TypeDef, _method: &MethodDef) -> bool {
        true
    }
}

// ============================================================================
// 1. Sharing
// ============================================================================

#[test]
fn test_proxies_from_equal_requests_share_a_type() {
    let generator = ProxyGenerator::new();
    let calc = calculator();

    let a = generator
        .create_class_proxy(&calc, &[], &GenerationOptions::default(), vec![])
        .unwrap();
    let b = generator
        .create_class_proxy(&calc, &[], &GenerationOptions::default(), vec![doubling()])
        .unwrap();

    let a_type = try_unwrap_proxy(&a).unwrap().proxy_type;
    let b_type = try_unwrap_proxy(&b).unwrap().proxy_type;
    assert!(Arc::ptr_eq(&a_type, &b_type));
    assert!(!a.ptr_eq(&b));
    assert_eq!(generator.builder().scope().len(), 1);
}

#[test]
fn test_capability_order_does_not_matter() {
    let first = named_iface("IFirst", "First", &builtin::int());
    let second = named_iface("ISecond", "Second", &builtin::int());
    let builder = ProxyBuilder::new();
    let options = GenerationOptions::default();
    let calc = calculator();

    let a = builder
        .create_class_proxy_type(&calc, &[first.clone(), second.clone()], &options)
        .unwrap();
    let b = builder
        .create_class_proxy_type(&calc, &[second.clone(), first.clone(), first], &options)
        .unwrap();
    assert!(Arc::ptr_eq(&a, &b));

    let c = builder.create_class_proxy_type(&calc, &[second], &options).unwrap();
    assert!(!Arc::ptr_eq(&a, &c));
}

#[test]
fn test_keyed_hooks_share_types_and_unkeyed_hooks_do_not() {
    let builder = ProxyBuilder::new();
    let iface = greeter_iface();

    let keyed_a = GenerationOptions::default().with_hook(KeyedHook::new("audit"));
    let keyed_b = GenerationOptions::default().with_hook(KeyedHook::new("audit"));
    let a = builder.create_interface_proxy_type_without_target(&iface, &[], &keyed_a).unwrap();
    let b = builder.create_interface_proxy_type_without_target(&iface, &[], &keyed_b).unwrap();
    assert!(Arc::ptr_eq(&a, &b));

    let other_key = GenerationOptions::default().with_hook(KeyedHook::new("metrics"));
    let c = builder.create_interface_proxy_type_without_target(&iface, &[], &other_key).unwrap();
    assert!(!Arc::ptr_eq(&a, &c));

    let plain = GenerationOptions::default().with_hook(Arc::new(PlainHook));
    let also_plain = GenerationOptions::default().with_hook(Arc::new(PlainHook));
    let d = builder.create_interface_proxy_type_without_target(&iface, &[], &plain).unwrap();
    let e = builder.create_interface_proxy_type_without_target(&iface, &[], &also_plain).unwrap();
    let f = builder.create_interface_proxy_type_without_target(&iface, &[], &plain).unwrap();
    assert!(!Arc::ptr_eq(&d, &e));
    assert!(Arc::ptr_eq(&d, &f));

    assert_eq!(builder.scope().len(), 4);
}

#[test]
fn test_builders_sharing_a_cache_share_types() {
    let scope = Arc::new(TypeSynthesisCache::new());
    let first = ProxyBuilder::with_scope(Arc::clone(&scope));
    let second = ProxyBuilder::with_scope(Arc::clone(&scope));
    let iface = greeter_iface();

    let a = first
        .create_interface_proxy_type_without_target(&iface, &[], &GenerationOptions::default())
        .unwrap();
    let b = second
        .create_interface_proxy_type_without_target(&iface, &[], &GenerationOptions::default())
        .unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(scope.len(), 1);
}

// ============================================================================
// 2. Concurrency
// ============================================================================

#[test]
fn test_concurrent_requests_generate_once() {
    let builder = ProxyBuilder::new();
    let hook = KeyedHook::new("concurrent");
    let calc = calculator();
    let start = Barrier::new(16);

    let produced: Vec<_> = thread::scope(|s| {
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let options = GenerationOptions::default().with_hook(hook.clone());
                let builder = &builder;
                let calc = &calc;
                let start = &start;
                s.spawn(move || {
                    start.wait();
                    builder.create_class_proxy_type(calc, &[], &options).unwrap()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert!(produced.iter().all(|ty| Arc::ptr_eq(ty, &produced[0])));
    assert_eq!(hook.generations.load(Ordering::SeqCst), 1);
    assert_eq!(builder.scope().len(), 1);
    assert_eq!(builder.scope().type_names().len(), 1);
}

#[test]
fn test_concurrent_calls_through_one_proxy() {
    let calls = counter();
    let iface = greeter_iface();
    let target = ObjectRef::new(&greeter_class(&iface, &calls));
    let log = new_log();
    let proxy = ProxyGenerator::new()
        .create_interface_proxy_with_target(&iface, &[], &target, &GenerationOptions::default(), vec![recording(&log, "rec")])
        .unwrap();

    thread::scope(|s| {
        for i in 0..8 {
            let proxy = proxy.clone();
            s.spawn(move || {
                let name = format!("caller{}", i);
                let greeting = proxy.invoke("Greet", &[Value::from(name.as_str())]).unwrap();
                assert_eq!(greeting, Value::from(format!("Hello, {}", name)));
            });
        }
    });

    assert_eq!(count(&calls), 8);
    assert_eq!(entries(&log).len(), 8);
}

// ============================================================================
// 3. Naming and Disposal
// ============================================================================

#[test]
fn test_type_names_are_unique_within_the_namespace() {
    let config = EngineConfig::from_str("[scope]\nnamespace = \"App.Generated\"\n").unwrap();
    let builder = ProxyBuilder::with_config(&config);
    let options = GenerationOptions::default();

    let a = builder
        .create_interface_proxy_type_without_target(&greeter_iface(), &[], &options)
        .unwrap();
    let b = builder
        .create_interface_proxy_type_without_target(&greeter_iface(), &[], &options)
        .unwrap();

    assert_ne!(a.name(), b.name());
    assert_eq!(a.name(), "App.Generated.IGreeterProxy1");
    assert_eq!(b.name(), "App.Generated.IGreeterProxy2");
    assert_eq!(builder.scope().type_names(), vec![a.name().to_string(), b.name().to_string()]);
}

#[test]
fn test_disposed_cache_rejects_new_work() {
    let builder = ProxyBuilder::new();
    let iface = greeter_iface();
    let options = GenerationOptions::default();
    let ty = builder
        .create_interface_proxy_type_without_target(&iface, &[], &options)
        .unwrap();
    let existing = ty.create_instance(ProxyInit::new(vec![returning("still here")])).unwrap();

    builder.scope().dispose();
    builder.scope().dispose();

    assert!(builder.scope().is_disposed());
    assert!(builder.scope().is_empty());
    assert!(!ty.is_valid());
    assert_eq!(
        builder
            .create_interface_proxy_type_without_target(&iface, &[], &options)
            .unwrap_err(),
        GenerationError::ScopeDisposed
    );
    assert_eq!(
        ty.create_instance(ProxyInit::new(vec![])).unwrap_err(),
        InstantiationError::ScopeDisposed(ty.name().to_string())
    );
    // instances created before disposal keep working
    assert_eq!(existing.invoke("Greet", &[Value::from("x")]).unwrap(), Value::from("still here"));
}
