//! Target change tests
//!
//! Only class proxies with target and interface proxies with target
//! interface expose the target-change capability.

use std::sync::Arc;

use interpose_engine::proxy::try_unwrap_proxy;

use super::harness::*;

/// Swaps the invocation target (or the proxy target when `whole_proxy` is
/// set) to `replacement` when the first argument is "swap"
fn swapping(replacement: &ObjectRef, whole_proxy: bool) -> Arc<dyn Interceptor> {
    let replacement = replacement.clone();
    Arc::new(move |inv: &mut Invocation| {
        if inv.argument(0)?.as_str() == Some("swap") {
            let change = inv.change_target().ok_or(InvocationError::TargetChangeUnsupported)?;
            if whole_proxy {
                change.change_proxy_target(replacement.clone())?;
            } else {
                change.change_invocation_target(replacement.clone())?;
            }
        }
        inv.proceed()
    })
}

/// Records whether the call offered the target-change capability
fn probing(log: &Log) -> Arc<dyn Interceptor> {
    let log = Arc::clone(log);
    Arc::new(move |inv: &mut Invocation| {
        let available = inv.change_target().is_some();
        log.lock().push(format!("{:?}:{}", inv.shape(), available));
        inv.set_return_value("probed");
        Ok::<(), InvocationError>(())
    })
}

// ============================================================================
// 1. Scope of a Change
// ============================================================================

#[test]
fn test_invocation_target_change_affects_only_the_current_call() {
    let iface = greeter_iface();
    let greeter = greeter_class(&iface, &counter());
    let english = ObjectRef::new(&greeter);
    let french = ObjectRef::new(&greeter).with_field("greeting", "Bonjour");

    let proxy = ProxyGenerator::new()
        .create_class_proxy_with_target(
            &greeter,
            &[],
            &english,
            &GenerationOptions::default(),
            vec![swapping(&french, false)],
        )
        .unwrap();

    assert_eq!(proxy.invoke("Greet", &[Value::from("swap")]).unwrap(), Value::from("Bonjour, swap"));
    assert_eq!(proxy.invoke("Greet", &[Value::from("Ada")]).unwrap(), Value::from("Hello, Ada"));
    assert!(try_unwrap_proxy(&proxy).unwrap().target.unwrap().ptr_eq(&english));
}

#[test]
fn test_proxy_target_change_affects_later_calls() {
    let iface = greeter_iface();
    let greeter = greeter_class(&iface, &counter());
    let english = ObjectRef::new(&greeter);
    let french = ObjectRef::new(&greeter).with_field("greeting", "Bonjour");

    let proxy = ProxyGenerator::new()
        .create_interface_proxy_with_target_interface(
            &iface,
            &[],
            &english,
            &GenerationOptions::default(),
            vec![swapping(&french, true)],
        )
        .unwrap();

    assert_eq!(proxy.invoke("Greet", &[Value::from("swap")]).unwrap(), Value::from("Hello, swap"));
    assert_eq!(proxy.invoke("Greet", &[Value::from("Ada")]).unwrap(), Value::from("Bonjour, Ada"));
    assert!(try_unwrap_proxy(&proxy).unwrap().target.unwrap().ptr_eq(&french));
}

// ============================================================================
// 2. Rejected Changes
// ============================================================================

#[test]
fn test_replacement_must_match_the_target_type() {
    let iface = greeter_iface();
    let english = ObjectRef::new(&greeter_class(&iface, &counter()));
    let stranger = ObjectRef::new(&calculator());

    let proxy = ProxyGenerator::new()
        .create_interface_proxy_with_target_interface(
            &iface,
            &[],
            &english,
            &GenerationOptions::default(),
            vec![swapping(&stranger, true)],
        )
        .unwrap();

    let err = proxy.invoke("Greet", &[Value::from("swap")]).unwrap_err();
    assert_eq!(
        err,
        InvocationError::TargetTypeMismatch {
            expected: "Demo.IGreeter".to_string(),
            actual: "Demo.Calculator".to_string(),
        }
    );
    assert!(try_unwrap_proxy(&proxy).unwrap().target.unwrap().ptr_eq(&english));
}

#[test]
fn test_proxy_cannot_become_its_own_target() {
    let iface = greeter_iface();
    let english = ObjectRef::new(&greeter_class(&iface, &counter()));
    let self_target: Arc<dyn Interceptor> = Arc::new(|inv: &mut Invocation| {
        let me = inv.proxy().clone();
        inv.change_target()
            .ok_or(InvocationError::TargetChangeUnsupported)?
            .change_proxy_target(me)?;
        inv.proceed()
    });

    let proxy = ProxyGenerator::new()
        .create_interface_proxy_with_target_interface(&iface, &[], &english, &GenerationOptions::default(), vec![self_target])
        .unwrap();

    assert_eq!(
        proxy.invoke("Greet", &[Value::from("Ada")]).unwrap_err(),
        InvocationError::ProxyAsOwnTarget
    );
}

#[test]
fn test_fixed_target_shapes_do_not_offer_target_change() {
    let log = new_log();
    let generator = ProxyGenerator::new();
    let options = GenerationOptions::default();
    let iface = greeter_iface();
    let greeter = greeter_class(&iface, &counter());
    let target = ObjectRef::new(&greeter);

    let proxies = vec![
        generator.create_class_proxy(&greeter, &[], &options, vec![probing(&log)]).unwrap(),
        generator
            .create_class_proxy_with_target(&greeter, &[], &target, &options, vec![probing(&log)])
            .unwrap(),
        generator
            .create_interface_proxy_with_target(&iface, &[], &target, &options, vec![probing(&log)])
            .unwrap(),
        generator
            .create_interface_proxy_with_target_interface(&iface, &[], &target, &options, vec![probing(&log)])
            .unwrap(),
        generator
            .create_interface_proxy_without_target(&iface, &[], &options, vec![probing(&log)])
            .unwrap(),
    ];
    for proxy in &proxies {
        assert_eq!(proxy.invoke("Greet", &[Value::from("x")]).unwrap(), Value::from("probed"));
    }

    assert_eq!(
        entries(&log),
        vec![
            "ClassProxy:false",
            "ClassProxyWithTarget:true",
            "InterfaceProxyWithTarget:false",
            "InterfaceProxyWithTargetInterface:true",
            "InterfaceProxyWithoutTarget:false",
        ]
    );
}
