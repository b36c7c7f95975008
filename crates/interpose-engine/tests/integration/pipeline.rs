//! Invocation pipeline tests
//!
//! Ordering of interceptors, short-circuiting, argument and return value
//! rewriting, overruns and per-call interceptor selection.

use std::sync::Arc;

use super::harness::*;

// ============================================================================
// 1. Ordering and Terminal Step
// ============================================================================

#[test]
fn test_interceptors_run_in_order_then_target() {
    let log = new_log();
    let calls = counter();
    let iface = greeter_iface();
    let target = ObjectRef::new(&greeter_class(&iface, &calls));

    let proxy = ProxyGenerator::new()
        .create_interface_proxy_with_target(
            &iface,
            &[],
            &target,
            &GenerationOptions::default(),
            vec![recording(&log, "outer"), recording(&log, "inner")],
        )
        .unwrap();

    let result = proxy.invoke("Greet", &[Value::from("Ada")]).unwrap();
    assert_eq!(result, Value::from("Hello, Ada"));
    assert_eq!(entries(&log), vec!["outer:Greet", "inner:Greet"]);
    assert_eq!(count(&calls), 1);
}

#[test]
fn test_no_interceptors_reach_target() {
    let calls = counter();
    let iface = greeter_iface();
    let target = ObjectRef::new(&greeter_class(&iface, &calls)).with_field("greeting", "Hi");

    let proxy = ProxyGenerator::new()
        .create_interface_proxy_with_target(&iface, &[], &target, &GenerationOptions::default(), vec![])
        .unwrap();

    assert_eq!(proxy.invoke("Greet", &[Value::from("Bob")]).unwrap(), Value::from("Hi, Bob"));
    assert_eq!(count(&calls), 1);
}

#[test]
fn test_class_proxy_runs_base_body() {
    let proxy = ProxyGenerator::new()
        .create_class_proxy(&calculator(), &[], &GenerationOptions::default(), vec![doubling()])
        .unwrap();
    assert_eq!(proxy.invoke("Add", &[Value::Int(1), Value::Int(2)]).unwrap(), Value::Int(6));
}

#[test]
fn test_class_proxy_self_calls_are_intercepted() {
    let log = new_log();
    let proxy = ProxyGenerator::new()
        .create_class_proxy(&calculator(), &[], &GenerationOptions::default(), vec![recording(&log, "rec")])
        .unwrap();

    assert_eq!(proxy.invoke("Twice", &[Value::Int(3)]).unwrap(), Value::Int(6));
    assert_eq!(entries(&log), vec!["rec:Twice", "rec:Add"]);
}

#[test]
fn test_non_virtual_member_bypasses_chain() {
    let log = new_log();
    let proxy = ProxyGenerator::new()
        .create_class_proxy(&calculator(), &[], &GenerationOptions::default(), vec![recording(&log, "rec")])
        .unwrap();

    assert_eq!(proxy.invoke("Version", &[]).unwrap(), Value::from("1.0"));
    assert!(entries(&log).is_empty());
}

// ============================================================================
// 2. Short-Circuit and Rewriting
// ============================================================================

#[test]
fn test_short_circuit_skips_target() {
    let log = new_log();
    let calls = counter();
    let iface = greeter_iface();
    let target = ObjectRef::new(&greeter_class(&iface, &calls));

    let proxy = ProxyGenerator::new()
        .create_interface_proxy_with_target(
            &iface,
            &[],
            &target,
            &GenerationOptions::default(),
            vec![returning("cached"), recording(&log, "never")],
        )
        .unwrap();

    assert_eq!(proxy.invoke("Greet", &[Value::from("Ada")]).unwrap(), Value::from("cached"));
    assert_eq!(count(&calls), 0);
    assert!(entries(&log).is_empty());
}

#[test]
fn test_argument_change_reaches_target() {
    let calls = counter();
    let iface = greeter_iface();
    let target = ObjectRef::new(&greeter_class(&iface, &calls));
    let rename: Arc<dyn Interceptor> = Arc::new(|inv: &mut Invocation| {
        inv.set_argument(0, "World")?;
        inv.proceed()
    });

    let proxy = ProxyGenerator::new()
        .create_interface_proxy_with_target(&iface, &[], &target, &GenerationOptions::default(), vec![rename])
        .unwrap();

    assert_eq!(proxy.invoke("Greet", &[Value::from("Ada")]).unwrap(), Value::from("Hello, World"));
}

#[test]
fn test_interceptor_sees_arguments_and_generic_bindings() {
    let factory = TypeBuilder::interface("IFactory")
        .method(MethodDef::build("Create").generic(["T"]).returns(&builtin::any()))
        .build();
    let seen = new_log();
    let inspect: Arc<dyn Interceptor> = {
        let seen = Arc::clone(&seen);
        Arc::new(move |inv: &mut Invocation| -> InvocationResult<()> {
            let closed = inv.concrete_method()?;
            seen.lock().push(closed.display_name());
            let produced = closed.type_argument("T").cloned().map(Value::Type).unwrap_or_default();
            inv.set_return_value(produced);
            Ok(())
        })
    };

    let proxy = ProxyGenerator::new()
        .create_interface_proxy_without_target(&factory, &[], &GenerationOptions::default(), vec![inspect])
        .unwrap();

    let result = proxy.invoke_generic("Create", &[builtin::string()], &[]).unwrap();
    assert_eq!(result.as_type().map(|t| t.full_name()), Some("string".to_string()));
    assert_eq!(entries(&seen), vec!["Create<string>"]);
    assert!(matches!(
        proxy.invoke("Create", &[]).unwrap_err(),
        InvocationError::GenericArityMismatch { expected: 1, actual: 0, .. }
    ));
}

// ============================================================================
// 3. Failures
// ============================================================================

#[test]
fn test_second_proceed_overruns() {
    let double: Arc<dyn Interceptor> = Arc::new(|inv: &mut Invocation| {
        inv.proceed()?;
        inv.proceed()
    });
    let proxy = ProxyGenerator::new()
        .create_class_proxy(&calculator(), &[], &GenerationOptions::default(), vec![double])
        .unwrap();

    let err = proxy.invoke("Add", &[Value::Int(1), Value::Int(1)]).unwrap_err();
    assert!(matches!(err, InvocationError::PipelineOverrun { interceptors: 1, .. }));
}

#[test]
fn test_interceptor_error_aborts_call() {
    let calls = counter();
    let iface = greeter_iface();
    let target = ObjectRef::new(&greeter_class(&iface, &calls));
    let deny: Arc<dyn Interceptor> =
        Arc::new(|_: &mut Invocation| -> InvocationResult<()> { Err(InvocationError::Failed("access denied".to_string())) });

    let proxy = ProxyGenerator::new()
        .create_interface_proxy_with_target(&iface, &[], &target, &GenerationOptions::default(), vec![deny])
        .unwrap();

    assert_eq!(
        proxy.invoke("Greet", &[Value::from("Ada")]).unwrap_err(),
        InvocationError::Failed("access denied".to_string())
    );
    assert_eq!(count(&calls), 0);
}

#[test]
fn test_proxy_without_target_needs_an_answer() {
    let iface = greeter_iface();
    let generator = ProxyGenerator::new();

    let silent = generator
        .create_interface_proxy_without_target(&iface, &[], &GenerationOptions::default(), vec![])
        .unwrap();
    assert!(matches!(
        silent.invoke("Greet", &[Value::from("Ada")]).unwrap_err(),
        InvocationError::NoTarget { .. }
    ));

    let answering = generator
        .create_interface_proxy_without_target(&iface, &[], &GenerationOptions::default(), vec![returning("stub")])
        .unwrap();
    assert_eq!(answering.invoke("Greet", &[Value::from("Ada")]).unwrap(), Value::from("stub"));
}

#[test]
fn test_wrong_argument_count_rejected_before_chain() {
    let log = new_log();
    let proxy = ProxyGenerator::new()
        .create_class_proxy(&calculator(), &[], &GenerationOptions::default(), vec![recording(&log, "rec")])
        .unwrap();

    assert!(matches!(
        proxy.invoke("Add", &[Value::Int(1)]).unwrap_err(),
        InvocationError::MissingMember { arity: 1, .. }
    ));
    assert!(entries(&log).is_empty());
}

// ============================================================================
// 4. Interceptor Selection
// ============================================================================

#[test]
fn test_selector_filters_per_member() {
    let log = new_log();
    let selector = |_: &TypeDef, method: &MethodDef, all: &[Arc<dyn Interceptor>]| -> Vec<Arc<dyn Interceptor>> {
        if method.name() == "Add" {
            all.to_vec()
        } else {
            Vec::new()
        }
    };
    let options = GenerationOptions::default().with_selector(Arc::new(selector));

    let proxy = ProxyGenerator::new()
        .create_class_proxy(&calculator(), &[], &options, vec![recording(&log, "rec")])
        .unwrap();

    proxy.invoke("Add", &[Value::Int(1), Value::Int(2)]).unwrap();
    let counted: Arc<dyn Interceptor> = Arc::new(|inv: &mut Invocation| -> InvocationResult<()> {
        inv.set_return_value(inv.interceptor_count() as i64);
        Ok(())
    });
    let probe = ProxyGenerator::new()
        .create_class_proxy(&calculator(), &[], &options, vec![counted])
        .unwrap();

    assert_eq!(entries(&log), vec!["rec:Add"]);
    // Twice runs with an empty chain; its inner call to Add gets the full one
    assert_eq!(probe.invoke("Twice", &[Value::Int(4)]).unwrap(), Value::Int(1));
}
