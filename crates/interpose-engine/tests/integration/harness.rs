//! Shared fixtures for proxy integration tests
//!
//! Provides a small domain (calculator class, greeter interface and
//! implementation) plus interceptors that record or short-circuit calls.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

pub use interpose_engine::config::EngineConfig;
pub use interpose_engine::error::{GenerationError, GenerationResult, InstantiationError, InvocationError, InvocationResult};
pub use interpose_engine::model::{builtin, MethodDef, ModuleInfo, ObjectRef, TypeBuilder, TypeDef, TypeRef, Value, Visibility};
pub use interpose_engine::proxy::{
    ChangeTarget, GenerationHook, GenerationOptions, Interceptor, Invocation, ProxyBuilder, ProxyGenerator, ProxyInit,
    ProxyShape,
};

/// Shared call log
pub type Log = Arc<Mutex<Vec<String>>>;

pub fn new_log() -> Log {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn entries(log: &Log) -> Vec<String> {
    log.lock().clone()
}

/// Logs `"{name}:{member}"` and proceeds
pub fn recording(log: &Log, name: &str) -> Arc<dyn Interceptor> {
    let log = Arc::clone(log);
    let name = name.to_string();
    Arc::new(move |inv: &mut Invocation| {
        log.lock().push(format!("{}:{}", name, inv.method().name()));
        inv.proceed()
    })
}

/// Sets `value` as the return value without proceeding
pub fn returning(value: impl Into<Value>) -> Arc<dyn Interceptor> {
    let value = value.into();
    Arc::new(move |inv: &mut Invocation| -> InvocationResult<()> {
        inv.set_return_value(value.clone());
        Ok(())
    })
}

/// Proceeds, then doubles an integer return value
pub fn doubling() -> Arc<dyn Interceptor> {
    Arc::new(|inv: &mut Invocation| -> InvocationResult<()> {
        inv.proceed()?;
        let n = inv.return_value().as_int().unwrap_or(0);
        inv.set_return_value(n * 2);
        Ok(())
    })
}

/// `Demo.Calculator` with a virtual `Add`, a virtual `Twice` that calls
/// `Add` on itself, and a non-virtual `Version`
pub fn calculator() -> TypeRef {
    TypeBuilder::class("Calculator")
        .namespace("Demo")
        .method(
            MethodDef::build("Add")
                .param("a", &builtin::int())
                .param("b", &builtin::int())
                .returns(&builtin::int())
                .body(|ctx| {
                    let a = ctx.arg(0).as_int().unwrap_or(0);
                    let b = ctx.arg(1).as_int().unwrap_or(0);
                    Ok(Value::Int(a + b))
                }),
        )
        .method(
            MethodDef::build("Twice")
                .param("x", &builtin::int())
                .returns(&builtin::int())
                .body(|ctx| ctx.this.invoke("Add", &[ctx.arg(0), ctx.arg(0)])),
        )
        .method(
            MethodDef::build("Version")
                .returns(&builtin::string())
                .non_virtual()
                .body(|_| Ok(Value::from("1.0"))),
        )
        .build()
}

/// `Demo.IGreeter { Greet(string) -> string }`
pub fn greeter_iface() -> TypeRef {
    TypeBuilder::interface("IGreeter")
        .namespace("Demo")
        .method(
            MethodDef::build("Greet")
                .param("name", &builtin::string())
                .returns(&builtin::string()),
        )
        .build()
}

/// `Demo.Greeter : IGreeter`; greets with the `greeting` field
/// (default "Hello") and counts calls in `calls`
pub fn greeter_class(iface: &TypeRef, calls: &Arc<AtomicUsize>) -> TypeRef {
    let calls = Arc::clone(calls);
    TypeBuilder::class("Greeter")
        .namespace("Demo")
        .implements(iface)
        .method(
            MethodDef::build("Greet")
                .param("name", &builtin::string())
                .returns(&builtin::string())
                .body(move |ctx| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    let greeting = ctx.this.get_field("greeting").as_str().unwrap_or("Hello").to_string();
                    let name = ctx.arg(0).as_str().unwrap_or_default().to_string();
                    Ok(Value::from(format!("{}, {}", greeting, name)))
                }),
        )
        .build()
}

pub fn counter() -> Arc<AtomicUsize> {
    Arc::new(AtomicUsize::new(0))
}

pub fn count(counter: &Arc<AtomicUsize>) -> usize {
    counter.load(Ordering::SeqCst)
}

/// Interface with a single `name() -> string` member
pub fn named_iface(type_name: &str, member: &str, returns: &TypeRef) -> TypeRef {
    TypeBuilder::interface(type_name)
        .namespace("Demo")
        .method(MethodDef::build(member).returns(returns))
        .build()
}
