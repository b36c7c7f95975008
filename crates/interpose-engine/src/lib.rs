//! Interpose Engine
//!
//! Runtime proxy type synthesis and interceptor dispatch:
//! - **Model**: runtime types, members, values and objects (`model` module)
//! - **Proxy**: type generators, the synthesis cache, the proxy builder and
//!   the invocation pipeline (`proxy` module)
//! - **Config**: engine configuration loaded from TOML (`config` module)
//!
//! # Example
//!
//! ```rust,ignore
//! use interpose_engine::{GenerationOptions, Invocation, ProxyGenerator, TypeBuilder, MethodDef, Value};
//!
//! let calculator = TypeBuilder::class("Calculator")
//!     .method(MethodDef::build("Add").param("a", &builtin::int()).param("b", &builtin::int())
//!         .returns(&builtin::int())
//!         .body(|ctx| Ok(Value::Int(ctx.arg(0).as_int().unwrap_or(0) + ctx.arg(1).as_int().unwrap_or(0)))))
//!     .build();
//!
//! let generator = ProxyGenerator::new();
//! let doubling = Arc::new(|inv: &mut Invocation| {
//!     inv.proceed()?;
//!     let n = inv.return_value().as_int().unwrap_or(0);
//!     inv.set_return_value(n * 2);
//!     Ok(())
//! });
//! let proxy = generator.create_class_proxy(&calculator, &[], &GenerationOptions::default(), vec![doubling])?;
//! assert_eq!(proxy.invoke("Add", &[Value::Int(1), Value::Int(2)])?, Value::Int(6));
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

// ============================================================================
// Core Modules
// ============================================================================

/// Configuration: synthesis namespace and visibility grants
pub mod config;

/// Error types for generation, instantiation and invocation
pub mod error;

/// Runtime type model
pub mod model;

/// Proxy synthesis and invocation dispatch
pub mod proxy;

// ============================================================================
// Re-exports
// ============================================================================

pub use config::{ConfigError, EngineConfig, GrantRule};
pub use error::{GenerationError, GenerationResult, InstantiationError, InvocationError, InvocationResult};
pub use model::{builtin, MethodDef, ModuleInfo, ObjectRef, TypeBuilder, TypeDef, TypeRef, Value, Visibility};
pub use proxy::{
    ChangeTarget, GenerationHook, GenerationOptions, Interceptor, InterceptorSelector, Invocation, InvocationSnapshot,
    MixinData, ProxyBuilder, ProxyGenerator, ProxyShape, SynthesizedType, TypeSynthesisCache,
};
