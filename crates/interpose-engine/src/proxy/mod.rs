//! Proxy type synthesis and invocation dispatch
//!
//! This module provides:
//! - `ProxyBuilder`: validates requests and produces synthesized proxy types
//! - `TypeSynthesisCache`: at most one synthesized type per generation signature
//! - Type generators for the five proxy shapes
//! - `Invocation`: the per-call walk over the interceptor chain
//! - `ProxyGenerator`: type synthesis plus instantiation in one call
//! - Utilities for detecting and unwrapping proxies
//!
//! # Example
//!
//! ```ignore
//! use interpose_engine::proxy::{ProxyGenerator, GenerationOptions, Interceptor};
//!
//! let generator = ProxyGenerator::new();
//! let logged: Arc<dyn Interceptor> = Arc::new(|inv: &mut Invocation| {
//!     tracing::info!(method = inv.method().name(), "call");
//!     inv.proceed()
//! });
//! let proxy = generator.create_interface_proxy_with_target(
//!     &repository_iface, &[], &sql_repository, &GenerationOptions::default(), vec![logged],
//! )?;
//! proxy.invoke("Find", &[Value::Int(7)])?;
//! ```

pub mod builder;
pub mod emit;
pub mod factory;
pub mod generator;
pub mod hook;
pub mod invocation;
pub mod scope;
pub mod signature;
pub mod snapshot;
pub mod synthesized;
pub mod util;
pub mod visibility;

pub use builder::ProxyBuilder;
pub use emit::{CodeContainer, CodeEmitter, SlotPlan, Terminal, ThunkTableEmitter, TypePlan};
pub use factory::ProxyGenerator;
pub use hook::{AllMethodsHook, GenerationHook, InterceptorSelector};
pub use invocation::{ChangeTarget, Interceptor, Invocation};
pub use scope::{SynthesizedTypeEntry, TypeSynthesisCache};
pub use signature::{AttributeInheritance, GenerationOptions, GenerationSignature, MixinData};
pub use snapshot::{InvocationSnapshot, MethodIdentity, ObjectIdentity, SnapshotRegistry, SnapshotResolver, SnapshotValue};
pub use synthesized::{ProxyInit, ProxyState, Slot, SynthesizedType};
pub use util::{
    interceptors_of, is_proxy, is_proxy_type, try_unwrap_proxy, unproxied_instance, unproxied_instance_deep, unproxied_type,
    UnwrappedProxy,
};
pub use visibility::VisibilityPolicy;

/// The five kinds of synthesized proxy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProxyShape {
    /// Subclass whose terminal step runs the inherited base body
    ClassProxy,
    /// Subclass whose terminal step calls a separate, swappable instance
    ClassProxyWithTarget,
    /// Interface implementation delegating to a target of a given type
    InterfaceProxyWithTarget,
    /// Interface implementation delegating to a swappable target of the same interface
    InterfaceProxyWithTargetInterface,
    /// Interface implementation with no backing instance
    InterfaceProxyWithoutTarget,
}

impl ProxyShape {
    /// Whether instances hold a target object
    pub fn has_target(&self) -> bool {
        matches!(
            self,
            ProxyShape::ClassProxyWithTarget
                | ProxyShape::InterfaceProxyWithTarget
                | ProxyShape::InterfaceProxyWithTargetInterface
        )
    }

    /// Whether interceptors may redirect the target
    pub fn allows_target_change(&self) -> bool {
        matches!(
            self,
            ProxyShape::ClassProxyWithTarget | ProxyShape::InterfaceProxyWithTargetInterface
        )
    }

    /// Whether the synthesized type subclasses the proxied type
    pub fn is_class_shape(&self) -> bool {
        matches!(self, ProxyShape::ClassProxy | ProxyShape::ClassProxyWithTarget)
    }

    /// Short label used in logs
    pub fn label(&self) -> &'static str {
        match self {
            ProxyShape::ClassProxy => "class",
            ProxyShape::ClassProxyWithTarget => "class-with-target",
            ProxyShape::InterfaceProxyWithTarget => "interface-with-target",
            ProxyShape::InterfaceProxyWithTargetInterface => "interface-with-target-interface",
            ProxyShape::InterfaceProxyWithoutTarget => "interface-without-target",
        }
    }
}
