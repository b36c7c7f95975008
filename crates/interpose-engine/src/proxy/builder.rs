//! Proxy builder
//!
//! Public entry point for type synthesis. Every request is validated before
//! the cache is consulted, so rejected requests never register an entry:
//!
//! 1. visibility of the primary type, additional capabilities, mixin
//!    interfaces and the interface proxy base type. The target type of an
//!    interface proxy is reached through interface members only, so it may
//!    stay internal to its module.
//! 2. no open generic type definitions, target type included
//! 3. shape kind checks (class shapes need a non-sealed class, interface
//!    shapes and capabilities need interfaces)
//!
//! Equal requests share one synthesized type.

use std::sync::Arc;

use crate::config::EngineConfig;
use crate::error::{GenerationError, GenerationResult};
use crate::model::{TypeDef, TypeRef};

use super::generator::generator_for;
use super::scope::TypeSynthesisCache;
use super::signature::{GenerationOptions, GenerationSignature};
use super::synthesized::SynthesizedType;
use super::visibility::VisibilityPolicy;
use super::ProxyShape;

/// Validates proxy requests and obtains synthesized types from a cache
#[derive(Debug, Clone)]
pub struct ProxyBuilder {
    scope: Arc<TypeSynthesisCache>,
    visibility: VisibilityPolicy,
}

impl ProxyBuilder {
    /// Builder with its own cache and default configuration
    pub fn new() -> Self {
        Self::with_config(&EngineConfig::default())
    }

    /// Builder with its own cache, configured from `config`
    pub fn with_config(config: &EngineConfig) -> Self {
        Self {
            scope: Arc::new(TypeSynthesisCache::with_config(config)),
            visibility: VisibilityPolicy::from_config(config),
        }
    }

    /// Builder sharing `scope`
    pub fn with_scope(scope: Arc<TypeSynthesisCache>) -> Self {
        Self {
            scope,
            visibility: VisibilityPolicy::new(),
        }
    }

    /// Replace the visibility policy
    pub fn visibility_policy(mut self, visibility: VisibilityPolicy) -> Self {
        self.visibility = visibility;
        self
    }

    /// The cache types are obtained from
    pub fn scope(&self) -> &Arc<TypeSynthesisCache> {
        &self.scope
    }

    /// The visibility policy
    pub fn visibility(&self) -> &VisibilityPolicy {
        &self.visibility
    }

    /// Subclass of `class` whose terminal step runs the inherited bodies
    pub fn create_class_proxy_type(
        &self,
        class: &TypeRef,
        additional: &[TypeRef],
        options: &GenerationOptions,
    ) -> GenerationResult<Arc<SynthesizedType>> {
        self.obtain(ProxyShape::ClassProxy, class, None, additional, options)
    }

    /// Subclass of `class` forwarding to a swappable target instance
    pub fn create_class_proxy_type_with_target(
        &self,
        class: &TypeRef,
        additional: &[TypeRef],
        options: &GenerationOptions,
    ) -> GenerationResult<Arc<SynthesizedType>> {
        self.obtain(ProxyShape::ClassProxyWithTarget, class, None, additional, options)
    }

    /// Implementation of `interface` forwarding to a target of `target_type`
    pub fn create_interface_proxy_type_with_target(
        &self,
        interface: &TypeRef,
        additional: &[TypeRef],
        target_type: &TypeRef,
        options: &GenerationOptions,
    ) -> GenerationResult<Arc<SynthesizedType>> {
        self.obtain(
            ProxyShape::InterfaceProxyWithTarget,
            interface,
            Some(target_type),
            additional,
            options,
        )
    }

    /// Implementation of `interface` forwarding to a swappable target
    /// implementing `interface`
    pub fn create_interface_proxy_type_with_target_interface(
        &self,
        interface: &TypeRef,
        additional: &[TypeRef],
        options: &GenerationOptions,
    ) -> GenerationResult<Arc<SynthesizedType>> {
        self.obtain(
            ProxyShape::InterfaceProxyWithTargetInterface,
            interface,
            None,
            additional,
            options,
        )
    }

    /// Implementation of `interface` with no backing instance
    pub fn create_interface_proxy_type_without_target(
        &self,
        interface: &TypeRef,
        additional: &[TypeRef],
        options: &GenerationOptions,
    ) -> GenerationResult<Arc<SynthesizedType>> {
        self.obtain(ProxyShape::InterfaceProxyWithoutTarget, interface, None, additional, options)
    }

    fn obtain(
        &self,
        shape: ProxyShape,
        primary: &TypeRef,
        target_type: Option<&TypeRef>,
        additional: &[TypeRef],
        options: &GenerationOptions,
    ) -> GenerationResult<Arc<SynthesizedType>> {
        self.validate(shape, primary, target_type, additional, options)?;
        let signature = GenerationSignature::new(shape, primary, target_type, additional, options);
        self.scope
            .get_or_create(&signature, || generator_for(shape).generate(&self.scope, &signature))
    }

    fn accessible(&self, ty: &TypeDef) -> GenerationResult<()> {
        self.visibility.check(ty)?;
        if ty.is_open_generic() {
            return Err(GenerationError::OpenGenericTypeDefinition(ty.full_name()));
        }
        Ok(())
    }

    fn validate(
        &self,
        shape: ProxyShape,
        primary: &TypeRef,
        target_type: Option<&TypeRef>,
        additional: &[TypeRef],
        options: &GenerationOptions,
    ) -> GenerationResult<()> {
        self.accessible(primary)?;
        if shape.is_class_shape() {
            if !primary.is_class() {
                return Err(GenerationError::NotAClass(primary.full_name()));
            }
            if primary.is_sealed() {
                return Err(GenerationError::SealedClass(primary.full_name()));
            }
        } else if !primary.is_interface() {
            return Err(GenerationError::NotAnInterface(primary.full_name()));
        }

        if let Some(target_type) = target_type.filter(|ty| ty.is_open_generic()) {
            return Err(GenerationError::OpenGenericTypeDefinition(target_type.full_name()));
        }

        for cap in additional {
            self.accessible(cap)?;
            if !cap.is_interface() {
                return Err(GenerationError::NotAnInterface(cap.full_name()));
            }
        }

        for mixin in options.mixins.instances() {
            for iface in mixin.type_ref().all_interfaces() {
                self.accessible(&iface)?;
            }
        }

        if !shape.is_class_shape() {
            if let Some(base) = &options.base_type_for_interface_proxies {
                self.accessible(base)?;
                if !base.is_class() {
                    return Err(GenerationError::NotAClass(base.full_name()));
                }
                if base.is_sealed() {
                    return Err(GenerationError::SealedClass(base.full_name()));
                }
            }
        }

        Ok(())
    }
}

impl Default for ProxyBuilder {
    fn default() -> Self {
        Self::new()
    }
}
