//! Proxy generator: type synthesis plus instantiation
//!
//! Wraps a [`ProxyBuilder`] and instantiates the synthesized type with the
//! interceptors, target and mixin instances of a request. Mixin instances
//! and the interceptor selector are taken from the generation options.

use std::sync::Arc;

use crate::config::EngineConfig;
use crate::error::InstantiationError;
use crate::model::{ObjectRef, TypeRef};

use super::builder::ProxyBuilder;
use super::invocation::Interceptor;
use super::signature::GenerationOptions;
use super::synthesized::{ProxyInit, SynthesizedType};

/// Creates proxy instances
#[derive(Debug, Clone, Default)]
pub struct ProxyGenerator {
    builder: ProxyBuilder,
}

impl ProxyGenerator {
    /// Generator with its own cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Generator with its own cache, configured from `config`
    pub fn with_config(config: &EngineConfig) -> Self {
        Self {
            builder: ProxyBuilder::with_config(config),
        }
    }

    /// Generator using `builder`
    pub fn with_builder(builder: ProxyBuilder) -> Self {
        Self { builder }
    }

    /// The underlying builder
    pub fn builder(&self) -> &ProxyBuilder {
        &self.builder
    }

    /// Proxy subclassing `class`; calls end in the inherited bodies
    pub fn create_class_proxy(
        &self,
        class: &TypeRef,
        additional: &[TypeRef],
        options: &GenerationOptions,
        interceptors: Vec<Arc<dyn Interceptor>>,
    ) -> Result<ObjectRef, InstantiationError> {
        let ty = self.builder.create_class_proxy_type(class, additional, options)?;
        instantiate(&ty, options, interceptors, None)
    }

    /// Proxy subclassing `class`; calls end on `target`
    pub fn create_class_proxy_with_target(
        &self,
        class: &TypeRef,
        additional: &[TypeRef],
        target: &ObjectRef,
        options: &GenerationOptions,
        interceptors: Vec<Arc<dyn Interceptor>>,
    ) -> Result<ObjectRef, InstantiationError> {
        let ty = self.builder.create_class_proxy_type_with_target(class, additional, options)?;
        instantiate(&ty, options, interceptors, Some(target.clone()))
    }

    /// Proxy implementing `interface`; calls end on `target`, whose type
    /// must implement `interface`
    pub fn create_interface_proxy_with_target(
        &self,
        interface: &TypeRef,
        additional: &[TypeRef],
        target: &ObjectRef,
        options: &GenerationOptions,
        interceptors: Vec<Arc<dyn Interceptor>>,
    ) -> Result<ObjectRef, InstantiationError> {
        if !target.type_ref().is_assignable_to(interface) {
            return Err(InstantiationError::TargetTypeMismatch {
                expected: interface.full_name(),
                actual: target.type_ref().full_name(),
            });
        }
        let ty = self.builder.create_interface_proxy_type_with_target(
            interface,
            additional,
            target.type_ref(),
            options,
        )?;
        instantiate(&ty, options, interceptors, Some(target.clone()))
    }

    /// Proxy implementing `interface`; calls end on a swappable `target`
    pub fn create_interface_proxy_with_target_interface(
        &self,
        interface: &TypeRef,
        additional: &[TypeRef],
        target: &ObjectRef,
        options: &GenerationOptions,
        interceptors: Vec<Arc<dyn Interceptor>>,
    ) -> Result<ObjectRef, InstantiationError> {
        let ty = self
            .builder
            .create_interface_proxy_type_with_target_interface(interface, additional, options)?;
        instantiate(&ty, options, interceptors, Some(target.clone()))
    }

    /// Proxy implementing `interface` with no target; interceptors must
    /// produce every result
    pub fn create_interface_proxy_without_target(
        &self,
        interface: &TypeRef,
        additional: &[TypeRef],
        options: &GenerationOptions,
        interceptors: Vec<Arc<dyn Interceptor>>,
    ) -> Result<ObjectRef, InstantiationError> {
        let ty = self
            .builder
            .create_interface_proxy_type_without_target(interface, additional, options)?;
        instantiate(&ty, options, interceptors, None)
    }
}

fn instantiate(
    ty: &Arc<SynthesizedType>,
    options: &GenerationOptions,
    interceptors: Vec<Arc<dyn Interceptor>>,
    target: Option<ObjectRef>,
) -> Result<ObjectRef, InstantiationError> {
    ty.create_instance(ProxyInit {
        interceptors,
        target,
        mixins: options.mixins.instances().to_vec(),
        selector: options.selector.clone(),
    })
}
