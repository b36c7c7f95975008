//! Synthesized proxy types and proxy instance state

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::error::{InstantiationError, InvocationError, InvocationResult};
use crate::model::{MethodDef, MethodRef, MethodSignature, ObjectRef, TypeDefId, TypeRef, Value};

use super::emit::{Terminal, Thunk};
use super::hook::InterceptorSelector;
use super::invocation::{Interceptor, Invocation, InvocationParts};
use super::ProxyShape;

/// A member of a synthesized type
#[derive(Clone)]
pub struct Slot {
    /// Member as declared on the proxied type or capability
    pub method: MethodRef,
    /// Whether calls walk the interceptor chain
    pub intercepted: bool,
    /// Terminal step
    pub terminal: Terminal,
    pub(crate) thunk: Thunk,
}

impl fmt::Debug for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slot")
            .field("method", &self.method.qualified_name())
            .field("intercepted", &self.intercepted)
            .field("terminal", &self.terminal)
            .finish()
    }
}

/// A proxy type produced by the type synthesis cache
pub struct SynthesizedType {
    name: String,
    shape: ProxyShape,
    proxied: TypeRef,
    target_type: Option<TypeRef>,
    runtime_type: TypeRef,
    interfaces: Vec<TypeRef>,
    slots: Vec<Slot>,
    by_name: FxHashMap<(String, usize), usize>,
    by_signature: FxHashMap<MethodSignature, usize>,
    mixin_types: Vec<TypeDefId>,
    alive: Arc<AtomicBool>,
}

impl SynthesizedType {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        name: String,
        shape: ProxyShape,
        proxied: TypeRef,
        target_type: Option<TypeRef>,
        runtime_type: TypeRef,
        interfaces: Vec<TypeRef>,
        slots: Vec<Slot>,
        mixin_types: Vec<TypeDefId>,
        alive: Arc<AtomicBool>,
    ) -> Self {
        let mut by_name = FxHashMap::default();
        let mut by_signature = FxHashMap::default();
        for (index, slot) in slots.iter().enumerate() {
            by_name
                .entry((slot.method.name().to_string(), slot.method.parameter_count()))
                .or_insert(index);
            by_signature.entry(slot.method.signature()).or_insert(index);
        }
        Self {
            name,
            shape,
            proxied,
            target_type,
            runtime_type,
            interfaces,
            slots,
            by_name,
            by_signature,
            mixin_types,
            alive,
        }
    }

    /// Full name, e.g. `Interpose.Proxies.IRepositoryProxy3`
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Proxy shape
    pub fn shape(&self) -> ProxyShape {
        self.shape
    }

    /// Proxied class or primary interface
    pub fn proxied_type(&self) -> &TypeRef {
        &self.proxied
    }

    /// Type targets must be assignable to (target shapes only)
    pub fn target_type(&self) -> Option<&TypeRef> {
        self.target_type.as_ref()
    }

    /// Type of proxy instances
    pub fn runtime_type(&self) -> &TypeRef {
        &self.runtime_type
    }

    /// Every interface the proxy implements, mixin interfaces included
    pub fn interfaces(&self) -> &[TypeRef] {
        &self.interfaces
    }

    /// Member slots in layout order
    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    /// Slot for the member called `name` taking `arity` arguments
    pub fn slot(&self, name: &str, arity: usize) -> Option<&Slot> {
        self.by_name
            .get(&(name.to_string(), arity))
            .map(|&index| &self.slots[index])
    }

    /// Slot implementing `method`
    pub fn slot_for(&self, method: &MethodDef) -> Option<&Slot> {
        self.by_signature
            .get(&method.signature())
            .map(|&index| &self.slots[index])
    }

    /// Number of mixins instances must supply
    pub fn mixin_count(&self) -> usize {
        self.mixin_types.len()
    }

    /// Whether the cache that produced this type is still alive
    pub fn is_valid(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Instantiate the proxy type
    pub fn create_instance(self: &Arc<Self>, init: ProxyInit) -> Result<ObjectRef, InstantiationError> {
        if !self.is_valid() {
            return Err(InstantiationError::ScopeDisposed(self.name.clone()));
        }

        let target = if self.shape.has_target() {
            let target = init
                .target
                .ok_or_else(|| InstantiationError::MissingTarget(self.name.clone()))?;
            if let Some(expected) = &self.target_type {
                if !target.type_ref().is_assignable_to(expected) {
                    return Err(InstantiationError::TargetTypeMismatch {
                        expected: expected.full_name(),
                        actual: target.type_ref().full_name(),
                    });
                }
            }
            Some(target)
        } else {
            if init.target.is_some() {
                tracing::debug!(proxy_type = %self.name, "ignoring target for target-less proxy shape");
            }
            None
        };

        if init.mixins.len() != self.mixin_types.len() {
            return Err(InstantiationError::MixinCountMismatch {
                type_name: self.name.clone(),
                expected: self.mixin_types.len(),
                actual: init.mixins.len(),
            });
        }
        for (mixin, expected) in init.mixins.iter().zip(&self.mixin_types) {
            if mixin.type_ref().id() != *expected {
                return Err(InstantiationError::TargetTypeMismatch {
                    expected: format!("mixin type #{}", expected.raw()),
                    actual: mixin.type_ref().full_name(),
                });
            }
        }

        let state = ProxyState {
            ty: Arc::clone(self),
            interceptors: init.interceptors.into(),
            target: RwLock::new(target),
            mixins: init.mixins,
            selector: init.selector,
        };
        let proxy = ObjectRef::new_proxy(&self.runtime_type, state);
        tracing::trace!(proxy_type = %self.name, proxy = proxy.id(), "proxy instantiated");
        Ok(proxy)
    }
}

impl fmt::Debug for SynthesizedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SynthesizedType")
            .field("name", &self.name)
            .field("shape", &self.shape)
            .field("proxied", &self.proxied.full_name())
            .field("slots", &self.slots.len())
            .field("valid", &self.is_valid())
            .finish()
    }
}

/// Per-instance inputs for [`SynthesizedType::create_instance`]
#[derive(Clone, Default)]
pub struct ProxyInit {
    /// Interceptor chain, outermost first
    pub interceptors: Vec<Arc<dyn Interceptor>>,
    /// Target instance (target shapes only)
    pub target: Option<ObjectRef>,
    /// Mixin instances, in the order the type was generated for
    pub mixins: Vec<ObjectRef>,
    /// Per-call interceptor selection
    pub selector: Option<Arc<dyn InterceptorSelector>>,
}

impl ProxyInit {
    /// Instance inputs with the given interceptors
    pub fn new(interceptors: Vec<Arc<dyn Interceptor>>) -> Self {
        Self {
            interceptors,
            ..Self::default()
        }
    }

    /// Set the target
    pub fn with_target(mut self, target: ObjectRef) -> Self {
        self.target = Some(target);
        self
    }

    /// Set the mixin instances
    pub fn with_mixins(mut self, mixins: Vec<ObjectRef>) -> Self {
        self.mixins = mixins;
        self
    }

    /// Set the selector
    pub fn with_selector(mut self, selector: Arc<dyn InterceptorSelector>) -> Self {
        self.selector = Some(selector);
        self
    }
}

/// State carried by every proxy instance
pub struct ProxyState {
    ty: Arc<SynthesizedType>,
    interceptors: Arc<[Arc<dyn Interceptor>]>,
    target: RwLock<Option<ObjectRef>>,
    mixins: Vec<ObjectRef>,
    selector: Option<Arc<dyn InterceptorSelector>>,
}

impl ProxyState {
    /// The synthesized type of the proxy
    pub fn proxy_type(&self) -> &Arc<SynthesizedType> {
        &self.ty
    }

    /// Interceptors the proxy was created with
    pub fn interceptors(&self) -> &Arc<[Arc<dyn Interceptor>]> {
        &self.interceptors
    }

    /// Current target
    pub fn target(&self) -> Option<ObjectRef> {
        self.target.read().clone()
    }

    /// Mixin instances
    pub fn mixins(&self) -> &[ObjectRef] {
        &self.mixins
    }

    pub(crate) fn set_target(&self, target: ObjectRef) {
        *self.target.write() = Some(target);
    }

    pub(crate) fn target_for(&self, proxy: &ObjectRef, terminal: &Terminal) -> Option<ObjectRef> {
        match terminal {
            Terminal::Base(_) => Some(proxy.clone()),
            Terminal::Target(_) => self.target(),
            Terminal::Mixin { index, .. } => self.mixins.get(*index).cloned(),
            Terminal::NoTarget => None,
        }
    }

    fn interceptors_for(&self, method: &MethodDef) -> Arc<[Arc<dyn Interceptor>]> {
        match &self.selector {
            Some(selector) => selector
                .select_interceptors(&self.ty.proxied, method, &self.interceptors)
                .into(),
            None => Arc::clone(&self.interceptors),
        }
    }

    pub(crate) fn begin_invocation(
        &self,
        proxy: &ObjectRef,
        method: &MethodRef,
        terminal: &Terminal,
        generic_arguments: Vec<TypeRef>,
        arguments: Vec<Value>,
    ) -> Invocation {
        Invocation::new(InvocationParts {
            interceptors: self.interceptors_for(method),
            proxy: proxy.clone(),
            proxied: Arc::clone(&self.ty.proxied),
            shape: self.ty.shape,
            target: self.target_for(proxy, terminal),
            expected_target_type: self.ty.target_type.clone(),
            method: Arc::clone(method),
            terminal: terminal.clone(),
            generic_arguments,
            arguments,
        })
    }

    pub(crate) fn dispatch_by_name(
        &self,
        proxy: &ObjectRef,
        name: &str,
        generic_arguments: &[TypeRef],
        arguments: &[Value],
    ) -> InvocationResult<Value> {
        let slot = self
            .ty
            .slot(name, arguments.len())
            .ok_or_else(|| InvocationError::MissingMember {
                type_name: self.ty.name.clone(),
                member: name.to_string(),
                arity: arguments.len(),
            })?;
        tracing::trace!(proxy_type = %self.ty.name, member = name, intercepted = slot.intercepted, "dispatch");
        (slot.thunk)(proxy, self, generic_arguments, arguments)
    }

    pub(crate) fn dispatch_method(
        &self,
        proxy: &ObjectRef,
        method: &MethodDef,
        generic_arguments: &[TypeRef],
        arguments: &[Value],
    ) -> InvocationResult<Value> {
        let slot = self
            .ty
            .slot_for(method)
            .ok_or_else(|| InvocationError::MissingMember {
                type_name: self.ty.name.clone(),
                member: method.name().to_string(),
                arity: method.parameter_count(),
            })?;
        tracing::trace!(proxy_type = %self.ty.name, member = method.name(), intercepted = slot.intercepted, "dispatch");
        (slot.thunk)(proxy, self, generic_arguments, arguments)
    }
}

impl fmt::Debug for ProxyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyState")
            .field("type", &self.ty.name)
            .field("interceptors", &self.interceptors.len())
            .field("target", &self.target.read().as_ref().map(|t| t.id()))
            .field("mixins", &self.mixins.len())
            .finish()
    }
}
