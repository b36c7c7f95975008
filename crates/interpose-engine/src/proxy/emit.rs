//! Code emission for synthesized proxy types
//!
//! Type generators describe a proxy as a [`TypePlan`]: the runtime type to
//! define and, per member, whether calls are intercepted and where the
//! terminal step goes. A [`CodeEmitter`] turns the plan into a
//! [`SynthesizedType`] registered in the cache's [`CodeContainer`].
//!
//! The built-in [`ThunkTableEmitter`] produces a table of closures, one per
//! member slot.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{GenerationError, GenerationResult, InvocationResult};
use crate::model::{MethodRef, ModuleInfo, ObjectRef, TypeBuilder, TypeDefId, TypeRef, Value};

use super::invocation::complete;
use super::synthesized::{ProxyState, Slot, SynthesizedType};
use super::ProxyShape;

/// Where a member call ends up once the interceptor chain is exhausted
#[derive(Debug, Clone)]
pub enum Terminal {
    /// Run the inherited body against the proxy itself
    Base(MethodRef),
    /// Call the member on the proxy's target
    Target(MethodRef),
    /// Call the member on a mixin instance
    Mixin {
        /// Position of the mixin instance
        index: usize,
        /// Interface member the mixin implements
        method: MethodRef,
    },
    /// Nothing to run; reaching the terminal step is an error
    NoTarget,
}

/// One member of a planned type
#[derive(Debug, Clone)]
pub struct SlotPlan {
    /// Member as declared on the proxied type or capability
    pub method: MethodRef,
    /// Whether calls build an invocation and walk the interceptor chain
    pub intercept: bool,
    /// Terminal step
    pub terminal: Terminal,
}

/// Everything an emitter needs to synthesize a proxy type
#[derive(Debug, Clone)]
pub struct TypePlan {
    /// Namespace of the synthesized type
    pub namespace: String,
    /// Simple name of the synthesized type
    pub name: String,
    /// Proxy shape
    pub shape: ProxyShape,
    /// Proxied class or primary interface
    pub proxied: TypeRef,
    /// Class the synthesized type extends
    pub parent: Option<TypeRef>,
    /// Type targets must be assignable to
    pub target_type: Option<TypeRef>,
    /// Interfaces the synthesized type implements
    pub interfaces: Vec<TypeRef>,
    /// Member slots in layout order
    pub slots: Vec<SlotPlan>,
    /// Mixin types, in mixin order
    pub mixin_types: Vec<TypeDefId>,
}

impl TypePlan {
    /// `Namespace.Name`
    pub fn full_name(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.namespace, self.name)
        }
    }
}

/// Container state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerState {
    /// Types can be defined
    Building,
    /// Disposed; no further types can be defined
    Sealed,
}

/// The dynamic module hosting synthesized types.
///
/// All writes go through `&mut self`; the cache keeps the container behind
/// a mutex so emission is serialized across signatures.
#[derive(Debug)]
pub struct CodeContainer {
    module: Arc<ModuleInfo>,
    state: ContainerState,
    type_names: Vec<String>,
    alive: Arc<AtomicBool>,
}

impl CodeContainer {
    /// Create an empty container hosted in a module called `name`
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            module: ModuleInfo::new(name),
            state: ContainerState::Building,
            type_names: Vec::new(),
            alive: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Module the synthesized types belong to
    pub fn module(&self) -> &Arc<ModuleInfo> {
        &self.module
    }

    /// Reserve `full_name` for a new type
    pub fn define_type(&mut self, full_name: &str) -> GenerationResult<()> {
        if self.state != ContainerState::Building {
            return Err(GenerationError::ScopeDisposed);
        }
        self.type_names.push(full_name.to_string());
        Ok(())
    }

    /// Seal the container and invalidate every type defined in it
    pub fn seal(&mut self) {
        self.state = ContainerState::Sealed;
        self.alive.store(false, Ordering::Release);
    }

    /// Check if the container is sealed
    pub fn is_sealed(&self) -> bool {
        self.state == ContainerState::Sealed
    }

    /// Names of the types defined so far, in definition order
    pub fn type_names(&self) -> &[String] {
        &self.type_names
    }

    /// Number of types defined
    pub fn len(&self) -> usize {
        self.type_names.len()
    }

    /// Whether no type has been defined
    pub fn is_empty(&self) -> bool {
        self.type_names.is_empty()
    }

    pub(crate) fn liveness(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.alive)
    }
}

/// Compiled member body of a synthesized type
pub type Thunk = Arc<dyn Fn(&ObjectRef, &ProxyState, &[TypeRef], &[Value]) -> InvocationResult<Value> + Send + Sync>;

/// Backend that synthesizes types from plans
pub trait CodeEmitter: Send + Sync {
    /// Backend name, for diagnostics
    fn name(&self) -> &str;

    /// Define `plan` in `container`
    fn emit(&self, plan: TypePlan, container: &mut CodeContainer) -> GenerationResult<SynthesizedType>;
}

/// Emitter producing a vtable of closures
#[derive(Debug, Clone, Copy, Default)]
pub struct ThunkTableEmitter;

impl ThunkTableEmitter {
    fn thunk(slot: &SlotPlan) -> Thunk {
        let method = Arc::clone(&slot.method);
        let terminal = slot.terminal.clone();
        if slot.intercept {
            Arc::new(move |proxy: &ObjectRef, state: &ProxyState, generic_arguments: &[TypeRef], arguments: &[Value]| {
                method.check_arity(generic_arguments, arguments)?;
                let mut invocation = state.begin_invocation(
                    proxy,
                    &method,
                    &terminal,
                    generic_arguments.to_vec(),
                    arguments.to_vec(),
                );
                invocation.proceed()?;
                Ok(invocation.into_return_value())
            })
        } else {
            Arc::new(move |proxy: &ObjectRef, state: &ProxyState, generic_arguments: &[TypeRef], arguments: &[Value]| {
                method.check_arity(generic_arguments, arguments)?;
                let target = state.target_for(proxy, &terminal);
                complete(&terminal, &method, proxy, target.as_ref(), generic_arguments, arguments)
            })
        }
    }
}

impl CodeEmitter for ThunkTableEmitter {
    fn name(&self) -> &str {
        "thunk-table"
    }

    fn emit(&self, plan: TypePlan, container: &mut CodeContainer) -> GenerationResult<SynthesizedType> {
        let full_name = plan.full_name();
        container.define_type(&full_name)?;

        let mut builder = TypeBuilder::class(plan.name.clone())
            .namespace(plan.namespace.clone())
            .module(container.module())
            .synthesized()
            .sealed();
        if let Some(parent) = &plan.parent {
            builder = builder.extends(parent);
        }
        for iface in &plan.interfaces {
            builder = builder.implements(iface);
        }
        let runtime_type = builder.build();

        let slots = plan
            .slots
            .iter()
            .map(|slot| Slot {
                method: Arc::clone(&slot.method),
                intercepted: slot.intercept,
                terminal: slot.terminal.clone(),
                thunk: Self::thunk(slot),
            })
            .collect();

        tracing::debug!(
            emitter = self.name(),
            name = %full_name,
            shape = plan.shape.label(),
            slots = plan.slots.len(),
            "emitted proxy type"
        );

        Ok(SynthesizedType::new(
            full_name,
            plan.shape,
            plan.proxied,
            plan.target_type,
            runtime_type,
            plan.interfaces,
            slots,
            plan.mixin_types,
            container.liveness(),
        ))
    }
}
