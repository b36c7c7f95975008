//! Object instances and dynamic member dispatch

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::error::{InvocationError, InvocationResult};
use crate::proxy::ProxyState;

use super::method::{CallContext, MethodDef};
use super::types::TypeRef;
use super::value::Value;

static NEXT_OBJECT_ID: AtomicU64 = AtomicU64::new(1);

/// Heap object: a type, a field table and, for proxies, the proxy state
pub struct Instance {
    id: u64,
    ty: TypeRef,
    fields: Mutex<FxHashMap<String, Value>>,
    proxy: Option<ProxyState>,
}

/// Shared reference to an [`Instance`]. Equality is identity.
#[derive(Clone)]
pub struct ObjectRef(Arc<Instance>);

impl ObjectRef {
    /// Allocate a plain instance of `ty`
    pub fn new(ty: &TypeRef) -> Self {
        Self(Arc::new(Instance {
            id: NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed),
            ty: Arc::clone(ty),
            fields: Mutex::new(FxHashMap::default()),
            proxy: None,
        }))
    }

    pub(crate) fn new_proxy(ty: &TypeRef, state: ProxyState) -> Self {
        Self(Arc::new(Instance {
            id: NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed),
            ty: Arc::clone(ty),
            fields: Mutex::new(FxHashMap::default()),
            proxy: Some(state),
        }))
    }

    /// Process-unique object id
    pub fn id(&self) -> u64 {
        self.0.id
    }

    /// Runtime type
    pub fn type_ref(&self) -> &TypeRef {
        &self.0.ty
    }

    /// Read a field, `Value::Null` if unset
    pub fn get_field(&self, name: &str) -> Value {
        self.0.fields.lock().get(name).cloned().unwrap_or_default()
    }

    /// Write a field
    pub fn set_field(&self, name: impl Into<String>, value: impl Into<Value>) {
        self.0.fields.lock().insert(name.into(), value.into());
    }

    /// Builder-style field initialization
    pub fn with_field(self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set_field(name, value);
        self
    }

    /// Whether this object is an instance of a synthesized proxy type
    pub fn is_proxy(&self) -> bool {
        self.0.proxy.is_some()
    }

    /// Proxy bookkeeping, if this is a proxy
    pub fn proxy_state(&self) -> Option<&ProxyState> {
        self.0.proxy.as_ref()
    }

    /// Identity comparison
    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Call a non-generic member by name
    pub fn invoke(&self, name: &str, arguments: &[Value]) -> InvocationResult<Value> {
        self.invoke_generic(name, &[], arguments)
    }

    /// Call a member by name, binding generic arguments
    pub fn invoke_generic(&self, name: &str, generic_arguments: &[TypeRef], arguments: &[Value]) -> InvocationResult<Value> {
        if let Some(state) = &self.0.proxy {
            return state.dispatch_by_name(self, name, generic_arguments, arguments);
        }
        let method = self
            .0
            .ty
            .find_method(name, arguments.len())
            .ok_or_else(|| InvocationError::MissingMember {
                type_name: self.0.ty.full_name(),
                member: name.to_string(),
                arity: arguments.len(),
            })?;
        method.call(CallContext {
            this: self,
            generic_arguments,
            arguments,
        })
    }

    /// Call the member matching `method`'s signature.
    ///
    /// On plain instances this resolves the most derived implementation, so
    /// an interface member dispatches to the class that implements it.
    pub fn invoke_method(&self, method: &MethodDef, generic_arguments: &[TypeRef], arguments: &[Value]) -> InvocationResult<Value> {
        if let Some(state) = &self.0.proxy {
            return state.dispatch_method(self, method, generic_arguments, arguments);
        }
        let implementation = self
            .0
            .ty
            .find_implementation(method)
            .ok_or_else(|| InvocationError::MissingMember {
                type_name: self.0.ty.full_name(),
                member: method.name().to_string(),
                arity: method.parameter_count(),
            })?;
        implementation.call(CallContext {
            this: self,
            generic_arguments,
            arguments,
        })
    }
}

impl PartialEq for ObjectRef {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for ObjectRef {}

impl Hash for ObjectRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.id.hash(state);
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectRef")
            .field("id", &self.0.id)
            .field("type", &self.0.ty.full_name())
            .field("proxy", &self.0.proxy.is_some())
            .finish()
    }
}
