//! Serializable invocation snapshots
//!
//! An [`InvocationSnapshot`] carries an invocation across a serialization
//! boundary: method identity, arguments, generic bindings, target identity
//! and the return value. It holds no reference to the interceptor chain;
//! [`InvocationSnapshot::restore`] rebuilds a live [`Invocation`] against a
//! local proxy and re-resolves the chain there.

use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::{InvocationError, InvocationResult};
use crate::model::{builtin, MethodDef, ObjectRef, TypeRef, Value};

use super::invocation::Invocation;

/// Identity of an object on the capturing side
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectIdentity {
    /// Full name of the object's type
    pub type_name: String,
    /// Object id
    pub id: u64,
}

impl ObjectIdentity {
    /// Identity of `object`
    pub fn of(object: &ObjectRef) -> Self {
        Self {
            type_name: object.type_ref().full_name(),
            id: object.id(),
        }
    }
}

/// Identity of a member
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodIdentity {
    /// Full name of the declaring type
    pub declaring_type: String,
    /// Member name
    pub name: String,
    /// Full names of the parameter types
    pub parameter_types: Vec<String>,
    /// Number of generic parameters
    #[serde(default)]
    pub generic_arity: usize,
}

impl MethodIdentity {
    /// Identity of `method`
    pub fn of(method: &MethodDef) -> Self {
        Self {
            declaring_type: method.declaring_type().to_string(),
            name: method.name().to_string(),
            parameter_types: method.parameters().iter().map(|p| p.ty.full_name()).collect(),
            generic_arity: method.generic_parameters().len(),
        }
    }

    /// Whether this identifies `method`
    pub fn matches(&self, method: &MethodDef) -> bool {
        self.declaring_type == method.declaring_type()
            && self.name == method.name()
            && self.generic_arity == method.generic_parameters().len()
            && self.parameter_types.len() == method.parameter_count()
            && self
                .parameter_types
                .iter()
                .zip(method.parameters())
                .all(|(name, p)| *name == p.ty.full_name())
    }
}

/// Serializable value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum SnapshotValue {
    /// Null value
    Null,
    /// Boolean value
    Boolean(bool),
    /// Integer value
    Integer(i64),
    /// Float value
    Float(f64),
    /// String value
    String(String),
    /// Type, by full name
    Type(String),
    /// List of values
    Array(Vec<SnapshotValue>),
    /// Reference to an object by identity
    ObjectRef(ObjectIdentity),
}

impl SnapshotValue {
    /// Capture a value
    pub fn capture(value: &Value) -> Self {
        match value {
            Value::Null => SnapshotValue::Null,
            Value::Bool(b) => SnapshotValue::Boolean(*b),
            Value::Int(i) => SnapshotValue::Integer(*i),
            Value::Float(f) => SnapshotValue::Float(*f),
            Value::Str(s) => SnapshotValue::String(s.to_string()),
            Value::Type(t) => SnapshotValue::Type(t.full_name()),
            Value::List(items) => SnapshotValue::Array(items.iter().map(Self::capture).collect()),
            Value::Object(o) => SnapshotValue::ObjectRef(ObjectIdentity::of(o)),
        }
    }

    /// Rebuild a live value, resolving types and objects through `resolver`
    pub fn restore(&self, resolver: &dyn SnapshotResolver) -> InvocationResult<Value> {
        Ok(match self {
            SnapshotValue::Null => Value::Null,
            SnapshotValue::Boolean(b) => Value::Bool(*b),
            SnapshotValue::Integer(i) => Value::Int(*i),
            SnapshotValue::Float(f) => Value::Float(*f),
            SnapshotValue::String(s) => Value::from(s.as_str()),
            SnapshotValue::Type(name) => Value::Type(resolve_type(resolver, name)?),
            SnapshotValue::Array(items) => Value::List(
                items
                    .iter()
                    .map(|item| item.restore(resolver))
                    .collect::<InvocationResult<Vec<_>>>()?,
            ),
            SnapshotValue::ObjectRef(identity) => Value::Object(resolver.resolve_object(identity).ok_or_else(|| {
                InvocationError::Snapshot(format!(
                    "unknown object {} #{}",
                    identity.type_name, identity.id
                ))
            })?),
        })
    }
}

/// Resolves identities carried by a snapshot to local objects and types
pub trait SnapshotResolver {
    /// Local object for `identity`
    fn resolve_object(&self, identity: &ObjectIdentity) -> Option<ObjectRef>;

    /// Local type called `full_name`
    fn resolve_type(&self, full_name: &str) -> Option<TypeRef>;
}

fn resolve_type(resolver: &dyn SnapshotResolver, name: &str) -> InvocationResult<TypeRef> {
    resolver
        .resolve_type(name)
        .or_else(|| builtin::by_name(name))
        .ok_or_else(|| InvocationError::Snapshot(format!("unknown type '{}'", name)))
}

/// Registry of objects and types snapshots may refer to
#[derive(Debug, Default)]
pub struct SnapshotRegistry {
    objects: RwLock<FxHashMap<u64, ObjectRef>>,
    types: RwLock<FxHashMap<String, TypeRef>>,
}

impl SnapshotRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `object` resolvable by its identity
    pub fn register_object(&self, object: &ObjectRef) {
        self.objects.write().insert(object.id(), object.clone());
    }

    /// Make `ty` resolvable by its full name
    pub fn register_type(&self, ty: &TypeRef) {
        self.types.write().insert(ty.full_name(), Arc::clone(ty));
    }
}

impl SnapshotResolver for SnapshotRegistry {
    fn resolve_object(&self, identity: &ObjectIdentity) -> Option<ObjectRef> {
        self.objects
            .read()
            .get(&identity.id)
            .filter(|o| o.type_ref().full_name() == identity.type_name)
            .cloned()
    }

    fn resolve_type(&self, full_name: &str) -> Option<TypeRef> {
        self.types.read().get(full_name).cloned()
    }
}

/// Immutable, serializable capture of an invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvocationSnapshot {
    /// Called member
    pub method: MethodIdentity,
    /// Arguments at capture time
    pub arguments: Vec<SnapshotValue>,
    /// Generic arguments, by full type name
    #[serde(default)]
    pub generic_arguments: Vec<String>,
    /// Invocation target at capture time
    #[serde(default)]
    pub target: Option<ObjectIdentity>,
    /// Return value at capture time
    #[serde(default = "null_value")]
    pub return_value: SnapshotValue,
}

fn null_value() -> SnapshotValue {
    SnapshotValue::Null
}

impl InvocationSnapshot {
    /// Capture the current state of `invocation`
    pub fn capture(invocation: &Invocation) -> Self {
        Self {
            method: MethodIdentity::of(invocation.method()),
            arguments: invocation.arguments().iter().map(SnapshotValue::capture).collect(),
            generic_arguments: invocation.generic_arguments().iter().map(|t| t.full_name()).collect(),
            target: invocation.invocation_target().map(ObjectIdentity::of),
            return_value: SnapshotValue::capture(invocation.return_value()),
        }
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> InvocationResult<String> {
        serde_json::to_string(self).map_err(|e| InvocationError::Snapshot(e.to_string()))
    }

    /// Deserialize from JSON
    pub fn from_json(json: &str) -> InvocationResult<Self> {
        serde_json::from_str(json).map_err(|e| InvocationError::Snapshot(e.to_string()))
    }

    /// Rebuild a live invocation against `proxy`.
    ///
    /// The interceptor chain is that of `proxy`. The captured target is used
    /// when `resolver` knows it; otherwise the proxy's own target applies.
    pub fn restore(&self, proxy: &ObjectRef, resolver: &dyn SnapshotResolver) -> InvocationResult<Invocation> {
        let state = proxy
            .proxy_state()
            .ok_or_else(|| InvocationError::Snapshot(format!("object #{} is not a proxy", proxy.id())))?;
        let slot = state
            .proxy_type()
            .slots()
            .iter()
            .find(|slot| self.method.matches(&slot.method))
            .ok_or_else(|| {
                InvocationError::Snapshot(format!(
                    "proxy type '{}' has no member {}::{}",
                    state.proxy_type().name(),
                    self.method.declaring_type,
                    self.method.name
                ))
            })?;

        let arguments = self
            .arguments
            .iter()
            .map(|a| a.restore(resolver))
            .collect::<InvocationResult<Vec<_>>>()?;
        let generic_arguments = self
            .generic_arguments
            .iter()
            .map(|name| resolve_type(resolver, name))
            .collect::<InvocationResult<Vec<_>>>()?;
        slot.method.check_arity(&generic_arguments, &arguments)?;

        let mut invocation = state.begin_invocation(proxy, &slot.method, &slot.terminal, generic_arguments, arguments);
        if let Some(target) = self.target.as_ref().and_then(|identity| resolver.resolve_object(identity)) {
            if invocation.invocation_target().is_some() {
                invocation.restore_target(target);
            }
        }
        invocation.set_return_value(self.return_value.restore(resolver)?);
        tracing::trace!(member = %slot.method.qualified_name(), "invocation restored from snapshot");
        Ok(invocation)
    }
}
