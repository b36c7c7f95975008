//! Runtime type definitions
//!
//! [`TypeDef`] is the engine's view of a class or interface: name, hosting
//! module, visibility, generic shape, inheritance and member table. Types
//! compare and hash by their unique [`TypeDefId`].

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::{GenerationError, GenerationResult};

use super::method::{MethodBuilder, MethodDef, MethodRef, MethodSignature};

/// Shared handle to a type definition
pub type TypeRef = Arc<TypeDef>;

static NEXT_TYPE_ID: AtomicU64 = AtomicU64::new(1);

/// Unique identity of a type definition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeDefId(u64);

impl TypeDefId {
    fn next() -> Self {
        Self(NEXT_TYPE_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Kind of a type definition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    /// Concrete or abstract class
    Class,
    /// Capability: a named set of member signatures
    Interface,
    /// Built-in value type
    Primitive,
}

/// Visibility of a type outside its hosting module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Visibility {
    /// Visible everywhere
    Public,
    /// Visible inside the hosting module and to modules it grants access to
    Internal,
    /// Visible only to its enclosing declaration
    Private,
}

/// The module hosting a set of types
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleInfo {
    /// Module name, e.g. `billing` or `plugins/audit`
    pub name: String,
    /// Whether the module lets the proxy engine see its internal types
    pub grants_internals: bool,
}

static CORE_MODULE: Lazy<Arc<ModuleInfo>> = Lazy::new(|| ModuleInfo::new("core"));
static APP_MODULE: Lazy<Arc<ModuleInfo>> = Lazy::new(|| ModuleInfo::new("app"));

impl ModuleInfo {
    /// Create a module without an internals grant
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            grants_internals: false,
        })
    }

    /// Create a module that grants the proxy engine access to its internals
    pub fn granting_internals(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            grants_internals: true,
        })
    }

    /// Module hosting the builtin types
    pub fn core() -> Arc<Self> {
        Arc::clone(&CORE_MODULE)
    }

    /// Default module for types built without an explicit module
    pub fn app() -> Arc<Self> {
        Arc::clone(&APP_MODULE)
    }
}

/// Runtime description of a class, interface or primitive
pub struct TypeDef {
    id: TypeDefId,
    name: String,
    namespace: String,
    kind: TypeKind,
    visibility: Visibility,
    module: Arc<ModuleInfo>,
    generic_parameters: Vec<String>,
    generic_arguments: Vec<TypeRef>,
    generic_definition: Option<TypeRef>,
    base: Option<TypeRef>,
    interfaces: Vec<TypeRef>,
    methods: Vec<MethodRef>,
    is_sealed: bool,
    is_abstract: bool,
    is_synthesized: bool,
    /// Closed constructions of this generic definition, keyed by argument ids
    constructions: Mutex<FxHashMap<Vec<TypeDefId>, TypeRef>>,
}

impl TypeDef {
    /// Unique identity
    pub fn id(&self) -> TypeDefId {
        self.id
    }

    /// Simple name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Namespace (may be empty)
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// `Namespace.Name<Args>`
    pub fn full_name(&self) -> String {
        let mut out = if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.namespace, self.name)
        };
        if !self.generic_arguments.is_empty() {
            let args: Vec<String> = self.generic_arguments.iter().map(|t| t.full_name()).collect();
            out.push('<');
            out.push_str(&args.join(", "));
            out.push('>');
        } else if !self.generic_parameters.is_empty() {
            out.push('<');
            out.push_str(&self.generic_parameters.join(", "));
            out.push('>');
        }
        out
    }

    /// Kind of type
    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    /// Whether this is an interface
    pub fn is_interface(&self) -> bool {
        self.kind == TypeKind::Interface
    }

    /// Whether this is a class
    pub fn is_class(&self) -> bool {
        self.kind == TypeKind::Class
    }

    /// Visibility outside the hosting module
    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    /// Hosting module
    pub fn module(&self) -> &Arc<ModuleInfo> {
        &self.module
    }

    /// Declared generic parameter names
    pub fn generic_parameters(&self) -> &[String] {
        &self.generic_parameters
    }

    /// Bound generic arguments (empty unless this is a closed construction)
    pub fn generic_arguments(&self) -> &[TypeRef] {
        &self.generic_arguments
    }

    /// Generic definition this type was constructed from
    pub fn generic_definition(&self) -> Option<&TypeRef> {
        self.generic_definition.as_ref()
    }

    /// Whether this is an unbound generic type definition
    pub fn is_open_generic(&self) -> bool {
        !self.generic_parameters.is_empty() && self.generic_arguments.is_empty()
    }

    /// Base class
    pub fn base(&self) -> Option<&TypeRef> {
        self.base.as_ref()
    }

    /// Directly declared interfaces
    pub fn interfaces(&self) -> &[TypeRef] {
        &self.interfaces
    }

    /// Directly declared members
    pub fn methods(&self) -> &[MethodRef] {
        &self.methods
    }

    /// Whether the class cannot be subclassed
    pub fn is_sealed(&self) -> bool {
        self.is_sealed
    }

    /// Whether the class cannot be instantiated on its own
    pub fn is_abstract(&self) -> bool {
        self.is_abstract
    }

    /// Whether the type was produced by the proxy engine
    pub fn is_synthesized(&self) -> bool {
        self.is_synthesized
    }

    /// Every interface implemented by this type, its bases and inherited
    /// interfaces, in declaration order without duplicates
    pub fn all_interfaces(&self) -> Vec<TypeRef> {
        let mut seen = FxHashSet::default();
        let mut out = Vec::new();
        let mut current = Some(self);
        while let Some(ty) = current {
            for iface in &ty.interfaces {
                collect_interface(iface, &mut seen, &mut out);
            }
            current = ty.base.as_deref();
        }
        out
    }

    /// Whether a value of this type can be used where `other` is expected
    pub fn is_assignable_to(&self, other: &TypeDef) -> bool {
        if self.id == other.id || other.id == builtin::any().id {
            return true;
        }
        let mut current = self.base.as_deref();
        while let Some(ty) = current {
            if ty.id == other.id {
                return true;
            }
            current = ty.base.as_deref();
        }
        other.is_interface() && self.all_interfaces().iter().any(|i| i.id == other.id)
    }

    /// Instance members reachable on this type, most derived declaration first.
    ///
    /// For interfaces this includes members of inherited interfaces.
    pub fn instance_methods(&self) -> Vec<MethodRef> {
        let mut seen: FxHashSet<MethodSignature> = FxHashSet::default();
        let mut out = Vec::new();
        let mut push = |m: &MethodRef, out: &mut Vec<MethodRef>| {
            if !m.is_static() && seen.insert(m.signature()) {
                out.push(Arc::clone(m));
            }
        };
        if self.is_interface() {
            for m in &self.methods {
                push(m, &mut out);
            }
            for iface in self.all_interfaces() {
                for m in &iface.methods {
                    push(m, &mut out);
                }
            }
            return out;
        }
        let mut current = Some(self);
        while let Some(ty) = current {
            for m in &ty.methods {
                push(m, &mut out);
            }
            current = ty.base.as_deref();
        }
        out
    }

    /// Find an instance member by name and argument count (most derived wins)
    pub fn find_method(&self, name: &str, arity: usize) -> Option<MethodRef> {
        self.instance_methods()
            .into_iter()
            .find(|m| m.name() == name && m.parameter_count() == arity)
    }

    /// Find the member of this type that implements or overrides `method`
    pub fn find_implementation(&self, method: &MethodDef) -> Option<MethodRef> {
        self.instance_methods()
            .into_iter()
            .find(|m| m.same_signature(method))
    }

    /// Construct a closed generic type from this definition.
    ///
    /// Constructions are interned: the same arguments always yield the
    /// same [`TypeRef`].
    pub fn make_generic(definition: &TypeRef, arguments: &[TypeRef]) -> GenerationResult<TypeRef> {
        if !definition.is_open_generic() || arguments.len() != definition.generic_parameters.len() {
            return Err(GenerationError::GenericArityMismatch {
                type_name: definition.full_name(),
                expected: if definition.is_open_generic() {
                    definition.generic_parameters.len()
                } else {
                    0
                },
                actual: arguments.len(),
            });
        }
        let key: Vec<TypeDefId> = arguments.iter().map(|a| a.id).collect();
        let mut constructions = definition.constructions.lock();
        if let Some(existing) = constructions.get(&key) {
            return Ok(Arc::clone(existing));
        }
        let constructed = Arc::new(TypeDef {
            id: TypeDefId::next(),
            name: definition.name.clone(),
            namespace: definition.namespace.clone(),
            kind: definition.kind,
            visibility: definition.visibility,
            module: Arc::clone(&definition.module),
            generic_parameters: definition.generic_parameters.clone(),
            generic_arguments: arguments.to_vec(),
            generic_definition: Some(Arc::clone(definition)),
            base: definition.base.clone(),
            interfaces: definition.interfaces.clone(),
            methods: definition.methods.clone(),
            is_sealed: definition.is_sealed,
            is_abstract: definition.is_abstract,
            is_synthesized: definition.is_synthesized,
            constructions: Mutex::new(FxHashMap::default()),
        });
        constructions.insert(key, Arc::clone(&constructed));
        Ok(constructed)
    }
}

fn collect_interface(iface: &TypeRef, seen: &mut FxHashSet<TypeDefId>, out: &mut Vec<TypeRef>) {
    if !seen.insert(iface.id) {
        return;
    }
    out.push(Arc::clone(iface));
    for parent in &iface.interfaces {
        collect_interface(parent, seen, out);
    }
}

impl PartialEq for TypeDef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeDef {}

impl Hash for TypeDef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDef")
            .field("id", &self.id.0)
            .field("name", &self.full_name())
            .field("kind", &self.kind)
            .field("visibility", &self.visibility)
            .field("module", &self.module.name)
            .field("methods", &self.methods.len())
            .finish()
    }
}

impl fmt::Display for TypeDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_name())
    }
}

/// Builder for [`TypeDef`]
pub struct TypeBuilder {
    id: TypeDefId,
    name: String,
    namespace: String,
    kind: TypeKind,
    visibility: Visibility,
    module: Arc<ModuleInfo>,
    generic_parameters: Vec<String>,
    base: Option<TypeRef>,
    interfaces: Vec<TypeRef>,
    methods: Vec<MethodBuilder>,
    is_sealed: bool,
    is_abstract: bool,
    is_synthesized: bool,
}

impl TypeBuilder {
    fn new(name: impl Into<String>, kind: TypeKind) -> Self {
        Self {
            id: TypeDefId::next(),
            name: name.into(),
            namespace: String::new(),
            kind,
            visibility: Visibility::Public,
            module: ModuleInfo::app(),
            generic_parameters: Vec::new(),
            base: None,
            interfaces: Vec::new(),
            methods: Vec::new(),
            is_sealed: false,
            is_abstract: false,
            is_synthesized: false,
        }
    }

    /// Describe a class
    pub fn class(name: impl Into<String>) -> Self {
        Self::new(name, TypeKind::Class)
    }

    /// Describe an interface
    pub fn interface(name: impl Into<String>) -> Self {
        Self::new(name, TypeKind::Interface)
    }

    pub(crate) fn primitive(name: &str) -> Self {
        let mut builder = Self::new(name, TypeKind::Primitive);
        builder.module = ModuleInfo::core();
        builder.is_sealed = true;
        builder
    }

    pub(crate) fn synthesized(mut self) -> Self {
        self.is_synthesized = true;
        self
    }

    /// Set the namespace
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Set the hosting module
    pub fn module(mut self, module: &Arc<ModuleInfo>) -> Self {
        self.module = Arc::clone(module);
        self
    }

    /// Set visibility
    pub fn visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    /// Declare generic parameters (makes this an open generic definition)
    pub fn generic<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.generic_parameters = names.into_iter().map(Into::into).collect();
        self
    }

    /// Set the base class (classes) or add a parent interface (interfaces)
    pub fn extends(mut self, base: &TypeRef) -> Self {
        if self.kind == TypeKind::Interface {
            self.interfaces.push(Arc::clone(base));
        } else {
            self.base = Some(Arc::clone(base));
        }
        self
    }

    /// Add an implemented interface
    pub fn implements(mut self, interface: &TypeRef) -> Self {
        self.interfaces.push(Arc::clone(interface));
        self
    }

    /// Add a member
    pub fn method(mut self, method: MethodBuilder) -> Self {
        self.methods.push(method);
        self
    }

    /// Mark the class as sealed
    pub fn sealed(mut self) -> Self {
        self.is_sealed = true;
        self
    }

    /// Mark the class as abstract
    pub fn abstract_(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    /// Finish the definition
    pub fn build(self) -> TypeRef {
        let full_name = if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.namespace, self.name)
        };
        let id = self.id;
        let kind = self.kind;
        let methods = self
            .methods
            .into_iter()
            .map(|m| Arc::new(m.finish(&full_name, id, kind)))
            .collect();
        Arc::new(TypeDef {
            id,
            name: self.name,
            namespace: self.namespace,
            kind,
            visibility: self.visibility,
            module: self.module,
            generic_parameters: self.generic_parameters,
            generic_arguments: Vec::new(),
            generic_definition: None,
            base: self.base,
            interfaces: self.interfaces,
            methods,
            is_sealed: self.is_sealed,
            is_abstract: self.is_abstract,
            is_synthesized: self.is_synthesized,
            constructions: Mutex::new(FxHashMap::default()),
        })
    }
}

/// Builtin primitive types
pub mod builtin {
    use super::*;

    static VOID: Lazy<TypeRef> = Lazy::new(|| TypeBuilder::primitive("void").build());
    static ANY: Lazy<TypeRef> = Lazy::new(|| TypeBuilder::primitive("any").build());
    static BOOL: Lazy<TypeRef> = Lazy::new(|| TypeBuilder::primitive("bool").build());
    static INT: Lazy<TypeRef> = Lazy::new(|| TypeBuilder::primitive("int").build());
    static FLOAT: Lazy<TypeRef> = Lazy::new(|| TypeBuilder::primitive("float").build());
    static STRING: Lazy<TypeRef> = Lazy::new(|| TypeBuilder::primitive("string").build());
    static TYPE: Lazy<TypeRef> = Lazy::new(|| TypeBuilder::primitive("type").build());
    static LIST: Lazy<TypeRef> = Lazy::new(|| TypeBuilder::primitive("list").build());

    /// No value
    pub fn void() -> TypeRef {
        Arc::clone(&VOID)
    }

    /// Top type; every type is assignable to it
    pub fn any() -> TypeRef {
        Arc::clone(&ANY)
    }

    /// Boolean
    pub fn bool() -> TypeRef {
        Arc::clone(&BOOL)
    }

    /// 64-bit integer
    pub fn int() -> TypeRef {
        Arc::clone(&INT)
    }

    /// 64-bit float
    pub fn float() -> TypeRef {
        Arc::clone(&FLOAT)
    }

    /// String
    pub fn string() -> TypeRef {
        Arc::clone(&STRING)
    }

    /// Type descriptor
    pub fn type_() -> TypeRef {
        Arc::clone(&TYPE)
    }

    /// Heterogeneous list
    pub fn list() -> TypeRef {
        Arc::clone(&LIST)
    }

    /// Look up a builtin by name
    pub fn by_name(name: &str) -> Option<TypeRef> {
        match name {
            "void" => Some(void()),
            "any" => Some(any()),
            "bool" => Some(bool()),
            "int" => Some(int()),
            "float" => Some(float()),
            "string" => Some(string()),
            "type" => Some(type_()),
            "list" => Some(list()),
            _ => None,
        }
    }
}
