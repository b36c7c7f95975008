//! Method definitions, signatures and bodies
//!
//! A [`MethodDef`] describes one member of a [`TypeDef`](super::TypeDef):
//! its signature, modifiers and (for concrete class members) the closure
//! that implements it. Definitions are shared as [`MethodRef`]s and are
//! never mutated once the declaring type is built.

use std::fmt;
use std::sync::Arc;

use crate::error::{InvocationError, InvocationResult};

use super::object::ObjectRef;
use super::types::{builtin, TypeDefId, TypeKind, TypeRef, Visibility};
use super::value::Value;

/// Shared handle to a method definition
pub type MethodRef = Arc<MethodDef>;

/// Receiver and arguments handed to a method body
#[derive(Clone, Copy)]
pub struct CallContext<'a> {
    /// The object the member was called on (the proxy itself for class proxies)
    pub this: &'a ObjectRef,
    /// Bound generic arguments (empty for non-generic members)
    pub generic_arguments: &'a [TypeRef],
    /// Call arguments
    pub arguments: &'a [Value],
}

impl<'a> CallContext<'a> {
    /// Get an argument by position, `Value::Null` if absent
    pub fn arg(&self, index: usize) -> Value {
        self.arguments.get(index).cloned().unwrap_or_default()
    }
}

/// Implementation of a concrete member
pub type MethodBody = Arc<dyn Fn(CallContext<'_>) -> InvocationResult<Value> + Send + Sync>;

/// Modifier flags for a member
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodModifiers {
    /// Member can be overridden by a subclass
    pub is_virtual: bool,
    /// Member has no implementation
    pub is_abstract: bool,
    /// Member is not an instance member
    pub is_static: bool,
    /// Override that cannot be overridden further
    pub is_sealed: bool,
    /// Member visibility
    pub visibility: Visibility,
}

impl Default for MethodModifiers {
    fn default() -> Self {
        Self {
            is_virtual: true,
            is_abstract: false,
            is_static: false,
            is_sealed: false,
            visibility: Visibility::Public,
        }
    }
}

/// A single method parameter
#[derive(Debug, Clone)]
pub struct ParameterDef {
    /// Parameter name
    pub name: String,
    /// Declared type
    pub ty: TypeRef,
}

/// Identity of a member for override and conflict resolution.
///
/// Return types are deliberately excluded: two members with equal
/// signatures and different return types conflict.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodSignature {
    /// Member name
    pub name: String,
    /// Number of generic parameters
    pub generic_arity: usize,
    /// Parameter type identities, in order
    pub parameters: Vec<TypeDefId>,
}

/// Runtime description of a method
pub struct MethodDef {
    name: String,
    declaring_type: String,
    declaring_type_id: TypeDefId,
    parameters: Vec<ParameterDef>,
    return_type: TypeRef,
    generic_parameters: Vec<String>,
    modifiers: MethodModifiers,
    body: Option<MethodBody>,
}

impl MethodDef {
    /// Start describing a method
    pub fn build(name: impl Into<String>) -> MethodBuilder {
        MethodBuilder::new(name)
    }

    /// Member name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Full name of the declaring type
    pub fn declaring_type(&self) -> &str {
        &self.declaring_type
    }

    /// Identity of the declaring type
    pub fn declaring_type_id(&self) -> TypeDefId {
        self.declaring_type_id
    }

    /// Parameters in order
    pub fn parameters(&self) -> &[ParameterDef] {
        &self.parameters
    }

    /// Number of parameters
    pub fn parameter_count(&self) -> usize {
        self.parameters.len()
    }

    /// Declared return type
    pub fn return_type(&self) -> &TypeRef {
        &self.return_type
    }

    /// Generic parameter names (empty for non-generic members)
    pub fn generic_parameters(&self) -> &[String] {
        &self.generic_parameters
    }

    /// Whether this is an open generic method definition
    pub fn is_generic(&self) -> bool {
        !self.generic_parameters.is_empty()
    }

    /// Modifier flags
    pub fn modifiers(&self) -> MethodModifiers {
        self.modifiers
    }

    /// Whether the member is static
    pub fn is_static(&self) -> bool {
        self.modifiers.is_static
    }

    /// Whether the member is abstract
    pub fn is_abstract(&self) -> bool {
        self.modifiers.is_abstract
    }

    /// Whether a subclass can replace this member
    pub fn is_overridable(&self) -> bool {
        self.modifiers.is_virtual && !self.modifiers.is_sealed && !self.modifiers.is_static
    }

    /// Whether the member has an implementation
    pub fn has_body(&self) -> bool {
        self.body.is_some()
    }

    /// Signature used for override matching and conflict detection
    pub fn signature(&self) -> MethodSignature {
        MethodSignature {
            name: self.name.clone(),
            generic_arity: self.generic_parameters.len(),
            parameters: self.parameters.iter().map(|p| p.ty.id()).collect(),
        }
    }

    /// Whether `other` has the same signature
    pub fn same_signature(&self, other: &MethodDef) -> bool {
        self.name == other.name
            && self.generic_parameters.len() == other.generic_parameters.len()
            && self.parameters.len() == other.parameters.len()
            && self
                .parameters
                .iter()
                .zip(&other.parameters)
                .all(|(a, b)| a.ty.id() == b.ty.id())
    }

    /// `Name<T>(int, string) -> bool`
    pub fn display_signature(&self) -> String {
        let mut out = self.name.clone();
        if !self.generic_parameters.is_empty() {
            out.push('<');
            out.push_str(&self.generic_parameters.join(", "));
            out.push('>');
        }
        let params: Vec<String> = self.parameters.iter().map(|p| p.ty.full_name()).collect();
        out.push('(');
        out.push_str(&params.join(", "));
        out.push(')');
        out.push_str(" -> ");
        out.push_str(&self.return_type.full_name());
        out
    }

    /// `Declaring.Type::Name`
    pub fn qualified_name(&self) -> String {
        format!("{}::{}", self.declaring_type, self.name)
    }

    /// Validate argument and generic arity for a call
    pub fn check_arity(&self, generic_arguments: &[TypeRef], arguments: &[Value]) -> InvocationResult<()> {
        if arguments.len() != self.parameters.len() {
            return Err(InvocationError::ArgumentCountMismatch {
                method: self.qualified_name(),
                expected: self.parameters.len(),
                actual: arguments.len(),
            });
        }
        if generic_arguments.len() != self.generic_parameters.len() {
            return Err(InvocationError::GenericArityMismatch {
                method: self.qualified_name(),
                expected: self.generic_parameters.len(),
                actual: generic_arguments.len(),
            });
        }
        Ok(())
    }

    /// Run the body of this member against `ctx.this`
    pub fn call(&self, ctx: CallContext<'_>) -> InvocationResult<Value> {
        self.check_arity(ctx.generic_arguments, ctx.arguments)?;
        match &self.body {
            Some(body) => body(ctx),
            None => Err(InvocationError::AbstractMember {
                method: self.qualified_name(),
            }),
        }
    }
}

impl fmt::Debug for MethodDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodDef")
            .field("declaring_type", &self.declaring_type)
            .field("signature", &self.display_signature())
            .field("modifiers", &self.modifiers)
            .field("has_body", &self.body.is_some())
            .finish()
    }
}

/// A generic method definition bound to concrete type arguments
#[derive(Debug, Clone)]
pub struct ClosedMethod {
    /// The open definition
    pub definition: MethodRef,
    /// Bound type arguments, one per generic parameter
    pub type_arguments: Vec<TypeRef>,
}

impl ClosedMethod {
    /// Bind `type_arguments` to `method`'s generic parameters
    pub fn bind(method: &MethodRef, type_arguments: &[TypeRef]) -> InvocationResult<Self> {
        if type_arguments.len() != method.generic_parameters.len() {
            return Err(InvocationError::GenericArityMismatch {
                method: method.qualified_name(),
                expected: method.generic_parameters.len(),
                actual: type_arguments.len(),
            });
        }
        Ok(Self {
            definition: Arc::clone(method),
            type_arguments: type_arguments.to_vec(),
        })
    }

    /// Type argument bound to the named generic parameter
    pub fn type_argument(&self, parameter: &str) -> Option<&TypeRef> {
        self.definition
            .generic_parameters
            .iter()
            .position(|p| p == parameter)
            .and_then(|i| self.type_arguments.get(i))
    }

    /// `Name<int, string>`
    pub fn display_name(&self) -> String {
        if self.type_arguments.is_empty() {
            return self.definition.name.clone();
        }
        let args: Vec<String> = self.type_arguments.iter().map(|t| t.full_name()).collect();
        format!("{}<{}>", self.definition.name, args.join(", "))
    }
}

/// Builder for [`MethodDef`]; finished by the declaring type's builder
pub struct MethodBuilder {
    name: String,
    parameters: Vec<ParameterDef>,
    return_type: Option<TypeRef>,
    generic_parameters: Vec<String>,
    modifiers: MethodModifiers,
    body: Option<MethodBody>,
}

impl MethodBuilder {
    /// Create a new method description
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: Vec::new(),
            return_type: None,
            generic_parameters: Vec::new(),
            modifiers: MethodModifiers::default(),
            body: None,
        }
    }

    /// Add a parameter
    pub fn param(mut self, name: impl Into<String>, ty: &TypeRef) -> Self {
        self.parameters.push(ParameterDef {
            name: name.into(),
            ty: Arc::clone(ty),
        });
        self
    }

    /// Set the return type (defaults to `void`)
    pub fn returns(mut self, ty: &TypeRef) -> Self {
        self.return_type = Some(Arc::clone(ty));
        self
    }

    /// Declare generic parameters
    pub fn generic<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.generic_parameters = names.into_iter().map(Into::into).collect();
        self
    }

    /// Mark as non-overridable
    pub fn non_virtual(mut self) -> Self {
        self.modifiers.is_virtual = false;
        self
    }

    /// Mark as a sealed override
    pub fn sealed(mut self) -> Self {
        self.modifiers.is_sealed = true;
        self
    }

    /// Mark as abstract (no body)
    pub fn abstract_(mut self) -> Self {
        self.modifiers.is_abstract = true;
        self.body = None;
        self
    }

    /// Mark as static
    pub fn static_(mut self) -> Self {
        self.modifiers.is_static = true;
        self.modifiers.is_virtual = false;
        self
    }

    /// Set member visibility
    pub fn visibility(mut self, visibility: Visibility) -> Self {
        self.modifiers.visibility = visibility;
        self
    }

    /// Set the implementation
    pub fn body<F>(mut self, body: F) -> Self
    where
        F: Fn(CallContext<'_>) -> InvocationResult<Value> + Send + Sync + 'static,
    {
        self.body = Some(Arc::new(body));
        self.modifiers.is_abstract = false;
        self
    }

    pub(crate) fn finish(self, declaring_type: &str, declaring_type_id: TypeDefId, kind: TypeKind) -> MethodDef {
        let mut modifiers = self.modifiers;
        let mut body = self.body;
        if kind == TypeKind::Interface {
            modifiers.is_virtual = true;
            modifiers.is_abstract = true;
            modifiers.is_sealed = false;
            body = None;
        } else if body.is_none() && !modifiers.is_static {
            modifiers.is_abstract = true;
        }
        MethodDef {
            name: self.name,
            declaring_type: declaring_type.to_string(),
            declaring_type_id,
            parameters: self.parameters,
            return_type: self.return_type.unwrap_or_else(builtin::void),
            generic_parameters: self.generic_parameters,
            modifiers,
            body,
        }
    }
}
