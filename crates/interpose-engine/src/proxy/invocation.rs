//! Invocation pipeline
//!
//! Every call to an intercepted member builds an [`Invocation`] and walks the
//! proxy's interceptor chain with it. The walk is driven by a cursor that
//! starts at -1 and only moves forward:
//!
//! - `proceed()` advances the cursor
//! - `cursor == interceptors.len()` runs the terminal step (base body,
//!   target member, mixin member, or a `NoTarget` failure)
//! - `cursor > interceptors.len()` is a `PipelineOverrun`
//! - otherwise the interceptor at `cursor` runs
//!
//! Interceptors continue the chain by calling `proceed()` or short-circuit
//! by setting the return value and returning.

use std::fmt;
use std::sync::Arc;

use once_cell::unsync::OnceCell;

use crate::error::{InvocationError, InvocationResult};
use crate::model::{CallContext, ClosedMethod, MethodDef, MethodRef, ObjectRef, TypeRef, Value};

use super::emit::Terminal;
use super::ProxyShape;

/// A step in a proxy's interception chain
pub trait Interceptor: Send + Sync {
    /// Handle a call. Call `invocation.proceed()` to continue the chain,
    /// or set the return value and return to short-circuit it.
    fn intercept(&self, invocation: &mut Invocation) -> InvocationResult<()>;
}

impl<F> Interceptor for F
where
    F: Fn(&mut Invocation) -> InvocationResult<()> + Send + Sync,
{
    fn intercept(&self, invocation: &mut Invocation) -> InvocationResult<()> {
        self(invocation)
    }
}

/// Redirects the target of a call or of the whole proxy.
///
/// Only proxies that hold a swappable target offer this capability: class
/// proxies with target and interface proxies with target interface.
pub trait ChangeTarget {
    /// Use `new_target` for the terminal step of the current call only
    fn change_invocation_target(&mut self, new_target: ObjectRef) -> InvocationResult<()>;

    /// Use `new_target` for every later call on the proxy. The current
    /// call keeps its target.
    fn change_proxy_target(&mut self, new_target: ObjectRef) -> InvocationResult<()>;
}

pub(crate) struct InvocationParts {
    pub interceptors: Arc<[Arc<dyn Interceptor>]>,
    pub proxy: ObjectRef,
    pub proxied: TypeRef,
    pub shape: ProxyShape,
    pub target: Option<ObjectRef>,
    pub expected_target_type: Option<TypeRef>,
    pub method: MethodRef,
    pub terminal: Terminal,
    pub generic_arguments: Vec<TypeRef>,
    pub arguments: Vec<Value>,
}

/// State of one intercepted call
pub struct Invocation {
    interceptors: Arc<[Arc<dyn Interceptor>]>,
    cursor: isize,
    proxy: ObjectRef,
    proxied: TypeRef,
    shape: ProxyShape,
    target: Option<ObjectRef>,
    expected_target_type: Option<TypeRef>,
    method: MethodRef,
    terminal: Terminal,
    generic_arguments: Vec<TypeRef>,
    arguments: Vec<Value>,
    return_value: Value,
    concrete_method: OnceCell<ClosedMethod>,
    concrete_method_on_target: OnceCell<Option<ClosedMethod>>,
}

impl Invocation {
    pub(crate) fn new(parts: InvocationParts) -> Self {
        Self {
            interceptors: parts.interceptors,
            cursor: -1,
            proxy: parts.proxy,
            proxied: parts.proxied,
            shape: parts.shape,
            target: parts.target,
            expected_target_type: parts.expected_target_type,
            method: parts.method,
            terminal: parts.terminal,
            generic_arguments: parts.generic_arguments,
            arguments: parts.arguments,
            return_value: Value::Null,
            concrete_method: OnceCell::new(),
            concrete_method_on_target: OnceCell::new(),
        }
    }

    /// Continue with the next interceptor, or run the terminal step after
    /// the last one
    pub fn proceed(&mut self) -> InvocationResult<()> {
        self.cursor += 1;
        let len = self.interceptors.len() as isize;
        if self.cursor == len {
            tracing::trace!(method = %self.method.qualified_name(), "invocation reached terminal step");
            let value = complete(
                &self.terminal,
                &self.method,
                &self.proxy,
                self.target.as_ref(),
                &self.generic_arguments,
                &self.arguments,
            )?;
            self.return_value = value;
            Ok(())
        } else if self.cursor > len {
            Err(InvocationError::PipelineOverrun {
                method: self.method.qualified_name(),
                interceptors: self.interceptors.len(),
            })
        } else {
            let interceptor = Arc::clone(&self.interceptors[self.cursor as usize]);
            interceptor.intercept(self)
        }
    }

    /// The proxy the call was made on
    pub fn proxy(&self) -> &ObjectRef {
        &self.proxy
    }

    /// The proxied class or interface
    pub fn proxied_type(&self) -> &TypeRef {
        &self.proxied
    }

    /// Shape of the proxy
    pub fn shape(&self) -> ProxyShape {
        self.shape
    }

    /// The object the terminal step will run against: the proxy itself for
    /// class proxies, the target or mixin instance otherwise
    pub fn invocation_target(&self) -> Option<&ObjectRef> {
        self.target.as_ref()
    }

    /// Runtime type of the invocation target
    pub fn target_type(&self) -> Option<&TypeRef> {
        self.target.as_ref().map(|t| t.type_ref())
    }

    /// The member that was called, as declared on the proxied type. For
    /// generic members this is the open definition.
    pub fn method(&self) -> &MethodRef {
        &self.method
    }

    /// The member the terminal step runs on the invocation target
    pub fn method_on_target(&self) -> Option<MethodRef> {
        match &self.terminal {
            Terminal::Base(base) => Some(Arc::clone(base)),
            Terminal::Target(method) | Terminal::Mixin { method, .. } => self.target.as_ref().map(|target| {
                target
                    .type_ref()
                    .find_implementation(method)
                    .unwrap_or_else(|| Arc::clone(method))
            }),
            Terminal::NoTarget => None,
        }
    }

    /// The called member closed over the call's generic arguments.
    ///
    /// Bound on first use and reused afterwards.
    pub fn concrete_method(&self) -> InvocationResult<&ClosedMethod> {
        self.concrete_method
            .get_or_try_init(|| ClosedMethod::bind(&self.method, &self.generic_arguments))
    }

    /// [`method_on_target`](Self::method_on_target) closed over the call's
    /// generic arguments
    pub fn concrete_method_on_target(&self) -> InvocationResult<Option<&ClosedMethod>> {
        let closed = self.concrete_method_on_target.get_or_try_init(|| {
            self.method_on_target()
                .map(|m| ClosedMethod::bind(&m, &self.generic_arguments))
                .transpose()
        })?;
        Ok(closed.as_ref())
    }

    /// Generic arguments of the call (empty for non-generic members)
    pub fn generic_arguments(&self) -> &[TypeRef] {
        &self.generic_arguments
    }

    /// All call arguments
    pub fn arguments(&self) -> &[Value] {
        &self.arguments
    }

    /// Argument at `index`
    pub fn argument(&self, index: usize) -> InvocationResult<&Value> {
        self.arguments
            .get(index)
            .ok_or(InvocationError::ArgumentIndexOutOfRange {
                index,
                count: self.arguments.len(),
            })
    }

    /// Replace the argument at `index`. Later interceptors and the terminal
    /// step see the new value.
    pub fn set_argument(&mut self, index: usize, value: impl Into<Value>) -> InvocationResult<()> {
        let count = self.arguments.len();
        let slot = self
            .arguments
            .get_mut(index)
            .ok_or(InvocationError::ArgumentIndexOutOfRange { index, count })?;
        *slot = value.into();
        Ok(())
    }

    /// Current return value
    pub fn return_value(&self) -> &Value {
        &self.return_value
    }

    /// Set the return value
    pub fn set_return_value(&mut self, value: impl Into<Value>) {
        self.return_value = value.into();
    }

    /// Number of interceptors in this call's chain
    pub fn interceptor_count(&self) -> usize {
        self.interceptors.len()
    }

    /// Target-change capability, for proxies whose target can be swapped
    pub fn change_target(&mut self) -> Option<&mut dyn ChangeTarget> {
        if self.supports_target_change() {
            Some(self)
        } else {
            None
        }
    }

    pub(crate) fn into_return_value(self) -> Value {
        self.return_value
    }

    pub(crate) fn restore_target(&mut self, target: ObjectRef) {
        self.target = Some(target);
        self.concrete_method_on_target = OnceCell::new();
    }

    fn supports_target_change(&self) -> bool {
        self.shape.allows_target_change() && matches!(self.terminal, Terminal::Target(_))
    }

    fn check_new_target(&self, new_target: &ObjectRef) -> InvocationResult<()> {
        if !self.supports_target_change() {
            return Err(InvocationError::TargetChangeUnsupported);
        }
        if new_target.ptr_eq(&self.proxy) {
            return Err(InvocationError::ProxyAsOwnTarget);
        }
        if let Some(expected) = &self.expected_target_type {
            if !new_target.type_ref().is_assignable_to(expected) {
                return Err(InvocationError::TargetTypeMismatch {
                    expected: expected.full_name(),
                    actual: new_target.type_ref().full_name(),
                });
            }
        }
        Ok(())
    }
}

impl ChangeTarget for Invocation {
    fn change_invocation_target(&mut self, new_target: ObjectRef) -> InvocationResult<()> {
        self.check_new_target(&new_target)?;
        self.target = Some(new_target);
        self.concrete_method_on_target = OnceCell::new();
        Ok(())
    }

    fn change_proxy_target(&mut self, new_target: ObjectRef) -> InvocationResult<()> {
        self.check_new_target(&new_target)?;
        if let Some(state) = self.proxy.proxy_state() {
            tracing::debug!(
                proxy = self.proxy.id(),
                target = new_target.id(),
                "proxy target changed"
            );
            state.set_target(new_target);
        }
        Ok(())
    }
}

impl fmt::Debug for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invocation")
            .field("method", &self.method.qualified_name())
            .field("shape", &self.shape)
            .field("cursor", &self.cursor)
            .field("interceptors", &self.interceptors.len())
            .field("arguments", &self.arguments)
            .field("return_value", &self.return_value)
            .finish()
    }
}

/// Run the terminal step for `method`
pub(crate) fn complete(
    terminal: &Terminal,
    method: &MethodDef,
    proxy: &ObjectRef,
    target: Option<&ObjectRef>,
    generic_arguments: &[TypeRef],
    arguments: &[Value],
) -> InvocationResult<Value> {
    match terminal {
        Terminal::Base(base) => base.call(CallContext {
            this: proxy,
            generic_arguments,
            arguments,
        }),
        Terminal::Target(on_target) | Terminal::Mixin { method: on_target, .. } => {
            let target = target.ok_or_else(|| InvocationError::NoTarget {
                method: method.qualified_name(),
            })?;
            target.invoke_method(on_target, generic_arguments, arguments)
        }
        Terminal::NoTarget => Err(InvocationError::NoTarget {
            method: method.qualified_name(),
        }),
    }
}
