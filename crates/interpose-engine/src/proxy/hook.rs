//! Caller-supplied generation and selection policy

use std::fmt;
use std::sync::Arc;

use crate::error::GenerationResult;
use crate::model::{MethodDef, TypeDef};

use super::invocation::Interceptor;

/// Policy consulted while a proxy type is generated.
///
/// The hook is called during generation only, never per call. Hooks take
/// part in cache equality: two hooks are interchangeable when they are of
/// the same type and report the same [`cache_key`](Self::cache_key).
pub trait GenerationHook: Send + Sync + fmt::Debug {
    /// Whether calls to `method` of `ty` should go through the interceptor chain
    fn should_intercept_method(&self, ty: &TypeDef, method: &MethodDef) -> bool;

    /// Called for members that cannot be overridden. Returning an error
    /// aborts generation.
    fn non_proxyable_member_notification(&self, ty: &TypeDef, method: &MethodDef) -> GenerationResult<()> {
        let _ = (ty, method);
        Ok(())
    }

    /// Called once after every member has been inspected
    fn methods_inspected(&self) {}

    /// Key under which synthesized types may be shared between hook
    /// instances. `None` makes the hook equal only to itself.
    fn cache_key(&self) -> Option<String> {
        None
    }

    /// Name distinguishing hook implementations in cache keys
    fn hook_type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Intercepts every member and accepts non-proxyable ones
#[derive(Debug, Clone, Copy, Default)]
pub struct AllMethodsHook;

impl GenerationHook for AllMethodsHook {
    fn should_intercept_method(&self, _ty: &TypeDef, _method: &MethodDef) -> bool {
        true
    }

    fn cache_key(&self) -> Option<String> {
        Some("all-methods".to_string())
    }
}

/// Chooses, per call, which of a proxy's interceptors run
pub trait InterceptorSelector: Send + Sync {
    /// Interceptors for a call to `method` on a proxy of `ty`
    fn select_interceptors(
        &self,
        ty: &TypeDef,
        method: &MethodDef,
        interceptors: &[Arc<dyn Interceptor>],
    ) -> Vec<Arc<dyn Interceptor>>;
}

impl<F> InterceptorSelector for F
where
    F: Fn(&TypeDef, &MethodDef, &[Arc<dyn Interceptor>]) -> Vec<Arc<dyn Interceptor>> + Send + Sync,
{
    fn select_interceptors(
        &self,
        ty: &TypeDef,
        method: &MethodDef,
        interceptors: &[Arc<dyn Interceptor>],
    ) -> Vec<Arc<dyn Interceptor>> {
        self(ty, method, interceptors)
    }
}
