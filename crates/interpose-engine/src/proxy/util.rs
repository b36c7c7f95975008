//! Proxy detection and unwrapping

use std::sync::Arc;

use crate::model::{ObjectRef, TypeDef, TypeRef};

use super::invocation::Interceptor;
use super::synthesized::SynthesizedType;
use super::ProxyShape;

/// Contents of a proxy
#[derive(Debug, Clone)]
pub struct UnwrappedProxy {
    /// Current target, if the proxy holds one
    pub target: Option<ObjectRef>,
    /// The synthesized type
    pub proxy_type: Arc<SynthesizedType>,
    /// The proxy's object id
    pub proxy_id: u64,
}

/// Return the proxy contents if `object` is a proxy
pub fn try_unwrap_proxy(object: &ObjectRef) -> Option<UnwrappedProxy> {
    let state = object.proxy_state()?;
    Some(UnwrappedProxy {
        target: state.target(),
        proxy_type: Arc::clone(state.proxy_type()),
        proxy_id: object.id(),
    })
}

/// Check if an object is a proxy
pub fn is_proxy(object: &ObjectRef) -> bool {
    object.is_proxy()
}

/// Check if a type was synthesized by the proxy engine
pub fn is_proxy_type(ty: &TypeDef) -> bool {
    ty.is_synthesized()
}

/// The object calls on `object` end up on.
///
/// Plain objects and class proxies are their own instance; proxies with a
/// target yield the target; proxies without a target yield `None`.
pub fn unproxied_instance(object: &ObjectRef) -> Option<ObjectRef> {
    match object.proxy_state() {
        None => Some(object.clone()),
        Some(state) if state.proxy_type().shape() == ProxyShape::ClassProxy => Some(object.clone()),
        Some(state) => state.target(),
    }
}

/// Unwrap nested proxies to get the innermost instance
pub fn unproxied_instance_deep(object: &ObjectRef) -> Option<ObjectRef> {
    let mut current = object.clone();
    loop {
        let next = unproxied_instance(&current)?;
        if next.ptr_eq(&current) {
            return Some(current);
        }
        current = next;
    }
}

/// The type calls on `object` end up on: the target's type, or the proxied
/// class for class proxies. Interface proxies without a target have nothing
/// behind them and report their own synthesized type.
pub fn unproxied_type(object: &ObjectRef) -> TypeRef {
    let Some(state) = object.proxy_state() else {
        return Arc::clone(object.type_ref());
    };
    match state.target() {
        Some(target) => Arc::clone(target.type_ref()),
        None if state.proxy_type().shape() == ProxyShape::ClassProxy => Arc::clone(state.proxy_type().proxied_type()),
        None => Arc::clone(object.type_ref()),
    }
}

/// Interceptors attached to a proxy
pub fn interceptors_of(object: &ObjectRef) -> Option<Arc<[Arc<dyn Interceptor>]>> {
    object
        .proxy_state()
        .map(|state| Arc::clone(state.interceptors()))
}
