//! Interface proxy generation

use std::sync::Arc;

use crate::error::GenerationResult;
use crate::model::{MethodRef, TypeDef};
use crate::proxy::emit::{Terminal, TypePlan};
use crate::proxy::scope::TypeSynthesisCache;
use crate::proxy::signature::GenerationSignature;
use crate::proxy::synthesized::SynthesizedType;
use crate::proxy::ProxyShape;

use super::{collect_mixins, interface_ids, unclaimed_capabilities, MemberCollector, TypeGenerator};

/// Implements the proxied interface and additional capabilities.
///
/// - with target: members are matched against the target type, by
///   implementation or by identical signature and return type
/// - with target interface: members forward to the target by the interface
///   member itself
/// - without target: every terminal step is `NoTarget`
#[derive(Debug, Clone, Copy)]
pub struct InterfaceProxyGenerator {
    shape: ProxyShape,
}

impl InterfaceProxyGenerator {
    /// Generator for one of the three interface shapes
    pub fn new(shape: ProxyShape) -> Self {
        debug_assert!(!shape.is_class_shape());
        Self { shape }
    }

    fn terminal(&self, target_type: Option<&TypeDef>, method: &MethodRef) -> Terminal {
        match self.shape {
            ProxyShape::InterfaceProxyWithTargetInterface => Terminal::Target(Arc::clone(method)),
            ProxyShape::InterfaceProxyWithTarget => target_type
                .and_then(|target| match_on_target(target, method))
                .map(Terminal::Target)
                .unwrap_or(Terminal::NoTarget),
            _ => Terminal::NoTarget,
        }
    }
}

/// Member of `target` that a call to `method` maps to.
///
/// Synthesized targets carry no member definitions of their own; they
/// answer for every interface they implement through their slots.
fn match_on_target(target: &TypeDef, method: &MethodRef) -> Option<MethodRef> {
    if let Some(found) = target.find_implementation(method) {
        return (found.return_type().id() == method.return_type().id()).then_some(found);
    }
    let implements_declaring = target
        .all_interfaces()
        .iter()
        .any(|iface| iface.id() == method.declaring_type_id());
    (target.is_synthesized() && implements_declaring).then(|| Arc::clone(method))
}

impl TypeGenerator for InterfaceProxyGenerator {
    fn generate(&self, scope: &TypeSynthesisCache, signature: &GenerationSignature) -> GenerationResult<Arc<SynthesizedType>> {
        let iface = signature.base_type();
        let options = signature.options();
        let target_type = match self.shape {
            ProxyShape::InterfaceProxyWithTarget => signature.target_type().cloned(),
            ProxyShape::InterfaceProxyWithTargetInterface => Some(Arc::clone(iface)),
            _ => None,
        };
        let mut collector = MemberCollector::new(options.hook.as_ref());

        for method in iface.instance_methods() {
            let terminal = self.terminal(target_type.as_deref(), &method);
            collector.add(iface, &method, terminal)?;
        }

        let mut provided = interface_ids(iface);
        if let (ProxyShape::InterfaceProxyWithTarget, Some(target)) = (self.shape, &target_type) {
            provided.extend(interface_ids(target));
        }
        let mixins = collect_mixins(options, &provided, &mut collector)?;

        let mut interfaces = vec![Arc::clone(iface)];
        interfaces.extend(mixins.interfaces.iter().cloned());
        for cap in unclaimed_capabilities(signature, &mixins) {
            interfaces.push(Arc::clone(cap));
            for method in cap.instance_methods() {
                let terminal = self.terminal(target_type.as_deref(), &method);
                collector.add(cap, &method, terminal)?;
            }
        }

        let parent = options.base_type_for_interface_proxies.clone();
        if let Some(base) = &parent {
            for method in base.instance_methods() {
                if method.has_body() {
                    collector.add_inherited(&method, Terminal::Base(Arc::clone(&method)));
                }
            }
        }

        let slots = collector.finish();
        let (namespace, name) = scope.next_type_name(iface);
        scope.emit(TypePlan {
            namespace,
            name,
            shape: self.shape,
            proxied: Arc::clone(iface),
            parent,
            target_type,
            interfaces,
            slots,
            mixin_types: mixins.types,
        })
    }
}
