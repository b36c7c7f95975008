//! Class proxy generation (with and without target)

use std::sync::Arc;

use crate::error::GenerationResult;
use crate::proxy::emit::{Terminal, TypePlan};
use crate::proxy::scope::TypeSynthesisCache;
use crate::proxy::signature::GenerationSignature;
use crate::proxy::synthesized::SynthesizedType;
use crate::proxy::ProxyShape;

use super::{collect_mixins, interface_ids, unclaimed_capabilities, MemberCollector, TypeGenerator};

/// Subclasses the proxied class.
///
/// Without a target the terminal step runs the inherited body on the proxy
/// itself; abstract members have no body and end in `NoTarget`. With a
/// target every overridable member is forwarded to the held instance.
#[derive(Debug, Clone, Copy)]
pub struct ClassProxyGenerator {
    shape: ProxyShape,
}

impl ClassProxyGenerator {
    /// Generator for `ClassProxy` or `ClassProxyWithTarget`
    pub fn new(shape: ProxyShape) -> Self {
        debug_assert!(shape.is_class_shape());
        Self { shape }
    }

    fn with_target(&self) -> bool {
        self.shape == ProxyShape::ClassProxyWithTarget
    }
}

impl TypeGenerator for ClassProxyGenerator {
    fn generate(&self, scope: &TypeSynthesisCache, signature: &GenerationSignature) -> GenerationResult<Arc<SynthesizedType>> {
        let class = signature.base_type();
        let options = signature.options();
        let mut collector = MemberCollector::new(options.hook.as_ref());

        for method in class.instance_methods() {
            if !method.is_overridable() {
                collector.add_non_proxyable(class, &method, Terminal::Base(Arc::clone(&method)))?;
                continue;
            }
            let terminal = if self.with_target() {
                Terminal::Target(Arc::clone(&method))
            } else if method.has_body() {
                Terminal::Base(Arc::clone(&method))
            } else {
                Terminal::NoTarget
            };
            collector.add(class, &method, terminal)?;
        }

        let mixins = collect_mixins(options, &interface_ids(class), &mut collector)?;

        let mut interfaces = mixins.interfaces.clone();
        for cap in unclaimed_capabilities(signature, &mixins) {
            interfaces.push(Arc::clone(cap));
            let provided_by_class = class.is_assignable_to(cap);
            for method in cap.instance_methods() {
                let terminal = if !provided_by_class {
                    Terminal::NoTarget
                } else if self.with_target() {
                    Terminal::Target(Arc::clone(&method))
                } else {
                    match class.find_implementation(&method) {
                        Some(imp) if imp.has_body() => Terminal::Base(imp),
                        _ => Terminal::NoTarget,
                    }
                };
                collector.add(cap, &method, terminal)?;
            }
        }

        let slots = collector.finish();
        let (namespace, name) = scope.next_type_name(class);
        scope.emit(TypePlan {
            namespace,
            name,
            shape: self.shape,
            proxied: Arc::clone(class),
            parent: Some(Arc::clone(class)),
            target_type: self.with_target().then(|| Arc::clone(class)),
            interfaces,
            slots,
            mixin_types: mixins.types,
        })
    }
}
