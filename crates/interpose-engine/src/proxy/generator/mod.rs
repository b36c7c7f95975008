//! Type generators
//!
//! One generator per proxy shape family. A generator inspects the members
//! of the proxied type, its mixins and additional capabilities, consults the
//! generation hook, and hands the resulting [`TypePlan`] to the cache's
//! emitter.
//!
//! Member layout is: proxied type first, then mixin interfaces, then
//! additional capabilities. A signature seen twice with the same return
//! type collapses into the first slot; with a different return type it is a
//! [`GenerationError::ConflictingMemberSignatures`].

mod class;
mod interface;

use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::{GenerationError, GenerationResult};
use crate::model::{MethodRef, MethodSignature, TypeDef, TypeDefId, TypeRef};

use super::emit::{SlotPlan, Terminal};
use super::hook::GenerationHook;
use super::scope::TypeSynthesisCache;
use super::signature::{GenerationOptions, GenerationSignature};
use super::synthesized::SynthesizedType;
use super::ProxyShape;

pub use class::ClassProxyGenerator;
pub use interface::InterfaceProxyGenerator;

/// Produces a synthesized type for a signature
pub trait TypeGenerator {
    /// Plan and emit the proxy type for `signature` into `scope`
    fn generate(&self, scope: &TypeSynthesisCache, signature: &GenerationSignature) -> GenerationResult<Arc<SynthesizedType>>;
}

/// Generator for `shape`
pub fn generator_for(shape: ProxyShape) -> Box<dyn TypeGenerator> {
    match shape {
        ProxyShape::ClassProxy | ProxyShape::ClassProxyWithTarget => Box::new(ClassProxyGenerator::new(shape)),
        ProxyShape::InterfaceProxyWithTarget
        | ProxyShape::InterfaceProxyWithTargetInterface
        | ProxyShape::InterfaceProxyWithoutTarget => Box::new(InterfaceProxyGenerator::new(shape)),
    }
}

/// Collects member slots while consulting the generation hook
pub(crate) struct MemberCollector<'a> {
    hook: &'a dyn GenerationHook,
    slots: Vec<SlotPlan>,
    seen: FxHashMap<MethodSignature, MethodRef>,
}

impl<'a> MemberCollector<'a> {
    pub(crate) fn new(hook: &'a dyn GenerationHook) -> Self {
        Self {
            hook,
            slots: Vec::new(),
            seen: FxHashMap::default(),
        }
    }

    /// Returns true if `method` still needs a slot
    fn claim(&mut self, method: &MethodRef) -> GenerationResult<bool> {
        let signature = method.signature();
        if let Some(existing) = self.seen.get(&signature) {
            if existing.return_type().id() != method.return_type().id() {
                return Err(GenerationError::ConflictingMemberSignatures {
                    member: method.name().to_string(),
                    first: format!("{}::{}", existing.declaring_type(), existing.display_signature()),
                    second: format!("{}::{}", method.declaring_type(), method.display_signature()),
                });
            }
            return Ok(false);
        }
        self.seen.insert(signature, Arc::clone(method));
        Ok(true)
    }

    /// Add an overridable member; the hook decides whether it is intercepted
    pub(crate) fn add(&mut self, owner: &TypeDef, method: &MethodRef, terminal: Terminal) -> GenerationResult<()> {
        if !self.claim(method)? {
            return Ok(());
        }
        let intercept = self.hook.should_intercept_method(owner, method);
        if !intercept {
            tracing::trace!(member = %method.qualified_name(), "member excluded by generation hook");
        }
        self.slots.push(SlotPlan {
            method: Arc::clone(method),
            intercept,
            terminal,
        });
        Ok(())
    }

    /// Add a member that cannot be overridden. It dispatches straight to
    /// `terminal` and never enters the interceptor chain.
    pub(crate) fn add_non_proxyable(&mut self, owner: &TypeDef, method: &MethodRef, terminal: Terminal) -> GenerationResult<()> {
        if !self.claim(method)? {
            return Ok(());
        }
        tracing::debug!(
            type_name = %owner.full_name(),
            member = %method.display_signature(),
            "member cannot be proxied"
        );
        self.hook.non_proxyable_member_notification(owner, method)?;
        self.slots.push(SlotPlan {
            method: Arc::clone(method),
            intercept: false,
            terminal,
        });
        Ok(())
    }

    /// Add an inherited member without consulting the hook; skipped when
    /// its signature is already taken
    pub(crate) fn add_inherited(&mut self, method: &MethodRef, terminal: Terminal) {
        let signature = method.signature();
        if self.seen.contains_key(&signature) {
            return;
        }
        self.seen.insert(signature, Arc::clone(method));
        self.slots.push(SlotPlan {
            method: Arc::clone(method),
            intercept: false,
            terminal,
        });
    }

    /// Finish inspection
    pub(crate) fn finish(self) -> Vec<SlotPlan> {
        self.hook.methods_inspected();
        self.slots
    }
}

/// Interfaces contributed by mixins
pub(crate) struct MixinLayout {
    /// Interfaces the proxy implements on behalf of mixins
    pub interfaces: Vec<TypeRef>,
    /// Ids of those interfaces
    pub claimed: FxHashSet<TypeDefId>,
    /// Mixin types in mixin order
    pub types: Vec<TypeDefId>,
}

/// Add slots for every mixin interface not already served by the primary
/// type (`provided`).
pub(crate) fn collect_mixins(
    options: &GenerationOptions,
    provided: &FxHashSet<TypeDefId>,
    collector: &mut MemberCollector<'_>,
) -> GenerationResult<MixinLayout> {
    let mut layout = MixinLayout {
        interfaces: Vec::new(),
        claimed: FxHashSet::default(),
        types: Vec::new(),
    };
    let mut owners: FxHashMap<TypeDefId, usize> = FxHashMap::default();

    for (index, mixin) in options.mixins.instances().iter().enumerate() {
        let mixin_type = mixin.type_ref();
        layout.types.push(mixin_type.id());
        for iface in mixin_type.all_interfaces() {
            if let Some(&owner) = owners.get(&iface.id()) {
                if owner != index {
                    return Err(GenerationError::DuplicateMixinInterface {
                        interface: iface.full_name(),
                    });
                }
                continue;
            }
            owners.insert(iface.id(), index);
            if provided.contains(&iface.id()) {
                continue;
            }
            layout.claimed.insert(iface.id());
            layout.interfaces.push(Arc::clone(&iface));
        }
    }

    for iface in &layout.interfaces {
        let index = owners.get(&iface.id()).copied().unwrap_or_default();
        for method in iface.instance_methods() {
            if method.declaring_type_id() != iface.id() {
                continue;
            }
            collector.add(
                iface,
                &method,
                Terminal::Mixin {
                    index,
                    method: Arc::clone(&method),
                },
            )?;
        }
    }

    Ok(layout)
}

/// Ids of `ty` (if it is an interface) and every interface it implements
pub(crate) fn interface_ids(ty: &TypeDef) -> FxHashSet<TypeDefId> {
    let mut ids: FxHashSet<TypeDefId> = ty.all_interfaces().iter().map(|i| i.id()).collect();
    if ty.is_interface() {
        ids.insert(ty.id());
    }
    ids
}

/// Additional capabilities not claimed by a mixin, in request order
pub(crate) fn unclaimed_capabilities<'s>(
    signature: &'s GenerationSignature,
    mixins: &'s MixinLayout,
) -> impl Iterator<Item = &'s TypeRef> + 's {
    signature
        .capabilities()
        .iter()
        .filter(move |cap| !mixins.claimed.contains(&cap.id()))
}
