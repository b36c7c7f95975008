//! Generation signatures and options
//!
//! A [`GenerationSignature`] is the cache key for a synthesized type. Options
//! split into signature-relevant fields (hook, mixin types, base type for
//! interface proxies, attribute policy) and instance-relevant ones (the
//! selector and the mixin instances themselves).

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use rustc_hash::FxHashSet;

use crate::model::{ObjectRef, TypeDefId, TypeRef};

use super::hook::{AllMethodsHook, GenerationHook, InterceptorSelector};
use super::ProxyShape;

/// Attribute inheritance policy flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct AttributeInheritance(u8);

impl AttributeInheritance {
    /// Inherit nothing
    pub const NONE: Self = Self(0x00);
    /// Type-level attributes
    pub const TYPE: Self = Self(0x01);
    /// Member-level attributes
    pub const MEMBERS: Self = Self(0x02);
    /// Parameter attributes
    pub const PARAMETERS: Self = Self(0x04);
    /// Everything
    pub const ALL: Self = Self(0x07);

    /// Create from raw bits
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits & Self::ALL.0)
    }

    /// Get raw bits
    pub const fn bits(&self) -> u8 {
        self.0
    }

    /// Check if all flags of `other` are set
    pub const fn contains(&self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    /// Union of flags
    pub const fn union(&self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

/// Auxiliary implementations merged into a proxy.
///
/// Cache equality depends on the mixin types only; the instances are
/// supplied again when the proxy is instantiated.
#[derive(Debug, Clone, Default)]
pub struct MixinData {
    instances: Vec<ObjectRef>,
}

impl MixinData {
    /// Mixins in the given order
    pub fn new(instances: Vec<ObjectRef>) -> Self {
        Self { instances }
    }

    /// Mixin instances in order
    pub fn instances(&self) -> &[ObjectRef] {
        &self.instances
    }

    /// Number of mixins
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    /// Whether there are no mixins
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    fn type_ids(&self) -> Vec<TypeDefId> {
        self.instances.iter().map(|m| m.type_ref().id()).collect()
    }
}

/// Options controlling generation and instantiation
#[derive(Clone)]
pub struct GenerationOptions {
    /// Decides which members are intercepted
    pub hook: Arc<dyn GenerationHook>,
    /// Auxiliary implementations
    pub mixins: MixinData,
    /// Per-call interceptor selection
    pub selector: Option<Arc<dyn InterceptorSelector>>,
    /// Class that interface proxies extend
    pub base_type_for_interface_proxies: Option<TypeRef>,
    /// Attribute inheritance policy
    pub attributes_to_inherit: AttributeInheritance,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            hook: Arc::new(AllMethodsHook),
            mixins: MixinData::default(),
            selector: None,
            base_type_for_interface_proxies: None,
            attributes_to_inherit: AttributeInheritance::NONE,
        }
    }
}

impl GenerationOptions {
    /// Use `hook`
    pub fn with_hook(mut self, hook: Arc<dyn GenerationHook>) -> Self {
        self.hook = hook;
        self
    }

    /// Add a mixin instance
    pub fn with_mixin(mut self, mixin: ObjectRef) -> Self {
        self.mixins.instances.push(mixin);
        self
    }

    /// Use `selector` for every call
    pub fn with_selector(mut self, selector: Arc<dyn InterceptorSelector>) -> Self {
        self.selector = Some(selector);
        self
    }

    /// Make interface proxies extend `base`
    pub fn with_base_type_for_interface_proxies(mut self, base: &TypeRef) -> Self {
        self.base_type_for_interface_proxies = Some(Arc::clone(base));
        self
    }

    /// Set the attribute inheritance policy
    pub fn with_attributes_to_inherit(mut self, flags: AttributeInheritance) -> Self {
        self.attributes_to_inherit = flags;
        self
    }

    fn key(&self) -> OptionsKey {
        let hook = match self.hook.cache_key() {
            Some(key) => HookKey::Keyed {
                type_name: self.hook.hook_type_name(),
                key,
            },
            None => HookKey::Identity(Arc::as_ptr(&self.hook) as *const () as usize),
        };
        OptionsKey {
            hook,
            mixin_types: self.mixins.type_ids(),
            base_for_interfaces: self.base_type_for_interface_proxies.as_ref().map(|t| t.id()),
            attributes: self.attributes_to_inherit,
        }
    }
}

impl fmt::Debug for GenerationOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationOptions")
            .field("hook", &self.hook)
            .field("mixins", &self.mixins.len())
            .field("selector", &self.selector.is_some())
            .field(
                "base_type_for_interface_proxies",
                &self.base_type_for_interface_proxies.as_ref().map(|t| t.full_name()),
            )
            .field("attributes_to_inherit", &self.attributes_to_inherit)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum HookKey {
    Keyed { type_name: &'static str, key: String },
    Identity(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct OptionsKey {
    hook: HookKey,
    mixin_types: Vec<TypeDefId>,
    base_for_interfaces: Option<TypeDefId>,
    attributes: AttributeInheritance,
}

/// Immutable description of what to synthesize
#[derive(Clone)]
pub struct GenerationSignature {
    shape: ProxyShape,
    base: TypeRef,
    target_type: Option<TypeRef>,
    capabilities: Vec<TypeRef>,
    capability_set: Vec<TypeDefId>,
    options: GenerationOptions,
    options_key: OptionsKey,
}

impl GenerationSignature {
    /// Build a signature. Duplicate capabilities, and capabilities equal to
    /// the primary type, are dropped; first occurrence order is kept.
    pub fn new(
        shape: ProxyShape,
        base: &TypeRef,
        target_type: Option<&TypeRef>,
        capabilities: &[TypeRef],
        options: &GenerationOptions,
    ) -> Self {
        let mut seen = FxHashSet::default();
        seen.insert(base.id());
        let capabilities: Vec<TypeRef> = capabilities
            .iter()
            .filter(|c| seen.insert(c.id()))
            .cloned()
            .collect();
        let mut capability_set: Vec<TypeDefId> = capabilities.iter().map(|c| c.id()).collect();
        capability_set.sort_unstable();
        Self {
            shape,
            base: Arc::clone(base),
            target_type: target_type.cloned(),
            capabilities,
            capability_set,
            options_key: options.key(),
            options: options.clone(),
        }
    }

    /// Proxy shape
    pub fn shape(&self) -> ProxyShape {
        self.shape
    }

    /// Proxied class or primary interface
    pub fn base_type(&self) -> &TypeRef {
        &self.base
    }

    /// Target type members are matched against (interface proxies with target)
    pub fn target_type(&self) -> Option<&TypeRef> {
        self.target_type.as_ref()
    }

    /// Additional capabilities in request order
    pub fn capabilities(&self) -> &[TypeRef] {
        &self.capabilities
    }

    /// Options the signature was built from
    pub fn options(&self) -> &GenerationOptions {
        &self.options
    }
}

impl PartialEq for GenerationSignature {
    fn eq(&self, other: &Self) -> bool {
        self.shape == other.shape
            && self.base.id() == other.base.id()
            && self.target_type.as_ref().map(|t| t.id()) == other.target_type.as_ref().map(|t| t.id())
            && self.capability_set == other.capability_set
            && self.options_key == other.options_key
    }
}

impl Eq for GenerationSignature {}

impl Hash for GenerationSignature {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.shape.hash(state);
        self.base.id().hash(state);
        self.target_type.as_ref().map(|t| t.id()).hash(state);
        self.capability_set.hash(state);
        self.options_key.hash(state);
    }
}

impl fmt::Debug for GenerationSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let caps: Vec<String> = self.capabilities.iter().map(|c| c.full_name()).collect();
        f.debug_struct("GenerationSignature")
            .field("shape", &self.shape)
            .field("base", &self.base.full_name())
            .field("target_type", &self.target_type.as_ref().map(|t| t.full_name()))
            .field("capabilities", &caps)
            .field("options", &self.options_key)
            .finish()
    }
}
