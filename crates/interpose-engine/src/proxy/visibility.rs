//! Visibility of types to the proxy engine
//!
//! Public types are always visible. Internal types are visible when their
//! hosting module grants access to its internals, or when the engine
//! configuration lists a grant pattern matching the module name. Private
//! types are never visible.

use crate::config::{ConfigError, EngineConfig, GrantRule};
use crate::error::{GenerationError, GenerationResult};
use crate::model::{TypeDef, Visibility};

/// Decides which types the engine may proxy
#[derive(Debug, Clone, Default)]
pub struct VisibilityPolicy {
    grants: Vec<GrantRule>,
}

impl VisibilityPolicy {
    /// Policy with no configured grants
    pub fn new() -> Self {
        Self::default()
    }

    /// Policy using the grants from `config`
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            grants: config.grant_rules(),
        }
    }

    /// Add a grant pattern
    pub fn grant(mut self, pattern: &str) -> Result<Self, ConfigError> {
        self.grants.push(GrantRule::parse(pattern)?);
        Ok(self)
    }

    fn module_granted(&self, ty: &TypeDef) -> bool {
        ty.module().grants_internals || self.grants.iter().any(|rule| rule.matches(&ty.module().name))
    }

    fn denial(&self, ty: &TypeDef) -> Option<String> {
        match ty.visibility() {
            Visibility::Public => None,
            Visibility::Internal if self.module_granted(ty) => None,
            Visibility::Internal => Some(format!(
                "internal to module '{}', which grants no access to its internals",
                ty.module().name
            )),
            Visibility::Private => Some("private types cannot be proxied".to_string()),
        }
    }

    /// Whether `ty` and all of its generic arguments are visible
    pub fn is_visible(&self, ty: &TypeDef) -> bool {
        self.check(ty).is_ok()
    }

    /// Fail with `NotVisible` unless `ty` and all of its generic arguments are visible
    pub fn check(&self, ty: &TypeDef) -> GenerationResult<()> {
        if let Some(reason) = self.denial(ty) {
            return Err(GenerationError::NotVisible {
                type_name: ty.full_name(),
                reason,
            });
        }
        for arg in ty.generic_arguments() {
            if let Err(GenerationError::NotVisible { type_name, reason }) = self.check(arg) {
                return Err(GenerationError::NotVisible {
                    type_name: ty.full_name(),
                    reason: format!("generic argument '{}' is not visible: {}", type_name, reason),
                });
            }
        }
        Ok(())
    }
}
