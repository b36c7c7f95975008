//! Runtime type model
//!
//! Types, members, values and objects the proxy engine reasons about.
//! Type definitions are immutable once built; objects carry a mutable
//! field table and, when they are proxies, the state the synthesized
//! type dispatches through.

pub mod method;
pub mod object;
pub mod types;
pub mod value;

pub use method::{CallContext, ClosedMethod, MethodBody, MethodBuilder, MethodDef, MethodModifiers, MethodRef, MethodSignature, ParameterDef};
pub use object::{Instance, ObjectRef};
pub use types::{builtin, ModuleInfo, TypeBuilder, TypeDef, TypeDefId, TypeKind, TypeRef, Visibility};
pub use value::Value;
