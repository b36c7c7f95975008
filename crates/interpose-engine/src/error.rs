//! Error types for proxy generation and dispatch
//!
//! Generation failures are detected before anything is registered in the
//! type synthesis cache. Dispatch failures abort only the call in progress.

use thiserror::Error;

/// Errors raised while validating a proxy request or synthesizing its type
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    /// The type is neither public nor internal with a grant to the engine
    #[error("Type '{type_name}' is not visible to the proxy engine: {reason}")]
    NotVisible {
        /// Full name of the rejected type
        type_name: String,
        /// Why the type is not visible
        reason: String,
    },

    /// Proxying unbound generic definitions is undefined
    #[error("Cannot proxy open generic type definition '{0}'")]
    OpenGenericTypeDefinition(String),

    /// Two contributing types declare the same signature with different return types
    #[error("Conflicting member signatures for '{member}': '{first}' and '{second}'")]
    ConflictingMemberSignatures {
        /// Member name
        member: String,
        /// First declaration (type and signature)
        first: String,
        /// Conflicting declaration (type and signature)
        second: String,
    },

    /// The generation hook refused a member that cannot be overridden
    #[error("Member '{member}' of '{type_name}' cannot be proxied: {reason}")]
    NonProxyableMember {
        /// Declaring type
        type_name: String,
        /// Member signature
        member: String,
        /// Reason reported by the hook
        reason: String,
    },

    /// An interface was required
    #[error("Type '{0}' is not an interface")]
    NotAnInterface(String),

    /// A class was required
    #[error("Type '{0}' is not a class")]
    NotAClass(String),

    /// Sealed classes cannot be subclassed
    #[error("Cannot subclass sealed class '{0}'")]
    SealedClass(String),

    /// Generic construction with the wrong number of type arguments
    #[error("Type '{type_name}' expects {expected} type argument(s), got {actual}")]
    GenericArityMismatch {
        /// Generic definition name
        type_name: String,
        /// Declared parameter count
        expected: usize,
        /// Supplied argument count
        actual: usize,
    },

    /// The same interface is contributed by more than one mixin
    #[error("Interface '{interface}' is provided by more than one mixin")]
    DuplicateMixinInterface {
        /// Interface full name
        interface: String,
    },

    /// The cache was disposed; no further types can be produced
    #[error("Type synthesis cache has been disposed")]
    ScopeDisposed,
}

/// Errors raised while dispatching a call through a proxy or plain instance
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvocationError {
    /// An interceptor called `proceed()` after the chain was exhausted
    #[error("proceed() called past the end of the interceptor chain for '{method}' ({interceptors} interceptor(s))")]
    PipelineOverrun {
        /// Method being invoked
        method: String,
        /// Length of the chain for this call
        interceptors: usize,
    },

    /// The terminal step was reached with nothing to execute
    #[error("No target available to complete the call to '{method}'")]
    NoTarget {
        /// Method being invoked
        method: String,
    },

    /// A replacement target is not assignable to the expected target type
    #[error("Type mismatch: expected a target assignable to '{expected}', got '{actual}'")]
    TargetTypeMismatch {
        /// Expected target type
        expected: String,
        /// Actual type of the supplied object
        actual: String,
    },

    /// The proxy shape does not support target changes
    #[error("This proxy does not allow changing its target")]
    TargetChangeUnsupported,

    /// The proxy was supplied as its own target
    #[error("A proxy cannot be its own target")]
    ProxyAsOwnTarget,

    /// No member with the given name and arity
    #[error("Type '{type_name}' has no member '{member}' taking {arity} argument(s)")]
    MissingMember {
        /// Receiver type
        type_name: String,
        /// Requested member name
        member: String,
        /// Requested argument count
        arity: usize,
    },

    /// An abstract member was called without an implementation
    #[error("Member '{method}' is abstract")]
    AbstractMember {
        /// Method signature
        method: String,
    },

    /// Wrong number of arguments for a member
    #[error("'{method}' expects {expected} argument(s), got {actual}")]
    ArgumentCountMismatch {
        /// Method signature
        method: String,
        /// Declared parameter count
        expected: usize,
        /// Supplied argument count
        actual: usize,
    },

    /// Argument index outside the call's argument list
    #[error("Argument index {index} out of range ({count} argument(s))")]
    ArgumentIndexOutOfRange {
        /// Requested index
        index: usize,
        /// Number of arguments
        count: usize,
    },

    /// Wrong number of generic arguments for a generic member
    #[error("'{method}' expects {expected} generic argument(s), got {actual}")]
    GenericArityMismatch {
        /// Method signature
        method: String,
        /// Declared generic parameter count
        expected: usize,
        /// Supplied generic argument count
        actual: usize,
    },

    /// An invocation snapshot could not be captured or restored
    #[error("Snapshot error: {0}")]
    Snapshot(String),

    /// Failure raised by a member body or an interceptor
    #[error("{0}")]
    Failed(String),
}

/// Errors raised while instantiating a synthesized proxy type
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InstantiationError {
    /// A "with target" shape was instantiated without a target
    #[error("Proxy type '{0}' requires a target instance")]
    MissingTarget(String),

    /// The supplied target does not match the proxy's target type
    #[error("Type mismatch: expected a target assignable to '{expected}', got '{actual}'")]
    TargetTypeMismatch {
        /// Expected target type
        expected: String,
        /// Actual type of the supplied object
        actual: String,
    },

    /// Mixin instances do not line up with the mixins the type was generated for
    #[error("Proxy type '{type_name}' was generated for {expected} mixin(s), got {actual}")]
    MixinCountMismatch {
        /// Synthesized type name
        type_name: String,
        /// Mixins the type was generated for
        expected: usize,
        /// Mixins supplied
        actual: usize,
    },

    /// The cache that produced the type was disposed
    #[error("Proxy type '{0}' belongs to a disposed type synthesis cache")]
    ScopeDisposed(String),

    /// Generating the proxy type failed
    #[error(transparent)]
    Generation(#[from] GenerationError),
}

/// Result of a generation request
pub type GenerationResult<T> = Result<T, GenerationError>;

/// Result of a dispatched call
pub type InvocationResult<T> = Result<T, InvocationError>;
