//! Error types for the bridge.
//!
//! Two layers with different propagation rules. [`CoercionError`] is control
//! data: it makes one candidate ineligible during signature matching and is
//! consumed locally. [`BridgeError`] is what actually crosses the boundary -
//! a final "nothing matched", a fault raised during invocation, or a
//! configuration problem detected before any call was attempted.

use thiserror::Error;

use crate::script_value::ValueTag;

/// Failure to coerce a single script value to a host target type.
///
/// Never raised as a fault on its own: the signature matcher treats any
/// variant as "this candidate does not take these arguments" and scans on.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoercionError {
    /// The value's tag cannot convert to the target kind at all.
    #[error("{tag} value cannot convert to {target}")]
    TagMismatch { tag: ValueTag, target: String },

    /// Nil only converts to nullable (non-primitive) targets.
    #[error("nil cannot convert to primitive {target}")]
    NilToPrimitive { target: String },

    /// A host object whose runtime class is not assignable to the target.
    #[error("object of class '{from}' is not assignable to '{to}'")]
    NotAssignable { from: String, to: String },

    /// The argument handle no longer refers to a live object.
    #[error("stale object handle passed as argument")]
    StaleArgument,

    /// A stack slot carrying a tag the bridge does not marshal.
    #[error("invalid parameter: unsupported script value tag {raw}")]
    UnsupportedTag { raw: i32 },
}

/// Errors raised inside host callables (methods, constructors, field getters).
#[derive(Debug, Error)]
pub enum HostError {
    #[error("method requires 'this' but none was provided")]
    MissingThis,

    #[error("'this' type mismatch: expected {expected}")]
    ThisTypeMismatch { expected: &'static str },

    #[error("argument {index} is missing or not {expected}")]
    BadArgument { index: usize, expected: &'static str },

    #[error("cannot invoke abstract method '{name}'")]
    AbstractMethod { name: String },

    /// The callable itself raised.
    #[error("{message}")]
    Raised { message: String },
}

impl HostError {
    /// Create a fault carrying a message from the callable.
    pub fn raised(message: impl Into<String>) -> Self {
        HostError::Raised {
            message: message.into(),
        }
    }
}

/// A fault raised by script code while the bridge was re-entering the engine.
#[derive(Debug, Clone, Error)]
#[error("script fault: {message}")]
pub struct ScriptFault {
    pub message: String,
}

impl ScriptFault {
    pub fn new(message: impl Into<String>) -> Self {
        ScriptFault {
            message: message.into(),
        }
    }
}

/// Errors that cross the bridge boundary.
///
/// Intermediate resolution failures never surface here; only the final
/// outcome of an entry point does.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// No candidate's arity and per-parameter coercions all succeeded.
    ///
    /// The unsuccessful candidates are deliberately not enumerated.
    #[error("no matching {kind} '{name}' for the given arguments")]
    NoMatchingSignature { kind: &'static str, name: String },

    /// The selected host callable raised during invocation.
    #[error("invocation of '{name}' failed")]
    InvocationFault {
        name: String,
        #[source]
        source: HostError,
    },

    /// The proxy's backing table lacks an implementation for the method.
    #[error("proxy backing table has no function '{method}'")]
    ContractViolation { method: String },

    /// The invoked method is not declared by any interface the proxy binds.
    #[error("proxy method '{method}' is not declared by a bound interface")]
    UndeclaredProxyMethod { method: String },

    /// A proxy method's script result did not convert to the declared return type.
    #[error("return value of proxy method '{method}' could not be converted")]
    ReturnMismatch {
        method: String,
        #[source]
        source: CoercionError,
    },

    #[error("class '{name}' could not be resolved")]
    UnknownClass { name: String },

    #[error("class '{name}' is already registered")]
    DuplicateClass { name: String },

    #[error("'{name}' is not an interface")]
    NotAnInterface { name: String },

    #[error("proxy creation requires at least one interface")]
    EmptyInterfaceList,

    #[error("proxy backing value is not a table")]
    BackingNotATable,

    #[error("no live engine instance with id {id}")]
    UnknownEngine { id: u32 },

    #[error("stale object handle")]
    StaleHandle,

    /// A script-side fault crossing into the host.
    #[error(transparent)]
    Script(#[from] ScriptFault),
}

pub type BridgeResult<T> = Result<T, BridgeError>;
