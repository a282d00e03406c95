pub mod bridge;
pub mod coerce;
pub mod config;
pub mod error;
pub mod handles;
pub mod host;
pub mod host_type;
pub mod proxy;
pub mod resolve;
pub mod script_value;
pub mod session;
pub mod signature;
pub mod stack;

// Re-export main types
pub mod prelude {
    pub use crate::bridge::{Bridge, IndexOutcome};
    pub use crate::coerce::Coercer;
    pub use crate::config::{BridgeConfig, NumericPreference};
    pub use crate::error::{BridgeError, BridgeResult, CoercionError, HostError, ScriptFault};
    pub use crate::handles::{HandleTable, HostHandle, ReleaseOutcome, RuntimeClass, Side};
    pub use crate::host::{
        ClassBuilder, HostCallContext, HostClass, HostConstructor, HostField, HostMethod,
        HostRegistry, HostValue, NativeFn,
    };
    pub use crate::host_type::{ClassFlags, ClassId, FloatWidth, HostType, IntWidth, TypeHash};
    pub use crate::proxy::ScriptProxy;
    pub use crate::resolve::{DispatchToken, ResolvedMember, Subject};
    pub use crate::script_value::{ScriptRef, ScriptValue, ValueTag};
    pub use crate::session::{EngineId, EngineInstance, EngineRegistry, SessionGuard};
    pub use crate::signature::{CandidateSignature, NoMatchReason, SignatureMatch};
    pub use crate::stack::{ScriptEngine, ScriptStack};
}
