//! The engine-facing stack and callback interface.
//!
//! Everything here is implemented by the embedding engine; the bridge only
//! consumes it. Methods take `&self`: engine implementations hold their
//! state behind interior mutability (in practice an FFI pointer or a cell),
//! and the bridge serializes every access through the per-instance session
//! discipline in [`crate::session`].

use crate::error::ScriptFault;
use crate::handles::HostHandle;
use crate::host::HostValue;
use crate::script_value::{ScriptRef, ScriptValue, ValueTag};

/// Stack introspection and mutation primitives. Slots are zero-based from
/// the bottom of the current frame; `top()` is the number of live slots.
pub trait ScriptStack {
    fn top(&self) -> usize;

    fn tag_at(&self, slot: usize) -> ValueTag;

    fn boolean_at(&self, slot: usize) -> bool;

    fn number_at(&self, slot: usize) -> f64;

    fn string_at(&self, slot: usize) -> Option<String>;

    fn host_handle_at(&self, slot: usize) -> Option<HostHandle>;

    /// Acquire an engine reference for the table or function at `slot`.
    /// The engine keeps the referent alive until the reference is released.
    fn ref_at(&self, slot: usize) -> Option<ScriptRef>;

    fn push_nil(&self);

    fn push_boolean(&self, value: bool);

    fn push_number(&self, value: f64);

    fn push_string(&self, value: &str);

    fn push_host_handle(&self, handle: HostHandle);

    fn push_ref(&self, reference: &ScriptRef);

    fn pop(&self, count: usize);
}

/// Callbacks beyond raw stack access that the bridge needs from the engine.
pub trait ScriptEngine: ScriptStack {
    /// Push the value stored under `key` in `table` onto the stack
    /// (nil if the key is unset).
    fn push_table_field(&self, table: &ScriptRef, key: &str);

    /// Call the function sitting below the `nargs` topmost slots. Function
    /// and arguments are consumed; up to `nresults` results are pushed.
    fn call(&self, nargs: usize, nresults: usize) -> Result<(), ScriptFault>;

    /// Add one reference to an already-acquired script reference.
    fn retain_ref(&self, reference: &ScriptRef);

    /// Release a script reference acquired via [`ScriptStack::ref_at`] or
    /// [`ScriptEngine::retain_ref`]. Releases are symmetric with acquisition.
    fn release_ref(&self, reference: ScriptRef);
}

/// Read one stack slot into an owned snapshot.
pub fn read_value<S: ScriptStack + ?Sized>(stack: &S, slot: usize) -> ScriptValue {
    match stack.tag_at(slot) {
        ValueTag::Nil => ScriptValue::Nil,
        ValueTag::Boolean => ScriptValue::Boolean(stack.boolean_at(slot)),
        ValueTag::Number => ScriptValue::Number(stack.number_at(slot)),
        ValueTag::String => match stack.string_at(slot) {
            Some(s) => ScriptValue::String(s),
            None => ScriptValue::Unknown(-1),
        },
        ValueTag::Function => match stack.ref_at(slot) {
            Some(r) => ScriptValue::Function(r),
            None => ScriptValue::Unknown(-1),
        },
        ValueTag::Table => match stack.ref_at(slot) {
            Some(r) => ScriptValue::Table(r),
            None => ScriptValue::Unknown(-1),
        },
        ValueTag::HostObject => match stack.host_handle_at(slot) {
            Some(h) => ScriptValue::HostObject(h),
            None => ScriptValue::Unknown(-1),
        },
        ValueTag::Unknown(raw) => ScriptValue::Unknown(raw),
    }
}

/// Read the argument slots `first..top` into owned snapshots.
pub fn read_args<S: ScriptStack + ?Sized>(stack: &S, first: usize) -> Vec<ScriptValue> {
    (first..stack.top()).map(|slot| read_value(stack, slot)).collect()
}

/// Push a host value back as a script-visible result.
pub fn push_host_value<S: ScriptStack + ?Sized>(stack: &S, value: &HostValue) {
    match value {
        HostValue::Null => stack.push_nil(),
        HostValue::Bool(b) => stack.push_boolean(*b),
        HostValue::Int8(n) => stack.push_number(f64::from(*n)),
        HostValue::Int16(n) => stack.push_number(f64::from(*n)),
        HostValue::Int32(n) => stack.push_number(f64::from(*n)),
        HostValue::Int64(n) => stack.push_number(*n as f64),
        HostValue::Float32(n) => stack.push_number(f64::from(*n)),
        HostValue::Float64(n) => stack.push_number(*n),
        HostValue::Str(s) => stack.push_string(s),
        HostValue::Script(r) => stack.push_ref(r),
        HostValue::Object(h) => stack.push_host_handle(*h),
    }
}
