//! The value coercion engine.
//!
//! Classifies a script value by its tag - not by the target type - and
//! converts it to a requested host type. The rules run in a fixed priority
//! order per tag. Coercion is pure: failures are structured reasons the
//! signature matcher uses to reject one candidate, never raised faults.

use crate::config::{BridgeConfig, NumericPreference};
use crate::error::CoercionError;
use crate::handles::{HandleTable, HostHandle, RuntimeClass};
use crate::host::{HostRegistry, HostValue};
use crate::host_type::{FloatWidth, HostType, IntWidth};
use crate::script_value::{ScriptRef, ScriptValue, ValueTag};

/// Coercion engine bound to the registries a conversion may need to consult:
/// the class registry for assignability, the handle table for an argument
/// handle's runtime class.
pub struct Coercer<'a> {
    classes: &'a HostRegistry,
    objects: &'a HandleTable,
    config: &'a BridgeConfig,
}

impl<'a> Coercer<'a> {
    pub fn new(
        classes: &'a HostRegistry,
        objects: &'a HandleTable,
        config: &'a BridgeConfig,
    ) -> Self {
        Self {
            classes,
            objects,
            config,
        }
    }

    /// Convert one script value to `target`.
    pub fn coerce(
        &self,
        value: &ScriptValue,
        target: &HostType,
    ) -> Result<HostValue, CoercionError> {
        let tag = value.tag();
        match value {
            ScriptValue::Boolean(b) => self.coerce_boolean(*b, tag, target),
            ScriptValue::String(s) => self.coerce_string(s, tag, target),
            ScriptValue::Function(r) | ScriptValue::Table(r) => {
                self.coerce_script_ref(r, tag, target)
            }
            ScriptValue::Number(n) => self.coerce_number(*n, tag, target),
            ScriptValue::HostObject(h) => self.coerce_object(*h, tag, target),
            ScriptValue::Nil => self.coerce_nil(target),
            ScriptValue::Unknown(raw) => Err(CoercionError::UnsupportedTag { raw: *raw }),
        }
    }

    fn coerce_boolean(
        &self,
        value: bool,
        tag: ValueTag,
        target: &HostType,
    ) -> Result<HostValue, CoercionError> {
        match target {
            HostType::Bool | HostType::BoxedBool | HostType::AnyObject => {
                Ok(HostValue::Bool(value))
            }
            _ => Err(self.mismatch(tag, target)),
        }
    }

    fn coerce_string(
        &self,
        value: &str,
        tag: ValueTag,
        target: &HostType,
    ) -> Result<HostValue, CoercionError> {
        match target {
            HostType::Str | HostType::AnyObject => Ok(HostValue::Str(value.to_string())),
            _ => Err(self.mismatch(tag, target)),
        }
    }

    /// Tables and functions are wrapped as script-callable handles, never
    /// unpacked into host fields.
    fn coerce_script_ref(
        &self,
        reference: &ScriptRef,
        tag: ValueTag,
        target: &HostType,
    ) -> Result<HostValue, CoercionError> {
        match target {
            HostType::ScriptRef | HostType::AnyObject => {
                Ok(HostValue::Script(reference.clone()))
            }
            _ => Err(self.mismatch(tag, target)),
        }
    }

    fn coerce_number(
        &self,
        value: f64,
        tag: ValueTag,
        target: &HostType,
    ) -> Result<HostValue, CoercionError> {
        match target {
            // Narrowing runs through the f64 intermediate; integer conversion
            // truncates, matching native cast semantics.
            HostType::Int(width) | HostType::BoxedInt(width) => Ok(narrow_int(value, *width)),
            HostType::Float(FloatWidth::F32) | HostType::BoxedFloat(FloatWidth::F32) => {
                Ok(HostValue::Float32(value as f32))
            }
            HostType::Float(FloatWidth::F64) | HostType::BoxedFloat(FloatWidth::F64) => {
                Ok(HostValue::Float64(value))
            }
            HostType::BoxedNumber | HostType::AnyObject => {
                Ok(match self.config.numeric_preference {
                    NumericPreference::Int32First => HostValue::Int32(value as i32),
                    NumericPreference::Float64First => HostValue::Float64(value),
                })
            }
            _ => Err(self.mismatch(tag, target)),
        }
    }

    fn coerce_object(
        &self,
        handle: HostHandle,
        tag: ValueTag,
        target: &HostType,
    ) -> Result<HostValue, CoercionError> {
        let runtime = self
            .objects
            .runtime_class(handle)
            .ok_or(CoercionError::StaleArgument)?;
        match target {
            HostType::AnyObject => Ok(HostValue::Object(handle)),
            HostType::Class(wanted) => {
                let assignable = match runtime {
                    RuntimeClass::Instance(class) => self.classes.is_assignable(*class, *wanted),
                    RuntimeClass::Proxy(interfaces) => interfaces
                        .iter()
                        .any(|&iface| self.classes.is_assignable(iface, *wanted)),
                };
                if assignable {
                    Ok(HostValue::Object(handle))
                } else {
                    Err(CoercionError::NotAssignable {
                        from: self.runtime_name(runtime),
                        to: self.classes.name_of(*wanted).to_string(),
                    })
                }
            }
            _ => Err(self.mismatch(tag, target)),
        }
    }

    fn coerce_nil(&self, target: &HostType) -> Result<HostValue, CoercionError> {
        if target.is_primitive() {
            Err(CoercionError::NilToPrimitive {
                target: self.target_name(target),
            })
        } else {
            Ok(HostValue::Null)
        }
    }

    fn runtime_name(&self, runtime: &RuntimeClass) -> String {
        match runtime {
            RuntimeClass::Instance(class) => self.classes.name_of(*class).to_string(),
            RuntimeClass::Proxy(_) => "<proxy>".to_string(),
        }
    }

    fn target_name(&self, target: &HostType) -> String {
        match target {
            HostType::Class(id) => self.classes.name_of(*id).to_string(),
            other => other.describe().to_string(),
        }
    }

    fn mismatch(&self, tag: ValueTag, target: &HostType) -> CoercionError {
        CoercionError::TagMismatch {
            tag,
            target: self.target_name(target),
        }
    }
}

/// Truncating narrow from the double-precision intermediate.
fn narrow_int(value: f64, width: IntWidth) -> HostValue {
    match width {
        IntWidth::I8 => HostValue::Int8(value as i8),
        IntWidth::I16 => HostValue::Int16(value as i16),
        IntWidth::I32 => HostValue::Int32(value as i32),
        IntWidth::I64 => HostValue::Int64(value as i64),
    }
}
