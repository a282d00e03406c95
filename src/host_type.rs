//! Host-side type descriptors.
//!
//! A [`HostType`] describes one parameter, field, or return position in the
//! host object model: a primitive kind, its nullable boxed counterpart, a
//! string, the bridge's generic script-callable handle type, a registered
//! class/interface, or "any object".

use bitflags::bitflags;
use xxhash_rust::xxh64::xxh64;

/// Identifier of a registered class or interface.
///
/// Assigned densely in registration order; that order is what makes overload
/// resolution deterministic.
pub type ClassId = u32;

/// Domain marker mixed into every class-name hash.
const TYPE_DOMAIN: u64 = 0x61c8_8646_80b5_83eb;

/// A deterministic 64-bit hash identifying a class by qualified name.
///
/// The same name always produces the same hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct TypeHash(pub u64);

impl TypeHash {
    /// Empty/invalid hash constant.
    pub const EMPTY: TypeHash = TypeHash(0);

    #[inline]
    pub fn from_name(name: &str) -> Self {
        TypeHash(TYPE_DOMAIN ^ xxh64(name.as_bytes(), 0))
    }
}

/// Width of a host integer kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntWidth {
    I8,
    I16,
    I32,
    I64,
}

/// Width of a host float kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloatWidth {
    F32,
    F64,
}

/// Descriptor of a parameter type in the host type system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostType {
    /// Primitive boolean.
    Bool,
    /// Primitive integer of the given width.
    Int(IntWidth),
    /// Primitive float of the given width.
    Float(FloatWidth),
    /// Nullable boxed boolean.
    BoxedBool,
    /// Nullable boxed integer of the given width.
    BoxedInt(IntWidth),
    /// Nullable boxed float of the given width.
    BoxedFloat(FloatWidth),
    /// Any boxed numeric value; the width is chosen by the configured
    /// numeric preference.
    BoxedNumber,
    /// Host string.
    Str,
    /// The bridge's generic script-callable handle type. Script tables and
    /// functions are wrapped as handles, never unpacked into host fields.
    ScriptRef,
    /// A registered class or interface.
    Class(ClassId),
    /// Any host object.
    AnyObject,
}

impl HostType {
    /// Primitive targets reject nil; everything else is nullable.
    pub fn is_primitive(&self) -> bool {
        matches!(self, HostType::Bool | HostType::Int(_) | HostType::Float(_))
    }

    /// Coarse name for error messages. Class targets are named by the
    /// registry, not here.
    pub fn describe(&self) -> &'static str {
        match self {
            HostType::Bool => "bool",
            HostType::Int(IntWidth::I8) => "int8",
            HostType::Int(IntWidth::I16) => "int16",
            HostType::Int(IntWidth::I32) => "int32",
            HostType::Int(IntWidth::I64) => "int64",
            HostType::Float(FloatWidth::F32) => "float32",
            HostType::Float(FloatWidth::F64) => "float64",
            HostType::BoxedBool => "boxed bool",
            HostType::BoxedInt(_) => "boxed integer",
            HostType::BoxedFloat(_) => "boxed float",
            HostType::BoxedNumber => "boxed number",
            HostType::Str => "string",
            HostType::ScriptRef => "script handle",
            HostType::Class(_) => "class",
            HostType::AnyObject => "object",
        }
    }
}

bitflags! {
    /// Markers recorded for every registered class.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ClassFlags: u32 {
        const CLASS     = 0x0001;
        const INTERFACE = 0x0002;
        const ABSTRACT  = 0x0004;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_hash_is_deterministic() {
        assert_eq!(TypeHash::from_name("Point"), TypeHash::from_name("Point"));
        assert_ne!(TypeHash::from_name("Point"), TypeHash::from_name("point"));
        assert_ne!(TypeHash::from_name("Point"), TypeHash::EMPTY);
    }

    #[test]
    fn primitives_reject_nil() {
        assert!(HostType::Bool.is_primitive());
        assert!(HostType::Int(IntWidth::I32).is_primitive());
        assert!(HostType::Float(FloatWidth::F64).is_primitive());
        assert!(!HostType::BoxedBool.is_primitive());
        assert!(!HostType::Str.is_primitive());
        assert!(!HostType::AnyObject.is_primitive());
    }

    #[test]
    fn describe_names_widths() {
        assert_eq!(HostType::Int(IntWidth::I8).describe(), "int8");
        assert_eq!(HostType::Float(FloatWidth::F32).describe(), "float32");
    }
}
