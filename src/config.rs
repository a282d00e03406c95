//! Bridge configuration.

/// Boxed representation chosen when a number meets a target that accepts any
/// numeric object ([`HostType::BoxedNumber`] or [`HostType::AnyObject`]).
///
/// Observed engines disagree on this; the bridge makes the precedence an
/// explicit, documented option instead of an accident of enumeration order.
///
/// [`HostType::BoxedNumber`]: crate::host_type::HostType::BoxedNumber
/// [`HostType::AnyObject`]: crate::host_type::HostType::AnyObject
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NumericPreference {
    /// Convert through a 32-bit integer (truncating). The default.
    #[default]
    Int32First,
    /// Keep full double precision.
    Float64First,
}

/// Options governing bridge behavior.
#[derive(Debug, Clone, Default)]
pub struct BridgeConfig {
    pub numeric_preference: NumericPreference,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_prefers_int32() {
        let config = BridgeConfig::default();
        assert_eq!(config.numeric_preference, NumericPreference::Int32First);
    }
}
