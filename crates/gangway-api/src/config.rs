//! Bridge configuration.

use crate::zone::SecurityZone;

/// Policy for a value with no usable host representation at the
/// marshalling boundary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MarshalPolicy {
    /// Drop the value (it crosses as void) and log a warning.
    #[default]
    DropSilently,

    /// Surface a typed marshalling-miss error to the caller.
    Error,
}

/// Configuration for one bridge instance.
#[derive(Debug, Clone, Default)]
pub struct BridgeConfig {
    /// What to do when a value cannot be represented natively.
    pub marshal_policy: MarshalPolicy,

    /// Resting security zone for objects created by this instance.
    pub default_zone: SecurityZone,
}

impl BridgeConfig {
    /// Set the marshalling-miss policy.
    pub fn with_marshal_policy(mut self, policy: MarshalPolicy) -> Self {
        self.marshal_policy = policy;
        self
    }

    /// Set the resting security zone.
    pub fn with_default_zone(mut self, zone: SecurityZone) -> Self {
        self.default_zone = zone;
        self
    }
}
