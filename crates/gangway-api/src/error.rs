//! Error types for the scripting bridge.

use thiserror::Error;

use crate::variant::VariantKind;

/// Result type for bridge and scripting operations.
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Errors that can cross the host/plugin boundary.
///
/// Every failure that leaves this crate is one of these variants; native
/// faults are caught at the boundary and converted, never re-thrown into
/// the host process.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// A dynamic value could not be coerced to the requested type.
    #[error("Cannot convert {from} to {to}")]
    Conversion { from: VariantKind, to: &'static str },

    /// The host left the native entry for this operation unset.
    #[error("Host does not support operation '{operation}'")]
    Unsupported { operation: &'static str },

    /// The host reported a failure executing script.
    #[error("Error executing script: {message}")]
    ScriptExecution { message: String },

    /// The native host call returned its failure signal.
    #[error("Host call '{what}' failed")]
    CallFailed { what: String },

    /// The object was invalidated; script access has been severed.
    #[error("Object has been invalidated")]
    Invalidated,

    /// No method or property with this name exists on the object.
    #[error("Unknown member '{name}'")]
    UnknownMember { name: String },

    /// Arguments could not be bound to the method's parameters.
    #[error("Invalid arguments to '{method}'")]
    InvalidArguments { method: String },

    /// A value had no usable native representation at the boundary.
    #[error("No host representation for {kind} value")]
    MarshalMiss { kind: VariantKind },

    /// Event names must begin with the reserved "on" prefix.
    #[error("Invalid event name '{name}': must start with \"on\"")]
    BadEventName { name: String },

    /// The event was never registered on this object.
    #[error("Event '{name}' is not registered")]
    UnknownEvent { name: String },

    /// The property exists but cannot be written.
    #[error("Property '{name}' is read-only")]
    ReadOnly { name: String },

    /// The bridge has been shut down; no further host calls are possible.
    #[error("Bridge has been shut down")]
    ShutDown,
}

impl BridgeError {
    /// Conversion failure from a variant kind to a Rust type.
    pub fn conversion(from: VariantKind, to: &'static str) -> Self {
        Self::Conversion { from, to }
    }

    /// Failure for an operation whose native table entry is unset.
    pub fn unsupported(operation: &'static str) -> Self {
        Self::Unsupported { operation }
    }

    /// Unknown-member failure for the given name.
    pub fn unknown_member(name: impl Into<String>) -> Self {
        Self::UnknownMember { name: name.into() }
    }

    /// Native call failure for the given operation description.
    pub fn call_failed(what: impl Into<String>) -> Self {
        Self::CallFailed { what: what.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BridgeError::conversion(VariantKind::Object, "String");
        assert_eq!(err.to_string(), "Cannot convert object to String");

        let err = BridgeError::unsupported("invoke");
        assert!(err.to_string().contains("invoke"));
    }

    #[test]
    fn test_invalidated_distinct_from_unknown_member() {
        let invalid = BridgeError::Invalidated;
        let unknown = BridgeError::unknown_member("foo");
        assert!(!matches!(invalid, BridgeError::UnknownMember { .. }));
        assert!(matches!(unknown, BridgeError::UnknownMember { .. }));
    }
}
