//! Bidirectional value marshalling across the host boundary.
//!
//! Dispatch is an exhaustive match over the closed kind sets on either
//! side, so a new kind cannot be added without the compiler pointing at
//! every conversion site. Object handles crossing in either direction are
//! reference-counted by construction: the receiving side always ends up
//! owning exactly one reference, released exactly once.

use std::sync::Arc;

use gangway_api::{
    ApiRef, BridgeError, BridgeResult, ListApi, MapApi, MarshalPolicy, Variant, VariantKind,
};

use crate::bridge::HostBridge;
use crate::proxy::HostObjectApi;
use crate::value::{HostHandle, HostValue};

/// Convert a borrowed host value into a variant.
///
/// Object values are wrapped in a [`HostObjectApi`] proxy, which retains
/// the handle for as long as the proxy lives; the host's own reference is
/// untouched.
pub fn from_host(bridge: &Arc<HostBridge>, value: &HostValue) -> Variant {
    match value {
        HostValue::Void => Variant::Void,
        HostValue::Null => Variant::Null,
        HostValue::Bool(b) => Variant::Bool(*b),
        HostValue::Int(i) => Variant::Int(i64::from(*i)),
        HostValue::Double(d) => Variant::Double(*d),
        // Strings are copied by byte range, never NUL-scanned.
        HostValue::Utf8(bytes) => Variant::String(String::from_utf8_lossy(bytes).into_owned()),
        HostValue::Object(handle) => Variant::Object(HostObjectApi::from_borrowed(bridge, *handle)),
    }
}

/// Convert a host value we own (returned from a host call) into a
/// variant, then release the reference the host handed us. The proxy
/// created for object values holds its own reference.
pub fn from_host_owned(bridge: &Arc<HostBridge>, value: HostValue) -> Variant {
    let converted = from_host(bridge, &value);
    bridge.release_value(&value);
    converted
}

/// Convert a variant into its host representation.
///
/// `Ok(None)` means the value was dropped at the boundary under
/// [`MarshalPolicy::DropSilently`]; with [`MarshalPolicy::Error`] the
/// same condition surfaces as [`BridgeError::MarshalMiss`]. Object values
/// in the result are owned by the receiver.
pub fn to_host(bridge: &Arc<HostBridge>, value: &Variant) -> BridgeResult<Option<HostValue>> {
    match value {
        Variant::Null => Ok(Some(HostValue::Null)),
        Variant::Void => Ok(Some(HostValue::Void)),
        Variant::Bool(b) => Ok(Some(HostValue::Bool(*b))),
        Variant::Int(i) => Ok(Some(match i32::try_from(*i) {
            Ok(narrow) => HostValue::Int(narrow),
            // Hosts only carry 32-bit integers; wider values cross as
            // doubles.
            Err(_) => HostValue::Double(*i as f64),
        })),
        Variant::Double(d) => Ok(Some(HostValue::Double(*d))),
        Variant::String(s) => Ok(Some(HostValue::Utf8(s.as_bytes().to_vec()))),
        Variant::Object(api) => reflect(bridge, api.clone(), VariantKind::Object),
        Variant::List(items) => reflect(
            bridge,
            ListApi::into_ref(items.as_ref().clone()),
            VariantKind::List,
        ),
        Variant::Map(entries) => reflect(
            bridge,
            MapApi::into_ref(entries.as_ref().clone()),
            VariantKind::Map,
        ),
    }
}

/// Convert a variant for an argument slot: dropped values cross as void.
pub fn to_host_or_void(bridge: &Arc<HostBridge>, value: &Variant) -> BridgeResult<HostValue> {
    Ok(to_host(bridge, value)?.unwrap_or(HostValue::Void))
}

/// Convert an argument list. The caller owns every object reference in
/// the result and releases each value after the host call returns.
pub fn to_host_list(bridge: &Arc<HostBridge>, args: &[Variant]) -> BridgeResult<Vec<HostValue>> {
    args.iter().map(|v| to_host_or_void(bridge, v)).collect()
}

/// Release the references owned by a marshalled argument list.
pub fn release_list(bridge: &Arc<HostBridge>, args: &[HostValue]) {
    for value in args {
        bridge.release_value(value);
    }
}

/// Turn a scriptable object into a host handle.
///
/// A proxy hands back the foreign handle it wraps (retained for the
/// receiver); a plugin-local object goes through the host's reflection
/// entry. When the host cannot reflect, the instance's marshalling-miss
/// policy decides between dropping and failing.
fn reflect(
    bridge: &Arc<HostBridge>,
    api: ApiRef,
    kind: VariantKind,
) -> BridgeResult<Option<HostValue>> {
    if let Some(raw) = api.foreign_id() {
        let handle = HostHandle(raw);
        bridge.retain_object(handle);
        return Ok(Some(HostValue::Object(handle)));
    }
    match bridge.wrap_scriptable(api) {
        Ok(handle) => Ok(Some(HostValue::Object(handle))),
        Err(_) => match bridge.config().marshal_policy {
            MarshalPolicy::DropSilently => {
                tracing::warn!(target: "gangway_host", %kind, "dropped value with no host representation");
                Ok(None)
            }
            MarshalPolicy::Error => Err(BridgeError::MarshalMiss { kind }),
        },
    }
}
