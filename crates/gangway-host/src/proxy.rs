//! Proxy exposing a host-owned object through the scripting contract.
//!
//! A [`HostObjectApi`] wraps a foreign object handle (DOM window,
//! document, a page function...) and forwards every contract operation
//! through the bridge's native dispatch, marshalling arguments and
//! results at each crossing. It keeps only a weak back-reference to the
//! bridge, so it can never keep a torn-down instance alive; calls after
//! teardown fail with the shutdown error.

use std::sync::{Arc, Weak};

use gangway_api::{ApiRef, ApiState, BridgeError, BridgeResult, ScriptApi, Variant, VariantList};

use crate::bridge::HostBridge;
use crate::marshal::{from_host_owned, release_list, to_host_list, to_host_or_void};
use crate::value::{HostHandle, HostObjectRef};

/// Scriptable proxy around a retained host object handle.
pub struct HostObjectApi {
    state: ApiState,
    bridge: Weak<HostBridge>,
    object: HostObjectRef,
}

impl HostObjectApi {
    /// Wrap a handle we already own (returned from a host call).
    pub fn from_owned(bridge: &Arc<HostBridge>, handle: HostHandle) -> ApiRef {
        Arc::new(Self {
            state: ApiState::new(bridge.config().default_zone),
            bridge: Arc::downgrade(bridge),
            object: HostObjectRef::adopt(bridge, handle),
        })
    }

    /// Wrap a borrowed handle (passed in as an argument), retaining it.
    pub fn from_borrowed(bridge: &Arc<HostBridge>, handle: HostHandle) -> ApiRef {
        Arc::new(Self {
            state: ApiState::new(bridge.config().default_zone),
            bridge: Arc::downgrade(bridge),
            object: HostObjectRef::retain(bridge, handle),
        })
    }

    /// The wrapped handle. No ownership transfer.
    pub fn handle(&self) -> HostHandle {
        self.object.handle()
    }

    fn bridge(&self) -> BridgeResult<Arc<HostBridge>> {
        self.bridge.upgrade().ok_or(BridgeError::ShutDown)
    }
}

impl ScriptApi for HostObjectApi {
    fn state(&self) -> &ApiState {
        &self.state
    }

    fn foreign_id(&self) -> Option<u64> {
        Some(self.object.raw())
    }

    fn member_names(&self) -> Vec<String> {
        self.bridge()
            .and_then(|bridge| bridge.enumerate(self.handle()))
            .unwrap_or_default()
    }

    fn has_method(&self, name: &str) -> bool {
        self.bridge()
            .map(|bridge| bridge.has_method(self.handle(), name))
            .unwrap_or(false)
    }

    fn has_property(&self, name: &str) -> bool {
        self.bridge()
            .map(|bridge| bridge.has_property(self.handle(), name))
            .unwrap_or(false)
    }

    fn has_property_index(&self, idx: usize) -> bool {
        let Ok(idx) = i32::try_from(idx) else {
            return false;
        };
        self.bridge()
            .map(|bridge| bridge.has_property_at(self.handle(), idx))
            .unwrap_or(false)
    }

    fn get_property(&self, name: &str) -> BridgeResult<Variant> {
        self.state.ensure_valid()?;
        let bridge = self.bridge()?;
        let value = bridge.get_property(self.handle(), name)?;
        Ok(from_host_owned(&bridge, value))
    }

    fn set_property(&self, name: &str, value: Variant) -> BridgeResult<()> {
        self.state.ensure_valid()?;
        let bridge = self.bridge()?;
        let native = to_host_or_void(&bridge, &value)?;
        let result = bridge.set_property(self.handle(), name, &native);
        bridge.release_value(&native);
        result
    }

    fn remove_property(&self, name: &str) -> BridgeResult<()> {
        self.state.ensure_valid()?;
        self.bridge()?.remove_property(self.handle(), name)
    }

    fn get_index(&self, idx: usize) -> BridgeResult<Variant> {
        self.state.ensure_valid()?;
        let bridge = self.bridge()?;
        let idx = i32::try_from(idx)
            .map_err(|_| BridgeError::unknown_member(idx.to_string()))?;
        let value = bridge.get_property_at(self.handle(), idx)?;
        Ok(from_host_owned(&bridge, value))
    }

    fn set_index(&self, idx: usize, value: Variant) -> BridgeResult<()> {
        self.state.ensure_valid()?;
        let bridge = self.bridge()?;
        let idx = i32::try_from(idx)
            .map_err(|_| BridgeError::unknown_member(idx.to_string()))?;
        let native = to_host_or_void(&bridge, &value)?;
        let result = bridge.set_property_at(self.handle(), idx, &native);
        bridge.release_value(&native);
        result
    }

    /// Forwarded invocation. An unknown method comes back as the host's
    /// native failure signal, surfaced as a call error — never a crash.
    fn invoke(&self, method: &str, args: &VariantList) -> BridgeResult<Variant> {
        self.state.ensure_valid()?;
        let bridge = self.bridge()?;
        let native_args = to_host_list(&bridge, args)?;
        let result = if method.is_empty() {
            bridge.invoke_default(self.handle(), &native_args)
        } else {
            bridge.invoke(self.handle(), method, &native_args)
        };
        release_list(&bridge, &native_args);
        result.map(|value| from_host_owned(&bridge, value))
    }

    /// Fire-and-forget invocation, routed through the host's async-call
    /// primitive so the caller may be on any thread.
    fn invoke_async(&self, method: &str, args: &VariantList) -> BridgeResult<()> {
        self.state.ensure_valid()?;
        let bridge = self.bridge()?;
        let weak = self.bridge.clone();
        let object = self.object.clone();
        let method = method.to_string();
        let args = args.clone();
        let scheduled = bridge.schedule_async(Box::new(move || {
            let Some(bridge) = weak.upgrade() else {
                return;
            };
            let native_args = match to_host_list(&bridge, &args) {
                Ok(list) => list,
                Err(e) => {
                    tracing::warn!(target: "gangway_host", "async invoke dropped: {e}");
                    return;
                }
            };
            let result = if method.is_empty() {
                bridge.invoke_default(object.handle(), &native_args)
            } else {
                bridge.invoke(object.handle(), &method, &native_args)
            };
            release_list(&bridge, &native_args);
            match result {
                // Fire-and-forget: the result is released, not returned.
                Ok(value) => bridge.release_value(&value),
                Err(e) => {
                    tracing::warn!(target: "gangway_host", "async invoke failed: {e}");
                }
            }
        }));
        if scheduled {
            Ok(())
        } else {
            Err(BridgeError::ShutDown)
        }
    }

    fn construct(&self, args: &VariantList) -> BridgeResult<Variant> {
        self.state.ensure_valid()?;
        let bridge = self.bridge()?;
        let native_args = to_host_list(&bridge, args)?;
        let result = bridge.construct(self.handle(), &native_args);
        release_list(&bridge, &native_args);
        result.map(|value| from_host_owned(&bridge, value))
    }
}

impl std::fmt::Debug for HostObjectApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostObjectApi")
            .field("handle", &self.object.raw())
            .field("valid", &self.state.is_valid())
            .finish()
    }
}
