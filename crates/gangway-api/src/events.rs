//! Per-object event bookkeeping and fire-on-snapshot dispatch.
//!
//! Each scriptable object tracks, per registered event name, the attached
//! listener objects (all invoked, in attach order), at most one "default"
//! handler reachable as a property (`plugin.onload = fn`), and object-wide
//! interface listeners invoked as `interface.eventName(args)`.

use std::sync::Mutex;

use indexmap::IndexMap;

use crate::api::{ApiRef, ScriptApi, same_api};
use crate::error::{BridgeError, BridgeResult};
use crate::variant::VariantList;

/// Reserved prefix every registered event name must carry.
pub const EVENT_PREFIX: &str = "on";

#[derive(Default)]
struct EventSlot {
    listeners: Vec<ApiRef>,
    default_handler: Option<ApiRef>,
}

#[derive(Default)]
struct RegistryInner {
    slots: IndexMap<String, EventSlot>,
    interfaces: Vec<ApiRef>,
}

/// Registered events and their handlers for one scriptable object.
#[derive(Default)]
pub struct EventRegistry {
    inner: Mutex<RegistryInner>,
}

impl EventRegistry {
    /// Register an event name so listeners can be attached from script.
    ///
    /// Names without the `"on"` prefix are rejected; registering an
    /// already-registered name is idempotent.
    pub fn register(&self, name: &str) -> BridgeResult<()> {
        if !name.starts_with(EVENT_PREFIX) {
            return Err(BridgeError::BadEventName { name: name.into() });
        }
        self.inner
            .lock()
            .unwrap()
            .slots
            .entry(name.to_string())
            .or_default();
        Ok(())
    }

    /// Whether `name` has been registered.
    pub fn is_registered(&self, name: &str) -> bool {
        self.inner.lock().unwrap().slots.contains_key(name)
    }

    /// Registered event names, in registration order.
    pub fn names(&self) -> Vec<String> {
        self.inner.lock().unwrap().slots.keys().cloned().collect()
    }

    /// Attach a listener object to a registered event.
    pub fn attach(&self, name: &str, listener: ApiRef) -> BridgeResult<()> {
        let mut inner = self.inner.lock().unwrap();
        let slot = inner
            .slots
            .get_mut(name)
            .ok_or_else(|| BridgeError::UnknownEvent { name: name.into() })?;
        slot.listeners.push(listener);
        Ok(())
    }

    /// Detach a previously attached listener. Detaching an unknown
    /// listener is a no-op.
    pub fn detach(&self, name: &str, listener: &ApiRef) -> BridgeResult<()> {
        let mut inner = self.inner.lock().unwrap();
        let slot = inner
            .slots
            .get_mut(name)
            .ok_or_else(|| BridgeError::UnknownEvent { name: name.into() })?;
        slot.listeners.retain(|l| !same_api(l, listener));
        Ok(())
    }

    /// Set or clear the property-style default handler for an event.
    pub fn set_default(&self, name: &str, handler: Option<ApiRef>) -> BridgeResult<()> {
        let mut inner = self.inner.lock().unwrap();
        let slot = inner
            .slots
            .get_mut(name)
            .ok_or_else(|| BridgeError::UnknownEvent { name: name.into() })?;
        slot.default_handler = handler;
        Ok(())
    }

    /// The property-style default handler for an event, if set.
    pub fn default_handler(&self, name: &str) -> BridgeResult<Option<ApiRef>> {
        let inner = self.inner.lock().unwrap();
        inner
            .slots
            .get(name)
            .map(|s| s.default_handler.clone())
            .ok_or_else(|| BridgeError::UnknownEvent { name: name.into() })
    }

    /// Attach a whole-object event interface, invoked as
    /// `interface.eventName(args)` for every fired event.
    pub fn add_interface(&self, iface: ApiRef) {
        self.inner.lock().unwrap().interfaces.push(iface);
    }

    /// Detach a previously attached event interface.
    pub fn remove_interface(&self, iface: &ApiRef) {
        self.inner
            .lock()
            .unwrap()
            .interfaces
            .retain(|i| !same_api(i, iface));
    }

    /// Capture the handler sets for `name` at this moment.
    ///
    /// Listeners attached or detached after the snapshot do not affect an
    /// in-flight dispatch.
    pub fn snapshot(&self, name: &str) -> BridgeResult<EventSnapshot> {
        let inner = self.inner.lock().unwrap();
        let slot = inner
            .slots
            .get(name)
            .ok_or_else(|| BridgeError::UnknownEvent { name: name.into() })?;
        Ok(EventSnapshot {
            name: name.to_string(),
            listeners: slot.listeners.clone(),
            default_handler: slot.default_handler.clone(),
            interfaces: inner.interfaces.clone(),
        })
    }
}

/// The handler sets for one event, captured at fire time.
pub struct EventSnapshot {
    /// Event name, including the `"on"` prefix.
    pub name: String,

    /// Attached listeners, in attach order.
    pub listeners: Vec<ApiRef>,

    /// Property-style default handler, if set.
    pub default_handler: Option<ApiRef>,

    /// Object-wide event interfaces.
    pub interfaces: Vec<ApiRef>,
}

impl EventSnapshot {
    /// Invoke every captured handler with `args`, in order: listeners,
    /// then the default handler, then interface-style invocations.
    ///
    /// Dispatch is fire-and-forget through each target's `invoke_async`;
    /// a failing handler is logged and never aborts the remainder.
    pub fn dispatch(&self, args: &VariantList) {
        for listener in &self.listeners {
            if let Err(e) = listener.invoke_async("", args) {
                tracing::warn!(target: "gangway_events", event = %self.name, "listener failed: {e}");
            }
        }
        if let Some(handler) = &self.default_handler {
            if let Err(e) = handler.invoke_async("", args) {
                tracing::warn!(target: "gangway_events", event = %self.name, "default handler failed: {e}");
            }
        }
        for iface in &self.interfaces {
            if let Err(e) = iface.invoke_async(&self.name, args) {
                tracing::warn!(target: "gangway_events", event = %self.name, "event interface failed: {e}");
            }
        }
    }
}
