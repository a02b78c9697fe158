//! The scriptable-object contract.
//!
//! [`ScriptApi`] is the capability set every entity exposed to page script
//! implements: named and indexed properties, method invocation, event
//! registration, security zones and invalidation. Plugin objects implement
//! it directly (usually through [`AutoApi`]); foreign host objects are
//! wrapped in a proxy that forwards each operation across the bridge.
//!
//! Cross-cutting behavior (events, zones, validity, weak proxies) is not
//! inherited but composed: implementors embed an [`ApiState`] and expose it
//! via [`ScriptApi::state`], which powers the default method bodies.
//!
//! [`AutoApi`]: crate::auto::AutoApi

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

use crate::error::{BridgeError, BridgeResult};
use crate::events::EventRegistry;
use crate::variant::{Variant, VariantList, VariantMap};
use crate::zone::{SecurityZone, ZoneStack};

/// Shared handle to a scriptable object.
pub type ApiRef = Arc<dyn ScriptApi>;

/// Non-owning handle to a scriptable object; never extends its lifetime.
pub type ApiWeak = Weak<dyn ScriptApi>;

/// Identity comparison for scriptable objects.
///
/// Two distinct proxies wrapping the same foreign handle compare equal;
/// everything else compares by reference identity.
pub fn same_api(a: &ApiRef, b: &ApiRef) -> bool {
    match (a.foreign_id(), b.foreign_id()) {
        (Some(x), Some(y)) => x == y,
        _ => std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b)),
    }
}

/// Composed per-object state backing the [`ScriptApi`] default methods.
pub struct ApiState {
    valid: AtomicBool,
    events: EventRegistry,
    zones: ZoneStack,
    proxies: Mutex<Vec<ApiWeak>>,
}

impl ApiState {
    /// State resting in the given default security zone.
    pub fn new(default_zone: SecurityZone) -> Self {
        Self {
            valid: AtomicBool::new(true),
            events: EventRegistry::default(),
            zones: ZoneStack::new(default_zone),
            proxies: Mutex::new(Vec::new()),
        }
    }

    /// The object's event registry.
    pub fn events(&self) -> &EventRegistry {
        &self.events
    }

    /// The object's zone stack.
    pub fn zones(&self) -> &ZoneStack {
        &self.zones
    }

    /// Whether the object is still script-accessible.
    pub fn is_valid(&self) -> bool {
        self.valid.load(Ordering::Acquire)
    }

    /// Fail with [`BridgeError::Invalidated`] once the object is severed.
    pub fn ensure_valid(&self) -> BridgeResult<()> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(BridgeError::Invalidated)
        }
    }

    /// Mark the object invalid. One-way.
    pub fn invalidate(&self) {
        self.valid.store(false, Ordering::Release);
    }

    fn add_proxy(&self, proxy: ApiWeak) {
        self.proxies.lock().unwrap().push(proxy);
    }

    fn remove_proxy(&self, proxy: &ApiRef) {
        self.proxies.lock().unwrap().retain(|p| {
            p.upgrade()
                .map(|alive| !same_api(&alive, proxy))
                .unwrap_or(false)
        });
    }

    fn live_proxies(&self) -> Vec<ApiRef> {
        self.proxies
            .lock()
            .unwrap()
            .iter()
            .filter_map(Weak::upgrade)
            .collect()
    }
}

impl Default for ApiState {
    fn default() -> Self {
        Self::new(SecurityZone::Public)
    }
}

/// The capability set exposed to page script.
///
/// Member-access methods (`get_property`, `invoke`, ...) are implemented by
/// concrete objects and must fail with [`BridgeError::Invalidated`] after
/// [`ScriptApi::invalidate`] — distinct from unknown-member. Event, zone
/// and validity operations have default bodies over [`ApiState`].
pub trait ScriptApi: Send + Sync {
    /// The composed cross-cutting state for this object.
    fn state(&self) -> &ApiState;

    /// Names of the members visible under the active zone.
    fn member_names(&self) -> Vec<String>;

    /// Count of visible members.
    fn member_count(&self) -> usize {
        self.member_names().len()
    }

    /// Whether a method with this name exists.
    fn has_method(&self, name: &str) -> bool;

    /// Whether a property with this name exists.
    fn has_property(&self, name: &str) -> bool;

    /// Whether an indexed (array-style) property exists at `idx`.
    fn has_property_index(&self, _idx: usize) -> bool {
        false
    }

    /// Get a named property value.
    fn get_property(&self, name: &str) -> BridgeResult<Variant>;

    /// Set a named property value.
    fn set_property(&self, name: &str, value: Variant) -> BridgeResult<()>;

    /// Remove a named property, where the object supports removal.
    fn remove_property(&self, _name: &str) -> BridgeResult<()> {
        Err(BridgeError::unsupported("removeProperty"))
    }

    /// Get an indexed property value.
    fn get_index(&self, idx: usize) -> BridgeResult<Variant> {
        Err(BridgeError::unknown_member(idx.to_string()))
    }

    /// Set an indexed property value.
    fn set_index(&self, idx: usize, _value: Variant) -> BridgeResult<()> {
        Err(BridgeError::unknown_member(idx.to_string()))
    }

    /// Invoke a method by name. The empty name invokes the object's
    /// default method, when it has one.
    fn invoke(&self, method: &str, args: &VariantList) -> BridgeResult<Variant>;

    /// Fire-and-forget invocation.
    ///
    /// The default body invokes synchronously and discards the result,
    /// which is correct for plugin-local objects. Proxies for host-owned
    /// objects override this to route the call through the bridge's
    /// async-schedule primitive, so callers may be on any thread.
    fn invoke_async(&self, method: &str, args: &VariantList) -> BridgeResult<()> {
        self.invoke(method, args).map(|_| ())
    }

    /// Invoke the object as a constructor, where supported.
    fn construct(&self, _args: &VariantList) -> BridgeResult<Variant> {
        Err(BridgeError::unsupported("construct"))
    }

    /// Identity of the wrapped foreign handle, for proxy objects.
    fn foreign_id(&self) -> Option<u64> {
        None
    }

    // ==================== Events ====================

    /// Register an event name (must start with `"on"`); idempotent.
    fn register_event(&self, name: &str) -> BridgeResult<()> {
        self.state().ensure_valid()?;
        self.state().events().register(name)
    }

    /// Whether the event name has been registered.
    fn has_event(&self, name: &str) -> bool {
        self.state().events().is_registered(name)
    }

    /// Attach a listener object to a registered event.
    fn attach_event_listener(&self, name: &str, listener: ApiRef) -> BridgeResult<()> {
        self.state().ensure_valid()?;
        self.state().events().attach(name, listener)
    }

    /// Detach a previously attached listener.
    fn detach_event_listener(&self, name: &str, listener: &ApiRef) -> BridgeResult<()> {
        self.state().ensure_valid()?;
        self.state().events().detach(name, listener)
    }

    /// Set or clear the property-style default handler
    /// (`plugin.onload = fn`).
    fn set_default_listener(&self, name: &str, handler: Option<ApiRef>) -> BridgeResult<()> {
        self.state().ensure_valid()?;
        self.state().events().set_default(name, handler)
    }

    /// The property-style default handler, if any.
    fn default_listener(&self, name: &str) -> BridgeResult<Option<ApiRef>> {
        self.state().ensure_valid()?;
        self.state().events().default_handler(name)
    }

    /// Attach a whole-object event interface, invoked as
    /// `interface.eventName(args)` when events fire.
    fn register_event_interface(&self, iface: ApiRef) -> BridgeResult<()> {
        self.state().ensure_valid()?;
        self.state().events().add_interface(iface);
        Ok(())
    }

    /// Detach a previously attached event interface.
    fn unregister_event_interface(&self, iface: &ApiRef) -> BridgeResult<()> {
        self.state().ensure_valid()?;
        self.state().events().remove_interface(iface);
        Ok(())
    }

    /// Fire a registered event to every attached handler.
    ///
    /// The handler sets are snapshotted at this call; attach/detach during
    /// dispatch does not affect the in-flight fire. Dispatch goes through
    /// each handler's `invoke_async`, so any thread may fire.
    fn fire_event(&self, name: &str, args: &VariantList) -> BridgeResult<()> {
        self.state().ensure_valid()?;
        let snapshot = self.state().events().snapshot(name)?;
        snapshot.dispatch(args);
        Ok(())
    }

    /// Fire an event carrying a DOM-style event object built from
    /// `members` (with `type` set to the event name) ahead of `args`.
    fn fire_json_event(
        &self,
        name: &str,
        members: VariantMap,
        args: &VariantList,
    ) -> BridgeResult<()> {
        self.state().ensure_valid()?;
        let snapshot = self.state().events().snapshot(name)?;
        let mut event = members;
        event.insert("type".to_string(), Variant::from(name));
        let mut full_args: VariantList = vec![Variant::from(event)];
        full_args.extend(args.iter().cloned());
        snapshot.dispatch(&full_args);
        Ok(())
    }

    // ==================== Security zones ====================

    /// Push a zone; prefer [`ScopedZone`](crate::zone::ScopedZone).
    fn push_zone(&self, zone: SecurityZone) {
        self.state().zones().push(zone);
    }

    /// Pop the most recent zone push.
    fn pop_zone(&self) {
        self.state().zones().pop();
    }

    /// The active zone.
    fn current_zone(&self) -> SecurityZone {
        self.state().zones().current()
    }

    /// The resting zone before any push.
    fn default_zone(&self) -> SecurityZone {
        self.state().zones().default_zone()
    }

    /// Change the resting zone.
    fn set_default_zone(&self, zone: SecurityZone) {
        self.state().zones().set_default_zone(zone);
    }

    // ==================== Lifetime ====================

    /// Sever script access permanently.
    ///
    /// Registered weak proxies are invalidated too; reference counts are
    /// unaffected and the object is destroyed only when the last owner
    /// releases it.
    fn invalidate(&self) {
        self.state().invalidate();
        for proxy in self.state().live_proxies() {
            if proxy.is_valid() {
                proxy.invalidate();
            }
        }
    }

    /// Whether the object is still script-accessible.
    fn is_valid(&self) -> bool {
        self.state().is_valid()
    }

    /// Register a weak reference to a dependent object (e.g. a proxy),
    /// invalidated alongside this one. Never extends its lifetime.
    fn register_proxy(&self, proxy: ApiWeak) {
        self.state().add_proxy(proxy);
    }

    /// Drop a previously registered weak proxy reference.
    fn unregister_proxy(&self, proxy: &ApiRef) {
        self.state().remove_proxy(proxy);
    }
}
