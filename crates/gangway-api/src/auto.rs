//! Closure-backed scriptable object.
//!
//! [`AutoApi`] is the implementation of [`ScriptApi`] most plugins build
//! their object graph from: methods are registered as closures, properties
//! as getter/setter pairs, and plain attributes as stored variants. Each
//! member is stamped with the security zone active at registration and is
//! only visible to callers at or above that zone.

use std::sync::{Arc, Mutex};

use indexmap::IndexMap;

use crate::api::{ApiState, ScriptApi};
use crate::error::{BridgeError, BridgeResult};
use crate::variant::{Variant, VariantList};
use crate::zone::SecurityZone;

/// A method body: receives the marshalled argument list.
pub type MethodFn = Arc<dyn Fn(&VariantList) -> BridgeResult<Variant> + Send + Sync>;

/// A property read hook.
pub type GetterFn = Arc<dyn Fn() -> BridgeResult<Variant> + Send + Sync>;

/// A property write hook.
pub type SetterFn = Arc<dyn Fn(Variant) -> BridgeResult<()> + Send + Sync>;

struct MethodEntry {
    zone: SecurityZone,
    func: MethodFn,
}

struct PropertyEntry {
    zone: SecurityZone,
    getter: GetterFn,
    setter: Option<SetterFn>,
}

struct AttributeEntry {
    zone: SecurityZone,
    value: Variant,
    read_only: bool,
}

#[derive(Default)]
struct Members {
    methods: IndexMap<String, MethodEntry>,
    properties: IndexMap<String, PropertyEntry>,
    attributes: IndexMap<String, AttributeEntry>,
}

/// A scriptable object whose members are registered at runtime.
///
/// Script-driven writes to unknown names create dynamic attributes unless
/// disabled with [`AutoApi::disallow_dynamic_attributes`]. Member hooks
/// are invoked with no internal lock held, so a method body may call back
/// into its own object.
pub struct AutoApi {
    state: ApiState,
    members: Mutex<Members>,
    dynamic_attributes: bool,
}

impl AutoApi {
    /// An empty object resting in the public zone.
    pub fn new() -> Self {
        Self::with_zone(SecurityZone::Public)
    }

    /// An empty object resting in the given default zone.
    pub fn with_zone(default_zone: SecurityZone) -> Self {
        Self {
            state: ApiState::new(default_zone),
            members: Mutex::new(Members::default()),
            dynamic_attributes: true,
        }
    }

    /// Reject script-driven writes to unknown member names.
    pub fn disallow_dynamic_attributes(mut self) -> Self {
        self.dynamic_attributes = false;
        self
    }

    /// Register a method under the active zone. The empty name registers
    /// the object's default method.
    pub fn register_method<F>(&self, name: impl Into<String>, func: F)
    where
        F: Fn(&VariantList) -> BridgeResult<Variant> + Send + Sync + 'static,
    {
        let zone = self.current_zone();
        self.members.lock().unwrap().methods.insert(
            name.into(),
            MethodEntry {
                zone,
                func: Arc::new(func),
            },
        );
    }

    /// Register a read-only property under the active zone.
    pub fn register_getter<G>(&self, name: impl Into<String>, getter: G)
    where
        G: Fn() -> BridgeResult<Variant> + Send + Sync + 'static,
    {
        let zone = self.current_zone();
        self.members.lock().unwrap().properties.insert(
            name.into(),
            PropertyEntry {
                zone,
                getter: Arc::new(getter),
                setter: None,
            },
        );
    }

    /// Register a read/write property under the active zone.
    pub fn register_property<G, S>(&self, name: impl Into<String>, getter: G, setter: S)
    where
        G: Fn() -> BridgeResult<Variant> + Send + Sync + 'static,
        S: Fn(Variant) -> BridgeResult<()> + Send + Sync + 'static,
    {
        let zone = self.current_zone();
        self.members.lock().unwrap().properties.insert(
            name.into(),
            PropertyEntry {
                zone,
                getter: Arc::new(getter),
                setter: Some(Arc::new(setter)),
            },
        );
    }

    /// Register a stored attribute under the active zone.
    pub fn register_attribute(
        &self,
        name: impl Into<String>,
        value: impl Into<Variant>,
        read_only: bool,
    ) {
        let zone = self.current_zone();
        self.members.lock().unwrap().attributes.insert(
            name.into(),
            AttributeEntry {
                zone,
                value: value.into(),
                read_only,
            },
        );
    }

    fn visible(&self, member_zone: SecurityZone) -> bool {
        member_zone <= self.current_zone()
    }
}

impl Default for AutoApi {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptApi for AutoApi {
    fn state(&self) -> &ApiState {
        &self.state
    }

    fn member_names(&self) -> Vec<String> {
        let members = self.members.lock().unwrap();
        let mut names: Vec<String> = Vec::new();
        names.extend(
            members
                .methods
                .iter()
                .filter(|(n, e)| !n.is_empty() && self.visible(e.zone))
                .map(|(n, _)| n.clone()),
        );
        names.extend(
            members
                .properties
                .iter()
                .filter(|(_, e)| self.visible(e.zone))
                .map(|(n, _)| n.clone()),
        );
        names.extend(
            members
                .attributes
                .iter()
                .filter(|(_, e)| self.visible(e.zone))
                .map(|(n, _)| n.clone()),
        );
        names.extend(self.state.events().names());
        names
    }

    fn has_method(&self, name: &str) -> bool {
        if name.is_empty() {
            return false;
        }
        self.members
            .lock()
            .unwrap()
            .methods
            .get(name)
            .is_some_and(|e| self.visible(e.zone))
    }

    fn has_property(&self, name: &str) -> bool {
        let members = self.members.lock().unwrap();
        members
            .properties
            .get(name)
            .map(|e| self.visible(e.zone))
            .or_else(|| members.attributes.get(name).map(|e| self.visible(e.zone)))
            .unwrap_or_else(|| self.state.events().is_registered(name))
    }

    fn has_property_index(&self, idx: usize) -> bool {
        self.has_property(&idx.to_string())
    }

    fn get_property(&self, name: &str) -> BridgeResult<Variant> {
        self.state.ensure_valid()?;
        // Hooks run with the member table unlocked so they may re-enter.
        let getter = {
            let members = self.members.lock().unwrap();
            if let Some(entry) = members.properties.get(name) {
                if !self.visible(entry.zone) {
                    return Err(BridgeError::unknown_member(name));
                }
                Some(entry.getter.clone())
            } else if let Some(entry) = members.attributes.get(name) {
                if !self.visible(entry.zone) {
                    return Err(BridgeError::unknown_member(name));
                }
                return Ok(entry.value.clone());
            } else {
                None
            }
        };
        if let Some(getter) = getter {
            return getter();
        }
        // Registered events read back as their default handler.
        if self.state.events().is_registered(name) {
            return Ok(match self.state.events().default_handler(name)? {
                Some(handler) => Variant::Object(handler),
                None => Variant::Null,
            });
        }
        Err(BridgeError::unknown_member(name))
    }

    fn set_property(&self, name: &str, value: Variant) -> BridgeResult<()> {
        self.state.ensure_valid()?;
        let setter = {
            let members = self.members.lock().unwrap();
            match members.properties.get(name) {
                Some(entry) if !self.visible(entry.zone) => {
                    return Err(BridgeError::unknown_member(name));
                }
                Some(entry) => match &entry.setter {
                    Some(setter) => Some(setter.clone()),
                    None => return Err(BridgeError::ReadOnly { name: name.into() }),
                },
                None => None,
            }
        };
        if let Some(setter) = setter {
            return setter(value);
        }
        {
            let mut members = self.members.lock().unwrap();
            if let Some(entry) = members.attributes.get_mut(name) {
                if !self.visible(entry.zone) {
                    return Err(BridgeError::unknown_member(name));
                }
                if entry.read_only {
                    return Err(BridgeError::ReadOnly { name: name.into() });
                }
                entry.value = value;
                return Ok(());
            }
        }
        // `plugin.onfoo = handler` installs the default event handler.
        if self.state.events().is_registered(name) {
            let handler = match value {
                Variant::Object(o) => Some(o),
                Variant::Null | Variant::Void => None,
                other => {
                    return Err(BridgeError::conversion(other.kind(), "event handler"));
                }
            };
            return self.state.events().set_default(name, handler);
        }
        if self.dynamic_attributes {
            self.register_attribute(name, value, false);
            return Ok(());
        }
        Err(BridgeError::unknown_member(name))
    }

    fn remove_property(&self, name: &str) -> BridgeResult<()> {
        self.state.ensure_valid()?;
        let mut members = self.members.lock().unwrap();
        let (visible, read_only) = match members.attributes.get(name) {
            Some(entry) => (self.visible(entry.zone), entry.read_only),
            None => return Err(BridgeError::unknown_member(name)),
        };
        if !visible {
            return Err(BridgeError::unknown_member(name));
        }
        if read_only {
            return Err(BridgeError::ReadOnly { name: name.into() });
        }
        members.attributes.shift_remove(name);
        Ok(())
    }

    fn get_index(&self, idx: usize) -> BridgeResult<Variant> {
        self.get_property(&idx.to_string())
    }

    fn set_index(&self, idx: usize, value: Variant) -> BridgeResult<()> {
        self.set_property(&idx.to_string(), value)
    }

    fn invoke(&self, method: &str, args: &VariantList) -> BridgeResult<Variant> {
        self.state.ensure_valid()?;
        let func = {
            let members = self.members.lock().unwrap();
            match members.methods.get(method) {
                Some(entry) if self.visible(entry.zone) => entry.func.clone(),
                _ => return Err(BridgeError::unknown_member(method)),
            }
        };
        func(args)
    }
}
