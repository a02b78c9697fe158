//! Scriptable wrappers for list and map payloads.
//!
//! When a `List` or `Map` variant crosses to the host, the host sees a
//! scriptable object: [`ListApi`] exposes indexed members plus `length`,
//! [`MapApi`] exposes named members. Both satisfy the full contract, so
//! the marshaller can hand them to the host's object-reflection entry
//! like any other plugin object.

use std::sync::{Arc, Mutex};

use crate::api::{ApiRef, ApiState, ScriptApi};
use crate::error::{BridgeError, BridgeResult};
use crate::variant::{Variant, VariantList, VariantMap};

/// Array-style scriptable view over a [`VariantList`].
pub struct ListApi {
    state: ApiState,
    items: Mutex<VariantList>,
}

impl ListApi {
    /// Wrap a list payload.
    pub fn new(items: VariantList) -> Self {
        Self {
            state: ApiState::default(),
            items: Mutex::new(items),
        }
    }

    /// Wrap a list payload into a shared reference.
    pub fn into_ref(items: VariantList) -> ApiRef {
        Arc::new(Self::new(items))
    }

    /// Current element count.
    pub fn len(&self) -> usize {
        self.items.lock().unwrap().len()
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.items.lock().unwrap().is_empty()
    }
}

impl ScriptApi for ListApi {
    fn state(&self) -> &ApiState {
        &self.state
    }

    fn member_names(&self) -> Vec<String> {
        let mut names: Vec<String> = (0..self.len()).map(|i| i.to_string()).collect();
        names.push("length".to_string());
        names
    }

    fn has_method(&self, _name: &str) -> bool {
        false
    }

    fn has_property(&self, name: &str) -> bool {
        name == "length"
            || name
                .parse::<usize>()
                .is_ok_and(|idx| idx < self.len())
    }

    fn has_property_index(&self, idx: usize) -> bool {
        idx < self.len()
    }

    fn get_property(&self, name: &str) -> BridgeResult<Variant> {
        self.state.ensure_valid()?;
        if name == "length" {
            return Ok(Variant::from(self.len() as i64));
        }
        match name.parse::<usize>() {
            Ok(idx) => self.get_index(idx),
            Err(_) => Err(BridgeError::unknown_member(name)),
        }
    }

    fn set_property(&self, name: &str, value: Variant) -> BridgeResult<()> {
        self.state.ensure_valid()?;
        match name.parse::<usize>() {
            Ok(idx) => self.set_index(idx, value),
            Err(_) => Err(BridgeError::unknown_member(name)),
        }
    }

    fn get_index(&self, idx: usize) -> BridgeResult<Variant> {
        self.state.ensure_valid()?;
        self.items
            .lock()
            .unwrap()
            .get(idx)
            .cloned()
            .ok_or_else(|| BridgeError::unknown_member(idx.to_string()))
    }

    fn set_index(&self, idx: usize, value: Variant) -> BridgeResult<()> {
        self.state.ensure_valid()?;
        let mut items = self.items.lock().unwrap();
        match items.get_mut(idx) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(BridgeError::unknown_member(idx.to_string())),
        }
    }

    fn invoke(&self, method: &str, _args: &VariantList) -> BridgeResult<Variant> {
        self.state.ensure_valid()?;
        Err(BridgeError::unknown_member(method))
    }
}

/// Named-member scriptable view over a [`VariantMap`].
pub struct MapApi {
    state: ApiState,
    entries: Mutex<VariantMap>,
}

impl MapApi {
    /// Wrap a map payload.
    pub fn new(entries: VariantMap) -> Self {
        Self {
            state: ApiState::default(),
            entries: Mutex::new(entries),
        }
    }

    /// Wrap a map payload into a shared reference.
    pub fn into_ref(entries: VariantMap) -> ApiRef {
        Arc::new(Self::new(entries))
    }
}

impl ScriptApi for MapApi {
    fn state(&self) -> &ApiState {
        &self.state
    }

    fn member_names(&self) -> Vec<String> {
        self.entries.lock().unwrap().keys().cloned().collect()
    }

    fn has_method(&self, _name: &str) -> bool {
        false
    }

    fn has_property(&self, name: &str) -> bool {
        self.entries.lock().unwrap().contains_key(name)
    }

    fn get_property(&self, name: &str) -> BridgeResult<Variant> {
        self.state.ensure_valid()?;
        self.entries
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| BridgeError::unknown_member(name))
    }

    fn set_property(&self, name: &str, value: Variant) -> BridgeResult<()> {
        self.state.ensure_valid()?;
        self.entries.lock().unwrap().insert(name.to_string(), value);
        Ok(())
    }

    fn remove_property(&self, name: &str) -> BridgeResult<()> {
        self.state.ensure_valid()?;
        self.entries
            .lock()
            .unwrap()
            .shift_remove(name)
            .map(|_| ())
            .ok_or_else(|| BridgeError::unknown_member(name))
    }

    fn invoke(&self, method: &str, _args: &VariantList) -> BridgeResult<Variant> {
        self.state.ensure_valid()?;
        Err(BridgeError::unknown_member(method))
    }
}
