//! One live plugin instance.

use std::sync::{Arc, Mutex};

use gangway_api::{ApiRef, ScriptApi, Variant};
use gangway_host::HostBridge;
use indexmap::IndexMap;

use crate::factory::PluginFactory;
use crate::registry::{InstanceRegistry, InstanceTicket};

/// A plugin instance: one `<object>` element in one page.
///
/// Owns the bridge to its host, the `<object>`-tag parameters, and the
/// lazily created root scriptable object. Created and shut down on the
/// host's main thread.
pub struct PluginInstance {
    bridge: Arc<HostBridge>,
    factory: Arc<dyn PluginFactory>,
    params: Mutex<IndexMap<String, Variant>>,
    root: Mutex<Option<ApiRef>>,
    _ticket: InstanceTicket,
}

impl PluginInstance {
    /// Register a new instance with its registry and bridge.
    pub fn new(registry: &Arc<InstanceRegistry>, bridge: Arc<HostBridge>) -> Self {
        Self {
            factory: registry.factory().clone(),
            _ticket: registry.acquire(),
            bridge,
            params: Mutex::new(IndexMap::new()),
            root: Mutex::new(None),
        }
    }

    /// The bridge to this instance's host.
    pub fn bridge(&self) -> &Arc<HostBridge> {
        &self.bridge
    }

    /// Store the parameters parsed from the `<object>` tag.
    pub fn set_params(&self, params: impl IntoIterator<Item = (String, Variant)>) {
        let mut stored = self.params.lock().unwrap();
        stored.clear();
        stored.extend(params);
    }

    /// One `<object>`-tag parameter.
    pub fn param(&self, name: &str) -> Option<Variant> {
        self.params.lock().unwrap().get(name).cloned()
    }

    /// All parameters, in document order.
    pub fn params(&self) -> IndexMap<String, Variant> {
        self.params.lock().unwrap().clone()
    }

    /// The root scriptable object exposed to the page.
    ///
    /// Created on first use; every later call returns the same object.
    pub fn root_api(&self) -> ApiRef {
        let mut root = self.root.lock().unwrap();
        root.get_or_insert_with(|| self.factory.create_root_api(&self.bridge))
            .clone()
    }

    /// Whether the root object has been created yet.
    pub fn has_root_api(&self) -> bool {
        self.root.lock().unwrap().is_some()
    }

    /// Tear the instance down: sever the root object from script, then
    /// shut the bridge. Safe to call more than once.
    pub fn shutdown(&self) {
        if let Some(root) = self.root.lock().unwrap().take() {
            root.invalidate();
        }
        if !self.bridge.is_shut_down() {
            self.bridge.shutdown();
        }
    }
}
