//! Active-instance bookkeeping.
//!
//! The registry replaces the traditional mutable global instance counter
//! with an owned object: the embedder's plugin manager holds one registry
//! per loaded plugin, instances hold RAII tickets, and the factory's
//! global init/deinit hooks run on the first-up and last-down edges.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::factory::PluginFactory;

/// Shared registry of a plugin's live instances.
pub struct InstanceRegistry {
    factory: Arc<dyn PluginFactory>,
    active: AtomicUsize,
}

impl InstanceRegistry {
    /// A registry for plugins built by `factory`.
    pub fn new(factory: Arc<dyn PluginFactory>) -> Arc<Self> {
        Arc::new(Self {
            factory,
            active: AtomicUsize::new(0),
        })
    }

    /// The plugin factory behind this registry.
    pub fn factory(&self) -> &Arc<dyn PluginFactory> {
        &self.factory
    }

    /// Number of live instances.
    pub fn active_count(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    /// Count an instance in; the first acquisition runs the factory's
    /// global init hook.
    pub fn acquire(self: &Arc<Self>) -> InstanceTicket {
        if self.active.fetch_add(1, Ordering::AcqRel) == 0 {
            tracing::debug!(target: "gangway", "first plugin instance up");
            self.factory.global_init();
        }
        InstanceTicket {
            registry: self.clone(),
        }
    }
}

/// RAII ticket counting one live instance.
pub struct InstanceTicket {
    registry: Arc<InstanceRegistry>,
}

impl Drop for InstanceTicket {
    fn drop(&mut self) {
        if self.registry.active.fetch_sub(1, Ordering::AcqRel) == 1 {
            tracing::debug!(target: "gangway", "last plugin instance down");
            self.registry.factory.global_deinit();
        }
    }
}
