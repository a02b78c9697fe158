//! The hook plugin authors implement to plug into the bridge.

use std::sync::Arc;

use gangway_api::ApiRef;
use gangway_host::HostBridge;

use crate::info::PluginInfo;

/// Factory supplied by the plugin author.
///
/// One factory serves every instance of the plugin in the process. It
/// names the plugin, builds the root scriptable object each `<object>`
/// element exposes to the page, and gets the first-instance /
/// last-instance lifecycle callbacks.
pub trait PluginFactory: Send + Sync {
    /// Identity shown to registration tooling and host UIs.
    fn info(&self) -> PluginInfo;

    /// Build the root scriptable object for one plugin instance.
    fn create_root_api(&self, bridge: &Arc<HostBridge>) -> ApiRef;

    /// Called when the first instance in the process comes up.
    fn global_init(&self) {}

    /// Called when the last instance in the process goes away.
    fn global_deinit(&self) {}

    /// Log filter directive for [`init_logging`](crate::init_logging).
    fn log_filter(&self) -> &str {
        "info"
    }
}
