//! Gangway: a host-neutral scripting bridge for browser plugin hosts.
//!
//! A single plugin implementation, written against the [`ScriptApi`]
//! contract, runs inside any plugin host whose native ABI is adapted
//! into a [`HostFunctions`] table. The crates divide along the boundary:
//!
//! - `gangway-api` — the scripting core: [`Variant`] values, the
//!   [`ScriptApi`] contract, [`AutoApi`] objects, events and zones.
//! - `gangway-host` — the host side: the [`HostBridge`] façade, the
//!   value marshaller, host-object proxies, streams, and [`MemHost`]
//!   for in-process testing.
//! - this crate — the plugin-core layer tying them together: plugin
//!   [`PluginFactory`] + [`PluginInstance`] lifecycle, active-instance
//!   bookkeeping and logging bootstrap.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use gangway::{
//!     AutoApi, ApiRef, HostBridge, InstanceRegistry, MemHost, PluginFactory, PluginInfo,
//!     PluginInstance, ScriptApi, Variant,
//! };
//!
//! struct Example;
//!
//! impl PluginFactory for Example {
//!     fn info(&self) -> PluginInfo {
//!         PluginInfo::new("example", "an example plugin", "1.0.0")
//!     }
//!
//!     fn create_root_api(&self, _bridge: &Arc<HostBridge>) -> ApiRef {
//!         let api = Arc::new(AutoApi::new());
//!         api.register_method("sum", |args| {
//!             let a: i64 = args[0].convert_cast()?;
//!             let b: i64 = args[1].convert_cast()?;
//!             Ok(Variant::from(a + b))
//!         });
//!         api
//!     }
//! }
//!
//! let host = MemHost::new();
//! let registry = InstanceRegistry::new(Arc::new(Example));
//! let bridge = HostBridge::new(Default::default());
//! bridge.attach(host.table()).unwrap();
//!
//! let instance = PluginInstance::new(&registry, bridge);
//! let root = instance.root_api();
//! let five = root.invoke("sum", &vec![Variant::from(2i64), Variant::from(3i64)]);
//! assert_eq!(five.unwrap(), Variant::from(5i64));
//! instance.shutdown();
//! ```

mod factory;
mod info;
mod instance;
mod logging;
mod registry;

pub use factory::PluginFactory;
pub use info::{MimeEntry, PluginInfo};
pub use instance::PluginInstance;
pub use logging::{init_logging, init_logging_for};
pub use registry::{InstanceRegistry, InstanceTicket};

pub use gangway_api::{
    ApiRef, ApiState, ApiWeak, AutoApi, BridgeConfig, BridgeError, BridgeResult, EventRegistry,
    ListApi, MapApi, MarshalPolicy, ScopedZone, ScriptApi, SecurityZone, Variant, VariantKind,
    VariantList, VariantMap, same_api,
};
pub use gangway_host::{
    BrowserStream, HostBridge, HostFunctions, HostHandle, HostObjectApi, HostValue, MemHost,
    StreamObserver, call_on_main, marshal,
};
