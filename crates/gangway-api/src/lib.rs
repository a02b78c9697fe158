//! Host-neutral scripting core for browser plugins.
//!
//! This crate defines the contract between page script and plugin code
//! independent of any concrete browser technology:
//!
//! - [`Variant`] — the dynamic value every boundary crossing uses.
//! - [`ScriptApi`] — the capability set a scriptable object implements:
//!   properties (named and indexed), methods, events, security zones,
//!   invalidation.
//! - [`AutoApi`] — the closure-backed implementation plugin authors
//!   build their object graph from.
//! - [`EventRegistry`] — per-object listener bookkeeping with
//!   fire-on-snapshot dispatch.
//!
//! The host-facing half (native function table, marshaller, proxies)
//! lives in `gangway-host`.

mod adapters;
mod api;
mod auto;
mod config;
mod error;
mod events;
mod json;
mod variant;
mod zone;

pub use adapters::{ListApi, MapApi};
pub use api::{ApiRef, ApiState, ApiWeak, ScriptApi, same_api};
pub use auto::{AutoApi, GetterFn, MethodFn, SetterFn};
pub use config::{BridgeConfig, MarshalPolicy};
pub use error::{BridgeError, BridgeResult};
pub use events::{EVENT_PREFIX, EventRegistry, EventSnapshot};
pub use json::{from_json, to_json};
pub use variant::{FromVariant, Variant, VariantKind, VariantList, VariantMap};
pub use zone::{ScopedZone, SecurityZone, ZoneStack};
