//! Host-facing half of the gangway scripting bridge.
//!
//! Everything that touches the browser's native ABI lives here:
//!
//! - [`HostFunctions`] — the nullable callback table the host supplies.
//! - [`HostBridge`] — the per-instance façade enforcing the shutdown
//!   state machine and the single-scripting-thread invariant.
//! - [`marshal`] — `Variant` ⇄ [`HostValue`] conversion with structural
//!   reference counting.
//! - [`HostObjectApi`] — the proxy that makes a host-owned object look
//!   like any other scriptable object.
//! - [`BrowserStream`] — the async download handshake.
//! - [`MemHost`] — an in-process host for tests and embedder
//!   development.

pub mod boundary;
mod bridge;
mod main_thread;
pub mod marshal;
mod memhost;
mod proxy;
mod stream;
mod table;
mod value;

pub use bridge::HostBridge;
pub use main_thread::call_on_main;
pub use memhost::MemHost;
pub use proxy::HostObjectApi;
pub use stream::{BrowserStream, StreamObserver};
pub use table::{
    AsyncCallback, HostBuffer, HostFunctions, HostVariable, Identifier, NotifyToken, TimerCallback,
};
pub use value::{HostHandle, HostObjectRef, HostValue};
