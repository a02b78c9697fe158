//! Synchronous cross-thread calls onto the scripting thread.
//!
//! Worker threads must never touch the native table directly; their
//! sanctioned path is the bridge's async-call primitive. [`call_on_main`]
//! wraps that primitive with a oneshot channel so a worker can run a
//! closure on the main thread and block for its result.

use std::sync::Arc;

use gangway_api::{BridgeError, BridgeResult};
use tokio::sync::oneshot;

use crate::bridge::HostBridge;

/// Run `f` on the host's main thread and wait for its result.
///
/// Runs inline when the caller already is the main thread. Fails with
/// the shutdown error when the call cannot be scheduled or the bridge
/// tears down before the result is produced. Do not call this *from* the
/// main thread's own async callbacks with work that schedules again and
/// waits — that deadlocks by construction.
pub fn call_on_main<T, F>(bridge: &Arc<HostBridge>, f: F) -> BridgeResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    if bridge.is_main_thread() {
        return Ok(f());
    }
    let (tx, rx) = oneshot::channel();
    let scheduled = bridge.schedule_async(Box::new(move || {
        // The receiver may have given up; nothing to do then.
        let _ = tx.send(f());
    }));
    if !scheduled {
        return Err(BridgeError::ShutDown);
    }
    rx.blocking_recv().map_err(|_| BridgeError::ShutDown)
}
