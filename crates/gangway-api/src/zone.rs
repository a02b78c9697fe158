//! Security zones gating member visibility.
//!
//! Every scriptable object carries a stack of zone identifiers. Members
//! registered while a non-default zone is active are gated to that zone;
//! the active zone at lookup time decides what a caller may see. Pushes
//! and pops must be strictly paired — use [`ScopedZone`] rather than
//! calling [`ScriptApi::push_zone`]/[`ScriptApi::pop_zone`] by hand.
//!
//! [`ScriptApi::push_zone`]: crate::api::ScriptApi::push_zone
//! [`ScriptApi::pop_zone`]: crate::api::ScriptApi::pop_zone

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::api::ScriptApi;

/// Access levels, ordered from least to most privileged.
///
/// The shipped visibility policy is an ordered ladder: a member is
/// accessible when its registration zone is at or below the active zone.
/// Finer-grained authorization is an embedder concern layered on top.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum SecurityZone {
    /// Visible to any page script.
    #[default]
    Public,

    /// Visible to pages the embedder has marked trusted.
    Protected,

    /// Visible only to privileged callers.
    Private,

    /// Visible only to the plugin's own code.
    Local,
}

/// Per-object stack of active zones.
///
/// The mutex is held only for the duration of a single push, pop or read,
/// so nested pushes from the same logical call stack never self-deadlock.
#[derive(Debug)]
pub struct ZoneStack {
    default_zone: Mutex<SecurityZone>,
    stack: Mutex<VecDeque<SecurityZone>>,
}

impl ZoneStack {
    /// Create a stack whose resting zone is `default_zone`.
    pub fn new(default_zone: SecurityZone) -> Self {
        Self {
            default_zone: Mutex::new(default_zone),
            stack: Mutex::new(VecDeque::new()),
        }
    }

    /// Push a zone; it becomes the active zone until the matching pop.
    pub fn push(&self, zone: SecurityZone) {
        self.stack.lock().unwrap().push_back(zone);
    }

    /// Pop the most recent push.
    ///
    /// An unmatched pop is a programming error: fatal in debug builds,
    /// a warning plus no-op in release builds.
    pub fn pop(&self) {
        let popped = self.stack.lock().unwrap().pop_back();
        if popped.is_none() {
            debug_assert!(false, "popZone without a matching pushZone");
            tracing::warn!(target: "gangway", "unmatched popZone ignored");
        }
    }

    /// The active zone: top of the stack, or the default when empty.
    pub fn current(&self) -> SecurityZone {
        self.stack
            .lock()
            .unwrap()
            .back()
            .copied()
            .unwrap_or_else(|| *self.default_zone.lock().unwrap())
    }

    /// The zone the object rests in before any push.
    pub fn default_zone(&self) -> SecurityZone {
        *self.default_zone.lock().unwrap()
    }

    /// Change the resting zone.
    pub fn set_default_zone(&self, zone: SecurityZone) {
        *self.default_zone.lock().unwrap() = zone;
    }

    /// Depth of the stack, for misuse diagnostics.
    pub fn depth(&self) -> usize {
        self.stack.lock().unwrap().len()
    }
}

impl Default for ZoneStack {
    fn default() -> Self {
        Self::new(SecurityZone::Public)
    }
}

/// RAII guard pairing a zone push with its pop.
///
/// Pushes `zone` on construction and pops when dropped, including on
/// early returns and error paths:
///
/// ```ignore
/// {
///     let _zone = ScopedZone::new(&api, SecurityZone::Protected);
///     api.register_method("start", ...);
/// } // zone popped here
/// ```
pub struct ScopedZone<'a> {
    api: &'a dyn ScriptApi,
}

impl<'a> ScopedZone<'a> {
    /// Push `zone` on `api` until this guard is dropped.
    pub fn new(api: &'a dyn ScriptApi, zone: SecurityZone) -> Self {
        api.push_zone(zone);
        Self { api }
    }
}

impl Drop for ScopedZone<'_> {
    fn drop(&mut self) {
        self.api.pop_zone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zone_ladder_ordering() {
        assert!(SecurityZone::Public < SecurityZone::Protected);
        assert!(SecurityZone::Protected < SecurityZone::Private);
        assert!(SecurityZone::Private < SecurityZone::Local);
    }

    #[test]
    fn test_nested_push_pop_restores() {
        let zones = ZoneStack::default();
        assert_eq!(zones.current(), SecurityZone::Public);

        zones.push(SecurityZone::Protected);
        zones.push(SecurityZone::Private);
        assert_eq!(zones.current(), SecurityZone::Private);

        zones.pop();
        assert_eq!(zones.current(), SecurityZone::Protected);
        zones.pop();
        assert_eq!(zones.current(), SecurityZone::Public);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "popZone without a matching pushZone")]
    fn test_unmatched_pop_is_fatal_in_debug() {
        let zones = ZoneStack::default();
        zones.pop();
    }

    #[test]
    fn test_default_zone_change() {
        let zones = ZoneStack::default();
        zones.set_default_zone(SecurityZone::Private);
        assert_eq!(zones.current(), SecurityZone::Private);
        zones.push(SecurityZone::Public);
        assert_eq!(zones.current(), SecurityZone::Public);
        zones.pop();
        assert_eq!(zones.current(), SecurityZone::Private);
    }
}
