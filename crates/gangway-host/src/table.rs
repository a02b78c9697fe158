//! The native function table supplied by the host at attach time.
//!
//! Every entry is optional: a host is free to leave any of them unset and
//! the bridge degrades each missing entry to its documented failure value
//! instead of dereferencing a null pointer. The table is written once
//! during attach and never mutated afterwards.

use gangway_api::ApiRef;

use crate::value::{HostHandle, HostValue};

/// Interned member-name identifier, opaque to plugin code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Identifier(pub u64);

/// Token identifying an asynchronous URL request to its completion
/// notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NotifyToken(pub u64);

/// Opaque handle to a host-owned memory allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HostBuffer(pub u64);

/// Host-provided singletons the bridge can ask for at attach time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostVariable {
    /// The page's window scripting object.
    WindowObject,

    /// The scripting object for the plugin's own element in the page.
    PluginElementObject,
}

/// A callback scheduled onto the host's main thread.
pub type AsyncCallback = Box<dyn FnOnce() + Send + 'static>;

/// A timer callback; receives the timer id it was scheduled under.
pub type TimerCallback = std::sync::Arc<dyn Fn(u32) + Send + Sync + 'static>;

macro_rules! host_fn {
    (($($arg:ty),*) -> $ret:ty) => {
        Option<Box<dyn Fn($($arg),*) -> $ret + Send + Sync>>
    };
    (($($arg:ty),*)) => {
        Option<Box<dyn Fn($($arg),*) + Send + Sync>>
    };
}

/// The fixed table of host callbacks.
///
/// Boolean-returning entries report native success; value-returning
/// entries yield `None` as their failure signal. Object handles crossing
/// through these calls follow the retain/release convention documented on
/// [`HostValue`]: returned objects arrive retained for the receiver,
/// argument objects are borrowed.
#[derive(Default)]
pub struct HostFunctions {
    /// Fetch a URL into the page or a named target.
    pub get_url: host_fn!((&str, Option<&str>) -> bool),

    /// Fetch a URL asynchronously; completion is reported against the
    /// token.
    pub get_url_notify: host_fn!((&str, Option<&str>, NotifyToken) -> bool),

    /// Post data to a URL.
    pub post_url: host_fn!((&str, Option<&str>, &[u8], bool) -> bool),

    /// Post data to a URL with completion notification.
    pub post_url_notify: host_fn!((&str, Option<&str>, &[u8], bool, NotifyToken) -> bool),

    /// Evaluate script text against an object (usually the window).
    pub evaluate: host_fn!((HostHandle, &[u8]) -> Option<HostValue>),

    /// Read a property.
    pub get_property: host_fn!((HostHandle, Identifier) -> Option<HostValue>),

    /// Write a property.
    pub set_property: host_fn!((HostHandle, Identifier, &HostValue) -> bool),

    /// Remove a property.
    pub remove_property: host_fn!((HostHandle, Identifier) -> bool),

    /// Property existence query.
    pub has_property: host_fn!((HostHandle, Identifier) -> bool),

    /// Method existence query.
    pub has_method: host_fn!((HostHandle, Identifier) -> bool),

    /// Invoke a named method.
    pub invoke: host_fn!((HostHandle, Identifier, &[HostValue]) -> Option<HostValue>),

    /// Invoke an object's default method.
    pub invoke_default: host_fn!((HostHandle, &[HostValue]) -> Option<HostValue>),

    /// Invoke an object as a constructor.
    pub construct: host_fn!((HostHandle, &[HostValue]) -> Option<HostValue>),

    /// Enumerate an object's member identifiers.
    pub enumerate: host_fn!((HostHandle) -> Option<Vec<Identifier>>),

    /// Raise a script-visible exception on an object.
    pub set_exception: host_fn!((HostHandle, &str)),

    /// Fetch a host singleton object.
    pub get_value: host_fn!((HostVariable) -> Option<HostValue>),

    /// Intern a member name.
    pub get_string_identifier: host_fn!((&str) -> Identifier),

    /// Intern a batch of member names.
    pub get_string_identifiers: host_fn!((&[&str]) -> Vec<Identifier>),

    /// Intern an integer (array index) identifier.
    pub get_int_identifier: host_fn!((i32) -> Identifier),

    /// Whether the identifier was interned from a string.
    pub identifier_is_string: host_fn!((Identifier) -> bool),

    /// Recover the string an identifier was interned from.
    pub utf8_from_identifier: host_fn!((Identifier) -> Option<String>),

    /// Recover the integer an identifier was interned from.
    pub int_from_identifier: host_fn!((Identifier) -> Option<i32>),

    /// Increment an object's native reference count.
    pub retain_object: host_fn!((HostHandle)),

    /// Decrement an object's native reference count.
    pub release_object: host_fn!((HostHandle)),

    /// Release the reference owned by a value received from a host call.
    pub release_variant: host_fn!((&HostValue)),

    /// Allocate host-owned memory.
    pub mem_alloc: host_fn!((u32) -> Option<HostBuffer>),

    /// Free a host-owned allocation.
    pub mem_free: host_fn!((HostBuffer)),

    /// Ask the host to free up to `size` bytes; returns the amount freed.
    pub mem_flush: host_fn!((u32) -> u32),

    /// Set the browser status line.
    pub status: host_fn!((&str)),

    /// The host's user-agent string.
    pub user_agent: host_fn!(() -> String),

    /// Enter a popups-allowed scope.
    pub push_popups_enabled: host_fn!((bool)),

    /// Leave the current popups-allowed scope.
    pub pop_popups_enabled: host_fn!(()),

    /// Schedule a callback onto the host's main thread.
    pub async_call: host_fn!((AsyncCallback)),

    /// Schedule a one-shot or repeating timer; returns its id, 0 on
    /// failure.
    pub schedule_timer: host_fn!((u32, bool, TimerCallback) -> u32),

    /// Cancel a scheduled timer.
    pub unschedule_timer: host_fn!((u32)),

    /// Reflect a plugin scriptable object into a host object handle, so
    /// page script can hold and call it. The returned handle is retained
    /// for the receiver.
    pub wrap_scriptable: host_fn!((ApiRef) -> Option<HostHandle>),
}

impl HostFunctions {
    /// An empty table; every entry unset.
    pub fn new() -> Self {
        Self::default()
    }
}

impl std::fmt::Debug for HostFunctions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostFunctions")
            .field("invoke", &self.invoke.is_some())
            .field("evaluate", &self.evaluate.is_some())
            .field("async_call", &self.async_call.is_some())
            .finish_non_exhaustive()
    }
}
