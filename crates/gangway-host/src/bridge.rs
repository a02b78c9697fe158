//! The host bridge: one safe façade over the native function table.
//!
//! One bridge exists per plugin instance. It owns the table the host
//! supplied at attach time, caches the page's window/document/element
//! proxies, and funnels every host operation through shutdown and
//! main-thread checks. The Active → ShutDown transition is one-way: after
//! it, table-backed calls return their documented failure values and no
//! native entry is touched.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::thread::{self, ThreadId};

use gangway_api::{ApiRef, BridgeConfig, BridgeError, BridgeResult, ScriptApi, Variant};

use crate::proxy::HostObjectApi;
use crate::stream::BrowserStream;
use crate::table::{
    AsyncCallback, HostBuffer, HostFunctions, HostVariable, Identifier, NotifyToken, TimerCallback,
};
use crate::value::{HostHandle, HostValue};

/// Safe façade over one host instance's native callback table.
pub struct HostBridge {
    config: BridgeConfig,
    table: OnceLock<HostFunctions>,
    main_thread: ThreadId,
    shut_down: AtomicBool,
    window: Mutex<Option<ApiRef>>,
    document: Mutex<Option<ApiRef>>,
    element: Mutex<Option<ApiRef>>,
    next_token: AtomicU64,
    pub(crate) streams: Mutex<HashMap<u64, Arc<BrowserStream>>>,
}

impl HostBridge {
    /// Create a bridge for the current (main) thread.
    ///
    /// The thread this runs on becomes the designated scripting thread;
    /// every non-shutdown-safe operation asserts it afterwards.
    pub fn new(config: BridgeConfig) -> Arc<Self> {
        Arc::new(Self {
            config,
            table: OnceLock::new(),
            main_thread: thread::current().id(),
            shut_down: AtomicBool::new(false),
            window: Mutex::new(None),
            document: Mutex::new(None),
            element: Mutex::new(None),
            next_token: AtomicU64::new(1),
            streams: Mutex::new(HashMap::new()),
        })
    }

    /// Install the host's function table and resolve the page objects.
    ///
    /// Called once when the host hands over its callbacks. The window and
    /// plugin-element objects are wrapped in proxies here; the document is
    /// reached through the window's `document` property.
    pub fn attach(self: &Arc<Self>, table: HostFunctions) -> BridgeResult<()> {
        self.assert_main_thread("attach");
        self.table
            .set(table)
            .map_err(|_| BridgeError::call_failed("host table already attached"))?;

        if let Ok(HostValue::Object(handle)) = self.get_value(HostVariable::WindowObject) {
            let window = HostObjectApi::from_owned(self, handle);
            *self.window.lock().unwrap() = Some(window.clone());
            match window.get_property("document") {
                Ok(Variant::Object(doc)) => {
                    *self.document.lock().unwrap() = Some(doc);
                }
                Ok(_) | Err(_) => {
                    tracing::warn!(target: "gangway_host", "window has no document object");
                }
            }
        }
        if let Ok(HostValue::Object(handle)) = self.get_value(HostVariable::PluginElementObject) {
            *self.element.lock().unwrap() = Some(HostObjectApi::from_owned(self, handle));
        }
        Ok(())
    }

    /// The marshalling/zone configuration for this instance.
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Whether the caller is on the designated scripting thread.
    pub fn is_main_thread(&self) -> bool {
        thread::current().id() == self.main_thread
    }

    /// Whether the bridge has entered its terminal state.
    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    /// Sever the instance from its host. One-way.
    ///
    /// Cached page proxies and open streams are dropped first, while
    /// releases still reach the host, then the flag flips and every
    /// later table-backed call fails.
    pub fn shutdown(&self) {
        self.assert_main_thread("shutdown");
        let window = self.window.lock().unwrap().take();
        let document = self.document.lock().unwrap().take();
        let element = self.element.lock().unwrap().take();
        for api in [window, document, element].into_iter().flatten() {
            api.invalidate();
        }
        self.streams.lock().unwrap().clear();
        self.shut_down.store(true, Ordering::Release);
    }

    /// The page window proxy.
    pub fn window(&self) -> BridgeResult<ApiRef> {
        self.window
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| BridgeError::call_failed("window object unavailable"))
    }

    /// The page document proxy.
    pub fn document(&self) -> BridgeResult<ApiRef> {
        self.document
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| BridgeError::call_failed("document object unavailable"))
    }

    /// The plugin's own element proxy.
    pub fn element(&self) -> BridgeResult<ApiRef> {
        self.element
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| BridgeError::call_failed("plugin element unavailable"))
    }

    fn assert_main_thread(&self, op: &str) {
        if !self.is_main_thread() {
            debug_assert!(false, "host call '{op}' off the main thread");
            tracing::error!(target: "gangway_host", "host call '{op}' off the main thread");
        }
    }

    /// Gate for table-backed operations: fails once shut down, asserts
    /// the main thread, fails if the table was never attached.
    fn with_table(&self, op: &'static str) -> BridgeResult<&HostFunctions> {
        if self.is_shut_down() {
            return Err(BridgeError::ShutDown);
        }
        self.assert_main_thread(op);
        self.table.get().ok_or(BridgeError::Unsupported { operation: op })
    }

    // Shutdown-safe access: used by retain/release and memory calls that
    // must degrade to no-ops rather than fail during teardown.
    fn table_if_active(&self) -> Option<&HostFunctions> {
        if self.is_shut_down() {
            return None;
        }
        self.table.get()
    }

    // ==================== Identifier interning ====================

    /// Intern a member name.
    pub fn intern(&self, name: &str) -> BridgeResult<Identifier> {
        let t = self.with_table("getStringIdentifier")?;
        let f = t
            .get_string_identifier
            .as_ref()
            .ok_or(BridgeError::unsupported("getStringIdentifier"))?;
        Ok(f(name))
    }

    /// Intern a batch of member names in one host call.
    pub fn intern_batch(&self, names: &[&str]) -> BridgeResult<Vec<Identifier>> {
        let t = self.with_table("getStringIdentifiers")?;
        match &t.get_string_identifiers {
            Some(f) => Ok(f(names)),
            // Fall back to per-name interning when the batch entry is unset.
            None => names.iter().map(|n| self.intern(n)).collect(),
        }
    }

    /// Intern an integer (array index) identifier.
    pub fn int_identifier(&self, idx: i32) -> BridgeResult<Identifier> {
        let t = self.with_table("getIntIdentifier")?;
        let f = t
            .get_int_identifier
            .as_ref()
            .ok_or(BridgeError::unsupported("getIntIdentifier"))?;
        Ok(f(idx))
    }

    /// Whether `id` was interned from a string.
    pub fn identifier_is_string(&self, id: Identifier) -> BridgeResult<bool> {
        let t = self.with_table("identifierIsString")?;
        let f = t
            .identifier_is_string
            .as_ref()
            .ok_or(BridgeError::unsupported("identifierIsString"))?;
        Ok(f(id))
    }

    /// Recover the member name behind an identifier; integer identifiers
    /// come back in decimal form.
    pub fn string_from_identifier(&self, id: Identifier) -> BridgeResult<String> {
        let t = self.with_table("utf8FromIdentifier")?;
        if let Some(f) = &t.utf8_from_identifier {
            if let Some(s) = f(id) {
                return Ok(s);
            }
        }
        if let Some(f) = &t.int_from_identifier {
            if let Some(i) = f(id) {
                return Ok(i.to_string());
            }
        }
        Err(BridgeError::call_failed("identifier has no name"))
    }

    /// Recover the integer behind an identifier.
    pub fn int_from_identifier(&self, id: Identifier) -> BridgeResult<i32> {
        let t = self.with_table("intFromIdentifier")?;
        let f = t
            .int_from_identifier
            .as_ref()
            .ok_or(BridgeError::unsupported("intFromIdentifier"))?;
        f(id).ok_or_else(|| BridgeError::call_failed("identifier is not an integer"))
    }

    // ==================== Object dispatch ====================

    fn get_property_by_id(&self, obj: HostHandle, id: Identifier, name: &str) -> BridgeResult<HostValue> {
        let t = self.with_table("getProperty")?;
        let f = t
            .get_property
            .as_ref()
            .ok_or(BridgeError::unsupported("getProperty"))?;
        f(obj, id).ok_or_else(|| BridgeError::call_failed(format!("getProperty '{name}'")))
    }

    /// Read a named property. The returned value is owned by the caller.
    pub fn get_property(&self, obj: HostHandle, name: &str) -> BridgeResult<HostValue> {
        let id = self.intern(name)?;
        self.get_property_by_id(obj, id, name)
    }

    /// Read an indexed property.
    pub fn get_property_at(&self, obj: HostHandle, idx: i32) -> BridgeResult<HostValue> {
        let id = self.int_identifier(idx)?;
        self.get_property_by_id(obj, id, &idx.to_string())
    }

    fn set_property_by_id(
        &self,
        obj: HostHandle,
        id: Identifier,
        name: &str,
        value: &HostValue,
    ) -> BridgeResult<()> {
        let t = self.with_table("setProperty")?;
        let f = t
            .set_property
            .as_ref()
            .ok_or(BridgeError::unsupported("setProperty"))?;
        if f(obj, id, value) {
            Ok(())
        } else {
            Err(BridgeError::call_failed(format!("setProperty '{name}'")))
        }
    }

    /// Write a named property.
    pub fn set_property(&self, obj: HostHandle, name: &str, value: &HostValue) -> BridgeResult<()> {
        let id = self.intern(name)?;
        self.set_property_by_id(obj, id, name, value)
    }

    /// Write an indexed property.
    pub fn set_property_at(&self, obj: HostHandle, idx: i32, value: &HostValue) -> BridgeResult<()> {
        let id = self.int_identifier(idx)?;
        self.set_property_by_id(obj, id, &idx.to_string(), value)
    }

    /// Remove a named property.
    pub fn remove_property(&self, obj: HostHandle, name: &str) -> BridgeResult<()> {
        let id = self.intern(name)?;
        let t = self.with_table("removeProperty")?;
        let f = t
            .remove_property
            .as_ref()
            .ok_or(BridgeError::unsupported("removeProperty"))?;
        if f(obj, id) {
            Ok(())
        } else {
            Err(BridgeError::call_failed(format!("removeProperty '{name}'")))
        }
    }

    /// Property existence query; `false` covers "unsupported" too.
    pub fn has_property(&self, obj: HostHandle, name: &str) -> bool {
        let Ok(id) = self.intern(name) else {
            return false;
        };
        self.with_table("hasProperty")
            .ok()
            .and_then(|t| t.has_property.as_ref().map(|f| f(obj, id)))
            .unwrap_or(false)
    }

    /// Indexed property existence query.
    pub fn has_property_at(&self, obj: HostHandle, idx: i32) -> bool {
        let Ok(id) = self.int_identifier(idx) else {
            return false;
        };
        self.with_table("hasProperty")
            .ok()
            .and_then(|t| t.has_property.as_ref().map(|f| f(obj, id)))
            .unwrap_or(false)
    }

    /// Method existence query; `false` covers "unsupported" too.
    pub fn has_method(&self, obj: HostHandle, name: &str) -> bool {
        let Ok(id) = self.intern(name) else {
            return false;
        };
        self.with_table("hasMethod")
            .ok()
            .and_then(|t| t.has_method.as_ref().map(|f| f(obj, id)))
            .unwrap_or(false)
    }

    /// Invoke a named method. Arguments are borrowed; the result is owned
    /// by the caller.
    pub fn invoke(
        &self,
        obj: HostHandle,
        name: &str,
        args: &[HostValue],
    ) -> BridgeResult<HostValue> {
        let id = self.intern(name)?;
        let t = self.with_table("invoke")?;
        let f = t.invoke.as_ref().ok_or(BridgeError::unsupported("invoke"))?;
        f(obj, id, args).ok_or_else(|| BridgeError::call_failed(format!("invoke '{name}'")))
    }

    /// Invoke an object's default method.
    pub fn invoke_default(&self, obj: HostHandle, args: &[HostValue]) -> BridgeResult<HostValue> {
        let t = self.with_table("invokeDefault")?;
        let f = t
            .invoke_default
            .as_ref()
            .ok_or(BridgeError::unsupported("invokeDefault"))?;
        f(obj, args).ok_or_else(|| BridgeError::call_failed("invokeDefault"))
    }

    /// Invoke an object as a constructor.
    pub fn construct(&self, obj: HostHandle, args: &[HostValue]) -> BridgeResult<HostValue> {
        let t = self.with_table("construct")?;
        let f = t
            .construct
            .as_ref()
            .ok_or(BridgeError::unsupported("construct"))?;
        f(obj, args).ok_or_else(|| BridgeError::call_failed("construct"))
    }

    /// Enumerate an object's member names.
    pub fn enumerate(&self, obj: HostHandle) -> BridgeResult<Vec<String>> {
        let t = self.with_table("enumerate")?;
        let f = t
            .enumerate
            .as_ref()
            .ok_or(BridgeError::unsupported("enumerate"))?;
        let ids = f(obj).ok_or_else(|| BridgeError::call_failed("enumerate"))?;
        ids.into_iter()
            .map(|id| self.string_from_identifier(id))
            .collect()
    }

    /// Reflect a plugin scriptable object into a host handle so page
    /// script can hold it. The returned handle is owned by the caller.
    pub fn wrap_scriptable(&self, api: ApiRef) -> BridgeResult<HostHandle> {
        let t = self.with_table("wrapScriptable")?;
        let f = t
            .wrap_scriptable
            .as_ref()
            .ok_or(BridgeError::unsupported("wrapScriptable"))?;
        f(api).ok_or_else(|| BridgeError::call_failed("wrapScriptable"))
    }

    /// Raise a script-visible exception on an object.
    pub fn set_exception(&self, obj: HostHandle, message: &str) {
        if let Ok(t) = self.with_table("setException") {
            if let Some(f) = &t.set_exception {
                f(obj, message);
            }
        }
    }

    /// Fetch a host singleton. The returned object value is owned by the
    /// caller.
    pub fn get_value(&self, variable: HostVariable) -> BridgeResult<HostValue> {
        let t = self.with_table("getValue")?;
        let f = t
            .get_value
            .as_ref()
            .ok_or(BridgeError::unsupported("getValue"))?;
        f(variable).ok_or_else(|| BridgeError::call_failed("getValue"))
    }

    // ==================== Script evaluation ====================

    /// Evaluate script text against the page window.
    ///
    /// The native result is discarded deliberately: not every host can
    /// return a value from inline evaluation, so none may rely on it.
    pub fn evaluate_script(&self, script: &str) -> BridgeResult<()> {
        let window = self.window()?;
        let handle = window
            .foreign_id()
            .map(HostHandle)
            .ok_or_else(|| BridgeError::call_failed("window object unavailable"))?;
        let t = self.with_table("evaluate")?;
        let f = t
            .evaluate
            .as_ref()
            .ok_or(BridgeError::unsupported("evaluate"))?;
        match f(handle, script.as_bytes()) {
            Some(result) => {
                self.release_value(&result);
                Ok(())
            }
            None => Err(BridgeError::ScriptExecution {
                message: "error executing script code".into(),
            }),
        }
    }

    // ==================== Object lifetime & memory ====================

    // Reference counts are the one piece of shared mutable state workers
    // may touch: handles get cloned while scheduling async calls, so
    // retain/release accept any thread and the host table entry must be
    // correspondingly synchronized.

    /// Increment an object's native reference count. No-op once shut
    /// down.
    pub fn retain_object(&self, obj: HostHandle) {
        if let Some(t) = self.table_if_active() {
            if let Some(f) = &t.retain_object {
                f(obj);
            }
        }
    }

    /// Decrement an object's native reference count. No-op once shut
    /// down.
    pub fn release_object(&self, obj: HostHandle) {
        if let Some(t) = self.table_if_active() {
            if let Some(f) = &t.release_object {
                f(obj);
            }
        }
    }

    /// Release the reference owned by a value received from a host call.
    /// No-op once shut down.
    pub fn release_value(&self, value: &HostValue) {
        if let Some(t) = self.table_if_active() {
            if let Some(f) = &t.release_variant {
                f(value);
            }
        }
    }

    /// Allocate host-owned memory; `None` when unsupported or shut down.
    pub fn mem_alloc(&self, size: u32) -> Option<HostBuffer> {
        self.table_if_active()
            .and_then(|t| t.mem_alloc.as_ref())
            .and_then(|f| f(size))
    }

    /// Free a host-owned allocation. No-op once shut down.
    pub fn mem_free(&self, buffer: HostBuffer) {
        if let Some(f) = self.table_if_active().and_then(|t| t.mem_free.as_ref()) {
            f(buffer);
        }
    }

    /// Ask the host to free up to `size` bytes; 0 when unsupported or
    /// shut down.
    pub fn mem_flush(&self, size: u32) -> u32 {
        self.table_if_active()
            .and_then(|t| t.mem_flush.as_ref())
            .map(|f| f(size))
            .unwrap_or(0)
    }

    // ==================== Page chrome ====================

    /// Set the browser status line. Silently ignored when unsupported.
    pub fn set_status(&self, message: &str) {
        if let Ok(t) = self.with_table("status") {
            if let Some(f) = &t.status {
                f(message);
            }
        }
    }

    /// The host's user-agent string.
    pub fn user_agent(&self) -> BridgeResult<String> {
        let t = self.with_table("userAgent")?;
        let f = t
            .user_agent
            .as_ref()
            .ok_or(BridgeError::unsupported("userAgent"))?;
        Ok(f())
    }

    /// Probe the user-agent string for a fragment (browser sniffing).
    pub fn user_agent_contains(&self, fragment: &str) -> bool {
        self.user_agent()
            .map(|agent| agent.contains(fragment))
            .unwrap_or(false)
    }

    /// Enter a popups-allowed scope.
    pub fn push_popups_enabled(&self, enabled: bool) {
        if let Ok(t) = self.with_table("pushPopupsEnabledState") {
            if let Some(f) = &t.push_popups_enabled {
                f(enabled);
            }
        }
    }

    /// Leave the current popups-allowed scope.
    pub fn pop_popups_enabled(&self) {
        if let Ok(t) = self.with_table("popPopupsEnabledState") {
            if let Some(f) = &t.pop_popups_enabled {
                f();
            }
        }
    }

    // ==================== Scheduling ====================

    /// Schedule a callback onto the host's main thread.
    ///
    /// Callable from any thread. Returns `false` when the bridge has shut
    /// down or the host cannot schedule — the callback was *not* queued
    /// and will never run.
    pub fn schedule_async(&self, callback: AsyncCallback) -> bool {
        if self.is_shut_down() {
            return false;
        }
        let Some(t) = self.table.get() else {
            return false;
        };
        match &t.async_call {
            Some(f) => {
                f(callback);
                true
            }
            None => false,
        }
    }

    /// Schedule a timer; returns its id, or 0 when unsupported or shut
    /// down.
    pub fn schedule_timer(&self, interval_ms: u32, repeat: bool, callback: TimerCallback) -> u32 {
        if self.is_shut_down() {
            return 0;
        }
        self.table
            .get()
            .and_then(|t| t.schedule_timer.as_ref())
            .map(|f| f(interval_ms, repeat, callback))
            .unwrap_or(0)
    }

    /// Cancel a scheduled timer.
    pub fn unschedule_timer(&self, timer_id: u32) {
        if self.is_shut_down() {
            return;
        }
        if let Some(f) = self.table.get().and_then(|t| t.unschedule_timer.as_ref()) {
            f(timer_id);
        }
    }

    // ==================== URL fetching ====================

    /// Fetch a URL into the page or a named target.
    pub fn get_url(&self, url: &str, target: Option<&str>) -> BridgeResult<()> {
        let t = self.with_table("getURL")?;
        let f = t.get_url.as_ref().ok_or(BridgeError::unsupported("getURL"))?;
        if f(url, target) {
            Ok(())
        } else {
            Err(BridgeError::call_failed(format!("getURL {url}")))
        }
    }

    /// Fetch a URL asynchronously; the returned token identifies the
    /// completion notification.
    pub fn get_url_notify(&self, url: &str, target: Option<&str>) -> BridgeResult<NotifyToken> {
        let token = NotifyToken(self.next_token.fetch_add(1, Ordering::Relaxed));
        let t = self.with_table("getURLNotify")?;
        let f = t
            .get_url_notify
            .as_ref()
            .ok_or(BridgeError::unsupported("getURLNotify"))?;
        if f(url, target, token) {
            Ok(token)
        } else {
            Err(BridgeError::call_failed(format!("getURLNotify {url}")))
        }
    }

    /// Post data to a URL.
    pub fn post_url(
        &self,
        url: &str,
        target: Option<&str>,
        data: &[u8],
        is_file: bool,
    ) -> BridgeResult<()> {
        let t = self.with_table("postURL")?;
        let f = t.post_url.as_ref().ok_or(BridgeError::unsupported("postURL"))?;
        if f(url, target, data, is_file) {
            Ok(())
        } else {
            Err(BridgeError::call_failed(format!("postURL {url}")))
        }
    }

    /// Post data to a URL with completion notification.
    pub fn post_url_notify(
        &self,
        url: &str,
        target: Option<&str>,
        data: &[u8],
        is_file: bool,
    ) -> BridgeResult<NotifyToken> {
        let token = NotifyToken(self.next_token.fetch_add(1, Ordering::Relaxed));
        let t = self.with_table("postURLNotify")?;
        let f = t
            .post_url_notify
            .as_ref()
            .ok_or(BridgeError::unsupported("postURLNotify"))?;
        if f(url, target, data, is_file, token) {
            Ok(token)
        } else {
            Err(BridgeError::call_failed(format!("postURLNotify {url}")))
        }
    }
}

impl std::fmt::Debug for HostBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostBridge")
            .field("attached", &self.table.get().is_some())
            .field("shut_down", &self.is_shut_down())
            .finish_non_exhaustive()
    }
}
