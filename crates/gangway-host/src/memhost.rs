//! In-process reference host.
//!
//! [`MemHost`] implements the entire native table against plain Rust
//! objects: a refcounted object registry, an identifier interner, a
//! manually pumped async queue and manual timers, plus scripted window,
//! document and element objects. It exists so embedders and this
//! workspace's tests can exercise the bridge, the marshaller and the
//! proxies end-to-end without a browser process.
//!
//! Reference counting follows the real ABI convention: object values
//! returned from table calls arrive retained for the receiver, argument
//! objects are borrowed.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use gangway_api::{ApiRef, AutoApi, ScriptApi, Variant};

use crate::boundary;
use crate::table::{AsyncCallback, HostFunctions, HostVariable, Identifier, TimerCallback};
use crate::value::{HostHandle, HostValue};

#[derive(Clone)]
enum IdName {
    Str(String),
    Int(i32),
}

struct ObjectEntry {
    refs: usize,
    api: ApiRef,
    ptr_key: usize,
}

struct TimerEntry {
    repeat: bool,
    callback: TimerCallback,
}

struct HostState {
    objects: DashMap<u64, ObjectEntry>,
    exports: DashMap<usize, u64>,
    string_ids: DashMap<String, u64>,
    int_ids: DashMap<i32, u64>,
    id_names: DashMap<u64, IdName>,
    next_handle: AtomicU64,
    next_identifier: AtomicU64,
    next_buffer: AtomicU64,
    allocations: DashMap<u64, u32>,
    queue: Mutex<VecDeque<AsyncCallback>>,
    timers: DashMap<u32, TimerEntry>,
    next_timer: AtomicU32,
    popup_depth: AtomicI64,
    accept_urls: AtomicBool,
    fail_evaluate: AtomicBool,
    requests: Mutex<Vec<String>>,
    evaluated: Mutex<Vec<String>>,
    statuses: Mutex<Vec<String>>,
    exceptions: Mutex<Vec<String>>,
    alerts: Arc<Mutex<Vec<String>>>,
    window: ApiRef,
    document: ApiRef,
    element: ApiRef,
}

impl HostState {
    fn intern_str(&self, name: &str) -> u64 {
        if let Some(id) = self.string_ids.get(name) {
            return *id;
        }
        let id = self.next_identifier.fetch_add(1, Ordering::Relaxed);
        self.string_ids.insert(name.to_string(), id);
        self.id_names.insert(id, IdName::Str(name.to_string()));
        id
    }

    fn intern_int(&self, value: i32) -> u64 {
        if let Some(id) = self.int_ids.get(&value) {
            return *id;
        }
        let id = self.next_identifier.fetch_add(1, Ordering::Relaxed);
        self.int_ids.insert(value, id);
        self.id_names.insert(id, IdName::Int(value));
        id
    }

    fn name_of(&self, id: Identifier) -> Option<IdName> {
        self.id_names.get(&id.0).map(|n| n.clone())
    }

    fn api_of(&self, handle: HostHandle) -> Option<ApiRef> {
        self.objects.get(&handle.0).map(|e| e.api.clone())
    }

    /// Register (or re-reference) an object for the host side; the
    /// returned handle carries one reference owned by the receiver.
    fn export_api(&self, api: ApiRef) -> HostHandle {
        let key = Arc::as_ptr(&api) as *const () as usize;
        if let Some(handle) = self.exports.get(&key).map(|h| *h) {
            if let Some(mut entry) = self.objects.get_mut(&handle) {
                entry.refs += 1;
                return HostHandle(handle);
            }
        }
        let handle = self.next_handle.fetch_add(1, Ordering::Relaxed);
        self.objects.insert(
            handle,
            ObjectEntry {
                refs: 1,
                api,
                ptr_key: key,
            },
        );
        self.exports.insert(key, handle);
        HostHandle(handle)
    }

    fn retain(&self, handle: HostHandle) {
        match self.objects.get_mut(&handle.0) {
            Some(mut entry) => entry.refs += 1,
            None => {
                tracing::warn!(target: "memhost", handle = handle.0, "retain of unknown object")
            }
        }
    }

    fn release(&self, handle: HostHandle) {
        let mut dead_key = None;
        match self.objects.get_mut(&handle.0) {
            Some(mut entry) => {
                entry.refs -= 1;
                if entry.refs == 0 {
                    dead_key = Some(entry.ptr_key);
                }
            }
            None => {
                tracing::warn!(target: "memhost", handle = handle.0, "release of unknown object")
            }
        }
        if let Some(key) = dead_key {
            self.objects.remove(&handle.0);
            self.exports.remove(&key);
        }
    }

    fn variant_of(&self, value: &HostValue) -> Variant {
        match value {
            HostValue::Void => Variant::Void,
            HostValue::Null => Variant::Null,
            HostValue::Bool(b) => Variant::Bool(*b),
            HostValue::Int(i) => Variant::Int(i64::from(*i)),
            HostValue::Double(d) => Variant::Double(*d),
            HostValue::Utf8(bytes) => {
                Variant::String(String::from_utf8_lossy(bytes).into_owned())
            }
            HostValue::Object(handle) => match self.api_of(*handle) {
                Some(api) => Variant::Object(api),
                None => Variant::Null,
            },
        }
    }

    fn host_value_of(&self, value: &Variant) -> HostValue {
        match value {
            Variant::Null => HostValue::Null,
            Variant::Void => HostValue::Void,
            Variant::Bool(b) => HostValue::Bool(*b),
            Variant::Int(i) => match i32::try_from(*i) {
                Ok(narrow) => HostValue::Int(narrow),
                Err(_) => HostValue::Double(*i as f64),
            },
            Variant::Double(d) => HostValue::Double(*d),
            Variant::String(s) => HostValue::Utf8(s.as_bytes().to_vec()),
            Variant::Object(api) => HostValue::Object(self.export_api(api.clone())),
            Variant::List(items) => HostValue::Object(
                self.export_api(gangway_api::ListApi::into_ref(items.as_ref().clone())),
            ),
            Variant::Map(entries) => HostValue::Object(
                self.export_api(gangway_api::MapApi::into_ref(entries.as_ref().clone())),
            ),
        }
    }

    fn record_request(&self, url: &str) -> bool {
        self.requests.lock().unwrap().push(url.to_string());
        self.accept_urls.load(Ordering::Acquire)
    }
}

/// An in-memory host instance.
///
/// Cheap to clone; clones share the same host state.
#[derive(Clone)]
pub struct MemHost {
    state: Arc<HostState>,
}

impl MemHost {
    /// A host with a scripted window/document/element and every table
    /// entry populated.
    pub fn new() -> Self {
        let alerts = Arc::new(Mutex::new(Vec::new()));

        let document = Arc::new(AutoApi::new());
        document.register_attribute("title", "MemHost", false);
        document.register_attribute("URL", "https://example.test/page", true);
        let document: ApiRef = document;

        let window = Arc::new(AutoApi::new());
        window.register_attribute("location", "https://example.test/page", true);
        {
            let document = document.clone();
            window.register_getter("document", move || Ok(Variant::Object(document.clone())));
        }
        {
            let alerts = alerts.clone();
            window.register_method("alert", move |args| {
                let message: String = args
                    .first()
                    .map(|v| v.convert_cast())
                    .transpose()?
                    .unwrap_or_default();
                alerts.lock().unwrap().push(message);
                Ok(Variant::Void)
            });
        }
        let window: ApiRef = window;

        let element = Arc::new(AutoApi::new());
        element.register_attribute("id", "plugin", true);
        let element: ApiRef = element;

        Self {
            state: Arc::new(HostState {
                objects: DashMap::new(),
                exports: DashMap::new(),
                string_ids: DashMap::new(),
                int_ids: DashMap::new(),
                id_names: DashMap::new(),
                next_handle: AtomicU64::new(1),
                next_identifier: AtomicU64::new(1),
                next_buffer: AtomicU64::new(1),
                allocations: DashMap::new(),
                queue: Mutex::new(VecDeque::new()),
                timers: DashMap::new(),
                next_timer: AtomicU32::new(1),
                popup_depth: AtomicI64::new(0),
                accept_urls: AtomicBool::new(true),
                fail_evaluate: AtomicBool::new(false),
                requests: Mutex::new(Vec::new()),
                evaluated: Mutex::new(Vec::new()),
                statuses: Mutex::new(Vec::new()),
                exceptions: Mutex::new(Vec::new()),
                alerts,
                window,
                document,
                element,
            }),
        }
    }

    /// Build a fully populated function table for this host.
    pub fn table(&self) -> HostFunctions {
        let mut table = HostFunctions::new();
        let s = &self.state;

        table.get_url = Some({
            let s = s.clone();
            Box::new(move |url, _target| s.record_request(url))
        });
        table.get_url_notify = Some({
            let s = s.clone();
            Box::new(move |url, _target, _token| s.record_request(url))
        });
        table.post_url = Some({
            let s = s.clone();
            Box::new(move |url, _target, _data, _is_file| s.record_request(url))
        });
        table.post_url_notify = Some({
            let s = s.clone();
            Box::new(move |url, _target, _data, _is_file, _token| s.record_request(url))
        });

        table.evaluate = Some({
            let s = s.clone();
            Box::new(move |_obj, script| {
                let text = String::from_utf8_lossy(script).into_owned();
                s.evaluated.lock().unwrap().push(text);
                if s.fail_evaluate.load(Ordering::Acquire) {
                    None
                } else {
                    Some(HostValue::Void)
                }
            })
        });

        table.get_property = Some({
            let s = s.clone();
            Box::new(move |obj, id| {
                let api = s.api_of(obj)?;
                let name = s.name_of(id)?;
                let value = boundary::guard("getProperty", || match name {
                    IdName::Str(name) => api.get_property(&name).ok(),
                    IdName::Int(idx) => usize::try_from(idx)
                        .ok()
                        .and_then(|idx| api.get_index(idx).ok()),
                })??;
                Some(s.host_value_of(&value))
            })
        });
        table.set_property = Some({
            let s = s.clone();
            Box::new(move |obj, id, value| {
                let Some(api) = s.api_of(obj) else {
                    return false;
                };
                let Some(name) = s.name_of(id) else {
                    return false;
                };
                let v = s.variant_of(value);
                boundary::guard("setProperty", || match name {
                    IdName::Str(name) => api.set_property(&name, v).is_ok(),
                    IdName::Int(idx) => usize::try_from(idx)
                        .map(|idx| api.set_index(idx, v).is_ok())
                        .unwrap_or(false),
                })
                .unwrap_or(false)
            })
        });
        table.remove_property = Some({
            let s = s.clone();
            Box::new(move |obj, id| {
                let Some(api) = s.api_of(obj) else {
                    return false;
                };
                match s.name_of(id) {
                    Some(IdName::Str(name)) => api.remove_property(&name).is_ok(),
                    _ => false,
                }
            })
        });
        table.has_property = Some({
            let s = s.clone();
            Box::new(move |obj, id| {
                let Some(api) = s.api_of(obj) else {
                    return false;
                };
                match s.name_of(id) {
                    Some(IdName::Str(name)) => api.has_property(&name),
                    Some(IdName::Int(idx)) => usize::try_from(idx)
                        .map(|idx| api.has_property_index(idx))
                        .unwrap_or(false),
                    None => false,
                }
            })
        });
        table.has_method = Some({
            let s = s.clone();
            Box::new(move |obj, id| {
                let Some(api) = s.api_of(obj) else {
                    return false;
                };
                match s.name_of(id) {
                    Some(IdName::Str(name)) => api.has_method(&name),
                    _ => false,
                }
            })
        });
        table.invoke = Some({
            let s = s.clone();
            Box::new(move |obj, id, args| {
                let api = s.api_of(obj)?;
                let name = match s.name_of(id)? {
                    IdName::Str(name) => name,
                    IdName::Int(_) => return None,
                };
                let vargs: Vec<Variant> = args.iter().map(|a| s.variant_of(a)).collect();
                let value = boundary::guard("invoke", || api.invoke(&name, &vargs).ok())??;
                Some(s.host_value_of(&value))
            })
        });
        table.invoke_default = Some({
            let s = s.clone();
            Box::new(move |obj, args| {
                let api = s.api_of(obj)?;
                let vargs: Vec<Variant> = args.iter().map(|a| s.variant_of(a)).collect();
                let value = boundary::guard("invokeDefault", || api.invoke("", &vargs).ok())??;
                Some(s.host_value_of(&value))
            })
        });
        table.construct = Some({
            let s = s.clone();
            Box::new(move |obj, args| {
                let api = s.api_of(obj)?;
                let vargs: Vec<Variant> = args.iter().map(|a| s.variant_of(a)).collect();
                let value = boundary::guard("construct", || api.construct(&vargs).ok())??;
                Some(s.host_value_of(&value))
            })
        });
        table.enumerate = Some({
            let s = s.clone();
            Box::new(move |obj| {
                let api = s.api_of(obj)?;
                Some(
                    api.member_names()
                        .into_iter()
                        .map(|n| Identifier(s.intern_str(&n)))
                        .collect(),
                )
            })
        });
        table.set_exception = Some({
            let s = s.clone();
            Box::new(move |_obj, message| {
                s.exceptions.lock().unwrap().push(message.to_string());
            })
        });
        table.get_value = Some({
            let s = s.clone();
            Box::new(move |variable| {
                let api = match variable {
                    HostVariable::WindowObject => s.window.clone(),
                    HostVariable::PluginElementObject => s.element.clone(),
                };
                Some(HostValue::Object(s.export_api(api)))
            })
        });

        table.get_string_identifier = Some({
            let s = s.clone();
            Box::new(move |name| Identifier(s.intern_str(name)))
        });
        table.get_string_identifiers = Some({
            let s = s.clone();
            Box::new(move |names| {
                names
                    .iter()
                    .map(|n| Identifier(s.intern_str(n)))
                    .collect()
            })
        });
        table.get_int_identifier = Some({
            let s = s.clone();
            Box::new(move |value| Identifier(s.intern_int(value)))
        });
        table.identifier_is_string = Some({
            let s = s.clone();
            Box::new(move |id| matches!(s.name_of(id), Some(IdName::Str(_))))
        });
        table.utf8_from_identifier = Some({
            let s = s.clone();
            Box::new(move |id| match s.name_of(id) {
                Some(IdName::Str(name)) => Some(name),
                _ => None,
            })
        });
        table.int_from_identifier = Some({
            let s = s.clone();
            Box::new(move |id| match s.name_of(id) {
                Some(IdName::Int(value)) => Some(value),
                _ => None,
            })
        });

        table.retain_object = Some({
            let s = s.clone();
            Box::new(move |handle| s.retain(handle))
        });
        table.release_object = Some({
            let s = s.clone();
            Box::new(move |handle| s.release(handle))
        });
        table.release_variant = Some({
            let s = s.clone();
            Box::new(move |value| {
                if let HostValue::Object(handle) = value {
                    s.release(*handle);
                }
            })
        });

        table.mem_alloc = Some({
            let s = s.clone();
            Box::new(move |size| {
                let id = s.next_buffer.fetch_add(1, Ordering::Relaxed);
                s.allocations.insert(id, size);
                Some(crate::table::HostBuffer(id))
            })
        });
        table.mem_free = Some({
            let s = s.clone();
            Box::new(move |buffer| {
                s.allocations.remove(&buffer.0);
            })
        });
        table.mem_flush = Some(Box::new(move |_size| 0));

        table.status = Some({
            let s = s.clone();
            Box::new(move |message| s.statuses.lock().unwrap().push(message.to_string()))
        });
        table.user_agent = Some(Box::new(|| "MemHost/1.0 (Gangway)".to_string()));
        table.push_popups_enabled = Some({
            let s = s.clone();
            Box::new(move |_enabled| {
                s.popup_depth.fetch_add(1, Ordering::Relaxed);
            })
        });
        table.pop_popups_enabled = Some({
            let s = s.clone();
            Box::new(move || {
                s.popup_depth.fetch_sub(1, Ordering::Relaxed);
            })
        });

        table.async_call = Some({
            let s = s.clone();
            Box::new(move |callback| s.queue.lock().unwrap().push_back(callback))
        });
        table.schedule_timer = Some({
            let s = s.clone();
            Box::new(move |_interval, repeat, callback| {
                let id = s.next_timer.fetch_add(1, Ordering::Relaxed);
                s.timers.insert(id, TimerEntry { repeat, callback });
                id
            })
        });
        table.unschedule_timer = Some({
            let s = s.clone();
            Box::new(move |id| {
                s.timers.remove(&id);
            })
        });

        table.wrap_scriptable = Some({
            let s = s.clone();
            Box::new(move |api| Some(s.export_api(api)))
        });

        table
    }

    // ==================== Test drivers ====================

    /// Run everything queued through the async-call entry; returns how
    /// many callbacks ran.
    pub fn pump_async(&self) -> usize {
        let mut ran = 0;
        loop {
            let next = self.state.queue.lock().unwrap().pop_front();
            match next {
                Some(callback) => {
                    callback();
                    ran += 1;
                }
                None => return ran,
            }
        }
    }

    /// Callbacks waiting in the async queue.
    pub fn pending_async(&self) -> usize {
        self.state.queue.lock().unwrap().len()
    }

    /// Fire a scheduled timer once; one-shot timers are removed.
    pub fn fire_timer(&self, id: u32) -> bool {
        let Some(entry) = self.state.timers.get(&id).map(|t| (t.repeat, t.callback.clone()))
        else {
            return false;
        };
        let (repeat, callback) = entry;
        callback(id);
        if !repeat {
            self.state.timers.remove(&id);
        }
        true
    }

    /// Number of live timers.
    pub fn timer_count(&self) -> usize {
        self.state.timers.len()
    }

    /// Accept or reject subsequent URL fetches.
    pub fn set_accept_urls(&self, accept: bool) {
        self.state.accept_urls.store(accept, Ordering::Release);
    }

    /// Make subsequent script evaluations report failure.
    pub fn set_fail_evaluate(&self, fail: bool) {
        self.state.fail_evaluate.store(fail, Ordering::Release);
    }

    /// URLs requested so far.
    pub fn requests(&self) -> Vec<String> {
        self.state.requests.lock().unwrap().clone()
    }

    /// Script texts evaluated so far.
    pub fn evaluated(&self) -> Vec<String> {
        self.state.evaluated.lock().unwrap().clone()
    }

    /// Status-line messages set so far.
    pub fn statuses(&self) -> Vec<String> {
        self.state.statuses.lock().unwrap().clone()
    }

    /// Script exceptions raised so far.
    pub fn exceptions(&self) -> Vec<String> {
        self.state.exceptions.lock().unwrap().clone()
    }

    /// Messages passed to `window.alert`.
    pub fn alerts(&self) -> Vec<String> {
        self.state.alerts.lock().unwrap().clone()
    }

    /// Current native reference count for a handle.
    pub fn refcount(&self, handle: HostHandle) -> Option<usize> {
        self.state.objects.get(&handle.0).map(|e| e.refs)
    }

    /// Number of live exported objects.
    pub fn live_object_count(&self) -> usize {
        self.state.objects.len()
    }

    /// The handle an object is exported under, if it is.
    pub fn handle_of(&self, api: &ApiRef) -> Option<HostHandle> {
        let key = Arc::as_ptr(api) as *const () as usize;
        self.state.exports.get(&key).map(|h| HostHandle(*h))
    }

    /// The scripted window object.
    pub fn window_api(&self) -> ApiRef {
        self.state.window.clone()
    }

    /// The scripted document object.
    pub fn document_api(&self) -> ApiRef {
        self.state.document.clone()
    }

    /// The scripted plugin element object.
    pub fn element_api(&self) -> ApiRef {
        self.state.element.clone()
    }

    /// Current popups-enabled nesting depth.
    pub fn popup_depth(&self) -> i64 {
        self.state.popup_depth.load(Ordering::Relaxed)
    }
}

impl Default for MemHost {
    fn default() -> Self {
        Self::new()
    }
}
