//! Asynchronous download streams and their event sink.
//!
//! The bridge only owns the open handshake: it issues the notified URL
//! fetch, binds the observer and guarantees exactly one synchronous
//! "created" notification on success. Data delivery and completion are
//! driven by the embedder's stream glue through the `notify_*` methods.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::bridge::HostBridge;
use crate::table::NotifyToken;

/// Event sink observing one stream's lifecycle.
pub trait StreamObserver: Send + Sync {
    /// The host accepted the fetch; fired exactly once, synchronously,
    /// before `create_stream` returns.
    fn on_stream_created(&self, stream: &BrowserStream);

    /// A chunk of payload arrived.
    fn on_stream_data(&self, _stream: &BrowserStream, _data: &[u8]) {}

    /// The transfer failed.
    fn on_stream_failed(&self, _stream: &BrowserStream) {}

    /// The transfer finished.
    fn on_stream_completed(&self, _stream: &BrowserStream, _success: bool) {}
}

/// One asynchronous download bound to an observer.
pub struct BrowserStream {
    url: String,
    cache: bool,
    seekable: bool,
    buffer_size: usize,
    token: NotifyToken,
    created: AtomicBool,
    completed: AtomicBool,
    observer: Mutex<Option<Arc<dyn StreamObserver>>>,
}

impl BrowserStream {
    fn new(url: &str, cache: bool, seekable: bool, buffer_size: usize, token: NotifyToken) -> Self {
        Self {
            url: url.to_string(),
            cache,
            seekable,
            buffer_size,
            token,
            created: AtomicBool::new(false),
            completed: AtomicBool::new(false),
            observer: Mutex::new(None),
        }
    }

    /// The URL being fetched.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Whether the host may satisfy the fetch from cache.
    pub fn cache(&self) -> bool {
        self.cache
    }

    /// Whether byte-range requests are wanted.
    pub fn seekable(&self) -> bool {
        self.seekable
    }

    /// Requested internal buffer size.
    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// The token the host reports completion against.
    pub fn token(&self) -> NotifyToken {
        self.token
    }

    /// Whether the host accepted the open.
    pub fn is_created(&self) -> bool {
        self.created.load(Ordering::Acquire)
    }

    /// Whether the transfer has finished or failed.
    pub fn is_completed(&self) -> bool {
        self.completed.load(Ordering::Acquire)
    }

    /// Bind the observer receiving this stream's events.
    pub fn attach_observer(&self, observer: Arc<dyn StreamObserver>) {
        *self.observer.lock().unwrap() = Some(observer);
    }

    /// Unbind the observer; later events are dropped.
    pub fn detach_observer(&self) {
        *self.observer.lock().unwrap() = None;
    }

    fn observer(&self) -> Option<Arc<dyn StreamObserver>> {
        self.observer.lock().unwrap().clone()
    }

    fn notify_created(&self) {
        self.created.store(true, Ordering::Release);
        if let Some(observer) = self.observer() {
            observer.on_stream_created(self);
        }
    }

    /// Deliver a payload chunk to the observer.
    pub fn notify_data(&self, data: &[u8]) {
        if let Some(observer) = self.observer() {
            observer.on_stream_data(self, data);
        }
    }

    /// Report transfer failure to the observer.
    pub fn notify_failed(&self) {
        self.completed.store(true, Ordering::Release);
        if let Some(observer) = self.observer() {
            observer.on_stream_failed(self);
        }
    }

    /// Report transfer completion to the observer.
    pub fn notify_completed(&self, success: bool) {
        self.completed.store(true, Ordering::Release);
        if let Some(observer) = self.observer() {
            observer.on_stream_completed(self, success);
        }
    }
}

impl std::fmt::Debug for BrowserStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrowserStream")
            .field("url", &self.url)
            .field("created", &self.is_created())
            .field("completed", &self.is_completed())
            .finish_non_exhaustive()
    }
}

impl HostBridge {
    /// Open an asynchronous download bound to `observer`.
    ///
    /// On native acceptance the stream is registered under its notify
    /// token and the observer receives exactly one created notification
    /// before this returns. A rejected or unsupported fetch yields `None`
    /// and no notification.
    pub fn create_stream(
        self: &Arc<Self>,
        url: &str,
        observer: Arc<dyn StreamObserver>,
        cache: bool,
        seekable: bool,
        buffer_size: usize,
    ) -> Option<Arc<BrowserStream>> {
        let token = match self.get_url_notify(url, None) {
            Ok(token) => token,
            Err(e) => {
                tracing::debug!(target: "gangway_host", url, "stream open rejected: {e}");
                return None;
            }
        };
        let stream = Arc::new(BrowserStream::new(url, cache, seekable, buffer_size, token));
        stream.attach_observer(observer);
        self.streams.lock().unwrap().insert(token.0, stream.clone());
        stream.notify_created();
        Some(stream)
    }

    /// Look up the stream a completion notification belongs to.
    pub fn stream_for_token(&self, token: NotifyToken) -> Option<Arc<BrowserStream>> {
        self.streams.lock().unwrap().get(&token.0).cloned()
    }

    /// Drop the registration for a finished stream.
    pub fn forget_stream(&self, token: NotifyToken) {
        self.streams.lock().unwrap().remove(&token.0);
    }
}
