use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use gangway_api::{
    ApiRef, AutoApi, BridgeConfig, BridgeError, MarshalPolicy, ScriptApi, Variant,
};
use gangway_host::{
    BrowserStream, HostBridge, HostObjectApi, MemHost, StreamObserver, TimerCallback, marshal,
};

fn attached_bridge() -> (MemHost, Arc<HostBridge>) {
    let host = MemHost::new();
    let bridge = HostBridge::new(BridgeConfig::default());
    bridge.attach(host.table()).unwrap();
    (host, bridge)
}

#[test]
fn test_attach_resolves_window_document_element() {
    let (host, bridge) = attached_bridge();
    let window = bridge.window().unwrap();
    let document = bridge.document().unwrap();
    let element = bridge.element().unwrap();

    assert_eq!(
        window.get_property("location").unwrap(),
        Variant::from("https://example.test/page")
    );
    assert_eq!(
        document.get_property("title").unwrap(),
        Variant::from("MemHost")
    );
    assert_eq!(element.get_property("id").unwrap(), Variant::from("plugin"));
    assert!(host.live_object_count() >= 3);
}

#[test]
fn test_marshal_round_trip_scalars() {
    let (_host, bridge) = attached_bridge();
    for v in [
        Variant::Null,
        Variant::from(true),
        Variant::from(false),
        Variant::from(42i64),
        Variant::from(-1i64),
        Variant::from(2.75),
        Variant::from("hello"),
        Variant::from("emb\0edded"),
    ] {
        let native = marshal::to_host(&bridge, &v).unwrap().unwrap();
        let back = marshal::from_host(&bridge, &native);
        assert_eq!(back.kind(), v.kind());
        assert_eq!(back, v);
    }
}

#[test]
fn test_marshal_round_trip_object_reference() {
    let (_host, bridge) = attached_bridge();
    let window = Variant::Object(bridge.window().unwrap());
    let native = marshal::to_host(&bridge, &window).unwrap().unwrap();
    let back = marshal::from_host(&bridge, &native);
    bridge.release_value(&native);
    // Two proxies over one native handle are value-equal.
    assert_eq!(back, window);
}

#[test]
fn test_marshal_wide_integer_crosses_as_double() {
    let (_host, bridge) = attached_bridge();
    let wide = Variant::from(i64::from(i32::MAX) + 1);
    let native = marshal::to_host(&bridge, &wide).unwrap().unwrap();
    let back = marshal::from_host(&bridge, &native);
    assert_eq!(back.kind(), gangway_api::VariantKind::Double);
    let value: f64 = back.convert_cast().unwrap();
    assert_eq!(value, (i64::from(i32::MAX) + 1) as f64);
}

#[test]
fn test_marshal_policy_controls_unrepresentable_values() {
    // A host without object reflection cannot carry plugin objects.
    let host = MemHost::new();
    let mut table = host.table();
    table.wrap_scriptable = None;

    let bridge = HostBridge::new(BridgeConfig::default().with_marshal_policy(MarshalPolicy::Error));
    bridge.attach(table).unwrap();
    let local: ApiRef = Arc::new(AutoApi::new());
    let err = marshal::to_host(&bridge, &Variant::Object(local.clone())).unwrap_err();
    assert!(matches!(err, BridgeError::MarshalMiss { .. }));

    let host = MemHost::new();
    let mut table = host.table();
    table.wrap_scriptable = None;
    let bridge = HostBridge::new(BridgeConfig::default());
    bridge.attach(table).unwrap();
    // Default policy: dropped, crossing as void in argument position.
    assert!(marshal::to_host(&bridge, &Variant::Object(local)).unwrap().is_none());
}

#[test]
fn test_list_and_map_cross_as_scriptable_objects() {
    let (_host, bridge) = attached_bridge();
    let list = Variant::from(vec![1i64, 2, 3]);
    let native = marshal::to_host(&bridge, &list).unwrap().unwrap();
    let back = marshal::from_host(&bridge, &native);
    bridge.release_value(&native);

    let proxy = back.as_object().expect("lists cross as objects");
    assert_eq!(
        proxy.get_property("length").unwrap(),
        Variant::from(3i64)
    );
    assert_eq!(proxy.get_index(2).unwrap(), Variant::from(3i64));
}

#[test]
fn test_proxy_forwards_property_and_method_calls() {
    let (host, bridge) = attached_bridge();
    let window = bridge.window().unwrap();

    window
        .invoke("alert", &vec![Variant::from("hi there")])
        .unwrap();
    assert_eq!(host.alerts(), vec!["hi there"]);

    // Unknown method surfaces the host's failure signal as a call error.
    let err = window.invoke("missing", &vec![]).unwrap_err();
    assert!(matches!(err, BridgeError::CallFailed { .. }));

    assert!(window.has_method("alert"));
    assert!(!window.has_method("missing"));
    assert!(window.has_property("location"));

    // Writes forward too (document.title is writable).
    let document = bridge.document().unwrap();
    document
        .set_property("title", Variant::from("renamed"))
        .unwrap();
    assert_eq!(
        document.get_property("title").unwrap(),
        Variant::from("renamed")
    );

    // Enumeration round-trips through identifier interning.
    let names = document.member_names();
    assert!(names.contains(&"title".to_string()));
    assert!(names.contains(&"URL".to_string()));
}

#[test]
fn test_proxy_refcount_balance() {
    let (host, bridge) = attached_bridge();
    let doc_handle = host.handle_of(&host.document_api()).unwrap();
    // One reference: the cached document proxy.
    assert_eq!(host.refcount(doc_handle), Some(1));

    let second = bridge.window().unwrap().get_property("document").unwrap();
    assert_eq!(host.refcount(doc_handle), Some(2));

    drop(second);
    assert_eq!(host.refcount(doc_handle), Some(1));
}

#[test]
fn test_shutdown_releases_everything_and_fails_calls() {
    let (host, bridge) = attached_bridge();
    let window = bridge.window().unwrap();
    let window_handle = host.handle_of(&host.window_api()).unwrap();
    assert!(host.refcount(window_handle).is_some());

    let requests_before = host.requests().len();
    let baseline = host.live_object_count();

    drop(window);
    bridge.shutdown();
    assert!(bridge.is_shut_down());
    // Cached proxies released their handles while releases still worked.
    assert_eq!(host.live_object_count(), baseline.saturating_sub(3));

    // Every table-backed call now returns its documented failure without
    // touching the host.
    assert!(matches!(
        bridge.get_url("https://example.test/x", None),
        Err(BridgeError::ShutDown)
    ));
    assert!(matches!(bridge.user_agent(), Err(BridgeError::ShutDown)));
    assert!(matches!(bridge.intern("x"), Err(BridgeError::ShutDown)));
    assert!(matches!(
        bridge.evaluate_script("1 + 1"),
        Err(BridgeError::ShutDown)
    ));
    assert!(!bridge.schedule_async(Box::new(|| {})));
    let cb: TimerCallback = Arc::new(|_| {});
    assert_eq!(bridge.schedule_timer(10, false, cb), 0);
    assert_eq!(bridge.mem_flush(1024), 0);
    assert!(bridge.mem_alloc(16).is_none());

    assert_eq!(host.requests().len(), requests_before);
    assert_eq!(host.pending_async(), 0);
}

#[test]
fn test_shutdown_invalidates_cached_page_proxies() {
    let (_host, bridge) = attached_bridge();
    let window = bridge.window().unwrap();
    bridge.shutdown();
    assert!(matches!(
        window.get_property("location"),
        Err(BridgeError::Invalidated)
    ));
}

#[test]
fn test_unset_table_entries_degrade_gracefully() {
    let bridge = HostBridge::new(BridgeConfig::default());
    bridge.attach(gangway_host::HostFunctions::new()).unwrap();

    assert!(matches!(
        bridge.intern("name"),
        Err(BridgeError::Unsupported { .. })
    ));
    assert!(matches!(
        bridge.user_agent(),
        Err(BridgeError::Unsupported { .. })
    ));
    assert!(!bridge.schedule_async(Box::new(|| {})));
    let cb: TimerCallback = Arc::new(|_| {});
    assert_eq!(bridge.schedule_timer(10, true, cb), 0);
    assert!(bridge.window().is_err());
    // Chrome calls are silently ignored rather than failing.
    bridge.set_status("ignored");
    bridge.push_popups_enabled(true);
    bridge.pop_popups_enabled();
}

#[test]
fn test_identifier_interning() {
    let (_host, bridge) = attached_bridge();

    let id = bridge.intern("foo").unwrap();
    assert_eq!(bridge.intern("foo").unwrap(), id);
    assert!(bridge.identifier_is_string(id).unwrap());
    assert_eq!(bridge.string_from_identifier(id).unwrap(), "foo");

    let batch = bridge.intern_batch(&["a", "b", "foo"]).unwrap();
    assert_eq!(batch.len(), 3);
    assert_eq!(batch[2], id);

    let int_id = bridge.int_identifier(7).unwrap();
    assert!(!bridge.identifier_is_string(int_id).unwrap());
    assert_eq!(bridge.int_from_identifier(int_id).unwrap(), 7);
    assert_eq!(bridge.string_from_identifier(int_id).unwrap(), "7");
}

#[test]
fn test_evaluate_discards_result_and_reports_failure() {
    let (host, bridge) = attached_bridge();
    bridge.evaluate_script("console.log('hi')").unwrap();
    assert_eq!(host.evaluated(), vec!["console.log('hi')"]);

    host.set_fail_evaluate(true);
    let err = bridge.evaluate_script("boom()").unwrap_err();
    assert!(matches!(err, BridgeError::ScriptExecution { .. }));
}

#[test]
fn test_user_agent_probe() {
    let (_host, bridge) = attached_bridge();
    assert_eq!(bridge.user_agent().unwrap(), "MemHost/1.0 (Gangway)");
    assert!(bridge.user_agent_contains("MemHost"));
    assert!(!bridge.user_agent_contains("Safari"));
}

#[test]
fn test_timers() {
    let (host, bridge) = attached_bridge();
    let fired = Arc::new(AtomicUsize::new(0));

    let cb: TimerCallback = {
        let fired = fired.clone();
        Arc::new(move |_id| {
            fired.fetch_add(1, Ordering::Relaxed);
        })
    };
    let one_shot = bridge.schedule_timer(50, false, cb.clone());
    assert_ne!(one_shot, 0);
    assert!(host.fire_timer(one_shot));
    assert_eq!(fired.load(Ordering::Relaxed), 1);
    // One-shot timers are gone after firing.
    assert!(!host.fire_timer(one_shot));

    let repeating = bridge.schedule_timer(50, true, cb);
    assert!(host.fire_timer(repeating));
    assert!(host.fire_timer(repeating));
    assert_eq!(fired.load(Ordering::Relaxed), 3);
    bridge.unschedule_timer(repeating);
    assert!(!host.fire_timer(repeating));
}

#[derive(Default)]
struct RecordingObserver {
    created: AtomicUsize,
    completed: AtomicUsize,
    data: Mutex<Vec<Vec<u8>>>,
}

impl StreamObserver for RecordingObserver {
    fn on_stream_created(&self, _stream: &BrowserStream) {
        self.created.fetch_add(1, Ordering::Relaxed);
    }

    fn on_stream_data(&self, _stream: &BrowserStream, data: &[u8]) {
        self.data.lock().unwrap().push(data.to_vec());
    }

    fn on_stream_completed(&self, _stream: &BrowserStream, _success: bool) {
        self.completed.fetch_add(1, Ordering::Relaxed);
    }
}

#[test]
fn test_create_stream_accepted() {
    let (host, bridge) = attached_bridge();
    let observer = Arc::new(RecordingObserver::default());

    let stream = bridge
        .create_stream("https://example/file", observer.clone(), true, false, 4096)
        .expect("accepting host yields a stream");

    // Exactly one synchronous created notification, before return.
    assert_eq!(observer.created.load(Ordering::Relaxed), 1);
    assert!(stream.is_created());
    assert_eq!(stream.url(), "https://example/file");
    assert!(stream.cache());
    assert!(!stream.seekable());
    assert_eq!(stream.buffer_size(), 4096);
    assert_eq!(host.requests(), vec!["https://example/file"]);

    // The embedder's glue can route completions through the token.
    let found = bridge.stream_for_token(stream.token()).unwrap();
    found.notify_data(b"abc");
    found.notify_completed(true);
    assert_eq!(*observer.data.lock().unwrap(), vec![b"abc".to_vec()]);
    assert_eq!(observer.completed.load(Ordering::Relaxed), 1);
    bridge.forget_stream(stream.token());
    assert!(bridge.stream_for_token(stream.token()).is_none());
}

#[test]
fn test_create_stream_rejected() {
    let (host, bridge) = attached_bridge();
    host.set_accept_urls(false);
    let observer = Arc::new(RecordingObserver::default());

    let stream = bridge.create_stream("https://example/file", observer.clone(), true, false, 4096);
    assert!(stream.is_none());
    assert_eq!(observer.created.load(Ordering::Relaxed), 0);
}

#[test]
fn test_event_fired_off_thread_routes_through_async_call() {
    let (host, bridge) = attached_bridge();

    // Plugin-side object with a registered event.
    let root = Arc::new(AutoApi::new());
    root.register_event("onload").unwrap();

    // "Page script" listener: lives host-side, reached through a proxy.
    let hits = Arc::new(AtomicUsize::new(0));
    let listener = Arc::new(AutoApi::new());
    {
        let hits = hits.clone();
        listener.register_method("", move |args| {
            assert_eq!(args[0], Variant::from("ready"));
            hits.fetch_add(1, Ordering::Relaxed);
            Ok(Variant::Void)
        });
    }
    let listener_ref: ApiRef = listener;
    let handle = bridge.wrap_scriptable(listener_ref).unwrap();
    let proxy = HostObjectApi::from_owned(&bridge, handle);
    root.attach_event_listener("onload", proxy).unwrap();

    // Fire from a worker thread: allowed, the script call is deferred.
    let worker_root = root.clone();
    std::thread::spawn(move || {
        worker_root
            .fire_event("onload", &vec![Variant::from("ready")])
            .unwrap();
    })
    .join()
    .unwrap();

    assert_eq!(hits.load(Ordering::Relaxed), 0);
    assert_eq!(host.pump_async(), 1);
    assert_eq!(hits.load(Ordering::Relaxed), 1);
}

#[test]
fn test_call_on_main_from_worker() {
    let (host, bridge) = attached_bridge();

    let worker_bridge = bridge.clone();
    let worker = std::thread::spawn(move || {
        gangway_host::call_on_main(&worker_bridge, || 21 * 2)
    });

    // Main thread: pump until the scheduled call shows up and runs.
    while host.pending_async() == 0 {
        std::thread::sleep(std::time::Duration::from_millis(1));
    }
    host.pump_async();

    assert_eq!(worker.join().unwrap().unwrap(), 42);

    // Inline on the main thread.
    assert_eq!(gangway_host::call_on_main(&bridge, || 7).unwrap(), 7);
}

#[test]
fn test_plugin_panic_is_contained_at_the_boundary() {
    let (_host, bridge) = attached_bridge();

    let root = Arc::new(AutoApi::new());
    root.register_method("explode", |_| panic!("plugin bug"));
    let root_ref: ApiRef = root;
    let handle = bridge.wrap_scriptable(root_ref).unwrap();

    // The fault surfaces as the call's failure signal, not a crash.
    let err = bridge.invoke(handle, "explode", &[]).unwrap_err();
    assert!(matches!(err, BridgeError::CallFailed { .. }));
}

#[test]
fn test_plugin_object_reachable_from_host_side() {
    let (host, bridge) = attached_bridge();

    // Plugin exposes a root object with a method; the host reflects it
    // and calls in the way page script would.
    let root = Arc::new(AutoApi::new());
    root.register_method("sum", |args| {
        let a: i64 = args[0].convert_cast()?;
        let b: i64 = args[1].convert_cast()?;
        Ok(Variant::from(a + b))
    });
    let root_ref: ApiRef = root;
    let handle = bridge.wrap_scriptable(root_ref.clone()).unwrap();

    // Host-side dispatch through its own table, as the browser would.
    let api = host
        .handle_of(&root_ref)
        .map(|h| {
            assert_eq!(h, handle);
            h
        })
        .unwrap();
    let result = bridge
        .invoke(
            api,
            "sum",
            &[gangway_host::HostValue::Int(2), gangway_host::HostValue::Int(3)],
        )
        .unwrap();
    assert_eq!(result, gangway_host::HostValue::Int(5));
}
