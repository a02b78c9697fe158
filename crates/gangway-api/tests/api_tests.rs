use std::sync::{Arc, Mutex};

use gangway_api::{
    ApiRef, AutoApi, BridgeError, ScopedZone, ScriptApi, SecurityZone, Variant, VariantMap,
};

/// Listener that records every invocation it receives.
fn recorder(log: Arc<Mutex<Vec<String>>>, tag: &'static str) -> Arc<AutoApi> {
    let api = Arc::new(AutoApi::new());
    api.register_method("", move |_args| {
        log.lock().unwrap().push(tag.to_string());
        Ok(Variant::Void)
    });
    api
}

#[test]
fn test_fire_event_in_attach_order() {
    let source = Arc::new(AutoApi::new());
    source.register_event("onping").unwrap();

    let log = Arc::new(Mutex::new(Vec::new()));
    let l1: ApiRef = recorder(log.clone(), "l1");
    let l2: ApiRef = recorder(log.clone(), "l2");
    source.attach_event_listener("onping", l1).unwrap();
    source.attach_event_listener("onping", l2).unwrap();

    source.fire_event("onping", &vec![]).unwrap();
    assert_eq!(*log.lock().unwrap(), vec!["l1", "l2"]);
}

#[test]
fn test_snapshot_semantics_detach_mid_dispatch() {
    let source = Arc::new(AutoApi::new());
    source.register_event("onping").unwrap();

    let log = Arc::new(Mutex::new(Vec::new()));

    // L1 detaches itself while the event is being dispatched.
    let l1 = Arc::new(AutoApi::new());
    {
        let log = log.clone();
        let source = source.clone();
        let me = Arc::downgrade(&l1);
        l1.register_method("", move |_args| {
            log.lock().unwrap().push("l1".to_string());
            if let Some(alive) = me.upgrade() {
                let as_ref: ApiRef = alive;
                source.detach_event_listener("onping", &as_ref).unwrap();
            }
            Ok(Variant::Void)
        });
    }
    let l2: ApiRef = recorder(log.clone(), "l2");

    let l1_ref: ApiRef = l1.clone();
    source.attach_event_listener("onping", l1_ref).unwrap();
    source.attach_event_listener("onping", l2).unwrap();

    // Both fire: the handler set was snapshotted before L1 detached.
    source.fire_event("onping", &vec![]).unwrap();
    assert_eq!(*log.lock().unwrap(), vec!["l1", "l2"]);

    // The detach is visible to the next fire.
    source.fire_event("onping", &vec![]).unwrap();
    assert_eq!(*log.lock().unwrap(), vec!["l1", "l2", "l2"]);
}

#[test]
fn test_default_handler_via_property() {
    let source = Arc::new(AutoApi::new());
    source.register_event("onload").unwrap();

    // Unset handler reads back as null.
    assert_eq!(source.get_property("onload").unwrap(), Variant::Null);

    let log = Arc::new(Mutex::new(Vec::new()));
    let handler: ApiRef = recorder(log.clone(), "default");
    source
        .set_property("onload", Variant::Object(handler.clone()))
        .unwrap();
    assert_eq!(
        source.get_property("onload").unwrap(),
        Variant::Object(handler)
    );

    source.fire_event("onload", &vec![]).unwrap();
    assert_eq!(*log.lock().unwrap(), vec!["default"]);

    // Assigning null clears it.
    source.set_property("onload", Variant::Null).unwrap();
    source.fire_event("onload", &vec![]).unwrap();
    assert_eq!(*log.lock().unwrap(), vec!["default"]);
}

#[test]
fn test_event_interface_invoked_by_event_name() {
    let source = Arc::new(AutoApi::new());
    source.register_event("onload").unwrap();

    let log = Arc::new(Mutex::new(Vec::new()));
    let iface = Arc::new(AutoApi::new());
    {
        let log = log.clone();
        iface.register_method("onload", move |_args| {
            log.lock().unwrap().push("iface.onload".to_string());
            Ok(Variant::Void)
        });
    }
    let iface_ref: ApiRef = iface;
    source.register_event_interface(iface_ref).unwrap();

    source.fire_event("onload", &vec![]).unwrap();
    assert_eq!(*log.lock().unwrap(), vec!["iface.onload"]);
}

#[test]
fn test_fire_unregistered_event_is_error() {
    let source = AutoApi::new();
    assert!(matches!(
        source.fire_event("onmissing", &vec![]),
        Err(BridgeError::UnknownEvent { .. })
    ));
}

#[test]
fn test_fire_json_event_carries_event_object() {
    let source = Arc::new(AutoApi::new());
    source.register_event("onprogress").unwrap();

    let seen = Arc::new(Mutex::new(None));
    let listener = Arc::new(AutoApi::new());
    {
        let seen = seen.clone();
        listener.register_method("", move |args| {
            *seen.lock().unwrap() = Some(args.clone());
            Ok(Variant::Void)
        });
    }
    let listener_ref: ApiRef = listener;
    source
        .attach_event_listener("onprogress", listener_ref)
        .unwrap();

    let mut members = VariantMap::new();
    members.insert("loaded".into(), Variant::from(512i64));
    source
        .fire_json_event("onprogress", members, &vec![Variant::from("extra")])
        .unwrap();

    let args = seen.lock().unwrap().take().unwrap();
    assert_eq!(args.len(), 2);
    let event = args[0].as_map().unwrap().clone();
    assert_eq!(event.get("type").unwrap(), &Variant::from("onprogress"));
    assert_eq!(event.get("loaded").unwrap(), &Variant::from(512i64));
    assert_eq!(args[1], Variant::from("extra"));
}

#[test]
fn test_invalidate_cascades_to_registered_proxies() {
    let api = Arc::new(AutoApi::new());
    let proxy = Arc::new(AutoApi::new());
    let proxy_ref: ApiRef = proxy.clone();
    api.register_proxy(Arc::downgrade(&proxy_ref));

    assert!(proxy.is_valid());
    api.invalidate();
    assert!(!api.is_valid());
    assert!(!proxy.is_valid());
}

#[test]
fn test_weak_proxy_does_not_extend_lifetime() {
    let api = Arc::new(AutoApi::new());
    {
        let proxy = Arc::new(AutoApi::new());
        let proxy_ref: ApiRef = proxy;
        api.register_proxy(Arc::downgrade(&proxy_ref));
        // proxy dropped here
    }
    // Invalidation tolerates the dead weak reference.
    api.invalidate();
    assert!(!api.is_valid());
}

#[test]
fn test_event_ops_fail_after_invalidate() {
    let source = Arc::new(AutoApi::new());
    source.register_event("onload").unwrap();
    source.invalidate();

    assert!(matches!(
        source.register_event("onother"),
        Err(BridgeError::Invalidated)
    ));
    assert!(matches!(
        source.fire_event("onload", &vec![]),
        Err(BridgeError::Invalidated)
    ));
}

#[test]
fn test_scoped_zone_restores_on_early_exit() {
    let api = AutoApi::new();
    let register = |fail: bool| -> Result<(), ()> {
        let _zone = ScopedZone::new(&api, SecurityZone::Private);
        if fail {
            return Err(());
        }
        Ok(())
    };
    let _ = register(true);
    assert_eq!(api.current_zone(), SecurityZone::Public);
    let _ = register(false);
    assert_eq!(api.current_zone(), SecurityZone::Public);
}

#[test]
fn test_member_enumeration_includes_events() {
    let api = AutoApi::new();
    api.register_method("sum", |_| Ok(Variant::Void));
    api.register_attribute("version", "1.0", true);
    api.register_event("onload").unwrap();

    let names = api.member_names();
    assert!(names.contains(&"sum".to_string()));
    assert!(names.contains(&"version".to_string()));
    assert!(names.contains(&"onload".to_string()));
    assert_eq!(api.member_count(), names.len());
}
