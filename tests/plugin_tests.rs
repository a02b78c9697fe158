use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use gangway::{
    ApiRef, AutoApi, BridgeConfig, BridgeError, HostBridge, HostValue, InstanceRegistry, MemHost,
    PluginFactory, PluginInfo, PluginInstance, ScriptApi, Variant,
};

/// Factory counting its global lifecycle edges.
struct CountingFactory {
    inits: AtomicUsize,
    deinits: AtomicUsize,
}

impl CountingFactory {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            inits: AtomicUsize::new(0),
            deinits: AtomicUsize::new(0),
        })
    }
}

impl PluginFactory for CountingFactory {
    fn info(&self) -> PluginInfo {
        PluginInfo::new("counting", "test plugin", "0.0.1")
            .with_mime_type("application/x-counting", "counting media", &["cnt"])
    }

    fn create_root_api(&self, _bridge: &Arc<HostBridge>) -> ApiRef {
        let api = Arc::new(AutoApi::new());
        api.register_method("sum", |args| {
            let a: i64 = args[0].convert_cast()?;
            let b: i64 = args[1].convert_cast()?;
            Ok(Variant::from(a + b))
        });
        api.register_attribute("version", "0.0.1", true);
        api
    }

    fn global_init(&self) {
        self.inits.fetch_add(1, Ordering::Relaxed);
    }

    fn global_deinit(&self) {
        self.deinits.fetch_add(1, Ordering::Relaxed);
    }
}

fn instance_with(factory: &Arc<CountingFactory>) -> (MemHost, PluginInstance) {
    let host = MemHost::new();
    let registry = InstanceRegistry::new(factory.clone());
    let bridge = HostBridge::new(BridgeConfig::default());
    bridge.attach(host.table()).unwrap();
    (host, PluginInstance::new(&registry, bridge))
}

#[test]
fn test_global_lifecycle_tracks_first_and_last_instance() {
    let factory = CountingFactory::new();
    let registry = InstanceRegistry::new(factory.clone());

    let host = MemHost::new();
    let bridge_a = HostBridge::new(BridgeConfig::default());
    bridge_a.attach(host.table()).unwrap();
    let a = PluginInstance::new(&registry, bridge_a);
    assert_eq!(factory.inits.load(Ordering::Relaxed), 1);
    assert_eq!(registry.active_count(), 1);

    let bridge_b = HostBridge::new(BridgeConfig::default());
    let b = PluginInstance::new(&registry, bridge_b);
    // Second instance: no new global init.
    assert_eq!(factory.inits.load(Ordering::Relaxed), 1);
    assert_eq!(registry.active_count(), 2);

    drop(a);
    assert_eq!(factory.deinits.load(Ordering::Relaxed), 0);
    drop(b);
    assert_eq!(factory.deinits.load(Ordering::Relaxed), 1);
    assert_eq!(registry.active_count(), 0);
}

#[test]
fn test_root_api_created_once_lazily() {
    let factory = CountingFactory::new();
    let (_host, instance) = instance_with(&factory);

    assert!(!instance.has_root_api());
    let first = instance.root_api();
    assert!(instance.has_root_api());
    let second = instance.root_api();
    assert!(gangway::same_api(&first, &second));
}

#[test]
fn test_object_tag_params() {
    let factory = CountingFactory::new();
    let (_host, instance) = instance_with(&factory);

    instance.set_params([
        ("src".to_string(), Variant::from("movie.exm")),
        ("autoplay".to_string(), Variant::from(true)),
    ]);
    assert_eq!(instance.param("src").unwrap(), Variant::from("movie.exm"));
    assert_eq!(instance.param("autoplay").unwrap(), Variant::from(true));
    assert!(instance.param("loop").is_none());
    assert_eq!(instance.params().len(), 2);
}

#[test]
fn test_page_script_calls_plugin_method_end_to_end() {
    let factory = CountingFactory::new();
    let (host, instance) = instance_with(&factory);
    let bridge = instance.bridge().clone();

    // The host reflects the root object the way a browser would when the
    // page first touches the plugin element.
    let root = instance.root_api();
    let handle = bridge.wrap_scriptable(root.clone()).unwrap();
    assert_eq!(host.handle_of(&root), Some(handle));

    // plugin.sum(2, 3) from the page's side of the table.
    let result = bridge
        .invoke(handle, "sum", &[HostValue::Int(2), HostValue::Int(3)])
        .unwrap();
    assert_eq!(result, HostValue::Int(5));

    // plugin.sum("a", "b"): the object's binding policy is a conversion
    // error, surfaced as the host's native failure signal.
    let err = bridge
        .invoke(
            handle,
            "sum",
            &[HostValue::from_str("a"), HostValue::from_str("b")],
        )
        .unwrap_err();
    assert!(matches!(err, BridgeError::CallFailed { .. }));

    // Numeric strings convert per the variant coercion rules.
    let result = bridge
        .invoke(
            handle,
            "sum",
            &[HostValue::from_str("2"), HostValue::Int(3)],
        )
        .unwrap();
    assert_eq!(result, HostValue::Int(5));
}

#[test]
fn test_shutdown_severs_root_and_bridge() {
    let factory = CountingFactory::new();
    let (_host, instance) = instance_with(&factory);

    let root = instance.root_api();
    instance.shutdown();

    assert!(matches!(
        root.invoke("sum", &vec![]),
        Err(BridgeError::Invalidated)
    ));
    assert!(instance.bridge().is_shut_down());
    // Idempotent.
    instance.shutdown();
}

#[test]
fn test_plugin_info_surface() {
    let factory = CountingFactory::new();
    let info = factory.info();
    assert_eq!(info.name, "counting");
    assert!(info.supports("application/x-counting"));
    assert_eq!(
        info.description_for("application/x-counting"),
        "counting media"
    );
    assert_eq!(info.description_for("application/x-none"), "test plugin");
}
