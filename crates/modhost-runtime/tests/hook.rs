//! The host instrumentation hook and the proxy lifecycle.
//!
//! This is the only test binary that touches the process-wide default
//! manager instance.

use std::sync::Arc;

use modhost_runtime::instrumentation::PluginComponent;
use modhost_runtime::{
    Host, LaunchPayload, LifecycleEvent, PluginInstrumentation, PluginManager, RuntimeError,
};
use modhost_test::{
    BundleBuilder, EventLog, HOST_COMPONENT_CLASS, HostComponent, RecordingComponent,
    RecordingLifecycle, RuntimeHarness, recording_component_class,
};

fn plugin_hook(host: &dyn Host) -> Arc<dyn modhost_runtime::Instrumentation> {
    let current = host.instrumentation();
    assert!(
        current.as_any().is::<PluginInstrumentation>(),
        "plugin instrumentation is not installed"
    );
    current
}

#[test]
fn hook_is_installed_once_per_host() {
    let harness = RuntimeHarness::new();
    assert_eq!(harness.host.set_instrumentation_calls(), 0);

    let first = harness.manager();
    let second = harness.builder().with_storage_dir("more-plugins").build().unwrap();
    assert_eq!(harness.host.set_instrumentation_calls(), 1);

    let hook = plugin_hook(harness.host.as_ref());
    let hook = hook.as_any().downcast_ref::<PluginInstrumentation>().unwrap();
    assert_eq!(hook.binding_count(), 2);

    drop(second);
    assert_eq!(hook.binding_count(), 1);
    drop(first);
    assert_eq!(hook.binding_count(), 0);
}

#[test]
fn building_off_the_control_thread_touches_nothing() {
    let harness = RuntimeHarness::new();
    let builder = harness.builder();

    let result = std::thread::spawn(move || builder.build().map(|_| ()))
        .join()
        .unwrap();

    assert!(matches!(result, Err(RuntimeError::WrongThread { .. })));
    assert_eq!(harness.host.set_instrumentation_calls(), 0);
    assert!(!harness.host.storage_path().join("plugins").exists());
}

#[test]
fn storage_failure_is_reported_before_the_hook() {
    let harness = RuntimeHarness::new();
    harness.host.fail_private_dir(true);

    let err = harness.builder().build().unwrap_err();
    assert!(matches!(err, RuntimeError::StorageIoFailed { .. }));
    assert_eq!(harness.host.set_instrumentation_calls(), 0);
}

#[test]
fn host_components_still_use_the_base_instrumentation() {
    let harness = RuntimeHarness::new();
    let _manager = harness.manager();

    let component = harness
        .host
        .run_component(
            &LaunchPayload::new(HOST_COMPONENT_CLASS),
            &[LifecycleEvent::Create, LifecycleEvent::Resume],
        )
        .unwrap();

    let home = component.as_any().downcast_ref::<HostComponent>().unwrap();
    assert_eq!(home.events(), &[LifecycleEvent::Create, LifecycleEvent::Resume]);
    assert_eq!(harness.host.base_instrumentation().created(), 1);
}

#[test]
fn proxied_component_runs_the_plugin_class_with_the_plugin_context() {
    let harness = RuntimeHarness::new();
    let log = EventLog::new();
    harness.backend.register(
        "com.example.player",
        [recording_component_class("com.example.player.NowPlaying", &log)],
    );
    let lifecycle = RecordingLifecycle::new();
    let manager = harness
        .builder()
        .with_lifecycle_callback(lifecycle.clone())
        .build()
        .unwrap();
    manager
        .install(
            &BundleBuilder::new("com.example.player")
                .with_code()
                .with_main_component(".NowPlaying")
                .write_to(harness.source_dir(), "player.mhb"),
        )
        .unwrap();

    let payload = manager
        .start_main_component(harness.host.context().as_ref(), "com.example.player")
        .unwrap();
    let component = harness
        .host
        .run_component(&payload, &LifecycleEvent::FULL_CYCLE)
        .unwrap();

    let plugin = component.as_any().downcast_ref::<PluginComponent>().unwrap();
    assert_eq!(plugin.package(), "com.example.player");
    assert_eq!(plugin.class_name(), "com.example.player.NowPlaying");
    assert_eq!(plugin.proxy_class(), payload.component);
    assert_eq!(plugin.context().package_name(), "com.example.player");
    let inner = plugin
        .inner()
        .as_any()
        .downcast_ref::<RecordingComponent>()
        .unwrap();
    assert_eq!(inner.class_name(), "com.example.player.NowPlaying");

    let expected: Vec<String> = LifecycleEvent::FULL_CYCLE
        .iter()
        .map(|e| format!("com.example.player.NowPlaying:{e}:com.example.player"))
        .collect();
    assert_eq!(log.entries(), expected);

    assert_eq!(
        lifecycle.events_for("com.example.player.NowPlaying"),
        LifecycleEvent::FULL_CYCLE.to_vec()
    );
    assert!(lifecycle.records().iter().all(|r| r.package == "com.example.player"));
    assert_eq!(harness.host.base_instrumentation().created(), 0);
}

#[test]
fn proxied_launch_of_an_uninstalled_plugin_fails_in_the_host() {
    let harness = RuntimeHarness::new();
    let manager = harness.manager();
    manager
        .install(
            &BundleBuilder::new("a.b")
                .with_main_component(".Main")
                .write_to(harness.source_dir(), "ab.mhb"),
        )
        .unwrap();
    let payload = manager
        .start_main_component(harness.host.context().as_ref(), "a.b")
        .unwrap();
    manager.uninstall("a.b").unwrap();

    let err = harness.host.run_component(&payload, &[]).err().unwrap();
    assert!(err.to_string().contains("not installed"));
}

#[test]
fn declared_component_without_a_class_fails_in_the_host() {
    let harness = RuntimeHarness::new();
    let manager = harness.manager();
    manager
        .install(
            &BundleBuilder::new("a.b")
                .with_main_component(".Ghost")
                .write_to(harness.source_dir(), "ab.mhb"),
        )
        .unwrap();
    let payload = manager
        .start_main_component(harness.host.context().as_ref(), "a.b")
        .unwrap();

    let err = harness.host.run_component(&payload, &[]).err().unwrap();
    assert!(err.to_string().contains("a.b.Ghost"));
}

#[test]
fn default_instance_is_initialized_once() {
    assert!(matches!(
        PluginManager::instance(),
        Err(RuntimeError::NotInitialized)
    ));

    let harness = RuntimeHarness::new();
    let first = PluginManager::init(harness.builder()).unwrap();
    let again = PluginManager::init(harness.builder().with_storage_dir("ignored")).unwrap();

    assert!(Arc::ptr_eq(&first, &again));
    assert!(Arc::ptr_eq(&first, &PluginManager::instance().unwrap()));
    assert!(!harness.host.storage_path().join("ignored").exists());
    assert_eq!(harness.host.set_instrumentation_calls(), 1);

    let builder = harness.builder();
    let off_thread = std::thread::spawn(move || PluginManager::init(builder).map(|_| ()))
        .join()
        .unwrap();
    assert!(matches!(off_thread, Err(RuntimeError::WrongThread { .. })));
    assert!(Arc::ptr_eq(&first, &PluginManager::instance().unwrap()));

    let other = Arc::new(harness.manager());
    assert!(matches!(
        PluginManager::set_instance(other),
        Err(RuntimeError::AlreadyInitialized)
    ));
}
