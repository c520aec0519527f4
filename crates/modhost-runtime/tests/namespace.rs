//! Per-bundle class and resource isolation, plugin contexts, and concurrent
//! access to the registry.

use std::sync::Arc;

use modhost_runtime::namespace::loader::{Class, ClassLoader};
use modhost_runtime::namespace::resources::{Configuration, DisplayMetrics, Orientation};
use modhost_runtime::{Component, Context, PluginManager};
use modhost_test::{
    BundleBuilder, CLOCK_SERVICE, EventLog, HOST_ONLY_CLASS, MockHost, RuntimeHarness,
    host_class_loader, recording_component_class,
};

#[test]
fn same_class_name_resolves_per_bundle() {
    let harness = RuntimeHarness::new();
    let first_log = EventLog::new();
    let second_log = EventLog::new();
    harness
        .backend
        .register("com.first", [recording_component_class("shared.Widget", &first_log)]);
    harness
        .backend
        .register("com.second", [recording_component_class("shared.Widget", &second_log)]);
    let manager = harness.manager();
    for (package, file) in [("com.first", "first.mhb"), ("com.second", "second.mhb")] {
        manager
            .install(
                &BundleBuilder::new(package)
                    .with_code()
                    .write_to(harness.source_dir(), file),
            )
            .unwrap();
    }

    let first = manager.find_plugin("com.first").unwrap();
    let second = manager.find_plugin("com.second").unwrap();
    let first_class = first.class_loader().load_class("shared.Widget").unwrap();
    let second_class = second.class_loader().load_class("shared.Widget").unwrap();
    assert_eq!(first_class.defining_loader(), "com.first");
    assert_eq!(second_class.defining_loader(), "com.second");

    let mut widget = first_class.new_component().unwrap();
    widget.on_lifecycle(
        modhost_runtime::LifecycleEvent::Start,
        first.context().as_ref(),
    );
    assert_eq!(first_log.entries().len(), 1);
    assert!(second_log.entries().is_empty());
}

#[test]
fn host_classes_are_hidden_by_default() {
    let harness = RuntimeHarness::new();
    let manager = harness.manager();
    manager
        .install(&BundleBuilder::new("a.b").write_to(harness.source_dir(), "ab.mhb"))
        .unwrap();

    let loader = manager.find_plugin("a.b").unwrap().class_loader().clone();
    assert!(loader.load_class(HOST_ONLY_CLASS).is_none());
    assert!(loader.load_class(modhost_runtime::DEFAULT_ENTRY_CLASS).is_some());
}

#[test]
fn host_parent_loader_exposes_host_classes() {
    let harness = RuntimeHarness::new();
    let manager = harness
        .builder()
        .with_parent_loader(host_class_loader())
        .build()
        .unwrap();
    manager
        .install(
            &BundleBuilder::new("a.b")
                .with_application(HOST_ONLY_CLASS)
                .write_to(harness.source_dir(), "ab.mhb"),
        )
        .unwrap();

    let plugin = manager.find_plugin("a.b").unwrap();
    assert_eq!(plugin.entry().class_name(), HOST_ONLY_CLASS);
    let class = plugin.class_loader().load_class(HOST_ONLY_CLASS).unwrap();
    assert_eq!(class.defining_loader(), "modhost.host");
}

fn localized_bundle() -> BundleBuilder {
    BundleBuilder::new("com.example.weather")
        .with_resources(
            "",
            "strings.toml",
            "[string]\ntitle = \"Weather\"\nunit = \"F\"\n[integer]\ncolumns = 2\n[bool]\ncompact = false\n",
        )
        .with_resources("fr", "strings.toml", "[string]\ntitle = \"Météo\"\nunit = \"C\"\n")
        .with_resources("fr-rCA", "strings.toml", "[string]\nunit = \"C (CA)\"\n")
        .with_resources("land", "layout.toml", "[integer]\ncolumns = 4\n")
        .with_resources("hdpi", "icons.toml", "[string]\nicon = \"icon-hdpi\"\n")
        .with_resources("xxhdpi", "icons.toml", "[string]\nicon = \"icon-xxhdpi\"\n")
        .with_resources("mdpi", "icons.toml", "[string]\nicon = \"icon-mdpi\"\n")
        .with_asset("forecast.json", b"{\"days\": 7}".to_vec())
}

fn install_with_display(metrics: DisplayMetrics, configuration: Configuration) -> Arc<modhost_runtime::BundleDescriptor> {
    let host = MockHost::with_display(metrics, configuration);
    let sources = modhost_test::test_dir();
    let manager = PluginManager::builder(host).build().unwrap();
    manager
        .install(&localized_bundle().write_to(sources.path(), "weather.mhb"))
        .unwrap()
        .remove(0)
}

#[test]
fn resources_follow_the_host_configuration() {
    let default = install_with_display(DisplayMetrics::default(), Configuration::default());
    let resources = default.resources();
    assert_eq!(resources.get_string("title"), Some("Weather"));
    assert_eq!(resources.get_string("unit"), Some("F"));
    assert_eq!(resources.get_integer("columns"), Some(2));
    assert_eq!(resources.get_bool("compact"), Some(false));
    assert_eq!(resources.get_string("icon"), Some("icon-mdpi"));

    let canadian = install_with_display(
        DisplayMetrics {
            density_dpi: 320,
            ..DisplayMetrics::default()
        },
        Configuration {
            locale: "fr-CA".to_string(),
            orientation: Orientation::Landscape,
        },
    );
    let resources = canadian.resources();
    assert_eq!(resources.get_string("title"), Some("Météo"));
    assert_eq!(resources.get_string("unit"), Some("C (CA)"));
    assert_eq!(resources.get_integer("columns"), Some(4));
    assert_eq!(resources.get_string("icon"), Some("icon-xxhdpi"));
    assert_eq!(resources.metrics().density_dpi, 320);
    assert_eq!(resources.configuration().orientation, Orientation::Landscape);
}

#[test]
fn plugin_context_mixes_bundle_and_host_views() {
    let harness = RuntimeHarness::new();
    let manager = harness.manager();
    let descriptor = manager
        .install(&localized_bundle().write_to(harness.source_dir(), "weather.mhb"))
        .unwrap()
        .remove(0);
    let context = descriptor.context();

    assert_eq!(context.package_name(), "com.example.weather");
    assert_eq!(context.resources().get_string("title"), Some("Weather"));
    assert_eq!(
        context.open_asset("forecast.json").as_deref(),
        Some(&b"{\"days\": 7}"[..])
    );
    assert!(context.open_asset("missing.json").is_none());
    assert_eq!(context.class_loader().name(), "com.example.weather");

    let clock = context.system_service(CLOCK_SERVICE).unwrap();
    assert_eq!(clock.downcast_ref::<String>().unwrap(), "mock-clock");
    assert_eq!(context.application_context().package_name(), "modhost.host");

    let host = harness.host.context();
    assert!(host.open_asset("forecast.json").is_none());
    assert!(host.resources().get_string("title").is_none());
}

#[test]
fn base_context_attaches_only_once() {
    let harness = RuntimeHarness::new();
    let manager = harness.manager();
    let descriptor = manager
        .install(&BundleBuilder::new("a.b").write_to(harness.source_dir(), "ab.mhb"))
        .unwrap()
        .remove(0);

    let entry = descriptor.entry();
    assert!(entry.is_attached());
    let err = entry
        .attach_base_context(harness.host.context().clone())
        .unwrap_err();
    assert!(err.contains("already attached"));
    assert_eq!(entry.base_context().unwrap().package_name(), "a.b");
}

#[test]
fn readers_see_whole_descriptors_during_installs() {
    let harness = RuntimeHarness::new();
    harness.backend.register(
        "com.busy",
        [Class::component("com.busy.Main", || {
            Ok(Box::new(modhost_test::HostComponent::default()) as Box<dyn Component>)
        })],
    );
    let manager = harness.manager();
    let source = BundleBuilder::new("com.busy")
        .with_code()
        .with_main_component(".Main")
        .write_to(harness.source_dir(), "busy.mhb");
    manager.install(&source).unwrap();

    let host = harness.host.context().clone();
    std::thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| {
                for _ in 0..50 {
                    let plugin = manager.find_plugin("com.busy").unwrap();
                    assert_eq!(plugin.package_name(), "com.busy");
                    assert!(plugin.entry().is_attached());
                    assert!(plugin.class_loader().load_class("com.busy.Main").is_some());
                    manager
                        .start_main_component(host.as_ref(), "com.busy")
                        .unwrap();
                }
            });
        }
        for _ in 0..10 {
            manager.install(&source).unwrap();
        }
    });

    assert_eq!(manager.plugins().len(), 1);
    assert_eq!(host.dispatched().len(), 200);
}
