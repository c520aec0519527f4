//! Launch requests and the payloads handed to the host.
//!
//! A [`LaunchRequest`] names a plugin component. It is resolved against the
//! plugin's manifest, mapped to a proxy component by a
//! [`ComponentSelector`], and turned into a [`LaunchPayload`] whose extras
//! carry the real target under [`PLUGIN_TARGET_EXTRA`].

pub mod selector;

use serde::{Deserialize, Serialize};

use crate::error::{RuntimeError, RuntimeResult};
use crate::manifest::{BundleManifest, ComponentDescriptor};

pub use selector::{ComponentSelector, DefaultSelector, ProxyComponentId};

/// Extras key holding the [`PluginTarget`] of a proxied launch.
pub const PLUGIN_TARGET_EXTRA: &str = "modhost.plugin_target";

/// Opaque launch arguments.
pub type Extras = serde_json::Map<String, serde_json::Value>;

/// The plugin component a proxy stands in for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginTarget {
    /// Component class inside the plugin.
    pub class_name: String,
    /// Owning plugin package.
    pub package_name: String,
}

impl PluginTarget {
    /// Read the tag from payload extras.
    #[must_use]
    pub fn from_extras(extras: &Extras) -> Option<Self> {
        serde_json::from_value(extras.get(PLUGIN_TARGET_EXTRA)?.clone()).ok()
    }
}

/// Which component of a plugin to launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchTarget {
    /// The component flagged `main`.
    Main,
    /// A component by class name. Relative names are accepted.
    Component(String),
}

/// A request to launch a plugin component.
#[derive(Debug, Clone, PartialEq)]
pub struct LaunchRequest {
    /// Target plugin.
    pub package_name: String,
    /// Target component.
    pub target: LaunchTarget,
    /// Arguments passed through to the component.
    pub extras: Extras,
}

impl LaunchRequest {
    /// Launch the plugin's main component.
    #[must_use]
    pub fn main(package_name: impl Into<String>) -> Self {
        Self {
            package_name: package_name.into(),
            target: LaunchTarget::Main,
            extras: Extras::new(),
        }
    }

    /// Launch a specific component.
    #[must_use]
    pub fn component(package_name: impl Into<String>, class_name: impl Into<String>) -> Self {
        Self {
            package_name: package_name.into(),
            target: LaunchTarget::Component(class_name.into()),
            extras: Extras::new(),
        }
    }

    /// Add a launch argument.
    #[must_use]
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.extras.insert(key.into(), value.into());
        self
    }
}

/// What the host's native dispatch receives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaunchPayload {
    /// Host class name of the component to start.
    pub component: String,
    /// Launch arguments, including the plugin tag for proxied launches.
    pub extras: Extras,
}

impl LaunchPayload {
    /// A payload for a host component, without plugin tag.
    #[must_use]
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            extras: Extras::new(),
        }
    }

    /// The plugin target, when this payload is a proxied launch.
    #[must_use]
    pub fn plugin_target(&self) -> Option<PluginTarget> {
        PluginTarget::from_extras(&self.extras)
    }

    /// The proxy this payload targets, if it targets one.
    #[must_use]
    pub fn proxy(&self) -> Option<ProxyComponentId> {
        ProxyComponentId::from_class_name(&self.component)
    }
}

/// Find the component `target` names in `manifest`.
pub(crate) fn resolve_component<'m>(
    manifest: &'m BundleManifest,
    target: &LaunchTarget,
) -> RuntimeResult<&'m ComponentDescriptor> {
    let found = match target {
        LaunchTarget::Main => manifest.main_component(),
        LaunchTarget::Component(class_name) => manifest.find_component(class_name),
    };
    found.ok_or_else(|| RuntimeError::ComponentNotFound {
        package: manifest.package_name().to_string(),
        class_name: match target {
            LaunchTarget::Main => "<main>".to_string(),
            LaunchTarget::Component(class_name) => class_name.clone(),
        },
    })
}

/// Build the proxied payload for `component` of `package_name`.
pub(crate) fn build_payload(
    package_name: &str,
    component: &ComponentDescriptor,
    proxy: ProxyComponentId,
    mut extras: Extras,
) -> LaunchPayload {
    let target = serde_json::json!({
        "class_name": component.class_name,
        "package_name": package_name,
    });
    extras.insert(PLUGIN_TARGET_EXTRA.to_string(), target);
    LaunchPayload {
        component: proxy.class_name().to_string(),
        extras,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest() -> BundleManifest {
        BundleManifest::parse(
            r#"
            [package]
            name = "a.b"
            [[component]]
            class = ".Main"
            main = true
            [[component]]
            class = ".Other"
            "#,
        )
        .unwrap()
    }

    #[test]
    fn resolves_main_and_named_components() {
        let manifest = manifest();
        assert_eq!(
            resolve_component(&manifest, &LaunchTarget::Main).unwrap().class_name,
            "a.b.Main"
        );
        assert_eq!(
            resolve_component(&manifest, &LaunchTarget::Component(".Other".into()))
                .unwrap()
                .class_name,
            "a.b.Other"
        );
    }

    #[test]
    fn unknown_component_is_reported() {
        let err = resolve_component(&manifest(), &LaunchTarget::Component("a.b.Nope".into()))
            .unwrap_err();
        assert!(matches!(err, RuntimeError::ComponentNotFound { ref class_name, .. } if class_name == "a.b.Nope"));
    }

    #[test]
    fn payload_is_tagged_and_keeps_extras() {
        let manifest = manifest();
        let component = manifest.main_component().unwrap();
        let request = LaunchRequest::main("a.b").with_extra("note_id", 7);
        let payload = build_payload("a.b", component, ProxyComponentId::SingleTop, request.extras);

        assert_eq!(payload.proxy(), Some(ProxyComponentId::SingleTop));
        assert_eq!(payload.extras.get("note_id"), Some(&serde_json::json!(7)));
        assert_eq!(
            payload.plugin_target(),
            Some(PluginTarget {
                class_name: "a.b.Main".into(),
                package_name: "a.b".into(),
            })
        );
    }

    #[test]
    fn host_payload_has_no_tag() {
        let payload = LaunchPayload::new("host.Main");
        assert!(payload.plugin_target().is_none());
        assert!(payload.proxy().is_none());
    }
}
