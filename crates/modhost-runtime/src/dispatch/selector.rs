//! Proxy component selection.
//!
//! The host only knows a fixed set of generic proxy components. Each plugin
//! launch is redirected to one of them, picked from the target component's
//! declaration.

use std::fmt;

use crate::manifest::{ComponentDescriptor, LaunchMode};

/// The generic proxy components registered with the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProxyComponentId {
    /// Proxy for standard launch mode.
    Standard,
    /// Proxy for single-top launch mode.
    SingleTop,
    /// Proxy for single-task launch mode.
    SingleTask,
    /// Proxy for single-instance launch mode.
    SingleInstance,
    /// Proxy with a translucent window, for dialogs and overlays.
    Translucent,
}

impl ProxyComponentId {
    /// Every proxy, in declaration order.
    pub const ALL: [Self; 5] = [
        Self::Standard,
        Self::SingleTop,
        Self::SingleTask,
        Self::SingleInstance,
        Self::Translucent,
    ];

    /// Host class name of the proxy.
    #[must_use]
    pub fn class_name(self) -> &'static str {
        match self {
            Self::Standard => "modhost.proxy.StandardProxy",
            Self::SingleTop => "modhost.proxy.SingleTopProxy",
            Self::SingleTask => "modhost.proxy.SingleTaskProxy",
            Self::SingleInstance => "modhost.proxy.SingleInstanceProxy",
            Self::Translucent => "modhost.proxy.TranslucentProxy",
        }
    }

    /// Inverse of [`class_name`](Self::class_name).
    #[must_use]
    pub fn from_class_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|proxy| proxy.class_name() == name)
    }
}

impl fmt::Display for ProxyComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.class_name())
    }
}

/// Chooses the proxy that hosts a plugin component.
pub trait ComponentSelector: Send + Sync {
    /// Pick the proxy for `component`.
    fn select(&self, component: &ComponentDescriptor) -> ProxyComponentId;
}

impl<F> ComponentSelector for F
where
    F: Fn(&ComponentDescriptor) -> ProxyComponentId + Send + Sync,
{
    fn select(&self, component: &ComponentDescriptor) -> ProxyComponentId {
        self(component)
    }
}

/// Translucent and dialog themes get the translucent proxy; everything else
/// is matched on launch mode.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultSelector;

impl ComponentSelector for DefaultSelector {
    fn select(&self, component: &ComponentDescriptor) -> ProxyComponentId {
        let translucent = component.theme.as_deref().is_some_and(|theme| {
            let theme = theme.to_ascii_lowercase();
            theme.contains("translucent") || theme.contains("dialog")
        });
        if translucent {
            return ProxyComponentId::Translucent;
        }
        match component.launch_mode {
            LaunchMode::Standard => ProxyComponentId::Standard,
            LaunchMode::SingleTop => ProxyComponentId::SingleTop,
            LaunchMode::SingleTask => ProxyComponentId::SingleTask,
            LaunchMode::SingleInstance => ProxyComponentId::SingleInstance,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn component(mode: LaunchMode, theme: Option<&str>) -> ComponentDescriptor {
        ComponentDescriptor {
            launch_mode: mode,
            theme: theme.map(str::to_string),
            ..ComponentDescriptor::new("a.b.Screen")
        }
    }

    #[test]
    fn launch_modes_map_one_to_one() {
        let cases = [
            (LaunchMode::Standard, ProxyComponentId::Standard),
            (LaunchMode::SingleTop, ProxyComponentId::SingleTop),
            (LaunchMode::SingleTask, ProxyComponentId::SingleTask),
            (LaunchMode::SingleInstance, ProxyComponentId::SingleInstance),
        ];
        for (mode, proxy) in cases {
            assert_eq!(DefaultSelector.select(&component(mode, None)), proxy);
        }
    }

    #[test]
    fn dialog_and_translucent_themes_win() {
        assert_eq!(
            DefaultSelector.select(&component(LaunchMode::SingleTask, Some("Theme.Dialog"))),
            ProxyComponentId::Translucent
        );
        assert_eq!(
            DefaultSelector.select(&component(LaunchMode::Standard, Some("Theme.TRANSLUCENT.NoTitle"))),
            ProxyComponentId::Translucent
        );
        assert_eq!(
            DefaultSelector.select(&component(LaunchMode::Standard, Some("Theme.Light"))),
            ProxyComponentId::Standard
        );
    }

    #[test]
    fn class_names_round_trip() {
        for proxy in ProxyComponentId::ALL {
            assert_eq!(ProxyComponentId::from_class_name(proxy.class_name()), Some(proxy));
        }
        assert_eq!(ProxyComponentId::from_class_name("host.Main"), None);
    }

    #[test]
    fn closures_are_selectors() {
        let always_standard = |_: &ComponentDescriptor| ProxyComponentId::Standard;
        assert_eq!(
            always_standard.select(&component(LaunchMode::SingleInstance, Some("Dialog"))),
            ProxyComponentId::Standard
        );
    }
}
