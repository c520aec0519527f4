//! Launchable components and their lifecycle.

use std::any::Any;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::context::Context;

/// Lifecycle transitions the host drives a component through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleEvent {
    /// The component was instantiated.
    Create,
    /// The component became visible.
    Start,
    /// The component gained focus.
    Resume,
    /// The component lost focus.
    Pause,
    /// The component is no longer visible.
    Stop,
    /// The component is being torn down.
    Destroy,
}

impl LifecycleEvent {
    /// Events of a full create-to-destroy pass, in order.
    pub const FULL_CYCLE: [Self; 6] = [
        Self::Create,
        Self::Start,
        Self::Resume,
        Self::Pause,
        Self::Stop,
        Self::Destroy,
    ];

    /// Lowercase event name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Start => "start",
            Self::Resume => "resume",
            Self::Pause => "pause",
            Self::Stop => "stop",
            Self::Destroy => "destroy",
        }
    }
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A launchable unit of UI or work, owned by the host once created.
pub trait Component: Send {
    /// Handle a lifecycle transition.
    fn on_lifecycle(&mut self, _event: LifecycleEvent, _context: &dyn Context) {}

    /// Downcast support.
    fn as_any(&self) -> &dyn Any;

    /// Mutable downcast support.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}
