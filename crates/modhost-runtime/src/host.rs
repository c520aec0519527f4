//! The host platform as seen by the runtime.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, ThreadId};

use crate::context::Context;
use crate::instrumentation::Instrumentation;

/// Error reported by the host when it refuses a request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct HostError(pub String);

impl HostError {
    /// Create a host error from any message.
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Services the host process provides to the plugin manager.
pub trait Host: Send + Sync {
    /// Whether the calling thread is the host's control thread.
    fn is_control_thread(&self) -> bool;

    /// The host's application-wide context.
    fn application_context(&self) -> Arc<dyn Context>;

    /// A process-private directory named `name`, created if needed.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the directory cannot be created.
    fn private_dir(&self, name: &str) -> io::Result<PathBuf>;

    /// The currently installed global instrumentation.
    fn instrumentation(&self) -> Arc<dyn Instrumentation>;

    /// Replace the global instrumentation.
    fn set_instrumentation(&self, instrumentation: Arc<dyn Instrumentation>);
}

/// Remembers which thread is the control thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlThread(ThreadId);

impl ControlThread {
    /// Mark the calling thread as the control thread.
    #[must_use]
    pub fn current() -> Self {
        Self(thread::current().id())
    }

    /// Whether the calling thread is the control thread.
    #[must_use]
    pub fn is_current(&self) -> bool {
        thread::current().id() == self.0
    }
}

impl Default for ControlThread {
    fn default() -> Self {
        Self::current()
    }
}

/// Name of the calling thread for diagnostics.
pub(crate) fn current_thread_label() -> String {
    let current = thread::current();
    current
        .name()
        .map_or_else(|| format!("{:?}", current.id()), str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_thread_detects_other_threads() {
        let control = ControlThread::current();
        assert!(control.is_current());
        let seen_elsewhere = thread::spawn(move || control.is_current()).join().unwrap();
        assert!(!seen_elsewhere);
    }
}
