//! Logging setup for the modhost plugin runtime.
//!
//! The runtime itself only emits `tracing` events. Binaries call
//! [`setup_logging`] once at startup to decide where those events go.
//!
//! # Example
//!
//! ```rust,no_run
//! use modhost_telemetry::{LogConfig, LogFormat, setup_logging};
//!
//! # fn main() -> Result<(), modhost_telemetry::TelemetryError> {
//! let config = LogConfig::new("info")
//!     .with_format(LogFormat::Compact)
//!     .with_directive("modhost_runtime=debug");
//!
//! setup_logging(&config)?;
//! tracing::info!("logging ready");
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

mod error;
mod logging;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{
    FileLogConfig, FileRotation, LogConfig, LogFormat, LogTarget, setup_default_logging,
    setup_logging,
};
