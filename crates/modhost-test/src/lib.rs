//! Modhost Test - Shared test utilities for the modhost runtime.
//!
//! Provides bundle fixtures and a mock host that can be used across the
//! modhost crates as a dev-dependency.
//!
//! # Usage
//!
//! ```rust,ignore
//! use modhost_test::{BundleBuilder, MockHost, test_dir};
//! use modhost_runtime::PluginManager;
//!
//! #[test]
//! fn installs_a_bundle() {
//!     let dir = test_dir();
//!     let bundle = BundleBuilder::new("com.example.notes")
//!         .with_main_component(".Main")
//!         .write_to(dir.path(), "notes.mhb");
//!
//!     let host = MockHost::new();
//!     let manager = PluginManager::builder(host.clone()).build().unwrap();
//!     manager.install(&bundle).unwrap();
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod fixtures;
pub mod harness;
pub mod mocks;

pub use fixtures::*;
pub use harness::*;
pub use mocks::*;
