#![deny(unsafe_code)]

//! Shared test utilities for the termbank workspace.
//!
//! Provides reusable fixtures, config builders, and tracing helpers so that
//! individual crate tests stay concise and consistent.
//!
//! Add this crate as a `[dev-dependency]` in any workspace member:
//!
//! ```toml
//! [dev-dependencies]
//! termbank-test-utils = { workspace = true }
//! ```
//!
//! Types here implement `termbank-core` traits. Use them from integration
//! tests (`tests/`), not from `termbank-core`'s own unit tests, which see a
//! separate copy of the core crate.

pub mod config;
pub mod context;
pub mod fixtures;
pub mod log_capture;
pub mod tracing_setup;
