//! # HostStat Testing Utils
//!
//! Shared testing utilities for the telemetry agent workspace: in-memory
//! repositories and stores, fixed host counters, recording collection hooks
//! and script fixtures.
//!
//! ## Usage
//!
//! ```toml
//! [dev-dependencies]
//! hoststat-testing-utils = { path = "../testing-utils" }
//! ```

pub mod helpers;
pub mod mocks;

pub use helpers::*;
pub use mocks::*;
