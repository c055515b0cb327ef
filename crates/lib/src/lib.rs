//! cforge-lib: incremental builds for a C library and its dependents.
//!
//! The crate builds three kinds of artifact from one source tree:
//! - a shared library (`lib<name>.<suffix>`) from the library sources
//! - one driver executable per source in the executables directory
//! - one extension module per source found below the module tree
//!
//! A build resolves the host platform, composes immutable flag sets, refreshes
//! per-source dependency records, then brings every stale target up to date in
//! dependency order.

pub mod build;
pub mod clean;
pub mod config;
pub mod consts;
pub mod deps;
pub mod execute;
pub mod materialize;
pub mod platform;
pub mod staleness;
pub mod util;
