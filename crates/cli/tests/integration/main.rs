//! End-to-end tests that drive the `cforge` binary against a stand-in compiler.

#![cfg(unix)]

mod build_tests;
mod clean_tests;
mod common;
