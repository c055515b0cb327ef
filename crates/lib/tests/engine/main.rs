//! End-to-end engine tests driven through a recording toolchain.

mod build_tests;
mod clean_tests;
mod common;
