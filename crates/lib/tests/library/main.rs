//! Integration tests for clawup-lib, run against a simulated host.

mod common;
mod reconcile_tests;
mod uninstall_tests;
