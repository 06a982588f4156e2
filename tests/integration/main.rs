//! Integration tests

mod common;
mod config_tests;
mod discovery_tests;
mod edge_tests;
mod motion_tests;
mod shutdown_tests;
mod writer_tests;
