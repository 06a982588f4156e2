//! Core module - Configuration, device events and shutdown

pub mod config;
pub mod events;
pub mod lifecycle;
