//! Clicker provisioning daemon library.
//!
//! Exposes the controller, the IPC agent, and the shipped adapters for the
//! daemon binary and for integration testing.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod drivers;
pub mod error;
pub mod events;
pub mod ipc;
