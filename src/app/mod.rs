//! Application core: domain logic behind port traits.
//!
//! This module holds the rules of the provisioning daemon: which clickers
//! are connected and selected, how the LEDs show it, and how a provisioning
//! attempt runs from button press to disconnect. All interaction with
//! hardware, the bus, and storage happens through **port traits** defined in
//! [`ports`], so this layer is testable without real peripherals.

pub mod clicker;
pub mod controller;
pub mod ports;
pub mod selection;
pub mod service;
