//! Indicator and button drivers over `embedded-hal` pins.

pub mod button;
pub mod gpio;
pub mod led_bank;
