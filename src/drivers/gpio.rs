//! Simulated GPIO lines.
//!
//! [`SimPin`] implements the `embedded-hal` digital traits over a shared
//! atomic level, so one clone can be driven by the board model (or a test)
//! while another is owned by a driver.

use core::convert::Infallible;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use embedded_hal::digital::{ErrorType, InputPin, OutputPin};

#[derive(Debug, Clone, Default)]
pub struct SimPin {
    level: Arc<AtomicBool>,
}

impl SimPin {
    /// A pin starting at `high`.
    pub fn new(high: bool) -> Self {
        Self {
            level: Arc::new(AtomicBool::new(high)),
        }
    }

    pub fn is_set_high(&self) -> bool {
        self.level.load(Ordering::Acquire)
    }

    /// Drive the line from outside (e.g. a button being pressed).
    pub fn drive(&self, high: bool) {
        self.level.store(high, Ordering::Release);
    }
}

impl ErrorType for SimPin {
    type Error = Infallible;
}

impl OutputPin for SimPin {
    fn set_low(&mut self) -> Result<(), Infallible> {
        self.drive(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.drive(true);
        Ok(())
    }
}

impl InputPin for SimPin {
    fn is_high(&mut self) -> Result<bool, Infallible> {
        Ok(self.is_set_high())
    }

    fn is_low(&mut self) -> Result<bool, Infallible> {
        Ok(!self.is_set_high())
    }
}
