//! Indicator LED bank.
//!
//! `N` discrete LEDs on output pins, bit `i` of the mask driving pin `i`.
//! Pins are acquired lazily on the first [`set_mask`](IndicatorPort::set_mask)
//! and driven low on [`release`](IndicatorPort::release).

use embedded_hal::digital::{OutputPin, PinState};
use log::{info, warn};

use crate::app::ports::IndicatorPort;

pub struct LedBank<P: OutputPin, const N: usize> {
    pins: [P; N],
    /// Last mask written; `None` while released.
    current: Option<u8>,
}

impl<P: OutputPin, const N: usize> LedBank<P, N> {
    pub fn new(pins: [P; N]) -> Self {
        Self {
            pins,
            current: None,
        }
    }

    pub fn current_mask(&self) -> Option<u8> {
        self.current
    }

    fn write(&mut self, mask: u8) {
        for (i, pin) in self.pins.iter_mut().enumerate() {
            let state = PinState::from(i < 8 && mask & (1 << i) != 0);
            if pin.set_state(state).is_err() {
                warn!("Indicator: LED {} write failed", i);
            }
        }
    }
}

impl<P: OutputPin, const N: usize> IndicatorPort for LedBank<P, N> {
    fn set_mask(&mut self, mask: u8) {
        if self.current == Some(mask) {
            return;
        }
        if self.current.is_none() {
            info!("Indicator: initialised {} LEDs", N);
        }
        self.write(mask);
        self.current = Some(mask);
    }

    fn release(&mut self) {
        if self.current.is_none() {
            return;
        }
        self.write(0);
        self.current = None;
        info!("Indicator: released");
    }
}
