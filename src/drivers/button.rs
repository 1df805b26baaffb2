//! Debounced two-switch button driver.
//!
//! ## Hardware
//!
//! Active-low momentary switches with pull-ups. `poll()` is called from the
//! main loop at tick rate and runs a debounce state machine per switch; a
//! press counts once the switch has been held for [`DEBOUNCE_MS`] and is
//! then released.

use std::collections::HashMap;

use embedded_hal::digital::InputPin;
use log::{debug, info, warn};

use crate::app::ports::{Button, ButtonAction, ButtonPort};
use crate::error::HwError;

pub const DEBOUNCE_MS: u64 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PressState {
    Idle,
    DebounceWait { since_ms: u64 },
    Held,
}

struct Switch<P> {
    pin: P,
    state: PressState,
}

impl<P: InputPin> Switch<P> {
    fn new(pin: P) -> Self {
        Self {
            pin,
            state: PressState::Idle,
        }
    }

    fn is_pressed(&mut self) -> Result<bool, HwError> {
        self.pin.is_low().map_err(|_| HwError::Gpio)
    }

    /// Advance the state machine. Returns `true` when a press completes.
    fn step(&mut self, pressed: bool, now_ms: u64) -> bool {
        match self.state {
            PressState::Idle => {
                if pressed {
                    self.state = PressState::DebounceWait { since_ms: now_ms };
                }
                false
            }
            PressState::DebounceWait { since_ms } => {
                if !pressed {
                    self.state = PressState::Idle;
                } else if now_ms.saturating_sub(since_ms) >= DEBOUNCE_MS {
                    self.state = PressState::Held;
                }
                false
            }
            PressState::Held => {
                if pressed {
                    return false;
                }
                self.state = PressState::Idle;
                true
            }
        }
    }
}

pub struct ButtonBank<P: InputPin> {
    switch1: Switch<P>,
    switch2: Switch<P>,
    bindings: HashMap<Button, ButtonAction>,
    initialised: bool,
}

impl<P: InputPin> ButtonBank<P> {
    pub fn new(switch1: P, switch2: P) -> Self {
        Self {
            switch1: Switch::new(switch1),
            switch2: Switch::new(switch2),
            bindings: HashMap::new(),
            initialised: false,
        }
    }

    fn switch(&mut self, button: Button) -> &mut Switch<P> {
        match button {
            Button::Switch1 => &mut self.switch1,
            Button::Switch2 => &mut self.switch2,
        }
    }
}

impl<P: InputPin> ButtonPort for ButtonBank<P> {
    fn init(&mut self) -> Result<(), HwError> {
        // A readable line is all the simulated and real boards need.
        self.switch1.is_pressed()?;
        self.switch2.is_pressed()?;
        self.switch1.state = PressState::Idle;
        self.switch2.state = PressState::Idle;
        self.initialised = true;
        info!("Buttons: initialised");
        Ok(())
    }

    fn bind(&mut self, button: Button, action: ButtonAction) -> Result<(), HwError> {
        if !self.initialised {
            return Err(HwError::NotInitialised);
        }
        debug!("Buttons: {:?} -> {:?}", button, action);
        self.bindings.insert(button, action);
        Ok(())
    }

    fn poll(&mut self, now_ms: u64) -> Option<ButtonAction> {
        if !self.initialised {
            return None;
        }
        let mut fired = None;
        for button in [Button::Switch1, Button::Switch2] {
            let switch = self.switch(button);
            let pressed = match switch.is_pressed() {
                Ok(p) => p,
                Err(e) => {
                    warn!("Buttons: {:?} read failed: {}", button, e);
                    false
                }
            };
            if switch.step(pressed, now_ms) && fired.is_none() {
                fired = self.bindings.get(&button).copied();
                if fired.is_none() {
                    debug!("Buttons: {:?} pressed but unbound", button);
                }
            }
        }
        fired
    }

    fn release(&mut self) {
        self.bindings.clear();
        self.initialised = false;
        info!("Buttons: released");
    }
}
