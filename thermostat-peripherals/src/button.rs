use std::time::Duration;

use rppal::gpio::{Gpio, InputPin, Trigger};
use thermostat::InputEvent;
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;

use crate::{BusError, RppalError};

pub const CYCLE_BUTTON_PIN: u8 = 24;
pub const INCREASE_BUTTON_PIN: u8 = 25;
pub const DECREASE_BUTTON_PIN: u8 = 12;

pub const DEBOUNCE: Duration = Duration::from_millis(50);

#[derive(Error, Clone, Debug)]
pub enum ButtonError {
    #[error(transparent)]
    Bus(#[from] BusError),
    #[error("Could not set up interrupt handler on pin {0}")]
    Interrupt(u8, #[source] RppalError),
}

pub type Result<T> = std::result::Result<T, ButtonError>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ButtonPins {
    pub cycle: u8,
    pub increase: u8,
    pub decrease: u8,
}

impl Default for ButtonPins {
    fn default() -> Self {
        Self {
            cycle: CYCLE_BUTTON_PIN,
            increase: INCREASE_BUTTON_PIN,
            decrease: DECREASE_BUTTON_PIN,
        }
    }
}

impl ButtonPins {
    pub fn assignments(&self) -> [(u8, InputEvent); 3] {
        [
            (self.cycle, InputEvent::CycleMode),
            (self.increase, InputEvent::IncreaseSetPoint),
            (self.decrease, InputEvent::DecreaseSetPoint),
        ]
    }
}

/// Push buttons wired active-high with pull-downs. Each debounced press is
/// forwarded as an [`InputEvent`] until the buttons are dropped.
#[derive(Debug)]
pub struct Buttons {
    pins: Vec<InputPin>,
}

impl Buttons {
    pub fn start(
        pins: ButtonPins,
        debounce: Duration,
        sender: UnboundedSender<InputEvent>,
    ) -> Result<Buttons> {
        let gpio = Gpio::new().map_err(|_| BusError::Initialization("gpio"))?;
        let mut inputs = Vec::with_capacity(3);
        for (pin, event) in pins.assignments() {
            let mut input = gpio
                .get(pin)
                .map_err(|_| BusError::Pin(pin))?
                .into_input_pulldown();
            let sender = sender.clone();
            input
                .set_async_interrupt(Trigger::RisingEdge, Some(debounce), move |_| {
                    trace!("button on pin {} pressed", pin);
                    if sender.send(event).is_err() {
                        info!("button event receiver closed");
                    }
                })
                .map_err(|e| ButtonError::Interrupt(pin, RppalError::from(e)))?;
            info!("listening for {:?} on pin {}", event, pin);
            inputs.push(input);
        }
        Ok(Buttons { pins: inputs })
    }

    pub fn stop(&mut self) {
        for pin in &mut self.pins {
            if let Err(e) = pin.clear_async_interrupt() {
                error!("could not clear interrupt on pin {}: {}", pin.pin(), e);
            }
        }
    }
}

impl Drop for Buttons {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_wiring() {
        let pins = ButtonPins::default();
        assert_eq!(
            pins.assignments(),
            [
                (24, InputEvent::CycleMode),
                (25, InputEvent::IncreaseSetPoint),
                (12, InputEvent::DecreaseSetPoint),
            ]
        );
    }
}
