use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use rppal::gpio::{Gpio, OutputPin};
use thermostat::{ActuatorPort, Channel, Indicator};
use thiserror::Error;

use crate::{BusError, RppalError};

pub const HEAT_LED_PIN: u8 = 18;
pub const COOL_LED_PIN: u8 = 23;

const PWM_FREQUENCY: f64 = 100.0;
/// Brightness updates per second while pulsing.
const FADE_STEPS: u32 = 50;

#[derive(Error, Clone, Debug)]
pub enum LedError {
    #[error(transparent)]
    Bus(#[from] BusError),
    #[error("Could not send to led thread")]
    Send,
}

pub type Result<T> = std::result::Result<T, LedError>;

/// Default pin for an indicator channel.
pub fn default_pin(channel: Channel) -> u8 {
    match channel {
        Channel::Heat => HEAT_LED_PIN,
        Channel::Cool => COOL_LED_PIN,
    }
}

/// Brightness in `0.0..=1.0` at `elapsed` into a pulse: a linear ramp up over
/// `fade_in`, then down over `fade_out`, repeating.
pub fn pulse_brightness(fade_in: Duration, fade_out: Duration, elapsed: Duration) -> f64 {
    let period = fade_in + fade_out;
    if period.is_zero() {
        return 1.0;
    }
    let phase = elapsed.as_secs_f64() % period.as_secs_f64();
    let fade_in = fade_in.as_secs_f64();
    if phase < fade_in {
        phase / fade_in
    } else {
        1.0 - (phase - fade_in) / fade_out.as_secs_f64()
    }
}

fn set_brightness(pin: &mut OutputPin, brightness: f64) -> std::result::Result<(), RppalError> {
    if brightness <= 0.0 {
        pin.clear_pwm()?;
        pin.set_low();
    } else if brightness >= 1.0 {
        pin.clear_pwm()?;
        pin.set_high();
    } else {
        pin.set_pwm_frequency(PWM_FREQUENCY, brightness)?;
    }
    Ok(())
}

#[derive(Debug, Clone)]
enum LedMessage {
    Set(Indicator),
    Stop,
}

/// A single LED driven from its own thread so pulses keep fading between
/// commands.
#[derive(Debug)]
pub struct Led {
    pin: u8,
    current: Indicator,
    sender: mpsc::Sender<LedMessage>,
}

impl Led {
    pub fn new(pin: u8) -> Result<Led> {
        let mut output = Gpio::new()
            .map_err(|_| BusError::Initialization("gpio"))?
            .get(pin)
            .map_err(|_| BusError::Pin(pin))?
            .into_output_low();
        let (sender, receiver) = mpsc::channel();
        thread::Builder::new()
            .name(format!("led-{}", pin))
            .spawn(move || {
                info!("starting led thread on pin {}", pin);
                let step = Duration::from_secs(1) / FADE_STEPS;
                let mut indicator = Indicator::Off;
                let mut pulse_start = Instant::now();
                loop {
                    let message = match indicator {
                        Indicator::Pulse { fade_in, fade_out } => {
                            let brightness =
                                pulse_brightness(fade_in, fade_out, pulse_start.elapsed());
                            if let Err(e) = set_brightness(&mut output, brightness) {
                                error!("could not set led {} brightness: {}", pin, e);
                            }
                            match receiver.recv_timeout(step) {
                                Ok(message) => message,
                                Err(mpsc::RecvTimeoutError::Timeout) => continue,
                                Err(mpsc::RecvTimeoutError::Disconnected) => break,
                            }
                        }
                        _ => match receiver.recv() {
                            Ok(message) => message,
                            Err(_) => break,
                        },
                    };
                    match message {
                        LedMessage::Set(next) => {
                            trace!("led {} -> {:?}", pin, next);
                            indicator = next;
                            pulse_start = Instant::now();
                            let brightness = match next {
                                Indicator::Off => 0.0,
                                Indicator::On => 1.0,
                                Indicator::Pulse { .. } => continue,
                            };
                            if let Err(e) = set_brightness(&mut output, brightness) {
                                error!("could not set led {}: {}", pin, e);
                            }
                        }
                        LedMessage::Stop => break,
                    }
                }
                if let Err(e) = set_brightness(&mut output, 0.0) {
                    error!("could not switch off led {}: {}", pin, e);
                }
                info!("led thread on pin {} stopping", pin);
            })
            .map_err(|_| BusError::Thread("led"))?;
        Ok(Led {
            pin,
            current: Indicator::Off,
            sender,
        })
    }

    pub fn from_channel(channel: Channel) -> Result<Led> {
        Self::new(default_pin(channel))
    }

    pub fn pin(&self) -> u8 {
        self.pin
    }

    /// Repeating the current indicator is a no-op, so a pulse keeps its phase.
    pub fn set(&mut self, indicator: Indicator) -> Result<()> {
        if indicator == self.current {
            return Ok(());
        }
        self.sender
            .send(LedMessage::Set(indicator))
            .map_err(|_| LedError::Send)?;
        self.current = indicator;
        Ok(())
    }

    pub fn on(&mut self) -> Result<()> {
        self.set(Indicator::On)
    }

    pub fn off(&mut self) -> Result<()> {
        self.set(Indicator::Off)
    }

    pub fn pulse(&mut self, fade_in: Duration, fade_out: Duration) -> Result<()> {
        self.set(Indicator::Pulse { fade_in, fade_out })
    }
}

impl Drop for Led {
    fn drop(&mut self) {
        if self.sender.send(LedMessage::Stop).is_err() {
            trace!("led thread on pin {} already stopped", self.pin);
        }
    }
}

/// Heat and cool indicator LEDs.
#[derive(Debug)]
pub struct IndicatorLeds {
    heat: Led,
    cool: Led,
}

impl IndicatorLeds {
    pub fn new(heat_pin: u8, cool_pin: u8) -> Result<IndicatorLeds> {
        Ok(IndicatorLeds {
            heat: Led::new(heat_pin)?,
            cool: Led::new(cool_pin)?,
        })
    }
}

impl ActuatorPort for IndicatorLeds {
    fn command(&mut self, channel: Channel, indicator: Indicator) {
        let led = match channel {
            Channel::Heat => &mut self.heat,
            Channel::Cool => &mut self.cool,
        };
        if let Err(e) = led.set(indicator) {
            error!("could not set {} led: {}", channel, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECOND: Duration = Duration::from_secs(1);

    #[test]
    fn pulse_ramps_up_then_down() {
        assert_eq!(pulse_brightness(SECOND, SECOND, Duration::ZERO), 0.0);
        assert_eq!(pulse_brightness(SECOND, SECOND, Duration::from_millis(500)), 0.5);
        assert_eq!(pulse_brightness(SECOND, SECOND, SECOND), 1.0);
        assert_eq!(pulse_brightness(SECOND, SECOND, Duration::from_millis(1500)), 0.5);
    }

    #[test]
    fn pulse_repeats() {
        let a = pulse_brightness(SECOND, SECOND, Duration::from_millis(250));
        let b = pulse_brightness(SECOND, SECOND, Duration::from_millis(2250));
        assert!((a - b).abs() < 1e-9);
    }

    #[test]
    fn asymmetric_fades() {
        let fade_in = Duration::from_millis(500);
        let fade_out = Duration::from_millis(1500);
        assert_eq!(pulse_brightness(fade_in, fade_out, Duration::from_millis(250)), 0.5);
        assert_eq!(pulse_brightness(fade_in, fade_out, Duration::from_millis(1250)), 0.5);
    }

    #[test]
    fn default_pins_match_wiring() {
        assert_eq!(default_pin(Channel::Heat), 18);
        assert_eq!(default_pin(Channel::Cool), 23);
    }
}
