use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::config::{ControllerConfig, PulseTiming, SetPointLimits};
use crate::ports::{ActuatorPort, Channel, Fahrenheit, Indicator, InputEvent, SensorPort};
use crate::state::{ControlState, Mode};

/// Heat and cool indicator outputs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Indicators {
    pub heat: Indicator,
    pub cool: Indicator,
}

/// Indicator outputs for a mode, set point and reading.
///
/// An active mode pulses its indicator while the temperature is still on the
/// wrong side of the set point and holds it steady once the set point has been
/// reached. `None` for [`Mode::Off`], whose outputs are owned by the transition.
pub fn indicators_for(
    mode: Mode,
    set_point: i32,
    reading: Fahrenheit,
    pulse: PulseTiming,
) -> Option<Indicators> {
    let temperature = reading.whole_degrees();
    match mode {
        Mode::Off => None,
        Mode::Heat => Some(Indicators {
            heat: if temperature < set_point {
                pulse.into()
            } else {
                Indicator::On
            },
            cool: Indicator::Off,
        }),
        Mode::Cool => Some(Indicators {
            heat: Indicator::Off,
            cool: if temperature > set_point {
                pulse.into()
            } else {
                Indicator::On
            },
        }),
    }
}

struct Inner<A> {
    state: ControlState,
    actuators: A,
}

/// Thermostat mode state machine.
///
/// Owns the [`ControlState`] and the indicator actuators behind a single lock,
/// so every mode or set point change and the indicator command derived from it
/// happen together. Shared between the input handlers and the control loop.
pub struct ModeMachine<S, A> {
    sensor: S,
    pulse: PulseTiming,
    limits: SetPointLimits,
    inner: Mutex<Inner<A>>,
    shutdown: Condvar,
}

impl<S: SensorPort, A: ActuatorPort> ModeMachine<S, A> {
    pub fn new(sensor: S, mut actuators: A, config: &ControllerConfig) -> ModeMachine<S, A> {
        actuators.all_off();
        ModeMachine {
            sensor,
            pulse: config.pulse,
            limits: config.limits,
            inner: Mutex::new(Inner {
                state: ControlState::new(config.initial_set_point),
                actuators,
            }),
            shutdown: Condvar::new(),
        }
    }

    pub fn sensor(&self) -> &S {
        &self.sensor
    }

    fn lock(&self) -> MutexGuard<'_, Inner<A>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Latest temperature, or `None` if the sensor is unavailable right now.
    pub fn read_temperature(&self) -> Option<Fahrenheit> {
        match self.sensor.read() {
            Ok(celsius) => {
                let reading = celsius.to_fahrenheit();
                if reading.0.is_finite() {
                    trace!("read temperature {} ({})", reading, celsius);
                    Some(reading)
                } else {
                    warn!("discarding non-finite temperature reading {}", celsius);
                    None
                }
            }
            Err(e) => {
                warn!("temperature sensor unavailable: {}", e);
                None
            }
        }
    }

    pub fn snapshot(&self) -> ControlState {
        self.lock().state
    }

    pub fn mode(&self) -> Mode {
        self.lock().state.mode
    }

    pub fn set_point(&self) -> i32 {
        self.lock().state.set_point
    }

    /// Advances to the next mode and runs its entry action.
    pub fn cycle(&self) -> Mode {
        let mut inner = self.lock();
        let mode = inner.state.mode.next();
        inner.state.mode = mode;
        info!("mode -> {}", mode);
        inner.actuators.all_off();
        debug!("all indicators off");
        if mode != Mode::Off {
            self.recompute(&mut inner);
        }
        mode
    }

    pub fn increase_set_point(&self) -> i32 {
        self.change_set_point(1)
    }

    pub fn decrease_set_point(&self) -> i32 {
        self.change_set_point(-1)
    }

    fn change_set_point(&self, delta: i32) -> i32 {
        let mut inner = self.lock();
        let set_point = self.limits.adjust(inner.state.set_point, delta);
        inner.state.set_point = set_point;
        info!("set point -> {}", set_point);
        self.recompute(&mut inner);
        set_point
    }

    /// Reads the sensor and brings the indicators in line with the current
    /// mode and set point. Leaves them untouched if the sensor is unavailable.
    pub fn recompute_actuators(&self) {
        let mut inner = self.lock();
        self.recompute(&mut inner);
    }

    /// Applies a reading the caller already took.
    pub fn refresh(&self, reading: Fahrenheit) {
        let mut inner = self.lock();
        self.apply(&mut inner, reading);
    }

    pub fn handle(&self, event: InputEvent) {
        debug!("handling {:?}", event);
        match event {
            InputEvent::CycleMode => {
                self.cycle();
            }
            InputEvent::IncreaseSetPoint => {
                self.increase_set_point();
            }
            InputEvent::DecreaseSetPoint => {
                self.decrease_set_point();
            }
        }
    }

    fn recompute(&self, inner: &mut Inner<A>) {
        match self.read_temperature() {
            Some(reading) => self.apply(inner, reading),
            None => debug!("indicators left as they were"),
        }
    }

    fn apply(&self, inner: &mut Inner<A>, reading: Fahrenheit) {
        let state = inner.state;
        if let Some(indicators) = indicators_for(state.mode, state.set_point, reading, self.pulse) {
            debug!(
                "{} at {} against {}: heat {:?}, cool {:?}",
                state.mode,
                reading.whole_degrees(),
                state.set_point,
                indicators.heat,
                indicators.cool
            );
            inner.actuators.command(Channel::Heat, indicators.heat);
            inner.actuators.command(Channel::Cool, indicators.cool);
        }
    }

    pub fn is_running(&self) -> bool {
        self.lock().state.running
    }

    /// Asks the control loop to stop. It wakes immediately, tears down the
    /// display and returns.
    pub fn shutdown(&self) {
        let mut inner = self.lock();
        if inner.state.running {
            info!("shutdown requested");
            inner.state.running = false;
        }
        self.shutdown.notify_all();
    }

    /// Blocks for up to `timeout`. Returns `true` as soon as shutdown has been
    /// requested, `false` if the timeout passed first.
    pub fn wait_for_shutdown(&self, timeout: Duration) -> bool {
        let inner = self.lock();
        let (inner, _) = self
            .shutdown
            .wait_timeout_while(inner, timeout, |inner| inner.state.running)
            .unwrap_or_else(PoisonError::into_inner);
        !inner.state.running
    }

    /// Runs `f` against the actuators under the state lock.
    pub fn with_actuators<T>(&self, f: impl FnOnce(&mut A) -> T) -> T {
        f(&mut self.lock().actuators)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PULSE: PulseTiming = PulseTiming {
        fade_in: Duration::from_secs(1),
        fade_out: Duration::from_secs(1),
    };

    #[test]
    fn heat_pulses_below_set_point() {
        let out = indicators_for(Mode::Heat, 72, Fahrenheit(71.9), PULSE).unwrap();
        assert!(out.heat.is_pulse());
        assert_eq!(out.cool, Indicator::Off);
    }

    #[test]
    fn heat_is_steady_at_set_point() {
        let out = indicators_for(Mode::Heat, 72, Fahrenheit(72.4), PULSE).unwrap();
        assert_eq!(out.heat, Indicator::On);
        assert_eq!(out.cool, Indicator::Off);
    }

    #[test]
    fn cool_compares_whole_degrees() {
        // 72.9 floors to 72, which is not above the set point
        let out = indicators_for(Mode::Cool, 72, Fahrenheit(72.9), PULSE).unwrap();
        assert_eq!(out.cool, Indicator::On);
        let out = indicators_for(Mode::Cool, 72, Fahrenheit(73.0), PULSE).unwrap();
        assert_eq!(
            out.cool,
            Indicator::Pulse {
                fade_in: Duration::from_secs(1),
                fade_out: Duration::from_secs(1)
            }
        );
        assert_eq!(out.heat, Indicator::Off);
    }

    #[test]
    fn off_has_no_policy() {
        assert_eq!(indicators_for(Mode::Off, 72, Fahrenheit(50.0), PULSE), None);
    }
}
