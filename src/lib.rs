//! Single-zone thermostat controller.
//!
//! [`ModeMachine`] owns the mode, the set point and the heat/cool indicators;
//! button events drive it directly. [`ControlLoop`] runs on its own thread,
//! refreshing the two-line display every tick and sending a status line over
//! serial every thirtieth tick. Hardware is reached only through the traits in
//! [`ports`].

#[macro_use]
extern crate log;

pub mod config;
pub mod control;
pub mod machine;
pub mod ports;
pub mod state;

pub use config::{ConfigError, ControllerConfig, PulseTiming, SetPointLimits};
pub use control::{ControlLoop, StatusLine, Tick};
pub use machine::{indicators_for, Indicators, ModeMachine};
pub use ports::{
    ActuatorPort, Celsius, Channel, DisplayPort, Fahrenheit, Indicator, InputEvent, SensorPort,
    SerialPort,
};
pub use state::{ControlState, Mode};
