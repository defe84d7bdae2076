use std::fmt::{Display, Formatter};
use std::time::Duration;

use strum_macros::{Display as StrumDisplay, EnumIter, EnumString};

/// Character width of each display line.
pub const LINE_WIDTH: usize = 16;

#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub struct Celsius(pub f32);

#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub struct Fahrenheit(pub f32);

impl Celsius {
    pub fn to_fahrenheit(self) -> Fahrenheit {
        Fahrenheit(self.0 * 9.0 / 5.0 + 32.0)
    }
}

impl From<Celsius> for Fahrenheit {
    fn from(c: Celsius) -> Self {
        c.to_fahrenheit()
    }
}

impl Fahrenheit {
    /// Whole degrees, rounded toward negative infinity.
    pub fn whole_degrees(self) -> i32 {
        self.0.floor() as i32
    }
}

impl Display for Celsius {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}°C", self.0)
    }
}

impl Display for Fahrenheit {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}°F", self.0)
    }
}

/// Output state for a single indicator channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Indicator {
    Off,
    On,
    Pulse {
        fade_in: Duration,
        fade_out: Duration,
    },
}

impl Indicator {
    pub fn is_pulse(&self) -> bool {
        matches!(self, Indicator::Pulse { .. })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, StrumDisplay, EnumString, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum Channel {
    Heat,
    Cool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputEvent {
    CycleMode,
    IncreaseSetPoint,
    DecreaseSetPoint,
}

/// Source of temperature readings. A failed read is transient and is
/// retried on the next tick by the caller.
pub trait SensorPort {
    type Error: std::error::Error;

    fn read(&self) -> Result<Celsius, Self::Error>;
}

pub trait DisplayPort {
    type Error: std::error::Error;

    /// Replaces the whole display contents. Lines longer than
    /// [`LINE_WIDTH`] are truncated by the implementation.
    fn render(&mut self, line1: &str, line2: &str) -> Result<(), Self::Error>;

    /// Releases the display. Calling it more than once is harmless.
    fn teardown(&mut self);
}

pub trait ActuatorPort {
    fn command(&mut self, channel: Channel, indicator: Indicator);

    fn all_off(&mut self) {
        self.command(Channel::Heat, Indicator::Off);
        self.command(Channel::Cool, Indicator::Off);
    }
}

pub trait SerialPort {
    type Error: std::error::Error;

    fn write(&mut self, bytes: &[u8]) -> Result<(), Self::Error>;
}

/// Pads or truncates `s` to exactly [`LINE_WIDTH`] characters.
pub fn fit_line(s: &str) -> String {
    format!("{:<width$.width$}", s, width = LINE_WIDTH)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_celsius_to_whole_fahrenheit() {
        assert_eq!(Celsius(20.0).to_fahrenheit().whole_degrees(), 68);
        assert_eq!(Celsius(25.0).to_fahrenheit().whole_degrees(), 77);
        assert_eq!(Celsius(24.0).to_fahrenheit().whole_degrees(), 75);
        assert_eq!(Celsius(-40.0).to_fahrenheit().whole_degrees(), -40);
    }

    #[test]
    fn whole_degrees_floors_negative_values() {
        assert_eq!(Fahrenheit(-0.5).whole_degrees(), -1);
        assert_eq!(Fahrenheit(71.99).whole_degrees(), 71);
    }

    #[test]
    fn fit_line_pads_and_truncates() {
        assert_eq!(fit_line("Heat @72°F"), "Heat @72°F      ");
        assert_eq!(fit_line("Heat @72°F").chars().count(), LINE_WIDTH);
        assert_eq!(fit_line("0123456789abcdefXYZ"), "0123456789abcdef");
    }

    #[test]
    fn channel_names() {
        assert_eq!(Channel::Heat.to_string(), "heat");
        assert_eq!("cool".parse::<Channel>().ok(), Some(Channel::Cool));
    }
}
