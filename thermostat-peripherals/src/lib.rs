#[macro_use]
extern crate log;

use thiserror::Error;

pub mod button;
pub mod lcd;
pub mod led;
pub mod serial;
pub mod thermometer;

#[derive(Error, Clone, Debug)]
pub enum BusError {
    #[error("Could not initialize {0}")]
    Initialization(&'static str),
    #[error("Could not set slave address to {0:#04x}")]
    SlaveAddr(u16),
    #[error("Could not get pin {0}")]
    Pin(u8),
    #[error("Could not spawn {0} thread")]
    Thread(&'static str),
}

/// Clonable stand-in for rppal's errors, which wrap `io::Error`.
#[derive(Error, Clone, Debug)]
#[error("{0}")]
pub struct RppalError(String);

impl From<rppal::i2c::Error> for RppalError {
    fn from(e: rppal::i2c::Error) -> Self {
        RppalError(e.to_string())
    }
}

impl From<rppal::gpio::Error> for RppalError {
    fn from(e: rppal::gpio::Error) -> Self {
        RppalError(e.to_string())
    }
}

impl From<rppal::uart::Error> for RppalError {
    fn from(e: rppal::uart::Error) -> Self {
        RppalError(e.to_string())
    }
}
