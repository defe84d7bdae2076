use std::path::{Path, PathBuf};

use rppal::uart::{Parity, Uart};
use thermostat::SerialPort;
use thiserror::Error;

use crate::RppalError;

pub const SERIAL_PATH: &str = "/dev/ttyS0";
pub const BAUD_RATE: u32 = 115_200;

#[derive(Error, Clone, Debug)]
pub enum SerialError {
    #[error("Could not open {0}")]
    Open(PathBuf, #[source] RppalError),
    #[error("Could not configure {0}")]
    Configure(PathBuf, #[source] RppalError),
    #[error("Could not write to serial port")]
    Write(#[source] RppalError),
    #[error("Serial port accepted {written} of {len} bytes")]
    Partial { written: usize, len: usize },
}

pub type Result<T> = std::result::Result<T, SerialError>;

/// UART at 8N1 with non-blocking writes.
#[derive(Debug)]
pub struct Serial {
    uart: Uart,
}

impl Serial {
    pub fn new(path: impl AsRef<Path>, baud_rate: u32) -> Result<Serial> {
        let path = path.as_ref();
        let mut uart = Uart::with_path(path, baud_rate, Parity::None, 8, 1)
            .map_err(|e| SerialError::Open(path.to_path_buf(), RppalError::from(e)))?;
        uart.set_write_mode(false)
            .map_err(|e| SerialError::Configure(path.to_path_buf(), RppalError::from(e)))?;
        info!("opened {} at {} baud", path.display(), baud_rate);
        Ok(Serial { uart })
    }
}

impl SerialPort for Serial {
    type Error = SerialError;

    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        let written = self
            .uart
            .write(bytes)
            .map_err(|e| SerialError::Write(RppalError::from(e)))?;
        if written < bytes.len() {
            return Err(SerialError::Partial {
                written,
                len: bytes.len(),
            });
        }
        trace!("wrote {} bytes to serial port", written);
        Ok(())
    }
}
