use std::sync::{Mutex, MutexGuard};

use packed_struct::prelude::*;
use rppal::i2c::I2c;
use thermostat::Celsius;
use thiserror::Error;

use crate::{BusError, RppalError};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    Initialize,
    TriggerMeasurement,
}

impl Command {
    pub fn bytes(self) -> &'static [u8] {
        match self {
            Command::Initialize => &[0xbe, 0x08, 0x00],
            Command::TriggerMeasurement => &[0xac, 0x33, 0x00],
        }
    }
}

/// Status byte flags.
pub const STATUS_BUSY: u8 = 0x80;
pub const STATUS_CALIBRATED: u8 = 0x08;

/// Raw measurement frame: status, 20 bits humidity, 20 bits temperature, crc.
#[derive(PackedStruct, Clone, Copy, Debug, PartialEq)]
#[packed_struct(endian = "msb")]
pub struct Frame {
    pub status: u8,
    pub data: [u8; 5],
    pub crc: u8,
}

impl Frame {
    pub const LEN: usize = 7;

    pub fn is_busy(&self) -> bool {
        self.status & STATUS_BUSY != 0
    }

    pub fn crc_ok(&self) -> bool {
        let mut bytes = [0u8; 6];
        bytes[0] = self.status;
        bytes[1..].copy_from_slice(&self.data);
        crc8(&bytes) == self.crc
    }

    pub fn raw_humidity(&self) -> u32 {
        let d = self.data;
        ((d[0] as u32) << 12) | ((d[1] as u32) << 4) | ((d[2] as u32) >> 4)
    }

    pub fn raw_temperature(&self) -> u32 {
        let d = self.data;
        (((d[2] as u32) & 0x0f) << 16) | ((d[3] as u32) << 8) | d[4] as u32
    }

    pub fn temperature(&self) -> Celsius {
        Celsius(self.raw_temperature() as f32 * 200.0 / (1 << 20) as f32 - 50.0)
    }

    pub fn relative_humidity(&self) -> f32 {
        self.raw_humidity() as f32 * 100.0 / (1 << 20) as f32
    }
}

/// CRC-8, polynomial 0x31, initial value 0xff.
pub fn crc8(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0xff, |crc, &b| {
        (0..8).fold(crc ^ b, |crc, _| {
            if crc & 0x80 != 0 {
                (crc << 1) ^ 0x31
            } else {
                crc << 1
            }
        })
    })
}

/// Low level errors
#[derive(Error, Clone, Debug)]
pub enum Aht20BaseError {
    #[error("Could not write command {0:?}")]
    Write(Command, #[source] RppalError),
    #[error("Could not read from sensor")]
    Read(#[source] RppalError),
    #[error("Could not acquire i2c mutex")]
    Mutex,
    #[error("Packed data was of invalid format")]
    PackedFormat(#[source] packed_struct::PackingError),
}

/// Higher level action errors
#[derive(Error, Clone, Debug)]
pub enum Aht20Error {
    #[error(transparent)]
    Bus(#[from] BusError),
    #[error("Could not initialize sensor")]
    Initialize(#[source] Aht20BaseError),
    #[error("Sensor did not report calibration after initialization")]
    Uncalibrated,
    #[error("Could not read temperature")]
    Temperature(#[source] Aht20BaseError),
    #[error("Measurement still busy after {0} polls")]
    Busy(usize),
    #[error("Measurement failed crc check")]
    Crc,
}

pub type Result<T> = std::result::Result<T, Aht20Error>;
pub type BaseResult<T> = std::result::Result<T, Aht20BaseError>;

pub struct Aht20 {
    pub i2c: Mutex<I2c>,
}

impl Aht20 {
    pub fn open(addr: u16) -> Result<Aht20> {
        let mut i2c = I2c::new().map_err(|_| BusError::Initialization("i2c"))?;
        i2c.set_slave_address(addr)
            .map_err(|_| BusError::SlaveAddr(addr))?;
        Ok(Aht20 {
            i2c: Mutex::new(i2c),
        })
    }

    pub fn lock_i2c(&self) -> BaseResult<MutexGuard<I2c>> {
        self.i2c.lock().map_err(|_| Aht20BaseError::Mutex)
    }

    pub fn write_command(&self, command: Command) -> BaseResult<()> {
        trace!("writing command {:?}", command);
        self.lock_i2c()?
            .write(command.bytes())
            .map_err(|source| Aht20BaseError::Write(command, RppalError::from(source)))
            .map(|_| ())
    }

    pub fn read_status(&self) -> BaseResult<u8> {
        let mut buf = [0u8; 1];
        self.lock_i2c()?
            .read(&mut buf)
            .map_err(|source| Aht20BaseError::Read(RppalError::from(source)))?;
        Ok(buf[0])
    }

    pub fn read_frame(&self) -> BaseResult<Frame> {
        let mut buf = [0u8; Frame::LEN];
        self.lock_i2c()?
            .read(&mut buf)
            .map_err(|source| Aht20BaseError::Read(RppalError::from(source)))?;
        Frame::unpack(&buf).map_err(Aht20BaseError::PackedFormat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(bytes: [u8; 6]) -> Frame {
        let mut raw = [0u8; Frame::LEN];
        raw[..6].copy_from_slice(&bytes);
        raw[6] = crc8(&bytes);
        Frame::unpack(&raw).unwrap()
    }

    #[test]
    fn crc_matches_datasheet_example() {
        // check value for CRC-8/NRSC-5 is 0xf7 over "123456789"
        assert_eq!(crc8(b"123456789"), 0xf7);
    }

    #[test]
    fn decodes_temperature_and_humidity() {
        // temperature raw 0x60000 -> 75.0 - 50.0 = 25.0
        // humidity raw 0x80000 -> 50%
        let f = frame([0x1c, 0x80, 0x00, 0x06, 0x00, 0x00]);
        assert!(f.crc_ok());
        assert!(!f.is_busy());
        assert_eq!(f.raw_temperature(), 0x60000);
        assert_eq!(f.temperature(), Celsius(25.0));
        assert_eq!(f.raw_humidity(), 0x80000);
        assert_eq!(f.relative_humidity(), 50.0);
    }

    #[test]
    fn detects_corruption_and_busy() {
        let mut f = frame([0x9c, 0x80, 0x00, 0x06, 0x00, 0x00]);
        assert!(f.is_busy());
        assert!(f.crc_ok());
        f.data[3] ^= 0x01;
        assert!(!f.crc_ok());
    }
}
