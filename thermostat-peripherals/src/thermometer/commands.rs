use std::thread::sleep;
use std::time::Duration;

use thermostat::Celsius;

use crate::thermometer::types::{Aht20, Aht20Error, Command, Result, STATUS_CALIBRATED};

const POWER_ON_DELAY: Duration = Duration::from_millis(40);
const INIT_DELAY: Duration = Duration::from_millis(10);
const MEASUREMENT_DELAY: Duration = Duration::from_millis(80);
const BUSY_POLL: Duration = Duration::from_millis(10);
const BUSY_POLLS: usize = 10;

impl Aht20 {
    pub fn new(addr: u16) -> Result<Aht20> {
        let sensor = Self::open(addr)?;
        sleep(POWER_ON_DELAY);
        sensor.initialize()?;
        Ok(sensor)
    }

    pub fn is_calibrated(&self) -> Result<bool> {
        self.read_status()
            .map(|status| status & STATUS_CALIBRATED != 0)
            .map_err(Aht20Error::Initialize)
    }

    pub fn initialize(&self) -> Result<()> {
        if self.is_calibrated()? {
            trace!("sensor already calibrated");
            return Ok(());
        }
        info!("sending sensor calibration command");
        self.write_command(Command::Initialize)
            .map_err(Aht20Error::Initialize)?;
        sleep(INIT_DELAY);
        if self.is_calibrated()? {
            Ok(())
        } else {
            Err(Aht20Error::Uncalibrated)
        }
    }

    pub fn read_temperature(&self) -> Result<Celsius> {
        self.write_command(Command::TriggerMeasurement)
            .map_err(Aht20Error::Temperature)?;
        sleep(MEASUREMENT_DELAY);
        for _ in 0..BUSY_POLLS {
            let frame = self.read_frame().map_err(Aht20Error::Temperature)?;
            if frame.is_busy() {
                trace!("measurement busy, polling again");
                sleep(BUSY_POLL);
                continue;
            }
            if !frame.crc_ok() {
                return Err(Aht20Error::Crc);
            }
            let temperature = frame.temperature();
            trace!(
                "read temperature {} humidity {:.1}%",
                temperature,
                frame.relative_humidity()
            );
            return Ok(temperature);
        }
        Err(Aht20Error::Busy(BUSY_POLLS))
    }
}
