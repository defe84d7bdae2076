use std::sync::{mpsc, Mutex};
use std::thread::{self, sleep};
use std::time::{Duration, Instant};

use thermostat::{Celsius, SensorPort};
use thiserror::Error;
use tokio::sync::watch;

use crate::thermometer::types::{Aht20, Aht20Error};
use crate::BusError;

mod commands;
mod types;

pub const THERMOMETER_ADDR: u16 = 0x38;

const READ_RATE: Duration = Duration::from_secs(1);

#[derive(Clone, Debug)]
enum ReaderMessage {
    Stop,
}

#[derive(Error, Clone, Debug)]
pub enum ThermometerError {
    #[error(transparent)]
    Internal(#[from] Aht20Error),
    #[error(transparent)]
    Bus(#[from] BusError),
    #[error("No reading has been taken yet")]
    Pending,
    #[error("Reading thread has stopped")]
    Stopped,
    #[error("Could not communicate with i2c thread")]
    Send,
    #[error("Could not acquire message sender mutex")]
    Mutex,
}

pub type Result<T> = std::result::Result<T, ThermometerError>;

/// AHT20 sampled once per [`READ_RATE`] on a background thread. Reads return
/// the latest sample without touching the bus.
#[derive(Debug)]
pub struct Thermometer {
    reading_receiver: watch::Receiver<Result<Celsius>>,
    message_sender: Mutex<mpsc::Sender<ReaderMessage>>,
}

impl Thermometer {
    pub fn start(addr: u16) -> Result<Thermometer> {
        let aht20 = Aht20::new(addr)?;
        let (message_sender, message_receiver) = mpsc::channel();
        let reading_receiver = Self::start_reading(aht20, message_receiver)?;

        Ok(Thermometer {
            reading_receiver,
            message_sender: Mutex::new(message_sender),
        })
    }

    fn start_reading(
        aht20: Aht20,
        message_receiver: mpsc::Receiver<ReaderMessage>,
    ) -> Result<watch::Receiver<Result<Celsius>>> {
        let (reading_sender, reading_receiver) = watch::channel(Err(ThermometerError::Pending));

        thread::Builder::new()
            .name("thermometer".into())
            .spawn(move || {
                info!("starting thermometer thread");
                let mut next_tick = Instant::now();
                'reading: loop {
                    let now = Instant::now();
                    if now < next_tick {
                        trace!("sleeping {:?}", next_tick - now);
                        sleep(next_tick - now);
                    } else if now - next_tick > READ_RATE {
                        info!("next tick already surpassed, might need to increase read rate");
                    }
                    next_tick += READ_RATE;

                    loop {
                        match message_receiver.try_recv() {
                            Ok(ReaderMessage::Stop) => {
                                info!("thermometer thread received stop signal");
                                break 'reading;
                            }
                            Err(mpsc::TryRecvError::Empty) => break,
                            Err(mpsc::TryRecvError::Disconnected) => {
                                info!("thermometer message sender closed before stop signal");
                                break 'reading;
                            }
                        }
                    }

                    let reading = aht20.read_temperature().map_err(ThermometerError::from);
                    if let Err(e) = &reading {
                        debug!("thermometer reading failed: {}", e);
                    }

                    if reading_sender.send(reading).is_err() {
                        info!("no thermometer reading receivers left");
                        break;
                    }
                }
                info!("thermometer thread stopping");
            })
            .map_err(|_| BusError::Thread("thermometer"))?;

        Ok(reading_receiver)
    }

    pub fn subscribe(&self) -> watch::Receiver<Result<Celsius>> {
        self.reading_receiver.clone()
    }

    pub fn latest(&self) -> Result<Celsius> {
        if self.reading_receiver.has_changed().is_err() {
            return Err(ThermometerError::Stopped);
        }
        self.reading_receiver.borrow().clone()
    }

    fn send(&self, message: ReaderMessage) -> Result<()> {
        self.message_sender
            .lock()
            .map_err(|_| ThermometerError::Mutex)?
            .send(message)
            .map_err(|_| ThermometerError::Send)
    }

    pub fn stop(&self) -> Result<()> {
        self.send(ReaderMessage::Stop)
    }
}

impl SensorPort for Thermometer {
    type Error = ThermometerError;

    fn read(&self) -> Result<Celsius> {
        self.latest()
    }
}
