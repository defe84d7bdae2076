use std::sync::mpsc;
use std::thread::{self, sleep, JoinHandle};
use std::time::Duration;

use rppal::gpio::{Gpio, Level, OutputPin};
use thermostat::ports::LINE_WIDTH;
use thermostat::DisplayPort;
use thiserror::Error;
use tokio::sync::watch;

use crate::BusError;

pub const RS_PIN: u8 = 17;
pub const EN_PIN: u8 = 27;
/// D4 through D7.
pub const DATA_PINS: [u8; 4] = [5, 6, 13, 26];

/// ROM code for the degree sign.
const DEGREE: u8 = 0xdf;

const CLEAR: u8 = 0x01;
const ENTRY_INCREMENT: u8 = 0x06;
const DISPLAY_ON: u8 = 0x0c;
/// 4-bit bus, two lines, 5x8 font.
const FUNCTION_SET: u8 = 0x28;
const SET_DDRAM_ADDR: u8 = 0x80;
const SECOND_LINE_ADDR: u8 = 0x40;

#[derive(Debug, Clone, PartialEq, Eq)]
enum LcdMessage {
    /// Single nibble with RS low, only used while switching to 4-bit mode.
    Nibble(u8),
    Char(u8),
    Cmd(u8),
    Wait(Duration),
    Stop,
}

#[derive(Error, Clone, Debug)]
pub enum LcdError {
    #[error(transparent)]
    Bus(#[from] BusError),
    #[error("Could not send message to lcd thread")]
    Send,
    #[error("Could not wait for processing notification")]
    ProcessingWait,
}

pub type Result<T> = std::result::Result<T, LcdError>;

/// GPIO wiring of a parallel HD44780 in 4-bit mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LcdPins {
    pub rs: u8,
    pub en: u8,
    pub data: [u8; 4],
}

impl Default for LcdPins {
    fn default() -> Self {
        Self {
            rs: RS_PIN,
            en: EN_PIN,
            data: DATA_PINS,
        }
    }
}

/// Maps a character to the display's ROM, `?` for anything it cannot show.
pub fn rom_code(c: char) -> u8 {
    match c {
        '°' => DEGREE,
        ' '..='}' => c as u8,
        _ => b'?',
    }
}

/// High nibble first.
fn nibbles(byte: u8) -> [u8; 2] {
    [byte >> 4, byte & 0x0f]
}

/// Levels for D4..D7.
fn nibble_levels(nibble: u8) -> [Level; 4] {
    [0, 1, 2, 3].map(|bit| {
        if (nibble >> bit) & 1 == 1 {
            Level::High
        } else {
            Level::Low
        }
    })
}

struct Bus {
    rs: OutputPin,
    en: OutputPin,
    data: [OutputPin; 4],
}

impl Bus {
    fn open(pins: LcdPins) -> Result<Bus> {
        let gpio = Gpio::new().map_err(|_| BusError::Initialization("gpio"))?;
        let output = |pin: u8| -> Result<OutputPin> {
            Ok(gpio
                .get(pin)
                .map_err(|_| BusError::Pin(pin))?
                .into_output_low())
        };
        let [d4, d5, d6, d7] = pins.data;
        Ok(Bus {
            rs: output(pins.rs)?,
            en: output(pins.en)?,
            data: [output(d4)?, output(d5)?, output(d6)?, output(d7)?],
        })
    }

    fn pulse_enable(&mut self) {
        self.en.set_low();
        sleep(Duration::from_micros(1));
        self.en.set_high();
        sleep(Duration::from_micros(1));
        self.en.set_low();
        sleep(Duration::from_micros(100));
    }

    fn write_nibble(&mut self, nibble: u8) {
        for (pin, level) in self.data.iter_mut().zip(nibble_levels(nibble)) {
            pin.write(level);
        }
        self.pulse_enable();
    }

    fn write_byte(&mut self, byte: u8, rs: Level) {
        self.rs.write(rs);
        for nibble in nibbles(byte) {
            self.write_nibble(nibble);
        }
    }

    fn release(&mut self) {
        self.rs.set_low();
        self.en.set_low();
        for pin in &mut self.data {
            pin.set_low();
        }
    }
}

/// HD44780 16x2 character display on six GPIO lines. Bytes are queued to a
/// writer thread so callers never wait on the bus.
#[derive(Debug)]
pub struct Lcd {
    col: usize,
    row: u8,
    write_handle: Option<JoinHandle<()>>,
    write_sender: mpsc::Sender<LcdMessage>,
    processing_receiver: watch::Receiver<bool>,
}

impl Lcd {
    const INIT_SEQ: [LcdMessage; 13] = [
        LcdMessage::Wait(Duration::from_millis(50)),
        LcdMessage::Nibble(0x03),
        LcdMessage::Wait(Duration::from_millis(5)),
        LcdMessage::Nibble(0x03),
        LcdMessage::Wait(Duration::from_millis(5)),
        LcdMessage::Nibble(0x03),
        LcdMessage::Wait(Duration::from_micros(200)),
        LcdMessage::Nibble(0x02),
        LcdMessage::Cmd(FUNCTION_SET),
        LcdMessage::Cmd(DISPLAY_ON),
        LcdMessage::Cmd(ENTRY_INCREMENT),
        LcdMessage::Cmd(CLEAR),
        LcdMessage::Wait(Duration::from_millis(2)),
    ];

    pub fn new(pins: LcdPins) -> Result<Lcd> {
        let mut bus = Bus::open(pins)?;
        let (write_sender, write_receiver) = mpsc::channel();
        let (processing_sender, processing_receiver) = watch::channel(false);
        let write_handle = thread::Builder::new()
            .name("lcd".into())
            .spawn(move || {
                info!(
                    "starting lcd messaging thread, rs {} en {} data {:?}",
                    pins.rs, pins.en, pins.data
                );
                loop {
                    let next_msg = match write_receiver.try_recv() {
                        Ok(msg) => {
                            trace!("next message was already queued");
                            msg
                        }
                        Err(e) => {
                            trace!("no message queued");
                            // notify if no message in queue
                            if processing_sender.send(false).is_err() {
                                info!("lcd processing receiver dropped");
                            }
                            match e {
                                mpsc::TryRecvError::Disconnected => {
                                    info!("lcd messaging channel disconnected");
                                    break;
                                }
                                mpsc::TryRecvError::Empty => match write_receiver.recv() {
                                    Ok(msg) => msg,
                                    Err(_) => {
                                        info!("lcd messaging channel had no more messages");
                                        break;
                                    }
                                },
                            }
                        }
                    };
                    if processing_sender.send(true).is_err() {
                        info!("lcd processing receiver dropped");
                    }
                    match next_msg {
                        LcdMessage::Nibble(n) => {
                            trace!("writing init nibble {:#03x} to lcd", n);
                            bus.rs.set_low();
                            bus.write_nibble(n);
                        }
                        LcdMessage::Char(c) => {
                            trace!("writing char {} to lcd", c);
                            bus.write_byte(c, Level::High);
                        }
                        LcdMessage::Cmd(data) => {
                            trace!("writing cmd {:#04x} to lcd", data);
                            bus.write_byte(data, Level::Low);
                        }
                        LcdMessage::Wait(duration) => {
                            trace!("sleeping lcd messaging thread for {:?}", duration);
                            sleep(duration);
                        }
                        LcdMessage::Stop => {
                            trace!("stopping lcd messaging thread");
                            break;
                        }
                    }
                }
                bus.release();
                if processing_sender.send(false).is_err() {
                    trace!("lcd processing receiver already dropped");
                }
                info!("lcd messaging thread stopping");
            })
            .map_err(|_| BusError::Thread("lcd"))?;
        let mut lcd = Lcd {
            col: 0,
            row: 1,
            write_handle: Some(write_handle),
            write_sender,
            processing_receiver,
        };
        lcd.init()?;
        Ok(lcd)
    }

    fn send(&self, msg: LcdMessage) -> Result<()> {
        self.write_sender.send(msg).map_err(|_| LcdError::Send)
    }

    pub fn init(&mut self) -> Result<()> {
        trace!("initializing lcd");
        self.col = 0;
        self.row = 1;
        IntoIterator::into_iter(Lcd::INIT_SEQ).try_for_each(|msg| self.send(msg))
    }

    pub fn clear(&mut self) -> Result<()> {
        trace!("clearing lcd");
        self.col = 0;
        self.row = 1;
        self.send(LcdMessage::Cmd(CLEAR))?;
        self.send(LcdMessage::Wait(Duration::from_millis(2)))
    }

    pub fn first_line_head(&mut self) -> Result<()> {
        trace!("moving to head of first line of lcd");
        self.col = 0;
        self.row = 1;
        self.send(LcdMessage::Cmd(SET_DDRAM_ADDR))
    }

    pub fn second_line_head(&mut self) -> Result<()> {
        trace!("moving to head of second line of lcd");
        self.col = 0;
        self.row = 2;
        self.send(LcdMessage::Cmd(SET_DDRAM_ADDR | SECOND_LINE_ADDR))
    }

    pub fn push_char(&mut self, c: char) -> Result<()> {
        trace!("pushing char {:?} to lcd messaging thread", c);
        if self.col >= LINE_WIDTH {
            if self.row == 2 {
                trace!("at end of second line of lcd");
                self.first_line_head()?;
            } else {
                trace!("at end of first line of lcd");
                self.second_line_head()?;
            }
        }
        self.col += 1;
        self.send(LcdMessage::Char(rom_code(c)))
    }

    pub fn push_str(&mut self, s: &str) -> Result<()> {
        s.chars().try_for_each(|c| self.push_char(c))
    }

    /// Clears the screen, stops the writer thread and waits for it. The
    /// pins are driven low on the way out.
    pub fn shutdown(&mut self) -> Result<()> {
        let handle = match self.write_handle.take() {
            Some(handle) => handle,
            None => return Ok(()),
        };
        trace!("shutting down lcd");
        self.clear()?;
        self.send(LcdMessage::Stop)?;
        if handle.join().is_err() {
            error!("lcd messaging thread panicked");
        }
        Ok(())
    }

    pub fn is_write_processing(&self) -> bool {
        *self.processing_receiver.borrow()
    }

    pub async fn wait_for_processing(&mut self) -> Result<()> {
        while self.is_write_processing() {
            self.processing_receiver
                .changed()
                .await
                .map_err(|_| LcdError::ProcessingWait)?;
        }
        Ok(())
    }
}

impl DisplayPort for Lcd {
    type Error = LcdError;

    fn render(&mut self, line1: &str, line2: &str) -> Result<()> {
        self.clear()?;
        line1
            .chars()
            .take(LINE_WIDTH)
            .try_for_each(|c| self.push_char(c))?;
        self.second_line_head()?;
        line2
            .chars()
            .take(LINE_WIDTH)
            .try_for_each(|c| self.push_char(c))
    }

    fn teardown(&mut self) {
        if let Err(e) = self.shutdown() {
            error!("could not shut down lcd: {}", e);
        }
    }
}

impl Drop for Lcd {
    fn drop(&mut self) {
        self.teardown();
    }
}
