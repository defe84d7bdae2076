mod run;

extern crate pretty_env_logger;
#[macro_use]
extern crate log;

use std::num::ParseIntError;
use std::path::PathBuf;
use std::time::Duration;

use crate::run::Wiring;
use color_eyre::eyre::WrapErr;
use structopt::StructOpt;
use thermostat::{Channel, ControllerConfig, PulseTiming, SerialPort, SetPointLimits};
use thermostat_peripherals::button::ButtonPins;
use thermostat_peripherals::lcd::{Lcd, LcdPins};
use thermostat_peripherals::led::Led;
use thermostat_peripherals::serial::Serial;
use thermostat_peripherals::thermometer::Thermometer;
use tokio::pin;
use tokio::time::sleep;
use tokio_stream::wrappers::WatchStream;
use tokio_stream::StreamExt;

fn parse_addr(src: &str) -> Result<u16, ParseIntError> {
    u16::from_str_radix(src.trim_start_matches("0x"), 16)
}

#[derive(StructOpt, Debug)]
struct ControllerOpt {
    /// Starting set point in °F
    #[structopt(long, default_value = "72", allow_hyphen_values = true)]
    set_point: i32,

    /// Lowest set point the buttons can reach
    #[structopt(long, allow_hyphen_values = true)]
    min_set_point: Option<i32>,

    /// Highest set point the buttons can reach
    #[structopt(long, allow_hyphen_values = true)]
    max_set_point: Option<i32>,

    /// Control loop period in milliseconds
    #[structopt(long, default_value = "1000")]
    tick_ms: u64,

    /// Send a serial status line every n ticks
    #[structopt(long, default_value = "30")]
    report_every: u64,

    /// Indicator pulse fade in, in milliseconds
    #[structopt(long, default_value = "1000")]
    fade_in_ms: u64,

    /// Indicator pulse fade out, in milliseconds
    #[structopt(long, default_value = "1000")]
    fade_out_ms: u64,
}

impl From<&ControllerOpt> for ControllerConfig {
    fn from(opt: &ControllerOpt) -> Self {
        ControllerConfig {
            initial_set_point: opt.set_point,
            tick_period: Duration::from_millis(opt.tick_ms),
            report_every: opt.report_every,
            pulse: PulseTiming {
                fade_in: Duration::from_millis(opt.fade_in_ms),
                fade_out: Duration::from_millis(opt.fade_out_ms),
            },
            limits: SetPointLimits {
                min: opt.min_set_point,
                max: opt.max_set_point,
            },
        }
    }
}

#[derive(StructOpt, Debug)]
struct SerialOpt {
    /// Serial device
    #[structopt(long = "serial", default_value = "/dev/ttyS0", parse(from_os_str))]
    path: PathBuf,

    #[structopt(long, default_value = "115200")]
    baud: u32,
}

#[derive(StructOpt, Debug)]
struct LcdOpt {
    #[structopt(long, default_value = "17")]
    lcd_rs: u8,

    #[structopt(long, default_value = "27")]
    lcd_en: u8,

    #[structopt(long, default_value = "5")]
    lcd_d4: u8,

    #[structopt(long, default_value = "6")]
    lcd_d5: u8,

    #[structopt(long, default_value = "13")]
    lcd_d6: u8,

    #[structopt(long, default_value = "26")]
    lcd_d7: u8,
}

impl From<&LcdOpt> for LcdPins {
    fn from(opt: &LcdOpt) -> Self {
        LcdPins {
            rs: opt.lcd_rs,
            en: opt.lcd_en,
            data: [opt.lcd_d4, opt.lcd_d5, opt.lcd_d6, opt.lcd_d7],
        }
    }
}

#[derive(StructOpt, Debug)]
struct WiringOpt {
    /// Thermometer i2c address (hex)
    #[structopt(long, default_value = "38", parse(try_from_str = parse_addr))]
    sensor_addr: u16,

    #[structopt(long, default_value = "18")]
    heat_pin: u8,

    #[structopt(long, default_value = "23")]
    cool_pin: u8,

    #[structopt(long, default_value = "24")]
    cycle_pin: u8,

    #[structopt(long, default_value = "25")]
    increase_pin: u8,

    #[structopt(long, default_value = "12")]
    decrease_pin: u8,

    /// Button debounce window in milliseconds
    #[structopt(long, default_value = "50")]
    debounce_ms: u64,

    #[structopt(flatten)]
    lcd: LcdOpt,

    #[structopt(flatten)]
    serial: SerialOpt,
}

impl From<WiringOpt> for Wiring {
    fn from(opt: WiringOpt) -> Self {
        Wiring {
            sensor_addr: opt.sensor_addr,
            lcd: LcdPins::from(&opt.lcd),
            heat_pin: opt.heat_pin,
            cool_pin: opt.cool_pin,
            buttons: ButtonPins {
                cycle: opt.cycle_pin,
                increase: opt.increase_pin,
                decrease: opt.decrease_pin,
            },
            debounce: Duration::from_millis(opt.debounce_ms),
            serial_path: opt.serial.path,
            baud_rate: opt.serial.baud,
        }
    }
}

#[derive(StructOpt, Debug)]
enum Opt {
    /// Run the thermostat until ctrl-c
    Run {
        #[structopt(flatten)]
        controller: ControllerOpt,

        #[structopt(flatten)]
        wiring: WiringOpt,
    },
    /// Print temperature readings
    Sensor {
        /// Number of readings
        #[structopt(short, long, default_value = "1")]
        times: usize,

        /// Thermometer i2c address (hex)
        #[structopt(long, default_value = "38", parse(try_from_str = parse_addr))]
        addr: u16,
    },
    Led {
        /// Which LED to use (heat or cool)
        #[structopt(short, long)]
        led: Channel,

        /// Duration in seconds
        #[structopt(short, long)]
        duration: u64,

        /// Pulse instead of holding steady
        #[structopt(short, long)]
        pulse: bool,
    },
    Lcd {
        /// Text to display
        text: String,

        /// Duration of display in seconds
        #[structopt(short, long)]
        duration: u64,

        #[structopt(flatten)]
        pins: LcdOpt,
    },
    /// Write one line to the serial port
    Serial {
        line: String,

        #[structopt(flatten)]
        serial: SerialOpt,
    },
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    pretty_env_logger::init();
    color_eyre::install()?;

    let opts = Opt::from_args();

    debug!("opts: {:?}", opts);

    match opts {
        Opt::Run { controller, wiring } => {
            run::run(ControllerConfig::from(&controller), Wiring::from(wiring)).await?;
        }
        Opt::Sensor { times, addr } => {
            let thermometer = Thermometer::start(addr)?;
            // the first value is whatever was current before we subscribed
            let readings = WatchStream::new(thermometer.subscribe()).skip(1).take(times);
            pin!(readings);
            while let Some(reading) = readings.next().await {
                match reading {
                    Ok(celsius) => {
                        println!("Temperature: {} ({})", celsius, celsius.to_fahrenheit())
                    }
                    Err(e) => println!("No reading: {}", e),
                }
            }
            thermometer.stop()?;
        }
        Opt::Led {
            led,
            duration,
            pulse,
        } => {
            let mut led = Led::from_channel(led)?;
            println!("Turning on {} led...", led.pin());
            if pulse {
                let timing = PulseTiming::default();
                led.pulse(timing.fade_in, timing.fade_out)?;
            } else {
                led.on()?;
            }
            sleep(Duration::from_secs(duration)).await;
            led.off()?;
            println!("Turned off led");
        }
        Opt::Lcd {
            text,
            duration,
            pins,
        } => {
            let mut lcd = Lcd::new(LcdPins::from(&pins))?;
            println!("Displaying text: {}", text);
            lcd.push_str(&text)?;
            lcd.wait_for_processing().await?;
            sleep(Duration::from_secs(duration)).await;
            println!("Clearing lcd");
            lcd.shutdown()?;
        }
        Opt::Serial { line, serial } => {
            let mut port = Serial::new(&serial.path, serial.baud)?;
            port.write(format!("{}\n", line).as_bytes())
                .wrap_err("Could not send line")?;
            println!("Sent {:?}", line);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use thermostat_peripherals::button::DEBOUNCE;
    use thermostat_peripherals::led::default_pin;
    use thermostat_peripherals::serial::{BAUD_RATE, SERIAL_PATH};
    use thermostat_peripherals::thermometer::THERMOMETER_ADDR;

    #[test]
    fn parses_hex_addresses() {
        assert_eq!(parse_addr("3e"), Ok(0x3e));
        assert_eq!(parse_addr("0x38"), Ok(0x38));
        assert!(parse_addr("zz").is_err());
    }

    #[test]
    fn run_defaults_match_controller_defaults() {
        let opt = Opt::from_iter(&["thermostat-cli", "run"]);
        match opt {
            Opt::Run { controller, wiring } => {
                assert_eq!(ControllerConfig::from(&controller), ControllerConfig::default());
                let wiring = Wiring::from(wiring);
                assert_eq!(wiring.buttons, ButtonPins::default());
                assert_eq!(wiring.sensor_addr, THERMOMETER_ADDR);
                assert_eq!(wiring.lcd, LcdPins::default());
                assert_eq!(wiring.heat_pin, default_pin(Channel::Heat));
                assert_eq!(wiring.cool_pin, default_pin(Channel::Cool));
                assert_eq!(wiring.debounce, DEBOUNCE);
                assert_eq!(wiring.serial_path, PathBuf::from(SERIAL_PATH));
                assert_eq!(wiring.baud_rate, BAUD_RATE);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn run_accepts_negative_limits() {
        let opt = Opt::from_iter(&[
            "thermostat-cli",
            "run",
            "--set-point",
            "-5",
            "--min-set-point",
            "-10",
        ]);
        match opt {
            Opt::Run { controller, .. } => {
                let config = ControllerConfig::from(&controller);
                assert_eq!(config.initial_set_point, -5);
                assert_eq!(config.limits.min, Some(-10));
                assert!(config.validate().is_ok());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn lcd_pins_can_be_rewired() {
        let opt = Opt::from_iter(&[
            "thermostat-cli",
            "lcd",
            "hello",
            "--duration",
            "1",
            "--lcd-rs",
            "4",
            "--lcd-d7",
            "21",
        ]);
        match opt {
            Opt::Lcd { text, pins, .. } => {
                assert_eq!(text, "hello");
                let pins = LcdPins::from(&pins);
                assert_eq!(pins.rs, 4);
                assert_eq!(pins.en, 27);
                assert_eq!(pins.data, [5, 6, 13, 21]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
