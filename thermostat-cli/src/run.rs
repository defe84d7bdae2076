use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use color_eyre::eyre::{eyre, WrapErr};
use eyre::Result;
use thermostat::{ActuatorPort, ControlLoop, ControllerConfig, ModeMachine};
use thermostat_peripherals::button::{ButtonPins, Buttons};
use thermostat_peripherals::lcd::{Lcd, LcdPins};
use thermostat_peripherals::led::IndicatorLeds;
use thermostat_peripherals::serial::Serial;
use thermostat_peripherals::thermometer::Thermometer;
use tokio::signal;
use tokio::sync::mpsc;
use tokio::task::spawn_blocking;
use tokio::time::timeout;

#[derive(Debug, Clone)]
pub struct Wiring {
    pub sensor_addr: u16,
    pub lcd: LcdPins,
    pub heat_pin: u8,
    pub cool_pin: u8,
    pub buttons: ButtonPins,
    pub debounce: Duration,
    pub serial_path: PathBuf,
    pub baud_rate: u32,
}

/// Runs the thermostat until ctrl-c.
pub async fn run(config: ControllerConfig, wiring: Wiring) -> Result<()> {
    config
        .validate()
        .wrap_err("Invalid controller configuration")?;

    let thermometer =
        Thermometer::start(wiring.sensor_addr).wrap_err("Could not start thermometer")?;
    let leds = IndicatorLeds::new(wiring.heat_pin, wiring.cool_pin)
        .wrap_err("Could not set up indicator leds")?;
    let lcd = Lcd::new(wiring.lcd).wrap_err("Could not set up lcd")?;
    let serial = Serial::new(&wiring.serial_path, wiring.baud_rate)
        .wrap_err("Could not open serial port")?;

    let machine = Arc::new(ModeMachine::new(thermometer, leds, &config));
    let control = ControlLoop::new(machine.clone(), lcd, serial, config.clone());
    let mut control_handle = spawn_blocking(move || control.run());

    let (event_sender, mut event_receiver) = mpsc::unbounded_channel();
    let buttons = Buttons::start(wiring.buttons, wiring.debounce, event_sender)
        .wrap_err("Could not set up buttons")?;

    info!(
        "thermostat running, mode {}, set point {}",
        machine.mode(),
        machine.set_point()
    );

    let finished = loop {
        tokio::select! {
            Some(event) = event_receiver.recv() => machine.handle(event),
            res = signal::ctrl_c() => {
                res.wrap_err("Could not listen for ctrl-c")?;
                info!("ctrl-c received, cleaning up");
                break None;
            }
            res = &mut control_handle => break Some(res),
        }
    };

    drop(buttons);
    machine.shutdown();
    let joined = match finished {
        Some(res) => {
            warn!("control loop exited before shutdown was requested");
            res
        }
        None => timeout(config.tick_period * 2, control_handle)
            .await
            .map_err(|_| eyre!("Control loop did not stop within {:?}", config.tick_period * 2))?,
    };
    joined.wrap_err("Control loop panicked")?;

    machine.with_actuators(|leds| leds.all_off());
    if let Err(e) = machine.sensor().stop() {
        warn!("could not stop thermometer: {}", e);
    }
    info!("thermostat stopped");
    Ok(())
}
