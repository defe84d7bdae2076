//! Recording fakes for every port.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use thermostat::{
    ActuatorPort, Celsius, Channel, ControllerConfig, DisplayPort, Indicator, ModeMachine,
    SensorPort, SerialPort,
};
use thiserror::Error;

#[derive(Error, Debug)]
#[error("sensor bus fault")]
pub struct BusFault;

#[derive(Error, Debug)]
#[error("port closed")]
pub struct Closed;

/// Sensor whose reading is set from the test through a shared handle.
/// Queued readings are served first, one per read.
#[derive(Clone, Default)]
pub struct FakeSensor {
    celsius: Arc<Mutex<Option<f32>>>,
    queued: Arc<Mutex<VecDeque<Option<f32>>>>,
}

impl FakeSensor {
    pub fn reading(celsius: f32) -> FakeSensor {
        let sensor = FakeSensor::default();
        sensor.set(celsius);
        sensor
    }

    pub fn set(&self, celsius: f32) {
        *self.celsius.lock().unwrap() = Some(celsius);
    }

    pub fn fail(&self) {
        *self.celsius.lock().unwrap() = None;
    }

    pub fn queue(&self, readings: impl IntoIterator<Item = Option<f32>>) {
        self.queued.lock().unwrap().extend(readings);
    }
}

impl SensorPort for FakeSensor {
    type Error = BusFault;

    fn read(&self) -> Result<Celsius, BusFault> {
        let queued = self.queued.lock().unwrap().pop_front();
        queued
            .unwrap_or_else(|| *self.celsius.lock().unwrap())
            .map(Celsius)
            .ok_or(BusFault)
    }
}

#[derive(Debug)]
pub struct FakeActuators {
    pub heat: Indicator,
    pub cool: Indicator,
    pub commands: Vec<(Channel, Indicator)>,
}

impl Default for FakeActuators {
    fn default() -> Self {
        FakeActuators {
            heat: Indicator::On,
            cool: Indicator::On,
            commands: Vec::new(),
        }
    }
}

impl ActuatorPort for FakeActuators {
    fn command(&mut self, channel: Channel, indicator: Indicator) {
        match channel {
            Channel::Heat => self.heat = indicator,
            Channel::Cool => self.cool = indicator,
        }
        self.commands.push((channel, indicator));
    }
}

#[derive(Debug, Default)]
pub struct FakeDisplay {
    pub frames: Vec<(String, String)>,
    pub teardowns: usize,
    pub broken: bool,
}

impl DisplayPort for FakeDisplay {
    type Error = Closed;

    fn render(&mut self, line1: &str, line2: &str) -> Result<(), Closed> {
        if self.broken {
            return Err(Closed);
        }
        self.frames.push((line1.to_string(), line2.to_string()));
        Ok(())
    }

    fn teardown(&mut self) {
        self.teardowns += 1;
    }
}

#[derive(Debug, Default)]
pub struct FakeSerial {
    pub lines: Vec<String>,
    pub broken: bool,
}

impl SerialPort for FakeSerial {
    type Error = Closed;

    fn write(&mut self, bytes: &[u8]) -> Result<(), Closed> {
        if self.broken {
            return Err(Closed);
        }
        self.lines.push(String::from_utf8_lossy(bytes).into_owned());
        Ok(())
    }
}

pub type Machine = ModeMachine<FakeSensor, FakeActuators>;

pub fn machine(sensor: &FakeSensor) -> Machine {
    ModeMachine::new(
        sensor.clone(),
        FakeActuators::default(),
        &ControllerConfig::default(),
    )
}

pub fn indicators(machine: &Machine) -> (Indicator, Indicator) {
    machine.with_actuators(|a| (a.heat, a.cool))
}
