use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Instant;

use chrono::{Local, NaiveDateTime};

use crate::config::ControllerConfig;
use crate::machine::ModeMachine;
use crate::ports::{fit_line, ActuatorPort, DisplayPort, Fahrenheit, SensorPort, SerialPort};
use crate::state::{ControlState, Mode};

const CLOCK_FORMAT: &str = "%m/%d %H:%M:%S";

/// Serial status line, `<mode>,<temperature>,<set point>\n`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StatusLine {
    pub mode: Mode,
    /// Whole degrees Fahrenheit, or the set point when no reading was available.
    pub temperature: i32,
    pub set_point: i32,
}

impl StatusLine {
    pub fn new(state: &ControlState, reading: Option<Fahrenheit>) -> StatusLine {
        StatusLine {
            mode: state.mode,
            temperature: reading
                .map(Fahrenheit::whole_degrees)
                .unwrap_or(state.set_point),
            set_point: state.set_point,
        }
    }
}

impl Display for StatusLine {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{},{},{}", self.mode, self.temperature, self.set_point)
    }
}

pub fn mode_line(state: &ControlState) -> String {
    fit_line(&format!("{} @{}°F", state.mode.title(), state.set_point))
}

pub fn temperature_line(reading: Fahrenheit) -> String {
    fit_line(&format!("{}°F", reading.whole_degrees()))
}

pub fn clock_line(now: &NaiveDateTime) -> String {
    fit_line(&now.format(CLOCK_FORMAT).to_string())
}

/// Outcome of a single control loop iteration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tick {
    /// No reading was available; nothing was rendered or sent.
    Skipped,
    Rendered { reported: bool },
}

/// Periodic display refresh and serial reporting.
pub struct ControlLoop<S, A, D, W> {
    machine: Arc<ModeMachine<S, A>>,
    display: D,
    serial: W,
    config: ControllerConfig,
    counter: u64,
    show_temperature: bool,
}

impl<S, A, D, W> ControlLoop<S, A, D, W>
where
    S: SensorPort,
    A: ActuatorPort,
    D: DisplayPort,
    W: SerialPort,
{
    pub fn new(
        machine: Arc<ModeMachine<S, A>>,
        display: D,
        serial: W,
        config: ControllerConfig,
    ) -> ControlLoop<S, A, D, W> {
        ControlLoop {
            machine,
            display,
            serial,
            config,
            counter: 1,
            show_temperature: false,
        }
    }

    /// Successful ticks so far, plus one.
    pub fn counter(&self) -> u64 {
        self.counter
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn serial(&self) -> &W {
        &self.serial
    }

    pub fn tick(&mut self, now: NaiveDateTime) -> Tick {
        let line1 = clock_line(&now);

        let reading = match self.machine.read_temperature() {
            Some(reading) => reading,
            None => {
                debug!("no reading, skipping tick {}", self.counter);
                return Tick::Skipped;
            }
        };
        self.machine.refresh(reading);

        let state = self.machine.snapshot();
        let line2 = if self.show_temperature {
            temperature_line(reading)
        } else {
            mode_line(&state)
        };
        self.show_temperature = !self.show_temperature;

        trace!("rendering {:?} / {:?}", line1, line2);
        if let Err(e) = self.display.render(&line1, &line2) {
            warn!("could not update display: {}", e);
        }

        let reported = self.counter % self.config.report_every == 0;
        if reported {
            self.report(StatusLine::new(&state, Some(reading)));
        }
        self.counter += 1;

        Tick::Rendered { reported }
    }

    fn report(&mut self, status: StatusLine) {
        let line = status.to_string();
        debug!("sending status line {:?}", line.trim_end());
        if let Err(e) = self.serial.write(line.as_bytes()) {
            warn!("could not send status line: {}", e);
        }
    }

    /// Ticks once per period until shutdown is requested, then releases the
    /// display and hands the ports back.
    pub fn run(mut self) -> (D, W) {
        info!(
            "control loop starting, period {:?}, reporting every {} ticks",
            self.config.tick_period, self.config.report_every
        );
        loop {
            let started = Instant::now();
            self.tick(Local::now().naive_local());
            if !self.machine.is_running() {
                break;
            }
            let elapsed = started.elapsed();
            if elapsed > self.config.tick_period {
                info!(
                    "tick took {:?}, longer than the {:?} period",
                    elapsed, self.config.tick_period
                );
            }
            let remaining = self.config.tick_period.saturating_sub(elapsed);
            if self.machine.wait_for_shutdown(remaining) {
                break;
            }
        }
        info!("control loop stopping");
        self.display.teardown();
        (self.display, self.serial)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn status_line_format() {
        let state = ControlState {
            mode: Mode::Heat,
            set_point: 72,
            running: true,
        };
        assert_eq!(
            StatusLine::new(&state, Some(Fahrenheit(68.0))).to_string(),
            "heat,68,72\n"
        );
    }

    #[test]
    fn status_line_falls_back_to_set_point() {
        let state = ControlState {
            mode: Mode::Off,
            set_point: 65,
            running: true,
        };
        assert_eq!(StatusLine::new(&state, None).to_string(), "off,65,65\n");
    }

    #[test]
    fn display_lines_fill_sixteen_columns() {
        let state = ControlState {
            mode: Mode::Cool,
            set_point: 70,
            running: true,
        };
        assert_eq!(mode_line(&state), "Cool @70°F      ");
        assert_eq!(temperature_line(Fahrenheit(75.6)), "75°F            ");

        let now = NaiveDate::from_ymd_opt(2024, 3, 9)
            .and_then(|d| d.and_hms_opt(7, 5, 2))
            .unwrap();
        assert_eq!(clock_line(&now), "03/09 07:05:02  ");
    }
}
