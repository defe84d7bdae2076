use std::time::Duration;

use thiserror::Error;

use crate::ports::Indicator;
use crate::state::DEFAULT_SET_POINT;

const TICK_PERIOD: Duration = Duration::from_secs(1);
const REPORT_EVERY: u64 = 30;
const FADE: Duration = Duration::from_secs(1);

#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Tick period must be greater than zero")]
    TickPeriod,
    #[error("Report interval must be at least one tick")]
    ReportInterval,
    #[error("Pulse fade durations must be greater than zero")]
    Fade,
    #[error("Set point minimum {min} is above maximum {max}")]
    Limits { min: i32, max: i32 },
    #[error("Initial set point {0} is outside the set point limits")]
    InitialSetPoint(i32),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PulseTiming {
    pub fade_in: Duration,
    pub fade_out: Duration,
}

impl Default for PulseTiming {
    fn default() -> Self {
        Self {
            fade_in: FADE,
            fade_out: FADE,
        }
    }
}

impl From<PulseTiming> for Indicator {
    fn from(p: PulseTiming) -> Self {
        Indicator::Pulse {
            fade_in: p.fade_in,
            fade_out: p.fade_out,
        }
    }
}

/// Bounds applied to every set point change. Both ends are open by default.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SetPointLimits {
    pub min: Option<i32>,
    pub max: Option<i32>,
}

impl SetPointLimits {
    pub fn unbounded() -> SetPointLimits {
        SetPointLimits::default()
    }

    pub fn contains(&self, set_point: i32) -> bool {
        self.min.map_or(true, |min| set_point >= min) && self.max.map_or(true, |max| set_point <= max)
    }

    /// Moves `set_point` by `delta`, then clamps to the limits. The set point
    /// is stored as `i32`, so an unbounded change saturates at `i32::MIN` and
    /// `i32::MAX` instead of wrapping.
    pub fn adjust(&self, set_point: i32, delta: i32) -> i32 {
        let mut adjusted = set_point.saturating_add(delta);
        if let Some(min) = self.min {
            adjusted = adjusted.max(min);
        }
        if let Some(max) = self.max {
            adjusted = adjusted.min(max);
        }
        adjusted
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ControllerConfig {
    pub initial_set_point: i32,
    pub tick_period: Duration,
    /// Emit a serial status line on every n-th successful tick.
    pub report_every: u64,
    pub pulse: PulseTiming,
    pub limits: SetPointLimits,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            initial_set_point: DEFAULT_SET_POINT,
            tick_period: TICK_PERIOD,
            report_every: REPORT_EVERY,
            pulse: PulseTiming::default(),
            limits: SetPointLimits::unbounded(),
        }
    }
}

impl ControllerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.tick_period.is_zero() {
            return Err(ConfigError::TickPeriod);
        }
        if self.report_every == 0 {
            return Err(ConfigError::ReportInterval);
        }
        if self.pulse.fade_in.is_zero() || self.pulse.fade_out.is_zero() {
            return Err(ConfigError::Fade);
        }
        if let (Some(min), Some(max)) = (self.limits.min, self.limits.max) {
            if min > max {
                return Err(ConfigError::Limits { min, max });
            }
        }
        if !self.limits.contains(self.initial_set_point) {
            return Err(ConfigError::InitialSetPoint(self.initial_set_point));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = ControllerConfig::default();
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.initial_set_point, 72);
        assert_eq!(config.report_every, 30);
        assert_eq!(config.tick_period, Duration::from_secs(1));
    }

    #[test]
    fn rejects_degenerate_timing() {
        let config = ControllerConfig {
            tick_period: Duration::ZERO,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::TickPeriod));

        let config = ControllerConfig {
            report_every: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ReportInterval));

        let config = ControllerConfig {
            pulse: PulseTiming {
                fade_in: Duration::ZERO,
                fade_out: FADE,
            },
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::Fade));
    }

    #[test]
    fn rejects_inverted_or_excluding_limits() {
        let config = ControllerConfig {
            limits: SetPointLimits {
                min: Some(80),
                max: Some(60),
            },
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::Limits { min: 80, max: 60 })
        );

        let config = ControllerConfig {
            limits: SetPointLimits {
                min: Some(75),
                max: None,
            },
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::InitialSetPoint(72)));
    }

    #[test]
    fn unbounded_adjust_moves_by_delta() {
        let limits = SetPointLimits::unbounded();
        assert_eq!(limits.adjust(72, 1), 73);
        assert_eq!(limits.adjust(-400, -1), -401);
        assert_eq!(limits.adjust(i32::MAX, 1), i32::MAX);
    }

    #[test]
    fn bounded_adjust_clamps() {
        let limits = SetPointLimits {
            min: Some(60),
            max: Some(80),
        };
        assert_eq!(limits.adjust(80, 1), 80);
        assert_eq!(limits.adjust(60, -1), 60);
        assert_eq!(limits.adjust(70, 1), 71);
    }
}
