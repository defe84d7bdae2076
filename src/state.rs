use strum_macros::{Display, EnumIter, EnumString};

pub const DEFAULT_SET_POINT: i32 = 72;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum Mode {
    Off,
    Heat,
    Cool,
}

impl Default for Mode {
    fn default() -> Self {
        Mode::Off
    }
}

impl Mode {
    /// Fixed cycle order: off, heat, cool, off.
    pub fn next(self) -> Mode {
        match self {
            Mode::Off => Mode::Heat,
            Mode::Heat => Mode::Cool,
            Mode::Cool => Mode::Off,
        }
    }

    /// Name as shown on the display.
    pub fn title(self) -> &'static str {
        match self {
            Mode::Off => "Off",
            Mode::Heat => "Heat",
            Mode::Cool => "Cool",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ControlState {
    pub mode: Mode,
    pub set_point: i32,
    pub running: bool,
}

impl ControlState {
    pub fn new(set_point: i32) -> ControlState {
        ControlState {
            mode: Mode::Off,
            set_point,
            running: true,
        }
    }
}

impl Default for ControlState {
    fn default() -> Self {
        Self::new(DEFAULT_SET_POINT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn starts_off_at_default_set_point() {
        let state = ControlState::default();
        assert_eq!(state.mode, Mode::Off);
        assert_eq!(state.set_point, 72);
        assert!(state.running);
    }

    #[test]
    fn every_mode_returns_to_itself_after_three_steps() {
        for mode in Mode::iter() {
            assert_eq!(mode.next().next().next(), mode);
            assert_ne!(mode.next(), mode);
        }
    }

    #[test]
    fn serial_and_display_names() {
        assert_eq!(Mode::Heat.to_string(), "heat");
        assert_eq!(Mode::Cool.title(), "Cool");
        assert_eq!("off".parse::<Mode>().ok(), Some(Mode::Off));
    }
}
