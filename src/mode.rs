//! Conversion and power modes
//!
//! Both live as bit fields of the `ADC_CONTROL` register: MODE in bits 5:2 and
//! `POWER_MODE` in bits 7:6. Changing either modifies the mirrored control
//! fields and writes the register once, see
//! [`Ad7124::set_mode`](crate::Ad7124::set_mode) and
//! [`Ad7124::set_power_mode`](crate::Ad7124::set_power_mode).
//!
//! Every acquisition and calibration routine returns the converter to
//! [`ConversionMode::Idle`] on exit through
//! [`Ad7124::with_idle`](crate::Ad7124::with_idle).

use crate::registers::field_sets::AdcControl;

/// Operating mode of the converter (`ADC_CONTROL` MODE field)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConversionMode {
    /// Convert enabled channels continuously in sequence
    Continuous = 0,
    /// Convert once, then enter standby
    Single = 1,
    /// Standby, internal clock and LDOs kept on
    Standby = 2,
    /// Power-down, everything off
    PowerDown = 3,
    /// Idle, modulator and filter held in reset
    Idle = 4,
    /// Internal zero-scale (offset) calibration
    InternalZeroScaleCal = 5,
    /// Internal full-scale (gain) calibration
    InternalFullScaleCal = 6,
    /// System zero-scale (offset) calibration
    SystemZeroScaleCal = 7,
    /// System full-scale (gain) calibration
    SystemFullScaleCal = 8,
}

impl ConversionMode {
    /// MODE field value
    #[must_use]
    pub const fn bits(self) -> u8 {
        self as u8
    }

    /// Decode the MODE field of `ADC_CONTROL`
    #[must_use]
    pub fn from_control(control: &AdcControl) -> Option<Self> {
        let mode = match control.mode() {
            0 => Self::Continuous,
            1 => Self::Single,
            2 => Self::Standby,
            3 => Self::PowerDown,
            4 => Self::Idle,
            5 => Self::InternalZeroScaleCal,
            6 => Self::InternalFullScaleCal,
            7 => Self::SystemZeroScaleCal,
            8 => Self::SystemFullScaleCal,
            _ => return None,
        };
        Some(mode)
    }

    /// Replace the MODE field of `ADC_CONTROL`, keeping every other field
    pub fn apply(self, control: &mut AdcControl) {
        control.set_mode(self.bits());
    }
}

/// Power level (`ADC_CONTROL` `POWER_MODE` field)
///
/// Higher power modes allow faster output data rates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PowerMode {
    /// Low power, master clock 76.8 kHz
    Low = 0,
    /// Mid power, master clock 153.6 kHz
    Mid = 1,
    /// Full power, master clock 614.4 kHz
    Full = 2,
}

impl PowerMode {
    /// `POWER_MODE` field value
    #[must_use]
    pub const fn bits(self) -> u8 {
        self as u8
    }

    /// Decode the `POWER_MODE` field of `ADC_CONTROL`
    ///
    /// Both encodings `0b10` and `0b11` select full power.
    #[must_use]
    pub fn from_control(control: &AdcControl) -> Self {
        match control.power_mode() {
            0 => Self::Low,
            1 => Self::Mid,
            _ => Self::Full,
        }
    }

    /// Replace the `POWER_MODE` field of `ADC_CONTROL`, keeping every other field
    pub fn apply(self, control: &mut AdcControl) {
        control.set_power_mode(self.bits());
    }
}
