#![no_std]
#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

pub mod channels;
pub mod device;
pub mod interface;
pub mod mode;
pub mod profiles;
pub mod registers;

pub mod acquisition;
pub mod calibration;

// Re-export main types
pub use acquisition::{Cancel, OutputFormat, Sample, SampleBuffer, SampleRouter, SampleSink};
pub use calibration::{CalibrationConfig, CalibrationKind, CalibrationReport, FilterSnapshot};
pub use channels::{CHANNEL_COUNT, Channel, ChannelMask, SETUP_COUNT, Setup};
pub use device::{Ad7124, DriverConfig};
pub use interface::{RegisterInterface, SerialReset, SpiInterface};
pub use mode::{ConversionMode, PowerMode};
pub use profiles::Profile;
pub use registers::{Access, Register, RegisterError, RegisterId, RegisterMap, Status};

/// Resolution of a conversion result in bits
pub const ADC_BITS: u32 = 24;

/// Reference voltage assumed for voltage conversion unless configured otherwise
pub const DEFAULT_REFERENCE_VOLTAGE: f32 = 2.5;

/// Default bound on a wait for conversion ready, in microseconds
pub const DEFAULT_READY_TIMEOUT_US: u32 = 10_000;

/// Driver errors
#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E> {
    /// Communication error with the device
    Bus(E),
    /// Conversion ready was not observed within the timeout
    Timeout,
    /// Status attributed a conversion to a channel the device does not have (contains the index)
    InvalidChannel(u8),
    /// Value rejected by the register map
    Register(RegisterError),
    /// Power-on reset flag did not clear after a reset
    ResetTimeout,
}

impl<E> From<E> for Error<E> {
    fn from(error: E) -> Self {
        Self::Bus(error)
    }
}

impl<E> Error<E> {
    /// Whether this error is a conversion-ready timeout
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout)
    }
}
