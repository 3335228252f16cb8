//! Per-channel self-calibration
//!
//! [`Ad7124::calibrate`] runs zero-scale (and optionally full-scale)
//! calibration for every enabled channel, one channel at a time:
//!
//! 1. reset every offset coefficient to mid-scale;
//! 2. remember which channels are enabled, then disable them;
//! 3. remember the filter registers and install a slow, high-resolution filter;
//! 4. for each remembered channel in ascending order: enable it alone,
//!    calibrate, read the new coefficients back, disable it;
//! 5. restore the filter registers;
//! 6. re-enable the remembered channels;
//! 7. idle the converter.
//!
//! Steps 5-7 run on every exit path, so a failed calibration never leaves
//! channels disabled or filters changed. Coefficients already written by the
//! device before a failure are kept.
//!
//! # Calibration order
//!
//! For system calibration the device needs the offset before the gain, so
//! zero-scale runs first. For internal calibration the datasheet requires
//! full-scale before zero-scale; internal full-scale is not available at a PGA
//! gain of 1 and is skipped for such setups.

use crate::channels::{Channel, ChannelMask, SETUP_COUNT, Setup};
use crate::device::Ad7124;
use crate::interface::{RegisterInterface, SerialReset};
use crate::mode::ConversionMode;
use crate::registers::{OFFSET_MID_SCALE, RegisterId, RegisterMap};
use crate::Error;

/// Sinc4, post filter 3, FS = 2047: the slowest, highest resolution output rate
pub const SLOW_FILTER: u32 = 0x06_07FF;

/// Default bound on each calibration step, in microseconds
///
/// With [`SLOW_FILTER`] a calibration settles in about 0.45 s at full power
/// and 3.5 s at low power.
pub const DEFAULT_CALIBRATION_TIMEOUT_US: u32 = 4_000_000;

/// Which calibration modes to run
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CalibrationKind {
    /// Internal calibration: the device shorts or references its own inputs
    Internal,
    /// System calibration: the caller applies zero (and full) scale to the inputs
    #[default]
    System,
}

/// Calibration configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CalibrationConfig {
    /// Internal or system calibration
    pub kind: CalibrationKind,
    /// Also run full-scale (gain) calibration
    pub full_scale: bool,
    /// Filter register value installed on every setup while calibrating
    pub filter: u32,
    /// Bound on each calibration step, in microseconds
    pub timeout_us: u32,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            kind: CalibrationKind::System,
            full_scale: false,
            filter: SLOW_FILTER,
            timeout_us: DEFAULT_CALIBRATION_TIMEOUT_US,
        }
    }
}

impl CalibrationConfig {
    /// Calibration modes to run for a setup with the given PGA field, in order
    #[must_use]
    pub const fn sequence(&self, pga: u8) -> [Option<ConversionMode>; 2] {
        match self.kind {
            CalibrationKind::System => [
                Some(ConversionMode::SystemZeroScaleCal),
                if self.full_scale {
                    Some(ConversionMode::SystemFullScaleCal)
                } else {
                    None
                },
            ],
            CalibrationKind::Internal => [
                if self.full_scale && pga != 0 {
                    Some(ConversionMode::InternalFullScaleCal)
                } else {
                    None
                },
                Some(ConversionMode::InternalZeroScaleCal),
            ],
        }
    }
}

/// Saved filter registers of every setup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FilterSnapshot {
    values: [u32; SETUP_COUNT],
}

impl FilterSnapshot {
    /// Capture the mirrored filter registers
    #[must_use]
    pub fn capture(registers: &RegisterMap) -> Self {
        Self {
            values: registers.filters(),
        }
    }

    /// Saved filter value of `setup`
    #[must_use]
    pub const fn value(&self, setup: Setup) -> u32 {
        self.values[setup.index() as usize]
    }

    /// Whether the mirrored filter registers equal the snapshot
    #[must_use]
    pub fn matches(&self, registers: &RegisterMap) -> bool {
        self.values == registers.filters()
    }
}

/// Outcome of a completed calibration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CalibrationReport {
    /// Channels whose setup was calibrated
    pub calibrated: ChannelMask,
}

/// Pass `result` through, logging the calibration step it failed in
fn step<T, E>(result: Result<T, Error<E>>, _name: &'static str) -> Result<T, Error<E>> {
    #[cfg(feature = "defmt")]
    if result.is_err() {
        defmt::warn!("Calibration failed at step: {=str}", _name);
    }
    result
}

impl<I, D> Ad7124<I, D>
where
    I: RegisterInterface<AddressType = u8> + SerialReset,
    D: embedded_hal::delay::DelayNs,
{
    /// Calibrate every enabled channel
    ///
    /// See the [module documentation](crate::calibration) for the procedure.
    /// Filters, channel enables and idle mode are restored before returning,
    /// whether or not calibration succeeded.
    ///
    /// # Errors
    ///
    /// Returns the first error of the calibration itself (a bus error, or
    /// [`Error::Timeout`] if a calibration step does not complete); failing
    /// that, the first error hit while restoring.
    pub fn calibrate(
        &mut self,
        config: &CalibrationConfig,
    ) -> Result<CalibrationReport, Error<I::Error>> {
        let original = self.enabled_channels();
        let filters = FilterSnapshot::capture(self.registers());

        let outcome = self.run_calibration(original, config);
        let restored = self.restore_after_calibration(original, &filters);

        let report = outcome?;
        restored?;

        #[cfg(feature = "defmt")]
        defmt::info!("Calibrated {} channels", report.calibrated.count());

        Ok(report)
    }

    fn run_calibration(
        &mut self,
        channels: ChannelMask,
        config: &CalibrationConfig,
    ) -> Result<CalibrationReport, Error<I::Error>> {
        for setup in Setup::all() {
            step(
                self.write_register(RegisterId::Offset(setup), OFFSET_MID_SCALE),
                "reset offset",
            )?;
        }

        for ch in channels.iter() {
            step(self.disable_channel(ch), "disable channels")?;
        }

        for setup in Setup::all() {
            step(
                self.write_register(RegisterId::Filter(setup), config.filter),
                "install calibration filter",
            )?;
        }

        let mut calibrated = ChannelMask::empty();
        for ch in channels.iter() {
            step(self.enable_channel(ch), "enable channel")?;
            self.calibrate_channel(ch, config)?;
            step(self.disable_channel(ch), "disable calibrated channel")?;
            calibrated.insert(ch);
        }

        Ok(CalibrationReport { calibrated })
    }

    /// Run the calibration modes for the single enabled channel `ch`
    fn calibrate_channel(
        &mut self,
        ch: Channel,
        config: &CalibrationConfig,
    ) -> Result<(), Error<I::Error>> {
        let setup = self.registers().channel_setup(ch);
        let pga = self.registers().config(setup).pga();

        let mut gain_calibrated = false;
        for mode in config.sequence(pga).into_iter().flatten() {
            #[cfg(feature = "defmt")]
            defmt::debug!("Channel {}: {}", ch.index(), mode);

            step(self.set_mode(mode), "start calibration mode")?;
            step(
                self.wait_for_conversion_ready(config.timeout_us),
                "wait for calibration",
            )?;
            gain_calibrated |= matches!(
                mode,
                ConversionMode::InternalFullScaleCal | ConversionMode::SystemFullScaleCal
            );
        }

        #[cfg(feature = "defmt")]
        if config.full_scale && !gain_calibrated {
            defmt::debug!(
                "Channel {}: internal full-scale skipped at gain 1",
                ch.index()
            );
        }

        // The device updated the coefficients; keep the mirror in step
        step(
            self.read_register(RegisterId::Offset(setup)),
            "read offset coefficient",
        )?;
        if gain_calibrated {
            step(
                self.read_register(RegisterId::Gain(setup)),
                "read gain coefficient",
            )?;
        }
        Ok(())
    }

    /// Restore filters and channel enables, then idle; attempts every step
    fn restore_after_calibration(
        &mut self,
        channels: ChannelMask,
        filters: &FilterSnapshot,
    ) -> Result<(), Error<I::Error>> {
        let mut result = Ok(());

        for setup in Setup::all() {
            let id = RegisterId::Filter(setup);
            let saved = filters.value(setup);
            if self.registers().value(id) == saved {
                continue;
            }
            if let Err(error) = self.write_register(id, saved) {
                #[cfg(feature = "defmt")]
                defmt::warn!("Failed to restore filter of setup {}", setup.index());
                if result.is_ok() {
                    result = Err(error);
                }
            }
        }

        if let Err(error) = self.restore_channels(channels)
            && result.is_ok()
        {
            result = Err(error);
        }

        if let Err(error) = self.set_mode(ConversionMode::Idle)
            && result.is_ok()
        {
            result = Err(error);
        }

        result
    }
}
