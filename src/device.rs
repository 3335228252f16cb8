//! High-level driver API for the AD7124
//!
//! This module provides the driver type owning the bus interface, the delay
//! provider and the register map mirror, together with register access,
//! channel enable bookkeeping and the conversion mode sequencer. Acquisition
//! routines live in [`crate::acquisition`], calibration in
//! [`crate::calibration`].
//!
//! Every operation takes `&mut self`: one routine owns the device at a time,
//! and multi-register sequences cannot interleave.

use crate::channels::{CHANNEL_COUNT, Channel, ChannelMask};
use crate::interface::{RegisterInterface, SerialReset};
use crate::mode::{ConversionMode, PowerMode};
use crate::profiles::Profile;
use crate::registers::Ad7124Registers as RegisterDevice;
use crate::registers::field_sets::AdcControl;
use crate::registers::{MirrorValue, RegisterId, RegisterMap, Status};
use crate::{ADC_BITS, DEFAULT_READY_TIMEOUT_US, DEFAULT_REFERENCE_VOLTAGE, Error};

/// Interval between STATUS polls while waiting for conversion ready
const READY_POLL_INTERVAL_US: u32 = 10;

/// Number of STATUS polls (1 ms apart) allowed for the power-on flag to clear
const POWER_ON_POLLS: u32 = 100;

/// Driver configuration
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DriverConfig {
    /// Reference voltage used to convert codes to volts
    pub reference_voltage: f32,
    /// Bound on each wait for conversion ready, in microseconds
    pub ready_timeout_us: u32,
    /// Channels the device provides: 16 on the AD7124-8, 8 on the AD7124-4
    ///
    /// A conversion that STATUS attributes to a channel at or above this
    /// count is rejected with [`Error::InvalidChannel`].
    pub channel_count: u8,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            reference_voltage: DEFAULT_REFERENCE_VOLTAGE,
            ready_timeout_us: DEFAULT_READY_TIMEOUT_US,
            channel_count: CHANNEL_COUNT as u8,
        }
    }
}

/// Main driver for the AD7124
pub struct Ad7124<I, D> {
    device: RegisterDevice<I>,
    delay: D,
    registers: RegisterMap,
    // Register table written by `init`
    profile: Profile,
    config: DriverConfig,
    // Conversions read so far, used to timestamp samples
    conversions: u32,
}

impl<I, D> Ad7124<I, D>
where
    I: RegisterInterface<AddressType = u8> + SerialReset,
    D: embedded_hal::delay::DelayNs,
{
    /// Create a new AD7124 driver instance
    ///
    /// The register mirror is populated from `profile`. No bus traffic takes
    /// place; call [`init`](Self::init) to reset the device and load the
    /// profile into it.
    pub fn new(interface: I, delay: D, profile: Profile, config: DriverConfig) -> Self {
        Self {
            device: RegisterDevice::new(interface),
            delay,
            registers: profile.register_map(),
            profile,
            config,
            conversions: 0,
        }
    }

    /// Consume the driver and return the bus interface and delay provider
    pub fn release(self) -> (I, D) {
        (self.device.interface, self.delay)
    }

    /// Reset the device and write every read-write register of the profile
    ///
    /// After the reset the mirror holds the power-on values, and the driver
    /// polls STATUS until the power-on reset flag clears, for at most 100 ms.
    /// The profile's registers are then written in address order; each one
    /// reaches the mirror only once its write has succeeded.
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the device fails, or
    /// [`Error::ResetTimeout`] if the device does not come out of reset. The
    /// mirror then holds the power-on values plus the registers written
    /// before the failure.
    pub fn init(&mut self) -> Result<(), Error<I::Error>> {
        let target = self.profile.register_map();

        self.device.interface.reset()?;
        self.registers = Profile::PowerOn.register_map();

        let mut powered_on = false;
        for _ in 0..POWER_ON_POLLS {
            self.delay.delay_ms(1);
            if !self.read_status()?.power_on_reset() {
                powered_on = true;
                break;
            }
        }
        if !powered_on {
            return Err(Error::ResetTimeout);
        }

        for id in RegisterId::all() {
            let register = *target.get(id);
            if register.check_write(register.value).is_err() {
                continue;
            }
            if let Err(error) = self.write_register(id, register.value) {
                #[cfg(feature = "defmt")]
                defmt::warn!("Init: write to register {=u8:#x} failed", register.address);
                return Err(error);
            }
        }

        #[cfg(feature = "defmt")]
        defmt::debug!(
            "AD7124 initialized, {} channels enabled",
            self.enabled_channels().count()
        );

        Ok(())
    }

    /// Switch to `profile` and reinitialize the device
    ///
    /// Profiles are applied wholesale: every register is taken from the new
    /// profile.
    ///
    /// # Errors
    ///
    /// Returns an error if [`init`](Self::init) fails. The mirror then
    /// reflects what the device holds: power-on values plus the profile
    /// registers written before the failure. A later [`init`](Self::init)
    /// retries the new profile.
    pub fn load_profile(&mut self, profile: Profile) -> Result<(), Error<I::Error>> {
        self.profile = profile;
        self.init()
    }

    /// Profile written by [`init`](Self::init)
    pub const fn profile(&self) -> Profile {
        self.profile
    }

    /// Register map mirror
    pub const fn registers(&self) -> &RegisterMap {
        &self.registers
    }

    /// Driver configuration
    pub const fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Number of conversion results read since the driver was created
    pub const fn conversion_count(&self) -> u32 {
        self.conversions
    }

    /// Read a register from the device and update the mirror
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the device fails.
    pub fn read_register(&mut self, id: RegisterId) -> Result<u32, Error<I::Error>> {
        let register = *self.registers.get(id);
        let size = usize::from(register.size);
        let mut buffer = [0u8; 4];
        self.device.interface.read_register(
            register.address,
            u32::from(register.size) * 8,
            &mut buffer[4 - size..],
        )?;

        let value = u32::from_be_bytes(buffer);
        self.commit(id, value)?;
        Ok(value)
    }

    /// Write a register to the device, then update the mirror
    ///
    /// The mirror is left untouched if the write is rejected or the bus
    /// transfer fails.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Register`] for read-only registers or oversized
    /// values, and an error if communication with the device fails.
    pub fn write_register(&mut self, id: RegisterId, value: u32) -> Result<(), Error<I::Error>> {
        let register = *self.registers.get(id);
        register.check_write(value).map_err(Error::Register)?;

        let size = usize::from(register.size);
        let bytes = value.to_be_bytes();
        self.device.interface.write_register(
            register.address,
            u32::from(register.size) * 8,
            &bytes[4 - size..],
        )?;

        self.commit(id, value)
    }

    /// Record the outcome of a completed transfer in the mirror
    fn commit(&mut self, id: RegisterId, value: u32) -> Result<(), Error<I::Error>> {
        self.registers.set(id, value).map_err(Error::Register)
    }

    /// Read and decode the STATUS register
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the device fails.
    pub fn read_status(&mut self) -> Result<Status, Error<I::Error>> {
        let bits: [u8; 1] = self.device.status().read()?.into();
        self.commit(RegisterId::Status, u32::from(bits[0]))?;
        Ok(Status::from_bits(bits[0]))
    }

    /// Read the ID register
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the device fails.
    pub fn read_id(&mut self) -> Result<u8, Error<I::Error>> {
        let id: [u8; 1] = self.device.id().read()?.into();
        self.commit(RegisterId::Id, u32::from(id[0]))?;
        Ok(id[0])
    }

    /// Read the ERROR register
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the device fails.
    pub fn read_error(&mut self) -> Result<u32, Error<I::Error>> {
        let flags = self.device.error_flags().read()?.to_mirror();
        self.commit(RegisterId::Error, flags)?;

        #[cfg(feature = "defmt")]
        if flags != 0 {
            defmt::debug!("ERROR register: {=u32:#x}", flags);
        }

        Ok(flags)
    }

    /// Read the latest conversion result
    ///
    /// When `DATA_STATUS` is set in `ADC_CONTROL` the device appends STATUS to
    /// the data, and the STATUS mirror is refreshed from that byte.
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the device fails.
    pub fn read_data(&mut self) -> Result<u32, Error<I::Error>> {
        let data = if self.registers.adc_control().data_status() {
            let reading = self.device.data_status().read()?;
            self.commit(RegisterId::Data, reading.data())?;
            self.commit(RegisterId::Status, u32::from(reading.status()))?;
            reading.data()
        } else {
            let data = self.device.data().read()?.data();
            self.commit(RegisterId::Data, data)?;
            data
        };

        self.conversions = self.conversions.wrapping_add(1);
        Ok(data)
    }

    /// Poll STATUS until a conversion (or calibration) completes
    ///
    /// STATUS is polled every 10 µs for at most `timeout_us` microseconds. On
    /// success the returned status, also stored in the mirror, names the
    /// channel that was converted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Timeout`] if the ready bit is not observed in time, or
    /// an error if communication with the device fails.
    pub fn wait_for_conversion_ready(&mut self, timeout_us: u32) -> Result<Status, Error<I::Error>> {
        let polls = (timeout_us / READY_POLL_INTERVAL_US).max(1);
        for _ in 0..polls {
            let status = self.read_status()?;
            if status.ready() {
                return Ok(status);
            }
            self.delay.delay_us(READY_POLL_INTERVAL_US);
        }
        Err(Error::Timeout)
    }

    // ==================== Mode sequencer ====================

    /// Current conversion mode according to the mirror
    pub fn mode(&self) -> Option<ConversionMode> {
        ConversionMode::from_control(&self.registers.adc_control())
    }

    /// Current power mode according to the mirror
    pub fn power_mode(&self) -> PowerMode {
        PowerMode::from_control(&self.registers.adc_control())
    }

    /// Switch the converter to `mode`
    ///
    /// Sets the MODE field of the mirrored `ADC_CONTROL` fields and writes the
    /// register back. The register is written even if the
    /// mirror already shows `mode`; writing a conversion mode starts a new
    /// conversion sequence.
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the device fails.
    pub fn set_mode(&mut self, mode: ConversionMode) -> Result<(), Error<I::Error>> {
        let mut control = self.registers.adc_control();
        mode.apply(&mut control);
        self.write_adc_control(control)
    }

    /// Set the converter power level
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the device fails.
    pub fn set_power_mode(&mut self, level: PowerMode) -> Result<(), Error<I::Error>> {
        let mut control = self.registers.adc_control();
        level.apply(&mut control);
        self.write_adc_control(control)
    }

    fn write_adc_control(&mut self, control: AdcControl) -> Result<(), Error<I::Error>> {
        self.device.adc_control().write(|w| *w = control)?;
        self.commit(RegisterId::AdcControl, control.to_mirror())
    }

    /// Run `routine`, then put the converter in idle mode
    ///
    /// Idle is requested whether `routine` succeeds or fails. An error from
    /// `routine` takes priority over an error while idling.
    ///
    /// # Errors
    ///
    /// Returns the routine's error, or the error from switching to idle.
    pub fn with_idle<T>(
        &mut self,
        routine: impl FnOnce(&mut Self) -> Result<T, Error<I::Error>>,
    ) -> Result<T, Error<I::Error>> {
        let outcome = routine(self);
        let idle = self.set_mode(ConversionMode::Idle);

        match (outcome, idle) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(error)) => Err(error),
            (Err(error), idle) => {
                if idle.is_err() {
                    #[cfg(feature = "defmt")]
                    defmt::warn!("Failed to idle the converter after an aborted routine");
                }
                Err(error)
            }
        }
    }

    // ==================== Channel state ====================

    /// Channels currently enabled, according to the mirror
    pub fn enabled_channels(&self) -> ChannelMask {
        self.registers.enabled_channels()
    }

    /// Set or clear the enable bit of a channel
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the device fails; the mirror
    /// keeps the previous enable state.
    pub fn set_channel_enabled(
        &mut self,
        ch: Channel,
        enabled: bool,
    ) -> Result<(), Error<I::Error>> {
        let mut fields = self.registers.channel(ch);
        fields.set_enable(enabled);

        self.device
            .channel(usize::from(ch.index()))
            .write(|w| *w = fields)?;
        self.commit(RegisterId::Channel(ch), fields.to_mirror())
    }

    /// Enable a channel
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the device fails.
    pub fn enable_channel(&mut self, ch: Channel) -> Result<(), Error<I::Error>> {
        self.set_channel_enabled(ch, true)
    }

    /// Disable a channel
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the device fails.
    pub fn disable_channel(&mut self, ch: Channel) -> Result<(), Error<I::Error>> {
        self.set_channel_enabled(ch, false)
    }

    /// Bring the channel enable bits back to `mask`
    ///
    /// Only channels whose mirrored state differs from `mask` are written.
    /// Every channel is attempted even if one write fails.
    ///
    /// # Errors
    ///
    /// Returns the first error encountered.
    pub fn restore_channels(&mut self, mask: ChannelMask) -> Result<(), Error<I::Error>> {
        let mut result = Ok(());
        for ch in Channel::all() {
            let wanted = mask.contains(ch);
            if self.registers.channel_enabled(ch) == wanted {
                continue;
            }
            if let Err(error) = self.set_channel_enabled(ch, wanted) {
                #[cfg(feature = "defmt")]
                defmt::warn!("Failed to restore enable state of channel {}", ch.index());
                if result.is_ok() {
                    result = Err(error);
                }
            }
        }
        result
    }

    // ==================== Conversion to physical units ====================

    /// Convert a raw code from `ch` to volts
    ///
    /// Uses the polarity and PGA gain of the channel's setup, as held in the
    /// mirror, and the configured reference voltage. Does not access the
    /// device.
    pub fn convert_to_voltage(&self, ch: Channel, raw: i32) -> f32 {
        let setup = self.registers.config(self.registers.channel_setup(ch));
        let gain = (1u32 << setup.pga()) as f32;
        let reference = self.config.reference_voltage;

        if setup.bipolar() {
            let half_scale = (1u32 << (ADC_BITS - 1)) as f32;
            (raw as f32 / half_scale - 1.0) * (reference / gain)
        } else {
            let full_scale = (1u32 << ADC_BITS) as f32;
            raw as f32 * reference / (gain * full_scale)
        }
    }
}
