//! Register definitions and the in-memory register map for the AD7124
//!
//! The AD7124 has 57 registers at contiguous addresses `0x00..=0x38`. Their
//! bit fields are declared once with `device_driver`, which generates the typed
//! field sets in [`field_sets`] and the register-level API used by the driver.
//!
//! On top of that the driver keeps a [`RegisterMap`] mirror of every register:
//! the mirror is the source of truth between device accesses, and is only
//! updated once the bus transfer that reads or writes a register has
//! succeeded. Mirrored values are plain integers; they are decoded and encoded
//! through the generated field sets.
//!
//! ## Register layout
//! - `0x00..=0x08`: status, ADC control, data, I/O control, ID, error, clock count
//! - `0x09..=0x18`: channel map registers (16)
//! - `0x19..=0x20`: setup configuration registers (8)
//! - `0x21..=0x28`: setup filter registers (8)
//! - `0x29..=0x30`: setup offset coefficients (8)
//! - `0x31..=0x38`: setup gain coefficients (8)
//!
//! `DATA` is 24 bits wide, or 32 bits with STATUS appended when `DATA_STATUS`
//! is set; both views share address `0x02` and use `ALLOW_ADDRESS_OVERLAP`.

use crate::channels::{Channel, ChannelMask, SETUP_COUNT, Setup};

device_driver::create_device!(
    device_name: Ad7124Registers,
    dsl: {
        config {
            type RegisterAddressType = u8;
            type DefaultByteOrder = BE;
        }

        // ==================== STATUS AND CONTROL ====================

        /// STATUS (0x00)
        register Status {
            type Access = RO;
            const ADDRESS = 0x00;
            const SIZE_BITS = 8;

            /// Channel whose conversion is in the data register
            ch_active: uint = 0..4,
            /// Power-on reset occurred, cleared by reading STATUS
            por_flag: bool = 4,
            reserved_5: uint = 5..6,
            /// An error flag in the ERROR register is set
            error_flag: bool = 6,
            /// Conversion ready, active low
            rdy: bool = 7,
        },

        /// ADC_CONTROL (0x01)
        register AdcControl {
            const ADDRESS = 0x01;
            const SIZE_BITS = 16;

            /// Clock source
            clk_sel: uint = 0..2,
            /// Operating mode
            mode: uint = 2..6,
            /// Power level
            power_mode: uint = 6..8,
            /// Enable the internal reference
            ref_en: bool = 8,
            /// CS must be asserted for DOUT/RDY
            cs_en: bool = 9,
            /// Append STATUS to every data read
            data_status: bool = 10,
            /// Continuous read of the data register
            cont_read: bool = 11,
            /// Insert a delay before DOUT/RDY asserts
            dout_rdy_del: bool = 12,
            reserved_13: uint = 13..16,
        },

        /// DATA (0x02)
        register Data {
            type Access = RO;
            const ADDRESS = 0x02;
            const SIZE_BITS = 24;
            const ALLOW_ADDRESS_OVERLAP = true;

            /// Conversion result
            data: uint = 0..24,
        },

        /// DATA (0x02) read with STATUS appended
        register DataStatus {
            type Access = RO;
            const ADDRESS = 0x02;
            const SIZE_BITS = 32;
            const ALLOW_ADDRESS_OVERLAP = true;

            /// STATUS at the end of the conversion
            status: uint = 0..8,
            /// Conversion result
            data: uint = 8..32,
        },

        /// IO_CONTROL_1 (0x03)
        register IoControl1 {
            const ADDRESS = 0x03;
            const SIZE_BITS = 24;

            /// Excitation current and GPIO settings, not interpreted by the driver
            io_control: uint = 0..24,
        },

        /// IO_CONTROL_2 (0x04)
        register IoControl2 {
            const ADDRESS = 0x04;
            const SIZE_BITS = 16;

            /// Bias voltage enable, one bit per analog input
            vbias: uint = 0..16,
        },

        /// ID (0x05)
        register Id {
            type Access = RO;
            const ADDRESS = 0x05;
            const SIZE_BITS = 8;

            /// Silicon revision
            silicon_revision: uint = 0..4,
            /// Device family
            device_id: uint = 4..8,
        },

        /// ERROR (0x06)
        register ErrorFlags {
            type Access = RO;
            const ADDRESS = 0x06;
            const SIZE_BITS = 24;

            rom_crc_err: bool = 0,
            mm_crc_err: bool = 1,
            spi_crc_err: bool = 2,
            spi_write_err: bool = 3,
            spi_read_err: bool = 4,
            spi_sclk_cnt_err: bool = 5,
            spi_ignore_err: bool = 6,
            aldo_psm_err: bool = 7,
            reserved_8: uint = 8..9,
            dldo_psm_err: bool = 9,
            reserved_10: uint = 10..11,
            ref_det_err: bool = 11,
            ainm_uv_err: bool = 12,
            ainm_ov_err: bool = 13,
            ainp_uv_err: bool = 14,
            ainp_ov_err: bool = 15,
            adc_sat_err: bool = 16,
            adc_conv_err: bool = 17,
            adc_cal_err: bool = 18,
            ldo_cap_err: bool = 19,
            reserved_20: uint = 20..24,
        },

        /// ERROR_EN (0x07)
        register ErrorEnable {
            const ADDRESS = 0x07;
            const SIZE_BITS = 24;

            reserved_0: uint = 0..6,
            /// SPI ignore window check
            spi_ignore_err_en: bool = 6,
            reserved_7: uint = 7..11,
            /// Reference detect check
            ref_det_err_en: bool = 11,
            /// AINM undervoltage check
            ainm_uv_err_en: bool = 12,
            /// AINM overvoltage check
            ainm_ov_err_en: bool = 13,
            reserved_14: uint = 14..16,
            /// Saturation error check
            adc_sat_err_en: bool = 16,
            /// Conversion error check
            adc_conv_err_en: bool = 17,
            /// Calibration error check
            adc_cal_err_en: bool = 18,
            reserved_19: uint = 19..24,
        },

        /// MCLK_COUNT (0x08)
        register MclkCount {
            type Access = RO;
            const ADDRESS = 0x08;
            const SIZE_BITS = 8;

            /// Master clock counter
            count: uint = 0..8,
        },

        // ==================== CHANNELS AND SETUPS ====================

        /// CHANNEL_0 to CHANNEL_15 (0x09 to 0x18)
        register Channel {
            const ADDRESS = 0x09;
            const SIZE_BITS = 16;
            const REPEAT = {
                count: 16,
                stride: 1,
            };

            /// Negative analog input
            ainm: uint = 0..5,
            /// Positive analog input
            ainp: uint = 5..10,
            reserved_10: uint = 10..12,
            /// Setup used by the channel
            setup: uint = 12..15,
            /// Channel enable
            enable: bool = 15,
        },

        /// CONFIG_0 to CONFIG_7 (0x19 to 0x20)
        register Config {
            const ADDRESS = 0x19;
            const SIZE_BITS = 16;
            const REPEAT = {
                count: 8,
                stride: 1,
            };

            /// PGA gain as a power of two
            pga: uint = 0..3,
            /// Reference source
            ref_sel: uint = 3..5,
            /// Negative analog input buffer
            ain_bufm: bool = 5,
            /// Positive analog input buffer
            ain_bufp: bool = 6,
            /// Negative reference buffer
            ref_bufm: bool = 7,
            /// Positive reference buffer
            ref_bufp: bool = 8,
            /// Burnout current
            burnout: uint = 9..11,
            /// Bipolar coding
            bipolar: bool = 11,
            reserved_12: uint = 12..16,
        },

        /// FILTER_0 to FILTER_7 (0x21 to 0x28)
        register Filter {
            const ADDRESS = 0x21;
            const SIZE_BITS = 24;
            const REPEAT = {
                count: 8,
                stride: 1,
            };

            /// Output data rate divider
            fs: uint = 0..11,
            reserved_11: uint = 11..16,
            /// Single-cycle settling
            single_cycle: bool = 16,
            /// Post filter type
            post_filter: uint = 17..20,
            /// 50/60 Hz rejection
            rej60: bool = 20,
            /// Filter type (0 = sinc4, 2 = sinc3)
            filter: uint = 21..24,
        },

        /// OFFSET_0 to OFFSET_7 (0x29 to 0x30)
        register Offset {
            const ADDRESS = 0x29;
            const SIZE_BITS = 24;
            const REPEAT = {
                count: 8,
                stride: 1,
            };

            /// Offset coefficient
            offset: uint = 0..24,
        },

        /// GAIN_0 to GAIN_7 (0x31 to 0x38)
        register Gain {
            const ADDRESS = 0x31;
            const SIZE_BITS = 24;
            const REPEAT = {
                count: 8,
                stride: 1,
            };

            /// Gain coefficient
            gain: uint = 0..24,
        },
    }
);


/// Total number of registers in the map
pub const REGISTER_COUNT: usize = 57;

/// Mid-scale offset coefficient (zero offset correction)
pub const OFFSET_MID_SCALE: u32 = 0x80_0000;

/// Power-on value of the gain coefficient registers
pub const GAIN_DEFAULT: u32 = 0x50_0000;

const CHANNEL_BASE: u8 = 0x09;
const CONFIG_BASE: u8 = 0x19;
const FILTER_BASE: u8 = 0x21;
const OFFSET_BASE: u8 = 0x29;
const GAIN_BASE: u8 = 0x31;

/// Register access rights
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Access {
    /// Register can only be read
    ReadOnly,
    /// Register can be read and written
    ReadWrite,
}

/// Errors raised when a value cannot be stored in a register
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RegisterError {
    /// Attempted to write a read-only register (contains its address)
    ReadOnly(u8),
    /// Value does not fit in the register width
    ValueOutOfRange {
        /// Register address
        address: u8,
        /// Rejected value
        value: u32,
    },
}

/// One device register: address, current value, width and access rights
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Register {
    /// Register address
    pub address: u8,
    /// Current (mirrored) value
    pub value: u32,
    /// Width in bytes (1, 2 or 3)
    pub size: u8,
    /// Access rights
    pub access: Access,
}

impl Register {
    /// Create a register description
    #[must_use]
    pub const fn new(address: u8, value: u32, size: u8, access: Access) -> Self {
        Self {
            address,
            value,
            size,
            access,
        }
    }

    /// Largest value the register can hold
    #[must_use]
    pub const fn max_value(&self) -> u32 {
        if self.size >= 4 {
            u32::MAX
        } else {
            (1 << (self.size as u32 * 8)) - 1
        }
    }

    /// Check that `value` fits in the register width
    ///
    /// # Errors
    ///
    /// Returns [`RegisterError::ValueOutOfRange`] if it does not.
    pub const fn check_value(&self, value: u32) -> Result<(), RegisterError> {
        if value > self.max_value() {
            return Err(RegisterError::ValueOutOfRange {
                address: self.address,
                value,
            });
        }
        Ok(())
    }

    /// Check that `value` may be written to the device
    ///
    /// # Errors
    ///
    /// Returns [`RegisterError::ReadOnly`] for read-only registers and
    /// [`RegisterError::ValueOutOfRange`] for oversized values.
    pub const fn check_write(&self, value: u32) -> Result<(), RegisterError> {
        if matches!(self.access, Access::ReadOnly) {
            return Err(RegisterError::ReadOnly(self.address));
        }
        self.check_value(value)
    }
}

/// Symbolic register identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RegisterId {
    /// STATUS (0x00)
    Status,
    /// `ADC_CONTROL` (0x01)
    AdcControl,
    /// DATA (0x02)
    Data,
    /// `IO_CONTROL_1` (0x03)
    IoCon1,
    /// `IO_CONTROL_2` (0x04)
    IoCon2,
    /// ID (0x05)
    Id,
    /// ERROR (0x06)
    Error,
    /// `ERROR_EN` (0x07)
    ErrorEn,
    /// `MCLK_COUNT` (0x08)
    MclkCount,
    /// `CHANNEL_n` (0x09 + n)
    Channel(Channel),
    /// `CONFIG_n` (0x19 + n)
    Config(Setup),
    /// `FILTER_n` (0x21 + n)
    Filter(Setup),
    /// `OFFSET_n` (0x29 + n)
    Offset(Setup),
    /// `GAIN_n` (0x31 + n)
    Gain(Setup),
}

impl RegisterId {
    /// Device address of the register
    ///
    /// Addresses are contiguous, so this is also the register's index in the map.
    #[must_use]
    pub const fn address(self) -> u8 {
        match self {
            Self::Status => 0x00,
            Self::AdcControl => 0x01,
            Self::Data => 0x02,
            Self::IoCon1 => 0x03,
            Self::IoCon2 => 0x04,
            Self::Id => 0x05,
            Self::Error => 0x06,
            Self::ErrorEn => 0x07,
            Self::MclkCount => 0x08,
            Self::Channel(channel) => CHANNEL_BASE + channel.index(),
            Self::Config(setup) => CONFIG_BASE + setup.index(),
            Self::Filter(setup) => FILTER_BASE + setup.index(),
            Self::Offset(setup) => OFFSET_BASE + setup.index(),
            Self::Gain(setup) => GAIN_BASE + setup.index(),
        }
    }

    /// Look a register up by address
    #[must_use]
    pub fn from_address(address: u8) -> Option<Self> {
        let id = match address {
            0x00 => Self::Status,
            0x01 => Self::AdcControl,
            0x02 => Self::Data,
            0x03 => Self::IoCon1,
            0x04 => Self::IoCon2,
            0x05 => Self::Id,
            0x06 => Self::Error,
            0x07 => Self::ErrorEn,
            0x08 => Self::MclkCount,
            0x09..=0x18 => Self::Channel(Channel::new(address - CHANNEL_BASE)?),
            0x19..=0x20 => Self::Config(Setup::new(address - CONFIG_BASE)?),
            0x21..=0x28 => Self::Filter(Setup::new(address - FILTER_BASE)?),
            0x29..=0x30 => Self::Offset(Setup::new(address - OFFSET_BASE)?),
            0x31..=0x38 => Self::Gain(Setup::new(address - GAIN_BASE)?),
            _ => return None,
        };
        Some(id)
    }

    /// Iterate over every register in address order
    pub fn all() -> impl Iterator<Item = Self> {
        (0..REGISTER_COUNT as u8).filter_map(Self::from_address)
    }

    const fn index(self) -> usize {
        self.address() as usize
    }
}

/// Decoded STATUS register
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Status(u8);

impl Status {
    /// Wrap a raw STATUS value
    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    /// Raw register value
    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Decoded fields
    #[must_use]
    pub fn fields(self) -> field_sets::Status {
        field_sets::Status::from([self.0])
    }

    /// A conversion (or calibration) has completed
    #[must_use]
    pub fn ready(self) -> bool {
        !self.fields().rdy()
    }

    /// An error is flagged in the ERROR register
    #[must_use]
    pub fn error_flag(self) -> bool {
        self.fields().error_flag()
    }

    /// The device has been reset since STATUS was last read
    #[must_use]
    pub fn power_on_reset(self) -> bool {
        self.fields().por_flag()
    }

    /// Raw channel index reported for the last conversion
    #[must_use]
    pub fn active_channel(self) -> u8 {
        self.fields().ch_active()
    }
}

/// Conversion between a generated field set and its mirrored integer value
pub(crate) trait MirrorValue: Sized {
    /// Decode a mirrored value
    fn from_mirror(value: u32) -> Self;

    /// Encode into a mirrored value
    fn to_mirror(self) -> u32;
}

macro_rules! impl_mirror_value {
    ($($fields:ident: $bytes:literal),* $(,)?) => {
        $(
            impl MirrorValue for field_sets::$fields {
                fn from_mirror(value: u32) -> Self {
                    Self::from(to_be_bytes::<$bytes>(value))
                }

                fn to_mirror(self) -> u32 {
                    from_be_bytes::<$bytes>(self.into())
                }
            }
        )*
    };
}

impl_mirror_value!(
    Status: 1,
    AdcControl: 2,
    Id: 1,
    ErrorFlags: 3,
    ErrorEnable: 3,
    Channel: 2,
    Config: 2,
    Filter: 3,
);

/// Low `N` bytes of a mirrored value, most significant first
pub(crate) fn to_be_bytes<const N: usize>(value: u32) -> [u8; N] {
    let bytes = value.to_be_bytes();
    core::array::from_fn(|i| bytes[bytes.len() - N + i])
}

/// Mirrored value of big-endian register bytes
pub(crate) fn from_be_bytes<const N: usize>(bytes: [u8; N]) -> u32 {
    bytes
        .iter()
        .fold(0, |value, &byte| (value << 8) | u32::from(byte))
}

/// In-memory mirror of every device register
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterMap {
    registers: [Register; REGISTER_COUNT],
}

impl RegisterMap {
    /// Build a map from a full register table, in address order
    #[must_use]
    pub const fn new(registers: [Register; REGISTER_COUNT]) -> Self {
        Self { registers }
    }

    /// Register description and mirrored value
    #[must_use]
    pub const fn get(&self, id: RegisterId) -> &Register {
        &self.registers[id.index()]
    }

    /// Mirrored value of a register
    #[must_use]
    pub const fn value(&self, id: RegisterId) -> u32 {
        self.get(id).value
    }

    /// Update the mirrored value of a register
    ///
    /// This does not touch the device and does not check access rights; it
    /// is how the driver records the outcome of a completed bus transfer.
    ///
    /// # Errors
    ///
    /// Returns [`RegisterError::ValueOutOfRange`] if `value` does not fit.
    pub fn set(&mut self, id: RegisterId, value: u32) -> Result<(), RegisterError> {
        let register = &mut self.registers[id.index()];
        register.check_value(value)?;
        register.value = value;
        Ok(())
    }

    /// Iterate over every register in address order
    pub fn iter(&self) -> impl Iterator<Item = &Register> {
        self.registers.iter()
    }

    /// Mirrored `ADC_CONTROL` fields
    #[must_use]
    pub fn adc_control(&self) -> field_sets::AdcControl {
        field_sets::AdcControl::from_mirror(self.value(RegisterId::AdcControl))
    }

    /// Mirrored fields of a channel register
    #[must_use]
    pub fn channel(&self, ch: Channel) -> field_sets::Channel {
        field_sets::Channel::from_mirror(self.value(RegisterId::Channel(ch)))
    }

    /// Mirrored fields of a setup configuration register
    #[must_use]
    pub fn config(&self, setup: Setup) -> field_sets::Config {
        field_sets::Config::from_mirror(self.value(RegisterId::Config(setup)))
    }

    /// Whether a channel's enable bit is set in the mirror
    #[must_use]
    pub fn channel_enabled(&self, ch: Channel) -> bool {
        self.channel(ch).enable()
    }

    /// Channels whose enable bit is set in the mirror
    #[must_use]
    pub fn enabled_channels(&self) -> ChannelMask {
        Channel::all()
            .filter(|&ch| self.channel_enabled(ch))
            .collect()
    }

    /// Setup assigned to a channel
    #[must_use]
    pub fn channel_setup(&self, ch: Channel) -> Setup {
        Setup::from_field(self.channel(ch).setup())
    }

    /// Mirrored values of all filter registers, indexed by setup
    #[must_use]
    pub fn filters(&self) -> [u32; SETUP_COUNT] {
        let mut values = [0; SETUP_COUNT];
        for (value, setup) in values.iter_mut().zip(Setup::all()) {
            *value = self.value(RegisterId::Filter(setup));
        }
        values
    }
}
