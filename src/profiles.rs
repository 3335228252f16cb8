//! Register configuration profiles
//!
//! A profile is a complete register table used to (re)initialize the device.
//! Switching profiles replaces the whole register map, see
//! [`Ad7124::load_profile`](crate::Ad7124::load_profile).
//!
//! ## Profile A
//! Seven bipolar differential channels (0-6), each on its own setup (0-6),
//! external reference on AVDD, PGA gain 128, sinc4 filter with FS = 22.
//! Standby, full power.
//!
//! ## Profile B
//! Four channels on two setups using the internal 2.5 V reference: channels 0
//! and 1 bipolar at gain 1, channels 2 and 3 unipolar at gain 16. Sinc3 filter
//! with FS = 384, status appended to data reads. Standby, mid power.

use crate::channels::{CHANNEL_COUNT, SETUP_COUNT};
use crate::registers::field_sets::{AdcControl, Channel, Config, ErrorEnable, Filter};
use crate::registers::{
    Access, GAIN_DEFAULT, MirrorValue, OFFSET_MID_SCALE, REGISTER_COUNT, Register, RegisterMap,
};

const CHANNEL_BASE: usize = 0x09;
const CONFIG_BASE: usize = 0x19;
const FILTER_BASE: usize = 0x21;
const OFFSET_BASE: usize = 0x29;
const GAIN_BASE: usize = 0x31;

/// Named register configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Profile {
    /// Power-on register values from the datasheet
    PowerOn,
    /// Seven bipolar channels, high gain (see module docs)
    A,
    /// Four channels on the internal reference (see module docs)
    B,
}

impl Profile {
    /// Full register map for this profile
    #[must_use]
    pub fn register_map(self) -> RegisterMap {
        RegisterMap::new(match self {
            Self::PowerOn => power_on(),
            Self::A => profile_a(),
            Self::B => profile_b(),
        })
    }
}

const fn ro(address: usize, value: u32, size: u8) -> Register {
    Register::new(address as u8, value, size, Access::ReadOnly)
}

const fn rw(address: usize, value: u32, size: u8) -> Register {
    Register::new(address as u8, value, size, Access::ReadWrite)
}

/// Encode a register value from its cleared field set
fn encode<F: MirrorValue>(build: impl FnOnce(&mut F)) -> u32 {
    let mut fields = F::from_mirror(0);
    build(&mut fields);
    fields.to_mirror()
}

fn channel(enable: bool, setup: u8, ainp: u8, ainm: u8) -> u32 {
    encode(|ch: &mut Channel| {
        ch.set_enable(enable);
        ch.set_setup(setup);
        ch.set_ainp(ainp);
        ch.set_ainm(ainm);
    })
}

fn power_on() -> [Register; REGISTER_COUNT] {
    let mut regs = [ro(0, 0, 1); REGISTER_COUNT];
    regs[0x00] = ro(0x00, 0x00, 1);
    regs[0x01] = rw(0x01, 0x0000, 2);
    regs[0x02] = ro(0x02, 0x00_0000, 3);
    regs[0x03] = rw(0x03, 0x00_0000, 3);
    regs[0x04] = rw(0x04, 0x0000, 2);
    regs[0x05] = ro(0x05, 0x14, 1);
    regs[0x06] = ro(0x06, 0x00_0000, 3);
    regs[0x07] = rw(
        0x07,
        encode(|e: &mut ErrorEnable| e.set_spi_ignore_err_en(true)),
        3,
    );
    regs[0x08] = ro(0x08, 0x00, 1);

    for i in 0..CHANNEL_COUNT {
        regs[CHANNEL_BASE + i] = rw(CHANNEL_BASE + i, channel(i == 0, 0, 0, 1), 2);
    }

    let config = encode(|c: &mut Config| {
        c.set_bipolar(true);
        c.set_ain_bufp(true);
        c.set_ain_bufm(true);
    });
    let filter = encode(|f: &mut Filter| {
        f.set_post_filter(3);
        f.set_fs(384);
    });
    for i in 0..SETUP_COUNT {
        regs[CONFIG_BASE + i] = rw(CONFIG_BASE + i, config, 2);
        regs[FILTER_BASE + i] = rw(FILTER_BASE + i, filter, 3);
        regs[OFFSET_BASE + i] = rw(OFFSET_BASE + i, OFFSET_MID_SCALE, 3);
        regs[GAIN_BASE + i] = rw(GAIN_BASE + i, GAIN_DEFAULT, 3);
    }
    regs
}

fn profile_a() -> [Register; REGISTER_COUNT] {
    const AIN_PAIRS: [(u8, u8); 7] = [(0, 1), (2, 3), (14, 15), (6, 7), (8, 9), (10, 11), (12, 13)];

    let mut regs = power_on();
    regs[0x01] = rw(
        0x01,
        encode(|c: &mut AdcControl| {
            c.set_mode(2);
            c.set_power_mode(3);
        }),
        2,
    );
    regs[0x05] = ro(0x05, 0x02, 1);
    regs[0x07] = rw(
        0x07,
        encode(|e: &mut ErrorEnable| {
            e.set_adc_sat_err_en(true);
            e.set_adc_conv_err_en(true);
            e.set_adc_cal_err_en(true);
            e.set_spi_ignore_err_en(true);
            e.set_ainm_ov_err_en(true);
            e.set_ainm_uv_err_en(true);
            e.set_ref_det_err_en(true);
        }),
        3,
    );

    for i in 0..CHANNEL_COUNT {
        regs[CHANNEL_BASE + i] = rw(CHANNEL_BASE + i, channel(false, 0, 0, 1), 2);
    }
    for (i, &(ainp, ainm)) in AIN_PAIRS.iter().enumerate() {
        regs[CHANNEL_BASE + i] = rw(CHANNEL_BASE + i, channel(true, i as u8, ainp, ainm), 2);
    }

    let config = encode(|c: &mut Config| {
        c.set_bipolar(true);
        c.set_burnout(0);
        c.set_ref_sel(3);
        c.set_pga(7);
    });
    let filter = encode(|f: &mut Filter| f.set_fs(22));
    for i in 0..SETUP_COUNT {
        regs[CONFIG_BASE + i] = rw(CONFIG_BASE + i, config, 2);
        regs[FILTER_BASE + i] = rw(FILTER_BASE + i, filter, 3);
    }
    regs
}

fn profile_b() -> [Register; REGISTER_COUNT] {
    const CHANNELS: [(u8, u8, u8); 4] = [(0, 0, 1), (0, 2, 3), (1, 4, 5), (1, 6, 7)];

    let mut regs = power_on();
    regs[0x01] = rw(
        0x01,
        encode(|c: &mut AdcControl| {
            c.set_data_status(true);
            c.set_ref_en(true);
            c.set_power_mode(1);
            c.set_mode(2);
        }),
        2,
    );
    regs[0x07] = rw(
        0x07,
        encode(|e: &mut ErrorEnable| {
            e.set_adc_sat_err_en(true);
            e.set_adc_conv_err_en(true);
            e.set_adc_cal_err_en(true);
            e.set_spi_ignore_err_en(true);
        }),
        3,
    );

    for i in 0..CHANNEL_COUNT {
        regs[CHANNEL_BASE + i] = rw(CHANNEL_BASE + i, channel(false, 0, 0, 1), 2);
    }
    for (i, &(setup, ainp, ainm)) in CHANNELS.iter().enumerate() {
        regs[CHANNEL_BASE + i] = rw(CHANNEL_BASE + i, channel(true, setup, ainp, ainm), 2);
    }

    regs[CONFIG_BASE] = rw(
        CONFIG_BASE,
        encode(|c: &mut Config| {
            c.set_bipolar(true);
            c.set_ref_sel(2);
            c.set_ain_bufp(true);
            c.set_ain_bufm(true);
            c.set_pga(0);
        }),
        2,
    );
    regs[CONFIG_BASE + 1] = rw(
        CONFIG_BASE + 1,
        encode(|c: &mut Config| {
            c.set_ref_sel(2);
            c.set_ain_bufp(true);
            c.set_ain_bufm(true);
            c.set_pga(4);
        }),
        2,
    );
    let filter = encode(|f: &mut Filter| {
        f.set_filter(2);
        f.set_post_filter(3);
        f.set_fs(384);
    });
    for i in 0..SETUP_COUNT {
        regs[FILTER_BASE + i] = rw(FILTER_BASE + i, filter, 3);
    }
    regs
}
