//! Channel and setup indices, and the channel enable mask
//!
//! The AD7124 exposes 16 logical channels. Each channel register pairs a
//! positive and negative analog input with one of 8 setups, and carries an
//! enable bit. [`ChannelMask`] is the driver's view of those enable bits.
//!
//! # Example
//!
//! ```
//! use ad7124::{Channel, ChannelMask};
//!
//! let mut mask = ChannelMask::empty();
//! mask.insert(Channel::new(3).unwrap());
//! mask.insert(Channel::new(0).unwrap());
//!
//! assert_eq!(mask.count(), 2);
//! assert_eq!(mask.first().map(Channel::index), Some(0));
//! ```

/// Number of logical channels on the device
pub const CHANNEL_COUNT: usize = 16;

/// Number of setups (configuration/filter/offset/gain groups) on the device
pub const SETUP_COUNT: usize = 8;

/// A validated channel index (0-15)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Channel(u8);

impl Channel {
    /// Create a channel index, returning `None` if `index` is 16 or greater
    #[must_use]
    pub const fn new(index: u8) -> Option<Self> {
        if (index as usize) < CHANNEL_COUNT {
            Some(Self(index))
        } else {
            None
        }
    }

    /// Channel index as a `u8`
    #[must_use]
    pub const fn index(self) -> u8 {
        self.0
    }

    /// Iterate over all channels in ascending index order
    pub fn all() -> impl Iterator<Item = Self> {
        (0..CHANNEL_COUNT as u8).map(Self)
    }

    const fn bit(self) -> u16 {
        1 << self.0
    }
}

/// A validated setup index (0-7)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Setup(u8);

impl Setup {
    /// Create a setup index, returning `None` if `index` is 8 or greater
    #[must_use]
    pub const fn new(index: u8) -> Option<Self> {
        if (index as usize) < SETUP_COUNT {
            Some(Self(index))
        } else {
            None
        }
    }

    /// Build a setup index from the low three bits of `bits`
    ///
    /// Used when decoding the SETUP field of a channel register, which is
    /// three bits wide and therefore always valid.
    #[must_use]
    pub const fn from_field(bits: u8) -> Self {
        Self(bits & 0x7)
    }

    /// Setup index as a `u8`
    #[must_use]
    pub const fn index(self) -> u8 {
        self.0
    }

    /// Iterate over all setups in ascending index order
    pub fn all() -> impl Iterator<Item = Self> {
        (0..SETUP_COUNT as u8).map(Self)
    }
}

/// Set of channels, one bit per channel
///
/// Bit *i* corresponds to channel *i*. The driver derives this from the
/// enable bit of each mirrored channel register.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelMask(u16);

impl ChannelMask {
    /// Mask with no channel set
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Mask with every channel set
    #[must_use]
    pub const fn all() -> Self {
        Self(u16::MAX)
    }

    /// Build a mask from its raw bit representation
    #[must_use]
    pub const fn from_bits(bits: u16) -> Self {
        Self(bits)
    }

    /// Raw bit representation
    #[must_use]
    pub const fn bits(self) -> u16 {
        self.0
    }

    /// Whether `channel` is in the mask
    #[must_use]
    pub const fn contains(self, channel: Channel) -> bool {
        self.0 & channel.bit() != 0
    }

    /// Add `channel` to the mask
    pub fn insert(&mut self, channel: Channel) {
        self.0 |= channel.bit();
    }

    /// Remove `channel` from the mask
    pub fn remove(&mut self, channel: Channel) {
        self.0 &= !channel.bit();
    }

    /// Set or clear `channel`
    pub fn set(&mut self, channel: Channel, enabled: bool) {
        if enabled {
            self.insert(channel);
        } else {
            self.remove(channel);
        }
    }

    /// Number of channels in the mask
    #[must_use]
    pub const fn count(self) -> u32 {
        self.0.count_ones()
    }

    /// Whether the mask is empty
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Lowest-index channel in the mask
    #[must_use]
    pub fn first(self) -> Option<Channel> {
        if self.0 == 0 {
            None
        } else {
            Channel::new(self.0.trailing_zeros() as u8)
        }
    }

    /// Iterate over the channels in the mask in ascending index order
    pub fn iter(self) -> impl Iterator<Item = Channel> {
        Channel::all().filter(move |&channel| self.contains(channel))
    }
}

impl FromIterator<Channel> for ChannelMask {
    fn from_iter<T: IntoIterator<Item = Channel>>(iter: T) -> Self {
        let mut mask = Self::empty();
        for channel in iter {
            mask.insert(channel);
        }
        mask
    }
}
