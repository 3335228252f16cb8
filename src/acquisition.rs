//! Single and continuous conversion acquisition
//!
//! Samples are attributed to channels from the STATUS register and delivered
//! to a [`SampleSink`]. [`SampleRouter`] is the sink that keeps the last value
//! and a sample count per channel, [`SampleBuffer`] captures samples in order,
//! and any `FnMut(Sample)` closure is a sink too.
//!
//! # Example
//!
//! ```ignore
//! use core::sync::atomic::{AtomicBool, Ordering};
//! use ad7124::{OutputFormat, SampleRouter};
//!
//! static STOP: AtomicBool = AtomicBool::new(false);
//!
//! let mut router = SampleRouter::new();
//! adc.single_conversion(&mut router, OutputFormat::Raw)?;
//!
//! // Stream voltages until STOP is set elsewhere
//! adc.continuous_conversion(
//!     || STOP.load(Ordering::Relaxed),
//!     &mut |sample: ad7124::Sample| { /* display */ },
//!     OutputFormat::Voltage,
//! )?;
//! ```

use crate::channels::{CHANNEL_COUNT, Channel, ChannelMask};
use crate::device::Ad7124;
use crate::interface::{RegisterInterface, SerialReset};
use crate::mode::ConversionMode;
use crate::Error;

/// Which values a routine attaches to its samples
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OutputFormat {
    /// Raw codes only
    #[default]
    Raw,
    /// Raw codes and the derived voltage
    Voltage,
}

/// One completed conversion
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Sample {
    /// Channel that was converted
    pub channel: Channel,
    /// Raw 24-bit code
    pub raw: i32,
    /// Conversion sequence number
    pub timestamp: u32,
    /// Voltage, when requested with [`OutputFormat::Voltage`]
    pub voltage: Option<f32>,
}

/// Receiver of acquired samples
pub trait SampleSink {
    /// Accept one sample
    fn accept(&mut self, sample: Sample);
}

impl<F> SampleSink for F
where
    F: FnMut(Sample),
{
    fn accept(&mut self, sample: Sample) {
        self(sample);
    }
}

/// Source of cancellation requests for continuous acquisition
///
/// Checked once per conversion; must not block.
pub trait Cancel {
    /// Whether the caller asked the routine to stop
    fn is_cancelled(&mut self) -> bool;
}

impl<F> Cancel for F
where
    F: FnMut() -> bool,
{
    fn is_cancelled(&mut self) -> bool {
        self()
    }
}

/// Per-channel accumulator of samples
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SampleRouter {
    last_value: [i32; CHANNEL_COUNT],
    sample_count: [u32; CHANNEL_COUNT],
}

impl SampleRouter {
    /// Create an empty router
    #[must_use]
    pub const fn new() -> Self {
        Self {
            last_value: [0; CHANNEL_COUNT],
            sample_count: [0; CHANNEL_COUNT],
        }
    }

    /// Store `raw` as the latest value of `channel` and count it
    pub fn record(&mut self, channel: Channel, raw: i32) {
        let index = usize::from(channel.index());
        self.last_value[index] = raw;
        self.sample_count[index] = self.sample_count[index].saturating_add(1);
    }

    /// Latest raw value of `channel` (0 if never sampled)
    #[must_use]
    pub const fn last_value(&self, channel: Channel) -> i32 {
        self.last_value[channel.index() as usize]
    }

    /// Number of samples recorded for `channel`
    #[must_use]
    pub const fn sample_count(&self, channel: Channel) -> u32 {
        self.sample_count[channel.index() as usize]
    }

    /// Channels with at least one sample
    #[must_use]
    pub fn sampled_channels(&self) -> ChannelMask {
        Channel::all()
            .filter(|&channel| self.sample_count(channel) > 0)
            .collect()
    }

    /// Reset all values and counts to zero
    pub fn clear(&mut self) {
        *self = Self::new();
    }
}

impl SampleSink for SampleRouter {
    fn accept(&mut self, sample: Sample) {
        self.record(sample.channel, sample.raw);
    }
}

/// Fixed-capacity sample capture
///
/// Keeps the first `N` samples in arrival order; later samples are counted
/// and dropped.
#[derive(Debug, Default, Clone)]
pub struct SampleBuffer<const N: usize> {
    samples: heapless::Vec<Sample, N>,
    dropped: u32,
}

impl<const N: usize> SampleBuffer<N> {
    /// Create an empty buffer
    #[must_use]
    pub const fn new() -> Self {
        Self {
            samples: heapless::Vec::new(),
            dropped: 0,
        }
    }

    /// Captured samples, oldest first
    #[must_use]
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Samples that arrived after the buffer was full
    #[must_use]
    pub const fn dropped(&self) -> u32 {
        self.dropped
    }

    /// Discard all captured samples
    pub fn clear(&mut self) {
        self.samples.clear();
        self.dropped = 0;
    }
}

impl<const N: usize> SampleSink for SampleBuffer<N> {
    fn accept(&mut self, sample: Sample) {
        if self.samples.push(sample).is_err() {
            #[cfg(feature = "defmt")]
            defmt::trace!("Sample buffer full, dropping channel {}", sample.channel.index());
            self.dropped = self.dropped.saturating_add(1);
        }
    }
}

impl<I, D> Ad7124<I, D>
where
    I: RegisterInterface<AddressType = u8> + SerialReset,
    D: embedded_hal::delay::DelayNs,
{
    /// Channel named by STATUS, checked against the device's channel count
    fn status_channel(&self, raw_channel: u8) -> Result<Channel, Error<I::Error>> {
        match Channel::new(raw_channel) {
            Some(channel) if raw_channel < self.config().channel_count => Ok(channel),
            _ => {
                #[cfg(feature = "defmt")]
                defmt::error!("Status reported channel {}, out of range", raw_channel);
                Err(Error::InvalidChannel(raw_channel))
            }
        }
    }

    /// Read the latest conversion of `channel`
    fn take_sample(&mut self, channel: Channel, format: OutputFormat) -> Result<Sample, Error<I::Error>> {
        let data = self.read_data()?;
        // 24-bit code, always representable
        let raw = data as i32;
        let voltage = match format {
            OutputFormat::Raw => None,
            OutputFormat::Voltage => Some(self.convert_to_voltage(channel, raw)),
        };

        Ok(Sample {
            channel,
            raw,
            timestamp: self.conversion_count(),
            voltage,
        })
    }

    /// Run one single conversion and disable the channel it sampled
    ///
    /// The device converts the lowest-index enabled channel. Clearing that
    /// channel's enable bit afterwards makes the next round sample the next
    /// enabled channel.
    ///
    /// The converter is left in whatever mode the conversion ended in; use
    /// [`single_conversion`](Self::single_conversion) for a complete sweep
    /// that idles the converter and restores the enable bits.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Timeout`] if the conversion does not complete within
    /// the configured timeout, [`Error::InvalidChannel`] if STATUS names a
    /// channel beyond [`DriverConfig::channel_count`](crate::DriverConfig::channel_count),
    /// or an error if communication fails.
    pub fn single_conversion_round(
        &mut self,
        format: OutputFormat,
    ) -> Result<Sample, Error<I::Error>> {
        self.set_mode(ConversionMode::Single)?;

        let timeout_us = self.config().ready_timeout_us;
        let status = self.wait_for_conversion_ready(timeout_us)?;
        let channel = self.status_channel(status.active_channel())?;
        let sample = self.take_sample(channel, format)?;

        self.disable_channel(sample.channel)?;
        Ok(sample)
    }

    /// Sample every enabled channel once in single conversion mode
    ///
    /// Runs at most one round per enabled channel. A round that times out is
    /// skipped; any other error ends the sweep. Afterwards the converter is
    /// idled and every channel's enable bit is restored to its state before
    /// the sweep, on success and on failure.
    ///
    /// Returns the channels that produced a sample.
    ///
    /// # Errors
    ///
    /// Returns the first error that ended the sweep, otherwise any error from
    /// idling the converter or restoring the channel enables.
    pub fn single_conversion<S: SampleSink>(
        &mut self,
        sink: &mut S,
        format: OutputFormat,
    ) -> Result<ChannelMask, Error<I::Error>> {
        let saved = self.enabled_channels();

        let sweep = self.with_idle(|adc| {
            let mut sampled = ChannelMask::empty();
            for _round in 0..saved.count() {
                match adc.single_conversion_round(format) {
                    Ok(sample) => {
                        sampled.insert(sample.channel);
                        sink.accept(sample);
                    }
                    Err(Error::Timeout) => {
                        #[cfg(feature = "defmt")]
                        defmt::warn!("Single conversion round {} timed out, skipping", _round);
                    }
                    Err(error) => return Err(error),
                }
            }
            Ok(sampled)
        });

        let restored = self.restore_channels(saved);
        let sampled = sweep?;
        restored?;

        #[cfg(feature = "defmt")]
        defmt::debug!(
            "Single conversion sweep sampled {} of {} channels",
            sampled.count(),
            saved.count()
        );

        Ok(sampled)
    }

    /// Stream samples in continuous conversion mode until cancelled
    ///
    /// `cancel` is checked once before every conversion. Conversions of
    /// channels that are not enabled produce no sample. The converter is idled
    /// when the routine returns, whether it was cancelled or failed.
    ///
    /// Returns the number of samples delivered to `sink`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Timeout`] if a conversion does not complete within
    /// the configured timeout, [`Error::InvalidChannel`] if STATUS names a
    /// channel beyond [`DriverConfig::channel_count`](crate::DriverConfig::channel_count),
    /// or an error if communication fails.
    pub fn continuous_conversion<C: Cancel, S: SampleSink>(
        &mut self,
        mut cancel: C,
        sink: &mut S,
        format: OutputFormat,
    ) -> Result<u32, Error<I::Error>> {
        self.with_idle(|adc| {
            adc.set_mode(ConversionMode::Continuous)?;

            let timeout_us = adc.config().ready_timeout_us;
            let mut delivered = 0u32;
            while !cancel.is_cancelled() {
                let status = adc.wait_for_conversion_ready(timeout_us)?;
                let channel = adc.status_channel(status.active_channel())?;

                if !adc.registers().channel_enabled(channel) {
                    #[cfg(feature = "defmt")]
                    defmt::trace!("Ignoring conversion of disabled channel {}", channel.index());
                    continue;
                }

                let sample = adc.take_sample(channel, format)?;
                sink.accept(sample);
                delivered = delivered.wrapping_add(1);
            }

            #[cfg(feature = "defmt")]
            defmt::debug!("Continuous conversion cancelled after {} samples", delivered);

            Ok(delivered)
        })
    }
}
