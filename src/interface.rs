//! Bus interface for the AD7124
//!
//! This module provides implementations of the `device-driver` traits for
//! the AD7124's SPI framing, plus [`SerialReset`] for the device's serial
//! reset sequence. Tests substitute a simulated device.

pub use device_driver::RegisterInterface;

/// Serial interface reset
///
/// Writing 64 consecutive ones resets the AD7124's serial interface and every
/// register to its power-on value. This sits next to
/// [`RegisterInterface`], which only moves register bytes.
pub trait SerialReset: RegisterInterface {
    /// Reset the device's serial interface and registers
    ///
    /// # Errors
    ///
    /// Returns the bus error if the transfer fails.
    fn reset(&mut self) -> Result<(), Self::Error>;
}

/// Read bit of the communications register
const COMMS_READ: u8 = 0x40;
/// Register address bits of the communications register
const COMMS_ADDRESS_MASK: u8 = 0x3F;
/// Longest register transfer: 3 data bytes plus appended status
const MAX_TRANSFER: usize = 4;

/// SPI interface for the AD7124
///
/// Every access starts with a communications byte selecting the register and
/// direction. The AD7124 uses SPI mode 3.
///
/// The interface uses the `SpiDevice` trait from `embedded-hal`, which
/// manages chip select:
/// ```ignore
/// let spi_device = embedded_hal_bus::spi::ExclusiveDevice::new(spi_bus, cs_pin, delay);
/// let interface = SpiInterface::new(spi_device);
/// ```
pub struct SpiInterface<SPI> {
    spi: SPI,
}

impl<SPI> SpiInterface<SPI> {
    /// Create a new SPI interface with the given SPI device
    pub const fn new(spi: SPI) -> Self {
        Self { spi }
    }

    /// Consume the interface and return the SPI device
    pub fn release(self) -> SPI {
        self.spi
    }
}

impl<SPI, E> RegisterInterface for SpiInterface<SPI>
where
    SPI: embedded_hal::spi::SpiDevice<Error = E>,
{
    type Error = E;
    type AddressType = u8;

    fn read_register(
        &mut self,
        address: Self::AddressType,
        _size_bits: u32,
        read_data: &mut [u8],
    ) -> Result<(), Self::Error> {
        let comms = COMMS_READ | (address & COMMS_ADDRESS_MASK);

        let mut operations = [
            embedded_hal::spi::Operation::Write(&[comms]),
            embedded_hal::spi::Operation::Read(read_data),
        ];

        self.spi.transaction(&mut operations)
    }

    fn write_register(
        &mut self,
        address: Self::AddressType,
        _size_bits: u32,
        write_data: &[u8],
    ) -> Result<(), Self::Error> {
        // WEN (bit 7) must be low and R/W (bit 6) low for a write
        let comms = address & COMMS_ADDRESS_MASK;

        let mut buffer = [0u8; MAX_TRANSFER + 1];
        buffer[0] = comms;
        let len = write_data.len().min(MAX_TRANSFER);
        buffer[1..=len].copy_from_slice(&write_data[..len]);

        self.spi.write(&buffer[..=len])
    }
}

impl<SPI, E> SerialReset for SpiInterface<SPI>
where
    SPI: embedded_hal::spi::SpiDevice<Error = E>,
{
    fn reset(&mut self) -> Result<(), Self::Error> {
        // 64 SCLK cycles with DIN high
        self.spi.write(&[0xFF; 8])
    }
}
