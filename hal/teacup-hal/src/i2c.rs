//! I2C bus abstractions
//!
//! Provides the blocking, whole-transfer view of an I2C master. The
//! interrupt-driven engine implements it on top of [`crate::twi`] so
//! device drivers can stay unaware of queueing and status codes.

/// Standard mode bit rate (100 kHz)
pub const STANDARD_MODE_HZ: u32 = 100_000;

/// Fast mode bit rate (400 kHz)
pub const FAST_MODE_HZ: u32 = 400_000;

/// Fast mode plus bit rate (1 MHz)
pub const FAST_MODE_PLUS_HZ: u32 = 1_000_000;

/// I2C bus master
///
/// Provides basic I2C read/write operations for communicating with
/// peripheral devices.
pub trait I2cBus {
    /// Error type for I2C operations
    type Error;

    /// Write data to a device at the given address
    ///
    /// # Arguments
    /// * `address` - 7-bit I2C address
    /// * `data` - Bytes to write
    fn write(&mut self, address: u8, data: &[u8]) -> Result<(), Self::Error>;

    /// Read data from a device at the given address
    ///
    /// # Arguments
    /// * `address` - 7-bit I2C address
    /// * `buf` - Buffer to read into
    fn read(&mut self, address: u8, buf: &mut [u8]) -> Result<(), Self::Error>;

    /// Write then read in a single transaction (repeated start)
    ///
    /// This is commonly used to write a register or memory page address,
    /// then read data.
    ///
    /// # Arguments
    /// * `address` - 7-bit I2C address
    /// * `write_data` - Bytes to write (typically register address)
    /// * `read_buf` - Buffer to read into
    fn write_read(
        &mut self,
        address: u8,
        write_data: &[u8],
        read_buf: &mut [u8],
    ) -> Result<(), Self::Error>;
}
