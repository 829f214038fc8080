//! Two-wire interface (TWI) controller boundary
//!
//! An interrupt-driven TWI peripheral reports one status code per bus
//! event and waits until software tells it how to continue: send a start,
//! a stop, or carry on acknowledging (or not acknowledging) the next byte.
//! [`TwiController`] captures exactly that contract; [`Status`] names the
//! status codes of the AVR TWI status register, which doubles as the
//! vocabulary for every other adapter.

/// Bus status reported by the controller after each bus event
///
/// Codes are those of the AVR TWSR register with the prescaler bits
/// masked off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Status {
    /// A start condition has been transmitted
    Start,
    /// A repeated start condition has been transmitted
    RepeatedStart,
    /// Address + write sent, acknowledged
    WriteAddressAck,
    /// Address + write sent, not acknowledged
    WriteAddressNack,
    /// Data byte sent, acknowledged
    WriteDataAck,
    /// Data byte sent, not acknowledged
    WriteDataNack,
    /// Arbitration lost while sending address or data
    ArbitrationLost,
    /// Address + read sent, acknowledged
    ReadAddressAck,
    /// Address + read sent, not acknowledged
    ReadAddressNack,
    /// Data byte received, acknowledge returned
    ReadDataAck,
    /// Data byte received, no acknowledge returned
    ReadDataNack,
    /// Own address + write received, acknowledged
    ListenAddressed,
    /// Arbitration lost as master, then own address + write received
    ListenAddressedArbitrationLost,
    /// General call received, acknowledged
    GeneralCall,
    /// Arbitration lost as master, then general call received
    GeneralCallArbitrationLost,
    /// Byte received after own address, acknowledge returned
    ListenDataAck,
    /// Byte received after own address, no acknowledge returned
    ListenDataNack,
    /// Byte received after general call, acknowledge returned
    GeneralCallDataAck,
    /// Byte received after general call, no acknowledge returned
    GeneralCallDataNack,
    /// Stop or repeated start received while addressed
    ListenStop,
    /// Own address + read received, acknowledged
    ReplyAddressed,
    /// Arbitration lost as master, then own address + read received
    ReplyAddressedArbitrationLost,
    /// Reply byte sent, acknowledged
    ReplyDataAck,
    /// Reply byte sent, not acknowledged
    ReplyDataNack,
    /// Last reply byte sent, but acknowledged anyway
    ReplyLastDataAck,
    /// No relevant state information, nothing to do
    NoInfo,
    /// Illegal start or stop condition detected
    BusError,
    /// Code not defined by the peripheral
    Unknown(u8),
}

impl Status {
    /// Mask for the status bits of the raw register value
    pub const MASK: u8 = 0xF8;

    /// Decode a raw status register value
    pub const fn from_code(raw: u8) -> Self {
        match raw & Self::MASK {
            0x08 => Status::Start,
            0x10 => Status::RepeatedStart,
            0x18 => Status::WriteAddressAck,
            0x20 => Status::WriteAddressNack,
            0x28 => Status::WriteDataAck,
            0x30 => Status::WriteDataNack,
            0x38 => Status::ArbitrationLost,
            0x40 => Status::ReadAddressAck,
            0x48 => Status::ReadAddressNack,
            0x50 => Status::ReadDataAck,
            0x58 => Status::ReadDataNack,
            0x60 => Status::ListenAddressed,
            0x68 => Status::ListenAddressedArbitrationLost,
            0x70 => Status::GeneralCall,
            0x78 => Status::GeneralCallArbitrationLost,
            0x80 => Status::ListenDataAck,
            0x88 => Status::ListenDataNack,
            0x90 => Status::GeneralCallDataAck,
            0x98 => Status::GeneralCallDataNack,
            0xA0 => Status::ListenStop,
            0xA8 => Status::ReplyAddressed,
            0xB0 => Status::ReplyAddressedArbitrationLost,
            0xB8 => Status::ReplyDataAck,
            0xC0 => Status::ReplyDataNack,
            0xC8 => Status::ReplyLastDataAck,
            0xF8 => Status::NoInfo,
            0x00 => Status::BusError,
            other => Status::Unknown(other),
        }
    }

    /// Encode back into the raw status register value
    pub const fn code(self) -> u8 {
        match self {
            Status::Start => 0x08,
            Status::RepeatedStart => 0x10,
            Status::WriteAddressAck => 0x18,
            Status::WriteAddressNack => 0x20,
            Status::WriteDataAck => 0x28,
            Status::WriteDataNack => 0x30,
            Status::ArbitrationLost => 0x38,
            Status::ReadAddressAck => 0x40,
            Status::ReadAddressNack => 0x48,
            Status::ReadDataAck => 0x50,
            Status::ReadDataNack => 0x58,
            Status::ListenAddressed => 0x60,
            Status::ListenAddressedArbitrationLost => 0x68,
            Status::GeneralCall => 0x70,
            Status::GeneralCallArbitrationLost => 0x78,
            Status::ListenDataAck => 0x80,
            Status::ListenDataNack => 0x88,
            Status::GeneralCallDataAck => 0x90,
            Status::GeneralCallDataNack => 0x98,
            Status::ListenStop => 0xA0,
            Status::ReplyAddressed => 0xA8,
            Status::ReplyAddressedArbitrationLost => 0xB0,
            Status::ReplyDataAck => 0xB8,
            Status::ReplyDataNack => 0xC0,
            Status::ReplyLastDataAck => 0xC8,
            Status::NoInfo => 0xF8,
            Status::BusError => 0x00,
            Status::Unknown(code) => code,
        }
    }

    /// Check if this status carries a freshly received byte in the data register
    pub fn carries_data(&self) -> bool {
        matches!(
            self,
            Status::ReadDataAck
                | Status::ReadDataNack
                | Status::ListenDataAck
                | Status::ListenDataNack
                | Status::GeneralCallDataAck
                | Status::GeneralCallDataNack
        )
    }
}

/// Bit rate prescaler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Prescaler {
    Div1,
    Div4,
    Div16,
    Div64,
}

impl Prescaler {
    /// All prescalers, smallest first
    pub const ALL: [Prescaler; 4] = [
        Prescaler::Div1,
        Prescaler::Div4,
        Prescaler::Div16,
        Prescaler::Div64,
    ];

    /// Division factor
    pub const fn factor(self) -> u32 {
        match self {
            Prescaler::Div1 => 1,
            Prescaler::Div4 => 4,
            Prescaler::Div16 => 16,
            Prescaler::Div64 => 64,
        }
    }

    /// Value of the prescaler bits in the status register
    pub const fn bits(self) -> u8 {
        match self {
            Prescaler::Div1 => 0b00,
            Prescaler::Div4 => 0b01,
            Prescaler::Div16 => 0b10,
            Prescaler::Div64 => 0b11,
        }
    }
}

/// Clock divisor programmed into the bit rate and status registers
///
/// `SCL = F_CPU / (16 + 2 * bit_rate * prescaler)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClockDivisor {
    /// Bit rate register value
    pub bit_rate: u8,
    /// Prescaler selection
    pub prescaler: Prescaler,
}

impl ClockDivisor {
    /// Find the divisor for a bus bit rate, using the smallest prescaler that fits
    ///
    /// Returns `None` if the bit rate cannot be reached from this CPU clock.
    pub fn compute(cpu_hz: u32, bit_rate_hz: u32) -> Option<Self> {
        if bit_rate_hz == 0 {
            return None;
        }
        let ratio = cpu_hz / bit_rate_hz;
        if ratio < 16 {
            return None;
        }
        let product = (ratio - 16) / 2;

        Prescaler::ALL.iter().find_map(|&prescaler| {
            let bit_rate = product / prescaler.factor();
            u8::try_from(bit_rate)
                .ok()
                .map(|bit_rate| Self { bit_rate, prescaler })
        })
    }

    /// Resulting SCL frequency in Hz
    pub fn frequency(&self, cpu_hz: u32) -> u32 {
        cpu_hz / (16 + 2 * self.bit_rate as u32 * self.prescaler.factor())
    }
}

/// Interrupt-driven TWI peripheral
///
/// Every bus event latches a [`Status`] and stalls the bus until exactly
/// one continuation is requested: [`start`](Self::start),
/// [`stop`](Self::stop), [`ack`](Self::ack) or [`nack`](Self::nack).
/// A byte to transmit is placed with [`write_data`](Self::write_data)
/// before the continuation.
pub trait TwiController {
    /// Program the bus clock
    fn configure_clock(&mut self, divisor: ClockDivisor);

    /// Program the own-address filter and arm reception
    ///
    /// # Arguments
    /// * `own_address` - 7-bit address to respond to
    /// * `general_call` - Also respond to the general call address
    fn listen(&mut self, own_address: u8, general_call: bool);

    /// Status of the latest bus event, [`Status::NoInfo`] if none is pending
    fn status(&mut self) -> Status;

    /// Read the data register
    fn read_data(&mut self) -> u8;

    /// Load the data register with the next byte to transmit
    fn write_data(&mut self, byte: u8);

    /// Continue with a start (or repeated start) condition
    fn start(&mut self);

    /// Continue with a stop condition
    fn stop(&mut self);

    /// Continue, acknowledging the next received byte
    fn ack(&mut self);

    /// Continue, not acknowledging the next received byte
    fn nack(&mut self);
}
