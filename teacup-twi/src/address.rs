//! Target addressing

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Transfer direction, the low bit of the address byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    Write,
    Read,
}

impl Direction {
    /// Value of the direction bit
    pub const fn bit(self) -> u8 {
        match self {
            Direction::Write => 0,
            Direction::Read => 1,
        }
    }
}

/// 7-bit bus address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "u8", into = "u8"))]
pub struct Address(u8);

impl Address {
    /// General call address
    pub const GENERAL_CALL: Address = Address(0);

    /// Create an address, `None` if it does not fit in 7 bits
    pub const fn new(raw: u8) -> Option<Self> {
        if raw > 0x7F {
            None
        } else {
            Some(Self(raw))
        }
    }

    /// Create an address from the low 7 bits of `raw`
    pub const fn truncate(raw: u8) -> Self {
        Self(raw & 0x7F)
    }

    /// Raw 7-bit value
    pub const fn get(self) -> u8 {
        self.0
    }

    /// Address byte as it goes on the wire
    pub const fn with_direction(self, direction: Direction) -> u8 {
        (self.0 << 1) | direction.bit()
    }
}

impl TryFrom<u8> for Address {
    type Error = u8;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        Self::new(raw).ok_or(raw)
    }
}

impl From<Address> for u8 {
    fn from(address: Address) -> u8 {
        address.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_range() {
        assert_eq!(Address::new(0x7F).map(Address::get), Some(0x7F));
        assert!(Address::new(0x80).is_none());
        assert_eq!(Address::truncate(0xBC).get(), 0x3C);
    }

    #[test]
    fn test_wire_byte() {
        let address = Address::new(0x50).unwrap();
        assert_eq!(address.with_direction(Direction::Write), 0xA0);
        assert_eq!(address.with_direction(Direction::Read), 0xA1);
    }
}
