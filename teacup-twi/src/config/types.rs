//! Configuration type definitions

use teacup_hal::i2c::STANDARD_MODE_HZ;
use teacup_hal::ClockDivisor;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::address::Address;

/// Default CPU clock (16 MHz)
pub const DEFAULT_CPU_HZ: u32 = 16_000_000;

/// Bus role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Role {
    /// Only ever drives transactions
    #[default]
    Controller,
    /// Also answers when addressed by another controller
    Listener {
        /// Own 7-bit address
        own_address: u8,
        /// Accept the general call address
        #[cfg_attr(feature = "serde", serde(default))]
        general_call: bool,
    },
}

/// Which optional protocol branches are active
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Capabilities {
    pub read: bool,
    pub listener: bool,
    pub paged: bool,
}

/// Bus engine configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TwiConfig {
    /// Bus role
    pub role: Role,
    /// CPU clock feeding the TWI peripheral (Hz)
    pub cpu_hz: u32,
    /// Desired SCL frequency (Hz)
    pub bit_rate: u32,
    /// Enable controller reads
    pub read_support: bool,
    /// Enable paged (write address, repeated start, read) transfers
    pub paged_addressing: bool,
}

impl Default for TwiConfig {
    fn default() -> Self {
        Self::controller(DEFAULT_CPU_HZ)
    }
}

impl TwiConfig {
    /// Controller role at standard mode
    pub const fn controller(cpu_hz: u32) -> Self {
        Self {
            role: Role::Controller,
            cpu_hz,
            bit_rate: STANDARD_MODE_HZ,
            read_support: false,
            paged_addressing: false,
        }
    }

    /// Listener role answering `own_address`, at standard mode
    pub const fn listener(cpu_hz: u32, own_address: u8) -> Self {
        Self {
            role: Role::Listener {
                own_address,
                general_call: false,
            },
            ..Self::controller(cpu_hz)
        }
    }

    pub const fn with_bit_rate(mut self, bit_rate: u32) -> Self {
        self.bit_rate = bit_rate;
        self
    }

    pub const fn with_read_support(mut self, enabled: bool) -> Self {
        self.read_support = enabled;
        self
    }

    /// Enable paged transfers; they end in a read, so reads are enabled too
    pub const fn with_paged_addressing(mut self, enabled: bool) -> Self {
        self.paged_addressing = enabled;
        if enabled {
            self.read_support = true;
        }
        self
    }

    /// Also accept the general call address (listener role only)
    pub const fn with_general_call(mut self, enabled: bool) -> Self {
        if let Role::Listener { own_address, .. } = self.role {
            self.role = Role::Listener {
                own_address,
                general_call: enabled,
            };
        }
        self
    }

    /// Own address and general call acceptance, if listening
    pub fn own_address(&self) -> Option<(Address, bool)> {
        match self.role {
            Role::Controller => None,
            Role::Listener {
                own_address,
                general_call,
            } => Address::new(own_address).map(|a| (a, general_call)),
        }
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            read: self.read_support || self.paged_addressing,
            listener: matches!(self.role, Role::Listener { .. }),
            paged: self.paged_addressing,
        }
    }

    /// Check the configuration and compute the clock divisor
    pub fn validate(&self) -> Result<ClockDivisor, ConfigError> {
        if let Role::Listener { own_address, .. } = self.role {
            // 0 is the general call, 0x78..=0x7F are reserved
            if own_address == 0 || own_address > 0x77 {
                return Err(ConfigError::InvalidOwnAddress);
            }
        }

        if self.bit_rate == 0 || self.cpu_hz / self.bit_rate < 16 {
            return Err(ConfigError::BitRateTooHigh);
        }

        ClockDivisor::compute(self.cpu_hz, self.bit_rate).ok_or(ConfigError::BitRateTooLow)
    }
}

/// Configuration validation error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Bit rate above what the CPU clock can produce
    BitRateTooHigh,
    /// Bit rate below what the largest prescaler can produce
    BitRateTooLow,
    /// Own address is the general call, reserved, or wider than 7 bits
    InvalidOwnAddress,
    /// Queue or buffer capacity is zero
    QueueCapacity,
}

#[cfg(test)]
mod tests {
    use super::*;
    use teacup_hal::Prescaler;

    #[test]
    fn test_default_is_standard_mode_controller() {
        let config = TwiConfig::default();
        assert_eq!(config.role, Role::Controller);
        let divisor = config.validate().unwrap();
        assert_eq!(divisor.bit_rate, 72);
        assert_eq!(divisor.prescaler, Prescaler::Div1);
    }

    #[test]
    fn test_bit_rate_limits() {
        let fast = TwiConfig::controller(DEFAULT_CPU_HZ).with_bit_rate(2_000_000);
        assert_eq!(fast.validate(), Err(ConfigError::BitRateTooHigh));

        let slow = TwiConfig::controller(DEFAULT_CPU_HZ).with_bit_rate(100);
        assert_eq!(slow.validate(), Err(ConfigError::BitRateTooLow));
    }

    #[test]
    fn test_listener_own_address() {
        let config = TwiConfig::listener(DEFAULT_CPU_HZ, 0x20).with_general_call(true);
        assert_eq!(
            config.own_address(),
            Some((Address::new(0x20).unwrap(), true))
        );
        assert!(config.capabilities().listener);

        assert_eq!(
            TwiConfig::listener(DEFAULT_CPU_HZ, 0).validate(),
            Err(ConfigError::InvalidOwnAddress)
        );
        assert_eq!(
            TwiConfig::listener(DEFAULT_CPU_HZ, 0x7C).validate(),
            Err(ConfigError::InvalidOwnAddress)
        );
    }

    #[test]
    fn test_paged_implies_read() {
        let caps = TwiConfig::default()
            .with_paged_addressing(true)
            .capabilities();
        assert!(caps.read);
        assert!(caps.paged);
        assert!(!caps.listener);
    }

    #[test]
    fn test_general_call_ignored_for_controller() {
        let config = TwiConfig::default().with_general_call(true);
        assert_eq!(config.role, Role::Controller);
    }
}
