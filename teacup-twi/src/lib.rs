//! Interrupt-driven two-wire (I2C/TWI) bus engine
//!
//! This crate turns a [`teacup_hal::TwiController`] into a queued,
//! interrupt-driven bus:
//!
//! - Bounded transmit queue with transmission boundaries
//! - Protocol state machine: controller write, controller read, paged
//!   (EEPROM-style) reads, listener receive and transmit
//! - Unified failure recovery with a drop-until-boundary write policy
//! - Blocking, async and [`teacup_hal::I2cBus`] front ends
//!
//! ```text
//! foreground                     bus interrupt
//! ----------                     -------------
//! Twi::write ──► TxQueue ──► Engine::handle(status) ──► TwiController
//!                              ▲                             │
//!                              └──────── next status ◄───────┘
//! ```
//!
//! The state machine in [`state`] is pure: it sees only status codes and
//! data bytes, and answers with a [`state::Reaction`]. [`Twi`] applies the
//! reactions to the controller and provides the producer-facing calls.

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

// Must come first so the other modules see the log macros
#[macro_use]
mod fmt;

pub mod address;
pub mod config;
pub mod error;
pub mod queue;
pub mod state;
pub mod twi;

pub use address::{Address, Direction};
pub use config::{ConfigError, Role, TwiConfig};
pub use error::TwiError;
pub use state::{Fault, Mode, SessionState};
pub use twi::{Blocking, EventFeeder, Twi};

#[cfg(all(test, feature = "serde"))]
mod config_file_tests {
    use super::*;

    #[test]
    fn test_listener_config_from_toml() {
        let config: TwiConfig = toml::from_str(
            r#"
            bit_rate = 400000
            paged_addressing = true

            [role.listener]
            own_address = 0x20
            general_call = true
            "#,
        )
        .unwrap();

        assert_eq!(config.cpu_hz, config::DEFAULT_CPU_HZ);
        assert_eq!(config.bit_rate, teacup_hal::i2c::FAST_MODE_HZ);
        assert!(config.paged_addressing);
        assert_eq!(
            config.role,
            Role::Listener {
                own_address: 0x20,
                general_call: true
            }
        );
        assert_eq!(config.validate().map(|d| d.bit_rate), Ok(12));
    }

    #[test]
    fn test_controller_config_from_toml() {
        let config: TwiConfig = toml::from_str(r#"role = "controller""#).unwrap();
        assert_eq!(config, TwiConfig::default());
    }
}
