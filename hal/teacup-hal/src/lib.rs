//! Teacup Hardware Abstraction Layer
//!
//! This crate defines the hardware abstraction traits the two-wire bus
//! engine is written against. Chip-specific adapters (AVR TWI, the host
//! simulator) implement them, so the same engine runs on hardware and in
//! host tests.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  Engine (teacup-twi), display, etc.     │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  teacup-hal (this crate - traits)       │
//! └─────────────────────────────────────────┘
//!                     │
//!         ┌───────────┴───────────┐
//!         ▼                       ▼
//! ┌───────────────┐       ┌───────────────┐
//! │  teacup-hal-  │       │  teacup-hal-  │
//! │      avr      │       │      sim      │
//! └───────────────┘       └───────────────┘
//! ```
//!
//! # Traits
//!
//! - [`twi::TwiController`] - Interrupt-driven TWI peripheral (controller boundary)
//! - [`i2c::I2cBus`] - Blocking I2C bus operations

#![no_std]
#![deny(unsafe_code)]

pub mod i2c;
pub mod twi;

// Re-export key traits at crate root for convenience
pub use i2c::I2cBus;
pub use twi::{ClockDivisor, Prescaler, Status, TwiController};
