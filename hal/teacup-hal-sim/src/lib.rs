//! Simulated TWI bus for host testing
//!
//! [`SimController`] implements [`teacup_hal::TwiController`] without any
//! hardware. It plays the far end of the bus: target [`Device`]s that
//! acknowledge, accept and return bytes, and remote controllers that address
//! this node in listener role. Every condition, address and byte on the wire
//! is recorded as a [`BusSignal`], so tests can assert the exact bus sequence
//! an engine produced.
//!
//! Nothing happens on its own: the simulator latches one status at a time
//! and only advances when the engine requests a continuation, which makes
//! event ordering fully deterministic.

pub mod controller;
pub mod device;
pub mod trace;

pub use controller::{Remote, SimController};
pub use device::Device;
pub use trace::{transfers, BusSignal, Transfer};
