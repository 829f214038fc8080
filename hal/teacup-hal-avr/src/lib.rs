//! ATmega TWI adapter for the Teacup bus engine
//!
//! [`AvrTwi`] drives the TWI peripheral of the ATmega328P through
//! `avr-device` and implements [`teacup_hal::TwiController`]. The firmware
//! owns a `teacup_twi::Twi` in a static and forwards the `TWI` interrupt
//! to it:
//!
//! ```ignore
//! #[avr_device::interrupt(atmega328p)]
//! fn TWI() {
//!     BUS.on_interrupt();
//! }
//! ```
//!
//! # Features
//!
//! - `atmega328p` - Enable support for the ATmega328P (default)
//! - `defmt` - Enable debug formatting support

#![no_std]

use avr_device::atmega328p::TWI;
use embedded_hal::delay::DelayNs;
use teacup_hal::{ClockDivisor, Status, TwiController};

/// Control register bits
mod twcr {
    /// Interrupt flag, written as one to continue
    pub const TWINT: u8 = 1 << 7;
    /// Acknowledge received bytes and own address
    pub const TWEA: u8 = 1 << 6;
    pub const TWSTA: u8 = 1 << 5;
    pub const TWSTO: u8 = 1 << 4;
    pub const TWEN: u8 = 1 << 2;
    pub const TWIE: u8 = 1 << 0;
}

/// TWI peripheral of an ATmega328P
pub struct AvrTwi {
    twi: TWI,
    /// Keep own-address recognition armed across continuations
    listening: bool,
}

impl AvrTwi {
    pub fn new(twi: TWI) -> Self {
        Self {
            twi,
            listening: false,
        }
    }

    /// Give the peripheral back, disabled
    pub fn release(self) -> TWI {
        self.set_control(0);
        self.twi
    }

    /// Base control value: enabled, interrupt on, own address armed if listening
    fn base(&self) -> u8 {
        let ea = if self.listening { twcr::TWEA } else { 0 };
        twcr::TWEN | twcr::TWIE | ea
    }

    fn set_control(&self, bits: u8) {
        // All TWCR bits are writable; TWINT is cleared by writing one
        self.twi.twcr.write(|w| unsafe { w.bits(bits) });
    }

    fn resume(&self, bits: u8) {
        self.set_control(twcr::TWINT | bits);
    }
}

impl TwiController for AvrTwi {
    fn configure_clock(&mut self, divisor: ClockDivisor) {
        self.twi.twbr.write(|w| unsafe { w.bits(divisor.bit_rate) });
        // Status bits are read-only, only the prescaler sticks
        self.twi
            .twsr
            .write(|w| unsafe { w.bits(divisor.prescaler.bits()) });
        self.set_control(self.base());
    }

    fn listen(&mut self, own_address: u8, general_call: bool) {
        let twar = (own_address << 1) | u8::from(general_call);
        self.twi.twar.write(|w| unsafe { w.bits(twar) });
        self.listening = true;
        self.set_control(self.base());
    }

    fn status(&mut self) -> Status {
        if self.twi.twcr.read().bits() & twcr::TWINT == 0 {
            return Status::NoInfo;
        }
        Status::from_code(self.twi.twsr.read().bits())
    }

    fn read_data(&mut self) -> u8 {
        self.twi.twdr.read().bits()
    }

    fn write_data(&mut self, byte: u8) {
        self.twi.twdr.write(|w| unsafe { w.bits(byte) });
    }

    fn start(&mut self) {
        self.resume(self.base() | twcr::TWSTA);
    }

    fn stop(&mut self) {
        self.resume(self.base() | twcr::TWSTO);
    }

    fn ack(&mut self) {
        self.resume(twcr::TWEN | twcr::TWIE | twcr::TWEA);
    }

    fn nack(&mut self) {
        self.resume(twcr::TWEN | twcr::TWIE);
    }
}

/// Busy-wait delay calibrated against the CPU clock
///
/// Used by blocking bus calls while they wait for the interrupt to make
/// progress. Timing is approximate.
pub struct SpinDelay {
    cycles_per_us: u32,
}

impl SpinDelay {
    /// Cycles spent per loop iteration, nop plus loop overhead
    const CYCLES_PER_SPIN: u32 = 4;

    pub const fn new(cpu_hz: u32) -> Self {
        Self {
            cycles_per_us: cpu_hz / 1_000_000,
        }
    }
}

impl DelayNs for SpinDelay {
    fn delay_ns(&mut self, ns: u32) {
        let spins = (ns / 1000).max(1) * self.cycles_per_us / Self::CYCLES_PER_SPIN;
        for _ in 0..spins {
            avr_device::asm::nop();
        }
    }

    fn delay_us(&mut self, us: u32) {
        let spins = us.saturating_mul(self.cycles_per_us) / Self::CYCLES_PER_SPIN;
        for _ in 0..spins {
            avr_device::asm::nop();
        }
    }
}
