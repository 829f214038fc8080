//! Transaction API
//!
//! [`Twi`] owns the engine and the controller of one physical bus. It is
//! shared by reference between foreground code and the bus interrupt:
//! every access runs inside a critical section, so a foreground step is
//! never interleaved with event handling.
//!
//! Blocking calls spin on a [`DelayNs`] with a short fixed delay. On bare
//! metal that is a cycle-counting delay while the real interrupt services
//! the bus; on a host it is an [`EventFeeder`] that services one event per
//! delay call.

mod asynch;
mod bus;
mod feeder;

pub use bus::Blocking;
pub use feeder::EventFeeder;

use core::cell::RefCell;

use critical_section::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use embedded_hal::delay::DelayNs;
use teacup_hal::{ClockDivisor, TwiController};

use crate::address::Address;
use crate::config::{ConfigError, TwiConfig};
use crate::error::TwiError;
use crate::state::{Control, Engine, Fault, SessionState};

/// Poll interval while spinning (µs)
pub const SPIN_DELAY_US: u32 = 10;

/// Default transmit queue capacity
pub const DEFAULT_QUEUE: usize = 16;

/// Default read and listener buffer capacity
pub const DEFAULT_BUFFER: usize = 32;

struct Inner<C, const Q: usize, const B: usize> {
    engine: Engine<Q, B>,
    controller: C,
}

/// Interrupt-driven bus engine bound to a controller
pub struct Twi<C, const Q: usize = DEFAULT_QUEUE, const B: usize = DEFAULT_BUFFER> {
    inner: Mutex<RefCell<Inner<C, Q, B>>>,
    /// Raised after every handled bus event
    progress: Signal<CriticalSectionRawMutex, ()>,
    config: TwiConfig,
    divisor: ClockDivisor,
}

impl<C: TwiController, const Q: usize, const B: usize> Twi<C, Q, B> {
    /// Validate the configuration and take ownership of the controller
    ///
    /// The controller is not touched until [`init`](Self::init).
    pub fn new(controller: C, config: TwiConfig) -> Result<Self, ConfigError> {
        if Q == 0 || B == 0 {
            return Err(ConfigError::QueueCapacity);
        }
        let divisor = config.validate()?;

        Ok(Self {
            inner: Mutex::new(RefCell::new(Inner {
                engine: Engine::new(config.capabilities()),
                controller,
            })),
            progress: Signal::new(),
            config,
            divisor,
        })
    }

    pub fn config(&self) -> &TwiConfig {
        &self.config
    }

    /// Clock divisor computed from the configuration
    pub fn divisor(&self) -> ClockDivisor {
        self.divisor
    }

    fn with<R>(&self, f: impl FnOnce(&mut Inner<C, Q, B>) -> R) -> R {
        critical_section::with(|cs| f(&mut self.inner.borrow_ref_mut(cs)))
    }

    /// Run a closure on the controller, inside the critical section
    pub fn controller<R>(&self, f: impl FnOnce(&mut C) -> R) -> R {
        self.with(|inner| f(&mut inner.controller))
    }

    /// Set the target address and program the peripheral
    ///
    /// Waits for a running transaction to finish first. In listener role
    /// this also arms the own-address filter.
    pub fn init(&self, address: Address, delay: &mut impl DelayNs) {
        while !self.try_init(address) {
            delay.delay_us(SPIN_DELAY_US);
        }
        debug!("twi: target {=u8:#x}", address.get());
    }

    /// Apply the address and program the peripheral if idle
    ///
    /// The idle check and the register writes share one critical section,
    /// so a remote controller cannot address us in between.
    fn try_init(&self, address: Address) -> bool {
        let divisor = self.divisor;
        let own = self.config.own_address();

        self.with(|inner| {
            if inner.engine.state().busy {
                return false;
            }
            inner.engine.set_address(address);
            inner.controller.configure_clock(divisor);
            if let Some((own_address, general_call)) = own {
                inner.controller.listen(own_address.get(), general_call);
            }
            true
        })
    }

    /// Check if a transaction is in progress
    pub fn busy(&self) -> bool {
        self.with(|inner| inner.engine.state().busy)
    }

    /// Snapshot of the session flags
    pub fn state(&self) -> SessionState {
        self.with(|inner| inner.engine.state())
    }

    pub fn address(&self) -> Address {
        self.with(|inner| inner.engine.address())
    }

    /// Fault of the last failed transfer, if any
    pub fn last_fault(&self) -> Option<Fault> {
        self.with(|inner| inner.engine.last_fault())
    }

    /// Take the last fault and clear the error flags
    pub fn take_fault(&self) -> Option<Fault> {
        self.with(|inner| inner.engine.take_fault())
    }

    /// Queue one byte of a transmission
    ///
    /// `last` marks the final byte; the next transmission cannot begin
    /// until this one has drained. After a bus failure bytes are dropped
    /// up to and including the next final byte. Blocks while the queue is
    /// full or the previous transmission is still draining.
    pub fn write(&self, byte: u8, last: bool, delay: &mut impl DelayNs) {
        while !self.try_write(byte, last) {
            delay.delay_us(SPIN_DELAY_US);
        }
    }

    /// Write a whole transmission, marking the final byte
    pub fn write_all(&self, bytes: &[u8], delay: &mut impl DelayNs) {
        let count = bytes.len();
        for (i, &byte) in bytes.iter().enumerate() {
            self.write(byte, i + 1 == count, delay);
        }
    }

    /// One attempt at queueing a byte, returns false if the caller must wait
    fn try_write(&self, byte: u8, last: bool) -> bool {
        self.with(|inner| {
            if inner.engine.drop_if_failed(last) {
                return true;
            }
            if !inner.engine.accepts_write() {
                return false;
            }
            match inner.engine.enqueue(byte, last) {
                Ok(true) => {
                    inner.controller.start();
                    true
                }
                Ok(false) => true,
                Err(_) => false,
            }
        })
    }

    /// Wait until the engine is idle
    pub fn flush(&self, delay: &mut impl DelayNs) {
        while self.busy() {
            delay.delay_us(SPIN_DELAY_US);
        }
    }

    /// Read `buf.len()` bytes from the target
    pub fn read_into(&self, buf: &mut [u8], delay: &mut impl DelayNs) -> Result<(), TwiError> {
        while !self.try_begin(|engine| engine.begin_read(buf.len()))? {
            delay.delay_us(SPIN_DELAY_US);
        }
        loop {
            if let Some(outcome) = self.try_finish_read(buf) {
                return outcome;
            }
            delay.delay_us(SPIN_DELAY_US);
        }
    }

    /// Write `page` as the memory address, then read `buf.len()` bytes
    ///
    /// The direction switch is a repeated start, so no other controller can
    /// get in between.
    pub fn read_page_into(
        &self,
        page: &[u8],
        buf: &mut [u8],
        delay: &mut impl DelayNs,
    ) -> Result<(), TwiError> {
        while !self.try_begin(|engine| engine.begin_paged_read(page, buf.len()))? {
            delay.delay_us(SPIN_DELAY_US);
        }
        loop {
            if let Some(outcome) = self.try_finish_read(buf) {
                return outcome;
            }
            delay.delay_us(SPIN_DELAY_US);
        }
    }

    fn try_begin(
        &self,
        begin: impl FnOnce(&mut Engine<Q, B>) -> Result<bool, TwiError>,
    ) -> Result<bool, TwiError> {
        self.with(|inner| {
            let started = begin(&mut inner.engine)?;
            if started {
                inner.controller.start();
            }
            Ok(started)
        })
    }

    fn try_finish_read(&self, buf: &mut [u8]) -> Option<Result<(), TwiError>> {
        self.with(|inner| inner.engine.finish_read(buf))
            .map(|outcome| outcome.map(|_| ()).map_err(TwiError::Failed))
    }

    /// Load the bytes answered to a remote controller reading from us
    pub fn set_reply(&self, bytes: &[u8]) -> Result<(), TwiError> {
        self.with(|inner| inner.engine.set_reply(bytes))
    }

    /// Copy out the last completed inbound transfer, returning its length
    pub fn take_received(&self, buf: &mut [u8]) -> Option<usize> {
        self.with(|inner| inner.engine.take_received(buf))
    }

    /// Service one bus event
    ///
    /// Call from the TWI interrupt. Returns false if the controller had
    /// nothing for the engine.
    pub fn on_interrupt(&self) -> bool {
        let handled = self.with(|inner| {
            let status = inner.controller.status();
            let data = inner.controller.read_data();
            let reaction = inner.engine.handle(status, data);

            if let Some(byte) = reaction.load {
                inner.controller.write_data(byte);
            }
            match reaction.control {
                Control::Ack => inner.controller.ack(),
                Control::Nack => inner.controller.nack(),
                Control::Start => inner.controller.start(),
                Control::Stop => inner.controller.stop(),
                Control::Hold => return false,
            }
            true
        });

        if handled {
            self.progress.signal(());
        }
        handled
    }
}
