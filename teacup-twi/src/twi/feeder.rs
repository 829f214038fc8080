//! Synthetic event source for hosts and tests

use embedded_hal::delay::DelayNs;
use teacup_hal::TwiController;

use super::Twi;

/// Delay that services one bus event per call instead of waiting
///
/// Stands in for the bus interrupt where there is none: every spin of a
/// blocking call advances the bus by exactly one event, which keeps event
/// ordering deterministic.
pub struct EventFeeder<'a, C, const Q: usize, const B: usize> {
    twi: &'a Twi<C, Q, B>,
    serviced: usize,
}

impl<'a, C: TwiController, const Q: usize, const B: usize> EventFeeder<'a, C, Q, B> {
    pub fn new(twi: &'a Twi<C, Q, B>) -> Self {
        Self { twi, serviced: 0 }
    }

    /// Service events until the controller has nothing pending
    ///
    /// Returns the number of events serviced.
    pub fn drain(&mut self) -> usize {
        let mut count = 0;
        while self.twi.on_interrupt() {
            count += 1;
        }
        self.serviced += count;
        count
    }

    /// Events serviced so far
    pub fn serviced(&self) -> usize {
        self.serviced
    }
}

impl<C: TwiController, const Q: usize, const B: usize> DelayNs for EventFeeder<'_, C, Q, B> {
    fn delay_ns(&mut self, _ns: u32) {
        if self.twi.on_interrupt() {
            self.serviced += 1;
        }
    }
}
