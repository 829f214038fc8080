//! Whole-transfer view of the engine

use embedded_hal::delay::DelayNs;
use teacup_hal::{I2cBus, TwiController};

use super::Twi;
use crate::address::Address;
use crate::error::TwiError;

/// [`Twi`] bound to a delay, usable wherever an [`I2cBus`] is expected
///
/// Every call is one complete transfer: it retargets the engine, runs the
/// transfer to completion and reports its outcome.
pub struct Blocking<'a, C, D, const Q: usize, const B: usize> {
    twi: &'a Twi<C, Q, B>,
    delay: D,
}

impl<'a, C: TwiController, D: DelayNs, const Q: usize, const B: usize> Blocking<'a, C, D, Q, B> {
    pub fn new(twi: &'a Twi<C, Q, B>, delay: D) -> Self {
        Self { twi, delay }
    }

    /// Release the delay
    pub fn into_inner(self) -> D {
        self.delay
    }

    fn target(&mut self, address: u8) -> Result<(), TwiError> {
        let address = Address::new(address).ok_or(TwiError::Address)?;
        self.twi.init(address, &mut self.delay);
        if self.twi.state().error {
            return Err(TwiError::PendingFailure);
        }
        Ok(())
    }
}

impl<C: TwiController, D: DelayNs, const Q: usize, const B: usize> I2cBus
    for Blocking<'_, C, D, Q, B>
{
    type Error = TwiError;

    fn write(&mut self, address: u8, data: &[u8]) -> Result<(), Self::Error> {
        if data.is_empty() {
            return Err(TwiError::Length);
        }
        self.target(address)?;

        self.twi.write_all(data, &mut self.delay);
        self.twi.flush(&mut self.delay);

        match self.twi.take_fault() {
            Some(fault) => Err(TwiError::Failed(fault)),
            None => Ok(()),
        }
    }

    fn read(&mut self, address: u8, buf: &mut [u8]) -> Result<(), Self::Error> {
        self.target(address)?;
        self.twi.read_into(buf, &mut self.delay)
    }

    fn write_read(
        &mut self,
        address: u8,
        write_data: &[u8],
        read_buf: &mut [u8],
    ) -> Result<(), Self::Error> {
        self.target(address)?;
        self.twi.read_page_into(write_data, read_buf, &mut self.delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TwiConfig;
    use crate::state::Fault;
    use crate::twi::EventFeeder;
    use teacup_hal_sim::{Device, SimController};

    fn twi() -> Twi<SimController> {
        let mut memory = [0u8; 0x100];
        memory[0x42] = 0x99;
        let sim = SimController::new()
            .with_device(Device::eeprom(0x50, 1, &memory))
            .with_device(Device::new(0x3C));
        Twi::new(sim, TwiConfig::default().with_paged_addressing(true)).unwrap()
    }

    #[test]
    fn test_bus_write_and_write_read() {
        let twi = twi();
        let mut bus = Blocking::new(&twi, EventFeeder::new(&twi));

        bus.write(0x3C, &[0x00, 0xAF]).unwrap();
        assert_eq!(
            twi.controller(|c| c.device(0x3C).unwrap().received().to_vec()),
            vec![0x00, 0xAF]
        );

        let mut buf = [0; 1];
        bus.write_read(0x50, &[0x42], &mut buf).unwrap();
        assert_eq!(buf, [0x99]);
    }

    #[test]
    fn test_bus_reports_failures() {
        let twi = twi();
        let mut bus = Blocking::new(&twi, EventFeeder::new(&twi));

        assert_eq!(
            bus.write(0x11, &[1]),
            Err(TwiError::Failed(Fault::AddressNack))
        );
        // The failure was reported, the next transfer starts clean
        bus.write(0x3C, &[1]).unwrap();

        assert_eq!(bus.write(0x80, &[1]), Err(TwiError::Address));
        assert_eq!(bus.write(0x3C, &[]), Err(TwiError::Length));
        assert_eq!(
            bus.write_read(0x50, &[0; 5], &mut [0; 1]),
            Err(TwiError::Length)
        );
    }
}
