//! Async variants of the blocking calls
//!
//! Instead of spinning, these wait on the progress signal raised by
//! [`Twi::on_interrupt`]. The ordering guarantees are the same: bytes are
//! never dropped or reordered unless the bus fails.

use teacup_hal::TwiController;

use super::Twi;
use crate::address::Address;
use crate::error::TwiError;

impl<C: TwiController, const Q: usize, const B: usize> Twi<C, Q, B> {
    async fn progress(&self) {
        self.progress.wait().await;
    }

    /// [`init`](Self::init) without spinning
    pub async fn init_async(&self, address: Address) {
        while !self.try_init(address) {
            self.progress().await;
        }
    }

    /// [`write`](Self::write) without spinning
    pub async fn write_async(&self, byte: u8, last: bool) {
        while !self.try_write(byte, last) {
            self.progress().await;
        }
    }

    /// Write a whole transmission, marking the final byte
    pub async fn write_all_async(&self, bytes: &[u8]) {
        let count = bytes.len();
        for (i, &byte) in bytes.iter().enumerate() {
            self.write_async(byte, i + 1 == count).await;
        }
    }

    /// [`flush`](Self::flush) without spinning
    pub async fn flush_async(&self) {
        while self.busy() {
            self.progress().await;
        }
    }

    /// [`read_into`](Self::read_into) without spinning
    pub async fn read_into_async(&self, buf: &mut [u8]) -> Result<(), TwiError> {
        while !self.try_begin(|engine| engine.begin_read(buf.len()))? {
            self.progress().await;
        }
        loop {
            if let Some(outcome) = self.try_finish_read(buf) {
                return outcome;
            }
            self.progress().await;
        }
    }
}
