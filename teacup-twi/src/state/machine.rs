//! Protocol state machine
//!
//! [`Engine::handle`] consumes one bus status at a time and decides how the
//! controller continues. Foreground operations (queueing bytes, starting
//! reads, loading the listener reply) are plain methods; the caller is
//! responsible for running them and `handle` mutually exclusive.

use heapless::Vec;
use teacup_hal::Status;

use super::session::{Fault, Mode, SessionState};
use crate::address::{Address, Direction};
use crate::config::Capabilities;
use crate::error::TwiError;
use crate::queue::TxQueue;

/// Longest page address sent ahead of a paged read
pub const MAX_PAGE_ADDRESS: usize = 4;

/// Byte sent when a remote controller reads past the reply
const REPLY_FILL: u8 = 0xFF;

/// How the controller continues after a bus event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Control {
    /// Continue, acknowledging the next received byte
    Ack,
    /// Continue, refusing the next received byte
    Nack,
    /// Request a (repeated) start condition
    Start,
    /// Request a stop condition
    Stop,
    /// Leave the controller alone
    Hold,
}

/// Engine answer to one bus event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Reaction {
    /// Byte to place in the data register before continuing
    pub load: Option<u8>,
    pub control: Control,
}

impl Reaction {
    pub const HOLD: Reaction = Reaction::new(Control::Hold);

    pub const fn new(control: Control) -> Self {
        Self {
            load: None,
            control,
        }
    }

    pub const fn send(byte: u8, control: Control) -> Self {
        Self {
            load: Some(byte),
            control,
        }
    }
}

/// Bus engine for one physical bus
///
/// `Q` is the transmit queue capacity, `B` the capacity of the read and
/// listener buffers.
#[derive(Debug)]
pub struct Engine<const Q: usize, const B: usize> {
    caps: Capabilities,
    address: Address,
    state: SessionState,
    queue: TxQueue<Q>,
    /// Byte on the wire, not yet acknowledged
    in_flight: Option<u8>,
    /// Unacknowledged byte of a suspended write, sent first on resume
    retry: Option<u8>,
    /// Controller transfer pre-empted by a remote controller
    suspended: Option<Mode>,
    page: Vec<u8, MAX_PAGE_ADDRESS>,
    page_index: usize,
    read_count: usize,
    read_buf: Vec<u8, B>,
    read_pending: bool,
    read_done: bool,
    inbound: Vec<u8, B>,
    inbound_ready: bool,
    outbound: Vec<u8, B>,
    out_index: usize,
    last_fault: Option<Fault>,
}

impl<const Q: usize, const B: usize> Engine<Q, B> {
    pub const fn new(caps: Capabilities) -> Self {
        Self {
            caps,
            address: Address::GENERAL_CALL,
            state: SessionState {
                mode: Mode::Idle,
                busy: false,
                error: false,
                low_priority_error: false,
                interrupted: false,
                should_end: false,
            },
            queue: TxQueue::new(),
            in_flight: None,
            retry: None,
            suspended: None,
            page: Vec::new(),
            page_index: 0,
            read_count: 0,
            read_buf: Vec::new(),
            read_pending: false,
            read_done: false,
            inbound: Vec::new(),
            inbound_ready: false,
            outbound: Vec::new(),
            out_index: 0,
            last_fault: None,
        }
    }

    pub fn capabilities(&self) -> Capabilities {
        self.caps
    }

    /// Target of controller transfers
    pub fn address(&self) -> Address {
        self.address
    }

    /// Change the target; only valid between transactions
    pub fn set_address(&mut self, address: Address) {
        self.address = address;
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Bytes waiting in the transmit queue
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn last_fault(&self) -> Option<Fault> {
        self.last_fault
    }

    /// Take the last fault, clearing the error flags
    pub fn take_fault(&mut self) -> Option<Fault> {
        self.state.error = false;
        self.state.low_priority_error = false;
        self.last_fault.take()
    }

    // ---- Foreground side ----

    /// Apply the drop-until-boundary policy
    ///
    /// Returns true if the byte must be dropped. The final byte of a
    /// transmission clears the error.
    pub fn drop_if_failed(&mut self, last: bool) -> bool {
        if !self.state.error {
            return false;
        }
        if last {
            debug!("twi: failed transmission dropped");
            self.state.error = false;
        }
        true
    }

    /// Check if a byte can be queued right now
    ///
    /// False while the previous transmission is still draining, while the
    /// queue is full, or while a read or listener transfer owns the engine.
    pub fn accepts_write(&self) -> bool {
        let mode_ok = match self.state.mode {
            Mode::Idle | Mode::MasterWrite => true,
            Mode::SlaveReceive | Mode::SlaveTransmit => {
                self.suspended == Some(Mode::MasterWrite)
            }
            Mode::MasterRead | Mode::PagedAddressPhase => false,
        };
        mode_ok && !self.state.should_end && self.queue.can_write()
    }

    /// Queue a byte and mark whether it ends the transmission
    ///
    /// Returns `Ok(true)` if a start condition must be requested, hands the
    /// byte back if the queue is full.
    pub fn enqueue(&mut self, byte: u8, last: bool) -> Result<bool, u8> {
        self.queue.push(byte)?;
        let start = self.begin(Mode::MasterWrite);
        self.state.should_end = last;
        Ok(start)
    }

    /// Prepare a controller read of `count` bytes
    ///
    /// Returns `Ok(true)` once the read is set up and a start condition must
    /// be requested, `Ok(false)` if the engine is still busy.
    pub fn begin_read(&mut self, count: usize) -> Result<bool, TwiError> {
        if !self.caps.read {
            return Err(TwiError::Unsupported);
        }
        self.check_read(count)?;
        if self.state.mode != Mode::Idle {
            return Ok(false);
        }

        self.prepare_read(count);
        Ok(self.begin(Mode::MasterRead))
    }

    /// Prepare a paged read: send `page`, then read `count` bytes
    pub fn begin_paged_read(&mut self, page: &[u8], count: usize) -> Result<bool, TwiError> {
        if !self.caps.paged {
            return Err(TwiError::Unsupported);
        }
        if page.is_empty() || page.len() > MAX_PAGE_ADDRESS {
            return Err(TwiError::Length);
        }
        self.check_read(count)?;
        if self.state.mode != Mode::Idle {
            return Ok(false);
        }

        self.page.clear();
        self.page
            .extend_from_slice(page)
            .map_err(|_| TwiError::Length)?;
        self.page_index = 0;
        self.prepare_read(count);
        Ok(self.begin(Mode::PagedAddressPhase))
    }

    fn check_read(&self, count: usize) -> Result<(), TwiError> {
        if count == 0 || count > B {
            Err(TwiError::Length)
        } else if self.state.error {
            Err(TwiError::PendingFailure)
        } else {
            Ok(())
        }
    }

    fn prepare_read(&mut self, count: usize) {
        self.read_count = count;
        self.read_buf.clear();
        self.read_pending = true;
        self.read_done = false;
    }

    /// Collect a finished read
    ///
    /// `None` while the read is still running. A failed read reports its
    /// fault and clears the error flag, which the read owns.
    pub fn finish_read(&mut self, buf: &mut [u8]) -> Option<Result<usize, Fault>> {
        if self.read_pending {
            return None;
        }
        if self.read_done {
            self.read_done = false;
            let n = self.read_buf.len().min(buf.len());
            buf[..n].copy_from_slice(&self.read_buf[..n]);
            return Some(Ok(n));
        }

        self.state.error = false;
        Some(Err(self.last_fault.take().unwrap_or(Fault::BusError)))
    }

    /// Load the bytes sent when a remote controller reads from us
    pub fn set_reply(&mut self, bytes: &[u8]) -> Result<(), TwiError> {
        if !self.caps.listener {
            return Err(TwiError::Unsupported);
        }
        self.outbound.clear();
        self.outbound
            .extend_from_slice(bytes)
            .map_err(|_| TwiError::Length)
    }

    /// Copy out the last completed inbound transfer
    ///
    /// `None` if nothing arrived since the last call. Bytes beyond the
    /// length of `buf` are discarded.
    pub fn take_received(&mut self, buf: &mut [u8]) -> Option<usize> {
        if !self.inbound_ready {
            return None;
        }
        self.inbound_ready = false;
        let n = self.inbound.len().min(buf.len());
        buf[..n].copy_from_slice(&self.inbound[..n]);
        self.inbound.clear();
        Some(n)
    }

    /// Enter a controller mode if idle, returning true if a start is needed
    fn begin(&mut self, mode: Mode) -> bool {
        if self.state.mode != Mode::Idle {
            return false;
        }
        debug!("twi: {} to {=u8:#x}", mode, self.address.get());
        self.state.mode = mode;
        self.state.busy = true;
        self.state.interrupted = false;
        self.state.low_priority_error = false;
        self.last_fault = None;
        true
    }

    // ---- Event side ----

    /// React to one bus status; `data` is the data register content
    pub fn handle(&mut self, status: Status, data: u8) -> Reaction {
        trace!("twi: {} in {}", status, self.state.mode);

        match status {
            Status::Start => self.on_start(false),
            Status::RepeatedStart => self.on_start(true),
            Status::WriteAddressAck => self.on_write_address_ack(),
            Status::WriteDataAck => self.on_write_data_ack(),
            Status::WriteAddressNack => self.recover(Fault::AddressNack),
            Status::WriteDataNack => self.recover(Fault::DataNack),
            Status::ArbitrationLost => self.recover(Fault::ArbitrationLost),
            Status::BusError => self.recover(Fault::BusError),

            Status::ReadAddressAck
            | Status::ReadAddressNack
            | Status::ReadDataAck
            | Status::ReadDataNack
                if !self.caps.read =>
            {
                Reaction::HOLD
            }
            Status::ReadAddressAck => self.on_read_address_ack(),
            Status::ReadAddressNack => self.recover(Fault::AddressNack),
            Status::ReadDataAck => self.on_read_data(data, false),
            Status::ReadDataNack => self.on_read_data(data, true),

            s if is_listener_status(s) && !self.caps.listener => Reaction::HOLD,
            Status::ListenAddressed | Status::GeneralCall => self.on_addressed_receive(false),
            Status::ListenAddressedArbitrationLost | Status::GeneralCallArbitrationLost => {
                self.on_addressed_receive(true)
            }
            Status::ListenDataAck | Status::GeneralCallDataAck => self.on_listen_data(data, false),
            Status::ListenDataNack | Status::GeneralCallDataNack => {
                self.on_listen_data(data, true)
            }
            Status::ListenStop => {
                self.inbound_ready = true;
                self.finish_listener(Control::Ack)
            }
            Status::ReplyAddressed => self.on_addressed_transmit(false),
            Status::ReplyAddressedArbitrationLost => self.on_addressed_transmit(true),
            Status::ReplyDataAck => self.next_reply_byte(),
            Status::ReplyDataNack | Status::ReplyLastDataAck => {
                self.finish_listener(Control::Stop)
            }

            Status::NoInfo | Status::Unknown(_) => Reaction::HOLD,
        }
    }

    fn on_start(&mut self, repeated: bool) -> Reaction {
        let direction = match self.state.mode {
            Mode::MasterRead => Direction::Read,
            Mode::PagedAddressPhase if repeated => {
                self.state.mode = Mode::MasterRead;
                Direction::Read
            }
            Mode::MasterWrite | Mode::PagedAddressPhase => Direction::Write,
            _ => return self.recover(Fault::BusError),
        };
        Reaction::send(self.address.with_direction(direction), Control::Ack)
    }

    fn on_write_address_ack(&mut self) -> Reaction {
        match self.state.mode {
            Mode::MasterWrite => match self.retry.take().or_else(|| self.queue.pop()) {
                Some(byte) => self.send_data(byte),
                None => self.complete_write(),
            },
            Mode::PagedAddressPhase => {
                self.page_index = 0;
                self.next_page_byte()
            }
            _ => self.recover(Fault::BusError),
        }
    }

    fn on_write_data_ack(&mut self) -> Reaction {
        match self.state.mode {
            Mode::MasterWrite => {
                self.in_flight = None;
                match self.queue.pop() {
                    Some(byte) => self.send_data(byte),
                    None => self.complete_write(),
                }
            }
            Mode::PagedAddressPhase => self.next_page_byte(),
            _ => self.recover(Fault::BusError),
        }
    }

    fn send_data(&mut self, byte: u8) -> Reaction {
        self.in_flight = Some(byte);
        Reaction::send(byte, Control::Ack)
    }

    /// Queue drained: the write is complete
    ///
    /// Completion does not look at the should-end flag. A producer that
    /// stalls between bytes of one transmission splits it in two.
    fn complete_write(&mut self) -> Reaction {
        debug!("twi: write to {=u8:#x} done", self.address.get());
        self.state.mode = Mode::Idle;
        self.state.busy = false;
        self.state.should_end = false;
        self.in_flight = None;
        Reaction::new(Control::Stop)
    }

    fn next_page_byte(&mut self) -> Reaction {
        match self.page.get(self.page_index) {
            Some(&byte) => {
                self.page_index += 1;
                Reaction::send(byte, Control::Ack)
            }
            // Page address sent, turn the bus around
            None => Reaction::new(Control::Start),
        }
    }

    fn on_read_address_ack(&mut self) -> Reaction {
        if self.state.mode != Mode::MasterRead {
            return self.recover(Fault::BusError);
        }
        self.read_buf.clear();
        if self.read_count <= 1 {
            Reaction::new(Control::Nack)
        } else {
            Reaction::new(Control::Ack)
        }
    }

    fn on_read_data(&mut self, byte: u8, last: bool) -> Reaction {
        if self.state.mode != Mode::MasterRead {
            return self.recover(Fault::BusError);
        }
        // count <= B was checked when the read began
        let _ = self.read_buf.push(byte);

        if last {
            debug!("twi: read {} from {=u8:#x}", self.read_buf.len(), self.address.get());
            self.state.mode = Mode::Idle;
            self.state.busy = false;
            self.read_pending = false;
            self.read_done = true;
            Reaction::new(Control::Stop)
        } else if self.read_buf.len() + 1 >= self.read_count {
            Reaction::new(Control::Nack)
        } else {
            Reaction::new(Control::Ack)
        }
    }

    /// Park a controller transfer while a remote controller talks to us
    fn suspend_master(&mut self, arbitration_lost: bool) {
        if self.state.mode.is_master() {
            self.suspended = Some(self.state.mode);
            self.state.interrupted = true;
            if let Some(byte) = self.in_flight.take() {
                self.retry = Some(byte);
            }
        }
        if arbitration_lost {
            warn!("twi: lost arbitration, addressed as listener");
            self.state.low_priority_error = true;
        }
    }

    fn on_addressed_receive(&mut self, arbitration_lost: bool) -> Reaction {
        self.suspend_master(arbitration_lost);
        self.state.mode = Mode::SlaveReceive;
        self.state.busy = true;
        self.inbound.clear();
        self.inbound_ready = false;

        if B <= 1 {
            Reaction::new(Control::Nack)
        } else {
            Reaction::new(Control::Ack)
        }
    }

    fn on_listen_data(&mut self, byte: u8, refused: bool) -> Reaction {
        // Refusing the byte before the last slot keeps this from overflowing
        let _ = self.inbound.push(byte);

        if refused {
            self.inbound_ready = true;
            self.finish_listener(Control::Ack)
        } else if B - self.inbound.len() <= 1 {
            Reaction::new(Control::Nack)
        } else {
            Reaction::new(Control::Ack)
        }
    }

    fn on_addressed_transmit(&mut self, arbitration_lost: bool) -> Reaction {
        self.suspend_master(arbitration_lost);
        self.state.mode = Mode::SlaveTransmit;
        self.state.busy = true;
        self.out_index = 0;
        self.next_reply_byte()
    }

    fn next_reply_byte(&mut self) -> Reaction {
        let byte = self
            .outbound
            .get(self.out_index)
            .copied()
            .unwrap_or(REPLY_FILL);
        self.out_index += 1;

        if self.out_index >= self.outbound.len() {
            Reaction::send(byte, Control::Nack)
        } else {
            Reaction::send(byte, Control::Ack)
        }
    }

    /// End a listener transfer, resuming a suspended controller transfer
    ///
    /// Either way the interrupted flag is consumed; without a suspended
    /// transfer it is a leftover of an earlier recovery.
    fn finish_listener(&mut self, idle: Control) -> Reaction {
        self.state.interrupted = false;
        match self.suspended.take() {
            Some(mode) => {
                debug!("twi: resuming {}", mode);
                self.state.mode = mode;
                Reaction::new(Control::Start)
            }
            None => {
                self.state.mode = Mode::Idle;
                self.state.busy = false;
                Reaction::new(idle)
            }
        }
    }

    /// Unified failure path: give up the transfer and return to idle
    fn recover(&mut self, fault: Fault) -> Reaction {
        warn!(
            "twi: {} in {} talking to {=u8:#x}",
            fault,
            self.state.mode,
            self.address.get()
        );
        self.state.error = true;
        self.state.interrupted = true;
        self.state.should_end = false;
        self.state.mode = Mode::Idle;
        self.state.busy = false;

        self.queue.clear();
        self.in_flight = None;
        self.retry = None;
        self.suspended = None;
        self.page.clear();
        self.page_index = 0;
        self.read_pending = false;
        self.read_done = false;
        self.last_fault = Some(fault);

        Reaction::new(Control::Stop)
    }
}

fn is_listener_status(status: Status) -> bool {
    matches!(
        status,
        Status::ListenAddressed
            | Status::ListenAddressedArbitrationLost
            | Status::GeneralCall
            | Status::GeneralCallArbitrationLost
            | Status::ListenDataAck
            | Status::ListenDataNack
            | Status::GeneralCallDataAck
            | Status::GeneralCallDataNack
            | Status::ListenStop
            | Status::ReplyAddressed
            | Status::ReplyAddressedArbitrationLost
            | Status::ReplyDataAck
            | Status::ReplyDataNack
            | Status::ReplyLastDataAck
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const WRITE_ONLY: Capabilities = Capabilities {
        read: false,
        listener: false,
        paged: false,
    };

    const EVERYTHING: Capabilities = Capabilities {
        read: true,
        listener: true,
        paged: true,
    };

    fn engine(caps: Capabilities) -> Engine<16, 8> {
        let mut engine = Engine::new(caps);
        engine.set_address(Address::new(0x50).unwrap());
        engine
    }

    fn ack() -> Reaction {
        Reaction::new(Control::Ack)
    }

    fn nack() -> Reaction {
        Reaction::new(Control::Nack)
    }

    fn stop() -> Reaction {
        Reaction::new(Control::Stop)
    }

    #[test]
    fn test_write_transaction_event_sequence() {
        let mut e = engine(WRITE_ONLY);
        assert_eq!(e.enqueue(0x10, false), Ok(true));
        assert_eq!(e.enqueue(0x20, false), Ok(false));
        assert_eq!(e.enqueue(0x30, true), Ok(false));
        assert!(e.state().should_end);
        assert!(!e.accepts_write());

        assert_eq!(e.handle(Status::Start, 0), Reaction::send(0xA0, Control::Ack));
        assert_eq!(
            e.handle(Status::WriteAddressAck, 0),
            Reaction::send(0x10, Control::Ack)
        );
        assert_eq!(
            e.handle(Status::WriteDataAck, 0),
            Reaction::send(0x20, Control::Ack)
        );
        assert_eq!(
            e.handle(Status::WriteDataAck, 0),
            Reaction::send(0x30, Control::Ack)
        );
        assert_eq!(e.handle(Status::WriteDataAck, 0), stop());

        let state = e.state();
        assert_eq!(state.mode, Mode::Idle);
        assert!(!state.busy);
        assert!(!state.should_end);
        assert!(e.accepts_write());
    }

    #[test]
    fn test_address_nack_recovers() {
        let mut e = engine(WRITE_ONLY);
        e.enqueue(0x10, false).unwrap();
        e.enqueue(0x30, true).unwrap();

        e.handle(Status::Start, 0);
        assert_eq!(e.handle(Status::WriteAddressNack, 0), stop());

        let state = e.state();
        assert!(state.error);
        assert!(state.interrupted);
        assert!(!state.busy);
        assert!(!state.should_end);
        assert_eq!(e.queued(), 0);
        assert_eq!(e.last_fault(), Some(Fault::AddressNack));

        // Dropped until the end of the transmission
        assert!(e.drop_if_failed(false));
        assert!(e.state().error);
        assert!(e.drop_if_failed(true));
        assert!(!e.state().error);
        assert!(!e.drop_if_failed(true));
    }

    #[test]
    fn test_every_hard_failure_takes_the_same_path() {
        let failures = [
            (Status::WriteDataNack, Fault::DataNack),
            (Status::ArbitrationLost, Fault::ArbitrationLost),
            (Status::BusError, Fault::BusError),
        ];

        for (status, fault) in failures {
            let mut e = engine(WRITE_ONLY);
            e.enqueue(1, false).unwrap();
            e.enqueue(2, false).unwrap();
            e.handle(Status::Start, 0);
            e.handle(Status::WriteAddressAck, 0);

            assert_eq!(e.handle(status, 0), stop());
            assert_eq!(e.last_fault(), Some(fault));
            assert!(e.state().error);
            assert_eq!(e.state().mode, Mode::Idle);
            assert_eq!(e.queued(), 0);
        }
    }

    #[test]
    fn test_new_transaction_clears_last_fault() {
        let mut e = engine(WRITE_ONLY);
        e.enqueue(1, true).unwrap();
        e.handle(Status::Start, 0);
        e.handle(Status::WriteAddressNack, 0);
        assert!(e.drop_if_failed(true));

        assert_eq!(e.enqueue(2, true), Ok(true));
        assert_eq!(e.last_fault(), None);
        assert!(!e.state().interrupted);
    }

    #[test]
    fn test_take_fault_clears_error() {
        let mut e = engine(WRITE_ONLY);
        e.enqueue(1, true).unwrap();
        e.handle(Status::Start, 0);
        e.handle(Status::BusError, 0);

        assert_eq!(e.take_fault(), Some(Fault::BusError));
        assert!(!e.state().error);
        assert_eq!(e.take_fault(), None);
    }

    #[test]
    fn test_status_in_wrong_mode_recovers() {
        let mut e = engine(WRITE_ONLY);
        assert_eq!(e.handle(Status::WriteDataAck, 0), stop());
        assert_eq!(e.last_fault(), Some(Fault::BusError));
    }

    #[test]
    fn test_unknown_and_idle_statuses_hold() {
        let mut e = engine(EVERYTHING);
        let before = e.state();
        assert_eq!(e.handle(Status::NoInfo, 0), Reaction::HOLD);
        assert_eq!(e.handle(Status::Unknown(0xD0), 0), Reaction::HOLD);
        assert_eq!(e.state(), before);
    }

    #[test]
    fn test_disabled_branches_hold() {
        let mut e = engine(WRITE_ONLY);
        assert_eq!(e.handle(Status::ReadDataAck, 0x12), Reaction::HOLD);
        assert_eq!(e.handle(Status::ListenAddressed, 0), Reaction::HOLD);
        assert_eq!(e.begin_read(1), Err(TwiError::Unsupported));
        assert_eq!(e.begin_paged_read(&[0], 1), Err(TwiError::Unsupported));
        assert_eq!(e.set_reply(&[1]), Err(TwiError::Unsupported));
        assert_eq!(e.state().mode, Mode::Idle);
    }

    #[test]
    fn test_master_read_framing() {
        let mut e = engine(EVERYTHING);
        assert_eq!(e.begin_read(3), Ok(true));

        assert_eq!(e.handle(Status::Start, 0), Reaction::send(0xA1, Control::Ack));
        assert_eq!(e.handle(Status::ReadAddressAck, 0), ack());
        assert_eq!(e.handle(Status::ReadDataAck, 0x11), ack());
        assert_eq!(e.handle(Status::ReadDataAck, 0x22), nack());
        assert_eq!(e.finish_read(&mut [0; 3]), None);
        assert_eq!(e.handle(Status::ReadDataNack, 0x33), stop());

        let mut buf = [0; 3];
        assert_eq!(e.finish_read(&mut buf), Some(Ok(3)));
        assert_eq!(buf, [0x11, 0x22, 0x33]);
        assert!(!e.state().busy);
    }

    #[test]
    fn test_single_byte_read_nacks_immediately() {
        let mut e = engine(EVERYTHING);
        e.begin_read(1).unwrap();
        e.handle(Status::Start, 0);
        assert_eq!(e.handle(Status::ReadAddressAck, 0), nack());
        assert_eq!(e.handle(Status::ReadDataNack, 0x5A), stop());

        let mut buf = [0; 1];
        assert_eq!(e.finish_read(&mut buf), Some(Ok(1)));
        assert_eq!(buf, [0x5A]);
    }

    #[test]
    fn test_read_length_and_pending_failure() {
        let mut e = engine(EVERYTHING);
        assert_eq!(e.begin_read(0), Err(TwiError::Length));
        assert_eq!(e.begin_read(9), Err(TwiError::Length));

        e.enqueue(1, false).unwrap();
        e.handle(Status::Start, 0);
        e.handle(Status::WriteAddressNack, 0);
        assert_eq!(e.begin_read(1), Err(TwiError::PendingFailure));
    }

    #[test]
    fn test_read_waits_for_idle() {
        let mut e = engine(EVERYTHING);
        e.enqueue(1, true).unwrap();
        assert_eq!(e.begin_read(2), Ok(false));
        assert_eq!(e.state().mode, Mode::MasterWrite);
    }

    #[test]
    fn test_failed_read_reports_fault() {
        let mut e = engine(EVERYTHING);
        e.begin_read(2).unwrap();
        e.handle(Status::Start, 0);
        assert_eq!(e.handle(Status::ReadAddressNack, 0), stop());

        assert_eq!(
            e.finish_read(&mut [0; 2]),
            Some(Err(Fault::AddressNack))
        );
        assert!(!e.state().error);
    }

    #[test]
    fn test_paged_read_event_sequence() {
        let mut e = engine(EVERYTHING);
        assert_eq!(e.begin_paged_read(&[0x00, 0x10], 2), Ok(true));
        assert_eq!(e.state().mode, Mode::PagedAddressPhase);

        assert_eq!(e.handle(Status::Start, 0), Reaction::send(0xA0, Control::Ack));
        assert_eq!(
            e.handle(Status::WriteAddressAck, 0),
            Reaction::send(0x00, Control::Ack)
        );
        assert_eq!(
            e.handle(Status::WriteDataAck, 0),
            Reaction::send(0x10, Control::Ack)
        );
        assert_eq!(
            e.handle(Status::WriteDataAck, 0),
            Reaction::new(Control::Start)
        );
        assert_eq!(
            e.handle(Status::RepeatedStart, 0),
            Reaction::send(0xA1, Control::Ack)
        );
        assert_eq!(e.state().mode, Mode::MasterRead);
        assert_eq!(e.handle(Status::ReadAddressAck, 0), ack());
        assert_eq!(e.handle(Status::ReadDataAck, 7), nack());
        assert_eq!(e.handle(Status::ReadDataNack, 8), stop());

        let mut buf = [0; 2];
        assert_eq!(e.finish_read(&mut buf), Some(Ok(2)));
        assert_eq!(buf, [7, 8]);
    }

    #[test]
    fn test_paged_read_rejects_long_page() {
        let mut e = engine(EVERYTHING);
        assert_eq!(e.begin_paged_read(&[], 1), Err(TwiError::Length));
        assert_eq!(e.begin_paged_read(&[0; 5], 1), Err(TwiError::Length));
    }

    #[test]
    fn test_listener_receive_until_stop() {
        let mut e = engine(EVERYTHING);
        assert_eq!(e.handle(Status::ListenAddressed, 0), ack());
        assert!(e.state().busy);
        assert_eq!(e.state().mode, Mode::SlaveReceive);
        assert!(!e.accepts_write());

        assert_eq!(e.handle(Status::ListenDataAck, 1), ack());
        assert_eq!(e.handle(Status::ListenDataAck, 2), ack());
        assert_eq!(e.take_received(&mut [0; 8]), None);
        assert_eq!(e.handle(Status::ListenStop, 0), ack());
        assert!(!e.state().busy);

        let mut buf = [0; 8];
        assert_eq!(e.take_received(&mut buf), Some(2));
        assert_eq!(&buf[..2], &[1, 2]);
        assert_eq!(e.take_received(&mut buf), None);
    }

    #[test]
    fn test_listener_refuses_overlong_transfer() {
        let mut e = engine(EVERYTHING);
        e.handle(Status::GeneralCall, 0);
        for byte in 0..6 {
            assert_eq!(e.handle(Status::GeneralCallDataAck, byte), ack());
        }
        // One slot left: refuse the next byte
        assert_eq!(e.handle(Status::GeneralCallDataAck, 6), nack());
        assert_eq!(e.handle(Status::GeneralCallDataNack, 7), ack());
        assert_eq!(e.state().mode, Mode::Idle);
        assert!(!e.state().error);

        let mut buf = [0; 8];
        assert_eq!(e.take_received(&mut buf), Some(8));
        assert_eq!(buf, [0, 1, 2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn test_listener_reply() {
        let mut e = engine(EVERYTHING);
        e.set_reply(&[0xA1, 0xA2, 0xA3]).unwrap();

        assert_eq!(
            e.handle(Status::ReplyAddressed, 0),
            Reaction::send(0xA1, Control::Ack)
        );
        assert_eq!(
            e.handle(Status::ReplyDataAck, 0),
            Reaction::send(0xA2, Control::Ack)
        );
        assert_eq!(
            e.handle(Status::ReplyDataAck, 0),
            Reaction::send(0xA3, Control::Nack)
        );
        assert_eq!(e.handle(Status::ReplyDataNack, 0), stop());
        assert!(!e.state().busy);
    }

    #[test]
    fn test_listener_reply_single_byte_and_empty() {
        let mut e = engine(EVERYTHING);
        e.set_reply(&[0x42]).unwrap();
        assert_eq!(
            e.handle(Status::ReplyAddressed, 0),
            Reaction::send(0x42, Control::Nack)
        );
        assert_eq!(e.handle(Status::ReplyLastDataAck, 0), stop());

        e.set_reply(&[]).unwrap();
        assert_eq!(
            e.handle(Status::ReplyAddressed, 0),
            Reaction::send(REPLY_FILL, Control::Nack)
        );
    }

    #[test]
    fn test_arbitration_loss_suspends_and_resumes_write() {
        let mut e = engine(EVERYTHING);
        e.enqueue(0x10, false).unwrap();
        e.enqueue(0x11, true).unwrap();
        e.handle(Status::Start, 0);
        e.handle(Status::WriteAddressAck, 0);

        // 0x10 was on the wire when another controller took over
        assert_eq!(e.handle(Status::ListenAddressedArbitrationLost, 0), ack());
        let state = e.state();
        assert_eq!(state.mode, Mode::SlaveReceive);
        assert!(state.low_priority_error);
        assert!(state.interrupted);
        assert!(state.busy);
        assert!(!state.error);

        assert_eq!(e.handle(Status::ListenDataAck, 0x77), ack());
        assert_eq!(e.handle(Status::ListenStop, 0), Reaction::new(Control::Start));
        assert_eq!(e.state().mode, Mode::MasterWrite);
        assert!(!e.state().interrupted);

        assert_eq!(e.handle(Status::Start, 0), Reaction::send(0xA0, Control::Ack));
        assert_eq!(
            e.handle(Status::WriteAddressAck, 0),
            Reaction::send(0x10, Control::Ack)
        );
        assert_eq!(
            e.handle(Status::WriteDataAck, 0),
            Reaction::send(0x11, Control::Ack)
        );
        assert_eq!(e.handle(Status::WriteDataAck, 0), stop());
    }

    #[test]
    fn test_reply_after_arbitration_loss_restarts() {
        let mut e = engine(EVERYTHING);
        e.set_reply(&[9]).unwrap();
        e.enqueue(0x10, true).unwrap();
        e.handle(Status::Start, 0);

        e.handle(Status::ReplyAddressedArbitrationLost, 0);
        assert!(e.state().interrupted);
        assert!(e.state().low_priority_error);
        assert_eq!(
            e.handle(Status::ReplyDataNack, 0),
            Reaction::new(Control::Start)
        );
        assert!(!e.state().interrupted);
        assert_eq!(e.state().mode, Mode::MasterWrite);
    }

    #[test]
    fn test_reply_with_stale_interrupted_flag_stops() {
        let mut e = engine(EVERYTHING);
        e.enqueue(1, true).unwrap();
        e.handle(Status::Start, 0);
        e.handle(Status::ArbitrationLost, 0);
        assert!(e.state().interrupted);

        e.handle(Status::ReplyAddressed, 0);
        assert_eq!(e.handle(Status::ReplyDataNack, 0), stop());
        assert!(!e.state().interrupted);
        assert_eq!(e.state().mode, Mode::Idle);
    }

    #[test]
    fn test_receive_with_stale_interrupted_flag_completes() {
        let mut e = engine(EVERYTHING);
        e.enqueue(1, true).unwrap();
        e.handle(Status::Start, 0);
        e.handle(Status::WriteAddressNack, 0);
        assert!(e.state().interrupted);

        // Completed by stop
        e.handle(Status::ListenAddressed, 0);
        e.handle(Status::ListenDataAck, 0x42);
        assert_eq!(e.handle(Status::ListenStop, 0), ack());
        assert!(!e.state().interrupted);
        assert_eq!(e.state().mode, Mode::Idle);

        // Completed by a refused byte
        e.enqueue(2, true).unwrap();
        e.handle(Status::Start, 0);
        e.handle(Status::BusError, 0);
        assert!(e.state().interrupted);
        e.handle(Status::GeneralCall, 0);
        assert_eq!(e.handle(Status::GeneralCallDataNack, 0x43), ack());
        assert!(!e.state().interrupted);
        assert!(!e.state().busy);
    }

    #[test]
    fn test_writes_wait_for_listener_transfer() {
        let mut e = engine(EVERYTHING);
        e.handle(Status::ListenAddressed, 0);
        assert!(!e.accepts_write());
        e.handle(Status::ListenStop, 0);
        assert!(e.accepts_write());
    }
}
