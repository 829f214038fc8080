//! Simulated TWI controller
//!
//! The controller follows the AVR TWI flow: a status is latched, the engine
//! reads it, optionally loads the data register, then requests exactly one
//! continuation. The continuation decides what the simulated wire does next
//! and which status is latched after it.

use std::collections::VecDeque;

use teacup_hal::twi::{ClockDivisor, Status, TwiController};

use crate::device::Device;
use crate::trace::BusSignal;

/// A transfer started by another controller on the bus
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Remote {
    /// Remote controller writes these bytes to `address`
    Write { address: u8, bytes: Vec<u8> },
    /// Remote controller reads `count` bytes from `address`
    Read { address: u8, count: usize },
}

impl Remote {
    fn address(&self) -> u8 {
        match self {
            Remote::Write { address, .. } | Remote::Read { address, .. } => *address,
        }
    }
}

/// What the simulated wire is doing
#[derive(Debug, Clone, PartialEq, Eq)]
enum Phase {
    /// Bus free, nothing latched
    Idle,
    /// Start granted, the next byte is an address
    Address,
    /// Addressed a device for writing
    Transmit,
    /// Addressed a device for reading
    Receive,
    /// Master side gave up the bus (lost arbitration or bus error)
    Lost,
    /// Remote controller is writing to us
    Listen {
        bytes: VecDeque<u8>,
        general_call: bool,
    },
    /// Remote controller stopped after we acknowledged its last byte
    ListenStopped,
    /// We refused a byte; the remote controller will stop
    ListenRefused,
    /// Remote controller is reading from us
    Reply { wanted: usize },
    /// Remote controller has finished reading
    ReplyDone,
}

/// Simulated TWI peripheral and bus
#[derive(Debug)]
pub struct SimController {
    devices: Vec<Device>,
    current: Option<usize>,
    phase: Phase,
    pending: Status,
    data: u8,
    loaded: bool,
    trace: Vec<BusSignal>,
    clock: Option<ClockDivisor>,
    own: Option<(u8, bool)>,
    fail_next: Option<Status>,
    preempt: Option<Remote>,
    remotes: VecDeque<Remote>,
    replied: Vec<u8>,
    events: usize,
}

impl Default for SimController {
    fn default() -> Self {
        Self::new()
    }
}

impl SimController {
    /// Create an empty bus
    pub fn new() -> Self {
        Self {
            devices: Vec::new(),
            current: None,
            phase: Phase::Idle,
            pending: Status::NoInfo,
            data: 0xFF,
            loaded: false,
            trace: Vec::new(),
            clock: None,
            own: None,
            fail_next: None,
            preempt: None,
            remotes: VecDeque::new(),
            replied: Vec::new(),
            events: 0,
        }
    }

    /// Attach a target device
    pub fn with_device(mut self, device: Device) -> Self {
        self.devices.push(device);
        self
    }

    /// Look up a device by address
    pub fn device(&self, address: u8) -> Option<&Device> {
        self.devices.iter().find(|d| d.address() == address)
    }

    /// Look up a device by address, mutably
    pub fn device_mut(&mut self, address: u8) -> Option<&mut Device> {
        self.devices.iter_mut().find(|d| d.address() == address)
    }

    /// Everything seen on the wire so far
    pub fn trace(&self) -> &[BusSignal] {
        &self.trace
    }

    /// Forget the trace recorded so far
    pub fn clear_trace(&mut self) {
        self.trace.clear();
    }

    /// Clock programmed by the engine, if any
    pub fn clock(&self) -> Option<ClockDivisor> {
        self.clock
    }

    /// Own address filter programmed by the engine, if any
    pub fn own_address(&self) -> Option<(u8, bool)> {
        self.own
    }

    /// Number of continuations the engine has requested
    pub fn events(&self) -> usize {
        self.events
    }

    /// Check if a status is latched and waiting for the engine
    pub fn is_pending(&self) -> bool {
        self.pending != Status::NoInfo
    }

    /// Bytes the engine sent to remote controllers reading from it
    pub fn replied(&self) -> &[u8] {
        &self.replied
    }

    /// Replace the outcome of the next master byte (address or data)
    ///
    /// Meant for [`Status::ArbitrationLost`] and [`Status::BusError`].
    pub fn fail_next_byte(&mut self, status: Status) {
        self.fail_next = Some(status);
    }

    /// Let another controller win arbitration during the next master byte
    /// and address this node right away
    pub fn preempt_with(&mut self, remote: Remote) {
        self.preempt = Some(remote);
    }

    /// Queue a remote controller writing to us
    pub fn remote_write(&mut self, address: u8, bytes: &[u8]) {
        self.remotes.push_back(Remote::Write {
            address,
            bytes: bytes.to_vec(),
        });
        self.begin_next_remote();
    }

    /// Queue a remote controller reading from us
    pub fn remote_read(&mut self, address: u8, count: usize) {
        self.remotes.push_back(Remote::Read { address, count });
        self.begin_next_remote();
    }

    fn addressed(&self, address: u8) -> Option<bool> {
        let (own, general_call) = self.own?;
        if address == own {
            Some(false)
        } else if address == 0 && general_call {
            Some(true)
        } else {
            None
        }
    }

    /// Start the next queued remote transfer if the bus is free
    fn begin_next_remote(&mut self) {
        while self.phase == Phase::Idle {
            let Some(remote) = self.remotes.pop_front() else {
                return;
            };
            let Some(general_call) = self.addressed(remote.address()) else {
                continue;
            };
            self.trace.push(BusSignal::Start);
            self.enter_remote(remote, general_call, false);
        }
    }

    /// Latch the addressed status for a remote transfer
    fn enter_remote(&mut self, remote: Remote, general_call: bool, arbitration_lost: bool) {
        match remote {
            Remote::Write { address, bytes } => {
                self.trace.push(BusSignal::write(address));
                self.trace.push(BusSignal::Ack);
                self.pending = match (general_call, arbitration_lost) {
                    (false, false) => Status::ListenAddressed,
                    (false, true) => Status::ListenAddressedArbitrationLost,
                    (true, false) => Status::GeneralCall,
                    (true, true) => Status::GeneralCallArbitrationLost,
                };
                self.phase = Phase::Listen {
                    bytes: bytes.into(),
                    general_call,
                };
            }
            Remote::Read { address, count } => {
                self.trace.push(BusSignal::read(address));
                self.trace.push(BusSignal::Ack);
                self.pending = if arbitration_lost {
                    Status::ReplyAddressedArbitrationLost
                } else {
                    Status::ReplyAddressed
                };
                self.phase = Phase::Reply {
                    wanted: count.max(1),
                };
            }
        }
    }

    /// Check the injected outcomes before a master byte goes out
    ///
    /// Returns true if the byte was taken over by an injected outcome.
    fn intercept_master_byte(&mut self) -> bool {
        if let Some(remote) = self.preempt.take() {
            if let Some(general_call) = self.addressed(remote.address()) {
                self.trace.push(BusSignal::ArbitrationLost);
                self.current = None;
                self.enter_remote(remote, general_call, true);
                return true;
            }
        }

        if let Some(status) = self.fail_next.take() {
            self.trace.push(match status {
                Status::BusError => BusSignal::BusError,
                _ => BusSignal::ArbitrationLost,
            });
            self.pending = status;
            self.phase = Phase::Lost;
            self.current = None;
            return true;
        }

        false
    }

    /// Close a finished remote transfer; the remote controller sends stop
    fn finish_remote(&mut self) {
        match self.phase {
            Phase::ListenRefused | Phase::ReplyDone | Phase::Reply { .. } | Phase::Listen { .. } => {
                self.trace.push(BusSignal::Stop);
            }
            _ => {}
        }
        self.phase = Phase::Idle;
        self.pending = Status::NoInfo;
    }

    fn is_remote(&self) -> bool {
        matches!(
            self.phase,
            Phase::Listen { .. }
                | Phase::ListenStopped
                | Phase::ListenRefused
                | Phase::Reply { .. }
                | Phase::ReplyDone
        )
    }

    /// Carry on after the latched status; `ack` is the acknowledge request
    fn advance(&mut self, ack: bool) {
        match core::mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Idle => {
                self.pending = Status::NoInfo;
                self.begin_next_remote();
            }
            Phase::Address => {
                let address = self.data >> 1;
                let read = self.data & 0x01 == 0x01;
                self.loaded = false;
                self.trace.push(BusSignal::Address { address, read });

                if self.intercept_master_byte() {
                    return;
                }

                let index = self.devices.iter().position(|d| d.address() == address);
                let acked = match index {
                    Some(i) => self.devices[i].address_ack(),
                    None => false,
                };

                if acked {
                    self.trace.push(BusSignal::Ack);
                    self.current = index;
                    if read {
                        self.pending = Status::ReadAddressAck;
                        self.phase = Phase::Receive;
                    } else {
                        if let Some(i) = index {
                            self.devices[i].begin_write();
                        }
                        self.pending = Status::WriteAddressAck;
                        self.phase = Phase::Transmit;
                    }
                } else {
                    self.trace.push(BusSignal::Nack);
                    self.current = None;
                    if read {
                        self.pending = Status::ReadAddressNack;
                        self.phase = Phase::Receive;
                    } else {
                        self.pending = Status::WriteAddressNack;
                        self.phase = Phase::Transmit;
                    }
                }
            }
            Phase::Transmit => {
                assert!(self.loaded, "data byte continued without loading the data register");
                self.loaded = false;
                self.trace.push(BusSignal::Data(self.data));

                if self.intercept_master_byte() {
                    return;
                }

                let accepted = match self.current {
                    Some(i) => self.devices[i].write(self.data),
                    None => false,
                };
                if accepted {
                    self.trace.push(BusSignal::Ack);
                    self.pending = Status::WriteDataAck;
                } else {
                    self.trace.push(BusSignal::Nack);
                    self.pending = Status::WriteDataNack;
                }
                self.phase = Phase::Transmit;
            }
            Phase::Receive => {
                let byte = match self.current {
                    Some(i) => self.devices[i].read(),
                    None => 0xFF,
                };
                self.data = byte;
                self.trace.push(BusSignal::Data(byte));
                if ack {
                    self.trace.push(BusSignal::Ack);
                    self.pending = Status::ReadDataAck;
                } else {
                    self.trace.push(BusSignal::Nack);
                    self.pending = Status::ReadDataNack;
                }
                self.phase = Phase::Receive;
            }
            Phase::Lost => {
                self.pending = Status::NoInfo;
                self.phase = Phase::Idle;
                self.begin_next_remote();
            }
            Phase::Listen {
                mut bytes,
                general_call,
            } => match bytes.pop_front() {
                Some(byte) => {
                    self.data = byte;
                    self.trace.push(BusSignal::Data(byte));
                    if ack {
                        self.trace.push(BusSignal::Ack);
                        self.pending = if general_call {
                            Status::GeneralCallDataAck
                        } else {
                            Status::ListenDataAck
                        };
                        self.phase = Phase::Listen {
                            bytes,
                            general_call,
                        };
                    } else {
                        self.trace.push(BusSignal::Nack);
                        self.pending = if general_call {
                            Status::GeneralCallDataNack
                        } else {
                            Status::ListenDataNack
                        };
                        self.phase = Phase::ListenRefused;
                    }
                }
                None => {
                    self.trace.push(BusSignal::Stop);
                    self.pending = Status::ListenStop;
                    self.phase = Phase::ListenStopped;
                }
            },
            Phase::ListenStopped => {
                self.pending = Status::NoInfo;
                self.begin_next_remote();
            }
            phase @ Phase::ListenRefused => {
                self.phase = phase;
                self.finish_remote();
                self.begin_next_remote();
            }
            Phase::Reply { wanted } => {
                assert!(self.loaded, "reply continued without loading the data register");
                self.loaded = false;
                self.trace.push(BusSignal::Data(self.data));
                self.replied.push(self.data);

                let wanted = wanted - 1;
                if wanted == 0 {
                    self.trace.push(BusSignal::Nack);
                    self.pending = Status::ReplyDataNack;
                    self.phase = Phase::ReplyDone;
                } else if ack {
                    self.trace.push(BusSignal::Ack);
                    self.pending = Status::ReplyDataAck;
                    self.phase = Phase::Reply { wanted };
                } else {
                    // We announced the last byte but the remote wants more
                    self.trace.push(BusSignal::Ack);
                    self.pending = Status::ReplyLastDataAck;
                    self.phase = Phase::ReplyDone;
                }
            }
            phase @ Phase::ReplyDone => {
                self.phase = phase;
                self.finish_remote();
                self.begin_next_remote();
            }
        }
    }
}

impl TwiController for SimController {
    fn configure_clock(&mut self, divisor: ClockDivisor) {
        self.clock = Some(divisor);
    }

    fn listen(&mut self, own_address: u8, general_call: bool) {
        self.own = Some((own_address, general_call));
        self.begin_next_remote();
    }

    fn status(&mut self) -> Status {
        self.pending
    }

    fn read_data(&mut self) -> u8 {
        self.data
    }

    fn write_data(&mut self, byte: u8) {
        self.data = byte;
        self.loaded = true;
    }

    fn start(&mut self) {
        self.events += 1;
        // The bus belongs to the remote controller; the start is lost once
        // the engine continues the remote transfer
        if matches!(self.phase, Phase::Listen { .. } | Phase::Reply { .. }) {
            return;
        }
        let repeated = matches!(
            self.phase,
            Phase::Address | Phase::Transmit | Phase::Receive
        );
        if self.is_remote() {
            self.finish_remote();
        }
        self.trace.push(if repeated {
            BusSignal::RepeatedStart
        } else {
            BusSignal::Start
        });
        self.pending = if repeated {
            Status::RepeatedStart
        } else {
            Status::Start
        };
        self.phase = Phase::Address;
        self.loaded = false;
    }

    fn stop(&mut self) {
        self.events += 1;
        if self.is_remote() {
            self.finish_remote();
        } else if matches!(
            self.phase,
            Phase::Address | Phase::Transmit | Phase::Receive
        ) {
            self.trace.push(BusSignal::Stop);
        }
        self.phase = Phase::Idle;
        self.pending = Status::NoInfo;
        self.current = None;
        self.begin_next_remote();
    }

    fn ack(&mut self) {
        self.events += 1;
        self.advance(true);
    }

    fn nack(&mut self) {
        self.events += 1;
        self.advance(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Drive a plain write by hand, the way an engine would
    #[test]
    fn test_manual_write_transfer() {
        let mut sim = SimController::new().with_device(Device::new(0x50));

        sim.start();
        assert_eq!(sim.status(), Status::Start);
        sim.write_data(0x50 << 1);
        sim.ack();
        assert_eq!(sim.status(), Status::WriteAddressAck);
        sim.write_data(0x10);
        sim.ack();
        assert_eq!(sim.status(), Status::WriteDataAck);
        sim.stop();
        assert_eq!(sim.status(), Status::NoInfo);

        assert_eq!(
            sim.trace(),
            &[
                BusSignal::Start,
                BusSignal::write(0x50),
                BusSignal::Ack,
                BusSignal::Data(0x10),
                BusSignal::Ack,
                BusSignal::Stop,
            ]
        );
        assert_eq!(sim.device(0x50).unwrap().received(), &[0x10]);
    }

    #[test]
    fn test_absent_device_nacks_address() {
        let mut sim = SimController::new();
        sim.start();
        sim.write_data(0x42 << 1);
        sim.ack();
        assert_eq!(sim.status(), Status::WriteAddressNack);
    }

    #[test]
    fn test_remote_write_waits_for_listen() {
        let mut sim = SimController::new();
        sim.remote_write(0x10, &[1]);
        assert!(!sim.is_pending());

        sim.listen(0x10, false);
        assert_eq!(sim.status(), Status::ListenAddressed);
        sim.ack();
        assert_eq!(sim.status(), Status::ListenDataAck);
        assert_eq!(sim.read_data(), 1);
        sim.ack();
        assert_eq!(sim.status(), Status::ListenStop);
        sim.ack();
        assert!(!sim.is_pending());
    }

    #[test]
    fn test_remote_for_other_address_is_ignored() {
        let mut sim = SimController::new();
        sim.listen(0x10, false);
        sim.remote_write(0x11, &[1]);
        assert!(!sim.is_pending());
        // General call not enabled
        sim.remote_write(0x00, &[1]);
        assert!(!sim.is_pending());
    }

    #[test]
    fn test_injected_arbitration_loss() {
        let mut sim = SimController::new().with_device(Device::new(0x50));
        sim.fail_next_byte(Status::ArbitrationLost);
        sim.start();
        sim.write_data(0x50 << 1);
        sim.ack();
        assert_eq!(sim.status(), Status::ArbitrationLost);
        assert_eq!(sim.trace().last(), Some(&BusSignal::ArbitrationLost));
    }
}
