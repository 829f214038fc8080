//! Bus signal trace

/// One observable event on the simulated wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusSignal {
    /// Start condition
    Start,
    /// Repeated start condition
    RepeatedStart,
    /// Address byte, 7-bit address and direction
    Address { address: u8, read: bool },
    /// Data byte, whichever side sent it
    Data(u8),
    /// Acknowledge bit
    Ack,
    /// No-acknowledge bit
    Nack,
    /// Stop condition
    Stop,
    /// This node lost arbitration
    ArbitrationLost,
    /// Illegal start/stop detected
    BusError,
}

impl BusSignal {
    /// Write-direction address signal
    pub const fn write(address: u8) -> Self {
        BusSignal::Address {
            address,
            read: false,
        }
    }

    /// Read-direction address signal
    pub const fn read(address: u8) -> Self {
        BusSignal::Address {
            address,
            read: true,
        }
    }
}

/// Data bytes exchanged after one address byte
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transfer {
    pub address: u8,
    pub read: bool,
    pub data: Vec<u8>,
}

/// Split a trace into per-address transfers
///
/// Each address signal opens a transfer; data bytes up to the next address
/// signal belong to it. Data seen before any address is ignored.
pub fn transfers(trace: &[BusSignal]) -> Vec<Transfer> {
    let mut out: Vec<Transfer> = Vec::new();

    for signal in trace {
        match *signal {
            BusSignal::Address { address, read } => out.push(Transfer {
                address,
                read,
                data: Vec::new(),
            }),
            BusSignal::Data(byte) => {
                if let Some(current) = out.last_mut() {
                    current.data.push(byte);
                }
            }
            _ => {}
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfers_split_on_address() {
        let trace = [
            BusSignal::Start,
            BusSignal::write(0x50),
            BusSignal::Ack,
            BusSignal::Data(1),
            BusSignal::Ack,
            BusSignal::RepeatedStart,
            BusSignal::read(0x50),
            BusSignal::Ack,
            BusSignal::Data(9),
            BusSignal::Nack,
            BusSignal::Stop,
        ];

        let split = transfers(&trace);
        assert_eq!(split.len(), 2);
        assert_eq!(split[0].data, vec![1]);
        assert!(!split[0].read);
        assert_eq!(split[1].data, vec![9]);
        assert!(split[1].read);
    }

    #[test]
    fn test_transfers_ignore_stray_data() {
        let split = transfers(&[BusSignal::Data(3)]);
        assert!(split.is_empty());
    }
}
