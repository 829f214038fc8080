//! Error types for the blocking and async transfer helpers

use embedded_hal::i2c::{ErrorKind, NoAcknowledgeSource};

use crate::state::Fault;

/// Transfer error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TwiError {
    /// The needed protocol branch is not enabled in the configuration
    Unsupported,
    /// Zero-length or over-capacity request
    Length,
    /// Address wider than 7 bits
    Address,
    /// A failed write is still being dropped; finish it with a final byte
    PendingFailure,
    /// The bus transfer failed
    Failed(Fault),
}

impl From<Fault> for TwiError {
    fn from(fault: Fault) -> Self {
        TwiError::Failed(fault)
    }
}

impl embedded_hal::i2c::Error for TwiError {
    fn kind(&self) -> ErrorKind {
        match self {
            TwiError::Failed(Fault::AddressNack) => {
                ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address)
            }
            TwiError::Failed(Fault::DataNack) => ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data),
            TwiError::Failed(Fault::ArbitrationLost) => ErrorKind::ArbitrationLoss,
            TwiError::Failed(Fault::BusError) => ErrorKind::Bus,
            _ => ErrorKind::Other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal::i2c::Error;

    #[test]
    fn test_fault_kinds() {
        assert_eq!(
            TwiError::Failed(Fault::AddressNack).kind(),
            ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address)
        );
        assert_eq!(
            TwiError::from(Fault::ArbitrationLost).kind(),
            ErrorKind::ArbitrationLoss
        );
        assert_eq!(TwiError::Length.kind(), ErrorKind::Other);
    }
}
