//! Session flags shared between foreground code and the event handler

/// What the engine is doing on the bus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mode {
    #[default]
    Idle,
    /// Sending queued bytes as controller
    MasterWrite,
    /// Receiving a fixed number of bytes as controller
    MasterRead,
    /// Addressed by another controller, receiving
    SlaveReceive,
    /// Addressed by another controller, transmitting
    SlaveTransmit,
    /// Sending a page address before switching to read
    PagedAddressPhase,
}

impl Mode {
    /// Check if this node drives the current transfer
    pub fn is_master(&self) -> bool {
        matches!(
            self,
            Mode::MasterWrite | Mode::MasterRead | Mode::PagedAddressPhase
        )
    }

    /// Check if another controller drives the current transfer
    pub fn is_slave(&self) -> bool {
        matches!(self, Mode::SlaveReceive | Mode::SlaveTransmit)
    }
}

/// Bus failure classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Fault {
    /// Target did not acknowledge its address (busy or absent)
    AddressNack,
    /// Target did not acknowledge a data byte (stopped early)
    DataNack,
    /// Another controller won the bus
    ArbitrationLost,
    /// Illegal start or stop condition, or a status that makes no sense
    /// for the current mode
    BusError,
}

/// Snapshot of the session flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SessionState {
    pub mode: Mode,
    /// A transaction is in progress
    pub busy: bool,
    /// A transfer failed; writes are dropped until the end of the
    /// current transmission
    pub error: bool,
    /// Arbitration was lost to a controller that then addressed us
    pub low_priority_error: bool,
    /// A transfer was pre-empted by another controller
    pub interrupted: bool,
    /// The last queued byte ends the current transmission
    pub should_end: bool,
}
