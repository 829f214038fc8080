//! Bus session state and the protocol state machine
//!
//! The machine is a pure function of the current session and one bus
//! status code. It never touches hardware; it answers each event with a
//! [`Reaction`] that the platform adapter applies to the controller.

pub mod machine;
pub mod session;

pub use machine::{Control, Engine, Reaction};
pub use session::{Fault, Mode, SessionState};
