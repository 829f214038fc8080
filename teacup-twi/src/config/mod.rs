//! Engine configuration
//!
//! Role, clocking and the optional protocol branches are fixed when the
//! engine is constructed.

pub mod types;

pub use types::*;
