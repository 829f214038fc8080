//! Character display for the Teacup two-wire bus
//!
//! This crate provides:
//! - [`Ssd1306`]: a queued text driver for 128x32 SSD1306 OLED panels
//! - A proportional 3x5 font rendered into SSD1306 column bytes
//!
//! # Architecture
//!
//! Text is not sent when it is written. Characters and control codes go to
//! a small queue, and [`Ssd1306::tick`] forwards one item per call through
//! [`teacup_twi::Twi`] once the bus is idle. A main loop calls `tick`
//! between its other duties; a transmission that failed is resent before
//! the next item is taken.

#![cfg_attr(not(test), no_std)]

pub mod font;
pub mod ssd1306;

pub use ssd1306::{DisplayError, Ssd1306, SSD1306_ADDR};
