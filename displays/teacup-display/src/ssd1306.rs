//! SSD1306 OLED display driver
//!
//! Driver for 128x32 SSD1306-based OLED displays on the bus engine.
//! Characters and control codes are queued by the caller and forwarded to
//! the bus one item per [`Ssd1306::tick`], so rendering never stalls the
//! caller for longer than one small transmission.

use core::fmt;

use embedded_hal::delay::DelayNs;
use heapless::Deque;
use teacup_hal::TwiController;
use teacup_twi::twi::SPIN_DELAY_US;
use teacup_twi::{Address, Twi};

use crate::font::{self, SYMBOL_SPACE};

/// SSD1306 I2C address
pub const SSD1306_ADDR: Address = Address::truncate(0x3C);

/// Display dimensions
pub const WIDTH: usize = 128;
pub const HEIGHT: usize = 32;
const PAGES: usize = HEIGHT / 8;

/// Character queue capacity
pub const QUEUE_LEN: usize = 128;

/// Resends of a failed transmission before it is given up
const MAX_RESENDS: u8 = 3;

/// Control codes sharing the character queue with printable characters
mod low_code {
    pub const CLEAR: u8 = 0x01;
    /// Followed by line and column
    pub const SET_CURSOR: u8 = 0x02;
}

/// SSD1306 commands and control bytes
mod cmd {
    /// Control byte: command stream follows
    pub const COMMAND: u8 = 0x00;
    /// Control byte: display data follows
    pub const DATA: u8 = 0x40;

    pub const DISPLAY_OFF: u8 = 0xAE;
    pub const DISPLAY_ON: u8 = 0xAF;
    pub const SET_CLOCK_DIV: u8 = 0xD5;
    pub const SET_MUX_RATIO: u8 = 0xA8;
    pub const SET_START_LINE: u8 = 0x40;
    pub const SET_ADDRESSING_MODE: u8 = 0x20;
    pub const SET_PAGE_RANGE: u8 = 0x22;
    pub const SET_COLUMN_RANGE: u8 = 0x21;
    pub const SET_SEG_REMAP: u8 = 0xA0;
    pub const SET_COM_SCAN_INC: u8 = 0xC0;
    pub const SET_COM_PINS: u8 = 0xDA;
    pub const SET_CONTRAST: u8 = 0x81;
    pub const SET_VCOM_DETECT: u8 = 0xDB;
    pub const SET_PRECHARGE: u8 = 0xD9;
    pub const SET_CHARGE_PUMP: u8 = 0x8D;
    pub const SET_NORMAL: u8 = 0xA6;
    pub const RESUME_FROM_RAM: u8 = 0xA4;
    pub const SET_PAGE_ADDR: u8 = 0xB0;
    pub const SET_LOW_COLUMN: u8 = 0x00;
    pub const SET_HIGH_COLUMN: u8 = 0x10;

    pub const HORIZONTAL_ADDRESSING: u8 = 0x00;
    pub const PAGE_ADDRESSING: u8 = 0x02;
}

/// Initialization sequence, sent as one command transmission
pub const INIT_SEQUENCE: [u8; 30] = [
    cmd::COMMAND,
    cmd::DISPLAY_OFF,
    cmd::SET_CLOCK_DIV,
    0x80, // Reset value
    cmd::SET_MUX_RATIO,
    0x1F, // 1/32 duty
    cmd::SET_START_LINE,
    cmd::SET_ADDRESSING_MODE,
    cmd::PAGE_ADDRESSING,
    // 32-line panels only have pages 0..=3
    cmd::SET_PAGE_RANGE,
    0x00,
    (PAGES - 1) as u8,
    cmd::SET_COLUMN_RANGE,
    0x00,
    (WIDTH - 1) as u8,
    cmd::SET_SEG_REMAP,
    cmd::SET_COM_SCAN_INC,
    cmd::SET_COM_PINS,
    0x02, // Sequential, no remap
    cmd::SET_CONTRAST,
    0x7F,
    cmd::SET_VCOM_DETECT,
    0x20,
    cmd::SET_PRECHARGE,
    0xF1,
    cmd::SET_CHARGE_PUMP,
    0x14, // Enable charge pump
    cmd::SET_NORMAL,
    cmd::RESUME_FROM_RAM,
    cmd::DISPLAY_ON,
];

/// Display errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DisplayError {
    /// Character queue cannot take the item
    QueueFull,
}

/// One unit forwarded to the bus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Item {
    Char(u8),
    Clear,
    Cursor { line: u8, column: u8 },
}

/// SSD1306 OLED driver
pub struct Ssd1306<'a, C, D, const Q: usize, const B: usize> {
    twi: &'a Twi<C, Q, B>,
    delay: D,
    queue: Deque<u8, QUEUE_LEN>,
    /// Item of the most recent transmission, kept for resending
    last: Option<Item>,
    resends: u8,
}

impl<'a, C, D, const Q: usize, const B: usize> Ssd1306<'a, C, D, Q, B>
where
    C: TwiController,
    D: DelayNs,
{
    /// Create a new SSD1306 driver
    pub fn new(twi: &'a Twi<C, Q, B>, delay: D) -> Self {
        Self {
            twi,
            delay,
            queue: Deque::new(),
            last: None,
            resends: 0,
        }
    }

    /// Target the display and send the initialization sequence
    pub fn init(&mut self) {
        self.twi.init(SSD1306_ADDR, &mut self.delay);
        self.twi.write_all(&INIT_SEQUENCE, &mut self.delay);
    }

    /// Queue a clear screen
    pub fn clear(&mut self) -> Result<(), DisplayError> {
        self.push(&[low_code::CLEAR])
    }

    /// Queue a cursor move
    ///
    /// `line` is the page (0..=3), `column` is in pixels.
    pub fn set_cursor(&mut self, line: u8, column: u8) -> Result<(), DisplayError> {
        self.push(&[low_code::SET_CURSOR, line, column])
    }

    /// Queue a character
    ///
    /// Control characters are not queued, so they cannot be mistaken for
    /// low codes; non-ASCII characters render as a blank cell.
    pub fn write_char(&mut self, c: char) -> Result<(), DisplayError> {
        if c.is_ascii_control() {
            return Ok(());
        }
        let byte = if c.is_ascii() { c as u8 } else { b'?' };
        self.push(&[byte])
    }

    /// Queue a string
    pub fn write_str(&mut self, s: &str) -> Result<(), DisplayError> {
        s.chars().try_for_each(|c| self.write_char(c))
    }

    /// Clear the display and show the greeting, centered on line 1
    pub fn greeting(&mut self) -> Result<(), DisplayError> {
        const GREETING: &str = "Welcome to Teacup";

        let width: usize = GREETING
            .chars()
            .map(|c| font::glyph_for(c).columns().len() + SYMBOL_SPACE)
            .sum();
        self.clear()?;
        self.set_cursor(1, ((WIDTH - width) / 2) as u8)?;
        self.write_str(GREETING)
    }

    /// Queue the current position, given in micrometres, and feed rate
    pub fn write_position(
        &mut self,
        x_um: i32,
        y_um: i32,
        z_um: i32,
        feed: u32,
    ) -> Result<(), DisplayError> {
        self.set_cursor(0, 2)?;
        fmt::write(
            self,
            format_args!(
                "X:{} Y:{} Z:{}  F:{}  ",
                Millimetres(x_um),
                Millimetres(y_um),
                Millimetres(z_um),
                feed
            ),
        )
        .map_err(|_| DisplayError::QueueFull)
    }

    /// Items still waiting in the character queue
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    fn push(&mut self, bytes: &[u8]) -> Result<(), DisplayError> {
        if self.queue.capacity() - self.queue.len() < bytes.len() {
            return Err(DisplayError::QueueFull);
        }
        for &byte in bytes {
            self.queue
                .push_back(byte)
                .map_err(|_| DisplayError::QueueFull)?;
        }
        Ok(())
    }

    fn next_item(&mut self) -> Option<Item> {
        let byte = self.queue.pop_front()?;
        Some(match byte {
            low_code::CLEAR => Item::Clear,
            low_code::SET_CURSOR => Item::Cursor {
                line: self.queue.pop_front().unwrap_or(0),
                column: self.queue.pop_front().unwrap_or(0),
            },
            byte => Item::Char(byte),
        })
    }

    /// Forward one queued item to the bus
    ///
    /// Does nothing while the bus is busy. If the previous transmission
    /// failed, it is sent again instead of taking a new item.
    pub fn tick(&mut self) {
        if self.twi.busy() {
            return;
        }

        if self.twi.take_fault().is_some() {
            if let Some(item) = self.last {
                if self.resends < MAX_RESENDS {
                    self.resends += 1;
                    self.send(item);
                    return;
                }
            }
        }

        self.resends = 0;
        self.last = self.next_item();
        if let Some(item) = self.last {
            self.send(item);
        }
    }

    /// Forward everything queued and wait for the bus to go idle
    pub fn flush(&mut self) {
        loop {
            if self.twi.busy() {
                self.delay.delay_us(SPIN_DELAY_US);
            } else if self.queue.is_empty() && self.twi.last_fault().is_none() {
                return;
            } else {
                self.tick();
            }
        }
    }

    fn write(&mut self, byte: u8, last: bool) {
        self.twi.write(byte, last, &mut self.delay);
    }

    /// Wait for the transmission just queued, false if it failed
    ///
    /// The fault stays latched for `tick` to pick up.
    fn delivered(&mut self) -> bool {
        self.twi.flush(&mut self.delay);
        self.twi.last_fault().is_none()
    }

    fn send(&mut self, item: Item) {
        match item {
            Item::Char(c) => {
                let glyph = font::glyph_for(c as char);
                self.write(cmd::DATA, false);
                for &column in glyph.columns() {
                    self.write(column, false);
                }
                for i in 0..SYMBOL_SPACE {
                    self.write(0x00, i + 1 == SYMBOL_SPACE);
                }
            }
            Item::Clear => {
                // No clear command: overwrite all of display RAM. Starting
                // a transmission clears the last fault, so stop at the first
                // failed part.
                self.write(cmd::COMMAND, false);
                self.write(cmd::SET_ADDRESSING_MODE, false);
                self.write(cmd::HORIZONTAL_ADDRESSING, true);
                if !self.delivered() {
                    return;
                }

                let count = WIDTH * PAGES;
                self.write(cmd::DATA, false);
                for i in 0..count {
                    self.write(0x00, i + 1 == count);
                }
                if !self.delivered() {
                    return;
                }

                self.write(cmd::COMMAND, false);
                self.write(cmd::SET_ADDRESSING_MODE, false);
                self.write(cmd::PAGE_ADDRESSING, true);
            }
            Item::Cursor { line, column } => {
                self.write(cmd::COMMAND, false);
                self.write(cmd::SET_PAGE_ADDR | (line & 0x03), false);
                self.write(cmd::SET_LOW_COLUMN | (column & 0x0F), false);
                self.write(cmd::SET_HIGH_COLUMN | ((column >> 4) & 0x0F), true);
            }
        }
    }
}

impl<C, D, const Q: usize, const B: usize> fmt::Write for Ssd1306<'_, C, D, Q, B>
where
    C: TwiController,
    D: DelayNs,
{
    fn write_str(&mut self, s: &str) -> fmt::Result {
        Ssd1306::write_str(self, s).map_err(|_| fmt::Error)
    }
}

/// Micrometres rendered as millimetres with three decimals
struct Millimetres(i32);

impl fmt::Display for Millimetres {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let um = self.0.unsigned_abs();
        write!(f, "{}{}.{:03}", sign, um / 1000, um % 1000)
    }
}
