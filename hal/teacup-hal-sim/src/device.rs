//! Simulated target devices

/// A target device on the simulated bus
///
/// Plain devices log every written byte and answer reads from their
/// memory sequentially. Devices with a pointer width behave like serial
/// EEPROMs: the first bytes of each write transfer set the memory pointer
/// (big-endian), later bytes are stored at the pointer, and reads continue
/// from the pointer.
#[derive(Debug, Clone)]
pub struct Device {
    address: u8,
    /// Every data byte written to the device, across transfers
    received: Vec<u8>,
    memory: Vec<u8>,
    pointer: usize,
    pointer_width: usize,
    pointer_bytes_seen: usize,
    accept_limit: Option<usize>,
    written_in_transfer: usize,
    busy_for: usize,
}

impl Device {
    /// Create a device that acknowledges everything
    pub fn new(address: u8) -> Self {
        Self {
            address,
            received: Vec::new(),
            memory: Vec::new(),
            pointer: 0,
            pointer_width: 0,
            pointer_bytes_seen: 0,
            accept_limit: None,
            written_in_transfer: 0,
            busy_for: 0,
        }
    }

    /// Create an EEPROM-style device with a multi-byte memory pointer
    pub fn eeprom(address: u8, pointer_width: usize, contents: &[u8]) -> Self {
        Self {
            pointer_width,
            memory: contents.to_vec(),
            ..Self::new(address)
        }
    }

    /// Answer reads with these bytes
    pub fn with_memory(mut self, contents: &[u8]) -> Self {
        self.memory = contents.to_vec();
        self
    }

    /// Acknowledge only the first `count` data bytes of each write transfer
    pub fn accept_only(mut self, count: usize) -> Self {
        self.accept_limit = Some(count);
        self
    }

    /// Refuse (nack) the next `count` addressings
    pub fn busy_for(mut self, count: usize) -> Self {
        self.busy_for = count;
        self
    }

    /// Refuse the next `count` addressings, on a device already on the bus
    pub fn set_busy_for(&mut self, count: usize) {
        self.busy_for = count;
    }

    /// 7-bit address
    pub fn address(&self) -> u8 {
        self.address
    }

    /// All bytes written to this device so far
    pub fn received(&self) -> &[u8] {
        &self.received
    }

    /// Current memory content
    pub fn memory(&self) -> &[u8] {
        &self.memory
    }

    /// Current memory pointer
    pub fn pointer(&self) -> usize {
        self.pointer
    }

    /// Decide whether to acknowledge being addressed
    pub(crate) fn address_ack(&mut self) -> bool {
        if self.busy_for > 0 {
            self.busy_for -= 1;
            return false;
        }
        true
    }

    /// A write transfer begins
    pub(crate) fn begin_write(&mut self) {
        self.written_in_transfer = 0;
        self.pointer_bytes_seen = 0;
    }

    /// Take one written byte, returning whether it is acknowledged
    pub(crate) fn write(&mut self, byte: u8) -> bool {
        self.received.push(byte);
        self.written_in_transfer += 1;

        if self.pointer_bytes_seen < self.pointer_width {
            if self.pointer_bytes_seen == 0 {
                self.pointer = 0;
            }
            self.pointer = (self.pointer << 8) | byte as usize;
            self.pointer_bytes_seen += 1;
        } else if self.pointer_width > 0 {
            if self.pointer >= self.memory.len() {
                self.memory.resize(self.pointer + 1, 0xFF);
            }
            self.memory[self.pointer] = byte;
            self.pointer += 1;
        }

        match self.accept_limit {
            Some(limit) => self.written_in_transfer <= limit,
            None => true,
        }
    }

    /// Produce the next byte of a read
    pub(crate) fn read(&mut self) -> u8 {
        let byte = self.memory.get(self.pointer).copied().unwrap_or(0xFF);
        self.pointer += 1;
        byte
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_device_reads_sequentially() {
        let mut dev = Device::new(0x20).with_memory(&[1, 2]);
        assert_eq!(dev.read(), 1);
        assert_eq!(dev.read(), 2);
        assert_eq!(dev.read(), 0xFF);
    }

    #[test]
    fn test_eeprom_pointer_from_write() {
        let mut dev = Device::eeprom(0x50, 2, &[0; 0x20]);
        dev.begin_write();
        assert!(dev.write(0x00));
        assert!(dev.write(0x10));
        assert_eq!(dev.pointer(), 0x10);
        assert!(dev.write(0xAB));
        assert_eq!(dev.memory()[0x10], 0xAB);
        assert_eq!(dev.pointer(), 0x11);
    }

    #[test]
    fn test_accept_limit_nacks_excess_bytes() {
        let mut dev = Device::new(0x20).accept_only(1);
        dev.begin_write();
        assert!(dev.write(1));
        assert!(!dev.write(2));
        assert_eq!(dev.received(), &[1, 2]);
    }

    #[test]
    fn test_busy_device_refuses_then_accepts() {
        let mut dev = Device::new(0x20).busy_for(1);
        assert!(!dev.address_ack());
        assert!(dev.address_ack());
    }
}
