//! Bounded transmit queue
//!
//! Fixed-capacity FIFO of outbound bytes. The queue never blocks; the
//! transaction API checks [`TxQueue::can_write`] and spins on top of it.

use heapless::Deque;

/// Outbound byte queue with capacity `N`
#[derive(Debug, Default)]
pub struct TxQueue<const N: usize> {
    bytes: Deque<u8, N>,
}

impl<const N: usize> TxQueue<N> {
    /// Create an empty queue
    pub const fn new() -> Self {
        Self {
            bytes: Deque::new(),
        }
    }

    /// Check if there is room for one more byte
    pub fn can_write(&self) -> bool {
        !self.bytes.is_full()
    }

    /// Check if a byte is waiting
    pub fn can_read(&self) -> bool {
        !self.bytes.is_empty()
    }

    /// Append a byte, handing it back if the queue is full
    pub fn push(&mut self, byte: u8) -> Result<(), u8> {
        self.bytes.push_back(byte)
    }

    /// Take the oldest byte
    pub fn pop(&mut self) -> Option<u8> {
        self.bytes.pop_front()
    }

    /// Discard everything without transmitting it
    pub fn clear(&mut self) {
        self.bytes.clear();
    }

    /// Number of queued bytes
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub const fn capacity(&self) -> usize {
        N
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_full_queue_refuses() {
        let mut queue: TxQueue<2> = TxQueue::new();
        assert!(queue.push(1).is_ok());
        assert!(queue.push(2).is_ok());
        assert!(!queue.can_write());
        assert_eq!(queue.push(3), Err(3));
        assert_eq!(queue.pop(), Some(1));
        assert!(queue.can_write());
    }

    #[test]
    fn test_clear_drains_without_reading() {
        let mut queue: TxQueue<4> = TxQueue::new();
        queue.push(1).unwrap();
        queue.push(2).unwrap();
        queue.clear();
        assert!(!queue.can_read());
        assert_eq!(queue.pop(), None);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Push(u8),
        Pop,
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![any::<u8>().prop_map(Op::Push), Just(Op::Pop)]
    }

    proptest! {
        /// The queue behaves like an unbounded FIFO truncated at capacity
        #[test]
        fn prop_fifo_with_capacity(ops in prop::collection::vec(op(), 0..200)) {
            let mut queue: TxQueue<8> = TxQueue::new();
            let mut model = std::collections::VecDeque::new();

            for op in ops {
                match op {
                    Op::Push(byte) => {
                        let accepted = queue.push(byte).is_ok();
                        prop_assert_eq!(accepted, model.len() < 8);
                        if accepted {
                            model.push_back(byte);
                        }
                    }
                    Op::Pop => prop_assert_eq!(queue.pop(), model.pop_front()),
                }
                prop_assert_eq!(queue.len(), model.len());
                prop_assert_eq!(queue.can_read(), !model.is_empty());
                prop_assert_eq!(queue.can_write(), model.len() < 8);
            }
        }
    }
}
