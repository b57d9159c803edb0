//! Tickwire Ring Buffer - Fixed-capacity history for prediction and interpolation
//!
//! This crate provides a bounded, allocation-free-after-construction ring
//! buffer used for the client's unacknowledged commands and for each
//! remote entity's snapshot history.
//!
//! # Features
//!
//! - **Bounded memory**: Fixed number of slots, no growth
//! - **O(1) append**: New items go to the back
//! - **Bulk eviction**: Acknowledged items leave from the front in one call
//! - **No silent overwrite**: Pushing into a full buffer hands the item back
//!
//! # Example
//!
//! ```rust
//! use tickwire_ring_buffer::RingBuffer;
//!
//! let mut buffer = RingBuffer::new(4);
//! buffer.push(10).unwrap();
//! buffer.push(11).unwrap();
//! buffer.push(12).unwrap();
//!
//! // the two oldest items were acknowledged
//! assert_eq!(buffer.remove_from_start(2), 2);
//! assert_eq!(buffer.first(), Some(&12));
//! ```

use tickwire_core::{SequenceId, SequenceSpace, Stamped};

/// A fixed-capacity circular buffer
///
/// Items are kept in insertion order, oldest first.
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    /// Ring storage; `None` means the slot is empty
    slots: Vec<Option<T>>,
    /// Index of the oldest item
    head: usize,
    /// Number of items currently stored
    count: usize,
}

impl<T> RingBuffer<T> {
    /// Create a new ring buffer with the given capacity
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    ///
    /// # Example
    ///
    /// ```rust
    /// use tickwire_ring_buffer::RingBuffer;
    ///
    /// // 60 commands at 60Hz = ~1 second of unacknowledged input
    /// let buffer: RingBuffer<u32> = RingBuffer::new(60);
    /// assert_eq!(buffer.capacity(), 60);
    /// ```
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "Capacity must be greater than 0");
        Self {
            slots: (0..capacity).map(|_| None).collect(),
            head: 0,
            count: 0,
        }
    }

    fn slot_index(&self, offset: usize) -> usize {
        (self.head + offset) % self.slots.len()
    }

    /// Append an item at the back
    ///
    /// Returns the item back as `Err` when the buffer is full; the caller
    /// decides how to resynchronize.
    pub fn push(&mut self, item: T) -> Result<(), T> {
        if self.is_full() {
            return Err(item);
        }
        let index = self.slot_index(self.count);
        self.slots[index] = Some(item);
        self.count += 1;
        Ok(())
    }

    /// Remove up to `n` items from the front, returning how many were removed
    pub fn remove_from_start(&mut self, n: usize) -> usize {
        let removed = n.min(self.count);
        for _ in 0..removed {
            self.slots[self.head] = None;
            self.head = (self.head + 1) % self.slots.len();
        }
        self.count -= removed;
        if self.count == 0 {
            self.head = 0;
        }
        removed
    }

    /// Remove and return the oldest item
    pub fn pop_front(&mut self) -> Option<T> {
        if self.count == 0 {
            return None;
        }
        let item = self.slots[self.head].take();
        self.head = (self.head + 1) % self.slots.len();
        self.count -= 1;
        if self.count == 0 {
            self.head = 0;
        }
        item
    }

    /// The oldest item
    pub fn first(&self) -> Option<&T> {
        self.get(0)
    }

    /// The newest item
    pub fn last(&self) -> Option<&T> {
        self.count.checked_sub(1).and_then(|i| self.get(i))
    }

    /// Item at `offset` from the front
    pub fn get(&self, offset: usize) -> Option<&T> {
        if offset >= self.count {
            return None;
        }
        self.slots[self.slot_index(offset)].as_ref()
    }

    /// Iterate from oldest to newest
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        (0..self.count).filter_map(move |i| self.slots[self.slot_index(i)].as_ref())
    }

    /// Drop every item
    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            *slot = None;
        }
        self.head = 0;
        self.count = 0;
    }

    /// Number of stored items
    pub fn len(&self) -> usize {
        self.count
    }

    /// Check if the buffer is empty
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Check if the buffer is full
    pub fn is_full(&self) -> bool {
        self.count == self.slots.len()
    }

    /// Maximum number of items
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}

impl<T: Clone> RingBuffer<T> {
    /// Copy the contents, oldest first
    pub fn to_vec(&self) -> Vec<T> {
        self.iter().cloned().collect()
    }
}

impl<T: Stamped> RingBuffer<T> {
    /// Stamps of the oldest and newest items
    pub fn stamp_range(&self) -> Option<(SequenceId, SequenceId)> {
        Some((self.first()?.stamp(), self.last()?.stamp()))
    }

    /// Get statistics about the buffer
    pub fn stats(&self) -> BufferStats {
        let range = self.stamp_range();
        BufferStats {
            capacity: self.capacity(),
            count: self.count,
            oldest: range.map(|(oldest, _)| oldest),
            newest: range.map(|(_, newest)| newest),
        }
    }
}

/// Statistics about a ring buffer of stamped items
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferStats {
    /// Maximum capacity
    pub capacity: usize,
    /// Current number of stored items
    pub count: usize,
    /// Stamp of the oldest item
    pub oldest: Option<SequenceId>,
    /// Stamp of the newest item
    pub newest: Option<SequenceId>,
}

impl BufferStats {
    /// Circular distance from the oldest to the newest stamp
    pub fn span(&self, space: &SequenceSpace) -> i32 {
        match (self.oldest, self.newest) {
            (Some(oldest), Some(newest)) => space.diff(newest, oldest),
            _ => 0,
        }
    }

    /// Get the fill percentage (0.0 to 1.0)
    pub fn fill_ratio(&self) -> f32 {
        self.count as f32 / self.capacity as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Item(u16);

    impl Stamped for Item {
        fn stamp(&self) -> SequenceId {
            SequenceId(self.0)
        }
    }

    #[test]
    fn test_new() {
        let buffer: RingBuffer<u8> = RingBuffer::new(64);
        assert_eq!(buffer.capacity(), 64);
        assert_eq!(buffer.len(), 0);
        assert!(buffer.is_empty());
        assert!(buffer.first().is_none());
        assert!(buffer.last().is_none());
    }

    #[test]
    #[should_panic(expected = "Capacity must be greater than 0")]
    fn test_zero_capacity_panics() {
        let _buffer: RingBuffer<u8> = RingBuffer::new(0);
    }

    #[test]
    fn test_push_until_full() {
        let mut buffer = RingBuffer::new(3);
        buffer.push(1).unwrap();
        buffer.push(2).unwrap();
        buffer.push(3).unwrap();

        assert!(buffer.is_full());
        assert_eq!(buffer.push(4), Err(4));
        assert_eq!(buffer.to_vec(), vec![1, 2, 3]);
    }

    #[test]
    fn test_wraps_after_eviction() {
        let mut buffer = RingBuffer::new(4);
        for i in 0..4 {
            buffer.push(i).unwrap();
        }
        assert_eq!(buffer.remove_from_start(3), 3);
        buffer.push(4).unwrap();
        buffer.push(5).unwrap();
        buffer.push(6).unwrap();

        assert!(buffer.is_full());
        assert_eq!(buffer.to_vec(), vec![3, 4, 5, 6]);
        assert_eq!(buffer.first(), Some(&3));
        assert_eq!(buffer.last(), Some(&6));
        assert_eq!(buffer.get(2), Some(&5));
        assert_eq!(buffer.get(4), None);
    }

    #[test]
    fn test_remove_more_than_stored() {
        let mut buffer = RingBuffer::new(4);
        buffer.push('a').unwrap();
        buffer.push('b').unwrap();
        assert_eq!(buffer.remove_from_start(10), 2);
        assert!(buffer.is_empty());
        buffer.push('c').unwrap();
        assert_eq!(buffer.first(), Some(&'c'));
    }

    #[test]
    fn test_pop_front() {
        let mut buffer = RingBuffer::new(2);
        buffer.push(1).unwrap();
        buffer.push(2).unwrap();
        assert_eq!(buffer.pop_front(), Some(1));
        assert_eq!(buffer.pop_front(), Some(2));
        assert_eq!(buffer.pop_front(), None);
    }

    #[test]
    fn test_clear() {
        let mut buffer = RingBuffer::new(3);
        buffer.push(1).unwrap();
        buffer.push(2).unwrap();
        buffer.clear();
        assert!(buffer.is_empty());
        assert_eq!(buffer.iter().count(), 0);
    }

    #[test]
    fn test_stats() {
        let mut buffer = RingBuffer::new(8);
        buffer.push(Item(1022)).unwrap();
        buffer.push(Item(1023)).unwrap();
        buffer.push(Item(0)).unwrap();
        buffer.push(Item(1)).unwrap();

        let stats = buffer.stats();
        assert_eq!(stats.capacity, 8);
        assert_eq!(stats.count, 4);
        assert_eq!(stats.oldest, Some(SequenceId(1022)));
        assert_eq!(stats.newest, Some(SequenceId(1)));
        assert_eq!(stats.span(&SequenceSpace::new(1024).unwrap()), 3);
        assert_eq!(stats.fill_ratio(), 0.5);
    }

    #[test]
    fn test_empty_stats() {
        let buffer: RingBuffer<Item> = RingBuffer::new(2);
        let stats = buffer.stats();
        assert_eq!(stats.oldest, None);
        assert_eq!(stats.span(&SequenceSpace::FULL), 0);
    }
}
