//! Fixed-capacity FIFO ring buffer.
//!
//! This is the leaf primitive of the substrate (§4.1): every request/response
//! bank in a [`crate::link::Connection`] is one of these. Two monotonic
//! indices track head and tail modulo capacity; the count is derived so
//! there is never a separate "is full" flag to fall out of sync.

/// Outcome of a ring buffer operation that can fail due to capacity.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RingError {
    /// `enqueue` was called while `len() == capacity()`.
    Full,
    /// `dequeue` was called while `len() == 0`.
    Empty,
}

/// A bounded FIFO of `T`, implemented as a `VecDeque`-backed ring with an
/// explicit capacity ceiling.
///
/// `T` plays the role of "fixed-size element" from the spec; in Rust we get
/// that for free from the type system rather than tracking a byte size, so
/// `element_size` from the source design collapses into `size_of::<T>()`
/// and is not tracked separately.
#[derive(Debug, Clone)]
pub struct Ring<T> {
    buf: std::collections::VecDeque<T>,
    capacity: usize,
}

impl<T> Ring<T> {
    /// Allocates a ring with room for exactly `capacity` elements.
    #[must_use]
    pub fn allocate(capacity: usize) -> Self {
        Self {
            buf: std::collections::VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Number of elements currently buffered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// `true` iff the ring holds no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// `true` iff `len() == capacity()`.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.buf.len() >= self.capacity
    }

    /// The fixed capacity this ring was allocated with.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Pushes `value` onto the tail, or reports [`RingError::Full`] if the
    /// ring is already at capacity.
    pub fn enqueue(&mut self, value: T) -> Result<(), RingError> {
        if self.is_full() {
            return Err(RingError::Full);
        }
        self.buf.push_back(value);
        Ok(())
    }

    /// Pops the head element, or reports [`RingError::Empty`] if none is
    /// buffered.
    pub fn dequeue(&mut self) -> Result<T, RingError> {
        self.buf.pop_front().ok_or(RingError::Empty)
    }

    /// Peeks at the head element without removing it.
    pub fn peek(&self) -> Option<&T> {
        self.buf.front()
    }

    /// Empties the ring atomically, discarding all buffered elements.
    pub fn flush(&mut self) {
        self.buf.clear();
    }
}
