//! Time-delayed communication buffer between pipeline stages.
//!
//! A [`TimeBuffer`] is a ring of `depth + 1` slots. The slot at offset 0 is
//! the one being written this cycle; `read(d)` observes the slot written `d`
//! cycles ago. Advancing the buffer rotates the ring and clears the new
//! current slot, so a signal written at cycle `T` becomes visible to a
//! reader with delay `d` at cycle `T + d`.

/// Ring buffer carrying inter-stage signals across configurable delays.
#[derive(Clone, Debug)]
pub struct TimeBuffer<T: Default> {
    slots: Vec<T>,
    head: usize,
}

impl<T: Default> TimeBuffer<T> {
    /// Creates a buffer able to serve reads up to `depth` cycles in the past.
    pub fn new(depth: usize) -> Self {
        let mut slots = Vec::with_capacity(depth + 1);
        slots.resize_with(depth + 1, T::default);
        Self { slots, head: 0 }
    }

    /// The slot being written this cycle.
    #[inline]
    pub fn write(&mut self) -> &mut T {
        &mut self.slots[self.head]
    }

    /// The slot written `delay` cycles ago.
    ///
    /// # Panics
    ///
    /// Panics if `delay` exceeds the buffer depth.
    pub fn read(&self, delay: usize) -> &T {
        assert!(delay < self.slots.len(), "time buffer read beyond depth");
        let len = self.slots.len();
        &self.slots[(self.head + len - delay) % len]
    }

    /// Rotates the ring by one cycle and clears the new current slot.
    pub fn advance(&mut self) {
        self.head = (self.head + 1) % self.slots.len();
        self.slots[self.head] = T::default();
    }
}
