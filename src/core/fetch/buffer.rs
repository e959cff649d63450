//! Per-thread fetch buffer.
//!
//! Holds the last fetch-buffer-sized slice of a cache line returned for
//! demand fetch, tagged by its aligned virtual address. Prefetch responses
//! never land here; they only warm the I-cache.

use crate::common::VirtAddr;

/// One thread's fetch buffer: data slab, aligned tag, and valid bit.
#[derive(Clone, Debug)]
pub struct FetchBuffer {
    data: Vec<u8>,
    pc: VirtAddr,
    valid: bool,
}

impl FetchBuffer {
    /// Creates an invalid buffer of `size` bytes.
    pub fn new(size: usize) -> Self {
        Self {
            data: vec![0; size],
            pc: VirtAddr::new(0),
            valid: false,
        }
    }

    /// Aligned virtual address the buffer is tagged with.
    #[inline]
    pub fn pc(&self) -> VirtAddr {
        self.pc
    }

    /// True while the buffer holds the bytes of its tagged block.
    #[inline]
    pub fn valid(&self) -> bool {
        self.valid
    }

    /// True if the buffer can serve a read of `block_pc`.
    #[inline]
    pub fn hit(&self, block_pc: VirtAddr) -> bool {
        self.valid && self.pc == block_pc
    }

    /// Retags the buffer for an access to `block_pc` and invalidates the
    /// old contents until the response fills it.
    pub fn expect_fill(&mut self, block_pc: VirtAddr) {
        self.pc = block_pc;
        self.valid = false;
    }

    /// Installs response data for the tagged block.
    pub fn fill(&mut self, bytes: &[u8]) {
        debug_assert_eq!(bytes.len(), self.data.len());
        self.data.copy_from_slice(bytes);
        self.valid = true;
    }

    /// Buffered bytes.
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Drops tag and contents.
    pub fn reset(&mut self) {
        self.pc = VirtAddr::new(0);
        self.valid = false;
    }
}
