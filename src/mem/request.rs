//! Fetch requests and packets.
//!
//! A [`FetchRequest`] describes one fetch-buffer-sized instruction read; a
//! [`Packet`] wraps a request on its way through the cache hierarchy.
//! Requests are plain values: identity across copies (the fetch target's
//! copy, the in-flight packet, the thread's demand slot) is established by
//! [`ReqId`], never by address.

use crate::common::{PhysAddr, ThreadId, VirtAddr};

/// Unique identity of a fetch request.
///
/// The same logical request may exist as several copies (in a fetch target,
/// in the MMU, inside a packet); all copies carry the same id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ReqId(pub u64);

/// An instruction fetch request.
#[derive(Clone, Debug)]
pub struct FetchRequest {
    /// Request identity, shared by all copies of this request.
    pub id: ReqId,
    /// Hardware thread that issued the request.
    pub tid: ThreadId,
    /// Virtual address of the fetch buffer block.
    pub vaddr: VirtAddr,
    /// Number of bytes to read.
    pub size: usize,
    /// Program counter that initiated the request.
    pub pc: u64,
    /// Physical address, once translation has completed (or was reused).
    paddr: Option<PhysAddr>,
}

impl FetchRequest {
    /// Creates a new instruction fetch request.
    pub fn new(id: ReqId, tid: ThreadId, vaddr: VirtAddr, size: usize, pc: u64) -> Self {
        Self {
            id,
            tid,
            vaddr,
            size,
            pc,
            paddr: None,
        }
    }

    /// True once the request holds a physical address.
    #[inline]
    pub fn has_paddr(&self) -> bool {
        self.paddr.is_some()
    }

    /// The physical address of the request.
    ///
    /// # Panics
    ///
    /// Panics if translation has not completed.
    #[inline]
    pub fn paddr(&self) -> PhysAddr {
        self.paddr.expect("request has no physical address")
    }

    /// Installs the translated physical address.
    #[inline]
    pub fn set_paddr(&mut self, paddr: PhysAddr) {
        self.paddr = Some(paddr);
    }
}

/// A read packet travelling to and from the instruction cache.
#[derive(Clone, Debug)]
pub struct Packet {
    /// The request this packet carries.
    pub req: FetchRequest,
    /// Instruction bytes, filled in by the responder.
    pub data: Vec<u8>,
    /// Depth in the hierarchy that serviced the access (0 = first-level hit).
    pub access_depth: u32,
    /// Tick at which the packet was sent, for latency accounting.
    pub send_tick: u64,
}

impl Packet {
    /// Builds a read packet for `req`, sized to the request.
    pub fn new_read(req: FetchRequest, send_tick: u64) -> Self {
        let size = req.size;
        Self {
            req,
            data: vec![0; size],
            access_depth: 0,
            send_tick,
        }
    }
}
