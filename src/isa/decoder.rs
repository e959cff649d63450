//! Fixed-width test ISA decoder.
//!
//! Instructions are 32-bit little-endian words. The low byte selects the
//! class, bits 11:8 give the micro-op count of a macro-op, and the upper
//! half-word is a signed byte offset for control-flow targets:
//!
//! | opcode | meaning                          |
//! |--------|----------------------------------|
//! | `0x00` | nop                              |
//! | `0x01` | integer ALU                      |
//! | `0x02` | conditional branch               |
//! | `0x03` | unconditional jump               |
//! | `0x04` | macro-op, expands to N micro-ops |
//! | `0x05` | quiesce                          |
//!
//! Unknown opcodes decode as nops; rejecting them is the decode stage's
//! concern, not fetch's.

use super::{Decoder, OpClass, PcState, StaticInst, INST_SIZE, MICRO_PC_ROM_BIT};
use crate::common::VirtAddr;

const OPCODE_MASK: u32 = 0xff;
const OP_NOP: u32 = 0x00;
const OP_ALU: u32 = 0x01;
const OP_BRANCH: u32 = 0x02;
const OP_JUMP: u32 = 0x03;
const OP_MACRO: u32 = 0x04;
const OP_QUIESCE: u32 = 0x05;

const MACRO_COUNT_SHIFT: u32 = 8;
const MACRO_COUNT_MASK: u32 = 0xf;

/// Decoder for the fixed-width test ISA.
///
/// Holds at most one ingested instruction word at a time.
#[derive(Debug, Default)]
pub struct SimpleDecoder {
    word: Option<u32>,
}

impl SimpleDecoder {
    /// Creates an empty decoder.
    pub fn new() -> Self {
        Self::default()
    }

    fn parse(raw: u32) -> StaticInst {
        match raw & OPCODE_MASK {
            OP_ALU => StaticInst::simple(OpClass::IntAlu, raw),
            OP_BRANCH => StaticInst::simple(OpClass::Branch, raw),
            OP_JUMP => StaticInst::simple(OpClass::Jump, raw),
            OP_MACRO => {
                let count = ((raw >> MACRO_COUNT_SHIFT) & MACRO_COUNT_MASK).max(1) as usize;
                StaticInst::macroop(raw, count)
            }
            OP_QUIESCE => StaticInst::simple(OpClass::Quiesce, raw),
            _ => StaticInst::simple(OpClass::Nop, raw),
        }
    }
}

impl Decoder for SimpleDecoder {
    fn inst_size(&self) -> usize {
        INST_SIZE
    }

    fn pc_mask(&self) -> u64 {
        !(INST_SIZE as u64 - 1)
    }

    fn reset(&mut self) {
        self.word = None;
    }

    fn more_bytes(&mut self, _pc: &PcState, _fetch_addr: VirtAddr, bytes: &[u8]) {
        debug_assert!(bytes.len() >= INST_SIZE);
        self.word = Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]));
    }

    fn need_more_bytes(&self) -> bool {
        // Every instruction occupies exactly one word, so the fetch offset
        // always advances after an ingest.
        true
    }

    fn inst_ready(&self) -> bool {
        self.word.is_some()
    }

    fn decode(&mut self, _pc: &mut PcState) -> StaticInst {
        let raw = self.word.take().expect("decode called without a ready instruction");
        Self::parse(raw)
    }

    fn fetch_rom_microop(&self, upc: u16) -> StaticInst {
        // The test ISA's microcode ROM is a single terminating micro-op at
        // every entry point.
        let _ = upc & !MICRO_PC_ROM_BIT;
        StaticInst::nop()
    }
}

/// Encodes a nop instruction word.
pub fn encode_nop() -> u32 {
    OP_NOP
}

/// Encodes an integer ALU instruction word.
pub fn encode_alu() -> u32 {
    OP_ALU
}

/// Encodes a conditional branch with a signed byte offset.
pub fn encode_branch(offset: i16) -> u32 {
    OP_BRANCH | ((offset as u16 as u32) << 16)
}

/// Encodes an unconditional jump with a signed byte offset.
pub fn encode_jump(offset: i16) -> u32 {
    OP_JUMP | ((offset as u16 as u32) << 16)
}

/// Encodes a macro-op expanding into `count` micro-ops.
pub fn encode_macro(count: u8) -> u32 {
    OP_MACRO | ((count as u32 & MACRO_COUNT_MASK) << MACRO_COUNT_SHIFT)
}

/// Encodes a quiesce instruction word.
pub fn encode_quiesce() -> u32 {
    OP_QUIESCE
}
