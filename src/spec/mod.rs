//! Classic BPF instruction and program types

use core::fmt::Debug;

use alloc::vec::Vec;

use cbpf_consts::{
    mask::{bpf_class, bpf_miscop, bpf_mode, bpf_op, bpf_rval, bpf_size, bpf_src},
    BPF_ALU, BPF_JMP, BPF_LD, BPF_LDX, BPF_MISC, BPF_RET, BPF_ST, BPF_STX,
};
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;

use crate::{
    packet::Packet,
    verifier::{validate, ValidationError},
    vm,
};

/// Classic BPF instruction
///
/// The member functions are intentionally passing by value.
#[derive(Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct Instruction {
    pub code: u16,
    pub jt: u8,
    pub jf: u8,
    pub k: u32,
}

/// Instruction class stored in the 3 LSB bits of `code`
#[derive(FromPrimitive, Debug, PartialEq, Eq)]
#[repr(u16)]
pub enum InstructionClass {
    /// BPF_LD
    LoadAccumulator = BPF_LD,
    /// BPF_LDX
    LoadIndex = BPF_LDX,
    /// BPF_ST
    StoreAccumulator = BPF_ST,
    /// BPF_STX
    StoreIndex = BPF_STX,
    /// BPF_ALU
    Arithmetic = BPF_ALU,
    /// BPF_JMP
    Jump = BPF_JMP,
    /// BPF_RET
    Return = BPF_RET,
    /// BPF_MISC
    Miscellaneous = BPF_MISC,
}

impl Instruction {
    /// Constructs an instruction from its four record fields
    ///
    /// It does not check for instruction validity.
    pub const fn new(code: u16, jt: u8, jf: u8, k: u32) -> Instruction {
        Instruction { code, jt, jf, k }
    }

    /// Constructs an instruction from a raw 64-bit record
    ///
    /// The packing matches the C `struct bpf_insn` laid out little-endian:
    /// `code` in the low 16 bits, then `jt`, `jf`, and `k` in the high 32.
    pub const fn from_raw(encoded: u64) -> Instruction {
        Instruction {
            code: (encoded & 0xFFFF) as u16,
            jt: ((encoded >> 16) & 0xFF) as u8,
            jf: ((encoded >> 24) & 0xFF) as u8,
            k: (encoded >> 32) as u32,
        }
    }

    /// Packs the instruction into a raw 64-bit record, the inverse of [Instruction::from_raw]
    pub const fn pack(code: u16, jt: u8, jf: u8, k: u32) -> u64 {
        code as u64 | (jt as u64) << 16 | (jf as u64) << 24 | (k as u64) << 32
    }

    /// Returns the instruction class
    pub fn class(self) -> InstructionClass {
        FromPrimitive::from_u16(bpf_class(self.code)).unwrap()
    }

    /// Operand size bits of a load instruction
    pub const fn size(self) -> u16 {
        bpf_size(self.code)
    }

    /// Addressing mode bits of a load instruction
    pub const fn mode(self) -> u16 {
        bpf_mode(self.code)
    }

    /// Operation bits of an ALU or JMP instruction
    pub const fn op(self) -> u16 {
        bpf_op(self.code)
    }

    /// Operand source bits of an ALU or JMP instruction
    pub const fn src(self) -> u16 {
        bpf_src(self.code)
    }

    /// Value source bits of a RET instruction
    pub const fn rval(self) -> u16 {
        bpf_rval(self.code)
    }

    /// Operation bits of a MISC instruction
    pub const fn miscop(self) -> u16 {
        bpf_miscop(self.code)
    }
}

impl Debug for Instruction {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_fmt(format_args!(
            "( code: {:04x}, jt: {:02x}, jf: {:02x}, k: {:08x} )",
            self.code, self.jt, self.jf, self.k
        ))
    }
}

/// A validated classic BPF program
///
/// Construction runs the validator, so owning a [Program] is proof that every
/// execution path is memory-safe and terminating. The instruction sequence is
/// immutable afterwards: evaluations only ever read it, so one program may be
/// shared across concurrent evaluations freely.
pub struct Program {
    insns: Vec<Instruction>,
}

impl Program {
    /// Validates `insns` and takes ownership on success
    pub fn new(insns: Vec<Instruction>) -> Result<Program, ValidationError> {
        validate(&insns)?;
        Ok(Program { insns })
    }

    /// Decodes raw 64-bit records (e.g. a filter-attach payload) and validates them
    pub fn from_raw(code: &[u64]) -> Result<Program, ValidationError> {
        Program::new(code.iter().map(|c| Instruction::from_raw(*c)).collect())
    }

    /// Borrows the instruction sequence
    pub fn insns(&self) -> &[Instruction] {
        &self.insns
    }

    /// Runs the program against one packet
    ///
    /// See [vm::run]; `wirelen` is the original on-the-wire packet length,
    /// which may exceed the bytes actually buffered in `packet`.
    pub fn filter<P: Packet + ?Sized>(&self, packet: &P, wirelen: u32) -> u32 {
        vm::run(&self.insns, packet, wirelen)
    }
}
