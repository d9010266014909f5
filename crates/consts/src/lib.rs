//! This crate contains the classic BPF instruction encoding: operation codes,
//! sub-field values and the masks used to pick them apart.
//!
//! The numeric values are the standardized classic BPF layout and must match
//! existing bytecode producers bit for bit. The low three bits of an
//! instruction's `code` select the class; the remaining bits select an
//! operand size, an addressing mode or an operation depending on the class.

#![no_std]

/// Number of 32-bit scratch memory cells available to a filter program.
pub const BPF_MEMWORDS : usize = 16;

/// Maximum instruction count accepted by the validator.
///
/// Programs longer than this are refused outright: a filter runs to
/// completion inside whatever context handed us the packet, so its worst
/// case latency has to stay bounded.
pub const BPF_MAXINSNS : usize = 512;

// Three least significant bits are the instruction class:
/// BPF instruction class: load into the accumulator.
pub const BPF_LD    : u16 = 0x00;
/// BPF instruction class: load into the index register.
pub const BPF_LDX   : u16 = 0x01;
/// BPF instruction class: store the accumulator into scratch memory.
pub const BPF_ST    : u16 = 0x02;
/// BPF instruction class: store the index register into scratch memory.
pub const BPF_STX   : u16 = 0x03;
/// BPF instruction class: arithmetic on the accumulator.
pub const BPF_ALU   : u16 = 0x04;
/// BPF instruction class: forward jump.
pub const BPF_JMP   : u16 = 0x05;
/// BPF instruction class: return from the filter.
pub const BPF_RET   : u16 = 0x06;
/// BPF instruction class: register transfers.
pub const BPF_MISC  : u16 = 0x07;

// For load instructions:
// +------------+--------+------------+
// |   3 bits   | 2 bits |   3 bits   |
// |    mode    |  size  | insn class |
// +------------+--------+------------+
// (MSB)                          (LSB)

// Size modifiers:
/// BPF size modifier: word (4 bytes).
pub const BPF_W     : u16 = 0x00;
/// BPF size modifier: half-word (2 bytes).
pub const BPF_H     : u16 = 0x08;
/// BPF size modifier: byte (1 byte).
pub const BPF_B     : u16 = 0x10;

// Mode modifiers:
/// BPF mode modifier: immediate value.
pub const BPF_IMM   : u16 = 0x00;
/// BPF mode modifier: absolute packet load at offset `k`.
pub const BPF_ABS   : u16 = 0x20;
/// BPF mode modifier: indexed packet load at offset `X + k`.
pub const BPF_IND   : u16 = 0x40;
/// BPF mode modifier: scratch memory cell `k`.
pub const BPF_MEM   : u16 = 0x60;
/// BPF mode modifier: packet wire length.
pub const BPF_LEN   : u16 = 0x80;
/// BPF mode modifier: IP-header-length extraction, `4 * (pkt[k] & 0xf)`.
pub const BPF_MSH   : u16 = 0xa0;

// For arithmetic (BPF_ALU) and jump (BPF_JMP) instructions:
// +----------------+----+------------+
// |     4 bits     |1 b.|   3 bits   |
// | operation code | src| insn class |
// +----------------+----+------------+
// (MSB)                          (LSB)

// Source modifiers:
/// BPF source operand modifier: the immediate value `k`.
pub const BPF_K     : u16 = 0x00;
/// BPF source operand modifier: the index register.
pub const BPF_X     : u16 = 0x08;

// Operation codes -- BPF_ALU class:
/// BPF ALU operation code: addition.
pub const BPF_ADD   : u16 = 0x00;
/// BPF ALU operation code: subtraction.
pub const BPF_SUB   : u16 = 0x10;
/// BPF ALU operation code: multiplication.
pub const BPF_MUL   : u16 = 0x20;
/// BPF ALU operation code: division.
pub const BPF_DIV   : u16 = 0x30;
/// BPF ALU operation code: or.
pub const BPF_OR    : u16 = 0x40;
/// BPF ALU operation code: and.
pub const BPF_AND   : u16 = 0x50;
/// BPF ALU operation code: left shift.
pub const BPF_LSH   : u16 = 0x60;
/// BPF ALU operation code: right shift.
pub const BPF_RSH   : u16 = 0x70;
/// BPF ALU operation code: negation.
pub const BPF_NEG   : u16 = 0x80;

// Operation codes -- BPF_JMP class:
/// BPF JMP operation code: unconditional jump by `k`.
pub const BPF_JA    : u16 = 0x00;
/// BPF JMP operation code: jump if equal.
pub const BPF_JEQ   : u16 = 0x10;
/// BPF JMP operation code: jump if greater than.
pub const BPF_JGT   : u16 = 0x20;
/// BPF JMP operation code: jump if greater or equal.
pub const BPF_JGE   : u16 = 0x30;
/// BPF JMP operation code: jump if `accumulator & src` is nonzero.
pub const BPF_JSET  : u16 = 0x40;

// Return value sources -- BPF_RET class:
// BPF_K (0x00) returns the immediate value; BPF_A returns the accumulator.
/// BPF RET source modifier: return the accumulator.
pub const BPF_A     : u16 = 0x10;

// Operation codes -- BPF_MISC class:
/// BPF MISC operation code: copy the accumulator into the index register.
pub const BPF_TAX   : u16 = 0x00;
/// BPF MISC operation code: copy the index register into the accumulator.
pub const BPF_TXA   : u16 = 0x80;

pub mod mask {
    //! Field masks and extractors for the classic BPF `code` word.

    /// Instruction class
    pub const BPF_CLASS_MASK  : u16 = 0x07;
    /// Load operand size
    pub const BPF_SIZE_MASK   : u16 = 0x18;
    /// Load addressing mode
    pub const BPF_MODE_MASK   : u16 = 0xe0;
    /// ALU / JMP operation
    pub const BPF_OP_MASK     : u16 = 0xf0;
    /// ALU / JMP operand source
    pub const BPF_SRC_MASK    : u16 = 0x08;
    /// RET value source
    pub const BPF_RVAL_MASK   : u16 = 0x18;
    /// MISC operation
    pub const BPF_MISCOP_MASK : u16 = 0xf8;

    /// Extracts the instruction class.
    pub const fn bpf_class(code: u16) -> u16 {
        code & BPF_CLASS_MASK
    }

    /// Extracts the operand size of a load instruction.
    pub const fn bpf_size(code: u16) -> u16 {
        code & BPF_SIZE_MASK
    }

    /// Extracts the addressing mode of a load instruction.
    pub const fn bpf_mode(code: u16) -> u16 {
        code & BPF_MODE_MASK
    }

    /// Extracts the operation of an ALU or JMP instruction.
    pub const fn bpf_op(code: u16) -> u16 {
        code & BPF_OP_MASK
    }

    /// Extracts the operand source of an ALU or JMP instruction.
    pub const fn bpf_src(code: u16) -> u16 {
        code & BPF_SRC_MASK
    }

    /// Extracts the value source of a RET instruction.
    pub const fn bpf_rval(code: u16) -> u16 {
        code & BPF_RVAL_MASK
    }

    /// Extracts the operation of a MISC instruction.
    pub const fn bpf_miscop(code: u16) -> u16 {
        code & BPF_MISCOP_MASK
    }
}
