//! The filter interpreter
//!
//! [run] executes one already-validated program against one packet in a
//! straight fetch-decode-execute loop: no recursion, no heap allocation,
//! no blocking. The whole execution context is a pair of `Wrapping<u32>`
//! registers, the scratch array and a program counter, all on the stack.
//!
//! The two run-time conditions validation cannot rule out, a packet read
//! past the buffered bytes and a division by a zero index register, both
//! reject the packet by returning 0. They stop this evaluation only; the
//! program stays installed for subsequent packets.

use core::num::Wrapping;

use cbpf_consts::{
    BPF_A, BPF_ABS, BPF_ADD, BPF_AND, BPF_DIV, BPF_H, BPF_IMM, BPF_IND, BPF_JA, BPF_JEQ, BPF_JGE,
    BPF_JGT, BPF_JSET, BPF_LEN, BPF_LSH, BPF_MEM, BPF_MEMWORDS, BPF_MSH, BPF_MUL, BPF_NEG, BPF_OR,
    BPF_RSH, BPF_SUB, BPF_W, BPF_X,
};

use crate::{
    packet::Packet,
    spec::{Instruction, InstructionClass},
};

/// The result of evaluating a packet against no program at all
///
/// Also the "keep everything" truncation length: callers deliver at most
/// this many bytes, i.e. the whole packet.
pub const ACCEPT_ALL: u32 = u32::MAX;

/// Executes a validated program against one packet
///
/// `wirelen` is the original length of the packet on the wire, which the
/// length instructions report; `packet` may buffer fewer bytes than that.
/// Returns the truncation length: 0 rejects the packet, any other value `n`
/// keeps at most `n` bytes.
///
/// An empty program accepts everything. Passing a program that has not been
/// through [crate::verifier::validate] is a contract violation; the loop
/// stays memory-safe regardless and treats anything off the validated map as
/// a rejection, but the results are otherwise meaningless.
pub fn run<P: Packet + ?Sized>(insns: &[Instruction], packet: &P, wirelen: u32) -> u32 {
    if insns.is_empty() {
        return ACCEPT_ALL;
    }

    let mut a = Wrapping(0u32);
    let mut x = Wrapping(0u32);
    let mut mem = [0u32; BPF_MEMWORDS];
    let mut pc = 0usize;

    loop {
        let insn = match insns.get(pc) {
            Some(insn) => *insn,
            None => return 0,
        };
        pc += 1;
        match insn.class() {
            InstructionClass::LoadAccumulator => {
                let value = match insn.mode() {
                    BPF_IMM => Some(insn.k),
                    BPF_LEN => Some(wirelen),
                    BPF_ABS => load(packet, insn.k as u64, insn.size()),
                    BPF_IND => load(packet, x.0 as u64 + insn.k as u64, insn.size()),
                    BPF_MEM => mem.get(insn.k as usize).copied(),
                    _ => None,
                };
                match value {
                    Some(value) => a = Wrapping(value),
                    None => return 0,
                }
            }
            InstructionClass::LoadIndex => {
                let value = match insn.mode() {
                    BPF_IMM => Some(insn.k),
                    BPF_LEN => Some(wirelen),
                    // 4 * (pkt[k] & 0xf): the IP header length in bytes
                    BPF_MSH => packet
                        .read_u8(insn.k as usize)
                        .map(|byte| ((byte & 0xf) as u32) << 2),
                    BPF_MEM => mem.get(insn.k as usize).copied(),
                    _ => None,
                };
                match value {
                    Some(value) => x = Wrapping(value),
                    None => return 0,
                }
            }
            InstructionClass::StoreAccumulator => match mem.get_mut(insn.k as usize) {
                Some(cell) => *cell = a.0,
                None => return 0,
            },
            InstructionClass::StoreIndex => match mem.get_mut(insn.k as usize) {
                Some(cell) => *cell = x.0,
                None => return 0,
            },
            InstructionClass::Arithmetic => {
                let src = match insn.src() {
                    BPF_X => x,
                    _ => Wrapping(insn.k),
                };
                match insn.op() {
                    BPF_ADD => a += src,
                    BPF_SUB => a -= src,
                    BPF_MUL => a *= src,
                    BPF_DIV => {
                        if src.0 == 0 {
                            return 0;
                        }
                        a /= src;
                    }
                    BPF_OR => a |= src,
                    BPF_AND => a &= src,
                    // Wrapping shifts mask the amount into 0..32
                    BPF_LSH => a = a << src.0 as usize,
                    BPF_RSH => a = a >> src.0 as usize,
                    BPF_NEG => a = -a,
                    _ => return 0,
                }
            }
            InstructionClass::Jump => {
                if insn.op() == BPF_JA {
                    pc += insn.k as usize;
                } else {
                    let src = match insn.src() {
                        BPF_X => x.0,
                        _ => insn.k,
                    };
                    let taken = match insn.op() {
                        BPF_JEQ => a.0 == src,
                        BPF_JGT => a.0 > src,
                        BPF_JGE => a.0 >= src,
                        BPF_JSET => a.0 & src != 0,
                        _ => return 0,
                    };
                    pc += usize::from(if taken { insn.jt } else { insn.jf });
                }
            }
            InstructionClass::Return => {
                return match insn.rval() {
                    BPF_A => a.0,
                    _ => insn.k,
                }
            }
            InstructionClass::Miscellaneous => match insn.miscop() {
                cbpf_consts::BPF_TAX => x = a,
                cbpf_consts::BPF_TXA => a = x,
                _ => return 0,
            },
        }
    }
}

/// Reads a packet value of the given operand size, widened to 32 bits
///
/// The offset arrives as a `u64` so that an indexed load can never wrap
/// around into a small bogus offset.
fn load<P: Packet + ?Sized>(packet: &P, offset: u64, size: u16) -> Option<u32> {
    let offset = usize::try_from(offset).ok()?;
    match size {
        BPF_W => packet.read_u32(offset),
        BPF_H => packet.read_u16(offset).map(u32::from),
        // BPF_B
        _ => packet.read_u8(offset).map(u32::from),
    }
}
