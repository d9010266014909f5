//! Static validation of classic BPF programs
//!
//! A program is checked exactly once, before it is ever executed, and the
//! interpreter afterwards trusts every invariant established here: all
//! opcodes decode to real operations, scratch indices are in range, jumps
//! land inside the program, and the program always reaches a return.
//! Jumps are strictly forward, so termination needs no graph analysis at
//! all: the instruction pointer only ever increases over a finite array.
//!
//! On top of the structural checks, a forward dataflow pass proves that no
//! scratch memory cell is read before every path to the read has written it.

use alloc::{vec, vec::Vec};

use cbpf_consts::{
    BPF_A, BPF_ABS, BPF_B, BPF_DIV, BPF_H, BPF_IMM, BPF_IND, BPF_JA, BPF_K, BPF_LEN, BPF_MAXINSNS,
    BPF_MEM, BPF_MEMWORDS, BPF_MSH, BPF_RET, BPF_ST, BPF_STX, BPF_TAX, BPF_TXA, BPF_W, BPF_X,
};

use crate::spec::{Instruction, InstructionClass};

/// Why a candidate program was refused
///
/// Every rejection is terminal: there is no partial acceptance, and the
/// validator leaves no state behind.
#[derive(Debug, PartialEq, Eq)]
pub enum ValidationError {
    /// The program has no instructions or more than [BPF_MAXINSNS]
    EmptyOrTooLarge,
    /// An instruction's code does not decode to any recognized operation
    UnknownOpcode,
    /// A scratch memory index is not below [BPF_MEMWORDS]
    OutOfRangeMemory,
    /// A constant-operand division by the literal 0
    DivideByZeroConstant,
    /// A computed jump target lies at or past the end of the program
    JumpOutOfRange,
    /// A scratch load that some path reaches without a prior store to the cell
    UninitializedRead,
    /// The last instruction is not return-class
    NoTerminalReturn,
}

/// Every scratch cell marked possibly-uninitialized
const ALL_UNWRITTEN: u32 = (1 << BPF_MEMWORDS) - 1;

/// Checks that a candidate program can never fault, leak or loop
///
/// This is a single forward pass. Per instruction it checks the opcode
/// constraints via [check_instruction] and the jump bounds, while eagerly
/// propagating the scratch-liveness masks; jumps being forward-only means
/// every instruction has received all its incoming masks by the time the
/// pass reaches it.
pub fn validate(insns: &[Instruction]) -> Result<(), ValidationError> {
    if insns.is_empty() || insns.len() > BPF_MAXINSNS {
        return Err(ValidationError::EmptyOrTooLarge);
    }
    // A necessary condition only; path-wise termination follows from the
    // forward-only jump checks below.
    if insns[insns.len() - 1].class() != InstructionClass::Return {
        return Err(ValidationError::NoTerminalReturn);
    }

    // unwritten[i] is the union over all paths reaching i of the cells not
    // yet stored to. Instructions nothing jumped or fell through to keep the
    // worst-case mask.
    let mut unwritten: Vec<u32> = vec![ALL_UNWRITTEN; insns.len()];
    let mut resolved: Vec<bool> = vec![false; insns.len()];
    resolved[0] = true;

    for (i, insn) in insns.iter().enumerate() {
        check_instruction(*insn)?;

        let mut mask = unwritten[i];
        match insn.class() {
            InstructionClass::LoadAccumulator | InstructionClass::LoadIndex => {
                if insn.mode() == BPF_MEM && mask & (1 << insn.k) != 0 {
                    return Err(ValidationError::UninitializedRead);
                }
            }
            InstructionClass::StoreAccumulator | InstructionClass::StoreIndex => {
                mask &= !(1 << insn.k);
            }
            InstructionClass::Jump => {
                if insn.op() == BPF_JA {
                    let target = checked_target(i, insns.len(), insn.k as usize)?;
                    merge(&mut unwritten, &mut resolved, target, mask);
                } else {
                    let on_true = checked_target(i, insns.len(), insn.jt as usize)?;
                    let on_false = checked_target(i, insns.len(), insn.jf as usize)?;
                    merge(&mut unwritten, &mut resolved, on_true, mask);
                    merge(&mut unwritten, &mut resolved, on_false, mask);
                }
                continue;
            }
            // No successors
            InstructionClass::Return => continue,
            _ => {}
        }
        // The terminal return check above rules out falling off the end
        merge(&mut unwritten, &mut resolved, i + 1, mask);
    }
    Ok(())
}

/// Computes `i + 1 + offset` and bounds-checks it against the program length
///
/// Offsets are unsigned, so targets are always strictly forward; together
/// with the finite instruction array this is what rules out loops.
fn checked_target(i: usize, len: usize, offset: usize) -> Result<usize, ValidationError> {
    match (i + 1).checked_add(offset) {
        Some(target) if target < len => Ok(target),
        _ => Err(ValidationError::JumpOutOfRange),
    }
}

/// Unions `mask` into a successor's incoming scratch-liveness mask
///
/// The first edge into a successor replaces its worst-case placeholder; any
/// further edge ORs in, so a cell counts as written only when every incoming
/// path wrote it.
fn merge(unwritten: &mut [u32], resolved: &mut [bool], target: usize, mask: u32) {
    if resolved[target] {
        unwritten[target] |= mask;
    } else {
        unwritten[target] = mask;
        resolved[target] = true;
    }
}

/// Checks the constraints of a single instruction
///
/// Exactly the code points the interpreter implements are recognized;
/// undefined size, mode or source bit patterns are refused, as are scratch
/// indices past the cell count and constant division by zero.
fn check_instruction(insn: Instruction) -> Result<(), ValidationError> {
    match insn.class() {
        InstructionClass::LoadAccumulator => match (insn.mode(), insn.size()) {
            (BPF_IMM, BPF_W) | (BPF_LEN, BPF_W) => Ok(()),
            (BPF_ABS | BPF_IND, BPF_W | BPF_H | BPF_B) => Ok(()),
            (BPF_MEM, BPF_W) => check_scratch_index(insn.k),
            _ => Err(ValidationError::UnknownOpcode),
        },
        InstructionClass::LoadIndex => match (insn.mode(), insn.size()) {
            (BPF_IMM, BPF_W) | (BPF_LEN, BPF_W) => Ok(()),
            (BPF_MSH, BPF_B) => Ok(()),
            (BPF_MEM, BPF_W) => check_scratch_index(insn.k),
            _ => Err(ValidationError::UnknownOpcode),
        },
        InstructionClass::StoreAccumulator => {
            if insn.code == BPF_ST {
                check_scratch_index(insn.k)
            } else {
                Err(ValidationError::UnknownOpcode)
            }
        }
        InstructionClass::StoreIndex => {
            if insn.code == BPF_STX {
                check_scratch_index(insn.k)
            } else {
                Err(ValidationError::UnknownOpcode)
            }
        }
        InstructionClass::Arithmetic => check_arithmetic(insn),
        InstructionClass::Jump => check_jump(insn),
        InstructionClass::Return => {
            if insn.code == BPF_RET | BPF_K || insn.code == BPF_RET | BPF_A {
                Ok(())
            } else {
                Err(ValidationError::UnknownOpcode)
            }
        }
        // The misc operation bits and the class bits cover the whole code word
        InstructionClass::Miscellaneous => match insn.miscop() {
            BPF_TAX | BPF_TXA => Ok(()),
            _ => Err(ValidationError::UnknownOpcode),
        },
    }
}

fn check_scratch_index(k: u32) -> Result<(), ValidationError> {
    if (k as usize) < BPF_MEMWORDS {
        Ok(())
    } else {
        Err(ValidationError::OutOfRangeMemory)
    }
}

fn check_arithmetic(insn: Instruction) -> Result<(), ValidationError> {
    use cbpf_consts::{BPF_ADD, BPF_AND, BPF_LSH, BPF_MUL, BPF_NEG, BPF_OR, BPF_RSH, BPF_SUB};
    match (insn.op(), insn.src()) {
        (BPF_DIV, BPF_K) if insn.k == 0 => Err(ValidationError::DivideByZeroConstant),
        (BPF_ADD | BPF_SUB | BPF_MUL | BPF_DIV | BPF_OR | BPF_AND | BPF_LSH | BPF_RSH, _) => Ok(()),
        // Negation takes no source operand
        (BPF_NEG, BPF_K) => Ok(()),
        _ => Err(ValidationError::UnknownOpcode),
    }
}

fn check_jump(insn: Instruction) -> Result<(), ValidationError> {
    use cbpf_consts::{BPF_JEQ, BPF_JGE, BPF_JGT, BPF_JSET};
    match (insn.op(), insn.src()) {
        // Unconditional jumps take their offset from k, not a comparison
        (BPF_JA, BPF_K) => Ok(()),
        (BPF_JEQ | BPF_JGT | BPF_JGE | BPF_JSET, BPF_K | BPF_X) => Ok(()),
        _ => Err(ValidationError::UnknownOpcode),
    }
}
