//! Hardware instruction words.
//!
//! Every instruction the emitter receives is one 64-bit word. The top four
//! bits select the word class; the shared control fields sit in the same
//! place in every class and the low bits carry the class payload.
//!
//! ```text
//! 63    60 59    56 55    53 52    50 49 48 47       42 41       36 35      0
//! [class ] [pack  ] [cond_a] [cond_m] [sf][ws][waddr_add][waddr_mul][payload]
//! ```
//!
//! Payloads: ALU carries opcode `[35:30]`, `raddr_a [29:24]`,
//! `raddr_b [23:18]`; load-immediate and branch carry a 32-bit word in
//! `[31:0]` (the branch offset in bytes, two's complement); the semaphore
//! word carries the direction bit `[4]` and the semaphore id `[3:0]`.

use std::fmt;

use crate::diagnostic::{CompileError, Phase};
use crate::ir::instruction::{CondCode, SetFlags};
use crate::ir::sync::{Semaphore, SemaphoreDirection};
use crate::target::{NO_REGISTER, REGISTER_COUNT};

const CLASS_ALU: u64 = 0x1;
const CLASS_SEMAPHORE: u64 = 0xd;
const CLASS_LOAD_IMM: u64 = 0xe;
const CLASS_BRANCH: u64 = 0xf;

const SHIFT_CLASS: u32 = 60;
const SHIFT_PACK: u32 = 56;
const SHIFT_COND_ADD: u32 = 53;
const SHIFT_COND_MUL: u32 = 50;
const SHIFT_SET_FLAGS: u32 = 49;
const SHIFT_WRITE_SWAP: u32 = 48;
const SHIFT_WADDR_ADD: u32 = 42;
const SHIFT_WADDR_MUL: u32 = 36;
const SHIFT_OP: u32 = 30;
const SHIFT_RADDR_A: u32 = 24;
const SHIFT_RADDR_B: u32 = 18;
const SHIFT_DIRECTION: u32 = 4;

fn field(word: u64, shift: u32, width: u32) -> u64 {
    (word >> shift) & ((1 << width) - 1)
}

// ─── Registers ────────────────────────────────────────────────────

/// A physical register number, or the reserved "no register" sentinel
/// used when a register field is unused.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Register(u8);

impl Register {
    pub const NO_REG: Register = Register(NO_REGISTER);

    /// A real register. Fails for numbers outside the register file; the
    /// register allocator handing one out is a broken contract.
    pub fn new(number: u8) -> Result<Self, CompileError> {
        if number >= REGISTER_COUNT {
            return Err(CompileError::internal(
                Phase::General,
                format!("register number outside the register file (0..{})", REGISTER_COUNT),
                number,
            ));
        }
        Ok(Register(number))
    }

    pub fn number(self) -> u8 {
        self.0
    }

    pub fn is_none(self) -> bool {
        self.0 == NO_REGISTER
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            f.write_str("-")
        } else {
            write!(f, "r{}", self.0)
        }
    }
}

// ─── Control fields ───────────────────────────────────────────────

/// Result packing applied by the write stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PackMode {
    Nop,
    Low16,
    High16,
    Saturate,
}

impl PackMode {
    pub fn encoding(self) -> u64 {
        match self {
            PackMode::Nop => 0,
            PackMode::Low16 => 1,
            PackMode::High16 => 2,
            PackMode::Saturate => 3,
        }
    }
}

/// Whether the two write-register fields swap their target files.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteSwap {
    DontSwap,
    Swap,
}

impl WriteSwap {
    pub fn encoding(self) -> u64 {
        match self {
            WriteSwap::DontSwap => 0,
            WriteSwap::Swap => 1,
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn control_word(
    class: u64,
    pack: PackMode,
    cond_add: CondCode,
    cond_mul: CondCode,
    set_flags: SetFlags,
    write_swap: WriteSwap,
    waddr_add: Register,
    waddr_mul: Register,
) -> u64 {
    let sf = match set_flags {
        SetFlags::DontSet => 0u64,
        SetFlags::Set => 1,
    };
    (class << SHIFT_CLASS)
        | (pack.encoding() << SHIFT_PACK)
        | (cond_add.encoding() << SHIFT_COND_ADD)
        | (cond_mul.encoding() << SHIFT_COND_MUL)
        | (sf << SHIFT_SET_FLAGS)
        | (write_swap.encoding() << SHIFT_WRITE_SWAP)
        | (u64::from(waddr_add.number()) << SHIFT_WADDR_ADD)
        | (u64::from(waddr_mul.number()) << SHIFT_WADDR_MUL)
}

macro_rules! control_accessors {
    ($ty:ident) => {
        impl $ty {
            pub fn word(self) -> u64 {
                self.0
            }

            pub fn class(self) -> u64 {
                field(self.0, SHIFT_CLASS, 4)
            }

            pub fn pack_bits(self) -> u8 {
                field(self.0, SHIFT_PACK, 4) as u8
            }

            pub fn cond_add(self) -> CondCode {
                CondCode::from_encoding(field(self.0, SHIFT_COND_ADD, 3) as u8)
            }

            pub fn cond_mul(self) -> CondCode {
                CondCode::from_encoding(field(self.0, SHIFT_COND_MUL, 3) as u8)
            }

            pub fn set_flags(self) -> SetFlags {
                if field(self.0, SHIFT_SET_FLAGS, 1) == 1 {
                    SetFlags::Set
                } else {
                    SetFlags::DontSet
                }
            }

            pub fn write_swap(self) -> WriteSwap {
                if field(self.0, SHIFT_WRITE_SWAP, 1) == 1 {
                    WriteSwap::Swap
                } else {
                    WriteSwap::DontSwap
                }
            }

            pub fn waddr_add(self) -> u8 {
                field(self.0, SHIFT_WADDR_ADD, 6) as u8
            }

            pub fn waddr_mul(self) -> u8 {
                field(self.0, SHIFT_WADDR_MUL, 6) as u8
            }
        }
    };
}

// ─── Word classes ─────────────────────────────────────────────────

/// A two-pipe ALU word. Also the encoding of moves and no-ops.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AluInstruction(u64);

control_accessors!(AluInstruction);

impl AluInstruction {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        pack: PackMode,
        cond_add: CondCode,
        cond_mul: CondCode,
        set_flags: SetFlags,
        write_swap: WriteSwap,
        waddr_add: Register,
        waddr_mul: Register,
        op: u64,
        raddr_a: Register,
        raddr_b: Register,
    ) -> Self {
        let word = control_word(
            CLASS_ALU, pack, cond_add, cond_mul, set_flags, write_swap, waddr_add, waddr_mul,
        ) | ((op & 0x3f) << SHIFT_OP)
            | (u64::from(raddr_a.number()) << SHIFT_RADDR_A)
            | (u64::from(raddr_b.number()) << SHIFT_RADDR_B);
        AluInstruction(word)
    }

    /// Both pipes idle: opcode zero, every register field the sentinel.
    pub fn nop(condition: CondCode, set_flags: SetFlags) -> Self {
        Self::new(
            PackMode::Nop,
            condition,
            condition,
            set_flags,
            WriteSwap::DontSwap,
            Register::NO_REG,
            Register::NO_REG,
            0,
            Register::NO_REG,
            Register::NO_REG,
        )
    }

    pub fn op(self) -> u8 {
        field(self.0, SHIFT_OP, 6) as u8
    }

    pub fn raddr_a(self) -> u8 {
        field(self.0, SHIFT_RADDR_A, 6) as u8
    }

    pub fn raddr_b(self) -> u8 {
        field(self.0, SHIFT_RADDR_B, 6) as u8
    }
}

/// A load-immediate word: a 32-bit literal into the write stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoadImmInstruction(u64);

control_accessors!(LoadImmInstruction);

impl LoadImmInstruction {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        pack: PackMode,
        cond_add: CondCode,
        cond_mul: CondCode,
        set_flags: SetFlags,
        write_swap: WriteSwap,
        waddr_add: Register,
        waddr_mul: Register,
        immediate: u32,
    ) -> Self {
        let word = control_word(
            CLASS_LOAD_IMM, pack, cond_add, cond_mul, set_flags, write_swap, waddr_add, waddr_mul,
        ) | u64::from(immediate);
        LoadImmInstruction(word)
    }

    pub fn immediate(self) -> u32 {
        self.0 as u32
    }
}

/// A branch word: a byte offset relative to the end of the delay slots.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BranchInstruction(u64);

control_accessors!(BranchInstruction);

impl BranchInstruction {
    pub fn new(condition: CondCode, offset: i32) -> Self {
        let word = control_word(
            CLASS_BRANCH,
            PackMode::Nop,
            condition,
            condition,
            SetFlags::DontSet,
            WriteSwap::DontSwap,
            Register::NO_REG,
            Register::NO_REG,
        ) | u64::from(offset as u32);
        BranchInstruction(word)
    }

    pub fn offset(self) -> i32 {
        self.0 as u32 as i32
    }
}

/// A semaphore word: direction bit plus semaphore id.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SemaphoreInstruction(u64);

control_accessors!(SemaphoreInstruction);

impl SemaphoreInstruction {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        pack: PackMode,
        cond_add: CondCode,
        cond_mul: CondCode,
        set_flags: SetFlags,
        write_swap: WriteSwap,
        waddr_add: Register,
        waddr_mul: Register,
        direction: SemaphoreDirection,
        semaphore: Semaphore,
    ) -> Self {
        let word = control_word(
            CLASS_SEMAPHORE, pack, cond_add, cond_mul, set_flags, write_swap, waddr_add, waddr_mul,
        ) | (direction.encoding() << SHIFT_DIRECTION)
            | u64::from(semaphore.index());
        SemaphoreInstruction(word)
    }

    pub fn semaphore(self) -> u8 {
        field(self.0, 0, 4) as u8
    }

    pub fn direction(self) -> SemaphoreDirection {
        if field(self.0, SHIFT_DIRECTION, 1) == 1 {
            SemaphoreDirection::Increase
        } else {
            SemaphoreDirection::Decrease
        }
    }
}

// ─── Emitter-facing wrapper ───────────────────────────────────────

/// One encoded instruction, as handed to the assembly emitter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AsmInstruction {
    Alu(AluInstruction),
    LoadImm(LoadImmInstruction),
    Branch(BranchInstruction),
    Semaphore(SemaphoreInstruction),
}

impl AsmInstruction {
    pub fn word(self) -> u64 {
        match self {
            AsmInstruction::Alu(i) => i.word(),
            AsmInstruction::LoadImm(i) => i.word(),
            AsmInstruction::Branch(i) => i.word(),
            AsmInstruction::Semaphore(i) => i.word(),
        }
    }
}

impl fmt::Display for AsmInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.word())
    }
}
