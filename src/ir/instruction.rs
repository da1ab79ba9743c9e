//! The intermediate instruction model and its lowering contract.
//!
//! `Instruction` is the unit the optimizer rewrites and lowering consumes.
//! Its kind is a closed sum type: dispatch is an exhaustive match, so a
//! missing case is a compile error rather than a runtime surprise. Each
//! kind fixes the count and meaning of its operand slots; indexing outside
//! that contract is a caller bug and panics.
//!
//! Three contracts matter downstream:
//! - `maps_to_asm` tells passes which instructions occupy a slot in the
//!   encoded stream. Metadata kinds (labels, barriers, lifetime markers)
//!   return false and must never be counted, addressed, or emitted.
//! - `convert_to_asm` produces the bit-exact hardware word, or fails with
//!   an internal error when a metadata instruction reaches it. That
//!   failure is the safety net proving the eliminating pass ran.
//! - `copy_for` is the only way to duplicate an instruction, renaming
//!   method-owned locals so clones never alias the original.

use std::fmt;

use crate::asm::{
    AluInstruction, AsmInstruction, BranchInstruction, LoadImmInstruction, PackMode, Register,
    SemaphoreInstruction, WriteSwap,
};
use crate::diagnostic::{CompileError, Phase};
use crate::ir::sync::{MemoryScope, MemorySemantics, Semaphore, SemaphoreDirection};
use crate::ir::{Literal, Local, LocalKind, Method, Value};
use crate::lower::Resolver;
use crate::target::{BRANCH_DELAY_SLOTS, INSTRUCTION_BYTES};

// ─── Conditions and flags ─────────────────────────────────────────

/// Predicate over the hardware flags deciding whether an instruction
/// executes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CondCode {
    Never,
    Always,
    ZeroSet,
    ZeroClear,
    NegativeSet,
    NegativeClear,
    CarrySet,
    CarryClear,
}

impl CondCode {
    pub fn name(self) -> &'static str {
        match self {
            CondCode::Never => "never",
            CondCode::Always => "always",
            CondCode::ZeroSet => "ifz",
            CondCode::ZeroClear => "ifzc",
            CondCode::NegativeSet => "ifn",
            CondCode::NegativeClear => "ifnc",
            CondCode::CarrySet => "ifc",
            CondCode::CarryClear => "ifcc",
        }
    }

    /// Three-bit condition field value.
    pub fn encoding(self) -> u64 {
        match self {
            CondCode::Never => 0,
            CondCode::Always => 1,
            CondCode::ZeroSet => 2,
            CondCode::ZeroClear => 3,
            CondCode::NegativeSet => 4,
            CondCode::NegativeClear => 5,
            CondCode::CarrySet => 6,
            CondCode::CarryClear => 7,
        }
    }

    /// Inverse of `encoding`, total over the masked three-bit field.
    pub fn from_encoding(bits: u8) -> CondCode {
        match bits & 0x7 {
            0 => CondCode::Never,
            1 => CondCode::Always,
            2 => CondCode::ZeroSet,
            3 => CondCode::ZeroClear,
            4 => CondCode::NegativeSet,
            5 => CondCode::NegativeClear,
            6 => CondCode::CarrySet,
            _ => CondCode::CarryClear,
        }
    }
}

/// Whether executing an instruction updates the hardware flags.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SetFlags {
    DontSet,
    Set,
}

// ─── ALU opcodes ──────────────────────────────────────────────────

/// Operations of the ALU pipes. Encoding 0 is reserved for the pipe nop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OpCode {
    Add,
    Sub,
    Mul24,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    Asr,
    Min,
    Max,
    Not,
    Clz,
}

impl OpCode {
    pub fn mnemonic(self) -> &'static str {
        match self {
            OpCode::Add => "add",
            OpCode::Sub => "sub",
            OpCode::Mul24 => "mul24",
            OpCode::And => "and",
            OpCode::Or => "or",
            OpCode::Xor => "xor",
            OpCode::Shl => "shl",
            OpCode::Shr => "shr",
            OpCode::Asr => "asr",
            OpCode::Min => "min",
            OpCode::Max => "max",
            OpCode::Not => "not",
            OpCode::Clz => "clz",
        }
    }

    /// Six-bit opcode field value.
    pub fn encoding(self) -> u64 {
        match self {
            OpCode::Add => 1,
            OpCode::Sub => 2,
            OpCode::Mul24 => 3,
            OpCode::And => 4,
            OpCode::Or => 5,
            OpCode::Xor => 6,
            OpCode::Shl => 7,
            OpCode::Shr => 8,
            OpCode::Asr => 9,
            OpCode::Min => 10,
            OpCode::Max => 11,
            OpCode::Not => 12,
            OpCode::Clz => 13,
        }
    }

    /// Source operands the operation consumes.
    pub fn operand_count(self) -> usize {
        match self {
            OpCode::Not | OpCode::Clz => 1,
            _ => 2,
        }
    }
}

// ─── Instruction kinds ────────────────────────────────────────────

/// The closed instruction taxonomy. Operand slots per kind:
///
/// | kind             | slots                  |
/// |------------------|------------------------|
/// | `Alu`            | dest, a, b (b empty for unary ops) |
/// | `Move`           | dest, src              |
/// | `LoadImmediate`  | dest, literal          |
/// | `Branch`         | target label           |
/// | `Label`          | label                  |
/// | `Nop`            | none                   |
/// | `Semaphore`      | none                   |
/// | `MemoryBarrier`  | none                   |
/// | `LifetimeBoundary` | stack allocation     |
#[derive(Clone, Debug, PartialEq)]
pub enum InstructionKind {
    Alu {
        op: OpCode,
    },
    Move,
    LoadImmediate,
    Branch,
    Label,
    Nop,
    Semaphore {
        semaphore: Semaphore,
        direction: SemaphoreDirection,
    },
    MemoryBarrier {
        scope: MemoryScope,
        semantics: MemorySemantics,
    },
    LifetimeBoundary {
        is_end: bool,
    },
}

// ─── Instructions ─────────────────────────────────────────────────

/// One intermediate instruction: kind, operand slots, condition code,
/// flag-update mode, and free-form decorations for diagnostics.
///
/// Deliberately not `Clone`: `copy_for` is the only duplication path, so
/// every copy is independently owned and correctly renamed.
#[derive(Debug, PartialEq)]
pub struct Instruction {
    kind: InstructionKind,
    operands: Vec<Value>,
    pub condition: CondCode,
    pub set_flags: SetFlags,
    decorations: Vec<String>,
}

impl Instruction {
    fn with_kind(kind: InstructionKind, operands: Vec<Value>) -> Self {
        Self {
            kind,
            operands,
            condition: CondCode::Always,
            set_flags: SetFlags::DontSet,
            decorations: Vec::new(),
        }
    }

    /// A two-source or one-source ALU operation. Unary operations leave
    /// slot 2 empty.
    pub fn alu(op: OpCode, dest: Value, a: Value, b: Value) -> Self {
        debug_assert!(op.operand_count() == 2 || b.is_none());
        Self::with_kind(InstructionKind::Alu { op }, vec![dest, a, b])
    }

    pub fn mov(dest: Value, src: Value) -> Self {
        Self::with_kind(InstructionKind::Move, vec![dest, src])
    }

    pub fn load_immediate(dest: Value, literal: Literal) -> Self {
        Self::with_kind(
            InstructionKind::LoadImmediate,
            vec![dest, Value::Literal(literal)],
        )
    }

    pub fn branch(target: Local) -> Self {
        Self::with_kind(InstructionKind::Branch, vec![Value::Local(target)])
    }

    pub fn label(label: Local) -> Self {
        Self::with_kind(InstructionKind::Label, vec![Value::Local(label)])
    }

    pub fn nop() -> Self {
        Self::with_kind(InstructionKind::Nop, Vec::new())
    }

    /// A hardware semaphore adjustment. Always valid.
    pub fn semaphore(
        semaphore: Semaphore,
        direction: SemaphoreDirection,
        condition: CondCode,
        set_flags: SetFlags,
    ) -> Self {
        let mut instruction = Self::with_kind(
            InstructionKind::Semaphore {
                semaphore,
                direction,
            },
            Vec::new(),
        );
        instruction.condition = condition;
        instruction.set_flags = set_flags;
        instruction
    }

    /// A memory barrier. Always valid; earlier passes must consume it.
    pub fn mem_barrier(scope: MemoryScope, semantics: MemorySemantics) -> Self {
        Self::with_kind(InstructionKind::MemoryBarrier { scope, semantics }, Vec::new())
    }

    /// A stack-lifetime marker. Fails immediately unless `allocation`
    /// references a stack allocation, so malformed markers never exist.
    pub fn lifetime(allocation: Value, is_end: bool) -> Result<Self, CompileError> {
        match allocation.local() {
            Some(local) if local.is_stack_allocation() => {}
            _ => {
                return Err(CompileError::invalid(
                    Phase::Frontend,
                    "cannot control life-time of an object not located on the stack",
                    &allocation,
                ))
            }
        }
        Ok(Self::with_kind(
            InstructionKind::LifetimeBoundary { is_end },
            vec![allocation],
        ))
    }

    pub fn with_condition(mut self, condition: CondCode) -> Self {
        self.condition = condition;
        self
    }

    pub fn with_flags(mut self, set_flags: SetFlags) -> Self {
        self.set_flags = set_flags;
        self
    }

    /// Attach free-form annotation text, rendered with the instruction.
    pub fn decorate(&mut self, text: impl Into<String>) {
        self.decorations.push(text.into());
    }

    pub fn kind(&self) -> &InstructionKind {
        &self.kind
    }

    pub fn operands(&self) -> &[Value] {
        &self.operands
    }

    /// Operand slot access. Slot count and meaning are fixed per kind;
    /// indexing past them is a bug in the caller and panics.
    pub fn operand(&self, index: usize) -> &Value {
        &self.operands[index]
    }

    /// Rewrite an operand slot in place. Same indexing contract as
    /// `operand`.
    pub fn set_operand(&mut self, index: usize, value: Value) {
        self.operands[index] = value;
    }

    pub fn decorations(&self) -> &[String] {
        &self.decorations
    }

    /// The stack allocation a lifetime boundary tracks.
    pub fn lifetime_allocation(&self) -> Option<&Local> {
        match self.kind {
            InstructionKind::LifetimeBoundary { .. } => self.operand(0).local(),
            _ => None,
        }
    }

    /// The label a branch jumps to.
    pub fn branch_target(&self) -> Option<&Local> {
        match self.kind {
            InstructionKind::Branch => self.operand(0).local(),
            _ => None,
        }
    }

    /// Whether this instruction occupies a slot in the encoded stream.
    /// Metadata kinds return false; passes computing sizes or addresses
    /// must skip them.
    pub fn maps_to_asm(&self) -> bool {
        !matches!(
            self.kind,
            InstructionKind::Label
                | InstructionKind::MemoryBarrier { .. }
                | InstructionKind::LifetimeBoundary { .. }
        )
    }

    /// Produce an independently owned copy for insertion into `target`.
    ///
    /// Every method-owned local is renamed by prefixing with `prefix` and
    /// registered in `target`'s symbol table with its kind preserved, so
    /// construction invariants (a lifetime boundary still references a
    /// stack allocation) hold on the copy by construction. Globals keep
    /// their names; literal constants are copied by value. Decorations are
    /// carried over.
    pub fn copy_for(&self, target: &mut Method, prefix: &str) -> Instruction {
        let operands = self
            .operands
            .iter()
            .map(|value| rename_value(value, target, prefix))
            .collect();
        Instruction {
            kind: self.kind.clone(),
            operands,
            condition: self.condition,
            set_flags: self.set_flags,
            decorations: self.decorations.clone(),
        }
    }

    /// Encode into the hardware word at `index` of the final stream.
    ///
    /// Every local and label referenced must resolve; anything unresolved
    /// is a defect in a prior pass. Metadata kinds fail unconditionally:
    /// reaching one here means the pass that should have consumed it did
    /// not run.
    pub fn convert_to_asm(
        &self,
        resolver: &Resolver,
        index: usize,
    ) -> Result<AsmInstruction, CompileError> {
        match &self.kind {
            InstructionKind::Alu { op } => {
                let dest = self.register_operand(0, resolver)?;
                let a = self.register_operand(1, resolver)?;
                let b = self.register_operand(2, resolver)?;
                Ok(AsmInstruction::Alu(AluInstruction::new(
                    PackMode::Nop,
                    self.condition,
                    self.condition,
                    self.set_flags,
                    WriteSwap::DontSwap,
                    dest,
                    Register::NO_REG,
                    op.encoding(),
                    a,
                    b,
                )))
            }
            InstructionKind::Move => {
                // A move is the or of a register with itself.
                let dest = self.register_operand(0, resolver)?;
                let src = self.register_operand(1, resolver)?;
                Ok(AsmInstruction::Alu(AluInstruction::new(
                    PackMode::Nop,
                    self.condition,
                    self.condition,
                    self.set_flags,
                    WriteSwap::DontSwap,
                    dest,
                    Register::NO_REG,
                    OpCode::Or.encoding(),
                    src,
                    src,
                )))
            }
            InstructionKind::LoadImmediate => {
                let dest = self.register_operand(0, resolver)?;
                let literal = match self.operand(1) {
                    Value::Literal(literal) => *literal,
                    other => {
                        return Err(CompileError::internal(
                            Phase::CodeGen,
                            "load-immediate without a literal operand",
                            other,
                        ))
                    }
                };
                Ok(AsmInstruction::LoadImm(LoadImmInstruction::new(
                    PackMode::Nop,
                    self.condition,
                    self.condition,
                    self.set_flags,
                    WriteSwap::DontSwap,
                    dest,
                    Register::NO_REG,
                    literal.as_word(),
                )))
            }
            InstructionKind::Branch => {
                let target = match self.operand(0).local() {
                    Some(local) => local,
                    None => {
                        return Err(CompileError::internal(
                            Phase::CodeGen,
                            "branch without a label operand",
                            self,
                        ))
                    }
                };
                let target_index = resolver.index_for(target)?;
                // Relative to the first instruction past the delay slots.
                let offset = (target_index as i64 - (index + BRANCH_DELAY_SLOTS) as i64)
                    * INSTRUCTION_BYTES as i64;
                Ok(AsmInstruction::Branch(BranchInstruction::new(
                    self.condition,
                    offset as i32,
                )))
            }
            InstructionKind::Nop => Ok(AsmInstruction::Alu(AluInstruction::nop(
                self.condition,
                self.set_flags,
            ))),
            InstructionKind::Semaphore {
                semaphore,
                direction,
            } => Ok(AsmInstruction::Semaphore(SemaphoreInstruction::new(
                PackMode::Nop,
                self.condition,
                self.condition,
                self.set_flags,
                WriteSwap::DontSwap,
                Register::NO_REG,
                Register::NO_REG,
                *direction,
                *semaphore,
            ))),
            InstructionKind::Label => Err(CompileError::internal(
                Phase::CodeGen,
                "there should be no more labels at this point",
                self,
            )),
            InstructionKind::MemoryBarrier { .. } => Err(CompileError::internal(
                Phase::CodeGen,
                "there should be no more memory barriers at this point",
                self,
            )),
            InstructionKind::LifetimeBoundary { .. } => Err(CompileError::internal(
                Phase::CodeGen,
                "there should be no more lifetime instructions at this point",
                self,
            )),
        }
    }

    /// Resolve an operand slot to a register field value. Empty slots
    /// encode the no-register sentinel; a literal surviving here means an
    /// earlier pass failed to materialize it.
    fn register_operand(&self, index: usize, resolver: &Resolver) -> Result<Register, CompileError> {
        match self.operand(index) {
            Value::Local(local) => resolver.register_for(local),
            Value::None => Ok(Register::NO_REG),
            Value::Literal(_) => Err(CompileError::internal(
                Phase::CodeGen,
                "literal operand survived to code generation",
                self,
            )),
        }
    }

    /// Non-default condition, flag mode, and decorations, as the
    /// parenthesized rendering suffix.
    fn format_extras(&self) -> String {
        let mut parts: Vec<&str> = Vec::new();
        if self.condition != CondCode::Always {
            parts.push(self.condition.name());
        }
        if self.set_flags == SetFlags::Set {
            parts.push("setf");
        }
        for decoration in &self.decorations {
            parts.push(decoration.as_str());
        }
        if parts.is_empty() {
            String::new()
        } else {
            format!(" ({})", parts.join(", "))
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            InstructionKind::Alu { op } if op.operand_count() == 1 => {
                write!(f, "{} = {} {}", self.operand(0), op.mnemonic(), self.operand(1))?;
            }
            InstructionKind::Alu { op } => {
                write!(
                    f,
                    "{} = {} {}, {}",
                    self.operand(0),
                    op.mnemonic(),
                    self.operand(1),
                    self.operand(2)
                )?;
            }
            InstructionKind::Move => {
                write!(f, "{} = {}", self.operand(0), self.operand(1))?;
            }
            InstructionKind::LoadImmediate => {
                write!(f, "{} = loadi {}", self.operand(0), self.operand(1))?;
            }
            InstructionKind::Branch => {
                write!(f, "br {}", self.operand(0))?;
            }
            InstructionKind::Label => {
                write!(f, "label {}", self.operand(0))?;
            }
            InstructionKind::Nop => {
                f.write_str("nop")?;
            }
            InstructionKind::Semaphore {
                semaphore,
                direction,
            } => {
                write!(f, "semaphore {} {}", semaphore, direction.name())?;
            }
            InstructionKind::MemoryBarrier { scope, semantics } => {
                write!(f, "mem-fence {}, {}", scope, semantics)?;
            }
            InstructionKind::LifetimeBoundary { is_end } => {
                write!(
                    f,
                    "life-time for {} {}",
                    self.operand(0),
                    if *is_end { "ends" } else { "starts" }
                )?;
            }
        }
        f.write_str(&self.format_extras())
    }
}

fn rename_value(value: &Value, target: &mut Method, prefix: &str) -> Value {
    match value {
        Value::Local(local) if local.kind != LocalKind::Global => {
            Value::Local(target.add_local(format!("{}{}", prefix, local.name), local.kind))
        }
        other => other.clone(),
    }
}
