//! weft: backend of an ahead-of-time compiler for a VLIW GPU core.
//!
//! The crate owns the intermediate-instruction model and its lowering
//! contract: the closed instruction taxonomy a frontend builds and the
//! optimizer rewrites, the cloning protocol used when method bodies are
//! duplicated, and the resolver-driven encoding into 64-bit hardware
//! words. Frontend, optimization passes, register allocation, and final
//! binary emission are external collaborators.

pub mod asm;
pub mod diagnostic;
pub mod ir;
pub mod lower;
pub mod profiler;
pub mod target;

pub use asm::{AsmInstruction, Register};
pub use diagnostic::{CompileError, ErrorKind, Phase};
pub use ir::{
    CondCode, Instruction, InstructionKind, Literal, Local, LocalKind, MemoryScope,
    MemorySemantics, Method, OpCode, Semaphore, SemaphoreDirection, SetFlags, Value,
};
pub use lower::{code_size, lower_method, lower_module, Resolver};
pub use profiler::{Profiler, ProfilerScope};
