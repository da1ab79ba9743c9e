//! Lowering: from intermediate instructions to hardware words.
//!
//! The register allocator and the linker populate a `Resolver` per
//! method: a total mapping from every referenced local to its physical
//! register and from every label to its final instruction index. Lowering
//! then asks each instruction to encode itself at its final position.
//! Anything unresolved, and any metadata instruction still present, is a
//! defect in a prior pass and aborts the compilation unit.

#[cfg(test)]
mod tests;

use std::collections::HashMap;

use rayon::prelude::*;

use crate::asm::{AsmInstruction, Register};
use crate::diagnostic::{CompileError, Phase};
use crate::ir::{Instruction, Local, LocalKind, Method};
use crate::profiler::Profiler;

// ─── Resolver ─────────────────────────────────────────────────────

/// The mappings lowering consumes, supplied by the register allocator and
/// the linker.
#[derive(Clone, Debug, Default)]
pub struct Resolver {
    registers: HashMap<String, Register>,
    labels: HashMap<String, usize>,
}

impl Resolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn map_register(&mut self, name: impl Into<String>, register: Register) {
        self.registers.insert(name.into(), register);
    }

    pub fn map_label(&mut self, name: impl Into<String>, index: usize) {
        self.labels.insert(name.into(), index);
    }

    /// Physical register assigned to `local`. An unresolved local is a
    /// broken register-allocator contract, not a runtime condition.
    pub fn register_for(&self, local: &Local) -> Result<Register, CompileError> {
        self.registers.get(&local.name).copied().ok_or_else(|| {
            CompileError::internal(Phase::CodeGen, "local has no register assigned", local)
        })
    }

    /// Final instruction index of `label`.
    pub fn index_for(&self, label: &Local) -> Result<usize, CompileError> {
        if label.kind != LocalKind::Label {
            return Err(CompileError::internal(
                Phase::CodeGen,
                "branch target is not a label",
                label,
            ));
        }
        self.labels.get(&label.name).copied().ok_or_else(|| {
            CompileError::internal(Phase::CodeGen, "label has no instruction index", label)
        })
    }
}

// ─── Drivers ──────────────────────────────────────────────────────

/// Encoded size of a sequence in instruction words, skipping instructions
/// that never reach the stream.
pub fn code_size(instructions: &[Instruction]) -> usize {
    instructions.iter().filter(|i| i.maps_to_asm()).count()
}

/// Lower every instruction of `method` into its final stream.
///
/// The stream handed in must already be free of metadata instructions;
/// each surviving instruction's index in the output equals its position
/// here, which is what branch offsets are computed against.
pub fn lower_method(
    method: &Method,
    resolver: &Resolver,
) -> Result<Vec<AsmInstruction>, CompileError> {
    let mut stream = Vec::with_capacity(method.instructions.len());
    for instruction in &method.instructions {
        let index = stream.len();
        stream.push(instruction.convert_to_asm(resolver, index)?);
    }
    log::debug!("lowered method '{}' into {} words", method.name, stream.len());
    Ok(stream)
}

/// Lower independent methods in parallel.
///
/// Each method's instructions and locals are exclusive to its worker, so
/// no locking is needed on the instruction data itself. Workers record
/// their timings through their own profiler scope; output order matches
/// input order.
pub fn lower_module(
    jobs: &[(&Method, &Resolver)],
    profiler: &Profiler,
) -> Result<Vec<Vec<AsmInstruction>>, CompileError> {
    jobs.par_iter()
        .map(|(method, resolver)| {
            let mut scope = profiler.scope();
            let stream = scope.time("lower_method", || lower_method(method, resolver))?;
            scope.count("asm_instructions", stream.len() as u64);
            Ok(stream)
        })
        .collect()
}
