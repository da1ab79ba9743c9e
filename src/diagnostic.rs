//! Compilation errors raised by the instruction model and by lowering.
//!
//! Two kinds are distinguished. `Invalid` marks malformed input caught at
//! construction time, before the bad construct can enter a method body.
//! `Internal` marks a broken invariant: an earlier pass failed its
//! contract, and the caller should abort the compilation unit rather than
//! retry or downgrade. Both carry the phase they are attributed to and a
//! rendering of the offending construct.

use std::fmt;

/// The compilation phase an error is attributed to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Frontend,
    Normalization,
    Optimization,
    CodeGen,
    General,
}

impl Phase {
    pub fn name(self) -> &'static str {
        match self {
            Phase::Frontend => "frontend",
            Phase::Normalization => "normalization",
            Phase::Optimization => "optimization",
            Phase::CodeGen => "code generation",
            Phase::General => "general",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Whether an error is user-facing or an internal invariant violation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input rejected at construction time.
    Invalid,
    /// An earlier pass failed its contract. Never downgraded to a warning.
    Internal,
}

/// A compilation error: phase, message, and the offending construct's
/// textual rendering.
#[derive(Clone, Debug)]
pub struct CompileError {
    pub kind: ErrorKind,
    pub phase: Phase,
    pub message: String,
    pub construct: String,
}

impl CompileError {
    /// A construction-time validation failure, reportable to the user.
    pub fn invalid(phase: Phase, message: impl Into<String>, construct: impl fmt::Display) -> Self {
        Self {
            kind: ErrorKind::Invalid,
            phase,
            message: message.into(),
            construct: construct.to_string(),
        }
    }

    /// An invariant violation from an earlier pass. Callers abort.
    pub fn internal(phase: Phase, message: impl Into<String>, construct: impl fmt::Display) -> Self {
        Self {
            kind: ErrorKind::Internal,
            phase,
            message: message.into(),
            construct: construct.to_string(),
        }
    }

    pub fn is_internal(&self) -> bool {
        self.kind == ErrorKind::Internal
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.construct.is_empty() {
            write!(f, "{}: {}", self.phase, self.message)
        } else {
            write!(f, "{}: {}: {}", self.phase, self.message, self.construct)
        }
    }
}

impl std::error::Error for CompileError {}
