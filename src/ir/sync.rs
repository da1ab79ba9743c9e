//! Payloads of the synchronization and lifetime instruction variants.
//!
//! Semaphore adjustments are real hardware instructions and encode
//! directly. Memory barriers are compile-time ordering metadata: the
//! barrier-elimination pass must replace or remove every one of them, and
//! lowering refuses any survivor. Scope and semantics arrive from the
//! frontend as raw words and are validated here, at the decode boundary,
//! so a barrier with an unsupported value can never be built.

use std::fmt;

use bitflags::bitflags;

use crate::diagnostic::{CompileError, Phase};
use crate::target::SEMAPHORE_COUNT;

// ─── Semaphores ───────────────────────────────────────────────────

/// One of the core's hardware semaphores, identified by index.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Semaphore(u8);

impl Semaphore {
    /// Reference a hardware semaphore. Fails for indices outside the
    /// core's fixed set.
    pub fn new(index: u8) -> Result<Self, CompileError> {
        if index >= SEMAPHORE_COUNT {
            return Err(CompileError::invalid(
                Phase::Frontend,
                format!("semaphore index out of range (core has {})", SEMAPHORE_COUNT),
                index,
            ));
        }
        Ok(Semaphore(index))
    }

    pub fn index(self) -> u8 {
        self.0
    }
}

impl fmt::Display for Semaphore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Direction of a semaphore adjustment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SemaphoreDirection {
    Increase,
    Decrease,
}

impl SemaphoreDirection {
    pub fn name(self) -> &'static str {
        match self {
            SemaphoreDirection::Increase => "increase",
            SemaphoreDirection::Decrease => "decrease",
        }
    }

    /// Direction bit in the semaphore word.
    pub fn encoding(self) -> u64 {
        match self {
            SemaphoreDirection::Increase => 1,
            SemaphoreDirection::Decrease => 0,
        }
    }
}

// ─── Memory scope ─────────────────────────────────────────────────

/// Execution scope a memory barrier applies to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MemoryScope {
    CrossDevice,
    Device,
    WorkGroup,
    SubGroup,
    Invocation,
}

impl MemoryScope {
    /// Decode a frontend scope word. An unknown word is the
    /// unsupported-value error, never a guessed default.
    pub fn from_word(word: u32) -> Result<Self, CompileError> {
        match word {
            0 => Ok(MemoryScope::CrossDevice),
            1 => Ok(MemoryScope::Device),
            2 => Ok(MemoryScope::WorkGroup),
            3 => Ok(MemoryScope::SubGroup),
            4 => Ok(MemoryScope::Invocation),
            other => Err(CompileError::internal(
                Phase::General,
                "unsupported memory scope value",
                other,
            )),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            MemoryScope::CrossDevice => "global",
            MemoryScope::Device => "device",
            MemoryScope::SubGroup => "sub-group",
            MemoryScope::WorkGroup => "work-group",
            MemoryScope::Invocation => "invocation",
        }
    }
}

impl fmt::Display for MemoryScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ─── Memory semantics ─────────────────────────────────────────────

bitflags! {
    /// Memory-ordering semantics of a barrier: ordering bits plus the
    /// memory spaces the barrier applies to, using the frontend's bit
    /// assignments.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct MemorySemantics: u32 {
        const ACQUIRE = 0x2;
        const RELEASE = 0x4;
        const ACQUIRE_RELEASE = 0x8;
        const SEQUENTIALLY_CONSISTENT = 0x10;
        const SUBGROUP_MEMORY = 0x80;
        const WORK_GROUP_MEMORY = 0x100;
        const CROSS_WORK_GROUP_MEMORY = 0x200;
        const ATOMIC_COUNTER_MEMORY = 0x400;
        const IMAGE_MEMORY = 0x800;
    }
}

impl MemorySemantics {
    /// Decode a frontend semantics word. Unknown bits are the
    /// unsupported-value error.
    pub fn from_word(word: u32) -> Result<Self, CompileError> {
        Self::from_bits(word).ok_or_else(|| {
            CompileError::internal(
                Phase::General,
                "unsupported memory semantics value",
                format!("{:#x}", word),
            )
        })
    }

    /// The applicable words in fixed enumeration order, `|`-joined.
    pub fn describe(self) -> String {
        let mut parts: Vec<&str> = Vec::new();
        if self.intersects(Self::ACQUIRE | Self::ACQUIRE_RELEASE) {
            parts.push("acquire");
        }
        if self.intersects(Self::RELEASE | Self::ACQUIRE_RELEASE) {
            parts.push("release");
        }
        if self.contains(Self::SEQUENTIALLY_CONSISTENT) {
            parts.push("sequentially consistent");
        }
        if self.contains(Self::SUBGROUP_MEMORY) {
            parts.push("sub-group");
        }
        if self.contains(Self::WORK_GROUP_MEMORY) {
            parts.push("work-group");
        }
        if self.contains(Self::CROSS_WORK_GROUP_MEMORY) {
            parts.push("global");
        }
        if self.contains(Self::ATOMIC_COUNTER_MEMORY) {
            parts.push("atomic counter");
        }
        if self.contains(Self::IMAGE_MEMORY) {
            parts.push("image");
        }
        parts.join("|")
    }
}

impl fmt::Display for MemorySemantics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::ErrorKind;

    #[test]
    fn test_semaphore_bounds() {
        assert!(Semaphore::new(0).is_ok());
        assert!(Semaphore::new(15).is_ok());
        let err = Semaphore::new(16).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Invalid);
    }

    #[test]
    fn test_direction_names() {
        assert_eq!(SemaphoreDirection::Increase.name(), "increase");
        assert_eq!(SemaphoreDirection::Decrease.name(), "decrease");
    }

    #[test]
    fn test_scope_from_word() {
        assert_eq!(MemoryScope::from_word(0).unwrap(), MemoryScope::CrossDevice);
        assert_eq!(MemoryScope::from_word(2).unwrap(), MemoryScope::WorkGroup);
        assert_eq!(MemoryScope::from_word(4).unwrap(), MemoryScope::Invocation);
    }

    #[test]
    fn test_scope_unsupported_word() {
        let err = MemoryScope::from_word(17).unwrap_err();
        assert!(err.is_internal());
        assert_eq!(format!("{}", err), "general: unsupported memory scope value: 17");
    }

    #[test]
    fn test_scope_names() {
        assert_eq!(MemoryScope::CrossDevice.name(), "global");
        assert_eq!(MemoryScope::Device.name(), "device");
        assert_eq!(MemoryScope::SubGroup.name(), "sub-group");
        assert_eq!(MemoryScope::WorkGroup.name(), "work-group");
        assert_eq!(MemoryScope::Invocation.name(), "invocation");
    }

    #[test]
    fn test_semantics_from_word() {
        let s = MemorySemantics::from_word(0x102).unwrap();
        assert_eq!(s, MemorySemantics::ACQUIRE | MemorySemantics::WORK_GROUP_MEMORY);
        assert!(MemorySemantics::from_word(0x20).is_err());
    }

    #[test]
    fn test_semantics_describe_order() {
        let s = MemorySemantics::ACQUIRE | MemorySemantics::WORK_GROUP_MEMORY;
        assert_eq!(s.describe(), "acquire|work-group");

        let s = MemorySemantics::ACQUIRE_RELEASE | MemorySemantics::IMAGE_MEMORY;
        assert_eq!(s.describe(), "acquire|release|image");

        let s = MemorySemantics::SEQUENTIALLY_CONSISTENT
            | MemorySemantics::CROSS_WORK_GROUP_MEMORY
            | MemorySemantics::ATOMIC_COUNTER_MEMORY;
        assert_eq!(s.describe(), "sequentially consistent|global|atomic counter");
    }

    #[test]
    fn test_semantics_describe_empty() {
        assert_eq!(MemorySemantics::empty().describe(), "");
    }
}
