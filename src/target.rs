//! Numeric description of the target core.
//!
//! Every constant that would otherwise be hardcoded across the encoder and
//! the lowering driver lives here. The core is a VLIW design with an add
//! and a mul pipe per instruction word, a small set of hardware semaphores
//! for inter-unit coordination, and a fixed branch latency.

/// Number of hardware semaphores on the core.
pub const SEMAPHORE_COUNT: u8 = 16;

/// Number of addressable physical registers.
pub const REGISTER_COUNT: u8 = 48;

/// Register-field sentinel meaning "no register". Occupies the top of the
/// 6-bit register field, outside the physical file.
pub const NO_REGISTER: u8 = 63;

/// Instructions already in flight when a branch takes effect. Branch
/// offsets are relative to the branch's own index plus this.
pub const BRANCH_DELAY_SLOTS: usize = 4;

/// Size of one encoded instruction word in bytes.
pub const INSTRUCTION_BYTES: usize = 8;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_fields_are_six_bits() {
        assert!(u32::from(NO_REGISTER) < (1 << 6));
        assert!(REGISTER_COUNT < NO_REGISTER);
    }

    #[test]
    fn test_semaphore_ids_are_four_bits() {
        assert!(u32::from(SEMAPHORE_COUNT) <= (1 << 4));
    }
}
