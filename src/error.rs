use thiserror::Error;

/// Errors related to VM initialization and execution
#[derive(Debug, Error)]
pub enum VMError {
    /// program image rejected by the pre-execution validator
    #[error("invalid program:\n{0}")]
    InvalidProgram(String),

    /// program image exceeds the 1 MiB cap
    #[error("program too large: {0} bytes")]
    ProgramTooLarge(usize),

    /// the backing source for a program image could not be read
    #[error("failed to read program: {0}")]
    LoadFailed(#[from] std::io::Error),

    /// register index outside x0-x31
    #[error("invalid register number x{0}")]
    BadRegister(u32),

    /// execute called with no data region attached
    #[error("no data memory mapped for execution")]
    NoDataMemory,

    /// instruction word with an unrecognized opcode
    #[error("unknown opcode in instruction {1:#010x} at pc:{0:#x}")]
    UnknownOpcode(u64, u32),

    /// instruction word with an unrecognized funct3/funct7 combination
    #[error("unknown funct in instruction {1:#010x} at pc:{0:#x}")]
    UnknownFunct(u64, u32),

    /// memory access outside the data+stack span, or straddling the seam
    #[error("memory access out of bounds: {1} bytes at {0:#x}")]
    OutOfBounds(u64, usize),

    /// per-execute instruction budget exhausted
    #[error("maximum instruction count exceeded ({0})")]
    InstructionBudgetExceeded(u64),

    /// named test machine does not exist
    #[error("unknown test machine: {0}")]
    UnknownMachine(String),
}

/// Result type for VM functions that can produce errors
pub type Result<T, E = VMError> = std::result::Result<T, E>;
