//! A Virtual Machine for RV64IM
//!
//! The [`VM`] owns the program image and a private stack, and borrows an
//! optional host buffer as data memory. The host seeds argument registers,
//! runs [`VM::execute_program`], and reads results back out of registers
//! and the stack. All machine state survives across execute calls, so one
//! image can be invoked repeatedly.

use std::fmt::Write as _;
use std::fmt::{Display, Formatter};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, VMError};
use crate::eval::eval_inst;
use crate::memory::{MemMap, Width};

/// Upper bound on the program image size (1 MiB).
pub const PROGRAM_SIZE_LIMIT: usize = 1024 * 1024;

/// Default per-execute instruction budget.
pub const DEFAULT_INSTRUCTION_BUDGET: u64 = 100_000;

/// ISA defined registers
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Regs {
    /// ISA defined program counter register
    pub pc: u64,
    /// ISA defined registers x0-x31
    pub x: [u64; 32],
}

impl Display for Regs {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "pc: {:x}", self.pc)?;
        for (i, x) in self.x.iter().enumerate() {
            write!(f, "  x{i:02}: {x:16x}")?;
            if (i % 4) == 3 {
                writeln!(f)?;
            }
        }
        Ok(())
    }
}

/// A plain value that can travel through the VM stack.
pub trait StackValue: Copy {
    /// access width of the stack slot
    const WIDTH: Width;

    fn to_bits(self) -> u64;
    fn from_bits(bits: u64) -> Self;
}

macro_rules! stack_value {
    ($t:ty, $w:expr) => {
        impl StackValue for $t {
            const WIDTH: Width = $w;

            fn to_bits(self) -> u64 {
                self as u64
            }

            fn from_bits(bits: u64) -> Self {
                bits as $t
            }
        }
    };
}

stack_value!(u8, Width::B);
stack_value!(u16, Width::H);
stack_value!(u32, Width::W);
stack_value!(u64, Width::D);
stack_value!(i8, Width::B);
stack_value!(i16, Width::H);
stack_value!(i32, Width::W);
stack_value!(i64, Width::D);

/// virtual machine state
pub struct VM<'m> {
    /// ISA registers
    pub regs: Regs,
    /// machine memory
    pub(crate) mem: MemMap<'m>,
    /// program image, an array of little-endian instruction words
    program: Vec<u8>,
    /// set by EBREAK, checked between fetches
    pub(crate) halted: bool,
    /// per-execute instruction budget
    max_instructions: u64,
    /// instructions executed by the last execute call
    count: u64,
}

impl<'m> VM<'m> {
    /// create a VM with a private stack of `stack_size` bytes
    pub fn new(stack_size: usize) -> Self {
        Self {
            regs: Regs::default(),
            mem: MemMap::new(stack_size),
            program: Vec::new(),
            halted: false,
            max_instructions: DEFAULT_INSTRUCTION_BUDGET,
            count: 0,
        }
    }

    /// set the per-execute instruction budget
    pub fn with_instruction_budget(mut self, limit: u64) -> Self {
        self.max_instructions = limit;
        self
    }

    /// get value of register r; indices outside x0-x31 are rejected
    pub fn register_get(&self, r: u32) -> Result<u64> {
        if r >= 32 {
            return Err(VMError::BadRegister(r));
        }
        Ok(self.get_reg(r))
    }

    /// set value of register r; writes to x0 are silently ignored
    pub fn register_set(&mut self, r: u32, val: u64) -> Result<()> {
        if r >= 32 {
            return Err(VMError::BadRegister(r));
        }
        self.set_reg(r, val);
        Ok(())
    }

    /// get value of register r
    pub(crate) fn get_reg(&self, r: u32) -> u64 {
        if r == 0 {
            0
        } else {
            self.regs.x[r as usize]
        }
    }

    /// set value of register r
    pub(crate) fn set_reg(&mut self, r: u32, val: u64) {
        if r != 0 {
            self.regs.x[r as usize] = val;
        }
    }

    /// attach a host buffer as the data region; returns its guest base (0)
    ///
    /// The buffer must stay alive across any execute call that uses it; it
    /// can be re-mapped between runs.
    pub fn map_data(&mut self, buf: &'m mut [u8]) -> u64 {
        debug!(len = buf.len(), "data memory mapped");
        self.mem.map_data(buf)
    }

    /// read-only view of the stack bytes
    pub fn stack_bytes(&self) -> &[u8] {
        self.mem.stack_bytes()
    }

    /// push a value onto the guest stack, moving x2 down; returns the guest
    /// address of the new slot
    pub fn stack_push<T: StackValue>(&mut self, val: T) -> Result<u64> {
        let sp = self.get_reg(2).wrapping_sub(T::WIDTH as u64);
        self.mem.store(T::WIDTH, sp, val.to_bits())?;
        self.set_reg(2, sp);
        Ok(sp)
    }

    /// pop a value off the guest stack, moving x2 up
    pub fn stack_pop<T: StackValue>(&mut self) -> Result<T> {
        let sp = self.get_reg(2);
        let bits = self.mem.load(T::WIDTH, sp)?;
        self.set_reg(2, sp.wrapping_add(T::WIDTH as u64));
        Ok(T::from_bits(bits))
    }

    /// load a program image from a byte slice, replacing any prior image,
    /// and validate it
    pub fn load_program(&mut self, bytes: &[u8]) -> Result<()> {
        if bytes.len() > PROGRAM_SIZE_LIMIT {
            return Err(VMError::ProgramTooLarge(bytes.len()));
        }
        self.program = bytes.to_vec();
        debug!(len = bytes.len(), "program loaded");
        self.validate_program()
    }

    /// load a program image from a file
    pub fn load_program_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let bytes = std::fs::read(path)?;
        self.load_program(&bytes)
    }

    /// fetch the instruction word at `pc`
    pub(crate) fn fetch(&self, pc: u64) -> Result<u32> {
        let end = pc
            .checked_add(4)
            .filter(|&end| end <= self.program.len() as u64)
            .ok_or(VMError::OutOfBounds(pc, 4))?;
        let mut word = [0u8; 4];
        word.copy_from_slice(&self.program[pc as usize..end as usize]);
        Ok(u32::from_le_bytes(word))
    }

    // Dry-run every aligned word of the image through the same dispatch
    // used at runtime, with memory detached so loads and stores are
    // guaranteed to fault; those faults are discarded, and only decode
    // failures are structural errors. Register and pc effects of the dry
    // run are wiped afterwards.
    fn validate_program(&mut self) -> Result<()> {
        let mem = std::mem::replace(&mut self.mem, MemMap::new(0));
        let mut errs = String::new();

        let mut pc = 0u64;
        while pc + 4 <= self.program.len() as u64 {
            self.regs.pc = pc;
            match eval_inst(self) {
                Err(e @ (VMError::UnknownOpcode(..) | VMError::UnknownFunct(..))) => {
                    let _ = writeln!(errs, "{e}");
                }
                _ => {}
            }
            pc += 4;
        }

        self.mem = mem;
        self.regs = Regs::default();
        self.regs.x[2] = self.mem.limit();
        self.halted = false;

        if errs.is_empty() {
            Ok(())
        } else {
            Err(VMError::InvalidProgram(errs))
        }
    }

    /// run the loaded program from offset 0
    pub fn execute_program(&mut self) -> Result<()> {
        self.execute_program_from(0)
    }

    /// run the loaded program from `entry` until EBREAK, the end of the
    /// image, a fault, or budget exhaustion
    pub fn execute_program_from(&mut self, entry: u64) -> Result<()> {
        if !self.mem.has_data() {
            return Err(VMError::NoDataMemory);
        }

        self.regs.pc = entry;
        self.halted = false;
        self.count = 0;
        // x2 - stack pointer (sp)
        self.regs.x[2] = self.mem.limit();

        while !self.halted && self.in_program(self.regs.pc) {
            if self.count == self.max_instructions {
                return Err(VMError::InstructionBudgetExceeded(self.max_instructions));
            }
            self.count += 1;
            eval_inst(self)?;
        }
        debug!(
            count = self.count,
            pc = self.regs.pc,
            halted = self.halted,
            "execution finished"
        );
        Ok(())
    }

    // whether a full instruction word exists at `pc`
    fn in_program(&self, pc: u64) -> bool {
        pc.checked_add(4)
            .is_some_and(|end| end <= self.program.len() as u64)
    }

    /// the halt flag (set by EBREAK)
    pub fn halted(&self) -> bool {
        self.halted
    }

    /// instructions executed by the last execute call
    pub fn instruction_count(&self) -> u64 {
        self.count
    }
}
