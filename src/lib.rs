//! An embeddable virtual machine for RV64IM user-mode code
//!
//! The VM executes flat binaries of little-endian RV64IM instruction words
//! against a caller-supplied data region and a private stack, using the
//! standard integer ABI (x2 is the stack pointer, x10-x17 carry arguments
//! and results). Guest programs signal completion with EBREAK; running off
//! the end of the image is also a benign termination.
//!
//! Guest data addresses start at 0 in the mapped host buffer and continue
//! into the stack directly above it. Loading a program statically
//! validates every instruction word before it can run.
//!
//! ```no_run
//! use rv64vm::VM;
//!
//! fn main() -> rv64vm::Result<()> {
//!     let mut data = vec![0u8; 4096];
//!     let mut vm = VM::new(4096);
//!     vm.load_program_file("program.rv64")?;
//!     vm.map_data(&mut data);
//!     vm.register_set(10, 7)?; // a0: first argument
//!     vm.execute_program()?;
//!     println!("result: {}", vm.register_get(10)?);
//!     Ok(())
//! }
//! ```

#![allow(non_snake_case)]
#![allow(clippy::needless_range_loop)]

mod error;
mod eval;
pub mod machines;
pub mod memory;
pub mod rv64;
pub mod vm;

use clap::{ArgGroup, Args};

pub use error::{Result, VMError};
pub use vm::{Regs, StackValue, VM, DEFAULT_INSTRUCTION_BUDGET, PROGRAM_SIZE_LIMIT};

/// A structure describing a VM to load.
/// This structure can be used with clap.
///
/// Exactly one program source is accepted: a flat binary file or a named
/// test machine.
#[derive(Debug, Args)]
#[command(group(ArgGroup::new("vm").required(true).multiple(false)))]
pub struct VMOpts {
    /// Stack size in bytes
    #[arg(long, default_value = "4096")]
    pub stack_size: usize,

    /// Data memory size in bytes
    #[arg(long, default_value = "4096")]
    pub data_size: usize,

    /// Maximum instructions to execute
    #[arg(long, default_value = "100000")]
    pub budget: u64,

    /// Entry point offset into the program
    #[arg(long, default_value = "0")]
    pub entry: u64,

    /// Use a named test machine
    #[arg(group = "vm", long)]
    pub machine: Option<String>,

    /// Input file, flat RV64IM binary
    #[arg(group = "vm")]
    pub file: Option<std::path::PathBuf>,
}

/// Load and run the VM described by `opts`; returns the final register file.
pub fn run_vm(opts: &VMOpts) -> Result<Regs> {
    let mut data = vec![0u8; opts.data_size];
    let mut vm = VM::new(opts.stack_size).with_instruction_budget(opts.budget);

    if let Some(m) = &opts.machine {
        let code =
            machines::lookup_test_code(m).ok_or_else(|| VMError::UnknownMachine(m.clone()))?;
        vm.load_program(&machines::assemble(&code))?;
    } else {
        // clap guarantees a file when no machine is named
        vm.load_program_file(opts.file.as_ref().unwrap())?;
    }

    vm.map_data(&mut data);
    vm.execute_program_from(opts.entry)?;
    Ok(vm.regs.clone())
}
