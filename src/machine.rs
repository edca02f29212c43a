//! Virtual machine executing SML memory images.
//!
//! The machine is a classic accumulator design: one working register, a
//! program counter, and a fetch-decode-execute loop over the 100-cell
//! memory it owns. Instructions and data share that memory. Execution
//! stops on `HALT`, on a fault, or when the cycle cap is reached.

use std::fmt::Write as _;

use slog::{debug, o, trace, Discard, Logger};

use crate::image::{MemoryImage, MEMORY_SIZE};
use crate::instruction::OpCode;
use crate::io::InputOutput;

/// Cycle cap: a run that has not halted after this many instructions is
/// treated as a runaway and faulted.
pub const MAX_CYCLES: u32 = 100_000;

/// Faults raised while executing. The rendered text is the diagnostic
/// shown to the user.
#[derive(Debug, Clone, PartialEq)]
pub enum VmError {
    InvalidProgramCounter(i32),
    InvalidOperand { operand: i32, pc: i32 },
    UnknownOpcode { opcode: i32, pc: i32 },
    DivisionByZero { pc: i32 },
    ModuloByZero { pc: i32 },
    InvalidInput,
    CycleLimitExceeded,
}

impl std::fmt::Display for VmError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            VmError::InvalidProgramCounter(pc) => {
                write!(f, "Invalid instruction counter: {}", pc)
            }
            VmError::InvalidOperand { operand, pc } => {
                write!(f, "Invalid operand: {} at PC={}", operand, pc)
            }
            VmError::UnknownOpcode { opcode, pc } => {
                write!(f, "Unknown opcode {} at PC={}", opcode, pc)
            }
            VmError::DivisionByZero { pc } => write!(f, "Division by zero at PC={}", pc),
            VmError::ModuloByZero { pc } => write!(f, "Modulo by zero at PC={}", pc),
            VmError::InvalidInput => write!(f, "Invalid input"),
            VmError::CycleLimitExceeded => write!(
                f,
                "Exceeded maximum cycles ({}), possible infinite loop",
                MAX_CYCLES
            ),
        }
    }
}

impl std::error::Error for VmError {}

/// The machine: registers plus the memory image it was loaded with.
pub struct Machine<IO> {
    memory: MemoryImage,
    accumulator: i32,
    /// Program counter.
    pc: i32,
    /// Instruction register: the word fetched this cycle.
    ir: i32,
    opcode: i32,
    operand: i32,
    cycles: u32,
    running: bool,
    io: IO,
    logger: Logger,
}

impl<IO: InputOutput> Machine<IO> {
    /// Loads `image` into a fresh machine. The machine owns the image from
    /// here on; `STORE` writes straight into it.
    pub fn new(image: MemoryImage, io: IO) -> Machine<IO> {
        Machine::with_logger(image, io, Logger::root(Discard, o!()))
    }

    pub fn with_logger(image: MemoryImage, io: IO, logger: Logger) -> Machine<IO> {
        Machine {
            memory: image,
            accumulator: 0,
            pc: 0,
            ir: 0,
            opcode: 0,
            operand: 0,
            cycles: 0,
            running: true,
            io,
            logger,
        }
    }

    pub fn accumulator(&self) -> i32 {
        self.accumulator
    }

    pub fn pc(&self) -> i32 {
        self.pc
    }

    pub fn cycles(&self) -> u32 {
        self.cycles
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn memory(&self) -> &MemoryImage {
        &self.memory
    }

    /// Executes one fetch-decode-execute cycle. A fault stops the machine
    /// and is returned; calling step on a stopped machine does nothing.
    pub fn step(&mut self) -> Result<(), VmError> {
        if !self.running {
            return Ok(());
        }

        if self.pc < 0 || self.pc >= MEMORY_SIZE as i32 {
            self.running = false;
            return Err(VmError::InvalidProgramCounter(self.pc));
        }

        self.ir = self.memory[self.pc as usize];
        // Truncating division: for a negative word the opcode comes out
        // negative and falls through to the unknown-opcode fault.
        self.opcode = self.ir / 100;
        self.operand = self.ir % 100;

        if self.operand < 0 || self.operand >= MEMORY_SIZE as i32 {
            self.running = false;
            return Err(VmError::InvalidOperand {
                operand: self.operand,
                pc: self.pc,
            });
        }

        trace!(self.logger, "cycle"; "pc" => self.pc, "ir" => self.ir);

        let operand = self.operand as usize;
        let mut next_pc = self.pc + 1;

        match OpCode::from_code(self.opcode) {
            Some(OpCode::Read) => {
                self.io.output("? ");
                let value = match self.io.input().and_then(|token| token.parse::<i32>().ok()) {
                    Some(value) => value,
                    None => {
                        self.running = false;
                        return Err(VmError::InvalidInput);
                    }
                };
                self.memory[operand] = value;
            }
            Some(OpCode::Write) => {
                self.io.output(&self.memory[operand].to_string());
            }
            Some(OpCode::Newline) => {
                self.io.output("\n");
            }
            Some(OpCode::Writes) => {
                // [length, char1, char2, ...] at descending addresses.
                let length = self.memory[operand];
                let mut text = String::new();
                for offset in 0..length.max(0) {
                    let address = operand as i32 - 1 - offset;
                    if address < 0 {
                        break;
                    }
                    let word = self.memory[address as usize];
                    // Cells outside the byte range are dropped.
                    if (0..256).contains(&word) {
                        text.push(word as u8 as char);
                    }
                }
                self.io.output(&text);
            }

            Some(OpCode::Load) => {
                self.accumulator = self.memory[operand];
            }
            Some(OpCode::Store) => {
                self.memory[operand] = self.accumulator;
            }

            Some(OpCode::Add) => {
                self.accumulator = self.accumulator.wrapping_add(self.memory[operand]);
            }
            Some(OpCode::Subtract) => {
                self.accumulator = self.accumulator.wrapping_sub(self.memory[operand]);
            }
            Some(OpCode::Divide) => {
                if self.memory[operand] == 0 {
                    self.running = false;
                    return Err(VmError::DivisionByZero { pc: self.pc });
                }
                self.accumulator = self.accumulator.wrapping_div(self.memory[operand]);
            }
            Some(OpCode::Multiply) => {
                self.accumulator = self.accumulator.wrapping_mul(self.memory[operand]);
            }
            Some(OpCode::Modulo) => {
                if self.memory[operand] == 0 {
                    self.running = false;
                    return Err(VmError::ModuloByZero { pc: self.pc });
                }
                self.accumulator = self.accumulator.wrapping_rem(self.memory[operand]);
            }

            Some(OpCode::Branch) => {
                next_pc = self.operand;
            }
            Some(OpCode::BranchNeg) => {
                if self.accumulator < 0 {
                    next_pc = self.operand;
                }
            }
            Some(OpCode::BranchZero) => {
                if self.accumulator == 0 {
                    next_pc = self.operand;
                }
            }
            Some(OpCode::Halt) => {
                debug!(self.logger, "halted"; "cycles" => self.cycles + 1);
                self.running = false;
            }

            None => {
                self.running = false;
                return Err(VmError::UnknownOpcode {
                    opcode: self.opcode,
                    pc: self.pc,
                });
            }
        }

        self.pc = next_pc;
        self.cycles += 1;

        if self.running && self.cycles >= MAX_CYCLES {
            self.running = false;
            return Err(VmError::CycleLimitExceeded);
        }

        Ok(())
    }

    /// Runs until `HALT`, a fault, or the cycle cap.
    pub fn run(&mut self) -> Result<(), VmError> {
        while self.running {
            self.step()?;
        }
        Ok(())
    }

    /// Renders the register state.
    pub fn dump_registers(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "=== Registers ===");
        let _ = writeln!(out, "  Accumulator:          {:+05}", self.accumulator);
        let _ = writeln!(out, "  Instruction Counter:  {:02}", self.pc);
        let _ = writeln!(out, "  Instruction Register: {:+05}", self.ir);
        let _ = writeln!(out, "  Opcode:               {:02}", self.opcode);
        let _ = writeln!(out, "  Operand:              {:02}", self.operand);
        let _ = writeln!(out, "  Cycle Count:          {}", self.cycles);
        out
    }

    /// Renders the memory as a 10x10 grid.
    pub fn dump_memory(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "=== Memory ===");
        let _ = write!(out, "    ");
        for column in 0..10 {
            let _ = write!(out, "{:>6} ", column);
        }
        let _ = writeln!(out);
        for row in (0..MEMORY_SIZE).step_by(10) {
            let _ = write!(out, "{:2} ", row);
            for column in 0..10 {
                let _ = write!(out, "{:+05}  ", self.memory[row + column]);
            }
            let _ = writeln!(out);
        }
        out
    }
}
