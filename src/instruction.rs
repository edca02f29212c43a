//! Types for representing SML instructions and their encoding.
//!
//! An instruction word is a signed decimal integer `±XXYY` decomposed as
//! `sign × (opcode × 100 + operand)`. Operands are always memory addresses
//! in `0..100`. Negative words are legal memory contents (negative
//! constants stored as data); decoded as instructions they do not match any
//! opcode and fault as unknown.

use std::fmt;

/// Opcodes of the SML accumulator machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpCode {
    /// Read an integer from the input device into a memory cell.
    Read,
    /// Write the value of a memory cell to the output device.
    Write,
    /// Write a line feed to the output device.
    Newline,
    /// Write a length-prefixed string stored at descending addresses.
    Writes,

    /// Copy a memory cell into the accumulator.
    Load,
    /// Copy the accumulator into a memory cell.
    Store,

    /// Add a memory cell to the accumulator.
    Add,
    /// Subtract a memory cell from the accumulator.
    Subtract,
    /// Divide the accumulator by a memory cell (integer division).
    Divide,
    /// Multiply the accumulator by a memory cell.
    Multiply,
    /// Reduce the accumulator modulo a memory cell.
    Modulo,

    /// Unconditional jump.
    Branch,
    /// Jump if the accumulator is negative.
    BranchNeg,
    /// Jump if the accumulator is zero.
    BranchZero,
    /// Stop execution.
    Halt,
}

impl OpCode {
    /// The two-digit operation code of the instruction word.
    pub fn code(self) -> i32 {
        match self {
            OpCode::Read => 10,
            OpCode::Write => 11,
            OpCode::Newline => 12,
            OpCode::Writes => 13,
            OpCode::Load => 20,
            OpCode::Store => 21,
            OpCode::Add => 30,
            OpCode::Subtract => 31,
            OpCode::Divide => 32,
            OpCode::Multiply => 33,
            OpCode::Modulo => 34,
            OpCode::Branch => 40,
            OpCode::BranchNeg => 41,
            OpCode::BranchZero => 42,
            OpCode::Halt => 43,
        }
    }

    /// Decodes a two-digit operation code. Anything outside the instruction
    /// set (including every negative code) is `None`.
    pub fn from_code(code: i32) -> Option<OpCode> {
        match code {
            10 => Some(OpCode::Read),
            11 => Some(OpCode::Write),
            12 => Some(OpCode::Newline),
            13 => Some(OpCode::Writes),
            20 => Some(OpCode::Load),
            21 => Some(OpCode::Store),
            30 => Some(OpCode::Add),
            31 => Some(OpCode::Subtract),
            32 => Some(OpCode::Divide),
            33 => Some(OpCode::Multiply),
            34 => Some(OpCode::Modulo),
            40 => Some(OpCode::Branch),
            41 => Some(OpCode::BranchNeg),
            42 => Some(OpCode::BranchZero),
            43 => Some(OpCode::Halt),
            _ => None,
        }
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            OpCode::Read => "READ",
            OpCode::Write => "WRITE",
            OpCode::Newline => "NEWLINE",
            OpCode::Writes => "WRITES",
            OpCode::Load => "LOAD",
            OpCode::Store => "STORE",
            OpCode::Add => "ADD",
            OpCode::Subtract => "SUB",
            OpCode::Divide => "DIV",
            OpCode::Multiply => "MUL",
            OpCode::Modulo => "MOD",
            OpCode::Branch => "JMP",
            OpCode::BranchNeg => "JMPNEG",
            OpCode::BranchZero => "JMPZERO",
            OpCode::Halt => "HALT",
        })
    }
}

/// A decoded instruction: opcode plus memory-address operand.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Instruction {
    pub opcode: OpCode,
    /// Operand in `0..100`.
    pub operand: u8,
}

impl Instruction {
    /// Encodes the instruction into its positive word form.
    pub fn encode(self) -> i32 {
        self.opcode.code() * 100 + i32::from(self.operand)
    }

    /// Decodes a memory word. `None` when the word does not name a legal
    /// opcode or its operand falls outside the address space.
    pub fn decode(word: i32) -> Option<Instruction> {
        let operand = word % 100;
        if !(0..100).contains(&operand) {
            return None;
        }
        OpCode::from_code(word / 100).map(|opcode| Instruction {
            opcode,
            operand: operand as u8,
        })
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:<8}{:02}", self.opcode.to_string(), self.operand)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode() {
        let load = Instruction {
            opcode: OpCode::Load,
            operand: 99,
        };
        assert_eq!(load.encode(), 2099);
        assert_eq!(Instruction::decode(2099), Some(load));

        assert_eq!(
            Instruction::decode(4300),
            Some(Instruction {
                opcode: OpCode::Halt,
                operand: 0
            })
        );
    }

    #[test]
    fn negative_words_do_not_decode() {
        assert_eq!(Instruction::decode(-7), None);
        assert_eq!(Instruction::decode(-2050), None);
    }

    #[test]
    fn out_of_set_opcodes_do_not_decode() {
        assert_eq!(Instruction::decode(9912), None);
        assert_eq!(Instruction::decode(50), None);
    }

    #[test]
    fn mnemonics_render_for_dumps() {
        let load = Instruction {
            opcode: OpCode::Load,
            operand: 99,
        };
        assert_eq!(load.to_string(), "LOAD    99");
        assert_eq!(OpCode::BranchZero.to_string(), "JMPZERO");
    }
}
