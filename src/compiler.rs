//! Two-pass compilation from Simple source to SML machine code.
//!
//! Pass one walks the source line by line, interning symbols, emitting
//! instructions into the shared code/data memory and recording a flag for
//! every branch whose target line is not yet defined. Pass two walks the
//! flag list and patches the recorded instruction words with the resolved
//! addresses. The product is a finished [MemoryImage]; the symbol table
//! and the instruction dump stay available on the compiler afterwards for
//! diagnostics.
//!
//! Instructions grow upward from address 0 and data grows downward from
//! address 99; compilation fails when the two regions would collide.
//!
//! Expression code is accumulator-centric: every emitted fragment leaves
//! its value in the accumulator, and binary operators spill both sides
//! into freshly allocated data cells before combining them. No reuse of
//! temporaries is attempted.

use std::fmt;
use std::fmt::Write as _;

use slog::{debug, o, Discard, Logger};

use crate::image::{MemoryImage, MEMORY_SIZE};
use crate::instruction::{Instruction, OpCode};
use crate::lexer::Lexer;
use crate::symbol_table::{Symbol, SymbolKey, SymbolTable};
use crate::token::{Token, TokenKind};

/// Maximum number of unresolved forward references per compilation.
pub const MAX_FLAGS: usize = 100;

/// Maximum nesting depth of `for` loops.
pub const MAX_FOR_DEPTH: usize = 10;

/// Errors reported by the compiler. The rendered text is the diagnostic
/// shown to the user.
#[derive(Debug, Clone, PartialEq)]
pub enum CompileError {
    /// Instruction and data regions collided.
    MemoryOverflow,
    SymbolTableOverflow,
    TooManyFlags,
    /// A branch targeted a line number that never appeared.
    UndefinedLine(i32),
    /// The same line number was defined twice.
    DuplicateLine(i32),
    /// SML has no indirect addressing, so array subscripts must be literal.
    ArrayIndexNotConstant,
    ArrayIndexOutOfBounds { index: i64, max: usize },
    StepNotConstant,
    ForTooDeep,
    NextWithoutFor,
    NextMismatch { expected: char, got: char },
    InvalidVariable(String),
    UnknownStatement { line: i32, text: String },
    UnexpectedToken(String),
    /// A fixed-form syntax expectation, carried verbatim.
    Syntax(&'static str),
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CompileError::MemoryOverflow => {
                write!(f, "Memory overflow: code and data collision")
            }
            CompileError::SymbolTableOverflow => write!(f, "Symbol table overflow"),
            CompileError::TooManyFlags => write!(f, "Too many unresolved references"),
            CompileError::UndefinedLine(line) => {
                write!(f, "Undefined line number: {}", line)
            }
            CompileError::DuplicateLine(line) => {
                write!(f, "Duplicate line number: {}", line)
            }
            CompileError::ArrayIndexNotConstant => {
                write!(f, "Array index must be a constant (SML limitation)")
            }
            CompileError::ArrayIndexOutOfBounds { index, max } => {
                write!(f, "Array index {} out of bounds (0-{})", index, max)
            }
            CompileError::StepNotConstant => write!(f, "Step must be a constant number"),
            CompileError::ForTooDeep => write!(f, "For loop nested too deep"),
            CompileError::NextWithoutFor => write!(f, "next without for"),
            CompileError::NextMismatch { expected, got } => write!(
                f,
                "next variable mismatch: expected '{}', got '{}'",
                expected, got
            ),
            CompileError::InvalidVariable(text) => write!(f, "Invalid variable: {}", text),
            CompileError::UnknownStatement { line, text } => {
                write!(f, "Line {}: Unknown statement: {}", line, text)
            }
            CompileError::UnexpectedToken(text) => {
                write!(f, "Unexpected token in expression: {}", text)
            }
            CompileError::Syntax(message) => f.write_str(message),
        }
    }
}

impl std::error::Error for CompileError {}

/// An unresolved forward reference: the cell to patch and the line number
/// it must end up pointing at.
#[derive(Debug, Clone, Copy)]
struct Flag {
    location: usize,
    target_line: i32,
}

/// Compilation state of one active `for` loop.
#[derive(Debug, Clone, Copy)]
struct ForFrame {
    var: char,
    var_location: usize,
    end_location: usize,
    step_location: usize,
    step_negative: bool,
    /// Instruction address of the first cell of the loop body.
    loop_start: usize,
}

fn var_index(c: char) -> Option<u8> {
    let c = c.to_ascii_lowercase();
    if c.is_ascii_lowercase() {
        Some(c as u8 - b'a')
    } else {
        None
    }
}

fn first_char(text: &str) -> char {
    text.chars().next().unwrap_or('\0')
}

/// Compiles one Simple program into a finished memory image.
pub fn compile(source: &str) -> Result<MemoryImage, CompileError> {
    Compiler::new().compile(source)
}

pub struct Compiler {
    symbols: SymbolTable,
    flags: Vec<Flag>,
    for_stack: Vec<ForFrame>,
    memory: [i32; MEMORY_SIZE],
    instruction_counter: usize,
    data_counter: usize,
    current_line: i32,
    current: Token,
    logger: Logger,
}

impl Default for Compiler {
    fn default() -> Compiler {
        Compiler::new()
    }
}

impl Compiler {
    pub fn new() -> Compiler {
        Compiler::with_logger(Logger::root(Discard, o!()))
    }

    pub fn with_logger(logger: Logger) -> Compiler {
        Compiler {
            symbols: SymbolTable::new(),
            flags: Vec::new(),
            for_stack: Vec::new(),
            memory: [0; MEMORY_SIZE],
            instruction_counter: 0,
            data_counter: MEMORY_SIZE - 1,
            current_line: 0,
            current: Token::default(),
            logger,
        }
    }

    /// Runs both passes over `source` and returns the finished image.
    pub fn compile(&mut self, source: &str) -> Result<MemoryImage, CompileError> {
        let mut lexer = Lexer::new(source);
        let bytes = source.as_bytes();
        let mut offset = 0;

        while offset < bytes.len() {
            while offset < bytes.len() && (bytes[offset] == b' ' || bytes[offset] == b'\t') {
                offset += 1;
            }

            if offset < bytes.len() && bytes[offset] != b'\n' {
                self.compile_line(&mut lexer, offset)?;
            }

            while offset < bytes.len() && bytes[offset] != b'\n' {
                offset += 1;
            }
            if offset < bytes.len() {
                offset += 1;
            }
        }

        debug!(self.logger, "pass one complete";
            "instructions" => self.instruction_counter,
            "data_cells" => MEMORY_SIZE - 1 - self.data_counter,
            "forward_refs" => self.flags.len());

        self.resolve_flags()?;

        Ok(MemoryImage::from(self.memory))
    }

    /// The symbol table built during pass one.
    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    /// Forward references still awaiting resolution. Zero after a
    /// successful compile.
    pub fn unresolved_references(&self) -> usize {
        self.flags.len()
    }

    /// Number of instruction cells emitted.
    pub fn instruction_count(&self) -> usize {
        self.instruction_counter
    }

    /// Renders the emitted instructions and the data region, one cell per
    /// line, with decoded mnemonics.
    pub fn dump_program(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "=== SML Program ===");
        let _ = writeln!(
            out,
            "Instructions (0-{}):",
            self.instruction_counter.saturating_sub(1)
        );
        for address in 0..self.instruction_counter {
            let word = self.memory[address];
            match Instruction::decode(word) {
                Some(instruction) => {
                    let _ = writeln!(out, "  {:02}: {:+05}  {}", address, word, instruction);
                }
                None => {
                    let _ = writeln!(out, "  {:02}: {:+05}  ???", address, word);
                }
            }
        }
        let _ = writeln!(out);
        let _ = writeln!(out, "Data ({}-99):", self.data_counter + 1);
        for address in (self.data_counter + 1..MEMORY_SIZE).rev() {
            let word = self.memory[address];
            let _ = write!(out, "  {:02}: {:+05}", address, word);
            if (32..127).contains(&word) {
                let _ = write!(out, "  '{}'", word as u8 as char);
            }
            let _ = writeln!(out);
        }
        out
    }

    fn advance(&mut self, lexer: &mut Lexer<'_>) {
        self.current = lexer.next_token();
    }

    /// Writes one instruction at the instruction pointer.
    fn emit(&mut self, opcode: OpCode, operand: usize) -> Result<(), CompileError> {
        if self.instruction_counter >= self.data_counter {
            return Err(CompileError::MemoryOverflow);
        }
        self.memory[self.instruction_counter] = opcode.code() * 100 + operand as i32;
        self.instruction_counter += 1;
        Ok(())
    }

    /// Hands out the current data cell and moves the data pointer down.
    fn alloc_data(&mut self) -> Result<usize, CompileError> {
        if self.data_counter <= self.instruction_counter {
            return Err(CompileError::MemoryOverflow);
        }
        let location = self.data_counter;
        self.data_counter -= 1;
        Ok(location)
    }

    fn add_symbol(
        &mut self,
        key: SymbolKey,
        location: usize,
        len: Option<usize>,
    ) -> Result<(), CompileError> {
        self.symbols
            .insert(Symbol { key, location, len })
            .map_err(|_| CompileError::SymbolTableOverflow)
    }

    fn add_flag(&mut self, location: usize, target_line: i32) -> Result<(), CompileError> {
        if self.flags.len() >= MAX_FLAGS {
            return Err(CompileError::TooManyFlags);
        }
        self.flags.push(Flag {
            location,
            target_line,
        });
        Ok(())
    }

    /// Address of a scalar variable, allocating on first use.
    fn variable(&mut self, index: u8) -> Result<usize, CompileError> {
        if let Some(symbol) = self.symbols.get(&SymbolKey::Variable(index)) {
            return Ok(symbol.location);
        }
        let location = self.alloc_data()?;
        self.add_symbol(SymbolKey::Variable(index), location, None)?;
        Ok(location)
    }

    /// Address of an integer constant, allocating and storing on first use.
    fn constant(&mut self, value: i32) -> Result<usize, CompileError> {
        if let Some(symbol) = self.symbols.get(&SymbolKey::Constant(value)) {
            return Ok(symbol.location);
        }
        let location = self.alloc_data()?;
        self.add_symbol(SymbolKey::Constant(value), location, None)?;
        self.memory[location] = value;
        Ok(location)
    }

    /// Address of the given array element. First use fixes the array size
    /// at `max(subscript + 1, 10)`; the base is the highest address of the
    /// run, so element `k` lives at `base - k`.
    fn array_element(&mut self, index: u8, subscript: i64) -> Result<usize, CompileError> {
        let (base, len) = match self.symbols.get(&SymbolKey::Array(index)) {
            Some(symbol) => (symbol.location, symbol.len.unwrap_or(0)),
            None => {
                let len = ((subscript + 1).max(10)) as usize;
                let base = self.data_counter;
                for _ in 0..len {
                    self.alloc_data()?;
                }
                self.add_symbol(SymbolKey::Array(index), base, Some(len))?;
                (base, len)
            }
        };

        if subscript < 0 || subscript as usize >= len {
            return Err(CompileError::ArrayIndexOutOfBounds {
                index: subscript,
                max: len.saturating_sub(1),
            });
        }

        Ok(base - subscript as usize)
    }

    /// Interns a string constant, storing it as `[length, chars...]` at
    /// descending addresses. `quoted` is the token text including quotes.
    fn intern_string(&mut self, quoted: &str) -> Result<usize, CompileError> {
        let content = quoted
            .strip_prefix('"')
            .and_then(|rest| rest.strip_suffix('"'))
            .unwrap_or(quoted);

        if let Some(symbol) = self.symbols.get(&SymbolKey::Str(content.to_string())) {
            return Ok(symbol.location);
        }

        let location = self.alloc_data()?;
        self.memory[location] = content.len() as i32;
        for byte in content.bytes() {
            let cell = self.alloc_data()?;
            self.memory[cell] = i32::from(byte);
        }
        self.add_symbol(SymbolKey::Str(content.to_string()), location, None)?;
        Ok(location)
    }

    /// Parses a literal array subscript: `(` NUMBER `)`.
    fn literal_subscript(&mut self, lexer: &mut Lexer<'_>) -> Result<i64, CompileError> {
        self.advance(lexer);

        let subscript = match self.current.kind {
            TokenKind::Number(value) => value as i64,
            _ => return Err(CompileError::ArrayIndexNotConstant),
        };
        self.advance(lexer);

        if self.current.kind != TokenKind::RParen {
            return Err(CompileError::Syntax("Expected ')' after array index"));
        }
        self.advance(lexer);

        Ok(subscript)
    }

    fn compile_primary(&mut self, lexer: &mut Lexer<'_>) -> Result<(), CompileError> {
        match self.current.kind.clone() {
            TokenKind::Number(value) | TokenKind::Float(value) => {
                // FLOAT literals truncate toward zero.
                let location = self.constant(value as i32)?;
                self.emit(OpCode::Load, location)?;
                self.advance(lexer);
            }
            TokenKind::Ident => {
                let text = self.current.text.clone();
                let index = var_index(first_char(&text))
                    .ok_or(CompileError::InvalidVariable(text))?;
                self.advance(lexer);

                if self.current.kind == TokenKind::LParen {
                    let subscript = self.literal_subscript(lexer)?;
                    let location = self.array_element(index, subscript)?;
                    self.emit(OpCode::Load, location)?;
                } else {
                    let location = self.variable(index)?;
                    self.emit(OpCode::Load, location)?;
                }
            }
            TokenKind::LParen => {
                self.advance(lexer);
                self.compile_expression(lexer)?;
                if self.current.kind != TokenKind::RParen {
                    return Err(CompileError::Syntax("Expected ')'"));
                }
                self.advance(lexer);
            }
            _ => {
                return Err(CompileError::UnexpectedToken(self.current.text.clone()));
            }
        }
        Ok(())
    }

    fn compile_unary(&mut self, lexer: &mut Lexer<'_>) -> Result<(), CompileError> {
        if self.current.kind == TokenKind::Minus {
            self.advance(lexer);
            self.compile_unary(lexer)?;

            // Negation is 0 - value.
            let zero = self.constant(0)?;
            let temp = self.alloc_data()?;
            self.emit(OpCode::Store, temp)?;
            self.emit(OpCode::Load, zero)?;
            self.emit(OpCode::Subtract, temp)?;
            Ok(())
        } else if self.current.kind == TokenKind::Plus {
            self.advance(lexer);
            self.compile_unary(lexer)
        } else {
            self.compile_primary(lexer)
        }
    }

    /// `^` lowers to a repeated-multiplication loop; exponents are expected
    /// to be non-negative integers.
    fn compile_power(&mut self, lexer: &mut Lexer<'_>) -> Result<(), CompileError> {
        self.compile_unary(lexer)?;

        if self.current.kind == TokenKind::Caret {
            self.advance(lexer);

            let base = self.alloc_data()?;
            self.emit(OpCode::Store, base)?;

            self.compile_unary(lexer)?;
            let exponent = self.alloc_data()?;
            self.emit(OpCode::Store, exponent)?;

            let result = self.alloc_data()?;
            let one = self.constant(1)?;
            self.emit(OpCode::Load, one)?;
            self.emit(OpCode::Store, result)?;

            let loop_start = self.instruction_counter;
            self.emit(OpCode::Load, exponent)?;
            let branch_location = self.instruction_counter;
            // Exit placeholders, patched once the loop end is known.
            self.emit(OpCode::BranchZero, 0)?;
            self.emit(OpCode::BranchNeg, 0)?;

            self.emit(OpCode::Load, result)?;
            self.emit(OpCode::Multiply, base)?;
            self.emit(OpCode::Store, result)?;

            self.emit(OpCode::Load, exponent)?;
            self.emit(OpCode::Subtract, one)?;
            self.emit(OpCode::Store, exponent)?;

            self.emit(OpCode::Branch, loop_start)?;

            let loop_end = self.instruction_counter;
            self.memory[branch_location] = OpCode::BranchZero.code() * 100 + loop_end as i32;
            self.memory[branch_location + 1] = OpCode::BranchNeg.code() * 100 + loop_end as i32;

            self.emit(OpCode::Load, result)?;
        }

        Ok(())
    }

    fn compile_term(&mut self, lexer: &mut Lexer<'_>) -> Result<(), CompileError> {
        self.compile_power(lexer)?;

        while matches!(
            self.current.kind,
            TokenKind::Star | TokenKind::Slash | TokenKind::Percent
        ) {
            let operator = self.current.kind.clone();
            self.advance(lexer);

            let left = self.alloc_data()?;
            self.emit(OpCode::Store, left)?;

            self.compile_power(lexer)?;

            let right = self.alloc_data()?;
            self.emit(OpCode::Store, right)?;
            self.emit(OpCode::Load, left)?;

            match operator {
                TokenKind::Star => self.emit(OpCode::Multiply, right)?,
                TokenKind::Slash => self.emit(OpCode::Divide, right)?,
                _ => self.emit(OpCode::Modulo, right)?,
            }
        }

        Ok(())
    }

    fn compile_expression(&mut self, lexer: &mut Lexer<'_>) -> Result<(), CompileError> {
        self.compile_term(lexer)?;

        while matches!(self.current.kind, TokenKind::Plus | TokenKind::Minus) {
            let operator = self.current.kind.clone();
            self.advance(lexer);

            let left = self.alloc_data()?;
            self.emit(OpCode::Store, left)?;

            self.compile_term(lexer)?;

            let right = self.alloc_data()?;
            self.emit(OpCode::Store, right)?;
            self.emit(OpCode::Load, left)?;

            if operator == TokenKind::Plus {
                self.emit(OpCode::Add, right)?;
            } else {
                self.emit(OpCode::Subtract, right)?;
            }
        }

        Ok(())
    }

    fn compile_input(&mut self, lexer: &mut Lexer<'_>) -> Result<(), CompileError> {
        self.advance(lexer);

        loop {
            if self.current.kind == TokenKind::Comma {
                self.advance(lexer);
            }

            if self.current.kind != TokenKind::Ident {
                return Err(CompileError::Syntax("Expected variable after 'input'"));
            }
            let text = self.current.text.clone();
            let index =
                var_index(first_char(&text)).ok_or(CompileError::InvalidVariable(text))?;

            let location = self.variable(index)?;
            self.emit(OpCode::Read, location)?;
            self.advance(lexer);

            if self.current.kind != TokenKind::Comma {
                break;
            }
        }

        Ok(())
    }

    fn compile_print(&mut self, lexer: &mut Lexer<'_>) -> Result<(), CompileError> {
        self.advance(lexer);

        if matches!(self.current.kind, TokenKind::Newline | TokenKind::Eof) {
            return self.emit(OpCode::Newline, 0);
        }

        loop {
            if self.current.kind == TokenKind::Comma {
                self.advance(lexer);
            }

            if self.current.kind == TokenKind::Str {
                let text = self.current.text.clone();
                let location = self.intern_string(&text)?;
                self.emit(OpCode::Writes, location)?;
                self.advance(lexer);
            } else if !matches!(
                self.current.kind,
                TokenKind::Newline | TokenKind::Eof | TokenKind::Comma
            ) {
                self.compile_expression(lexer)?;
                let temp = self.alloc_data()?;
                self.emit(OpCode::Store, temp)?;
                self.emit(OpCode::Write, temp)?;
            }

            if self.current.kind != TokenKind::Comma {
                break;
            }
        }

        self.emit(OpCode::Newline, 0)
    }

    fn compile_let(&mut self, lexer: &mut Lexer<'_>) -> Result<(), CompileError> {
        self.advance(lexer);

        if self.current.kind != TokenKind::Ident {
            return Err(CompileError::Syntax("Expected variable after 'let'"));
        }
        let text = self.current.text.clone();
        let index = var_index(first_char(&text)).ok_or(CompileError::InvalidVariable(text))?;
        self.advance(lexer);

        let location = if self.current.kind == TokenKind::LParen {
            let subscript = self.literal_subscript(lexer)?;
            self.array_element(index, subscript)?
        } else {
            self.variable(index)?
        };

        if self.current.kind != TokenKind::Assign {
            return Err(CompileError::Syntax("Expected '=' in let statement"));
        }
        self.advance(lexer);

        self.compile_expression(lexer)?;
        self.emit(OpCode::Store, location)
    }

    fn compile_goto(&mut self, lexer: &mut Lexer<'_>) -> Result<(), CompileError> {
        self.advance(lexer);

        let target = match self.current.kind {
            TokenKind::Number(value) => value as i32,
            _ => return Err(CompileError::Syntax("Expected line number after 'goto'")),
        };

        match self.symbols.get(&SymbolKey::Line(target)) {
            Some(symbol) => {
                let location = symbol.location;
                self.emit(OpCode::Branch, location)?;
            }
            None => {
                self.add_flag(self.instruction_counter, target)?;
                self.emit(OpCode::Branch, 0)?;
            }
        }

        self.advance(lexer);
        Ok(())
    }

    /// The machine only offers BRANCHZERO and BRANCHNEG, so every
    /// comparison lowers to sign tests on `left - right` (and, where
    /// needed, `right - left`).
    fn compile_if(&mut self, lexer: &mut Lexer<'_>) -> Result<(), CompileError> {
        self.advance(lexer);

        self.compile_expression(lexer)?;
        let left = self.alloc_data()?;
        self.emit(OpCode::Store, left)?;

        let operator = self.current.kind.clone();
        if !operator.is_comparison() {
            return Err(CompileError::Syntax(
                "Expected comparison operator in if statement",
            ));
        }
        self.advance(lexer);

        self.compile_expression(lexer)?;
        let right = self.alloc_data()?;
        self.emit(OpCode::Store, right)?;

        self.emit(OpCode::Load, left)?;
        self.emit(OpCode::Subtract, right)?;

        if self.current.kind != TokenKind::Goto {
            return Err(CompileError::Syntax("Expected 'goto' in if statement"));
        }
        self.advance(lexer);

        let target = match self.current.kind {
            TokenKind::Number(value) => value as i32,
            _ => return Err(CompileError::Syntax("Expected line number after 'goto'")),
        };

        let resolved = self
            .symbols
            .get(&SymbolKey::Line(target))
            .map(|symbol| symbol.location);
        let location = resolved.unwrap_or(0);

        match operator {
            TokenKind::Eq => {
                if resolved.is_none() {
                    self.add_flag(self.instruction_counter, target)?;
                }
                self.emit(OpCode::BranchZero, location)?;
            }
            TokenKind::Lt => {
                if resolved.is_none() {
                    self.add_flag(self.instruction_counter, target)?;
                }
                self.emit(OpCode::BranchNeg, location)?;
            }
            TokenKind::Gt => {
                self.emit(OpCode::Load, right)?;
                self.emit(OpCode::Subtract, left)?;
                if resolved.is_none() {
                    self.add_flag(self.instruction_counter, target)?;
                }
                self.emit(OpCode::BranchNeg, location)?;
            }
            TokenKind::Le => {
                if resolved.is_none() {
                    self.add_flag(self.instruction_counter, target)?;
                    self.add_flag(self.instruction_counter + 1, target)?;
                }
                self.emit(OpCode::BranchNeg, location)?;
                self.emit(OpCode::BranchZero, location)?;
            }
            TokenKind::Ge => {
                if resolved.is_none() {
                    self.add_flag(self.instruction_counter, target)?;
                }
                self.emit(OpCode::BranchZero, location)?;
                self.emit(OpCode::Load, right)?;
                self.emit(OpCode::Subtract, left)?;
                if resolved.is_none() {
                    self.add_flag(self.instruction_counter, target)?;
                }
                self.emit(OpCode::BranchNeg, location)?;
            }
            TokenKind::Ne => {
                if resolved.is_none() {
                    self.add_flag(self.instruction_counter, target)?;
                }
                self.emit(OpCode::BranchNeg, location)?;
                self.emit(OpCode::Load, right)?;
                self.emit(OpCode::Subtract, left)?;
                if resolved.is_none() {
                    self.add_flag(self.instruction_counter, target)?;
                }
                self.emit(OpCode::BranchNeg, location)?;
            }
            _ => unreachable!("operator was checked above"),
        }

        self.advance(lexer);
        Ok(())
    }

    fn compile_for(&mut self, lexer: &mut Lexer<'_>) -> Result<(), CompileError> {
        self.advance(lexer);

        if self.current.kind != TokenKind::Ident {
            return Err(CompileError::Syntax("Expected variable after 'for'"));
        }
        let loop_var = first_char(&self.current.text);
        let index = var_index(loop_var).ok_or(CompileError::Syntax("Invalid loop variable"))?;
        let var_location = self.variable(index)?;
        self.advance(lexer);

        if self.current.kind != TokenKind::Assign {
            return Err(CompileError::Syntax("Expected '=' in for statement"));
        }
        self.advance(lexer);

        self.compile_expression(lexer)?;
        self.emit(OpCode::Store, var_location)?;

        if self.current.kind != TokenKind::To {
            return Err(CompileError::Syntax("Expected 'to' in for statement"));
        }
        self.advance(lexer);

        self.compile_expression(lexer)?;
        let end_location = self.alloc_data()?;
        self.emit(OpCode::Store, end_location)?;

        let (step_location, step_negative) = if self.current.kind == TokenKind::Step {
            self.advance(lexer);

            if self.current.kind == TokenKind::Minus {
                self.advance(lexer);
                match self.current.kind {
                    TokenKind::Number(value) => {
                        let location = self.constant(-(value as i32))?;
                        self.advance(lexer);
                        (location, true)
                    }
                    _ => return Err(CompileError::StepNotConstant),
                }
            } else {
                match self.current.kind {
                    TokenKind::Number(value) => {
                        let step = value as i32;
                        let location = self.constant(step)?;
                        self.advance(lexer);
                        (location, step < 0)
                    }
                    _ => return Err(CompileError::StepNotConstant),
                }
            }
        } else {
            (self.constant(1)?, false)
        };

        if self.for_stack.len() >= MAX_FOR_DEPTH {
            return Err(CompileError::ForTooDeep);
        }
        self.for_stack.push(ForFrame {
            var: loop_var,
            var_location,
            end_location,
            step_location,
            step_negative,
            loop_start: self.instruction_counter,
        });

        Ok(())
    }

    fn compile_next(&mut self, lexer: &mut Lexer<'_>) -> Result<(), CompileError> {
        self.advance(lexer);

        if self.current.kind != TokenKind::Ident {
            return Err(CompileError::Syntax("Expected variable after 'next'"));
        }
        let loop_var = first_char(&self.current.text);
        self.advance(lexer);

        let frame = match self.for_stack.last() {
            Some(frame) => *frame,
            None => return Err(CompileError::NextWithoutFor),
        };
        if frame.var != loop_var {
            return Err(CompileError::NextMismatch {
                expected: frame.var,
                got: loop_var,
            });
        }

        // var += step
        self.emit(OpCode::Load, frame.var_location)?;
        self.emit(OpCode::Add, frame.step_location)?;
        self.emit(OpCode::Store, frame.var_location)?;

        // Continue while var is within end, in the direction of the step.
        if frame.step_negative {
            self.emit(OpCode::Load, frame.end_location)?;
            self.emit(OpCode::Subtract, frame.var_location)?;
        } else {
            self.emit(OpCode::Load, frame.var_location)?;
            self.emit(OpCode::Subtract, frame.end_location)?;
        }
        self.emit(OpCode::BranchNeg, frame.loop_start)?;
        self.emit(OpCode::BranchZero, frame.loop_start)?;

        self.for_stack.pop();
        Ok(())
    }

    fn compile_line(
        &mut self,
        lexer: &mut Lexer<'_>,
        offset: usize,
    ) -> Result<(), CompileError> {
        lexer.reset(offset);
        self.advance(lexer);

        // Lines that do not begin with a line number are not statements.
        let number = match self.current.kind {
            TokenKind::Number(value) => value as i32,
            _ => return Ok(()),
        };
        self.current_line = number;

        if self.symbols.get(&SymbolKey::Line(number)).is_some() {
            return Err(CompileError::DuplicateLine(number));
        }
        self.add_symbol(SymbolKey::Line(number), self.instruction_counter, None)?;

        self.advance(lexer);

        match self.current.kind {
            TokenKind::Rem => Ok(()),
            TokenKind::Input => self.compile_input(lexer),
            TokenKind::Print => self.compile_print(lexer),
            TokenKind::Let => self.compile_let(lexer),
            TokenKind::Goto => self.compile_goto(lexer),
            TokenKind::If => self.compile_if(lexer),
            TokenKind::For => self.compile_for(lexer),
            TokenKind::Next => self.compile_next(lexer),
            TokenKind::End => self.emit(OpCode::Halt, 0),
            TokenKind::Newline | TokenKind::Eof => Ok(()),
            _ => Err(CompileError::UnknownStatement {
                line: self.current_line,
                text: self.current.text.clone(),
            }),
        }
    }

    /// Pass two: patch every recorded branch with the now-known address of
    /// its target line, preserving the opcode digits.
    fn resolve_flags(&mut self) -> Result<(), CompileError> {
        let flags = std::mem::take(&mut self.flags);

        for flag in &flags {
            let location = self
                .symbols
                .get(&SymbolKey::Line(flag.target_line))
                .ok_or(CompileError::UndefinedLine(flag.target_line))?
                .location;

            let word = self.memory[flag.location];
            self.memory[flag.location] = (word / 100) * 100 + location as i32;
        }

        debug!(self.logger, "resolved forward references"; "count" => flags.len());
        Ok(())
    }
}
