//! Direct execution of Simple programs.
//!
//! Unlike the compiler, the interpreter works over floating-point values,
//! allows dynamic array subscripts and is not bound by the 100-cell SML
//! memory. Loading copies the source and builds an index of the byte
//! offsets of all numbered lines; running walks that index in order,
//! re-scanning each line with the lexer, until `end`, an error, or the end
//! of the program.
//!
//! There is no runaway protection at this layer; only the virtual machine
//! enforces a cycle cap.

use std::fmt;

use crate::io::InputOutput;
use crate::lexer::Lexer;
use crate::token::{Token, TokenKind};

/// Cells per array; subscripts are `0..MAX_ARRAY_SIZE`.
pub const MAX_ARRAY_SIZE: usize = 100;

/// Maximum number of indexed program lines.
pub const MAX_LINES: usize = 1000;

/// Maximum nesting depth of `for` loops.
pub const MAX_FOR_DEPTH: usize = 10;

/// Runtime errors. The rendered text is the diagnostic shown to the user;
/// any error terminates the run.
#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeError {
    LineNotFound(i32),
    UninitializedVariable(char),
    DivisionByZero,
    ModuloByZero,
    ExpectedComparison,
    InvalidInput,
    ForTooDeep,
    NextMismatch,
    NextWithoutFor,
    TooManyLines,
    ArrayIndexOutOfBounds(i64),
    Expected {
        line: i32,
        want: &'static str,
        got: &'static str,
    },
    UnknownStatement(String),
    InvalidVariable(String),
    UnexpectedToken(String),
    /// A fixed-form syntax expectation, carried verbatim.
    Syntax(&'static str),
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RuntimeError::LineNotFound(line) => write!(f, "Line {} not found", line),
            RuntimeError::UninitializedVariable(var) => {
                write!(f, "Uninitialized variable: {}", var)
            }
            RuntimeError::DivisionByZero => write!(f, "Division by zero"),
            RuntimeError::ModuloByZero => write!(f, "Modulo by zero"),
            RuntimeError::ExpectedComparison => write!(f, "Expected comparison operator"),
            RuntimeError::InvalidInput => write!(f, "Invalid input"),
            RuntimeError::ForTooDeep => write!(f, "For loop nested too deep"),
            RuntimeError::NextMismatch => write!(f, "next variable mismatch"),
            RuntimeError::NextWithoutFor => write!(f, "next without for"),
            RuntimeError::TooManyLines => write!(f, "Too many lines"),
            RuntimeError::ArrayIndexOutOfBounds(index) => {
                write!(f, "Array index out of bounds: {}", index)
            }
            RuntimeError::Expected { line, want, got } => {
                write!(f, "Line {}: Expected {}, got {}", line, want, got)
            }
            RuntimeError::UnknownStatement(text) => write!(f, "Unknown statement: {}", text),
            RuntimeError::InvalidVariable(text) => write!(f, "Invalid variable: {}", text),
            RuntimeError::UnexpectedToken(text) => {
                write!(f, "Unexpected token in expression: {}", text)
            }
            RuntimeError::Syntax(message) => f.write_str(message),
        }
    }
}

impl std::error::Error for RuntimeError {}

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

/// Values that equal their truncation print as integers; everything else
/// prints in shortest round-trip decimal form.
fn format_value(value: f64) -> String {
    if value == value.trunc() {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Scalar {
    value: f64,
    initialized: bool,
}

#[derive(Debug, Clone, Copy)]
struct ArrayVar {
    values: [f64; MAX_ARRAY_SIZE],
    initialized: bool,
}

impl Default for ArrayVar {
    fn default() -> ArrayVar {
        ArrayVar {
            values: [0.0; MAX_ARRAY_SIZE],
            initialized: false,
        }
    }
}

/// The 26 scalar slots and 26 arrays, `a` through `z`.
#[derive(Debug, Clone)]
struct VarStore {
    scalars: [Scalar; 26],
    arrays: [ArrayVar; 26],
}

impl Default for VarStore {
    fn default() -> VarStore {
        VarStore {
            scalars: [Scalar::default(); 26],
            arrays: [ArrayVar::default(); 26],
        }
    }
}

/// One entry of the source index: a line number and the byte offset of the
/// line's first non-blank character in the owned buffer.
#[derive(Debug, Clone, Copy)]
struct LineEntry {
    number: i32,
    offset: usize,
}

/// Runtime state of one active `for` loop.
#[derive(Debug, Clone, Copy)]
struct ForFrame {
    var: char,
    index: usize,
    end: f64,
    step: f64,
    /// Source-index position of the first line of the loop body.
    body_index: usize,
}

pub struct Interpreter<IO> {
    source: String,
    lines: Vec<LineEntry>,
    store: VarStore,
    io: IO,
}

impl<IO: InputOutput> Interpreter<IO> {
    pub fn new(io: IO) -> Interpreter<IO> {
        Interpreter {
            source: String::new(),
            lines: Vec::new(),
            store: VarStore::default(),
            io,
        }
    }

    /// Copies `source` and indexes every non-blank line whose first token
    /// is a line number. Lines are indexed in file order.
    pub fn load(&mut self, source: &str) -> Result<(), RuntimeError> {
        self.source = source.to_string();
        self.lines.clear();

        let bytes = source.as_bytes();
        let mut lexer = Lexer::new(source);
        let mut offset = 0;

        while offset < bytes.len() {
            while offset < bytes.len() && (bytes[offset] == b' ' || bytes[offset] == b'\t') {
                offset += 1;
            }
            if offset >= bytes.len() {
                break;
            }
            if bytes[offset] == b'\n' {
                offset += 1;
                continue;
            }

            lexer.reset(offset);
            let token = lexer.next_token();
            if matches!(token.kind, TokenKind::Number(_)) {
                if self.lines.len() >= MAX_LINES {
                    return Err(RuntimeError::TooManyLines);
                }
                self.lines.push(LineEntry {
                    number: token.value() as i32,
                    offset,
                });
            }

            while offset < bytes.len() && bytes[offset] != b'\n' {
                offset += 1;
            }
            if offset < bytes.len() {
                offset += 1;
            }
        }

        Ok(())
    }

    /// Executes the loaded program from its first indexed line.
    pub fn run(&mut self) -> Result<(), RuntimeError> {
        let Interpreter {
            source,
            lines,
            store,
            io,
        } = self;

        let mut exec = Exec {
            lexer: Lexer::new(source.as_str()),
            current: Token::default(),
            lines: lines.as_slice(),
            store,
            io,
            for_stack: Vec::new(),
            line_index: 0,
            branch: None,
            running: true,
        };
        exec.run()
    }

    /// Value of a scalar variable, if it has been assigned.
    pub fn variable(&self, name: char) -> Option<f64> {
        let index = var_index(name)? as usize;
        let scalar = self.store.scalars[index];
        if scalar.initialized {
            Some(scalar.value)
        } else {
            None
        }
    }
}

/// Execution state of one run, borrowing the interpreter's buffer and
/// store. Discarded when the run finishes.
struct Exec<'a, IO> {
    lexer: Lexer<'a>,
    current: Token,
    lines: &'a [LineEntry],
    store: &'a mut VarStore,
    io: &'a mut IO,
    for_stack: Vec<ForFrame>,
    line_index: usize,
    /// Jump target consumed by the line loop instead of falling through.
    branch: Option<usize>,
    running: bool,
}

impl<'a, IO: InputOutput> Exec<'a, IO> {
    fn run(&mut self) -> Result<(), RuntimeError> {
        while self.running && self.line_index < self.lines.len() {
            self.execute_line()?;
            self.line_index = self.branch.take().unwrap_or(self.line_index + 1);
        }
        Ok(())
    }

    fn advance(&mut self) {
        self.current = self.lexer.next_token();
    }

    fn line_number(&self) -> i32 {
        self.lines[self.line_index].number
    }

    fn expect(&mut self, want: &TokenKind) -> Result<(), RuntimeError> {
        if self.current.kind == *want {
            Ok(())
        } else {
            Err(RuntimeError::Expected {
                line: self.line_number(),
                want: want.name(),
                got: self.current.kind.name(),
            })
        }
    }

    fn find_line_index(&self, number: i32) -> Option<usize> {
        self.lines.iter().position(|entry| entry.number == number)
    }

    fn execute_line(&mut self) -> Result<(), RuntimeError> {
        let entry = self.lines[self.line_index];
        self.lexer.reset(entry.offset);
        self.advance();

        // Skip the line number.
        if matches!(self.current.kind, TokenKind::Number(_)) {
            self.advance();
        }

        match self.current.kind {
            TokenKind::Rem => Ok(()),
            TokenKind::Input => self.exec_input(),
            TokenKind::Print => self.exec_print(),
            TokenKind::Let => self.exec_let(),
            TokenKind::Goto => self.exec_goto(),
            TokenKind::If => self.exec_if(),
            TokenKind::For => self.exec_for(),
            TokenKind::Next => self.exec_next(),
            TokenKind::End => {
                self.running = false;
                Ok(())
            }
            TokenKind::Newline | TokenKind::Eof => Ok(()),
            _ => Err(RuntimeError::UnknownStatement(self.current.text.clone())),
        }
    }

    fn parse_expression(&mut self) -> Result<f64, RuntimeError> {
        let mut result = self.parse_term()?;

        while matches!(self.current.kind, TokenKind::Plus | TokenKind::Minus) {
            let operator = self.current.kind.clone();
            self.advance();
            let right = self.parse_term()?;
            if operator == TokenKind::Plus {
                result += right;
            } else {
                result -= right;
            }
        }

        Ok(result)
    }

    fn parse_term(&mut self) -> Result<f64, RuntimeError> {
        let mut result = self.parse_power()?;

        while matches!(
            self.current.kind,
            TokenKind::Star | TokenKind::Slash | TokenKind::Percent
        ) {
            let operator = self.current.kind.clone();
            self.advance();
            let right = self.parse_power()?;

            match operator {
                TokenKind::Star => result *= right,
                TokenKind::Slash => {
                    if right == 0.0 {
                        return Err(RuntimeError::DivisionByZero);
                    }
                    result /= right;
                }
                _ => {
                    if right == 0.0 {
                        return Err(RuntimeError::ModuloByZero);
                    }
                    result %= right;
                }
            }
        }

        Ok(result)
    }

    fn parse_power(&mut self) -> Result<f64, RuntimeError> {
        let result = self.parse_unary()?;

        // Right-associative: recurse instead of looping.
        if self.current.kind == TokenKind::Caret {
            self.advance();
            let right = self.parse_power()?;
            return Ok(result.powf(right));
        }

        Ok(result)
    }

    fn parse_unary(&mut self) -> Result<f64, RuntimeError> {
        if self.current.kind == TokenKind::Minus {
            self.advance();
            return Ok(-self.parse_unary()?);
        }
        if self.current.kind == TokenKind::Plus {
            self.advance();
            return self.parse_unary();
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<f64, RuntimeError> {
        match self.current.kind.clone() {
            TokenKind::Number(value) | TokenKind::Float(value) => {
                self.advance();
                Ok(value)
            }
            TokenKind::Ident => {
                let text = self.current.text.clone();
                let index = var_index(first_char(&text))
                    .ok_or(RuntimeError::InvalidVariable(text))? as usize;
                self.advance();

                if self.current.kind == TokenKind::LParen {
                    self.advance();
                    // Dynamic subscripts are allowed here; the value is
                    // rounded toward zero.
                    let subscript = self.parse_expression()? as i64;
                    self.expect(&TokenKind::RParen)?;
                    self.advance();

                    if subscript < 0 || subscript >= MAX_ARRAY_SIZE as i64 {
                        return Err(RuntimeError::ArrayIndexOutOfBounds(subscript));
                    }
                    let array = &self.store.arrays[index];
                    if !array.initialized {
                        return Err(RuntimeError::UninitializedVariable(
                            (b'a' + index as u8) as char,
                        ));
                    }
                    Ok(array.values[subscript as usize])
                } else {
                    let scalar = self.store.scalars[index];
                    if !scalar.initialized {
                        return Err(RuntimeError::UninitializedVariable(
                            (b'a' + index as u8) as char,
                        ));
                    }
                    Ok(scalar.value)
                }
            }
            TokenKind::LParen => {
                self.advance();
                let value = self.parse_expression()?;
                self.expect(&TokenKind::RParen)?;
                self.advance();
                Ok(value)
            }
            _ => Err(RuntimeError::UnexpectedToken(self.current.text.clone())),
        }
    }

    fn parse_condition(&mut self) -> Result<bool, RuntimeError> {
        let left = self.parse_expression()?;

        let operator = self.current.kind.clone();
        if !operator.is_comparison() {
            return Err(RuntimeError::ExpectedComparison);
        }
        self.advance();

        let right = self.parse_expression()?;

        // Equality on floats is deliberately exact.
        Ok(match operator {
            TokenKind::Eq => left == right,
            TokenKind::Ne => left != right,
            TokenKind::Lt => left < right,
            TokenKind::Gt => left > right,
            TokenKind::Le => left <= right,
            _ => left >= right,
        })
    }

    fn exec_input(&mut self) -> Result<(), RuntimeError> {
        self.advance();

        loop {
            if self.current.kind == TokenKind::Comma {
                self.advance();
            }

            if self.current.kind != TokenKind::Ident {
                return Err(RuntimeError::Syntax("Expected variable name after 'input'"));
            }
            let text = self.current.text.clone();
            let index =
                var_index(first_char(&text)).ok_or(RuntimeError::InvalidVariable(text))? as usize;
            self.advance();

            let subscript = if self.current.kind == TokenKind::LParen {
                self.advance();
                let value = self.parse_expression()? as i64;
                self.expect(&TokenKind::RParen)?;
                self.advance();
                Some(value)
            } else {
                None
            };

            self.io.output("? ");
            let value = self
                .io
                .input()
                .and_then(|token| token.parse::<f64>().ok())
                .ok_or(RuntimeError::InvalidInput)?;

            match subscript {
                Some(subscript) => {
                    if subscript < 0 || subscript >= MAX_ARRAY_SIZE as i64 {
                        return Err(RuntimeError::ArrayIndexOutOfBounds(subscript));
                    }
                    let array = &mut self.store.arrays[index];
                    array.values[subscript as usize] = value;
                    array.initialized = true;
                }
                None => {
                    let scalar = &mut self.store.scalars[index];
                    scalar.value = value;
                    scalar.initialized = true;
                }
            }

            if self.current.kind != TokenKind::Comma {
                break;
            }
        }

        Ok(())
    }

    fn exec_print(&mut self) -> Result<(), RuntimeError> {
        self.advance();

        let mut first = true;
        loop {
            if self.current.kind == TokenKind::Comma {
                self.advance();
                first = false;
            }

            // One space between items, none before the first.
            if !first {
                self.io.output(" ");
            }
            first = false;

            match self.current.kind {
                TokenKind::Str => {
                    let text = self.current.text.clone();
                    let content = text
                        .strip_prefix('"')
                        .and_then(|rest| rest.strip_suffix('"'))
                        .unwrap_or(&text);
                    self.io.output(content);
                    self.advance();
                }
                TokenKind::Newline | TokenKind::Eof => break,
                _ => {
                    let value = self.parse_expression()?;
                    self.io.output(&format_value(value));
                }
            }

            if self.current.kind != TokenKind::Comma {
                break;
            }
        }

        self.io.output("\n");
        Ok(())
    }

    fn exec_let(&mut self) -> Result<(), RuntimeError> {
        self.advance();

        if self.current.kind != TokenKind::Ident {
            return Err(RuntimeError::Syntax("Expected variable name after 'let'"));
        }
        let text = self.current.text.clone();
        let index =
            var_index(first_char(&text)).ok_or(RuntimeError::InvalidVariable(text))? as usize;
        self.advance();

        let subscript = if self.current.kind == TokenKind::LParen {
            self.advance();
            let value = self.parse_expression()? as i64;
            self.expect(&TokenKind::RParen)?;
            self.advance();
            Some(value)
        } else {
            None
        };

        self.expect(&TokenKind::Assign)?;
        self.advance();

        let value = self.parse_expression()?;

        match subscript {
            Some(subscript) => {
                if subscript < 0 || subscript >= MAX_ARRAY_SIZE as i64 {
                    return Err(RuntimeError::ArrayIndexOutOfBounds(subscript));
                }
                let array = &mut self.store.arrays[index];
                array.values[subscript as usize] = value;
                array.initialized = true;
            }
            None => {
                let scalar = &mut self.store.scalars[index];
                scalar.value = value;
                scalar.initialized = true;
            }
        }

        Ok(())
    }

    fn exec_goto(&mut self) -> Result<(), RuntimeError> {
        self.advance();

        let target = match self.current.kind {
            TokenKind::Number(value) => value as i32,
            _ => return Err(RuntimeError::Syntax("Expected line number after 'goto'")),
        };

        match self.find_line_index(target) {
            Some(index) => {
                self.branch = Some(index);
                Ok(())
            }
            None => Err(RuntimeError::LineNotFound(target)),
        }
    }

    fn exec_if(&mut self) -> Result<(), RuntimeError> {
        self.advance();

        let condition = self.parse_condition()?;

        if self.current.kind != TokenKind::Goto {
            return Err(RuntimeError::Syntax("Expected 'goto' in if statement"));
        }
        self.advance();

        let target = match self.current.kind {
            TokenKind::Number(value) => value as i32,
            _ => return Err(RuntimeError::Syntax("Expected line number after 'goto'")),
        };

        if condition {
            match self.find_line_index(target) {
                Some(index) => self.branch = Some(index),
                None => return Err(RuntimeError::LineNotFound(target)),
            }
        }

        Ok(())
    }

    fn exec_for(&mut self) -> Result<(), RuntimeError> {
        self.advance();

        if self.current.kind != TokenKind::Ident {
            return Err(RuntimeError::Syntax("Expected variable after 'for'"));
        }
        let loop_var = first_char(&self.current.text);
        let index = var_index(loop_var).ok_or(RuntimeError::Syntax("Invalid loop variable"))?
            as usize;
        self.advance();

        self.expect(&TokenKind::Assign)?;
        self.advance();

        let start = self.parse_expression()?;

        if self.current.kind != TokenKind::To {
            return Err(RuntimeError::Syntax("Expected 'to' in for statement"));
        }
        self.advance();

        let end = self.parse_expression()?;

        let step = if self.current.kind == TokenKind::Step {
            self.advance();
            self.parse_expression()?
        } else {
            1.0
        };

        let scalar = &mut self.store.scalars[index];
        scalar.value = start;
        scalar.initialized = true;

        let should_loop = if step > 0.0 {
            start <= end
        } else {
            start >= end
        };

        if should_loop {
            if self.for_stack.len() >= MAX_FOR_DEPTH {
                return Err(RuntimeError::ForTooDeep);
            }
            self.for_stack.push(ForFrame {
                var: loop_var,
                index,
                end,
                step,
                body_index: self.line_index + 1,
            });
        } else {
            // Skip the loop body: scan forward for the matching next,
            // honoring nested for/next pairs.
            let mut depth = 1;
            let mut scan = self.line_index + 1;
            while scan < self.lines.len() && depth > 0 {
                self.lexer.reset(self.lines[scan].offset);
                self.advance();
                if matches!(self.current.kind, TokenKind::Number(_)) {
                    self.advance();
                }

                match self.current.kind {
                    TokenKind::For => depth += 1,
                    TokenKind::Next => {
                        depth -= 1;
                        if depth == 0 {
                            self.branch = Some(scan + 1);
                            break;
                        }
                    }
                    _ => {}
                }

                scan += 1;
            }
        }

        Ok(())
    }

    fn exec_next(&mut self) -> Result<(), RuntimeError> {
        self.advance();

        if self.current.kind != TokenKind::Ident {
            return Err(RuntimeError::Syntax("Expected variable after 'next'"));
        }
        let loop_var = first_char(&self.current.text);

        let frame = match self.for_stack.last() {
            Some(frame) => *frame,
            None => return Err(RuntimeError::NextWithoutFor),
        };
        if frame.var != loop_var {
            return Err(RuntimeError::NextMismatch);
        }

        let scalar = &mut self.store.scalars[frame.index];
        scalar.value += frame.step;
        let current = scalar.value;

        let keep_going = if frame.step > 0.0 {
            current <= frame.end
        } else {
            current >= frame.end
        };

        if keep_going {
            self.branch = Some(frame.body_index);
        } else {
            self.for_stack.pop();
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::TestIo;

    fn run_program(source: &str, io: &mut TestIo) -> Result<(), RuntimeError> {
        let mut interpreter = Interpreter::new(io);
        interpreter.load(source)?;
        interpreter.run()
    }

    #[test]
    fn print_formats_integers_and_floats() {
        let mut io = TestIo::new();
        run_program(
            "10 print 42\n20 print 3.5\n30 print \"x =\", 2, 4.25\n40 print\n50 end\n",
            &mut io,
        )
        .unwrap();
        assert_eq!(io.output(), "42\n3.5\nx = 2 4.25\n\n");
    }

    #[test]
    fn uninitialized_scalar_read_fails() {
        let mut io = TestIo::new();
        let err = run_program("10 print x\n20 end\n", &mut io).unwrap_err();
        assert_eq!(err, RuntimeError::UninitializedVariable('x'));
        assert_eq!(err.to_string(), "Uninitialized variable: x");
    }

    #[test]
    fn uninitialized_array_read_fails() {
        let mut io = TestIo::new();
        let err = run_program("10 print a(0)\n20 end\n", &mut io).unwrap_err();
        assert_eq!(err, RuntimeError::UninitializedVariable('a'));
    }

    #[test]
    fn division_and_modulo_by_zero() {
        let mut io = TestIo::new();
        let err = run_program("10 let x = 1 / 0\n", &mut io).unwrap_err();
        assert_eq!(err, RuntimeError::DivisionByZero);
        assert_eq!(err.to_string(), "Division by zero");

        let mut io = TestIo::new();
        let err = run_program("10 let x = 1 % 0\n", &mut io).unwrap_err();
        assert_eq!(err, RuntimeError::ModuloByZero);
    }

    #[test]
    fn power_is_right_associative() {
        let mut io = TestIo::new();
        run_program("10 print 2 ^ 3 ^ 2\n20 end\n", &mut io).unwrap();
        assert_eq!(io.output(), "512\n");
    }

    #[test]
    fn unary_minus_chains() {
        let mut io = TestIo::new();
        run_program("10 print --5, -(2 + 1)\n20 end\n", &mut io).unwrap();
        assert_eq!(io.output(), "5 -3\n");
    }

    #[test]
    fn input_prompts_and_assigns() {
        let mut io = TestIo::with_input(vec!["3.5", "7"]);
        run_program(
            "10 input x, y\n20 print x + y\n30 end\n",
            &mut io,
        )
        .unwrap();
        assert_eq!(io.output(), "? ? 10.5\n");
    }

    #[test]
    fn input_rejects_garbage() {
        let mut io = TestIo::with_input(vec!["pony"]);
        let err = run_program("10 input x\n", &mut io).unwrap_err();
        assert_eq!(err, RuntimeError::InvalidInput);
    }

    #[test]
    fn dynamic_array_subscripts() {
        let mut io = TestIo::new();
        run_program(
            "10 let i = 3\n20 let a(i) = 7\n30 print a(i - 1 + 1)\n40 end\n",
            &mut io,
        )
        .unwrap();
        assert_eq!(io.output(), "7\n");
    }

    #[test]
    fn goto_to_missing_line_fails() {
        let mut io = TestIo::new();
        let err = run_program("10 goto 99\n20 end\n", &mut io).unwrap_err();
        assert_eq!(err, RuntimeError::LineNotFound(99));
        assert_eq!(err.to_string(), "Line 99 not found");
    }

    #[test]
    fn if_jumps_only_when_true() {
        let mut io = TestIo::new();
        run_program(
            "10 let x = 1\n20 if x == 1 goto 40\n30 print 0\n40 print 1\n50 if x > 9 goto 30\n60 end\n",
            &mut io,
        )
        .unwrap();
        assert_eq!(io.output(), "1\n");
    }

    #[test]
    fn next_without_for_fails() {
        let mut io = TestIo::new();
        let err = run_program("10 next i\n", &mut io).unwrap_err();
        assert_eq!(err, RuntimeError::NextWithoutFor);
    }

    #[test]
    fn next_variable_mismatch_fails() {
        let mut io = TestIo::new();
        let err = run_program(
            "10 for i = 1 to 3\n20 next j\n30 end\n",
            &mut io,
        )
        .unwrap_err();
        assert_eq!(err, RuntimeError::NextMismatch);
    }

    #[test]
    fn rem_skips_the_rest_of_the_line() {
        let mut io = TestIo::new();
        run_program("10 rem this ! is not lexed $%&\n20 print 1\n30 end\n", &mut io).unwrap();
        assert_eq!(io.output(), "1\n");
    }

    #[test]
    fn variables_are_case_insensitive() {
        let mut io = TestIo::new();
        run_program("10 let X = 4\n20 print x\n30 end\n", &mut io).unwrap();
        assert_eq!(io.output(), "4\n");
    }

    #[test]
    fn variables_are_observable_after_the_run() {
        let mut io = TestIo::new();
        let mut interpreter = Interpreter::new(&mut io);
        interpreter.load("10 let x = 2\n20 end\n").unwrap();
        interpreter.run().unwrap();
        assert_eq!(interpreter.variable('x'), Some(2.0));
        assert_eq!(interpreter.variable('y'), None);
        assert_eq!(interpreter.variable('?'), None);
    }
}
