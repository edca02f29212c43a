//! A crate for the Simple language and the SML accumulator machine used in
//! teaching compiler construction.
//!
//! Simple is a tiny line-numbered BASIC-like language with eleven
//! statements (`rem`, `input`, `print`, `let`, `goto`, `if`, `for`, `to`,
//! `step`, `next`, `end`). This crate provides the full toolchain:
//!
//! - Scan Simple source into tokens ([lexer]).
//! - Execute source directly with floating-point semantics and dynamic
//!   array subscripts ([interpreter]).
//! - Compile source in two passes into a 100-cell SML memory image
//!   ([compiler]), resolving forward `goto` references after pass one.
//! - Read and write the textual `.sml` image format ([image]).
//! - Execute an image on the accumulator machine ([machine]).
//!
//! # Example
//!
//! ```
//! use simpletron::{compiler, io::TestIo, machine::Machine};
//!
//! let source = "\
//! 10 let s = 0
//! 20 for i = 1 to 5
//! 30 let s = s + i
//! 40 next i
//! 50 print s
//! 60 end
//! ";
//!
//! // Translate the program into a memory image.
//! let image = compiler::compile(source).expect("compilation failed");
//!
//! // Load the image into a machine wired to a test I/O device.
//! let mut io = TestIo::new();
//! let mut machine = Machine::new(image, &mut io);
//! machine.run().expect("execution failed");
//!
//! assert_eq!(io.output(), "15\n");
//! ```

pub mod compiler;
pub mod image;
pub mod instruction;
pub mod interpreter;
pub mod io;
pub mod lexer;
pub mod machine;
pub mod symbol_table;
pub mod token;
