//! Input/output seam shared by the interpreter and the virtual machine.
//!
//! Both components read one whitespace-delimited token at a time and write
//! plain text. [StdIo] wires that to the terminal; [TestIo] replays a
//! prepared input list and captures the output for assertions.

use std::collections::VecDeque;
use std::io::{BufRead, Write};

/// Interface to the input and output devices.
pub trait InputOutput {
    /// Returns the next whitespace-delimited input token, or `None` when
    /// the input is exhausted.
    fn input(&mut self) -> Option<String>;

    /// Writes `text` to the output device.
    fn output(&mut self, text: &str);
}

impl<T: InputOutput + ?Sized> InputOutput for &mut T {
    fn input(&mut self) -> Option<String> {
        (**self).input()
    }

    fn output(&mut self, text: &str) {
        (**self).output(text)
    }
}

/// Terminal-backed I/O: tokens from stdin, text to stdout.
///
/// Output is flushed after every write so that prompts without a trailing
/// line feed become visible before the read blocks.
#[derive(Debug, Default)]
pub struct StdIo {
    pending: VecDeque<String>,
}

impl StdIo {
    pub fn new() -> StdIo {
        StdIo::default()
    }
}

impl InputOutput for StdIo {
    fn input(&mut self) -> Option<String> {
        loop {
            if let Some(token) = self.pending.pop_front() {
                return Some(token);
            }

            let mut line = String::new();
            match std::io::stdin().lock().read_line(&mut line) {
                Ok(0) | Err(_) => return None,
                Ok(_) => self
                    .pending
                    .extend(line.split_whitespace().map(str::to_string)),
            }
        }
    }

    fn output(&mut self, text: &str) {
        let stdout = std::io::stdout();
        let mut handle = stdout.lock();
        let _ = handle.write_all(text.as_bytes());
        let _ = handle.flush();
    }
}

/// An I/O handler for testing purposes.
///
/// Reads input tokens from a pre-determined list and appends all written
/// text to an output buffer.
#[derive(Debug, Default)]
pub struct TestIo {
    input: VecDeque<String>,
    output: String,
}

impl TestIo {
    pub fn new() -> TestIo {
        TestIo::default()
    }

    pub fn with_input<I>(input: I) -> TestIo
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        TestIo {
            input: input.into_iter().map(Into::into).collect(),
            output: String::new(),
        }
    }

    /// Everything written so far.
    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn into_output(self) -> String {
        self.output
    }
}

impl InputOutput for TestIo {
    fn input(&mut self) -> Option<String> {
        self.input.pop_front()
    }

    fn output(&mut self, text: &str) {
        self.output.push_str(text);
    }
}
