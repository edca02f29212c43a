use simpletron::{
    compiler::{self, CompileError},
    image::MemoryImage,
    interpreter::{Interpreter, RuntimeError},
    io::TestIo,
    machine::{Machine, VmError},
};

fn interpret_err(source: &str) -> RuntimeError {
    let mut io = TestIo::new();
    let mut interpreter = Interpreter::new(&mut io);
    interpreter.load(source).expect("could not load the program");
    interpreter.run().expect_err("the program was expected to fail")
}

#[test]
fn test_interpreter_division_by_zero() {
    let err = interpret_err("10 let x = 1 / 0\n");
    assert_eq!(err.to_string(), "Division by zero");
}

#[test]
fn test_interpreter_reports_first_error_only() {
    // The run stops at the first error; the print must never execute.
    let mut io = TestIo::new();
    let mut interpreter = Interpreter::new(&mut io);
    interpreter
        .load("10 let x = 1 / 0\n20 print 7\n30 end\n")
        .unwrap();
    assert!(interpreter.run().is_err());
    drop(interpreter);
    assert_eq!(io.into_output(), "");
}

#[test]
fn test_interpreter_lex_errors_surface_in_expressions() {
    let err = interpret_err("10 let x = @\n");
    assert_eq!(
        err,
        RuntimeError::UnexpectedToken("Unexpected character".to_string())
    );
}

#[test]
fn test_compiler_undefined_line() {
    let err = compiler::compile("10 goto 70\n20 end\n").unwrap_err();
    assert_eq!(err, CompileError::UndefinedLine(70));
    assert_eq!(err.to_string(), "Undefined line number: 70");
}

#[test]
fn test_compiler_produces_no_image_on_error() {
    assert!(compiler::compile("10 goto 70\n20 end\n").is_err());
}

#[test]
fn test_vm_faults_carry_the_pc() {
    // LOAD 10; DIV 11 with memory[11] = 0.
    let mut image = MemoryImage::new();
    image[0] = 2010;
    image[1] = 3211;
    image[10] = 4;

    let mut machine = Machine::new(image, TestIo::new());
    let err = machine.run().unwrap_err();
    assert_eq!(err, VmError::DivisionByZero { pc: 1 });
}

#[test]
fn test_vm_rejects_malformed_image_text() {
    let err = MemoryImage::parse("+2099\nnope\n").unwrap_err();
    assert!(err.to_string().starts_with("invalid memory image"));
}

#[test]
fn test_vm_executes_image_parsed_from_text() {
    // READ into 99, WRITE it back, HALT; loader zero-fills the rest.
    let image = MemoryImage::parse("+1099\n+1199\n+1200\n+4300\n").unwrap();
    let mut io = TestIo::with_input(vec!["41"]);
    let mut machine = Machine::new(image, &mut io);
    machine.run().unwrap();
    assert_eq!(io.into_output(), "? 41\n");
}

#[test]
fn test_vm_cycle_cap_stops_runaway_images() {
    let image = MemoryImage::parse("+4000\n").unwrap();
    let mut machine = Machine::new(image, TestIo::new());
    let err = machine.run().unwrap_err();
    assert_eq!(err, VmError::CycleLimitExceeded);
    assert_eq!(
        err.to_string(),
        "Exceeded maximum cycles (100000), possible infinite loop"
    );
}

#[test]
fn test_compiler_for_nesting_limit() {
    let mut source = String::new();
    let mut line = 10;
    for var in b'a'..=b'k' {
        source.push_str(&format!("{} for {} = 1 to 2\n", line, var as char));
        line += 10;
    }
    for var in (b'a'..=b'k').rev() {
        source.push_str(&format!("{} next {}\n", line, var as char));
        line += 10;
    }
    source.push_str(&format!("{} end\n", line));

    assert_eq!(
        compiler::compile(&source).unwrap_err(),
        CompileError::ForTooDeep
    );
}

#[test]
fn test_interpreter_for_nesting_limit() {
    let mut source = String::new();
    let mut line = 10;
    for var in b'a'..=b'k' {
        source.push_str(&format!("{} for {} = 1 to 2\n", line, var as char));
        line += 10;
    }
    for var in (b'a'..=b'k').rev() {
        source.push_str(&format!("{} next {}\n", line, var as char));
        line += 10;
    }
    source.push_str(&format!("{} end\n", line));

    assert_eq!(interpret_err(&source), RuntimeError::ForTooDeep);
}
