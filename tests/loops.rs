use simpletron::{compiler, interpreter::Interpreter, io::TestIo, machine::Machine};

fn interpret(source: &str, io: &mut TestIo) {
    let mut interpreter = Interpreter::new(io);
    interpreter.load(source).expect("could not load the program");
    interpreter.run().expect("an error occurred while interpreting");
}

#[test]
fn test_nested_loops_interpreted() {
    let mut io = TestIo::new();
    interpret(include_str!("nested.simple"), &mut io);
    // 1*1 + 1*2 + 2*1 + 2*2 + 3*1 + 3*2
    assert_eq!(io.into_output(), "18\n");
}

#[test]
fn test_nested_loops_compiled() {
    let image = compiler::compile(include_str!("nested.simple")).unwrap();
    let mut io = TestIo::new();
    let mut machine = Machine::new(image, &mut io);
    machine.run().unwrap();
    assert_eq!(io.into_output(), "18\n");
}

#[test]
fn test_countdown_interpreted() {
    let mut io = TestIo::new();
    interpret(include_str!("countdown.simple"), &mut io);
    assert_eq!(io.into_output(), "3\n2\n1\n");
}

#[test]
fn test_countdown_compiled() {
    let image = compiler::compile(include_str!("countdown.simple")).unwrap();
    let mut io = TestIo::new();
    let mut machine = Machine::new(image, &mut io);
    machine.run().unwrap();
    assert_eq!(io.into_output(), "3\n2\n1\n");
}

#[test]
fn test_empty_loop_body_is_skipped() {
    // start > end with a positive step: the body must not run.
    let source = "\
10 for i = 5 to 1
20 print i
30 next i
40 print 99
50 end
";
    let mut io = TestIo::new();
    interpret(source, &mut io);
    assert_eq!(io.into_output(), "99\n");
}

#[test]
fn test_skipping_honors_nesting() {
    // The inner for/next pair must not terminate the scan for the outer
    // loop's matching next.
    let source = "\
10 for i = 5 to 1
20 for j = 1 to 2
30 print j
40 next j
50 next i
60 print 7
70 end
";
    let mut io = TestIo::new();
    interpret(source, &mut io);
    assert_eq!(io.into_output(), "7\n");
}

#[test]
fn test_for_loop_with_expression_bounds() {
    let source = "\
10 let n = 2
20 let s = 0
30 for i = n - 1 to n * 2
40 let s = s + i
50 next i
60 print s
70 end
";
    // 1 + 2 + 3 + 4
    let mut io = TestIo::new();
    interpret(source, &mut io);
    assert_eq!(io.into_output(), "10\n");
}

#[test]
fn test_fractional_step_interpreted() {
    let source = "\
10 let s = 0
20 for i = 0 to 1 step 0.5
30 let s = s + i
40 next i
50 print s
60 end
";
    // 0 + 0.5 + 1
    let mut io = TestIo::new();
    interpret(source, &mut io);
    assert_eq!(io.into_output(), "1.5\n");
}
