use simpletron::{
    compiler::Compiler,
    image::MemoryImage,
    io::TestIo,
    machine::Machine,
    symbol_table::SymbolKey,
};

use slog::{o, Drain, Logger};

fn compile_sum() -> (Compiler, MemoryImage) {
    let source = include_str!("sum.simple");
    let mut compiler = Compiler::new();
    let image = compiler.compile(source).expect("could not compile sum.simple");
    (compiler, image)
}

#[test]
fn test_sum_compile_and_run() {
    let (_, image) = compile_sum();

    let mut io = TestIo::new();
    let mut machine = Machine::new(image, &mut io);
    machine.run().expect("an error occurred while running the program");

    assert_eq!(io.into_output(), "15\n");
}

#[test]
fn test_sum_symbol_table() {
    let (compiler, _) = compile_sum();
    let symbols = compiler.symbols();

    for line in &[10, 20, 30, 40, 50, 60] {
        assert!(
            symbols.get(&SymbolKey::Line(*line)).is_some(),
            "line {} missing from the symbol table",
            line
        );
    }

    // s and i.
    assert!(symbols.get(&SymbolKey::Variable(b's' - b'a')).is_some());
    assert!(symbols.get(&SymbolKey::Variable(b'i' - b'a')).is_some());

    // The constants 0, 1 and 5.
    for constant in &[0, 1, 5] {
        assert!(symbols.get(&SymbolKey::Constant(*constant)).is_some());
    }

    assert_eq!(compiler.unresolved_references(), 0);
    assert_eq!(compiler.instruction_count(), 25);
}

#[test]
fn test_sum_image_text_round_trip() {
    let (_, image) = compile_sum();

    // Write the image out in the .sml text format and load it back the
    // way the VM loader does.
    let text = image.to_string();
    assert_eq!(text.lines().count(), 100);
    for line in text.lines() {
        assert!(line.starts_with('+') || line.starts_with('-'));
    }

    let reloaded = MemoryImage::parse(&text).expect("could not parse the image text");
    let mut io = TestIo::new();
    let mut machine = Machine::new(reloaded, &mut io);
    machine.run().expect("an error occurred while running the reloaded image");

    assert_eq!(io.into_output(), "15\n");
}

#[test]
fn test_sum_is_deterministic() {
    let (_, image) = compile_sum();

    let mut outputs = Vec::new();
    for _ in 0..2 {
        let mut io = TestIo::new();
        let mut machine = Machine::new(image.clone(), &mut io);
        machine.run().unwrap();
        outputs.push(io.into_output());
    }

    assert_eq!(outputs[0], outputs[1]);
}

#[test]
fn test_sum_with_terminal_logger() {
    let decorator = slog_term::TermDecorator::new().build();
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let drain = slog_async::Async::new(drain).build().fuse();
    let logger = Logger::root(drain, o!());

    let source = include_str!("sum.simple");
    let mut compiler = Compiler::with_logger(logger.clone());
    let image = compiler.compile(source).expect("could not compile sum.simple");

    let mut io = TestIo::new();
    let mut machine = Machine::with_logger(image, &mut io, logger);
    machine.run().expect("an error occurred while running the program");

    assert_eq!(io.into_output(), "15\n");
}
