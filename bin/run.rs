//! Command-line front end: interpret, compile or execute Simple programs.

use std::fmt;
use std::fs;
use std::process::exit;

use simpletron::compiler::{CompileError, Compiler};
use simpletron::image::{ImageError, MemoryImage};
use simpletron::interpreter::{Interpreter, RuntimeError};
use simpletron::io::StdIo;
use simpletron::machine::{Machine, VmError};

enum Error {
    Usage,
    Io(std::io::Error),
    Compile(CompileError),
    Runtime(RuntimeError),
    Vm(VmError),
    Image(ImageError),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        Error::Io(err)
    }
}

impl From<CompileError> for Error {
    fn from(err: CompileError) -> Error {
        Error::Compile(err)
    }
}

impl From<RuntimeError> for Error {
    fn from(err: RuntimeError) -> Error {
        Error::Runtime(err)
    }
}

impl From<VmError> for Error {
    fn from(err: VmError) -> Error {
        Error::Vm(err)
    }
}

impl From<ImageError> for Error {
    fn from(err: ImageError) -> Error {
        Error::Image(err)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Usage => write!(f, "invalid arguments"),
            Error::Io(err) => write!(f, "{}", err),
            Error::Compile(err) => write!(f, "{}", err),
            Error::Runtime(err) => write!(f, "{}", err),
            Error::Vm(err) => write!(f, "{}", err),
            Error::Image(err) => write!(f, "{}", err),
        }
    }
}

fn print_usage() {
    println!("simpletron: Interpret, compile and run Simple programs");
    println!();
    println!("Usage: simpletron <mode> <file>");
    println!();
    println!("  -i, --interpret <file>  Interpret Simple source directly");
    println!("  -c, --compile <file>    Compile source, write <file>.sml and dump");
    println!("                          the symbol table and instructions");
    println!("  -r, --run <file>        Compile source and run it in the VM");
    println!("  -x, --execute <file>    Load a .sml image and run it in the VM");
    println!("  -h, --help              Display this help text");
}

fn interpret(path: &str) -> Result<(), Error> {
    let source = fs::read_to_string(path)?;
    let mut interpreter = Interpreter::new(StdIo::new());
    interpreter.load(&source)?;
    interpreter.run()?;
    Ok(())
}

fn compile_to_file(path: &str) -> Result<(), Error> {
    let source = fs::read_to_string(path)?;
    let mut compiler = Compiler::new();
    let image = compiler.compile(&source)?;

    let out_path = format!("{}.sml", path);
    fs::write(&out_path, image.to_string())?;

    print!("{}", compiler.symbols());
    print!("{}", compiler.dump_program());
    println!("Wrote {}", out_path);
    Ok(())
}

fn compile_and_run(path: &str) -> Result<(), Error> {
    let source = fs::read_to_string(path)?;
    let image = Compiler::new().compile(&source)?;

    let mut machine = Machine::new(image, StdIo::new());
    machine.run()?;
    Ok(())
}

fn execute(path: &str) -> Result<(), Error> {
    let text = fs::read_to_string(path)?;
    let image = MemoryImage::parse(&text)?;

    let mut machine = Machine::new(image, StdIo::new());
    machine.run()?;
    Ok(())
}

fn dispatch(args: &[String]) -> Result<(), Error> {
    match args {
        [mode, file] => match mode.as_str() {
            "-i" | "--interpret" => interpret(file),
            "-c" | "--compile" => compile_to_file(file),
            "-r" | "--run" => compile_and_run(file),
            "-x" | "--execute" => execute(file),
            _ => Err(Error::Usage),
        },
        _ => Err(Error::Usage),
    }
}

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();

    if args.is_empty() || args.iter().any(|arg| arg == "-h" || arg == "--help") {
        print_usage();
        return;
    }

    match dispatch(&args) {
        Ok(()) => {}
        Err(Error::Usage) => {
            print_usage();
            exit(1);
        }
        Err(err) => {
            eprintln!("{}", err);
            exit(1);
        }
    }
}
