use std::io::Write;
use std::path::{Path, PathBuf};
use std::{fs, process};

use clap::Parser;
use compiler::machine::Machine;
use compiler::symbol::SymbolTable;
use rustyline::{error::ReadlineError, history::FileHistory};

use error::TaccError;

mod error;

#[derive(Parser, Debug)]
#[command(version, about = "Compiler for a small accumulator-machine language")]
struct Args {
    /// Source file to compile; starts a REPL when omitted.
    source: Option<PathBuf>,
}

fn main() -> Result<(), TaccError> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    match args.source {
        Some(path) => compile_file(&path),
        None => Repl::new().run(),
    }
}

fn compile_file(path: &Path) -> Result<(), TaccError> {
    let source = fs::read_to_string(path)?;
    let unit = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("<source>");

    let mut symbols = SymbolTable::new();
    let mut machine = Machine::new();
    if let Err(err) = compiler::compile(unit, &source, &mut symbols, &mut machine) {
        eprintln!("{}", err);
        process::exit(1);
    }

    print!("{}", machine.listing());
    print_globals(&symbols);
    Ok(())
}

fn print_globals(symbols: &SymbolTable) {
    let mut globals: Vec<_> = symbols.globals().collect();
    if globals.is_empty() {
        return;
    }
    globals.sort_by(|a, b| a.name.cmp(&b.name));
    println!("Globals:");
    for symbol in globals {
        println!("\t{}", symbol);
    }
}

// Open braces not yet closed; the REPL keeps buffering while positive.
fn brace_depth(source: &str) -> i32 {
    let mut depth = 0;
    for c in source.chars() {
        match c {
            '{' => depth += 1,
            '}' => depth -= 1,
            _ => {}
        }
    }
    depth
}

#[derive(Debug, PartialEq)]
enum IterStatus {
    Continue,
    Break,
}

struct Repl {
    prompt: String,
    editor: rustyline::Editor<(), FileHistory>,
    out: Box<dyn Write>,
    buffer: String,
    symbols: SymbolTable,
    machine: Machine,
    submission: usize,
}

impl Repl {
    pub fn new() -> Self {
        Repl {
            out: Box::new(std::io::stderr()),
            editor: rustyline::DefaultEditor::new().expect("failed to start readline impl"),
            prompt: "> ".into(),
            buffer: String::new(),
            symbols: SymbolTable::new(),
            machine: Machine::new(),
            submission: 0,
        }
    }

    fn iter(&mut self) -> Result<IterStatus, TaccError> {
        match self.editor.readline(&self.prompt) {
            Ok(line) => {
                if line.trim().is_empty() {
                    return Ok(IterStatus::Continue);
                }
                let _ = self.editor.add_history_entry(line.trim());
                self.handle_line(&line)
            }
            Err(ReadlineError::Interrupted) => {
                writeln!(&mut self.out, "SIGINT received; exiting...")?;
                Ok(IterStatus::Break)
            }
            Err(ReadlineError::Eof) => Ok(IterStatus::Break),
            Err(err) => {
                writeln!(&mut self.out, "Error: {err:?}")?;
                Ok(IterStatus::Continue)
            }
        }
    }

    fn handle_line(&mut self, line: &str) -> Result<IterStatus, TaccError> {
        self.buffer.push_str(line);
        self.buffer.push('\n');

        if brace_depth(&self.buffer) > 0 {
            // Still inside a group; keep reading lines.
            return Ok(IterStatus::Continue);
        }

        let source = std::mem::take(&mut self.buffer);
        self.process(&source)
    }

    // Each submission compiles as its own unit against the persistent
    // symbol table and machine.
    fn process(&mut self, source: &str) -> Result<IterStatus, TaccError> {
        if source.trim() == "quit" {
            return Ok(IterStatus::Break);
        }

        self.submission += 1;
        let unit = format!("<repl:{}>", self.submission);
        let start = self.machine.instructions().len();
        match compiler::compile(&unit, source, &mut self.symbols, &mut self.machine) {
            Ok(()) => {
                let listing = self.machine.listing_from(start);
                if !listing.is_empty() {
                    write!(&mut self.out, "{}", listing)?;
                }
            }
            Err(err) => writeln!(&mut self.out, "{}", err)?,
        }

        Ok(IterStatus::Continue)
    }

    pub fn run(&mut self) -> Result<(), TaccError> {
        while self.iter()? == IterStatus::Continue {}
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::{brace_depth, IterStatus, Repl};

    #[test]
    fn test_repl_quit() {
        assert_eq!(
            Repl::new()
                .handle_line("quit")
                .expect("Expected IterStatus"),
            IterStatus::Break
        );
    }

    #[test]
    fn test_repl_buffers_until_braces_balance() {
        let mut repl = Repl::new();
        assert_eq!(
            repl.handle_line("proc beep() {").expect("Expected IterStatus"),
            IterStatus::Continue
        );
        assert!(!repl.buffer.is_empty());
        assert_eq!(
            repl.handle_line("}").expect("Expected IterStatus"),
            IterStatus::Continue
        );
        assert!(repl.buffer.is_empty());
        assert!(repl.symbols.find("beep").is_some());
    }

    #[test]
    fn test_repl_state_persists_across_submissions() {
        let mut repl = Repl::new();
        repl.handle_line("global n").expect("Expected IterStatus");
        repl.handle_line("5>n").expect("Expected IterStatus");
        assert_eq!(repl.machine.instructions().len(), 2);
    }

    #[test]
    fn test_brace_depth() {
        assert_eq!(brace_depth(""), 0);
        assert_eq!(brace_depth("{ 5"), 1);
        assert_eq!(brace_depth("{ { } }"), 0);
        assert_eq!(brace_depth("}"), -1);
    }
}
