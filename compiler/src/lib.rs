use tracing::debug;

use codegen::CodeGenerator;
use error::CompileError;
use symbol::SymbolTable;

pub mod codegen;
mod compiler;
pub mod error;
mod lexer;
pub mod machine;
mod scanner;
pub mod symbol;
pub mod term;
mod token;

pub use compiler::Compiler;

/// Compiles one unit of source in a single pass, emitting through the given
/// code generator and recording identifiers in the given symbol table. On
/// success the table's local tier is empty and its private globals are gone;
/// on failure anything already emitted should be discarded by the caller.
pub fn compile<G: CodeGenerator>(
    unit: &str,
    source: &str,
    symbols: &mut SymbolTable,
    generator: &mut G,
) -> Result<(), CompileError> {
    debug!("compiling unit '{}'", unit);
    let mut compiler = Compiler::new(unit, source, symbols, generator);
    compiler.run()?;
    symbols.purge_module();
    Ok(())
}
