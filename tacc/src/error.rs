use std::io;

use compiler::error::CompileError;

#[derive(Debug)]
pub enum TaccError {
    CompileError(String),
    IoError(String),
}

impl From<io::Error> for TaccError {
    fn from(value: io::Error) -> Self {
        TaccError::IoError(value.to_string())
    }
}

impl From<CompileError> for TaccError {
    fn from(value: CompileError) -> Self {
        TaccError::CompileError(value.to_string())
    }
}
