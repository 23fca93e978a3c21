use thiserror::Error;

use crate::interpreter::runtime_error::RuntimeError;
use crate::parser::ParseError;
use crate::resolver::ResolveError;
use crate::scanner::ScanError;

/// Any error raised before execution starts. All of them are
/// collected across the whole program; if any exist, interpretation
/// never begins.
#[derive(Debug, Error)]
pub enum StaticError {
    #[error(transparent)]
    Scan(#[from] ScanError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error("{} static error(s)", .0.len())]
    Static(Vec<StaticError>),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

impl RunError {
    /// Writes every collected error to stderr, one per line.
    pub fn report(&self) {
        match self {
            RunError::Static(errors) => {
                for error in errors {
                    eprintln!("{}", error);
                }
            }
            RunError::Runtime(error) => eprintln!("{}", error),
        }
    }
}
