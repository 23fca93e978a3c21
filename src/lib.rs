pub mod ast;
pub mod error;
pub mod interpreter;
pub mod parser;
pub mod resolver;
pub mod scanner;
pub mod token;

use std::io::Write;

use tracing::debug;

use error::{RunError, StaticError};
use interpreter::Interpreter;
use parser::Parser;
use scanner::Scanner;

/// Runs one chunk of source through the whole pipeline: scan, parse,
/// resolve, interpret. Static errors are all collected before
/// execution; a runtime error halts the remaining statements.
pub fn run<W: Write>(source: &str, interpreter: &mut Interpreter<W>) -> Result<(), RunError> {
    let (tokens, scan_errors) = Scanner::new(source).scan_tokens();
    debug!(tokens = tokens.len(), "scanned");

    let (statements, parse_errors) = Parser::new(&tokens).parse();
    debug!(statements = statements.len(), "parsed");

    let mut static_errors: Vec<StaticError> = Vec::new();
    static_errors.extend(scan_errors.into_iter().map(StaticError::from));
    static_errors.extend(parse_errors.into_iter().map(StaticError::from));
    if !static_errors.is_empty() {
        return Err(RunError::Static(static_errors));
    }

    let locals = match resolver::resolve(&statements) {
        Ok(locals) => locals,
        Err(errors) => {
            return Err(RunError::Static(
                errors.into_iter().map(StaticError::from).collect(),
            ));
        }
    };
    debug!(locals = locals.len(), "resolved");

    interpreter.interpret(&statements, &locals)?;
    Ok(())
}
