use std::fs;
use std::io::{self, BufRead, Write};
use std::process::ExitCode;

use rlox::error::RunError;
use rlox::interpreter::Interpreter;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    match args.len() {
        1 => run_prompt(),
        2 => run_file(&args[1]),
        _ => {
            eprintln!("Usage: rlox [script]");
            ExitCode::from(64)
        }
    }
}

fn run_file(path: &str) -> ExitCode {
    let source = match fs::read_to_string(path) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("Could not read {}: {}", path, err);
            return ExitCode::from(66);
        }
    };

    let mut interpreter = Interpreter::new();
    match rlox::run(&source, &mut interpreter) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            err.report();
            match err {
                RunError::Static(_) => ExitCode::from(65),
                RunError::Runtime(_) => ExitCode::from(70),
            }
        }
    }
}

fn run_prompt() -> ExitCode {
    // One interpreter for the whole session so definitions persist
    // across lines.
    let mut interpreter = Interpreter::new();
    let stdin = io::stdin();

    loop {
        print!("> ");
        if io::stdout().flush().is_err() {
            return ExitCode::FAILURE;
        }
        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) | Err(_) => return ExitCode::SUCCESS,
            Ok(_) => {}
        }
        if let Err(err) = rlox::run(line.trim(), &mut interpreter) {
            // Errors in the REPL are reported but never fatal.
            err.report();
        }
    }
}
