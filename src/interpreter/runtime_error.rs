use thiserror::Error;

/// Errors raised while executing the tree. Each carries the source
/// line of the offending token. The first one aborts the remaining
/// top-level statements; nothing here is caught internally.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("[line {line}] Undefined variable '{name}'")]
    UndefinedVariable { name: String, line: usize },
    #[error("[line {line}] Undefined property '{name}'")]
    UndefinedProperty { name: String, line: usize },
    #[error("[line {line}] Operand must be a number")]
    OperandMustBeNumber { line: usize },
    #[error("[line {line}] Operands must be numbers")]
    OperandsMustBeNumbers { line: usize },
    #[error("[line {line}] Operands must be two numbers or two strings")]
    InvalidAdditionOperands { line: usize },
    #[error("[line {line}] Can only call functions and classes")]
    NotCallable { line: usize },
    #[error("[line {line}] Expected {expected} arguments but got {got}")]
    ArityMismatch {
        expected: usize,
        got: usize,
        line: usize,
    },
    #[error("[line {line}] Only instances have properties")]
    NotAnInstance { line: usize },
    #[error("[line {line}] Superclass must be a class")]
    SuperclassNotAClass { line: usize },
    #[error("output write failed: {0}")]
    Output(#[from] std::io::Error),
}
