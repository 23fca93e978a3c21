use std::cell::RefCell;
use std::fmt;
use std::io::Write;
use std::rc::Rc;

use crate::ast::FunctionDecl;

use super::environment::{self, Environment};
use super::runtime_error::RuntimeError;
use super::value::Value;
use super::{Completion, Interpreter};

/// A function value: the declaration plus the frame it closed over.
/// Binding a method produces a new function whose closure is a fresh
/// frame defining `this`, parented on the original closure.
pub struct LoxFunction {
    declaration: Rc<FunctionDecl>,
    closure: Rc<RefCell<Environment>>,
    is_initializer: bool,
}

impl LoxFunction {
    pub fn new(
        declaration: Rc<FunctionDecl>,
        closure: Rc<RefCell<Environment>>,
        is_initializer: bool,
    ) -> LoxFunction {
        LoxFunction {
            declaration,
            closure,
            is_initializer,
        }
    }

    pub fn arity(&self) -> usize {
        self.declaration.params.len()
    }

    pub fn bind(&self, instance: Value) -> LoxFunction {
        let mut bound_frame = Environment::new_enclosed(Rc::clone(&self.closure));
        bound_frame.define("this", instance);
        LoxFunction::new(
            Rc::clone(&self.declaration),
            Rc::new(RefCell::new(bound_frame)),
            self.is_initializer,
        )
    }

    /// Runs the body in a fresh frame under the closure. The caller
    /// has already checked arity.
    pub fn call<W: Write>(
        &self,
        interpreter: &mut Interpreter<W>,
        arguments: Vec<Value>,
    ) -> Result<Value, RuntimeError> {
        let mut frame = Environment::new_enclosed(Rc::clone(&self.closure));
        for (param, argument) in self.declaration.params.iter().zip(arguments) {
            frame.define(&param.lexeme, argument);
        }
        let frame = Rc::new(RefCell::new(frame));

        let completion = interpreter.execute_block(&self.declaration.body, &frame)?;

        if self.is_initializer {
            // An initializer always yields its instance; the resolver
            // rejects `return value;` inside init, so any Return that
            // reaches here carries nothing.
            return Ok(environment::get_at(&self.closure, 0, "this"));
        }
        match completion {
            Completion::Return(value) => Ok(value),
            Completion::Normal => Ok(Value::Nil),
        }
    }
}

impl fmt::Display for LoxFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<fn {}>", self.declaration.name.lexeme)
    }
}
