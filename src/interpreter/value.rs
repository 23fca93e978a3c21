use std::fmt;
use std::rc::Rc;

use crate::ast::LiteralValue;

use super::class::{Class, Instance};
use super::function::LoxFunction;
use super::native::NativeFunction;

/// Every value the language can produce. Closed so evaluation matches
/// exhaustively instead of downcasting.
#[derive(Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Number(f64),
    Str(String),
    Callable(Callable),
    Instance(Instance),
}

#[derive(Clone)]
pub enum Callable {
    Function(Rc<LoxFunction>),
    Class(Class),
    Native(Rc<NativeFunction>),
}

impl Callable {
    pub fn arity(&self) -> usize {
        match self {
            Callable::Function(function) => function.arity(),
            Callable::Class(class) => class.arity(),
            Callable::Native(native) => native.arity,
        }
    }
}

impl Value {
    /// nil and false are falsy, and so is numeric zero; every other
    /// value, including the empty string, is truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Nil => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0,
            _ => true,
        }
    }
}

impl From<&LiteralValue> for Value {
    fn from(literal: &LiteralValue) -> Value {
        match literal {
            LiteralValue::Number(n) => Value::Number(*n),
            LiteralValue::String(s) => Value::Str(s.clone()),
            LiteralValue::Bool(b) => Value::Bool(*b),
            LiteralValue::Nil => Value::Nil,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(lhs), Value::Bool(rhs)) => lhs == rhs,
            (Value::Number(lhs), Value::Number(rhs)) => lhs == rhs,
            (Value::Str(lhs), Value::Str(rhs)) => lhs == rhs,
            // Functions, classes and instances compare by identity.
            (Value::Callable(lhs), Value::Callable(rhs)) => match (lhs, rhs) {
                (Callable::Function(lhs), Callable::Function(rhs)) => Rc::ptr_eq(lhs, rhs),
                (Callable::Class(lhs), Callable::Class(rhs)) => lhs.ptr_eq(rhs),
                (Callable::Native(lhs), Callable::Native(rhs)) => Rc::ptr_eq(lhs, rhs),
                _ => false,
            },
            (Value::Instance(lhs), Value::Instance(rhs)) => lhs.ptr_eq(rhs),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => {
                if n.fract() == 0.0 && n.is_finite() {
                    write!(f, "{:.0}", n)
                } else {
                    write!(f, "{}", n)
                }
            }
            Value::Str(s) => write!(f, "{}", s),
            Value::Callable(Callable::Function(function)) => write!(f, "{}", function),
            Value::Callable(Callable::Class(class)) => write!(f, "{}", class),
            Value::Callable(Callable::Native(native)) => write!(f, "{}", native),
            Value::Instance(instance) => write!(f, "{}", instance),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn integral_numbers_print_without_fraction() {
        assert_eq!(Value::Number(2.0).to_string(), "2");
        assert_eq!(Value::Number(-7.0).to_string(), "-7");
        assert_eq!(Value::Number(2.5).to_string(), "2.5");
    }

    #[test]
    fn nil_prints_as_nil() {
        assert_eq!(Value::Nil.to_string(), "nil");
    }

    #[test]
    fn zero_is_falsy_and_nonzero_is_truthy() {
        assert!(!Value::Number(0.0).is_truthy());
        assert!(!Value::Number(-0.0).is_truthy());
        assert!(Value::Number(-1.0).is_truthy());
        assert!(Value::Number(0.0001).is_truthy());
    }

    #[test]
    fn nil_and_false_are_falsy_everything_else_truthy() {
        assert!(!Value::Nil.is_truthy());
        assert!(!Value::Bool(false).is_truthy());
        assert!(Value::Bool(true).is_truthy());
        assert!(Value::Str(String::new()).is_truthy());
    }

    #[test]
    fn equality_is_null_aware_and_by_value() {
        assert_eq!(Value::Nil, Value::Nil);
        assert_ne!(Value::Nil, Value::Number(0.0));
        assert_eq!(Value::Number(1.0), Value::Number(1.0));
        assert_ne!(Value::Number(1.0), Value::Str(String::from("1")));
        assert_eq!(Value::Str(String::from("a")), Value::Str(String::from("a")));
    }
}
