use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::token::Token;

use super::runtime_error::RuntimeError;
use super::value::Value;

/// One frame of the environment chain. Frames are shared: a closure
/// keeps its defining frame alive, and every closure created over the
/// same block sees the same frame instance.
pub struct Environment {
    values: HashMap<String, Value>,
    enclosing: Option<Rc<RefCell<Environment>>>,
}

impl Environment {
    pub fn new() -> Environment {
        Environment {
            values: HashMap::new(),
            enclosing: None,
        }
    }

    pub fn new_enclosed(enclosing: Rc<RefCell<Environment>>) -> Environment {
        Environment {
            values: HashMap::new(),
            enclosing: Some(enclosing),
        }
    }

    /// Always inserts or overwrites in this frame, regardless of any
    /// binding in an enclosing one.
    pub fn define(&mut self, name: &str, value: Value) {
        self.values.insert(String::from(name), value);
    }

    /// Chain search from this frame outward to the global frame.
    pub fn get(&self, name: &Token) -> Result<Value, RuntimeError> {
        if let Some(value) = self.values.get(&name.lexeme) {
            Ok(value.clone())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow().get(name)
        } else {
            Err(RuntimeError::UndefinedVariable {
                name: name.lexeme.clone(),
                line: name.line,
            })
        }
    }

    pub fn assign(&mut self, name: &Token, value: Value) -> Result<(), RuntimeError> {
        if self.values.contains_key(&name.lexeme) {
            self.values.insert(name.lexeme.clone(), value);
            Ok(())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow_mut().assign(name, value)
        } else {
            Err(RuntimeError::UndefinedVariable {
                name: name.lexeme.clone(),
                line: name.line,
            })
        }
    }
}

/// Jumps exactly `distance` frames outward. A missing ancestor or a
/// name absent from the target frame means the resolver and the
/// runtime disagree about scope shape, which is a bug in this crate,
/// so both panic instead of falling back to a chain search.
pub fn get_at(env: &Rc<RefCell<Environment>>, distance: usize, name: &str) -> Value {
    ancestor(env, distance)
        .borrow()
        .values
        .get(name)
        .cloned()
        .unwrap_or_else(|| panic!("resolved variable '{}' missing at distance {}", name, distance))
}

pub fn assign_at(env: &Rc<RefCell<Environment>>, distance: usize, name: &Token, value: Value) {
    ancestor(env, distance)
        .borrow_mut()
        .values
        .insert(name.lexeme.clone(), value);
}

fn ancestor(env: &Rc<RefCell<Environment>>, distance: usize) -> Rc<RefCell<Environment>> {
    let mut current = Rc::clone(env);
    for _ in 0..distance {
        let next = current
            .borrow()
            .enclosing
            .as_ref()
            .map(Rc::clone)
            .unwrap_or_else(|| panic!("environment chain shorter than distance {}", distance));
        current = next;
    }
    current
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::TokenKind;

    fn name_token(name: &str) -> Token {
        Token::new(TokenKind::Identifier, String::from(name), 1)
    }

    #[test]
    fn define_then_get() {
        let mut env = Environment::new();
        env.define("a", Value::Number(1.0));
        assert_eq!(env.get(&name_token("a")).unwrap(), Value::Number(1.0));
    }

    #[test]
    fn define_overwrites_existing_binding() {
        let mut env = Environment::new();
        env.define("a", Value::Number(1.0));
        env.define("a", Value::Number(2.0));
        assert_eq!(env.get(&name_token("a")).unwrap(), Value::Number(2.0));
    }

    #[test]
    fn get_searches_enclosing_frames() {
        let global = Rc::new(RefCell::new(Environment::new()));
        global.borrow_mut().define("a", Value::Number(1.0));
        let inner = Environment::new_enclosed(Rc::clone(&global));
        assert_eq!(inner.get(&name_token("a")).unwrap(), Value::Number(1.0));
    }

    #[test]
    fn assign_writes_to_the_frame_holding_the_binding() {
        let global = Rc::new(RefCell::new(Environment::new()));
        global.borrow_mut().define("a", Value::Number(1.0));
        let mut inner = Environment::new_enclosed(Rc::clone(&global));
        inner.assign(&name_token("a"), Value::Number(2.0)).unwrap();
        assert_eq!(
            global.borrow().get(&name_token("a")).unwrap(),
            Value::Number(2.0)
        );
    }

    #[test]
    fn get_of_unknown_name_is_an_error() {
        let env = Environment::new();
        assert!(matches!(
            env.get(&name_token("missing")),
            Err(RuntimeError::UndefinedVariable { .. })
        ));
    }

    #[test]
    fn assign_to_unknown_name_is_an_error() {
        let mut env = Environment::new();
        assert!(env.assign(&name_token("missing"), Value::Nil).is_err());
    }

    #[test]
    fn get_at_reads_the_exact_frame() {
        let global = Rc::new(RefCell::new(Environment::new()));
        global.borrow_mut().define("a", Value::Number(1.0));
        let inner = Rc::new(RefCell::new(Environment::new_enclosed(Rc::clone(&global))));
        inner.borrow_mut().define("a", Value::Number(2.0));

        assert_eq!(get_at(&inner, 0, "a"), Value::Number(2.0));
        assert_eq!(get_at(&inner, 1, "a"), Value::Number(1.0));
    }

    #[test]
    fn assign_at_writes_the_exact_frame() {
        let global = Rc::new(RefCell::new(Environment::new()));
        global.borrow_mut().define("a", Value::Number(1.0));
        let inner = Rc::new(RefCell::new(Environment::new_enclosed(Rc::clone(&global))));
        inner.borrow_mut().define("a", Value::Number(2.0));

        assign_at(&inner, 1, &name_token("a"), Value::Number(3.0));
        assert_eq!(get_at(&inner, 0, "a"), Value::Number(2.0));
        assert_eq!(get_at(&inner, 1, "a"), Value::Number(3.0));
    }

    #[test]
    #[should_panic]
    fn get_at_with_a_bad_distance_panics() {
        let global = Rc::new(RefCell::new(Environment::new()));
        get_at(&global, 3, "a");
    }
}
