use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::io::Write;
use std::rc::Rc;

use crate::token::Token;

use super::function::LoxFunction;
use super::runtime_error::RuntimeError;
use super::value::{Callable, Value};
use super::Interpreter;

/// Shared class definition. Cloning a `Class` clones a handle, not
/// the definition, so every instance and subclass sees one table.
struct ClassDefinition {
    name: String,
    superclass: Option<Class>,
    methods: HashMap<String, Rc<LoxFunction>>,
}

#[derive(Clone)]
pub struct Class(Rc<ClassDefinition>);

impl Class {
    pub fn new(
        name: &str,
        superclass: Option<Class>,
        methods: HashMap<String, Rc<LoxFunction>>,
    ) -> Class {
        Class(Rc::new(ClassDefinition {
            name: String::from(name),
            superclass,
            methods,
        }))
    }

    pub fn ptr_eq(&self, other: &Class) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Walks the single-inheritance chain, nearest class first.
    pub fn find_method(&self, name: &str) -> Option<Rc<LoxFunction>> {
        self.0.methods.get(name).cloned().or_else(|| {
            self.0
                .superclass
                .as_ref()
                .and_then(|superclass| superclass.find_method(name))
        })
    }

    /// Constructing a class takes the initializer's arguments, or none.
    pub fn arity(&self) -> usize {
        self.find_method("init")
            .map(|initializer| initializer.arity())
            .unwrap_or(0)
    }

    /// Calling a class allocates an instance and, when an `init`
    /// method exists anywhere on the chain, invokes it bound to the
    /// new instance. The initializer's result is its bound `this`, so
    /// either path yields the instance.
    pub fn call<W: Write>(
        &self,
        interpreter: &mut Interpreter<W>,
        arguments: Vec<Value>,
    ) -> Result<Value, RuntimeError> {
        let instance = Instance::new(self.clone());
        if let Some(initializer) = self.find_method("init") {
            initializer
                .bind(Value::Instance(instance.clone()))
                .call(interpreter, arguments)
        } else {
            Ok(Value::Instance(instance))
        }
    }
}

impl fmt::Display for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.name)
    }
}

struct InstanceData {
    class: Class,
    fields: HashMap<String, Value>,
}

#[derive(Clone)]
pub struct Instance(Rc<RefCell<InstanceData>>);

impl Instance {
    pub fn new(class: Class) -> Instance {
        Instance(Rc::new(RefCell::new(InstanceData {
            class,
            fields: HashMap::new(),
        })))
    }

    pub fn ptr_eq(&self, other: &Instance) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Fields shadow methods; a method hit comes back bound to this
    /// instance.
    pub fn get(&self, name: &Token) -> Result<Value, RuntimeError> {
        if let Some(field) = self.0.borrow().fields.get(&name.lexeme) {
            return Ok(field.clone());
        }
        let method = self.0.borrow().class.find_method(&name.lexeme);
        match method {
            Some(method) => {
                let bound = method.bind(Value::Instance(self.clone()));
                Ok(Value::Callable(Callable::Function(Rc::new(bound))))
            }
            None => Err(RuntimeError::UndefinedProperty {
                name: name.lexeme.clone(),
                line: name.line,
            }),
        }
    }

    pub fn set(&self, name: &Token, value: Value) {
        self.0.borrow_mut().fields.insert(name.lexeme.clone(), value);
    }
}

impl fmt::Display for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<instance of {}>", self.0.borrow().class)
    }
}
