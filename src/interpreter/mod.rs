use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

use tracing::debug;

use crate::ast::{Expr, ExprId, Stmt};
use crate::resolver::ScopeDepths;
use crate::token::{Token, TokenKind};

pub mod class;
pub mod environment;
pub mod function;
pub mod native;
pub mod runtime_error;
pub mod value;

use class::Class;
use environment::Environment;
use function::LoxFunction;
use runtime_error::RuntimeError;
use value::{Callable, Value};

/// How a statement finished: fell through normally, or hit a `return`
/// that is still unwinding toward its function-call boundary.
#[derive(Debug)]
pub enum Completion {
    Normal,
    Return(Value),
}

type ExecResult = Result<Completion, RuntimeError>;

pub struct Interpreter<W: Write = io::Stdout> {
    globals: Rc<RefCell<Environment>>,
    locals: ScopeDepths,
    out: W,
}

impl Interpreter<io::Stdout> {
    pub fn new() -> Interpreter<io::Stdout> {
        Interpreter::with_output(io::stdout())
    }
}

impl Default for Interpreter<io::Stdout> {
    fn default() -> Self {
        Interpreter::new()
    }
}

impl<W: Write> Interpreter<W> {
    pub fn with_output(out: W) -> Interpreter<W> {
        let globals = Rc::new(RefCell::new(Environment::new()));
        let clock = native::clock();
        globals.borrow_mut().define(
            clock.name,
            Value::Callable(Callable::Native(Rc::new(clock))),
        );
        Interpreter {
            globals,
            locals: ScopeDepths::new(),
            out,
        }
    }

    pub fn into_output(self) -> W {
        self.out
    }

    /// Executes top-level statements in order against the global
    /// frame, using `locals` to reach lexical bindings. Stops at the
    /// first runtime error; whatever already ran stands.
    pub fn interpret(
        &mut self,
        statements: &[Stmt],
        locals: &ScopeDepths,
    ) -> Result<(), RuntimeError> {
        self.locals.extend(locals.iter().map(|(k, v)| (*k, *v)));
        debug!(statements = statements.len(), "interpreting");
        let globals = Rc::clone(&self.globals);
        for statement in statements {
            // The resolver rejects top-level `return`, so completion
            // here is always Normal.
            self.execute(statement, &globals)?;
        }
        Ok(())
    }

    fn execute(&mut self, statement: &Stmt, env: &Rc<RefCell<Environment>>) -> ExecResult {
        match statement {
            Stmt::Expression { expression } => {
                self.evaluate(expression, env)?;
            }
            Stmt::Print { expression } => {
                let value = self.evaluate(expression, env)?;
                writeln!(self.out, "{}", value)?;
            }
            Stmt::Var { name, initializer } => {
                let value = match initializer {
                    Some(initializer) => self.evaluate(initializer, env)?,
                    None => Value::Nil,
                };
                env.borrow_mut().define(&name.lexeme, value);
            }
            Stmt::Block { statements } => {
                let block_env = Rc::new(RefCell::new(Environment::new_enclosed(Rc::clone(env))));
                return self.execute_block(statements, &block_env);
            }
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition, env)?.is_truthy() {
                    return self.execute(then_branch, env);
                } else if let Some(else_branch) = else_branch {
                    return self.execute(else_branch, env);
                }
            }
            Stmt::While { condition, body } => {
                while self.evaluate(condition, env)?.is_truthy() {
                    if let Completion::Return(value) = self.execute(body, env)? {
                        return Ok(Completion::Return(value));
                    }
                }
            }
            Stmt::Function(declaration) => {
                let function =
                    LoxFunction::new(Rc::clone(declaration), Rc::clone(env), false);
                env.borrow_mut().define(
                    &declaration.name.lexeme,
                    Value::Callable(Callable::Function(Rc::new(function))),
                );
            }
            Stmt::Return { value, .. } => {
                let value = match value {
                    Some(value) => self.evaluate(value, env)?,
                    None => Value::Nil,
                };
                return Ok(Completion::Return(value));
            }
            Stmt::Class {
                name,
                superclass,
                methods,
            } => return self.execute_class(name, superclass.as_ref(), methods, env),
        }
        Ok(Completion::Normal)
    }

    /// Runs the statements of a block (or function body) in `env`.
    /// The caller's frame is untouched: environments are threaded by
    /// parameter, so every exit path lands back in it.
    pub(crate) fn execute_block(
        &mut self,
        statements: &[Stmt],
        env: &Rc<RefCell<Environment>>,
    ) -> ExecResult {
        for statement in statements {
            if let Completion::Return(value) = self.execute(statement, env)? {
                return Ok(Completion::Return(value));
            }
        }
        Ok(Completion::Normal)
    }

    fn execute_class(
        &mut self,
        name: &Token,
        superclass_expr: Option<&Expr>,
        methods: &[Rc<crate::ast::FunctionDecl>],
        env: &Rc<RefCell<Environment>>,
    ) -> ExecResult {
        let superclass = match superclass_expr {
            Some(expr) => match self.evaluate(expr, env)? {
                Value::Callable(Callable::Class(class)) => Some(class),
                _ => {
                    return Err(RuntimeError::SuperclassNotAClass { line: name.line });
                }
            },
            None => None,
        };

        env.borrow_mut().define(&name.lexeme, Value::Nil);

        // Methods close over an intermediate frame binding `super`
        // when there is a superclass, mirroring the scope the
        // resolver pushed.
        let method_env = match &superclass {
            Some(superclass) => {
                let mut frame = Environment::new_enclosed(Rc::clone(env));
                frame.define("super", Value::Callable(Callable::Class(superclass.clone())));
                Rc::new(RefCell::new(frame))
            }
            None => Rc::clone(env),
        };

        let mut method_table = std::collections::HashMap::new();
        for method in methods {
            let is_initializer = method.name.lexeme == "init";
            let function =
                LoxFunction::new(Rc::clone(method), Rc::clone(&method_env), is_initializer);
            method_table.insert(method.name.lexeme.clone(), Rc::new(function));
        }

        let class = Class::new(&name.lexeme, superclass, method_table);
        env.borrow_mut()
            .assign(name, Value::Callable(Callable::Class(class)))?;
        Ok(Completion::Normal)
    }

    fn evaluate(
        &mut self,
        expression: &Expr,
        env: &Rc<RefCell<Environment>>,
    ) -> Result<Value, RuntimeError> {
        match expression {
            Expr::Literal(literal) => Ok(Value::from(literal)),
            Expr::Grouping { expression } => self.evaluate(expression, env),
            Expr::Unary { operator, right } => {
                let right = self.evaluate(right, env)?;
                match operator.kind {
                    TokenKind::Minus => match right {
                        Value::Number(n) => Ok(Value::Number(-n)),
                        _ => Err(RuntimeError::OperandMustBeNumber {
                            line: operator.line,
                        }),
                    },
                    TokenKind::Bang => Ok(Value::Bool(!right.is_truthy())),
                    _ => unreachable!("parser only builds '!'/'-' unary operators"),
                }
            }
            Expr::Binary {
                left,
                operator,
                right,
            } => {
                let left = self.evaluate(left, env)?;
                let right = self.evaluate(right, env)?;
                self.evaluate_binary(operator, left, right)
            }
            Expr::Logical {
                left,
                operator,
                right,
            } => {
                let left = self.evaluate(left, env)?;
                // Short-circuit yields the operand itself, uncoerced.
                let short_circuits = match operator.kind {
                    TokenKind::Or => left.is_truthy(),
                    _ => !left.is_truthy(),
                };
                if short_circuits {
                    Ok(left)
                } else {
                    self.evaluate(right, env)
                }
            }
            Expr::Variable { id, name } => self.lookup_variable(*id, name, env),
            Expr::Assign { id, name, value } => {
                let value = self.evaluate(value, env)?;
                match self.locals.get(id) {
                    Some(&distance) => {
                        environment::assign_at(env, distance, name, value.clone());
                    }
                    None => {
                        self.globals.borrow_mut().assign(name, value.clone())?;
                    }
                }
                Ok(value)
            }
            Expr::Call {
                callee,
                paren,
                arguments,
            } => self.evaluate_call(callee, paren, arguments, env),
            Expr::Get { object, name } => match self.evaluate(object, env)? {
                Value::Instance(instance) => instance.get(name),
                _ => Err(RuntimeError::NotAnInstance { line: name.line }),
            },
            Expr::Set {
                object,
                name,
                value,
            } => match self.evaluate(object, env)? {
                Value::Instance(instance) => {
                    let value = self.evaluate(value, env)?;
                    instance.set(name, value.clone());
                    Ok(value)
                }
                _ => Err(RuntimeError::NotAnInstance { line: name.line }),
            },
            Expr::This { id, keyword } => self.lookup_variable(*id, keyword, env),
            Expr::Super {
                id,
                keyword,
                method,
            } => {
                let distance = *self
                    .locals
                    .get(id)
                    .unwrap_or_else(|| panic!("unresolved 'super' at line {}", keyword.line));
                let superclass = match environment::get_at(env, distance, "super") {
                    Value::Callable(Callable::Class(class)) => class,
                    _ => unreachable!("'super' frame always binds a class"),
                };
                // `this` lives one frame inside the `super` frame.
                let instance = environment::get_at(env, distance - 1, "this");
                match superclass.find_method(&method.lexeme) {
                    Some(found) => Ok(Value::Callable(Callable::Function(Rc::new(
                        found.bind(instance),
                    )))),
                    None => Err(RuntimeError::UndefinedProperty {
                        name: method.lexeme.clone(),
                        line: method.line,
                    }),
                }
            }
        }
    }

    fn evaluate_binary(
        &mut self,
        operator: &Token,
        left: Value,
        right: Value,
    ) -> Result<Value, RuntimeError> {
        use TokenKind::*;
        match operator.kind {
            // Division follows IEEE f64 semantics: dividing by zero
            // yields an infinity or NaN, never a runtime error.
            Minus | Slash | Star | Greater | GreaterEqual | Less | LessEqual => {
                let (lhs, rhs) = number_operands(operator, left, right)?;
                Ok(match operator.kind {
                    Minus => Value::Number(lhs - rhs),
                    Slash => Value::Number(lhs / rhs),
                    Star => Value::Number(lhs * rhs),
                    Greater => Value::Bool(lhs > rhs),
                    GreaterEqual => Value::Bool(lhs >= rhs),
                    Less => Value::Bool(lhs < rhs),
                    _ => Value::Bool(lhs <= rhs),
                })
            }
            Plus => match (left, right) {
                (Value::Number(lhs), Value::Number(rhs)) => Ok(Value::Number(lhs + rhs)),
                (Value::Str(lhs), Value::Str(rhs)) => Ok(Value::Str(lhs + &rhs)),
                _ => Err(RuntimeError::InvalidAdditionOperands {
                    line: operator.line,
                }),
            },
            EqualEqual => Ok(Value::Bool(left == right)),
            BangEqual => Ok(Value::Bool(left != right)),
            _ => unreachable!("parser only builds known binary operators"),
        }
    }

    fn evaluate_call(
        &mut self,
        callee: &Expr,
        paren: &Token,
        arguments: &[Expr],
        env: &Rc<RefCell<Environment>>,
    ) -> Result<Value, RuntimeError> {
        let callee = self.evaluate(callee, env)?;
        let mut argument_values = Vec::with_capacity(arguments.len());
        for argument in arguments {
            argument_values.push(self.evaluate(argument, env)?);
        }

        let Value::Callable(callable) = callee else {
            return Err(RuntimeError::NotCallable { line: paren.line });
        };
        if callable.arity() != argument_values.len() {
            return Err(RuntimeError::ArityMismatch {
                expected: callable.arity(),
                got: argument_values.len(),
                line: paren.line,
            });
        }
        match callable {
            Callable::Function(function) => function.call(self, argument_values),
            Callable::Class(class) => class.call(self, argument_values),
            Callable::Native(native) => (native.function)(&argument_values),
        }
    }

    fn lookup_variable(
        &self,
        id: ExprId,
        name: &Token,
        env: &Rc<RefCell<Environment>>,
    ) -> Result<Value, RuntimeError> {
        match self.locals.get(&id) {
            Some(&distance) => Ok(environment::get_at(env, distance, &name.lexeme)),
            None => self.globals.borrow().get(name),
        }
    }
}

fn number_operands(
    operator: &Token,
    left: Value,
    right: Value,
) -> Result<(f64, f64), RuntimeError> {
    match (left, right) {
        (Value::Number(lhs), Value::Number(rhs)) => Ok((lhs, rhs)),
        _ => Err(RuntimeError::OperandsMustBeNumbers {
            line: operator.line,
        }),
    }
}
