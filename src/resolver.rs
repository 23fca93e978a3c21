use std::collections::HashMap;

use thiserror::Error;

use crate::ast::{Expr, ExprId, FunctionDecl, Stmt};
use crate::token::Token;

/// Side table produced by resolution: for every local reference, the
/// number of frames between the use site and its binding. References
/// that are absent resolve through the global frame at runtime.
pub type ScopeDepths = HashMap<ExprId, usize>;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("[line {line}] Can't read local variable '{name}' in its own initializer")]
    SelfReferencingInitializer { name: String, line: usize },
    #[error("[line {line}] A variable named '{name}' already exists in this scope")]
    DuplicateDeclaration { name: String, line: usize },
    #[error("[line {line}] Can't return from top-level code")]
    ReturnOutsideFunction { line: usize },
    #[error("[line {line}] Can't return a value from an initializer")]
    ReturnFromInitializer { line: usize },
    #[error("[line {line}] A class can't inherit from itself")]
    SelfInheritance { line: usize },
    #[error("[line {line}] Can't use 'this' outside of a class")]
    ThisOutsideClass { line: usize },
    #[error("[line {line}] Can't use 'super' outside of a class")]
    SuperOutsideClass { line: usize },
    #[error("[line {line}] Can't use 'super' in a class with no superclass")]
    SuperWithoutSuperclass { line: usize },
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum FunctionType {
    None,
    Function,
    Method,
    Initializer,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ClassType {
    None,
    Class,
    Subclass,
}

/// Resolves all local variable references in one pure walk over the
/// AST. Errors are collected, never fatal mid-walk; if any exist the
/// program must not be executed.
pub fn resolve(statements: &[Stmt]) -> Result<ScopeDepths, Vec<ResolveError>> {
    let mut resolver = Resolver::new();
    resolver.resolve_stmts(statements);
    if resolver.errors.is_empty() {
        Ok(resolver.depths)
    } else {
        Err(resolver.errors)
    }
}

struct Resolver {
    // Innermost scope last; the bool is the defined-and-ready flag.
    scopes: Vec<HashMap<String, bool>>,
    depths: ScopeDepths,
    errors: Vec<ResolveError>,
    current_function: FunctionType,
    current_class: ClassType,
}

impl Resolver {
    fn new() -> Resolver {
        Resolver {
            scopes: Vec::new(),
            depths: HashMap::new(),
            errors: Vec::new(),
            current_function: FunctionType::None,
            current_class: ClassType::None,
        }
    }

    fn resolve_stmts(&mut self, statements: &[Stmt]) {
        for statement in statements {
            self.resolve_stmt(statement);
        }
    }

    fn resolve_stmt(&mut self, statement: &Stmt) {
        match statement {
            Stmt::Block { statements } => {
                self.begin_scope();
                self.resolve_stmts(statements);
                self.end_scope();
            }
            Stmt::Var { name, initializer } => {
                self.declare(name);
                if let Some(initializer) = initializer {
                    self.resolve_expr(initializer);
                }
                self.define(name);
            }
            Stmt::Function(fun) => {
                self.declare(&fun.name);
                self.define(&fun.name);
                self.resolve_function(fun, FunctionType::Function);
            }
            Stmt::Expression { expression } | Stmt::Print { expression } => {
                self.resolve_expr(expression)
            }
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.resolve_expr(condition);
                self.resolve_stmt(then_branch);
                if let Some(else_branch) = else_branch {
                    self.resolve_stmt(else_branch);
                }
            }
            Stmt::While { condition, body } => {
                self.resolve_expr(condition);
                self.resolve_stmt(body);
            }
            Stmt::Return { keyword, value } => {
                if self.current_function == FunctionType::None {
                    self.errors.push(ResolveError::ReturnOutsideFunction {
                        line: keyword.line,
                    });
                }
                if let Some(value) = value {
                    if self.current_function == FunctionType::Initializer {
                        self.errors.push(ResolveError::ReturnFromInitializer {
                            line: keyword.line,
                        });
                    }
                    self.resolve_expr(value);
                }
            }
            Stmt::Class {
                name,
                superclass,
                methods,
            } => self.resolve_class(name, superclass.as_ref(), methods),
        }
    }

    fn resolve_class(
        &mut self,
        name: &Token,
        superclass: Option<&Expr>,
        methods: &[std::rc::Rc<FunctionDecl>],
    ) {
        let enclosing_class = self.current_class;
        self.current_class = ClassType::Class;

        self.declare(name);
        self.define(name);

        if let Some(superclass) = superclass {
            if let Expr::Variable {
                name: super_name, ..
            } = superclass
            {
                if super_name.lexeme == name.lexeme {
                    self.errors.push(ResolveError::SelfInheritance {
                        line: super_name.line,
                    });
                }
            }
            self.current_class = ClassType::Subclass;
            self.resolve_expr(superclass);
            self.begin_scope();
            if let Some(scope) = self.scopes.last_mut() {
                scope.insert(String::from("super"), true);
            }
        }

        self.begin_scope();
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(String::from("this"), true);
        }

        for method in methods {
            let declaration = if method.name.lexeme == "init" {
                FunctionType::Initializer
            } else {
                FunctionType::Method
            };
            self.resolve_function(method, declaration);
        }

        self.end_scope();
        if superclass.is_some() {
            self.end_scope();
        }
        self.current_class = enclosing_class;
    }

    fn resolve_function(&mut self, fun: &FunctionDecl, kind: FunctionType) {
        let enclosing_function = self.current_function;
        self.current_function = kind;

        self.begin_scope();
        for param in &fun.params {
            self.declare(param);
            self.define(param);
        }
        self.resolve_stmts(&fun.body);
        self.end_scope();

        self.current_function = enclosing_function;
    }

    fn resolve_expr(&mut self, expression: &Expr) {
        match expression {
            Expr::Variable { id, name } => {
                if let Some(scope) = self.scopes.last() {
                    if scope.get(&name.lexeme) == Some(&false) {
                        self.errors.push(ResolveError::SelfReferencingInitializer {
                            name: name.lexeme.clone(),
                            line: name.line,
                        });
                    }
                }
                self.resolve_local(*id, name);
            }
            Expr::Assign { id, name, value } => {
                self.resolve_expr(value);
                self.resolve_local(*id, name);
            }
            Expr::Literal(_) => {}
            Expr::Unary { right, .. } => self.resolve_expr(right),
            Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
                self.resolve_expr(left);
                self.resolve_expr(right);
            }
            Expr::Grouping { expression } => self.resolve_expr(expression),
            Expr::Call {
                callee, arguments, ..
            } => {
                self.resolve_expr(callee);
                for argument in arguments {
                    self.resolve_expr(argument);
                }
            }
            Expr::Get { object, .. } => self.resolve_expr(object),
            Expr::Set { object, value, .. } => {
                self.resolve_expr(value);
                self.resolve_expr(object);
            }
            Expr::This { id, keyword } => {
                if self.current_class == ClassType::None {
                    self.errors.push(ResolveError::ThisOutsideClass {
                        line: keyword.line,
                    });
                    return;
                }
                self.resolve_local(*id, keyword);
            }
            Expr::Super { id, keyword, .. } => {
                match self.current_class {
                    ClassType::None => {
                        self.errors.push(ResolveError::SuperOutsideClass {
                            line: keyword.line,
                        });
                        return;
                    }
                    ClassType::Class => {
                        self.errors.push(ResolveError::SuperWithoutSuperclass {
                            line: keyword.line,
                        });
                        return;
                    }
                    ClassType::Subclass => {}
                }
                self.resolve_local(*id, keyword);
            }
        }
    }

    /// Records the hop count for a local reference. The walk stops at
    /// the first (innermost) scope that contains the name, so a
    /// shadowing declaration always wins over an outer one.
    fn resolve_local(&mut self, id: ExprId, name: &Token) {
        for (hops, scope) in self.scopes.iter().rev().enumerate() {
            if scope.contains_key(&name.lexeme) {
                self.depths.insert(id, hops);
                return;
            }
        }
        // Not found in any scope: assumed global, resolved at runtime.
    }

    fn begin_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    fn end_scope(&mut self) {
        self.scopes.pop();
    }

    fn declare(&mut self, name: &Token) {
        let Some(scope) = self.scopes.last_mut() else {
            return;
        };
        if scope.contains_key(&name.lexeme) {
            self.errors.push(ResolveError::DuplicateDeclaration {
                name: name.lexeme.clone(),
                line: name.line,
            });
        }
        scope.insert(name.lexeme.clone(), false);
    }

    fn define(&mut self, name: &Token) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.lexeme.clone(), true);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;
    use crate::scanner::Scanner;
    use pretty_assertions::assert_eq;

    fn parse(source: &str) -> Vec<Stmt> {
        let (tokens, scan_errors) = Scanner::new(source).scan_tokens();
        assert!(scan_errors.is_empty(), "scan errors: {:?}", scan_errors);
        let (statements, parse_errors) = Parser::new(&tokens).parse();
        assert!(parse_errors.is_empty(), "parse errors: {:?}", parse_errors);
        statements
    }

    fn resolve_ok(source: &str) -> ScopeDepths {
        resolve(&parse(source)).expect("expected resolution to succeed")
    }

    fn resolve_errs(source: &str) -> Vec<ResolveError> {
        resolve(&parse(source)).expect_err("expected resolution errors")
    }

    #[test]
    fn globals_are_not_in_the_table() {
        let depths = resolve_ok("var a = 1; print a;");
        assert!(depths.is_empty());
    }

    #[test]
    fn innermost_declaration_wins() {
        // The reference to `a` inside the inner block must hop zero
        // frames, not resolve to the outer declaration.
        let depths = resolve_ok("{ var a = 1; { var a = 2; print a; } }");
        assert_eq!(depths.len(), 1);
        assert_eq!(depths.values().copied().next(), Some(0));
    }

    #[test]
    fn reference_across_one_block_hops_once() {
        let depths = resolve_ok("{ var a = 1; { print a; } }");
        assert_eq!(depths.values().copied().next(), Some(1));
    }

    #[test]
    fn function_parameters_resolve_to_the_call_frame() {
        let depths = resolve_ok("fun f(x) { print x; }");
        assert_eq!(depths.len(), 1);
        assert_eq!(depths.values().copied().next(), Some(0));
    }

    #[test]
    fn resolution_is_idempotent() {
        let statements = parse("{ var a = 1; fun f(x) { print a + x; } }");
        let first = resolve(&statements).expect("resolution failed");
        let second = resolve(&statements).expect("resolution failed");
        assert_eq!(first, second);
    }

    #[test]
    fn use_in_own_initializer_is_an_error() {
        let errors = resolve_errs("{ var a = a; }");
        assert!(matches!(
            errors[0],
            ResolveError::SelfReferencingInitializer { .. }
        ));
    }

    #[test]
    fn duplicate_declaration_in_scope_is_an_error() {
        let errors = resolve_errs("{ var a = 1; var a = 2; }");
        assert!(matches!(
            errors[0],
            ResolveError::DuplicateDeclaration { .. }
        ));
    }

    #[test]
    fn redeclaring_a_global_is_allowed() {
        assert!(resolve(&parse("var a = 1; var a = 2;")).is_ok());
    }

    #[test]
    fn return_outside_function_is_an_error() {
        let errors = resolve_errs("return 1;");
        assert!(matches!(
            errors[0],
            ResolveError::ReturnOutsideFunction { .. }
        ));
    }

    #[test]
    fn returning_a_value_from_init_is_an_error() {
        let errors = resolve_errs("class A { init() { return 1; } }");
        assert!(matches!(
            errors[0],
            ResolveError::ReturnFromInitializer { .. }
        ));
    }

    #[test]
    fn bare_return_from_init_is_allowed() {
        assert!(resolve(&parse("class A { init() { return; } }")).is_ok());
    }

    #[test]
    fn class_cannot_inherit_from_itself() {
        let errors = resolve_errs("class A < A {}");
        assert!(matches!(errors[0], ResolveError::SelfInheritance { .. }));
    }

    #[test]
    fn this_outside_class_is_an_error() {
        let errors = resolve_errs("print this;");
        assert!(matches!(errors[0], ResolveError::ThisOutsideClass { .. }));
    }

    #[test]
    fn this_in_a_subclass_method_is_allowed() {
        assert!(resolve(&parse("class A {} class B < A { m() { return this; } }")).is_ok());
    }

    #[test]
    fn super_without_superclass_is_an_error() {
        let errors = resolve_errs("class A { m() { return super.m(); } }");
        assert!(matches!(
            errors[0],
            ResolveError::SuperWithoutSuperclass { .. }
        ));
    }

    #[test]
    fn super_outside_class_is_an_error() {
        let errors = resolve_errs("fun f() { return super.m(); }");
        assert!(matches!(errors[0], ResolveError::SuperOutsideClass { .. }));
    }

    #[test]
    fn this_in_method_hops_to_the_instance_frame() {
        let depths = resolve_ok("class A { m() { return this; } }");
        // `this` lives one frame above the method's parameter frame.
        assert_eq!(depths.values().copied().next(), Some(1));
    }
}
