use std::rc::Rc;

use thiserror::Error;

use crate::ast::{next_expr_id, Expr, FunctionDecl, LiteralValue, Stmt};
use crate::token::{Token, TokenKind};

#[derive(Debug, Error)]
#[error("[line {line}] parse error at '{lexeme}': {message}")]
pub struct ParseError {
    pub line: usize,
    pub lexeme: String,
    pub message: String,
}

impl ParseError {
    fn new(token: &Token, message: &str) -> ParseError {
        ParseError {
            line: token.line,
            lexeme: token.lexeme.clone(),
            message: String::from(message),
        }
    }
}

pub type ParserResult<T> = Result<T, ParseError>;

#[derive(Debug, Clone, Copy)]
enum FunctionKind {
    Function,
    Method,
}

impl FunctionKind {
    fn label(self) -> &'static str {
        match self {
            FunctionKind::Function => "function",
            FunctionKind::Method => "method",
        }
    }
}

pub struct Parser<'a> {
    tokens: &'a [Token],
    current: usize,
    errors: Vec<ParseError>,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a [Token]) -> Parser<'a> {
        Parser {
            tokens,
            current: 0,
            errors: Vec::new(),
        }
    }

    /// Parses the whole token stream. Statements that failed to parse
    /// are dropped after synchronizing; every error is collected so a
    /// single pass surfaces all of them.
    pub fn parse(mut self) -> (Vec<Stmt>, Vec<ParseError>) {
        let mut statements = Vec::new();
        while !self.is_at_end() {
            if let Some(stmt) = self.declaration() {
                statements.push(stmt);
            }
        }
        (statements, self.errors)
    }

    fn is_at_end(&self) -> bool {
        matches!(self.peek().kind, TokenKind::Eof)
    }

    fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous()
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    fn previous(&self) -> &Token {
        assert!(self.current > 0);
        &self.tokens[self.current - 1]
    }

    fn check(&self, kind: &TokenKind) -> bool {
        if self.is_at_end() {
            false
        } else {
            &self.peek().kind == kind
        }
    }

    fn matches(&mut self, kinds: &[TokenKind]) -> bool {
        for kind in kinds {
            if self.check(kind) {
                self.advance();
                return true;
            }
        }
        false
    }

    fn consume(&mut self, kind: &TokenKind, message: &str) -> ParserResult<&Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(ParseError::new(self.peek(), message))
        }
    }

    fn declaration(&mut self) -> Option<Stmt> {
        let stmt = if self.matches(&[TokenKind::Class]) {
            self.class_declaration()
        } else if self.matches(&[TokenKind::Fun]) {
            self.function(FunctionKind::Function)
                .map(|fun| Stmt::Function(Rc::new(fun)))
        } else if self.matches(&[TokenKind::Var]) {
            self.var_declaration()
        } else {
            self.statement()
        };

        match stmt {
            Ok(stmt) => Some(stmt),
            Err(parse_err) => {
                self.errors.push(parse_err);
                self.synchronize();
                None
            }
        }
    }

    fn class_declaration(&mut self) -> ParserResult<Stmt> {
        self.consume(&TokenKind::Identifier, "Expect class name")?;
        let name = self.previous().clone();

        let mut superclass = None;
        if self.matches(&[TokenKind::Less]) {
            self.consume(&TokenKind::Identifier, "Expect superclass name")?;
            superclass = Some(Expr::Variable {
                id: next_expr_id(),
                name: self.previous().clone(),
            });
        }

        self.consume(&TokenKind::LeftBrace, "Expect '{' before class body")?;
        let mut methods = Vec::new();
        while !self.check(&TokenKind::RightBrace) && !self.is_at_end() {
            methods.push(Rc::new(self.function(FunctionKind::Method)?));
        }
        self.consume(&TokenKind::RightBrace, "Expect '}' after class body")?;

        Ok(Stmt::Class {
            name,
            superclass,
            methods,
        })
    }

    fn var_declaration(&mut self) -> ParserResult<Stmt> {
        self.consume(&TokenKind::Identifier, "Expect a variable name")?;
        let name = self.previous().clone();

        let mut initializer = None;
        if self.matches(&[TokenKind::Equal]) {
            initializer = Some(self.expression()?);
        }
        self.consume(
            &TokenKind::Semicolon,
            "Expect ';' after variable declaration",
        )?;
        Ok(Stmt::Var { name, initializer })
    }

    fn statement(&mut self) -> ParserResult<Stmt> {
        if self.matches(&[TokenKind::Print]) {
            self.print_statement()
        } else if self.matches(&[TokenKind::If]) {
            self.if_statement()
        } else if self.matches(&[TokenKind::While]) {
            self.while_statement()
        } else if self.matches(&[TokenKind::For]) {
            self.for_statement()
        } else if self.matches(&[TokenKind::Return]) {
            self.return_statement()
        } else if self.matches(&[TokenKind::LeftBrace]) {
            let statements = self.block()?;
            Ok(Stmt::Block { statements })
        } else {
            self.expression_statement()
        }
    }

    fn if_statement(&mut self) -> ParserResult<Stmt> {
        self.consume(&TokenKind::LeftParen, "Expect '(' after if")?;
        let condition = self.expression()?;
        self.consume(&TokenKind::RightParen, "Expect ')' after if condition")?;
        let then_branch = self.statement()?;

        // An else binds to the nearest unmatched if.
        let mut else_branch = None;
        if self.matches(&[TokenKind::Else]) {
            else_branch = Some(Box::new(self.statement()?));
        }
        Ok(Stmt::If {
            condition,
            then_branch: Box::new(then_branch),
            else_branch,
        })
    }

    fn while_statement(&mut self) -> ParserResult<Stmt> {
        self.consume(&TokenKind::LeftParen, "Expect '(' after while")?;
        let condition = self.expression()?;
        self.consume(&TokenKind::RightParen, "Expect ')' after condition")?;
        let body = self.statement()?;
        Ok(Stmt::While {
            condition,
            body: Box::new(body),
        })
    }

    /// Desugars `for` into `{ initializer; while (condition) { body; increment; } }`.
    fn for_statement(&mut self) -> ParserResult<Stmt> {
        self.consume(&TokenKind::LeftParen, "Expect '(' after for")?;
        let initializer = if self.matches(&[TokenKind::Semicolon]) {
            None
        } else if self.matches(&[TokenKind::Var]) {
            Some(self.var_declaration()?)
        } else {
            Some(self.expression_statement()?)
        };

        let mut condition = None;
        if !self.check(&TokenKind::Semicolon) {
            condition = Some(self.expression()?);
        }
        self.consume(&TokenKind::Semicolon, "Expect ';' after for condition")?;

        let mut increment = None;
        if !self.check(&TokenKind::RightParen) {
            increment = Some(self.expression()?);
        }
        self.consume(&TokenKind::RightParen, "Expect matching ')' in for loop")?;
        let mut body = self.statement()?;

        if let Some(increment) = increment {
            body = Stmt::Block {
                statements: vec![
                    body,
                    Stmt::Expression {
                        expression: increment,
                    },
                ],
            }
        }
        let condition = condition.unwrap_or(Expr::Literal(LiteralValue::Bool(true)));
        body = Stmt::While {
            condition,
            body: Box::new(body),
        };

        if let Some(initializer) = initializer {
            body = Stmt::Block {
                statements: vec![initializer, body],
            }
        }

        Ok(body)
    }

    fn return_statement(&mut self) -> ParserResult<Stmt> {
        let keyword = self.previous().clone();
        let mut value = None;
        if !self.check(&TokenKind::Semicolon) {
            value = Some(self.expression()?);
        }
        self.consume(&TokenKind::Semicolon, "Expect ';' after return value")?;

        Ok(Stmt::Return { keyword, value })
    }

    fn block(&mut self) -> ParserResult<Vec<Stmt>> {
        let mut statements = Vec::new();
        while !self.check(&TokenKind::RightBrace) && !self.is_at_end() {
            if let Some(stmt) = self.declaration() {
                statements.push(stmt);
            }
        }
        self.consume(&TokenKind::RightBrace, "Expect '}' after block")?;
        Ok(statements)
    }

    fn print_statement(&mut self) -> ParserResult<Stmt> {
        let expression = self.expression()?;
        self.consume(&TokenKind::Semicolon, "Expect ';' after value")?;
        Ok(Stmt::Print { expression })
    }

    fn expression_statement(&mut self) -> ParserResult<Stmt> {
        let expression = self.expression()?;
        self.consume(&TokenKind::Semicolon, "Expect ';' after expression")?;
        Ok(Stmt::Expression { expression })
    }

    fn expression(&mut self) -> ParserResult<Expr> {
        self.assignment()
    }

    fn assignment(&mut self) -> ParserResult<Expr> {
        let expr = self.or()?;

        if self.matches(&[TokenKind::Equal]) {
            let equals = self.previous().clone();
            let value = Box::new(self.assignment()?);

            return match expr {
                Expr::Variable { name, .. } => Ok(Expr::Assign {
                    id: next_expr_id(),
                    name,
                    value,
                }),
                Expr::Get { object, name } => Ok(Expr::Set {
                    object,
                    name,
                    value,
                }),
                // Not fatal; the right-hand side already parsed, so
                // report and keep going with the target expression.
                other => {
                    self.errors
                        .push(ParseError::new(&equals, "Invalid assignment target"));
                    Ok(other)
                }
            };
        }

        Ok(expr)
    }

    fn or(&mut self) -> ParserResult<Expr> {
        let mut expr = self.and()?;

        while self.matches(&[TokenKind::Or]) {
            let operator = self.previous().clone();
            let right = self.and()?;
            expr = Expr::Logical {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn and(&mut self) -> ParserResult<Expr> {
        let mut expr = self.equality()?;

        while self.matches(&[TokenKind::And]) {
            let operator = self.previous().clone();
            let right = self.equality()?;
            expr = Expr::Logical {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn equality(&mut self) -> ParserResult<Expr> {
        let mut expr = self.comparison()?;

        while self.matches(&[TokenKind::BangEqual, TokenKind::EqualEqual]) {
            let operator = self.previous().clone();
            let right = self.comparison()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn comparison(&mut self) -> ParserResult<Expr> {
        use TokenKind::*;

        let mut expr = self.term()?;
        while self.matches(&[Greater, GreaterEqual, Less, LessEqual]) {
            let operator = self.previous().clone();
            let right = self.term()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn term(&mut self) -> ParserResult<Expr> {
        let mut expr = self.factor()?;

        while self.matches(&[TokenKind::Minus, TokenKind::Plus]) {
            let operator = self.previous().clone();
            let right = self.factor()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn factor(&mut self) -> ParserResult<Expr> {
        let mut expr = self.unary()?;

        while self.matches(&[TokenKind::Star, TokenKind::Slash]) {
            let operator = self.previous().clone();
            let right = self.unary()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn unary(&mut self) -> ParserResult<Expr> {
        if self.matches(&[TokenKind::Bang, TokenKind::Minus]) {
            let operator = self.previous().clone();
            let right = self.unary()?;
            Ok(Expr::Unary {
                operator,
                right: Box::new(right),
            })
        } else {
            self.call()
        }
    }

    fn call(&mut self) -> ParserResult<Expr> {
        let mut expr = self.primary()?;

        loop {
            if self.matches(&[TokenKind::LeftParen]) {
                expr = self.finish_call(expr)?;
            } else if self.matches(&[TokenKind::Dot]) {
                self.consume(&TokenKind::Identifier, "Expect property name after '.'")?;
                expr = Expr::Get {
                    object: Box::new(expr),
                    name: self.previous().clone(),
                };
            } else {
                break;
            }
        }

        Ok(expr)
    }

    fn finish_call(&mut self, callee: Expr) -> ParserResult<Expr> {
        let mut arguments = Vec::new();

        if !self.check(&TokenKind::RightParen) {
            loop {
                if arguments.len() >= 255 {
                    self.errors.push(ParseError::new(
                        self.peek(),
                        "Can't have more than 255 arguments",
                    ));
                }
                arguments.push(self.expression()?);
                if !self.matches(&[TokenKind::Comma]) {
                    break;
                }
            }
        }
        self.consume(&TokenKind::RightParen, "Expect ')' after arguments")?;

        Ok(Expr::Call {
            callee: Box::new(callee),
            paren: self.previous().clone(),
            arguments,
        })
    }

    fn function(&mut self, kind: FunctionKind) -> ParserResult<FunctionDecl> {
        self.consume(
            &TokenKind::Identifier,
            &format!("Expect {} name", kind.label()),
        )?;
        let name = self.previous().clone();

        self.consume(
            &TokenKind::LeftParen,
            &format!("Expect '(' after {} name", kind.label()),
        )?;
        let mut params = Vec::new();
        if !self.check(&TokenKind::RightParen) {
            loop {
                if params.len() >= 255 {
                    self.errors.push(ParseError::new(
                        self.peek(),
                        "Can't have more than 255 parameters",
                    ));
                }
                let param = self.consume(&TokenKind::Identifier, "Expect parameter name")?;
                params.push(param.clone());
                if !self.matches(&[TokenKind::Comma]) {
                    break;
                }
            }
        }
        self.consume(&TokenKind::RightParen, "Expect ')' after parameters")?;
        self.consume(
            &TokenKind::LeftBrace,
            &format!("Expect '{{' before {} body", kind.label()),
        )?;
        let body = self.block()?;
        Ok(FunctionDecl { name, params, body })
    }

    fn primary(&mut self) -> ParserResult<Expr> {
        use TokenKind::*;

        let literal = match &self.peek().kind {
            False => Some(LiteralValue::Bool(false)),
            True => Some(LiteralValue::Bool(true)),
            Nil => Some(LiteralValue::Nil),
            Number { literal } => Some(LiteralValue::Number(*literal)),
            String { literal } => Some(LiteralValue::String(literal.clone())),
            _ => None,
        };
        if let Some(literal) = literal {
            self.advance();
            return Ok(Expr::Literal(literal));
        }

        if self.matches(&[TokenKind::Identifier]) {
            Ok(Expr::Variable {
                id: next_expr_id(),
                name: self.previous().clone(),
            })
        } else if self.matches(&[TokenKind::This]) {
            Ok(Expr::This {
                id: next_expr_id(),
                keyword: self.previous().clone(),
            })
        } else if self.matches(&[TokenKind::Super]) {
            let keyword = self.previous().clone();
            self.consume(&TokenKind::Dot, "Expect '.' after 'super'")?;
            self.consume(&TokenKind::Identifier, "Expect superclass method name")?;
            Ok(Expr::Super {
                id: next_expr_id(),
                keyword,
                method: self.previous().clone(),
            })
        } else if self.matches(&[TokenKind::LeftParen]) {
            let expr = self.expression()?;
            self.consume(&TokenKind::RightParen, "Expect ')' after expression")?;
            Ok(Expr::Grouping {
                expression: Box::new(expr),
            })
        } else {
            self.advance();
            Err(ParseError::new(self.previous(), "Expect expression"))
        }
    }

    /// Panic-mode recovery: discard tokens until a statement boundary.
    fn synchronize(&mut self) {
        use TokenKind::*;
        self.advance();

        while !self.is_at_end() {
            if let Semicolon = self.previous().kind {
                return;
            }

            match self.peek().kind {
                Class | Fun | Var | For | If | While | Print | Return => return,
                _ => {
                    self.advance();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::Scanner;

    fn parse(source: &str) -> (Vec<Stmt>, Vec<ParseError>) {
        let (tokens, errors) = Scanner::new(source).scan_tokens();
        assert!(errors.is_empty(), "scan errors: {:?}", errors);
        Parser::new(&tokens).parse()
    }

    fn parse_ok(source: &str) -> Vec<Stmt> {
        let (statements, errors) = parse(source);
        assert!(errors.is_empty(), "parse errors: {:?}", errors);
        statements
    }

    fn single_expression(source: &str) -> Expr {
        let statements = parse_ok(source);
        match statements.into_iter().next() {
            Some(Stmt::Expression { expression }) => expression,
            other => panic!("expected an expression statement, got {:?}", other),
        }
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        let expr = single_expression("1 + 2 * 3;");
        match expr {
            Expr::Binary {
                operator, right, ..
            } => {
                assert_eq!(operator.lexeme, "+");
                assert!(matches!(*right, Expr::Binary { .. }));
            }
            other => panic!("expected binary expression, got {:?}", other),
        }
    }

    #[test]
    fn comparison_binds_tighter_than_equality() {
        let expr = single_expression("1 < 2 == true;");
        match expr {
            Expr::Binary { operator, left, .. } => {
                assert_eq!(operator.lexeme, "==");
                assert!(matches!(*left, Expr::Binary { .. }));
            }
            other => panic!("expected binary expression, got {:?}", other),
        }
    }

    #[test]
    fn assignment_is_right_associative() {
        let expr = single_expression("a = b = 1;");
        match expr {
            Expr::Assign { name, value, .. } => {
                assert_eq!(name.lexeme, "a");
                assert!(matches!(*value, Expr::Assign { .. }));
            }
            other => panic!("expected assignment, got {:?}", other),
        }
    }

    #[test]
    fn property_set_target() {
        let expr = single_expression("obj.field = 1;");
        assert!(matches!(expr, Expr::Set { .. }));
    }

    #[test]
    fn invalid_assignment_target_is_reported_but_not_fatal() {
        let (statements, errors) = parse("1 = 2; print 3;");
        assert_eq!(errors.len(), 1);
        assert_eq!(statements.len(), 2);
    }

    #[test]
    fn chained_calls_and_properties() {
        let expr = single_expression("a(1)(2).b.c(3);");
        match expr {
            Expr::Call { callee, .. } => assert!(matches!(*callee, Expr::Get { .. })),
            other => panic!("expected call, got {:?}", other),
        }
    }

    #[test]
    fn for_desugars_to_while() {
        let statements = parse_ok("for (var i = 0; i < 3; i = i + 1) print i;");
        match &statements[0] {
            Stmt::Block { statements } => {
                assert!(matches!(statements[0], Stmt::Var { .. }));
                match &statements[1] {
                    Stmt::While { body, .. } => assert!(matches!(**body, Stmt::Block { .. })),
                    other => panic!("expected while, got {:?}", other),
                }
            }
            other => panic!("expected block, got {:?}", other),
        }
    }

    #[test]
    fn for_without_condition_loops_on_true() {
        let statements = parse_ok("for (;;) {}");
        match &statements[0] {
            Stmt::While { condition, .. } => {
                assert!(matches!(condition, Expr::Literal(LiteralValue::Bool(true))))
            }
            other => panic!("expected while, got {:?}", other),
        }
    }

    #[test]
    fn class_with_superclass_and_methods() {
        let statements = parse_ok("class B < A { init(x) {} get() {} }");
        match &statements[0] {
            Stmt::Class {
                name,
                superclass,
                methods,
            } => {
                assert_eq!(name.lexeme, "B");
                assert!(superclass.is_some());
                assert_eq!(methods.len(), 2);
            }
            other => panic!("expected class, got {:?}", other),
        }
    }

    #[test]
    fn super_requires_method_name() {
        let (_, errors) = parse("class B < A { f() { return super; } }");
        assert!(!errors.is_empty());
    }

    #[test]
    fn recovers_and_collects_multiple_errors() {
        let (statements, errors) = parse("var = 1; print 2; var = 3; print 4;");
        assert_eq!(errors.len(), 2);
        assert_eq!(statements.len(), 2);
    }

    #[test]
    fn too_many_arguments_reported_not_fatal() {
        let args = (0..256).map(|i| i.to_string()).collect::<Vec<_>>().join(",");
        let (statements, errors) = parse(&format!("f({});", args));
        assert_eq!(errors.len(), 1);
        assert_eq!(statements.len(), 1);
    }

    #[test]
    fn else_binds_to_nearest_if() {
        let statements = parse_ok("if (a) if (b) print 1; else print 2;");
        match &statements[0] {
            Stmt::If {
                then_branch,
                else_branch,
                ..
            } => {
                assert!(else_branch.is_none());
                assert!(matches!(
                    **then_branch,
                    Stmt::If {
                        else_branch: Some(_),
                        ..
                    }
                ));
            }
            other => panic!("expected if, got {:?}", other),
        }
    }
}
