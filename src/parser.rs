//! Recursive-descent parser for O-script.
//!
//! Single-token lookahead, precedence climbing via one function per
//! precedence level (low to high): assignment, or, and, equality,
//! comparison, term, factor, unary, call, primary. The parser does not
//! attempt error recovery — it surfaces the first error.

use crate::ast::{Expr, FunctionDecl, LiteralValue, Stmt};
use crate::error::OscriptError;
use crate::token::{Literal, Token, TokenKind};
use std::rc::Rc;

const MAX_ARGS: usize = 255;

pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, current: 0 }
    }

    pub fn parse(mut self) -> Result<Vec<Stmt>, OscriptError> {
        let mut statements = Vec::new();
        while !self.is_at_end() {
            statements.push(self.declaration()?);
        }
        Ok(statements)
    }

    fn declaration(&mut self) -> Result<Stmt, OscriptError> {
        if self.match_kind(&[TokenKind::Class]) {
            return self.class_declaration();
        }
        if self.match_kind(&[TokenKind::Fun]) {
            return Ok(Stmt::Function(Rc::new(self.function("function")?)));
        }
        if self.match_kind(&[TokenKind::Var]) {
            return self.var_declaration();
        }
        self.statement()
    }

    fn class_declaration(&mut self) -> Result<Stmt, OscriptError> {
        let name = self.consume(TokenKind::Identifier, "Expect class name.")?;
        self.consume(TokenKind::LeftBrace, "Expect '{' before class body.")?;
        let mut methods = Vec::new();
        while !self.check(TokenKind::RightBrace) && !self.is_at_end() {
            self.consume(TokenKind::Fun, "Expect 'fun' before method declaration.")?;
            methods.push(Rc::new(self.function("method")?));
        }
        self.consume(TokenKind::RightBrace, "Expect '}' after class body.")?;
        Ok(Stmt::Class { name, methods })
    }

    fn function(&mut self, kind: &str) -> Result<FunctionDecl, OscriptError> {
        let name = self.consume(TokenKind::Identifier, &format!("Expect {} name.", kind))?;
        self.consume(
            TokenKind::LeftParen,
            &format!("Expect '(' after {} name.", kind),
        )?;
        let mut params = Vec::new();
        if !self.check(TokenKind::RightParen) {
            loop {
                if params.len() >= MAX_ARGS {
                    return Err(self.error("Can't have more than 255 parameters."));
                }
                params.push(self.consume(TokenKind::Identifier, "Expect parameter name.")?);
                if !self.match_kind(&[TokenKind::Comma]) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RightParen, "Expect ')' after parameters.")?;
        self.consume(
            TokenKind::LeftBrace,
            &format!("Expect '{{' before {} body.", kind),
        )?;
        let body = self.block()?;
        Ok(FunctionDecl { name, params, body })
    }

    fn var_declaration(&mut self) -> Result<Stmt, OscriptError> {
        let name = self.consume(TokenKind::Identifier, "Expect variable name.")?;
        let initializer = if self.match_kind(&[TokenKind::Equal]) {
            Some(self.expression()?)
        } else {
            None
        };
        self.consume(TokenKind::Semicolon, "Expect ';' after variable declaration.")?;
        Ok(Stmt::Var { name, initializer })
    }

    fn statement(&mut self) -> Result<Stmt, OscriptError> {
        if self.match_kind(&[TokenKind::Print]) {
            return self.print_statement();
        }
        if self.match_kind(&[TokenKind::LeftBrace]) {
            return Ok(Stmt::Block(self.block()?));
        }
        if self.match_kind(&[TokenKind::If]) {
            return self.if_statement();
        }
        if self.match_kind(&[TokenKind::While]) {
            return self.while_statement();
        }
        if self.match_kind(&[TokenKind::Return]) {
            return self.return_statement();
        }
        self.expression_statement()
    }

    fn return_statement(&mut self) -> Result<Stmt, OscriptError> {
        let keyword = self.previous().clone();
        let value = if !self.check(TokenKind::Semicolon) {
            Some(self.expression()?)
        } else {
            None
        };
        self.consume(TokenKind::Semicolon, "Expect ';' after return value.")?;
        Ok(Stmt::Return { keyword, value })
    }

    fn if_statement(&mut self) -> Result<Stmt, OscriptError> {
        self.consume(TokenKind::LeftParen, "Expect '(' after 'if'.")?;
        let condition = self.expression()?;
        self.consume(TokenKind::RightParen, "Expect ')' after if condition.")?;
        let then_branch = Box::new(self.statement()?);
        let else_branch = if self.match_kind(&[TokenKind::Else]) {
            Some(Box::new(self.statement()?))
        } else {
            None
        };
        Ok(Stmt::If {
            condition,
            then_branch,
            else_branch,
        })
    }

    fn while_statement(&mut self) -> Result<Stmt, OscriptError> {
        self.consume(TokenKind::LeftParen, "Expect '(' after 'while'.")?;
        let condition = self.expression()?;
        self.consume(TokenKind::RightParen, "Expect ')' after condition.")?;
        let body = Box::new(self.statement()?);
        Ok(Stmt::While { condition, body })
    }

    fn block(&mut self) -> Result<Vec<Stmt>, OscriptError> {
        let mut statements = Vec::new();
        while !self.check(TokenKind::RightBrace) && !self.is_at_end() {
            statements.push(self.declaration()?);
        }
        self.consume(TokenKind::RightBrace, "Expect '}' after block.")?;
        Ok(statements)
    }

    fn print_statement(&mut self) -> Result<Stmt, OscriptError> {
        let value = self.expression()?;
        self.consume(TokenKind::Semicolon, "Expect ';' after value.")?;
        Ok(Stmt::Print(value))
    }

    fn expression_statement(&mut self) -> Result<Stmt, OscriptError> {
        let expr = self.expression()?;
        self.consume(TokenKind::Semicolon, "Expect ';' after expression.")?;
        Ok(Stmt::Expression(expr))
    }

    fn expression(&mut self) -> Result<Expr, OscriptError> {
        self.assignment()
    }

    fn assignment(&mut self) -> Result<Expr, OscriptError> {
        let expr = self.or()?;
        if self.match_kind(&[TokenKind::Equal]) {
            let equals = self.previous().clone();
            let value = self.assignment()?;
            return match expr {
                Expr::Variable(name) => Ok(Expr::Assign {
                    name,
                    value: Box::new(value),
                }),
                Expr::Get { object, name } => Ok(Expr::Set {
                    object,
                    name,
                    value: Box::new(value),
                }),
                _ => Err(OscriptError::parse(
                    "Invalid assignment target.",
                    equals.lexeme,
                    equals.line,
                )),
            };
        }
        Ok(expr)
    }

    fn or(&mut self) -> Result<Expr, OscriptError> {
        let mut expr = self.and()?;
        while self.match_kind(&[TokenKind::Or]) {
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

    fn and(&mut self) -> Result<Expr, OscriptError> {
        let mut expr = self.equality()?;
        while self.match_kind(&[TokenKind::And]) {
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

    fn equality(&mut self) -> Result<Expr, OscriptError> {
        let mut expr = self.comparison()?;
        while self.match_kind(&[TokenKind::BangEqual, TokenKind::EqualEqual]) {
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

    fn comparison(&mut self) -> Result<Expr, OscriptError> {
        let mut expr = self.term()?;
        while self.match_kind(&[
            TokenKind::Greater,
            TokenKind::GreaterEqual,
            TokenKind::Less,
            TokenKind::LessEqual,
        ]) {
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

    fn term(&mut self) -> Result<Expr, OscriptError> {
        let mut expr = self.factor()?;
        while self.match_kind(&[TokenKind::Minus, TokenKind::Plus]) {
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

    fn factor(&mut self) -> Result<Expr, OscriptError> {
        let mut expr = self.unary()?;
        while self.match_kind(&[TokenKind::Slash, TokenKind::Star]) {
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

    fn unary(&mut self) -> Result<Expr, OscriptError> {
        if self.match_kind(&[TokenKind::Bang, TokenKind::Minus]) {
            let operator = self.previous().clone();
            let right = self.unary()?;
            return Ok(Expr::Unary {
                operator,
                right: Box::new(right),
            });
        }
        self.call()
    }

    fn call(&mut self) -> Result<Expr, OscriptError> {
        let mut expr = self.primary()?;
        loop {
            if self.match_kind(&[TokenKind::LeftParen]) {
                expr = self.finish_call(expr)?;
            } else if self.match_kind(&[TokenKind::Dot]) {
                let name = self.consume(TokenKind::Identifier, "Expect property name after '.'.")?;
                expr = Expr::Get {
                    object: Box::new(expr),
                    name,
                };
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn finish_call(&mut self, callee: Expr) -> Result<Expr, OscriptError> {
        let mut arguments = Vec::new();
        if !self.check(TokenKind::RightParen) {
            loop {
                if arguments.len() >= MAX_ARGS {
                    return Err(self.error("Can't have more than 255 arguments."));
                }
                arguments.push(self.expression()?);
                if !self.match_kind(&[TokenKind::Comma]) {
                    break;
                }
            }
        }
        let paren = self.consume(TokenKind::RightParen, "Expect ')' after arguments.")?;
        Ok(Expr::Call {
            callee: Box::new(callee),
            paren,
            arguments,
        })
    }

    fn primary(&mut self) -> Result<Expr, OscriptError> {
        if self.match_kind(&[TokenKind::False]) {
            return Ok(Expr::Literal(LiteralValue::Bool(false)));
        }
        if self.match_kind(&[TokenKind::True]) {
            return Ok(Expr::Literal(LiteralValue::Bool(true)));
        }
        if self.match_kind(&[TokenKind::Nil]) {
            return Ok(Expr::Literal(LiteralValue::Nil));
        }
        if self.match_kind(&[TokenKind::Number]) {
            return match &self.previous().literal {
                Literal::Number(n) => Ok(Expr::Literal(LiteralValue::Number(*n))),
                _ => unreachable!("scanner always attaches Number literal to Number tokens"),
            };
        }
        if self.match_kind(&[TokenKind::String]) {
            return match &self.previous().literal {
                Literal::String(s) => Ok(Expr::Literal(LiteralValue::String(s.clone()))),
                _ => unreachable!("scanner always attaches String literal to String tokens"),
            };
        }
        if self.match_kind(&[TokenKind::This]) {
            return Ok(Expr::This(self.previous().clone()));
        }
        if self.match_kind(&[TokenKind::New]) {
            let class_name =
                self.consume(TokenKind::Identifier, "Expect class name after 'new'.")?;
            self.consume(TokenKind::LeftParen, "Expect '(' after class name.")?;
            let mut arguments = Vec::new();
            if !self.check(TokenKind::RightParen) {
                loop {
                    if arguments.len() >= MAX_ARGS {
                        return Err(self.error("Can't have more than 255 arguments."));
                    }
                    arguments.push(self.expression()?);
                    if !self.match_kind(&[TokenKind::Comma]) {
                        break;
                    }
                }
            }
            self.consume(TokenKind::RightParen, "Expect ')' after arguments.")?;
            return Ok(Expr::New {
                class_name,
                arguments,
            });
        }
        if self.match_kind(&[TokenKind::Identifier]) {
            return Ok(Expr::Variable(self.previous().clone()));
        }
        if self.match_kind(&[TokenKind::LeftParen]) {
            let expr = self.expression()?;
            self.consume(TokenKind::RightParen, "Expect ')' after expression.")?;
            return Ok(Expr::Grouping(Box::new(expr)));
        }
        Err(self.error("Expect expression."))
    }

    // --- token-stream helpers ---

    fn match_kind(&mut self, kinds: &[TokenKind]) -> bool {
        for &kind in kinds {
            if self.check(kind) {
                self.advance();
                return true;
            }
        }
        false
    }

    fn consume(&mut self, kind: TokenKind, message: &str) -> Result<Token, OscriptError> {
        if self.check(kind) {
            return Ok(self.advance().clone());
        }
        Err(self.error(message))
    }

    fn check(&self, kind: TokenKind) -> bool {
        if self.is_at_end() {
            return false;
        }
        self.peek().kind == kind
    }

    fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous()
    }

    fn is_at_end(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current - 1]
    }

    fn error(&self, message: &str) -> OscriptError {
        let token = self.peek();
        OscriptError::parse(message, token.lexeme.clone(), token.line)
    }
}

/// Scan and parse source text into a statement tree in one step.
pub fn parse(source: &str) -> Result<Vec<Stmt>, OscriptError> {
    let tokens = crate::token::scan(source)?;
    Parser::new(tokens).parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_var_and_print() {
        let stmts = parse("var x = 1; print x;").unwrap();
        assert_eq!(stmts.len(), 2);
    }

    #[test]
    fn parses_class_with_init_and_method() {
        let stmts = parse(
            "class Counter { fun init(v) { this.value = v; } fun inc() { this.value = this.value + 1; } }",
        )
        .unwrap();
        match &stmts[0] {
            Stmt::Class { methods, .. } => assert_eq!(methods.len(), 2),
            other => panic!("expected class, got {:?}", other),
        }
    }

    #[test]
    fn parses_new_expression() {
        let stmts = parse("var c = new Counter(0);").unwrap();
        match &stmts[0] {
            Stmt::Var {
                initializer: Some(Expr::New { arguments, .. }),
                ..
            } => assert_eq!(arguments.len(), 1),
            other => panic!("expected var with New initializer, got {:?}", other),
        }
    }

    #[test]
    fn invalid_assignment_target_is_parse_error() {
        let err = parse("1 = 2;").unwrap_err();
        assert!(matches!(err, OscriptError::Parse { .. }));
    }

    #[test]
    fn if_else_and_while_parse() {
        let stmts = parse("if (true) { print 1; } else { print 2; } while (false) { print 3; }").unwrap();
        assert_eq!(stmts.len(), 2);
    }

    #[test]
    fn property_get_and_set_parse() {
        let stmts = parse("c.x = c.y;").unwrap();
        match &stmts[0] {
            Stmt::Expression(Expr::Set { .. }) => {}
            other => panic!("expected Set expression statement, got {:?}", other),
        }
    }

    #[test]
    fn call_chain_parses() {
        let stmts = parse("c.undo();").unwrap();
        match &stmts[0] {
            Stmt::Expression(Expr::Call { .. }) => {}
            other => panic!("expected call expression statement, got {:?}", other),
        }
    }
}
