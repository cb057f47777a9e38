use std::rc::Rc;

use crate::ast::{Expr, FunctionDecl, Param, Stmt};
use crate::error::{ClouError, Result};
use crate::token::{Token, TokenType};

const MAX_ARITY: usize = 255;

/// Recursive-descent parser over a pre-scanned token buffer.
///
/// Grammar precedence, lowest to highest: assignment, `or`, `and`,
/// equality, comparison, additive, multiplicative, unary, power
/// (right-associative), call/member/index, primary.
pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Parser { tokens, current: 0 }
    }

    /// Parse the whole token stream into a statement list.
    ///
    /// Reports the first error and aborts, after synchronising to the next
    /// statement boundary so the parser state stays coherent.
    pub fn parse(&mut self) -> Result<Vec<Stmt>> {
        let mut statements: Vec<Stmt> = Vec::new();

        while !self.is_at_end() {
            match self.declaration() {
                Ok(stmt) => statements.push(stmt),

                Err(e) => {
                    self.synchronize();
                    return Err(e);
                }
            }
        }

        Ok(statements)
    }

    // Declarations

    fn declaration(&mut self) -> Result<Stmt> {
        if self.match_tokens(&[TokenType::CLASS]) {
            return self.class_declaration();
        }

        if self.match_tokens(&[TokenType::FUNCTION]) {
            return self.function_declaration();
        }

        if self.match_tokens(&[TokenType::LET]) {
            return self.var_declaration(false);
        }

        if self.match_tokens(&[TokenType::CONST]) {
            return self.var_declaration(true);
        }

        self.statement()
    }

    fn class_declaration(&mut self) -> Result<Stmt> {
        let name: Token = self.consume(&TokenType::IDENTIFIER, "Expect class name.")?;

        let superclass: Option<Token> = if self.match_tokens(&[TokenType::EXTENDS]) {
            Some(self.consume(&TokenType::IDENTIFIER, "Expect superclass name.")?)
        } else {
            None
        };

        self.consume(&TokenType::LEFT_BRACE, "Expect '{' before class body.")?;

        let mut methods: Vec<Rc<FunctionDecl>> = Vec::new();

        while !self.check(&TokenType::RIGHT_BRACE) && !self.is_at_end() {
            self.consume(&TokenType::FUNCTION, "Expect 'function' before method name.")?;

            let method_name: Token = self.consume(&TokenType::IDENTIFIER, "Expect method name.")?;

            methods.push(self.function_body(Some(method_name))?);
        }

        self.consume(&TokenType::RIGHT_BRACE, "Expect '}' after class body.")?;

        Ok(Stmt::Class {
            name,
            superclass,
            methods,
        })
    }

    fn function_declaration(&mut self) -> Result<Stmt> {
        let name: Token = self.consume(&TokenType::IDENTIFIER, "Expect function name.")?;

        Ok(Stmt::Function(self.function_body(Some(name))?))
    }

    /// Parameter list and body, shared between declarations, methods, and
    /// anonymous function expressions.
    fn function_body(&mut self, name: Option<Token>) -> Result<Rc<FunctionDecl>> {
        let opener: &str = if name.is_some() {
            "Expect '(' after function name."
        } else {
            "Expect '(' after 'function'."
        };

        self.consume(&TokenType::LEFT_PAREN, opener)?;

        let mut params: Vec<Param> = Vec::new();

        if !self.check(&TokenType::RIGHT_PAREN) {
            loop {
                if params.len() >= MAX_ARITY {
                    return Err(ClouError::parse(
                        self.peek().line,
                        "Can't have more than 255 parameters.",
                    ));
                }

                if self.match_tokens(&[TokenType::SPREAD]) {
                    let rest_name: Token =
                        self.consume(&TokenType::IDENTIFIER, "Expect parameter name after '...'.")?;

                    params.push(Param {
                        name: rest_name,
                        default: None,
                        is_rest: true,
                    });

                    if self.match_tokens(&[TokenType::COMMA]) {
                        return Err(ClouError::parse(
                            self.peek().line,
                            "Rest parameter must be the last parameter.",
                        ));
                    }

                    break;
                }

                let param_name: Token =
                    self.consume(&TokenType::IDENTIFIER, "Expect parameter name.")?;

                let default: Option<Expr> = if self.match_tokens(&[TokenType::EQUAL]) {
                    Some(self.expression()?)
                } else {
                    None
                };

                params.push(Param {
                    name: param_name,
                    default,
                    is_rest: false,
                });

                if !self.match_tokens(&[TokenType::COMMA]) {
                    break;
                }
            }
        }

        self.consume(&TokenType::RIGHT_PAREN, "Expect ')' after parameters.")?;
        self.consume(&TokenType::LEFT_BRACE, "Expect '{' before function body.")?;

        let body: Vec<Stmt> = self.block_statements()?;

        Ok(Rc::new(FunctionDecl { name, params, body }))
    }

    fn var_declaration(&mut self, is_const: bool) -> Result<Stmt> {
        let name: Token = self.consume(&TokenType::IDENTIFIER, "Expect variable name.")?;

        let initializer: Option<Expr> = if self.match_tokens(&[TokenType::EQUAL]) {
            Some(self.expression()?)
        } else {
            None
        };

        if is_const && initializer.is_none() {
            return Err(ClouError::parse(
                name.line,
                "Const declaration requires an initializer.",
            ));
        }

        self.consume(
            &TokenType::SEMICOLON,
            "Expect ';' after variable declaration.",
        )?;

        Ok(Stmt::Var {
            name,
            initializer,
            is_const,
        })
    }

    // Statements

    fn statement(&mut self) -> Result<Stmt> {
        if self.match_tokens(&[TokenType::IF]) {
            return self.if_statement();
        }

        if self.match_tokens(&[TokenType::WHILE]) {
            return self.while_statement();
        }

        if self.match_tokens(&[TokenType::FOR]) {
            return self.for_statement();
        }

        if self.match_tokens(&[TokenType::RETURN]) {
            return self.return_statement();
        }

        if self.match_tokens(&[TokenType::LEFT_BRACE]) {
            return Ok(Stmt::Block(self.block_statements()?));
        }

        self.expression_statement()
    }

    fn if_statement(&mut self) -> Result<Stmt> {
        self.consume(&TokenType::LEFT_PAREN, "Expect '(' after 'if'.")?;

        let condition: Expr = self.expression()?;

        self.consume(&TokenType::RIGHT_PAREN, "Expect ')' after if condition.")?;

        let then_branch: Box<Stmt> = Box::new(self.statement()?);

        let else_branch: Option<Box<Stmt>> = if self.match_tokens(&[TokenType::ELSE]) {
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

    fn while_statement(&mut self) -> Result<Stmt> {
        self.consume(&TokenType::LEFT_PAREN, "Expect '(' after 'while'.")?;

        let condition: Expr = self.expression()?;

        self.consume(&TokenType::RIGHT_PAREN, "Expect ')' after while condition.")?;

        let body: Box<Stmt> = Box::new(self.statement()?);

        Ok(Stmt::While { condition, body })
    }

    /// `for` desugars here; the evaluator only ever sees `While`.
    ///
    /// `for (init; cond; incr) body` becomes
    /// `{ init; while (cond) { body; incr; } }`.
    fn for_statement(&mut self) -> Result<Stmt> {
        self.consume(&TokenType::LEFT_PAREN, "Expect '(' after 'for'.")?;

        let initializer: Option<Stmt> = if self.match_tokens(&[TokenType::SEMICOLON]) {
            None
        } else if self.match_tokens(&[TokenType::LET]) {
            Some(self.var_declaration(false)?)
        } else if self.match_tokens(&[TokenType::CONST]) {
            Some(self.var_declaration(true)?)
        } else {
            Some(self.expression_statement()?)
        };

        let condition: Option<Expr> = if !self.check(&TokenType::SEMICOLON) {
            Some(self.expression()?)
        } else {
            None
        };

        self.consume(&TokenType::SEMICOLON, "Expect ';' after loop condition.")?;

        let increment: Option<Expr> = if !self.check(&TokenType::RIGHT_PAREN) {
            Some(self.expression()?)
        } else {
            None
        };

        let paren: Token = self.consume(&TokenType::RIGHT_PAREN, "Expect ')' after for clauses.")?;

        let mut body: Stmt = self.statement()?;

        if let Some(incr) = increment {
            body = Stmt::Block(vec![body, Stmt::Expression(incr)]);
        }

        let condition: Expr = condition.unwrap_or_else(|| {
            Expr::Literal(Token::new(TokenType::TRUE, "true".to_string(), paren.line))
        });

        body = Stmt::While {
            condition,
            body: Box::new(body),
        };

        if let Some(init) = initializer {
            body = Stmt::Block(vec![init, body]);
        }

        Ok(body)
    }

    fn return_statement(&mut self) -> Result<Stmt> {
        let keyword: Token = self.previous().clone();

        let value: Option<Expr> = if !self.check(&TokenType::SEMICOLON) {
            Some(self.expression()?)
        } else {
            None
        };

        self.consume(&TokenType::SEMICOLON, "Expect ';' after return value.")?;

        Ok(Stmt::Return { keyword, value })
    }

    fn block_statements(&mut self) -> Result<Vec<Stmt>> {
        let mut statements: Vec<Stmt> = Vec::new();

        while !self.check(&TokenType::RIGHT_BRACE) && !self.is_at_end() {
            statements.push(self.declaration()?);
        }

        self.consume(&TokenType::RIGHT_BRACE, "Expect '}' after block.")?;

        Ok(statements)
    }

    fn expression_statement(&mut self) -> Result<Stmt> {
        let expr: Expr = self.expression()?;

        self.consume(&TokenType::SEMICOLON, "Expect ';' after expression.")?;

        Ok(Stmt::Expression(expr))
    }

    // Expressions

    fn expression(&mut self) -> Result<Expr> {
        self.assignment()
    }

    fn assignment(&mut self) -> Result<Expr> {
        let expr: Expr = self.or()?;

        if self.match_tokens(&[TokenType::EQUAL]) {
            let equals: Token = self.previous().clone();
            let value: Expr = self.assignment()?;

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

                Expr::Index {
                    object,
                    bracket,
                    index,
                } => Ok(Expr::IndexAssign {
                    object,
                    bracket,
                    index,
                    value: Box::new(value),
                }),

                _ => Err(ClouError::parse(equals.line, "Invalid assignment target.")),
            };
        }

        Ok(expr)
    }

    fn or(&mut self) -> Result<Expr> {
        let mut expr: Expr = self.and()?;

        while self.match_tokens(&[TokenType::OR]) {
            let op: Token = self.previous().clone();
            let right: Expr = self.and()?;

            expr = Expr::Logical {
                left: Box::new(expr),
                op,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn and(&mut self) -> Result<Expr> {
        let mut expr: Expr = self.equality()?;

        while self.match_tokens(&[TokenType::AND]) {
            let op: Token = self.previous().clone();
            let right: Expr = self.equality()?;

            expr = Expr::Logical {
                left: Box::new(expr),
                op,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn equality(&mut self) -> Result<Expr> {
        let mut expr: Expr = self.comparison()?;

        while self.match_tokens(&[TokenType::BANG_EQUAL, TokenType::EQUAL_EQUAL]) {
            let op: Token = self.previous().clone();
            let right: Expr = self.comparison()?;

            expr = Expr::Binary {
                left: Box::new(expr),
                op,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn comparison(&mut self) -> Result<Expr> {
        let mut expr: Expr = self.term()?;

        while self.match_tokens(&[
            TokenType::GREATER,
            TokenType::GREATER_EQUAL,
            TokenType::LESS,
            TokenType::LESS_EQUAL,
        ]) {
            let op: Token = self.previous().clone();
            let right: Expr = self.term()?;

            expr = Expr::Binary {
                left: Box::new(expr),
                op,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn term(&mut self) -> Result<Expr> {
        let mut expr: Expr = self.factor()?;

        while self.match_tokens(&[TokenType::MINUS, TokenType::PLUS]) {
            let op: Token = self.previous().clone();
            let right: Expr = self.factor()?;

            expr = Expr::Binary {
                left: Box::new(expr),
                op,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn factor(&mut self) -> Result<Expr> {
        let mut expr: Expr = self.unary()?;

        while self.match_tokens(&[TokenType::SLASH, TokenType::STAR, TokenType::PERCENT]) {
            let op: Token = self.previous().clone();
            let right: Expr = self.unary()?;

            expr = Expr::Binary {
                left: Box::new(expr),
                op,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn unary(&mut self) -> Result<Expr> {
        if self.match_tokens(&[TokenType::BANG, TokenType::MINUS]) {
            let op: Token = self.previous().clone();
            let right: Expr = self.unary()?;

            return Ok(Expr::Unary {
                op,
                right: Box::new(right),
            });
        }

        self.power()
    }

    /// `^` binds tighter than unary and associates to the right; the
    /// right-hand side re-enters `unary` so `2 ^ -3` and `2 ^ 3 ^ 2`
    /// both parse the expected way.
    fn power(&mut self) -> Result<Expr> {
        let expr: Expr = self.call()?;

        if self.match_tokens(&[TokenType::CARET]) {
            let op: Token = self.previous().clone();
            let right: Expr = self.unary()?;

            return Ok(Expr::Binary {
                left: Box::new(expr),
                op,
                right: Box::new(right),
            });
        }

        Ok(expr)
    }

    fn call(&mut self) -> Result<Expr> {
        let mut expr: Expr = self.primary()?;

        loop {
            if self.match_tokens(&[TokenType::LEFT_PAREN]) {
                expr = self.finish_call(expr)?;
            } else if self.match_tokens(&[TokenType::DOT]) {
                let name: Token =
                    self.consume(&TokenType::IDENTIFIER, "Expect property name after '.'.")?;

                expr = Expr::Get {
                    object: Box::new(expr),
                    name,
                };
            } else if self.match_tokens(&[TokenType::LEFT_BRACKET]) {
                let bracket: Token = self.previous().clone();
                let index: Expr = self.expression()?;

                self.consume(&TokenType::RIGHT_BRACKET, "Expect ']' after index.")?;

                expr = Expr::Index {
                    object: Box::new(expr),
                    bracket,
                    index: Box::new(index),
                };
            } else {
                break;
            }
        }

        Ok(expr)
    }

    fn finish_call(&mut self, callee: Expr) -> Result<Expr> {
        let arguments: Vec<Expr> = self.argument_list()?;
        let paren: Token = self.consume(&TokenType::RIGHT_PAREN, "Expect ')' after arguments.")?;

        Ok(Expr::Call {
            callee: Box::new(callee),
            paren,
            arguments,
        })
    }

    fn argument_list(&mut self) -> Result<Vec<Expr>> {
        let mut arguments: Vec<Expr> = Vec::new();

        if !self.check(&TokenType::RIGHT_PAREN) {
            loop {
                if arguments.len() >= MAX_ARITY {
                    return Err(ClouError::parse(
                        self.peek().line,
                        "Can't have more than 255 arguments.",
                    ));
                }

                arguments.push(self.expression()?);

                if !self.match_tokens(&[TokenType::COMMA]) {
                    break;
                }
            }
        }

        Ok(arguments)
    }

    fn primary(&mut self) -> Result<Expr> {
        if self.match_tokens(&[
            TokenType::NUMBER(0.0),
            TokenType::STRING(String::new()),
            TokenType::TRUE,
            TokenType::FALSE,
            TokenType::NULL,
        ]) {
            return Ok(Expr::Literal(self.previous().clone()));
        }

        if self.match_tokens(&[TokenType::THIS]) {
            return Ok(Expr::This(self.previous().clone()));
        }

        if self.match_tokens(&[TokenType::SUPER]) {
            let keyword: Token = self.previous().clone();

            self.consume(&TokenType::DOT, "Expect '.' after 'super'.")?;

            let method: Token =
                self.consume(&TokenType::IDENTIFIER, "Expect superclass method name.")?;

            return Ok(Expr::Super { keyword, method });
        }

        if self.match_tokens(&[TokenType::NEW]) {
            let name: Token = self.consume(&TokenType::IDENTIFIER, "Expect class name after 'new'.")?;

            self.consume(&TokenType::LEFT_PAREN, "Expect '(' after class name.")?;

            let arguments: Vec<Expr> = self.argument_list()?;
            let paren: Token =
                self.consume(&TokenType::RIGHT_PAREN, "Expect ')' after arguments.")?;

            return Ok(Expr::New {
                name,
                paren,
                arguments,
            });
        }

        if self.match_tokens(&[TokenType::FUNCTION]) {
            return Ok(Expr::Function(self.function_body(None)?));
        }

        if self.match_tokens(&[TokenType::IDENTIFIER]) {
            return Ok(Expr::Variable(self.previous().clone()));
        }

        if self.match_tokens(&[TokenType::LEFT_PAREN]) {
            let expr: Expr = self.expression()?;

            self.consume(&TokenType::RIGHT_PAREN, "Expect ')' after expression.")?;

            return Ok(Expr::Grouping(Box::new(expr)));
        }

        if self.match_tokens(&[TokenType::LEFT_BRACKET]) {
            let bracket: Token = self.previous().clone();
            let mut elements: Vec<Expr> = Vec::new();

            if !self.check(&TokenType::RIGHT_BRACKET) {
                loop {
                    elements.push(self.expression()?);

                    if !self.match_tokens(&[TokenType::COMMA]) {
                        break;
                    }
                }
            }

            self.consume(&TokenType::RIGHT_BRACKET, "Expect ']' after array elements.")?;

            return Ok(Expr::Array { bracket, elements });
        }

        if self.match_tokens(&[TokenType::LEFT_BRACE]) {
            let brace: Token = self.previous().clone();
            let mut properties: Vec<(Token, Expr)> = Vec::new();

            if !self.check(&TokenType::RIGHT_BRACE) {
                loop {
                    let key: Token =
                        self.consume(&TokenType::IDENTIFIER, "Expect property name.")?;

                    self.consume(&TokenType::COLON, "Expect ':' after property name.")?;

                    properties.push((key, self.expression()?));

                    if !self.match_tokens(&[TokenType::COMMA]) {
                        break;
                    }
                }
            }

            self.consume(&TokenType::RIGHT_BRACE, "Expect '}' after object literal.")?;

            return Ok(Expr::Object { brace, properties });
        }

        Err(ClouError::parse(self.peek().line, "Expect expression."))
    }

    // Token-buffer plumbing

    fn match_tokens(&mut self, types: &[TokenType]) -> bool {
        for token_type in types {
            if self.check(token_type) {
                self.advance();
                return true;
            }
        }

        false
    }

    fn consume(&mut self, token_type: &TokenType, message: &str) -> Result<Token> {
        if self.check(token_type) {
            return Ok(self.advance().clone());
        }

        Err(ClouError::parse(self.peek().line, message))
    }

    fn check(&self, token_type: &TokenType) -> bool {
        if self.is_at_end() {
            return false;
        }

        &self.peek().token_type == token_type
    }

    fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.current += 1;
        }

        self.previous()
    }

    fn is_at_end(&self) -> bool {
        self.peek().token_type == TokenType::EOF
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current - 1]
    }

    /// Skip ahead to the next statement boundary after a parse error.
    fn synchronize(&mut self) {
        self.advance();

        while !self.is_at_end() {
            if self.previous().token_type == TokenType::SEMICOLON {
                return;
            }

            match self.peek().token_type {
                TokenType::CLASS
                | TokenType::FUNCTION
                | TokenType::LET
                | TokenType::CONST
                | TokenType::FOR
                | TokenType::IF
                | TokenType::WHILE
                | TokenType::RETURN => return,

                _ => {
                    self.advance();
                }
            }
        }
    }
}
