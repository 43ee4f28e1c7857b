//! Recursive-descent parser over a comment-skipping token cursor.
//!
//! Errors are collected rather than thrown: `report_error` records the message
//! with the offending token's location, sets a sticky error flag, and
//! synchronizes the cursor to the next statement boundary so a single mistake
//! does not cascade. Parsing yields no `Program` once the flag is set.

use thiserror::Error;

use crate::ast::{
    ArrowBody, AssignOp, BinaryOp, Expression, Program, Statement, SwitchCase, UnaryOp,
};
use crate::token::{Token, TokenKind};

pub mod ast;

use std::rc::Rc;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("[Syntax Error] Line {line}, Column {column}: {message} (near '{token}')")]
pub struct ParseError {
    pub message: String,
    pub token: String,
    pub line: u32,
    pub column: u32,
}

pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
    previous: usize,
    errors: Vec<ParseError>,
    had_error: bool,
}

impl Parser {
    pub fn new(mut tokens: Vec<Token>) -> Self {
        if tokens.is_empty() {
            tokens.push(Token::end_of_file(Default::default()));
        }
        Self {
            tokens,
            current: 0,
            previous: 0,
            errors: Vec::new(),
            had_error: false,
        }
    }

    pub fn parse_program(mut self) -> Result<Program, Vec<ParseError>> {
        let mut statements = Vec::new();
        while !self.is_at_end() {
            let statement = self.parse_statement();
            if self.had_error {
                break;
            }
            match statement {
                Some(statement) => statements.push(statement),
                // Skip a token so a null statement cannot stall the loop.
                None => {
                    self.advance();
                }
            }
        }

        if self.had_error {
            Err(self.errors)
        } else {
            Ok(Program { statements })
        }
    }

    // === cursor ===

    fn peek_index(&self) -> usize {
        let mut index = self.current;
        while index < self.tokens.len() && self.tokens[index].kind == TokenKind::Comment {
            index += 1;
        }
        index.min(self.tokens.len() - 1)
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.peek_index()]
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.previous]
    }

    fn is_at_end(&self) -> bool {
        self.peek().kind == TokenKind::EndOfFile
    }

    fn check(&self, kind: TokenKind) -> bool {
        !self.is_at_end() && self.peek().kind == kind
    }

    fn advance(&mut self) -> Token {
        let index = self.peek_index();
        self.previous = index;
        if self.tokens[index].kind != TokenKind::EndOfFile {
            self.current = index + 1;
        }
        self.tokens[index].clone()
    }

    fn match_kind(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            return true;
        }
        false
    }

    fn match_kinds(&mut self, kinds: &[TokenKind]) -> bool {
        kinds.iter().any(|kind| self.match_kind(*kind))
    }

    fn consume(&mut self, kind: TokenKind, message: &str) -> Option<Token> {
        if self.check(kind) {
            return Some(self.advance());
        }
        self.report_error_at_peek(message);
        None
    }

    // === error reporting ===

    fn report_error_at_peek(&mut self, message: &str) {
        let token = self.peek().clone();
        self.report_error(&token, message);
    }

    fn report_error_at_previous(&mut self, message: &str) {
        let token = self.previous().clone();
        self.report_error(&token, message);
    }

    fn report_error(&mut self, at_token: &Token, message: &str) {
        self.had_error = true;

        let mut display = at_token.lexeme.clone();
        if display.chars().count() > 50 {
            display = display.chars().take(50).collect::<String>() + "...";
        }

        let error = ParseError {
            message: message.to_string(),
            token: display,
            line: at_token.location.line,
            column: at_token.location.column,
        };
        tracing::error!(target: "magicscript", "{error}");
        self.errors.push(error);

        self.synchronize();
    }

    /// Advances at least one token, then scans forward until just past a
    /// semicolon or at a statement-opener keyword.
    fn synchronize(&mut self) {
        self.advance();

        while !self.is_at_end() {
            if self.previous().kind == TokenKind::Semicolon {
                return;
            }
            match self.peek().kind {
                TokenKind::Let
                | TokenKind::Const
                | TokenKind::Spell
                | TokenKind::Import
                | TokenKind::If
                | TokenKind::Switch
                | TokenKind::While
                | TokenKind::For
                | TokenKind::Return
                | TokenKind::LBrace => return,
                _ => {}
            }
            self.advance();
        }
    }

    // === statements ===

    fn parse_statement(&mut self) -> Option<Statement> {
        if self.match_kind(TokenKind::Import) {
            return self.parse_import_statement();
        }
        if self.match_kind(TokenKind::Let) {
            return self.parse_variable_declaration(false);
        }
        if self.match_kind(TokenKind::Const) {
            return self.parse_variable_declaration(true);
        }
        if self.match_kind(TokenKind::Spell) {
            return self.parse_spell_declaration();
        }
        if self.match_kind(TokenKind::If) {
            return self.parse_if_statement();
        }
        if self.match_kind(TokenKind::Switch) {
            return self.parse_switch_statement();
        }
        if self.match_kind(TokenKind::While) {
            return self.parse_while_statement();
        }
        if self.match_kind(TokenKind::For) {
            return self.parse_for_statement();
        }
        if self.match_kind(TokenKind::Return) {
            return self.parse_return_statement();
        }
        if self.match_kind(TokenKind::LBrace) {
            return self.parse_block_statement();
        }
        self.parse_expression_statement()
    }

    fn parse_import_statement(&mut self) -> Option<Statement> {
        let path = self.consume(TokenKind::String, "Expected string literal after 'import'.")?;
        self.consume(TokenKind::Semicolon, "Expected ';' after import statement.")?;
        Some(Statement::Import { path: path.lexeme })
    }

    fn parse_variable_declaration(&mut self, is_const: bool) -> Option<Statement> {
        let name = self.consume(TokenKind::Identifier, "Expected variable name.")?;

        let initializer = if self.match_kind(TokenKind::Equal) {
            self.parse_expression()
        } else {
            None
        };

        self.consume(TokenKind::Semicolon, "Expected ';' after variable declaration.")?;
        Some(Statement::VarDecl {
            is_const,
            name: name.lexeme,
            initializer,
        })
    }

    fn parse_spell_declaration(&mut self) -> Option<Statement> {
        let name = self.consume(TokenKind::Identifier, "Expected function name.")?;
        self.consume(TokenKind::LParen, "Expected '(' after function name.")?;

        let mut parameters = Vec::new();
        if !self.check(TokenKind::RParen) {
            loop {
                let parameter = self.consume(TokenKind::Identifier, "Expected parameter name.")?;
                parameters.push(parameter.lexeme);
                if !self.match_kind(TokenKind::Comma) {
                    break;
                }
            }
        }

        self.consume(TokenKind::RParen, "Expected ')' after parameters.")?;
        self.consume(TokenKind::LBrace, "Expected '{' before function body.")?;
        let body = self.parse_block_statement()?;

        Some(Statement::FuncDecl {
            name: name.lexeme,
            parameters,
            body: Rc::new(body),
        })
    }

    fn parse_if_statement(&mut self) -> Option<Statement> {
        self.consume(TokenKind::LParen, "Expected '(' after 'if'.")?;
        let condition = self.parse_expression()?;
        self.consume(TokenKind::RParen, "Expected ')' after if condition.")?;

        let then_branch = Box::new(self.parse_statement()?);
        let else_branch = if self.match_kind(TokenKind::Else) {
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };

        Some(Statement::If {
            condition,
            then_branch,
            else_branch,
        })
    }

    fn parse_switch_statement(&mut self) -> Option<Statement> {
        self.consume(TokenKind::LParen, "Expected '(' after 'switch'.")?;
        let scrutinee = self.parse_expression()?;
        self.consume(TokenKind::RParen, "Expected ')' after switch expression.")?;
        self.consume(TokenKind::LBrace, "Expected '{' after switch expression.")?;

        let mut cases = Vec::new();
        let mut found_default = false;

        while !self.check(TokenKind::RBrace) && !self.is_at_end() {
            if self.match_kind(TokenKind::Case) {
                let value = self.parse_expression()?;
                self.consume(TokenKind::Colon, "Expected ':' after case value.")?;

                // Statement accumulation stops at the next case/default arm.
                let mut body = Vec::new();
                while !self.check(TokenKind::Case)
                    && !self.check(TokenKind::Default)
                    && !self.check(TokenKind::RBrace)
                    && !self.is_at_end()
                {
                    if let Some(statement) = self.parse_statement() {
                        body.push(statement);
                    }
                }
                cases.push(SwitchCase {
                    value: Some(value),
                    body,
                });
            } else if self.match_kind(TokenKind::Default) {
                if found_default {
                    self.report_error_at_peek("Multiple 'default' cases in switch statement.");
                }
                found_default = true;
                self.consume(TokenKind::Colon, "Expected ':' after 'default'.")?;

                let mut body = Vec::new();
                while !self.check(TokenKind::RBrace) && !self.is_at_end() {
                    if let Some(statement) = self.parse_statement() {
                        body.push(statement);
                    }
                }
                cases.push(SwitchCase { value: None, body });
            } else {
                self.report_error_at_peek("Expected 'case' or 'default' in switch statement.");
                break;
            }
        }

        self.consume(TokenKind::RBrace, "Expected '}' after switch statement.")?;
        Some(Statement::Switch { scrutinee, cases })
    }

    fn parse_while_statement(&mut self) -> Option<Statement> {
        self.consume(TokenKind::LParen, "Expected '(' after 'while'.")?;
        let condition = self.parse_expression()?;
        self.consume(TokenKind::RParen, "Expected ')' after while condition.")?;

        let body = Box::new(self.parse_statement()?);
        Some(Statement::While {
            condition: Some(condition),
            body,
        })
    }

    fn parse_for_statement(&mut self) -> Option<Statement> {
        self.consume(TokenKind::LParen, "Expected '(' after 'for'.")?;

        let init = if self.check(TokenKind::Semicolon) {
            self.advance();
            None
        } else if self.match_kind(TokenKind::Let) {
            Some(Box::new(self.parse_variable_declaration(false)?))
        } else if self.match_kind(TokenKind::Const) {
            Some(Box::new(self.parse_variable_declaration(true)?))
        } else {
            Some(Box::new(self.parse_expression_statement()?))
        };

        let condition = if !self.check(TokenKind::Semicolon) {
            Some(self.parse_expression()?)
        } else {
            None
        };
        self.consume(TokenKind::Semicolon, "Expected ';' after for condition.")?;

        let increment = if !self.check(TokenKind::RParen) {
            Some(self.parse_expression()?)
        } else {
            None
        };
        self.consume(TokenKind::RParen, "Expected ')' after for clauses.")?;

        let body = Box::new(self.parse_statement()?);
        Some(Statement::For {
            init,
            condition,
            increment,
            body,
        })
    }

    fn parse_return_statement(&mut self) -> Option<Statement> {
        if self.check(TokenKind::Semicolon) {
            self.advance();
            return Some(Statement::Return(None));
        }
        let value = self.parse_expression()?;
        self.consume(TokenKind::Semicolon, "Expected ';' after return value.")?;
        Some(Statement::Return(Some(value)))
    }

    fn parse_block_statement(&mut self) -> Option<Statement> {
        let mut statements = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.is_at_end() {
            match self.parse_statement() {
                Some(statement) => statements.push(statement),
                None => {
                    self.advance();
                }
            }
        }
        self.consume(TokenKind::RBrace, "Expected '}' after block.")?;
        Some(Statement::Block(statements))
    }

    fn parse_expression_statement(&mut self) -> Option<Statement> {
        let expression = self.parse_expression()?;
        self.consume(TokenKind::Semicolon, "Expected ';' after expression.")?;
        Some(Statement::Expr(expression))
    }

    // === expressions ===

    fn parse_expression(&mut self) -> Option<Expression> {
        self.parse_assignment()
    }

    fn parse_assignment(&mut self) -> Option<Expression> {
        let left = self.parse_logical_or()?;

        let op = if self.match_kind(TokenKind::Equal) {
            AssignOp::Assign
        } else if self.match_kind(TokenKind::PlusEqual) {
            AssignOp::Add
        } else if self.match_kind(TokenKind::MinusEqual) {
            AssignOp::Sub
        } else if self.match_kind(TokenKind::StarEqual) {
            AssignOp::Mul
        } else if self.match_kind(TokenKind::SlashEqual) {
            AssignOp::Div
        } else if self.match_kind(TokenKind::PercentEqual) {
            AssignOp::Mod
        } else {
            return Some(left);
        };

        let value = Box::new(self.parse_assignment()?);

        match left {
            Expression::Identifier(name) => Some(Expression::Assignment {
                op,
                target: name,
                index: None,
                member: None,
                value,
            }),
            Expression::MemberAccess { target, member } => {
                if let Expression::Identifier(name) = *target {
                    if op != AssignOp::Assign {
                        self.report_error_at_previous(
                            "Compound assignment to an object member is not supported.",
                        );
                        return Some(Expression::MemberAccess {
                            target: Box::new(Expression::Identifier(name)),
                            member,
                        });
                    }
                    Some(Expression::Assignment {
                        op,
                        target: name,
                        index: None,
                        member: Some(member),
                        value,
                    })
                } else {
                    self.report_error_at_previous("Invalid assignment target for member access.");
                    Some(Expression::MemberAccess { target, member })
                }
            }
            Expression::Index { target, index } => {
                if let Expression::Identifier(name) = *target {
                    if op != AssignOp::Assign {
                        self.report_error_at_previous(
                            "Compound assignment to an array index is not supported.",
                        );
                        return Some(Expression::Index {
                            target: Box::new(Expression::Identifier(name)),
                            index,
                        });
                    }
                    Some(Expression::Assignment {
                        op,
                        target: name,
                        index: Some(index),
                        member: None,
                        value,
                    })
                } else {
                    self.report_error_at_previous("Invalid assignment target for indexed expression.");
                    Some(Expression::Index { target, index })
                }
            }
            other => {
                self.report_error_at_previous("Invalid assignment target.");
                Some(other)
            }
        }
    }

    fn parse_logical_or(&mut self) -> Option<Expression> {
        let mut expression = self.parse_logical_and()?;
        while self.match_kind(TokenKind::OrOr) {
            let right = self.parse_logical_and()?;
            expression = Expression::Binary {
                op: BinaryOp::Or,
                left: Box::new(expression),
                right: Box::new(right),
            };
        }
        Some(expression)
    }

    fn parse_logical_and(&mut self) -> Option<Expression> {
        let mut expression = self.parse_equality()?;
        while self.match_kind(TokenKind::AndAnd) {
            let right = self.parse_equality()?;
            expression = Expression::Binary {
                op: BinaryOp::And,
                left: Box::new(expression),
                right: Box::new(right),
            };
        }
        Some(expression)
    }

    fn parse_equality(&mut self) -> Option<Expression> {
        let mut expression = self.parse_relational()?;
        while self.match_kinds(&[TokenKind::EqualEqual, TokenKind::BangEqual]) {
            let op = if self.previous().kind == TokenKind::EqualEqual {
                BinaryOp::Equal
            } else {
                BinaryOp::NotEqual
            };
            let right = self.parse_relational()?;
            expression = Expression::Binary {
                op,
                left: Box::new(expression),
                right: Box::new(right),
            };
        }
        Some(expression)
    }

    fn parse_relational(&mut self) -> Option<Expression> {
        let mut expression = self.parse_additive()?;
        while self.match_kinds(&[
            TokenKind::Less,
            TokenKind::LessEqual,
            TokenKind::Greater,
            TokenKind::GreaterEqual,
        ]) {
            let op = match self.previous().kind {
                TokenKind::Less => BinaryOp::Less,
                TokenKind::LessEqual => BinaryOp::LessEqual,
                TokenKind::Greater => BinaryOp::Greater,
                _ => BinaryOp::GreaterEqual,
            };
            let right = self.parse_additive()?;
            expression = Expression::Binary {
                op,
                left: Box::new(expression),
                right: Box::new(right),
            };
        }
        Some(expression)
    }

    fn parse_additive(&mut self) -> Option<Expression> {
        let mut expression = self.parse_multiplicative()?;
        while self.match_kinds(&[TokenKind::Plus, TokenKind::Minus]) {
            let op = if self.previous().kind == TokenKind::Plus {
                BinaryOp::Add
            } else {
                BinaryOp::Sub
            };
            let right = self.parse_multiplicative()?;
            expression = Expression::Binary {
                op,
                left: Box::new(expression),
                right: Box::new(right),
            };
        }
        Some(expression)
    }

    fn parse_multiplicative(&mut self) -> Option<Expression> {
        let mut expression = self.parse_unary()?;
        while self.match_kinds(&[TokenKind::Star, TokenKind::Slash, TokenKind::Percent]) {
            let op = match self.previous().kind {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                _ => BinaryOp::Mod,
            };
            let right = self.parse_unary()?;
            expression = Expression::Binary {
                op,
                left: Box::new(expression),
                right: Box::new(right),
            };
        }
        Some(expression)
    }

    fn parse_unary(&mut self) -> Option<Expression> {
        let op = if self.match_kind(TokenKind::Bang) {
            UnaryOp::Not
        } else if self.match_kind(TokenKind::Minus) {
            UnaryOp::Negate
        } else if self.match_kind(TokenKind::PlusPlus) {
            UnaryOp::PreIncrement
        } else if self.match_kind(TokenKind::MinusMinus) {
            UnaryOp::PreDecrement
        } else {
            return self.parse_primary();
        };

        let operand = Box::new(self.parse_unary()?);
        Some(Expression::Unary { op, operand })
    }

    fn parse_primary(&mut self) -> Option<Expression> {
        if self.match_kind(TokenKind::LBrace) {
            return self.parse_object_literal();
        }

        if self.match_kind(TokenKind::LBracket) {
            let mut elements = Vec::new();
            if !self.check(TokenKind::RBracket) {
                loop {
                    elements.push(self.parse_expression()?);
                    if !self.match_kind(TokenKind::Comma) {
                        break;
                    }
                }
            }
            self.consume(TokenKind::RBracket, "Expected ']' after array elements.")?;
            return Some(Expression::ArrayLiteral(elements));
        }

        if self.match_kind(TokenKind::LParen) {
            return self.parse_grouping_or_arrow();
        }

        if self.match_kinds(&[
            TokenKind::Number,
            TokenKind::String,
            TokenKind::True,
            TokenKind::False,
            TokenKind::Null,
        ]) {
            return Some(Expression::Literal(self.previous().clone()));
        }

        if self.match_kind(TokenKind::Identifier) {
            let name = self.previous().clone();

            if self.match_kind(TokenKind::LParen) {
                let mut arguments = Vec::new();
                if !self.check(TokenKind::RParen) {
                    loop {
                        arguments.push(self.parse_expression()?);
                        if !self.match_kind(TokenKind::Comma) {
                            break;
                        }
                    }
                }
                self.consume(TokenKind::RParen, "Expected ')' after arguments.")?;
                return self.parse_postfix(Expression::Call {
                    callee: name.lexeme,
                    arguments,
                    this_value: None,
                });
            }

            return self.parse_postfix(Expression::Identifier(name.lexeme));
        }

        self.report_error_at_peek("Unexpected token in expression.");
        None
    }

    fn parse_object_literal(&mut self) -> Option<Expression> {
        let mut properties = Vec::new();

        if self.check(TokenKind::RBrace) {
            self.advance();
            return Some(Expression::ObjectLiteral(properties));
        }

        loop {
            // Keys are identifiers or string literals (the lexer already
            // strips string quotes).
            let key = if self.match_kind(TokenKind::Identifier)
                || self.match_kind(TokenKind::String)
            {
                self.previous().lexeme.clone()
            } else {
                if self.check(TokenKind::RBrace) {
                    break;
                }
                self.report_error_at_peek(
                    "Expected property name (identifier or string) in object literal.",
                );
                break;
            };

            self.consume(
                TokenKind::Colon,
                "Expected ':' after property name in object literal.",
            )?;
            let value = self.parse_expression()?;
            properties.push((key, value));

            if self.match_kind(TokenKind::Comma) {
                // Trailing comma before the closing brace is allowed.
                if self.check(TokenKind::RBrace) {
                    break;
                }
            } else {
                break;
            }
        }

        self.consume(TokenKind::RBrace, "Expected '}' after object properties.")?;
        Some(Expression::ObjectLiteral(properties))
    }

    /// Speculatively parses `(a, b) => ...`; rewinds to parse a grouped
    /// expression when the lookahead does not commit to an arrow function.
    fn parse_grouping_or_arrow(&mut self) -> Option<Expression> {
        let saved_current = self.current;
        let saved_previous = self.previous;

        let mut parameters = Vec::new();
        if self.check(TokenKind::Identifier) {
            loop {
                let token = self.advance();
                if token.kind == TokenKind::Identifier {
                    parameters.push(token.lexeme);
                } else {
                    break;
                }
                if !self.match_kind(TokenKind::Comma) {
                    break;
                }
            }
        }

        if self.check(TokenKind::RParen) {
            self.advance();
            if self.check(TokenKind::Arrow) {
                self.advance();
                return self.parse_arrow_function(parameters);
            }
        }

        self.current = saved_current;
        self.previous = saved_previous;

        let inner = self.parse_expression()?;
        self.consume(TokenKind::RParen, "Expected ')' after expression.")?;
        Some(Expression::Grouping(Box::new(inner)))
    }

    fn parse_arrow_function(&mut self, parameters: Vec<String>) -> Option<Expression> {
        let body = if self.match_kind(TokenKind::LBrace) {
            ArrowBody::Block(Rc::new(self.parse_block_statement()?))
        } else {
            ArrowBody::Expression(Box::new(self.parse_expression()?))
        };
        Some(Expression::ArrowFunction { parameters, body })
    }

    fn parse_postfix(&mut self, mut left: Expression) -> Option<Expression> {
        loop {
            if self.match_kind(TokenKind::LBracket) {
                let index = self.parse_expression()?;
                self.consume(TokenKind::RBracket, "Expected ']' after index.")?;
                left = Expression::Index {
                    target: Box::new(left),
                    index: Box::new(index),
                };
            } else if self.match_kind(TokenKind::Dot) {
                let member = self
                    .consume(TokenKind::Identifier, "Expected member name after '.'.")?
                    .lexeme;

                if self.match_kind(TokenKind::LParen) {
                    // Method-call form. Keep the receiver expression so the
                    // interpreter can re-route array receivers to Array.*.
                    let callee = match &left {
                        Expression::Identifier(name) => format!("{name}.{member}"),
                        _ => format!("Array.{member}"),
                    };
                    let mut arguments = Vec::new();
                    if !self.check(TokenKind::RParen) {
                        loop {
                            arguments.push(self.parse_expression()?);
                            if !self.match_kind(TokenKind::Comma) {
                                break;
                            }
                        }
                    }
                    self.consume(TokenKind::RParen, "Expected ')' after arguments.")?;
                    left = Expression::Call {
                        callee,
                        arguments,
                        this_value: Some(Box::new(left)),
                    };
                } else {
                    left = Expression::MemberAccess {
                        target: Box::new(left),
                        member,
                    };
                }
            } else if self.match_kind(TokenKind::PlusPlus) {
                left = Expression::Postfix {
                    operand: Box::new(left),
                    is_increment: true,
                };
            } else if self.match_kind(TokenKind::MinusMinus) {
                left = Expression::Postfix {
                    operand: Box::new(left),
                    is_increment: false,
                };
            } else {
                break;
            }
        }
        Some(left)
    }
}

pub fn parse_tokens(tokens: Vec<Token>) -> Result<Program, Vec<ParseError>> {
    Parser::new(tokens).parse_program()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use indoc::indoc;

    fn parse(source: &str) -> Program {
        parse_tokens(tokenize(source)).expect("parse failed")
    }

    fn parse_errors(source: &str) -> Vec<ParseError> {
        parse_tokens(tokenize(source)).expect_err("expected parse failure")
    }

    #[test]
    fn parses_spell_declaration_with_body() {
        let program = parse(indoc! {r#"
            spell add(a, b) {
                return a + b;
            }
        "#});

        assert_eq!(program.statements.len(), 1);
        let Statement::FuncDecl {
            name,
            parameters,
            body,
        } = &program.statements[0]
        else {
            panic!("expected FuncDecl, got {:?}", program.statements[0]);
        };
        assert_eq!(name, "add");
        assert_eq!(parameters, &["a", "b"]);
        let Statement::Block(statements) = &**body else {
            panic!("expected block body");
        };
        assert!(matches!(statements[0], Statement::Return(Some(_))));
    }

    #[test]
    fn parses_variable_declarations() {
        let program = parse("let x = 1; const y = 2; let z;");
        assert!(matches!(
            &program.statements[0],
            Statement::VarDecl { is_const: false, name, initializer: Some(_) } if name == "x"
        ));
        assert!(matches!(
            &program.statements[1],
            Statement::VarDecl { is_const: true, name, initializer: Some(_) } if name == "y"
        ));
        assert!(matches!(
            &program.statements[2],
            Statement::VarDecl { is_const: false, name, initializer: None } if name == "z"
        ));
    }

    #[test]
    fn binds_multiplication_tighter_than_addition() {
        let program = parse("let r = 1 + 2 * 3;");
        let Statement::VarDecl {
            initializer: Some(Expression::Binary { op, right, .. }),
            ..
        } = &program.statements[0]
        else {
            panic!("expected initialized declaration");
        };
        assert_eq!(*op, BinaryOp::Add);
        assert!(matches!(
            &**right,
            Expression::Binary { op: BinaryOp::Mul, .. }
        ));
    }

    #[test]
    fn assignment_is_right_associative() {
        let program = parse("a = b = 1;");
        let Statement::Expr(Expression::Assignment { target, value, .. }) = &program.statements[0]
        else {
            panic!("expected assignment expression");
        };
        assert_eq!(target, "a");
        assert!(matches!(&**value, Expression::Assignment { target, .. } if target == "b"));
    }

    #[test]
    fn parses_arrow_function_and_grouping_separately() {
        let program = parse("let f = (x, y) => x + y; let g = (1 + 2);");

        let Statement::VarDecl {
            initializer: Some(Expression::ArrowFunction { parameters, body }),
            ..
        } = &program.statements[0]
        else {
            panic!("expected arrow function initializer");
        };
        assert_eq!(parameters, &["x", "y"]);
        assert!(matches!(body, ArrowBody::Expression(_)));

        let Statement::VarDecl {
            initializer: Some(Expression::Grouping(_)),
            ..
        } = &program.statements[1]
        else {
            panic!("expected grouped initializer");
        };
    }

    #[test]
    fn parses_zero_parameter_arrow_with_block_body() {
        let program = parse("let f = () => { return 1; };");
        let Statement::VarDecl {
            initializer: Some(Expression::ArrowFunction { parameters, body }),
            ..
        } = &program.statements[0]
        else {
            panic!("expected arrow function initializer");
        };
        assert!(parameters.is_empty());
        assert!(matches!(body, ArrowBody::Block(_)));
    }

    #[test]
    fn member_call_records_receiver_and_dotted_callee() {
        let program = parse("arr.push_back(4);");
        let Statement::Expr(Expression::Call {
            callee,
            arguments,
            this_value,
        }) = &program.statements[0]
        else {
            panic!("expected call expression");
        };
        assert_eq!(callee, "arr.push_back");
        assert_eq!(arguments.len(), 1);
        assert!(matches!(
            this_value.as_deref(),
            Some(Expression::Identifier(name)) if name == "arr"
        ));
    }

    #[test]
    fn chained_member_call_falls_back_to_array_callee() {
        let program = parse("a.b.c();");
        let Statement::Expr(Expression::Call { callee, this_value, .. }) = &program.statements[0]
        else {
            panic!("expected call expression");
        };
        assert_eq!(callee, "Array.c");
        assert!(matches!(
            this_value.as_deref(),
            Some(Expression::MemberAccess { .. })
        ));
    }

    #[test]
    fn parses_index_and_member_assignments() {
        let program = parse("a[0] = 1; o.x = 2;");
        assert!(matches!(
            &program.statements[0],
            Statement::Expr(Expression::Assignment {
                op: AssignOp::Assign,
                target,
                index: Some(_),
                member: None,
                ..
            }) if target == "a"
        ));
        assert!(matches!(
            &program.statements[1],
            Statement::Expr(Expression::Assignment {
                op: AssignOp::Assign,
                target,
                index: None,
                member: Some(member),
                ..
            }) if target == "o" && member == "x"
        ));
    }

    #[test]
    fn rejects_compound_assignment_to_member_or_index() {
        let errors = parse_errors("o.x += 1;");
        assert!(errors[0].message.contains("Compound assignment"));

        let errors = parse_errors("a[0] += 1;");
        assert!(errors[0].message.contains("Compound assignment"));
    }

    #[test]
    fn rejects_invalid_assignment_target() {
        let errors = parse_errors("1 = 2;");
        assert!(errors[0].message.contains("Invalid assignment target"));
    }

    #[test]
    fn parses_switch_with_cases_and_default() {
        let program = parse(indoc! {r#"
            switch (x) {
                case 1:
                    a = 1;
                    b = 2;
                case 2:
                    a = 3;
                default:
                    a = 4;
            }
        "#});
        let Statement::Switch { cases, .. } = &program.statements[0] else {
            panic!("expected switch statement");
        };
        assert_eq!(cases.len(), 3);
        assert!(cases[0].value.is_some());
        assert_eq!(cases[0].body.len(), 2);
        assert!(cases[1].value.is_some());
        assert!(cases[2].value.is_none());
    }

    #[test]
    fn rejects_multiple_default_cases() {
        let errors = parse_errors(indoc! {r#"
            switch (x) {
                default:
                    a = 1;
                default:
                    a = 2;
            }
        "#});
        assert!(
            errors
                .iter()
                .any(|error| error.message.contains("Multiple 'default' cases"))
        );
    }

    #[test]
    fn parses_for_with_declaration_init_and_empty_clauses() {
        let program = parse("for (let i = 0; i < 10; i = i + 1) { s = s + i; } for (;;) {}");

        let Statement::For {
            init,
            condition,
            increment,
            ..
        } = &program.statements[0]
        else {
            panic!("expected for statement");
        };
        assert!(matches!(
            init.as_deref(),
            Some(Statement::VarDecl { name, .. }) if name == "i"
        ));
        assert!(condition.is_some());
        assert!(increment.is_some());

        let Statement::For {
            init,
            condition,
            increment,
            ..
        } = &program.statements[1]
        else {
            panic!("expected second for statement");
        };
        assert!(init.is_none());
        assert!(condition.is_none());
        assert!(increment.is_none());
    }

    #[test]
    fn parses_object_literal_with_trailing_comma() {
        let program = parse(r#"let o = { x: 1, "two words": 2, };"#);
        let Statement::VarDecl {
            initializer: Some(Expression::ObjectLiteral(properties)),
            ..
        } = &program.statements[0]
        else {
            panic!("expected object literal initializer");
        };
        assert_eq!(properties.len(), 2);
        assert_eq!(properties[0].0, "x");
        assert_eq!(properties[1].0, "two words");
    }

    #[test]
    fn parses_import_statement() {
        let program = parse(r#"import "Scripts/util.ms";"#);
        assert!(matches!(
            &program.statements[0],
            Statement::Import { path } if path == "Scripts/util.ms"
        ));
    }

    #[test]
    fn parses_postfix_and_prefix_increment() {
        let program = parse("x++; --y;");
        assert!(matches!(
            &program.statements[0],
            Statement::Expr(Expression::Postfix { is_increment: true, .. })
        ));
        assert!(matches!(
            &program.statements[1],
            Statement::Expr(Expression::Unary { op: UnaryOp::PreDecrement, .. })
        ));
    }

    #[test]
    fn comments_are_skipped_by_the_cursor() {
        let program = parse(indoc! {r#"
            // declaration below
            let x = /* inline */ 1;
        "#});
        assert!(matches!(&program.statements[0], Statement::VarDecl { .. }));
    }

    #[test]
    fn reports_error_with_location_and_token() {
        let errors = parse_errors("let x 1;");
        assert_eq!(errors.len(), 1);
        let error = &errors[0];
        assert!(error.message.contains("Expected ';'") || error.message.contains("Expected"));
        assert_eq!(error.line, 1);
        assert_eq!(error.token, "1");
    }

    #[test]
    fn stops_collecting_statements_after_first_error() {
        let result = parse_tokens(tokenize("let = 1; let y = 2;"));
        let errors = result.expect_err("expected parse failure");
        assert!(!errors.is_empty());
    }
}
