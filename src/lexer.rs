//! Single forward pass over the source with a tracked line/column cursor.
//!
//! Lexing never fails as a Rust error: malformed input produces `Error` tokens
//! that carry the message in their lexeme, and downstream stages treat their
//! presence as a fatal lex error. Comments are emitted as `Comment` tokens so
//! the parser can skip them uniformly.

use crate::token::{SourceLocation, Token, TokenKind};

pub struct Lexer {
    chars: Vec<char>,
    index: usize,
    location: SourceLocation,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            index: 0,
            location: SourceLocation::default(),
        }
    }

    fn is_at_end(&self) -> bool {
        self.index >= self.chars.len()
    }

    fn peek(&self) -> char {
        if self.is_at_end() {
            '\0'
        } else {
            self.chars[self.index]
        }
    }

    fn peek_next(&self) -> char {
        if self.index + 1 >= self.chars.len() {
            '\0'
        } else {
            self.chars[self.index + 1]
        }
    }

    fn advance(&mut self) -> char {
        if self.is_at_end() {
            return '\0';
        }
        let c = self.chars[self.index];
        self.index += 1;
        if c == '\n' {
            self.location.line += 1;
            self.location.column = 1;
        } else {
            self.location.column += 1;
        }
        c
    }

    fn match_char(&mut self, expected: char) -> bool {
        if self.is_at_end() || self.chars[self.index] != expected {
            return false;
        }
        self.advance();
        true
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), ' ' | '\t' | '\r' | '\n') {
            self.advance();
        }
    }

    fn slice(&self, start: usize) -> String {
        self.chars[start..self.index].iter().collect()
    }

    fn lex_comment(&mut self, start_location: SourceLocation) -> Token {
        let start = self.index;
        self.advance(); // first /
        if self.peek() == '/' {
            // Line comment; the terminating newline stays in the stream.
            while !self.is_at_end() && self.peek() != '\n' {
                self.advance();
            }
        } else {
            // Block comment.
            self.advance(); // *
            while !self.is_at_end() {
                if self.peek() == '*' && self.peek_next() == '/' {
                    self.advance();
                    self.advance();
                    break;
                }
                self.advance();
            }
        }
        Token::new(TokenKind::Comment, self.slice(start), start_location)
    }

    fn lex_identifier_or_keyword(&mut self, start_location: SourceLocation) -> Token {
        let start = self.index;
        while !self.is_at_end() && is_identifier_char(self.peek()) {
            self.advance();
        }
        let text = self.slice(start);
        let kind = match text.as_str() {
            "let" => TokenKind::Let,
            "const" => TokenKind::Const,
            "spell" => TokenKind::Spell,
            "import" => TokenKind::Import,
            "if" => TokenKind::If,
            "else" => TokenKind::Else,
            "switch" => TokenKind::Switch,
            "case" => TokenKind::Case,
            "default" => TokenKind::Default,
            "for" => TokenKind::For,
            "while" => TokenKind::While,
            "return" => TokenKind::Return,
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            "null" => TokenKind::Null,
            _ => TokenKind::Identifier,
        };
        Token::new(kind, text, start_location)
    }

    fn lex_number(&mut self, start_location: SourceLocation) -> Token {
        let start = self.index;
        while !self.is_at_end() && self.peek().is_ascii_digit() {
            self.advance();
        }
        if self.peek() == '.' && self.peek_next().is_ascii_digit() {
            self.advance();
            while !self.is_at_end() && self.peek().is_ascii_digit() {
                self.advance();
            }
        }
        Token::new(TokenKind::Number, self.slice(start), start_location)
    }

    fn lex_string(&mut self, start_location: SourceLocation) -> Token {
        self.advance(); // opening quote
        let start = self.index;
        while !self.is_at_end() && self.peek() != '"' {
            let c = self.advance();
            if c == '\\' && !self.is_at_end() {
                // Backslash escapes the next character; the concrete escape
                // mapping is left to higher layers.
                self.advance();
            }
        }
        if self.is_at_end() {
            return Token::new(TokenKind::Error, "Unterminated string literal", start_location);
        }
        let raw = self.slice(start);
        self.advance(); // closing quote
        Token::new(TokenKind::String, raw, start_location)
    }

    fn lex_operator_or_separator(&mut self, start_location: SourceLocation) -> Token {
        let c = self.advance();
        let token = |kind: TokenKind, text: &str| Token::new(kind, text, start_location);
        match c {
            '+' => {
                if self.match_char('+') {
                    token(TokenKind::PlusPlus, "++")
                } else if self.match_char('=') {
                    token(TokenKind::PlusEqual, "+=")
                } else {
                    token(TokenKind::Plus, "+")
                }
            }
            '-' => {
                if self.match_char('-') {
                    token(TokenKind::MinusMinus, "--")
                } else if self.match_char('=') {
                    token(TokenKind::MinusEqual, "-=")
                } else {
                    token(TokenKind::Minus, "-")
                }
            }
            '*' => {
                if self.match_char('=') {
                    token(TokenKind::StarEqual, "*=")
                } else {
                    token(TokenKind::Star, "*")
                }
            }
            '%' => {
                if self.match_char('=') {
                    token(TokenKind::PercentEqual, "%=")
                } else {
                    token(TokenKind::Percent, "%")
                }
            }
            '/' => {
                // Comments were handled before this point, so this is a real slash.
                if self.match_char('=') {
                    token(TokenKind::SlashEqual, "/=")
                } else {
                    token(TokenKind::Slash, "/")
                }
            }
            '(' => token(TokenKind::LParen, "("),
            ')' => token(TokenKind::RParen, ")"),
            '{' => token(TokenKind::LBrace, "{"),
            '}' => token(TokenKind::RBrace, "}"),
            '[' => token(TokenKind::LBracket, "["),
            ']' => token(TokenKind::RBracket, "]"),
            '.' => token(TokenKind::Dot, "."),
            ',' => token(TokenKind::Comma, ","),
            ';' => token(TokenKind::Semicolon, ";"),
            ':' => token(TokenKind::Colon, ":"),
            '!' => {
                if self.match_char('=') {
                    token(TokenKind::BangEqual, "!=")
                } else {
                    token(TokenKind::Bang, "!")
                }
            }
            '=' => {
                if self.match_char('=') {
                    token(TokenKind::EqualEqual, "==")
                } else if self.match_char('>') {
                    token(TokenKind::Arrow, "=>")
                } else {
                    token(TokenKind::Equal, "=")
                }
            }
            '<' => {
                if self.match_char('=') {
                    token(TokenKind::LessEqual, "<=")
                } else {
                    token(TokenKind::Less, "<")
                }
            }
            '>' => {
                if self.match_char('=') {
                    token(TokenKind::GreaterEqual, ">=")
                } else {
                    token(TokenKind::Greater, ">")
                }
            }
            '&' if self.match_char('&') => token(TokenKind::AndAnd, "&&"),
            '|' if self.match_char('|') => token(TokenKind::OrOr, "||"),
            _ => Token::new(
                TokenKind::Error,
                format!("Unexpected character '{c}'"),
                start_location,
            ),
        }
    }

    pub fn tokenize(mut self) -> Vec<Token> {
        let mut tokens = Vec::with_capacity(128);

        loop {
            self.skip_whitespace();
            if self.is_at_end() {
                break;
            }

            let start_location = self.location;
            let c = self.peek();

            if c == '/' && matches!(self.peek_next(), '/' | '*') {
                tokens.push(self.lex_comment(start_location));
                continue;
            }
            if c.is_alphabetic() || c == '_' {
                tokens.push(self.lex_identifier_or_keyword(start_location));
                continue;
            }
            if c.is_ascii_digit() {
                tokens.push(self.lex_number(start_location));
                continue;
            }
            if c == '"' {
                tokens.push(self.lex_string(start_location));
                continue;
            }

            tokens.push(self.lex_operator_or_separator(start_location));
        }

        tokens.push(Token::end_of_file(self.location));
        tokens
    }
}

fn is_identifier_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Tokenizes `source` into a stream always terminated by one `EndOfFile` token.
pub fn tokenize(source: &str) -> Vec<Token> {
    Lexer::new(source).tokenize()
}
