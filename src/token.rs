//! Scanner for O-script.
//!
//! Consumes source text and produces a terminated token stream. Fails on an
//! unterminated string or an unrecognized lead character, with the offending
//! line number attached.

use crate::error::OscriptError;
use std::fmt;

/// The closed set of token kinds O-script recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,
    Comma,
    Dot,
    Minus,
    Plus,
    Semicolon,
    Slash,
    Star,

    Bang,
    BangEqual,
    Equal,
    EqualEqual,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,

    Identifier,
    String,
    Number,

    And,
    Class,
    Else,
    False,
    Fun,
    If,
    Nil,
    Or,
    Print,
    Return,
    This,
    True,
    Var,
    While,
    New,

    Eof,
}

/// A literal value attached to a token (numbers and strings only).
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Number(f64),
    String(String),
    None,
}

/// A single scanned token: kind, original lexeme, optional literal, line.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub literal: Literal,
    pub line: usize,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.lexeme)
    }
}

fn keyword(text: &str) -> Option<TokenKind> {
    Some(match text {
        "and" => TokenKind::And,
        "class" => TokenKind::Class,
        "else" => TokenKind::Else,
        "false" => TokenKind::False,
        "fun" => TokenKind::Fun,
        "if" => TokenKind::If,
        "nil" => TokenKind::Nil,
        "or" => TokenKind::Or,
        "print" => TokenKind::Print,
        "return" => TokenKind::Return,
        "this" => TokenKind::This,
        "true" => TokenKind::True,
        "var" => TokenKind::Var,
        "while" => TokenKind::While,
        "new" => TokenKind::New,
        _ => return None,
    })
}

/// Scans O-script source text into a token stream terminated by `Eof`.
pub struct Scanner {
    source: Vec<char>,
    tokens: Vec<Token>,
    start: usize,
    current: usize,
    line: usize,
}

impl Scanner {
    pub fn new(source: &str) -> Self {
        Self {
            source: source.chars().collect(),
            tokens: Vec::new(),
            start: 0,
            current: 0,
            line: 1,
        }
    }

    pub fn scan_tokens(mut self) -> Result<Vec<Token>, OscriptError> {
        while !self.is_at_end() {
            self.start = self.current;
            self.scan_token()?;
        }
        self.tokens.push(Token {
            kind: TokenKind::Eof,
            lexeme: String::new(),
            literal: Literal::None,
            line: self.line,
        });
        Ok(self.tokens)
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.source.len()
    }

    fn advance(&mut self) -> char {
        let c = self.source[self.current];
        self.current += 1;
        c
    }

    fn add_token(&mut self, kind: TokenKind) {
        self.add_token_literal(kind, Literal::None);
    }

    fn add_token_literal(&mut self, kind: TokenKind, literal: Literal) {
        let text: String = self.source[self.start..self.current].iter().collect();
        self.tokens.push(Token {
            kind,
            lexeme: text,
            literal,
            line: self.line,
        });
    }

    fn match_char(&mut self, expected: char) -> bool {
        if self.is_at_end() || self.source[self.current] != expected {
            return false;
        }
        self.current += 1;
        true
    }

    fn peek(&self) -> char {
        if self.is_at_end() {
            '\0'
        } else {
            self.source[self.current]
        }
    }

    fn peek_next(&self) -> char {
        if self.current + 1 >= self.source.len() {
            '\0'
        } else {
            self.source[self.current + 1]
        }
    }

    fn scan_token(&mut self) -> Result<(), OscriptError> {
        let c = self.advance();
        match c {
            '(' => self.add_token(TokenKind::LeftParen),
            ')' => self.add_token(TokenKind::RightParen),
            '{' => self.add_token(TokenKind::LeftBrace),
            '}' => self.add_token(TokenKind::RightBrace),
            ',' => self.add_token(TokenKind::Comma),
            '.' => self.add_token(TokenKind::Dot),
            '-' => self.add_token(TokenKind::Minus),
            '+' => self.add_token(TokenKind::Plus),
            ';' => self.add_token(TokenKind::Semicolon),
            '*' => self.add_token(TokenKind::Star),
            '!' => {
                let kind = if self.match_char('=') {
                    TokenKind::BangEqual
                } else {
                    TokenKind::Bang
                };
                self.add_token(kind);
            }
            '=' => {
                let kind = if self.match_char('=') {
                    TokenKind::EqualEqual
                } else {
                    TokenKind::Equal
                };
                self.add_token(kind);
            }
            '<' => {
                let kind = if self.match_char('=') {
                    TokenKind::LessEqual
                } else {
                    TokenKind::Less
                };
                self.add_token(kind);
            }
            '>' => {
                let kind = if self.match_char('=') {
                    TokenKind::GreaterEqual
                } else {
                    TokenKind::Greater
                };
                self.add_token(kind);
            }
            '/' => {
                if self.match_char('/') {
                    while self.peek() != '\n' && !self.is_at_end() {
                        self.advance();
                    }
                } else {
                    self.add_token(TokenKind::Slash);
                }
            }
            ' ' | '\r' | '\t' => {}
            '\n' => self.line += 1,
            '"' => self.string()?,
            c if c.is_ascii_digit() => self.number(),
            c if c.is_alphabetic() || c == '_' => self.identifier(),
            other => {
                return Err(OscriptError::scan(
                    format!("Unexpected character: {:?}", other),
                    self.line,
                ))
            }
        }
        Ok(())
    }

    fn string(&mut self) -> Result<(), OscriptError> {
        while self.peek() != '"' && !self.is_at_end() {
            if self.peek() == '\n' {
                self.line += 1;
            }
            self.advance();
        }
        if self.is_at_end() {
            return Err(OscriptError::scan("Unterminated string.", self.line));
        }
        self.advance(); // closing quote
        let value: String = self.source[self.start + 1..self.current - 1]
            .iter()
            .collect();
        self.add_token_literal(TokenKind::String, Literal::String(value));
        Ok(())
    }

    fn number(&mut self) {
        while self.peek().is_ascii_digit() {
            self.advance();
        }
        if self.peek() == '.' && self.peek_next().is_ascii_digit() {
            self.advance();
            while self.peek().is_ascii_digit() {
                self.advance();
            }
        }
        let text: String = self.source[self.start..self.current].iter().collect();
        let value: f64 = text.parse().expect("scanner only admits digit/. runs");
        self.add_token_literal(TokenKind::Number, Literal::Number(value));
    }

    fn identifier(&mut self) {
        while self.peek().is_alphanumeric() || self.peek() == '_' {
            self.advance();
        }
        let text: String = self.source[self.start..self.current].iter().collect();
        match keyword(&text) {
            Some(kind) => self.add_token(kind),
            None => self.add_token(TokenKind::Identifier),
        }
    }
}

pub fn scan(source: &str) -> Result<Vec<Token>, OscriptError> {
    Scanner::new(source).scan_tokens()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        scan(src).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn scans_punctuation_and_operators() {
        assert_eq!(
            kinds("(){};,.-+*!= == <= >="),
            vec![
                TokenKind::LeftParen,
                TokenKind::RightParen,
                TokenKind::LeftBrace,
                TokenKind::RightBrace,
                TokenKind::Semicolon,
                TokenKind::Comma,
                TokenKind::Dot,
                TokenKind::Minus,
                TokenKind::Plus,
                TokenKind::Star,
                TokenKind::BangEqual,
                TokenKind::EqualEqual,
                TokenKind::LessEqual,
                TokenKind::GreaterEqual,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn scans_keywords_vs_identifiers() {
        let tokens = scan("class fun new foo_bar").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Class);
        assert_eq!(tokens[1].kind, TokenKind::Fun);
        assert_eq!(tokens[2].kind, TokenKind::New);
        assert_eq!(tokens[3].kind, TokenKind::Identifier);
    }

    #[test]
    fn scans_string_with_embedded_newline_and_tracks_line() {
        let tokens = scan("\"a\nb\" true").unwrap();
        match &tokens[0].literal {
            Literal::String(s) => assert_eq!(s, "a\nb"),
            other => panic!("expected string literal, got {:?}", other),
        }
        assert_eq!(tokens[1].line, 2);
    }

    #[test]
    fn unterminated_string_is_scan_error() {
        let err = scan("\"abc").unwrap_err();
        assert!(matches!(err, OscriptError::Scan { .. }));
    }

    #[test]
    fn line_comment_is_skipped() {
        let tokens = scan("1 // a comment\n2").unwrap();
        assert_eq!(tokens.len(), 3); // Number, Number, Eof
    }

    #[test]
    fn integral_number_literal() {
        let tokens = scan("42").unwrap();
        assert_eq!(tokens[0].literal, Literal::Number(42.0));
    }
}
