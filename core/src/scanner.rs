use log::{debug, trace};
use thiserror::Error;

use crate::reporter::ErrorReporter;
use crate::token::{Token, TokenType};
use crate::types::Literal;

pub type ScanResult<T> = std::result::Result<T, ScanError>;

// Offsets are byte indices into `source`. Only ASCII takes part in the grammar.
pub struct Scanner<'a> {
    source: &'a str,
    tokens: Vec<Token>,
    start: usize,
    current: usize,
    line: u32,
    start_line: u32,
}

impl<'a> Scanner<'a> {
    pub fn new(source: &'a str) -> Self {
        Scanner {
            source,
            tokens: Vec::new(),
            start: 0,
            current: 0,
            line: 1,
            start_line: 1,
        }
    }

    pub fn scan_tokens<R>(mut self, reporter: &mut R) -> Vec<Token>
    where
        R: ErrorReporter + ?Sized,
    {
        debug!("scanning {} bytes", self.source.len());

        while !self.is_at_end() {
            self.start = self.current;
            self.start_line = self.line;
            if let Err(err) = self.scan_token() {
                reporter.report(err.line, "", &err.to_string());
            }
        }

        self.tokens.push(Token::eof(self.line));

        debug!("scanned {} tokens", self.tokens.len());
        self.tokens
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.source.len()
    }

    fn scan_token(&mut self) -> ScanResult<()> {
        match self.advance() {
            // Single character tokens
            '(' => self.add_token(TokenType::LeftParen, None),
            ')' => self.add_token(TokenType::RightParen, None),
            '{' => self.add_token(TokenType::LeftBrace, None),
            '}' => self.add_token(TokenType::RightBrace, None),
            ',' => self.add_token(TokenType::Comma, None),
            '.' => self.add_token(TokenType::Dot, None),
            '-' => self.add_token(TokenType::Minus, None),
            '+' => self.add_token(TokenType::Plus, None),
            ';' => self.add_token(TokenType::Semicolon, None),
            '*' => self.add_token(TokenType::Star, None),

            // One or two character tokens
            '!' => {
                if self.matches('=') {
                    self.add_token(TokenType::BangEqual, None)
                } else {
                    self.add_token(TokenType::Bang, None)
                }
            }
            '=' => {
                if self.matches('=') {
                    self.add_token(TokenType::EqualEqual, None)
                } else {
                    self.add_token(TokenType::Equal, None)
                }
            }
            '>' => {
                if self.matches('=') {
                    self.add_token(TokenType::GreaterEqual, None)
                } else {
                    self.add_token(TokenType::Greater, None)
                }
            }
            '<' => {
                if self.matches('=') {
                    self.add_token(TokenType::LessEqual, None)
                } else {
                    self.add_token(TokenType::Less, None)
                }
            }

            // Comments
            '/' => {
                if self.matches('/') {
                    // A comment goes until the end of the line
                    while self.peek().is_some_and(|c| c != '\n') {
                        self.advance();
                    }
                    Ok(())
                } else if self.matches('*') {
                    self.block_comment()
                } else {
                    self.add_token(TokenType::Slash, None)
                }
            }

            // Ignore whitespace
            ' ' | '\r' | '\t' => Ok(()),

            '\n' => {
                self.line += 1;
                Ok(())
            }

            '"' => self.string(),

            c if Self::is_digit(c) => self.number(),
            c if Self::is_alpha(c) => self.identifier(),

            _ => Err(ScanError::new(self.line, ScanErrorKind::UnexpectedCharacter)),
        }
    }

    fn block_comment(&mut self) -> ScanResult<()> {
        loop {
            match (self.peek(), self.peek_next()) {
                (Some('*'), Some('/')) => {
                    self.advance();
                    self.advance();
                    return Ok(());
                }
                (Some('\n'), _) => {
                    self.line += 1;
                    self.advance();
                }
                (Some(_), _) => {
                    self.advance();
                }
                (None, _) => {
                    return Err(ScanError::new(
                        self.line,
                        ScanErrorKind::UnterminatedBlockComment,
                    ))
                }
            }
        }
    }

    fn string(&mut self) -> ScanResult<()> {
        loop {
            match self.peek() {
                Some('"') => break,
                Some('\\') => {
                    // The escaped character never closes the string
                    self.advance();
                    if let Some(escaped) = self.peek() {
                        if escaped == '\n' {
                            self.line += 1;
                        }
                        self.advance();
                    }
                }
                Some(c) => {
                    if c == '\n' {
                        self.line += 1;
                    }
                    self.advance();
                }
                None => {
                    return Err(ScanError::new(self.line, ScanErrorKind::UnterminatedString));
                }
            }
        }

        // Consume the closing "
        self.advance();

        // Trim surrounding quotes
        let value = &self.source[self.start + 1..self.current - 1];
        self.add_token(TokenType::String, Some(Literal::String(value.to_string())))
    }

    fn number(&mut self) -> ScanResult<()> {
        self.digits();

        // Look for a fractional part
        if self.peek() == Some('.') && self.peek_next().is_some_and(Self::is_digit) {
            // Consume .
            self.advance();
            self.digits();
        }

        let value = self.source[self.start..self.current]
            .parse::<f64>()
            .expect("a run of ASCII digits is a valid f64");
        self.add_token(TokenType::Number, Some(Literal::Number(value)))
    }

    fn digits(&mut self) {
        while self.peek().is_some_and(Self::is_digit) {
            self.advance();
        }
    }

    fn identifier(&mut self) -> ScanResult<()> {
        while self.peek().is_some_and(Self::is_alphanumeric) {
            self.advance();
        }

        let text = &self.source[self.start..self.current];
        let token_type = TokenType::keyword(text).unwrap_or(TokenType::Identifier);
        self.add_token(token_type, None)
    }

    fn is_digit(c: char) -> bool {
        c.is_ascii_digit()
    }

    fn is_alpha(c: char) -> bool {
        c.is_ascii_alphabetic() || c == '_'
    }

    fn is_alphanumeric(c: char) -> bool {
        c.is_ascii_alphanumeric() || c == '_'
    }

    fn peek(&self) -> Option<char> {
        self.source[self.current..].chars().next()
    }

    fn peek_next(&self) -> Option<char> {
        self.source[self.current..].chars().nth(1)
    }

    fn matches(&mut self, expected: char) -> bool {
        if self.peek() != Some(expected) {
            return false;
        }

        self.current += expected.len_utf8();
        true
    }

    fn advance(&mut self) -> char {
        match self.peek() {
            Some(c) => {
                self.current += c.len_utf8();
                c
            }
            None => '\0',
        }
    }

    fn add_token(&mut self, token_type: TokenType, literal: Option<Literal>) -> ScanResult<()> {
        let lexeme = self.source[self.start..self.current].to_string();
        let token = Token::new(token_type, lexeme, literal, self.start_line);
        trace!("token {}", token);
        self.tokens.push(token);
        Ok(())
    }
}

#[derive(Debug, Clone, Error)]
#[error("{kind}")]
pub struct ScanError {
    line: u32,
    kind: ScanErrorKind,
}

impl ScanError {
    pub fn new(line: u32, kind: ScanErrorKind) -> Self {
        ScanError { line, kind }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScanErrorKind {
    #[error("Unexpected character.")]
    UnexpectedCharacter,
    #[error("Unterminated string.")]
    UnterminatedString,
    #[error("Unterminated block comment.")]
    UnterminatedBlockComment,
}
