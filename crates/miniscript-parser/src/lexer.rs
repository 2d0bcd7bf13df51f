use std::{iter::Peekable, str::Chars};

use crate::{
    error::{ParseError, ParseResult},
    token::Token,
};

/// A token paired with the 1-based line/column it started at.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub line: usize,
    pub column: usize,
}

/// Hand-written scanner over a `Peekable<Chars>`, grounded in
/// `original_source/miniscript/parser.py`'s `MiniScriptLexer` token set:
/// integers, double-quoted strings with `\`-escapes, `true`/`false`,
/// `null`/`undefined`, identifiers, the keyword set, and the operator/
/// punctuation set enumerated in spec §6. `//` line comments and `/* */`
/// block comments are skipped, matching the original's `ignore_comments`/
/// `ignore_multicomment` rules.
pub struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
    line: usize,
    column: usize,
}

impl<'a> Lexer<'a> {
    #[must_use]
    pub fn new(source: &'a str) -> Self {
        Self { chars: source.chars().peekable(), line: 1, column: 1 }
    }

    /// Tokenizes the whole input, returning a `Token::Eof` sentinel as the
    /// final element so the parser never needs to special-case "ran out of
    /// tokens".
    pub fn tokenize(mut self) -> ParseResult<Vec<Spanned>> {
        let mut tokens = Vec::new();
        loop {
            self.skip_trivia()?;
            let (line, column) = (self.line, self.column);
            let Some(&c) = self.chars.peek() else {
                tokens.push(Spanned { token: Token::Eof, line, column });
                return Ok(tokens);
            };
            let token = self.scan_token(c, line, column)?;
            tokens.push(Spanned { token, line, column });
        }
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn skip_trivia(&mut self) -> ParseResult<()> {
        loop {
            match self.chars.peek() {
                Some(c) if c.is_whitespace() => {
                    self.advance();
                }
                Some('/') => {
                    let mut lookahead = self.chars.clone();
                    lookahead.next();
                    match lookahead.peek() {
                        Some('/') => {
                            while !matches!(self.chars.peek(), None | Some('\n')) {
                                self.advance();
                            }
                        }
                        Some('*') => {
                            self.advance();
                            self.advance();
                            self.skip_block_comment()?;
                        }
                        _ => return Ok(()),
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn skip_block_comment(&mut self) -> ParseResult<()> {
        let (line, column) = (self.line, self.column);
        loop {
            match self.advance() {
                None => return Err(ParseError::new("unterminated block comment", line, column)),
                Some('*') if self.chars.peek() == Some(&'/') => {
                    self.advance();
                    return Ok(());
                }
                Some(_) => {}
            }
        }
    }

    fn scan_token(&mut self, c: char, line: usize, column: usize) -> ParseResult<Token> {
        if c.is_ascii_digit() {
            return self.scan_number();
        }
        if c == '"' {
            return self.scan_string(line, column);
        }
        if is_ident_start(c) {
            return Ok(self.scan_identifier());
        }

        self.advance();
        Ok(match c {
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' => Token::Star,
            '%' => Token::Percent,
            '/' => Token::Slash,
            '(' => Token::LParen,
            ')' => Token::RParen,
            '{' => Token::LBrace,
            '}' => Token::RBrace,
            '[' => Token::LBracket,
            ']' => Token::RBracket,
            ',' => Token::Comma,
            ';' => Token::Semicolon,
            '.' => Token::Dot,
            '&' => self.expect_doubled('&', Token::AndAnd, line, column)?,
            '|' => self.expect_doubled('|', Token::OrOr, line, column)?,
            '=' => self.maybe_eq('=', Token::EqEq, Token::Eq),
            '!' => self.maybe_eq('=', Token::NotEq, Token::Not),
            '>' => self.maybe_eq('=', Token::Ge, Token::Gt),
            '<' => self.maybe_eq('=', Token::Le, Token::Lt),
            other => return Err(ParseError::new(format!("illegal character: '{other}'"), line, column)),
        })
    }

    /// Consumes a second copy of `expected` after the one already consumed,
    /// for `&&`/`||`; fails if the character isn't doubled (MiniScript has no
    /// single `&`/`|` operator).
    fn expect_doubled(&mut self, expected: char, token: Token, line: usize, column: usize) -> ParseResult<Token> {
        if self.chars.peek() == Some(&expected) {
            self.advance();
            Ok(token)
        } else {
            Err(ParseError::new(format!("expected '{expected}{expected}'"), line, column))
        }
    }

    /// Consumes a trailing `=` if present (`==`, `!=`, `>=`, `<=`), else
    /// returns the single-character token (`=`, `!`, `>`, `<`).
    fn maybe_eq(&mut self, expected: char, with_eq: Token, without: Token) -> Token {
        if self.chars.peek() == Some(&expected) {
            self.advance();
            with_eq
        } else {
            without
        }
    }

    fn scan_number(&mut self) -> ParseResult<Token> {
        let mut digits = String::new();
        while let Some(&c) = self.chars.peek() {
            if c.is_ascii_digit() {
                digits.push(c);
                self.advance();
            } else {
                break;
            }
        }
        Ok(Token::Number(digits.parse::<f64>().expect("all-digit string parses as f64")))
    }

    fn scan_string(&mut self, line: usize, column: usize) -> ParseResult<Token> {
        self.advance(); // opening quote
        let mut value = String::new();
        loop {
            match self.advance() {
                None | Some('\n') => return Err(ParseError::new("unterminated string literal", line, column)),
                Some('"') => return Ok(Token::String(value)),
                Some('\\') => match self.advance() {
                    Some('n') => value.push('\n'),
                    Some('t') => value.push('\t'),
                    Some('r') => value.push('\r'),
                    Some('"') => value.push('"'),
                    Some('\\') => value.push('\\'),
                    Some(other) => value.push(other),
                    None => return Err(ParseError::new("unterminated string literal", line, column)),
                },
                Some(c) => value.push(c),
            }
        }
    }

    fn scan_identifier(&mut self) -> Token {
        let mut ident = String::new();
        while let Some(&c) = self.chars.peek() {
            if is_ident_continue(c) {
                ident.push(c);
                self.advance();
            } else {
                break;
            }
        }
        Token::keyword(&ident).unwrap_or(Token::Ident(ident))
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}
