//! Formula text parsing
//!
//! A hand-written lexer and precedence-climbing parser for model formulas of
//! the form `response ~ rhs`. Operators, loosest first: `|`/`||`, `+`/`-`,
//! `*`/`/`, unary `-`, `%op%`, `:`, `^`. String literals and operators that
//! only matter to other model components are parsed so that their terms can
//! be carried along as ordinary covariates.

use crate::error::TermError;
use crate::formula::expr::{Arg, BinaryOp, Expr, NEGATE_PRECEDENCE, SPECIAL_PRECEDENCE};

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Number(String),
    Str(String),
    /// `%in%`, `%o%` and other user operators
    Special(String),
    LParen,
    RParen,
    Comma,
    Equals,
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    Colon,
    Bar,
    DoubleBar,
    Tilde,
    Eof,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Ident(name) => format!("name '{}'", name),
            Token::Number(text) => format!("number '{}'", text),
            Token::Str(_) => "string".to_string(),
            Token::Special(op) => format!("'{}'", op),
            Token::LParen => "'('".to_string(),
            Token::RParen => "')'".to_string(),
            Token::Comma => "','".to_string(),
            Token::Equals => "'='".to_string(),
            Token::Plus => "'+'".to_string(),
            Token::Minus => "'-'".to_string(),
            Token::Star => "'*'".to_string(),
            Token::Slash => "'/'".to_string(),
            Token::Caret => "'^'".to_string(),
            Token::Colon => "':'".to_string(),
            Token::Bar => "'|'".to_string(),
            Token::DoubleBar => "'||'".to_string(),
            Token::Tilde => "'~'".to_string(),
            Token::Eof => "end of input".to_string(),
        }
    }

    fn infix(&self) -> Option<Infix> {
        let op = match self {
            Token::Plus => BinaryOp::Add,
            Token::Minus => BinaryOp::Sub,
            Token::Star => BinaryOp::Mul,
            Token::Slash => BinaryOp::Div,
            Token::Caret => BinaryOp::Power,
            Token::Colon => BinaryOp::Interact,
            Token::Bar => BinaryOp::Bar,
            Token::DoubleBar => BinaryOp::DoubleBar,
            Token::Special(op) => return Some(Infix::Special(op.clone())),
            _ => return None,
        };
        Some(Infix::Binary(op))
    }
}

/// An infix operator found between two operands
enum Infix {
    Binary(BinaryOp),
    Special(String),
}

impl Infix {
    fn precedence(&self) -> u8 {
        match self {
            Infix::Binary(op) => op.precedence(),
            Infix::Special(_) => SPECIAL_PRECEDENCE,
        }
    }

    fn is_right_associative(&self) -> bool {
        matches!(self, Infix::Binary(op) if op.is_right_associative())
    }

    fn apply(self, lhs: Expr, rhs: Expr) -> Expr {
        match self {
            Infix::Binary(op) => Expr::binary(op, lhs, rhs),
            Infix::Special(op) => Expr::Special {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
        }
    }
}

/// Token with its byte offset in the input
type Spanned = (Token, usize);

fn tokenize(input: &str) -> Result<Vec<Spanned>, TermError> {
    let chars: Vec<(usize, char)> = input.char_indices().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let (pos, c) = chars[i];
        let next = chars.get(i + 1).map(|(_, c)| *c);

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        let simple = match c {
            '(' => Some(Token::LParen),
            ')' => Some(Token::RParen),
            ',' => Some(Token::Comma),
            '=' => Some(Token::Equals),
            '+' => Some(Token::Plus),
            '-' => Some(Token::Minus),
            '*' => Some(Token::Star),
            '/' => Some(Token::Slash),
            '^' => Some(Token::Caret),
            ':' => Some(Token::Colon),
            '~' => Some(Token::Tilde),
            _ => None,
        };
        if let Some(token) = simple {
            tokens.push((token, pos));
            i += 1;
            continue;
        }

        if c == '|' {
            if next == Some('|') {
                tokens.push((Token::DoubleBar, pos));
                i += 2;
            } else {
                tokens.push((Token::Bar, pos));
                i += 1;
            }
            continue;
        }

        if c == '%' {
            let mut end = i + 1;
            while end < chars.len() && chars[end].1 != '%' && chars[end].1 != '\n' {
                end += 1;
            }
            if end >= chars.len() || chars[end].1 != '%' {
                return Err(TermError::InvalidFormula(format!(
                    "unterminated operator at position {}",
                    pos
                )));
            }
            let op: String = chars[i..=end].iter().map(|(_, c)| *c).collect();
            tokens.push((Token::Special(op), pos));
            i = end + 1;
            continue;
        }

        if c == '"' || c == '\'' {
            let (text, next) = string_literal(&chars, i)?;
            tokens.push((Token::Str(text), pos));
            i = next;
            continue;
        }

        if c == '`' {
            let start = i + 1;
            let mut end = start;
            while end < chars.len() && chars[end].1 != '`' {
                end += 1;
            }
            if end >= chars.len() {
                return Err(TermError::InvalidFormula(format!(
                    "unterminated backquoted name at position {}",
                    pos
                )));
            }
            let name: String = chars[start..end].iter().map(|(_, c)| *c).collect();
            if name.is_empty() {
                return Err(TermError::InvalidFormula(format!(
                    "empty backquoted name at position {}",
                    pos
                )));
            }
            tokens.push((Token::Ident(name), pos));
            i = end + 1;
            continue;
        }

        let starts_number =
            c.is_ascii_digit() || (c == '.' && next.map_or(false, |n| n.is_ascii_digit()));
        if starts_number {
            let start = i;
            while i < chars.len() && (chars[i].1.is_ascii_digit() || chars[i].1 == '.') {
                i += 1;
            }
            // Exponent, e.g. 1e-3
            if i < chars.len() && matches!(chars[i].1, 'e' | 'E') {
                let mut j = i + 1;
                if j < chars.len() && matches!(chars[j].1, '+' | '-') {
                    j += 1;
                }
                if j < chars.len() && chars[j].1.is_ascii_digit() {
                    i = j;
                    while i < chars.len() && chars[i].1.is_ascii_digit() {
                        i += 1;
                    }
                }
            }
            let text: String = chars[start..i].iter().map(|(_, c)| *c).collect();
            // Integer suffix, e.g. 2L
            if i < chars.len() && chars[i].1 == 'L' {
                i += 1;
            }
            if text.parse::<f64>().is_err() {
                return Err(TermError::InvalidFormula(format!(
                    "malformed number '{}' at position {}",
                    text, pos
                )));
            }
            tokens.push((Token::Number(text), pos));
            continue;
        }

        if c.is_alphabetic() || c == '.' {
            let start = i;
            while i < chars.len()
                && (chars[i].1.is_alphanumeric() || matches!(chars[i].1, '_' | '.'))
            {
                i += 1;
            }
            let name: String = chars[start..i].iter().map(|(_, c)| *c).collect();
            tokens.push((Token::Ident(name), pos));
            continue;
        }

        return Err(TermError::InvalidFormula(format!(
            "unexpected character '{}' at position {}",
            c, pos
        )));
    }

    tokens.push((Token::Eof, input.len()));
    Ok(tokens)
}

/// Read a quoted string starting at `start`, returning its unescaped text and
/// the index just past the closing quote
fn string_literal(chars: &[(usize, char)], start: usize) -> Result<(String, usize), TermError> {
    let (pos, quote) = chars[start];
    let mut text = String::new();
    let mut i = start + 1;
    while i < chars.len() {
        match chars[i].1 {
            c if c == quote => return Ok((text, i + 1)),
            '\\' => {
                let escaped = chars.get(i + 1).map(|(_, c)| *c).ok_or_else(|| {
                    TermError::InvalidFormula(format!("unterminated string at position {}", pos))
                })?;
                text.push(match escaped {
                    'n' => '\n',
                    't' => '\t',
                    other => other,
                });
                i += 2;
            }
            c => {
                text.push(c);
                i += 1;
            }
        }
    }
    Err(TermError::InvalidFormula(format!(
        "unterminated string at position {}",
        pos
    )))
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
}

impl Parser {
    fn new(input: &str) -> Result<Self, TermError> {
        Ok(Self {
            tokens: tokenize(input)?,
            pos: 0,
        })
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos].0
    }

    fn peek_second(&self) -> &Token {
        let index = (self.pos + 1).min(self.tokens.len() - 1);
        &self.tokens[index].0
    }

    fn offset(&self) -> usize {
        self.tokens[self.pos].1
    }

    fn advance(&mut self) -> Token {
        let token = self.tokens[self.pos].0.clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn unexpected(&self) -> TermError {
        TermError::InvalidFormula(format!(
            "unexpected {} at position {}",
            self.peek().describe(),
            self.offset()
        ))
    }

    fn expect(&mut self, expected: Token) -> Result<(), TermError> {
        if *self.peek() == expected {
            self.advance();
            Ok(())
        } else {
            Err(TermError::InvalidFormula(format!(
                "expected {} but found {} at position {}",
                expected.describe(),
                self.peek().describe(),
                self.offset()
            )))
        }
    }

    fn expression(&mut self, min_precedence: u8) -> Result<Expr, TermError> {
        let mut lhs = self.prefix()?;
        while let Some(op) = self.peek().infix() {
            let precedence = op.precedence();
            if precedence < min_precedence {
                break;
            }
            self.advance();
            let next = if op.is_right_associative() {
                precedence
            } else {
                precedence + 1
            };
            let rhs = self.expression(next)?;
            lhs = op.apply(lhs, rhs);
        }
        Ok(lhs)
    }

    fn prefix(&mut self) -> Result<Expr, TermError> {
        match self.peek().clone() {
            Token::Minus => {
                self.advance();
                let operand = self.expression(NEGATE_PRECEDENCE + 1)?;
                Ok(Expr::Negate(Box::new(operand)))
            }
            Token::Plus => {
                self.advance();
                self.expression(NEGATE_PRECEDENCE + 1)
            }
            Token::Number(text) => {
                self.advance();
                Ok(Expr::Number(text))
            }
            Token::Str(text) => {
                self.advance();
                Ok(Expr::Str(text))
            }
            Token::Ident(name) => {
                self.advance();
                if *self.peek() == Token::LParen {
                    self.advance();
                    let args = self.arguments()?;
                    Ok(Expr::Call { name, args })
                } else {
                    Ok(Expr::Symbol(name))
                }
            }
            Token::LParen => {
                self.advance();
                let inner = self.expression(0)?;
                self.expect(Token::RParen)?;
                Ok(Expr::Paren(Box::new(inner)))
            }
            _ => Err(self.unexpected()),
        }
    }

    /// Arguments after an opening parenthesis, consuming the closing one
    fn arguments(&mut self) -> Result<Vec<Arg>, TermError> {
        let mut args = Vec::new();
        if *self.peek() == Token::RParen {
            self.advance();
            return Ok(args);
        }
        loop {
            let named = *self.peek_second() == Token::Equals;
            let name = match self.peek() {
                Token::Ident(name) if named => Some(name.clone()),
                _ => None,
            };
            if name.is_some() {
                self.advance();
                self.advance();
            }
            let value = self.expression(0)?;
            args.push(Arg { name, value });

            match self.peek() {
                Token::Comma => {
                    self.advance();
                }
                Token::RParen => {
                    self.advance();
                    return Ok(args);
                }
                _ => return Err(self.unexpected()),
            }
        }
    }
}

/// Parse `response ~ rhs` into its two sides
pub fn parse_formula(input: &str) -> Result<(Expr, Expr), TermError> {
    if input.trim().is_empty() {
        return Err(TermError::InvalidFormula("formula is empty".to_string()));
    }
    let mut parser = Parser::new(input)?;
    if *parser.peek() == Token::Tilde {
        return Err(TermError::InvalidFormula(
            "formula has no response before '~'".to_string(),
        ));
    }
    let response = parser.expression(0)?;
    if *parser.peek() == Token::Eof {
        return Err(TermError::InvalidFormula(
            "formula is missing '~'".to_string(),
        ));
    }
    parser.expect(Token::Tilde)?;
    if *parser.peek() == Token::Eof {
        return Err(TermError::InvalidFormula(
            "formula has no terms after '~'".to_string(),
        ));
    }
    let rhs = parser.expression(0)?;
    parser.expect(Token::Eof)?;
    Ok((response, rhs))
}

/// Parse a standalone expression such as a term label
pub fn parse_expression(input: &str) -> Result<Expr, TermError> {
    let mut parser = Parser::new(input)?;
    let expr = parser.expression(0)?;
    parser.expect(Token::Eof)?;
    Ok(expr)
}
