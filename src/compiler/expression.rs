//! Tokenizer and recursive-descent parser for workflow expressions.
//!
//! Grammar, loosest binding first:
//!
//! ```text
//! or      := and (("||" | "or") and)*
//! and     := not (("&&" | "and") not)*
//! compare := sum (("==" | "!=" | "<" | "<=" | ">" | ">=" | "in") sum)*
//! sum     := product (("+" | "-") product)*
//! product := unary (("*" | "/" | "%") unary)*
//! unary   := ("!" | "not" | "-") unary | postfix
//! postfix := primary ("." ident | "[" or "]")*
//! primary := literal | "workflow" | "state" | "input" | "(" or ")" | list | object
//! ```

use crate::ast::{BinaryOp, Expr, Root, UnaryOp, Value};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message} (at offset {position})")]
pub struct ExpressionError {
    pub position: usize,
    pub message: String,
}

impl ExpressionError {
    fn new(position: usize, message: impl Into<String>) -> Self {
        Self {
            position,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Identifier(String),
    Str(String),
    Number(f64),
    Symbol(&'static str),
}

const SYMBOLS: &[&str] = &[
    "||", "&&", "==", "!=", "<=", ">=", "<", ">", "!", "+", "-", "*", "/", "%", "(", ")", "[", "]",
    "{", "}", ",", ":", ".",
];

fn tokenize(source: &str) -> Result<Vec<(usize, Token)>, ExpressionError> {
    let chars: Vec<(usize, char)> = source.char_indices().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let (offset, c) = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }

        if c == '"' || c == '\'' {
            let (text, next) = read_string(&chars, i, c)?;
            tokens.push((offset, Token::Str(text)));
            i = next;
            continue;
        }

        if c.is_ascii_digit() {
            let start = i;
            while i < chars.len() && (chars[i].1.is_ascii_digit() || chars[i].1 == '.') {
                i += 1;
            }
            let literal: String = chars[start..i].iter().map(|(_, c)| c).collect();
            let number = literal
                .parse::<f64>()
                .map_err(|_| ExpressionError::new(offset, format!("invalid number '{}'", literal)))?;
            tokens.push((offset, Token::Number(number)));
            continue;
        }

        if c.is_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].1.is_alphanumeric() || chars[i].1 == '_') {
                i += 1;
            }
            let word: String = chars[start..i].iter().map(|(_, c)| c).collect();
            tokens.push((offset, Token::Identifier(word)));
            continue;
        }

        let rest = &source[offset..];
        match SYMBOLS.iter().find(|s| rest.starts_with(**s)) {
            Some(symbol) => {
                tokens.push((offset, Token::Symbol(symbol)));
                i += symbol.chars().count();
            }
            None if c == '=' => {
                return Err(ExpressionError::new(offset, "assignment is not allowed; use '=='"));
            }
            None => {
                return Err(ExpressionError::new(offset, format!("unexpected character '{}'", c)));
            }
        }
    }

    Ok(tokens)
}

fn read_string(
    chars: &[(usize, char)],
    start: usize,
    quote: char,
) -> Result<(String, usize), ExpressionError> {
    let mut text = String::new();
    let mut i = start + 1;
    while i < chars.len() {
        let c = chars[i].1;
        if c == quote {
            return Ok((text, i + 1));
        }
        if c == '\\' {
            i += 1;
            let escaped = chars
                .get(i)
                .map(|(_, c)| *c)
                .ok_or_else(|| ExpressionError::new(chars[start].0, "unterminated string literal"))?;
            text.push(match escaped {
                'n' => '\n',
                't' => '\t',
                'r' => '\r',
                other => other,
            });
        } else {
            text.push(c);
        }
        i += 1;
    }
    Err(ExpressionError::new(chars[start].0, "unterminated string literal"))
}

struct Parser {
    tokens: Vec<(usize, Token)>,
    position: usize,
    end: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position).map(|(_, t)| t)
    }

    fn offset(&self) -> usize {
        self.tokens
            .get(self.position)
            .map(|(o, _)| *o)
            .unwrap_or(self.end)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.position).map(|(_, t)| t.clone());
        self.position += 1;
        token
    }

    fn eat_symbol(&mut self, symbol: &str) -> bool {
        if matches!(self.peek(), Some(Token::Symbol(s)) if *s == symbol) {
            self.position += 1;
            true
        } else {
            false
        }
    }

    fn eat_word(&mut self, word: &str) -> bool {
        if matches!(self.peek(), Some(Token::Identifier(w)) if w == word) {
            self.position += 1;
            true
        } else {
            false
        }
    }

    fn expect_symbol(&mut self, symbol: &str) -> Result<(), ExpressionError> {
        if self.eat_symbol(symbol) {
            Ok(())
        } else {
            Err(ExpressionError::new(self.offset(), format!("expected '{}'", symbol)))
        }
    }

    fn parse_or(&mut self) -> Result<Expr, ExpressionError> {
        let mut left = self.parse_and()?;
        while self.eat_symbol("||") || self.eat_word("or") {
            let right = self.parse_and()?;
            left = Expr::Binary(BinaryOp::Or, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ExpressionError> {
        let mut left = self.parse_compare()?;
        while self.eat_symbol("&&") || self.eat_word("and") {
            let right = self.parse_compare()?;
            left = Expr::Binary(BinaryOp::And, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_compare(&mut self) -> Result<Expr, ExpressionError> {
        let mut left = self.parse_sum()?;
        loop {
            let op = match self.peek() {
                Some(Token::Symbol("==")) => BinaryOp::Equal,
                Some(Token::Symbol("!=")) => BinaryOp::NotEqual,
                Some(Token::Symbol("<")) => BinaryOp::Less,
                Some(Token::Symbol("<=")) => BinaryOp::LessEqual,
                Some(Token::Symbol(">")) => BinaryOp::Greater,
                Some(Token::Symbol(">=")) => BinaryOp::GreaterEqual,
                Some(Token::Identifier(w)) if w == "in" => BinaryOp::In,
                _ => return Ok(left),
            };
            self.position += 1;
            let right = self.parse_sum()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn parse_sum(&mut self) -> Result<Expr, ExpressionError> {
        let mut left = self.parse_product()?;
        loop {
            let op = match self.peek() {
                Some(Token::Symbol("+")) => BinaryOp::Add,
                Some(Token::Symbol("-")) => BinaryOp::Subtract,
                _ => return Ok(left),
            };
            self.position += 1;
            let right = self.parse_product()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn parse_product(&mut self) -> Result<Expr, ExpressionError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Symbol("*")) => BinaryOp::Multiply,
                Some(Token::Symbol("/")) => BinaryOp::Divide,
                Some(Token::Symbol("%")) => BinaryOp::Modulo,
                _ => return Ok(left),
            };
            self.position += 1;
            let right = self.parse_unary()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, ExpressionError> {
        if self.eat_symbol("!") || self.eat_word("not") {
            return Ok(Expr::Unary(UnaryOp::Not, Box::new(self.parse_unary()?)));
        }
        if self.eat_symbol("-") {
            return Ok(Expr::Unary(UnaryOp::Negate, Box::new(self.parse_unary()?)));
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expr, ExpressionError> {
        let mut expr = self.parse_primary()?;
        loop {
            if self.eat_symbol(".") {
                let offset = self.offset();
                match self.advance() {
                    Some(Token::Identifier(field)) => {
                        expr = Expr::Member(Box::new(expr), field);
                    }
                    _ => return Err(ExpressionError::new(offset, "expected a field name after '.'")),
                }
            } else if self.eat_symbol("[") {
                let key = self.parse_or()?;
                self.expect_symbol("]")?;
                expr = Expr::Index(Box::new(expr), Box::new(key));
            } else {
                return Ok(expr);
            }
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, ExpressionError> {
        let offset = self.offset();
        match self.advance() {
            Some(Token::Number(n)) => Ok(Expr::Literal(Value::Number(n))),
            Some(Token::Str(s)) => Ok(Expr::Literal(Value::String(s))),
            Some(Token::Identifier(word)) => match word.as_str() {
                "true" => Ok(Expr::Literal(Value::Bool(true))),
                "false" => Ok(Expr::Literal(Value::Bool(false))),
                "null" => Ok(Expr::Literal(Value::Null)),
                other => Root::from_identifier(other).map(Expr::Reference).ok_or_else(|| {
                    ExpressionError::new(
                        offset,
                        format!(
                            "unknown identifier '{}'; expressions start from 'workflow', 'state' or 'input'",
                            other
                        ),
                    )
                }),
            },
            Some(Token::Symbol("(")) => {
                let inner = self.parse_or()?;
                self.expect_symbol(")")?;
                Ok(inner)
            }
            Some(Token::Symbol("[")) => {
                let mut items = Vec::new();
                if !self.eat_symbol("]") {
                    loop {
                        items.push(self.parse_or()?);
                        if self.eat_symbol("]") {
                            break;
                        }
                        self.expect_symbol(",")?;
                    }
                }
                Ok(Expr::List(items))
            }
            Some(Token::Symbol("{")) => {
                let mut entries = Vec::new();
                if !self.eat_symbol("}") {
                    loop {
                        let key_offset = self.offset();
                        let key = match self.advance() {
                            Some(Token::Str(key)) | Some(Token::Identifier(key)) => key,
                            _ => return Err(ExpressionError::new(key_offset, "expected an object key")),
                        };
                        self.expect_symbol(":")?;
                        entries.push((key, self.parse_or()?));
                        if self.eat_symbol("}") {
                            break;
                        }
                        self.expect_symbol(",")?;
                    }
                }
                Ok(Expr::Object(entries))
            }
            Some(Token::Symbol(s)) => Err(ExpressionError::new(offset, format!("unexpected '{}'", s))),
            None => Err(ExpressionError::new(offset, "unexpected end of expression")),
        }
    }
}

/// Parses a complete expression. Empty input is an error.
pub fn parse_expression(source: &str) -> Result<Expr, ExpressionError> {
    let tokens = tokenize(source)?;
    if tokens.is_empty() {
        return Err(ExpressionError::new(0, "empty expression"));
    }
    let mut parser = Parser {
        tokens,
        position: 0,
        end: source.len(),
    };
    let expr = parser.parse_or()?;
    if parser.position < parser.tokens.len() {
        return Err(ExpressionError::new(parser.offset(), "unexpected trailing input"));
    }
    Ok(expr)
}

/// A piece of a `{{ expression }}` message template.
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateSegment {
    Text(String),
    Expr(Expr),
}

/// Splits a message template into literal text and embedded expressions.
pub fn parse_template(source: &str) -> Result<Vec<TemplateSegment>, ExpressionError> {
    let mut segments = Vec::new();
    let mut rest = source;
    let mut consumed = 0;

    while let Some(open) = rest.find("{{") {
        if open > 0 {
            segments.push(TemplateSegment::Text(rest[..open].to_string()));
        }
        let after_open = &rest[open + 2..];
        let close = after_open
            .find("}}")
            .ok_or_else(|| ExpressionError::new(consumed + open, "unterminated '{{' in template"))?;
        let inner = &after_open[..close];
        let expr = parse_expression(inner.trim()).map_err(|e| ExpressionError {
            position: consumed + open + 2 + e.position,
            message: e.message,
        })?;
        segments.push(TemplateSegment::Expr(expr));

        let advance = open + 2 + close + 2;
        consumed += advance;
        rest = &rest[advance..];
    }
    if !rest.is_empty() {
        segments.push(TemplateSegment::Text(rest.to_string()));
    }
    Ok(segments)
}
