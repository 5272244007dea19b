// Copyright (c) 2026 MCP Hub contributors
// SPDX-License-Identifier: MIT
//! # Response Expressions
//!
//! Evaluator for the three expression strings an adapter config may carry:
//! `response.jsonata` (transformation), `response.successCondition`
//! (classification) and `response.errorPath` (error extraction). The
//! supported grammar is the subset those configs actually use:
//!
//! ```text
//! expr    := or
//! or      := and ("or" and)*
//! and     := cmp ("and" cmp)*
//! cmp     := primary (("=" | "!=" | ">" | ">=" | "<" | "<=") primary)?
//! primary := literal | path | "(" expr ")"
//! path    := ("$" | ident) ("." ident | "[" int "]")*
//! ```
//!
//! `$` is the decoded response body; a bare identifier reads a body field.
//! A path that walks off the data evaluates to `null`, never an error.

use serde_json::{Number, Value};

use crate::domain::error::{ErrorCode, HubError};

/// A parsed expression, reusable across evaluations.
#[derive(Debug, Clone)]
pub struct Expression {
    root: Node,
}

#[derive(Debug, Clone)]
enum Node {
    Literal(Value),
    Path(Vec<Segment>),
    Compare(CompareOp, Box<Node>, Box<Node>),
    And(Box<Node>, Box<Node>),
    Or(Box<Node>, Box<Node>),
}

#[derive(Debug, Clone)]
enum Segment {
    Field(String),
    Index(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CompareOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl Expression {
    /// Parse `source`; fails with a configuration error on bad syntax.
    pub fn parse(source: &str) -> Result<Self, HubError> {
        let tokens = tokenize(source)?;
        let mut parser = Parser { tokens, pos: 0 };
        let root = parser.parse_or()?;
        if parser.pos != parser.tokens.len() {
            return Err(HubError::new(
                ErrorCode::SchemaViolation,
                format!("unexpected trailing input in expression {source:?}"),
            ));
        }
        Ok(Self { root })
    }

    /// Evaluate against the decoded response body.
    pub fn evaluate(&self, body: &Value) -> Result<Value, HubError> {
        eval(&self.root, body)
    }

    /// Evaluate and collapse to a boolean (see [`is_truthy`]).
    pub fn evaluate_bool(&self, body: &Value) -> Result<bool, HubError> {
        Ok(is_truthy(&self.evaluate(body)?))
    }
}

/// Truthiness of an evaluation result: `null`, `false`, `0`, `""` and empty
/// collections are false; everything else is true.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Walk a dotted path (`error.message`, `items[0].id`) through `value`.
/// Returns `None` when any segment is absent.
pub fn lookup_path(value: &Value, path: &str) -> Option<Value> {
    let tokens = tokenize(path).ok()?;
    let mut parser = Parser { tokens, pos: 0 };
    let segments = parser.parse_path_segments().ok()?;
    if parser.pos != parser.tokens.len() {
        return None;
    }
    let mut current = value;
    for segment in &segments {
        current = match segment {
            Segment::Field(name) => current.get(name.as_str())?,
            Segment::Index(i) => current.get(i)?,
        };
    }
    Some(current.clone())
}

// ---------------------------------------------------------------------------
// Tokenizer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Number(f64),
    Str(String),
    Dollar,
    Dot,
    LBracket,
    RBracket,
    LParen,
    RParen,
    Op(CompareOp),
    And,
    Or,
    True,
    False,
    Null,
}

fn tokenize(source: &str) -> Result<Vec<Token>, HubError> {
    let mut tokens = Vec::new();
    let mut chars = source.chars().peekable();

    let bad = |c: char| {
        HubError::new(
            ErrorCode::SchemaViolation,
            format!("unexpected character {c:?} in expression"),
        )
    };

    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' | '\n' | '\r' => {
                chars.next();
            }
            '$' => {
                chars.next();
                tokens.push(Token::Dollar);
            }
            '.' => {
                chars.next();
                tokens.push(Token::Dot);
            }
            '[' => {
                chars.next();
                tokens.push(Token::LBracket);
            }
            ']' => {
                chars.next();
                tokens.push(Token::RBracket);
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            '=' => {
                chars.next();
                // accept both `=` and `==`
                if chars.peek() == Some(&'=') {
                    chars.next();
                }
                tokens.push(Token::Op(CompareOp::Eq));
            }
            '!' => {
                chars.next();
                if chars.next() != Some('=') {
                    return Err(bad('!'));
                }
                tokens.push(Token::Op(CompareOp::Ne));
            }
            '>' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    tokens.push(Token::Op(CompareOp::Ge));
                } else {
                    tokens.push(Token::Op(CompareOp::Gt));
                }
            }
            '<' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    tokens.push(Token::Op(CompareOp::Le));
                } else {
                    tokens.push(Token::Op(CompareOp::Lt));
                }
            }
            '"' | '\'' => {
                let quote = c;
                chars.next();
                let mut s = String::new();
                loop {
                    match chars.next() {
                        Some('\\') => match chars.next() {
                            Some(escaped) => s.push(escaped),
                            None => {
                                return Err(HubError::new(
                                    ErrorCode::SchemaViolation,
                                    "unterminated escape in expression string",
                                ))
                            }
                        },
                        Some(ch) if ch == quote => break,
                        Some(ch) => s.push(ch),
                        None => {
                            return Err(HubError::new(
                                ErrorCode::SchemaViolation,
                                "unterminated string in expression",
                            ))
                        }
                    }
                }
                tokens.push(Token::Str(s));
            }
            '0'..='9' | '-' => {
                let mut num = String::new();
                num.push(c);
                chars.next();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_digit() || d == '.' {
                        num.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let parsed: f64 = num.parse().map_err(|_| {
                    HubError::new(
                        ErrorCode::SchemaViolation,
                        format!("malformed number {num:?} in expression"),
                    )
                })?;
                tokens.push(Token::Number(parsed));
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut ident = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_alphanumeric() || d == '_' {
                        ident.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(match ident.as_str() {
                    "and" => Token::And,
                    "or" => Token::Or,
                    "true" => Token::True,
                    "false" => Token::False,
                    "null" => Token::Null,
                    _ => Token::Ident(ident),
                });
            }
            other => return Err(bad(other)),
        }
    }

    Ok(tokens)
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).cloned();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn parse_or(&mut self) -> Result<Node, HubError> {
        let mut node = self.parse_and()?;
        while self.peek() == Some(&Token::Or) {
            self.next();
            let rhs = self.parse_and()?;
            node = Node::Or(Box::new(node), Box::new(rhs));
        }
        Ok(node)
    }

    fn parse_and(&mut self) -> Result<Node, HubError> {
        let mut node = self.parse_cmp()?;
        while self.peek() == Some(&Token::And) {
            self.next();
            let rhs = self.parse_cmp()?;
            node = Node::And(Box::new(node), Box::new(rhs));
        }
        Ok(node)
    }

    fn parse_cmp(&mut self) -> Result<Node, HubError> {
        let lhs = self.parse_primary()?;
        if let Some(Token::Op(op)) = self.peek().cloned() {
            self.next();
            let rhs = self.parse_primary()?;
            return Ok(Node::Compare(op, Box::new(lhs), Box::new(rhs)));
        }
        Ok(lhs)
    }

    fn parse_primary(&mut self) -> Result<Node, HubError> {
        match self.next() {
            Some(Token::Str(s)) => Ok(Node::Literal(Value::String(s))),
            Some(Token::Number(n)) => Ok(Node::Literal(number_value(n))),
            Some(Token::True) => Ok(Node::Literal(Value::Bool(true))),
            Some(Token::False) => Ok(Node::Literal(Value::Bool(false))),
            Some(Token::Null) => Ok(Node::Literal(Value::Null)),
            Some(Token::LParen) => {
                let inner = self.parse_or()?;
                match self.next() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err(HubError::new(
                        ErrorCode::SchemaViolation,
                        "missing closing parenthesis in expression",
                    )),
                }
            }
            Some(Token::Dollar) => {
                self.pos -= 1;
                Ok(Node::Path(self.parse_path_segments()?))
            }
            Some(Token::Ident(_)) => {
                self.pos -= 1;
                Ok(Node::Path(self.parse_path_segments()?))
            }
            other => Err(HubError::new(
                ErrorCode::SchemaViolation,
                format!("unexpected token {other:?} in expression"),
            )),
        }
    }

    /// `$`-rooted or identifier-rooted path with `.field` / `[index]` steps.
    fn parse_path_segments(&mut self) -> Result<Vec<Segment>, HubError> {
        let mut segments = Vec::new();
        match self.next() {
            Some(Token::Dollar) => {}
            Some(Token::Ident(name)) => segments.push(Segment::Field(name)),
            other => {
                return Err(HubError::new(
                    ErrorCode::SchemaViolation,
                    format!("expected path, found {other:?}"),
                ))
            }
        }

        loop {
            match self.peek() {
                Some(Token::Dot) => {
                    self.next();
                    match self.next() {
                        Some(Token::Ident(name)) => segments.push(Segment::Field(name)),
                        other => {
                            return Err(HubError::new(
                                ErrorCode::SchemaViolation,
                                format!("expected field name after '.', found {other:?}"),
                            ))
                        }
                    }
                }
                Some(Token::LBracket) => {
                    self.next();
                    let index = match self.next() {
                        Some(Token::Number(n)) if n >= 0.0 && n.fract() == 0.0 => n as usize,
                        other => {
                            return Err(HubError::new(
                                ErrorCode::SchemaViolation,
                                format!("expected array index, found {other:?}"),
                            ))
                        }
                    };
                    if self.next() != Some(Token::RBracket) {
                        return Err(HubError::new(
                            ErrorCode::SchemaViolation,
                            "missing closing bracket in expression path",
                        ));
                    }
                    segments.push(Segment::Index(index));
                }
                _ => break,
            }
        }

        Ok(segments)
    }
}

fn number_value(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        Value::Number(Number::from(n as i64))
    } else {
        Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
    }
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

fn eval(node: &Node, body: &Value) -> Result<Value, HubError> {
    match node {
        Node::Literal(v) => Ok(v.clone()),
        Node::Path(segments) => {
            let mut current = body;
            for segment in segments {
                let next = match segment {
                    Segment::Field(name) => current.get(name.as_str()),
                    Segment::Index(i) => current.get(i),
                };
                match next {
                    Some(v) => current = v,
                    None => return Ok(Value::Null),
                }
            }
            Ok(current.clone())
        }
        Node::Compare(op, lhs, rhs) => {
            let l = eval(lhs, body)?;
            let r = eval(rhs, body)?;
            compare(*op, &l, &r)
        }
        Node::And(lhs, rhs) => {
            if !is_truthy(&eval(lhs, body)?) {
                return Ok(Value::Bool(false));
            }
            Ok(Value::Bool(is_truthy(&eval(rhs, body)?)))
        }
        Node::Or(lhs, rhs) => {
            if is_truthy(&eval(lhs, body)?) {
                return Ok(Value::Bool(true));
            }
            Ok(Value::Bool(is_truthy(&eval(rhs, body)?)))
        }
    }
}

fn compare(op: CompareOp, l: &Value, r: &Value) -> Result<Value, HubError> {
    let result = match op {
        CompareOp::Eq => values_equal(l, r),
        CompareOp::Ne => !values_equal(l, r),
        relational => {
            let ordering = match (l, r) {
                (Value::Number(a), Value::Number(b)) => a
                    .as_f64()
                    .zip(b.as_f64())
                    .and_then(|(a, b)| a.partial_cmp(&b)),
                (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
                _ => None,
            };
            let Some(ordering) = ordering else {
                return Err(HubError::new(
                    ErrorCode::InvalidValue,
                    "relational comparison requires two numbers or two strings",
                ));
            };
            match relational {
                CompareOp::Gt => ordering.is_gt(),
                CompareOp::Ge => ordering.is_ge(),
                CompareOp::Lt => ordering.is_lt(),
                CompareOp::Le => ordering.is_le(),
                CompareOp::Eq | CompareOp::Ne => unreachable!(),
            }
        }
    };
    Ok(Value::Bool(result))
}

/// JSON equality with numeric coercion (`2 = 2.0`).
fn values_equal(l: &Value, r: &Value) -> bool {
    match (l, r) {
        (Value::Number(a), Value::Number(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(a), Some(b)) => a == b,
            _ => a == b,
        },
        _ => l == r,
    }
}
