//! Embedded expression evaluator
//!
//! The scripted custom function needs a synchronous, deterministic
//! evaluator with no ambient I/O. This module implements a minimal
//! expression language over positional bindings:
//!
//! ```text
//! expr   := term ('+' term)*
//! term   := string | number | ident | call
//! call   := ident '(' expr (',' expr)* ')'
//! ```
//!
//! `+` adds numbers and concatenates everything else. Built-in calls:
//! `upper`, `lower`, `trim`, `len`.

use serde_json::Value;
use std::collections::HashMap;

/// Evaluate `source` against `bindings`.
///
/// Returns the resulting value or a message describing why evaluation
/// failed. Unknown identifiers and malformed syntax are errors.
pub fn evaluate(source: &str, bindings: &HashMap<String, Value>) -> Result<Value, String> {
    let mut parser = Parser {
        chars: source.chars().collect(),
        pos: 0,
        bindings,
    };
    let value = parser.expr()?;
    parser.skip_ws();
    if parser.pos != parser.chars.len() {
        return Err(format!(
            "unexpected trailing input at offset {}",
            parser.pos
        ));
    }
    Ok(value)
}

struct Parser<'a> {
    chars: Vec<char>,
    pos: usize,
    bindings: &'a HashMap<String, Value>,
}

impl Parser<'_> {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.pos += 1;
        }
    }

    fn expr(&mut self) -> Result<Value, String> {
        let mut acc = self.term()?;
        loop {
            self.skip_ws();
            if self.peek() == Some('+') {
                self.pos += 1;
                let rhs = self.term()?;
                acc = add(acc, rhs);
            } else {
                return Ok(acc);
            }
        }
    }

    fn term(&mut self) -> Result<Value, String> {
        self.skip_ws();
        match self.peek() {
            Some('"') | Some('\'') => self.string_literal(),
            Some(c) if c.is_ascii_digit() || c == '-' => self.number_literal(),
            Some(c) if c.is_alphabetic() || c == '_' => self.ident_or_call(),
            Some(c) => Err(format!("unexpected character '{c}' at offset {}", self.pos)),
            None => Err("unexpected end of expression".to_string()),
        }
    }

    fn string_literal(&mut self) -> Result<Value, String> {
        let quote = self.bump().unwrap_or('"');
        let mut out = String::new();
        loop {
            match self.bump() {
                Some('\\') => match self.bump() {
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some(c) => out.push(c),
                    None => return Err("unterminated escape".to_string()),
                },
                Some(c) if c == quote => return Ok(Value::String(out)),
                Some(c) => out.push(c),
                None => return Err("unterminated string literal".to_string()),
            }
        }
    }

    fn number_literal(&mut self) -> Result<Value, String> {
        let start = self.pos;
        if self.peek() == Some('-') {
            self.pos += 1;
        }
        while matches!(self.peek(), Some(c) if c.is_ascii_digit() || c == '.') {
            self.pos += 1;
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        if let Ok(i) = text.parse::<i64>() {
            return Ok(Value::from(i));
        }
        text.parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| format!("bad number literal '{text}'"))
    }

    fn ident_or_call(&mut self) -> Result<Value, String> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_') {
            self.pos += 1;
        }
        let name: String = self.chars[start..self.pos].iter().collect();
        self.skip_ws();
        if self.peek() == Some('(') {
            self.pos += 1;
            let mut args = Vec::new();
            self.skip_ws();
            if self.peek() != Some(')') {
                loop {
                    args.push(self.expr()?);
                    self.skip_ws();
                    match self.bump() {
                        Some(',') => continue,
                        Some(')') => break,
                        _ => return Err(format!("expected ',' or ')' in call to '{name}'")),
                    }
                }
            } else {
                self.pos += 1;
            }
            return call(&name, args);
        }
        self.bindings
            .get(&name)
            .cloned()
            .ok_or_else(|| format!("unknown identifier '{name}'"))
    }
}

fn add(lhs: Value, rhs: Value) -> Value {
    if let (Some(a), Some(b)) = (lhs.as_i64(), rhs.as_i64()) {
        return Value::from(a + b);
    }
    if let (Some(a), Some(b)) = (lhs.as_f64(), rhs.as_f64()) {
        return serde_json::Number::from_f64(a + b)
            .map(Value::Number)
            .unwrap_or(Value::Null);
    }
    Value::String(format!("{}{}", to_text(&lhs), to_text(&rhs)))
}

fn call(name: &str, args: Vec<Value>) -> Result<Value, String> {
    let arity = |n: usize| -> Result<(), String> {
        if args.len() == n {
            Ok(())
        } else {
            Err(format!("'{name}' expects {n} argument(s), got {}", args.len()))
        }
    };
    match name {
        "upper" => {
            arity(1)?;
            Ok(Value::String(to_text(&args[0]).to_uppercase()))
        }
        "lower" => {
            arity(1)?;
            Ok(Value::String(to_text(&args[0]).to_lowercase()))
        }
        "trim" => {
            arity(1)?;
            Ok(Value::String(to_text(&args[0]).trim().to_string()))
        }
        "len" => {
            arity(1)?;
            Ok(Value::from(to_text(&args[0]).chars().count() as i64))
        }
        other => Err(format!("unknown function '{other}'")),
    }
}

/// Text form of a value for concatenation.
pub fn to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
