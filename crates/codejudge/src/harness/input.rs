//! Test case input parsing
//!
//! Inputs are written as `name = value` pairs separated by commas, e.g.
//! `nums = [2,7,11,15], target = 9`. Values are bare tokens (integers or
//! booleans), quoted strings, or bracketed lists nested at most two deep.

use std::iter::Peekable;
use std::str::CharIndices;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("expected a variable name at offset {0}")]
    ExpectedName(usize),

    #[error("expected '=' after '{0}'")]
    ExpectedEquals(String),

    #[error("missing value for '{0}'")]
    MissingValue(String),

    #[error("unterminated string in '{0}'")]
    UnterminatedString(String),

    #[error("unterminated list in '{0}'")]
    UnterminatedList(String),

    #[error("invalid value '{token}' for '{name}'")]
    InvalidValue { name: String, token: String },

    #[error("lists nested deeper than two levels in '{0}'")]
    TooDeep(String),

    #[error("list '{0}' mixes nested lists with scalar values")]
    MixedList(String),

    #[error("unexpected '{found}' at offset {offset}, expected ','")]
    ExpectedComma { found: char, offset: usize },
}

/// A parsed input value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Literal {
    /// Bare numeric token, kept verbatim
    Int(String),
    Bool(bool),
    Str(String),
    IntList(Vec<String>),
    StrList(Vec<String>),
    IntGrid(Vec<Vec<String>>),
}

impl Literal {
    /// Whether every integer in the literal fits a 32-bit signed integer
    pub fn fits_i32(&self) -> bool {
        let fits = |tok: &String| tok.parse::<i64>().map_or(true, |v| i32::try_from(v).is_ok());
        match self {
            Literal::Int(tok) => fits(tok),
            Literal::IntList(items) => items.iter().all(fits),
            Literal::IntGrid(rows) => rows.iter().flatten().all(fits),
            Literal::Bool(_) | Literal::Str(_) | Literal::StrList(_) => true,
        }
    }
}

/// One `name = value` pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub name: String,
    pub value: Literal,
}

/// Raw value tree before shape classification
#[derive(Debug)]
enum Value {
    Bare(String),
    Quoted(String),
    List(Vec<Value>),
}

/// Parse a test case input into assignments, preserving their order
pub fn parse_input(input: &str) -> Result<Vec<Assignment>, InputError> {
    let mut scanner = Scanner::new(input);
    let mut assignments = Vec::new();

    scanner.skip_ws();
    if scanner.at_end() {
        return Ok(assignments);
    }

    loop {
        let name = scanner.identifier()?;
        scanner.skip_ws();
        if !scanner.eat('=') {
            return Err(InputError::ExpectedEquals(name));
        }
        scanner.skip_ws();
        let raw = scanner.value(&name, 0)?;
        let value = classify(&name, raw)?;
        assignments.push(Assignment { name, value });

        scanner.skip_ws();
        match scanner.peek() {
            None => break,
            Some((_, ',')) => {
                scanner.bump();
                scanner.skip_ws();
                // tolerate a trailing comma
                if scanner.at_end() {
                    break;
                }
            }
            Some((offset, found)) => return Err(InputError::ExpectedComma { found, offset }),
        }
    }

    Ok(assignments)
}

fn classify(name: &str, value: Value) -> Result<Literal, InputError> {
    match value {
        Value::Bare(tok) => match tok.as_str() {
            "true" => Ok(Literal::Bool(true)),
            "false" => Ok(Literal::Bool(false)),
            _ => Ok(Literal::Int(tok)),
        },
        Value::Quoted(s) => Ok(Literal::Str(s)),
        Value::List(items) => classify_list(name, items),
    }
}

fn classify_list(name: &str, items: Vec<Value>) -> Result<Literal, InputError> {
    let nested = items.iter().filter(|v| matches!(v, Value::List(_))).count();

    if nested == 0 {
        let any_quoted = items.iter().any(|v| matches!(v, Value::Quoted(_)));
        let texts = items.into_iter().map(|v| match v {
            Value::Bare(s) | Value::Quoted(s) => s,
            Value::List(_) => String::new(),
        });
        return Ok(if any_quoted {
            Literal::StrList(texts.collect())
        } else {
            Literal::IntList(texts.collect())
        });
    }

    if nested != items.len() {
        return Err(InputError::MixedList(name.to_owned()));
    }

    let mut rows = Vec::with_capacity(items.len());
    for item in items {
        let Value::List(row) = item else {
            return Err(InputError::MixedList(name.to_owned()));
        };
        let mut cells = Vec::with_capacity(row.len());
        for cell in row {
            match cell {
                Value::Bare(tok) => cells.push(tok),
                Value::Quoted(tok) => {
                    return Err(InputError::InvalidValue {
                        name: name.to_owned(),
                        token: format!("\"{tok}\""),
                    });
                }
                Value::List(_) => return Err(InputError::TooDeep(name.to_owned())),
            }
        }
        rows.push(cells);
    }
    Ok(Literal::IntGrid(rows))
}

struct Scanner<'a> {
    src: &'a str,
    chars: Peekable<CharIndices<'a>>,
}

impl<'a> Scanner<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            chars: src.char_indices().peekable(),
        }
    }

    fn peek(&mut self) -> Option<(usize, char)> {
        self.chars.peek().copied()
    }

    fn bump(&mut self) -> Option<(usize, char)> {
        self.chars.next()
    }

    fn at_end(&mut self) -> bool {
        self.peek().is_none()
    }

    fn offset(&mut self) -> usize {
        self.peek().map_or(self.src.len(), |(i, _)| i)
    }

    fn eat(&mut self, c: char) -> bool {
        if matches!(self.peek(), Some((_, p)) if p == c) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some((_, c)) if c.is_whitespace()) {
            self.bump();
        }
    }

    fn identifier(&mut self) -> Result<String, InputError> {
        let start = self.offset();
        match self.peek() {
            Some((_, c)) if c.is_ascii_alphabetic() || c == '_' => {}
            _ => return Err(InputError::ExpectedName(start)),
        }
        while matches!(self.peek(), Some((_, c)) if c.is_ascii_alphanumeric() || c == '_') {
            self.bump();
        }
        let end = self.offset();
        Ok(self.src[start..end].to_owned())
    }

    fn value(&mut self, name: &str, depth: usize) -> Result<Value, InputError> {
        match self.peek() {
            Some((_, '[')) => {
                if depth >= 2 {
                    return Err(InputError::TooDeep(name.to_owned()));
                }
                self.bump();
                self.list(name, depth + 1)
            }
            Some((_, quote @ ('"' | '\''))) => {
                self.bump();
                self.quoted(name, quote)
            }
            _ => self.bare(name),
        }
    }

    fn list(&mut self, name: &str, depth: usize) -> Result<Value, InputError> {
        let mut items = Vec::new();
        self.skip_ws();
        if self.eat(']') {
            return Ok(Value::List(items));
        }
        loop {
            self.skip_ws();
            items.push(self.value(name, depth)?);
            self.skip_ws();
            match self.bump() {
                Some((_, ',')) => {}
                Some((_, ']')) => return Ok(Value::List(items)),
                _ => return Err(InputError::UnterminatedList(name.to_owned())),
            }
        }
    }

    fn quoted(&mut self, name: &str, quote: char) -> Result<Value, InputError> {
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err(InputError::UnterminatedString(name.to_owned())),
                Some((_, '\\')) => match self.bump() {
                    Some((_, 'n')) => out.push('\n'),
                    Some((_, 't')) => out.push('\t'),
                    Some((_, c)) => out.push(c),
                    None => return Err(InputError::UnterminatedString(name.to_owned())),
                },
                Some((_, c)) if c == quote => return Ok(Value::Quoted(out)),
                Some((_, c)) => out.push(c),
            }
        }
    }

    fn bare(&mut self, name: &str) -> Result<Value, InputError> {
        let start = self.offset();
        while matches!(self.peek(), Some((_, c)) if c != ',' && c != ']') {
            self.bump();
        }
        let end = self.offset();
        let token = self.src[start..end].trim();

        if token.is_empty() {
            return Err(InputError::MissingValue(name.to_owned()));
        }
        let valid = token
            .trim_start_matches(['-', '+'])
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
        if !valid || token.trim_start_matches(['-', '+']).is_empty() {
            return Err(InputError::InvalidValue {
                name: name.to_owned(),
                token: token.to_owned(),
            });
        }
        Ok(Value::Bare(token.to_owned()))
    }
}
