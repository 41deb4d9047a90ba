use std::fmt;

use serde_json::{Map, Value};
use thiserror::Error;

/// Evaluation scope: the working value plus the accumulator fields reachable
/// through `$..locals`, `$..params` and `$..value`.
#[derive(Debug, Clone, Copy)]
pub struct Scope<'a> {
    pub value: &'a Value,
    pub locals: &'a Value,
    pub params: &'a Value,
}

static NULL: Value = Value::Null;

impl<'a> Scope<'a> {
    pub fn new(value: &'a Value) -> Self {
        Self {
            value,
            locals: &NULL,
            params: &NULL,
        }
    }

    pub fn with_locals(mut self, locals: &'a Value) -> Self {
        self.locals = locals;
        self
    }

    pub fn with_params(mut self, params: &'a Value) -> Self {
        self.params = params;
        self
    }
}

pub type EvalResult<T = Value> = Result<T, EvalError>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EvalError {
    #[error("expression '{0}' must start with '$'")]
    MissingSigil(String),
    #[error("syntax error in '{expr}' at offset {offset}: {message}")]
    Syntax {
        expr: String,
        offset: usize,
        message: &'static str,
    },
    #[error("unknown accumulator field '{0}' (expected value, locals or params)")]
    UnknownRoot(String),
}

/// Where a path starts reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathRoot {
    /// `$a.b`: the working value.
    Value,
    /// `$..locals.a`: the accumulator itself.
    Accumulator,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Field(String),
    Index(usize),
}

/// Parsed `$`-path such as `$a.b[0]`, `$.` or `$..locals.itemPath`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathExpr {
    pub root: PathRoot,
    pub segments: Vec<Segment>,
}

impl PathExpr {
    pub fn parse(expr: &str) -> EvalResult<Self> {
        let body = expr
            .trim()
            .strip_prefix('$')
            .ok_or_else(|| EvalError::MissingSigil(expr.to_string()))?;
        let (root, rest, base) = match body.strip_prefix("..") {
            Some(rest) => (PathRoot::Accumulator, rest, 3),
            None => (PathRoot::Value, body.strip_prefix('.').unwrap_or(body), 1),
        };
        let segments = parse_segments(expr, rest, base)?;
        Ok(Self { root, segments })
    }

    /// Reads the path out of `scope`; missing fields and out-of-range indexes read as `null`.
    pub fn eval(&self, scope: &Scope<'_>) -> EvalResult {
        let mut segments = self.segments.iter();
        let start = match self.root {
            PathRoot::Value => scope.value,
            PathRoot::Accumulator => match segments.next() {
                None => return Ok(scope_object(scope)),
                Some(Segment::Field(field)) => match field.as_str() {
                    "value" => scope.value,
                    "locals" => scope.locals,
                    "params" => scope.params,
                    other => return Err(EvalError::UnknownRoot(other.to_string())),
                },
                Some(Segment::Index(index)) => {
                    return Err(EvalError::UnknownRoot(index.to_string()));
                }
            },
        };
        let mut current = start;
        for segment in segments {
            let next = match (segment, current) {
                (Segment::Field(field), Value::Object(map)) => map.get(field),
                (Segment::Index(index), Value::Array(items)) => items.get(*index),
                _ => None,
            };
            match next {
                Some(value) => current = value,
                None => return Ok(Value::Null),
            }
        }
        Ok(current.clone())
    }
}

impl fmt::Display for PathExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("$")?;
        if self.root == PathRoot::Accumulator {
            f.write_str("..")?;
        }
        if self.segments.is_empty() && self.root == PathRoot::Value {
            return f.write_str(".");
        }
        for (idx, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Field(field) if idx == 0 => f.write_str(field)?,
                Segment::Field(field) => write!(f, ".{field}")?,
                Segment::Index(index) => write!(f, "[{index}]")?,
            }
        }
        Ok(())
    }
}

/// Parse and evaluate `expr` in one go.
pub fn eval_path(expr: &str, scope: &Scope<'_>) -> EvalResult {
    PathExpr::parse(expr)?.eval(scope)
}

fn scope_object(scope: &Scope<'_>) -> Value {
    let mut map = Map::with_capacity(3);
    map.insert("value".into(), scope.value.clone());
    map.insert("locals".into(), scope.locals.clone());
    map.insert("params".into(), scope.params.clone());
    Value::Object(map)
}

fn parse_segments(expr: &str, rest: &str, base: usize) -> EvalResult<Vec<Segment>> {
    let syntax = |offset: usize, message: &'static str| EvalError::Syntax {
        expr: expr.to_string(),
        offset: base + offset,
        message,
    };

    let bytes = rest.as_bytes();
    let mut segments = Vec::new();
    let mut pos = 0;
    // A field is expected at the start and after every '.'.
    let mut expect_field = true;
    while pos < bytes.len() {
        match bytes[pos] {
            b'.' => {
                if expect_field {
                    return Err(syntax(pos, "empty field name"));
                }
                expect_field = true;
                pos += 1;
            }
            b'[' => {
                let close = rest[pos..]
                    .find(']')
                    .map(|off| pos + off)
                    .ok_or_else(|| syntax(pos, "unterminated index"))?;
                let index = rest[pos + 1..close]
                    .parse::<usize>()
                    .map_err(|_| syntax(pos + 1, "index must be a non-negative integer"))?;
                segments.push(Segment::Index(index));
                expect_field = false;
                pos = close + 1;
            }
            _ => {
                if !expect_field {
                    return Err(syntax(pos, "expected '.' or '['"));
                }
                let end = rest[pos..]
                    .find(['.', '['])
                    .map(|off| pos + off)
                    .unwrap_or(rest.len());
                segments.push(Segment::Field(rest[pos..end].to_string()));
                expect_field = false;
                pos = end;
            }
        }
    }
    if expect_field && !segments.is_empty() {
        return Err(syntax(rest.len(), "trailing '.'"));
    }
    Ok(segments)
}
