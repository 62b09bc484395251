use std::collections::BTreeMap;
use std::fmt::{self, Write as _};

use crate::value::Value;

/// Key identifying the question asked to fill a hole, e.g. `vpc.name`.
pub type QuestionKey = String;

/// A single parameter of an expression: either already known, or a hole
/// waiting for a fill source.
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Resolved(Value),
    Pending(QuestionKey),
}

impl Param {
    pub fn is_pending(&self) -> bool {
        matches!(self, Param::Pending(_))
    }
}

/// The unit of work: an action applied to a resource kind.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    /// Verb, e.g. "create".
    pub action: String,
    /// Resource kind, e.g. "vpc".
    pub entity: String,
    pub params: BTreeMap<String, Param>,
}

impl Expression {
    pub fn new(action: impl Into<String>, entity: impl Into<String>) -> Self {
        Expression {
            action: action.into(),
            entity: entity.into(),
            params: BTreeMap::new(),
        }
    }

    /// Builder-style resolved parameter.
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set_param(name, value);
        self
    }

    /// Builder-style hole.
    pub fn with_hole(mut self, name: impl Into<String>, key: impl Into<QuestionKey>) -> Self {
        self.set_hole(name, key);
        self
    }

    pub fn set_param(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.params
            .insert(name.into(), Param::Resolved(value.into()));
    }

    pub fn set_hole(&mut self, name: impl Into<String>, key: impl Into<QuestionKey>) {
        self.params.insert(name.into(), Param::Pending(key.into()));
    }

    /// Resolved value of a parameter, if present and not a hole.
    pub fn param(&self, name: &str) -> Option<&Value> {
        match self.params.get(name) {
            Some(Param::Resolved(v)) => Some(v),
            _ => None,
        }
    }

    /// Question key of a pending parameter, if it is a hole.
    pub fn hole(&self, name: &str) -> Option<&str> {
        match self.params.get(name) {
            Some(Param::Pending(key)) => Some(key),
            _ => None,
        }
    }

    /// Pending `(parameter, question key)` pairs, in parameter order.
    pub fn holes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params.iter().filter_map(|(name, param)| match param {
            Param::Pending(key) => Some((name.as_str(), key.as_str())),
            Param::Resolved(_) => None,
        })
    }

    /// Resolved `(parameter, value)` pairs, in parameter order.
    pub fn resolved_params(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.params.iter().filter_map(|(name, param)| match param {
            Param::Resolved(v) => Some((name.as_str(), v)),
            Param::Pending(_) => None,
        })
    }

    pub fn is_resolved(&self) -> bool {
        self.params.values().all(|p| !p.is_pending())
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.action, self.entity)?;
        for (name, param) in &self.params {
            match param {
                Param::Resolved(Value::String(s)) if needs_quotes(s) => {
                    write!(f, " {}=", name)?;
                    write_quoted(f, s)?
                }
                Param::Resolved(v) => write!(f, " {}={}", name, v)?,
                Param::Pending(key) => write!(f, " {}={{{}}}", name, key)?,
            }
        }
        Ok(())
    }
}

/// Quote `s` using only the escapes the lexer reads back.
fn write_quoted(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    f.write_char('"')?;
    for c in s.chars() {
        match c {
            '"' => f.write_str("\\\"")?,
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\t' => f.write_str("\\t")?,
            '\r' => f.write_str("\\r")?,
            c if c.is_control() => write!(f, "\\u{{{:x}}}", c as u32)?,
            c => f.write_char(c)?,
        }
    }
    f.write_char('"')
}

/// Strings that would not survive a round-trip as a bare word.
fn needs_quotes(s: &str) -> bool {
    s.is_empty()
        || s.chars().any(|c| {
            c.is_whitespace() || c.is_control() || matches!(c, '"' | '{' | '}' | '=' | '#')
        })
        || s.starts_with('$')
        || !matches!(Value::parse_literal(s), Value::String(_))
}
