use std::fmt;

use serde::{Deserialize, Serialize};

/// A parameter value as it appears in a scenario statement or as a
/// backend result. Deserializing never yields a `Reference`; text always
/// comes back as `String`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    String(String),
    Number(f64),
    Boolean(bool),
    /// Reference to an identifier declared by an earlier statement.
    Reference(String),
}

impl Value {
    /// Interpret a raw token: numbers in canonical form become Number,
    /// "true"/"false" become Boolean, `$name` becomes a Reference,
    /// everything else is a String. `0123`, `+5` and digit runs too long
    /// for an f64 stay strings so ids keep their exact text.
    pub fn parse_literal(s: &str) -> Value {
        if let Some(name) = s.strip_prefix('$') {
            if is_identifier(name) {
                return Value::Reference(name.to_string());
            }
        }
        if is_canonical_number(s) {
            if let Ok(n) = s.parse::<f64>() {
                if n.is_finite() {
                    return Value::Number(n);
                }
            }
        }
        match s {
            "true" => Value::Boolean(true),
            "false" => Value::Boolean(false),
            _ => Value::String(s.to_string()),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => {
                if n.is_finite() && *n == n.floor() && n.abs() < 1e15 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{}", n)
                }
            }
            Value::String(s) => write!(f, "{}", s),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Reference(name) => write!(f, "${}", name),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

/// Integer digits an f64 holds exactly.
const MAX_EXACT_DIGITS: usize = 15;

/// `-?(0|[1-9][0-9]*)(\.[0-9]+)?([eE][+-]?[0-9]+)?`, with plain integers
/// limited to what an f64 represents exactly.
fn is_canonical_number(s: &str) -> bool {
    let unsigned = s.strip_prefix('-').unwrap_or(s);
    let (mantissa, exponent) = match unsigned.find(['e', 'E']) {
        Some(at) => (&unsigned[..at], Some(&unsigned[at + 1..])),
        None => (unsigned, None),
    };
    let (int, frac) = match mantissa.split_once('.') {
        Some((int, frac)) => (int, Some(frac)),
        None => (mantissa, None),
    };

    let all_digits = |t: &str| !t.is_empty() && t.bytes().all(|b| b.is_ascii_digit());
    if !all_digits(int) || (int.len() > 1 && int.starts_with('0')) {
        return false;
    }
    if frac.is_some_and(|f| !all_digits(f)) {
        return false;
    }
    if let Some(exp) = exponent {
        let digits = exp.strip_prefix(['+', '-']).unwrap_or(exp);
        if !all_digits(digits) {
            return false;
        }
    }
    frac.is_some() || exponent.is_some() || int.len() <= MAX_EXACT_DIGITS
}

/// Identifiers start with a letter or underscore and continue with
/// letters, digits or underscores.
pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_literal_kinds() {
        assert_eq!(Value::parse_literal("3"), Value::Number(3.0));
        assert_eq!(Value::parse_literal("true"), Value::Boolean(true));
        assert_eq!(Value::parse_literal("$myvpc"), Value::Reference("myvpc".into()));
        assert_eq!(Value::parse_literal("t2.micro"), Value::String("t2.micro".into()));
        assert_eq!(Value::parse_literal("$"), Value::String("$".into()));
        assert_eq!(Value::parse_literal("inf"), Value::String("inf".into()));
        assert_eq!(Value::parse_literal("-2.5"), Value::Number(-2.5));
        assert_eq!(Value::parse_literal("0.25"), Value::Number(0.25));
        assert_eq!(Value::parse_literal("1e3"), Value::Number(1000.0));
    }

    #[test]
    fn non_canonical_numbers_keep_their_text() {
        for raw in ["0123", "012345678901", "+5", ".5", "5.", "00", "-07", "1234567890123456789"] {
            assert_eq!(Value::parse_literal(raw), Value::String(raw.into()), "{raw}");
        }
        assert_eq!(Value::parse_literal("0"), Value::Number(0.0));
        assert_eq!(Value::parse_literal("123456789012"), Value::Number(123456789012.0));
    }

    #[test]
    fn serde_is_untagged() {
        let values = vec![
            Value::from("vpc-1"),
            Value::Number(2.0),
            Value::Boolean(true),
        ];
        let json = serde_json::to_string(&values).unwrap();
        assert_eq!(json, r#"["vpc-1",2.0,true]"#);
        let back: Vec<Value> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, values);

        let int: Value = serde_json::from_str("7").unwrap();
        assert_eq!(int, Value::Number(7.0));
        let reference: Value = serde_json::from_str(r#""$vpc""#).unwrap();
        assert_eq!(reference, Value::from("$vpc"));
    }

    #[test]
    fn integral_numbers_display_without_fraction() {
        assert_eq!(Value::Number(70.0).to_string(), "70");
        assert_eq!(Value::Number(0.5).to_string(), "0.5");
        assert_eq!(Value::Reference("a".into()).to_string(), "$a");
    }
}
