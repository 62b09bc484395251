use std::path::Path;

use scenario::{Fills, Value};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValuesError {
    #[error("cannot read '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid values file '{path}': {source}")]
    Toml {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid --set '{0}': expected key=value")]
    BadSet(String),
}

/// Load a TOML values file. Nested tables flatten into dotted question
/// keys, so `[vpc] cidr = "10.0.0.0/16"` fills `{vpc.cidr}`.
pub fn load_fills(path: &Path) -> Result<Fills, ValuesError> {
    let text = std::fs::read_to_string(path).map_err(|source| ValuesError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let table: toml::Table = toml::from_str(&text).map_err(|source| ValuesError::Toml {
        path: path.display().to_string(),
        source,
    })?;
    Ok(fills_from_table(&table))
}

pub fn fills_from_table(table: &toml::Table) -> Fills {
    let mut fills = Fills::new();
    flatten_into(&mut fills, "", table);
    fills
}

fn flatten_into(fills: &mut Fills, prefix: &str, table: &toml::Table) {
    for (key, val) in table {
        let full = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };
        match val {
            toml::Value::Table(inner) => flatten_into(fills, &full, inner),
            other => {
                fills.insert(full, toml_to_value(other));
            }
        }
    }
}

/// Scalars map onto `Value` directly; arrays and datetimes fall back to
/// their TOML text.
pub fn toml_to_value(val: &toml::Value) -> Value {
    Value::deserialize(val.clone()).unwrap_or_else(|_| Value::String(val.to_string()))
}

/// Parse a `--set key=value` flag.
pub fn parse_set(raw: &str) -> Result<(String, Value), ValuesError> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), Value::parse_literal(value.trim())))
        }
        _ => Err(ValuesError::BadSet(raw.to_string())),
    }
}
