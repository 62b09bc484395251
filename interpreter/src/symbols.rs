use std::collections::HashMap;

use scenario::Value;
use serde::{Serialize, Serializer};

use crate::error::RuntimeError;

/// Identifier bindings of one script run, in binding order.
///
/// Single-assignment: a name is bound at most once and never changes
/// afterwards.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SymbolTable {
    entries: Vec<(String, Value)>,
    index: HashMap<String, usize>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name`. Fails with [`RuntimeError::AlreadyBound`] if it is
    /// already bound.
    pub fn bind(&mut self, name: &str, value: Value) -> Result<(), RuntimeError> {
        if self.index.contains_key(name) {
            return Err(RuntimeError::AlreadyBound {
                name: name.to_string(),
            });
        }
        self.index.insert(name.to_string(), self.entries.len());
        self.entries.push((name.to_string(), value));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.index.get(name).map(|&i| &self.entries[i].1)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for SymbolTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.iter())
    }
}
