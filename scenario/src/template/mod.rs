//! Template hole resolution.
//!
//! A template is a [`Script`] whose parameters may still be
//! [`Param::Pending`]. Two fill sources exist: a static [`Fills`] mapping,
//! which leaves unknown keys pending, and an [`Asker`], which answers
//! every hole it is asked about.

mod question;

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use thiserror::Error;

pub use question::question_for;

use crate::Script;
use crate::expression::{Param, QuestionKey};
use crate::value::Value;

/// Static fill source: question key → value.
pub type Fills = BTreeMap<QuestionKey, Value>;

/// A hole still pending after resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hole {
    /// Zero-based statement position.
    pub statement: usize,
    pub param: String,
    pub key: QuestionKey,
}

impl fmt::Display for Hole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "statement {}: {}={{{}}}",
            self.statement + 1,
            self.param,
            self.key
        )
    }
}

/// Post-condition failure: static resolution left holes unfilled.
#[derive(Debug, Clone, Error)]
#[error("{} unresolved hole(s): {}", .holes.len(), join_holes(.holes))]
pub struct UnresolvedHoles {
    pub holes: Vec<Hole>,
}

fn join_holes(holes: &[Hole]) -> String {
    holes
        .iter()
        .map(|h| h.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// The interactive fill source could not produce a usable value.
#[derive(Debug, Error)]
pub enum InputError {
    #[error("no answer given for '{question}'")]
    NoAnswer { question: String },

    #[error("unusable answer for '{question}': {reason}")]
    Unusable { question: String, reason: String },

    #[error("cannot read answer for '{question}': {source}")]
    Io {
        question: String,
        #[source]
        source: std::io::Error,
    },
}

/// Interactive fill source. Called once per distinct question key in a
/// resolution pass; the answer is installed as-is.
pub trait Asker {
    fn ask(&mut self, question: &str) -> Result<Value, InputError>;
}

impl<F> Asker for F
where
    F: FnMut(&str) -> Result<Value, InputError>,
{
    fn ask(&mut self, question: &str) -> Result<Value, InputError> {
        self(question)
    }
}

impl Script {
    /// Fill holes whose key is present in `fills`. Keys absent from the
    /// mapping stay pending. Returns the number of holes filled.
    pub fn resolve_template(&mut self, fills: &Fills) -> usize {
        let mut filled = 0;
        for statement in &mut self.statements {
            for param in statement.expr_mut().params.values_mut() {
                let value = match param {
                    Param::Pending(key) => match fills.get(key.as_str()) {
                        Some(value) => value.clone(),
                        None => continue,
                    },
                    Param::Resolved(_) => continue,
                };
                *param = Param::Resolved(value);
                filled += 1;
            }
        }
        filled
    }

    /// Fill every hole by asking `asker`. Holes sharing a question key
    /// are asked once. Stops at the first [`InputError`]; holes answered
    /// before it stay filled.
    pub fn interactive_resolve_template(
        &mut self,
        asker: &mut dyn Asker,
    ) -> Result<usize, InputError> {
        let mut answers: HashMap<QuestionKey, Value> = HashMap::new();
        let mut filled = 0;
        for statement in &mut self.statements {
            for param in statement.expr_mut().params.values_mut() {
                let Param::Pending(key) = param else {
                    continue;
                };
                let value = match answers.get(key.as_str()) {
                    Some(value) => value.clone(),
                    None => {
                        let value = asker.ask(&question_for(key))?;
                        answers.insert(key.clone(), value.clone());
                        value
                    }
                };
                *param = Param::Resolved(value);
                filled += 1;
            }
        }
        Ok(filled)
    }

    /// Succeeds only when no statement has a pending hole.
    pub fn ensure_resolved(&self) -> Result<(), UnresolvedHoles> {
        let holes = self.holes();
        if holes.is_empty() {
            Ok(())
        } else {
            Err(UnresolvedHoles { holes })
        }
    }
}
