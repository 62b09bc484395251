pub mod expression;
pub mod parser;
pub mod statement;
pub mod template;
pub mod value;

use std::fmt;

pub use crate::expression::{Expression, Param, QuestionKey};
pub use crate::statement::Statement;
pub use crate::template::{Asker, Fills, Hole, InputError, UnresolvedHoles};
pub use crate::value::Value;

/// A parsed (or template-instantiated) scenario: statements in source order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Script {
    pub statements: Vec<Statement>,
    /// The source file ID (for error reporting with codespan-reporting).
    pub source_id: usize,
}

impl Script {
    pub fn new(statements: Vec<Statement>) -> Self {
        Script {
            statements,
            source_id: 0,
        }
    }

    pub fn push(&mut self, statement: Statement) {
        self.statements.push(statement);
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// Every hole still pending, in statement then parameter order.
    pub fn holes(&self) -> Vec<Hole> {
        let mut holes = Vec::new();
        for (index, statement) in self.statements.iter().enumerate() {
            for (param, key) in statement.expr().holes() {
                holes.push(Hole {
                    statement: index,
                    param: param.to_string(),
                    key: key.to_string(),
                });
            }
        }
        holes
    }
}

impl fmt::Display for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for statement in &self.statements {
            writeln!(f, "{}", statement)?;
        }
        Ok(())
    }
}
