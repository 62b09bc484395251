use std::fmt;
use std::ops::Range;

use scenario::Statement;
use thiserror::Error;

use crate::driver::DriverError;

#[derive(Debug, Error)]
pub enum RuntimeError {
    /// A parameter references an identifier not bound by an earlier statement.
    #[error("unknown reference: ${name} is not bound by an earlier statement")]
    UnknownReference { name: String },

    /// The backend has no function for this (action, entity) pair.
    #[error("no driver function for '{action} {entity}'")]
    DispatchNotFound { action: String, entity: String },

    /// The dispatched function ran and reported failure.
    #[error("execution failed: {0}")]
    Execution(#[source] DriverError),

    /// A statement reached execution with a pending hole.
    #[error("unresolved hole: parameter '{param}' still waits for {{{key}}}")]
    UnresolvedHole { param: String, key: String },

    /// A declaration would overwrite an existing binding.
    #[error("identifier '{name}' is already bound")]
    AlreadyBound { name: String },

    #[error("run cancelled")]
    Cancelled,
}

impl From<DriverError> for RuntimeError {
    fn from(error: DriverError) -> Self {
        match error {
            DriverError::Unsupported { action, entity } => {
                RuntimeError::DispatchNotFound { action, entity }
            }
            other => RuntimeError::Execution(other),
        }
    }
}

/// Which statement a runtime error belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementContext {
    /// Zero-based position in the script.
    pub index: usize,
    pub action: String,
    pub entity: String,
    pub ident: Option<String>,
}

impl StatementContext {
    pub fn of(index: usize, statement: &Statement) -> Self {
        let expr = statement.expr();
        StatementContext {
            index,
            action: expr.action.clone(),
            entity: expr.entity.clone(),
            ident: statement.identifier().map(str::to_string),
        }
    }
}

impl fmt::Display for StatementContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "statement {} ", self.index + 1)?;
        match &self.ident {
            Some(ident) => write!(f, "({} = {} {})", ident, self.action, self.entity),
            None => write!(f, "({} {})", self.action, self.entity),
        }
    }
}

/// A runtime error enriched with the failing statement and its source span.
#[derive(Debug)]
pub struct DiagnosticError {
    pub error: RuntimeError,
    pub statement: Option<StatementContext>,
    pub span: Option<Range<usize>>,
    pub source_id: usize,
}

impl DiagnosticError {
    pub fn at(
        error: RuntimeError,
        statement: StatementContext,
        span: Range<usize>,
        source_id: usize,
    ) -> Self {
        DiagnosticError {
            error,
            statement: Some(statement),
            span: Some(span),
            source_id,
        }
    }
}

impl fmt::Display for DiagnosticError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.statement {
            Some(ctx) => write!(f, "{}: {}", ctx, self.error),
            None => self.error.fmt(f),
        }
    }
}

impl std::error::Error for DiagnosticError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}
