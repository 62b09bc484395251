use std::fmt;
use std::ops::Range;

use crate::expression::Expression;

/// A single statement of a scenario.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// Bare invocation: `create instance count=1` (result discarded).
    Expression { expr: Expression, span: Range<usize> },
    /// Binding: `myvpc = create vpc cidr=10.0.0.0/16`
    Declaration {
        ident: String,
        expr: Expression,
        span: Range<usize>,
    },
}

impl Statement {
    pub fn expression(expr: Expression) -> Self {
        Statement::Expression { expr, span: 0..0 }
    }

    pub fn declaration(ident: impl Into<String>, expr: Expression) -> Self {
        Statement::Declaration {
            ident: ident.into(),
            expr,
            span: 0..0,
        }
    }

    pub fn span(&self) -> &Range<usize> {
        match self {
            Statement::Expression { span, .. } => span,
            Statement::Declaration { span, .. } => span,
        }
    }

    pub fn expr(&self) -> &Expression {
        match self {
            Statement::Expression { expr, .. } => expr,
            Statement::Declaration { expr, .. } => expr,
        }
    }

    pub fn expr_mut(&mut self) -> &mut Expression {
        match self {
            Statement::Expression { expr, .. } => expr,
            Statement::Declaration { expr, .. } => expr,
        }
    }

    /// Name bound by this statement, if it is a declaration.
    pub fn identifier(&self) -> Option<&str> {
        match self {
            Statement::Declaration { ident, .. } => Some(ident),
            Statement::Expression { .. } => None,
        }
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statement::Expression { expr, .. } => write!(f, "{}", expr),
            Statement::Declaration { ident, expr, .. } => write!(f, "{} = {}", ident, expr),
        }
    }
}
