//! Reference parser for scenario text.
//!
//! One statement per line:
//!
//! ```text
//! # comment
//! [ident =] action entity (key=value)*
//! ```
//!
//! Values are `"quoted strings"`, numbers, `true`/`false`, `$ident`
//! references, `{question.key}` holes, or bare words. Action, entity and
//! parameter names are case-insensitive and stored lowercased, so
//! `CREATE INSTANCE COUNT 1 TYPE t2.micro` (space-separated pairs) parses
//! the same as `create instance count=1 type=t2.micro`.

pub mod error;
mod lexer;

pub use error::ParseError;

use std::ops::Range;

use crate::Script;
use crate::expression::{Expression, Param};
use crate::parser::lexer::{Spanned, Token, tokenize_line};
use crate::statement::Statement;
use crate::value::{Value, is_identifier};

/// Parser entry point.
pub struct Parser {
    source: String,
    file_id: usize,
}

impl Parser {
    pub fn new(source: String, file_id: usize) -> Self {
        Parser { source, file_id }
    }

    /// Parse the whole source. Errors from every line are collected.
    pub fn parse(&self) -> Result<Script, Vec<ParseError>> {
        let mut statements = Vec::new();
        let mut errors = Vec::new();
        let mut offset = 0;

        for raw_line in self.source.split_inclusive('\n') {
            let line = raw_line.trim_end_matches(['\n', '\r']);
            match tokenize_line(line, offset, self.file_id)
                .and_then(|tokens| parse_statement(&tokens, self.file_id))
            {
                Ok(Some(statement)) => statements.push(statement),
                Ok(None) => {}
                Err(e) => errors.push(e),
            }
            offset += raw_line.len();
        }

        if errors.is_empty() {
            Ok(Script {
                statements,
                source_id: self.file_id,
            })
        } else {
            Err(errors)
        }
    }
}

/// Parse the tokens of one line. Blank and comment-only lines yield `None`.
fn parse_statement(tokens: &[Spanned], file_id: usize) -> Result<Option<Statement>, ParseError> {
    let Some(first) = tokens.first() else {
        return Ok(None);
    };
    let last = tokens.last().unwrap_or(first);
    let span = first.span.start..last.span.end;

    let declared = match tokens.get(1) {
        Some(Spanned {
            token: Token::Eq, ..
        }) => {
            let ident = match &first.token {
                Token::Word(w) if is_identifier(w) => w.clone(),
                _ => {
                    return Err(ParseError::error(
                        "invalid identifier on the left of '='",
                        first.span.clone(),
                        file_id,
                    )
                    .with_note("identifiers start with a letter or '_'"));
                }
            };
            Some(ident)
        }
        _ => None,
    };

    let rest = if declared.is_some() {
        &tokens[2..]
    } else {
        tokens
    };
    let expr = parse_expression(rest, span.clone(), file_id)?;

    Ok(Some(match declared {
        Some(ident) => Statement::Declaration { ident, expr, span },
        None => Statement::Expression { expr, span },
    }))
}

fn parse_expression(
    tokens: &[Spanned],
    span: Range<usize>,
    file_id: usize,
) -> Result<Expression, ParseError> {
    let action = expect_word(tokens.first(), "an action", &span, file_id)?;
    let entity = expect_word(tokens.get(1), "a resource kind", &span, file_id)?;
    let mut expr = Expression::new(action.to_lowercase(), entity.to_lowercase());

    let mut i = 2;
    while i < tokens.len() {
        let key_token = &tokens[i];
        let key = match &key_token.token {
            Token::Word(w) => w.to_lowercase(),
            _ => {
                return Err(ParseError::error(
                    "expected a parameter name",
                    key_token.span.clone(),
                    file_id,
                ));
            }
        };
        i += 1;
        if let Some(Spanned {
            token: Token::Eq, ..
        }) = tokens.get(i)
        {
            i += 1;
        }
        let Some(value_token) = tokens.get(i) else {
            return Err(ParseError::error(
                format!("parameter '{}' has no value", key),
                key_token.span.clone(),
                file_id,
            ));
        };
        i += 1;

        let param = match &value_token.token {
            Token::Word(w) => Param::Resolved(Value::parse_literal(w)),
            Token::Quoted(s) => Param::Resolved(Value::String(s.clone())),
            Token::Hole(key) => Param::Pending(key.clone()),
            Token::Eq => {
                return Err(ParseError::error(
                    "unexpected '='",
                    value_token.span.clone(),
                    file_id,
                ));
            }
        };

        if expr.params.contains_key(&key) {
            return Err(ParseError::error(
                format!("parameter '{}' given more than once", key),
                key_token.span.start..value_token.span.end,
                file_id,
            ));
        }
        expr.params.insert(key, param);
    }

    Ok(expr)
}

fn expect_word<'t>(
    token: Option<&'t Spanned>,
    what: &str,
    statement_span: &Range<usize>,
    file_id: usize,
) -> Result<&'t str, ParseError> {
    match token {
        Some(Spanned {
            token: Token::Word(w),
            ..
        }) => Ok(w),
        Some(other) => Err(ParseError::error(
            format!("expected {}", what),
            other.span.clone(),
            file_id,
        )),
        None => Err(ParseError::error(
            format!("expected {}", what),
            statement_span.end..statement_span.end,
            file_id,
        )
        .with_note("statements are written as: [name =] action entity key=value ...")),
    }
}
