use std::ops::Range;

use crate::parser::error::ParseError;

// ---------------------------------------------------------------------------
// Token types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    /// Bare word: action, entity, identifier, parameter name or value.
    Word(String),
    /// Double-quoted string with escapes processed.
    Quoted(String),
    /// `{question.key}`
    Hole(String),
    /// `=`
    Eq,
}

#[derive(Debug, Clone)]
pub(crate) struct Spanned {
    pub token: Token,
    pub span: Range<usize>,
}

/// Tokenize one line. `offset` is the byte position of the line in the
/// whole source so spans point into the original text. A `#` at the
/// start of a token begins a comment running to end of line.
pub(crate) fn tokenize_line(
    line: &str,
    offset: usize,
    file_id: usize,
) -> Result<Vec<Spanned>, ParseError> {
    let mut tokens = Vec::new();
    let bytes = line.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        if c.is_ascii_whitespace() {
            i += 1;
            continue;
        }
        let start = i;
        match c {
            b'#' => break,
            b'=' => {
                i += 1;
                tokens.push(Spanned {
                    token: Token::Eq,
                    span: offset + start..offset + i,
                });
            }
            b'"' => {
                let (text, end) = lex_quoted(line, start, offset, file_id)?;
                i = end;
                tokens.push(Spanned {
                    token: Token::Quoted(text),
                    span: offset + start..offset + i,
                });
            }
            b'{' => {
                let Some(close) = line[start..].find('}') else {
                    return Err(ParseError::error(
                        "unterminated hole",
                        offset + start..offset + line.len(),
                        file_id,
                    )
                    .with_note("holes are written as {question.key}"));
                };
                let key = line[start + 1..start + close].trim();
                i = start + close + 1;
                if key.is_empty() {
                    return Err(ParseError::error(
                        "hole has an empty question key",
                        offset + start..offset + i,
                        file_id,
                    ));
                }
                tokens.push(Spanned {
                    token: Token::Hole(key.to_string()),
                    span: offset + start..offset + i,
                });
            }
            b'}' => {
                return Err(ParseError::error(
                    "unexpected '}'",
                    offset + start..offset + start + 1,
                    file_id,
                ));
            }
            _ => {
                while i < bytes.len() && !is_word_boundary(bytes[i]) {
                    i += 1;
                }
                tokens.push(Spanned {
                    token: Token::Word(line[start..i].to_string()),
                    span: offset + start..offset + i,
                });
            }
        }
    }

    Ok(tokens)
}

fn is_word_boundary(b: u8) -> bool {
    b.is_ascii_whitespace() || matches!(b, b'=' | b'"' | b'{' | b'}')
}

/// Lex a double-quoted string starting at `start` (the opening quote).
/// Returns the unescaped text and the byte index just past the closing quote.
fn lex_quoted(
    line: &str,
    start: usize,
    offset: usize,
    file_id: usize,
) -> Result<(String, usize), ParseError> {
    let mut text = String::new();
    let mut chars = line[start + 1..].char_indices();

    while let Some((pos, c)) = chars.next() {
        match c {
            '"' => return Ok((text, start + 1 + pos + 1)),
            '\\' => match chars.next() {
                Some((_, 'n')) => text.push('\n'),
                Some((_, 't')) => text.push('\t'),
                Some((_, 'r')) => text.push('\r'),
                Some((_, '\\')) => text.push('\\'),
                Some((_, '"')) => text.push('"'),
                Some((_, '\'')) => text.push('\''),
                Some((esc_pos, 'u')) => {
                    let body = &line[start + 1 + esc_pos + 1..];
                    let at = offset + start + 1 + esc_pos;
                    let decoded = body
                        .strip_prefix('{')
                        .and_then(|rest| rest.split_once('}'))
                        .and_then(|(hex, _)| {
                            let c = u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)?;
                            Some((c, hex.len() + 2))
                        });
                    let Some((c, consumed)) = decoded else {
                        return Err(ParseError::error(
                            "invalid unicode escape, expected '\\u{hex}'",
                            at - 1..at + 1,
                            file_id,
                        ));
                    };
                    text.push(c);
                    for _ in 0..consumed {
                        chars.next();
                    }
                }
                Some((esc_pos, other)) => {
                    let at = offset + start + 1 + esc_pos;
                    return Err(ParseError::error(
                        format!("unknown escape sequence '\\{}'", other),
                        at - 1..at + other.len_utf8(),
                        file_id,
                    ));
                }
                None => break,
            },
            other => text.push(other),
        }
    }

    Err(ParseError::error(
        "unterminated string literal",
        offset + start..offset + line.len(),
        file_id,
    ))
}
