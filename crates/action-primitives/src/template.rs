//! `{field}` placeholder rendering for locators and typed text
//!
//! `{{` and `}}` escape literal braces. XPath templates re-quote string
//! literals that receive field values, so quotes in record data stay literal.

use crate::errors::ProbeError;

enum Piece<'s> {
    Literal(&'s str),
    Brace(char),
    Field(&'s str),
}

fn parse(template: &str) -> Result<Vec<Piece<'_>>, ProbeError> {
    let mut pieces = Vec::new();
    let mut rest = template;

    while let Some(pos) = rest.find(['{', '}']) {
        if pos > 0 {
            pieces.push(Piece::Literal(&rest[..pos]));
        }
        let tail = &rest[pos..];
        if tail.starts_with("{{") {
            pieces.push(Piece::Brace('{'));
            rest = &tail[2..];
        } else if tail.starts_with("}}") {
            pieces.push(Piece::Brace('}'));
            rest = &tail[2..];
        } else if tail.starts_with('}') {
            pieces.push(Piece::Brace('}'));
            rest = &tail[1..];
        } else {
            let close = tail.find('}').ok_or_else(|| {
                ProbeError::Internal(format!("unterminated placeholder in '{}'", template))
            })?;
            let name = &tail[1..close];
            if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                return Err(ProbeError::Internal(format!(
                    "invalid placeholder '{{{}}}' in '{}'",
                    name, template
                )));
            }
            pieces.push(Piece::Field(name));
            rest = &tail[close + 1..];
        }
    }
    if !rest.is_empty() {
        pieces.push(Piece::Literal(rest));
    }
    Ok(pieces)
}

/// Field names referenced by `template`, in order of appearance
pub fn placeholders(template: &str) -> Result<Vec<String>, ProbeError> {
    Ok(parse(template)?
        .into_iter()
        .filter_map(|piece| match piece {
            Piece::Field(name) => Some(name.to_string()),
            _ => None,
        })
        .collect())
}

/// Render `template`, failing with [`ProbeError::MissingField`] when a
/// referenced field has no value
pub fn render_template<'a, F>(template: &str, lookup: F) -> Result<String, ProbeError>
where
    F: Fn(&str) -> Option<&'a str>,
{
    let mut out = String::with_capacity(template.len());
    for piece in parse(template)? {
        match piece {
            Piece::Literal(s) => out.push_str(s),
            Piece::Brace(c) => out.push(c),
            Piece::Field(name) => {
                let value = lookup(name).ok_or_else(|| ProbeError::MissingField(name.to_string()))?;
                out.push_str(value);
            }
        }
    }
    Ok(out)
}

/// Render an XPath `template`
///
/// A quoted string literal that contains placeholders is rendered as a
/// whole and emitted through [`xpath_literal`]; text outside quotes is
/// substituted as-is.
pub fn render_xpath<'a, F>(template: &str, lookup: F) -> Result<String, ProbeError>
where
    F: Fn(&str) -> Option<&'a str>,
{
    let mut out = String::with_capacity(template.len());
    // (opening quote, literal content so far)
    let mut quoted: Option<(char, String)> = None;

    for piece in parse(template)? {
        match piece {
            Piece::Field(name) => {
                let value = lookup(name).ok_or_else(|| ProbeError::MissingField(name.to_string()))?;
                match quoted.as_mut() {
                    Some((_, content)) => content.push_str(value),
                    None => out.push_str(value),
                }
            }
            Piece::Brace(c) => push_xpath_char(&mut out, &mut quoted, c),
            Piece::Literal(text) => {
                for c in text.chars() {
                    push_xpath_char(&mut out, &mut quoted, c);
                }
            }
        }
    }
    // Unterminated literal: pass it through and let the engine reject it.
    if let Some((quote, content)) = quoted {
        out.push(quote);
        out.push_str(&content);
    }
    Ok(out)
}

fn push_xpath_char(out: &mut String, quoted: &mut Option<(char, String)>, c: char) {
    match quoted.take() {
        Some((quote, content)) if c == quote => out.push_str(&xpath_literal(&content, quote)),
        Some((quote, mut content)) => {
            content.push(c);
            *quoted = Some((quote, content));
        }
        None if c == '\'' || c == '"' => *quoted = Some((c, String::new())),
        None => out.push(c),
    }
}

/// XPath 1.0 string literal for `value`, quoted with `preferred` when possible
///
/// XPath has no escape sequences; a value holding both quote kinds becomes
/// a `concat(..)` expression.
pub fn xpath_literal(value: &str, preferred: char) -> String {
    if !value.contains(preferred) {
        return format!("{}{}{}", preferred, value, preferred);
    }
    if !value.contains('\'') {
        return format!("'{}'", value);
    }
    if !value.contains('"') {
        return format!("\"{}\"", value);
    }
    let parts: Vec<String> = value.split('\'').map(|part| format!("'{}'", part)).collect();
    format!("concat({})", parts.join(", \"'\", "))
}
