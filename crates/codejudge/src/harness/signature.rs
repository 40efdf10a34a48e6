//! Function signature parsing

use crate::harness::HarnessError;

const MODIFIERS: &[&str] = &[
    "public",
    "private",
    "protected",
    "static",
    "final",
    "synchronized",
    "inline",
    "extern",
    "virtual",
];

/// A parsed function signature
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub return_type: String,
    pub name: String,
    pub params: Vec<Param>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub ty: String,
    pub name: String,
}

impl Signature {
    /// Parse `[modifiers] <type> <name>(<params>)`
    pub fn parse(text: &str) -> Result<Self, HarnessError> {
        let text = text.trim().trim_end_matches(['{', ';']).trim_end();
        let malformed = || HarnessError::Signature(text.to_owned());

        let open = text.find('(').ok_or_else(malformed)?;
        let close = text.rfind(')').filter(|&c| c > open).ok_or_else(malformed)?;

        let (return_type, name) = split_trailing_identifier(&text[..open]).ok_or_else(malformed)?;
        let return_type = strip_modifiers(&return_type);
        if return_type.is_empty() {
            return Err(malformed());
        }

        let params = split_top_level(&text[open + 1..close])
            .into_iter()
            .filter(|p| !p.is_empty() && *p != "void")
            .map(|p| {
                let (ty, name) = split_param(p).ok_or_else(malformed)?;
                Ok(Param { ty, name })
            })
            .collect::<Result<Vec<_>, HarnessError>>()?;

        Ok(Self {
            return_type,
            name,
            params,
        })
    }
}

/// Split `"<type> <ident>"` into a compacted type and the identifier
fn split_trailing_identifier(text: &str) -> Option<(String, String)> {
    let text = text.trim_end();
    let start = text
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_alphanumeric() || *c == '_')
        .last()
        .map(|(i, _)| i)?;
    let name = &text[start..];
    if name.starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }
    Some((compact_type(&text[..start]), name.to_owned()))
}

fn split_param(param: &str) -> Option<(String, String)> {
    // C style `int nums[]` keeps the brackets on the type
    let mut param = param.trim();
    let mut suffix = String::new();
    while let Some(rest) = param.strip_suffix("[]") {
        suffix.push_str("[]");
        param = rest.trim_end();
    }
    let (ty, name) = split_trailing_identifier(param)?;
    let ty = strip_modifiers(&ty);
    if ty.is_empty() {
        return None;
    }
    Some((format!("{ty}{suffix}"), name))
}

/// Remove declaration modifiers and `final` from the front of a type
fn strip_modifiers(ty: &str) -> String {
    let mut rest = ty.trim();
    loop {
        let Some((head, tail)) = rest.split_once(char::is_whitespace) else {
            break;
        };
        if MODIFIERS.contains(&head) {
            rest = tail.trim_start();
        } else {
            break;
        }
    }
    if MODIFIERS.contains(&rest) {
        return String::new();
    }
    rest.to_owned()
}

/// Collapse whitespace and glue `*`, `&` and `[]` onto the preceding token
fn compact_type(ty: &str) -> String {
    let words: Vec<&str> = ty.split_whitespace().collect();
    let mut out = String::new();
    for word in words {
        let attaches = word.starts_with(['*', '&', '[', '>', ',']);
        if !out.is_empty() && !attaches && !out.ends_with(['<', ',']) {
            out.push(' ');
        }
        out.push_str(word);
    }
    out
}

/// Split on commas that are not inside `<>`, `()` or `[]`
pub(crate) fn split_top_level(text: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        match c {
            '<' | '(' | '[' => depth += 1,
            '>' | ')' | ']' => depth -= 1,
            ',' if depth == 0 => {
                parts.push(text[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(text[start..].trim());
    parts
}
