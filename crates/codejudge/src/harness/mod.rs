//! Harness synthesis
//!
//! Turns a bare user function plus one test case input into a complete program:
//! a fixed prelude, the user's code, then an entry point that declares the test
//! values, calls the function and prints the result in a comparable form.
//!
//! User code always sits directly after the prelude, so diagnostics can be mapped
//! back to user lines by subtracting [`user_code_line_offset`].

use thiserror::Error;

pub use crate::harness::input::{Assignment, InputError, Literal, parse_input};
pub use crate::harness::signature::{Param, Signature};
use crate::types::LanguageId;

mod c;
mod cpp;
mod input;
mod java;
mod signature;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HarnessError {
    #[error("malformed test input: {0}")]
    Input(#[from] InputError),

    #[error("malformed signature '{0}'")]
    Signature(String),
}

/// How the entry point prints the function's return value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReturnCategory {
    #[default]
    Int,
    /// Floating point; C prints it with `%g`
    Float,
    Bool,
    Str,
    IntArray,
    /// 1-D string collection, elements printed double-quoted
    StrArray,
    IntMatrix,
    /// Printed with the language's own rendering
    Native,
}

const TYPE_QUALIFIERS: &[&str] = &["const", "static", "inline", "volatile", "final", "public"];

const JAVA_COLLECTIONS: &[&str] = &[
    "List", "ArrayList", "LinkedList", "Map", "HashMap", "TreeMap", "Set", "HashSet", "TreeSet",
    "Queue", "Deque", "ArrayDeque", "PriorityQueue", "Stack", "Collection",
];

impl ReturnCategory {
    /// Categorize a return type by its leading type token
    pub fn classify(language: LanguageId, return_type: &str) -> Self {
        let ty = return_type
            .split_whitespace()
            .filter(|w| !TYPE_QUALIFIERS.contains(w))
            .collect::<Vec<_>>()
            .join(" ");
        let ty = ty.trim_end_matches('&').trim();
        let ty = ty.strip_prefix("std::").unwrap_or(ty);

        match language {
            LanguageId::Cpp => match ty {
                "bool" => Self::Bool,
                "string" => Self::Str,
                "double" | "float" | "long double" => Self::Float,
                "vector<string>" | "vector<std::string>" => Self::StrArray,
                _ if ty.starts_with("vector<vector<") || ty.starts_with("vector<std::vector<") => {
                    Self::IntMatrix
                }
                _ if ty.starts_with("vector<") => Self::IntArray,
                _ => Self::Int,
            },
            LanguageId::C => match ty.replace(' ', "").as_str() {
                "bool" | "_Bool" => Self::Bool,
                "char*" => Self::Str,
                "double" | "float" | "longdouble" => Self::Float,
                "char**" => Self::StrArray,
                t if t.ends_with("**") => Self::IntMatrix,
                t if t.ends_with('*') => Self::IntArray,
                _ => Self::Int,
            },
            LanguageId::Java => match ty {
                "boolean" | "Boolean" => Self::Bool,
                "String" => Self::Str,
                "double" | "float" | "Double" | "Float" => Self::Float,
                "String[]" => Self::StrArray,
                _ if ty.contains('<') || JAVA_COLLECTIONS.contains(&ty) => Self::Native,
                _ if ty.ends_with("[][]") => Self::IntMatrix,
                _ if ty.ends_with("[]") => Self::IntArray,
                _ => Self::Int,
            },
        }
    }
}

/// Everything the synthesizer needs to know about the function under test
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessSpec {
    pub function_name: String,
    pub return_type: String,
    pub category: ReturnCategory,
    pub params: Vec<Param>,
}

impl HarnessSpec {
    /// Resolve from a signature, falling back to `function_name` returning an
    /// integer when the signature is blank
    pub fn resolve(
        language: LanguageId,
        signature: &str,
        function_name: &str,
    ) -> Result<Self, HarnessError> {
        if signature.trim().is_empty() {
            return Ok(Self {
                function_name: function_name.to_owned(),
                return_type: "int".to_owned(),
                category: ReturnCategory::Int,
                params: Vec::new(),
            });
        }

        let sig = Signature::parse(signature)?;
        Ok(Self {
            category: ReturnCategory::classify(language, &sig.return_type),
            function_name: sig.name,
            return_type: sig.return_type,
            params: sig.params,
        })
    }
}

/// A synthesized program
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Harness {
    pub source: String,

    /// Lines placed before the first line of user code
    pub user_line_offset: usize,
}

/// Build a complete program running `user_code` against one test input
pub fn synthesize(
    language: LanguageId,
    user_code: &str,
    input: &str,
    spec: &HarnessSpec,
    class_name: &str,
) -> Result<Harness, HarnessError> {
    let assignments = parse_input(input)?;
    let source = match language {
        LanguageId::Cpp => cpp::render(user_code, &assignments, spec),
        LanguageId::C => c::render(user_code, &assignments, spec),
        LanguageId::Java => java::render(user_code, &assignments, spec, class_name),
    };
    Ok(Harness {
        source,
        user_line_offset: user_code_line_offset(language, user_code, class_name),
    })
}

/// Number of synthesized lines that precede the user's first line
pub fn user_code_line_offset(language: LanguageId, user_code: &str, class_name: &str) -> usize {
    match language {
        LanguageId::Cpp => cpp::PRELUDE.lines().count(),
        LanguageId::C => c::PRELUDE.lines().count(),
        LanguageId::Java => {
            usize::from(java::needs_util_import(user_code))
                + usize::from(!java::declares_class(user_code, class_name))
        }
    }
}

/// Render `s` as a double-quoted literal valid in C, C++ and Java
pub(crate) fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Append user code so the following text starts on a fresh line
pub(crate) fn push_code(out: &mut String, code: &str) {
    out.push_str(code);
    if !code.ends_with('\n') {
        out.push('\n');
    }
}
