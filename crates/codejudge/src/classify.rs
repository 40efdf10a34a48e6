//! Diagnostic classification
//!
//! Compiler and runtime output refers to lines of the synthesized program. The
//! classifier picks out `file:line[:col]: error|warning: message` entries,
//! shifts their line numbers back into the user's code and renders them as
//! `Line N: error: message`.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::types::LanguageId;

static JAVA_DIAGNOSTIC: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^(?:.*[\\/])?[A-Za-z0-9_]+\.java:(\d+):\s*(error|warning):\s*(.*?)\s*$").unwrap()
});

static C_FAMILY_DIAGNOSTIC: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?m)^(?:.*[\\/])?[A-Za-z0-9_.\-]+:(\d+):(?:\d+:)?\s*(fatal error|error|warning):\s*(.*?)\s*$",
    )
    .unwrap()
});

static WARNING_FLAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*\[-W[^\]]*\]$").unwrap());

static JAVA_EXCEPTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"Exception in thread "main"\s*(.*)"#).unwrap());

static JAVA_FRAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"\([A-Za-z0-9_]+\.java:(\d+)\)").unwrap());

/// Classified diagnostics ready for display
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostics {
    /// One `Line N: kind: message` per entry, or the raw text when nothing matched
    pub message: String,

    /// User-relative line numbers in order of appearance, without duplicates
    pub lines: Vec<usize>,
}

impl Diagnostics {
    pub fn is_empty(&self) -> bool {
        self.message.is_empty()
    }
}

/// Map a line of the synthesized program back to the user's code
pub fn remap_line(line: usize, offset: usize) -> usize {
    line.saturating_sub(offset).max(1)
}

/// Parse compiler output and remap line numbers by `line_offset`
pub fn classify_diagnostics(language: LanguageId, text: &str, line_offset: usize) -> Diagnostics {
    let pattern = match language {
        LanguageId::Java => &*JAVA_DIAGNOSTIC,
        LanguageId::Cpp | LanguageId::C => &*C_FAMILY_DIAGNOSTIC,
    };

    let mut entries = Vec::new();
    let mut lines = Vec::new();
    for caps in pattern.captures_iter(text) {
        let Some(line) = caps.get(1).and_then(|m| m.as_str().parse::<usize>().ok()) else {
            continue;
        };
        let kind = caps.get(2).map_or("error", |m| m.as_str());
        let mut message = caps.get(3).map_or("", |m| m.as_str());
        if language != LanguageId::Java {
            message = WARNING_FLAG
                .find(message)
                .map_or(message, |flag| &message[..flag.start()]);
        }

        let line = remap_line(line, line_offset);
        entries.push(format!("Line {line}: {kind}: {message}"));
        if !lines.contains(&line) {
            lines.push(line);
        }
    }

    if entries.is_empty() {
        return Diagnostics {
            message: text.trim().to_owned(),
            lines,
        };
    }
    Diagnostics {
        message: entries.join("\n"),
        lines,
    }
}

/// One-line summary of a runtime fault
///
/// Java stack traces collapse to `Runtime exception: <exception>`, with the
/// first user frame's line when one is present. Other output is trimmed.
pub fn summarize_runtime_error(language: LanguageId, stderr: &str, line_offset: usize) -> String {
    if language == LanguageId::Java
        && let Some(caps) = JAVA_EXCEPTION.captures(stderr)
    {
        let exception = caps.get(1).map_or("", |m| m.as_str().trim());
        let mut summary = format!("Runtime exception: {exception}");
        if let Some(line) = JAVA_FRAME
            .captures(stderr)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse::<usize>().ok())
        {
            summary.push_str(&format!(" (line {})", remap_line(line, line_offset)));
        }
        return summary;
    }
    stderr.trim().to_owned()
}
