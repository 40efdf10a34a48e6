//! Signature normalization
//!
//! Users name their solution function whatever they like. Before a harness is
//! wrapped around it, the first function-like declaration is rewritten to the
//! signature the problem requires, so the harness can call it by a known name.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::types::LanguageId;

/// Rewrites user code so its solution matches a required signature
pub trait Normalizer: Send + Sync {
    /// Return `code` with its solution declaration replaced by `signature`.
    ///
    /// For class-based languages the solution class is renamed to `class_name`.
    /// Code without a recognizable declaration is returned unchanged.
    fn normalize(&self, language: LanguageId, code: &str, signature: &str, class_name: &str)
    -> String;
}

/// Regex-driven normalizer that rewrites the first matching declaration
#[derive(Debug, Clone, Copy, Default)]
pub struct PatternNormalizer;

static C_FAMILY_DECL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"(?P<ret>(?:(?:const|unsigned|signed|long|short|static|inline)\s+)*",
        r"[A-Za-z_][\w:]*(?:\s*<[^{}();]*>)?)",
        r"(?:\s*[*&]+\s*|\s+)",
        r"(?P<name>[A-Za-z_]\w*)\s*\([^()]*\)\s*(?:const\s*)?\{",
    ))
    .unwrap()
});

static JAVA_DECL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"(?:(?:public|private|protected|static|final|synchronized)\s+)*",
        r"(?P<ret>[A-Za-z_][\w.]*(?:\s*<[^{}();]*>)?(?:\s*\[\s*\])*)",
        r"\s+(?P<name>[A-Za-z_]\w*)\s*\([^()]*\)\s*",
        r"(?:throws\s+[\w.]+(?:\s*,\s*[\w.]+)*\s*)?\{",
    ))
    .unwrap()
});

static JAVA_CLASS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?P<public>public\s+)?class\s+(?P<name>[A-Za-z_]\w*)").unwrap());

/// Words that can never be the return type or name of a declaration
const NOT_A_DECLARATION: &[&str] = &[
    "if", "else", "while", "for", "switch", "return", "do", "case", "new", "delete", "throw",
    "sizeof", "catch", "try", "typedef", "goto", "using", "namespace", "template", "operator",
    "class", "struct", "enum", "define", "public", "private", "protected", "static", "final",
    "synchronized", "main",
];

impl PatternNormalizer {
    pub fn new() -> Self {
        Self
    }

    fn rewrite_declaration(pattern: &Regex, code: &str, signature: &str) -> Option<String> {
        let caps = pattern.captures_iter(code).find(|caps| {
            let ret = caps.name("ret").map_or("", |m| m.as_str());
            let head = ret.split(['<', '[']).next().unwrap_or(ret);
            let base = head.split_whitespace().last().unwrap_or(head);
            let name = caps.name("name").map_or("", |m| m.as_str());
            !NOT_A_DECLARATION.contains(&base) && !NOT_A_DECLARATION.contains(&name)
        })?;

        let whole = caps.get(0)?;
        // keep the line count so diagnostics still map onto the user's lines
        let removed = whole.as_str().matches('\n').count();
        let pad = removed.saturating_sub(signature.matches('\n').count());

        let mut out = String::with_capacity(code.len() + signature.len() + pad);
        out.push_str(&code[..whole.start()]);
        out.push_str(signature);
        if pad == 0 {
            out.push(' ');
        }
        out.extend(std::iter::repeat_n('\n', pad));
        out.push('{');
        out.push_str(&code[whole.end()..]);
        Some(out)
    }

    /// Rename the public class, or the first class when none is public
    fn rename_class(code: &str, class_name: &str) -> String {
        let target = JAVA_CLASS
            .captures_iter(code)
            .find(|caps| caps.name("public").is_some())
            .or_else(|| JAVA_CLASS.captures_iter(code).next());

        let Some(name) = target.and_then(|caps| caps.name("name")) else {
            return code.to_owned();
        };
        if name.as_str() == class_name {
            return code.to_owned();
        }

        debug!(from = name.as_str(), to = class_name, "renaming solution class");
        let mut out = String::with_capacity(code.len());
        out.push_str(&code[..name.start()]);
        out.push_str(class_name);
        out.push_str(&code[name.end()..]);
        out
    }
}

impl Normalizer for PatternNormalizer {
    fn normalize(
        &self,
        language: LanguageId,
        code: &str,
        signature: &str,
        class_name: &str,
    ) -> String {
        let signature = signature.trim();

        let code = match language {
            LanguageId::Java => Self::rename_class(code, class_name),
            LanguageId::Cpp | LanguageId::C => code.to_owned(),
        };
        if signature.is_empty() {
            return code;
        }

        let pattern = match language {
            LanguageId::Java => &*JAVA_DECL,
            LanguageId::Cpp | LanguageId::C => &*C_FAMILY_DECL,
        };

        match Self::rewrite_declaration(pattern, &code, signature) {
            Some(rewritten) => rewritten,
            None => {
                debug!(%language, "no declaration found to normalize");
                code
            }
        }
    }
}
