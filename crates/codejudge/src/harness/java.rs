use std::fmt::Write;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::harness::{Assignment, HarnessSpec, Literal, ReturnCategory, push_code, quote};

const UTIL_IMPORT: &str = "import java.util.*;";

/// Tokens that mean the code relies on `java.util`
const UTIL_MARKERS: &[&str] = &[
    "HashMap",
    "Map<",
    "ArrayList",
    "List<",
    "Arrays.",
    "Collections.",
    "PriorityQueue",
    "HashSet",
    "Set<",
    "LinkedList",
    "Queue<",
    "Stack",
];

static CLASS_DECL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bclass\s+([A-Za-z_][A-Za-z0-9_]*)").unwrap());

/// Whether a `java.util` wildcard import has to be added in front of the code
pub(crate) fn needs_util_import(code: &str) -> bool {
    !code.contains(UTIL_IMPORT) && UTIL_MARKERS.iter().any(|m| code.contains(m))
}

/// Split off the leading block of `import` lines, blank lines and line comments
///
/// Returns `(header, rest)`; the header ends after the last import of that block
/// and is empty when the code does not start with imports.
pub(crate) fn split_imports(code: &str) -> (&str, &str) {
    let mut end = 0;
    let mut pos = 0;
    for line in code.split_inclusive('\n') {
        let trimmed = line.trim();
        if trimmed.starts_with("import ") {
            end = pos + line.len();
        } else if !(trimmed.is_empty() || trimmed.starts_with("//")) {
            break;
        }
        pos += line.len();
    }
    code.split_at(end)
}

/// Whether the code already declares the required class
pub(crate) fn declares_class(code: &str, class_name: &str) -> bool {
    CLASS_DECL
        .captures_iter(code)
        .any(|caps| caps.get(1).is_some_and(|m| m.as_str() == class_name))
}

pub(crate) fn render(
    code: &str,
    assignments: &[Assignment],
    spec: &HarnessSpec,
    class_name: &str,
) -> String {
    let mut out = String::with_capacity(code.len() + 1024);
    if needs_util_import(code) {
        out.push_str(UTIL_IMPORT);
        out.push('\n');
    }

    let main = main_method(assignments, spec, class_name);
    match declares_class(code, class_name).then(|| code.rfind('}')).flatten() {
        Some(close) => {
            // main goes inside the user's class, just before its closing brace
            out.push_str(&code[..close]);
            if !code[..close].ends_with('\n') {
                out.push('\n');
            }
            out.push_str(&main);
            out.push_str(&code[close..]);
            if !code.ends_with('\n') {
                out.push('\n');
            }
        }
        None => {
            // imports are only legal at the top level; the class line follows them
            let (imports, body) = split_imports(code);
            if !imports.is_empty() {
                push_code(&mut out, imports);
            }
            let _ = writeln!(out, "public class {class_name} {{");
            push_code(&mut out, body);
            out.push('\n');
            out.push_str(&main);
            out.push_str("}\n");
        }
    }
    out
}

fn main_method(assignments: &[Assignment], spec: &HarnessSpec, class_name: &str) -> String {
    let mut out = String::new();
    out.push_str("    public static void main(String[] harnessArgs) {\n");
    let _ = writeln!(out, "        {class_name} solver = new {class_name}();");
    for assignment in assignments {
        let _ = writeln!(out, "        {}", declare(assignment));
    }

    let args: Vec<&str> = assignments.iter().map(|a| a.name.as_str()).collect();
    let _ = writeln!(
        out,
        "        {} result = solver.{}({});",
        spec.return_type,
        spec.function_name,
        args.join(", ")
    );
    out.push_str(print(spec.category));
    out.push_str("    }\n");
    out
}

fn declare(assignment: &Assignment) -> String {
    let name = &assignment.name;
    let wide = !assignment.value.fits_i32();
    let int = if wide { "long" } else { "int" };
    let num = |tok: &String| {
        if wide && !tok.ends_with(['L', 'l']) {
            format!("{tok}L")
        } else {
            tok.clone()
        }
    };

    match &assignment.value {
        Literal::Int(tok) => format!("{int} {name} = {};", num(tok)),
        Literal::Bool(b) => format!("boolean {name} = {b};"),
        Literal::Str(s) => format!("String {name} = {};", quote(s)),
        Literal::IntList(items) => {
            let items: Vec<String> = items.iter().map(num).collect();
            format!("{int}[] {name} = {{{}}};", items.join(", "))
        }
        Literal::StrList(items) => {
            let items: Vec<String> = items.iter().map(|s| quote(s)).collect();
            format!("String[] {name} = {{{}}};", items.join(", "))
        }
        Literal::IntGrid(rows) => {
            let rows: Vec<String> = rows
                .iter()
                .map(|row| {
                    let row: Vec<String> = row.iter().map(num).collect();
                    format!("{{{}}}", row.join(", "))
                })
                .collect();
            format!("{int}[][] {name} = {{{}}};", rows.join(", "))
        }
    }
}

fn print(category: ReturnCategory) -> &'static str {
    match category {
        ReturnCategory::Int
        | ReturnCategory::Float
        | ReturnCategory::Bool
        | ReturnCategory::Native => {
            "        System.out.println(result);\n"
        }
        ReturnCategory::Str => "        System.out.println(\"\\\"\" + result + \"\\\"\");\n",
        ReturnCategory::IntArray => {
            "        StringBuilder rendered = new StringBuilder(\"[\");
        for (int i = 0; i < result.length; i++) {
            if (i > 0) rendered.append(\",\");
            rendered.append(result[i]);
        }
        rendered.append(\"]\");
        System.out.println(rendered);
"
        }
        ReturnCategory::StrArray => {
            "        StringBuilder rendered = new StringBuilder(\"[\");
        for (int i = 0; i < result.length; i++) {
            if (i > 0) rendered.append(\",\");
            rendered.append(\"\\\"\").append(result[i]).append(\"\\\"\");
        }
        rendered.append(\"]\");
        System.out.println(rendered);
"
        }
        ReturnCategory::IntMatrix => {
            "        StringBuilder rendered = new StringBuilder(\"[\");
        for (int i = 0; i < result.length; i++) {
            if (i > 0) rendered.append(\",\");
            rendered.append(\"[\");
            for (int j = 0; j < result[i].length; j++) {
                if (j > 0) rendered.append(\",\");
                rendered.append(result[i][j]);
            }
            rendered.append(\"]\");
        }
        rendered.append(\"]\");
        System.out.println(rendered);
"
        }
    }
}
