use std::fmt::Write;

use crate::harness::{Assignment, HarnessSpec, Literal, ReturnCategory, push_code, quote};

pub(crate) const PRELUDE: &str = "\
#include <stdio.h>
#include <stdlib.h>
#include <string.h>
#include <stdbool.h>
#include <limits.h>
#include <math.h>
";

pub(crate) fn render(code: &str, assignments: &[Assignment], spec: &HarnessSpec) -> String {
    let mut out = String::with_capacity(PRELUDE.len() + code.len() + 512);
    out.push_str(PRELUDE);
    push_code(&mut out, code);

    out.push_str("\nint main(void) {\n");
    let mut args = Vec::new();
    for assignment in assignments {
        for line in declare(assignment, &mut args) {
            let _ = writeln!(out, "    {line}");
        }
    }

    // Output bindings only fill parameters the test input did not
    let missing = spec.params.len().saturating_sub(args.len());
    match spec.category {
        ReturnCategory::IntArray | ReturnCategory::StrArray => {
            out.push_str("    int returnSize = 0;\n");
            if missing >= 1 {
                args.push("&returnSize".to_owned());
            }
        }
        ReturnCategory::IntMatrix => {
            out.push_str("    int returnSize = 0;\n");
            out.push_str("    int* returnColumnSizes = NULL;\n");
            if missing >= 1 {
                args.push("&returnSize".to_owned());
            }
            if missing >= 2 {
                args.push("&returnColumnSizes".to_owned());
            }
        }
        _ => {}
    }

    let _ = writeln!(
        out,
        "    {} result = {}({});",
        spec.return_type,
        spec.function_name,
        args.join(", ")
    );
    out.push_str(print(spec.category));
    out.push_str("    return 0;\n}\n");
    out
}

/// Declaration lines for one assignment; pushes the call arguments it provides
fn declare(assignment: &Assignment, args: &mut Vec<String>) -> Vec<String> {
    let name = &assignment.name;
    let int = if assignment.value.fits_i32() { "int" } else { "long long" };

    match &assignment.value {
        Literal::Int(tok) => {
            args.push(name.clone());
            vec![format!("{int} {name} = {tok};")]
        }
        Literal::Bool(b) => {
            args.push(name.clone());
            vec![format!("bool {name} = {b};")]
        }
        Literal::Str(s) => {
            args.push(name.clone());
            vec![format!("char {name}[] = {};", quote(s))]
        }
        Literal::IntList(items) => {
            args.push(name.clone());
            args.push(format!("{name}Size"));
            vec![
                array(int, name, items),
                format!("int {name}Size = {};", items.len()),
            ]
        }
        Literal::StrList(items) => {
            args.push(name.clone());
            args.push(format!("{name}Size"));
            let quoted: Vec<String> = items.iter().map(|s| quote(s)).collect();
            vec![
                array("char*", name, &quoted),
                format!("int {name}Size = {};", items.len()),
            ]
        }
        Literal::IntGrid(rows) => {
            args.push(name.clone());
            args.push(format!("{name}Size"));
            args.push(format!("{name}ColSize"));

            let mut lines = Vec::with_capacity(rows.len() + 3);
            let mut row_names = Vec::with_capacity(rows.len());
            for (i, row) in rows.iter().enumerate() {
                let row_name = format!("{name}_row{i}");
                lines.push(array(int, &row_name, row));
                row_names.push(row_name);
            }
            let sizes: Vec<String> = rows.iter().map(|r| r.len().to_string()).collect();
            lines.push(array(&format!("{int}*"), name, &row_names));
            lines.push(format!("int {name}Size = {};", rows.len()));
            lines.push(array("int", &format!("{name}ColSize"), &sizes));
            lines
        }
    }
}

/// C forbids zero-length initializers, so empty arrays get one placeholder slot
fn array(ty: &str, name: &str, items: &[String]) -> String {
    if items.is_empty() {
        let zero = if ty.ends_with('*') { "NULL" } else { "0" };
        format!("{ty} {name}[1] = {{{zero}}};")
    } else {
        format!("{ty} {name}[] = {{{}}};", items.join(", "))
    }
}

fn print(category: ReturnCategory) -> &'static str {
    match category {
        ReturnCategory::Int | ReturnCategory::Native => {
            "    printf(\"%lld\\n\", (long long)result);\n"
        }
        ReturnCategory::Float => "    printf(\"%g\\n\", (double)result);\n",
        ReturnCategory::Bool => "    printf(\"%s\\n\", result ? \"true\" : \"false\");\n",
        ReturnCategory::Str => "    printf(\"\\\"%s\\\"\\n\", result);\n",
        ReturnCategory::IntArray => {
            "    printf(\"[\");
    for (int i = 0; i < returnSize; i++) {
        if (i > 0) printf(\",\");
        printf(\"%lld\", (long long)result[i]);
    }
    printf(\"]\\n\");
"
        }
        ReturnCategory::StrArray => {
            "    printf(\"[\");
    for (int i = 0; i < returnSize; i++) {
        if (i > 0) printf(\",\");
        printf(\"\\\"%s\\\"\", result[i]);
    }
    printf(\"]\\n\");
"
        }
        ReturnCategory::IntMatrix => {
            "    printf(\"[\");
    for (int i = 0; i < returnSize; i++) {
        if (i > 0) printf(\",\");
        printf(\"[\");
        int cols = returnColumnSizes ? returnColumnSizes[i] : 0;
        for (int j = 0; j < cols; j++) {
            if (j > 0) printf(\",\");
            printf(\"%lld\", (long long)result[i][j]);
        }
        printf(\"]\");
    }
    printf(\"]\\n\");
"
        }
    }
}
