use std::fmt::Write;

use crate::harness::{Assignment, HarnessSpec, Literal, ReturnCategory, push_code, quote};

pub(crate) const PRELUDE: &str = "\
#include <iostream>
#include <vector>
#include <string>
#include <algorithm>
#include <map>
#include <set>
#include <unordered_map>
#include <unordered_set>
#include <queue>
#include <stack>
#include <climits>
#include <cmath>
#include <numeric>
using namespace std;
";

pub(crate) fn render(code: &str, assignments: &[Assignment], spec: &HarnessSpec) -> String {
    let mut out = String::with_capacity(PRELUDE.len() + code.len() + 512);
    out.push_str(PRELUDE);
    push_code(&mut out, code);

    out.push_str("\nint main() {\n");
    for assignment in assignments {
        let _ = writeln!(out, "    {}", declare(assignment));
    }

    let args: Vec<&str> = assignments.iter().map(|a| a.name.as_str()).collect();
    let _ = writeln!(
        out,
        "    auto result = {}({});",
        spec.function_name,
        args.join(", ")
    );
    out.push_str(print(spec.category));
    out.push_str("    return 0;\n}\n");
    out
}

fn declare(assignment: &Assignment) -> String {
    let name = &assignment.name;
    let int = if assignment.value.fits_i32() { "int" } else { "long long" };
    match &assignment.value {
        Literal::Int(tok) => format!("{int} {name} = {tok};"),
        Literal::Bool(b) => format!("bool {name} = {b};"),
        Literal::Str(s) => format!("string {name} = {};", quote(s)),
        Literal::IntList(items) => format!("vector<{int}> {name} = {{{}}};", items.join(", ")),
        Literal::StrList(items) => {
            let items: Vec<String> = items.iter().map(|s| quote(s)).collect();
            format!("vector<string> {name} = {{{}}};", items.join(", "))
        }
        Literal::IntGrid(rows) => {
            let rows: Vec<String> = rows
                .iter()
                .map(|row| format!("{{{}}}", row.join(", ")))
                .collect();
            format!("vector<vector<{int}>> {name} = {{{}}};", rows.join(", "))
        }
    }
}

fn print(category: ReturnCategory) -> &'static str {
    match category {
        ReturnCategory::Int | ReturnCategory::Float | ReturnCategory::Native => {
            "    cout << result << endl;\n"
        }
        ReturnCategory::Bool => "    cout << (result ? \"true\" : \"false\") << endl;\n",
        ReturnCategory::Str => "    cout << \"\\\"\" << result << \"\\\"\" << endl;\n",
        ReturnCategory::IntArray => {
            "    cout << \"[\";
    for (size_t i = 0; i < result.size(); i++) {
        if (i > 0) cout << \",\";
        cout << result[i];
    }
    cout << \"]\" << endl;
"
        }
        ReturnCategory::StrArray => {
            "    cout << \"[\";
    for (size_t i = 0; i < result.size(); i++) {
        if (i > 0) cout << \",\";
        cout << \"\\\"\" << result[i] << \"\\\"\";
    }
    cout << \"]\" << endl;
"
        }
        ReturnCategory::IntMatrix => {
            "    cout << \"[\";
    for (size_t i = 0; i < result.size(); i++) {
        if (i > 0) cout << \",\";
        cout << \"[\";
        for (size_t j = 0; j < result[i].size(); j++) {
            if (j > 0) cout << \",\";
            cout << result[i][j];
        }
        cout << \"]\";
    }
    cout << \"]\" << endl;
"
        }
    }
}
