//! Scanner for brace-delimited definitions (C-like languages).
//!
//! Signatures may span lines, so the scanner accumulates text while the
//! parenthesis balance stays open, then tests the whole candidate once the
//! balance closes. A candidate is accepted when it ends in `{`, does not end
//! in `;`, does not start with a control-flow keyword, and matches the
//! signature shape (type-like tokens, identifier, parameter list, optional
//! qualifier).

use once_cell::sync::Lazy;
use regex::Regex;

use super::SignatureScanner;
use crate::core::FunctionSignature;

/// Type-like prefix tokens, optionally qualified identifier, parameter list,
/// optional return type / qualifier, opening brace.
static SIG_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?:[A-Za-z_][\w:<>\[\]\*&]*[\s\*&]+)+(?:[A-Za-z_]\w*::)*([A-Za-z_][\w-]*)\s*\(.*\)\s*(?:->\s*[\w:<>\[\]&\*\s,']+)?(?:const|override|noexcept|throws\s+[\w,\s]+)?\s*\{$",
    )
    .unwrap()
});

static CONTROL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:\}\s*)?(?:if|else|for|while|switch|match|catch|return)\b").unwrap());

/// Unbalanced signatures longer than this are abandoned.
const MAX_SIGNATURE_LINES: usize = 8;

pub struct BraceScanner;

impl SignatureScanner for BraceScanner {
    fn scan(&self, content: &str, file: &str) -> Vec<FunctionSignature> {
        let lines: Vec<&str> = content.lines().collect();
        let mut found = Vec::new();

        let mut acc = String::new();
        let mut acc_start = 0usize;
        let mut balance = 0i32;
        let mut in_signature = false;

        for (idx, raw) in lines.iter().enumerate() {
            let line = raw.trim();

            if !in_signature {
                if !line.contains('(') || is_comment(line) {
                    continue;
                }
                in_signature = true;
                acc_start = idx;
                acc.clear();
                balance = 0;
            }

            if !acc.is_empty() {
                acc.push(' ');
            }
            acc.push_str(line);
            balance += paren_delta(line);

            if balance > 0 {
                if idx - acc_start + 1 >= MAX_SIGNATURE_LINES {
                    in_signature = false;
                }
                continue;
            }
            in_signature = false;

            let text = acc.trim();
            if text.ends_with(';') || !text.ends_with('{') || CONTROL_RE.is_match(text) {
                continue;
            }
            let Some(caps) = SIG_RE.captures(text) else {
                continue;
            };

            found.push(FunctionSignature {
                name: caps[1].to_string(),
                file: file.to_string(),
                line: acc_start + 1,
                length: brace_span(&lines, acc_start),
                raw_text: text.to_string(),
            });
        }
        found
    }
}

fn is_comment(line: &str) -> bool {
    line.starts_with("//") || line.starts_with('*') || line.starts_with("/*") || line.starts_with('#')
}

fn paren_delta(line: &str) -> i32 {
    let mut delta = 0i32;
    for c in line.chars() {
        match c {
            '(' => delta += 1,
            ')' => delta -= 1,
            _ => {}
        }
    }
    delta
}

/// Line distance from `start` to the matching closing brace, inclusive.
fn brace_span(lines: &[&str], start: usize) -> usize {
    let mut depth = 0i32;
    let mut opened = false;
    for (offset, line) in lines[start..].iter().enumerate() {
        for c in line.chars() {
            match c {
                '{' => {
                    depth += 1;
                    opened = true;
                }
                '}' => depth -= 1,
                _ => {}
            }
        }
        if opened && depth <= 0 {
            return offset + 1;
        }
    }
    lines.len() - start
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    #[test]
    fn finds_c_style_functions() {
        let src = indoc! {"
            #include <stdio.h>

            int add(int a, int b) {
                return a + b;
            }

            static char *name_of(int id) {
                return lookup(id);
            }
        "};
        let sigs = BraceScanner.scan(src, "m.c");
        let names: Vec<&str> = sigs.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["add", "name_of"]);
        assert_eq!(sigs[0].length, 3);
    }

    #[test]
    fn finds_rust_functions_with_return_types() {
        let src = indoc! {"
            pub fn add(a: u32, b: u32) -> u32 {
                a + b
            }
        "};
        let sigs = BraceScanner.scan(src, "m.rs");
        assert_eq!(sigs.len(), 1);
        assert_eq!(sigs[0].name, "add");
    }

    #[test]
    fn accumulates_multi_line_signatures() {
        let src = indoc! {"
            static long process(
                struct request *req,
                int flags) {
                return 0;
            }
        "};
        let sigs = BraceScanner.scan(src, "m.c");
        assert_eq!(sigs.len(), 1);
        assert_eq!(sigs[0].name, "process");
        assert_eq!(sigs[0].line, 1);
        assert_eq!(sigs[0].length, 5);
    }

    #[test]
    fn rejects_control_flow_and_calls() {
        let src = indoc! {"
            if (ready) {
                run();
            }
            while (more(input)) {
                step();
            }
            int x = compute(1, 2);
            helper(a, b);
        "};
        assert_eq!(BraceScanner.count(src), 0);
    }

    #[test]
    fn rejects_prototypes_ending_in_semicolon() {
        let src = "int add(int a, int b);\n";
        assert_eq!(BraceScanner.count(src), 0);
    }

    #[test]
    fn finds_powershell_functions_with_hyphenated_names() {
        let src = indoc! {"
            function Get-ChangedFiles($range) {
                git diff --name-only $range
            }
        "};
        let sigs = BraceScanner.scan(src, "tools/s.ps1");
        assert_eq!(sigs.len(), 1);
        assert_eq!(sigs[0].name, "Get-ChangedFiles");
    }
}
