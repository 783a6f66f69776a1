//! Scanner for indentation-delimited definitions (`def`-style languages).

use once_cell::sync::Lazy;
use regex::Regex;

use super::SignatureScanner;
use crate::core::FunctionSignature;

static DEF_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\s*)(?:async\s+)?def\s+([A-Za-z_]\w*)\s*\(").unwrap());

pub struct IndentationScanner;

impl SignatureScanner for IndentationScanner {
    fn scan(&self, content: &str, file: &str) -> Vec<FunctionSignature> {
        let lines: Vec<&str> = content.lines().collect();
        let mut found = Vec::new();

        for (idx, line) in lines.iter().enumerate() {
            let Some(caps) = DEF_RE.captures(line) else {
                continue;
            };
            let indent = indent_width(&caps[1]);
            let name = caps[2].to_string();

            // Body: contiguous run of following lines that are blank or
            // indented deeper than the definition line.
            let mut length = 1usize;
            let mut trailing_blanks = 0usize;
            for body in &lines[idx + 1..] {
                if body.trim().is_empty() {
                    length += 1;
                    trailing_blanks += 1;
                    continue;
                }
                if indent_width(body) > indent {
                    length += 1;
                    trailing_blanks = 0;
                } else {
                    break;
                }
            }
            length -= trailing_blanks;

            found.push(FunctionSignature {
                name,
                file: file.to_string(),
                line: idx + 1,
                length,
                raw_text: line.trim().to_string(),
            });
        }
        found
    }
}

fn indent_width(s: &str) -> usize {
    s.chars()
        .take_while(|c| c.is_whitespace())
        .map(|c| if c == '\t' { 4 } else { 1 })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    #[test]
    fn finds_top_level_and_nested_defs() {
        let src = indoc! {"
            def outer(a, b):
                x = a + b

                def inner():
                    return x

                return inner

            def standalone():
                pass
        "};
        let sigs = IndentationScanner.scan(src, "m.py");
        let names: Vec<&str> = sigs.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["outer", "inner", "standalone"]);
    }

    #[test]
    fn length_spans_the_indented_body() {
        let src = indoc! {"
            def f():
                a = 1
                b = 2

            top = 1
        "};
        let sigs = IndentationScanner.scan(src, "m.py");
        assert_eq!(sigs[0].length, 3);
    }

    #[test]
    fn async_defs_and_methods_match() {
        let src = "class C:\n    async def handler(self):\n        pass\n";
        let sigs = IndentationScanner.scan(src, "m.py");
        assert_eq!(sigs.len(), 1);
        assert_eq!(sigs[0].name, "handler");
        assert_eq!(sigs[0].line, 2);
    }

    #[test]
    fn call_sites_are_not_definitions() {
        let src = "result = compute(1, 2)\ndefault = defaults()\n";
        assert_eq!(IndentationScanner.count(src), 0);
    }
}
