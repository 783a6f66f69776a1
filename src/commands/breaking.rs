//! `breaking` stage: name-keyed API change candidates from a diff.
//!
//! Candidates are keyed by declaration name, not full signature: two
//! overloads of one name collapse into a single MOD. That over-approximation
//! is deliberate (false positives beat missed breaking changes) and must not
//! be tightened.

use anyhow::Result;
use chrono::Utc;
use log::info;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::config;
use crate::core::types::{
    ApiChangeCandidate, BreakingApiReport, ChangeType, RevisionRange, SCHEMA_VERSION,
};
use crate::errors::PipelineError;
use crate::git::GitRepo;
use crate::io::output::{ensure_output_dir, md_table, write_json_atomic, write_text_atomic, OutputFormat};

pub const REPORT_FILE: &str = "breaking_api.json";

pub struct BreakingConfig {
    pub repo: PathBuf,
    pub old_ref: String,
    pub new_ref: String,
    pub output_dir: PathBuf,
    pub max_diff_lines: usize,
    pub format: OutputFormat,
}

/// Ordered declaration patterns: function/method, indentation-def,
/// arrow/lambda assignment, class. First match wins per line.
static DECL_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        // Keyword-introduced functions: fn/func/function/sub.
        Regex::new(r"^\s*(?:[\w\(\)]+\s+)*(?:fn|func|function|sub)\s+([A-Za-z_][\w-]*)").unwrap(),
        // C-like declarations: type tokens then name, parens, brace or open paren.
        Regex::new(r"^\s*(?:[A-Za-z_][\w:<>\[\]\*&]*[\s\*&]+)+([A-Za-z_]\w*)\s*\([^;]*?\)?\s*\{?\s*$")
            .unwrap(),
        // Indentation-style definitions.
        Regex::new(r"^\s*(?:async\s+)?def\s+([A-Za-z_]\w*)\s*\(").unwrap(),
        // Arrow/lambda assignments.
        Regex::new(
            r"^\s*(?:export\s+)?(?:const|let|var)\s+([A-Za-z_]\w*)\s*=\s*(?:async\s*)?(?:\([^)]*\)|[A-Za-z_]\w*)\s*=>",
        )
        .unwrap(),
        // Class-like declarations.
        Regex::new(r"^\s*(?:export\s+)?(?:abstract\s+)?(?:pub(?:\(crate\))?\s+)?(?:class|struct|trait|interface)\s+([A-Za-z_]\w*)")
            .unwrap(),
    ]
});

const REJECT_NAMES: &[&str] = &[
    "if", "else", "for", "while", "switch", "match", "catch", "return", "new", "sizeof",
];

/// First words that mark a line as control flow or a statement, never a
/// declaration, regardless of what the loose C-like pattern would capture.
const REJECT_LEADING: &[&str] = &[
    "if", "else", "elif", "for", "while", "switch", "match", "catch", "try", "do", "return",
    "with", "except", "raise", "assert", "import", "from", "yield", "await", "case", "print",
];

/// Try the ordered patterns against one diff line body.
pub fn match_declaration(line: &str) -> Option<String> {
    if line.trim_end().ends_with(';') && !line.contains('=') {
        // Prototypes and calls, not definitions.
        return None;
    }
    let first_word = line
        .trim_start()
        .split(|c: char| !c.is_alphanumeric() && c != '_')
        .next()
        .unwrap_or("");
    if REJECT_LEADING.contains(&first_word) {
        return None;
    }
    for pattern in DECL_PATTERNS.iter() {
        if let Some(caps) = pattern.captures(line) {
            let name = caps[1].to_string();
            if REJECT_NAMES.contains(&name.as_str()) {
                continue;
            }
            return Some(name);
        }
    }
    None
}

#[derive(Default)]
struct SideIndex {
    /// name -> (first seen signature text, files mentioning it)
    entries: BTreeMap<String, (String, Vec<String>)>,
}

impl SideIndex {
    fn record(&mut self, name: String, sig: &str, file: &str) {
        let entry = self
            .entries
            .entry(name)
            .or_insert_with(|| (sig.trim().to_string(), Vec::new()));
        if !entry.1.iter().any(|f| f == file) {
            entry.1.push(file.to_string());
        }
    }
}

/// Walk a unified diff and classify declaration names by side.
pub fn detect_candidates(patch: &str) -> Vec<ApiChangeCandidate> {
    let mut old_side = SideIndex::default();
    let mut new_side = SideIndex::default();

    let mut old_file = String::new();
    let mut new_file = String::new();
    for line in patch.lines() {
        if let Some(rest) = line.strip_prefix("--- ") {
            old_file = strip_diff_prefix(rest);
            continue;
        }
        if let Some(rest) = line.strip_prefix("+++ ") {
            new_file = strip_diff_prefix(rest);
            continue;
        }
        if line.starts_with("@@") || line.starts_with("diff ") || line.starts_with("index ") {
            continue;
        }

        let (body, added) = match line.as_bytes().first() {
            Some(b'+') => (&line[1..], true),
            Some(b'-') => (&line[1..], false),
            _ => continue,
        };
        // Added/removed files carry /dev/null on one side of the header;
        // fall back to the populated side.
        let current = if added {
            if new_file.is_empty() { &old_file } else { &new_file }
        } else if old_file.is_empty() {
            &new_file
        } else {
            &old_file
        };
        if current.is_empty() || !config::is_code_file(current) {
            continue;
        }
        let Some(name) = match_declaration(body) else {
            continue;
        };
        if added {
            new_side.record(name, body, current);
        } else {
            old_side.record(name, body, current);
        }
    }

    let mut names: Vec<String> = old_side
        .entries
        .keys()
        .chain(new_side.entries.keys())
        .cloned()
        .collect();
    names.sort();
    names.dedup();

    names
        .into_iter()
        .map(|name| {
            let old = old_side.entries.get(&name);
            let new = new_side.entries.get(&name);
            let change_type = match (old, new) {
                (Some(_), Some(_)) => ChangeType::Mod,
                (Some(_), None) => ChangeType::Del,
                (None, Some(_)) => ChangeType::Add,
                (None, None) => unreachable!("name came from one of the sides"),
            };
            let mut files: Vec<String> = old
                .map(|(_, f)| f.clone())
                .unwrap_or_default()
                .into_iter()
                .chain(new.map(|(_, f)| f.clone()).unwrap_or_default())
                .collect();
            files.sort();
            files.dedup();
            ApiChangeCandidate {
                name,
                change_type,
                old_sig: old.map(|(sig, _)| sig.clone()),
                new_sig: new.map(|(sig, _)| sig.clone()),
                files,
            }
        })
        .collect()
}

fn strip_diff_prefix(path: &str) -> String {
    let path = path.trim();
    if path == "/dev/null" {
        return String::new();
    }
    path.strip_prefix("a/")
        .or_else(|| path.strip_prefix("b/"))
        .unwrap_or(path)
        .to_string()
}

pub fn run(config: &BreakingConfig) -> Result<i32> {
    let git = GitRepo::open(&config.repo)?;
    let old = git.resolve_ref(&config.old_ref)?;
    let new = git.resolve_ref(&config.new_ref)?;

    let patch = git.zero_context_patch(old, new)?;
    let line_count = patch.lines().count();
    if line_count > config.max_diff_lines {
        return Err(PipelineError::DiffTooLarge {
            lines: line_count,
            limit: config.max_diff_lines,
        }
        .into());
    }

    let candidates = detect_candidates(&patch);
    info!(
        "{} API change candidates across {} diff lines",
        candidates.len(),
        line_count
    );

    let report = BreakingApiReport {
        schema_version: SCHEMA_VERSION,
        kind: "breaking_api".to_string(),
        generated_at: Utc::now(),
        range: RevisionRange {
            old_ref: config.old_ref.clone(),
            new_ref: config.new_ref.clone(),
        },
        candidates,
    };

    ensure_output_dir(&config.output_dir)?;
    if config.format.wants_json() {
        write_json_atomic(&config.output_dir.join(REPORT_FILE), &report)?;
    }
    if config.format.wants_markdown() {
        write_text_atomic(
            &config.output_dir.join("breaking_api.md"),
            &render_markdown(&report),
        )?;
    }
    Ok(0)
}

fn render_markdown(report: &BreakingApiReport) -> String {
    let mut out = format!("# API Change Candidates: {}\n\n", report.range);
    out.push_str("Name-keyed heuristic detection; expect over-approximation.\n\n");
    let rows: Vec<Vec<String>> = report
        .candidates
        .iter()
        .map(|c| {
            vec![
                c.name.clone(),
                format!("{:?}", c.change_type).to_uppercase(),
                c.files.join(", "),
            ]
        })
        .collect();
    out.push_str(&md_table(&["Name", "Change", "Files"], &rows));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    #[test]
    fn signature_change_collapses_to_one_mod() {
        let patch = indoc! {"
            --- a/src/api.py
            +++ b/src/api.py
            @@ -10 +10 @@
            -def foo(a):
            +def foo(a, b):
        "};
        let candidates = detect_candidates(patch);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].name, "foo");
        assert_eq!(candidates[0].change_type, ChangeType::Mod);
        assert!(candidates[0].old_sig.is_some());
        assert!(candidates[0].new_sig.is_some());
    }

    #[test]
    fn added_and_removed_names_classify_by_side() {
        let patch = indoc! {"
            --- a/src/lib.rs
            +++ b/src/lib.rs
            @@ -5 +5 @@
            -pub fn gone(x: u32) -> u32 {
            +pub fn fresh(x: u32) -> u32 {
        "};
        let candidates = detect_candidates(patch);
        let summary: Vec<(&str, ChangeType)> = candidates
            .iter()
            .map(|c| (c.name.as_str(), c.change_type))
            .collect();
        assert_eq!(summary, vec![("fresh", ChangeType::Add), ("gone", ChangeType::Del)]);
    }

    #[test]
    fn deleted_file_declarations_attribute_to_old_path() {
        let patch = indoc! {"
            --- a/src/old_module.py
            +++ /dev/null
            @@ -1,2 +0,0 @@
            -def legacy():
            -    pass
        "};
        let candidates = detect_candidates(patch);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].change_type, ChangeType::Del);
        assert_eq!(candidates[0].files, vec!["src/old_module.py"]);
    }

    #[test]
    fn non_code_files_are_ignored() {
        let patch = indoc! {"
            --- a/README.md
            +++ b/README.md
            @@ -1 +1 @@
            -def not_code(a):
            +def not_code(a, b):
        "};
        assert!(detect_candidates(patch).is_empty());
    }

    #[test]
    fn declaration_patterns_cover_the_four_shapes() {
        assert_eq!(match_declaration("def handler(req):"), Some("handler".into()));
        assert_eq!(
            match_declaration("pub fn parse(input: &str) -> Ast {"),
            Some("parse".into())
        );
        assert_eq!(
            match_declaration("const render = (props) => {"),
            Some("render".into())
        );
        assert_eq!(match_declaration("class Widget:"), Some("Widget".into()));
        assert_eq!(match_declaration("function Get-Data($x) {"), Some("Get-Data".into()));
    }

    #[test]
    fn control_flow_and_calls_do_not_match() {
        assert_eq!(match_declaration("if (x > 0) {"), None);
        assert_eq!(match_declaration("    helper(a, b);"), None);
        assert_eq!(match_declaration("for item in items:"), None);
    }
}
