//! Static configuration: language table, default thresholds, corpus filters.

use std::path::Path;

/// Which heuristic scanner applies to a language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScannerFamily {
    /// `def`-based definitions delimited by indentation.
    Indentation,
    /// C-like definitions delimited by braces.
    Brace,
}

#[derive(Debug, Clone, Copy)]
pub struct LanguageSpec {
    pub name: &'static str,
    pub extensions: &'static [&'static str],
    pub family: ScannerFamily,
}

/// Languages the heuristic scanners understand. Function detection only runs
/// for these extensions; everything else is counted as plain files at most.
pub const LANGUAGES: &[LanguageSpec] = &[
    LanguageSpec {
        name: "Python",
        extensions: &["py"],
        family: ScannerFamily::Indentation,
    },
    LanguageSpec {
        name: "Rust",
        extensions: &["rs"],
        family: ScannerFamily::Brace,
    },
    LanguageSpec {
        name: "JavaScript",
        extensions: &["js", "jsx", "mjs"],
        family: ScannerFamily::Brace,
    },
    LanguageSpec {
        name: "TypeScript",
        extensions: &["ts", "tsx"],
        family: ScannerFamily::Brace,
    },
    LanguageSpec {
        name: "Go",
        extensions: &["go"],
        family: ScannerFamily::Brace,
    },
    LanguageSpec {
        name: "Java",
        extensions: &["java"],
        family: ScannerFamily::Brace,
    },
    LanguageSpec {
        name: "C",
        extensions: &["c", "h"],
        family: ScannerFamily::Brace,
    },
    LanguageSpec {
        name: "C++",
        extensions: &["cpp", "cc", "cxx", "hpp"],
        family: ScannerFamily::Brace,
    },
    LanguageSpec {
        name: "PowerShell",
        extensions: &["ps1", "psm1"],
        family: ScannerFamily::Brace,
    },
];

pub fn language_for_path(path: &str) -> Option<&'static LanguageSpec> {
    let ext = Path::new(path).extension()?.to_str()?.to_ascii_lowercase();
    LANGUAGES
        .iter()
        .find(|spec| spec.extensions.contains(&ext.as_str()))
}

pub fn is_code_file(path: &str) -> bool {
    language_for_path(path).is_some()
}

/// Names tokei reports for our configured languages.
pub fn language_from_tokei_name(name: &str) -> Option<&'static str> {
    let ours = match name {
        "Python" => "Python",
        "Rust" => "Rust",
        "JavaScript" | "JSX" => "JavaScript",
        "TypeScript" | "TSX" => "TypeScript",
        "Go" => "Go",
        "Java" => "Java",
        "C" | "C Header" => "C",
        "C++" | "C++ Header" => "C++",
        "PowerShell" => "PowerShell",
        _ => return None,
    };
    Some(ours)
}

/// Ceiling for the diff scanned by the breaking-API detector.
pub const DEFAULT_MAX_DIFF_LINES: usize = 200_000;

pub const DEFAULT_MODULE_DEPTH: usize = 1;
pub const DEFAULT_MIN_FILES: usize = 1;
pub const DEFAULT_MAX_SAMPLES: usize = 5;

/// Sample lines stored in risk records are truncated to this many characters.
pub const SAMPLE_LINE_MAX_LEN: usize = 160;

pub const DEFAULT_RISK_PREFIX: &str = "RSK";
/// Comma-separated, as the `--prefixes` flag consumes it.
pub const DEFAULT_REF_PREFIXES: &str = "RSK,REQ,ADR";

/// Directory names never descended into when scanning a document corpus.
pub const CORPUS_EXCLUDED_DIRS: &[&str] = &[".git", "node_modules", "target", ".venv", "__pycache__"];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_lookup_is_case_insensitive() {
        assert_eq!(language_for_path("Tools/Build.PS1").unwrap().name, "PowerShell");
        assert_eq!(language_for_path("src/main.rs").unwrap().name, "Rust");
    }

    #[test]
    fn unknown_extensions_are_not_code() {
        assert!(!is_code_file("README.md"));
        assert!(!is_code_file("Makefile"));
        assert!(is_code_file("app.py"));
    }

    #[test]
    fn tokei_header_names_fold_into_base_language() {
        assert_eq!(language_from_tokei_name("C Header"), Some("C"));
        assert_eq!(language_from_tokei_name("C++ Header"), Some("C++"));
        assert_eq!(language_from_tokei_name("Dockerfile"), None);
    }
}
