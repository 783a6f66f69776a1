//! Shared corpus-scanning primitive.
//!
//! Both the risk aggregator and the reference validator walk the same
//! document tree and match a pattern per line; only the grouping policy
//! differs. The walk lives here once, parameterized by pattern and a
//! per-match callback.

use anyhow::Result;
use ignore::WalkBuilder;
use log::debug;
use regex::Regex;
use std::path::{Path, PathBuf};

use crate::config::CORPUS_EXCLUDED_DIRS;

pub struct CorpusScanner {
    root: PathBuf,
    excluded_dirs: Vec<String>,
}

impl CorpusScanner {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            excluded_dirs: CORPUS_EXCLUDED_DIRS.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn with_excluded_dirs(mut self, dirs: Vec<String>) -> Self {
        self.excluded_dirs.extend(dirs);
        self
    }

    /// Walk the corpus and invoke `on_match` for every capture of `pattern`,
    /// with the file path relative to the corpus root, the 1-based line
    /// number, the full line, and the captures.
    ///
    /// Undecodable files are skipped, never an error. Returns the number of
    /// files scanned.
    pub fn scan<F>(&self, pattern: &Regex, mut on_match: F) -> Result<usize>
    where
        F: FnMut(&str, usize, &str, &regex::Captures),
    {
        let excluded = self.excluded_dirs.clone();
        let walker = WalkBuilder::new(&self.root)
            .hidden(false)
            .git_ignore(true)
            .filter_entry(move |entry| {
                let name = entry.file_name().to_string_lossy();
                !excluded.iter().any(|d| d == name.as_ref())
            })
            .build();

        let mut scanned = 0usize;
        for entry in walker {
            let entry = entry?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Ok(content) = std::fs::read_to_string(path) else {
                debug!("skipping undecodable file {}", path.display());
                continue;
            };
            scanned += 1;
            let rel = relative_to(path, &self.root);
            for (line_no, line) in content.lines().enumerate() {
                for caps in pattern.captures_iter(line) {
                    on_match(&rel, line_no + 1, line, &caps);
                }
            }
        }
        Ok(scanned)
    }
}

fn relative_to(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn corpus(files: &[(&str, &str)]) -> TempDir {
        let dir = TempDir::new().unwrap();
        for (name, content) in files {
            let path = dir.path().join(name);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }
        dir
    }

    #[test]
    fn matches_carry_relative_path_and_line_number() {
        let dir = corpus(&[("docs/risks.md", "intro\nsee RSK-001 here\n")]);
        let re = Regex::new(r"RSK-\d+").unwrap();
        let mut hits = Vec::new();
        CorpusScanner::new(dir.path())
            .scan(&re, |file, line_no, _line, caps| {
                hits.push((file.to_string(), line_no, caps[0].to_string()));
            })
            .unwrap();
        assert_eq!(hits, vec![("docs/risks.md".to_string(), 2, "RSK-001".to_string())]);
    }

    #[test]
    fn excluded_dirs_are_not_scanned() {
        let dir = corpus(&[
            ("notes.md", "RSK-001"),
            ("node_modules/dep/readme.md", "RSK-002"),
        ]);
        let re = Regex::new(r"RSK-\d+").unwrap();
        let mut ids = Vec::new();
        CorpusScanner::new(dir.path())
            .scan(&re, |_, _, _, caps| ids.push(caps[0].to_string()))
            .unwrap();
        assert_eq!(ids, vec!["RSK-001"]);
    }

    #[test]
    fn multiple_matches_on_one_line_all_fire() {
        let dir = corpus(&[("a.md", "RSK-001 and RSK-002\n")]);
        let re = Regex::new(r"RSK-\d+").unwrap();
        let mut count = 0;
        CorpusScanner::new(dir.path())
            .scan(&re, |_, _, _, _| count += 1)
            .unwrap();
        assert_eq!(count, 2);
    }
}
