//! `refs` stage: typed-identifier occurrence checks across a corpus.
//!
//! Strict matches are canonical ids; the loose pattern additionally catches
//! near-miss forms (wrong case, `_` or space instead of `-`) which are
//! reported separately as invalid-like, never merged into the id records.

use anyhow::Result;
use chrono::Utc;
use log::info;
use regex::Regex;
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::core::types::{
    IdentifierRecord, InvalidLikeId, PrefixRollup, ReferenceReport, SCHEMA_VERSION,
};
use crate::io::output::{ensure_output_dir, md_table, write_json_atomic, write_text_atomic, OutputFormat};
use crate::scan::CorpusScanner;

pub const REPORT_FILE: &str = "reference_check.json";

pub struct RefsConfig {
    pub corpus: PathBuf,
    pub prefixes: Vec<String>,
    pub exclude_dirs: Vec<String>,
    /// Invalid-like or single-occurrence ids become a non-zero exit.
    pub strict: bool,
    pub output_dir: PathBuf,
    pub format: OutputFormat,
}

pub struct ScanOutcome {
    pub ids: Vec<IdentifierRecord>,
    pub invalid_like: Vec<InvalidLikeId>,
}

/// One pass with the loose pattern; each match is classified strict or
/// invalid-like on the spot.
pub fn scan_identifiers(corpus: &CorpusScanner, prefixes: &[String]) -> Result<ScanOutcome> {
    let alternatives = prefixes
        .iter()
        .map(|p| regex::escape(p))
        .collect::<Vec<_>>()
        .join("|");
    let strict = Regex::new(&format!(r"^(?:{alternatives})-\d+$"))?;
    let loose = Regex::new(&format!(r"(?i)\b((?:{alternatives})[-_ ]?\d+)\b"))?;

    let mut groups: BTreeMap<String, (String, usize, Vec<String>)> = BTreeMap::new();
    let mut invalid_like = Vec::new();

    corpus.scan(&loose, |file, line_no, _line, caps| {
        let text = caps[1].to_string();
        if strict.is_match(&text) {
            let prefix = text.split('-').next().unwrap_or("").to_string();
            let entry = groups
                .entry(text)
                .or_insert_with(|| (prefix, 0, Vec::new()));
            entry.1 += 1;
            if !entry.2.iter().any(|f| f == file) {
                entry.2.push(file.to_string());
            }
        } else {
            invalid_like.push(InvalidLikeId {
                text,
                file: file.to_string(),
                line: line_no,
            });
        }
    })?;

    let ids = groups
        .into_iter()
        .map(|(id, (prefix, occurrences, files))| IdentifierRecord {
            id,
            prefix,
            occurrences,
            files,
        })
        .collect();
    Ok(ScanOutcome { ids, invalid_like })
}

pub fn build_report(corpus_label: String, outcome: ScanOutcome, prefixes: &[String]) -> ReferenceReport {
    let ScanOutcome { ids, invalid_like } = outcome;

    let ids_single_occurrence: Vec<String> = ids
        .iter()
        .filter(|r| r.occurrences == 1)
        .map(|r| r.id.clone())
        .collect();
    let ids_multi_occurrence: Vec<String> = ids
        .iter()
        .filter(|r| r.occurrences > 1)
        .map(|r| r.id.clone())
        .collect();

    let rollups = prefixes
        .iter()
        .map(|prefix| {
            let of_prefix: Vec<&IdentifierRecord> =
                ids.iter().filter(|r| &r.prefix == prefix).collect();
            let single = of_prefix.iter().filter(|r| r.occurrences == 1).count();
            PrefixRollup {
                prefix: prefix.clone(),
                distinct_ids: of_prefix.len(),
                total_occurrences: of_prefix.iter().map(|r| r.occurrences).sum(),
                single_occurrence: single,
                multi_occurrence: of_prefix.len() - single,
            }
        })
        .collect();

    ReferenceReport {
        schema_version: SCHEMA_VERSION,
        kind: "reference_check".to_string(),
        generated_at: Utc::now(),
        corpus: corpus_label,
        ids,
        ids_single_occurrence,
        ids_multi_occurrence,
        invalid_like,
        rollups,
    }
}

pub fn run(config: &RefsConfig) -> Result<i32> {
    let scanner = CorpusScanner::new(&config.corpus).with_excluded_dirs(config.exclude_dirs.clone());
    let outcome = scan_identifiers(&scanner, &config.prefixes)?;
    let report = build_report(
        config.corpus.to_string_lossy().into_owned(),
        outcome,
        &config.prefixes,
    );
    info!(
        "{} ids, {} invalid-like, {} single-occurrence",
        report.ids.len(),
        report.invalid_like.len(),
        report.ids_single_occurrence.len()
    );

    ensure_output_dir(&config.output_dir)?;
    if config.format.wants_json() {
        write_json_atomic(&config.output_dir.join(REPORT_FILE), &report)?;
    }
    if config.format.wants_markdown() {
        write_text_atomic(
            &config.output_dir.join("reference_check.md"),
            &render_markdown(&report),
        )?;
    }

    // Soft findings stay exit 0 unless strict mode turns them into a signal.
    if config.strict && (!report.invalid_like.is_empty() || !report.ids_single_occurrence.is_empty()) {
        return Ok(1);
    }
    Ok(0)
}

fn render_markdown(report: &ReferenceReport) -> String {
    let mut out = format!("# Reference Check: {}\n\n", report.corpus);
    out.push_str("## Per-prefix rollups\n\n");
    let rows: Vec<Vec<String>> = report
        .rollups
        .iter()
        .map(|r| {
            vec![
                r.prefix.clone(),
                r.distinct_ids.to_string(),
                r.total_occurrences.to_string(),
                r.single_occurrence.to_string(),
                r.multi_occurrence.to_string(),
            ]
        })
        .collect();
    out.push_str(&md_table(
        &["Prefix", "Distinct", "Occurrences", "Single", "Multi"],
        &rows,
    ));
    if !report.invalid_like.is_empty() {
        out.push_str("\n## Invalid-like ids\n\n");
        let rows: Vec<Vec<String>> = report
            .invalid_like
            .iter()
            .map(|i| vec![i.text.clone(), format!("{}:{}", i.file, i.line)])
            .collect();
        out.push_str(&md_table(&["Text", "Location"], &rows));
    }
    out
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

    fn prefixes(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn single_occurrence_is_flagged() {
        let dir = corpus(&[("a.md", "only REQ-101 here\n")]);
        let outcome =
            scan_identifiers(&CorpusScanner::new(dir.path()), &prefixes(&["REQ"])).unwrap();
        let report = build_report("c".into(), outcome, &prefixes(&["REQ"]));
        assert_eq!(report.ids_single_occurrence, vec!["REQ-101"]);
        assert!(report.ids_multi_occurrence.is_empty());
    }

    #[test]
    fn two_mentions_in_one_file_count_as_multi() {
        let dir = corpus(&[("a.md", "REQ-200 intro\nREQ-200 detail\n")]);
        let outcome =
            scan_identifiers(&CorpusScanner::new(dir.path()), &prefixes(&["REQ"])).unwrap();
        let report = build_report("c".into(), outcome, &prefixes(&["REQ"]));
        assert_eq!(report.ids_multi_occurrence, vec!["REQ-200"]);
        let record = &report.ids[0];
        assert_eq!(record.occurrences, 2);
        assert_eq!(record.files.len(), 1);
    }

    #[test]
    fn malformed_ids_are_invalid_like_not_records() {
        let dir = corpus(&[("a.md", "rsk-001 and RSK_002 and RSK 003 but RSK-004 is fine\n")]);
        let outcome =
            scan_identifiers(&CorpusScanner::new(dir.path()), &prefixes(&["RSK"])).unwrap();
        assert_eq!(outcome.ids.len(), 1);
        assert_eq!(outcome.ids[0].id, "RSK-004");
        assert_eq!(outcome.invalid_like.len(), 3);
    }

    #[test]
    fn rollups_split_single_and_multi() {
        let dir = corpus(&[
            ("a.md", "RSK-001 [OPEN] and REQ-001\n"),
            ("b.md", "RSK-001 again\n"),
        ]);
        let p = prefixes(&["RSK", "REQ"]);
        let outcome = scan_identifiers(&CorpusScanner::new(dir.path()), &p).unwrap();
        let report = build_report("c".into(), outcome, &p);
        let rsk = report.rollups.iter().find(|r| r.prefix == "RSK").unwrap();
        assert_eq!(rsk.distinct_ids, 1);
        assert_eq!(rsk.total_occurrences, 2);
        assert_eq!(rsk.multi_occurrence, 1);
        let req = report.rollups.iter().find(|r| r.prefix == "REQ").unwrap();
        assert_eq!(req.single_occurrence, 1);
    }
}
