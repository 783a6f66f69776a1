//! `risks` stage: canonical risk status per identifier across a corpus.

use anyhow::Result;
use chrono::Utc;
use log::info;
use regex::Regex;
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::config::SAMPLE_LINE_MAX_LEN;
use crate::core::status::RiskStatus;
use crate::core::types::{RiskRecord, RiskStatusReport, SCHEMA_VERSION};
use crate::io::output::{ensure_output_dir, md_table, write_json_atomic, write_text_atomic, OutputFormat};
use crate::scan::CorpusScanner;

pub const REPORT_FILE: &str = "risk_status.json";

pub struct RisksConfig {
    pub corpus: PathBuf,
    pub prefix: String,
    pub exclude_dirs: Vec<String>,
    pub output_dir: PathBuf,
    pub format: OutputFormat,
}

struct PendingRecord {
    status: RiskStatus,
    occurrences: usize,
    files: Vec<String>,
    sample: String,
}

/// Scan the corpus and resolve one canonical status per risk id.
pub fn aggregate(corpus: &CorpusScanner, prefix: &str) -> Result<Vec<RiskRecord>> {
    let id_pattern = Regex::new(&format!(r"\b({}-\d+)\b", regex::escape(prefix)))?;
    let tag_pattern = Regex::new(r"\[([A-Z]+)\]")?;

    let mut records: BTreeMap<String, PendingRecord> = BTreeMap::new();
    corpus.scan(&id_pattern, |file, _line_no, line, caps| {
        let id = caps[1].to_uppercase();
        let status = line_status(&tag_pattern, line);

        let entry = records.entry(id).or_insert_with(|| PendingRecord {
            status: RiskStatus::Unknown,
            occurrences: 0,
            files: Vec::new(),
            sample: truncate(line.trim(), SAMPLE_LINE_MAX_LEN),
        });
        // Priority order wins over recency.
        entry.status = entry.status.resolve(status);
        entry.occurrences += 1;
        if !entry.files.iter().any(|f| f == file) {
            entry.files.push(file.to_string());
        }
    })?;

    Ok(records
        .into_iter()
        .map(|(id, pending)| RiskRecord {
            id,
            status: pending.status,
            occurrences: pending.occurrences,
            files: pending.files,
            sample: pending.sample,
        })
        .collect())
}

/// First recognized bracketed tag on the line; absent tag means UNKNOWN.
fn line_status(tag_pattern: &Regex, line: &str) -> RiskStatus {
    tag_pattern
        .captures_iter(line)
        .find_map(|caps| RiskStatus::parse_tag(&caps[1]))
        .unwrap_or(RiskStatus::Unknown)
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}

pub fn run(config: &RisksConfig) -> Result<i32> {
    let scanner = CorpusScanner::new(&config.corpus).with_excluded_dirs(config.exclude_dirs.clone());
    let records = aggregate(&scanner, &config.prefix)?;
    info!(
        "{} risk ids resolved under {}",
        records.len(),
        config.corpus.display()
    );

    let report = RiskStatusReport {
        schema_version: SCHEMA_VERSION,
        kind: "risk_status".to_string(),
        generated_at: Utc::now(),
        corpus: config.corpus.to_string_lossy().into_owned(),
        records,
    };

    ensure_output_dir(&config.output_dir)?;
    if config.format.wants_json() {
        write_json_atomic(&config.output_dir.join(REPORT_FILE), &report)?;
    }
    if config.format.wants_markdown() {
        write_text_atomic(
            &config.output_dir.join("risk_status.md"),
            &render_markdown(&report),
        )?;
    }
    Ok(0)
}

fn render_markdown(report: &RiskStatusReport) -> String {
    let mut out = format!("# Risk Status: {}\n\n", report.corpus);
    let rows: Vec<Vec<String>> = report
        .records
        .iter()
        .map(|r| {
            vec![
                r.id.clone(),
                r.status.as_str().to_string(),
                r.occurrences.to_string(),
                r.files.len().to_string(),
            ]
        })
        .collect();
    out.push_str(&md_table(&["Id", "Status", "Occurrences", "Files"], &rows));
    out
}
