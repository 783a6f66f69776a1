//! `metrics` stage: aggregate and differential code metrics.
//!
//! Aggregate mode counts lines per language via an external counter (tokei)
//! and functions via the heuristic scanners. Differential mode reads blobs
//! straight from the object store and reports per-file deltas. Counter
//! unavailability degrades confidence; it never fails the run.

use anyhow::Result;
use chrono::Utc;
use ignore::WalkBuilder;
use log::{debug, info, warn};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::config::{self, LanguageSpec};
use crate::core::types::{
    AggregateMetrics, CounterConfidence, DifferentialMetrics, FileChangeStatus, FileDelta,
    LanguageMetrics, RevisionRange, SCHEMA_VERSION,
};
use crate::errors::PipelineError;
use crate::io::output::{ensure_output_dir, md_table, write_json_atomic, write_text_atomic, OutputFormat};
use crate::scan::scanner_for;

pub const AGGREGATE_FILE: &str = "code_metrics_aggregate.json";
pub const DIFFERENTIAL_FILE: &str = "code_metrics.json";

const METHOD_COUNT_CONFIDENCE: &str = "heuristic";

pub struct MetricsConfig {
    pub repo: PathBuf,
    /// Both present selects differential mode.
    pub old_ref: Option<String>,
    pub new_ref: Option<String>,
    /// Root for aggregate mode; defaults to the repo path.
    pub path: Option<PathBuf>,
    /// Provenance label recorded in aggregate output.
    pub rev_label: Option<String>,
    pub output_dir: PathBuf,
    pub format: OutputFormat,
}

pub fn run(config: &MetricsConfig) -> Result<i32> {
    ensure_output_dir(&config.output_dir)?;
    match (&config.old_ref, &config.new_ref) {
        (Some(old), Some(new)) => run_differential(config, old, new),
        (None, None) => run_aggregate(config),
        _ => Err(PipelineError::validation(
            "differential mode needs both --old-ref and --new-ref",
        )
        .into()),
    }
}

// --- aggregate mode ---

fn run_aggregate(config: &MetricsConfig) -> Result<i32> {
    let root = config.path.clone().unwrap_or_else(|| config.repo.clone());
    let files = collect_code_files(&root)?;
    info!("aggregate scan of {} under {}", files.len(), root.display());

    // Function counts are order-insensitive sums; fan out per file.
    let per_file: Vec<(&'static str, usize, bool)> = files
        .par_iter()
        .map(|(path, spec)| {
            let functions = match std::fs::read_to_string(path) {
                Ok(content) => scanner_for(spec.family).count(&content),
                // Binary or undecodable: zero, not an error.
                Err(_) => return (spec.name, 0usize, false),
            };
            (spec.name, functions, true)
        })
        .collect();

    let mut functions_by_lang: BTreeMap<&'static str, usize> = BTreeMap::new();
    let mut readable_any = false;
    for (lang, functions, readable) in per_file {
        *functions_by_lang.entry(lang).or_default() += functions;
        readable_any |= readable;
    }

    let (mut by_lang, confidence) = match run_external_counter(&root) {
        Some(counts) => (counts, CounterConfidence::Full),
        None => {
            warn!("external counter unavailable; falling back to raw line counts");
            let fallback = fallback_line_counts(&files);
            let confidence = if readable_any && !fallback.is_empty() {
                CounterConfidence::Partial
            } else {
                CounterConfidence::None
            };
            (fallback, confidence)
        }
    };

    for (lang, functions) in &functions_by_lang {
        by_lang.entry(*lang).or_default().4 = *functions;
    }

    let mut languages: Vec<LanguageMetrics> = by_lang
        .into_iter()
        .map(|(name, (files, code, comments, blanks, functions))| LanguageMetrics {
            language: name.to_string(),
            files,
            code_lines: code,
            comment_lines: comments,
            blank_lines: blanks,
            functions,
        })
        .collect();
    languages.sort_by(|a, b| a.language.cmp(&b.language));

    let totals = LanguageMetrics {
        language: "Total".to_string(),
        files: languages.iter().map(|l| l.files).sum(),
        code_lines: languages.iter().map(|l| l.code_lines).sum(),
        comment_lines: languages.iter().map(|l| l.comment_lines).sum(),
        blank_lines: languages.iter().map(|l| l.blank_lines).sum(),
        functions: languages.iter().map(|l| l.functions).sum(),
    };

    let report = AggregateMetrics {
        schema_version: SCHEMA_VERSION,
        kind: "code_metrics_aggregate".to_string(),
        generated_at: Utc::now(),
        root: root.to_string_lossy().into_owned(),
        rev_label: config.rev_label.clone(),
        counter_confidence: confidence,
        method_count_confidence: METHOD_COUNT_CONFIDENCE.to_string(),
        languages,
        totals,
    };

    if config.format.wants_json() {
        write_json_atomic(&config.output_dir.join(AGGREGATE_FILE), &report)?;
    }
    if config.format.wants_markdown() {
        write_text_atomic(
            &config.output_dir.join("code_metrics_aggregate.md"),
            &render_aggregate_markdown(&report),
        )?;
    }
    Ok(0)
}

fn collect_code_files(root: &Path) -> Result<Vec<(PathBuf, &'static LanguageSpec)>> {
    let mut files = Vec::new();
    let walker = WalkBuilder::new(root).hidden(false).git_ignore(true).build();
    for entry in walker {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if let Some(spec) = config::language_for_path(&path.to_string_lossy()) {
            files.push((path.to_path_buf(), spec));
        }
    }
    Ok(files)
}

type LangCounts = BTreeMap<&'static str, (usize, usize, usize, usize, usize)>;

/// Run tokei if present. `None` means the counter is unavailable or its
/// output was unusable; the caller degrades confidence instead of failing.
fn run_external_counter(root: &Path) -> Option<LangCounts> {
    which::which("tokei").ok()?;
    let output = Command::new("tokei")
        .arg("--output")
        .arg("json")
        .arg(root)
        .output()
        .ok()?;
    if !output.status.success() {
        debug!("tokei exited with {}", output.status);
        return None;
    }
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).ok()?;
    let object = value.as_object()?;

    let mut counts: LangCounts = BTreeMap::new();
    for (tokei_name, stats) in object {
        let Some(lang) = config::language_from_tokei_name(tokei_name) else {
            continue;
        };
        let entry = counts.entry(lang).or_default();
        entry.0 += stats
            .get("reports")
            .and_then(|r| r.as_array())
            .map_or(0, |a| a.len());
        entry.1 += stats.get("code").and_then(|v| v.as_u64()).unwrap_or(0) as usize;
        entry.2 += stats.get("comments").and_then(|v| v.as_u64()).unwrap_or(0) as usize;
        entry.3 += stats.get("blanks").and_then(|v| v.as_u64()).unwrap_or(0) as usize;
    }
    Some(counts)
}

/// Raw line classification used when the external counter is missing:
/// blank vs non-blank only, comments unknown.
fn fallback_line_counts(files: &[(PathBuf, &'static LanguageSpec)]) -> LangCounts {
    let mut counts: LangCounts = BTreeMap::new();
    for (path, spec) in files {
        let Ok(content) = std::fs::read_to_string(path) else {
            continue;
        };
        let entry = counts.entry(spec.name).or_default();
        entry.0 += 1;
        for line in content.lines() {
            if line.trim().is_empty() {
                entry.3 += 1;
            } else {
                entry.1 += 1;
            }
        }
    }
    counts
}

// --- differential mode ---

fn run_differential(config: &MetricsConfig, old_ref: &str, new_ref: &str) -> Result<i32> {
    let git = crate::git::GitRepo::open(&config.repo)?;
    let old = git.resolve_ref(old_ref)?;
    let new = git.resolve_ref(new_ref)?;
    let range = RevisionRange {
        old_ref: old_ref.to_string(),
        new_ref: new_ref.to_string(),
    };

    let changed = git.changed_files(old, new)?;
    let mut files = Vec::new();
    for file in &changed {
        let Some(spec) = config::language_for_path(&file.path) else {
            continue;
        };
        let old_side = decode(git.blob_at(old, &file.path)?);
        let new_side = decode(git.blob_at(new, &file.path)?);
        if old_side.is_none() && new_side.is_none() {
            // Binary on both sides, or vanished entirely: skip, not an error.
            debug!("skipping undecodable {}", file.path);
            continue;
        }

        let status = match (&old_side, &new_side) {
            (None, Some(_)) => FileChangeStatus::Added,
            (Some(_), None) => FileChangeStatus::Removed,
            _ => FileChangeStatus::Modified,
        };
        let scanner = scanner_for(spec.family);
        let (lines_old, funcs_old) = side_counts(&old_side, scanner);
        let (lines_new, funcs_new) = side_counts(&new_side, scanner);

        files.push(FileDelta {
            path: file.path.clone(),
            status,
            lines_old,
            lines_new,
            lines_diff: lines_new as i64 - lines_old as i64,
            funcs_old,
            funcs_new,
            funcs_diff: funcs_new as i64 - funcs_old as i64,
        });
    }
    files.sort_by(|a, b| a.path.cmp(&b.path));

    let report = DifferentialMetrics {
        schema_version: SCHEMA_VERSION,
        kind: "code_metrics".to_string(),
        generated_at: Utc::now(),
        range,
        files_added: files.iter().filter(|f| f.status == FileChangeStatus::Added).count(),
        files_removed: files.iter().filter(|f| f.status == FileChangeStatus::Removed).count(),
        files_modified: files.iter().filter(|f| f.status == FileChangeStatus::Modified).count(),
        lines_diff: files.iter().map(|f| f.lines_diff).sum(),
        funcs_diff: files.iter().map(|f| f.funcs_diff).sum(),
        method_count_confidence: METHOD_COUNT_CONFIDENCE.to_string(),
        files,
    };

    if config.format.wants_json() {
        write_json_atomic(&config.output_dir.join(DIFFERENTIAL_FILE), &report)?;
    }
    if config.format.wants_markdown() {
        write_text_atomic(
            &config.output_dir.join("code_metrics.md"),
            &render_differential_markdown(&report),
        )?;
    }
    Ok(0)
}

fn decode(blob: Option<Vec<u8>>) -> Option<String> {
    let bytes = blob?;
    if bytes.contains(&0) {
        return None;
    }
    String::from_utf8(bytes).ok()
}

fn side_counts(side: &Option<String>, scanner: &dyn crate::scan::SignatureScanner) -> (usize, usize) {
    match side {
        Some(content) => (content.lines().count(), scanner.count(content)),
        None => (0, 0),
    }
}

fn render_aggregate_markdown(report: &AggregateMetrics) -> String {
    let mut out = format!("# Code Metrics: {}\n\n", report.root);
    out.push_str(&format!(
        "Counter confidence: {:?}; method counts are {}.\n\n",
        report.counter_confidence, report.method_count_confidence
    ));
    let mut rows: Vec<Vec<String>> = report.languages.iter().map(lang_row).collect();
    rows.push(lang_row(&report.totals));
    out.push_str(&md_table(
        &["Language", "Files", "Code", "Comments", "Blanks", "Functions"],
        &rows,
    ));
    out
}

fn lang_row(l: &LanguageMetrics) -> Vec<String> {
    vec![
        l.language.clone(),
        l.files.to_string(),
        l.code_lines.to_string(),
        l.comment_lines.to_string(),
        l.blank_lines.to_string(),
        l.functions.to_string(),
    ]
}

fn render_differential_markdown(report: &DifferentialMetrics) -> String {
    let mut out = format!("# Code Metrics Diff: {}\n\n", report.range);
    out.push_str(&format!(
        "Files: +{} / -{} / ~{} | Lines: {:+} | Functions: {:+}\n\n",
        report.files_added,
        report.files_removed,
        report.files_modified,
        report.lines_diff,
        report.funcs_diff
    ));
    let rows: Vec<Vec<String>> = report
        .files
        .iter()
        .map(|f| {
            vec![
                f.path.clone(),
                format!("{:?}", f.status).to_lowercase(),
                format!("{:+}", f.lines_diff),
                format!("{:+}", f.funcs_diff),
            ]
        })
        .collect();
    out.push_str(&md_table(&["Path", "Status", "Lines", "Functions"], &rows));
    out
}
