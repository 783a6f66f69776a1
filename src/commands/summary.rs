//! `summary` stage: ground-truth core counters plus additive enrichment.
//!
//! Core counters come straight from the repository, never from another
//! stage's artifact. Enrichment inputs are optional and additive; a missing
//! or malformed enrichment file is a warning, and an enrichment field can
//! never displace a core counter silently.

use anyhow::Result;
use chrono::Utc;
use log::{info, warn};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use crate::commands::modules::module_key;
use crate::core::types::{EnrichedValue, RevisionRange, SummaryMetrics, SCHEMA_VERSION};
use crate::git::GitRepo;
use crate::io::output::{ensure_output_dir, md_table, write_json_atomic, write_text_atomic, OutputFormat};

pub const REPORT_FILE: &str = "summary.json";

pub struct SummaryConfig {
    pub repo: PathBuf,
    pub old_ref: String,
    pub new_ref: String,
    pub enrich: Vec<PathBuf>,
    pub output_dir: PathBuf,
    pub format: OutputFormat,
}

/// Core counter names; enrichment may never occupy these keys.
const CORE_FIELDS: &[&str] = &[
    "commits_total",
    "files_changed",
    "lines_added",
    "lines_deleted",
    "modules_impacted",
];

pub fn compute_core(git: &GitRepo, range: &RevisionRange) -> Result<SummaryMetrics> {
    let old = git.resolve_ref(&range.old_ref)?;
    let new = git.resolve_ref(&range.new_ref)?;
    let commits = git.commits_between(old, new)?;
    let files = git.changed_files(old, new)?;

    let modules: BTreeSet<String> = files
        .iter()
        .map(|f| module_key(&f.path, 1, &[]))
        .collect();

    Ok(SummaryMetrics {
        schema_version: SCHEMA_VERSION,
        kind: "summary".to_string(),
        generated_at: Utc::now(),
        range: range.clone(),
        commits_total: commits.len(),
        files_changed: files.len(),
        lines_added: files.iter().map(|f| f.lines_added).sum(),
        lines_deleted: files.iter().map(|f| f.lines_deleted).sum(),
        modules_impacted: modules.len(),
        enrichment: BTreeMap::new(),
    })
}

/// Fields lifted from a recognized enrichment artifact, keyed by its `kind`.
pub fn lift_enrichment(kind: &str, artifact: &Value) -> Vec<(String, Value)> {
    let mut fields = Vec::new();
    match kind {
        "breaking_api" => {
            if let Some(candidates) = artifact.get("candidates").and_then(Value::as_array) {
                fields.push(("apis_breaking".to_string(), Value::from(candidates.len())));
            }
        }
        "risk_status" => {
            if let Some(records) = artifact.get("records").and_then(Value::as_array) {
                let open = records
                    .iter()
                    .filter(|r| r.get("status").and_then(Value::as_str) == Some("OPEN"))
                    .count();
                fields.push(("risks_open".to_string(), Value::from(open)));
                fields.push(("risks_total".to_string(), Value::from(records.len())));
            }
        }
        "module_impact" => {
            if let Some(buckets) = artifact.get("buckets").and_then(Value::as_array) {
                fields.push((
                    "modules_over_threshold".to_string(),
                    Value::from(buckets.len()),
                ));
                if let Some(top) = buckets
                    .first()
                    .and_then(|b| b.get("module_key"))
                    .and_then(Value::as_str)
                {
                    fields.push(("top_module".to_string(), Value::from(top)));
                }
            }
        }
        "reference_check" => {
            if let Some(ids) = artifact.get("ids").and_then(Value::as_array) {
                fields.push(("ids_total".to_string(), Value::from(ids.len())));
            }
            if let Some(single) = artifact
                .get("ids_single_occurrence")
                .and_then(Value::as_array)
            {
                fields.push((
                    "ids_single_occurrence".to_string(),
                    Value::from(single.len()),
                ));
            }
        }
        "code_metrics" => {
            for field in ["lines_diff", "funcs_diff", "files_added", "files_removed"] {
                if let Some(value) = artifact.get(field) {
                    fields.push((format!("metrics_{field}"), value.clone()));
                }
            }
        }
        other => {
            warn!("unknown enrichment kind '{other}'; skipping");
        }
    }
    fields
}

/// Merge one enrichment file into the summary. Additive only: a field whose
/// name collides with a core counter is recorded under the enrichment
/// namespace with its provenance pointer instead of overwriting.
pub fn merge_enrichment(summary: &mut SummaryMetrics, path: &Path) {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) => {
            warn!("enrichment {} unreadable: {err}; skipping", path.display());
            return;
        }
    };
    let artifact: Value = match serde_json::from_str(&content) {
        Ok(value) => value,
        Err(err) => {
            warn!("enrichment {} malformed: {err}; skipping", path.display());
            return;
        }
    };
    let kind = artifact
        .get("kind")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();

    let source = path.to_string_lossy().into_owned();
    for (name, value) in lift_enrichment(&kind, &artifact) {
        let name = if CORE_FIELDS.contains(&name.as_str()) {
            warn!("enrichment field '{name}' collides with a core counter; keeping both");
            format!("{kind}_{name}")
        } else {
            name
        };
        summary.enrichment.insert(
            name,
            EnrichedValue {
                value,
                source: source.clone(),
            },
        );
    }
}

pub fn run(config: &SummaryConfig) -> Result<i32> {
    let git = GitRepo::open(&config.repo)?;
    let range = RevisionRange {
        old_ref: config.old_ref.clone(),
        new_ref: config.new_ref.clone(),
    };
    let mut summary = compute_core(&git, &range)?;

    for path in &config.enrich {
        merge_enrichment(&mut summary, path);
    }
    info!(
        "summary for {}: {} commits, {} files, {} enrichment fields",
        range,
        summary.commits_total,
        summary.files_changed,
        summary.enrichment.len()
    );

    ensure_output_dir(&config.output_dir)?;
    if config.format.wants_json() {
        write_json_atomic(&config.output_dir.join(REPORT_FILE), &summary)?;
    }
    if config.format.wants_markdown() {
        write_text_atomic(&config.output_dir.join("summary.md"), &render_markdown(&summary))?;
    }
    Ok(0)
}

fn render_markdown(summary: &SummaryMetrics) -> String {
    let mut out = format!("# Change Summary: {}\n\n", summary.range);
    let rows = vec![
        vec!["commits_total".to_string(), summary.commits_total.to_string()],
        vec!["files_changed".to_string(), summary.files_changed.to_string()],
        vec!["lines_added".to_string(), summary.lines_added.to_string()],
        vec!["lines_deleted".to_string(), summary.lines_deleted.to_string()],
        vec![
            "modules_impacted".to_string(),
            summary.modules_impacted.to_string(),
        ],
    ];
    out.push_str(&md_table(&["Counter", "Value"], &rows));
    if !summary.enrichment.is_empty() {
        out.push_str("\n## Enrichment\n\n");
        let rows: Vec<Vec<String>> = summary
            .enrichment
            .iter()
            .map(|(name, ev)| vec![name.clone(), ev.value.to_string(), ev.source.clone()])
            .collect();
        out.push_str(&md_table(&["Field", "Value", "Source"], &rows));
    }
    out
}
