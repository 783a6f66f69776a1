//! `extract` stage: materialize base facts for a revision range.

use anyhow::Result;
use chrono::Utc;
use log::{info, warn};
use std::fs;
use std::path::PathBuf;

use crate::core::types::{RevisionDiff, RevisionRange, Snapshot, SCHEMA_VERSION};
use crate::git::GitRepo;
use crate::io::output::{ensure_output_dir, md_table, write_json_atomic, write_text_atomic, OutputFormat};

pub const DIFF_FILE: &str = "revision_diff.json";
pub const SNAPSHOT_FILE: &str = "snapshot.json";

pub struct ExtractConfig {
    pub repo: PathBuf,
    pub old_ref: String,
    pub new_ref: String,
    pub output_dir: PathBuf,
    pub format: OutputFormat,
}

pub fn run(config: &ExtractConfig) -> Result<i32> {
    let range = RevisionRange {
        old_ref: config.old_ref.clone(),
        new_ref: config.new_ref.clone(),
    };

    let git = GitRepo::open(&config.repo)?;
    let old = git.resolve_ref(&config.old_ref)?;
    let new = git.resolve_ref(&config.new_ref)?;

    ensure_output_dir(&config.output_dir)?;

    // Idempotent rerun: outputs for this exact range already exist.
    let snapshot_path = config.output_dir.join(SNAPSHOT_FILE);
    if let Some(existing) = read_snapshot(&snapshot_path) {
        if existing.range == range {
            warn!(
                "outputs for {} already exist in {}; skipping re-derivation",
                range,
                config.output_dir.display()
            );
            return Ok(0);
        }
    }

    let commits = git.commits_between(old, new)?;
    let files = git.changed_files(old, new)?;
    info!(
        "range {}: {} commits, {} changed files",
        range,
        commits.len(),
        files.len()
    );

    let diff = RevisionDiff {
        schema_version: SCHEMA_VERSION,
        kind: "revision_diff".to_string(),
        generated_at: Utc::now(),
        range: range.clone(),
        commits,
        files,
    };

    let diff_path = config.output_dir.join(DIFF_FILE);
    let mut outputs = Vec::new();
    if config.format.wants_json() {
        write_json_atomic(&diff_path, &diff)?;
        outputs.push(diff_path.to_string_lossy().into_owned());
    }
    if config.format.wants_markdown() {
        let md_path = config.output_dir.join("revision_diff.md");
        write_text_atomic(&md_path, &render_markdown(&diff))?;
        outputs.push(md_path.to_string_lossy().into_owned());
    }

    // Snapshot goes last so its presence implies the other outputs landed.
    let snapshot = Snapshot {
        schema_version: SCHEMA_VERSION,
        kind: "snapshot".to_string(),
        generated_at: Utc::now(),
        range,
        outputs,
    };
    write_json_atomic(&snapshot_path, &snapshot)?;

    Ok(0)
}

fn read_snapshot(path: &std::path::Path) -> Option<Snapshot> {
    let content = fs::read_to_string(path).ok()?;
    serde_json::from_str(&content).ok()
}

fn render_markdown(diff: &RevisionDiff) -> String {
    let mut out = format!("# Revision Diff: {}\n\n", diff.range);
    out.push_str(&format!("Commits: {}\n\n", diff.commits.len()));
    out.push_str("## Changed Files\n\n");
    let rows: Vec<Vec<String>> = diff
        .files
        .iter()
        .map(|f| {
            vec![
                f.path.clone(),
                format!("+{}", f.lines_added),
                format!("-{}", f.lines_deleted),
            ]
        })
        .collect();
    out.push_str(&md_table(&["Path", "Added", "Deleted"], &rows));
    out
}
