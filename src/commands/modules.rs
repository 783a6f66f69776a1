//! `modules` stage: bucket changed files into module groups.

use anyhow::Result;
use chrono::Utc;
use log::info;
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::core::types::{ModuleBucket, ModuleImpactReport, RevisionDiff, SCHEMA_VERSION};
use crate::errors::PipelineError;
use crate::io::output::{ensure_output_dir, md_table, write_json_atomic, write_text_atomic, OutputFormat};

pub const REPORT_FILE: &str = "module_impact.json";

pub struct ModulesConfig {
    /// revision_diff.json from the extract stage.
    pub input: PathBuf,
    pub output_dir: PathBuf,
    pub depth: usize,
    pub strip_prefixes: Vec<String>,
    pub min_files: usize,
    pub max_samples: usize,
    pub format: OutputFormat,
}

/// Derive the module key for one path: strip the longest matching prefix,
/// then join the first `depth` directory segments. Paths without a directory
/// component land in `_root`.
pub fn module_key(path: &str, depth: usize, strip_prefixes: &[String]) -> String {
    let mut rest = path;
    let mut best: Option<&str> = None;
    for prefix in strip_prefixes {
        if rest.starts_with(prefix.as_str()) && best.is_none_or(|b| prefix.len() > b.len()) {
            best = Some(prefix);
        }
    }
    if let Some(prefix) = best {
        rest = rest[prefix.len()..].trim_start_matches('/');
    }

    let segments: Vec<&str> = rest.split('/').filter(|s| !s.is_empty()).collect();
    // Last segment is the file name, not a module segment.
    if segments.len() <= 1 {
        return "_root".to_string();
    }
    let dirs = &segments[..segments.len() - 1];
    let take = depth.max(1).min(dirs.len());
    dirs[..take].join("/")
}

/// Aggregate paths into buckets: count plus a bounded sample list, sparse
/// keys dropped after aggregation, sorted by descending count then key.
pub fn bucket_paths(
    paths: &[String],
    depth: usize,
    strip_prefixes: &[String],
    min_files: usize,
    max_samples: usize,
) -> Vec<ModuleBucket> {
    let mut groups: BTreeMap<String, (usize, Vec<String>)> = BTreeMap::new();
    for path in paths {
        let key = module_key(path, depth, strip_prefixes);
        let entry = groups.entry(key).or_default();
        entry.0 += 1;
        if entry.1.len() < max_samples {
            entry.1.push(path.clone());
        }
    }

    let mut buckets: Vec<ModuleBucket> = groups
        .into_iter()
        .filter(|(_, (count, _))| *count >= min_files)
        .map(|(module_key, (file_count, samples))| ModuleBucket {
            module_key,
            file_count,
            samples,
        })
        .collect();

    // Deterministic ordering for reproducible diffs across reruns.
    buckets.sort_by(|a, b| {
        b.file_count
            .cmp(&a.file_count)
            .then_with(|| a.module_key.cmp(&b.module_key))
    });
    buckets
}

pub fn run(config: &ModulesConfig) -> Result<i32> {
    let content = std::fs::read_to_string(&config.input).map_err(|e| {
        PipelineError::validation(format!(
            "cannot read changed-file list {}: {e}",
            config.input.display()
        ))
    })?;
    let diff: RevisionDiff = serde_json::from_str(&content).map_err(|e| {
        PipelineError::validation(format!("{} is not a revision diff: {e}", config.input.display()))
    })?;

    let paths: Vec<String> = diff.files.iter().map(|f| f.path.clone()).collect();
    let buckets = bucket_paths(
        &paths,
        config.depth,
        &config.strip_prefixes,
        config.min_files,
        config.max_samples,
    );
    info!("{} modules impacted across {} files", buckets.len(), paths.len());

    let report = ModuleImpactReport {
        schema_version: SCHEMA_VERSION,
        kind: "module_impact".to_string(),
        generated_at: Utc::now(),
        depth: config.depth,
        min_files: config.min_files,
        buckets,
    };

    ensure_output_dir(&config.output_dir)?;
    if config.format.wants_json() {
        write_json_atomic(&config.output_dir.join(REPORT_FILE), &report)?;
    }
    if config.format.wants_markdown() {
        write_text_atomic(
            &config.output_dir.join("module_impact.md"),
            &render_markdown(&report),
        )?;
    }
    Ok(0)
}

fn render_markdown(report: &ModuleImpactReport) -> String {
    let mut out = format!("# Module Impact (depth {})\n\n", report.depth);
    let rows: Vec<Vec<String>> = report
        .buckets
        .iter()
        .map(|b| {
            vec![
                b.module_key.clone(),
                b.file_count.to_string(),
                b.samples.join(", "),
            ]
        })
        .collect();
    out.push_str(&md_table(&["Module", "Files", "Samples"], &rows));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn owned(paths: &[&str]) -> Vec<String> {
        paths.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn depth_one_takes_first_directory() {
        assert_eq!(module_key("tools/script.ps1", 1, &[]), "tools");
    }

    #[test]
    fn path_without_separator_is_root() {
        assert_eq!(module_key("README.md", 1, &[]), "_root");
    }

    #[test]
    fn depth_two_joins_segments_and_clamps() {
        assert_eq!(module_key("src/io/output.rs", 2, &[]), "src/io");
        // Only one directory segment available.
        assert_eq!(module_key("src/main.rs", 2, &[]), "src");
    }

    #[test]
    fn longest_matching_prefix_is_stripped() {
        let prefixes = owned(&["packages", "packages/internal"]);
        assert_eq!(
            module_key("packages/internal/core/lib.rs", 1, &prefixes),
            "core"
        );
    }

    #[test]
    fn stripped_path_with_bare_file_is_root() {
        let prefixes = owned(&["docs"]);
        assert_eq!(module_key("docs/README.md", 1, &prefixes), "_root");
    }

    #[test]
    fn buckets_sort_by_count_then_key() {
        let paths = owned(&[
            "b/one.rs",
            "a/one.rs",
            "a/two.rs",
            "c/one.rs",
            "c/two.rs",
            "README.md",
        ]);
        let buckets = bucket_paths(&paths, 1, &[], 1, 5);
        let keys: Vec<&str> = buckets.iter().map(|b| b.module_key.as_str()).collect();
        assert_eq!(keys, vec!["a", "c", "_root", "b"]);
    }

    #[test]
    fn min_files_filter_applies_after_aggregation() {
        let paths = owned(&["a/one.rs", "a/two.rs", "b/one.rs"]);
        let buckets = bucket_paths(&paths, 1, &[], 2, 5);
        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets[0].module_key, "a");
        assert_eq!(buckets[0].file_count, 2);
    }

    #[test]
    fn samples_are_bounded() {
        let paths = owned(&["m/1.rs", "m/2.rs", "m/3.rs", "m/4.rs"]);
        let buckets = bucket_paths(&paths, 1, &[], 1, 2);
        assert_eq!(buckets[0].file_count, 4);
        assert_eq!(buckets[0].samples.len(), 2);
    }
}
