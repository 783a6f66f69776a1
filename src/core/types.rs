//! Artifact types shared across pipeline stages.
//!
//! Every stage's primary output is one of these structs serialized as pretty
//! JSON with a `schema_version` and a `generated_at` timestamp. Artifacts are
//! written once per run and overwritten wholesale on rerun; stages consuming
//! another stage's JSON treat absent optional fields as "not available".

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::status::RiskStatus;

/// Bumped when any artifact layout changes shape incompatibly.
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionRange {
    pub old_ref: String,
    pub new_ref: String,
}

impl fmt::Display for RevisionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.old_ref, self.new_ref)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitInfo {
    pub hash: String,
    pub summary: String,
    pub author: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangedFile {
    pub path: String,
    pub lines_added: usize,
    pub lines_deleted: usize,
}

/// Base facts for a revision range, produced by the `extract` stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevisionDiff {
    pub schema_version: u32,
    pub kind: String,
    pub generated_at: DateTime<Utc>,
    pub range: RevisionRange,
    /// Ordered old -> new.
    pub commits: Vec<CommitInfo>,
    /// Deduplicated, sorted by path.
    pub files: Vec<ChangedFile>,
}

/// Provenance record written alongside `RevisionDiff`; later stages use it to
/// detect that outputs for this exact range already exist.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub schema_version: u32,
    pub kind: String,
    pub generated_at: DateTime<Utc>,
    pub range: RevisionRange,
    pub outputs: Vec<String>,
}

/// A heuristically detected function or method definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionSignature {
    pub name: String,
    pub file: String,
    pub line: usize,
    pub length: usize,
    pub raw_text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CounterConfidence {
    Full,
    Partial,
    None,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LanguageMetrics {
    pub language: String,
    pub files: usize,
    pub code_lines: usize,
    pub comment_lines: usize,
    pub blank_lines: usize,
    pub functions: usize,
}

/// Aggregate metrics for one working tree, produced by `metrics` without a
/// revision pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateMetrics {
    pub schema_version: u32,
    pub kind: String,
    pub generated_at: DateTime<Utc>,
    pub root: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rev_label: Option<String>,
    pub counter_confidence: CounterConfidence,
    /// Always "heuristic": function counts come from regex scanners, never
    /// from a real parser.
    pub method_count_confidence: String,
    pub languages: Vec<LanguageMetrics>,
    pub totals: LanguageMetrics,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileChangeStatus {
    Added,
    Removed,
    Modified,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileDelta {
    pub path: String,
    pub status: FileChangeStatus,
    pub lines_old: usize,
    pub lines_new: usize,
    pub lines_diff: i64,
    pub funcs_old: usize,
    pub funcs_new: usize,
    pub funcs_diff: i64,
}

/// Per-file line and function deltas between two revisions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DifferentialMetrics {
    pub schema_version: u32,
    pub kind: String,
    pub generated_at: DateTime<Utc>,
    pub range: RevisionRange,
    pub files_added: usize,
    pub files_removed: usize,
    pub files_modified: usize,
    pub lines_diff: i64,
    pub funcs_diff: i64,
    pub method_count_confidence: String,
    pub files: Vec<FileDelta>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeType {
    Add,
    Del,
    Mod,
}

/// Name-keyed API change candidate. Two overloads of one name collapse into a
/// single MOD candidate on purpose: false positives are preferred to missed
/// breaking changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiChangeCandidate {
    pub name: String,
    pub change_type: ChangeType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_sig: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_sig: Option<String>,
    pub files: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakingApiReport {
    pub schema_version: u32,
    pub kind: String,
    pub generated_at: DateTime<Utc>,
    pub range: RevisionRange,
    pub candidates: Vec<ApiChangeCandidate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleBucket {
    pub module_key: String,
    pub file_count: usize,
    pub samples: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleImpactReport {
    pub schema_version: u32,
    pub kind: String,
    pub generated_at: DateTime<Utc>,
    pub depth: usize,
    pub min_files: usize,
    pub buckets: Vec<ModuleBucket>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskRecord {
    pub id: String,
    pub status: RiskStatus,
    pub occurrences: usize,
    pub files: Vec<String>,
    pub sample: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskStatusReport {
    pub schema_version: u32,
    pub kind: String,
    pub generated_at: DateTime<Utc>,
    pub corpus: String,
    pub records: Vec<RiskRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentifierRecord {
    pub id: String,
    pub prefix: String,
    pub occurrences: usize,
    pub files: Vec<String>,
}

/// A loose-pattern match that is not a canonical id, e.g. `rsk-001`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvalidLikeId {
    pub text: String,
    pub file: String,
    pub line: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrefixRollup {
    pub prefix: String,
    pub distinct_ids: usize,
    pub total_occurrences: usize,
    pub single_occurrence: usize,
    pub multi_occurrence: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceReport {
    pub schema_version: u32,
    pub kind: String,
    pub generated_at: DateTime<Utc>,
    pub corpus: String,
    pub ids: Vec<IdentifierRecord>,
    pub ids_single_occurrence: Vec<String>,
    pub ids_multi_occurrence: Vec<String>,
    pub invalid_like: Vec<InvalidLikeId>,
    pub rollups: Vec<PrefixRollup>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichedValue {
    pub value: serde_json::Value,
    pub source: String,
}

/// Core counters plus additive, provenance-tagged enrichment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryMetrics {
    pub schema_version: u32,
    pub kind: String,
    pub generated_at: DateTime<Utc>,
    pub range: RevisionRange,
    pub commits_total: usize,
    pub files_changed: usize,
    pub lines_added: usize,
    pub lines_deleted: usize,
    pub modules_impacted: usize,
    #[serde(default)]
    pub enrichment: BTreeMap<String, EnrichedValue>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mismatch {
    pub code: String,
    pub expected: serde_json::Value,
    pub actual: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlignmentReport {
    pub schema_version: u32,
    pub kind: String,
    pub generated_at: DateTime<Utc>,
    pub range: RevisionRange,
    pub mismatches: Vec<Mismatch>,
    pub missing: Vec<String>,
    pub notes: Vec<String>,
    pub pass: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn change_type_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&ChangeType::Add).unwrap(), "\"ADD\"");
        assert_eq!(serde_json::to_string(&ChangeType::Del).unwrap(), "\"DEL\"");
        assert_eq!(serde_json::to_string(&ChangeType::Mod).unwrap(), "\"MOD\"");
    }

    #[test]
    fn summary_tolerates_absent_enrichment() {
        // Interop contract: absent optional fields mean "not available".
        let json = r#"{
            "schema_version": 1,
            "kind": "summary",
            "generated_at": "2026-01-01T00:00:00Z",
            "range": {"old_ref": "v1", "new_ref": "v2"},
            "commits_total": 3,
            "files_changed": 2,
            "lines_added": 10,
            "lines_deleted": 4,
            "modules_impacted": 1
        }"#;
        let summary: SummaryMetrics = serde_json::from_str(json).unwrap();
        assert!(summary.enrichment.is_empty());
    }

    #[test]
    fn range_displays_as_dotted_pair() {
        let range = RevisionRange {
            old_ref: "v1.0.0".to_string(),
            new_ref: "v1.1.0".to_string(),
        };
        assert_eq!(range.to_string(), "v1.0.0..v1.1.0");
    }
}
