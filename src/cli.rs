use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config;
use crate::io::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "changescope")]
#[command(about = "Cross-validated change analysis between two git revisions", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Increase verbosity level (can be repeated: -v, -vv)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    pub verbosity: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Extract base facts for a revision range: commits, file stats, snapshot
    Extract {
        /// Repository path
        #[arg(long, default_value = ".")]
        repo: PathBuf,

        /// Older revision reference
        #[arg(long)]
        old_ref: String,

        /// Newer revision reference
        #[arg(long)]
        new_ref: String,

        /// Directory for generated artifacts
        #[arg(short, long, default_value = "analysis")]
        output_dir: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value = "json")]
        format: OutputFormat,
    },

    /// Collect aggregate or differential code metrics
    Metrics {
        /// Repository path
        #[arg(long, default_value = ".")]
        repo: PathBuf,

        /// Older revision reference (with --new-ref selects differential mode)
        #[arg(long)]
        old_ref: Option<String>,

        /// Newer revision reference
        #[arg(long)]
        new_ref: Option<String>,

        /// Root directory for aggregate mode (defaults to the repo path)
        #[arg(long)]
        path: Option<PathBuf>,

        /// Revision label recorded in aggregate output
        #[arg(long)]
        rev_label: Option<String>,

        /// Directory for generated artifacts
        #[arg(short, long, default_value = "analysis")]
        output_dir: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value = "json")]
        format: OutputFormat,
    },

    /// Detect ADD/DEL/MOD API change candidates from the range diff
    Breaking {
        /// Repository path
        #[arg(long, default_value = ".")]
        repo: PathBuf,

        /// Older revision reference
        #[arg(long)]
        old_ref: String,

        /// Newer revision reference
        #[arg(long)]
        new_ref: String,

        /// Directory for generated artifacts
        #[arg(short, long, default_value = "analysis")]
        output_dir: PathBuf,

        /// Reject diffs with more lines than this instead of truncating
        #[arg(long, default_value_t = config::DEFAULT_MAX_DIFF_LINES)]
        max_diff_lines: usize,

        /// Output format
        #[arg(short, long, value_enum, default_value = "json")]
        format: OutputFormat,
    },

    /// Bucket changed files into module groups
    Modules {
        /// revision_diff.json produced by the extract stage
        #[arg(short, long)]
        input: PathBuf,

        /// Directory for generated artifacts
        #[arg(short, long, default_value = "analysis")]
        output_dir: PathBuf,

        /// Number of leading path segments forming the module key
        #[arg(long, default_value_t = config::DEFAULT_MODULE_DEPTH)]
        depth: usize,

        /// Path prefixes stripped before bucketing (longest match wins)
        #[arg(long = "strip-prefix", value_delimiter = ',')]
        strip_prefixes: Vec<String>,

        /// Drop buckets with fewer files than this
        #[arg(long, default_value_t = config::DEFAULT_MIN_FILES)]
        min_files: usize,

        /// Sample paths kept per bucket
        #[arg(long, default_value_t = config::DEFAULT_MAX_SAMPLES)]
        max_samples: usize,

        /// Output format
        #[arg(short, long, value_enum, default_value = "json")]
        format: OutputFormat,
    },

    /// Resolve a canonical status per risk id across a document corpus
    Risks {
        /// Document corpus root
        #[arg(long)]
        corpus: PathBuf,

        /// Risk id prefix
        #[arg(long, default_value = config::DEFAULT_RISK_PREFIX)]
        prefix: String,

        /// Additional directory names excluded from the scan
        #[arg(long = "exclude-dir", value_delimiter = ',')]
        exclude_dirs: Vec<String>,

        /// Directory for generated artifacts
        #[arg(short, long, default_value = "analysis")]
        output_dir: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value = "json")]
        format: OutputFormat,
    },

    /// Validate typed identifiers across a document corpus
    Refs {
        /// Document corpus root
        #[arg(long)]
        corpus: PathBuf,

        /// Identifier prefixes to check
        #[arg(long = "prefixes", value_delimiter = ',', default_value = config::DEFAULT_REF_PREFIXES)]
        prefixes: Vec<String>,

        /// Additional directory names excluded from the scan
        #[arg(long = "exclude-dir", value_delimiter = ',')]
        exclude_dirs: Vec<String>,

        /// Exit non-zero on any invalid-like or single-occurrence id
        #[arg(long)]
        strict: bool,

        /// Directory for generated artifacts
        #[arg(short, long, default_value = "analysis")]
        output_dir: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value = "json")]
        format: OutputFormat,
    },

    /// Build the summary: core counters plus additive enrichment
    Summary {
        /// Repository path
        #[arg(long, default_value = ".")]
        repo: PathBuf,

        /// Older revision reference
        #[arg(long)]
        old_ref: String,

        /// Newer revision reference
        #[arg(long)]
        new_ref: String,

        /// Enrichment artifacts to merge (repeatable)
        #[arg(long = "enrich")]
        enrich: Vec<PathBuf>,

        /// Directory for generated artifacts
        #[arg(short, long, default_value = "analysis")]
        output_dir: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value = "json")]
        format: OutputFormat,
    },

    /// Cross-check all artifacts against recomputed ground truth
    Align {
        /// Repository path
        #[arg(long, default_value = ".")]
        repo: PathBuf,

        /// Older revision reference
        #[arg(long)]
        old_ref: String,

        /// Newer revision reference
        #[arg(long)]
        new_ref: String,

        /// Summary artifact to check (defaults to <output-dir>/summary.json)
        #[arg(long)]
        summary: Option<PathBuf>,

        /// Reference report for id cross-checking
        #[arg(long)]
        refs_report: Option<PathBuf>,

        /// Narrative documents the ids must be referenced from
        #[arg(long)]
        docs: Option<PathBuf>,

        /// Directory for generated artifacts
        #[arg(short, long, default_value = "analysis")]
        output_dir: PathBuf,

        /// Exit non-zero when the report does not pass
        #[arg(long)]
        fail_on_mismatch: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value = "json")]
        format: OutputFormat,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn extract_parses_range_flags() {
        let cli = Cli::parse_from([
            "changescope", "extract", "--old-ref", "v1.0.0", "--new-ref", "v1.1.0",
            "--output-dir", "/tmp/out",
        ]);
        match cli.command {
            Commands::Extract {
                old_ref,
                new_ref,
                output_dir,
                ..
            } => {
                assert_eq!(old_ref, "v1.0.0");
                assert_eq!(new_ref, "v1.1.0");
                assert_eq!(output_dir, PathBuf::from("/tmp/out"));
            }
            _ => panic!("expected Extract command"),
        }
    }

    #[test]
    fn modules_threshold_flags_have_defaults() {
        let cli = Cli::parse_from(["changescope", "modules", "--input", "d.json"]);
        match cli.command {
            Commands::Modules {
                depth,
                min_files,
                max_samples,
                strip_prefixes,
                ..
            } => {
                assert_eq!(depth, config::DEFAULT_MODULE_DEPTH);
                assert_eq!(min_files, config::DEFAULT_MIN_FILES);
                assert_eq!(max_samples, config::DEFAULT_MAX_SAMPLES);
                assert!(strip_prefixes.is_empty());
            }
            _ => panic!("expected Modules command"),
        }
    }

    #[test]
    fn refs_parses_comma_separated_prefixes() {
        let cli = Cli::parse_from([
            "changescope", "refs", "--corpus", "docs", "--prefixes", "RSK,REQ", "--strict",
        ]);
        match cli.command {
            Commands::Refs { prefixes, strict, .. } => {
                assert_eq!(prefixes, vec!["RSK", "REQ"]);
                assert!(strict);
            }
            _ => panic!("expected Refs command"),
        }
    }

    #[test]
    fn refs_prefixes_default_from_config() {
        let cli = Cli::parse_from(["changescope", "refs", "--corpus", "docs"]);
        match cli.command {
            Commands::Refs { prefixes, .. } => {
                assert_eq!(prefixes, config::DEFAULT_REF_PREFIXES.split(',').collect::<Vec<_>>());
            }
            _ => panic!("expected Refs command"),
        }
    }

    #[test]
    fn align_accepts_fail_toggle() {
        let cli = Cli::parse_from([
            "changescope", "align", "--old-ref", "a", "--new-ref", "b", "--fail-on-mismatch",
        ]);
        match cli.command {
            Commands::Align { fail_on_mismatch, .. } => assert!(fail_on_mismatch),
            _ => panic!("expected Align command"),
        }
    }

    #[test]
    fn verbosity_is_counted() {
        let cli = Cli::parse_from([
            "changescope", "-vv", "risks", "--corpus", "docs",
        ]);
        assert_eq!(cli.verbosity, 2);
    }
}
