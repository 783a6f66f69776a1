// Export modules for library usage
pub mod cli;
pub mod commands;
pub mod config;
pub mod core;
pub mod errors;
pub mod git;
pub mod io;
pub mod scan;

// Re-export commonly used types
pub use crate::core::{
    AlignmentReport, ApiChangeCandidate, BreakingApiReport, ChangeType, ChangedFile, CommitInfo,
    ModuleBucket, ModuleImpactReport, ReferenceReport, RevisionDiff, RevisionRange, RiskRecord,
    RiskStatus, RiskStatusReport, SummaryMetrics, SCHEMA_VERSION, STATUS_PRIORITY,
};

pub use crate::commands::modules::{bucket_paths, module_key};
pub use crate::errors::PipelineError;
pub use crate::git::GitRepo;
pub use crate::io::output::OutputFormat;
pub use crate::scan::{BraceScanner, CorpusScanner, IndentationScanner, SignatureScanner};
