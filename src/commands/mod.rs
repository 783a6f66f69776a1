//! Pipeline stage implementations, one module per CLI subcommand.
//!
//! Stages never call each other in-process; each reads its inputs from disk,
//! writes its artifacts atomically, and returns an exit code. That keeps
//! partial reruns safe: a later stage always re-reads fresh files.

pub mod align;
pub mod breaking;
pub mod extract;
pub mod metrics;
pub mod modules;
pub mod refs;
pub mod risks;
pub mod summary;

pub use align::AlignConfig;
pub use breaking::BreakingConfig;
pub use extract::ExtractConfig;
pub use metrics::MetricsConfig;
pub use modules::ModulesConfig;
pub use refs::RefsConfig;
pub use risks::RisksConfig;
pub use summary::SummaryConfig;
