//! Heuristic signature scanning.
//!
//! Function and class detection is regex-driven and explicitly
//! over-approximating; nothing in this module parses an AST. Each language
//! family gets one scanner variant so the heuristics stay unit-testable in
//! isolation from diff walking.

pub mod brace;
pub mod corpus;
pub mod indentation;

use crate::config::ScannerFamily;
use crate::core::FunctionSignature;

pub use brace::BraceScanner;
pub use corpus::CorpusScanner;
pub use indentation::IndentationScanner;

pub trait SignatureScanner {
    /// Find function definitions in `content`. Malformed lines are skipped,
    /// never an error.
    fn scan(&self, content: &str, file: &str) -> Vec<FunctionSignature>;

    fn count(&self, content: &str) -> usize {
        self.scan(content, "").len()
    }
}

pub fn scanner_for(family: ScannerFamily) -> &'static dyn SignatureScanner {
    match family {
        ScannerFamily::Indentation => &IndentationScanner,
        ScannerFamily::Brace => &BraceScanner,
    }
}
