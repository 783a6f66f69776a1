pub mod status;
pub mod types;

pub use status::{RiskStatus, STATUS_PRIORITY};
pub use types::*;
