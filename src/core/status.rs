//! Risk status resolution policy.
//!
//! A risk id mentioned several times across a corpus must resolve to exactly
//! one canonical status. Resolution uses a fixed total order in which the
//! most-resolved status wins; it is never re-derived from the latest mention.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskStatus {
    Closed,
    Mitigated,
    Accepted,
    Deferred,
    Open,
    Retired,
    Unknown,
}

/// Resolution order, strongest first. Inherited policy: the position of
/// `RETIRED` below `OPEN` (but above `UNKNOWN`) has no recorded rationale;
/// flagged to product owners rather than reordered.
pub const STATUS_PRIORITY: [RiskStatus; 7] = [
    RiskStatus::Closed,
    RiskStatus::Mitigated,
    RiskStatus::Accepted,
    RiskStatus::Deferred,
    RiskStatus::Open,
    RiskStatus::Retired,
    RiskStatus::Unknown,
];

impl RiskStatus {
    /// Parse a bracketed tag body, e.g. the `OPEN` in `[OPEN]`.
    pub fn parse_tag(tag: &str) -> Option<Self> {
        match tag {
            "CLOSED" => Some(Self::Closed),
            "MITIGATED" => Some(Self::Mitigated),
            "ACCEPTED" => Some(Self::Accepted),
            "DEFERRED" => Some(Self::Deferred),
            "OPEN" => Some(Self::Open),
            "RETIRED" => Some(Self::Retired),
            "UNKNOWN" => Some(Self::Unknown),
            _ => None,
        }
    }

    /// Rank in the resolution order; lower wins.
    pub fn priority(self) -> usize {
        STATUS_PRIORITY
            .iter()
            .position(|s| *s == self)
            .unwrap_or(STATUS_PRIORITY.len())
    }

    /// Merge two observed statuses for the same id.
    pub fn resolve(self, other: Self) -> Self {
        if other.priority() < self.priority() {
            other
        } else {
            self
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Closed => "CLOSED",
            Self::Mitigated => "MITIGATED",
            Self::Accepted => "ACCEPTED",
            Self::Deferred => "DEFERRED",
            Self::Open => "OPEN",
            Self::Retired => "RETIRED",
            Self::Unknown => "UNKNOWN",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_order_wins_over_recency() {
        // OPEN, then MITIGATED, then OPEN again resolves to MITIGATED.
        let resolved = RiskStatus::Unknown
            .resolve(RiskStatus::Open)
            .resolve(RiskStatus::Mitigated)
            .resolve(RiskStatus::Open);
        assert_eq!(resolved, RiskStatus::Mitigated);
    }

    #[test]
    fn closed_beats_everything() {
        for status in STATUS_PRIORITY {
            assert_eq!(RiskStatus::Closed.resolve(status), RiskStatus::Closed);
        }
    }

    #[test]
    fn retired_outranks_only_unknown() {
        assert_eq!(RiskStatus::Retired.resolve(RiskStatus::Open), RiskStatus::Open);
        assert_eq!(
            RiskStatus::Retired.resolve(RiskStatus::Unknown),
            RiskStatus::Retired
        );
    }

    #[test]
    fn tags_round_trip() {
        for status in STATUS_PRIORITY {
            assert_eq!(RiskStatus::parse_tag(status.as_str()), Some(status));
        }
        assert_eq!(RiskStatus::parse_tag("WONTFIX"), None);
    }
}
