use std::fmt;
use std::str::FromStr;

use crate::models::{LocationMetrics, MemberRecord, RiskLevel, SourcePerformance};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RiskSelector {
    #[default]
    All,
    Level(RiskLevel),
}

impl RiskSelector {
    pub fn admits(&self, level: Option<RiskLevel>) -> bool {
        match self {
            RiskSelector::All => true,
            RiskSelector::Level(wanted) => level == Some(*wanted),
        }
    }
}

impl fmt::Display for RiskSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskSelector::All => f.write_str("all"),
            RiskSelector::Level(level) => write!(f, "{level}"),
        }
    }
}

impl FromStr for RiskSelector {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            return Ok(RiskSelector::All);
        }
        s.parse().map(RiskSelector::Level)
    }
}

/// Records that can be narrowed by risk level and free-text search.
pub trait Filterable {
    /// Fields the search term is matched against.
    fn search_fields(&self) -> Vec<&str>;

    fn risk(&self) -> Option<RiskLevel> {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RecordFilter {
    risk: RiskSelector,
    needle: String,
}

impl RecordFilter {
    pub fn new(risk: RiskSelector, search: &str) -> Self {
        Self {
            risk,
            needle: search.to_lowercase(),
        }
    }

    pub fn matches<T: Filterable>(&self, record: &T) -> bool {
        self.risk.admits(record.risk()) && self.matches_search(record)
    }

    fn matches_search<T: Filterable>(&self, record: &T) -> bool {
        if self.needle.is_empty() {
            return true;
        }
        record
            .search_fields()
            .iter()
            .any(|field| field.to_lowercase().contains(&self.needle))
    }
}

/// Builds the combined risk-and-search predicate for one selection.
pub fn predicate<T: Filterable>(risk: RiskSelector, search: &str) -> impl Fn(&T) -> bool {
    let filter = RecordFilter::new(risk, search);
    move |record: &T| filter.matches(record)
}

impl Filterable for MemberRecord {
    fn search_fields(&self) -> Vec<&str> {
        vec![self.member_id.as_str(), self.location.as_str()]
    }

    fn risk(&self) -> Option<RiskLevel> {
        MemberRecord::risk(self)
    }
}

impl Filterable for LocationMetrics {
    fn search_fields(&self) -> Vec<&str> {
        vec![self.location.as_str()]
    }
}

impl Filterable for SourcePerformance {
    fn search_fields(&self) -> Vec<&str> {
        vec![self.lead_source.as_str()]
    }
}
