//! Non-fatal data-quality checks. Each finding is an advisory annotation
//! that travels next to otherwise valid data and never blocks rendering.

use std::fmt;

use serde::Serialize;

use crate::models::{
    DaysSinceCheckin, FunnelStage, LocationMetrics, LocationStat, MemberRecord, RiskLevel,
    RiskSummaryEntry,
};
use crate::risk;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum DataQualityWarning {
    RiskLevelMismatch {
        member_id: String,
        provided: RiskLevel,
        expected: Option<RiskLevel>,
        days_since_checkin: DaysSinceCheckin,
    },
    RiskSummaryTotal {
        summary_total: u64,
        member_count: usize,
    },
    DuplicateRiskLevel(RiskLevel),
    FunnelIncrease {
        from: &'static str,
        to: &'static str,
        from_count: u64,
        to_count: u64,
    },
    ActiveExceedsTotal {
        location: String,
        active: u64,
        total: u64,
    },
}

impl fmt::Display for DataQualityWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataQualityWarning::RiskLevelMismatch {
                member_id,
                provided,
                expected,
                days_since_checkin,
            } => write!(
                f,
                "member {member_id} is marked {provided} but {days_since_checkin} days inactive implies {}",
                expected.map(|level| level.as_str()).unwrap_or("no risk")
            ),
            DataQualityWarning::RiskSummaryTotal {
                summary_total,
                member_count,
            } => write!(
                f,
                "risk summary counts {summary_total} members but {member_count} at-risk records were delivered"
            ),
            DataQualityWarning::DuplicateRiskLevel(level) => {
                write!(f, "risk summary lists {level} more than once")
            }
            DataQualityWarning::FunnelIncrease {
                from,
                to,
                from_count,
                to_count,
            } => write!(
                f,
                "funnel grows from {from} ({from_count}) to {to} ({to_count})"
            ),
            DataQualityWarning::ActiveExceedsTotal {
                location,
                active,
                total,
            } => write!(
                f,
                "{location} reports {active} active members out of {total} total"
            ),
        }
    }
}

pub fn check_member_risk_levels(members: &[MemberRecord]) -> Vec<DataQualityWarning> {
    risk::mismatched_levels(members)
        .into_iter()
        .filter_map(|(member, expected)| {
            Some(DataQualityWarning::RiskLevelMismatch {
                member_id: member.member_id.clone(),
                provided: member.risk_level?,
                expected,
                days_since_checkin: member.days_since_checkin,
            })
        })
        .collect()
}

pub fn check_risk_summary(
    summary: &[RiskSummaryEntry],
    member_count: usize,
) -> Vec<DataQualityWarning> {
    let mut warnings = Vec::new();
    let mut seen: Vec<RiskLevel> = Vec::new();

    for entry in summary {
        if seen.contains(&entry.risk_level) {
            warnings.push(DataQualityWarning::DuplicateRiskLevel(entry.risk_level));
        } else {
            seen.push(entry.risk_level);
        }
    }

    let summary_total: u64 = summary.iter().map(|entry| entry.count).sum();
    if summary_total != member_count as u64 {
        warnings.push(DataQualityWarning::RiskSummaryTotal {
            summary_total,
            member_count,
        });
    }

    warnings
}

pub fn check_funnel(stages: &[FunnelStage]) -> Vec<DataQualityWarning> {
    stages
        .windows(2)
        .filter(|pair| pair[1].count > pair[0].count)
        .map(|pair| DataQualityWarning::FunnelIncrease {
            from: pair[0].name,
            to: pair[1].name,
            from_count: pair[0].count,
            to_count: pair[1].count,
        })
        .collect()
}

pub fn check_location_metrics(metrics: &[LocationMetrics]) -> Vec<DataQualityWarning> {
    metrics
        .iter()
        .filter(|m| m.active_members > m.total_members)
        .map(|m| DataQualityWarning::ActiveExceedsTotal {
            location: m.location.clone(),
            active: m.active_members,
            total: m.total_members,
        })
        .collect()
}

pub fn check_location_stats(stats: &[LocationStat]) -> Vec<DataQualityWarning> {
    stats
        .iter()
        .filter(|s| s.active_members > s.total_members)
        .map(|s| DataQualityWarning::ActiveExceedsTotal {
            location: s.location.clone(),
            active: s.active_members,
            total: s.total_members,
        })
        .collect()
}
