//! Card figures for each view, derived from a fetched payload. Series handed
//! on from here are already in display order.

use serde::Serialize;

use crate::metrics::{self, RiskBucket};
use crate::models::{
    ChurnSegment, DailyCheckins, EngagementBucket, FunnelStage, HourlyCheckins, LocationMetrics,
    MonthlyChurn, MonthlyRevenue, MonthlySignups, PtImpact, RevenueByType, RiskLevel,
};
use crate::payloads::{
    AtRiskPayload, ChurnPayload, EngagementPayload, FunnelPayload, LocationComparisonPayload,
    OverviewPayload, RevenuePayload,
};
use crate::sort::{self, SortDirection};

pub const INDUSTRY_RETENTION_AVERAGE: f64 = 70.0;
pub const CHURN_TARGET: f64 = 5.0;
/// Segments churning above this rate are called out.
pub const CHURN_ALERT_RATE: f64 = 30.0;
const HIGHEST_CHURN_SEGMENTS: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AtRiskSummary {
    pub high: u64,
    pub medium: u64,
    pub low: u64,
    pub total: u64,
    pub potential_loss: f64,
    pub outreach_savings: f64,
    pub average_days_inactive: f64,
    pub buckets: Vec<RiskBucket>,
}

impl AtRiskSummary {
    /// Loss is taken over the members in delivered order, which the provider
    /// ranks by days since check-in.
    pub fn derive(payload: &AtRiskPayload, top_n: usize) -> Self {
        let summary = &payload.risk_summary;
        let members = &payload.at_risk_members;
        let potential_loss = metrics::potential_revenue_loss(members, top_n);

        Self {
            high: metrics::risk_count(summary, RiskLevel::High),
            medium: metrics::risk_count(summary, RiskLevel::Medium),
            low: metrics::risk_count(summary, RiskLevel::Low),
            total: metrics::total_at_risk(summary),
            potential_loss,
            outreach_savings: metrics::outreach_savings(potential_loss),
            average_days_inactive: metrics::average_days_inactive(members),
            buckets: metrics::revenue_at_risk_by_level(members),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationActivity {
    pub location: String,
    pub active_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverviewSummary {
    pub total_members: u64,
    pub active_members: u64,
    pub retention_rate: f64,
    pub churn_rate: f64,
    pub mrr: f64,
    pub retention_above_average: bool,
    pub churn_below_target: bool,
    pub signup_trend: Vec<MonthlySignups>,
    pub locations: Vec<LocationActivity>,
}

impl OverviewSummary {
    pub fn derive(payload: &OverviewPayload) -> Self {
        Self {
            total_members: payload.total_members,
            active_members: payload.active_members,
            retention_rate: payload.retention_rate,
            churn_rate: payload.churn_rate,
            mrr: payload.mrr,
            retention_above_average: payload.retention_rate > INDUSTRY_RETENTION_AVERAGE,
            churn_below_target: payload.churn_rate < CHURN_TARGET,
            signup_trend: metrics::chronological(&payload.signup_trend),
            locations: payload
                .location_stats
                .iter()
                .map(|stat| LocationActivity {
                    location: stat.location.clone(),
                    active_rate: metrics::percentage_of(
                        stat.active_members as f64,
                        stat.total_members as f64,
                    ),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChurnSummary {
    pub highest_churn: Vec<ChurnSegment>,
    pub flagged_locations: Vec<ChurnSegment>,
    pub pt_retention_lift: f64,
    pub monthly_trend: Vec<MonthlyChurn>,
}

impl ChurnSummary {
    pub fn derive(payload: &ChurnPayload) -> Self {
        let mut highest_churn = payload.churn_by_membership.clone();
        sort::sort_records(&mut highest_churn, "churn_rate", SortDirection::Descending);
        highest_churn.truncate(HIGHEST_CHURN_SEGMENTS);

        Self {
            highest_churn,
            flagged_locations: payload
                .churn_by_location
                .iter()
                .filter(|segment| segment.churn_rate > CHURN_ALERT_RATE)
                .cloned()
                .collect(),
            pt_retention_lift: pt_retention_lift(&payload.pt_impact),
            monthly_trend: metrics::chronological(&payload.monthly_trend),
        }
    }
}

/// Percentage points of churn avoided by members with personal training.
/// Zero unless both groups are present.
pub fn pt_retention_lift(impact: &[PtImpact]) -> f64 {
    let with_pt = impact.iter().find(|group| group.has_pt);
    let without_pt = impact.iter().find(|group| !group.has_pt);
    match (with_pt, without_pt) {
        (Some(with_pt), Some(without_pt)) => without_pt.churn_rate - with_pt.churn_rate,
        _ => 0.0,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngagementSummary {
    pub peak_hour: HourlyCheckins,
    pub busiest_day: DailyCheckins,
    pub total_engaged: u64,
    pub high_engagement: u64,
    pub inactive_members: u64,
    pub high_engagement_share: f64,
    pub hourly: Vec<HourlyCheckins>,
    pub daily: Vec<DailyCheckins>,
}

impl EngagementSummary {
    pub fn derive(payload: &EngagementPayload) -> Self {
        let quiet_hour = HourlyCheckins {
            hour: 0,
            checkin_count: 0,
        };
        let quiet_day = DailyCheckins {
            day_of_week: String::new(),
            checkin_count: 0,
        };
        // Ties go to the first period as delivered, before display ordering.
        let peak_hour =
            metrics::peak_or(&payload.hourly_pattern, "checkin_count", &quiet_hour).clone();
        let busiest_day =
            metrics::peak_or(&payload.daily_pattern, "checkin_count", &quiet_day).clone();

        let distribution = &payload.engagement_distribution;
        let total_engaged: u64 = distribution.iter().map(|bucket| bucket.member_count).sum();
        let high_engagement = level_count(distribution, "High");

        Self {
            peak_hour,
            busiest_day,
            total_engaged,
            high_engagement,
            inactive_members: level_count(distribution, "Inactive"),
            high_engagement_share: metrics::percentage_of(
                high_engagement as f64,
                total_engaged as f64,
            ),
            hourly: metrics::hours_ascending(&payload.hourly_pattern),
            daily: metrics::weekdays_in_order(&payload.daily_pattern),
        }
    }
}

/// Member count of the first bucket whose label mentions `label`.
fn level_count(distribution: &[EngagementBucket], label: &str) -> u64 {
    distribution
        .iter()
        .find(|bucket| bucket.engagement_level.contains(label))
        .map(|bucket| bucket.member_count)
        .unwrap_or(0)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RevenueSummary {
    pub total_revenue: f64,
    pub membership_share: f64,
    pub personal_training_share: f64,
    pub current_mrr: f64,
    pub active_paying_members: u64,
    pub monthly_trend: Vec<MonthlyRevenue>,
}

impl RevenueSummary {
    pub fn derive(payload: &RevenuePayload) -> Self {
        let by_type = &payload.revenue_by_type;
        Self {
            total_revenue: by_type.iter().map(|entry| entry.total_revenue).sum(),
            membership_share: share_of_type(by_type, "Membership"),
            personal_training_share: share_of_type(by_type, "Personal Training"),
            current_mrr: payload.current_mrr,
            active_paying_members: payload.active_paying_members,
            monthly_trend: metrics::chronological(&payload.monthly_revenue_trend),
        }
    }
}

pub fn share_of_type(by_type: &[RevenueByType], revenue_type: &str) -> f64 {
    let total: f64 = by_type.iter().map(|entry| entry.total_revenue).sum();
    let part: f64 = by_type
        .iter()
        .filter(|entry| entry.revenue_type == revenue_type)
        .map(|entry| entry.total_revenue)
        .sum();
    metrics::percentage_of(part, total)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepConversion {
    pub from: &'static str,
    pub to: &'static str,
    pub rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunnelSummary {
    pub stages: Vec<FunnelStage>,
    pub steps: Vec<StepConversion>,
    pub overall_conversion: f64,
}

impl FunnelSummary {
    pub fn derive(payload: &FunnelPayload) -> Self {
        let stages = payload.stages();
        let steps = step_conversions(&stages);
        let overall_conversion = match (stages.first(), stages.last()) {
            (Some(first), Some(last)) => {
                metrics::percentage_of(last.count as f64, first.count as f64)
            }
            _ => 0.0,
        };
        Self {
            stages,
            steps,
            overall_conversion,
        }
    }
}

/// Each stage as a percentage of the stage before it.
pub fn step_conversions(stages: &[FunnelStage]) -> Vec<StepConversion> {
    stages
        .windows(2)
        .map(|pair| StepConversion {
            from: pair[0].name,
            to: pair[1].name,
            rate: metrics::percentage_of(pair[1].count as f64, pair[0].count as f64),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RadarPoint {
    pub location: String,
    pub members: u64,
    pub retention_rate: f64,
    pub pt_attachment_rate: f64,
    /// MRR in hundreds so it shares an axis with the percentages.
    pub mrr_hundreds: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationSummary {
    pub leader: Option<LocationMetrics>,
    pub radar: Vec<RadarPoint>,
    pub activity: Vec<LocationActivity>,
}

impl LocationSummary {
    pub fn derive(payload: &LocationComparisonPayload) -> Self {
        let metrics_rows = &payload.key_metrics;
        Self {
            leader: metrics::peak_period(metrics_rows, "retention_rate")
                .ok()
                .cloned(),
            radar: metrics_rows
                .iter()
                .map(|row| RadarPoint {
                    location: row.location.clone(),
                    members: row.active_members,
                    retention_rate: row.retention_rate,
                    pt_attachment_rate: row.pt_attachment_rate,
                    mrr_hundreds: row.mrr / 100.0,
                })
                .collect(),
            activity: metrics_rows
                .iter()
                .map(|row| LocationActivity {
                    location: row.location.clone(),
                    active_rate: metrics::percentage_of(
                        row.active_members as f64,
                        row.total_members as f64,
                    ),
                })
                .collect(),
        }
    }
}
