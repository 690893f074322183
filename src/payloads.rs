//! Response shapes for each analytics view. Missing collections and summary
//! scalars default to empty/zero so a partial payload still renders; member
//! records keep their required fields strict.

use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::filter::Filterable;
use crate::models::{
    de, ChurnSegment, DailyCheckins, EngagementBucket, FunnelOverview, FunnelStage,
    HourlyCheckins, LifetimeValue, LocationEngagement, LocationMetrics, LocationStat,
    MemberRecord, MonthlyChurn, MonthlyRevenue, MonthlySignups, PtImpact, RevenueByLocation,
    RevenueByType, RiskSummaryEntry, SourcePerformance,
};
use crate::quality::{self, DataQualityWarning};
use crate::sort::Sortable;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewKind {
    Overview,
    Churn,
    AtRisk,
    Engagement,
    Revenue,
    Funnel,
    Locations,
}

impl ViewKind {
    pub const ALL: [ViewKind; 7] = [
        ViewKind::Overview,
        ViewKind::Churn,
        ViewKind::AtRisk,
        ViewKind::Engagement,
        ViewKind::Revenue,
        ViewKind::Funnel,
        ViewKind::Locations,
    ];

    pub fn endpoint(&self) -> &'static str {
        match self {
            ViewKind::Overview => "/overview",
            ViewKind::Churn => "/churn-analysis",
            ViewKind::AtRisk => "/at-risk-members",
            ViewKind::Engagement => "/engagement",
            ViewKind::Revenue => "/revenue",
            ViewKind::Funnel => "/sales-funnel",
            ViewKind::Locations => "/location-comparison",
        }
    }

    pub fn slug(&self) -> &'static str {
        match self {
            ViewKind::Overview => "overview",
            ViewKind::Churn => "churn",
            ViewKind::AtRisk => "at-risk",
            ViewKind::Engagement => "engagement",
            ViewKind::Revenue => "revenue",
            ViewKind::Funnel => "funnel",
            ViewKind::Locations => "locations",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            ViewKind::Overview => "Overview",
            ViewKind::Churn => "Churn Analysis",
            ViewKind::AtRisk => "At-Risk Members",
            ViewKind::Engagement => "Engagement",
            ViewKind::Revenue => "Revenue",
            ViewKind::Funnel => "Sales Funnel",
            ViewKind::Locations => "Location Comparison",
        }
    }
}

impl fmt::Display for ViewKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for ViewKind {
    type Err = crate::error::DashboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ViewKind::ALL
            .into_iter()
            .find(|view| view.slug() == s)
            .ok_or_else(|| crate::error::DashboardError::UnknownView(s.to_string()))
    }
}

/// A payload one analytics view receives from the provider.
pub trait ViewPayload: DeserializeOwned + Send + Sync + 'static {
    const VIEW: ViewKind;

    fn quality_warnings(&self) -> Vec<DataQualityWarning> {
        Vec::new()
    }
}

/// A payload with a record list the operator can filter, sort, and search.
pub trait Projectable: ViewPayload {
    type Row: Filterable + Sortable + Clone + Send + Sync + 'static;

    const DEFAULT_SORT: &'static str;

    fn rows(&self) -> &[Self::Row];
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OverviewPayload {
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub total_members: u64,
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub active_members: u64,
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub retention_rate: f64,
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub mrr: f64,
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub churn_rate: f64,
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub signup_trend: Vec<MonthlySignups>,
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub location_stats: Vec<LocationStat>,
}

impl ViewPayload for OverviewPayload {
    const VIEW: ViewKind = ViewKind::Overview;

    fn quality_warnings(&self) -> Vec<DataQualityWarning> {
        quality::check_location_stats(&self.location_stats)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChurnPayload {
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub churn_by_membership: Vec<ChurnSegment>,
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub churn_by_location: Vec<ChurnSegment>,
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub churn_by_tenure: Vec<ChurnSegment>,
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub pt_impact: Vec<PtImpact>,
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub monthly_trend: Vec<MonthlyChurn>,
}

impl ViewPayload for ChurnPayload {
    const VIEW: ViewKind = ViewKind::Churn;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AtRiskPayload {
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub risk_summary: Vec<RiskSummaryEntry>,
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub at_risk_members: Vec<MemberRecord>,
}

impl ViewPayload for AtRiskPayload {
    const VIEW: ViewKind = ViewKind::AtRisk;

    fn quality_warnings(&self) -> Vec<DataQualityWarning> {
        let mut warnings = quality::check_member_risk_levels(&self.at_risk_members);
        warnings.extend(quality::check_risk_summary(
            &self.risk_summary,
            self.at_risk_members.len(),
        ));
        warnings
    }
}

impl Projectable for AtRiskPayload {
    type Row = MemberRecord;

    const DEFAULT_SORT: &'static str = "days_since_checkin";

    fn rows(&self) -> &[MemberRecord] {
        &self.at_risk_members
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngagementPayload {
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub hourly_pattern: Vec<HourlyCheckins>,
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub daily_pattern: Vec<DailyCheckins>,
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub engagement_distribution: Vec<EngagementBucket>,
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub location_engagement: Vec<LocationEngagement>,
}

impl ViewPayload for EngagementPayload {
    const VIEW: ViewKind = ViewKind::Engagement;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RevenuePayload {
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub revenue_by_type: Vec<RevenueByType>,
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub monthly_revenue_trend: Vec<MonthlyRevenue>,
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub revenue_by_location: Vec<RevenueByLocation>,
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub ltv_by_membership: Vec<LifetimeValue>,
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub current_mrr: f64,
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub active_paying_members: u64,
}

impl ViewPayload for RevenuePayload {
    const VIEW: ViewKind = ViewKind::Revenue;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FunnelPayload {
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub funnel_overview: FunnelOverview,
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub by_source: Vec<SourcePerformance>,
}

impl FunnelPayload {
    /// Leads → Tours Scheduled → Tours Completed → Conversions.
    pub fn stages(&self) -> Vec<FunnelStage> {
        let overview = &self.funnel_overview;
        vec![
            FunnelStage::new("Leads", overview.total_leads),
            FunnelStage::new("Tours Scheduled", overview.tours_scheduled),
            FunnelStage::new("Tours Completed", overview.tours_completed),
            FunnelStage::new("Conversions", overview.conversions),
        ]
    }
}

impl ViewPayload for FunnelPayload {
    const VIEW: ViewKind = ViewKind::Funnel;

    fn quality_warnings(&self) -> Vec<DataQualityWarning> {
        quality::check_funnel(&self.stages())
    }
}

impl Projectable for FunnelPayload {
    type Row = SourcePerformance;

    const DEFAULT_SORT: &'static str = "conversion_rate";

    fn rows(&self) -> &[SourcePerformance] {
        &self.by_source
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocationComparisonPayload {
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub key_metrics: Vec<LocationMetrics>,
}

impl ViewPayload for LocationComparisonPayload {
    const VIEW: ViewKind = ViewKind::Locations;

    fn quality_warnings(&self) -> Vec<DataQualityWarning> {
        quality::check_location_metrics(&self.key_metrics)
    }
}

impl Projectable for LocationComparisonPayload {
    type Row = LocationMetrics;

    const DEFAULT_SORT: &'static str = "retention_rate";

    fn rows(&self) -> &[LocationMetrics] {
        &self.key_metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn views_round_trip_through_their_slugs() {
        for view in ViewKind::ALL {
            assert_eq!(view.slug().parse::<ViewKind>().unwrap(), view);
        }
        assert!("members".parse::<ViewKind>().is_err());
    }

    #[test]
    fn missing_collections_default_to_empty() {
        let payload: EngagementPayload = serde_json::from_value(json!({
            "hourly_pattern": [{ "hour": 6, "checkin_count": 12 }],
            "daily_pattern": null
        }))
        .unwrap();
        assert_eq!(payload.hourly_pattern.len(), 1);
        assert!(payload.daily_pattern.is_empty());
        assert!(payload.engagement_distribution.is_empty());
    }

    #[test]
    fn funnel_stages_follow_pipeline_order() {
        let payload: FunnelPayload = serde_json::from_value(json!({
            "funnel_overview": {
                "total_leads": 200, "tours_scheduled": 120,
                "tours_completed": 90, "conversions": 45
            }
        }))
        .unwrap();
        let names: Vec<&str> = payload.stages().iter().map(|s| s.name).collect();
        assert_eq!(
            names,
            vec!["Leads", "Tours Scheduled", "Tours Completed", "Conversions"]
        );
        assert!(payload.quality_warnings().is_empty());
        assert!(payload.by_source.is_empty());
    }

    #[test]
    fn revenue_type_reads_reserved_key() {
        let payload: RevenuePayload = serde_json::from_value(json!({
            "revenue_by_type": [{ "type": "Membership", "total_revenue": 1200.5 }],
            "current_mrr": null
        }))
        .unwrap();
        assert_eq!(payload.revenue_by_type[0].revenue_type, "Membership");
        assert_eq!(payload.current_mrr, 0.0);
    }
}
