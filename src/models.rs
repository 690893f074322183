use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::risk;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RiskLevel {
    High,
    Medium,
    Low,
}

impl RiskLevel {
    pub const ALL: [RiskLevel; 3] = [RiskLevel::High, RiskLevel::Medium, RiskLevel::Low];

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::High => "High",
            RiskLevel::Medium => "Medium",
            RiskLevel::Low => "Low",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => Ok(RiskLevel::High),
            "medium" => Ok(RiskLevel::Medium),
            "low" => Ok(RiskLevel::Low),
            other => Err(format!("unknown risk level `{other}`")),
        }
    }
}

/// Days since a member last checked in. `Never` covers members with no
/// check-in on record, which the provider sends as `null`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaysSinceCheckin {
    Days(u32),
    Never,
}

impl DaysSinceCheckin {
    pub fn days(&self) -> Option<u32> {
        match self {
            DaysSinceCheckin::Days(days) => Some(*days),
            DaysSinceCheckin::Never => None,
        }
    }
}

impl fmt::Display for DaysSinceCheckin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DaysSinceCheckin::Days(days) => write!(f, "{days}"),
            DaysSinceCheckin::Never => f.write_str("never"),
        }
    }
}

impl Serialize for DaysSinceCheckin {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            DaysSinceCheckin::Days(days) => serializer.serialize_u32(*days),
            DaysSinceCheckin::Never => serializer.serialize_none(),
        }
    }
}

// Goes through `Value` so an absent field is still reported as missing
// instead of being read as `null`.
impl<'de> Deserialize<'de> for DaysSinceCheckin {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Null => Ok(DaysSinceCheckin::Never),
            Value::Number(number) => number
                .as_u64()
                .and_then(|days| u32::try_from(days).ok())
                .map(DaysSinceCheckin::Days)
                .ok_or_else(|| {
                    serde::de::Error::custom(format!(
                        "days_since_checkin must be a whole number of days, got {number}"
                    ))
                }),
            other => Err(serde::de::Error::custom(format!(
                "days_since_checkin must be a number or null, got {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberRecord {
    #[serde(deserialize_with = "de::string_or_number")]
    pub member_id: String,
    pub location: String,
    pub membership_type: String,
    #[serde(deserialize_with = "de::non_negative")]
    pub monthly_fee: f64,
    pub days_since_checkin: DaysSinceCheckin,
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub avg_checkins_per_month: f64,
    #[serde(default, deserialize_with = "de::flag")]
    pub has_personal_training: bool,
    #[serde(default)]
    pub risk_level: Option<RiskLevel>,
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub total_checkins: u64,
}

impl MemberRecord {
    /// Provider-supplied level when present, otherwise the level implied by
    /// the day count.
    pub fn risk(&self) -> Option<RiskLevel> {
        self.risk_level
            .or_else(|| risk::classify_days(self.days_since_checkin))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskSummaryEntry {
    pub risk_level: RiskLevel,
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlySignups {
    pub month: String,
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub signups: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyRevenue {
    pub month: String,
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub revenue: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyChurn {
    pub month: String,
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub churned_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyCheckins {
    pub hour: u8,
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub checkin_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyCheckins {
    pub day_of_week: String,
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub checkin_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngagementBucket {
    pub engagement_level: String,
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub member_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationEngagement {
    pub location: String,
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub active_members: u64,
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub total_checkins: u64,
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub avg_visits_per_member: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationStat {
    pub location: String,
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub total_members: u64,
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub active_members: u64,
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub churned_members: u64,
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub avg_monthly_fee: f64,
}

/// Per-location aggregate used by the comparison view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationMetrics {
    pub location: String,
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub active_members: u64,
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub total_members: u64,
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub retention_rate: f64,
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub pt_attachment_rate: f64,
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub mrr: f64,
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub pt_members: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevenueByType {
    #[serde(rename = "type")]
    pub revenue_type: String,
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub total_revenue: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevenueByLocation {
    pub location: String,
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub total_revenue: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifetimeValue {
    pub membership_type: String,
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub member_count: u64,
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub avg_ltv: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FunnelOverview {
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub total_leads: u64,
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub tours_scheduled: u64,
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub tours_completed: u64,
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub conversions: u64,
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub tour_schedule_rate: f64,
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub tour_completion_rate: f64,
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub overall_conversion: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourcePerformance {
    pub lead_source: String,
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub leads: u64,
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub conversions: u64,
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub conversion_rate: f64,
}

/// One step of the lead-to-member pipeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunnelStage {
    pub name: &'static str,
    pub count: u64,
}

impl FunnelStage {
    pub fn new(name: &'static str, count: u64) -> Self {
        Self { name, count }
    }
}

/// Churn aggregate keyed by membership type, location, or tenure band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChurnSegment {
    #[serde(alias = "membership_type", alias = "location", alias = "tenure_group")]
    pub segment: String,
    #[serde(default, alias = "total_members", deserialize_with = "de::null_as_default")]
    pub total: u64,
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub churned: u64,
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub churn_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PtImpact {
    #[serde(default, deserialize_with = "de::flag")]
    pub has_pt: bool,
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub total: u64,
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub churned: u64,
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub churn_rate: f64,
}

pub(crate) mod de {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    pub fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de> + Default,
    {
        Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
    }

    /// SQLite hands booleans back as 0/1.
    pub fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Null => Ok(false),
            Value::Bool(value) => Ok(value),
            Value::Number(number) => Ok(number.as_f64().is_some_and(|n| n != 0.0)),
            other => Err(serde::de::Error::custom(format!(
                "expected a boolean flag, got {other}"
            ))),
        }
    }

    pub fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Value::deserialize(deserializer)? {
            Value::String(value) => Ok(value),
            Value::Number(number) => Ok(number.to_string()),
            other => Err(serde::de::Error::custom(format!(
                "expected a string identifier, got {other}"
            ))),
        }
    }

    pub fn non_negative<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        let value = f64::deserialize(deserializer)?;
        if value < 0.0 {
            return Err(serde::de::Error::custom(format!(
                "expected a non-negative amount, got {value}"
            )));
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn member_defaults_optional_enrichment() {
        let member: MemberRecord = serde_json::from_value(json!({
            "member_id": "M-100",
            "location": "Location A",
            "membership_type": "Premium",
            "monthly_fee": 59.99,
            "days_since_checkin": 21
        }))
        .unwrap();

        assert_eq!(member.avg_checkins_per_month, 0.0);
        assert!(!member.has_personal_training);
        assert_eq!(member.risk_level, None);
        assert_eq!(member.risk(), Some(RiskLevel::Medium));
    }

    #[test]
    fn member_requires_days_since_checkin() {
        let result: Result<MemberRecord, _> = serde_json::from_value(json!({
            "member_id": "M-100",
            "location": "Location A",
            "membership_type": "Basic",
            "monthly_fee": 29.99
        }));
        let err = result.unwrap_err().to_string();
        assert!(err.contains("days_since_checkin"), "{err}");
    }

    #[test]
    fn null_days_means_never_checked_in() {
        let member: MemberRecord = serde_json::from_value(json!({
            "member_id": 42,
            "location": "Location B",
            "membership_type": "Basic",
            "monthly_fee": 29.99,
            "days_since_checkin": null,
            "has_personal_training": 1,
            "avg_checkins_per_month": null
        }))
        .unwrap();

        assert_eq!(member.member_id, "42");
        assert_eq!(member.days_since_checkin, DaysSinceCheckin::Never);
        assert!(member.has_personal_training);
        assert_eq!(member.risk(), Some(RiskLevel::High));
    }

    #[test]
    fn rejects_negative_fees() {
        let result: Result<MemberRecord, _> = serde_json::from_value(json!({
            "member_id": "M-1",
            "location": "Location A",
            "membership_type": "Basic",
            "monthly_fee": -5.0,
            "days_since_checkin": 9
        }));
        assert!(result.is_err());
    }

    #[test]
    fn day_counts_must_fit_whole_days() {
        let days = |value: serde_json::Value| serde_json::from_value::<DaysSinceCheckin>(value);

        assert_eq!(days(json!(45)).unwrap(), DaysSinceCheckin::Days(45));
        assert_eq!(
            days(json!(u32::MAX)).unwrap(),
            DaysSinceCheckin::Days(u32::MAX)
        );
        assert!(days(json!(u64::from(u32::MAX) + 1)).is_err());
        assert!(days(json!(-3)).is_err());
        assert!(days(json!(12.5)).is_err());
    }

    #[test]
    fn churn_segments_accept_each_grouping_key() {
        let by_type: ChurnSegment = serde_json::from_value(json!({
            "membership_type": "Basic", "total": 10, "churned": 4, "churn_rate": 40.0
        }))
        .unwrap();
        let by_location: ChurnSegment = serde_json::from_value(json!({
            "location": "Location A", "total_members": 20, "churned": 2, "churn_rate": 10.0
        }))
        .unwrap();

        assert_eq!(by_type.segment, "Basic");
        assert_eq!(by_location.segment, "Location A");
        assert_eq!(by_location.total, 20);
    }

    #[test]
    fn risk_level_parses_case_insensitively() {
        assert_eq!("high".parse::<RiskLevel>(), Ok(RiskLevel::High));
        assert_eq!(" Medium ".parse::<RiskLevel>(), Ok(RiskLevel::Medium));
        assert!("critical".parse::<RiskLevel>().is_err());
    }
}
