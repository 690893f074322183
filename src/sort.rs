use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::models::{
    ChurnSegment, DailyCheckins, EngagementBucket, HourlyCheckins, LocationEngagement,
    LocationMetrics, LocationStat, MemberRecord, MonthlyChurn, MonthlyRevenue, MonthlySignups,
    SourcePerformance,
};

/// A comparable field value pulled out of a record by name.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Number(f64),
    Text(String),
    Flag(bool),
}

impl FieldValue {
    fn rank(&self) -> u8 {
        match self {
            FieldValue::Flag(_) => 0,
            FieldValue::Number(_) => 1,
            FieldValue::Text(_) => 2,
        }
    }

    pub fn total_cmp(&self, other: &FieldValue) -> Ordering {
        match (self, other) {
            (FieldValue::Number(a), FieldValue::Number(b)) => a.total_cmp(b),
            (FieldValue::Text(a), FieldValue::Text(b)) => a.cmp(b),
            (FieldValue::Flag(a), FieldValue::Flag(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Number(value)
    }
}

impl From<u64> for FieldValue {
    fn from(value: u64) -> Self {
        FieldValue::Number(value as f64)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Flag(value)
    }
}

/// Records that expose their fields by name for sorting and peak detection.
pub trait Sortable {
    /// `None` for unknown fields and for values that are absent on this record.
    fn field_value(&self, field: &str) -> Option<FieldValue>;

    fn compare_by_field(&self, other: &Self, field: &str) -> Ordering
    where
        Self: Sized,
    {
        compare_values(self.field_value(field), other.field_value(field))
    }
}

/// Missing values order below every present value.
pub fn compare_values(a: Option<FieldValue>, b: Option<FieldValue>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => a.total_cmp(&b),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    Ascending,
    #[default]
    Descending,
}

impl SortDirection {
    pub fn toggled(self) -> Self {
        match self {
            SortDirection::Ascending => SortDirection::Descending,
            SortDirection::Descending => SortDirection::Ascending,
        }
    }

    pub fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortDirection::Ascending => f.write_str("asc"),
            SortDirection::Descending => f.write_str("desc"),
        }
    }
}

impl FromStr for SortDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Ok(SortDirection::Ascending),
            "desc" | "descending" => Ok(SortDirection::Descending),
            other => Err(format!("unknown sort direction `{other}`")),
        }
    }
}

pub fn comparator<T: Sortable>(
    field: &str,
    direction: SortDirection,
) -> impl Fn(&T, &T) -> Ordering + '_ {
    move |a: &T, b: &T| direction.apply(a.compare_by_field(b, field))
}

/// `slice::sort_by` is stable, so equal keys keep their input order in
/// either direction.
pub fn sort_records<T: Sortable>(records: &mut [T], field: &str, direction: SortDirection) {
    records.sort_by(comparator(field, direction));
}

impl Sortable for MemberRecord {
    fn field_value(&self, field: &str) -> Option<FieldValue> {
        match field {
            "member_id" => Some(self.member_id.as_str().into()),
            "location" => Some(self.location.as_str().into()),
            "membership_type" => Some(self.membership_type.as_str().into()),
            "monthly_fee" => Some(self.monthly_fee.into()),
            "days_since_checkin" => self
                .days_since_checkin
                .days()
                .map(|days| FieldValue::from(days as u64)),
            "avg_checkins_per_month" => Some(self.avg_checkins_per_month.into()),
            "has_personal_training" => Some(self.has_personal_training.into()),
            "risk_level" => self.risk().map(|level| level.as_str().into()),
            "total_checkins" => Some(self.total_checkins.into()),
            _ => None,
        }
    }
}

impl Sortable for LocationMetrics {
    fn field_value(&self, field: &str) -> Option<FieldValue> {
        match field {
            "location" => Some(self.location.as_str().into()),
            "active_members" => Some(self.active_members.into()),
            "total_members" => Some(self.total_members.into()),
            "retention_rate" => Some(self.retention_rate.into()),
            "pt_attachment_rate" => Some(self.pt_attachment_rate.into()),
            "mrr" => Some(self.mrr.into()),
            "pt_members" => Some(self.pt_members.into()),
            _ => None,
        }
    }
}

impl Sortable for LocationStat {
    fn field_value(&self, field: &str) -> Option<FieldValue> {
        match field {
            "location" => Some(self.location.as_str().into()),
            "total_members" => Some(self.total_members.into()),
            "active_members" => Some(self.active_members.into()),
            "churned_members" => Some(self.churned_members.into()),
            "avg_monthly_fee" => Some(self.avg_monthly_fee.into()),
            _ => None,
        }
    }
}

impl Sortable for LocationEngagement {
    fn field_value(&self, field: &str) -> Option<FieldValue> {
        match field {
            "location" => Some(self.location.as_str().into()),
            "active_members" => Some(self.active_members.into()),
            "total_checkins" => Some(self.total_checkins.into()),
            "avg_visits_per_member" => Some(self.avg_visits_per_member.into()),
            _ => None,
        }
    }
}

impl Sortable for SourcePerformance {
    fn field_value(&self, field: &str) -> Option<FieldValue> {
        match field {
            "lead_source" => Some(self.lead_source.as_str().into()),
            "leads" => Some(self.leads.into()),
            "conversions" => Some(self.conversions.into()),
            "conversion_rate" => Some(self.conversion_rate.into()),
            _ => None,
        }
    }
}

impl Sortable for ChurnSegment {
    fn field_value(&self, field: &str) -> Option<FieldValue> {
        match field {
            "segment" => Some(self.segment.as_str().into()),
            "total" => Some(self.total.into()),
            "churned" => Some(self.churned.into()),
            "churn_rate" => Some(self.churn_rate.into()),
            _ => None,
        }
    }
}

impl Sortable for HourlyCheckins {
    fn field_value(&self, field: &str) -> Option<FieldValue> {
        match field {
            "hour" => Some((self.hour as u64).into()),
            "checkin_count" | "count" => Some(self.checkin_count.into()),
            _ => None,
        }
    }
}

impl Sortable for DailyCheckins {
    fn field_value(&self, field: &str) -> Option<FieldValue> {
        match field {
            "day_of_week" => Some(self.day_of_week.as_str().into()),
            "checkin_count" | "count" => Some(self.checkin_count.into()),
            _ => None,
        }
    }
}

impl Sortable for EngagementBucket {
    fn field_value(&self, field: &str) -> Option<FieldValue> {
        match field {
            "engagement_level" => Some(self.engagement_level.as_str().into()),
            "member_count" => Some(self.member_count.into()),
            _ => None,
        }
    }
}

impl Sortable for MonthlySignups {
    fn field_value(&self, field: &str) -> Option<FieldValue> {
        match field {
            "month" => Some(self.month.as_str().into()),
            "signups" => Some(self.signups.into()),
            _ => None,
        }
    }
}

impl Sortable for MonthlyRevenue {
    fn field_value(&self, field: &str) -> Option<FieldValue> {
        match field {
            "month" => Some(self.month.as_str().into()),
            "revenue" => Some(self.revenue.into()),
            _ => None,
        }
    }
}

impl Sortable for MonthlyChurn {
    fn field_value(&self, field: &str) -> Option<FieldValue> {
        match field {
            "month" => Some(self.month.as_str().into()),
            "churned_count" => Some(self.churned_count.into()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone)]
    struct Row {
        id: &'static str,
        v: Option<f64>,
    }

    impl Sortable for Row {
        fn field_value(&self, field: &str) -> Option<FieldValue> {
            match field {
                "id" => Some(self.id.into()),
                "v" => self.v.map(FieldValue::Number),
                _ => None,
            }
        }
    }

    fn row(id: &'static str, v: Option<f64>) -> Row {
        Row { id, v }
    }

    fn ids(rows: &[Row]) -> Vec<&'static str> {
        rows.iter().map(|row| row.id).collect()
    }

    #[test]
    fn ties_keep_input_order() {
        let mut rows = vec![row("b", Some(1.0)), row("a", Some(1.0))];
        sort_records(&mut rows, "v", SortDirection::Ascending);
        assert_eq!(ids(&rows), vec!["b", "a"]);

        sort_records(&mut rows, "v", SortDirection::Descending);
        assert_eq!(ids(&rows), vec!["b", "a"]);
    }

    #[test]
    fn numbers_compare_numerically() {
        let mut rows = vec![
            row("ten", Some(10.0)),
            row("two", Some(2.0)),
            row("thirty", Some(30.0)),
        ];
        sort_records(&mut rows, "v", SortDirection::Ascending);
        assert_eq!(ids(&rows), vec!["two", "ten", "thirty"]);

        sort_records(&mut rows, "v", SortDirection::Descending);
        assert_eq!(ids(&rows), vec!["thirty", "ten", "two"]);
    }

    #[test]
    fn missing_values_sort_as_minimum() {
        let mut rows = vec![
            row("x", Some(5.0)),
            row("missing", None),
            row("y", Some(1.0)),
        ];
        sort_records(&mut rows, "v", SortDirection::Ascending);
        assert_eq!(ids(&rows), vec!["missing", "y", "x"]);

        sort_records(&mut rows, "v", SortDirection::Descending);
        assert_eq!(ids(&rows), vec!["x", "y", "missing"]);
    }

    #[test]
    fn unknown_field_leaves_order_untouched() {
        let mut rows = vec![row("c", Some(3.0)), row("a", Some(1.0))];
        sort_records(&mut rows, "no_such_field", SortDirection::Ascending);
        assert_eq!(ids(&rows), vec!["c", "a"]);
    }

    #[test]
    fn strings_compare_lexically() {
        let mut rows = vec![row("beta", None), row("alpha", None)];
        sort_records(&mut rows, "id", SortDirection::Ascending);
        assert_eq!(ids(&rows), vec!["alpha", "beta"]);
    }

    #[test]
    fn direction_round_trips_through_text() {
        assert_eq!("ASC".parse::<SortDirection>(), Ok(SortDirection::Ascending));
        assert_eq!(SortDirection::Ascending.toggled(), SortDirection::Descending);
        assert_eq!(SortDirection::default().to_string(), "desc");
    }
}
