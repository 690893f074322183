//! Pure summary statistics over fetched records. Every function here is total
//! over its input: empty collections give neutral values, except
//! [`peak_period`], which reports [`DashboardError::EmptySeries`].

use std::cmp::Ordering;

use chrono::{NaiveDate, Weekday};
use serde::Serialize;

use crate::error::{DashboardError, Result};
use crate::models::{
    DailyCheckins, HourlyCheckins, MemberRecord, MonthlyChurn, MonthlyRevenue, MonthlySignups,
    RiskLevel, RiskSummaryEntry,
};
use crate::sort::Sortable;

pub const DEFAULT_LOSS_TOP_N: usize = 50;

/// Share of at-risk revenue expected to be saved by timely outreach.
pub const OUTREACH_SAVE_RATE: f64 = 0.4;

pub fn total_at_risk(summary: &[RiskSummaryEntry]) -> u64 {
    summary.iter().map(|entry| entry.count).sum()
}

pub fn risk_count(summary: &[RiskSummaryEntry], level: RiskLevel) -> u64 {
    summary
        .iter()
        .find(|entry| entry.risk_level == level)
        .map(|entry| entry.count)
        .unwrap_or(0)
}

/// Sums fees over the first `top_n` members exactly as given; callers decide
/// the priority order.
pub fn potential_revenue_loss(members: &[MemberRecord], top_n: usize) -> f64 {
    members.iter().take(top_n).map(|m| m.monthly_fee).sum()
}

pub fn outreach_savings(potential_loss: f64) -> f64 {
    potential_loss * OUTREACH_SAVE_RATE
}

/// Mean inactivity over every member. Members that never checked in add
/// nothing to the sum but still count toward the mean.
pub fn average_days_inactive(members: &[MemberRecord]) -> f64 {
    if members.is_empty() {
        return 0.0;
    }
    let total: f64 = members
        .iter()
        .map(|m| m.days_since_checkin.days().unwrap_or(0) as f64)
        .sum();
    total / members.len() as f64
}

/// Entry with the largest `field`; the first one wins a tie.
pub fn peak_period<'a, T: Sortable>(series: &'a [T], field: &str) -> Result<&'a T> {
    let mut entries = series.iter();
    let first = entries.next().ok_or_else(|| DashboardError::EmptySeries {
        field: field.to_string(),
    })?;

    Ok(entries.fold(first, |best, current| {
        if current.compare_by_field(best, field) == Ordering::Greater {
            current
        } else {
            best
        }
    }))
}

/// [`peak_period`] with a caller-supplied neutral entry for empty series.
pub fn peak_or<'a, T: Sortable>(series: &'a [T], field: &str, neutral: &'a T) -> &'a T {
    peak_period(series, field).unwrap_or(neutral)
}

pub fn percentage_of(part: f64, whole: f64) -> f64 {
    if whole == 0.0 {
        return 0.0;
    }
    part / whole * 100.0
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskBucket {
    pub risk_level: RiskLevel,
    pub member_count: usize,
    pub monthly_fee_at_risk: f64,
}

/// Member count and monthly fees per risk level, High first.
pub fn revenue_at_risk_by_level(members: &[MemberRecord]) -> Vec<RiskBucket> {
    RiskLevel::ALL
        .iter()
        .map(|level| {
            let bucket: Vec<&MemberRecord> = members
                .iter()
                .filter(|m| m.risk() == Some(*level))
                .collect();
            RiskBucket {
                risk_level: *level,
                member_count: bucket.len(),
                monthly_fee_at_risk: bucket.iter().map(|m| m.monthly_fee).sum(),
            }
        })
        .collect()
}

pub trait MonthLabelled {
    fn month(&self) -> &str;
}

impl MonthLabelled for MonthlySignups {
    fn month(&self) -> &str {
        &self.month
    }
}

impl MonthLabelled for MonthlyRevenue {
    fn month(&self) -> &str {
        &self.month
    }
}

impl MonthLabelled for MonthlyChurn {
    fn month(&self) -> &str {
        &self.month
    }
}

fn parse_month(label: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(&format!("{}-01", label.trim()), "%Y-%m-%d").ok()
}

/// Oldest month first, whatever order the provider delivered. Labels that are
/// not `YYYY-MM` go last in lexical order.
pub fn chronological<T: MonthLabelled + Clone>(series: &[T]) -> Vec<T> {
    let mut ordered = series.to_vec();
    ordered.sort_by(|a, b| match (parse_month(a.month()), parse_month(b.month())) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.month().cmp(b.month()),
    });
    ordered
}

pub fn hours_ascending(series: &[HourlyCheckins]) -> Vec<HourlyCheckins> {
    let mut ordered = series.to_vec();
    ordered.sort_by_key(|point| point.hour);
    ordered
}

/// Sunday through Saturday; unrecognised day names go last.
pub fn weekdays_in_order(series: &[DailyCheckins]) -> Vec<DailyCheckins> {
    let mut ordered = series.to_vec();
    ordered.sort_by_key(|point| {
        point
            .day_of_week
            .trim()
            .parse::<Weekday>()
            .map(|day| day.num_days_from_sunday())
            .unwrap_or(7)
    });
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DaysSinceCheckin;

    fn member(id: &str, fee: f64, days: DaysSinceCheckin) -> MemberRecord {
        MemberRecord {
            member_id: id.to_string(),
            location: "Location A".to_string(),
            membership_type: "Basic".to_string(),
            monthly_fee: fee,
            days_since_checkin: days,
            avg_checkins_per_month: 0.0,
            has_personal_training: false,
            risk_level: None,
            total_checkins: 0,
        }
    }

    fn hour(hour: u8, checkin_count: u64) -> HourlyCheckins {
        HourlyCheckins {
            hour,
            checkin_count,
        }
    }

    fn day(name: &str, checkin_count: u64) -> DailyCheckins {
        DailyCheckins {
            day_of_week: name.to_string(),
            checkin_count,
        }
    }

    fn signups(month: &str, signups: u64) -> MonthlySignups {
        MonthlySignups {
            month: month.to_string(),
            signups,
        }
    }

    fn summary() -> Vec<RiskSummaryEntry> {
        vec![
            RiskSummaryEntry {
                risk_level: RiskLevel::High,
                count: 5,
            },
            RiskSummaryEntry {
                risk_level: RiskLevel::Medium,
                count: 3,
            },
            RiskSummaryEntry {
                risk_level: RiskLevel::Low,
                count: 2,
            },
        ]
    }

    #[test]
    fn total_at_risk_sums_counts() {
        assert_eq!(total_at_risk(&summary()), 10);
        assert_eq!(total_at_risk(&[]), 0);
        assert_eq!(risk_count(&summary(), RiskLevel::Medium), 3);
        assert_eq!(risk_count(&summary()[..1], RiskLevel::Low), 0);
    }

    #[test]
    fn revenue_loss_uses_given_order_and_never_overruns() {
        let members = vec![
            member("a", 20.0, DaysSinceCheckin::Days(40)),
            member("b", 30.0, DaysSinceCheckin::Days(20)),
            member("c", 40.0, DaysSinceCheckin::Days(10)),
        ];
        assert_eq!(potential_revenue_loss(&members, DEFAULT_LOSS_TOP_N), 90.0);
        assert_eq!(potential_revenue_loss(&members, 2), 50.0);
        assert_eq!(potential_revenue_loss(&[], DEFAULT_LOSS_TOP_N), 0.0);
        assert_eq!(outreach_savings(90.0), 36.0);
    }

    #[test]
    fn average_days_inactive_is_zero_not_nan_when_empty() {
        assert_eq!(average_days_inactive(&[]), 0.0);

        let members = vec![
            member("a", 20.0, DaysSinceCheckin::Days(10)),
            member("b", 20.0, DaysSinceCheckin::Days(20)),
            member("c", 20.0, DaysSinceCheckin::Days(33)),
        ];
        assert_eq!(average_days_inactive(&members), 21.0);
    }

    #[test]
    fn average_days_inactive_counts_never_as_zero_days() {
        let members = vec![
            member("a", 20.0, DaysSinceCheckin::Days(40)),
            member("b", 20.0, DaysSinceCheckin::Never),
        ];
        assert_eq!(average_days_inactive(&members), 20.0);
        assert_eq!(
            average_days_inactive(&[member("c", 20.0, DaysSinceCheckin::Never)]),
            0.0
        );
    }

    #[test]
    fn peak_period_prefers_first_maximum() {
        let series = vec![
            hour(9, 5),
            hour(18, 20),
            hour(7, 20),
        ];
        let peak = peak_period(&series, "count").unwrap();
        assert_eq!(peak.hour, 18);
    }

    #[test]
    fn peak_period_rejects_empty_series() {
        let series: Vec<HourlyCheckins> = Vec::new();
        let err = peak_period(&series, "checkin_count").unwrap_err();
        assert_eq!(
            err,
            DashboardError::EmptySeries {
                field: "checkin_count".to_string()
            }
        );

        let neutral = hour(0, 0);
        assert_eq!(peak_or(&series, "checkin_count", &neutral).hour, 0);
    }

    #[test]
    fn percentage_of_zero_whole_is_zero() {
        assert_eq!(percentage_of(5.0, 0.0), 0.0);
        assert_eq!(percentage_of(25.0, 200.0), 12.5);
    }

    #[test]
    fn buckets_cover_every_level() {
        let members = vec![
            member("a", 20.0, DaysSinceCheckin::Days(45)),
            member("b", 35.0, DaysSinceCheckin::Never),
            member("c", 50.0, DaysSinceCheckin::Days(9)),
        ];
        let buckets = revenue_at_risk_by_level(&members);
        assert_eq!(buckets.len(), 3);
        assert_eq!(buckets[0].risk_level, RiskLevel::High);
        assert_eq!(buckets[0].member_count, 2);
        assert_eq!(buckets[0].monthly_fee_at_risk, 55.0);
        assert_eq!(buckets[1].member_count, 0);
        assert_eq!(buckets[2].monthly_fee_at_risk, 50.0);
    }

    #[test]
    fn months_are_reordered_oldest_first() {
        let series = vec![
            signups("2025-03", 4),
            signups("2024-12", 9),
            signups("2025-01", 6),
        ];
        let months: Vec<String> = chronological(&series)
            .into_iter()
            .map(|point| point.month)
            .collect();
        assert_eq!(months, vec!["2024-12", "2025-01", "2025-03"]);
    }

    #[test]
    fn hours_and_weekdays_are_normalized() {
        let hours = vec![
            hour(18, 1),
            hour(6, 2),
        ];
        assert_eq!(hours_ascending(&hours)[0].hour, 6);

        let days = vec![
            day("Wednesday", 1),
            day("Sunday", 2),
            day("Monday", 3),
        ];
        let names: Vec<String> = weekdays_in_order(&days)
            .into_iter()
            .map(|point| point.day_of_week)
            .collect();
        assert_eq!(names, vec!["Sunday", "Monday", "Wednesday"]);
    }
}
