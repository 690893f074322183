use crate::models::{DaysSinceCheckin, MemberRecord, RiskLevel};

/// Inactivity beyond this many days is High risk.
pub const HIGH_RISK_AFTER_DAYS: u32 = 30;
/// Inactivity beyond this many days (up to the High threshold) is Medium risk.
pub const MEDIUM_RISK_AFTER_DAYS: u32 = 14;
/// Members seen within this many days are not at risk at all.
pub const AT_RISK_AFTER_DAYS: u32 = 7;

pub fn classify_days(days: DaysSinceCheckin) -> Option<RiskLevel> {
    match days {
        DaysSinceCheckin::Never => Some(RiskLevel::High),
        DaysSinceCheckin::Days(days) => match days {
            d if d > HIGH_RISK_AFTER_DAYS => Some(RiskLevel::High),
            d if d > MEDIUM_RISK_AFTER_DAYS => Some(RiskLevel::Medium),
            d if d > AT_RISK_AFTER_DAYS => Some(RiskLevel::Low),
            _ => None,
        },
    }
}

/// Members whose provider-supplied level disagrees with their day count.
/// The provided level stays canonical; these are only reported.
pub fn mismatched_levels(members: &[MemberRecord]) -> Vec<(&MemberRecord, Option<RiskLevel>)> {
    members
        .iter()
        .filter_map(|member| {
            let provided = member.risk_level?;
            let expected = classify_days(member.days_since_checkin);
            (expected != Some(provided)).then_some((member, expected))
        })
        .collect()
}
