use std::fmt::Write;

use crate::models::{LocationMetrics, MemberRecord, SourcePerformance};
use crate::payloads::{
    AtRiskPayload, ChurnPayload, EngagementPayload, FunnelPayload, LocationComparisonPayload,
    OverviewPayload, RevenuePayload, ViewPayload,
};
use crate::quality::DataQualityWarning;
use crate::record_set::RecordSet;
use crate::summary::{
    AtRiskSummary, ChurnSummary, EngagementSummary, FunnelSummary, LocationSummary,
    OverviewSummary, RevenueSummary,
};
use crate::view_state::{Projection, ViewState};

fn write_header<P: ViewPayload>(output: &mut String, records: &RecordSet<P>) {
    let _ = writeln!(output, "# {}", P::VIEW.title());
    let _ = writeln!(
        output,
        "Fetched {}",
        records.fetched_at().format("%Y-%m-%d %H:%M:%S UTC")
    );
    let _ = writeln!(output);
}

fn write_warnings(output: &mut String, warnings: &[DataQualityWarning]) {
    if warnings.is_empty() {
        return;
    }
    let _ = writeln!(output);
    let _ = writeln!(output, "## Data Quality Notes");
    for warning in warnings {
        let _ = writeln!(output, "- {warning}");
    }
}

fn write_selection<T>(output: &mut String, state: &ViewState, projection: &Projection<T>) {
    let search = if state.search.is_empty() {
        "none".to_string()
    } else {
        format!("\"{}\"", state.search)
    };
    let _ = writeln!(
        output,
        "Showing {} of {} matching ({} total) | risk: {} | search: {} | sort: {} {}",
        projection.rows.len(),
        projection.matched,
        projection.total,
        state.risk,
        search,
        state.sort_field,
        state.direction
    );
}

pub fn render_overview(records: &RecordSet<OverviewPayload>) -> String {
    let summary = OverviewSummary::derive(records.payload());
    let mut output = String::new();
    write_header(&mut output, records);

    let _ = writeln!(output, "## Key Metrics");
    let _ = writeln!(
        output,
        "- Members: {} total, {} active",
        summary.total_members, summary.active_members
    );
    let _ = writeln!(
        output,
        "- Retention: {:.1}% ({})",
        summary.retention_rate,
        if summary.retention_above_average {
            "above industry average"
        } else {
            "at or below industry average"
        }
    );
    let _ = writeln!(
        output,
        "- Churn: {:.1}% ({})",
        summary.churn_rate,
        if summary.churn_below_target {
            "within target"
        } else {
            "above target"
        }
    );
    let _ = writeln!(output, "- MRR: ${:.2}", summary.mrr);

    let _ = writeln!(output);
    let _ = writeln!(output, "## Signups");
    if summary.signup_trend.is_empty() {
        let _ = writeln!(output, "No signup history delivered.");
    } else {
        for point in &summary.signup_trend {
            let _ = writeln!(output, "- {}: {}", point.month, point.signups);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Locations");
    if summary.locations.is_empty() {
        let _ = writeln!(output, "No location stats delivered.");
    } else {
        for location in &summary.locations {
            let _ = writeln!(
                output,
                "- {}: {:.1}% active",
                location.location, location.active_rate
            );
        }
    }

    write_warnings(&mut output, records.warnings());
    output
}

pub fn render_churn(records: &RecordSet<ChurnPayload>) -> String {
    let payload = records.payload();
    let summary = ChurnSummary::derive(payload);
    let mut output = String::new();
    write_header(&mut output, records);

    let _ = writeln!(output, "## Highest Churn Memberships");
    if summary.highest_churn.is_empty() {
        let _ = writeln!(output, "No membership churn delivered.");
    } else {
        for segment in &summary.highest_churn {
            let _ = writeln!(
                output,
                "- {}: {:.1}% ({} of {})",
                segment.segment, segment.churn_rate, segment.churned, segment.total
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Locations Above Alert Rate");
    if summary.flagged_locations.is_empty() {
        let _ = writeln!(output, "No location exceeds the alert rate.");
    } else {
        for segment in &summary.flagged_locations {
            let _ = writeln!(output, "- {}: {:.1}%", segment.segment, segment.churn_rate);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Tenure");
    for segment in &payload.churn_by_tenure {
        let _ = writeln!(output, "- {}: {:.1}%", segment.segment, segment.churn_rate);
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Personal Training Impact");
    for group in &payload.pt_impact {
        let _ = writeln!(
            output,
            "- {}: {:.1}% churn ({} of {})",
            if group.has_pt { "With PT" } else { "Without PT" },
            group.churn_rate,
            group.churned,
            group.total
        );
    }
    let _ = writeln!(
        output,
        "Retention lift from PT: {:.1} points",
        summary.pt_retention_lift
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Monthly Churn");
    for point in &summary.monthly_trend {
        let _ = writeln!(output, "- {}: {}", point.month, point.churned_count);
    }

    write_warnings(&mut output, records.warnings());
    output
}

pub fn render_at_risk(
    records: &RecordSet<AtRiskPayload>,
    state: &ViewState,
    projection: &Projection<MemberRecord>,
    top_n: usize,
) -> String {
    let summary = AtRiskSummary::derive(records.payload(), top_n);
    let mut output = String::new();
    write_header(&mut output, records);

    let _ = writeln!(output, "## Risk Summary");
    let _ = writeln!(
        output,
        "- High: {} | Medium: {} | Low: {} | Total: {}",
        summary.high, summary.medium, summary.low, summary.total
    );
    let _ = writeln!(
        output,
        "- Potential monthly loss (top {}): ${:.2}",
        top_n, summary.potential_loss
    );
    let _ = writeln!(
        output,
        "- Recoverable with outreach: ${:.2}",
        summary.outreach_savings
    );
    let _ = writeln!(
        output,
        "- Average days inactive: {:.1}",
        summary.average_days_inactive
    );
    for bucket in &summary.buckets {
        let _ = writeln!(
            output,
            "- {}: {} members, ${:.2}/month",
            bucket.risk_level, bucket.member_count, bucket.monthly_fee_at_risk
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Members");
    write_selection(&mut output, state, projection);
    if projection.rows.is_empty() {
        let _ = writeln!(output, "No members match the current selection.");
    } else {
        let _ = writeln!(output);
        let _ = writeln!(
            output,
            "| Member | Location | Membership | Fee | Days | Visits/mo | PT | Risk |"
        );
        let _ = writeln!(output, "|---|---|---|---|---|---|---|---|");
        for member in &projection.rows {
            let _ = writeln!(
                output,
                "| {} | {} | {} | ${:.2} | {} | {:.1} | {} | {} |",
                member.member_id,
                member.location,
                member.membership_type,
                member.monthly_fee,
                member.days_since_checkin,
                member.avg_checkins_per_month,
                if member.has_personal_training { "yes" } else { "no" },
                member
                    .risk()
                    .map(|level| level.as_str())
                    .unwrap_or("-")
            );
        }
    }

    write_warnings(&mut output, records.warnings());
    output
}

pub fn render_engagement(records: &RecordSet<EngagementPayload>) -> String {
    let payload = records.payload();
    let summary = EngagementSummary::derive(payload);
    let mut output = String::new();
    write_header(&mut output, records);

    let _ = writeln!(output, "## Highlights");
    let _ = writeln!(
        output,
        "- Peak hour: {:02}:00 ({} check-ins)",
        summary.peak_hour.hour, summary.peak_hour.checkin_count
    );
    let busiest = if summary.busiest_day.day_of_week.is_empty() {
        "n/a"
    } else {
        summary.busiest_day.day_of_week.as_str()
    };
    let _ = writeln!(
        output,
        "- Busiest day: {} ({} check-ins)",
        busiest, summary.busiest_day.checkin_count
    );
    let _ = writeln!(
        output,
        "- Highly engaged: {} of {} ({:.1}%)",
        summary.high_engagement, summary.total_engaged, summary.high_engagement_share
    );
    let _ = writeln!(output, "- Inactive: {}", summary.inactive_members);

    let _ = writeln!(output);
    let _ = writeln!(output, "## Check-ins by Hour");
    for point in &summary.hourly {
        let _ = writeln!(output, "- {:02}:00: {}", point.hour, point.checkin_count);
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Check-ins by Day");
    for point in &summary.daily {
        let _ = writeln!(output, "- {}: {}", point.day_of_week, point.checkin_count);
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Locations");
    for location in &payload.location_engagement {
        let _ = writeln!(
            output,
            "- {}: {} active, {} check-ins, {:.1} visits/member",
            location.location,
            location.active_members,
            location.total_checkins,
            location.avg_visits_per_member
        );
    }

    write_warnings(&mut output, records.warnings());
    output
}

pub fn render_revenue(records: &RecordSet<RevenuePayload>) -> String {
    let payload = records.payload();
    let summary = RevenueSummary::derive(payload);
    let mut output = String::new();
    write_header(&mut output, records);

    let _ = writeln!(output, "## Revenue");
    let _ = writeln!(output, "- Current MRR: ${:.2}", summary.current_mrr);
    let _ = writeln!(
        output,
        "- Paying members: {}",
        summary.active_paying_members
    );
    let _ = writeln!(output, "- Total revenue: ${:.2}", summary.total_revenue);
    let _ = writeln!(
        output,
        "- Membership share: {:.1}% | Personal training share: {:.1}%",
        summary.membership_share, summary.personal_training_share
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Monthly Trend");
    for point in &summary.monthly_trend {
        let _ = writeln!(output, "- {}: ${:.2}", point.month, point.revenue);
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## By Location");
    for location in &payload.revenue_by_location {
        let _ = writeln!(
            output,
            "- {}: ${:.2}",
            location.location, location.total_revenue
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Lifetime Value");
    for ltv in &payload.ltv_by_membership {
        let _ = writeln!(
            output,
            "- {}: ${:.2} across {} members",
            ltv.membership_type, ltv.avg_ltv, ltv.member_count
        );
    }

    write_warnings(&mut output, records.warnings());
    output
}

pub fn render_funnel(
    records: &RecordSet<FunnelPayload>,
    state: &ViewState,
    projection: &Projection<SourcePerformance>,
) -> String {
    let summary = FunnelSummary::derive(records.payload());
    let mut output = String::new();
    write_header(&mut output, records);

    let _ = writeln!(output, "## Pipeline");
    for stage in &summary.stages {
        let _ = writeln!(output, "- {}: {}", stage.name, stage.count);
    }
    for step in &summary.steps {
        let _ = writeln!(output, "- {} -> {}: {:.1}%", step.from, step.to, step.rate);
    }
    let _ = writeln!(
        output,
        "- Overall conversion: {:.1}%",
        summary.overall_conversion
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Lead Sources");
    write_selection(&mut output, state, projection);
    if projection.rows.is_empty() {
        let _ = writeln!(output, "No lead sources match the current selection.");
    } else {
        for source in &projection.rows {
            let _ = writeln!(
                output,
                "- {}: {} leads, {} conversions ({:.1}%)",
                source.lead_source, source.leads, source.conversions, source.conversion_rate
            );
        }
    }

    write_warnings(&mut output, records.warnings());
    output
}

pub fn render_locations(
    records: &RecordSet<LocationComparisonPayload>,
    state: &ViewState,
    projection: &Projection<LocationMetrics>,
) -> String {
    let summary = LocationSummary::derive(records.payload());
    let mut output = String::new();
    write_header(&mut output, records);

    if let Some(leader) = &summary.leader {
        let _ = writeln!(
            output,
            "Retention leader: {} at {:.1}%",
            leader.location, leader.retention_rate
        );
        let _ = writeln!(output);
    }

    let _ = writeln!(output, "## Locations");
    write_selection(&mut output, state, projection);
    if projection.rows.is_empty() {
        let _ = writeln!(output, "No locations match the current selection.");
    } else {
        let _ = writeln!(output);
        let _ = writeln!(
            output,
            "| Location | Active | Total | Retention | PT Attach | MRR |"
        );
        let _ = writeln!(output, "|---|---|---|---|---|---|");
        for row in &projection.rows {
            let _ = writeln!(
                output,
                "| {} | {} | {} | {:.1}% | {:.1}% | ${:.2} |",
                row.location,
                row.active_members,
                row.total_members,
                row.retention_rate,
                row.pt_attachment_rate,
                row.mrr
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Activity");
    for activity in &summary.activity {
        let _ = writeln!(
            output,
            "- {}: {:.1}% of members active",
            activity.location, activity.active_rate
        );
    }

    write_warnings(&mut output, records.warnings());
    output
}
