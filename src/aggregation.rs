use chrono::{DateTime, Local, NaiveTime, TimeZone};

use crate::models::{ActivityBucket, AlertStatus, Severity, StatsSnapshot};

pub const ACTIVITY_ROW_LIMIT: usize = 8;

pub const ACTIVITY_HEADERS: [&str; 6] = ["Time", "Total", "Critical", "High", "Medium", "Low"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryCard {
    pub title: &'static str,
    pub value: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakdownRow {
    pub label: &'static str,
    pub value: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityRow {
    pub time: String,
    pub total: u64,
    pub critical: u64,
    pub high: u64,
    pub medium: u64,
    pub low: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityTable {
    pub headers: [&'static str; 6],
    pub rows: Vec<ActivityRow>,
    /// Buckets received beyond the rows shown.
    pub remaining: usize,
}

impl ActivityTable {
    pub fn received(&self) -> usize {
        self.rows.len() + self.remaining
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardView {
    pub cards: Vec<SummaryCard>,
    pub severity_breakdown: Vec<BreakdownRow>,
    pub status_breakdown: Vec<BreakdownRow>,
    pub activity: ActivityTable,
}

/// Projects a snapshot for display, rendering bucket times in the local zone.
pub fn project(stats: &StatsSnapshot) -> DashboardView {
    project_in(stats, &Local)
}

pub fn project_in<Tz: TimeZone>(stats: &StatsSnapshot, tz: &Tz) -> DashboardView
where
    Tz::Offset: std::fmt::Display,
{
    let cards = vec![
        SummaryCard {
            title: "Total Alerts",
            value: stats.total_alerts,
        },
        SummaryCard {
            title: "Critical Alerts",
            value: stats.by_severity.critical,
        },
        SummaryCard {
            title: "High Priority",
            value: stats.by_severity.high,
        },
        SummaryCard {
            title: "Open Alerts",
            value: stats.by_status.open,
        },
    ];

    let severity_breakdown = Severity::DISPLAY_ORDER
        .iter()
        .map(|severity| BreakdownRow {
            label: severity.label(),
            value: stats.by_severity.get(*severity),
        })
        .collect();

    let status_breakdown = AlertStatus::DISPLAY_ORDER
        .iter()
        .map(|status| BreakdownRow {
            label: status.label(),
            value: stats.by_status.get(*status),
        })
        .collect();

    let rows = stats
        .recent_activity
        .iter()
        .take(ACTIVITY_ROW_LIMIT)
        .map(|bucket| activity_row(bucket, tz))
        .collect();

    DashboardView {
        cards,
        severity_breakdown,
        status_breakdown,
        activity: ActivityTable {
            headers: ACTIVITY_HEADERS,
            rows,
            remaining: stats.recent_activity.len().saturating_sub(ACTIVITY_ROW_LIMIT),
        },
    }
}

fn activity_row<Tz: TimeZone>(bucket: &ActivityBucket, tz: &Tz) -> ActivityRow
where
    Tz::Offset: std::fmt::Display,
{
    ActivityRow {
        time: format_bucket_time(&bucket.time, tz),
        total: bucket.total,
        critical: bucket.critical,
        high: bucket.high,
        medium: bucket.medium,
        low: bucket.low,
    }
}

/// Renders a bucket label as a 12-hour clock. Full timestamps are shifted into
/// `tz`; bare `HH:MM` labels are already wall-clock and only reformatted.
pub fn format_bucket_time<Tz: TimeZone>(raw: &str, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    const CLOCK: &str = "%I:%M %p";

    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return parsed.with_timezone(tz).format(CLOCK).to_string();
    }
    if let Ok(clock) = NaiveTime::parse_from_str(raw, "%H:%M") {
        return clock.format(CLOCK).to_string();
    }
    raw.to_string()
}
