use std::fmt::Write;
use std::path::Path;

use chrono::{DateTime, Local, TimeZone, Utc};
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};

use crate::aggregation::{ActivityTable, BreakdownRow, DashboardView};
use crate::filter::{AlertQuery, ListingSummary};
use crate::models::{AlertRecord, AlertStatus};
use crate::store::DashboardStore;

const PREVIEW_ITEMS: usize = 2;

pub fn build_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(headers.to_vec());
    table
}

pub fn render_overview(view: &DashboardView) -> String {
    let mut output = String::new();

    for card in &view.cards {
        let _ = writeln!(output, "{:<16} {}", card.title, card.value);
    }

    let _ = writeln!(output);
    render_breakdown(&mut output, "Severity Breakdown", &view.severity_breakdown);
    let _ = writeln!(output);
    render_breakdown(&mut output, "Status Breakdown", &view.status_breakdown);
    let _ = writeln!(output);
    let _ = writeln!(output, "24h Activity");
    let _ = writeln!(output, "{}", activity_table(&view.activity));
    if view.activity.remaining > 0 {
        let _ = writeln!(
            output,
            "Showing latest {} entries of {} total",
            view.activity.rows.len(),
            view.activity.received()
        );
    }

    output
}

fn render_breakdown(output: &mut String, title: &str, rows: &[BreakdownRow]) {
    let _ = writeln!(output, "{title}");
    for row in rows {
        let _ = writeln!(output, "  {:<16} {}", row.label, row.value);
    }
}

pub fn activity_table(activity: &ActivityTable) -> Table {
    let mut table = build_table(&activity.headers);
    for row in &activity.rows {
        table.add_row(vec![
            row.time.clone(),
            row.total.to_string(),
            row.critical.to_string(),
            row.high.to_string(),
            row.medium.to_string(),
            row.low.to_string(),
        ]);
    }
    table
}

/// First few entries joined, with a `+N more` suffix for the rest.
pub fn preview(items: &[String]) -> String {
    let shown = items
        .iter()
        .take(PREVIEW_ITEMS)
        .cloned()
        .collect::<Vec<_>>()
        .join(", ");
    if items.len() > PREVIEW_ITEMS {
        format!("{shown} +{} more", items.len() - PREVIEW_ITEMS)
    } else {
        shown
    }
}

pub fn card_time<Tz: TimeZone>(timestamp: &DateTime<Utc>, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    timestamp.with_timezone(tz).format("%b %d, %H:%M").to_string()
}

/// `saving` is the status of an update still waiting for the backend.
pub fn render_alert_card(alert: &AlertRecord, saving: Option<AlertStatus>) -> String {
    render_alert_card_in(alert, saving, &Local)
}

pub fn render_alert_card_in<Tz: TimeZone>(
    alert: &AlertRecord,
    saving: Option<AlertStatus>,
    tz: &Tz,
) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let mut output = String::new();
    let _ = writeln!(
        output,
        "[{}] {} ({})",
        alert.severity.as_str().to_uppercase(),
        alert.title,
        alert.status.label()
    );
    let _ = writeln!(output, "  id: {}", alert.id);
    let _ = writeln!(output, "  {}", alert.description);

    let mut details = vec![
        format!("Time: {}", card_time(&alert.timestamp, tz)),
        format!("Events: {}", alert.event_count),
    ];
    if !alert.affected_users.is_empty() {
        details.push(format!("Users: {}", preview(&alert.affected_users)));
    }
    if !alert.source_ips.is_empty() {
        details.push(format!("IPs: {}", preview(&alert.source_ips)));
    }
    let _ = writeln!(output, "  {}", details.join(" | "));
    let _ = writeln!(output, "  Source: {}", alert.source);
    if let Some(status) = saving {
        let _ = writeln!(output, "  Saving status: {}...", status.label());
    }
    output
}

pub fn render_alert_list(
    listing: ListingSummary,
    alerts: &[&AlertRecord],
    loading: bool,
    saving: impl Fn(&str) -> Option<AlertStatus>,
) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "{}", listing.heading());
    let _ = writeln!(output);

    if loading {
        let _ = writeln!(output, "Loading alerts...");
        return output;
    }
    if let Some(message) = listing.empty_message() {
        let _ = writeln!(output, "{message}");
        return output;
    }
    for alert in alerts {
        let _ = writeln!(output, "{}", render_alert_card(alert, saving(&alert.id)));
    }
    output
}

/// Full screen: error banner, stats, alert list and status line.
pub fn render_dashboard(store: &DashboardStore, query: &AlertQuery) -> String {
    let mut output = String::new();

    if let Some(error) = store.error() {
        let _ = writeln!(output, "Error: {error}");
        let _ = writeln!(output);
    }

    match store.view() {
        Some(view) => {
            let _ = writeln!(output, "{}", render_overview(&view));
        }
        None if store.is_loading() => {
            let _ = writeln!(output, "Loading dashboard...");
        }
        None => {}
    }

    if store.stats().is_some() || !store.is_loading() {
        let visible = store.visible(query);
        let listing = ListingSummary::new(store.alerts().len(), visible.len());
        let loading = store.is_loading() && store.stats().is_some();
        output.push_str(&render_alert_list(listing, &visible, loading, |id| {
            store.tentative_status(id)
        }));
    }

    let health = if store.error().is_some() { "degraded" } else { "ok" };
    let updated = store
        .last_updated()
        .map(|at| at.with_timezone(&Local).format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "never".to_string());
    let _ = writeln!(output, "Last updated: {updated} ({health})");

    output
}

#[derive(serde::Serialize)]
struct CsvRow<'a> {
    id: &'a str,
    timestamp: String,
    severity: &'a str,
    status: &'a str,
    title: &'a str,
    description: &'a str,
    source: &'a str,
    event_count: u64,
    affected_users: String,
    source_ips: String,
}

pub fn export_csv(path: &Path, alerts: &[&AlertRecord]) -> anyhow::Result<usize> {
    let mut writer = csv::Writer::from_path(path)?;
    for alert in alerts {
        writer.serialize(CsvRow {
            id: &alert.id,
            timestamp: alert.timestamp.to_rfc3339(),
            severity: alert.severity.as_str(),
            status: alert.status.as_str(),
            title: &alert.title,
            description: &alert.description,
            source: &alert.source,
            event_count: alert.event_count,
            affected_users: alert.affected_users.join(";"),
            source_ips: alert.source_ips.join(";"),
        })?;
    }
    writer.flush()?;
    Ok(alerts.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::project_in;
    use crate::models::fixtures::{self, alert, generated_alerts};
    use crate::models::{Severity, StatsSnapshot};

    #[test]
    fn zero_stats_render_literal_zeros_and_headers() {
        let view = project_in(&StatsSnapshot::default(), &Utc);
        let output = render_overview(&view);
        for title in ["Total Alerts", "Critical Alerts", "High Priority", "Open Alerts"] {
            let line = output.lines().find(|l| l.starts_with(title)).unwrap();
            assert!(line.ends_with(" 0"), "{line}");
        }
        assert!(output.contains("False Positive"));
        for header in ["Time", "Total", "Critical", "High", "Medium", "Low"] {
            assert!(output.contains(header));
        }
        assert!(!output.contains("Showing latest"));
    }

    #[test]
    fn large_counts_are_printed_in_full() {
        let mut stats = fixtures::stats();
        stats.total_alerts = 12_345_678_901;
        let output = render_overview(&project_in(&stats, &Utc));
        assert!(output.contains("12345678901"));
    }

    #[test]
    fn truncated_activity_mentions_the_total() {
        let mut stats = fixtures::stats();
        stats.recent_activity = (0..24)
            .map(|hour| crate::models::ActivityBucket {
                time: format!("{hour:02}:00"),
                ..Default::default()
            })
            .collect();
        let output = render_overview(&project_in(&stats, &Utc));
        assert!(output.contains("Showing latest 8 entries of 24 total"));
        assert!(output.contains("07:00 AM"));
        assert!(!output.contains("08:00 AM"));
    }

    #[test]
    fn preview_truncates_long_lists() {
        let ips: Vec<String> = ["10.0.0.1", "10.0.0.2", "10.0.0.3", "10.0.0.4"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(preview(&ips), "10.0.0.1, 10.0.0.2 +2 more");
        assert_eq!(preview(&ips[..2]), "10.0.0.1, 10.0.0.2");
    }

    #[test]
    fn alert_card_lists_details() {
        let mut record = alert("alert-9", Severity::High, AlertStatus::FalsePositive);
        record.affected_users = vec!["a".into(), "b".into(), "c".into()];
        record.source_ips.clear();
        let card = render_alert_card_in(&record, None, &Utc);
        assert!(card.starts_with("[HIGH] Test Alert alert-9 (False Positive)"));
        assert!(card.contains("Time: Jan 15, 10:00"));
        assert!(card.contains("Events: 5"));
        assert!(card.contains("Users: a, b +1 more"));
        assert!(!card.contains("IPs:"));
        assert!(card.contains("Source: Security Events"));
        assert!(!card.contains("Saving status"));

        let saving = render_alert_card_in(&record, Some(AlertStatus::Resolved), &Utc);
        assert!(saving.contains("Saving status: Resolved..."));
    }

    #[test]
    fn list_shows_empty_states() {
        let none = render_alert_list(ListingSummary::new(0, 0), &[], false, |_| None);
        assert!(none.contains("Security Alerts (0)"));
        assert!(none.contains("No alerts found"));

        let filtered = render_alert_list(ListingSummary::new(3, 0), &[], false, |_| None);
        assert!(filtered.contains("No alerts match your filters"));

        let loading = render_alert_list(ListingSummary::new(3, 3), &[], true, |_| None);
        assert!(loading.contains("Loading alerts..."));
    }

    #[test]
    fn dashboard_shows_error_banner_and_list() {
        let mut store = DashboardStore::new();
        let ticket = store.begin_fetch();
        store.apply_alerts(ticket, generated_alerts());
        store.record_error("Failed to fetch data. Please check if the backend is running.");
        store.finish_fetch();

        let query = AlertQuery::from_input("", "critical", "");
        let output = render_dashboard(&store, &query);
        assert!(output.starts_with("Error: Failed to fetch data."));
        assert!(output.contains("Security Alerts (2)"));
        assert!(output.contains("(degraded)"));
        assert!(!output.contains("Total Alerts"));
    }

    #[test]
    fn pending_saves_are_marked_on_their_card() {
        let mut store = DashboardStore::new();
        let ticket = store.begin_fetch();
        store.apply_alerts(ticket, generated_alerts());
        store.apply_stats(ticket, fixtures::stats());
        store.finish_fetch();
        store.begin_save("alert-4", AlertStatus::Open).unwrap();

        let output = render_dashboard(&store, &AlertQuery::from_input("", "low", ""));
        assert!(output.contains("Total Alerts"));
        assert!(output.contains("(False Positive)"));
        assert!(output.contains("Saving status: Open..."));
    }

    #[test]
    fn first_load_shows_placeholder_only() {
        let mut store = DashboardStore::new();
        store.begin_fetch();
        let output = render_dashboard(&store, &AlertQuery::default());
        assert!(output.contains("Loading dashboard..."));
        assert!(!output.contains("Security Alerts"));
        assert!(output.contains("Last updated: never (ok)"));
    }

    #[test]
    fn csv_export_writes_one_row_per_alert() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alerts.csv");
        let alerts = generated_alerts();
        let visible: Vec<&AlertRecord> = alerts.iter().take(3).collect();

        let written = export_csv(&path, &visible).unwrap();
        assert_eq!(written, 3);

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let headers = reader.headers().unwrap().clone();
        assert_eq!(&headers[0], "id");
        assert_eq!(&headers[3], "status");
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 3);
        assert_eq!(&rows[2][3], "resolved");
        assert_eq!(&rows[0][8], "admin@example.com");
    }
}
