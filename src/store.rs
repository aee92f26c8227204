use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::aggregation::{self, DashboardView};
use crate::filter::{self, AlertQuery, ListingSummary};
use crate::models::{AlertRecord, AlertStatus, StatsSnapshot};
use crate::workflow::WorkflowError;

/// Orders responses: a response is applied only if no later-issued response
/// of the same kind has been applied already.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct FetchTicket(u64);

/// View state for one dashboard: the loaded alerts and stats plus the
/// loading and error flags shown around them.
///
/// Status changes go through `begin_save`, then `confirm_save` or
/// `rollback_save`. While a save is outstanding the record keeps its
/// confirmed status; the requested one is only visible through
/// `tentative_status`.
#[derive(Debug)]
pub struct DashboardStore {
    alerts: Vec<AlertRecord>,
    stats: Option<StatsSnapshot>,
    error: Option<String>,
    active: bool,
    issued: u64,
    applied_alerts: Option<FetchTicket>,
    applied_stats: Option<FetchTicket>,
    outstanding_fetches: usize,
    outstanding_generates: usize,
    tentative: HashMap<String, AlertStatus>,
    last_updated: Option<DateTime<Utc>>,
}

impl Default for DashboardStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DashboardStore {
    pub fn new() -> Self {
        Self {
            alerts: Vec::new(),
            stats: None,
            error: None,
            active: true,
            issued: 0,
            applied_alerts: None,
            applied_stats: None,
            outstanding_fetches: 0,
            outstanding_generates: 0,
            tentative: HashMap::new(),
            last_updated: None,
        }
    }

    pub fn alerts(&self) -> &[AlertRecord] {
        &self.alerts
    }

    pub fn stats(&self) -> Option<&StatsSnapshot> {
        self.stats.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.last_updated
    }

    #[cfg(test)]
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_loading(&self) -> bool {
        self.outstanding_fetches > 0 || self.outstanding_generates > 0
    }

    pub fn find(&self, alert_id: &str) -> Option<&AlertRecord> {
        self.alerts.iter().find(|a| a.id == alert_id)
    }

    pub fn visible(&self, query: &AlertQuery) -> Vec<&AlertRecord> {
        filter::filter_alerts(&self.alerts, query)
    }

    pub fn listing(&self, query: &AlertQuery) -> ListingSummary {
        ListingSummary::new(self.alerts.len(), self.visible(query).len())
    }

    pub fn view(&self) -> Option<DashboardView> {
        self.stats.as_ref().map(aggregation::project)
    }

    /// Stops accepting responses. Anything arriving later is dropped.
    pub fn deactivate(&mut self) {
        self.active = false;
        self.outstanding_fetches = 0;
        self.outstanding_generates = 0;
    }

    pub fn issue_ticket(&mut self) -> FetchTicket {
        self.issued += 1;
        FetchTicket(self.issued)
    }

    /// Starts a combined refresh: raises the loading flag and clears the last error.
    pub fn begin_fetch(&mut self) -> FetchTicket {
        self.outstanding_fetches += 1;
        self.error = None;
        self.issue_ticket()
    }

    pub fn finish_fetch(&mut self) {
        self.outstanding_fetches = self.outstanding_fetches.saturating_sub(1);
    }

    pub fn begin_generate(&mut self) {
        self.outstanding_generates += 1;
    }

    pub fn end_generate(&mut self) {
        self.outstanding_generates = self.outstanding_generates.saturating_sub(1);
    }

    pub fn apply_alerts(&mut self, ticket: FetchTicket, alerts: Vec<AlertRecord>) -> bool {
        if !self.accepts(ticket, self.applied_alerts) {
            return false;
        }
        self.alerts = alerts;
        self.applied_alerts = Some(ticket);
        self.last_updated = Some(Utc::now());
        true
    }

    pub fn apply_stats(&mut self, ticket: FetchTicket, stats: StatsSnapshot) -> bool {
        if !self.accepts(ticket, self.applied_stats) {
            return false;
        }
        self.stats = Some(stats);
        self.applied_stats = Some(ticket);
        self.last_updated = Some(Utc::now());
        true
    }

    fn accepts(&self, ticket: FetchTicket, applied: Option<FetchTicket>) -> bool {
        self.active && applied.map_or(true, |last| ticket >= last)
    }

    pub fn record_error(&mut self, message: impl Into<String>) {
        if self.active {
            self.error = Some(message.into());
        }
    }

    /// Reserves `alert_id` for a save to `status`. Only one save per alert at a time.
    pub fn begin_save(&mut self, alert_id: &str, status: AlertStatus) -> Result<(), WorkflowError> {
        if self.tentative.contains_key(alert_id) {
            return Err(WorkflowError::SaveInFlight(alert_id.to_string()));
        }
        self.tentative.insert(alert_id.to_string(), status);
        Ok(())
    }

    /// Commits the reserved status to the loaded record. Returns false when
    /// there was nothing to commit. Alert lists issued before the commit are
    /// stale from then on.
    pub fn confirm_save(&mut self, alert_id: &str) -> bool {
        let Some(status) = self.tentative.remove(alert_id) else {
            return false;
        };
        if !self.active {
            return false;
        }
        match self.alerts.iter_mut().find(|a| a.id == alert_id) {
            Some(alert) => {
                alert.status = status;
                self.applied_alerts = Some(self.issue_ticket());
                true
            }
            None => false,
        }
    }

    pub fn rollback_save(&mut self, alert_id: &str) {
        self.tentative.remove(alert_id);
    }

    pub fn tentative_status(&self, alert_id: &str) -> Option<AlertStatus> {
        self.tentative.get(alert_id).copied()
    }

    #[cfg(test)]
    pub fn saves_in_flight(&self) -> usize {
        self.tentative.len()
    }
}
