use std::str::FromStr;

use crate::models::{AlertRecord, AlertStatus, Severity};

/// One optional equality predicate taken from operator input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Criterion<T> {
    Any,
    Exactly(T),
    /// Input that names no known value. Matches no record.
    Unrecognized(String),
}

impl<T> Default for Criterion<T> {
    fn default() -> Self {
        Criterion::Any
    }
}

impl<T: FromStr + PartialEq> Criterion<T> {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Criterion::Any;
        }
        match trimmed.parse::<T>() {
            Ok(value) => Criterion::Exactly(value),
            Err(_) => Criterion::Unrecognized(trimmed.to_string()),
        }
    }

    pub fn accepts(&self, value: &T) -> bool {
        match self {
            Criterion::Any => true,
            Criterion::Exactly(expected) => expected == value,
            Criterion::Unrecognized(_) => false,
        }
    }
}

impl<T> Criterion<T> {
    pub fn is_any(&self) -> bool {
        matches!(self, Criterion::Any)
    }
}

impl<T> From<Option<T>> for Criterion<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => Criterion::Exactly(value),
            None => Criterion::Any,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlertQuery {
    pub text: String,
    pub severity: Criterion<Severity>,
    pub status: Criterion<AlertStatus>,
}

impl AlertQuery {
    /// Builds a query from raw form input; empty strings mean "all".
    pub fn from_input(text: &str, severity: &str, status: &str) -> Self {
        Self {
            text: text.to_string(),
            severity: Criterion::parse(severity),
            status: Criterion::parse(status),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && self.severity.is_any() && self.status.is_any()
    }

    pub fn matches(&self, alert: &AlertRecord) -> bool {
        self.matches_text(alert)
            && self.severity.accepts(&alert.severity)
            && self.status.accepts(&alert.status)
    }

    fn matches_text(&self, alert: &AlertRecord) -> bool {
        if self.text.is_empty() {
            return true;
        }
        let needle = self.text.to_lowercase();
        alert.title.to_lowercase().contains(&needle)
            || alert.description.to_lowercase().contains(&needle)
    }
}

/// Visible subset of `alerts`, in input order.
pub fn filter_alerts<'a>(alerts: &'a [AlertRecord], query: &AlertQuery) -> Vec<&'a AlertRecord> {
    alerts.iter().filter(|alert| query.matches(alert)).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListingSummary {
    pub total: usize,
    pub shown: usize,
}

impl ListingSummary {
    pub fn new(total: usize, shown: usize) -> Self {
        Self { total, shown }
    }

    pub fn heading(&self) -> String {
        format!("Security Alerts ({})", self.shown)
    }

    pub fn empty_message(&self) -> Option<&'static str> {
        if self.shown > 0 {
            None
        } else if self.total == 0 {
            Some("No alerts found")
        } else {
            Some("No alerts match your filters")
        }
    }
}
