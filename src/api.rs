use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Url};
use serde::de::DeserializeOwned;

use crate::config::Settings;
use crate::models::{
    AlertRecord, AlertStatus, GenerateReceipt, RawEvent, Severity, StatsSnapshot,
    StatusUpdateReceipt,
};

/// Any failed call: transport error, timeout, non-success status or bad body.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ApiError(pub String);

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError(format!("request timed out: {err}"))
        } else {
            ApiError(err.to_string())
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlertListParams {
    pub status: Option<AlertStatus>,
    pub severity: Option<Severity>,
    pub limit: Option<u32>,
}

impl AlertListParams {
    pub fn with_limit(limit: u32) -> Self {
        Self {
            limit: Some(limit),
            ..Self::default()
        }
    }

    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(status) = self.status {
            pairs.push(("status", status.to_string()));
        }
        if let Some(severity) = self.severity {
            pairs.push(("severity", severity.to_string()));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit", limit.to_string()));
        }
        pairs
    }
}

#[async_trait]
pub trait AlertsApi: Send + Sync {
    async fn get_alerts(&self, params: &AlertListParams) -> Result<Vec<AlertRecord>, ApiError>;
    async fn get_stats(&self) -> Result<StatsSnapshot, ApiError>;
    async fn generate_alerts(&self) -> Result<GenerateReceipt, ApiError>;
    async fn update_alert_status(
        &self,
        alert_id: &str,
        status: AlertStatus,
    ) -> Result<StatusUpdateReceipt, ApiError>;
    async fn get_recent_events(&self, hours: u32) -> Result<Vec<RawEvent>, ApiError>;
}

pub struct HttpAlertsApi {
    base_url: Url,
    client: Client,
}

impl HttpAlertsApi {
    pub fn new(settings: &Settings) -> Result<Self, ApiError> {
        let base_url = Url::parse(&settings.api_base_url).map_err(|e| {
            ApiError(format!("invalid API base URL '{}': {e}", settings.api_base_url))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError(format!(
                "API base URL '{}' cannot carry a path",
                settings.api_base_url
            )));
        }
        let client = Client::builder().timeout(settings.request_timeout).build()?;
        Ok(Self { base_url, client })
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty();
            path.extend(segments);
        }
        url
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let response = request.send().await?.error_for_status()?;
        Ok(response.json().await?)
    }
}

fn status_body(status: AlertStatus) -> serde_json::Value {
    serde_json::json!({ "status": status })
}

#[async_trait]
impl AlertsApi for HttpAlertsApi {
    async fn get_alerts(&self, params: &AlertListParams) -> Result<Vec<AlertRecord>, ApiError> {
        let url = self.endpoint(&["alerts", ""]);
        tracing::debug!(%url, ?params, "fetching alerts");
        self.send_json(self.client.get(url).query(&params.query_pairs()))
            .await
    }

    async fn get_stats(&self) -> Result<StatsSnapshot, ApiError> {
        let url = self.endpoint(&["alerts", "stats"]);
        tracing::debug!(%url, "fetching stats");
        self.send_json(self.client.get(url)).await
    }

    async fn generate_alerts(&self) -> Result<GenerateReceipt, ApiError> {
        let url = self.endpoint(&["alerts", "generate"]);
        tracing::debug!(%url, "requesting alert generation");
        self.send_json(self.client.post(url)).await
    }

    async fn update_alert_status(
        &self,
        alert_id: &str,
        status: AlertStatus,
    ) -> Result<StatusUpdateReceipt, ApiError> {
        let url = self.endpoint(&["alerts", alert_id, "status"]);
        tracing::debug!(%url, %status, "updating alert status");
        self.send_json(self.client.patch(url).json(&status_body(status)))
            .await
    }

    async fn get_recent_events(&self, hours: u32) -> Result<Vec<RawEvent>, ApiError> {
        let url = self.endpoint(&["alerts", "events"]);
        tracing::debug!(%url, hours, "fetching recent events");
        self.send_json(self.client.get(url).query(&[("hours", hours)]))
            .await
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use tokio::sync::Notify;

    use super::*;

    /// In-memory API whose responses are set per test.
    pub struct FakeApi {
        pub alerts: Mutex<Result<Vec<AlertRecord>, ApiError>>,
        pub stats: Mutex<Result<StatsSnapshot, ApiError>>,
        pub generate: Mutex<Result<GenerateReceipt, ApiError>>,
        pub update: Mutex<Result<(), ApiError>>,
        pub updates: Mutex<Vec<(String, AlertStatus)>>,
        pub alert_calls: AtomicUsize,
        pub stats_calls: AtomicUsize,
        pub generate_calls: AtomicUsize,
        update_gate: Option<Arc<Notify>>,
        alerts_gate: Mutex<Option<Arc<Notify>>>,
    }

    impl FakeApi {
        pub fn new(alerts: Vec<AlertRecord>, stats: StatsSnapshot) -> Self {
            Self {
                alerts: Mutex::new(Ok(alerts)),
                stats: Mutex::new(Ok(stats)),
                generate: Mutex::new(Ok(GenerateReceipt {
                    message: "Generated 3 alerts".to_string(),
                    alert_count: 3,
                })),
                update: Mutex::new(Ok(())),
                updates: Mutex::new(Vec::new()),
                alert_calls: AtomicUsize::new(0),
                stats_calls: AtomicUsize::new(0),
                generate_calls: AtomicUsize::new(0),
                update_gate: None,
                alerts_gate: Mutex::new(None),
            }
        }

        /// Status updates wait for `gate` to be notified before answering.
        pub fn with_update_gate(mut self, gate: Arc<Notify>) -> Self {
            self.update_gate = Some(gate);
            self
        }

        /// Alert lists are read from server state when requested, then held
        /// until `gate` is notified.
        pub fn hold_alert_lists(&self, gate: Arc<Notify>) {
            *self.alerts_gate.lock().unwrap() = Some(gate);
        }

        pub fn fail_alerts(&self, message: &str) {
            *self.alerts.lock().unwrap() = Err(ApiError(message.to_string()));
        }

        pub fn fail_stats(&self, message: &str) {
            *self.stats.lock().unwrap() = Err(ApiError(message.to_string()));
        }

        pub fn fail_generate(&self, message: &str) {
            *self.generate.lock().unwrap() = Err(ApiError(message.to_string()));
        }

        pub fn fail_update(&self, message: &str) {
            *self.update.lock().unwrap() = Err(ApiError(message.to_string()));
        }

        pub fn set_stats(&self, stats: StatsSnapshot) {
            *self.stats.lock().unwrap() = Ok(stats);
        }

        pub fn fetches(&self) -> usize {
            self.alert_calls.load(Ordering::SeqCst)
        }

        pub fn stats_fetches(&self) -> usize {
            self.stats_calls.load(Ordering::SeqCst)
        }

        pub fn update_count(&self) -> usize {
            self.updates.lock().unwrap().len()
        }

        /// Status the fake server currently holds for `alert_id`.
        pub fn server_status(&self, alert_id: &str) -> Option<AlertStatus> {
            match &*self.alerts.lock().unwrap() {
                Ok(alerts) => alerts.iter().find(|a| a.id == alert_id).map(|a| a.status),
                Err(_) => None,
            }
        }
    }

    #[async_trait]
    impl AlertsApi for FakeApi {
        async fn get_alerts(&self, params: &AlertListParams) -> Result<Vec<AlertRecord>, ApiError> {
            self.alert_calls.fetch_add(1, Ordering::SeqCst);
            let snapshot = self.alerts.lock().unwrap().clone();
            let gate = self.alerts_gate.lock().unwrap().clone();
            if let Some(gate) = gate {
                gate.notified().await;
            }
            let alerts = snapshot?;
            let limit = params.limit.map(|l| l as usize).unwrap_or(usize::MAX);
            Ok(alerts
                .into_iter()
                .filter(|a| params.status.map_or(true, |s| a.status == s))
                .filter(|a| params.severity.map_or(true, |s| a.severity == s))
                .take(limit)
                .collect())
        }

        async fn get_stats(&self) -> Result<StatsSnapshot, ApiError> {
            self.stats_calls.fetch_add(1, Ordering::SeqCst);
            self.stats.lock().unwrap().clone()
        }

        async fn generate_alerts(&self) -> Result<GenerateReceipt, ApiError> {
            self.generate_calls.fetch_add(1, Ordering::SeqCst);
            self.generate.lock().unwrap().clone()
        }

        async fn update_alert_status(
            &self,
            alert_id: &str,
            status: AlertStatus,
        ) -> Result<StatusUpdateReceipt, ApiError> {
            self.updates
                .lock()
                .unwrap()
                .push((alert_id.to_string(), status));
            if let Some(gate) = &self.update_gate {
                gate.notified().await;
            }
            self.update.lock().unwrap().clone()?;
            if let Ok(alerts) = &mut *self.alerts.lock().unwrap() {
                if let Some(alert) = alerts.iter_mut().find(|a| a.id == alert_id) {
                    alert.status = status;
                }
            }
            Ok(StatusUpdateReceipt {
                message: format!("Alert {alert_id} status updated"),
                alert_id: alert_id.to_string(),
                new_status: status,
            })
        }

        async fn get_recent_events(&self, _hours: u32) -> Result<Vec<RawEvent>, ApiError> {
            Ok(vec![RawEvent::from(serde_json::json!({"EventID": 4625}))])
        }
    }
}
